// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::{byte_lane, merge_byte, Peripheral, SimResult};
use std::any::Any;

pub const RTC_CNTL_STORE0: u64 = 0x4C;
pub const RTC_CNTL_STORE4: u64 = 0xB0;
pub const RTC_CNTL_WINDOW_SIZE: u64 = 0x140;

/// ESP32 RTC control block, reduced to its scratch registers.
///
/// The scratch bank lives in the RTC domain and keeps its contents across a
/// machine reset; bootloaders use it to hand data to the application.
#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct RtcCntl {
    pub scratch: [u32; 8],
}

impl RtcCntl {
    pub fn new() -> Self {
        Self::default()
    }

    fn scratch_index(offset: u64) -> Option<usize> {
        match offset {
            RTC_CNTL_STORE0..=0x58 => Some(((offset - RTC_CNTL_STORE0) / 4) as usize),
            RTC_CNTL_STORE4..=0xBC => Some(((offset - RTC_CNTL_STORE4) / 4) as usize + 4),
            _ => None,
        }
    }

    fn read_reg(&self, offset: u64) -> u32 {
        Self::scratch_index(offset).map_or(0, |i| self.scratch[i])
    }

    fn write_reg(&mut self, offset: u64, value: u32) {
        match Self::scratch_index(offset) {
            Some(i) => self.scratch[i] = value,
            None => tracing::trace!("rtc_cntl: write to unimplemented register {:#x}", offset),
        }
    }
}

impl Peripheral for RtcCntl {
    fn read(&self, offset: u64) -> SimResult<u8> {
        let (reg_offset, shift) = byte_lane(offset);
        Ok(((self.read_reg(reg_offset) >> shift) & 0xFF) as u8)
    }

    fn write(&mut self, offset: u64, value: u8) -> SimResult<()> {
        let (reg_offset, shift) = byte_lane(offset);
        let merged = merge_byte(self.read_reg(reg_offset), shift, value);
        self.write_reg(reg_offset, merged);
        Ok(())
    }

    fn read_u32(&self, offset: u64) -> SimResult<u32> {
        Ok(self.read_reg(offset & !3))
    }

    fn write_u32(&mut self, offset: u64, value: u32) -> SimResult<()> {
        self.write_reg(offset & !3, value);
        Ok(())
    }

    fn as_any(&self) -> Option<&dyn Any> {
        Some(self)
    }
    fn as_any_mut(&mut self) -> Option<&mut dyn Any> {
        Some(self)
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    fn restore(&mut self, state: serde_json::Value) -> SimResult<()> {
        *self = serde_json::from_value(state)
            .map_err(|e| crate::SimulationError::SnapshotDecode(e.to_string()))?;
        Ok(())
    }
}
