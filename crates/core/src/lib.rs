// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod bus;
pub mod interrupt;
pub mod multi_core;
pub mod peripherals;
pub mod signals;
pub mod snapshot;
pub mod system;

use signals::DigitalLevel;
use std::any::Any;

mod tests;

/// Largest number of cores the fabric can be wired for.
pub const MAX_CPUS: usize = 2;

#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("Memory access violation at {0:#x}")]
    MemoryViolation(u64),
    #[error("Snapshot decoding error: {0}")]
    SnapshotDecode(String),
}

pub type SimResult<T> = Result<T, SimulationError>;

/// Guest-visible misuse of the interrupt fabric.
///
/// None of these abort the emulation: register entry points log them and fall
/// back to a read of `0` or a discarded write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FabricError {
    #[error("register offset {0:#x} is outside the register window")]
    OutOfRangeAddress(u64),
    #[error("interrupt source index {0} is out of range")]
    OutOfRangeSourceIndex(usize),
    #[error("core {0} is not a wired secondary core")]
    InvalidCore(usize),
    #[error("core count {0} is not supported")]
    InvalidCoreCount(usize),
}

/// Trait representing a memory-mapped peripheral
pub trait Peripheral: std::fmt::Debug + Send {
    fn read(&self, offset: u64) -> SimResult<u8>;
    fn write(&mut self, offset: u64, value: u8) -> SimResult<()>;

    /// Word access. Devices whose registers carry write side effects override
    /// this so one 32-bit store is observed exactly once.
    fn read_u32(&self, offset: u64) -> SimResult<u32> {
        let b0 = self.read(offset)? as u32;
        let b1 = self.read(offset + 1)? as u32;
        let b2 = self.read(offset + 2)? as u32;
        let b3 = self.read(offset + 3)? as u32;
        Ok(b0 | (b1 << 8) | (b2 << 16) | (b3 << 24))
    }

    fn write_u32(&mut self, offset: u64, value: u32) -> SimResult<()> {
        self.write(offset, (value & 0xFF) as u8)?;
        self.write(offset + 1, ((value >> 8) & 0xFF) as u8)?;
        self.write(offset + 2, ((value >> 16) & 0xFF) as u8)?;
        self.write(offset + 3, ((value >> 24) & 0xFF) as u8)?;
        Ok(())
    }

    /// Current level of the device's interrupt output, if it has one.
    fn irq_level(&self) -> Option<DigitalLevel> {
        None
    }

    /// Machine-wide reset.
    fn reset(&mut self) {}

    fn as_any(&self) -> Option<&dyn Any> {
        None
    }
    fn as_any_mut(&mut self) -> Option<&mut dyn Any> {
        None
    }
    fn snapshot(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
    fn restore(&mut self, _state: serde_json::Value) -> SimResult<()> {
        Ok(())
    }
}

/// Address of byte `index` of an access starting at `addr`; an access that
/// wraps the address space is a violation.
fn lane_addr(addr: u64, index: u64) -> SimResult<u64> {
    addr.checked_add(index)
        .ok_or(SimulationError::MemoryViolation(addr))
}

/// Trait representing the system bus
pub trait Bus {
    fn read_u8(&self, addr: u64) -> SimResult<u8>;
    fn write_u8(&mut self, addr: u64, value: u8) -> SimResult<()>;

    fn read_u16(&self, addr: u64) -> SimResult<u16> {
        let b0 = self.read_u8(addr)? as u16;
        let b1 = self.read_u8(lane_addr(addr, 1)?)? as u16;
        // Little Endian
        Ok(b0 | (b1 << 8))
    }

    fn read_u32(&self, addr: u64) -> SimResult<u32> {
        let mut value = 0u32;
        for i in 0..4 {
            value |= (self.read_u8(lane_addr(addr, i)?)? as u32) << (i * 8);
        }
        Ok(value)
    }

    fn write_u32(&mut self, addr: u64, value: u32) -> SimResult<()> {
        for i in 0..4 {
            self.write_u8(lane_addr(addr, i)?, (value >> (i * 8)) as u8)?;
        }
        Ok(())
    }

    fn write_u16(&mut self, addr: u64, value: u16) -> SimResult<()> {
        self.write_u8(addr, (value & 0xFF) as u8)?;
        self.write_u8(lane_addr(addr, 1)?, (value >> 8) as u8)?;
        Ok(())
    }
}

/// Splits a byte access into the aligned register offset and the bit shift of
/// the byte lane inside it.
pub(crate) fn byte_lane(offset: u64) -> (u64, u32) {
    (offset & !3, ((offset % 4) as u32) * 8)
}

/// Merges one byte into a 32-bit register value.
pub(crate) fn merge_byte(reg_val: u32, shift: u32, value: u8) -> u32 {
    let mask = 0xFFu32 << shift;
    (reg_val & !mask) | ((value as u32) << shift)
}
