// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::SimResult;
use std::collections::HashMap;

/// Placeholder for a block that is mapped but not modelled: fixed values on
/// read, writes dropped.
#[derive(Debug, serde::Serialize)]
pub struct StubPeripheral {
    pub values: HashMap<u64, u32>, // mapping offset to value
    pub default_val: u32,
}

impl StubPeripheral {
    pub fn new(default_val: u32) -> Self {
        Self {
            values: HashMap::new(),
            default_val,
        }
    }

    pub fn with_value(mut self, offset: u64, value: u32) -> Self {
        self.values.insert(offset & !3, value);
        self
    }
}

impl crate::Peripheral for StubPeripheral {
    fn read(&self, offset: u64) -> SimResult<u8> {
        let reg_offset = offset & !3;
        let byte_offset = (offset % 4) as u32;
        let val = self
            .values
            .get(&reg_offset)
            .copied()
            .unwrap_or(self.default_val);
        Ok(((val >> (byte_offset * 8)) & 0xFF) as u8)
    }

    fn write(&mut self, offset: u64, value: u8) -> SimResult<()> {
        tracing::trace!("stub: dropped write {:#x} at {:#x}", value, offset);
        Ok(())
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Peripheral;

    #[test]
    fn test_stub_reads_fixed_values() {
        let mut stub = StubPeripheral::new(0xDEAD_BEEF).with_value(0x6, 0x1122_3344);
        assert_eq!(stub.read_u32(0x4).unwrap(), 0x1122_3344);
        assert_eq!(stub.read_u32(0x10).unwrap(), 0xDEAD_BEEF);
        stub.write_u32(0x4, 0).unwrap();
        assert_eq!(stub.read_u32(0x4).unwrap(), 0x1122_3344);
    }
}
