// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Per-core interrupt matrix.
//!
//! Each peripheral interrupt source owns one 32-bit map register holding the
//! 5-bit CPU interrupt line it is routed to. The matrix is pure pass-through
//! wiring: a level change on a source is forwarded to its mapped line as-is,
//! with no merging when several sources share a line.

use crate::interrupt::IrqRouter;
use crate::signals::{DigitalLevel, IrqInputSink};
use crate::FabricError;
use std::sync::Arc;

/// Number of peripheral interrupt sources feeding each core's matrix.
pub const INTMATRIX_INPUTS: usize = 69;

/// Map registers keep the low five bits (CPU lines 0..=31).
pub const INTMATRIX_LINE_MASK: u32 = 0x1F;

/// Byte size of one core's map register window.
pub const INTMATRIX_WINDOW_SIZE: u64 = (INTMATRIX_INPUTS * 4) as u64;

#[derive(Debug)]
pub struct InterruptMatrix {
    core: usize,
    map: [u8; INTMATRIX_INPUTS],
    outputs: Arc<dyn IrqInputSink>,
}

impl InterruptMatrix {
    pub fn new(core: usize, outputs: Arc<dyn IrqInputSink>) -> Self {
        Self {
            core,
            map: [0; INTMATRIX_INPUTS],
            outputs,
        }
    }

    pub fn core(&self) -> usize {
        self.core
    }

    fn check_source(source: usize) -> Result<(), FabricError> {
        if source < INTMATRIX_INPUTS {
            Ok(())
        } else {
            Err(FabricError::OutOfRangeSourceIndex(source))
        }
    }

    pub fn try_write_mapping(&mut self, source: usize, value: u32) -> Result<(), FabricError> {
        Self::check_source(source)?;
        self.map[source] = (value & INTMATRIX_LINE_MASK) as u8;
        Ok(())
    }

    pub fn try_read_mapping(&self, source: usize) -> Result<u8, FabricError> {
        Self::check_source(source)?;
        Ok(self.map[source])
    }

    /// Route `source` to the CPU line in the low five bits of `value`.
    /// Takes effect on the next `signal` for that source.
    pub fn write_mapping(&mut self, source: usize, value: u32) {
        if let Err(e) = self.try_write_mapping(source, value) {
            tracing::warn!("intmatrix[{}]: write discarded: {}", self.core, e);
        }
    }

    pub fn read_mapping(&self, source: usize) -> u8 {
        self.try_read_mapping(source).unwrap_or_else(|e| {
            tracing::warn!("intmatrix[{}]: read returns 0: {}", self.core, e);
            0
        })
    }

    /// Map-register view used by the DPORT window: `offset` is relative to
    /// this core's first map register.
    pub fn read_reg(&self, offset: u64) -> u32 {
        self.read_mapping((offset / 4) as usize) as u32
    }

    pub fn write_reg(&mut self, offset: u64, value: u32) {
        self.write_mapping((offset / 4) as usize, value);
    }

    pub fn table(&self) -> &[u8; INTMATRIX_INPUTS] {
        &self.map
    }

    pub(crate) fn load_table(&mut self, table: &[u8]) {
        for (slot, line) in self.map.iter_mut().zip(table) {
            *slot = (*line as u32 & INTMATRIX_LINE_MASK) as u8;
        }
    }
}

impl IrqRouter for InterruptMatrix {
    fn signal(&self, source: usize, level: DigitalLevel) {
        match self.try_read_mapping(source) {
            Ok(line) => {
                tracing::trace!(
                    "intmatrix[{}]: source {} -> line {} = {:?}",
                    self.core,
                    source,
                    line,
                    level
                );
                self.outputs.set_irq_level(line, level);
            }
            Err(e) => tracing::warn!("intmatrix[{}]: signal ignored: {}", self.core, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::CoreIrqInputs;

    fn matrix() -> (InterruptMatrix, Arc<CoreIrqInputs>) {
        let inputs = Arc::new(CoreIrqInputs::new());
        (InterruptMatrix::new(0, inputs.clone()), inputs)
    }

    #[test]
    fn test_mapping_roundtrip_masks_to_five_bits() {
        let (mut m, _) = matrix();
        for source in 0..INTMATRIX_INPUTS {
            let value = 0xFFFF_FF00 | (source as u32 * 7);
            m.write_mapping(source, value);
            assert_eq!(m.read_mapping(source) as u32, value & 0x1F);
        }
    }

    #[test]
    fn test_default_mapping_is_zero() {
        let (m, _) = matrix();
        assert!(m.table().iter().all(|&line| line == 0));
    }

    #[test]
    fn test_out_of_range_source_is_ignored() {
        let (mut m, inputs) = matrix();
        m.write_mapping(INTMATRIX_INPUTS - 1, 9);

        m.write_mapping(INTMATRIX_INPUTS, 5);
        m.write_mapping(usize::MAX, 5);
        assert_eq!(m.read_mapping(INTMATRIX_INPUTS), 0);
        assert_eq!(m.read_mapping(INTMATRIX_INPUTS - 1), 9);
        assert_eq!(
            m.try_read_mapping(INTMATRIX_INPUTS),
            Err(FabricError::OutOfRangeSourceIndex(INTMATRIX_INPUTS))
        );
        assert!(m.table()[..INTMATRIX_INPUTS - 1].iter().all(|&l| l == 0));

        m.signal(INTMATRIX_INPUTS, DigitalLevel::High);
        assert_eq!(inputs.levels(), 0);
    }

    #[test]
    fn test_signal_follows_latest_mapping() {
        let (mut m, inputs) = matrix();
        m.write_mapping(10, 4);
        m.signal(10, DigitalLevel::High);
        assert!(inputs.is_high(4));

        m.write_mapping(10, 6);
        m.signal(10, DigitalLevel::High);
        assert!(inputs.is_high(6));
    }

    #[test]
    fn test_aliased_sources_last_writer_wins() {
        let (mut m, inputs) = matrix();
        m.write_mapping(1, 7);
        m.write_mapping(2, 7);

        m.signal(1, DigitalLevel::High);
        m.signal(2, DigitalLevel::Low);
        assert!(!inputs.is_high(7));

        m.signal(2, DigitalLevel::High);
        assert!(inputs.is_high(7));
    }

    #[test]
    fn test_register_view_indexes_by_word() {
        let (mut m, _) = matrix();
        m.write_reg(0x0C, 0x25);
        assert_eq!(m.read_mapping(3), 5);
        assert_eq!(m.read_reg(0x0C), 5);
        assert_eq!(m.read_reg(INTMATRIX_WINDOW_SIZE), 0);
    }
}
