// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::signals::DigitalLevel;
use crate::{FabricError, MAX_CPUS};

/// Number of `CPU_INTR_FROM_CPU_n` trigger registers.
pub const CROSSCORE_INT_COUNT: usize = 4;

/// Matrix source index of `FROM_CPU_INTR0`; the others follow contiguously.
pub const FROM_CPU_SOURCE_BASE: usize = 24;

pub const CROSSCORE_WINDOW_SIZE: u64 = (CROSSCORE_INT_COUNT * 4) as u64;

/// The ordered core pair a trigger register belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossCorePair {
    pub source_core: usize,
    pub target_core: usize,
}

/// What a trigger write asks the owning block to do: drive `source` on the
/// target core's matrix to `level` (bit 0 of the written value).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossCoreTrigger {
    pub target_core: usize,
    pub source: usize,
    pub level: DigitalLevel,
}

/// Software interrupt mailbox between cores.
///
/// Holds only the written values; raising the line is done by whoever owns
/// the target matrix, and the consumer clears the condition itself.
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrossCoreInterrupt {
    latches: [u32; CROSSCORE_INT_COUNT],
}

impl CrossCoreInterrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `index` serves `(index / MAX_CPUS, index % MAX_CPUS)`.
    pub fn pair(index: usize) -> Option<CrossCorePair> {
        (index < CROSSCORE_INT_COUNT).then(|| CrossCorePair {
            source_core: index / MAX_CPUS,
            target_core: index % MAX_CPUS,
        })
    }

    /// Inverse of [`CrossCoreInterrupt::pair`].
    pub fn index_of(source_core: usize, target_core: usize) -> Option<usize> {
        if source_core >= MAX_CPUS || target_core >= MAX_CPUS {
            return None;
        }
        Some(source_core * MAX_CPUS + target_core)
    }

    pub fn source_for(index: usize) -> usize {
        FROM_CPU_SOURCE_BASE + index
    }

    pub fn try_write(&mut self, index: usize, value: u32) -> Result<CrossCoreTrigger, FabricError> {
        let pair = Self::pair(index).ok_or(FabricError::OutOfRangeAddress(index as u64 * 4))?;
        self.latches[index] = value;
        Ok(CrossCoreTrigger {
            target_core: pair.target_core,
            source: Self::source_for(index),
            level: DigitalLevel::from(value & 1 != 0),
        })
    }

    /// Store `value` without producing a trigger. Used for sub-word stores
    /// that do not cover bit 0.
    pub fn latch(&mut self, index: usize, value: u32) {
        match self.latches.get_mut(index) {
            Some(slot) => *slot = value,
            None => tracing::warn!(
                "crosscore: latch discarded: {}",
                FabricError::OutOfRangeAddress(index as u64 * 4)
            ),
        }
    }

    pub fn try_read(&self, index: usize) -> Result<u32, FabricError> {
        self.latches
            .get(index)
            .copied()
            .ok_or(FabricError::OutOfRangeAddress(index as u64 * 4))
    }

    /// Latch `value`; returns the level to drive on the target's source.
    /// Writing 0 is how the target's handler drops the line again.
    pub fn write(&mut self, index: usize, value: u32) -> Option<CrossCoreTrigger> {
        self.try_write(index, value)
            .map_err(|e| tracing::warn!("crosscore: write discarded: {}", e))
            .ok()
    }

    /// Last written value.
    pub fn read(&self, index: usize) -> u32 {
        self.try_read(index).unwrap_or_else(|e| {
            tracing::warn!("crosscore: read returns 0: {}", e);
            0
        })
    }

    pub fn reset(&mut self) {
        self.latches = [0; CROSSCORE_INT_COUNT];
    }
}
