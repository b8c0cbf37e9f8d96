// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

/// Number of external interrupt inputs on one core.
pub const CPU_IRQ_LINES: usize = 32;

/// Represents a digital signal level.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize,
)]
pub enum DigitalLevel {
    #[default]
    Low,
    High,
}

impl From<bool> for DigitalLevel {
    fn from(b: bool) -> Self {
        if b {
            DigitalLevel::High
        } else {
            DigitalLevel::Low
        }
    }
}

impl From<DigitalLevel> for bool {
    fn from(level: DigitalLevel) -> Self {
        match level {
            DigitalLevel::High => true,
            DigitalLevel::Low => false,
        }
    }
}

/// A core's external interrupt input array, as seen from the routing fabric.
///
/// Handed to the interrupt matrix once at assembly time. The matrix only
/// drives levels; latching and acknowledgement belong to the core model.
pub trait IrqInputSink: Debug + Send + Sync {
    fn set_irq_level(&self, line: u8, level: DigitalLevel);
}

/// A single output wire into the core model (stall request, reset request).
pub trait LineSink: Debug + Send + Sync {
    fn set_level(&self, level: DigitalLevel);

    /// Raise and immediately drop the line.
    fn pulse(&self) {
        self.set_level(DigitalLevel::High);
        self.set_level(DigitalLevel::Low);
    }
}

/// Level bitmap backing a core's external interrupt inputs.
#[derive(Debug, Default)]
pub struct CoreIrqInputs {
    levels: AtomicU32,
}

impl CoreIrqInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn levels(&self) -> u32 {
        self.levels.load(Ordering::SeqCst)
    }

    pub fn is_high(&self, line: u8) -> bool {
        (line as usize) < CPU_IRQ_LINES && self.levels() & (1 << line) != 0
    }

    /// Pending lines, lowest first.
    pub fn high_lines(&self) -> Vec<u8> {
        let levels = self.levels();
        (0..CPU_IRQ_LINES as u8)
            .filter(|line| levels & (1 << line) != 0)
            .collect()
    }
}

impl IrqInputSink for CoreIrqInputs {
    fn set_irq_level(&self, line: u8, level: DigitalLevel) {
        if line as usize >= CPU_IRQ_LINES {
            tracing::warn!("IRQ input {} does not exist on this core", line);
            return;
        }
        match level {
            DigitalLevel::High => self.levels.fetch_or(1 << line, Ordering::SeqCst),
            DigitalLevel::Low => self.levels.fetch_and(!(1 << line), Ordering::SeqCst),
        };
    }
}

/// A level-carrying wire that also counts rising edges, so a consumer polling
/// after the fact can still see pulses.
#[derive(Debug, Default)]
pub struct SignalLine {
    level: AtomicBool,
    rising_edges: AtomicU64,
}

impl SignalLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> DigitalLevel {
        self.level.load(Ordering::SeqCst).into()
    }

    pub fn rising_edges(&self) -> u64 {
        self.rising_edges.load(Ordering::SeqCst)
    }
}

impl LineSink for SignalLine {
    fn set_level(&self, level: DigitalLevel) {
        let was_high = self.level.swap(level.into(), Ordering::SeqCst);
        if !was_high && level == DigitalLevel::High {
            self.rising_edges.fetch_add(1, Ordering::SeqCst);
        }
    }
}
