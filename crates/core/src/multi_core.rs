// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::bus::SystemBus;
use crate::peripherals::dport::{Dport, DPORT_BASE, DPORT_WINDOW_SIZE};
use crate::signals::DigitalLevel;
use crate::snapshot::MachineSnapshot;
use crate::system::dual_core::{configure_dual_core_at, CoreHandles};
use crate::SimResult;

/// What the core model should do with a core right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreRunState {
    HeldInReset,
    Stalled,
    Running,
}

/// A machine with up to two cores sharing one DPORT fabric.
///
/// This is the view a CPU model consumes: per-core interrupt input levels,
/// stall and reset request lines and the boot vector. Instruction execution
/// lives elsewhere.
pub struct MultiCoreMachine {
    pub bus: SystemBus,
    pub cores: Vec<CoreHandles>,
}

impl MultiCoreMachine {
    pub fn new(bus: SystemBus, cpu_count: usize) -> anyhow::Result<Self> {
        Self::with_dport_at(bus, cpu_count, DPORT_BASE, DPORT_WINDOW_SIZE)
    }

    pub fn with_dport_at(
        mut bus: SystemBus,
        cpu_count: usize,
        base: u64,
        size: u64,
    ) -> anyhow::Result<Self> {
        let cores = configure_dual_core_at(&mut bus, cpu_count, base, size)?;
        Ok(Self { bus, cores })
    }

    pub fn cpu_count(&self) -> usize {
        self.cores.len()
    }

    pub fn dport(&self) -> Option<&Dport> {
        self.bus.dport()
    }

    pub fn dport_mut(&mut self) -> Option<&mut Dport> {
        self.bus.dport_mut()
    }

    pub fn is_stalled(&self, core: usize) -> bool {
        self.cores
            .get(core)
            .is_some_and(|c| c.stall_request.get() == DigitalLevel::High)
    }

    pub fn is_held_in_reset(&self, core: usize) -> bool {
        self.dport()
            .and_then(|d| d.control(core))
            .is_some_and(|c| c.reset_hold)
    }

    pub fn run_state(&self, core: usize) -> CoreRunState {
        if self.is_held_in_reset(core) {
            CoreRunState::HeldInReset
        } else if self.is_stalled(core) {
            CoreRunState::Stalled
        } else {
            CoreRunState::Running
        }
    }

    /// Reset requests seen on `core` since assembly.
    pub fn reset_pulses(&self, core: usize) -> u64 {
        self.cores
            .get(core)
            .map_or(0, |c| c.reset_request.rising_edges())
    }

    pub fn boot_address(&self, core: usize) -> u32 {
        self.dport().map_or(0, |d| d.boot_address(core))
    }

    pub fn irq_levels(&self, core: usize) -> u32 {
        self.cores.get(core).map_or(0, |c| c.irq_inputs.levels())
    }

    /// Inject a peripheral interrupt level change into every core's matrix.
    pub fn signal(&self, source: usize, level: DigitalLevel) {
        self.bus.signal_irq_source(source, level);
    }

    pub fn read_u32(&self, addr: u64) -> SimResult<u32> {
        self.bus.read_u32(addr)
    }

    pub fn write_u32(&mut self, addr: u64, value: u32) -> SimResult<()> {
        self.bus.write_u32(addr, value)
    }

    /// Machine-wide reset. Routing tables survive; run control does not.
    pub fn reset(&mut self) {
        tracing::debug!("Resetting {}-core machine", self.cpu_count());
        self.bus.reset_peripherals();
    }

    pub fn snapshot(&self) -> MachineSnapshot {
        self.bus.snapshot()
    }

    pub fn apply_snapshot(&mut self, snapshot: &MachineSnapshot) -> SimResult<()> {
        self.bus.apply_snapshot(snapshot)
    }
}
