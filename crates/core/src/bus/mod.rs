// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::interrupt::IrqRouter;
use crate::peripherals::dport::Dport;
use crate::signals::DigitalLevel;
use crate::snapshot::MachineSnapshot;
use crate::{Peripheral, SimResult, SimulationError};
use socfabric_config::SocDescriptor;

pub struct PeripheralEntry {
    pub name: String,
    pub base: u64,
    pub size: u64,
    /// Interrupt matrix source index driven by this device.
    pub irq: Option<u32>,
    pub dev: Box<dyn Peripheral>,
    /// Last interrupt level forwarded for this device.
    pub irq_level: DigitalLevel,
}

impl PeripheralEntry {
    pub fn new(
        name: impl Into<String>,
        base: u64,
        size: u64,
        irq: Option<u32>,
        dev: Box<dyn Peripheral>,
    ) -> Self {
        Self {
            name: name.into(),
            base,
            size,
            irq,
            dev,
            irq_level: DigitalLevel::Low,
        }
    }

    fn contains(&self, addr: u64, len: u64) -> bool {
        addr.checked_sub(self.base)
            .and_then(|offset| offset.checked_add(len))
            .is_some_and(|end| end <= self.size)
    }
}

/// Register-access dispatcher: routes each access to the device owning the
/// address and forwards device interrupt level changes into the fabric.
#[derive(Default)]
pub struct SystemBus {
    pub peripherals: Vec<PeripheralEntry>,
}

impl SystemBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_peripheral(&mut self, entry: PeripheralEntry) {
        tracing::debug!(
            "Bus: mapping '{}' at {:#x}..{:#x}",
            entry.name,
            entry.base,
            entry.base.saturating_add(entry.size)
        );
        self.peripherals.push(entry);
    }

    pub fn from_config(desc: &SocDescriptor) -> anyhow::Result<Self> {
        let mut bus = Self::new();

        for p_cfg in &desc.peripherals {
            let dev: Box<dyn Peripheral> = match p_cfg.r#type.as_str() {
                "rtc_cntl" => Box::new(crate::peripherals::rtc_cntl::RtcCntl::new()),
                "stub" => {
                    let value = p_cfg
                        .config
                        .get("value")
                        .and_then(|v| v.as_u64())
                        .unwrap_or(0) as u32;
                    Box::new(crate::peripherals::stub::StubPeripheral::new(value))
                }
                other => {
                    tracing::warn!(
                        "Unsupported peripheral type '{}' for id '{}'; skipping",
                        other,
                        p_cfg.id
                    );
                    continue;
                }
            };

            let size = p_cfg.window_size()?;

            bus.add_peripheral(PeripheralEntry::new(
                p_cfg.id.clone(),
                p_cfg.base_address,
                size,
                p_cfg.irq,
                dev,
            ));
        }

        Ok(bus)
    }

    fn find(&self, addr: u64, len: u64) -> Option<usize> {
        self.peripherals.iter().position(|p| p.contains(addr, len))
    }

    pub fn peripheral(&self, name: &str) -> Option<&PeripheralEntry> {
        self.peripherals.iter().find(|p| p.name == name)
    }

    pub fn dport(&self) -> Option<&Dport> {
        self.peripherals
            .iter()
            .find_map(|p| p.dev.as_any().and_then(|a| a.downcast_ref::<Dport>()))
    }

    pub fn dport_mut(&mut self) -> Option<&mut Dport> {
        self.peripherals
            .iter_mut()
            .find_map(|p| p.dev.as_any_mut().and_then(|a| a.downcast_mut::<Dport>()))
    }

    /// Entry point for interrupt sources living outside the bus. The level is
    /// on every wired core's input array when this returns.
    pub fn signal_irq_source(&self, source: usize, level: DigitalLevel) {
        match self.dport() {
            Some(dport) => dport.signal(source, level),
            None => tracing::warn!(
                "Bus: no interrupt matrix mapped; source {} dropped",
                source
            ),
        }
    }

    /// Forward a device's interrupt output if it moved since the last access.
    fn sync_irq(&mut self, index: usize) {
        let entry = &mut self.peripherals[index];
        let (Some(source), Some(level)) = (entry.irq, entry.dev.irq_level()) else {
            return;
        };
        if level == entry.irq_level {
            return;
        }
        entry.irq_level = level;
        tracing::trace!("Bus: '{}' irq {:?} on source {}", entry.name, level, source);
        self.signal_irq_source(source as usize, level);
    }

    pub fn read_u32(&self, addr: u64) -> SimResult<u32> {
        if let Some(index) = self.find(addr, 4) {
            let p = &self.peripherals[index];
            return p.dev.read_u32(addr - p.base);
        }
        crate::Bus::read_u32(self, addr)
    }

    pub fn write_u32(&mut self, addr: u64, value: u32) -> SimResult<()> {
        if let Some(index) = self.find(addr, 4) {
            let p = &mut self.peripherals[index];
            p.dev.write_u32(addr - p.base, value)?;
            self.sync_irq(index);
            return Ok(());
        }
        crate::Bus::write_u32(self, addr, value)
    }

    /// Machine-wide reset of every mapped device.
    pub fn reset_peripherals(&mut self) {
        for p in &mut self.peripherals {
            p.dev.reset();
        }
        for index in 0..self.peripherals.len() {
            self.sync_irq(index);
        }
    }

    pub fn snapshot(&self) -> MachineSnapshot {
        MachineSnapshot {
            peripherals: self
                .peripherals
                .iter()
                .map(|p| (p.name.clone(), p.dev.snapshot()))
                .collect(),
        }
    }

    pub fn apply_snapshot(&mut self, snapshot: &MachineSnapshot) -> SimResult<()> {
        for p in &mut self.peripherals {
            if let Some(state) = snapshot.peripherals.get(&p.name) {
                p.dev.restore(state.clone())?;
            }
        }
        Ok(())
    }
}

impl crate::Bus for SystemBus {
    fn read_u8(&self, addr: u64) -> SimResult<u8> {
        match self.find(addr, 1) {
            Some(index) => {
                let p = &self.peripherals[index];
                p.dev.read(addr - p.base)
            }
            None => Err(SimulationError::MemoryViolation(addr)),
        }
    }

    fn write_u8(&mut self, addr: u64, value: u8) -> SimResult<()> {
        let index = self
            .find(addr, 1)
            .ok_or(SimulationError::MemoryViolation(addr))?;
        let p = &mut self.peripherals[index];
        p.dev.write(addr - p.base, value)?;
        self.sync_irq(index);
        Ok(())
    }
}
