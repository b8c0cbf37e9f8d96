// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::bus::{PeripheralEntry, SystemBus};
use crate::peripherals::dport::{CoreLinks, Dport, DPORT_BASE, DPORT_WINDOW_SIZE};
use crate::signals::{CoreIrqInputs, SignalLine};
use crate::MAX_CPUS;
use anyhow::Context;
use std::sync::Arc;

/// The core-model side of one core's wiring: what the fabric drives and the
/// core samples.
#[derive(Debug, Clone, Default)]
pub struct CoreHandles {
    pub irq_inputs: Arc<CoreIrqInputs>,
    pub stall_request: Arc<SignalLine>,
    pub reset_request: Arc<SignalLine>,
}

impl CoreHandles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn links(&self) -> CoreLinks {
        CoreLinks {
            irq_inputs: self.irq_inputs.clone(),
            stall_request: self.stall_request.clone(),
            reset_request: self.reset_request.clone(),
        }
    }
}

pub fn configure_dual_core(bus: &mut SystemBus, cpu_count: usize) -> anyhow::Result<Vec<CoreHandles>> {
    configure_dual_core_at(bus, cpu_count, DPORT_BASE, DPORT_WINDOW_SIZE)
}

/// Wire `cpu_count` cores into a fresh DPORT block mapped at `base`.
///
/// The wiring is fixed from here on; an existing `dport` mapping is replaced.
pub fn configure_dual_core_at(
    bus: &mut SystemBus,
    cpu_count: usize,
    base: u64,
    size: u64,
) -> anyhow::Result<Vec<CoreHandles>> {
    if cpu_count == 0 || cpu_count > MAX_CPUS {
        anyhow::bail!("cannot wire {} cores; supported range is 1..={}", cpu_count, MAX_CPUS);
    }
    if size < DPORT_WINDOW_SIZE {
        tracing::warn!(
            "DPORT window of {:#x} bytes hides registers past that offset",
            size
        );
    }

    let cores: Vec<CoreHandles> = (0..cpu_count).map(|_| CoreHandles::new()).collect();
    let dport = Dport::new(cores.iter().map(CoreHandles::links).collect())
        .context("Failed to assemble DPORT")?;

    if let Some(p) = bus
        .peripherals
        .iter_mut()
        .find(|p| p.name == "dport" || p.base == base)
    {
        p.name = "dport".to_string();
        p.base = base;
        p.size = size;
        p.irq = None;
        p.dev = Box::new(dport);
    } else {
        bus.add_peripheral(PeripheralEntry::new(
            "dport",
            base,
            size,
            None,
            Box::new(dport),
        ));
    }

    tracing::info!("Wired {} core(s) into DPORT at {:#x}", cpu_count, base);
    Ok(cores)
}
