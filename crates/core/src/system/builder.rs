// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::bus::SystemBus;
use crate::multi_core::MultiCoreMachine;
use crate::MAX_CPUS;
use socfabric_config::{parse_size, SocDescriptor};
use std::path::Path;
use tracing::info;

/// Builds a machine from a given SoC descriptor path.
/// If no path is provided, returns the default dual-core machine with no
/// collaborator peripherals.
pub fn build_machine(soc_path: Option<&Path>) -> anyhow::Result<MultiCoreMachine> {
    let Some(path) = soc_path else {
        info!("Using default dual-core configuration");
        return MultiCoreMachine::new(SystemBus::new(), MAX_CPUS);
    };

    info!("Loading SoC descriptor: {:?}", path);
    let desc = SocDescriptor::from_file(path)?;
    build_machine_from_descriptor(&desc)
}

pub fn build_machine_from_descriptor(desc: &SocDescriptor) -> anyhow::Result<MultiCoreMachine> {
    let bus = SystemBus::from_config(desc)?;
    let size = parse_size(&desc.dport.size)?;
    MultiCoreMachine::with_dport_at(bus, desc.cpu_count, desc.dport.base_address, size)
}
