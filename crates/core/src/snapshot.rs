// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::peripherals::crosscore::CrossCoreInterrupt;
use crate::peripherals::dport::{CacheControlState, CoreControlState};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct MachineSnapshot {
    pub peripherals: HashMap<String, serde_json::Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DportSnapshot {
    pub cpu_count: usize,
    /// One routing table per wired core.
    pub intmatrix: Vec<Vec<u8>>,
    pub crosscore: CrossCoreInterrupt,
    pub control: Vec<CoreControlState>,
    pub cache: Vec<CacheControlState>,
}
