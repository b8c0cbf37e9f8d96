// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Default schema version for YAML configs
fn default_schema_version() -> String {
    "1.0".to_string()
}

fn default_cpu_count() -> usize {
    2
}

fn default_dport_base() -> u64 {
    0x3FF0_0000
}

fn default_dport_size() -> String {
    "4KiB".to_string()
}

/// Largest core count the DPORT fabric can be wired for.
pub const MAX_SUPPORTED_CPUS: usize = 2;

/// Window size assumed for a peripheral that declares no `size`.
pub const DEFAULT_PERIPHERAL_SIZE: u64 = 0x1000;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("cpu_count {0} is outside the supported range 1..={max}", max = MAX_SUPPORTED_CPUS)]
    UnsupportedCpuCount(usize),
    #[error("peripheral '{0}' is declared more than once")]
    DuplicatePeripheral(String),
    #[error("peripheral '{id}' at {base:#x} overlaps the DPORT window")]
    OverlapsDport { id: String, base: u64 },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct DportDescriptor {
    #[serde(default = "default_dport_base")]
    pub base_address: u64,
    #[serde(default = "default_dport_size")]
    pub size: String, // e.g. "4KiB"
}

impl Default for DportDescriptor {
    fn default() -> Self {
        Self {
            base_address: default_dport_base(),
            size: default_dport_size(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PeripheralConfig {
    pub id: String,
    pub r#type: String, // "rtc_cntl", "stub", ...
    pub base_address: u64,
    #[serde(default)]
    pub size: Option<String>,
    /// Interrupt matrix source index driven by this peripheral.
    #[serde(default)]
    pub irq: Option<u32>,
    #[serde(default)]
    pub config: HashMap<String, serde_yaml::Value>,
}

impl PeripheralConfig {
    /// Declared window size, or [`DEFAULT_PERIPHERAL_SIZE`].
    pub fn window_size(&self) -> Result<u64> {
        match &self.size {
            Some(size) => parse_size(size)
                .with_context(|| format!("Invalid size for peripheral '{}'", self.id)),
            None => Ok(DEFAULT_PERIPHERAL_SIZE),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SocDescriptor {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub name: String,
    #[serde(default = "default_cpu_count")]
    pub cpu_count: usize,
    #[serde(default)]
    pub dport: DportDescriptor,
    #[serde(default)]
    pub peripherals: Vec<PeripheralConfig>,
}

impl SocDescriptor {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read SoC descriptor {:?}", path))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let desc: Self = serde_yaml::from_str(yaml).context("Failed to parse SoC Descriptor YAML")?;
        if desc.schema_version != default_schema_version() {
            tracing::warn!(
                "SoC descriptor '{}' uses schema version {}; expected {}",
                desc.name,
                desc.schema_version,
                default_schema_version()
            );
        }
        desc.validate()?;
        Ok(desc)
    }

    /// Checks the invariants the machine assembly relies on.
    pub fn validate(&self) -> Result<()> {
        if self.cpu_count == 0 || self.cpu_count > MAX_SUPPORTED_CPUS {
            return Err(DescriptorError::UnsupportedCpuCount(self.cpu_count).into());
        }

        let dport_start = self.dport.base_address;
        let dport_end = dport_start.saturating_add(
            parse_size(&self.dport.size).context("Invalid DPORT window size")?,
        );

        let mut seen = std::collections::HashSet::new();
        for p in &self.peripherals {
            if !seen.insert(p.id.as_str()) {
                return Err(DescriptorError::DuplicatePeripheral(p.id.clone()).into());
            }
            let size = p.window_size()?;
            let end = p.base_address.saturating_add(size);
            if p.base_address < dport_end && dport_start < end {
                return Err(DescriptorError::OverlapsDport {
                    id: p.id.clone(),
                    base: p.base_address,
                }
                .into());
            }
        }
        Ok(())
    }
}

pub fn parse_size(size_str: &str) -> Result<u64> {
    use human_size::{Byte, Size, SpecificSize};
    let s: Size = size_str
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid size format: {}", e))?;
    let bytes: SpecificSize<Byte> = s.into();
    Ok(bytes.value() as u64)
}
