// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use socfabric_config::{DescriptorError, SocDescriptor};

#[test]
fn test_full_descriptor_parses() {
    let yaml = r#"
schema_version: "1.0"
name: "esp32-dual"
cpu_count: 2
dport:
  base_address: 0x3FF00000
  size: "4KiB"
peripherals:
  - id: "rtc_cntl"
    type: "rtc_cntl"
    base_address: 0x3FF48000
    size: "4KiB"
  - id: "efuse"
    type: "stub"
    base_address: 0x3FF5A000
    irq: 40
"#;
    let desc = SocDescriptor::from_yaml(yaml).unwrap();
    assert_eq!(desc.name, "esp32-dual");
    assert_eq!(desc.cpu_count, 2);
    assert_eq!(desc.dport.base_address, 0x3FF0_0000);
    assert_eq!(desc.peripherals.len(), 2);
    assert_eq!(desc.peripherals[0].irq, None);
    assert_eq!(desc.peripherals[1].r#type, "stub");
    assert_eq!(desc.peripherals[1].size, None);
    assert_eq!(desc.peripherals[1].irq, Some(40));
}

#[test]
fn test_single_core_descriptor() {
    let desc = SocDescriptor::from_yaml("name: unicore\ncpu_count: 1\n").unwrap();
    assert_eq!(desc.cpu_count, 1);
}

#[test]
fn test_zero_cores_rejected() {
    let err = SocDescriptor::from_yaml("name: none\ncpu_count: 0\n").unwrap_err();
    assert_eq!(
        err.downcast_ref::<DescriptorError>(),
        Some(&DescriptorError::UnsupportedCpuCount(0))
    );
}

#[test]
fn test_duplicate_peripheral_rejected() {
    let yaml = r#"
name: "dup"
peripherals:
  - id: "rtc"
    type: "rtc_cntl"
    base_address: 0x3FF48000
  - id: "rtc"
    type: "rtc_cntl"
    base_address: 0x3FF49000
"#;
    let err = SocDescriptor::from_yaml(yaml).unwrap_err();
    assert_eq!(
        err.downcast_ref::<DescriptorError>(),
        Some(&DescriptorError::DuplicatePeripheral("rtc".to_string()))
    );
}

#[test]
fn test_peripheral_on_dport_base_rejected() {
    let yaml = r#"
name: "clash"
peripherals:
  - id: "shadow"
    type: "stub"
    base_address: 0x3FF00000
"#;
    assert!(SocDescriptor::from_yaml(yaml).is_err());
}
