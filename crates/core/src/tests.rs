// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

#[cfg(test)]
mod integration_tests {
    use crate::bus::{PeripheralEntry, SystemBus};
    use crate::multi_core::{CoreRunState, MultiCoreMachine};
    use crate::peripherals::crosscore::{CrossCoreInterrupt, FROM_CPU_SOURCE_BASE};
    use crate::peripherals::dport::{regs, CoreLinks, Dport, DPORT_BASE};
    use crate::peripherals::intmatrix::INTMATRIX_INPUTS;
    use crate::peripherals::rtc_cntl::RtcCntl;
    use crate::signals::{DigitalLevel, IrqInputSink, SignalLine};
    use crate::{Bus, Peripheral, SimResult};
    use std::sync::{Arc, Mutex};

    const RECORDER_BASE: u64 = 0x3FF6_0000;
    const RECORDER_SOURCE: u32 = 14;

    /// Collaborator with a single status bit wired to its interrupt output.
    #[derive(Debug, Default)]
    struct StatusPeripheral {
        status: u32,
    }

    impl Peripheral for StatusPeripheral {
        fn read(&self, offset: u64) -> SimResult<u8> {
            Ok(if offset == 0 { self.status as u8 } else { 0 })
        }

        fn write(&mut self, offset: u64, value: u8) -> SimResult<()> {
            if offset == 0 {
                self.status = (value & 1) as u32;
            }
            Ok(())
        }

        fn irq_level(&self) -> Option<DigitalLevel> {
            Some((self.status & 1 != 0).into())
        }

        fn reset(&mut self) {
            self.status = 0;
        }
    }

    #[derive(Debug, Default)]
    struct RecordingInputs {
        calls: Mutex<Vec<(u8, DigitalLevel)>>,
    }

    impl IrqInputSink for RecordingInputs {
        fn set_irq_level(&self, line: u8, level: DigitalLevel) {
            self.calls.lock().unwrap().push((line, level));
        }
    }

    fn machine_with_status_device() -> MultiCoreMachine {
        let mut bus = SystemBus::new();
        bus.add_peripheral(PeripheralEntry::new(
            "status",
            RECORDER_BASE,
            0x100,
            Some(RECORDER_SOURCE),
            Box::new(StatusPeripheral::default()),
        ));
        MultiCoreMachine::new(bus, 2).unwrap()
    }

    fn intmap(core: usize, source: usize) -> u64 {
        let base = if core == 0 {
            regs::PRO_INTMATRIX_BASE
        } else {
            regs::APP_INTMATRIX_BASE
        };
        DPORT_BASE + base + 4 * source as u64
    }

    #[test]
    fn test_peripheral_status_reaches_both_cores() {
        let mut machine = machine_with_status_device();
        machine.write_u32(intmap(0, RECORDER_SOURCE as usize), 6).unwrap();
        machine.write_u32(intmap(1, RECORDER_SOURCE as usize), 19).unwrap();

        machine.bus.write_u8(RECORDER_BASE, 1).unwrap();
        assert_eq!(machine.irq_levels(0), 1 << 6);
        assert_eq!(machine.irq_levels(1), 1 << 19);

        machine.bus.write_u8(RECORDER_BASE, 0).unwrap();
        assert_eq!(machine.irq_levels(0), 0);
        assert_eq!(machine.irq_levels(1), 0);
    }

    #[test]
    fn test_unchanged_level_is_not_resignalled() {
        let mut machine = machine_with_status_device();
        machine.write_u32(intmap(0, RECORDER_SOURCE as usize), 2).unwrap();
        machine.bus.write_u8(RECORDER_BASE, 1).unwrap();

        // Another source aliased onto line 2 drops it; the device writing the
        // same status again must not raise it back.
        machine.write_u32(intmap(0, 30), 2).unwrap();
        machine.signal(30, DigitalLevel::Low);
        machine.bus.write_u8(RECORDER_BASE, 1).unwrap();
        assert_eq!(machine.irq_levels(0), 0);
    }

    #[test]
    fn test_aliased_sources_last_writer_wins() {
        let mut machine = machine_with_status_device();
        machine.write_u32(intmap(1, 3), 9).unwrap();
        machine.write_u32(intmap(1, 4), 9).unwrap();

        machine.signal(3, DigitalLevel::High);
        machine.signal(4, DigitalLevel::Low);
        assert_eq!(machine.irq_levels(1) & (1 << 9), 0);
    }

    #[test]
    fn test_routing_change_applies_to_next_signal() {
        let mut machine = machine_with_status_device();
        machine.write_u32(intmap(0, 40), 1).unwrap();
        machine.signal(40, DigitalLevel::High);
        machine.write_u32(intmap(0, 40), 2).unwrap();
        machine.signal(40, DigitalLevel::High);
        assert_eq!(machine.irq_levels(0), (1 << 1) | (1 << 2));
    }

    #[test]
    fn test_crosscore_trigger_signals_target_once() {
        let pro = Arc::new(RecordingInputs::default());
        let app = Arc::new(RecordingInputs::default());
        let links = vec![
            CoreLinks {
                irq_inputs: pro.clone(),
                stall_request: Arc::new(SignalLine::new()),
                reset_request: Arc::new(SignalLine::new()),
            },
            CoreLinks {
                irq_inputs: app.clone(),
                stall_request: Arc::new(SignalLine::new()),
                reset_request: Arc::new(SignalLine::new()),
            },
        ];
        let mut dport = Dport::new(links).unwrap();
        let idx = CrossCoreInterrupt::index_of(0, 1).unwrap();
        let source = FROM_CPU_SOURCE_BASE + idx;
        dport.matrix_mut(1).unwrap().write_mapping(source, 22);

        dport
            .write_u32(regs::CPU_INTR_FROM_CPU_0 + 4 * idx as u64, 1)
            .unwrap();

        assert_eq!(*app.calls.lock().unwrap(), vec![(22, DigitalLevel::High)]);
        assert!(pro.calls.lock().unwrap().is_empty());
        assert_eq!(
            dport
                .read_u32(regs::CPU_INTR_FROM_CPU_0 + 4 * idx as u64)
                .unwrap(),
            1
        );

        dport
            .write_u32(regs::CPU_INTR_FROM_CPU_0 + 4 * idx as u64, 0)
            .unwrap();
        assert_eq!(
            *app.calls.lock().unwrap(),
            vec![(22, DigitalLevel::High), (22, DigitalLevel::Low)]
        );
        assert!(pro.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_write_past_app_table_leaves_routing_alone() {
        let mut machine = machine_with_status_device();
        machine.write_u32(intmap(1, INTMATRIX_INPUTS - 1), 7).unwrap();
        machine.write_u32(intmap(1, INTMATRIX_INPUTS), 0x1F).unwrap();
        assert_eq!(machine.read_u32(intmap(1, INTMATRIX_INPUTS - 1)).unwrap(), 7);
        assert_eq!(machine.read_u32(intmap(1, INTMATRIX_INPUTS)).unwrap(), 0);
    }

    #[test]
    fn test_bus_snapshot_roundtrip() {
        let mut bus = SystemBus::new();
        bus.add_peripheral(PeripheralEntry::new(
            "rtc_cntl",
            0x3FF4_8000,
            0x140,
            None,
            Box::new(RtcCntl::new()),
        ));
        let mut machine = MultiCoreMachine::new(bus, 2).unwrap();
        machine.write_u32(0x3FF4_804C, 0x1234).unwrap();
        machine.write_u32(intmap(1, 2), 5).unwrap();
        machine
            .write_u32(DPORT_BASE + regs::APPCPU_BOOT_ADDR, 0x4008_0400)
            .unwrap();
        let snap = machine.snapshot();

        let mut bus = SystemBus::new();
        bus.add_peripheral(PeripheralEntry::new(
            "rtc_cntl",
            0x3FF4_8000,
            0x140,
            None,
            Box::new(RtcCntl::new()),
        ));
        let mut restored = MultiCoreMachine::new(bus, 2).unwrap();
        restored.apply_snapshot(&snap).unwrap();

        assert_eq!(restored.read_u32(0x3FF4_804C).unwrap(), 0x1234);
        assert_eq!(restored.read_u32(intmap(1, 2)).unwrap(), 5);
        assert_eq!(restored.boot_address(1), 0x4008_0400);
        assert_eq!(restored.run_state(1), CoreRunState::HeldInReset);
    }

    #[test]
    fn test_machine_reset_drops_peripheral_irq() {
        let mut machine = machine_with_status_device();
        machine.write_u32(intmap(0, RECORDER_SOURCE as usize), 4).unwrap();
        machine.bus.write_u8(RECORDER_BASE, 1).unwrap();
        assert_eq!(machine.irq_levels(0), 1 << 4);

        machine.reset();
        // Routing survives reset and carries the device's new low level.
        assert_eq!(machine.irq_levels(0), 0);
        assert_eq!(machine.read_u32(intmap(0, RECORDER_SOURCE as usize)).unwrap(), 4);
    }
}
