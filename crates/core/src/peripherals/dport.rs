// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! ESP32 DPORT block: secondary-core lifecycle control, instruction-cache
//! control, the cross-core interrupt mailbox and both cores' interrupt
//! matrices behind one register window.

use crate::interrupt::IrqRouter;
use crate::peripherals::crosscore::{CrossCoreInterrupt, CROSSCORE_WINDOW_SIZE};
use crate::peripherals::intmatrix::{InterruptMatrix, INTMATRIX_WINDOW_SIZE};
use crate::signals::{DigitalLevel, IrqInputSink, LineSink};
use crate::snapshot::DportSnapshot;
use crate::{byte_lane, merge_byte, FabricError, Peripheral, SimResult, SimulationError, MAX_CPUS};
use std::any::Any;
use std::sync::Arc;

/// Register offsets inside the DPORT window.
pub mod regs {
    pub const APPCPU_RESET: u64 = 0x02C;
    pub const APPCPU_CLK: u64 = 0x030;
    pub const APPCPU_RUNSTALL: u64 = 0x034;
    pub const APPCPU_BOOT_ADDR: u64 = 0x038;
    pub const PRO_CACHE_CTRL: u64 = 0x040;
    pub const PRO_CACHE_CTRL1: u64 = 0x044;
    pub const APP_CACHE_CTRL: u64 = 0x058;
    pub const APP_CACHE_CTRL1: u64 = 0x05C;
    pub const CPU_INTR_FROM_CPU_0: u64 = 0x0DC;
    pub const PRO_INTMATRIX_BASE: u64 = 0x104;
    pub const APP_INTMATRIX_BASE: u64 = 0x218;
}

pub const DPORT_BASE: u64 = 0x3FF0_0000;
pub const DPORT_WINDOW_SIZE: u64 = 0x1000;

/// Core whose control block sits behind the `APPCPU_*` registers.
const APP_CPU: usize = 1;

bitflags::bitflags! {
    /// `PRO_CACHE_CTRL` / `APP_CACHE_CTRL`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CacheCtrl: u32 {
        const CACHE_ENA = 1 << 3;
        const CACHE_FLUSH_ENA = 1 << 4;
        const CACHE_FLUSH_DONE = 1 << 5;

        const _ = !0;
    }
}

/// Run-control state of one core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CoreControlState {
    pub reset_hold: bool,
    pub stall_hold: bool,
    pub clock_gate: bool,
    pub boot_address: u32,
}

impl CoreControlState {
    /// Secondary cores come out of reset held, unclocked and without a boot
    /// address.
    pub const SECONDARY_RESET: Self = Self {
        reset_hold: true,
        stall_hold: false,
        clock_gate: false,
        boot_address: 0,
    };

    /// The primary core is never held and always clocked.
    pub const PRIMARY: Self = Self {
        reset_hold: false,
        stall_hold: false,
        clock_gate: true,
        boot_address: 0,
    };

    pub fn initial(core: usize) -> Self {
        if core == 0 {
            Self::PRIMARY
        } else {
            Self::SECONDARY_RESET
        }
    }

    /// A core is stalled while runstall is held or its clock is gated off.
    pub fn stall_request(&self) -> bool {
        self.stall_hold || !self.clock_gate
    }
}

/// Instruction-cache control registers of one core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct CacheControlState {
    ctrl: u32,
    pub control1: u32,
}

impl CacheControlState {
    fn flags(&self) -> CacheCtrl {
        CacheCtrl::from_bits_retain(self.ctrl)
    }

    pub fn raw(&self) -> u32 {
        self.ctrl
    }

    pub fn enable(&self) -> bool {
        self.flags().contains(CacheCtrl::CACHE_ENA)
    }

    pub fn flush_enable(&self) -> bool {
        self.flags().contains(CacheCtrl::CACHE_FLUSH_ENA)
    }

    pub fn flush_done(&self) -> bool {
        self.flags().contains(CacheCtrl::CACHE_FLUSH_DONE)
    }

    /// `CACHE_FLUSH_DONE` is write-zero-to-clear and set by `CACHE_FLUSH_ENA`;
    /// every other bit is stored as written.
    fn write_ctrl(&mut self, value: u32) {
        let written = CacheCtrl::from_bits_retain(value);
        let mut next = written.difference(CacheCtrl::CACHE_FLUSH_DONE);
        let keep_done = self.flush_done() && written.contains(CacheCtrl::CACHE_FLUSH_DONE);
        if keep_done || written.contains(CacheCtrl::CACHE_FLUSH_ENA) {
            next.insert(CacheCtrl::CACHE_FLUSH_DONE);
        }
        self.ctrl = next.bits();
    }
}

/// Wiring of one core into the fabric, fixed at assembly time.
#[derive(Debug, Clone)]
pub struct CoreLinks {
    pub irq_inputs: Arc<dyn IrqInputSink>,
    pub stall_request: Arc<dyn LineSink>,
    pub reset_request: Arc<dyn LineSink>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DportReg {
    AppCpuReset,
    AppCpuClk,
    AppCpuRunstall,
    AppCpuBootAddr,
    CacheCtrl(usize),
    CacheCtrl1(usize),
    CrossCore(usize),
    IntMap { core: usize, offset: u64 },
    Unimplemented,
}

fn decode(offset: u64) -> Result<DportReg, FabricError> {
    use regs::*;

    if offset >= DPORT_WINDOW_SIZE {
        return Err(FabricError::OutOfRangeAddress(offset));
    }
    let reg = match offset {
        APPCPU_RESET => DportReg::AppCpuReset,
        APPCPU_CLK => DportReg::AppCpuClk,
        APPCPU_RUNSTALL => DportReg::AppCpuRunstall,
        APPCPU_BOOT_ADDR => DportReg::AppCpuBootAddr,
        PRO_CACHE_CTRL => DportReg::CacheCtrl(0),
        PRO_CACHE_CTRL1 => DportReg::CacheCtrl1(0),
        APP_CACHE_CTRL => DportReg::CacheCtrl(1),
        APP_CACHE_CTRL1 => DportReg::CacheCtrl1(1),
        o if (CPU_INTR_FROM_CPU_0..CPU_INTR_FROM_CPU_0 + CROSSCORE_WINDOW_SIZE).contains(&o) => {
            DportReg::CrossCore(((o - CPU_INTR_FROM_CPU_0) / 4) as usize)
        }
        o if (PRO_INTMATRIX_BASE..PRO_INTMATRIX_BASE + INTMATRIX_WINDOW_SIZE).contains(&o) => {
            DportReg::IntMap {
                core: 0,
                offset: o - PRO_INTMATRIX_BASE,
            }
        }
        o if (APP_INTMATRIX_BASE..APP_INTMATRIX_BASE + INTMATRIX_WINDOW_SIZE).contains(&o) => {
            DportReg::IntMap {
                core: 1,
                offset: o - APP_INTMATRIX_BASE,
            }
        }
        _ => DportReg::Unimplemented,
    };
    Ok(reg)
}

/// Lifecycle controller for the dual-core complex.
#[derive(Debug)]
pub struct Dport {
    cpu_count: usize,
    matrices: [Option<InterruptMatrix>; MAX_CPUS],
    crosscore: CrossCoreInterrupt,
    control: [CoreControlState; MAX_CPUS],
    cache: [CacheControlState; MAX_CPUS],
    stall_request: [Option<Arc<dyn LineSink>>; MAX_CPUS],
    reset_request: [Option<Arc<dyn LineSink>>; MAX_CPUS],
}

impl Dport {
    /// Builds the block for `links.len()` cores; the count is fixed for the
    /// lifetime of the device.
    pub fn new(links: Vec<CoreLinks>) -> Result<Self, FabricError> {
        let cpu_count = links.len();
        if cpu_count == 0 || cpu_count > MAX_CPUS {
            return Err(FabricError::InvalidCoreCount(cpu_count));
        }

        let mut dport = Self {
            cpu_count,
            matrices: Default::default(),
            crosscore: CrossCoreInterrupt::new(),
            control: std::array::from_fn(CoreControlState::initial),
            cache: Default::default(),
            stall_request: Default::default(),
            reset_request: Default::default(),
        };
        for (core, link) in links.into_iter().enumerate() {
            dport.matrices[core] = Some(InterruptMatrix::new(core, link.irq_inputs));
            dport.stall_request[core] = Some(link.stall_request);
            dport.reset_request[core] = Some(link.reset_request);
        }
        dport.drive_all_stall_requests();
        Ok(dport)
    }

    pub fn cpu_count(&self) -> usize {
        self.cpu_count
    }

    fn check_core(&self, core: usize) -> Result<(), FabricError> {
        if core < self.cpu_count {
            Ok(())
        } else {
            Err(FabricError::InvalidCore(core))
        }
    }

    fn check_secondary(&self, core: usize) -> Result<(), FabricError> {
        if core == 0 {
            return Err(FabricError::InvalidCore(core));
        }
        self.check_core(core)
    }

    fn drive_stall_request(&self, core: usize) {
        if let Some(line) = &self.stall_request[core] {
            let level = DigitalLevel::from(self.control[core].stall_request());
            tracing::debug!("dport: core {} stall request {:?}", core, level);
            line.set_level(level);
        }
    }

    fn drive_all_stall_requests(&self) {
        for core in 0..self.cpu_count {
            self.drive_stall_request(core);
        }
    }

    pub fn matrix(&self, core: usize) -> Option<&InterruptMatrix> {
        self.matrices.get(core).and_then(Option::as_ref)
    }

    pub fn matrix_mut(&mut self, core: usize) -> Option<&mut InterruptMatrix> {
        self.matrices.get_mut(core).and_then(Option::as_mut)
    }

    pub fn crosscore(&self) -> &CrossCoreInterrupt {
        &self.crosscore
    }

    pub fn control(&self, core: usize) -> Option<&CoreControlState> {
        self.check_core(core).ok().map(|_| &self.control[core])
    }

    pub fn cache(&self, core: usize) -> Option<&CacheControlState> {
        self.check_core(core).ok().map(|_| &self.cache[core])
    }

    // -- lifecycle -------------------------------------------------------

    pub fn try_write_reset_hold(&mut self, core: usize, hold: bool) -> Result<(), FabricError> {
        self.check_secondary(core)?;
        let released = self.control[core].reset_hold && !hold;
        self.control[core].reset_hold = hold;
        if released {
            tracing::debug!("dport: core {} released from reset", core);
            if let Some(line) = &self.reset_request[core] {
                line.pulse();
            }
        }
        Ok(())
    }

    /// Releasing a held core (1 -> 0) pulses its reset request once, before
    /// this call returns.
    pub fn write_reset_hold(&mut self, core: usize, hold: bool) {
        if let Err(e) = self.try_write_reset_hold(core, hold) {
            tracing::warn!("dport: reset hold write discarded: {}", e);
        }
    }

    pub fn try_write_stall_hold(&mut self, core: usize, hold: bool) -> Result<(), FabricError> {
        self.check_secondary(core)?;
        self.control[core].stall_hold = hold;
        self.drive_stall_request(core);
        Ok(())
    }

    pub fn write_stall_hold(&mut self, core: usize, hold: bool) {
        if let Err(e) = self.try_write_stall_hold(core, hold) {
            tracing::warn!("dport: runstall write discarded: {}", e);
        }
    }

    pub fn try_write_clock_gate(&mut self, core: usize, enabled: bool) -> Result<(), FabricError> {
        self.check_secondary(core)?;
        self.control[core].clock_gate = enabled;
        self.drive_stall_request(core);
        Ok(())
    }

    pub fn write_clock_gate(&mut self, core: usize, enabled: bool) {
        if let Err(e) = self.try_write_clock_gate(core, enabled) {
            tracing::warn!("dport: clock gate write discarded: {}", e);
        }
    }

    pub fn try_write_boot_address(&mut self, core: usize, addr: u32) -> Result<(), FabricError> {
        self.check_secondary(core)?;
        self.control[core].boot_address = addr;
        Ok(())
    }

    pub fn write_boot_address(&mut self, core: usize, addr: u32) {
        if let Err(e) = self.try_write_boot_address(core, addr) {
            tracing::warn!("dport: boot address write discarded: {}", e);
        }
    }

    /// Reset vector the core model fetches when `core` leaves reset.
    pub fn boot_address(&self, core: usize) -> u32 {
        self.control(core).map_or(0, |c| c.boot_address)
    }

    pub fn stall_request_output(&self, core: usize) -> bool {
        self.control(core).is_some_and(CoreControlState::stall_request)
    }

    pub fn write_cache_ctrl(&mut self, core: usize, value: u32) {
        if let Err(e) = self.check_core(core) {
            tracing::warn!("dport: cache ctrl write discarded: {}", e);
            return;
        }
        let cache = &mut self.cache[core];
        cache.write_ctrl(value);
        tracing::trace!("dport: core {} cache ctrl {:#x}", core, cache.raw());
    }

    pub fn write_cache_ctrl1(&mut self, core: usize, value: u32) {
        match self.check_core(core) {
            Ok(()) => self.cache[core].control1 = value,
            Err(e) => tracing::warn!("dport: cache ctrl1 write discarded: {}", e),
        }
    }

    // -- interrupt routing -----------------------------------------------

    /// Drive `source` on a single core's matrix.
    pub fn signal_core(&self, core: usize, source: usize, level: DigitalLevel) {
        match self.matrix(core) {
            Some(matrix) => matrix.signal(source, level),
            None => tracing::warn!(
                "dport: signal for source {} dropped: {}",
                source,
                FabricError::InvalidCore(core)
            ),
        }
    }

    /// Write a cross-core trigger register. Bit 0 is driven onto the pair's
    /// source on the target core, so writing 0 lowers a raised line.
    pub fn write_crosscore(&mut self, index: usize, value: u32) {
        let Some(trigger) = self.crosscore.write(index, value) else {
            return;
        };
        if trigger.target_core >= self.cpu_count {
            tracing::debug!(
                "dport: cross-core trigger {} targets unwired core {}",
                index,
                trigger.target_core
            );
            return;
        }
        tracing::debug!(
            "dport: cross-core trigger {} -> core {} source {} {:?}",
            index,
            trigger.target_core,
            trigger.source,
            trigger.level
        );
        self.signal_core(trigger.target_core, trigger.source, trigger.level);
    }

    // -- register window -------------------------------------------------

    pub fn read_reg(&self, offset: u64) -> u32 {
        let reg = match decode(offset) {
            Ok(reg) => reg,
            Err(e) => {
                tracing::warn!("dport: read returns 0: {}", e);
                return 0;
            }
        };
        let app = self.control(APP_CPU);
        match reg {
            DportReg::AppCpuReset => app.map_or(0, |c| c.reset_hold as u32),
            DportReg::AppCpuClk => app.map_or(0, |c| c.clock_gate as u32),
            DportReg::AppCpuRunstall => app.map_or(0, |c| c.stall_hold as u32),
            DportReg::AppCpuBootAddr => app.map_or(0, |c| c.boot_address),
            DportReg::CacheCtrl(core) => self.cache(core).map_or(0, CacheControlState::raw),
            DportReg::CacheCtrl1(core) => self.cache(core).map_or(0, |c| c.control1),
            DportReg::CrossCore(index) => self.crosscore.read(index),
            DportReg::IntMap { core, offset } => match self.matrix(core) {
                Some(matrix) => matrix.read_reg(offset),
                None => {
                    tracing::warn!(
                        "dport: intmatrix read returns 0: {}",
                        FabricError::InvalidCore(core)
                    );
                    0
                }
            },
            DportReg::Unimplemented => {
                tracing::trace!("dport: read of unimplemented register {:#x}", offset);
                0
            }
        }
    }

    pub fn write_reg(&mut self, offset: u64, value: u32) {
        let reg = match decode(offset) {
            Ok(reg) => reg,
            Err(e) => {
                tracing::warn!("dport: write discarded: {}", e);
                return;
            }
        };
        match reg {
            DportReg::AppCpuReset => self.write_reset_hold(APP_CPU, value & 1 != 0),
            DportReg::AppCpuClk => self.write_clock_gate(APP_CPU, value & 1 != 0),
            DportReg::AppCpuRunstall => self.write_stall_hold(APP_CPU, value & 1 != 0),
            DportReg::AppCpuBootAddr => self.write_boot_address(APP_CPU, value),
            DportReg::CacheCtrl(core) => self.write_cache_ctrl(core, value),
            DportReg::CacheCtrl1(core) => self.write_cache_ctrl1(core, value),
            DportReg::CrossCore(index) => self.write_crosscore(index, value),
            DportReg::IntMap { core, offset } => match self.matrix_mut(core) {
                Some(matrix) => matrix.write_reg(offset, value),
                None => tracing::warn!(
                    "dport: intmatrix write discarded: {}",
                    FabricError::InvalidCore(core)
                ),
            },
            DportReg::Unimplemented => {
                tracing::trace!(
                    "dport: write {:#x} to unimplemented register {:#x}",
                    value,
                    offset
                );
            }
        }
    }

    /// Return control, cache and mailbox state to power-on defaults. Routing
    /// tables keep whatever firmware programmed.
    pub fn reset_state(&mut self) {
        self.control = std::array::from_fn(CoreControlState::initial);
        self.cache = Default::default();
        self.crosscore.reset();
        self.drive_all_stall_requests();
    }

    pub fn to_snapshot(&self) -> DportSnapshot {
        DportSnapshot {
            cpu_count: self.cpu_count,
            intmatrix: self
                .matrices
                .iter()
                .flatten()
                .map(|m| m.table().to_vec())
                .collect(),
            crosscore: self.crosscore.clone(),
            control: self.control[..self.cpu_count].to_vec(),
            cache: self.cache[..self.cpu_count].to_vec(),
        }
    }

    /// Load saved state without emitting reset pulses; the stall request
    /// lines are re-driven from the restored fields.
    pub fn apply_snapshot(&mut self, snap: &DportSnapshot) -> SimResult<()> {
        if snap.cpu_count != self.cpu_count
            || snap.intmatrix.len() != self.cpu_count
            || snap.control.len() != self.cpu_count
        {
            return Err(SimulationError::SnapshotDecode(format!(
                "snapshot is for {} cores, device has {}",
                snap.cpu_count, self.cpu_count
            )));
        }
        for (core, table) in snap.intmatrix.iter().enumerate() {
            if let Some(matrix) = self.matrix_mut(core) {
                matrix.load_table(table);
            }
        }
        for (core, state) in snap.control.iter().enumerate() {
            // The primary core's run state is fixed.
            if core != 0 {
                self.control[core] = *state;
            }
        }
        for (slot, state) in self.cache.iter_mut().zip(&snap.cache) {
            *slot = *state;
        }
        self.crosscore = snap.crosscore.clone();
        self.drive_all_stall_requests();
        Ok(())
    }
}

impl IrqRouter for Dport {
    /// Peripheral sources feed every core's matrix; each core decides where
    /// (and whether) the source lands through its own table.
    fn signal(&self, source: usize, level: DigitalLevel) {
        for matrix in self.matrices.iter().flatten() {
            matrix.signal(source, level);
        }
    }
}

impl Peripheral for Dport {
    fn read(&self, offset: u64) -> SimResult<u8> {
        let (reg_offset, shift) = byte_lane(offset);
        Ok(((self.read_reg(reg_offset) >> shift) & 0xFF) as u8)
    }

    fn write(&mut self, offset: u64, value: u8) -> SimResult<()> {
        let (reg_offset, shift) = byte_lane(offset);
        let merged = merge_byte(self.read_reg(reg_offset), shift, value);
        // Only the lane holding bit 0 drives a cross-core trigger.
        if shift != 0 {
            if let Ok(DportReg::CrossCore(index)) = decode(reg_offset) {
                self.crosscore.latch(index, merged);
                return Ok(());
            }
        }
        self.write_reg(reg_offset, merged);
        Ok(())
    }

    fn read_u32(&self, offset: u64) -> SimResult<u32> {
        if offset % 4 != 0 {
            tracing::warn!("dport: unaligned word read at {:#x}", offset);
        }
        Ok(self.read_reg(offset & !3))
    }

    fn write_u32(&mut self, offset: u64, value: u32) -> SimResult<()> {
        if offset % 4 != 0 {
            tracing::warn!("dport: unaligned word write at {:#x}", offset);
        }
        self.write_reg(offset & !3, value);
        Ok(())
    }

    fn reset(&mut self) {
        self.reset_state();
    }

    fn as_any(&self) -> Option<&dyn Any> {
        Some(self)
    }
    fn as_any_mut(&mut self) -> Option<&mut dyn Any> {
        Some(self)
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self.to_snapshot()).unwrap_or(serde_json::Value::Null)
    }

    fn restore(&mut self, state: serde_json::Value) -> SimResult<()> {
        let snap: DportSnapshot = serde_json::from_value(state)
            .map_err(|e| SimulationError::SnapshotDecode(e.to_string()))?;
        self.apply_snapshot(&snap)
    }
}
