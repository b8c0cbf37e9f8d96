// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod crosscore;
pub mod dport;
pub mod intmatrix;
pub mod rtc_cntl;
pub mod stub;
