// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::signals::DigitalLevel;
use std::fmt::Debug;

/// Anything that accepts peripheral interrupt level changes by source index.
///
/// Implemented by a single core's interrupt matrix and by the DPORT block,
/// which fans a source out to every wired core. Peripheral models reach it
/// through the bus whenever their own interrupt status changes.
pub trait IrqRouter: Debug {
    fn signal(&self, source: usize, level: DigitalLevel);
}
