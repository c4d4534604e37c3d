// SPDX-License-Identifier: MPL-2.0
//! SCSI side of the pass-through: the CDB that carries the ATA command and the sg driver call.

pub mod cdb;
pub mod sg;

pub use cdb::{AtaCdb, Protocol};
pub use sg::{Direction, SenseKey, SgConfig, SgDevice, SgIoError, SgTransport};
