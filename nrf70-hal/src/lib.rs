#![cfg_attr(not(test), no_std)]
#![doc = include_str!("../README.md")]

extern crate alloc;

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod error;
pub mod processor;
pub mod memory_map;
pub mod bus;
pub mod power;
pub mod hal;
pub mod patch;
pub mod boot;
pub mod config;
#[cfg(feature = "spi")]
pub mod spi;

#[cfg(test)]
mod mock;

// Reexports
pub use error::Error;
pub use processor::Processor;
pub use bus::Bus;
pub use memory_map::{AddressMap, Nrf70AddressMap};
pub use power::{AlwaysOn, PowerPolicy, PowerSave, PsLock, Wake};
pub use hal::{Hal, Target};
pub use patch::{PatchKind, StagingAllocator, MAX_PATCH_CHUNK_SIZE};
pub use config::{FirmwareBundle, FirmwareConfig, PatchPair};
