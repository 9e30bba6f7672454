//! HAL error type.
//!
//! Every operation in this crate reports the first failure it hits, unchanged
//! in kind. Nothing is retried internally; a multi-chunk or multi-vector
//! operation that fails partway reports a single error with no indication of
//! how far it got.

use core::fmt;

use crate::patch::PatchKind;
use crate::processor::Processor;

/// RPU access / firmware load error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// Address is not in RPU register space (SYSBUS / PBUS).
    InvalidAddress {
        /// RPU address that was rejected.
        addr: u32,
    },

    /// The address map has no bus offset for this address in this processor context.
    TranslationFailure {
        /// RPU address that could not be translated.
        addr: u32,
        /// Processor context used for the lookup.
        processor: Processor,
    },

    /// A register read returned `0xFFFF_FFFF`, or the transport failed on read.
    BusFault {
        /// RPU address that was read.
        addr: u32,
    },

    /// Staging buffer for a patch chunk could not be allocated.
    AllocationFailure {
        /// Requested buffer size (bytes).
        size_bytes: usize,
    },

    /// A memory (block) write to the RPU failed.
    WriteFailure {
        /// Destination RPU address of the failed write.
        addr: u32,
    },

    /// One of the two patch images of a processor is missing or empty.
    MissingPatch {
        /// Processor the patches were meant for.
        processor: Processor,
        /// Which of the two images is missing.
        kind: PatchKind,
    },

    /// Raw processor id outside {LMAC, UMAC}.
    InvalidProcessor {
        /// Raw id that was rejected.
        raw: u32,
    },

    /// The wake handshake did not see the RPU come out of sleep.
    WakeTimeout,

    /// The bus transport reported an error on a register write or memory read.
    Transport {
        /// RPU address of the access.
        addr: u32,
    },

    /// Firmware bundle does not start with the bundle signature.
    InvalidSignature {
        /// Signature found in the header.
        actual: u32,
        /// Expected signature.
        expected: u32,
    },

    /// Firmware bundle does not carry exactly one image per slot.
    InvalidImageCount {
        /// Image count found in the header.
        count: u32,
    },

    /// Firmware bundle image type outside the four known slots.
    UnknownImage {
        /// Raw image type.
        id: u32,
    },

    /// Firmware bundle carries the same image type twice.
    DuplicateImage {
        /// Raw image type.
        id: u32,
    },

    /// Firmware bundle ends before a header or image it declares.
    BundleTruncated {
        /// Byte offset of the field or image that runs past the end.
        offset: usize,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::InvalidAddress { addr } => write!(f, "not a register address: 0x{:08X}", addr),
            Error::TranslationFailure { addr, processor } => {
                write!(f, "no bus mapping for 0x{:08X} in {} context", addr, processor)
            }
            Error::BusFault { addr } => write!(f, "bus fault reading 0x{:08X}", addr),
            Error::AllocationFailure { size_bytes } => {
                write!(f, "staging buffer allocation failed ({} bytes)", size_bytes)
            }
            Error::WriteFailure { addr } => write!(f, "memory write to 0x{:08X} failed", addr),
            Error::MissingPatch { processor, kind } => {
                write!(f, "{} {} patch missing", processor, kind)
            }
            Error::InvalidProcessor { raw } => write!(f, "invalid RPU processor type {}", raw),
            Error::WakeTimeout => f.write_str("timeout waiting for RPU wake"),
            Error::Transport { addr } => write!(f, "transport error accessing 0x{:08X}", addr),
            Error::InvalidSignature { actual, expected } => write!(
                f,
                "invalid firmware bundle signature 0x{:08X} (expected 0x{:08X})",
                actual, expected
            ),
            Error::InvalidImageCount { count } => write!(f, "firmware bundle has {} images", count),
            Error::UnknownImage { id } => write!(f, "unknown firmware image type {}", id),
            Error::DuplicateImage { id } => write!(f, "firmware image type {} repeated", id),
            Error::BundleTruncated { offset } => write!(f, "firmware bundle truncated at byte {}", offset),
        }
    }
}
