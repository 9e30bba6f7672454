//! Firmware configuration for the RPU power-on flow.
//!
//! Patch images come either as four separate slices or packed in one
//! firmware bundle ([`FirmwareBundle`]):
//!
//! ```text
//! offset  size  field
//! 0       4     signature (0xDEAD1EAF)
//! 4       4     number of images (4)
//! 8       4     version
//! 12      4     feature flags
//! 16      4     length of the image data that follows
//! 20      32    hash
//! 52      ...   images: { type: u32, len: u32, data: [u8; len] }
//! ```
//!
//! All fields are little-endian and unaligned.

use crate::error::Error;
use crate::patch::PatchKind;
use crate::processor::Processor;

/// The two patch images of one processor.
#[derive(Debug, Clone, Copy)]
pub struct PatchPair<'a> {
    /// Resident base image ("bimg").
    pub primary: &'a [u8],
    /// Secondary/delta image ("bin").
    pub secondary: &'a [u8],
}

impl<'a> PatchPair<'a> {
    /// Pair a "bimg" image with its "bin" image.
    pub const fn new(primary: &'a [u8], secondary: &'a [u8]) -> Self {
        Self { primary, secondary }
    }
}

/// RPU power-on configuration.
///
/// A processor without patches boots from ROM.
#[derive(Debug, Clone, Copy)]
pub struct FirmwareConfig<'a> {
    /// LMAC patch images.
    pub lmac: Option<PatchPair<'a>>,
    /// UMAC patch images.
    pub umac: Option<PatchPair<'a>>,
}

impl<'a> FirmwareConfig<'a> {
    /// Create a new config with no patches.
    pub const fn new() -> Self {
        Self {
            lmac: None,
            umac: None,
        }
    }

    /// Patched config for both processors, taken from a firmware bundle.
    ///
    /// The images borrow from `bundle`. The bundle hash is not checked.
    pub fn from_bundle(bundle: &'a [u8]) -> Result<Self, Error> {
        FirmwareBundle::parse(bundle).map(|parsed| parsed.config)
    }

    /// Patch images configured for `processor`.
    pub const fn patches(&self, processor: Processor) -> Option<PatchPair<'a>> {
        match processor {
            Processor::Lmac => self.lmac,
            Processor::Umac => self.umac,
        }
    }
}

impl Default for FirmwareConfig<'_> {
    fn default() -> Self {
        Self::new()
    }
}

//=============================================================================
// Firmware bundle
//=============================================================================

/// First word of every firmware bundle.
pub const BUNDLE_SIGNATURE: u32 = 0xDEAD_1EAF;
/// Images in a complete bundle, one per processor and kind.
pub const BUNDLE_NUM_IMAGES: u32 = 4;
/// Length of the bundle hash.
pub const BUNDLE_HASH_LEN: usize = 32;
/// Bundle header length, up to the first image.
pub const BUNDLE_HEADER_LEN: usize = 20 + BUNDLE_HASH_LEN;
/// Per-image header length (type + length).
pub const IMAGE_HEADER_LEN: usize = 8;

/// Firmware feature flags carried in the bundle header.
pub mod feature {
    pub const SYSTEM_MODE: u32 = 1 << 0;
    pub const RADIO_TEST: u32 = 1 << 1;
    pub const SCAN_ONLY: u32 = 1 << 2;
    pub const SYSTEM_WITH_RAW_MODES: u32 = 1 << 3;
    pub const OFFLOADED_RAW_TX: u32 = 1 << 4;
}

/// Bundle image slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum ImageId {
    UmacPrimary = 0,
    UmacSecondary = 1,
    LmacPrimary = 2,
    LmacSecondary = 3,
}

impl ImageId {
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(ImageId::UmacPrimary),
            1 => Some(ImageId::UmacSecondary),
            2 => Some(ImageId::LmacPrimary),
            3 => Some(ImageId::LmacSecondary),
            _ => None,
        }
    }

    /// Processor the image is loaded into.
    pub const fn processor(self) -> Processor {
        match self {
            ImageId::UmacPrimary | ImageId::UmacSecondary => Processor::Umac,
            ImageId::LmacPrimary | ImageId::LmacSecondary => Processor::Lmac,
        }
    }

    /// Which of the processor's two patches the image is.
    pub const fn kind(self) -> PatchKind {
        match self {
            ImageId::UmacPrimary | ImageId::LmacPrimary => PatchKind::Primary,
            ImageId::UmacSecondary | ImageId::LmacSecondary => PatchKind::Secondary,
        }
    }

    const fn slot(self) -> usize {
        self as usize
    }
}

/// A parsed firmware bundle.
#[derive(Debug, Clone, Copy)]
pub struct FirmwareBundle<'a> {
    /// Firmware version word.
    pub version: u32,
    /// Bitwise OR of [`feature`] flags.
    pub feature_flags: u32,
    /// Hash over the image data, as stored.
    pub hash: &'a [u8],
    /// Patches for both processors.
    pub config: FirmwareConfig<'a>,
}

impl<'a> FirmwareBundle<'a> {
    /// Parse and validate a firmware bundle.
    ///
    /// Every image slot must appear exactly once with a non-empty image.
    /// Bytes past the declared image data length are ignored.
    pub fn parse(bundle: &'a [u8]) -> Result<Self, Error> {
        let signature = read_u32(bundle, 0)?;
        if signature != BUNDLE_SIGNATURE {
            error!(
                "Firmware bundle invalid: signature=0x{:08X}, expected=0x{:08X}",
                signature, BUNDLE_SIGNATURE
            );
            return Err(Error::InvalidSignature {
                actual: signature,
                expected: BUNDLE_SIGNATURE,
            });
        }

        let count = read_u32(bundle, 4)?;
        if count != BUNDLE_NUM_IMAGES {
            error!("Firmware bundle has {} images, expected {}", count, BUNDLE_NUM_IMAGES);
            return Err(Error::InvalidImageCount { count });
        }

        let version = read_u32(bundle, 8)?;
        let feature_flags = read_u32(bundle, 12)?;
        let data_len = read_u32(bundle, 16)? as usize;
        let hash = slice(bundle, 20, BUNDLE_HASH_LEN)?;
        let data = slice(bundle, BUNDLE_HEADER_LEN, data_len)?;

        debug!(
            "Firmware bundle: version=0x{:08X}, features=0x{:08X}, {} bytes of images",
            version, feature_flags, data_len
        );

        let mut images: [Option<&'a [u8]>; BUNDLE_NUM_IMAGES as usize] = [None; BUNDLE_NUM_IMAGES as usize];
        let mut pos = 0usize;
        for _ in 0..count {
            // Offsets in errors are relative to the bundle start.
            let raw = read_u32(data, pos).map_err(|_| truncated(pos))?;
            let len = read_u32(data, pos + 4).map_err(|_| truncated(pos))? as usize;
            let image = slice(data, pos + IMAGE_HEADER_LEN, len).map_err(|_| truncated(pos))?;

            let id = ImageId::from_raw(raw).ok_or(Error::UnknownImage { id: raw })?;
            let slot = &mut images[id.slot()];
            if slot.is_some() {
                error!("Firmware image type {} repeated", raw);
                return Err(Error::DuplicateImage { id: raw });
            }
            trace!("Firmware image {}: {} bytes at offset {}", raw, len, BUNDLE_HEADER_LEN + pos);
            *slot = Some(image);
            pos += IMAGE_HEADER_LEN + len;
        }

        let image = |id: ImageId| match images[id.slot()] {
            Some(image) if !image.is_empty() => Ok(image),
            _ => Err(Error::MissingPatch {
                processor: id.processor(),
                kind: id.kind(),
            }),
        };
        let config = FirmwareConfig {
            lmac: Some(PatchPair::new(image(ImageId::LmacPrimary)?, image(ImageId::LmacSecondary)?)),
            umac: Some(PatchPair::new(image(ImageId::UmacPrimary)?, image(ImageId::UmacSecondary)?)),
        };

        Ok(Self {
            version,
            feature_flags,
            hash,
            config,
        })
    }
}

fn truncated(pos: usize) -> Error {
    let offset = BUNDLE_HEADER_LEN + pos;
    error!("Firmware bundle truncated at byte {}", offset);
    Error::BundleTruncated { offset }
}

fn slice(data: &[u8], offset: usize, len: usize) -> Result<&[u8], Error> {
    offset
        .checked_add(len)
        .and_then(|end| data.get(offset..end))
        .ok_or(Error::BundleTruncated { offset })
}

fn read_u32(data: &[u8], offset: usize) -> Result<u32, Error> {
    let bytes = slice(data, offset, 4)?;
    let mut word = [0u8; 4];
    word.copy_from_slice(bytes);
    Ok(u32::from_le_bytes(word))
}
