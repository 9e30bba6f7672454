//! LMAC/UMAC patch loading and boot sequencing.
//!
//! Bringing up one core:
//! 1. Load its two patch images, "bimg" then "bin" ([`Hal::load_fw_patches`]).
//! 2. Clear its boot signature, point the boot ROM at the patched entry
//!    (patched boot only), write the exception vectors and set the run bit
//!    ([`Hal::boot_processor`]).
//!
//! The firmware writes [`BOOT_SIG_VALUE`](crate::memory_map::boot::BOOT_SIG_VALUE)
//! to the signature location once it is up. Nothing here waits for it; poll
//! [`Hal::is_booted`] for that.
//!
//! # Example
//! ```rust,ignore
//! use nrf70_hal::config::{FirmwareConfig, PatchPair};
//!
//! let mut config = FirmwareConfig::new();
//! config.lmac = Some(PatchPair::new(LMAC_BIMG, LMAC_BIN));
//! config.umac = Some(PatchPair::new(UMAC_BIMG, UMAC_BIN));
//!
//! hal.power_on(&config)?;
//! while !hal.is_booted(Processor::Umac)? {
//!     delay.delay_ms(1);
//! }
//! ```

use crate::bus::Bus;
use crate::config::FirmwareConfig;
use crate::error::Error;
use crate::hal::Hal;
use crate::memory_map::{boot, patch, AddressMap};
use crate::patch::{Heap, PatchKind, StagingAllocator};
use crate::power::PowerPolicy;
use crate::processor::Processor;

//=============================================================================
// Boot tables
//=============================================================================

/// One (register, value) write of a boot sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegWrite {
    pub addr: u32,
    pub value: u32,
}

impl RegWrite {
    const fn new(addr: u32, value: u32) -> Self {
        Self { addr, value }
    }
}

/// Everything needed to patch and boot one processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootTables {
    /// Boot signature location, cleared before boot.
    pub boot_sig: u32,
    /// Boot ROM patch offset, written only for a patched boot.
    pub sleep_ctrl: RegWrite,
    /// Run control register; writing [`RUN`] releases the core.
    pub run: u32,
    /// Exception vectors, written in this order.
    pub vectors: [RegWrite; 4],
    /// Destination of the "bimg" image.
    pub primary_dest: u32,
    /// Destination of the "bin" image.
    pub secondary_dest: u32,
}

/// Value written to the run control register.
pub const RUN: u32 = 1;

pub const LMAC: BootTables = BootTables {
    boot_sig: boot::LMAC_BOOT_SIG,
    sleep_ctrl: RegWrite::new(boot::UCC_SLEEP_CTRL_DATA_0, patch::LMAC_ROM_PATCH_OFFSET),
    run: boot::MIPS_MCU_CONTROL,
    vectors: [
        RegWrite::new(boot::MIPS_MCU_BOOT_EXCP_INSTR_0, boot::LMAC_BOOT_EXCP_VECT_0),
        RegWrite::new(boot::MIPS_MCU_BOOT_EXCP_INSTR_1, boot::LMAC_BOOT_EXCP_VECT_1),
        RegWrite::new(boot::MIPS_MCU_BOOT_EXCP_INSTR_2, boot::LMAC_BOOT_EXCP_VECT_2),
        RegWrite::new(boot::MIPS_MCU_BOOT_EXCP_INSTR_3, boot::LMAC_BOOT_EXCP_VECT_3),
    ],
    primary_dest: patch::LMAC_BIMG,
    secondary_dest: patch::LMAC_BIN,
};

pub const UMAC: BootTables = BootTables {
    boot_sig: boot::UMAC_BOOT_SIG,
    sleep_ctrl: RegWrite::new(boot::UCC_SLEEP_CTRL_DATA_1, patch::UMAC_ROM_PATCH_OFFSET),
    run: boot::MIPS_MCU2_CONTROL,
    vectors: [
        RegWrite::new(boot::MIPS_MCU2_BOOT_EXCP_INSTR_0, boot::UMAC_BOOT_EXCP_VECT_0),
        RegWrite::new(boot::MIPS_MCU2_BOOT_EXCP_INSTR_1, boot::UMAC_BOOT_EXCP_VECT_1),
        RegWrite::new(boot::MIPS_MCU2_BOOT_EXCP_INSTR_2, boot::UMAC_BOOT_EXCP_VECT_2),
        RegWrite::new(boot::MIPS_MCU2_BOOT_EXCP_INSTR_3, boot::UMAC_BOOT_EXCP_VECT_3),
    ],
    primary_dest: patch::UMAC_BIMG,
    secondary_dest: patch::UMAC_BIN,
};

impl BootTables {
    /// Tables of `processor`.
    pub const fn of(processor: Processor) -> &'static BootTables {
        match processor {
            Processor::Lmac => &LMAC,
            Processor::Umac => &UMAC,
        }
    }

    /// Destination of one of the patch images.
    pub const fn patch_dest(&self, kind: PatchKind) -> u32 {
        match kind {
            PatchKind::Primary => self.primary_dest,
            PatchKind::Secondary => self.secondary_dest,
        }
    }
}

//=============================================================================
// Boot sequence
//=============================================================================

impl<B: Bus, M: AddressMap, P: PowerPolicy<B>> Hal<B, M, P> {
    /// Load both patch images of `processor`, staging chunks on the heap.
    pub fn load_fw_patches(&mut self, processor: Processor, primary: &[u8], secondary: &[u8]) -> Result<(), Error> {
        self.load_fw_patches_with(&mut Heap, processor, primary, secondary)
    }

    /// Load both patch images of `processor`, staging chunks with `alloc`.
    ///
    /// Both images must be non-empty; a missing one is reported before
    /// anything is written. The primary image goes first and the load stops
    /// at the first failure.
    pub fn load_fw_patches_with<A: StagingAllocator>(
        &mut self,
        mut alloc: A,
        processor: Processor,
        primary: &[u8],
        secondary: &[u8],
    ) -> Result<(), Error> {
        for (kind, image) in [(PatchKind::Primary, primary), (PatchKind::Secondary, secondary)] {
            if image.is_empty() {
                error!("{} {} patch missing", processor, kind);
                return Err(Error::MissingPatch { processor, kind });
            }
        }

        let tables = BootTables::of(processor);
        let mut hal = self.target(processor);

        for (kind, image) in [(PatchKind::Primary, primary), (PatchKind::Secondary, secondary)] {
            hal.load_patch_with(&mut alloc, processor, kind, tables.patch_dest(kind), image)?;
        }

        debug!("{} patches loaded", processor);
        Ok(())
    }

    /// Release `processor` from reset.
    ///
    /// With `patch_present` the boot ROM is told where the patched entry point
    /// is. A failing step aborts the sequence; steps already done stay done.
    pub fn boot_processor(&mut self, processor: Processor, patch_present: bool) -> Result<(), Error> {
        let tables = BootTables::of(processor);
        let mut hal = self.target(processor);

        debug!("{}: clearing boot signature at 0x{:08X}", processor, tables.boot_sig);
        hal.mem_write(tables.boot_sig, &0u32.to_le_bytes()).map_err(|e| {
            error!("{}: clearing boot signature failed: {:?}", processor, e);
            Error::WriteFailure { addr: tables.boot_sig }
        })?;

        if patch_present {
            debug!(
                "{}: ROM patch offset 0x{:05X} -> 0x{:08X}",
                processor, tables.sleep_ctrl.value, tables.sleep_ctrl.addr
            );
            hal.boot_write(tables.sleep_ctrl)?;
        }

        for vector in &tables.vectors {
            hal.boot_write(*vector)?;
        }
        debug!("{}: boot vectors written", processor);

        hal.boot_write(RegWrite::new(tables.run, RUN))?;
        info!("{} released from reset", processor);

        Ok(())
    }

    /// Whether `processor`'s firmware has written its boot signature.
    pub fn is_booted(&mut self, processor: Processor) -> Result<bool, Error> {
        let tables = BootTables::of(processor);
        let mut hal = self.target(processor);

        let mut sig = [0u32; 1];
        hal.mem_read(tables.boot_sig, &mut sig)?;
        trace!("{} boot signature 0x{:08X}", processor, sig[0]);

        Ok(sig[0] == boot::BOOT_SIG_VALUE)
    }

    /// Patch (where configured) and boot LMAC, then UMAC.
    ///
    /// Returns once both cores are released; it does not wait for the boot
    /// signatures.
    pub fn power_on(&mut self, config: &FirmwareConfig<'_>) -> Result<(), Error> {
        info!("Starting RPU power-on sequence");

        for processor in Processor::ALL {
            let patch_present = match config.patches(processor) {
                Some(pair) => {
                    debug!("{}: loading patches", processor);
                    self.load_fw_patches(processor, pair.primary, pair.secondary)?;
                    true
                }
                None => {
                    debug!("{}: no patches, booting from ROM", processor);
                    false
                }
            };

            self.boot_processor(processor, patch_present)?;
        }

        info!("RPU power-on sequence completed");
        Ok(())
    }

    fn boot_write(&mut self, write: RegWrite) -> Result<(), Error> {
        self.reg_write(write.addr, write.value).map_err(|e| {
            error!("Boot write 0x{:08X} = 0x{:08X} failed: {:?}", write.addr, write.value, e);
            Error::WriteFailure { addr: write.addr }
        })
    }
}

#[cfg(test)]
mod tests;
