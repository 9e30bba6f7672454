//! RPU memory map: register space, patch/boot addresses and bus regions.
//!
//! RPU addresses are what the firmware sees (`0xA400_0000` SYSBUS,
//! `0x8004_0000` LMAC retained RAM, ...). The host reaches them through a
//! 24-bit bus offset space; [`AddressMap`] converts between the two.

use crate::processor::Processor;

/// Mask selecting the address-space marker of an RPU address.
pub const RPU_ADDR_MASK_BASE: u32 = 0xFF00_0000;
/// Mask selecting the offset within an address space.
pub const RPU_ADDR_MASK_OFFSET: u32 = 0x00FF_FFFF;
/// SYSBUS register space marker.
pub const RPU_ADDR_SBUS_START: u32 = 0xA400_0000;
/// PBUS register space marker.
pub const RPU_ADDR_PBUS_START: u32 = 0xA500_0000;

/// Whether `addr` lies in RPU register space (SYSBUS or PBUS).
#[inline]
pub const fn is_reg(addr: u32) -> bool {
    let base = addr & RPU_ADDR_MASK_BASE;
    base == RPU_ADDR_SBUS_START || base == RPU_ADDR_PBUS_START
}

/// Patch image destinations in the cores' retained RAM.
pub mod patch {
    pub const LMAC_BIMG: u32 = 0x8004_9000;
    pub const LMAC_BIN: u32 = 0x8004_4000;
    pub const UMAC_BIMG: u32 = 0x8009_4400;
    pub const UMAC_BIN: u32 = 0x8008_C000;

    /// Offset of the patched entry point handed to the LMAC boot ROM.
    pub const LMAC_ROM_PATCH_OFFSET: u32 = LMAC_BIMG - super::regions::LMAC_RET_RAM.rpu_mem_start;
    /// Offset of the patched entry point handed to the UMAC boot ROM.
    pub const UMAC_ROM_PATCH_OFFSET: u32 = UMAC_BIMG - super::regions::UMAC_RET_RAM.rpu_mem_start;
}

/// Boot control registers and signature locations.
pub mod boot {
    /// LMAC writes [`BOOT_SIG_VALUE`] here once its firmware is up.
    pub const LMAC_BOOT_SIG: u32 = 0xB700_0D50;
    /// UMAC writes [`BOOT_SIG_VALUE`] here once its firmware is up.
    pub const UMAC_BOOT_SIG: u32 = 0xB000_0000;
    pub const BOOT_SIG_VALUE: u32 = 0x5A5A_5A5A;

    pub const MIPS_MCU_CONTROL: u32 = 0xA400_0000;
    pub const MIPS_MCU2_CONTROL: u32 = 0xA400_0100;

    pub const UCC_SLEEP_CTRL_DATA_0: u32 = 0xA400_2C2C;
    pub const UCC_SLEEP_CTRL_DATA_1: u32 = 0xA400_2C30;

    pub const MIPS_MCU_BOOT_EXCP_INSTR_0: u32 = 0xA400_0050;
    pub const MIPS_MCU_BOOT_EXCP_INSTR_1: u32 = 0xA400_0054;
    pub const MIPS_MCU_BOOT_EXCP_INSTR_2: u32 = 0xA400_0058;
    pub const MIPS_MCU_BOOT_EXCP_INSTR_3: u32 = 0xA400_005C;

    pub const MIPS_MCU2_BOOT_EXCP_INSTR_0: u32 = 0xA400_0150;
    pub const MIPS_MCU2_BOOT_EXCP_INSTR_1: u32 = 0xA400_0154;
    pub const MIPS_MCU2_BOOT_EXCP_INSTR_2: u32 = 0xA400_0158;
    pub const MIPS_MCU2_BOOT_EXCP_INSTR_3: u32 = 0xA400_015C;

    // Exception vector words (MIPS `lui k0` / `addiu k0` / `jr k0` / `nop`).
    pub const LMAC_BOOT_EXCP_VECT_0: u32 = 0x3C1A_8000;
    pub const LMAC_BOOT_EXCP_VECT_1: u32 = 0x275A_0000;
    pub const LMAC_BOOT_EXCP_VECT_2: u32 = 0x0340_0008;
    pub const LMAC_BOOT_EXCP_VECT_3: u32 = 0x0000_0000;

    pub const UMAC_BOOT_EXCP_VECT_0: u32 = 0x3C1A_8000;
    pub const UMAC_BOOT_EXCP_VECT_1: u32 = 0x275A_0000;
    pub const UMAC_BOOT_EXCP_VECT_2: u32 = 0x0340_0008;
    pub const UMAC_BOOT_EXCP_VECT_3: u32 = 0x0000_0000;
}

/// A window of the bus offset space and the RPU addresses it exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRegion {
    /// First bus offset of the region.
    pub start: u32,
    /// Last bus offset of the region (inclusive).
    pub end: u32,
    /// Number of dummy 32-bit words the bus returns before read data.
    pub latency: u32,
    /// First RPU address mapped by the region.
    pub rpu_mem_start: u32,
    /// Last RPU address mapped by the region (inclusive).
    pub rpu_mem_end: u32,
    /// Core that owns the region, `None` if shared.
    pub processor: Option<Processor>,
}

impl MemoryRegion {
    /// Whether the region serves `addr` in the given processor context.
    #[inline]
    pub fn maps(&self, addr: u32, processor: Processor) -> bool {
        let owned = match self.processor {
            None => true,
            Some(p) => p == processor,
        };
        owned && addr >= self.rpu_mem_start && addr <= self.rpu_mem_end
    }

    /// Whether a bus offset falls inside the region.
    #[inline]
    pub fn contains_offset(&self, offset: u32) -> bool {
        offset >= self.start && offset <= self.end
    }
}

#[rustfmt::skip]
pub mod regions {
    use super::MemoryRegion;
    use crate::processor::Processor;

    pub const SYSBUS      : MemoryRegion = MemoryRegion { start: 0x00_0000, end: 0x00_8FFF, latency: 1, rpu_mem_start: 0xA400_0000, rpu_mem_end: 0xA4FF_FFFF, processor: None };
    pub const EXT_SYS_BUS : MemoryRegion = MemoryRegion { start: 0x00_9000, end: 0x03_FFFF, latency: 2, rpu_mem_start: 0,           rpu_mem_end: 0,           processor: None };
    pub const PBUS        : MemoryRegion = MemoryRegion { start: 0x04_0000, end: 0x07_FFFF, latency: 1, rpu_mem_start: 0xA500_0000, rpu_mem_end: 0xA5FF_FFFF, processor: None };
    pub const PKTRAM      : MemoryRegion = MemoryRegion { start: 0x0C_0000, end: 0x0F_0FFF, latency: 0, rpu_mem_start: 0xB000_0000, rpu_mem_end: 0xB0FF_FFFF, processor: None };
    pub const GRAM        : MemoryRegion = MemoryRegion { start: 0x08_0000, end: 0x09_2000, latency: 1, rpu_mem_start: 0xB700_0000, rpu_mem_end: 0xB7FF_FFFF, processor: None };
    pub const LMAC_ROM    : MemoryRegion = MemoryRegion { start: 0x10_0000, end: 0x13_4000, latency: 1, rpu_mem_start: 0x8000_0000, rpu_mem_end: 0x8003_3FFF, processor: Some(Processor::Lmac) };
    pub const LMAC_RET_RAM: MemoryRegion = MemoryRegion { start: 0x14_0000, end: 0x14_C000, latency: 1, rpu_mem_start: 0x8004_0000, rpu_mem_end: 0x8004_BFFF, processor: Some(Processor::Lmac) };
    pub const LMAC_SRC_RAM: MemoryRegion = MemoryRegion { start: 0x18_0000, end: 0x19_0000, latency: 1, rpu_mem_start: 0x8008_0000, rpu_mem_end: 0x8008_FFFF, processor: Some(Processor::Lmac) };
    pub const UMAC_ROM    : MemoryRegion = MemoryRegion { start: 0x20_0000, end: 0x26_1800, latency: 1, rpu_mem_start: 0x8000_0000, rpu_mem_end: 0x8006_17FF, processor: Some(Processor::Umac) };
    pub const UMAC_RET_RAM: MemoryRegion = MemoryRegion { start: 0x28_0000, end: 0x2A_4000, latency: 1, rpu_mem_start: 0x8008_0000, rpu_mem_end: 0x800A_3FFF, processor: Some(Processor::Umac) };
    pub const UMAC_SRC_RAM: MemoryRegion = MemoryRegion { start: 0x30_0000, end: 0x33_8000, latency: 1, rpu_mem_start: 0x8010_0000, rpu_mem_end: 0x8013_7FFF, processor: Some(Processor::Umac) };

    pub const ALL: [&MemoryRegion; 11] = [
        &SYSBUS, &EXT_SYS_BUS, &PBUS, &PKTRAM, &GRAM,
        &LMAC_ROM, &LMAC_RET_RAM, &LMAC_SRC_RAM,
        &UMAC_ROM, &UMAC_RET_RAM, &UMAC_SRC_RAM,
    ];
}

/// Number of dummy words to skip when reading at bus `offset`.
///
/// Offsets outside every region read with the SYSBUS latency.
pub fn latency_for_offset(offset: u32) -> u32 {
    regions::ALL
        .iter()
        .find(|region| region.contains_offset(offset))
        .map_or(regions::SYSBUS.latency, |region| region.latency)
}

/// RPU address to bus offset translation.
pub trait AddressMap {
    /// Bus offset of `addr` when accessed in `processor` context, `None` if unmapped.
    fn translate(&self, addr: u32, processor: Processor) -> Option<u32>;
}

/// Address map of the nRF70 host interface.
#[derive(Debug, Clone, Copy, Default)]
pub struct Nrf70AddressMap;

impl AddressMap for Nrf70AddressMap {
    /// Only offsets inside the region's bus window count; an address past the
    /// window falls through to the next matching region or is unmapped.
    fn translate(&self, addr: u32, processor: Processor) -> Option<u32> {
        regions::ALL.iter().find_map(|region| {
            if !region.maps(addr, processor) {
                return None;
            }
            region
                .start
                .checked_add(addr - region.rpu_mem_start)
                .filter(|offset| region.contains_offset(*offset))
        })
    }
}

impl<T: AddressMap + ?Sized> AddressMap for &T {
    fn translate(&self, addr: u32, processor: Processor) -> Option<u32> {
        T::translate(self, addr, processor)
    }
}
