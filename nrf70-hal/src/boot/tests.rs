use super::{BootTables, RUN};
use crate::config::{FirmwareConfig, PatchPair};
use crate::error::Error;
use crate::hal::Hal;
use crate::memory_map::{boot, patch, Nrf70AddressMap};
use crate::mock::{pattern, FailingAllocator, MockBus, Op};
use crate::patch::PatchKind;
use crate::power::AlwaysOn;
use crate::processor::Processor;

fn hal_with(bus: MockBus) -> Hal<MockBus, Nrf70AddressMap, AlwaysOn> {
    Hal::new(bus, Nrf70AddressMap, AlwaysOn)
}

fn hal() -> Hal<MockBus, Nrf70AddressMap, AlwaysOn> {
    hal_with(MockBus::new())
}

fn word(offset: u32, value: u32) -> Op {
    Op::WriteWord { offset, value }
}

fn sig_clear(offset: u32) -> Op {
    Op::WriteBlock {
        offset,
        data: vec![0; 4],
    }
}

fn blocks(bus: &MockBus) -> Vec<(u32, usize)> {
    bus.ops
        .iter()
        .filter_map(|op| match op {
            Op::WriteBlock { offset, data } => Some((*offset, data.len())),
            _ => None,
        })
        .collect()
}

const LMAC_BOOT_OPS: [(u32, u32); 4] = [
    (0x50, boot::LMAC_BOOT_EXCP_VECT_0),
    (0x54, boot::LMAC_BOOT_EXCP_VECT_1),
    (0x58, boot::LMAC_BOOT_EXCP_VECT_2),
    (0x5C, boot::LMAC_BOOT_EXCP_VECT_3),
];

#[test]
fn tables_cover_every_processor() {
    for processor in Processor::ALL {
        let tables = BootTables::of(processor);
        for pair in tables.vectors.windows(2) {
            assert_eq!(pair[1].addr, pair[0].addr + 4);
        }
        assert_ne!(tables.primary_dest, tables.secondary_dest);
        assert_eq!(tables.patch_dest(PatchKind::Primary), tables.primary_dest);
    }
    assert_eq!(BootTables::of(Processor::Lmac).run, boot::MIPS_MCU_CONTROL);
    assert_eq!(BootTables::of(Processor::Umac).run, boot::MIPS_MCU2_CONTROL);
}

#[test]
fn missing_patch_writes_nothing() {
    let image = [1u8; 64];
    let mut hal = hal();

    assert_eq!(
        hal.load_fw_patches(Processor::Lmac, &[], &image),
        Err(Error::MissingPatch {
            processor: Processor::Lmac,
            kind: PatchKind::Primary
        })
    );
    assert_eq!(
        hal.load_fw_patches(Processor::Umac, &image, &[]),
        Err(Error::MissingPatch {
            processor: Processor::Umac,
            kind: PatchKind::Secondary
        })
    );
    assert_eq!(
        hal.load_fw_patches(Processor::Umac, &[], &[]),
        Err(Error::MissingPatch {
            processor: Processor::Umac,
            kind: PatchKind::Primary
        })
    );

    assert!(hal.bus().ops.is_empty());
    assert_eq!(hal.current_target(), Processor::Lmac);
}

#[test]
fn umac_patch_scenario() {
    let primary = pattern(500, 1);
    let secondary = pattern(8200, 2);
    let mut hal = hal();

    hal.load_fw_patches(Processor::Umac, &primary, &secondary)
        .unwrap();

    // bimg at 0x8009_4400, bin at 0x8008_C000, both in UMAC retained RAM.
    assert_eq!(
        blocks(hal.bus()),
        [(0x29_4400, 500), (0x28_C000, 8192), (0x28_C000 + 8192, 8)]
    );
    assert_eq!(hal.bus().bytes(0x29_4400, 500), primary);
    assert_eq!(hal.bus().bytes(0x28_C000, 8200), secondary);
    assert_eq!(hal.current_target(), Processor::Lmac);
}

#[test]
fn lmac_patch_destinations() {
    let mut hal = hal();
    hal.load_fw_patches(Processor::Lmac, &[1; 16], &[2; 32])
        .unwrap();
    assert_eq!(blocks(hal.bus()), [(0x14_9000, 16), (0x14_4000, 32)]);
}

#[test]
fn primary_failure_skips_secondary() {
    let mut hal = hal_with(MockBus::failing_write(0));
    assert_eq!(
        hal.load_fw_patches(Processor::Lmac, &[1; 16], &[2; 32]),
        Err(Error::WriteFailure {
            addr: patch::LMAC_BIMG
        })
    );
    assert!(hal.bus().ops.is_empty());
    assert_eq!(hal.current_target(), Processor::Lmac);
}

#[test]
fn allocation_failure_in_secondary() {
    // Primary takes allocation 0, secondary fails on its second chunk.
    let mut alloc = FailingAllocator::new(2);
    let mut hal = hal();
    assert_eq!(
        hal.load_fw_patches_with(&mut alloc, Processor::Umac, &[1; 100], &[2; 9000]),
        Err(Error::AllocationFailure { size_bytes: 808 })
    );
    assert_eq!(blocks(hal.bus()), [(0x29_4400, 100), (0x28_C000, 8192)]);
    assert_eq!(hal.current_target(), Processor::Lmac);
}

#[test]
fn lmac_patched_boot_sequence() {
    let mut hal = hal();
    hal.boot_processor(Processor::Lmac, true).unwrap();

    let mut expected = vec![sig_clear(0x08_0D50), word(0x2C2C, 0x9000)];
    expected.extend(LMAC_BOOT_OPS.iter().map(|&(offset, value)| word(offset, value)));
    expected.push(word(0x0, RUN));

    assert_eq!(hal.bus().ops, expected);
    assert_eq!(hal.current_target(), Processor::Lmac);
}

#[test]
fn umac_rom_boot_sequence() {
    let mut hal = hal();
    hal.boot_processor(Processor::Umac, false).unwrap();

    assert_eq!(
        hal.bus().ops,
        [
            sig_clear(0x0C_0000),
            word(0x150, boot::UMAC_BOOT_EXCP_VECT_0),
            word(0x154, boot::UMAC_BOOT_EXCP_VECT_1),
            word(0x158, boot::UMAC_BOOT_EXCP_VECT_2),
            word(0x15C, boot::UMAC_BOOT_EXCP_VECT_3),
            word(0x100, RUN),
        ]
    );
    assert_eq!(hal.current_target(), Processor::Lmac);
}

#[test]
fn umac_patched_boot_programs_rom_offset() {
    let mut hal = hal();
    hal.boot_processor(Processor::Umac, true).unwrap();
    assert_eq!(hal.bus().ops[1], word(0x2C30, 0x1_4400));
}

#[test]
fn vector_failure_stops_sequence() {
    for j in 0..4 {
        // Writes: signature, sleep ctrl, then vectors.
        let mut hal = hal_with(MockBus::failing_write(2 + j));
        assert_eq!(
            hal.boot_processor(Processor::Lmac, true),
            Err(Error::WriteFailure {
                addr: boot::MIPS_MCU_BOOT_EXCP_INSTR_0 + 4 * j as u32
            })
        );

        let ops = &hal.bus().ops;
        assert_eq!(ops.len(), 2 + j);
        for (op, &(offset, value)) in ops[2..].iter().zip(LMAC_BOOT_OPS.iter()) {
            assert_eq!(*op, word(offset, value));
        }
        assert!(!ops.contains(&word(0x0, RUN)));
        assert_eq!(hal.current_target(), Processor::Lmac);
    }
}

#[test]
fn signature_failure_stops_sequence() {
    let mut hal = hal_with(MockBus::failing_write(0));
    assert_eq!(
        hal.boot_processor(Processor::Umac, true),
        Err(Error::WriteFailure {
            addr: boot::UMAC_BOOT_SIG
        })
    );
    assert!(hal.bus().ops.is_empty());
}

#[test]
fn boot_signature_check() {
    let mut hal = hal();
    assert_eq!(hal.is_booted(Processor::Lmac), Ok(false));

    hal.mem_write(boot::LMAC_BOOT_SIG, &boot::BOOT_SIG_VALUE.to_le_bytes())
        .unwrap();
    assert_eq!(hal.is_booted(Processor::Lmac), Ok(true));
    assert_eq!(hal.is_booted(Processor::Umac), Ok(false));

    // Booting clears the signature again.
    hal.boot_processor(Processor::Lmac, false).unwrap();
    assert_eq!(hal.is_booted(Processor::Lmac), Ok(false));
    assert_eq!(hal.current_target(), Processor::Lmac);
}

#[test]
fn power_on_patched() {
    let lmac = (pattern(100, 1), pattern(200, 2));
    let umac = (pattern(300, 3), pattern(400, 4));
    let mut config = FirmwareConfig::new();
    config.lmac = Some(PatchPair::new(&lmac.0, &lmac.1));
    config.umac = Some(PatchPair::new(&umac.0, &umac.1));

    let mut hal = hal();
    hal.power_on(&config).unwrap();

    let ops = &hal.bus().ops;
    let pos = |op: &Op| ops.iter().position(|o| o == op).unwrap();

    // LMAC patched and released before anything touches UMAC.
    let lmac_run = pos(&word(0x0, RUN));
    let umac_bimg = ops
        .iter()
        .position(|op| matches!(op, Op::WriteBlock { offset: 0x29_4400, .. }))
        .unwrap();
    assert!(lmac_run < umac_bimg);
    assert!(pos(&word(0x2C2C, 0x9000)) < lmac_run);
    assert!(pos(&word(0x2C30, 0x1_4400)) < pos(&word(0x100, RUN)));

    assert_eq!(hal.bus().bytes(0x14_9000, 100), lmac.0);
    assert_eq!(hal.bus().bytes(0x14_4000, 200), lmac.1);
    assert_eq!(hal.bus().bytes(0x29_4400, 300), umac.0);
    assert_eq!(hal.bus().bytes(0x28_C000, 400), umac.1);
    assert_eq!(hal.current_target(), Processor::Lmac);
}

#[test]
fn power_on_from_rom() {
    let mut hal = hal();
    hal.power_on(&FirmwareConfig::default()).unwrap();

    let ops = &hal.bus().ops;
    assert_eq!(ops.len(), 12);
    assert!(!ops.contains(&word(0x2C2C, 0x9000)));
    assert!(!ops.contains(&word(0x2C30, 0x1_4400)));
    assert_eq!(ops[5], word(0x0, RUN));
    assert_eq!(ops[11], word(0x100, RUN));
}

#[test]
fn power_on_stops_at_first_failure() {
    let mut config = FirmwareConfig::new();
    config.lmac = Some(PatchPair::new(&[1; 8], &[]));

    let mut hal = hal();
    assert_eq!(
        hal.power_on(&config),
        Err(Error::MissingPatch {
            processor: Processor::Lmac,
            kind: PatchKind::Secondary
        })
    );
    assert!(hal.bus().ops.is_empty());
    assert_eq!(hal.current_target(), Processor::Lmac);
}
