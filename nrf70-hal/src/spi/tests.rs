use core::convert::Infallible;

use embedded_hal_1::delay::DelayNs;
use embedded_hal_1::spi::{ErrorType, Operation, SpiDevice};

use super::{SpiBus, SpiWake, SpiWakeConfig, SR1_RPU_AWAKE, SR2_RPU_WAKEUP_REQ};
use crate::bus::Bus;
use crate::error::Error;
use crate::hal::Hal;
use crate::memory_map::{boot, Nrf70AddressMap};
use crate::power::{PowerSave, PsLock, RpuPsState, Wake};

/// SPI device answering reads with a counting byte pattern and emulating the status registers.
#[derive(Default)]
struct FakeSpi {
    writes: Vec<Vec<u8>>,
    read_lens: Vec<usize>,
    sr1: u8,
    sr2: u8,
    /// SR1 reports awake once a wake request is written.
    wakes_up: bool,
}

impl ErrorType for FakeSpi {
    type Error = Infallible;
}

impl SpiDevice for FakeSpi {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Infallible> {
        for op in operations {
            match op {
                Operation::Write(data) => {
                    if data.len() == 2 && data[0] == 0x3F {
                        self.sr2 = data[1];
                        if self.wakes_up && data[1] == SR2_RPU_WAKEUP_REQ {
                            self.sr1 |= SR1_RPU_AWAKE;
                        }
                    }
                    self.writes.push(data.to_vec());
                }
                Operation::Read(buf) => {
                    self.read_lens.push(buf.len());
                    for (i, b) in buf.iter_mut().enumerate() {
                        *b = i as u8;
                    }
                }
                Operation::Transfer(read, write) => {
                    read[1] = match write[0] {
                        0x1F => self.sr1,
                        0x2F => self.sr2,
                        _ => 0,
                    };
                }
                _ => {}
            }
        }
        Ok(())
    }
}

#[derive(Default)]
struct FakeDelay {
    total_ns: u64,
}

impl DelayNs for FakeDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }
}

#[test]
fn read_skips_latency_words() {
    let mut bus = SpiBus::new(FakeSpi::default());

    // PKTRAM: no dummy words.
    assert_eq!(bus.read_word(0x0C_0010).unwrap(), 0x0302_0100);
    // SYSBUS: one dummy word.
    assert_eq!(bus.read_word(0x00_2C2C).unwrap(), 0x0706_0504);
    // EXT_SYS_BUS: two dummy words.
    assert_eq!(bus.read_word(0x01_0000).unwrap(), 0x0B0A_0908);

    let spi = bus.free();
    assert_eq!(spi.read_lens, [4, 8, 12]);
    assert_eq!(spi.writes[0], [0x0B, 0x0C, 0x00, 0x10, 0x00]);
    assert_eq!(spi.writes[1], [0x0B, 0x00, 0x2C, 0x2C, 0x00]);
}

#[test]
fn write_sets_address_flag() {
    let mut bus = SpiBus::new(FakeSpi::default());
    bus.write_word(0x28_C000, 0x1122_3344).unwrap();
    bus.write_block(0x14_9000, &[9, 8, 7]).unwrap();

    let spi = bus.free();
    assert_eq!(
        spi.writes,
        [
            vec![0x02, 0xA8, 0xC0, 0x00],
            vec![0x44, 0x33, 0x22, 0x11],
            vec![0x02, 0x94, 0x90, 0x00],
            vec![9, 8, 7],
        ]
    );
}

#[test]
fn wake_handshake() {
    let mut bus = SpiBus::new(FakeSpi {
        wakes_up: true,
        ..FakeSpi::default()
    });
    let mut wake = SpiWake::new(FakeDelay::default(), SpiWakeConfig::default());

    wake.wake(&mut bus).unwrap();
    assert_eq!(bus.read_sr2(), Ok(SR2_RPU_WAKEUP_REQ));
    assert_eq!(wake.delay.total_ns, 0);

    wake.sleep(&mut bus).unwrap();
    assert_eq!(bus.read_sr2(), Ok(0));
}

#[test]
fn wake_times_out() {
    let mut bus = SpiBus::new(FakeSpi::default());
    let config = SpiWakeConfig {
        attempts: 3,
        interval_us: 500,
    };
    let mut wake = SpiWake::new(FakeDelay::default(), config);

    assert_eq!(wake.wake(&mut bus), Err(Error::WakeTimeout));
    // SR2 echoed the request at once; SR1 never showed awake.
    assert_eq!(wake.delay.total_ns, 3 * 500_000);
}

#[test]
fn power_save_over_spi() {
    let lock = PsLock::new();
    let spi = FakeSpi {
        wakes_up: true,
        ..FakeSpi::default()
    };
    let power = PowerSave::new(&lock, SpiWake::new(FakeDelay::default(), SpiWakeConfig::new()));
    let mut hal = Hal::new(SpiBus::new(spi), Nrf70AddressMap, power);

    hal.reg_write(boot::MIPS_MCU_CONTROL, 1).unwrap();
    assert_eq!(lock.state(), RpuPsState::Awake);

    hal.sleep().unwrap();
    assert_eq!(lock.state(), RpuPsState::Asleep);

    let (bus, _, _) = hal.release();
    let spi = bus.free();
    assert_eq!(
        spi.writes,
        [
            vec![0x3F, SR2_RPU_WAKEUP_REQ],
            vec![0x02, 0x80, 0x00, 0x00],
            vec![0x01, 0x00, 0x00, 0x00],
            vec![0x3F, 0x00],
        ]
    );
}
