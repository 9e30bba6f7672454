//! SPI host interface of the nRF70.
//!
//! Bus offsets go on the wire as 24-bit addresses. Reads (`0x0B`) return
//! `latency` dummy words before the data, the number depending on the
//! region being read (see [`latency_for_offset`]). Writes (`0x02`) carry
//! bit 23 set in the address. Three status registers drive the sleep/wake
//! handshake:
//!
//! - SR0 (`0x05`): bit 0 = write in progress.
//! - SR1 (`0x1F`): bit 1 = RPU awake, bit 2 = RPU ready.
//! - SR2 (`0x2F` read, `0x3F` write): bit 0 = wake request.

use embedded_hal_1::delay::DelayNs;
use embedded_hal_1::spi::{Operation, SpiDevice};

use crate::bus::Bus;
use crate::error::Error;
use crate::memory_map::latency_for_offset;
use crate::power::Wake;

const CMD_READ: u8 = 0x0B;
const CMD_WRITE: u8 = 0x02;
const CMD_RDSR0: u8 = 0x05;
const CMD_RDSR1: u8 = 0x1F;
const CMD_RDSR2: u8 = 0x2F;
const CMD_WRSR2: u8 = 0x3F;

/// Address bit 23, set on writes.
const WRITE_ADDR_FLAG: u8 = 0x80;

/// Status register 0: a write is still in progress.
pub const SR0_WRITE_IN_PROGRESS: u8 = 0x01;
/// Status register 1: the RPU is awake.
pub const SR1_RPU_AWAKE: u8 = 0x02;
/// Status register 1: the RPU is ready for bus accesses.
pub const SR1_RPU_READY: u8 = 0x04;
/// Status register 2: host wake-up request.
pub const SR2_RPU_WAKEUP_REQ: u8 = 0x01;

/// Largest read latency of any region, in words.
const MAX_LATENCY: usize = 2;

//=============================================================================
// Transport
//=============================================================================

/// [`Bus`] over an SPI device.
pub struct SpiBus<S> {
    spi: S,
}

impl<S: SpiDevice> SpiBus<S> {
    /// Wrap an SPI device wired to the nRF70 host interface.
    pub fn new(spi: S) -> Self {
        Self { spi }
    }

    /// Give back the SPI device.
    pub fn free(self) -> S {
        self.spi
    }

    pub fn read_sr0(&mut self) -> Result<u8, S::Error> {
        self.read_status(CMD_RDSR0)
    }

    pub fn read_sr1(&mut self) -> Result<u8, S::Error> {
        self.read_status(CMD_RDSR1)
    }

    pub fn read_sr2(&mut self) -> Result<u8, S::Error> {
        self.read_status(CMD_RDSR2)
    }

    pub fn write_sr2(&mut self, value: u8) -> Result<(), S::Error> {
        trace!("write sr2 = 0x{:02X}", value);
        self.spi.write(&[CMD_WRSR2, value])
    }

    fn read_status(&mut self, cmd: u8) -> Result<u8, S::Error> {
        let mut buf = [0u8; 2];
        self.spi.transfer(&mut buf, &[cmd])?;
        trace!("read sr 0x{:02X} = 0x{:02X}", cmd, buf[1]);
        Ok(buf[1])
    }
}

const fn addr_bytes(offset: u32) -> [u8; 3] {
    [(offset >> 16) as u8, (offset >> 8) as u8, offset as u8]
}

impl<S: SpiDevice> Bus for SpiBus<S> {
    type Error = S::Error;

    fn read_word(&mut self, offset: u32) -> Result<u32, S::Error> {
        let latency = (latency_for_offset(offset) as usize).min(MAX_LATENCY);
        let [a2, a1, a0] = addr_bytes(offset);

        let mut buf = [0u8; (MAX_LATENCY + 1) * 4];
        let len = (latency + 1) * 4;
        self.spi.transaction(&mut [
            Operation::Write(&[CMD_READ, a2, a1, a0, 0x00]),
            Operation::Read(&mut buf[..len]),
        ])?;

        let word = &buf[latency * 4..len];
        Ok(u32::from_le_bytes([word[0], word[1], word[2], word[3]]))
    }

    fn write_word(&mut self, offset: u32, value: u32) -> Result<(), S::Error> {
        self.write_block(offset, &value.to_le_bytes())
    }

    fn write_block(&mut self, offset: u32, data: &[u8]) -> Result<(), S::Error> {
        let [a2, a1, a0] = addr_bytes(offset);
        self.spi.transaction(&mut [
            Operation::Write(&[CMD_WRITE, a2 | WRITE_ADDR_FLAG, a1, a0]),
            Operation::Write(data),
        ])
    }
}

//=============================================================================
// Wake handshake
//=============================================================================

/// Polling limits of the wake handshake.
#[derive(Debug, Clone, Copy)]
pub struct SpiWakeConfig {
    /// Status reads per handshake step before giving up.
    pub attempts: u32,
    /// Delay between status reads (microseconds).
    pub interval_us: u32,
}

impl SpiWakeConfig {
    pub const fn new() -> Self {
        Self {
            attempts: 10,
            interval_us: 1000,
        }
    }
}

impl Default for SpiWakeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Status-register wake handshake.
///
/// Wake: request it in SR2, wait for SR2 to echo the request, then wait for
/// the awake bit in SR1. Sleep: clear SR2.
pub struct SpiWake<D> {
    delay: D,
    config: SpiWakeConfig,
}

impl<D: DelayNs> SpiWake<D> {
    pub fn new(delay: D, config: SpiWakeConfig) -> Self {
        Self { delay, config }
    }

    fn poll<S: SpiDevice>(
        &mut self,
        bus: &mut SpiBus<S>,
        what: &str,
        mut read: impl FnMut(&mut SpiBus<S>) -> Result<bool, S::Error>,
    ) -> Result<(), Error> {
        for _ in 0..self.config.attempts {
            if read(bus).map_err(|_| {
                error!("SPI status read failed waiting for {}", what);
                Error::WakeTimeout
            })? {
                return Ok(());
            }
            self.delay.delay_us(self.config.interval_us);
        }

        error!("Timeout waiting for {}", what);
        Err(Error::WakeTimeout)
    }
}

impl<S: SpiDevice, D: DelayNs> Wake<SpiBus<S>> for SpiWake<D> {
    fn wake(&mut self, bus: &mut SpiBus<S>) -> Result<(), Error> {
        bus.write_sr2(SR2_RPU_WAKEUP_REQ).map_err(|_| {
            error!("SPI write of wake request failed");
            Error::WakeTimeout
        })?;

        self.poll(bus, "wake request", |bus| {
            Ok(bus.read_sr2()? == SR2_RPU_WAKEUP_REQ)
        })?;
        self.poll(bus, "RPU awake", |bus| {
            Ok(bus.read_sr1()? & SR1_RPU_AWAKE != 0)
        })?;

        debug!("RPU woken up");
        Ok(())
    }

    fn sleep(&mut self, bus: &mut SpiBus<S>) -> Result<(), Error> {
        bus.write_sr2(0).map_err(|_| {
            error!("SPI write of sleep request failed");
            Error::WakeTimeout
        })
    }
}

#[cfg(test)]
mod tests;
