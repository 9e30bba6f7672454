//! RPU device context and register/memory access.
//!
//! [`Hal`] is the per-RPU context: it owns the bus transport, the address
//! map, the power policy and the processor context (`current_target`) used to
//! translate addresses of processor-restricted memory.
//!
//! Outside a processor-scoped operation the context is always
//! [`Processor::DEFAULT`]. Scoped operations go through [`Hal::target`], whose
//! guard puts the default back when dropped, on every exit path.
//!
//! ```rust,ignore
//! use nrf70_hal::{hal::Hal, memory_map::Nrf70AddressMap, power::AlwaysOn};
//!
//! let mut hal = Hal::new(bus, Nrf70AddressMap, AlwaysOn);
//! let ctrl = hal.reg_read(0xA400_0000)?;
//! hal.reg_write(0xA400_0000, ctrl | 1)?;
//! ```

use core::ops::{Deref, DerefMut};

use crate::bus::Bus;
use crate::error::Error;
use crate::memory_map::{self, AddressMap};
use crate::power::PowerPolicy;
use crate::processor::Processor;

/// Value a register read returns when the bus access went wrong.
///
/// Also a legal register value; a register that really holds all-ones reads
/// back as [`Error::BusFault`].
pub const BUS_FAULT_SENTINEL: u32 = 0xFFFF_FFFF;

/// RPU device context.
pub struct Hal<B, M, P> {
    bus: B,
    map: M,
    power: P,
    current: Processor,
}

impl<B, M, P> Hal<B, M, P> {
    /// Processor context used for address translation right now.
    #[inline]
    pub fn current_target(&self) -> Processor {
        self.current
    }

    /// Bus transport.
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Address map.
    pub fn map(&self) -> &M {
        &self.map
    }

    /// Power policy.
    pub fn power(&self) -> &P {
        &self.power
    }

    /// Tear down the context and give back its parts.
    pub fn release(self) -> (B, M, P) {
        (self.bus, self.map, self.power)
    }

    /// Switch the processor context until the returned guard is dropped.
    ///
    /// The guard restores [`Processor::DEFAULT`], not the previous context.
    pub fn target(&mut self, processor: Processor) -> Target<'_, B, M, P> {
        self.current = processor;
        Target { hal: self }
    }
}

impl<B: Bus, M: AddressMap, P: PowerPolicy<B>> Hal<B, M, P> {
    /// Attach to an RPU. The context starts on [`Processor::DEFAULT`].
    pub fn new(bus: B, map: M, power: P) -> Self {
        Self {
            bus,
            map,
            power,
            current: Processor::DEFAULT,
        }
    }

    /// Read a 32-bit RPU register.
    ///
    /// `addr` must be in register space, otherwise nothing touches the bus.
    /// A read of `0xFFFF_FFFF` is reported as [`Error::BusFault`].
    pub fn reg_read(&mut self, addr: u32) -> Result<u32, Error> {
        let offset = self.reg_offset(addr)?;

        let Self { bus, power, .. } = self;
        let value = power.access(bus, |bus| {
            let value = bus.read_word(offset).map_err(|_| {
                error!("Bus read failed at offset 0x{:06X} (0x{:08X})", offset, addr);
                Error::BusFault { addr }
            })?;

            if value == BUS_FAULT_SENTINEL {
                error!(
                    "Value read at offset 0x{:06X} (0x{:08X}) is 0x{:08X}",
                    offset, addr, value
                );
                return Err(Error::BusFault { addr });
            }

            Ok(value)
        })?;

        trace!("reg read 0x{:08X} = 0x{:08X}", addr, value);
        Ok(value)
    }

    /// Write a 32-bit RPU register. No read-back.
    pub fn reg_write(&mut self, addr: u32, value: u32) -> Result<(), Error> {
        let offset = self.reg_offset(addr)?;

        trace!("reg write 0x{:08X} = 0x{:08X}", addr, value);

        let Self { bus, power, .. } = self;
        power.access(bus, |bus| {
            bus.write_word(offset, value).map_err(|_| {
                error!("Bus write failed at offset 0x{:06X} (0x{:08X})", offset, addr);
                Error::Transport { addr }
            })
        })
    }

    /// Write a block of bytes to RPU memory at `addr`.
    ///
    /// Every failure on this path, translation included, is a
    /// [`Error::WriteFailure`].
    pub fn mem_write(&mut self, addr: u32, data: &[u8]) -> Result<(), Error> {
        if data.is_empty() {
            return Ok(());
        }

        let Some(offset) = self.block_offset(addr, data.len()) else {
            error!(
                "No bus mapping for {} bytes at 0x{:08X} ({})",
                data.len(),
                addr,
                self.current
            );
            return Err(Error::WriteFailure { addr });
        };

        trace!("mem write 0x{:08X} len={}", addr, data.len());

        let Self { bus, power, .. } = self;
        power.access(bus, |bus| {
            bus.write_block(offset, data).map_err(|_| {
                error!("Block write failed at offset 0x{:06X} (0x{:08X})", offset, addr);
                Error::WriteFailure { addr }
            })
        })
    }

    /// Read `buf.len()` words of RPU memory starting at `addr`.
    pub fn mem_read(&mut self, addr: u32, buf: &mut [u32]) -> Result<(), Error> {
        if buf.is_empty() {
            return Ok(());
        }

        let Some(offset) = self.block_offset(addr, buf.len() * 4) else {
            error!("No bus mapping for 0x{:08X} ({})", addr, self.current);
            return Err(Error::TranslationFailure {
                addr,
                processor: self.current,
            });
        };

        let Self { bus, power, .. } = self;
        power.access(bus, |bus| {
            for (i, word) in buf.iter_mut().enumerate() {
                let step = i as u32 * 4;
                *word = bus
                    .read_word(offset + step)
                    .map_err(|_| Error::Transport { addr: addr + step })?;
            }
            Ok(())
        })?;

        trace!("mem read 0x{:08X} words={}", addr, buf.len());
        Ok(())
    }

    /// Let the RPU go to sleep (no-op without power save).
    pub fn sleep(&mut self) -> Result<(), Error> {
        let Self { bus, power, .. } = self;
        power.sleep(bus)
    }

    fn reg_offset(&self, addr: u32) -> Result<u32, Error> {
        if !memory_map::is_reg(addr) {
            error!("Invalid register address 0x{:08X}", addr);
            return Err(Error::InvalidAddress { addr });
        }

        self.map.translate(addr, self.current).ok_or_else(|| {
            error!("Address translation failed for 0x{:08X} ({})", addr, self.current);
            Error::TranslationFailure {
                addr,
                processor: self.current,
            }
        })
    }

    /// Bus offset of `len` bytes at `addr`, only if they are contiguous on the bus.
    fn block_offset(&self, addr: u32, len: usize) -> Option<u32> {
        let last = addr.checked_add(u32::try_from(len - 1).ok()?)?;
        let start = self.map.translate(addr, self.current)?;
        let end = self.map.translate(last, self.current)?;
        (end.wrapping_sub(start) == last - addr).then_some(start)
    }
}

/// Processor context guard returned by [`Hal::target`].
///
/// Dereferences to the [`Hal`]; dropping it switches the context back to
/// [`Processor::DEFAULT`].
pub struct Target<'a, B, M, P> {
    hal: &'a mut Hal<B, M, P>,
}

impl<'a, B, M, P> Deref for Target<'a, B, M, P> {
    type Target = Hal<B, M, P>;

    fn deref(&self) -> &Self::Target {
        self.hal
    }
}

impl<'a, B, M, P> DerefMut for Target<'a, B, M, P> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.hal
    }
}

impl<'a, B, M, P> Drop for Target<'a, B, M, P> {
    fn drop(&mut self) {
        self.hal.current = Processor::DEFAULT;
    }
}
