//! RPU power-save gating for bus accesses.
//!
//! With power save enabled the RPU may drop into sleep between accesses. Every
//! register/memory access then has to run as one unit: take the power-save
//! lock (interrupts disabled), wake the RPU if it is asleep, perform the
//! access, release the lock. The power-management side of the driver takes
//! the same lock before declaring the RPU asleep, so it can never put the
//! device to sleep in the middle of an access.
//!
//! ```rust,ignore
//! use nrf70_hal::power::{PowerSave, PsLock};
//!
//! static PS_LOCK: PsLock = PsLock::new();
//!
//! let power = PowerSave::new(&PS_LOCK, waker);
//! let mut hal = Hal::new(bus, Nrf70AddressMap, power);
//!
//! // From the sleep timer:
//! PS_LOCK.mark_asleep();
//! ```

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::bus::Bus;
use crate::error::Error;

/// Wake handshake with the RPU.
pub trait Wake<B: Bus> {
    /// Bring the RPU out of sleep. Called with the power-save lock held.
    fn wake(&mut self, bus: &mut B) -> Result<(), Error>;

    /// Allow the RPU to go back to sleep. Called with the power-save lock held.
    fn sleep(&mut self, bus: &mut B) -> Result<(), Error>;
}

/// How bus accesses are gated on the RPU power state.
pub trait PowerPolicy<B: Bus> {
    /// Run one bus access `f`, making sure the RPU is awake for its duration.
    fn access<R>(
        &mut self,
        bus: &mut B,
        f: impl FnOnce(&mut B) -> Result<R, Error>,
    ) -> Result<R, Error>;

    /// Put the RPU to sleep.
    fn sleep(&mut self, bus: &mut B) -> Result<(), Error>;
}

/// No power save: accesses go straight to the bus.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOn;

impl<B: Bus> PowerPolicy<B> for AlwaysOn {
    #[inline]
    fn access<R>(
        &mut self,
        bus: &mut B,
        f: impl FnOnce(&mut B) -> Result<R, Error>,
    ) -> Result<R, Error> {
        f(bus)
    }

    #[inline]
    fn sleep(&mut self, _bus: &mut B) -> Result<(), Error> {
        Ok(())
    }
}

/// RPU power state as tracked by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RpuPsState {
    Asleep,
    Awake,
}

/// Power-save lock and state, one per attached RPU.
///
/// Shared between the HAL and whatever part of the driver decides the RPU
/// may sleep; usually lives in a `static`.
pub struct PsLock {
    state: Mutex<CriticalSectionRawMutex, Cell<RpuPsState>>,
}

impl PsLock {
    /// New lock; the RPU is assumed asleep until the first access wakes it.
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(Cell::new(RpuPsState::Asleep)),
        }
    }

    /// Current power state.
    pub fn state(&self) -> RpuPsState {
        self.state.lock(|state| state.get())
    }

    /// Record that the RPU went to sleep.
    ///
    /// Waits for any access in progress; the next access wakes the RPU again.
    pub fn mark_asleep(&self) {
        self.state.lock(|state| state.set(RpuPsState::Asleep));
    }

    fn with<R>(&self, f: impl FnOnce(&Cell<RpuPsState>) -> R) -> R {
        self.state.lock(f)
    }
}

impl Default for PsLock {
    fn default() -> Self {
        Self::new()
    }
}

/// Power save enabled: lock + wake around every access.
pub struct PowerSave<'a, W> {
    lock: &'a PsLock,
    waker: W,
}

impl<'a, W> PowerSave<'a, W> {
    /// Power save sharing `lock`, waking the RPU with `waker`.
    pub fn new(lock: &'a PsLock, waker: W) -> Self {
        Self { lock, waker }
    }

    /// The shared power-save lock.
    pub fn lock(&self) -> &'a PsLock {
        self.lock
    }

    /// The wake handshake implementation.
    pub fn waker(&self) -> &W {
        &self.waker
    }
}

impl<'a, B: Bus, W: Wake<B>> PowerPolicy<B> for PowerSave<'a, W> {
    fn access<R>(
        &mut self,
        bus: &mut B,
        f: impl FnOnce(&mut B) -> Result<R, Error>,
    ) -> Result<R, Error> {
        let waker = &mut self.waker;
        self.lock.with(|state| {
            if state.get() == RpuPsState::Asleep {
                if let Err(e) = waker.wake(bus) {
                    error!("RPU wake failed: {:?}", e);
                    return Err(e);
                }
                trace!("RPU awake");
                state.set(RpuPsState::Awake);
            }
            f(bus)
        })
    }

    fn sleep(&mut self, bus: &mut B) -> Result<(), Error> {
        let waker = &mut self.waker;
        self.lock.with(|state| {
            waker.sleep(bus)?;
            state.set(RpuPsState::Asleep);
            debug!("RPU put to sleep");
            Ok(())
        })
    }
}
