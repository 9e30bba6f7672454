//! Raw bus transport between host and RPU.
//!
//! Offsets are untranslated and unvalidated: callers go through
//! [`Hal`](crate::hal::Hal), which checks and translates RPU addresses first.

/// Host interface transport (SPI, QSPI, ...).
pub trait Bus {
    /// Transport error.
    type Error: core::fmt::Debug;

    /// Read one 32-bit word at bus `offset`.
    fn read_word(&mut self, offset: u32) -> Result<u32, Self::Error>;

    /// Write one 32-bit word at bus `offset`.
    fn write_word(&mut self, offset: u32, value: u32) -> Result<(), Self::Error>;

    /// Write a block of bytes starting at bus `offset`.
    fn write_block(&mut self, offset: u32, data: &[u8]) -> Result<(), Self::Error>;
}

impl<B: Bus + ?Sized> Bus for &mut B {
    type Error = B::Error;

    #[inline]
    fn read_word(&mut self, offset: u32) -> Result<u32, Self::Error> {
        B::read_word(self, offset)
    }

    #[inline]
    fn write_word(&mut self, offset: u32, value: u32) -> Result<(), Self::Error> {
        B::write_word(self, offset, value)
    }

    #[inline]
    fn write_block(&mut self, offset: u32, data: &[u8]) -> Result<(), Self::Error> {
        B::write_block(self, offset, data)
    }
}
