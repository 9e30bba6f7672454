//! RPU MCU cores.

use core::fmt;

use crate::error::Error;

/// MCU core inside the RPU.
///
/// Selects address translation for the processor-restricted memory regions,
/// the boot signature location, the run register and the boot vector table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Processor {
    /// MCU1, lower MAC.
    Lmac = 0,
    /// MCU2, upper MAC.
    Umac = 1,
}

impl Processor {
    /// Context every caller outside a processor-scoped operation can rely on.
    pub const DEFAULT: Processor = Processor::Lmac;

    /// All cores, in boot order.
    pub const ALL: [Processor; 2] = [Processor::Lmac, Processor::Umac];

    /// Short name used in log messages.
    pub const fn as_str(self) -> &'static str {
        match self {
            Processor::Lmac => "LMAC",
            Processor::Umac => "UMAC",
        }
    }
}

impl Default for Processor {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Processor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw processor type as used by the host/RPU interface (0 = LMAC, 1 = UMAC).
impl TryFrom<u32> for Processor {
    type Error = Error;

    fn try_from(raw: u32) -> Result<Self, Error> {
        match raw {
            0 => Ok(Processor::Lmac),
            1 => Ok(Processor::Umac),
            _ => {
                error!("Invalid RPU processor type {}", raw);
                Err(Error::InvalidProcessor { raw })
            }
        }
    }
}

impl From<Processor> for u32 {
    fn from(processor: Processor) -> u32 {
        processor as u32
    }
}
