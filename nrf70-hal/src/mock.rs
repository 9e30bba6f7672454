//! Host-side test doubles for the bus, wake handshake and staging allocator.

use std::collections::BTreeMap;
use std::vec::Vec;

use crate::bus::Bus;
use crate::error::Error;
use crate::memory_map::{AddressMap, Nrf70AddressMap};
use crate::patch::StagingAllocator;
use crate::power::Wake;
use crate::processor::Processor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Read { offset: u32 },
    WriteWord { offset: u32, value: u32 },
    WriteBlock { offset: u32, data: Vec<u8> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockBusError;

/// Byte-addressed bus memory recording every operation.
#[derive(Debug, Default)]
pub struct MockBus {
    pub mem: BTreeMap<u32, u8>,
    pub ops: Vec<Op>,
    /// Fail the write with this index (0-based, counting word and block writes).
    pub fail_write_at: Option<usize>,
    pub fail_reads: bool,
    writes: usize,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_write(index: usize) -> Self {
        Self {
            fail_write_at: Some(index),
            ..Self::default()
        }
    }

    pub fn set_word(&mut self, offset: u32, value: u32) {
        for (i, b) in value.to_le_bytes().into_iter().enumerate() {
            self.mem.insert(offset + i as u32, b);
        }
    }

    pub fn word(&self, offset: u32) -> u32 {
        let mut bytes = [0u8; 4];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = self.mem.get(&(offset + i as u32)).copied().unwrap_or(0);
        }
        u32::from_le_bytes(bytes)
    }

    pub fn bytes(&self, offset: u32, len: usize) -> Vec<u8> {
        (0..len as u32)
            .map(|i| self.mem.get(&(offset + i)).copied().unwrap_or(0))
            .collect()
    }

    fn next_write(&mut self) -> Result<(), MockBusError> {
        let index = self.writes;
        self.writes += 1;
        if self.fail_write_at == Some(index) {
            return Err(MockBusError);
        }
        Ok(())
    }
}

impl Bus for MockBus {
    type Error = MockBusError;

    fn read_word(&mut self, offset: u32) -> Result<u32, MockBusError> {
        self.ops.push(Op::Read { offset });
        if self.fail_reads {
            return Err(MockBusError);
        }
        Ok(self.word(offset))
    }

    fn write_word(&mut self, offset: u32, value: u32) -> Result<(), MockBusError> {
        self.next_write()?;
        self.ops.push(Op::WriteWord { offset, value });
        self.set_word(offset, value);
        Ok(())
    }

    fn write_block(&mut self, offset: u32, data: &[u8]) -> Result<(), MockBusError> {
        self.next_write()?;
        self.ops.push(Op::WriteBlock {
            offset,
            data: data.to_vec(),
        });
        for (i, b) in data.iter().enumerate() {
            self.mem.insert(offset + i as u32, *b);
        }
        Ok(())
    }
}

/// nRF70 address map that refuses to translate one address.
#[derive(Debug, Default)]
pub struct MockMap {
    pub unmapped: Option<u32>,
}

impl AddressMap for MockMap {
    fn translate(&self, addr: u32, processor: Processor) -> Option<u32> {
        if self.unmapped == Some(addr) {
            return None;
        }
        Nrf70AddressMap.translate(addr, processor)
    }
}

/// Flat address map: every address is its own bus offset.
#[derive(Debug, Default)]
pub struct IdentityMap;

impl AddressMap for IdentityMap {
    fn translate(&self, addr: u32, _processor: Processor) -> Option<u32> {
        Some(addr)
    }
}

/// Wake handshake that only counts calls.
#[derive(Debug, Default)]
pub struct MockWake {
    pub wakes: usize,
    pub sleeps: usize,
    pub fail: bool,
}

impl<B: Bus> Wake<B> for MockWake {
    fn wake(&mut self, _bus: &mut B) -> Result<(), Error> {
        self.wakes += 1;
        if self.fail {
            return Err(Error::WakeTimeout);
        }
        Ok(())
    }

    fn sleep(&mut self, _bus: &mut B) -> Result<(), Error> {
        self.sleeps += 1;
        Ok(())
    }
}

/// Staging allocator that refuses the allocation with index `fail_at`.
#[derive(Debug)]
pub struct FailingAllocator {
    pub fail_at: usize,
    pub calls: usize,
}

impl FailingAllocator {
    pub fn new(fail_at: usize) -> Self {
        Self { fail_at, calls: 0 }
    }
}

impl StagingAllocator for FailingAllocator {
    fn allocate(&mut self, len: usize) -> Option<Vec<u8>> {
        let index = self.calls;
        self.calls += 1;
        if index == self.fail_at {
            return None;
        }
        Some(Vec::with_capacity(len))
    }
}

/// `len` bytes of a recognisable pattern.
pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
}
