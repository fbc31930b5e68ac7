use crate::address::{Address, ADDRESS_SPACE};
use crate::bus::Bus;
use crate::error::Result;
use crate::peripheral::{DeviceId, Peripheral};
use crate::processor::Processor;
use tracing::warn;

/// Conventional memory mapped from address 0.
pub struct RandomAccessMemory {
    data: Vec<u8>,
}

impl RandomAccessMemory {
    /// `capacity` is clamped to the 1MiB address space.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity.min(ADDRESS_SPACE)],
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Peripheral for RandomAccessMemory {
    fn name(&self) -> &str {
        "RAM"
    }

    fn install(&mut self, id: DeviceId, processor: &mut dyn Processor) -> Result<()> {
        if self.data.is_empty() {
            return Ok(());
        }
        processor.install_memory_device(id, 0, self.data.len() as Address - 1)
    }

    fn reset(&mut self) {}

    fn step(&mut self, _cycles: usize) -> Result<()> {
        Ok(())
    }
}

impl Bus<Address> for RandomAccessMemory {
    fn read(&mut self, address: Address) -> u8 {
        match self.data.get(address as usize) {
            Some(value) => *value,
            None => {
                warn!("Reading outside of bounds! ({:05X})", address);
                0xFF
            }
        }
    }

    fn write(&mut self, address: Address, value: u8) {
        match self.data.get_mut(address as usize) {
            Some(slot) => *slot = value,
            None => warn!("Writing outside of bounds! ({:05X})", address),
        }
    }
}
