use crate::address::{Address, ADDRESS_SPACE};
use crate::bus::Bus;
use crate::error::{Error, Result};
use crate::peripheral::{DeviceId, Peripheral};
use crate::processor::Processor;
use std::path::Path;
use tracing::warn;

/// A memory image mapped at a fixed base address. Writes are dropped.
pub struct ReadOnlyMemory {
    name: String,
    base: Address,
    data: Vec<u8>,
}

impl ReadOnlyMemory {
    pub fn from_vec(name: impl Into<String>, base: Address, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            base,
            data,
        }
    }

    /// Load an image so that its last byte sits at the top of the address space, the way a PC
    /// BIOS is mapped.
    pub fn bios(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        if data.is_empty() || data.len() > ADDRESS_SPACE {
            return Err(Error::peripheral(
                "BIOS",
                format!("{} has an invalid size", path.as_ref().display()),
            ));
        }

        let base = (ADDRESS_SPACE - data.len()) as Address;
        Ok(Self::from_vec("BIOS", base, data))
    }

    pub fn base(&self) -> Address {
        self.base
    }
}

impl Peripheral for ReadOnlyMemory {
    fn name(&self) -> &str {
        &self.name
    }

    fn install(&mut self, id: DeviceId, processor: &mut dyn Processor) -> Result<()> {
        if self.data.is_empty() {
            return Err(Error::peripheral(&self.name, "image is empty"));
        }
        let end = self.base + self.data.len() as Address - 1;
        if end as usize >= ADDRESS_SPACE {
            return Err(Error::peripheral(
                &self.name,
                format!("image does not fit at {:05X}", self.base),
            ));
        }
        processor.install_memory_device(id, self.base, end)
    }

    fn reset(&mut self) {}

    fn step(&mut self, _cycles: usize) -> Result<()> {
        Ok(())
    }
}

impl Bus<Address> for ReadOnlyMemory {
    fn read(&mut self, address: Address) -> u8 {
        let value = address
            .checked_sub(self.base)
            .and_then(|offset| self.data.get(offset as usize));

        match value {
            Some(value) => *value,
            None => {
                warn!("Reading outside of bounds! ({:05X})", address);
                0xFF
            }
        }
    }

    fn write(&mut self, address: Address, value: u8) {
        warn!(
            "Writing to read only memory {:02X} -> [{:05X}]",
            value, address
        );
    }
}
