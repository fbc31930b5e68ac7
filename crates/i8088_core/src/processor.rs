use crate::address::{Address, Port};
use crate::bus::SharedBus;
use crate::error::Result;
use crate::peripheral::{DeviceId, InterruptController};
use crate::registers::Registers;
use std::cell::RefCell;
use std::rc::Rc;

/// Counters collected while running.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub interrupts: u64,
    pub instructions: u64,
    /// Bytes read from memory or IO.
    pub rx: u64,
    /// Bytes written to memory or IO.
    pub tx: u64,
    pub nops: u64,
}

/// What peripherals and the run loop get to see of the processor.
pub trait Processor {
    fn read_byte(&mut self, address: Address) -> u8;
    fn write_byte(&mut self, address: Address, value: u8);

    fn read_word(&mut self, address: Address) -> u16 {
        let lo = self.read_byte(address);
        let hi = self.read_byte(address.wrapping_add(1));
        u16::from_le_bytes([lo, hi])
    }

    fn write_word(&mut self, address: Address, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.write_byte(address, lo);
        self.write_byte(address.wrapping_add(1), hi);
    }

    fn in_byte(&mut self, port: Port) -> u8;
    fn out_byte(&mut self, port: Port, value: u8);

    fn in_word(&mut self, port: Port) -> u16 {
        let lo = self.in_byte(port);
        let hi = self.in_byte(port.wrapping_add(1));
        u16::from_le_bytes([lo, hi])
    }

    fn out_word(&mut self, port: Port, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.out_byte(port, lo);
        self.out_byte(port.wrapping_add(1), hi);
    }

    fn registers(&self) -> &Registers;
    fn registers_mut(&mut self) -> &mut Registers;

    fn install_memory_device(&mut self, id: DeviceId, from: Address, to: Address) -> Result<()>;
    fn install_memory_device_at(&mut self, id: DeviceId, addresses: &[Address]) -> Result<()>;
    fn install_io_device(&mut self, id: DeviceId, from: Port, to: Port) -> Result<()>;
    fn install_io_device_at(&mut self, id: DeviceId, ports: &[Port]) -> Result<()>;

    /// Route interrupt `vector` to the interrupt handler capability of device `id`.
    fn install_interrupt_handler(&mut self, id: DeviceId, vector: u8) -> Result<()>;

    fn interrupt_controller(&self) -> Option<Rc<RefCell<dyn InterruptController>>>;

    fn mapped_memory_device(&self, address: Address) -> Option<DeviceId>;
    fn mapped_io_device(&self, port: Port) -> Option<DeviceId>;
    fn memory_device(&self, address: Address) -> SharedBus<Address>;
    fn io_device(&self, port: Port) -> SharedBus<Port>;
    fn device_name(&self, id: DeviceId) -> Option<&str>;

    /// Stop execution for inspection at the end of the current step.
    fn request_break(&mut self);

    /// Return the counters collected since the last call and reset them.
    fn take_stats(&mut self) -> Stats;
}
