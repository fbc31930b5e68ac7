use crate::address::{Address, Port, ADDRESS_SPACE, PORT_SPACE};
use crate::error::{Error, Result};
use crate::peripheral::DeviceId;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, warn};

/// Maximum number of device slots on the bus. Slot 0 is always the unmapped fallback device.
pub const MAX_PERIPHERALS: usize = 32;

/// An object where bytes can be read from or written to. Memory devices implement
/// `Bus<Address>` and IO devices implement `Bus<Port>`.
pub trait Bus<A> {
    fn read(&mut self, address: A) -> u8;
    fn write(&mut self, address: A, value: u8);
}

pub type SharedBus<A> = Rc<RefCell<dyn Bus<A>>>;

/// Answers every access that no installed device claims. Unmapped buses float high.
#[derive(Default)]
pub struct UnmappedDevice;

impl Bus<Address> for UnmappedDevice {
    fn read(&mut self, address: Address) -> u8 {
        debug!("Reading from unmapped memory: [{:05X}]", address);
        0xFF
    }

    fn write(&mut self, address: Address, value: u8) {
        debug!("Writing to unmapped memory: {:02X} -> [{:05X}]", value, address);
    }
}

impl Bus<Port> for UnmappedDevice {
    fn read(&mut self, port: Port) -> u8 {
        debug!("Reading from unmapped port: [{:04X}]", port);
        0xFF
    }

    fn write(&mut self, port: Port, value: u8) {
        debug!("Writing to unmapped port: {:02X} -> [{:04X}]", value, port);
    }
}

/// Dispatch tables routing every memory address and IO port to a device slot.
///
/// A device is busy while it runs one of its own callbacks (`install` or `handle_interrupt`).
/// Writes that land on a busy device are held back until [`DeviceMap::flush_deferred`] and reads
/// from it see the open bus.
pub struct DeviceMap {
    memory_map: Box<[u8]>,
    io_map: Box<[u8]>,

    memory_devices: Vec<SharedBus<Address>>,
    io_devices: Vec<SharedBus<Port>>,

    /// Bit per slot that registered the memory capability.
    memory_slots: u32,
    /// Bit per slot that registered the IO capability.
    io_slots: u32,

    deferred_memory: RefCell<Vec<(Address, u8)>>,
    deferred_io: RefCell<Vec<(Port, u8)>>,
}

impl Default for DeviceMap {
    fn default() -> Self {
        let unmapped = Rc::new(RefCell::new(UnmappedDevice));

        let memory_devices = (0..MAX_PERIPHERALS)
            .map(|_| Rc::clone(&unmapped) as SharedBus<Address>)
            .collect();
        let io_devices = (0..MAX_PERIPHERALS)
            .map(|_| Rc::clone(&unmapped) as SharedBus<Port>)
            .collect();

        Self {
            memory_map: vec![0; ADDRESS_SPACE].into_boxed_slice(),
            io_map: vec![0; PORT_SPACE].into_boxed_slice(),
            memory_devices,
            io_devices,
            memory_slots: 0,
            io_slots: 0,
            deferred_memory: RefCell::default(),
            deferred_io: RefCell::default(),
        }
    }
}

impl DeviceMap {
    pub fn register_memory(&mut self, id: DeviceId, device: SharedBus<Address>) {
        self.memory_devices[id.index()] = device;
        self.memory_slots |= 1 << id.index();
    }

    pub fn register_io(&mut self, id: DeviceId, device: SharedBus<Port>) {
        self.io_devices[id.index()] = device;
        self.io_slots |= 1 << id.index();
    }

    /// Map the inclusive range `from..=to` to the memory device in slot `id`.
    pub fn install_memory(&mut self, id: DeviceId, from: Address, to: Address) -> Result<()> {
        let slot = self.memory_slot_for(id)?;
        for address in from..=to {
            self.memory_map[Self::memory_index(address)] = slot;
        }
        Ok(())
    }

    pub fn install_memory_at(&mut self, id: DeviceId, addresses: &[Address]) -> Result<()> {
        let slot = self.memory_slot_for(id)?;
        for &address in addresses {
            self.memory_map[Self::memory_index(address)] = slot;
        }
        Ok(())
    }

    /// Map the inclusive port range `from..=to` to the IO device in slot `id`.
    pub fn install_io(&mut self, id: DeviceId, from: Port, to: Port) -> Result<()> {
        let slot = self.io_slot_for(id)?;
        for port in from..=to {
            self.io_map[port as usize] = slot;
        }
        Ok(())
    }

    pub fn install_io_at(&mut self, id: DeviceId, ports: &[Port]) -> Result<()> {
        let slot = self.io_slot_for(id)?;
        for &port in ports {
            self.io_map[port as usize] = slot;
        }
        Ok(())
    }

    /// The slot mapped at `address`, or `None` when it falls through to the unmapped device.
    pub fn memory_slot(&self, address: Address) -> Option<DeviceId> {
        DeviceId::from_slot(self.memory_map[Self::memory_index(address)])
    }

    pub fn io_slot(&self, port: Port) -> Option<DeviceId> {
        DeviceId::from_slot(self.io_map[port as usize])
    }

    pub fn memory_device(&self, address: Address) -> SharedBus<Address> {
        let slot = self.memory_map[Self::memory_index(address)];
        Rc::clone(&self.memory_devices[slot as usize])
    }

    pub fn io_device(&self, port: Port) -> SharedBus<Port> {
        Rc::clone(&self.io_devices[self.io_map[port as usize] as usize])
    }

    #[inline(always)]
    pub fn read(&self, address: Address) -> u8 {
        let address = address & (ADDRESS_SPACE as Address - 1);
        let slot = self.memory_map[address as usize] as usize;
        match self.memory_devices[slot].try_borrow_mut() {
            Ok(mut device) => device.read(address),
            Err(_) => {
                warn!("Reading [{:05X}] from busy device #{}", address, slot);
                0xFF
            }
        }
    }

    #[inline(always)]
    pub fn write(&self, address: Address, value: u8) {
        let address = address & (ADDRESS_SPACE as Address - 1);
        let slot = self.memory_map[address as usize] as usize;
        match self.memory_devices[slot].try_borrow_mut() {
            Ok(mut device) => device.write(address, value),
            Err(_) => {
                debug!(
                    "Deferring write {:02X} -> [{:05X}] to busy device #{}",
                    value, address, slot
                );
                self.deferred_memory.borrow_mut().push((address, value));
            }
        }
    }

    #[inline(always)]
    pub fn input(&self, port: Port) -> u8 {
        let slot = self.io_map[port as usize] as usize;
        match self.io_devices[slot].try_borrow_mut() {
            Ok(mut device) => device.read(port),
            Err(_) => {
                warn!("Reading port [{:04X}] from busy device #{}", port, slot);
                0xFF
            }
        }
    }

    #[inline(always)]
    pub fn output(&self, port: Port, value: u8) {
        let slot = self.io_map[port as usize] as usize;
        match self.io_devices[slot].try_borrow_mut() {
            Ok(mut device) => device.write(port, value),
            Err(_) => {
                debug!(
                    "Deferring output {:02X} -> [{:04X}] to busy device #{}",
                    value, port, slot
                );
                self.deferred_io.borrow_mut().push((port, value));
            }
        }
    }

    /// Replay writes that were held back while their device was busy, in the order they were
    /// made. Call once the device is released.
    pub fn flush_deferred(&self) {
        let memory = std::mem::take(&mut *self.deferred_memory.borrow_mut());
        for (address, value) in memory {
            self.write(address, value);
        }

        let io = std::mem::take(&mut *self.deferred_io.borrow_mut());
        for (port, value) in io {
            self.output(port, value);
        }
    }

    fn memory_slot_for(&self, id: DeviceId) -> Result<u8> {
        if self.memory_slots & (1 << id.index()) == 0 {
            return Err(Error::DeviceNotFound(id));
        }
        Ok(id.index() as u8)
    }

    fn io_slot_for(&self, id: DeviceId) -> Result<u8> {
        if self.io_slots & (1 << id.index()) == 0 {
            return Err(Error::DeviceNotFound(id));
        }
        Ok(id.index() as u8)
    }

    #[inline(always)]
    fn memory_index(address: Address) -> usize {
        (address & (ADDRESS_SPACE as Address - 1)) as usize
    }
}
