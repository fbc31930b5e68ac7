//! Lifecycle and capability traits for everything that plugs into the processor's buses.

use crate::address::{Address, Port};
use crate::bus::{Bus, SharedBus};
use crate::error::Result;
use crate::processor::Processor;
use std::cell::RefCell;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

/// Slot number of a registered peripheral. Slot 0 belongs to the unmapped fallback device, so a
/// valid id is always in `1..MAX_PERIPHERALS`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DeviceId(u8);

impl DeviceId {
    pub fn new(slot: usize) -> Self {
        Self(slot as u8)
    }

    pub(crate) fn from_slot(slot: u8) -> Option<Self> {
        if slot == 0 {
            None
        } else {
            Some(Self(slot))
        }
    }

    #[inline(always)]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl Display for DeviceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub trait Peripheral {
    fn name(&self) -> &str;

    /// Called once in registration order. Devices map their address ranges here using the id
    /// they were given.
    ///
    /// Devices that move data between IO and memory keep the handles they need from
    /// [`Processor::memory_device`] here, since [`Bus`] and [`Peripheral::step`] get no processor.
    fn install(&mut self, id: DeviceId, processor: &mut dyn Processor) -> Result<()>;

    fn reset(&mut self);

    /// Called once per executed instruction with the number of cycles it took. Must never block.
    fn step(&mut self, cycles: usize) -> Result<()>;

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Source of hardware interrupt vectors.
pub trait InterruptController {
    /// Return the vector of the highest priority pending request and mark it as in service.
    fn poll_pending(&mut self) -> Option<u8>;

    fn raise_irq(&mut self, line: u8);
}

/// Software hook for an interrupt vector, e.g. BIOS services implemented natively.
///
/// A handler that also maps memory or IO is busy while it runs. Its writes to its own range
/// through the processor land when it returns, and reads of that range see the open bus, so it
/// should use its own state directly.
pub trait InterruptHandler {
    /// Return `Err(Error::InterruptNotHandled)` to fall through to the vector table.
    fn handle_interrupt(&mut self, vector: u8, processor: &mut dyn Processor) -> Result<()>;
}

/// Registration record for a peripheral along with every capability it provides.
pub struct Device {
    name: String,
    pub(crate) peripheral: Rc<RefCell<dyn Peripheral>>,
    pub(crate) memory: Option<SharedBus<Address>>,
    pub(crate) io: Option<SharedBus<Port>>,
    pub(crate) interrupt_controller: Option<Rc<RefCell<dyn InterruptController>>>,
    pub(crate) interrupt_handler: Option<Rc<RefCell<dyn InterruptHandler>>>,
}

impl Device {
    pub fn builder<P: Peripheral + 'static>(peripheral: Rc<RefCell<P>>) -> DeviceBuilder<P> {
        let name = peripheral.borrow().name().to_owned();
        DeviceBuilder {
            device: Device {
                name,
                peripheral: Rc::clone(&peripheral) as Rc<RefCell<dyn Peripheral>>,
                memory: None,
                io: None,
                interrupt_controller: None,
                interrupt_handler: None,
            },
            peripheral,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

pub struct DeviceBuilder<P> {
    peripheral: Rc<RefCell<P>>,
    device: Device,
}

impl<P: Peripheral + 'static> DeviceBuilder<P> {
    pub fn memory(mut self) -> Self
    where
        P: Bus<Address>,
    {
        self.device.memory = Some(Rc::clone(&self.peripheral) as SharedBus<Address>);
        self
    }

    pub fn io(mut self) -> Self
    where
        P: Bus<Port>,
    {
        self.device.io = Some(Rc::clone(&self.peripheral) as SharedBus<Port>);
        self
    }

    pub fn interrupt_controller(mut self) -> Self
    where
        P: InterruptController,
    {
        self.device.interrupt_controller =
            Some(Rc::clone(&self.peripheral) as Rc<RefCell<dyn InterruptController>>);
        self
    }

    pub fn interrupt_handler(mut self) -> Self
    where
        P: InterruptHandler,
    {
        self.device.interrupt_handler =
            Some(Rc::clone(&self.peripheral) as Rc<RefCell<dyn InterruptHandler>>);
        self
    }

    pub fn build(self) -> Device {
        self.device
    }
}
