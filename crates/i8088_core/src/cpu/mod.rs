//! The execution engine.
//!
//! [`Intel8088`] owns the register file, the memory/IO dispatch tables and the roster of
//! installed peripherals. Each call to [`Intel8088::step`] runs exactly one instruction (or one
//! complete REP sequence) and then ticks every peripheral.

mod calc;
mod decode;
mod groups;
mod ops;
mod string;

use crate::address::{Address, Port, SegmentAndOffset};
use crate::bus::{DeviceMap, SharedBus, MAX_PERIPHERALS};
use crate::config::CpuConfig;
use crate::error::{Error, Result};
use crate::peripheral::{Device, DeviceId, InterruptController, InterruptHandler};
use crate::processor::{Processor, Stats};
use crate::registers::{Flags, Registers};
use decode::{InstructionState, Repeat};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{error, info, trace, warn};

/// Outcome of a successful [`Intel8088::step`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Executed { cycles: usize },
    /// HLT was executed. IP points back at the HLT byte.
    Halted { cycles: usize },
}

impl Step {
    pub fn cycles(&self) -> usize {
        match *self {
            Step::Executed { cycles } | Step::Halted { cycles } => cycles,
        }
    }

    pub fn is_halted(&self) -> bool {
        matches!(self, Step::Halted { .. })
    }
}

pub struct Intel8088 {
    registers: Registers,
    config: CpuConfig,
    state: InstructionState,

    /// Trap flag as it was before the last instruction ran.
    trap: bool,

    devices: Vec<Device>,
    map: DeviceMap,
    interrupt_controller: Option<Rc<RefCell<dyn InterruptController>>>,
    interrupt_handlers: Vec<Option<Rc<RefCell<dyn InterruptHandler>>>>,

    stats: Stats,
}

impl Intel8088 {
    /// Build the processor and install every device in the order given. Installation keeps going
    /// when a device fails; every error is returned so the caller can decide what is fatal.
    pub fn new(config: CpuConfig, mut devices: Vec<Device>) -> (Self, Vec<Error>) {
        let mut errors = vec![];

        // Slot 0 belongs to the unmapped device.
        if devices.len() >= MAX_PERIPHERALS {
            error!(
                "{} peripherals registered, dropping everything after the first {}",
                devices.len(),
                MAX_PERIPHERALS - 1
            );
            devices.truncate(MAX_PERIPHERALS - 1);
            errors.push(Error::TooManyPeripherals(MAX_PERIPHERALS - 1));
        }

        let mut map = DeviceMap::default();
        let mut interrupt_controller = None;

        for (index, device) in devices.iter().enumerate() {
            let id = DeviceId::new(index + 1);

            if let Some(memory) = &device.memory {
                map.register_memory(id, Rc::clone(memory));
            }
            if let Some(io) = &device.io {
                map.register_io(id, Rc::clone(io));
            }
            if interrupt_controller.is_none() {
                interrupt_controller = device.interrupt_controller.clone();
            }
        }

        let mut cpu = Self {
            registers: Registers::default(),
            config,
            state: InstructionState::default(),
            trap: false,
            devices,
            map,
            interrupt_controller,
            interrupt_handlers: vec![None; 0x100],
            stats: Stats::default(),
        };
        cpu.registers.reset();

        for index in 0..cpu.devices.len() {
            let id = DeviceId::new(index + 1);
            let name = cpu.devices[index].name().to_owned();
            let peripheral = Rc::clone(&cpu.devices[index].peripheral);

            info!("Installing {} ({})", name, id);
            let result = peripheral.borrow_mut().install(id, &mut cpu);
            cpu.map.flush_deferred();
            if let Err(err) = result {
                error!("Could not install {}: {}", name, err);
                errors.push(err);
            }
        }

        (cpu, errors)
    }

    pub fn config(&self) -> &CpuConfig {
        &self.config
    }

    /// Reset the registers and every peripheral. Execution restarts at the boot vector FFFF:0000.
    pub fn reset(&mut self) {
        self.registers.reset();
        self.registers.set_cs(0xFFFF);
        self.state = InstructionState::default();
        self.trap = false;

        for device in &self.devices {
            info!("Resetting {}", device.name());
            device.peripheral.borrow_mut().reset();
        }
    }

    /// Run the next instruction and tick every peripheral once.
    pub fn step(&mut self) -> Result<Step> {
        self.state.cycles = 0;
        self.state.halted = false;

        if self.trap {
            self.interrupt(1)?;
        }
        self.trap = self.registers.flags.contains(Flags::TRAP);

        if !self.trap && self.registers.flags.contains(Flags::INTERRUPT) {
            if let Some(controller) = self.interrupt_controller.clone() {
                let pending = controller.borrow_mut().poll_pending();
                if let Some(vector) = pending {
                    self.interrupt(vector)?;
                }
            }
        }

        self.parse_opcode();

        if self.state.repeat != Repeat::None && self.is_repeatable() {
            self.repeat()?;
        } else {
            self.state.repeat = Repeat::None;
            self.execute()?;
        }

        let cycles = self.state.cycles;
        for index in 0..self.devices.len() {
            let peripheral = Rc::clone(&self.devices[index].peripheral);
            let result = peripheral.borrow_mut().step(cycles);
            result?;
        }

        self.stats.instructions += 1;

        Ok(if self.state.halted {
            Step::Halted { cycles }
        } else {
            Step::Executed { cycles }
        })
    }

    /// Run the decoded op code once. All instructions take a single cycle.
    pub(crate) fn execute(&mut self) -> Result<()> {
        self.state.cycles += 1;
        self.execute_op_code(self.state.op_code)
    }

    /// Give every peripheral a chance to release its resources. Errors are collected and every
    /// device is closed regardless.
    pub fn close(&mut self) -> Vec<Error> {
        let mut errors = vec![];

        for device in &self.devices {
            info!("Closing {}", device.name());
            if let Err(err) = device.peripheral.borrow_mut().close() {
                error!("Could not close {}: {}", device.name(), err);
                errors.push(err);
            }
        }

        errors
    }

    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.registers
    }

    /// Return the counters collected since the last call.
    pub fn take_stats(&mut self) -> Stats {
        std::mem::take(&mut self.stats)
    }

    fn device(&self, id: DeviceId) -> Option<&Device> {
        id.index()
            .checked_sub(1)
            .and_then(|index| self.devices.get(index))
    }

    pub(crate) fn push(&mut self, value: u16) {
        let sp = self.registers.sp().wrapping_sub(2);
        self.registers.set_sp(sp);
        self.write_memory_word(SegmentAndOffset::new(self.registers.ss(), sp), value);
    }

    pub(crate) fn pop(&mut self) -> u16 {
        let sp = self.registers.sp();
        let value = self.read_memory_word(SegmentAndOffset::new(self.registers.ss(), sp));
        self.registers.set_sp(sp.wrapping_add(2));
        value
    }

    /// Deliver interrupt `vector`. An installed handler gets the first go; when it reports
    /// [`Error::InterruptNotHandled`] the interrupt is taken through the vector table.
    pub(crate) fn interrupt(&mut self, vector: u8) -> Result<()> {
        self.stats.interrupts += 1;

        if let Some(handler) = self.interrupt_handlers[vector as usize].clone() {
            let result = handler.borrow_mut().handle_interrupt(vector, self);
            self.map.flush_deferred();
            match result {
                Ok(()) => {
                    self.registers
                        .flags
                        .remove(Flags::TRAP | Flags::INTERRUPT);
                    return Ok(());
                }
                Err(Error::InterruptNotHandled) => {}
                Err(err) => return Err(err),
            }
        }

        trace!("INT {:02X}", vector);

        self.push(self.registers.flags.store());
        self.push(self.registers.cs());
        self.push(self.registers.ip);

        let entry = SegmentAndOffset::new(0, vector as u16 * 4);
        let ip = self.read_memory_word(entry);
        let cs = self.read_memory_word(entry.add_offset(2));
        self.registers.ip = ip;
        self.registers.set_cs(cs);

        self.registers
            .flags
            .remove(Flags::TRAP | Flags::INTERRUPT);

        Ok(())
    }

    /// Divide error. IP goes back to the start of the instruction so a blind resume faults again.
    pub(crate) fn divide_fault(&mut self) -> Result<()> {
        self.registers.ip = self.state.decode_at;
        self.interrupt(0)
    }

    pub(crate) fn invalid_opcode(&mut self) -> Result<()> {
        warn!(
            "Invalid op code {:02X} at {:04X}:{:04X}",
            self.state.op_code,
            self.registers.cs(),
            self.state.decode_at
        );

        if self.config.is_v20() {
            self.registers.ip = self.state.decode_at;
            self.interrupt(6)
        } else {
            if self.config.break_on_invalid {
                self.registers.debug = true;
            }
            Ok(())
        }
    }
}

impl Processor for Intel8088 {
    fn read_byte(&mut self, address: Address) -> u8 {
        self.stats.rx += 1;
        self.map.read(address)
    }

    fn write_byte(&mut self, address: Address, value: u8) {
        self.stats.tx += 1;
        self.map.write(address, value)
    }

    fn in_byte(&mut self, port: Port) -> u8 {
        self.stats.rx += 1;
        self.map.input(port)
    }

    fn out_byte(&mut self, port: Port, value: u8) {
        self.stats.tx += 1;
        self.map.output(port, value)
    }

    fn registers(&self) -> &Registers {
        &self.registers
    }

    fn registers_mut(&mut self) -> &mut Registers {
        &mut self.registers
    }

    fn install_memory_device(&mut self, id: DeviceId, from: Address, to: Address) -> Result<()> {
        self.map.install_memory(id, from, to)
    }

    fn install_memory_device_at(&mut self, id: DeviceId, addresses: &[Address]) -> Result<()> {
        self.map.install_memory_at(id, addresses)
    }

    fn install_io_device(&mut self, id: DeviceId, from: Port, to: Port) -> Result<()> {
        self.map.install_io(id, from, to)
    }

    fn install_io_device_at(&mut self, id: DeviceId, ports: &[Port]) -> Result<()> {
        self.map.install_io_at(id, ports)
    }

    fn install_interrupt_handler(&mut self, id: DeviceId, vector: u8) -> Result<()> {
        let handler = self
            .device(id)
            .and_then(|device| device.interrupt_handler.clone())
            .ok_or(Error::DeviceNotFound(id))?;
        self.interrupt_handlers[vector as usize] = Some(handler);
        Ok(())
    }

    fn interrupt_controller(&self) -> Option<Rc<RefCell<dyn InterruptController>>> {
        self.interrupt_controller.clone()
    }

    fn mapped_memory_device(&self, address: Address) -> Option<DeviceId> {
        self.map.memory_slot(address)
    }

    fn mapped_io_device(&self, port: Port) -> Option<DeviceId> {
        self.map.io_slot(port)
    }

    fn memory_device(&self, address: Address) -> SharedBus<Address> {
        self.map.memory_device(address)
    }

    fn io_device(&self, port: Port) -> SharedBus<Port> {
        self.map.io_device(port)
    }

    fn device_name(&self, id: DeviceId) -> Option<&str> {
        self.device(id).map(Device::name)
    }

    fn request_break(&mut self) {
        self.registers.debug = true;
    }

    fn take_stats(&mut self) -> Stats {
        Intel8088::take_stats(self)
    }
}
