//! Emulation of Intel 8259A programmable interrupt controller.

use crate::address::Port;
use crate::bus::Bus;
use crate::error::Result;
use crate::peripheral::{DeviceId, InterruptController, Peripheral};
use crate::processor::Processor;
use tracing::{debug, warn};

/// ICW1 bit 1: single controller, no ICW3 follows.
const ICW1_SINGLE: u8 = 0x02;
/// ICW1 bit 0: ICW4 follows.
const ICW1_NEEDS_ICW4: u8 = 0x01;

#[derive(Default)]
pub struct ProgrammableInterruptController {
    /// Index of the next ICW expected on the high port. 0 before ICW1, 4 once initialization is
    /// done.
    icw_current: u8,
    icw: [u8; 4],
    imr: u8,
    irr: u8,
    isr: u8,
    /// OCW3 selected the in-service register for reads from the low port.
    read_isr: bool,
}

impl ProgrammableInterruptController {
    /// Vector offset programmed by ICW2.
    pub fn vector_base(&self) -> u8 {
        self.icw[1]
    }

    fn read_low(&self) -> u8 {
        if self.read_isr {
            self.isr
        } else {
            self.irr
        }
    }

    fn read_high(&self) -> u8 {
        self.imr
    }

    fn write_low(&mut self, value: u8) {
        if value & 0x10 != 0 {
            // ICW1 starts the initialization sequence.
            debug!("PIC ICW1: {:#04X}", value);

            self.icw = [value, 0, 0, 0];
            self.icw_current = 1;
            self.imr = 0;
            self.isr = 0;
            self.read_isr = false;
        } else if value & 0x98 == 0x08 {
            // OCW3
            if value & 0x02 != 0 {
                self.read_isr = value & 0x01 != 0;
            }
        } else if value & 0x20 != 0 {
            // OCW2 with an EOI. Every EOI is treated as non-specific.
            if self.isr != 0 {
                self.isr &= self.isr - 1;
            }
        } else {
            warn!("Unsupported PIC command: {:#04X}", value);
        }
    }

    fn write_high(&mut self, value: u8) {
        if (1..4).contains(&self.icw_current) {
            debug!("PIC ICW{}: {:#04X}", self.icw_current + 1, value);

            self.icw[self.icw_current as usize] = value;
            self.icw_current += 1;
            if self.icw_current == 2 && self.icw[0] & ICW1_SINGLE != 0 {
                self.icw_current += 1;
            }
            if self.icw_current == 3 && self.icw[0] & ICW1_NEEDS_ICW4 == 0 {
                self.icw_current += 1;
            }
        } else {
            // We have all the ICW's, so this must be an OCW1 write.
            debug!("PIC mask: {:#04X}", value);
            self.imr = value;
        }
    }
}

impl Peripheral for ProgrammableInterruptController {
    fn name(&self) -> &str {
        "Programmable Interrupt Controller (Intel 8259)"
    }

    fn install(&mut self, id: DeviceId, processor: &mut dyn Processor) -> Result<()> {
        processor.install_io_device(id, 0x20, 0x21)
    }

    fn reset(&mut self) {
        *self = Self::default();
    }

    fn step(&mut self, _cycles: usize) -> Result<()> {
        Ok(())
    }
}

impl InterruptController for ProgrammableInterruptController {
    fn poll_pending(&mut self) -> Option<u8> {
        let pending = self.irr & !self.imr;
        if pending == 0 {
            return None;
        }

        let line = pending.trailing_zeros() as u8;
        self.irr &= !(1 << line);
        self.isr |= 1 << line;

        Some(self.vector_base().wrapping_add(line))
    }

    fn raise_irq(&mut self, line: u8) {
        self.irr |= 1 << (line & 0b111);
    }
}

impl Bus<Port> for ProgrammableInterruptController {
    fn read(&mut self, port: Port) -> u8 {
        if port & 0b1 == 0 {
            self.read_low()
        } else {
            self.read_high()
        }
    }

    fn write(&mut self, port: Port, value: u8) {
        if port & 0b1 == 0 {
            self.write_low(value)
        } else {
            self.write_high(value)
        }
    }
}
