//! Intel 8253 Programmable Interval Timer
//! https://en.wikipedia.org/wiki/Intel_8253

// Base + 0b00 - Channel 0 data port (read/write)
// Base + 0b01 - Channel 1 data port (read/write)
// Base + 0b10 - Channel 2 data port (read/write)
// Base + 0b11 - Mode/Command register (write only, reads are ignored)

// IBM PC/XT 5150 had 1 PIT and it was mapped to base 0x40.

use crate::address::Port;
use crate::bus::Bus;
use crate::error::Result;
use crate::peripheral::{DeviceId, InterruptController, Peripheral};
use crate::processor::Processor;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::debug;

const CHANNEL_COUNT: usize = 3;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ReadWrite {
    #[default]
    Latch,
    LoByte,
    HiByte,
    LoThenHiByte,
}

impl From<u8> for ReadWrite {
    fn from(value: u8) -> Self {
        use ReadWrite::*;

        match value & 0b11 {
            0b00 => Latch,
            0b01 => LoByte,
            0b10 => HiByte,
            _ => LoThenHiByte,
        }
    }
}

/// Control Register Bits
/// | SC1 | SC0 | RW1 | RW0 | M2 | M1 | M0 | BCD |
#[derive(Copy, Clone, Debug)]
struct ControlRegister {
    /// SC - Select Counter
    /// | SC1 | SC0 |
    /// |   0 |   0 | Select counter 0
    /// |   0 |   1 | Select counter 1
    /// |   1 |   0 | Select counter 2
    /// |   1 |   1 | Not applicable on 8253
    select_counter: u8,

    /// RW - Read/write
    /// | RW1 | RW0 |
    /// |   0 |   0 | Counter latch
    /// |   0 |   1 | R/W least significant byte only
    /// |   1 |   0 | R/W most significant bits only
    /// |   1 |   1 | R/W least significant byte first and then most significant byte
    read_write: ReadWrite,

    /// M - Mode, 0 to 5. Every mode counts down and reloads the same way here.
    mode: u8,
}

impl From<u8> for ControlRegister {
    fn from(value: u8) -> Self {
        Self {
            select_counter: value >> 6,
            read_write: ReadWrite::from(value >> 4),
            mode: value >> 1 & 0b111,
        }
    }
}

#[derive(Debug, Default)]
struct Channel {
    read_write: ReadWrite,
    /// Next byte of a lo/hi pair is the high byte.
    toggle: bool,
    /// Counting starts once a reload value was written.
    enabled: bool,
    reload: u16,
    /// Current count. A reload value of 0 counts 65536 ticks.
    count: u32,
    latched: Option<u16>,
}

impl Channel {
    fn effective_reload(&self) -> u32 {
        if self.reload == 0 {
            0x10000
        } else {
            self.reload as u32
        }
    }

    /// Count down `ticks` and return true when terminal count was reached at least once.
    fn tick(&mut self, ticks: u32) -> bool {
        if !self.enabled {
            return false;
        }

        let mut remaining = ticks;
        let mut reached = false;

        while remaining > 0 {
            let step = remaining.min(self.count);
            self.count -= step;
            remaining -= step;

            if self.count == 0 {
                self.count = self.effective_reload();
                reached = true;
            }
        }

        reached
    }

    fn read(&mut self) -> u8 {
        let value = self.latched.unwrap_or(self.count as u16);

        match self.read_write {
            ReadWrite::LoByte => value as u8,
            ReadWrite::HiByte => (value >> 8) as u8,
            ReadWrite::Latch | ReadWrite::LoThenHiByte => {
                self.toggle = !self.toggle;
                if self.toggle {
                    value as u8
                } else {
                    self.latched = None;
                    (value >> 8) as u8
                }
            }
        }
    }

    fn write(&mut self, value: u8) {
        let value = value as u16;

        match self.read_write {
            ReadWrite::LoByte => self.reload = value,
            ReadWrite::HiByte => self.reload = value << 8,
            ReadWrite::Latch | ReadWrite::LoThenHiByte => {
                if self.toggle {
                    self.reload = (self.reload & 0x00FF) | (value << 8);
                } else {
                    self.reload = (self.reload & 0xFF00) | value;
                }
                self.toggle = !self.toggle;
            }
        }

        self.enabled = true;
        self.count = self.effective_reload();
    }
}

/// Driven by CPU cycles: every retired cycle is one timer tick. Channel 0 raises IRQ 0 on the
/// installed interrupt controller each time it reaches terminal count.
#[derive(Default)]
pub struct ProgrammableIntervalTimer8253 {
    channels: [Channel; CHANNEL_COUNT],
    interrupt_controller: Option<Rc<RefCell<dyn InterruptController>>>,
}

impl ProgrammableIntervalTimer8253 {
    fn write_control(&mut self, value: u8) {
        let control = ControlRegister::from(value);
        let Some(channel) = self.channels.get_mut(control.select_counter as usize) else {
            debug!("PIT: ignoring read back command {:#04X}", value);
            return;
        };

        if control.read_write == ReadWrite::Latch {
            // A second latch before the first one is read is ignored.
            if channel.latched.is_none() {
                channel.latched = Some(channel.count as u16);
                channel.toggle = false;
            }
        } else {
            channel.read_write = control.read_write;
            channel.toggle = false;
            channel.enabled = false;

            debug!(
                "PIT: counter {} set to mode {} ({:?})",
                control.select_counter, control.mode, control.read_write
            );
        }
    }
}

impl Peripheral for ProgrammableIntervalTimer8253 {
    fn name(&self) -> &str {
        "Programmable Interval Timer (Intel 8253)"
    }

    fn install(&mut self, id: DeviceId, processor: &mut dyn Processor) -> Result<()> {
        self.interrupt_controller = processor.interrupt_controller();
        processor.install_io_device(id, 0x40, 0x43)
    }

    fn reset(&mut self) {
        self.channels = Default::default();
    }

    fn step(&mut self, cycles: usize) -> Result<()> {
        let ticks = cycles as u32;

        if self.channels[0].tick(ticks) {
            if let Some(controller) = &self.interrupt_controller {
                controller.borrow_mut().raise_irq(0);
            }
        }
        for channel in &mut self.channels[1..] {
            channel.tick(ticks);
        }

        Ok(())
    }
}

impl Bus<Port> for ProgrammableIntervalTimer8253 {
    fn read(&mut self, port: Port) -> u8 {
        match (port & 0b11) as usize {
            CHANNEL_COUNT => 0,
            channel => self.channels[channel].read(),
        }
    }

    fn write(&mut self, port: Port, value: u8) {
        match (port & 0b11) as usize {
            CHANNEL_COUNT => self.write_control(value),
            channel => self.channels[channel].write(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Lines(Vec<u8>);

    impl InterruptController for Lines {
        fn poll_pending(&mut self) -> Option<u8> {
            None
        }

        fn raise_irq(&mut self, line: u8) {
            self.0.push(line);
        }
    }

    fn timer_with_lines() -> (ProgrammableIntervalTimer8253, Rc<RefCell<Lines>>) {
        let lines = Rc::new(RefCell::new(Lines::default()));
        let timer = ProgrammableIntervalTimer8253 {
            interrupt_controller: Some(lines.clone()),
            ..Default::default()
        };
        (timer, lines)
    }

    #[test]
    fn counts_down_after_reload_is_written() {
        let (mut timer, _) = timer_with_lines();

        // Counter 0, lobyte only, mode 0.
        timer.write(0x43, 0b00_01_000_0);
        timer.write(0x40, 64);

        timer.step(10).unwrap();
        assert_eq!(timer.read(0x40), 54);
    }

    #[test]
    fn channel_0_raises_irq_0_on_terminal_count() {
        let (mut timer, lines) = timer_with_lines();

        // Counter 0, lobyte/hibyte, mode 3.
        timer.write(0x43, 0b00_11_011_0);
        timer.write(0x40, 0x10);
        timer.write(0x40, 0x00);

        timer.step(15).unwrap();
        assert!(lines.borrow().0.is_empty());

        timer.step(1).unwrap();
        assert_eq!(lines.borrow().0, vec![0]);

        // Reloaded, so another 16 ticks are needed.
        timer.step(15).unwrap();
        assert_eq!(lines.borrow().0.len(), 1);
    }

    #[test]
    fn other_channels_do_not_interrupt() {
        let (mut timer, lines) = timer_with_lines();

        timer.write(0x43, 0b01_01_010_0);
        timer.write(0x41, 2);
        timer.step(100).unwrap();

        assert!(lines.borrow().0.is_empty());
    }

    #[test]
    fn latched_count_is_read_lo_then_hi() {
        let (mut timer, _) = timer_with_lines();

        timer.write(0x43, 0b10_11_011_0);
        timer.write(0x42, 0x34);
        timer.write(0x42, 0x12);

        timer.write(0x43, 0b10_00_000_0);
        timer.step(4).unwrap();

        assert_eq!(timer.read(0x42), 0x34);
        assert_eq!(timer.read(0x42), 0x12);

        // The latch is released after both bytes were read.
        assert_eq!(timer.read(0x42), 0x30);
    }

    #[test]
    fn disabled_until_programmed() {
        let (mut timer, lines) = timer_with_lines();
        timer.step(0x20000).unwrap();
        assert!(lines.borrow().0.is_empty());
        assert_eq!(timer.read(0x43), 0);
    }
}
