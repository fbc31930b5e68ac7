use crate::config::Config;
use i8088_core::components::{
    ProgrammableInterruptController, ProgrammableIntervalTimer8253, RandomAccessMemory,
    ReadOnlyMemory,
};
use i8088_core::registers::Flags;
use i8088_core::{Device, Error, Intel8088};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Cycles per second of the IBM PC 5150. Stats are reported at this interval.
const CLOCK_SPEED: u64 = 4_772_727;

/// Instructions between two checks of the speed limit.
const THROTTLE_INTERVAL: u64 = 10_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// A debug break was requested, by an invalid op code or a peripheral.
    Break,
    /// HLT with interrupts disabled, nothing can wake the processor.
    Halted,
    InstructionLimit,
}

pub struct Emulator {
    cpu: Intel8088,
    mips: Option<f64>,
    max_instructions: Option<u64>,
}

impl Emulator {
    pub fn new(config: &Config) -> Result<Self, Box<dyn std::error::Error>> {
        let bios_path = config.bios.as_ref().ok_or("no BIOS image given")?;
        info!("Loading BIOS from: {}", bios_path.display());
        let bios = ReadOnlyMemory::bios(bios_path)?;
        info!("BIOS mapped at {:05X}", bios.base());

        let ram = Rc::new(RefCell::new(RandomAccessMemory::with_capacity(config.ram_size)));
        let bios = Rc::new(RefCell::new(bios));
        let pic = Rc::new(RefCell::new(ProgrammableInterruptController::default()));
        let pit = Rc::new(RefCell::new(ProgrammableIntervalTimer8253::default()));

        let devices = vec![
            Device::builder(ram).memory().build(),
            Device::builder(bios).memory().build(),
            Device::builder(pic).io().interrupt_controller().build(),
            Device::builder(pit).io().build(),
        ];

        let (mut cpu, errors) = Intel8088::new(config.cpu(), devices);
        if let Some(err) = errors.into_iter().next() {
            return Err(err.into());
        }

        cpu.reset();

        Ok(Self {
            cpu,
            mips: config.mips,
            max_instructions: config.max_instructions,
        })
    }

    /// Step the processor until something stops it.
    pub fn run(&mut self) -> Result<StopReason, Error> {
        let start = Instant::now();
        let mut instructions = 0u64;
        let mut cycles = 0u64;
        let mut next_report = CLOCK_SPEED;

        loop {
            let step = self.cpu.step()?;
            instructions += 1;
            cycles += step.cycles() as u64;

            if self.cpu.registers().debug {
                self.cpu.registers_mut().debug = false;
                info!("Debug break\n{}", self.cpu.registers());
                return Ok(StopReason::Break);
            }

            if step.is_halted() && !self.cpu.registers().flags.contains(Flags::INTERRUPT) {
                info!("Halted with interrupts disabled\n{}", self.cpu.registers());
                return Ok(StopReason::Halted);
            }

            if matches!(self.max_instructions, Some(limit) if instructions >= limit) {
                return Ok(StopReason::InstructionLimit);
            }

            if cycles >= next_report {
                next_report += CLOCK_SPEED;
                let stats = self.cpu.take_stats();
                info!(
                    "instructions: {}, interrupts: {}, nops: {}, rx: {}, tx: {}",
                    stats.instructions, stats.interrupts, stats.nops, stats.rx, stats.tx
                );
            }

            if instructions % THROTTLE_INTERVAL == 0 {
                if let Some(mips) = self.mips.filter(|mips| *mips > 0.0) {
                    let expected = Duration::from_secs_f64(instructions as f64 / (mips * 1e6));
                    if let Some(ahead) = expected.checked_sub(start.elapsed()) {
                        std::thread::sleep(ahead);
                    }
                }
            }
        }
    }

    pub fn close(mut self) {
        for err in self.cpu.close() {
            error!("{}", err);
        }
    }
}
