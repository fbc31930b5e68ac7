//! Core of an Intel 8088 / NEC V20 PC emulator: the execution engine, the bus dispatch tables and
//! the peripheral interfaces devices plug into.

pub mod address;
pub mod bus;
pub mod components;
pub mod config;
mod cpu;
pub mod error;
pub mod peripheral;
pub mod processor;
pub mod registers;

pub use address::{segment_and_offset, Address, Port, SegmentAndOffset};
pub use config::{CpuConfig, CpuModel};
pub use cpu::{Intel8088, Step};
pub use error::{Error, Result};
pub use peripheral::{Device, DeviceId, InterruptController, InterruptHandler, Peripheral};
pub use processor::{Processor, Stats};
