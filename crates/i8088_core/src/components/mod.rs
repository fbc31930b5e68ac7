mod pic;
mod pit;
mod ram;
mod rom;

pub use pic::ProgrammableInterruptController;
pub use pit::ProgrammableIntervalTimer8253;
pub use ram::RandomAccessMemory;
pub use rom::ReadOnlyMemory;
