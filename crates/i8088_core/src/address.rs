use std::fmt::{Display, Formatter};

/// A physical address on the memory bus. Only the low 20 bits are significant.
pub type Address = u32;

/// A port number on the IO bus.
pub type Port = u16;

/// Size of the physical address space (1MiB).
pub const ADDRESS_SPACE: usize = 0x100000;

/// Size of the IO port space.
pub const PORT_SPACE: usize = 0x10000;

const ADDRESS_MASK: Address = 0xFFFFF;

/// Return the 20-bit physical address for a segment/offset pair. Addresses past 1MiB wrap around
/// to the start of memory.
#[inline(always)]
pub fn segment_and_offset(segment: u16, offset: u16) -> Address {
    (((segment as Address) << 4) + (offset as Address)) & ADDRESS_MASK
}

/// Represents a location in a segmented memory model.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SegmentAndOffset {
    pub segment: u16,
    pub offset: u16,
}

impl SegmentAndOffset {
    pub fn new(segment: u16, offset: u16) -> Self {
        Self { segment, offset }
    }

    /// Return the 20-bit address value for linear memory access.
    #[inline(always)]
    pub fn flat(&self) -> Address {
        segment_and_offset(self.segment, self.offset)
    }

    /// Move the offset forward, wrapping inside the segment. The segment is never touched.
    #[inline(always)]
    pub fn add_offset(self, count: u16) -> Self {
        Self {
            segment: self.segment,
            offset: self.offset.wrapping_add(count),
        }
    }
}

impl From<u32> for SegmentAndOffset {
    fn from(value: u32) -> Self {
        Self::new((value >> 16) as u16, value as u16)
    }
}

impl From<SegmentAndOffset> for u32 {
    fn from(value: SegmentAndOffset) -> Self {
        ((value.segment as u32) << 16) | value.offset as u32
    }
}

impl Display for SegmentAndOffset {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04X}:{:04X}", self.segment, self.offset)
    }
}
