//! # Frame List
//!
//! The frame list is the array of link pointers the controller fetches
//! by DMA at the start of every 1 ms frame. While the controller is not
//! running, every entry must carry the terminate bit, so that the first
//! frames after a resume do not walk a schedule that may not be valid
//! yet.

use std::fmt::Debug;

use super::constants::frame_list::{ENTRIES, TERMINATE};

/// One entry of the frame list: a link pointer with the terminate flag
/// in bit 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct FrameListEntry(u32);

impl FrameListEntry {
    /// Wrap a raw little-endian link pointer.
    #[must_use]
    pub const fn from_raw(value: u32) -> Self {
        Self(value)
    }

    /// The raw link pointer, as the controller reads it.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Whether the controller skips this entry.
    #[must_use]
    pub const fn is_terminated(self) -> bool {
        self.0 & TERMINATE != 0
    }

    /// The same pointer with the terminate flag set or cleared.
    #[must_use]
    pub const fn with_terminate(self, terminate: bool) -> Self {
        if terminate {
            Self(self.0 | TERMINATE)
        } else {
            Self(self.0 & !TERMINATE)
        }
    }
}

/// Access to the frame list of a controller.
pub trait FrameListAccess: Debug {
    /// The bus address of the frame list, as programmed into FRBASEADD.
    ///
    /// `None` if no frame list was allocated.
    fn physical_address(&self) -> Option<u32>;

    /// Set or clear the terminate flag on every entry.
    ///
    /// The link pointers themselves are preserved.
    fn set_all_terminate(&mut self, terminate: bool);
}

/// A frame list held in driver memory.
#[derive(Debug, Clone)]
pub struct FrameList {
    entries: Box<[FrameListEntry]>,
    physical_address: Option<u32>,
}

impl FrameList {
    /// Create a frame list of the standard size where every entry
    /// points at `initial` and the list lives at `physical_address`.
    #[must_use]
    pub fn new(initial: FrameListEntry, physical_address: Option<u32>) -> Self {
        Self {
            entries: vec![initial; ENTRIES].into_boxed_slice(),
            physical_address,
        }
    }

    /// All entries in frame order.
    #[must_use]
    pub fn entries(&self) -> &[FrameListEntry] {
        &self.entries
    }

    /// Replace the entry for `frame`.
    ///
    /// # Panics
    ///
    /// Panics if `frame` is not a valid frame index.
    pub fn set_entry(&mut self, frame: usize, entry: FrameListEntry) {
        self.entries[frame] = entry;
    }

    /// Whether every entry carries the terminate flag.
    #[must_use]
    pub fn all_terminated(&self) -> bool {
        self.entries.iter().all(|e| e.is_terminated())
    }

    /// Whether no entry carries the terminate flag.
    #[must_use]
    pub fn none_terminated(&self) -> bool {
        !self.entries.iter().any(|e| e.is_terminated())
    }
}

impl FrameListAccess for FrameList {
    fn physical_address(&self) -> Option<u32> {
        self.physical_address
    }

    fn set_all_terminate(&mut self, terminate: bool) {
        for entry in self.entries.iter_mut() {
            *entry = entry.with_terminate(terminate);
        }
    }
}
