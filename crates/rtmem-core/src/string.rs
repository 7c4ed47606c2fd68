//! Immutable runtime strings.
//!
//! An [`RtString`] is a handle to UTF-16 code units in opaque backend memory.
//! It is `Copy`; the collector, not the handle, decides when the units go
//! away.

#![allow(unsafe_code)]

use std::fmt;

use crate::context::Context;
use crate::mem::block::Block;
use crate::mem::facade;

/// Code unit of runtime strings.
pub type Unit = u16;

/// Immutable sequence of [`Unit`]s.
#[derive(Clone, Copy)]
pub struct RtString {
    data: Option<Block>,
    len: usize,
}

impl RtString {
    pub const EMPTY: Self = Self { data: None, len: 0 };

    /// Wrap `len` units already written to `data`.
    ///
    /// # Safety
    ///
    /// `data` must hold at least `len` initialized units and must not be
    /// written again while any copy of the returned handle is in use.
    pub(crate) unsafe fn from_raw_parts(data: Option<Block>, len: usize) -> Self {
        Self { data, len }
    }

    /// Copy `units` into fresh opaque storage.
    #[cfg_attr(feature = "mem-debug", track_caller)]
    pub fn from_units(ctx: &Context, units: &[Unit]) -> Self {
        let data = facade::new_text_array::<Unit>(ctx, units.len());
        if let Some(block) = data {
            // SAFETY: the block was just allocated for `units.len()` units and
            // is BLOCK_ALIGN-aligned.
            unsafe {
                std::ptr::copy_nonoverlapping(
                    units.as_ptr(),
                    block.as_ptr().cast::<Unit>(),
                    units.len(),
                );
            }
        }
        Self {
            data,
            len: units.len(),
        }
    }

    /// Widen ASCII bytes, one unit per byte.
    #[cfg_attr(feature = "mem-debug", track_caller)]
    pub fn from_ascii(ctx: &Context, bytes: &[u8]) -> Self {
        let data = facade::new_text_array::<Unit>(ctx, bytes.len());
        if let Some(block) = data {
            let dst = block.as_ptr().cast::<Unit>();
            for (i, &b) in bytes.iter().enumerate() {
                // SAFETY: `i < bytes.len()`, the allocated unit count.
                unsafe { dst.add(i).write(Unit::from(b)) };
            }
        }
        Self {
            data,
            len: bytes.len(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn block(&self) -> Option<Block> {
        self.data
    }

    #[must_use]
    pub fn as_units(&self) -> &[Unit] {
        match self.data {
            // SAFETY: construction guarantees `len` initialized units that
            // are never written again.
            Some(block) => unsafe {
                std::slice::from_raw_parts(block.as_ptr().cast::<Unit>(), self.len)
            },
            None => &[],
        }
    }

    #[must_use]
    pub fn to_string_lossy(&self) -> String {
        String::from_utf16_lossy(self.as_units())
    }
}

impl Default for RtString {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl PartialEq for RtString {
    fn eq(&self, other: &Self) -> bool {
        self.as_units() == other.as_units()
    }
}

impl Eq for RtString {}

impl PartialEq<str> for RtString {
    fn eq(&self, other: &str) -> bool {
        self.as_units().iter().copied().eq(other.encode_utf16())
    }
}

impl PartialEq<&str> for RtString {
    fn eq(&self, other: &&str) -> bool {
        *self == **other
    }
}

impl fmt::Display for RtString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in char::decode_utf16(self.as_units().iter().copied()) {
            fmt::Write::write_char(f, c.unwrap_or(char::REPLACEMENT_CHARACTER))?;
        }
        Ok(())
    }
}

impl fmt::Debug for RtString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RtString({:?})", self.to_string_lossy())
    }
}
