//! Backend-owned memory blocks.
//!
//! A [`Block`] is the unit every backend hands out: a non-null address plus
//! the number of usable bytes behind it. Blocks are plain handles; they do not
//! free themselves. Dereferencing one is only sound while the backend keeps
//! it alive, which is the contract every caller of the facade signs up for.

#![allow(unsafe_code)]

use std::ptr::NonNull;

/// Minimum alignment every backend must provide.
pub const BLOCK_ALIGN: usize = 16;

/// A region of backend-owned memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Block {
    ptr: NonNull<u8>,
    size: usize,
}

// SAFETY: a Block is an address and a length. Access to the bytes behind it
// goes through `unsafe` code that re-establishes validity at the use site.
unsafe impl Send for Block {}
// SAFETY: see above; sharing the handle shares no bytes.
unsafe impl Sync for Block {}

impl Block {
    /// Wrap a backend allocation.
    ///
    /// # Safety
    ///
    /// `ptr` must be aligned to [`BLOCK_ALIGN`], valid for reads and writes of
    /// `size` bytes, and stay valid until the block is released to the backend
    /// that produced it or the backend proves it unreachable.
    #[must_use]
    pub const unsafe fn from_raw_parts(ptr: NonNull<u8>, size: usize) -> Self {
        Self { ptr, size }
    }

    /// Raw start of the block.
    #[must_use]
    pub const fn as_ptr(self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Address of the block, used as its identity in logs and tables.
    #[must_use]
    pub fn addr(self) -> usize {
        self.ptr.as_ptr() as usize
    }

    /// Usable bytes.
    #[must_use]
    pub const fn size(self) -> usize {
        self.size
    }
}

/// Plain-data element storable in backend memory.
///
/// # Safety
///
/// Implementors must be `Copy`, have a non-zero size, an alignment no larger
/// than [`BLOCK_ALIGN`], and accept the all-zero bit pattern as a valid value.
pub unsafe trait Element: Copy + 'static {}

macro_rules! plain_elements {
    ($($ty:ty),* $(,)?) => {
        $(
            // SAFETY: primitive integer/float, zero is valid, align <= 16.
            unsafe impl Element for $ty {}
        )*
    };
}

plain_elements!(
    u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64
);

// SAFETY: all-zero is `None`, pointer-sized.
unsafe impl<T: 'static> Element for Option<NonNull<T>> {}
