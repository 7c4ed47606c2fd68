//! Memory management.
//!
//! - [`facade`]: allocation entry points over the host's [`SystemTable`](crate::SystemTable)
//! - [`grow`]: doubling growable buffers
//! - [`heap`]: reference backend over the Rust global allocator
//! - [`block`]: the backend memory handle

pub mod block;
pub mod facade;
pub mod grow;
pub mod heap;

pub use facade::{
    allocate, allocate_finalized, allocate_opaque, force_collect, new_array, new_text_array,
    release,
};
