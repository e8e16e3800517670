//! mesh-reorder
//!
//! Reorders triangle mesh index and vertex buffers so that they render
//! efficiently on GPUs. Meant for offline asset pipelines: feed in authored
//! buffers, get back reordered buffers plus cache statistics.
//!
//! The usual pipeline is:
//!
//! 1. [`forsyth::optimize_post_transform_forsyth`] or
//!    [`tipsify::optimize_post_transform_tipsify`] to reduce vertex shader
//!    invocations (Tipsify additionally emits cluster boundaries),
//! 2. optionally [`overdraw::optimize_overdraw`] on the Tipsify output to
//!    reduce pixel overdraw within a bounded cache-efficiency loss,
//! 3. [`fetch::optimize_pre_transform`] to compact the vertex buffer into
//!    first-use order,
//! 4. [`analyze::analyze_post_transform`] at any point for diagnostics.
//!
//! All operations work on both 16-bit and 32-bit index buffers through the
//! [`VertexIndex`] trait and validate their arguments up front; destination
//! buffers are never touched on error.

pub mod analyze;
pub mod error;
pub mod fetch;
pub mod forsyth;
pub mod overdraw;
pub mod tipsify;

mod adjacency;

pub use error::{Error, Result};

pub(crate) const INVALID_INDEX: u32 = u32::MAX;

/// Cache size used by the post-transform optimizers unless the caller has
/// measured a better value for their target hardware.
pub const DEFAULT_CACHE_SIZE: u32 = 16;

/// An index buffer element; implemented for `u16` and `u32`.
///
/// The algorithms are written once against this trait and instantiated for
/// both widths with identical semantics.
pub trait VertexIndex: Copy + Eq {
    fn from_usize(value: usize) -> Self;
    fn as_usize(self) -> usize;
}

impl VertexIndex for u16 {
    #[inline(always)]
    fn from_usize(value: usize) -> Self {
        debug_assert!(value <= u16::MAX as usize);
        value as u16
    }

    #[inline(always)]
    fn as_usize(self) -> usize {
        self as usize
    }
}

impl VertexIndex for u32 {
    #[inline(always)]
    fn from_usize(value: usize) -> Self {
        debug_assert!(value <= u32::MAX as usize);
        value as u32
    }

    #[inline(always)]
    fn as_usize(self) -> usize {
        self as usize
    }
}

/// Access to a vertex position for the overdraw optimizer.
pub trait Position {
    fn pos(&self) -> [f32; 3];
}

impl Position for [f32; 3] {
    #[inline]
    fn pos(&self) -> [f32; 3] {
        *self
    }
}

#[inline(always)]
pub(crate) fn zero_inverse(value: f32) -> f32 {
    if value != 0.0 { 1.0 / value } else { 0.0 }
}

/// Checks the triangle-list shape of `indices` and that every value is below
/// `vertex_count`. Shared precondition of every public operation.
pub(crate) fn validate_index_buffer<I: VertexIndex>(indices: &[I], vertex_count: usize) -> Result<()> {
    if indices.len() % 3 != 0 {
        return Err(Error::IndexCountNotDivisibleByThree(indices.len()));
    }

    for index in indices {
        let index = index.as_usize();

        if index >= vertex_count {
            return Err(Error::IndexOutOfBounds { index, vertex_count });
        }
    }

    Ok(())
}

pub(crate) fn validate_destination<T>(destination: &[T], required: usize) -> Result<()> {
    if destination.len() < required {
        return Err(Error::DestinationTooSmall {
            required,
            actual: destination.len(),
        });
    }

    Ok(())
}
