//! Error type shared by all optimization entry points

/// A type alias for results produced by this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// A caller-contract violation detected before any output is written.
///
/// All operations in this crate are pure and deterministic; there are no
/// transient failure classes. Every variant here means the arguments
/// themselves were malformed, and the destination buffers are untouched.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Index buffer length is not a multiple of 3.
    #[error("index count {0} is not a multiple of 3")]
    IndexCountNotDivisibleByThree(usize),

    /// An index value references a vertex outside `[0, vertex_count)`.
    #[error("index value {index} is out of bounds for vertex count {vertex_count}")]
    IndexOutOfBounds { index: usize, vertex_count: usize },

    /// A destination buffer cannot hold the full result.
    #[error("destination holds {actual} elements but {required} are required")]
    DestinationTooSmall { required: usize, actual: usize },

    /// Cache size exceeds the maximum supported by the score-based optimizer.
    #[error("cache size {0} exceeds the supported maximum of 32")]
    CacheSizeExceeded(u32),

    /// Overdraw threshold is below 1.0 or not finite.
    #[error("overdraw threshold {0} is invalid; it must be finite and >= 1.0")]
    InvalidThreshold(f32),

    /// Vertex record stride is zero, too small to hold a position, or does
    /// not evenly divide the vertex buffer.
    #[error("invalid vertex stride {0}")]
    InvalidStride(usize),

    /// Cluster offsets are not a strictly increasing partition of the index
    /// buffer starting at triangle 0.
    #[error("cluster offsets are not a valid partition of the index buffer")]
    InvalidClusters,
}
