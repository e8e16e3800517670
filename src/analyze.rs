//! Post-transform vertex cache analysis
//!
//! The model is a fixed-capacity FIFO: a miss inserts the vertex and evicts
//! the oldest resident entry, a hit leaves the queue untouched (no LRU-style
//! reordering). This is a deliberate simplification; the numbers will not
//! match any real GPU, but they are deterministic and comparable across
//! orderings of the same mesh, which is what the optimizers need.

use crate::{validate_index_buffer, Result, VertexIndex};

/// Cache size used by [`analyze_post_transform`] when the caller has no
/// specific hardware in mind.
pub const ANALYSIS_CACHE_SIZE: u32 = 32;

/// Snapshot of one simulated cache run.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CacheStatistics {
    pub hits: u32,
    pub misses: u32,
    /// Hits as a percentage of all index accesses
    pub hit_percent: f32,
    /// Misses as a percentage of all index accesses
    pub miss_percent: f32,
    /// Average cache miss ratio: misses / triangle count
    ///
    /// Best case 0.5, worst case 3.0, optimum depends on topology
    pub acmr: f32,
}

/// FIFO vertex cache over per-vertex timestamps.
///
/// A vertex is resident iff `clock - stamp[v] <= cache_size`: every miss
/// advances the clock, so the residency window always covers exactly the
/// `cache_size` most recently missed vertices. The clock starts past the
/// window so that the initial zero stamps read as "not resident".
pub(crate) struct FifoCache {
    stamps: Vec<u32>,
    clock: u32,
    cache_size: u32,
}

impl FifoCache {
    pub fn new(vertex_count: usize, cache_size: u32) -> Self {
        Self {
            stamps: vec![0; vertex_count],
            clock: cache_size + 1,
            cache_size,
        }
    }

    pub fn reset(&mut self) {
        self.stamps.fill(0);
        self.clock = self.cache_size + 1;
    }

    /// Touches `vertex`; returns true on a miss.
    #[inline]
    pub fn update(&mut self, vertex: usize) -> bool {
        if self.clock - self.stamps[vertex] > self.cache_size {
            self.stamps[vertex] = self.clock;
            self.clock += 1;
            true
        } else {
            false
        }
    }

    /// Whether `vertex` is currently resident, without touching it.
    #[inline]
    pub fn contains(&self, vertex: usize) -> bool {
        self.clock - self.stamps[vertex] <= self.cache_size
    }

    /// Misses since `vertex` was last inserted; resident iff this is at most
    /// the cache size.
    #[inline]
    pub fn age(&self, vertex: usize) -> u32 {
        self.clock - self.stamps[vertex]
    }
}

/// Counts FIFO misses over an index sequence.
pub(crate) fn count_misses<I: VertexIndex>(cache: &mut FifoCache, indices: &[I]) -> u32 {
    let mut misses = 0;

    for index in indices {
        misses += cache.update(index.as_usize()) as u32;
    }

    misses
}

/// Returns cache hit statistics for an index buffer using a simplified FIFO
/// model. Results will not match actual GPU performance.
///
/// `cache_size = 0` is legal and degenerates to every access being a miss.
pub fn analyze_post_transform<I: VertexIndex>(
    indices: &[I],
    vertex_count: usize,
    cache_size: u32,
) -> Result<CacheStatistics> {
    validate_index_buffer(indices, vertex_count)?;

    let mut result = CacheStatistics::default();

    if indices.is_empty() {
        return Ok(result);
    }

    let mut cache = FifoCache::new(vertex_count, cache_size);

    result.misses = count_misses(&mut cache, indices);
    result.hits = indices.len() as u32 - result.misses;

    let index_count = indices.len() as f32;
    result.hit_percent = result.hits as f32 / index_count * 100.0;
    result.miss_percent = result.misses as f32 / index_count * 100.0;
    result.acmr = result.misses as f32 / (index_count / 3.0);

    Ok(result)
}
