//! Per-vertex triangle incidence, shared by both post-transform optimizers

use crate::VertexIndex;

/// Flat-array adjacency: for vertex `v`, the incident triangle ids live in
/// `data[offsets[v]..offsets[v] + counts[v]]`.
///
/// `counts` doubles as the live-triangle counter once the optimizers start
/// removing emitted triangles; callers that need the original valence clone
/// it before mutating.
#[derive(Default)]
pub struct TriangleAdjacency {
    pub counts: Vec<u32>,
    pub offsets: Vec<u32>,
    pub data: Vec<u32>,
}

impl TriangleAdjacency {
    #[inline]
    pub fn triangles(&self, vertex: usize) -> &[u32] {
        let offset = self.offsets[vertex] as usize;
        &self.data[offset..offset + self.counts[vertex] as usize]
    }

    /// Removes `triangle` from the incidence list of `vertex` with a
    /// swap-remove, so subsequent traversals only see pending triangles.
    pub fn remove_triangle(&mut self, vertex: usize, triangle: u32) {
        let offset = self.offsets[vertex] as usize;
        let count = self.counts[vertex] as usize;
        let list = &mut self.data[offset..offset + count];

        for i in 0..count {
            if list[i] == triangle {
                list[i] = list[count - 1];
                self.counts[vertex] -= 1;
                break;
            }
        }
    }
}

/// Builds incidence lists in O(index_count): a counting pass, a prefix-sum
/// over the counts, and a fill pass. Indices must already be validated
/// against `vertex_count`.
pub fn build_triangle_adjacency<I: VertexIndex>(indices: &[I], vertex_count: usize) -> TriangleAdjacency {
    let mut adjacency = TriangleAdjacency {
        counts: vec![0; vertex_count],
        offsets: vec![0; vertex_count],
        data: vec![0; indices.len()],
    };

    for index in indices {
        adjacency.counts[index.as_usize()] += 1;
    }

    let mut offset = 0;

    for (count, slot) in adjacency.counts.iter().zip(adjacency.offsets.iter_mut()) {
        *slot = offset;
        offset += count;
    }

    debug_assert_eq!(offset as usize, indices.len());

    // fill pass reuses offsets as write cursors, then rewinds them
    for (triangle, abc) in indices.chunks_exact(3).enumerate() {
        for index in abc {
            let index = index.as_usize();

            adjacency.data[adjacency.offsets[index] as usize] = triangle as u32;
            adjacency.offsets[index] += 1;
        }
    }

    for (offset, count) in adjacency.offsets.iter_mut().zip(adjacency.counts.iter()) {
        *offset -= count;
    }

    adjacency
}
