//! Post-transform optimization using the Tipsify algorithm by Sander,
//! Nehab and Barczak: a vertex-fanning traversal with a dead-end stack,
//! producing locality clusters as a side output for the overdraw optimizer.

use crate::adjacency::build_triangle_adjacency;
use crate::analyze::FifoCache;
use crate::{validate_destination, validate_index_buffer, Result, VertexIndex, INVALID_INDEX};

/// Picks the next fanning vertex among the candidates touched by the
/// triangles just emitted: prefer the vertex with the highest cache position
/// among those that will still be resident after their remaining triangles
/// are fanned out, first pushed wins ties.
fn next_vertex_neighbour(
    next_candidates: &[u32],
    live_triangles: &[u32],
    cache: &FifoCache,
    cache_size: u32,
) -> u32 {
    let mut best_candidate = INVALID_INDEX;
    let mut best_priority = -1;

    for &vertex in next_candidates {
        let vertex = vertex as usize;

        // fully emitted vertices need no further processing
        if live_triangles[vertex] > 0 {
            let mut priority = 0;

            // will it be in cache after fanning?
            if 2 * live_triangles[vertex] + cache.age(vertex) <= cache_size {
                priority = cache.age(vertex) as i32;
            }

            if priority > best_priority {
                best_candidate = vertex as u32;
                best_priority = priority;
            }
        }
    }

    best_candidate
}

/// Pops the dead-end stack skipping fully emitted vertices, then falls back
/// to scanning the remaining vertices in input order.
fn next_vertex_dead_end(
    dead_end: &[u32],
    dead_end_top: &mut usize,
    input_cursor: &mut usize,
    live_triangles: &[u32],
) -> u32 {
    while *dead_end_top != 0 {
        *dead_end_top -= 1;
        let vertex = dead_end[*dead_end_top];

        if live_triangles[vertex as usize] > 0 {
            return vertex;
        }
    }

    while *input_cursor < live_triangles.len() {
        if live_triangles[*input_cursor] > 0 {
            return *input_cursor as u32;
        }

        *input_cursor += 1;
    }

    INVALID_INDEX
}

/// Reorders `indices` into `destination` to reduce the number of GPU vertex
/// shader invocations, using the Tipsify traversal.
///
/// When `clusters` is given it receives the triangle offsets at which the
/// traversal had to restart from a vertex outside the simulated cache: each
/// offset starts a contiguous locality group, beginning with 0. The cluster
/// list is exactly what [`crate::overdraw::optimize_overdraw`] expects.
///
/// The output is a permutation of the input triangles and is fully
/// determined by `(indices, vertex_count, cache_size)`.
///
/// # Arguments
///
/// * `destination`: must hold at least `indices.len()` elements
/// * `cache_size`: should be below the actual GPU cache size to avoid
///   thrashing; [`crate::DEFAULT_CACHE_SIZE`] is a reasonable default
pub fn optimize_post_transform_tipsify<I: VertexIndex>(
    destination: &mut [I],
    indices: &[I],
    vertex_count: usize,
    cache_size: u32,
    mut clusters: Option<&mut Vec<u32>>,
) -> Result<()> {
    validate_index_buffer(indices, vertex_count)?;
    validate_destination(destination, indices.len())?;

    if let Some(clusters) = clusters.as_deref_mut() {
        clusters.clear();
    }

    // guard for empty meshes
    if indices.is_empty() || vertex_count == 0 {
        return Ok(());
    }

    let face_count = indices.len() / 3;

    let adjacency = build_triangle_adjacency(indices, vertex_count);

    let mut live_triangles = adjacency.counts.clone();

    let mut cache = FifoCache::new(vertex_count, cache_size);

    let mut dead_end = vec![0u32; indices.len()];
    let mut dead_end_top = 0;

    let mut emitted_flags = vec![false; face_count];

    let mut current_vertex = 0;

    let mut input_cursor = 1; // vertex to restart from in case of dead-end
    let mut output_triangle = 0;

    if let Some(clusters) = clusters.as_deref_mut() {
        clusters.push(0);
    }

    while current_vertex != INVALID_INDEX {
        let next_candidates_begin = dead_end_top;

        // fan out all pending triangles of the current vertex in adjacency
        // order
        for &triangle in adjacency.triangles(current_vertex as usize) {
            let triangle = triangle as usize;

            if emitted_flags[triangle] {
                continue;
            }

            let abc = &indices[triangle * 3..triangle * 3 + 3];

            destination[output_triangle * 3..output_triangle * 3 + 3].copy_from_slice(abc);
            output_triangle += 1;

            for index in abc {
                let index = index.as_usize();

                // touched vertices become candidates for the next fan and
                // land on the dead-end stack for later restarts
                dead_end[dead_end_top] = index as u32;
                dead_end_top += 1;

                live_triangles[index] -= 1;

                cache.update(index);
            }

            emitted_flags[triangle] = true;
        }

        // candidates are exactly the vertices pushed by this fan
        let next_candidates = &dead_end[next_candidates_begin..dead_end_top];

        current_vertex = next_vertex_neighbour(next_candidates, &live_triangles, &cache, cache_size);

        if current_vertex == INVALID_INDEX {
            current_vertex = next_vertex_dead_end(&dead_end, &mut dead_end_top, &mut input_cursor, &live_triangles);
        }

        // restarting from a vertex outside the cache breaks locality: that
        // point is a cluster boundary
        if current_vertex != INVALID_INDEX && !cache.contains(current_vertex as usize) {
            if let Some(clusters) = clusters.as_deref_mut() {
                if *clusters.last().unwrap() != output_triangle as u32 {
                    clusters.push(output_triangle as u32);
                }
            }
        }
    }

    debug_assert_eq!(output_triangle, face_count);

    Ok(())
}
