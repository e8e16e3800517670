//! Post-transform optimization using Tom Forsyth's linear-speed greedy
//! algorithm: a combined cache-position + valence score drives triangle
//! selection.

use crate::adjacency::build_triangle_adjacency;
use crate::{validate_destination, validate_index_buffer, Error, Result, VertexIndex, INVALID_INDEX};

/// Hard cap on the simulated cache window; larger values are rejected with
/// [`Error::CacheSizeExceeded`] rather than clamped.
pub const MAX_CACHE_SIZE: u32 = 32;

const CACHE_DECAY_POWER: f32 = 1.5;
const VALENCE_BOOST_SCALE: f32 = 2.0;
const VALENCE_BOOST_POWER: f32 = 0.5;

/// Score of a single vertex given its cache position (-1 when not cached)
/// and its remaining live triangle count.
///
/// The cache term decays strictly with the distance from the most recently
/// inserted slot and is zero outside the window; the valence term grows as
/// the vertex runs out of pending triangles, so stragglers get finished off
/// before their neighbourhood leaves the cache.
fn vertex_score(cache_position: i32, live_triangles: u32, cache_size: u32) -> f32 {
    if live_triangles == 0 {
        return 0.0;
    }

    let cache_score = if cache_position >= 0 && (cache_position as u32) < cache_size {
        (1.0 - cache_position as f32 / cache_size as f32).powf(CACHE_DECAY_POWER)
    } else {
        0.0
    };

    cache_score + VALENCE_BOOST_SCALE * (live_triangles as f32).powf(-VALENCE_BOOST_POWER)
}

/// Cold-start and stale-cache fallback: linear scan for the pending triangle
/// whose least-connected vertex has the fewest live triangles, lowest
/// original triangle index on ties.
fn next_triangle_starved<I: VertexIndex>(indices: &[I], emitted_flags: &[bool], live_triangles: &[u32]) -> u32 {
    let mut best_triangle = INVALID_INDEX;
    let mut best_valence = u32::MAX;

    for (triangle, emitted) in emitted_flags.iter().enumerate() {
        if *emitted {
            continue;
        }

        let abc = &indices[triangle * 3..triangle * 3 + 3];
        let valence = abc
            .iter()
            .map(|index| live_triangles[index.as_usize()])
            .min()
            .unwrap_or(0);

        if valence < best_valence {
            best_triangle = triangle as u32;
            best_valence = valence;
        }
    }

    best_triangle
}

/// Reorders `indices` into `destination` to reduce the number of GPU vertex
/// shader invocations, using the score-based Forsyth algorithm.
///
/// The output is a permutation of the input triangles and is fully
/// determined by `(indices, vertex_count, cache_size)`.
///
/// # Arguments
///
/// * `destination`: must hold at least `indices.len()` elements
/// * `cache_size`: simulated cache window, at most [`MAX_CACHE_SIZE`];
///   [`crate::DEFAULT_CACHE_SIZE`] is a reasonable default
pub fn optimize_post_transform_forsyth<I: VertexIndex>(
    destination: &mut [I],
    indices: &[I],
    vertex_count: usize,
    cache_size: u32,
) -> Result<()> {
    validate_index_buffer(indices, vertex_count)?;
    validate_destination(destination, indices.len())?;

    if cache_size > MAX_CACHE_SIZE {
        return Err(Error::CacheSizeExceeded(cache_size));
    }

    // guard for empty meshes
    if indices.is_empty() || vertex_count == 0 {
        return Ok(());
    }

    let face_count = indices.len() / 3;

    let mut adjacency = build_triangle_adjacency(indices, vertex_count);

    // adjacency.counts shrinks as triangles are emitted; keep the live
    // counters separately since scoring reads them for evicted vertices too
    let mut live_triangles = adjacency.counts.clone();

    let mut emitted_flags = vec![false; face_count];

    let mut vertex_scores: Vec<f32> = live_triangles
        .iter()
        .map(|&live| vertex_score(-1, live, cache_size))
        .collect();

    let mut triangle_scores: Vec<f32> = indices
        .chunks_exact(3)
        .map(|abc| abc.iter().map(|index| vertex_scores[index.as_usize()]).sum())
        .collect();

    // the cache briefly holds cache_size + 3 entries right after insertion;
    // double-buffered so eviction is a rebuild + swap
    let mut cache_holder = [0u32; 2 * (MAX_CACHE_SIZE as usize + 3)];
    let (mut cache, mut cache_new) = cache_holder.split_at_mut(MAX_CACHE_SIZE as usize + 3);
    let mut cache_count = 0;

    let mut output_triangle = 0;

    let mut current_triangle = next_triangle_starved(indices, &emitted_flags, &live_triangles);

    while current_triangle != INVALID_INDEX {
        let triangle = current_triangle as usize;
        let abc = &indices[triangle * 3..triangle * 3 + 3];

        destination[output_triangle * 3..output_triangle * 3 + 3].copy_from_slice(abc);
        output_triangle += 1;

        emitted_flags[triangle] = true;
        triangle_scores[triangle] = 0.0;

        // the emitted triangle's vertices move to the front of the cache
        let mut cache_write = 0;

        for index in abc {
            cache_new[cache_write] = index.as_usize() as u32;
            cache_write += 1;
        }

        for &index in cache[..cache_count].iter() {
            if abc.iter().all(|e| e.as_usize() as u32 != index) {
                cache_new[cache_write] = index;
                cache_write += 1;
            }
        }

        std::mem::swap(&mut cache, &mut cache_new);
        cache_count = cache_write.min(cache_size as usize);

        for index in abc {
            let index = index.as_usize();

            live_triangles[index] -= 1;
            adjacency.remove_triangle(index, current_triangle);
        }

        // refresh scores for every vertex whose cache position changed,
        // including the ones that just fell out of the window
        for i in 0..cache_write {
            let index = cache[i] as usize;

            let cache_position = if i >= cache_size as usize { -1 } else { i as i32 };

            let score = vertex_score(cache_position, live_triangles[index], cache_size);
            let score_diff = score - vertex_scores[index];

            vertex_scores[index] = score;

            for &tri in adjacency.triangles(index) {
                debug_assert!(!emitted_flags[tri as usize]);

                triangle_scores[tri as usize] += score_diff;
            }
        }

        // highest-scoring pending triangle adjacent to a cached vertex;
        // lowest original triangle index wins ties
        let mut best_triangle = INVALID_INDEX;
        let mut best_score = 0.0;

        for &index in cache[..cache_count].iter() {
            for &tri in adjacency.triangles(index as usize) {
                let score = triangle_scores[tri as usize];

                if score > best_score || (score == best_score && tri < best_triangle) {
                    best_triangle = tri;
                    best_score = score;
                }
            }
        }

        current_triangle = best_triangle;

        if current_triangle == INVALID_INDEX {
            current_triangle = next_triangle_starved(indices, &emitted_flags, &live_triangles);
        }
    }

    debug_assert_eq!(output_triangle, face_count);

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::analyze::analyze_post_transform;

    fn grid(cells: usize) -> (Vec<u32>, usize) {
        let stride = cells + 1;
        let mut indices = Vec::with_capacity(cells * cells * 6);

        for y in 0..cells {
            for x in 0..cells {
                let v = |x: usize, y: usize| (y * stride + x) as u32;

                indices.extend_from_slice(&[v(x, y), v(x + 1, y), v(x, y + 1)]);
                indices.extend_from_slice(&[v(x + 1, y), v(x + 1, y + 1), v(x, y + 1)]);
            }
        }

        (indices, stride * stride)
    }

    fn triangle_set(indices: &[u32]) -> Vec<[u32; 3]> {
        let mut triangles: Vec<[u32; 3]> = indices
            .chunks_exact(3)
            .map(|abc| {
                let mut t = [abc[0], abc[1], abc[2]];
                t.sort_unstable();
                t
            })
            .collect();

        triangles.sort_unstable();
        triangles
    }

    #[test]
    fn test_empty() {
        optimize_post_transform_forsyth::<u32>(&mut [], &[], 0, 16).unwrap();
    }

    #[test]
    fn test_single_triangle() {
        let indices: [u32; 3] = [0, 1, 2];
        let mut destination = [0u32; 3];

        optimize_post_transform_forsyth(&mut destination, &indices, 3, 16).unwrap();

        assert_eq!(destination, indices);
    }

    #[test]
    fn test_permutation_invariant() {
        let (indices, vertex_count) = grid(12);
        let mut destination = vec![0u32; indices.len()];

        optimize_post_transform_forsyth(&mut destination, &indices, vertex_count, 16).unwrap();

        assert_eq!(triangle_set(&destination), triangle_set(&indices));
    }

    #[test]
    fn test_acmr_not_worse_than_input() {
        let (indices, vertex_count) = grid(12);
        let mut destination = vec![0u32; indices.len()];

        optimize_post_transform_forsyth(&mut destination, &indices, vertex_count, 16).unwrap();

        let before = analyze_post_transform(&indices, vertex_count, 16).unwrap();
        let after = analyze_post_transform(&destination, vertex_count, 16).unwrap();

        assert!(after.acmr <= before.acmr);
    }

    #[test]
    fn test_shared_edge_not_worse() {
        let indices: [u32; 6] = [0, 1, 2, 2, 1, 3];
        let mut destination = [0u32; 6];

        optimize_post_transform_forsyth(&mut destination, &indices, 4, 4).unwrap();

        let stats = analyze_post_transform(&destination, 4, 4).unwrap();
        assert!(stats.acmr <= 2.0);
        assert_eq!(triangle_set(&destination), triangle_set(&indices));
    }

    #[test]
    fn test_deterministic() {
        let (indices, vertex_count) = grid(8);
        let mut first = vec![0u32; indices.len()];
        let mut second = vec![0u32; indices.len()];

        optimize_post_transform_forsyth(&mut first, &indices, vertex_count, 24).unwrap();
        optimize_post_transform_forsyth(&mut second, &indices, vertex_count, 24).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_u16_matches_u32() {
        let (indices, vertex_count) = grid(6);
        let indices_16: Vec<u16> = indices.iter().map(|&i| i as u16).collect();

        let mut destination = vec![0u32; indices.len()];
        let mut destination_16 = vec![0u16; indices.len()];

        optimize_post_transform_forsyth(&mut destination, &indices, vertex_count, 16).unwrap();
        optimize_post_transform_forsyth(&mut destination_16, &indices_16, vertex_count, 16).unwrap();

        let widened: Vec<u32> = destination_16.iter().map(|&i| i as u32).collect();
        assert_eq!(widened, destination);
    }

    #[test]
    fn test_rejects_bad_arguments() {
        let indices: [u32; 3] = [0, 1, 2];
        let mut destination = [0u32; 3];

        assert!(matches!(
            optimize_post_transform_forsyth(&mut destination, &indices, 3, 33),
            Err(Error::CacheSizeExceeded(33))
        ));
        assert!(matches!(
            optimize_post_transform_forsyth(&mut destination[0..2], &indices, 3, 16),
            Err(Error::DestinationTooSmall { required: 3, actual: 2 })
        ));
        assert!(optimize_post_transform_forsyth(&mut destination, &indices, 2, 16).is_err());
    }

    #[test]
    fn test_equal_scores_prefer_lower_triangle_index() {
        // triangles 1 and 2 share the cached edge 1-2 and their third
        // vertices (3, 4) are both uncached with one live triangle, so after
        // triangle 0 is emitted their scores are bit-identical; the
        // swap-remove in the adjacency lists visits triangle 2 first during
        // the best-triangle scan, so only the explicit index comparison can
        // put triangle 1 ahead
        let indices: [u32; 9] = [0, 1, 2, 1, 2, 3, 1, 2, 4];
        let mut destination = [0u32; 9];

        optimize_post_transform_forsyth(&mut destination, &indices, 5, 16).unwrap();

        assert_eq!(destination, [0, 1, 2, 1, 2, 3, 1, 2, 4]);
    }

    #[test]
    fn test_zero_cache_size_degenerates_to_valence_order() {
        // still a valid permutation even though no triangle ever scores
        // through the cache term
        let (indices, vertex_count) = grid(4);
        let mut destination = vec![0u32; indices.len()];

        optimize_post_transform_forsyth(&mut destination, &indices, vertex_count, 0).unwrap();

        assert_eq!(triangle_set(&destination), triangle_set(&indices));
    }
}
