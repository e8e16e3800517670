use float_cmp::approx_eq;

use mesh_reorder::analyze::analyze_post_transform;
use mesh_reorder::fetch::optimize_pre_transform;
use mesh_reorder::forsyth::optimize_post_transform_forsyth;
use mesh_reorder::overdraw::optimize_overdraw;
use mesh_reorder::tipsify::optimize_post_transform_tipsify;
use mesh_reorder::{Position, DEFAULT_CACHE_SIZE};

#[derive(Clone, Copy, Default, PartialEq)]
#[repr(C)]
struct Vertex {
    p: [f32; 3],
    n: [f32; 3],
    t: [f32; 2],
}

impl Position for Vertex {
    fn pos(&self) -> [f32; 3] {
        self.p
    }
}

fn grid_mesh(cells: usize) -> (Vec<Vertex>, Vec<u32>) {
    let stride = cells + 1;

    let mut vertices = Vec::with_capacity(stride * stride);

    for y in 0..stride {
        for x in 0..stride {
            vertices.push(Vertex {
                p: [x as f32, y as f32, ((x * 7 + y * 3) % 5) as f32 * 0.2],
                n: [0.0, 0.0, 1.0],
                t: [x as f32 / cells as f32, y as f32 / cells as f32],
            });
        }
    }

    let mut indices = Vec::with_capacity(cells * cells * 6);

    for y in 0..cells {
        for x in 0..cells {
            let v = |x: usize, y: usize| (y * stride + x) as u32;

            indices.extend_from_slice(&[v(x, y), v(x + 1, y), v(x, y + 1)]);
            indices.extend_from_slice(&[v(x + 1, y), v(x + 1, y + 1), v(x, y + 1)]);
        }
    }

    (vertices, indices)
}

/// Multiset of triangles as position triples, insensitive to triangle order
/// and per-triangle vertex rotation.
fn position_triangles(vertices: &[Vertex], indices: &[u32]) -> Vec<[[u32; 3]; 3]> {
    let mut triangles: Vec<[[u32; 3]; 3]> = indices
        .chunks_exact(3)
        .map(|abc| {
            let mut t = [0, 1, 2].map(|i| vertices[abc[i] as usize].p.map(f32::to_bits));
            t.sort_unstable();
            t
        })
        .collect();

    triangles.sort_unstable();
    triangles
}

#[test]
fn full_pipeline_preserves_geometry_and_improves_cache_use() {
    let (vertices, indices) = grid_mesh(24);
    let vertex_count = vertices.len();

    let identity = analyze_post_transform(&indices, vertex_count, DEFAULT_CACHE_SIZE).unwrap();
    assert_eq!(identity.hits + identity.misses, indices.len() as u32);

    // post-transform pass
    let mut cache_optimized = vec![0u32; indices.len()];
    let mut clusters = Vec::new();

    optimize_post_transform_tipsify(
        &mut cache_optimized,
        &indices,
        vertex_count,
        DEFAULT_CACHE_SIZE,
        Some(&mut clusters),
    )
    .unwrap();

    let cache_stats = analyze_post_transform(&cache_optimized, vertex_count, DEFAULT_CACHE_SIZE).unwrap();
    assert!(cache_stats.acmr <= identity.acmr);

    // overdraw pass, allowing 5% cache degradation
    let mut overdraw_optimized = vec![0u32; indices.len()];

    optimize_overdraw(
        &mut overdraw_optimized,
        &cache_optimized,
        &vertices,
        &clusters,
        DEFAULT_CACHE_SIZE,
        1.05,
    )
    .unwrap();

    let overdraw_stats = analyze_post_transform(&overdraw_optimized, vertex_count, DEFAULT_CACHE_SIZE).unwrap();
    assert!(overdraw_stats.acmr <= cache_stats.acmr * 1.05);

    // pre-transform pass
    let mut final_indices = overdraw_optimized.clone();
    let mut final_vertices = vec![Vertex::default(); vertex_count];

    let unique = optimize_pre_transform(&mut final_vertices, &vertices, &mut final_indices).unwrap();

    assert_eq!(unique, vertex_count); // the grid references every vertex
    assert!(final_indices.iter().all(|&i| (i as usize) < unique));

    // geometry is intact through the whole pipeline
    assert_eq!(
        position_triangles(&final_vertices, &final_indices),
        position_triangles(&vertices, &indices)
    );

    // fetch optimization must not change the index stream's cache behavior,
    // only the vertex numbering
    let final_stats = analyze_post_transform(&final_indices, unique, DEFAULT_CACHE_SIZE).unwrap();
    assert!(approx_eq!(f32, final_stats.acmr, overdraw_stats.acmr, ulps = 2));
    assert_eq!(final_stats.misses, overdraw_stats.misses);
}

#[test]
fn forsyth_and_tipsify_agree_on_guarantees() {
    let (vertices, indices) = grid_mesh(16);
    let vertex_count = vertices.len();

    let identity = analyze_post_transform(&indices, vertex_count, DEFAULT_CACHE_SIZE).unwrap();

    let mut forsyth = vec![0u32; indices.len()];
    let mut tipsify = vec![0u32; indices.len()];

    optimize_post_transform_forsyth(&mut forsyth, &indices, vertex_count, DEFAULT_CACHE_SIZE).unwrap();
    optimize_post_transform_tipsify(&mut tipsify, &indices, vertex_count, DEFAULT_CACHE_SIZE, None).unwrap();

    for optimized in [&forsyth, &tipsify] {
        let stats = analyze_post_transform(optimized, vertex_count, DEFAULT_CACHE_SIZE).unwrap();

        assert!(stats.acmr <= identity.acmr);
        assert_eq!(
            position_triangles(&vertices, optimized),
            position_triangles(&vertices, &indices)
        );
    }
}

#[test]
fn pre_transform_after_forsyth_is_idempotent() {
    let (vertices, indices) = grid_mesh(8);
    let vertex_count = vertices.len();

    let mut optimized = vec![0u32; indices.len()];
    optimize_post_transform_forsyth(&mut optimized, &indices, vertex_count, 16).unwrap();

    let mut first_vertices = vec![Vertex::default(); vertex_count];
    let unique = optimize_pre_transform(&mut first_vertices, &vertices, &mut optimized).unwrap();

    let snapshot = optimized.clone();

    let mut second_vertices = vec![Vertex::default(); vertex_count];
    let again = optimize_pre_transform(&mut second_vertices, &first_vertices, &mut optimized).unwrap();

    assert_eq!(again, unique);
    assert_eq!(optimized, snapshot);
    assert!(first_vertices[..unique]
        .iter()
        .zip(second_vertices[..unique].iter())
        .all(|(a, b)| a == b));
}
