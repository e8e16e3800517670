//! Overdraw optimization over Tipsify clusters
//!
//! Whole clusters are reordered so that likely occluders render first,
//! while a FIFO cache simulation keeps the post-transform efficiency within
//! a caller-chosen factor of the input ordering. Clusters are atomic: they
//! are relocated, never split or merged, and triangle order inside each
//! cluster is preserved.

use crate::analyze::{count_misses, FifoCache};
use crate::{
    validate_destination, validate_index_buffer, zero_inverse, Error, Position, Result, VertexIndex,
};

use std::ops::Range;

fn cluster_faces(clusters: &[u32], cluster: usize, face_count: usize) -> Range<usize> {
    let begin = clusters[cluster] as usize;
    let end = clusters.get(cluster + 1).map_or(face_count, |&b| b as usize);

    begin..end
}

fn validate_clusters(clusters: &[u32], face_count: usize) -> Result<()> {
    if face_count == 0 {
        return if clusters.is_empty() { Ok(()) } else { Err(Error::InvalidClusters) };
    }

    let starts_at_zero = clusters.first() == Some(&0);
    let strictly_increasing = clusters.windows(2).all(|w| w[0] < w[1]);
    let in_bounds = clusters.last().map_or(false, |&last| (last as usize) < face_count);

    if starts_at_zero && strictly_increasing && in_bounds {
        Ok(())
    } else {
        Err(Error::InvalidClusters)
    }
}

/// Occlusion proxy per cluster: the area-weighted cluster centroid relative
/// to the mesh centroid, projected onto the summed triangle normal. Clusters
/// facing away from the mesh interior score high and should render early.
fn calculate_sort_data<V, I>(indices: &[I], vertices: &[V], clusters: &[u32]) -> Vec<f32>
where
    V: Position,
    I: VertexIndex,
{
    let face_count = indices.len() / 3;

    let mut mesh_centroid = [0.0f32; 3];

    for index in indices {
        let p = vertices[index.as_usize()].pos();

        mesh_centroid[0] += p[0];
        mesh_centroid[1] += p[1];
        mesh_centroid[2] += p[2];
    }

    mesh_centroid[0] /= indices.len() as f32;
    mesh_centroid[1] /= indices.len() as f32;
    mesh_centroid[2] /= indices.len() as f32;

    let mut sort_data = vec![0.0f32; clusters.len()];

    for (cluster, slot) in sort_data.iter_mut().enumerate() {
        let faces = cluster_faces(clusters, cluster, face_count);

        let mut cluster_area = 0.0;
        let mut cluster_centroid = [0.0f32; 3];
        let mut cluster_normal = [0.0f32; 3];

        for abc in indices[faces.start * 3..faces.end * 3].chunks_exact(3) {
            let p0 = vertices[abc[0].as_usize()].pos();
            let p1 = vertices[abc[1].as_usize()].pos();
            let p2 = vertices[abc[2].as_usize()].pos();

            let p10 = [p1[0] - p0[0], p1[1] - p0[1], p1[2] - p0[2]];
            let p20 = [p2[0] - p0[0], p2[1] - p0[1], p2[2] - p0[2]];

            let normal_x = p10[1] * p20[2] - p10[2] * p20[1];
            let normal_y = p10[2] * p20[0] - p10[0] * p20[2];
            let normal_z = p10[0] * p20[1] - p10[1] * p20[0];

            let area = (normal_x * normal_x + normal_y * normal_y + normal_z * normal_z).sqrt();

            cluster_centroid[0] += (p0[0] + p1[0] + p2[0]) * (area / 3.0);
            cluster_centroid[1] += (p0[1] + p1[1] + p2[1]) * (area / 3.0);
            cluster_centroid[2] += (p0[2] + p1[2] + p2[2]) * (area / 3.0);
            cluster_normal[0] += normal_x;
            cluster_normal[1] += normal_y;
            cluster_normal[2] += normal_z;
            cluster_area += area;
        }

        let inv_cluster_area = zero_inverse(cluster_area);

        cluster_centroid[0] *= inv_cluster_area;
        cluster_centroid[1] *= inv_cluster_area;
        cluster_centroid[2] *= inv_cluster_area;

        let normal_length = (cluster_normal[0] * cluster_normal[0]
            + cluster_normal[1] * cluster_normal[1]
            + cluster_normal[2] * cluster_normal[2])
            .sqrt();
        let inv_normal_length = zero_inverse(normal_length);

        *slot = (cluster_centroid[0] - mesh_centroid[0]) * cluster_normal[0] * inv_normal_length
            + (cluster_centroid[1] - mesh_centroid[1]) * cluster_normal[1] * inv_normal_length
            + (cluster_centroid[2] - mesh_centroid[2]) * cluster_normal[2] * inv_normal_length;
    }

    sort_data
}

/// ACMR of the arrangement "clusters in `head` order, then every other
/// cluster in original order".
fn arrangement_acmr<I: VertexIndex>(
    cache: &mut FifoCache,
    indices: &[I],
    clusters: &[u32],
    head: &[u32],
    in_head: &[bool],
) -> f32 {
    cache.reset();

    let face_count = indices.len() / 3;
    let mut misses = 0;

    for &cluster in head {
        let faces = cluster_faces(clusters, cluster as usize, face_count);
        misses += count_misses(cache, &indices[faces.start * 3..faces.end * 3]);
    }

    for (cluster, taken) in in_head.iter().enumerate() {
        if !taken {
            let faces = cluster_faces(clusters, cluster, face_count);
            misses += count_misses(cache, &indices[faces.start * 3..faces.end * 3]);
        }
    }

    misses as f32 / face_count as f32
}

/// Reorders whole clusters of `indices` into `destination` to reduce pixel
/// overdraw, degrading post-transform cache efficiency by at most
/// `threshold` (1.05 allows up to 5% more ACMR; 1.0 allows none).
///
/// `indices` and `clusters` must come from
/// [`crate::tipsify::optimize_post_transform_tipsify`] run on the same mesh;
/// the algorithm relies on the boundaries being real locality groups and its
/// behavior on arbitrary splits is unspecified (the offsets themselves are
/// still validated). `vertices.len()` is the vertex count; only positions
/// are read.
///
/// The output is always a permutation of the input triangles.
pub fn optimize_overdraw<V, I>(
    destination: &mut [I],
    indices: &[I],
    vertices: &[V],
    clusters: &[u32],
    cache_size: u32,
    threshold: f32,
) -> Result<()>
where
    V: Position,
    I: VertexIndex,
{
    validate_index_buffer(indices, vertices.len())?;
    validate_destination(destination, indices.len())?;

    if !threshold.is_finite() || threshold < 1.0 {
        return Err(Error::InvalidThreshold(threshold));
    }

    let face_count = indices.len() / 3;

    validate_clusters(clusters, face_count)?;

    // guard for empty meshes
    if indices.is_empty() {
        return Ok(());
    }

    let mut cache = FifoCache::new(vertices.len(), cache_size);

    let acmr_before = count_misses(&mut cache, indices) as f32 / face_count as f32;
    let acmr_limit = acmr_before * threshold;

    let sort_data = calculate_sort_data(indices, vertices, clusters);

    // candidate order: best occluders first; stable sort keeps the Tipsify
    // order on ties so the result stays deterministic
    let mut order: Vec<u32> = (0..clusters.len() as u32).collect();
    order.sort_by(|&a, &b| {
        sort_data[b as usize]
            .partial_cmp(&sort_data[a as usize])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    // greedy acceptance: pull each candidate to the front of the remaining
    // arrangement only if the cache-efficiency bound still holds for the
    // whole buffer; rejected clusters keep their original relative position
    let mut head: Vec<u32> = Vec::with_capacity(clusters.len());
    let mut in_head = vec![false; clusters.len()];

    for &candidate in &order {
        head.push(candidate);
        in_head[candidate as usize] = true;

        let acmr = arrangement_acmr(&mut cache, indices, clusters, &head, &in_head);

        if acmr > acmr_limit {
            head.pop();
            in_head[candidate as usize] = false;
        }
    }

    // fill output buffer
    let mut offset = 0;

    let mut emit = |cluster: usize, offset: &mut usize| {
        let faces = cluster_faces(clusters, cluster, face_count);
        let size = (faces.end - faces.start) * 3;

        destination[*offset..*offset + size].copy_from_slice(&indices[faces.start * 3..faces.end * 3]);
        *offset += size;
    };

    for &cluster in &head {
        emit(cluster as usize, &mut offset);
    }

    for (cluster, taken) in in_head.iter().enumerate() {
        if !taken {
            emit(cluster, &mut offset);
        }
    }

    debug_assert_eq!(offset, indices.len());

    Ok(())
}

/// Raw-buffer variant of [`optimize_overdraw`]: `vertex_data` holds
/// fixed-stride records whose first 12 bytes are the little-endian f32
/// x, y, z position (the rest of each record is ignored).
pub fn optimize_overdraw_stride<I: VertexIndex>(
    destination: &mut [I],
    indices: &[I],
    vertex_data: &[u8],
    vertex_stride: usize,
    clusters: &[u32],
    cache_size: u32,
    threshold: f32,
) -> Result<()> {
    if vertex_stride < 12 || vertex_data.len() % vertex_stride != 0 {
        return Err(Error::InvalidStride(vertex_stride));
    }

    let positions: Vec<[f32; 3]> = vertex_data
        .chunks_exact(vertex_stride)
        .map(|record| {
            let read = |offset: usize| {
                f32::from_le_bytes([
                    record[offset],
                    record[offset + 1],
                    record[offset + 2],
                    record[offset + 3],
                ])
            };

            [read(0), read(4), read(8)]
        })
        .collect();

    optimize_overdraw(destination, indices, &positions, clusters, cache_size, threshold)
}
