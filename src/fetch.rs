//! Pre-transform (vertex fetch) optimization
//!
//! Renumbers vertices into first-use order of an already cache-optimized
//! index buffer and compacts the vertex buffer to match, improving memory
//! locality of vertex fetches.

use crate::{validate_destination, validate_index_buffer, Error, Result, VertexIndex, INVALID_INDEX};

/// Reorders `vertices` into `destination` and rewrites `indices` in place so
/// that vertex storage follows first-use order of the index stream.
///
/// Returns the number of unique referenced vertices; only that prefix of
/// `destination` is meaningful, and vertices never referenced by an index do
/// not appear in it. Applying the operation to its own output changes
/// nothing (slot `i` remaps to slot `i`).
///
/// # Arguments
///
/// * `destination`: must hold at least `vertices.len()` elements
pub fn optimize_pre_transform<V, I>(destination: &mut [V], vertices: &[V], indices: &mut [I]) -> Result<usize>
where
    V: Copy,
    I: VertexIndex,
{
    validate_index_buffer(indices, vertices.len())?;
    validate_destination(destination, vertices.len())?;

    let mut vertex_remap = vec![INVALID_INDEX; vertices.len()];

    let mut next_vertex = 0;

    for index in indices.iter_mut() {
        let old = index.as_usize();

        let remap = &mut vertex_remap[old];

        if *remap == INVALID_INDEX {
            // first use: the vertex takes the next slot
            destination[next_vertex] = vertices[old];

            *remap = next_vertex as u32;
            next_vertex += 1;
        }

        *index = I::from_usize(*remap as usize);
    }

    debug_assert!(next_vertex <= vertices.len());

    Ok(next_vertex)
}

/// Raw-buffer variant of [`optimize_pre_transform`]: `vertices` holds
/// records of `vertex_size` bytes each, copied opaquely.
pub fn optimize_pre_transform_stride<I: VertexIndex>(
    destination: &mut [u8],
    vertices: &[u8],
    indices: &mut [I],
    vertex_size: usize,
) -> Result<usize> {
    if vertex_size == 0 || vertices.len() % vertex_size != 0 {
        return Err(Error::InvalidStride(vertex_size));
    }

    let vertex_count = vertices.len() / vertex_size;

    validate_index_buffer(indices, vertex_count)?;
    validate_destination(destination, vertices.len())?;

    let mut vertex_remap = vec![INVALID_INDEX; vertex_count];

    let mut next_vertex = 0;

    for index in indices.iter_mut() {
        let old = index.as_usize();

        let remap = &mut vertex_remap[old];

        if *remap == INVALID_INDEX {
            let source = &vertices[old * vertex_size..(old + 1) * vertex_size];
            destination[next_vertex * vertex_size..(next_vertex + 1) * vertex_size].copy_from_slice(source);

            *remap = next_vertex as u32;
            next_vertex += 1;
        }

        *index = I::from_usize(*remap as usize);
    }

    Ok(next_vertex)
}
