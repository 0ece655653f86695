//! Mesh generation for node spheres
//!
//! Nodes render as UV spheres whose segment counts follow the active quality
//! tier, so the resource pool can trade triangle count for frame rate.

use bytemuck::{Pod, Zeroable};

/// A vertex in a mesh with position and normal.
///
/// Layout matches the vertex buffer the renderer uploads.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    /// Vertex position (on unit sphere)
    pub position: [f32; 3],
    /// Vertex normal (same as position for unit sphere)
    pub normal: [f32; 3],
}

impl MeshVertex {
    /// Create a new mesh vertex
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            position: [x, y, z],
            normal: [x, y, z], // For unit sphere, normal = position
        }
    }
}

/// Triangle mesh for a unit sphere
#[derive(Debug, Clone)]
pub struct SphereMesh {
    pub width_segments: u32,
    pub height_segments: u32,
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl SphereMesh {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Generate a UV sphere with the given resolution.
///
/// # Arguments
///
/// * `width_segments` - Segments around the equator (at least 3)
/// * `height_segments` - Segments from pole to pole (at least 2)
///
/// Produces `(w + 1) * (h + 1)` vertices (the seam and poles are
/// duplicated for texturing) and `2 * w * (h - 1)` triangles, since the pole
/// rows collapse to a single triangle per segment.
///
/// # Example
///
/// ```
/// use ecosphere::geometry::uv_sphere;
///
/// let mesh = uv_sphere(8, 6);
/// assert_eq!(mesh.vertices.len(), 63);
/// assert_eq!(mesh.triangle_count(), 80);
/// ```
pub fn uv_sphere(width_segments: u32, height_segments: u32) -> SphereMesh {
    let w = width_segments.max(3);
    let h = height_segments.max(2);

    let mut vertices = Vec::with_capacity(((w + 1) * (h + 1)) as usize);
    for iy in 0..=h {
        let theta = iy as f32 / h as f32 * std::f32::consts::PI;
        let (sin_theta, cos_theta) = theta.sin_cos();
        for ix in 0..=w {
            let phi = ix as f32 / w as f32 * std::f32::consts::TAU;
            let (sin_phi, cos_phi) = phi.sin_cos();
            vertices.push(MeshVertex::new(
                -cos_phi * sin_theta,
                cos_theta,
                sin_phi * sin_theta,
            ));
        }
    }

    let row = w + 1;
    let mut indices = Vec::with_capacity((6 * w * (h - 1)) as usize);
    for iy in 0..h {
        for ix in 0..w {
            let a = iy * row + ix + 1;
            let b = iy * row + ix;
            let c = (iy + 1) * row + ix;
            let d = (iy + 1) * row + ix + 1;

            // Top and bottom rows only need one triangle per quad
            if iy != 0 {
                indices.extend_from_slice(&[a, b, d]);
            }
            if iy != h - 1 {
                indices.extend_from_slice(&[b, c, d]);
            }
        }
    }

    SphereMesh {
        width_segments: w,
        height_segments: h,
        vertices,
        indices,
    }
}
