//! Per-frame geometry statistics for the headless log.

use procgen::{Geometry, GrowthFrame};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub tubes: usize,
    pub ribbons: usize,
    pub vertices: usize,
    pub triangles: usize,
    pub polyline_points: usize,
    pub visible_shapes: usize,
    pub total_shapes: usize,
}

impl FrameStats {
    pub fn from_frame(frame: &GrowthFrame) -> Self {
        let mut stats = Self {
            visible_shapes: frame.visible_shapes(),
            total_shapes: frame.shapes.len(),
            ..Default::default()
        };
        for branch in &frame.branches {
            match &branch.geometry {
                Geometry::Tube(mesh) => {
                    stats.tubes += 1;
                    stats.vertices += mesh.vertex_count();
                    stats.triangles += mesh.triangle_count();
                }
                Geometry::Ribbon(ribbon) => {
                    stats.ribbons += 1;
                    stats.polyline_points += ribbon.positions.len();
                }
            }
        }
        stats
    }

    /// Upload size of the tube vertices this frame, in bytes.
    pub fn vertex_bytes(frame: &GrowthFrame) -> usize {
        frame
            .branches
            .iter()
            .filter_map(|b| match &b.geometry {
                Geometry::Tube(mesh) => Some(bytemuck::cast_slice::<_, u8>(&mesh.to_vertices()).len()),
                Geometry::Ribbon(_) => None,
            })
            .sum()
    }
}

impl std::fmt::Display for FrameStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} tubes ({} verts, {} tris), {} ribbons ({} points), shapes {}/{}",
            self.tubes,
            self.vertices,
            self.triangles,
            self.ribbons,
            self.polyline_points,
            self.visible_shapes,
            self.total_shapes
        )
    }
}
