//! Tube and ribbon synthesis over a growing branch spline.
//!
//! A branch reveals `floor(samples * progress)` spline samples. In tube mode
//! every revealed sample gets a ring of vertices around the local direction,
//! plus one extra ring pushed part-way into the sample being grown so the
//! tip advances smoothly. Both ends are closed with triangle fans.

use crate::spline::SplinePoint;
use crate::taper::TaperProfile;
use bytemuck::{Pod, Zeroable};
use glam::{Quat, Vec2, Vec3};
use plant_core::{PlantError, PlantResult};

/// Interleaved vertex for upload to a render host.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct TubeVertex {
    /// Position in plant space.
    pub position: [f32; 3],
    /// Unit vertex normal.
    pub normal: [f32; 3],
    /// Planar texture coordinate.
    pub uv: [f32; 2],
}

/// Triangle mesh of one branch.
#[derive(Debug, Clone, Default)]
pub struct TubeMesh {
    /// Vertex positions: bottom center, rings, top center.
    pub positions: Vec<Vec3>,
    /// Area-weighted vertex normals.
    pub normals: Vec<Vec3>,
    /// Planar (x, y) texture coordinates.
    pub uvs: Vec<Vec2>,
    /// Counter-clockwise triangle list.
    pub indices: Vec<u32>,
    /// Center of every ring, base to tip.
    pub ring_centers: Vec<Vec3>,
    /// Radius of every ring, base to tip.
    pub ring_radii: Vec<f32>,
}

impl TubeMesh {
    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Number of triangles.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Interleave positions, normals and UVs for upload.
    pub fn to_vertices(&self) -> Vec<TubeVertex> {
        self.positions
            .iter()
            .zip(&self.normals)
            .zip(&self.uvs)
            .map(|((p, n), uv)| TubeVertex {
                position: p.to_array(),
                normal: n.to_array(),
                uv: uv.to_array(),
            })
            .collect()
    }

    /// Area-weighted vertex normals from the current triangles.
    pub fn recalculate_normals(&mut self) {
        let mut normals = vec![Vec3::ZERO; self.positions.len()];
        for tri in self.indices.chunks_exact(3) {
            let (a, b, c) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
            let face = (self.positions[b] - self.positions[a]).cross(self.positions[c] - self.positions[a]);
            normals[a] += face;
            normals[b] += face;
            normals[c] += face;
        }
        self.normals = normals.into_iter().map(Vec3::normalize_or_zero).collect();
    }

    /// Planar UVs: each vertex's (x, y).
    pub fn project_uvs(&mut self) {
        self.uvs = self.positions.iter().map(|p| Vec2::new(p.x, p.y)).collect();
    }
}

/// Polyline with linearly interpolated width, for 2D rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct Ribbon {
    /// Revealed spline samples, base to tip.
    pub positions: Vec<Vec3>,
    /// Width at the base.
    pub start_width: f32,
    /// Width at the tip.
    pub end_width: f32,
}

/// Builds branch geometry from spline samples.
#[derive(Debug, Clone)]
pub struct MeshSynthesizer {
    sides: usize,
    taper: TaperProfile,
}

impl MeshSynthesizer {
    /// Synthesizer with `sides` vertices per ring. Needs at least three sides
    /// and a valid taper profile.
    pub fn new(sides: usize, taper: TaperProfile) -> PlantResult<Self> {
        if sides < 3 {
            return Err(PlantError::InvalidRange {
                what: "tube side count",
                reason: format!("needs at least 3 sides, got {}", sides),
            });
        }
        taper.validate()?;
        Ok(Self { sides, taper })
    }

    /// Vertices per ring.
    pub fn sides(&self) -> usize {
        self.sides
    }

    /// Radius profile along each branch.
    pub fn taper(&self) -> &TaperProfile {
        &self.taper
    }

    /// Number of spline samples revealed at `progress`.
    pub fn unlocked_samples(sample_count: usize, progress: f32) -> usize {
        (sample_count as f32 * progress.clamp(0.0, 1.0)).floor() as usize
    }

    /// 2D polyline through the revealed samples.
    pub fn ribbon(&self, points: &[SplinePoint], root_radius: f32, progress: f32) -> Option<Ribbon> {
        let progress = progress.clamp(0.0, 1.0);
        let limit = Self::unlocked_samples(points.len(), progress);
        if limit < 2 {
            return None;
        }
        Some(Ribbon {
            positions: points[..limit].iter().map(|p| p.position).collect(),
            start_width: self.taper.evaluate(0.0) * root_radius * progress,
            end_width: self.taper.evaluate(1.0) * root_radius * progress,
        })
    }

    /// Closed tube through the revealed samples.
    ///
    /// `sub_progress` places the tip ring inside the sample being grown;
    /// `parent_progress` thins the tube until the parent branch is grown.
    pub fn tube(
        &self,
        points: &[SplinePoint],
        root_radius: f32,
        progress: f32,
        sub_progress: f32,
        parent_progress: f32,
    ) -> Option<TubeMesh> {
        let progress = progress.clamp(0.0, 1.0);
        let limit = Self::unlocked_samples(points.len(), progress);
        if limit < 2 {
            return None;
        }
        let radius_scale = root_radius * progress * parent_progress.clamp(0.0, 1.0);

        let mut rings: Vec<(Vec3, Quat, f32)> = Vec::with_capacity(limit + 1);
        for j in 0..limit {
            let radius = self.taper.evaluate(j as f32 / limit as f32) * radius_scale;
            rings.push((points[j].position, ring_rotation(points, j), radius));
        }
        let last = limit - 1;
        let (last_center, last_rotation, last_radius) = rings[last];
        // fully revealed splines end on their final sample
        let tip = if limit < points.len() {
            last_center + sample_direction(points, last) * sub_progress.clamp(0.0, 1.0)
        } else {
            last_center
        };
        rings.push((tip, last_rotation, last_radius));

        let mut mesh = self.tessellate(&rings);
        mesh.recalculate_normals();
        mesh.project_uvs();
        Some(mesh)
    }

    fn tessellate(&self, rings: &[(Vec3, Quat, f32)]) -> TubeMesh {
        let sides = self.sides;
        let ring_count = rings.len();
        let mut positions = Vec::with_capacity(ring_count * sides + 2);
        let mut indices = Vec::with_capacity((ring_count - 1) * sides * 6 + sides * 6);

        let bottom = 0u32;
        positions.push(rings[0].0);
        for &(center, rotation, radius) in rings {
            for s in 0..sides {
                let angle = s as f32 / sides as f32 * std::f32::consts::TAU;
                let offset = Vec3::new(angle.cos() * radius, 0.0, angle.sin() * radius);
                positions.push(center + rotation * offset);
            }
        }
        let top = positions.len() as u32;
        positions.push(rings[ring_count - 1].0);

        let ring_start = |r: usize| 1 + (r * sides) as u32;
        let sides_u = sides as u32;

        for s in 0..sides_u {
            let next = (s + 1) % sides_u;
            let first = ring_start(0);
            indices.extend_from_slice(&[bottom, first + s, first + next]);
        }

        for r in 0..ring_count - 1 {
            let curr = ring_start(r);
            let up = ring_start(r + 1);
            for s in 0..sides_u {
                let next = (s + 1) % sides_u;
                indices.extend_from_slice(&[curr + s, up + s, curr + next]);
                indices.extend_from_slice(&[curr + next, up + s, up + next]);
            }
        }

        let last = ring_start(ring_count - 1);
        for s in 0..sides_u {
            let next = (s + 1) % sides_u;
            indices.extend_from_slice(&[top, last + next, last + s]);
        }

        TubeMesh {
            positions,
            normals: Vec::new(),
            uvs: Vec::new(),
            indices,
            ring_centers: rings.iter().map(|r| r.0).collect(),
            ring_radii: rings.iter().map(|r| r.2).collect(),
        }
    }
}

/// Direction from sample `j` toward the next one (or from the previous one
/// at the end of the spline).
fn sample_direction(points: &[SplinePoint], j: usize) -> Vec3 {
    if j + 1 < points.len() {
        points[j + 1].position - points[j].position
    } else if j > 0 {
        points[j].position - points[j - 1].position
    } else {
        Vec3::ZERO
    }
}

/// Rotation taking +Y onto the local branch direction.
fn ring_rotation(points: &[SplinePoint], j: usize) -> Quat {
    let mut dir = sample_direction(points, j).normalize_or_zero();
    if dir == Vec3::ZERO {
        dir = points[j].tangent.normalize_or_zero();
    }
    if dir == Vec3::ZERO {
        return Quat::IDENTITY;
    }
    Quat::from_rotation_arc(Vec3::Y, dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taper::TaperKey;

    fn straight(n: usize) -> Vec<SplinePoint> {
        (0..n)
            .map(|i| SplinePoint {
                position: Vec3::Y * i as f32 * 0.5,
                tangent: Vec3::Y,
            })
            .collect()
    }

    fn synth() -> MeshSynthesizer {
        MeshSynthesizer::new(
            6,
            TaperProfile::new(vec![
                TaperKey { position: 0.0, value: 1.0 },
                TaperKey { position: 0.3, value: 0.8 },
                TaperKey { position: 1.0, value: 0.1 },
            ])
            .unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn rejects_degenerate_side_count() {
        assert!(MeshSynthesizer::new(2, TaperProfile::default()).is_err());
    }

    #[test]
    fn unlocked_samples_clamps_progress() {
        assert_eq!(MeshSynthesizer::unlocked_samples(20, 0.5), 10);
        assert_eq!(MeshSynthesizer::unlocked_samples(20, 3.0), 20);
        assert_eq!(MeshSynthesizer::unlocked_samples(20, -1.0), 0);
    }

    #[test]
    fn too_few_revealed_samples_yields_nothing() {
        let s = synth();
        assert!(s.tube(&straight(10), 1.0, 0.15, 0.5, 1.0).is_none());
        assert!(s.ribbon(&straight(10), 1.0, 0.1).is_none());
    }

    #[test]
    fn tube_topology_counts() {
        let s = synth();
        let mesh = s.tube(&straight(10), 1.0, 0.5, 0.5, 1.0).unwrap();
        let rings = 5 + 1;
        assert_eq!(mesh.ring_radii.len(), rings);
        assert_eq!(mesh.vertex_count(), rings * 6 + 2);
        assert_eq!(mesh.triangle_count(), (rings - 1) * 6 * 2 + 2 * 6);
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertex_count()));
        assert_eq!(mesh.normals.len(), mesh.vertex_count());
        assert_eq!(mesh.uvs.len(), mesh.vertex_count());
        assert_eq!(mesh.to_vertices().len(), mesh.vertex_count());
    }

    #[test]
    fn side_normals_point_outward() {
        let s = MeshSynthesizer::new(8, TaperProfile::constant(1.0)).unwrap();
        let mesh = s.tube(&straight(12), 1.0, 1.0, 1.0, 1.0).unwrap();
        // a vertex in a middle ring
        let v = 1 + 5 * 8 + 2;
        let radial = Vec3::new(mesh.positions[v].x, 0.0, mesh.positions[v].z).normalize();
        assert!(mesh.normals[v].dot(radial) > 0.9);
    }

    #[test]
    fn ring_radius_is_monotonic_for_tapering_profile() {
        let s = synth();
        assert!(s.taper().is_non_increasing());
        let mesh = s.tube(&straight(30), 0.8, 0.9, 0.3, 0.7).unwrap();
        for pair in mesh.ring_radii.windows(2) {
            assert!(pair[1] <= pair[0]);
        }
    }

    #[test]
    fn tip_ring_interpolates_into_current_sample() {
        let s = synth();
        let points = straight(10);
        let at_zero = s.tube(&points, 1.0, 0.5, 0.0, 1.0).unwrap();
        let at_half = s.tube(&points, 1.0, 0.5, 0.5, 1.0).unwrap();
        let last = points[4].position;
        assert_eq!(*at_zero.ring_centers.last().unwrap(), last);
        assert!((*at_half.ring_centers.last().unwrap() - (last + Vec3::Y * 0.25)).length() < 1e-6);
    }

    #[test]
    fn fully_grown_tube_ends_on_last_sample() {
        let s = synth();
        let points = straight(10);
        let mesh = s.tube(&points, 1.0, 1.0, 1.0, 1.0).unwrap();
        let end = points[9].position;
        assert_eq!(*mesh.ring_centers.last().unwrap(), end);
        let top = mesh.positions[mesh.vertex_count() - 1];
        assert_eq!(top, end);
        assert!(mesh.positions.iter().all(|p| p.y <= end.y + 1e-5));
    }

    #[test]
    fn rings_are_perpendicular_to_direction() {
        let points: Vec<SplinePoint> = (0..6)
            .map(|i| SplinePoint {
                position: Vec3::X * i as f32,
                tangent: Vec3::X,
            })
            .collect();
        let s = MeshSynthesizer::new(4, TaperProfile::constant(0.5)).unwrap();
        let mesh = s.tube(&points, 1.0, 1.0, 0.0, 1.0).unwrap();
        for v in 1..=4 {
            assert!(mesh.positions[v].x.abs() < 1e-5);
            assert!((mesh.positions[v].length() - 0.5).abs() < 1e-5);
        }
    }

    #[test]
    fn ribbon_widths_follow_profile_and_progress() {
        let s = synth();
        let ribbon = s.ribbon(&straight(10), 2.0, 0.5).unwrap();
        assert_eq!(ribbon.positions.len(), 5);
        assert!((ribbon.start_width - 1.0).abs() < 1e-6);
        assert!((ribbon.end_width - 0.1).abs() < 1e-6);
    }

    #[test]
    fn parent_progress_thins_child() {
        let s = synth();
        let full = s.tube(&straight(10), 1.0, 1.0, 1.0, 1.0).unwrap();
        let thin = s.tube(&straight(10), 1.0, 1.0, 1.0, 0.5).unwrap();
        assert!((thin.ring_radii[0] - full.ring_radii[0] * 0.5).abs() < 1e-6);
    }

    #[test]
    fn uvs_are_planar_projection() {
        let mesh = synth().tube(&straight(10), 1.0, 1.0, 1.0, 1.0).unwrap();
        for (p, uv) in mesh.positions.iter().zip(&mesh.uvs) {
            assert_eq!(*uv, Vec2::new(p.x, p.y));
        }
    }
}
