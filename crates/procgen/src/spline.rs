//! Catmull-Rom spline evaluation over branch anchors.

use glam::Vec3;
use plant_core::{PlantError, PlantResult};

/// A resampled spline point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplinePoint {
    /// Point on the curve.
    pub position: Vec3,
    /// Curve derivative at that point (not normalized).
    pub tangent: Vec3,
}

/// Catmull-Rom spline resampled at a fixed number of points per span.
///
/// Holds `resolution * (control_points - 1)` samples; the last span is
/// sampled inclusively so the final control point is reproduced exactly.
#[derive(Debug, Clone)]
pub struct CatmullRomSpline {
    resolution: usize,
    control_points: Vec<Vec3>,
    points: Vec<SplinePoint>,
}

impl CatmullRomSpline {
    /// Sample the curve through `control_points`. Needs at least three
    /// points and a resolution of at least two.
    pub fn new(control_points: &[Vec3], resolution: usize) -> PlantResult<Self> {
        let points = evaluate(control_points, resolution)?;
        Ok(Self {
            resolution,
            control_points: control_points.to_vec(),
            points,
        })
    }

    /// Replace the control points and resample.
    pub fn update_control_points(&mut self, control_points: &[Vec3]) -> PlantResult<()> {
        self.points = evaluate(control_points, self.resolution)?;
        self.control_points.clear();
        self.control_points.extend_from_slice(control_points);
        Ok(())
    }

    /// Change the resolution and resample.
    pub fn set_resolution(&mut self, resolution: usize) -> PlantResult<()> {
        self.points = evaluate(&self.control_points, resolution)?;
        self.resolution = resolution;
        Ok(())
    }

    /// Samples per span.
    pub fn resolution(&self) -> usize {
        self.resolution
    }

    /// Control points of the last evaluation.
    pub fn control_points(&self) -> &[Vec3] {
        &self.control_points
    }

    /// Resampled points, first to last control point.
    pub fn points(&self) -> &[SplinePoint] {
        &self.points
    }

    /// Total polyline length of the resampled points.
    pub fn length(&self) -> f32 {
        self.points
            .windows(2)
            .map(|w| w[0].position.distance(w[1].position))
            .sum()
    }
}

/// Resample the Catmull-Rom curve through `control_points`.
///
/// End tangents use a virtual point mirrored across the first/last control
/// point.
pub fn evaluate(control_points: &[Vec3], resolution: usize) -> PlantResult<Vec<SplinePoint>> {
    let n = control_points.len();
    if n < 3 {
        return Err(PlantError::NotEnoughControlPoints(n));
    }
    if resolution < 2 {
        return Err(PlantError::ResolutionTooSmall(resolution));
    }

    let at = |i: isize| -> Vec3 {
        if i < 0 {
            2.0 * control_points[0] - control_points[1]
        } else if i as usize >= n {
            2.0 * control_points[n - 1] - control_points[n - 2]
        } else {
            control_points[i as usize]
        }
    };

    let mut out = Vec::with_capacity(resolution * (n - 1));
    for span in 0..n - 1 {
        let i = span as isize;
        let p0 = at(i);
        let p1 = at(i + 1);
        let m0 = (p1 - at(i - 1)) * 0.5;
        let m1 = (at(i + 2) - p0) * 0.5;

        let last_span = span == n - 2;
        let divisor = if last_span { resolution - 1 } else { resolution } as f32;
        for k in 0..resolution {
            let t = k as f32 / divisor;
            out.push(SplinePoint {
                position: position(p0, p1, m0, m1, t),
                tangent: tangent(p0, p1, m0, m1, t),
            });
        }
    }
    Ok(out)
}

/// Cubic Hermite position.
pub fn position(p0: Vec3, p1: Vec3, m0: Vec3, m1: Vec3, t: f32) -> Vec3 {
    let t2 = t * t;
    let t3 = t2 * t;
    p0 * (2.0 * t3 - 3.0 * t2 + 1.0)
        + m0 * (t3 - 2.0 * t2 + t)
        + p1 * (-2.0 * t3 + 3.0 * t2)
        + m1 * (t3 - t2)
}

/// Derivative of [`position`] with respect to `t`.
pub fn tangent(p0: Vec3, p1: Vec3, m0: Vec3, m1: Vec3, t: f32) -> Vec3 {
    let t2 = t * t;
    p0 * (6.0 * t2 - 6.0 * t)
        + m0 * (3.0 * t2 - 4.0 * t + 1.0)
        + p1 * (-6.0 * t2 + 6.0 * t)
        + m1 * (3.0 * t2 - 2.0 * t)
}
