//! Decorative shapes (leaves, flowers) hung on branch anchors.

use crate::segment::SegmentId;
use glam::Vec3;
use plant_core::{look_rotation, PlantError, PlantResult, Transform};
use rand::prelude::*;
use serde::{Deserialize, Serialize};

/// Delay range (seconds) before a shape starts growing once unlocked.
const GROWTH_DELAY_RANGE: (f32, f32) = (1.0, 10.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeKind {
    Leaf,
    Flower,
}

/// Size and growth parameters for one shape kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeParams {
    /// Smallest target scale.
    pub min_size: f32,
    /// Largest target scale.
    pub max_size: f32,
    /// Scale added per update while below the target size.
    pub interpolation: f32,
}

impl Default for ShapeParams {
    fn default() -> Self {
        Self {
            min_size: 0.2,
            max_size: 0.5,
            interpolation: 0.005,
        }
    }
}

impl ShapeParams {
    /// Defaults for flowers: larger and slower than leaves.
    pub fn flower() -> Self {
        Self {
            min_size: 0.3,
            max_size: 0.6,
            interpolation: 0.004,
        }
    }

    /// Reject an inverted size range or a non-positive growth rate.
    pub fn validate(&self) -> PlantResult<()> {
        if self.min_size > self.max_size {
            return Err(PlantError::InvertedSizeRange {
                min: self.min_size,
                max: self.max_size,
            });
        }
        if !(self.interpolation > 0.0) || self.min_size < 0.0 {
            return Err(PlantError::InvalidRange {
                what: "shape parameters",
                reason: format!(
                    "interpolation must be positive and sizes non-negative (got {:?})",
                    self
                ),
            });
        }
        Ok(())
    }
}

/// Resolved parameters for both shape kinds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeCatalog {
    /// Parameters for [`ShapeKind::Leaf`].
    pub leaf: ShapeParams,
    /// Parameters for [`ShapeKind::Flower`].
    pub flower: ShapeParams,
}

impl Default for ShapeCatalog {
    fn default() -> Self {
        Self {
            leaf: ShapeParams::default(),
            flower: ShapeParams::flower(),
        }
    }
}

impl ShapeCatalog {
    /// Parameters for `kind`.
    pub fn params(&self, kind: ShapeKind) -> ShapeParams {
        match kind {
            ShapeKind::Leaf => self.leaf,
            ShapeKind::Flower => self.flower,
        }
    }

    pub fn validate(&self) -> PlantResult<()> {
        self.leaf.validate()?;
        self.flower.validate()
    }
}

/// How a shape is oriented each update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShapeFacing {
    /// Mesh shapes face along their own axis, rolled around the branch tangent.
    Branch { tangent: Vec3 },
    /// Sprite shapes face the camera.
    Camera { eye: Vec3 },
}

/// A leaf or flower living at its parent segment's anchor.
#[derive(Debug, Clone)]
pub struct DecorativeShape {
    /// Segment this shape hangs on.
    pub segment: SegmentId,
    /// Leaf or flower.
    pub kind: ShapeKind,
    /// Random unit axis picked at creation.
    pub orientation: Vec3,
    params: ShapeParams,
    target_size: f32,
    delay: f32,
    counter: f32,
    growing: bool,
    /// Node transform applied by the host.
    pub transform: Transform,
    /// Set once the shape starts growing.
    pub visible: bool,
}

impl DecorativeShape {
    /// Hidden shape with zero scale. Call [`DecorativeShape::configure`]
    /// before updating it.
    pub fn new(segment: SegmentId, kind: ShapeKind, orientation: Vec3) -> Self {
        Self {
            segment,
            kind,
            orientation: orientation.normalize_or_zero(),
            params: ShapeParams::default(),
            target_size: 0.0,
            delay: 0.0,
            counter: 0.0,
            growing: false,
            transform: Transform::collapsed(Vec3::ZERO),
            visible: false,
        }
    }

    /// Resolve size parameters and roll the random target size and delay.
    pub fn configure(&mut self, params: ShapeParams, rng: &mut impl Rng) -> PlantResult<()> {
        params.validate()?;
        self.params = params;
        self.target_size = if params.max_size > params.min_size {
            rng.gen_range(params.min_size..params.max_size)
        } else {
            params.min_size
        };
        self.delay = rng.gen_range(GROWTH_DELAY_RANGE.0..GROWTH_DELAY_RANGE.1);
        self.counter = 0.0;
        self.growing = false;
        self.visible = false;
        self.transform.set_uniform_scale(0.0);
        Ok(())
    }

    /// Scale the shape grows toward.
    pub fn target_size(&self) -> f32 {
        self.target_size
    }

    /// Seconds of updates before growth starts.
    pub fn delay(&self) -> f32 {
        self.delay
    }

    /// True once the delay has elapsed.
    pub fn is_growing(&self) -> bool {
        self.growing
    }

    /// Advance the shape by `dt`. Placed at `anchor`, it starts growing once
    /// its delay has elapsed and then scales toward the target size.
    pub fn update(&mut self, dt: f32, anchor: Vec3, facing: ShapeFacing) {
        self.counter += dt;
        if !self.growing && self.counter > self.delay {
            self.growing = true;
        }
        if !self.growing {
            return;
        }

        self.transform.position = anchor;
        match facing {
            ShapeFacing::Branch { tangent } => {
                if let Some(rotation) = look_rotation(self.orientation, tangent) {
                    self.transform.rotation = rotation;
                }
            }
            ShapeFacing::Camera { eye } => {
                self.transform.look_at(eye, self.orientation);
            }
        }
        self.visible = true;

        let scale = self.transform.uniform_scale();
        if scale < self.target_size {
            self.transform
                .set_uniform_scale((scale + self.params.interpolation).min(self.target_size));
        }
    }
}

/// Uniformly distributed unit vector.
pub fn random_unit_vector(rng: &mut impl Rng) -> Vec3 {
    loop {
        let v = Vec3::new(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        );
        let len2 = v.length_squared();
        if len2 > 1e-6 && len2 <= 1.0 {
            return v / len2.sqrt();
        }
    }
}

/// Uniformly distributed point inside the unit ball.
pub fn random_in_unit_sphere(rng: &mut impl Rng) -> Vec3 {
    loop {
        let v = Vec3::new(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        );
        if v.length_squared() <= 1.0 {
            return v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured(params: ShapeParams) -> DecorativeShape {
        let mut rng = StdRng::seed_from_u64(3);
        let mut shape = DecorativeShape::new(0, ShapeKind::Leaf, Vec3::X);
        shape.configure(params, &mut rng).unwrap();
        shape
    }

    #[test]
    fn inverted_size_range_is_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut shape = DecorativeShape::new(0, ShapeKind::Flower, Vec3::Z);
        let err = shape
            .configure(
                ShapeParams {
                    min_size: 2.0,
                    max_size: 1.0,
                    interpolation: 0.1,
                },
                &mut rng,
            )
            .unwrap_err();
        assert_eq!(err, PlantError::InvertedSizeRange { min: 2.0, max: 1.0 });
    }

    #[test]
    fn target_and_delay_within_ranges() {
        let shape = configured(ShapeParams::default());
        assert!(shape.target_size() >= 0.2 && shape.target_size() < 0.5);
        assert!(shape.delay() >= 1.0 && shape.delay() < 10.0);
    }

    #[test]
    fn shape_stays_hidden_until_delay_elapses() {
        let mut shape = configured(ShapeParams::default());
        let facing = ShapeFacing::Branch { tangent: Vec3::Y };
        shape.update(0.5, Vec3::ONE, facing);
        assert!(!shape.visible);
        assert_eq!(shape.transform.uniform_scale(), 0.0);
        shape.update(10.0, Vec3::ONE, facing);
        assert!(shape.visible);
        assert_eq!(shape.transform.position, Vec3::ONE);
        assert!(shape.transform.uniform_scale() > 0.0);
    }

    #[test]
    fn scale_never_exceeds_target() {
        let mut shape = configured(ShapeParams {
            min_size: 0.1,
            max_size: 0.2,
            interpolation: 0.07,
        });
        let facing = ShapeFacing::Camera { eye: Vec3::new(0.0, 0.0, 10.0) };
        for _ in 0..100 {
            shape.update(0.5, Vec3::ZERO, facing);
        }
        assert!((shape.transform.uniform_scale() - shape.target_size()).abs() < 1e-6);
    }

    #[test]
    fn random_unit_vectors_are_normalized() {
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..50 {
            assert!((random_unit_vector(&mut rng).length() - 1.0).abs() < 1e-4);
            assert!(random_in_unit_sphere(&mut rng).length() <= 1.0 + 1e-6);
        }
    }
}
