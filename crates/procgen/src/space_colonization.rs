//! Space colonization: grows a branch graph toward a cloud of attraction points.
//!
//! One call to [`SpaceColonization::step`] performs one growth iteration:
//! 1. attraction points within `kill_range` of any segment end are consumed,
//! 2. each remaining point is claimed by the nearest segment end within
//!    `attraction_range`,
//! 3. every claiming segment grows one child toward the average direction of
//!    its points,
//! 4. when nothing was claimed, every extremity extends straight on.

use crate::segment::{BranchGraph, SegmentId};
use crate::shape::random_in_unit_sphere;
use glam::Vec3;
use plant_core::{PlantError, PlantResult};
use rand::prelude::*;
use serde::{Deserialize, Serialize};

/// Configuration for space colonization growth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColonizationConfig {
    /// Random seed for the attraction cloud.
    pub seed: u64,
    /// Base of the initial stem segment.
    pub stem_start: Vec3,
    /// Tip of the initial stem segment; growth starts here.
    pub stem_end: Vec3,
    /// Number of attraction points spawned in the cloud.
    pub attraction_point_count: usize,
    /// Center of the spherical attraction cloud.
    pub spawn_center: Vec3,
    /// Radius of the attraction cloud around `spawn_center`.
    pub spawn_radius: f32,
    /// Maximum distance at which a segment end claims a point.
    pub attraction_range: f32,
    /// Distance at which a point is consumed. Must be below `attraction_range`.
    pub kill_range: f32,
    /// Length of every grown segment.
    pub step_length: f32,
    /// Hard cap on iterations; unreachable points stop growth here.
    pub max_iterations: u32,
}

impl Default for ColonizationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            stem_start: Vec3::ZERO,
            stem_end: Vec3::new(0.0, 0.7, 0.0),
            attraction_point_count: 200,
            spawn_center: Vec3::new(0.0, 10.0, 0.0),
            spawn_radius: 5.0,
            attraction_range: 7.0,
            kill_range: 1.4,
            step_length: 0.7,
            max_iterations: 2000,
        }
    }
}

impl ColonizationConfig {
    /// Check ranges: positive step, kill range inside attraction range,
    /// non-negative spawn radius and a stem of non-zero length.
    pub fn validate(&self) -> PlantResult<()> {
        if !(self.step_length > 0.0) {
            return Err(PlantError::InvalidRange {
                what: "step length",
                reason: format!("must be positive, got {}", self.step_length),
            });
        }
        if !(self.kill_range > 0.0) || self.kill_range >= self.attraction_range {
            return Err(PlantError::InvalidRange {
                what: "kill range",
                reason: format!(
                    "must be positive and below the attraction range ({} vs {})",
                    self.kill_range, self.attraction_range
                ),
            });
        }
        if self.spawn_radius < 0.0 {
            return Err(PlantError::InvalidRange {
                what: "spawn radius",
                reason: format!("must not be negative, got {}", self.spawn_radius),
            });
        }
        if self.stem_start.distance_squared(self.stem_end) <= f32::EPSILON {
            return Err(PlantError::InvalidRange {
                what: "stem",
                reason: "start and end coincide".to_string(),
            });
        }
        Ok(())
    }
}

/// What one growth iteration did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IterationReport {
    /// Points consumed by the kill pass.
    pub removed: usize,
    /// Points claimed by some segment.
    pub claimed: usize,
    /// Segments created this iteration.
    pub grown: usize,
    /// Growth came from the no-claim fallback.
    pub fallback: bool,
    /// The grower has finished (this or an earlier iteration).
    pub finished: bool,
}

/// Iterative space colonization grower.
#[derive(Debug)]
pub struct SpaceColonization {
    config: ColonizationConfig,
    graph: BranchGraph,
    points: Vec<Vec3>,
    extremities: Vec<SegmentId>,
    iterations: u32,
    finished: bool,
}

impl SpaceColonization {
    /// Create a grower with a random attraction cloud.
    pub fn new(config: ColonizationConfig) -> PlantResult<Self> {
        config.validate()?;
        let mut rng = StdRng::seed_from_u64(config.seed);
        let points = (0..config.attraction_point_count)
            .map(|_| config.spawn_center + random_in_unit_sphere(&mut rng) * config.spawn_radius)
            .collect();
        Self::with_points(config, points)
    }

    /// Create a grower over an explicit attraction point set.
    pub fn with_points(config: ColonizationConfig, points: Vec<Vec3>) -> PlantResult<Self> {
        config.validate()?;
        let mut graph = BranchGraph::new();
        let stem = graph.add_root(config.stem_start, config.stem_end);
        log::debug!(
            "Space colonization: {} attraction points, attraction {} kill {} step {}",
            points.len(),
            config.attraction_range,
            config.kill_range,
            config.step_length
        );
        Ok(Self {
            config,
            graph,
            points,
            extremities: vec![stem],
            iterations: 0,
            finished: false,
        })
    }

    /// Validated configuration.
    pub fn config(&self) -> &ColonizationConfig {
        &self.config
    }

    /// Graph grown so far.
    pub fn graph(&self) -> &BranchGraph {
        &self.graph
    }

    /// Attraction points not yet consumed.
    pub fn attraction_points(&self) -> &[Vec3] {
        &self.points
    }

    /// Segments grown in the last iteration (plus idle leaves); these extend
    /// when nothing is claimed.
    pub fn extremities(&self) -> &[SegmentId] {
        &self.extremities
    }

    /// Iterations performed so far.
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// True once every point is consumed or growth gave up.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Perform one growth iteration (one external tick).
    pub fn step(&mut self) -> IterationReport {
        let mut report = IterationReport::default();
        if self.finished {
            report.finished = true;
            return report;
        }
        if self.points.is_empty() {
            self.finish();
            report.finished = true;
            return report;
        }
        if self.iterations >= self.config.max_iterations {
            log::warn!(
                "Space colonization hit the iteration cap ({}) with {} unreachable points left",
                self.config.max_iterations,
                self.points.len()
            );
            self.finish();
            report.finished = true;
            return report;
        }
        self.iterations += 1;

        report.removed = self.prune();
        if self.points.is_empty() {
            self.finish();
            report.finished = true;
            return report;
        }

        let claims = self.claim();
        report.claimed = claims.iter().map(Vec::len).sum();

        if report.claimed > 0 {
            report.grown = self.branch(&claims);
        } else {
            report.fallback = true;
            report.grown = self.extend_extremities();
            if report.grown == 0 {
                log::warn!(
                    "Space colonization cannot progress: no extremities and {} unclaimed points",
                    self.points.len()
                );
                self.finish();
                report.finished = true;
            }
        }

        log::debug!(
            "Colonization iteration {}: removed {}, claimed {}, grew {}{}",
            self.iterations,
            report.removed,
            report.claimed,
            report.grown,
            if report.fallback { " (fallback)" } else { "" }
        );
        report
    }

    /// Step until no attraction points remain (or the iteration cap is hit)
    /// and hand over the finished graph.
    pub fn run(mut self) -> BranchGraph {
        while !self.step().finished {}
        self.graph
    }

    /// Hand over the graph as grown so far.
    pub fn into_graph(self) -> BranchGraph {
        self.graph
    }

    fn finish(&mut self) {
        if !self.finished {
            self.finished = true;
            log::info!(
                "Space colonization finished after {} iterations with {} segments",
                self.iterations,
                self.graph.len()
            );
        }
    }

    /// Remove every point within kill range of a segment end.
    fn prune(&mut self) -> usize {
        let kill = self.config.kill_range;
        let graph = &self.graph;
        let before = self.points.len();
        self.points
            .retain(|p| !graph.segments().iter().any(|s| s.end.distance(*p) < kill));
        before - self.points.len()
    }

    /// Per segment, the indices of the points it claims.
    ///
    /// Nearest end wins; exact ties go to the lower segment id.
    fn claim(&self) -> Vec<Vec<usize>> {
        let range = self.config.attraction_range;
        let mut claims = vec![Vec::new(); self.graph.len()];
        for (pi, point) in self.points.iter().enumerate() {
            let mut nearest: Option<SegmentId> = None;
            let mut nearest_dist = f32::MAX;
            for (si, segment) in self.graph.segments().iter().enumerate() {
                let dist = segment.end.distance(*point);
                if dist < range && dist < nearest_dist {
                    nearest_dist = dist;
                    nearest = Some(si);
                }
            }
            if let Some(si) = nearest {
                claims[si].push(pi);
            }
        }
        claims
    }

    fn branch(&mut self, claims: &[Vec<usize>]) -> usize {
        let step = self.config.step_length;
        let existing = self.graph.len();
        let mut extremities = Vec::new();
        let mut grown = 0;

        for id in 0..existing {
            let claimed = &claims[id];
            if claimed.is_empty() {
                if self.graph.segment(id).is_leaf() {
                    extremities.push(id);
                }
                continue;
            }

            let end = self.graph.segment(id).end;
            let first = self.points[claimed[0]];
            let mut dir = claimed
                .iter()
                .map(|&pi| (self.points[pi] - end).normalize_or_zero())
                .sum::<Vec3>()
                / claimed.len() as f32;
            dir = dir.normalize_or_zero();

            if dir == Vec3::ZERO || (end + dir * step).distance(first) >= end.distance(first) {
                dir = (first - end).normalize_or_zero();
            }
            if dir == Vec3::ZERO {
                log::warn!("Segment {} has no usable growth direction this iteration", id);
                if self.graph.segment(id).is_leaf() {
                    extremities.push(id);
                }
                continue;
            }

            let child_end = end + dir * step;
            let child = if self.graph.segment(id).is_leaf() {
                self.graph.add_continuation(id, child_end)
            } else {
                self.graph.add_divergence(id, child_end)
            };
            extremities.push(child);
            grown += 1;
        }

        self.extremities = extremities;
        grown
    }

    fn extend_extremities(&mut self) -> usize {
        let step = self.config.step_length;
        let mut grown = 0;
        for slot in 0..self.extremities.len() {
            let id = self.extremities[slot];
            let segment = self.graph.segment(id);
            let dir = if segment.direction == Vec3::ZERO {
                Vec3::Y
            } else {
                segment.direction
            };
            let end = segment.end + dir * step;
            let child = if segment.is_leaf() {
                self.graph.add_continuation(id, end)
            } else {
                self.graph.add_divergence(id, end)
            };
            self.extremities[slot] = child;
            grown += 1;
        }
        grown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ColonizationConfig {
        ColonizationConfig {
            attraction_point_count: 60,
            seed: 7,
            ..Default::default()
        }
    }

    #[test]
    fn rejects_kill_range_above_attraction_range() {
        let cfg = ColonizationConfig {
            kill_range: 8.0,
            ..Default::default()
        };
        assert!(matches!(
            SpaceColonization::new(cfg),
            Err(PlantError::InvalidRange { what: "kill range", .. })
        ));
    }

    #[test]
    fn spawned_points_lie_in_sphere() {
        let grower = SpaceColonization::new(config()).unwrap();
        assert_eq!(grower.attraction_points().len(), 60);
        for p in grower.attraction_points() {
            assert!(p.distance(Vec3::new(0.0, 10.0, 0.0)) <= 5.0 + 1e-4);
        }
    }

    #[test]
    fn colonization_terminates_and_consumes_all_points() {
        let grower = SpaceColonization::new(config()).unwrap();
        let graph = grower.run();
        assert!(graph.len() > 10);
        for s in graph.segments() {
            for &c in &s.children {
                assert_eq!(graph.segment(c).start, s.end);
            }
        }
    }

    #[test]
    fn same_seed_same_topology() {
        let a = SpaceColonization::new(config()).unwrap().run();
        let b = SpaceColonization::new(config()).unwrap().run();
        assert_eq!(a.len(), b.len());
        for (sa, sb) in a.segments().iter().zip(b.segments()) {
            assert_eq!(sa.children, sb.children);
            assert_eq!(sa.end, sb.end);
        }
    }

    #[test]
    fn distant_point_is_reached_by_fallback_growth() {
        let target = Vec3::new(0.0, 20.0, 0.0);
        let mut grower = SpaceColonization::with_points(config(), vec![target]).unwrap();
        let first = grower.step();
        assert!(first.fallback);
        assert_eq!(first.grown, 1);
        let mut guard = 0;
        while !grower.step().finished {
            guard += 1;
            assert!(guard < 100, "fallback growth never reached the point");
        }
        assert!(grower.attraction_points().is_empty());
        let graph = grower.into_graph();
        let top = graph.segments().iter().map(|s| s.end.y).fold(f32::MIN, f32::max);
        assert!(top > 20.0 - 1.4);
    }

    #[test]
    fn unreachable_point_stops_at_iteration_cap() {
        let cfg = ColonizationConfig {
            max_iterations: 25,
            ..config()
        };
        let mut grower =
            SpaceColonization::with_points(cfg, vec![Vec3::new(0.0, -30.0, 0.0)]).unwrap();
        let mut steps = 0;
        while !grower.step().finished {
            steps += 1;
        }
        assert_eq!(steps, 25);
        assert_eq!(grower.attraction_points().len(), 1);
    }

    #[test]
    fn kill_range_is_enforced_before_claiming() {
        let cfg = config();
        let tip = cfg.stem_end;
        let inside_kill = tip + Vec3::new(0.5, 0.5, 0.0);
        let in_range = tip + Vec3::new(0.0, 3.0, 0.0);
        let mut grower = SpaceColonization::with_points(cfg, vec![inside_kill, in_range]).unwrap();
        let report = grower.step();
        assert_eq!(report.removed, 1);
        assert_eq!(report.claimed, 1);
        assert_eq!(grower.attraction_points(), &[in_range]);
        let child = grower.graph().segment(1);
        assert!((child.direction - Vec3::Y).length() < 1e-5);
    }

    #[test]
    fn points_just_outside_kill_range_are_all_claimed_by_the_stem() {
        let cfg = config();
        let tip = cfg.stem_end;
        let radius = cfg.kill_range + 0.01;
        let points: Vec<Vec3> = (0..10)
            .map(|i| {
                let a = i as f32 / 10.0 * std::f32::consts::TAU;
                tip + Vec3::new(0.6 * a.cos(), 0.8, 0.6 * a.sin()) * radius
            })
            .collect();
        let mut grower = SpaceColonization::with_points(cfg, points).unwrap();
        let report = grower.step();
        assert_eq!(report.removed, 0);
        assert_eq!(report.claimed, 10);
        assert_eq!(report.grown, 1);
        let graph = grower.graph();
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.segment(0).children, vec![1]);
        assert!((graph.segment(1).direction - Vec3::Y).length() < 1e-4);
        assert_eq!(grower.extremities(), &[1]);
    }

    #[test]
    fn opposing_points_fall_back_to_first_claimed_direction() {
        let cfg = config();
        let tip = cfg.stem_end;
        let points = vec![tip + Vec3::new(2.0, 0.0, 0.0), tip - Vec3::new(2.0, 0.0, 0.0)];
        let mut grower = SpaceColonization::with_points(cfg, points).unwrap();
        let report = grower.step();
        assert_eq!(report.claimed, 2);
        assert_eq!(report.grown, 1);
        let child = grower.graph().segment(1);
        assert!((child.direction - Vec3::X).length() < 1e-5);
        assert!((child.end - (tip + Vec3::X * 0.7)).length() < 1e-5);
    }

    #[test]
    fn overshooting_average_snaps_to_first_claimed_point() {
        let cfg = config();
        let tip = cfg.stem_end;
        let points = vec![
            tip + Vec3::new(1.5, 0.0, 0.0),
            tip + Vec3::new(-3.0, 2.0, 0.0),
            tip + Vec3::new(-3.0, 2.1, 0.0),
            tip + Vec3::new(-2.9, 2.0, 0.0),
        ];
        let mut grower = SpaceColonization::with_points(cfg, points).unwrap();
        let report = grower.step();
        assert_eq!(report.removed, 0);
        assert_eq!(report.claimed, 4);
        let child = grower.graph().segment(1);
        assert!((child.direction - Vec3::X).length() < 1e-5);
    }

    #[test]
    fn later_children_open_new_strands() {
        let graph = SpaceColonization::new(config()).unwrap().run();
        for s in graph.segments() {
            if let Some(&first) = s.children.first() {
                assert_eq!(graph.segment(first).strand, s.strand);
            }
            for &c in s.children.iter().skip(1) {
                assert_ne!(graph.segment(c).strand, s.strand);
                assert_eq!(graph.segment(c).anchor_root, Some(graph.segment(c).parent.unwrap()));
            }
        }
    }
}
