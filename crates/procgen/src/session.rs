//! Growth session: per-tick animation of grouped branches.
//!
//! A [`GrowthDriver`] holds the validated visual settings and the mesh
//! synthesizer. A [`GrowthSession`] owns everything that changes between
//! ticks, so several plants can be driven by one driver.

use crate::growth::{divergent_root_radius, group_into_branches, GrowthBranch, MIN_SPLINE_SEGMENTS};
use crate::mesh::{MeshSynthesizer, Ribbon, TubeMesh};
use crate::segment::{BranchGraph, SegmentId};
use crate::shape::{ShapeCatalog, ShapeFacing, ShapeKind, ShapeParams};
use crate::taper::TaperProfile;
use glam::Vec3;
use plant_core::{PlantError, PlantResult, Transform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Range of the per-branch sway speed, degrees per second.
const SWAY_SPEED_RANGE: (f32, f32) = (45.0, 90.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RenderMode {
    /// Closed 3D tubes with decorative meshes facing along the branch.
    Tube,
    /// 2D polylines with sprites facing the camera.
    Ribbon,
}

/// Visual settings for tessellation and growth timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualConfig {
    /// Seed for branch timing, sway speeds and shape sizes.
    pub seed: u64,
    /// Tube or ribbon output.
    pub render_mode: RenderMode,
    /// Vertices per tube ring.
    pub tube_sides: usize,
    /// Spline samples per anchor span.
    pub resolution: usize,
    /// Growth duration of the stem, seconds.
    pub stem_growth_duration: f32,
    /// Longest random start delay of a side branch, seconds.
    pub max_start_delay: f32,
    /// Radius falloff per branching generation.
    pub branch_radius_coeff: f32,
    /// Radius profile along each branch.
    pub taper: TaperProfile,
    /// Size and growth rate of leaves.
    pub leaf: ShapeParams,
    /// Size and growth rate of flowers.
    pub flower: ShapeParams,
    /// Downward tip displacement per senescent tick.
    pub droop_per_tick: f32,
    /// Relaxation rate while senescent, per second.
    pub stiffness: f32,
    /// Radius of the growth sway circle.
    pub sway_radius: f32,
    /// Eye position sprites face in ribbon mode.
    pub camera: Vec3,
}

impl Default for VisualConfig {
    fn default() -> Self {
        let shapes = ShapeCatalog::default();
        Self {
            seed: 7,
            render_mode: RenderMode::Tube,
            tube_sides: 10,
            resolution: 10,
            stem_growth_duration: 10.0,
            max_start_delay: 2.0,
            branch_radius_coeff: 0.9,
            taper: TaperProfile::default(),
            leaf: shapes.leaf,
            flower: shapes.flower,
            droop_per_tick: 0.01,
            stiffness: 0.2,
            sway_radius: 0.0001,
            camera: Vec3::new(0.0, 5.0, 20.0),
        }
    }
}

impl VisualConfig {
    /// Shape parameters by kind.
    pub fn shapes(&self) -> ShapeCatalog {
        ShapeCatalog {
            leaf: self.leaf,
            flower: self.flower,
        }
    }

    /// Check resolution, durations, non-negative rates, the taper profile
    /// and shape sizes.
    pub fn validate(&self) -> PlantResult<()> {
        if self.resolution < 2 {
            return Err(PlantError::ResolutionTooSmall(self.resolution));
        }
        if !(self.stem_growth_duration > 0.0) {
            return Err(PlantError::NonPositiveDuration {
                what: "stem growth duration",
                value: self.stem_growth_duration,
            });
        }
        let non_negative = [
            ("start delay", self.max_start_delay),
            ("branch radius coefficient", self.branch_radius_coeff),
            ("droop", self.droop_per_tick),
            ("stiffness", self.stiffness),
            ("sway radius", self.sway_radius),
        ];
        for (what, value) in non_negative {
            if !(value >= 0.0) {
                return Err(PlantError::InvalidRange {
                    what,
                    reason: format!("must not be negative, got {}", value),
                });
            }
        }
        self.taper.validate()?;
        self.shapes().validate()
    }
}

/// Geometry emitted for one branch this tick.
#[derive(Debug, Clone)]
pub enum Geometry {
    Tube(TubeMesh),
    Ribbon(Ribbon),
}

#[derive(Debug, Clone)]
pub struct BranchGeometry {
    /// Index into [`GrowthSession::branches`].
    pub branch: usize,
    /// Mesh or polyline for this tick.
    pub geometry: Geometry,
}

/// State a host applies to the node of one decorative shape.
#[derive(Debug, Clone)]
pub struct ShapeState {
    /// Segment the shape hangs on.
    pub segment: SegmentId,
    pub kind: ShapeKind,
    /// Local position, rotation and scale.
    pub transform: Transform,
    pub visible: bool,
}

/// Output of one tick.
#[derive(Debug, Clone, Default)]
pub struct GrowthFrame {
    /// Session time after this tick, seconds.
    pub time: f32,
    /// Geometry of every branch with enough revealed samples.
    pub branches: Vec<BranchGeometry>,
    /// State of every decorative shape.
    pub shapes: Vec<ShapeState>,
    /// All branches have finished growing.
    pub senescent: bool,
}

impl GrowthFrame {
    /// Tube emitted for `branch`, if any.
    pub fn tube(&self, branch: usize) -> Option<&TubeMesh> {
        self.branches.iter().find_map(|b| match &b.geometry {
            Geometry::Tube(mesh) if b.branch == branch => Some(mesh),
            _ => None,
        })
    }

    /// Number of shapes that have started growing.
    pub fn visible_shapes(&self) -> usize {
        self.shapes.iter().filter(|s| s.visible).count()
    }
}

/// Everything that changes while a plant grows.
#[derive(Debug, Clone)]
pub struct GrowthSession {
    graph: BranchGraph,
    branches: Vec<GrowthBranch>,
    /// Growth time spent per branch.
    elapsed: Vec<f32>,
    /// Waiting time spent per branch before it began.
    waited: Vec<f32>,
    time: f32,
    ticks: u64,
    senescent: bool,
    camera: Vec3,
}

impl GrowthSession {
    /// Segment graph with the current anchors.
    pub fn graph(&self) -> &BranchGraph {
        &self.graph
    }

    /// Branches in grouping-discovery order, stem first.
    pub fn branches(&self) -> &[GrowthBranch] {
        &self.branches
    }

    /// Seconds simulated so far.
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Ticks run so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// True once every branch has finished growing.
    pub fn is_senescent(&self) -> bool {
        self.senescent
    }

    /// Move the eye sprites face toward.
    pub fn set_camera(&mut self, eye: Vec3) {
        self.camera = eye;
    }

    /// Growth time spent by `branch`, seconds.
    pub fn elapsed(&self, branch: usize) -> f32 {
        self.elapsed[branch]
    }
}

/// Drives growth sessions with one set of visual settings.
#[derive(Debug, Clone)]
pub struct GrowthDriver {
    config: VisualConfig,
    synthesizer: MeshSynthesizer,
}

impl GrowthDriver {
    /// Validate `config` and build the mesh synthesizer.
    pub fn new(config: VisualConfig) -> PlantResult<Self> {
        config.validate()?;
        let synthesizer = MeshSynthesizer::new(config.tube_sides, config.taper.clone())?;
        Ok(Self { config, synthesizer })
    }

    /// Validated visual settings.
    pub fn config(&self) -> &VisualConfig {
        &self.config
    }

    /// Mesh synthesizer shared by every session.
    pub fn synthesizer(&self) -> &MeshSynthesizer {
        &self.synthesizer
    }

    /// Group a finished graph into branches and roll their timing, radii and
    /// shape parameters.
    pub fn start(&self, mut graph: BranchGraph) -> PlantResult<GrowthSession> {
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut branches = group_into_branches(&graph, self.config.resolution)?;
        let stem = self.config.stem_growth_duration;

        for i in 0..branches.len() {
            let (duration, delay, radius) = match branches[i].parent {
                None => (stem, 0.0, 1.0),
                Some(p) => {
                    let parent = &branches[p];
                    let radius = divergent_root_radius(
                        parent.root_radius,
                        branches[i].divergence_index,
                        parent.segment_count(),
                        self.config.branch_radius_coeff,
                    );
                    let duration = rng.gen_range(stem * 0.5..=stem);
                    let delay = rng.gen_range(0.0..=self.config.max_start_delay);
                    (duration, delay, radius)
                }
            };
            let branch = &mut branches[i];
            branch.set_timing(duration, delay);
            branch.root_radius = radius;
            branch.set_sway_speed(rng.gen_range(SWAY_SPEED_RANGE.0..SWAY_SPEED_RANGE.1));
        }

        let catalog = self.config.shapes();
        for id in 0..graph.len() {
            for shape in &mut graph.segment_mut(id).shapes {
                shape.configure(catalog.params(shape.kind), &mut rng)?;
            }
        }

        log::info!(
            "Growth session started: {} branches over {} segments, {} shapes",
            branches.len(),
            graph.len(),
            graph.shape_count()
        );

        let n = branches.len();
        Ok(GrowthSession {
            graph,
            branches,
            elapsed: vec![0.0; n],
            waited: vec![0.0; n],
            time: 0.0,
            ticks: 0,
            senescent: false,
            camera: self.config.camera,
        })
    }

    /// Advance every branch by `dt` seconds, stem first, and emit geometry.
    pub fn tick(&self, session: &mut GrowthSession, dt: f32) -> GrowthFrame {
        let dt = dt.max(0.0);
        session.time += dt;
        session.ticks += 1;
        let cfg = &self.config;

        let mut all_generated = true;
        for i in 0..session.branches.len() {
            session.branches[i].refresh(&mut session.graph, cfg.droop_per_tick, cfg.stiffness, dt);

            if session.branches[i].is_generated {
                continue;
            }
            if session.elapsed[i] >= session.branches[i].duration {
                let branch = &mut session.branches[i];
                session.elapsed[i] = branch.duration;
                branch.progress = 1.0;
                branch.sub_progress = 1.0;
                branch.is_generated = true;
                log::debug!("Branch {} fully grown at t={:.2}", i, session.time);
                continue;
            }
            all_generated = false;

            if !self.parent_allows(session, i) {
                continue;
            }
            if !session.branches[i].has_begun {
                session.waited[i] += dt;
                if session.waited[i] > session.branches[i].delay {
                    session.branches[i].has_begun = true;
                }
                continue;
            }

            session.elapsed[i] += dt;
            let elapsed = session.elapsed[i];
            let branch = &mut session.branches[i];
            branch.progress = (elapsed / branch.duration).clamp(0.0, 1.0);
            branch.sub_progress = if branch.part_duration > 0.0 {
                (elapsed % branch.part_duration) / branch.part_duration
            } else {
                1.0
            };
            branch.animate_sway(&mut session.graph, session.time, cfg.sway_radius);
        }

        if all_generated && !session.senescent {
            session.senescent = true;
            for branch in &mut session.branches {
                branch.is_senescent = true;
                branch.sub_progress = 1.0;
            }
            log::info!("All branches grown at t={:.2}, entering senescence", session.time);
        }

        let mut frame = GrowthFrame {
            time: session.time,
            senescent: session.senescent,
            ..Default::default()
        };
        for i in 0..session.branches.len() {
            if let Some(geometry) = self.synthesize(session, i) {
                frame.branches.push(BranchGeometry { branch: i, geometry });
                self.update_shapes(session, i, dt);
            }
        }
        frame.shapes = session
            .graph
            .segments()
            .iter()
            .flat_map(|s| &s.shapes)
            .map(|shape| ShapeState {
                segment: shape.segment,
                kind: shape.kind,
                transform: shape.transform,
                visible: shape.visible,
            })
            .collect();
        frame
    }

    /// A side branch waits until its parent has grown past the point it
    /// splits from.
    fn parent_allows(&self, session: &GrowthSession, i: usize) -> bool {
        let branch = &session.branches[i];
        let Some(p) = branch.parent else {
            return true;
        };
        let parent = &session.branches[p];
        if parent.is_generated {
            return true;
        }
        let count = parent.segment_count().max(1);
        let split = branch.divergence_index as f32 / count as f32;
        parent.progress > split
    }

    fn synthesize(&self, session: &GrowthSession, i: usize) -> Option<Geometry> {
        let branch = &session.branches[i];
        if branch.segment_count() < MIN_SPLINE_SEGMENTS {
            return None;
        }
        let points = branch.spline()?.points();
        if points.len() < 2 {
            return None;
        }
        match self.config.render_mode {
            RenderMode::Ribbon => self
                .synthesizer
                .ribbon(points, branch.root_radius, branch.progress)
                .map(Geometry::Ribbon),
            RenderMode::Tube => {
                let parent_progress = branch
                    .parent
                    .map(|p| session.branches[p].progress)
                    .unwrap_or(1.0);
                self.synthesizer
                    .tube(
                        points,
                        branch.root_radius,
                        branch.progress,
                        branch.sub_progress,
                        parent_progress,
                    )
                    .map(Geometry::Tube)
            }
        }
    }

    /// Update the shapes of segments revealed so far.
    fn update_shapes(&self, session: &mut GrowthSession, i: usize, dt: f32) {
        let branch = &session.branches[i];
        let unlocked = MeshSynthesizer::unlocked_samples(branch.segment_count(), branch.progress);
        for &id in &branch.segments[..unlocked] {
            let segment = session.graph.segment_mut(id);
            let anchor = segment.anchor;
            let facing = match self.config.render_mode {
                RenderMode::Tube => ShapeFacing::Branch {
                    tangent: segment.direction,
                },
                RenderMode::Ribbon => ShapeFacing::Camera { eye: session.camera },
            };
            for shape in &mut segment.shapes {
                shape.update(dt, anchor, facing);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lsystem::{LSystem, LSystemConfig};
    use crate::space_colonization::{ColonizationConfig, SpaceColonization};

    fn stem_graph(segments: usize) -> BranchGraph {
        let mut graph = BranchGraph::new();
        let mut last = graph.add_root(Vec3::ZERO, Vec3::Y);
        for i in 2..=segments {
            last = graph.add_continuation(last, Vec3::Y * i as f32);
        }
        graph
    }

    fn forked_graph() -> BranchGraph {
        let mut graph = stem_graph(8);
        let mut side = graph.add_divergence(3, Vec3::new(1.0, 4.5, 0.0));
        for i in 2..=5 {
            side = graph.add_continuation(side, Vec3::new(i as f32, 4.0 + i as f32 * 0.5, 0.0));
        }
        graph
    }

    fn driver() -> GrowthDriver {
        GrowthDriver::new(VisualConfig {
            stem_growth_duration: 2.0,
            max_start_delay: 0.5,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn invalid_visual_config_is_rejected() {
        let bad = VisualConfig {
            resolution: 1,
            ..Default::default()
        };
        assert_eq!(GrowthDriver::new(bad).unwrap_err(), PlantError::ResolutionTooSmall(1));
        let bad = VisualConfig {
            stem_growth_duration: 0.0,
            ..Default::default()
        };
        assert!(GrowthDriver::new(bad).unwrap_err().is_configuration());
        let bad = VisualConfig {
            tube_sides: 2,
            ..Default::default()
        };
        assert!(GrowthDriver::new(bad).is_err());
    }

    #[test]
    fn empty_graph_cannot_start() {
        assert_eq!(driver().start(BranchGraph::new()).unwrap_err(), PlantError::EmptyGraph);
    }

    #[test]
    fn stem_timing_and_side_branch_ranges() {
        let d = driver();
        let session = d.start(forked_graph()).unwrap();
        let stem = &session.branches()[0];
        assert_eq!(stem.duration, 2.0);
        assert_eq!(stem.delay, 0.0);
        assert_eq!(stem.root_radius, 1.0);
        let side = &session.branches()[1];
        assert!(side.duration >= 1.0 && side.duration <= 2.0);
        assert!(side.delay >= 0.0 && side.delay <= 0.5);
        assert!(side.root_radius < 1.0 && side.root_radius > 0.0);
    }

    #[test]
    fn progress_is_clamped_after_long_ticks() {
        let d = driver();
        let mut session = d.start(stem_graph(6)).unwrap();
        d.tick(&mut session, 0.1);
        d.tick(&mut session, 100.0);
        assert_eq!(session.branches()[0].progress, 1.0);
        d.tick(&mut session, 100.0);
        assert_eq!(session.branches()[0].progress, 1.0);
        assert!(session.branches()[0].is_generated);
        assert_eq!(session.elapsed(0), 2.0);
    }

    #[test]
    fn side_branch_waits_for_parent() {
        let d = driver();
        let mut session = d.start(forked_graph()).unwrap();
        let split = session.branches()[1].divergence_index as f32 / session.branches()[0].segment_count() as f32;
        let dt = 1.0 / 60.0;
        for _ in 0..600 {
            d.tick(&mut session, dt);
            let stem = &session.branches()[0];
            let side = &session.branches()[1];
            if side.has_begun {
                assert!(stem.progress > split || stem.is_generated);
            }
            if stem.progress <= split {
                assert_eq!(side.progress, 0.0);
            }
        }
        assert!(session.branches()[1].has_begun);
    }

    #[test]
    fn senescence_flips_once_everything_is_grown() {
        let d = driver();
        let mut session = d.start(forked_graph()).unwrap();
        let mut frame = GrowthFrame::default();
        for _ in 0..2000 {
            frame = d.tick(&mut session, 1.0 / 30.0);
            if frame.senescent {
                break;
            }
        }
        assert!(frame.senescent);
        assert!(session.branches().iter().all(|b| b.is_senescent && b.progress == 1.0));

        let side = session.branches()[1].clone();
        let tip = *side.segments.last().unwrap();
        let before = session.graph().segment(tip).anchor.y;
        for _ in 0..60 {
            d.tick(&mut session, 1.0 / 30.0);
        }
        let anchors = side.anchors(session.graph());
        assert!(anchors[anchors.len() - 1].y < before);
        let tip_length = anchors[anchors.len() - 2].distance(anchors[anchors.len() - 1]);
        assert!((tip_length - side.segment_lengths().last().unwrap()).abs() < 1e-4);
        assert_eq!(session.graph().segment(0).anchor, Vec3::ZERO);
    }

    #[test]
    fn short_branches_emit_no_geometry() {
        let d = driver();
        let mut session = d.start(stem_graph(3)).unwrap();
        for _ in 0..100 {
            let frame = d.tick(&mut session, 0.1);
            assert!(frame.branches.is_empty());
        }
    }

    #[test]
    fn tube_grows_with_progress() {
        let d = driver();
        let mut session = d.start(stem_graph(6)).unwrap();
        let mut rings = 0;
        for _ in 0..60 {
            let frame = d.tick(&mut session, 0.05);
            if let Some(mesh) = frame.tube(0) {
                assert!(mesh.ring_radii.len() >= rings);
                rings = mesh.ring_radii.len();
                assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertex_count()));
            }
        }
        // 5 spans * 10 samples, all revealed, plus the tip ring
        assert_eq!(rings, 51);
    }

    #[test]
    fn ribbon_mode_emits_polylines() {
        let d = GrowthDriver::new(VisualConfig {
            render_mode: RenderMode::Ribbon,
            stem_growth_duration: 1.0,
            ..Default::default()
        })
        .unwrap();
        let mut session = d.start(stem_graph(5)).unwrap();
        let mut last = None;
        for _ in 0..30 {
            let frame = d.tick(&mut session, 0.05);
            if let Some(b) = frame.branches.first() {
                last = Some(b.geometry.clone());
            }
        }
        match last {
            Some(Geometry::Ribbon(ribbon)) => {
                assert_eq!(ribbon.positions.len(), 40);
                assert!(ribbon.start_width > ribbon.end_width);
            }
            other => panic!("expected a ribbon, got {:?}", other),
        }
    }

    #[test]
    fn lsystem_plant_grows_to_senescence_with_shapes() {
        let lsystem = LSystem::new(LSystemConfig::default()).unwrap();
        let graph = lsystem.generate().graph;
        let d = GrowthDriver::new(VisualConfig::default()).unwrap();
        let mut session = d.start(graph).unwrap();
        assert!(session.graph().shape_count() > 0);
        let mut frame = GrowthFrame::default();
        for _ in 0..20_000 {
            frame = d.tick(&mut session, 1.0 / 30.0);
            if frame.senescent {
                break;
            }
        }
        assert!(frame.senescent);
        assert!(!frame.branches.is_empty());
        for _ in 0..300 {
            frame = d.tick(&mut session, 1.0 / 30.0);
        }
        assert!(frame.visible_shapes() > 0);
        for shape in frame.shapes.iter().filter(|s| s.visible) {
            assert!(shape.transform.uniform_scale() > 0.0);
        }
    }

    #[test]
    fn colonized_plant_starts_with_stem_first() {
        let grower = SpaceColonization::new(ColonizationConfig {
            attraction_point_count: 60,
            ..Default::default()
        })
        .unwrap();
        let graph = grower.run();
        let session = driver().start(graph).unwrap();
        let branches = session.branches();
        assert!(branches[0].parent.is_none());
        assert_eq!(branches[0].segments[0], 0);
        for (i, branch) in branches.iter().enumerate().skip(1) {
            assert!(branch.parent.unwrap() < i);
        }
    }
}
