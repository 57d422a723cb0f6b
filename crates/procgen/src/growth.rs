//! Growth branches: maximal strands of segments animated as one spline.

use crate::segment::{BranchGraph, SegmentId};
use crate::spline::CatmullRomSpline;
use glam::Vec3;
use plant_core::{PlantError, PlantResult};

/// Branches with fewer segments than this are not splined or tessellated.
pub const MIN_SPLINE_SEGMENTS: usize = 4;

/// One strand of the plant, drawn as a single spline and mesh.
#[derive(Debug, Clone)]
pub struct GrowthBranch {
    /// Index in grouping-discovery order; 0 is the stem.
    pub id: usize,
    /// Segments from base to tip.
    pub segments: Vec<SegmentId>,
    /// Branch this one diverges from.
    pub parent: Option<usize>,
    /// Length of the parent's segment list when this branch split off.
    pub divergence_index: usize,
    /// Radius multiplier at the base of the branch.
    pub root_radius: f32,
    /// Spline samples per anchor span.
    pub resolution: usize,

    /// Seconds to wait before growing, once the parent allows it.
    pub delay: f32,
    /// Seconds to grow from base to tip.
    pub duration: f32,
    /// Time to grow one spline sample.
    pub part_duration: f32,
    /// Fraction of the whole branch grown, in `[0, 1]`.
    pub progress: f32,
    /// Fraction of the current tip sample grown, in `[0, 1]`.
    pub sub_progress: f32,
    /// Delay elapsed; growth is under way.
    pub has_begun: bool,
    /// Fully grown.
    pub is_generated: bool,
    /// Wilting; the tip droops each tick.
    pub is_senescent: bool,

    spline: Option<CatmullRomSpline>,
    /// Anchor positions seen on the previous tick.
    rest_positions: Vec<Vec3>,
    /// Anchor positions at build time, moved only by root following.
    bind_positions: Vec<Vec3>,
    /// Original distance between consecutive anchors.
    segment_lengths: Vec<f32>,
    /// Angular speed of the growth sway, degrees per second.
    sway_speed: f32,
}

impl GrowthBranch {
    /// Empty branch; segments are added during grouping.
    pub fn new(id: usize, parent: Option<usize>, divergence_index: usize, resolution: usize) -> Self {
        Self {
            id,
            segments: Vec::new(),
            parent,
            divergence_index,
            root_radius: 1.0,
            resolution,
            delay: 0.0,
            duration: 1.0,
            part_duration: 1.0,
            progress: 0.0,
            sub_progress: 0.0,
            has_begun: false,
            is_generated: false,
            is_senescent: false,
            spline: None,
            rest_positions: Vec::new(),
            bind_positions: Vec::new(),
            segment_lengths: Vec::new(),
            sway_speed: 60.0,
        }
    }

    /// Append a segment and record its anchor.
    pub fn add_segment(&mut self, graph: &BranchGraph, id: SegmentId) {
        let anchor = graph.segment(id).anchor;
        if let Some(&previous) = self.rest_positions.last() {
            self.segment_lengths.push(previous.distance(anchor));
        }
        self.segments.push(id);
        self.rest_positions.push(anchor);
        self.bind_positions.push(anchor);
    }

    /// Number of segments (and anchors) in the branch.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Anchor spacing recorded at build time, base to tip.
    pub fn segment_lengths(&self) -> &[f32] {
        &self.segment_lengths
    }

    /// Spline through the anchors, once the branch is long enough.
    pub fn spline(&self) -> Option<&CatmullRomSpline> {
        self.spline.as_ref()
    }

    /// Angular speed of the growth sway.
    pub fn set_sway_speed(&mut self, degrees_per_second: f32) {
        self.sway_speed = degrees_per_second;
    }

    /// Set the growth duration and derive the per-sample duration.
    pub fn set_timing(&mut self, duration: f32, delay: f32) {
        self.duration = duration;
        self.delay = delay;
        let samples = self.segments.len().saturating_sub(1) * self.resolution;
        self.part_duration = if samples > 0 {
            duration / samples as f32
        } else {
            duration
        };
    }

    /// Current anchor positions, base to tip.
    pub fn anchors(&self, graph: &BranchGraph) -> Vec<Vec3> {
        self.segments.iter().map(|&id| graph.segment(id).anchor).collect()
    }

    /// Per-tick anchor maintenance followed by a spline rebuild.
    ///
    /// A senescent branch sinks its tip by `droop` and relaxes the rest of
    /// the chain with blend factor `stiffness * dt`.
    pub fn refresh(&mut self, graph: &mut BranchGraph, droop: f32, stiffness: f32, dt: f32) {
        if self.segments.is_empty() {
            return;
        }
        self.follow_root(graph);
        if self.is_senescent {
            self.relax(graph, droop, (stiffness * dt).clamp(0.0, 1.0));
        } else {
            self.settle(graph);
        }
        self.rebuild_spline(graph);
    }

    /// Keep a divergent branch attached to the anchor it hangs on.
    fn follow_root(&mut self, graph: &mut BranchGraph) {
        let first = self.segments[0];
        let Some(root) = graph.segment(first).anchor_root else {
            return;
        };
        let target = graph.segment(root).anchor;
        let delta = target - graph.segment(first).anchor;
        if delta == Vec3::ZERO {
            return;
        }
        for (i, &id) in self.segments.iter().enumerate() {
            graph.segment_mut(id).anchor += delta;
            self.rest_positions[i] += delta;
            self.bind_positions[i] += delta;
        }
        self.sync_segments(graph);
    }

    /// Accept anchors moved from outside (sway, a parent branch).
    fn settle(&mut self, graph: &mut BranchGraph) {
        let anchors = self.anchors(graph);
        if anchors != self.rest_positions {
            self.rest_positions = anchors;
            self.sync_segments(graph);
        }
    }

    /// Sink the tip and pull the chain after it.
    ///
    /// Targets come from a backward pass that hangs every anchor off the
    /// sunken tip at its original spacing, then a forward pass that rebuilds
    /// the chain from the pinned root with the same spacing. Interior
    /// anchors blend toward those targets; the tip is then held at its own
    /// segment length from its neighbour.
    fn relax(&mut self, graph: &mut BranchGraph, droop: f32, blend: f32) {
        let n = self.segments.len();
        if n < 2 {
            return;
        }
        let mut anchors = self.anchors(graph);
        let goal = anchors[n - 1] - Vec3::Y * droop;

        let mut targets = anchors.clone();
        targets[n - 1] = goal;
        for k in (1..n - 1).rev() {
            targets[k] = targets[k + 1] + toward(targets[k + 1], anchors[k]) * self.segment_lengths[k];
        }
        for k in 1..n - 1 {
            targets[k] = targets[k - 1] + toward(targets[k - 1], targets[k]) * self.segment_lengths[k - 1];
        }

        for k in 1..n - 1 {
            anchors[k] = anchors[k].lerp(targets[k], blend);
        }
        anchors[n - 1] = anchors[n - 2] + toward(anchors[n - 2], goal) * self.segment_lengths[n - 2];

        for (&id, &anchor) in self.segments.iter().zip(&anchors) {
            graph.segment_mut(id).anchor = anchor;
        }
        self.rest_positions = anchors;
        self.sync_segments(graph);
    }

    /// Write anchors back into segment start/end points.
    fn sync_segments(&self, graph: &mut BranchGraph) {
        for (k, &id) in self.segments.iter().enumerate() {
            let anchor = graph.segment(id).anchor;
            if k > 0 {
                let prev = graph.segment_mut(self.segments[k - 1]);
                prev.end = anchor;
                prev.direction = (prev.end - prev.start).normalize_or_zero();
            }
            let segment = graph.segment_mut(id);
            segment.start = anchor;
            segment.direction = (segment.end - segment.start).normalize_or_zero();
        }
    }

    fn rebuild_spline(&mut self, graph: &BranchGraph) {
        if self.segments.len() < MIN_SPLINE_SEGMENTS {
            return;
        }
        let anchors = self.anchors(graph);
        let result = if let Some(spline) = self.spline.as_mut() {
            spline.update_control_points(&anchors)
        } else {
            CatmullRomSpline::new(&anchors, self.resolution).map(|spline| {
                self.spline = Some(spline);
            })
        };
        if let Err(e) = result {
            log::warn!("Branch {} spline not rebuilt this tick: {}", self.id, e);
        }
    }

    /// Orbit the currently growing anchor (and the ones below it, less)
    /// around its bind position.
    pub fn animate_sway(&mut self, graph: &mut BranchGraph, time: f32, radius: f32) {
        let n = self.segments.len();
        if n == 0 || self.is_senescent || radius == 0.0 {
            return;
        }
        let index = ((self.progress * n as f32).ceil() as usize).min(n - 1);
        if index == 0 {
            return;
        }
        let angle = (time * self.sway_speed).to_radians();
        let offset = Vec3::new(angle.cos(), 0.0, angle.sin()) * radius;

        graph.segment_mut(self.segments[index]).anchor =
            self.bind_positions[index] + offset * index as f32;
        if index > 1 {
            let coeff = 1.0 / (index - 1) as f32;
            for i in 1..index {
                graph.segment_mut(self.segments[i]).anchor = self.bind_positions[i] + offset * coeff;
            }
        }
    }
}

/// Unit vector from `from` to `to`, straight up when they coincide.
fn toward(from: Vec3, to: Vec3) -> Vec3 {
    (to - from).try_normalize().unwrap_or(Vec3::Y)
}

/// Root radius of a branch diverging from a parent of `parent_radius`.
pub fn divergent_root_radius(
    parent_radius: f32,
    divergence_index: usize,
    parent_segment_count: usize,
    taper_coefficient: f32,
) -> f32 {
    let along = if parent_segment_count == 0 {
        0.0
    } else {
        divergence_index as f32 / parent_segment_count as f32
    };
    (1.0 - along).max(0.0) * parent_radius * taper_coefficient
}

/// Where a popped segment goes during grouping.
#[derive(Debug, Clone, Copy)]
enum Placement {
    Existing(usize),
    New { parent: Option<usize> },
}

/// Partition the graph into growth branches by strand.
///
/// Walks from the stem with an explicit stack, visiting children last to
/// first. A child on its parent's strand continues the parent's branch; any
/// other child opens a new branch that records where it diverged.
pub fn group_into_branches(graph: &BranchGraph, resolution: usize) -> PlantResult<Vec<GrowthBranch>> {
    let root = graph.root().ok_or(PlantError::EmptyGraph)?;
    let mut branches: Vec<GrowthBranch> = Vec::new();
    let mut work = vec![(root, Placement::New { parent: None })];

    while let Some((id, placement)) = work.pop() {
        let segment = graph.segment(id);
        let strand = segment.strand.ok_or(PlantError::MissingStrand(id))?;

        let branch = match placement {
            Placement::Existing(b) => b,
            Placement::New { parent } => {
                let index = branches.len();
                let divergence = parent.map(|p| branches[p].segment_count()).unwrap_or(0);
                branches.push(GrowthBranch::new(index, parent, divergence, resolution));
                index
            }
        };
        branches[branch].add_segment(graph, id);

        // Pushed first to last so the last child is visited first.
        for &child in &segment.children {
            let child_strand = graph.segment(child).strand.ok_or(PlantError::MissingStrand(child))?;
            let placement = if child_strand == strand {
                Placement::Existing(branch)
            } else {
                Placement::New { parent: Some(branch) }
            };
            work.push((child, placement));
        }
    }

    log::debug!("Grouped {} segments into {} growth branches", graph.len(), branches.len());
    Ok(branches)
}
