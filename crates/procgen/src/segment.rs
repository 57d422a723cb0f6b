//! Branch segment arena shared by both topology generators.

use crate::shape::{DecorativeShape, ShapeKind};
use glam::Vec3;

/// Stable index of a segment inside a [`BranchGraph`].
pub type SegmentId = usize;

/// Visual grouping of segments drawn as one strand (one spline, one mesh).
pub type StrandId = usize;

/// An oriented line segment with parent/child links.
#[derive(Debug, Clone)]
pub struct BranchSegment {
    /// Start point; equals the parent's end point.
    pub start: Vec3,
    /// End point.
    pub end: Vec3,
    /// Unit vector from `start` to `end`.
    pub direction: Vec3,
    /// Back-reference; `None` for the stem.
    pub parent: Option<SegmentId>,
    /// Index 0 is the continuing direction.
    pub children: Vec<SegmentId>,
    /// Leaves and flowers hung on this segment.
    pub shapes: Vec<DecorativeShape>,
    /// Strand this segment is drawn with. Assigned by the generator.
    pub strand: Option<StrandId>,
    /// Mutable animation handle (the spline control point of this segment).
    pub anchor: Vec3,
    /// Segment whose anchor this segment's anchor is attached to, set on the
    /// first segment of a divergent strand.
    pub anchor_root: Option<SegmentId>,
}

impl BranchSegment {
    /// Distance from start to end.
    pub fn length(&self) -> f32 {
        self.start.distance(self.end)
    }

    /// True for the root segment.
    pub fn is_stem(&self) -> bool {
        self.parent.is_none()
    }

    /// True when nothing grows from this segment.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Arena of branch segments in creation order.
///
/// Children lists own the traversal; parents are plain index
/// back-references.
#[derive(Debug, Clone, Default)]
pub struct BranchGraph {
    segments: Vec<BranchSegment>,
    next_strand: StrandId,
}

impl BranchGraph {
    /// Empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the stem segment. It opens strand 0.
    pub fn add_root(&mut self, start: Vec3, end: Vec3) -> SegmentId {
        let strand = self.open_strand();
        self.push(start, end, None, Some(strand), None)
    }

    /// Append a child starting at the parent's end point.
    ///
    /// `strand` is left for the generator to decide; use
    /// [`BranchGraph::add_continuation`] or [`BranchGraph::add_divergence`]
    /// for the two usual cases.
    pub fn add_child(&mut self, parent: SegmentId, end: Vec3, strand: Option<StrandId>) -> SegmentId {
        let start = self.segments[parent].end;
        let id = self.push(start, end, Some(parent), strand, None);
        self.segments[parent].children.push(id);
        id
    }

    /// Child drawn with the same strand as its parent.
    pub fn add_continuation(&mut self, parent: SegmentId, end: Vec3) -> SegmentId {
        let strand = self.segments[parent].strand;
        self.add_child(parent, end, strand)
    }

    /// Child opening a new strand. Its anchor hangs on the parent's anchor.
    pub fn add_divergence(&mut self, parent: SegmentId, end: Vec3) -> SegmentId {
        let strand = self.open_strand();
        let id = self.add_child(parent, end, Some(strand));
        self.segments[id].anchor_root = Some(parent);
        self.segments[id].anchor = self.segments[parent].anchor;
        id
    }

    fn push(
        &mut self,
        start: Vec3,
        end: Vec3,
        parent: Option<SegmentId>,
        strand: Option<StrandId>,
        anchor_root: Option<SegmentId>,
    ) -> SegmentId {
        let id = self.segments.len();
        self.segments.push(BranchSegment {
            start,
            end,
            direction: (end - start).normalize_or_zero(),
            parent,
            children: Vec::new(),
            shapes: Vec::new(),
            strand,
            anchor: start,
            anchor_root,
        });
        id
    }

    /// Reserve a fresh strand id.
    pub fn open_strand(&mut self) -> StrandId {
        let id = self.next_strand;
        self.next_strand += 1;
        id
    }

    /// Number of strands opened so far.
    pub fn strand_count(&self) -> usize {
        self.next_strand
    }

    /// Attach a decorative shape of `kind` to `segment`.
    pub fn attach_shape(&mut self, segment: SegmentId, kind: ShapeKind, orientation: Vec3) {
        self.segments[segment]
            .shapes
            .push(DecorativeShape::new(segment, kind, orientation));
    }

    /// Move `last` child of every multi-child segment to index 0.
    pub fn promote_last_children(&mut self) {
        for segment in &mut self.segments {
            if segment.children.len() > 1 {
                if let Some(last) = segment.children.pop() {
                    segment.children.insert(0, last);
                }
            }
        }
    }

    /// The stem, if any segment exists.
    pub fn root(&self) -> Option<SegmentId> {
        if self.segments.is_empty() {
            None
        } else {
            Some(0)
        }
    }

    /// Segment `id`, if it exists.
    pub fn get(&self, id: SegmentId) -> Option<&BranchSegment> {
        self.segments.get(id)
    }

    /// Segment `id`. Panics on an id this graph did not hand out.
    pub fn segment(&self, id: SegmentId) -> &BranchSegment {
        &self.segments[id]
    }

    /// Mutable segment `id`. Panics on an id this graph did not hand out.
    pub fn segment_mut(&mut self, id: SegmentId) -> &mut BranchSegment {
        &mut self.segments[id]
    }

    /// All segments in creation order.
    pub fn segments(&self) -> &[BranchSegment] {
        &self.segments
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// True before the stem is added.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segments without children.
    pub fn leaves(&self) -> impl Iterator<Item = SegmentId> + '_ {
        self.segments
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_leaf())
            .map(|(i, _)| i)
    }

    /// Number of segments on the path from the stem to `id`, inclusive.
    pub fn depth(&self, id: SegmentId) -> usize {
        let mut depth = 1;
        let mut current = self.segments[id].parent;
        while let Some(parent) = current {
            depth += 1;
            current = self.segments[parent].parent;
        }
        depth
    }

    /// Total number of attached decorative shapes.
    pub fn shape_count(&self) -> usize {
        self.segments.iter().map(|s| s.shapes.len()).sum()
    }
}
