//! L-system rewriting and turtle interpretation into a branch graph.
//!
//! Symbols understood by the turtle:
//! - `F` advance one step, emitting a segment
//! - `+` / `-` turn the current branch by the configured angle
//! - `[` / `]` push / pop a branch context
//! - `L` attach a leaf to the latest segment of the current branch
//! - `B` attach a flower to the latest segment of the current branch
//!
//! Every other symbol is carried through rewriting and ignored by the turtle.

use crate::segment::{BranchGraph, SegmentId};
use crate::shape::{random_unit_vector, ShapeKind};
use glam::{Quat, Vec3};
use plant_core::{PlantError, PlantResult};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A rewrite rule: every `symbol` becomes `replacement`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Symbol to rewrite.
    pub symbol: char,
    /// String substituted for every occurrence.
    pub replacement: String,
}

impl Rule {
    pub fn new(symbol: char, replacement: impl Into<String>) -> Self {
        Self {
            symbol,
            replacement: replacement.into(),
        }
    }
}

/// Configuration for L-system generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LSystemConfig {
    /// Seed for shape orientations.
    pub seed: u64,
    /// Initial string.
    pub axiom: String,
    /// Rewrite rules; the first rule for a symbol wins.
    pub rules: Vec<Rule>,
    /// Rewriting passes applied to the axiom.
    pub iterations: u32,
    /// Turn applied by `+` and `-`, in degrees.
    pub angle_degrees: f32,
    /// Length of the segment emitted by `F`.
    pub step_length: f32,
}

impl Default for LSystemConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            axiom: "F".to_string(),
            rules: vec![Rule::new('F', "FF-[-F+F+FL]+[+F-F-FB]")],
            iterations: 3,
            angle_degrees: 30.0,
            step_length: 0.7,
        }
    }
}

/// Output of [`LSystem::interpret`].
#[derive(Debug)]
pub struct Interpretation {
    /// Graph built by the turtle.
    pub graph: BranchGraph,
    /// `]` symbols found with only the base context on the stack.
    pub unbalanced_pops: usize,
    /// Stack depth after the last symbol (1 for balanced input).
    pub final_depth: usize,
    /// `F` symbols that had no segment to grow from.
    pub orphan_segments: usize,
    /// `L`/`B` symbols whose branch had no segment yet.
    pub orphan_shapes: usize,
}

/// One in-progress branch on the turtle stack.
#[derive(Debug)]
struct BranchContext {
    tip: Vec3,
    angle: f32,
    segments: Vec<SegmentId>,
}

impl BranchContext {
    fn new(tip: Vec3) -> Self {
        Self {
            tip,
            angle: 0.0,
            segments: Vec::new(),
        }
    }
}

/// Deterministic L-system generator.
#[derive(Debug, Clone)]
pub struct LSystem {
    config: LSystemConfig,
    rules: HashMap<char, String>,
}

impl LSystem {
    /// Validate `config` and index its rules.
    pub fn new(config: LSystemConfig) -> PlantResult<Self> {
        if config.iterations > 0 && config.rules.is_empty() {
            return Err(PlantError::EmptyRuleSet {
                iterations: config.iterations,
            });
        }
        if !(config.step_length > 0.0) {
            return Err(PlantError::InvalidRange {
                what: "step length",
                reason: format!("must be positive, got {}", config.step_length),
            });
        }

        let mut rules = HashMap::new();
        for rule in &config.rules {
            if rules.contains_key(&rule.symbol) {
                log::warn!("Duplicate L-system rule for '{}' ignored", rule.symbol);
                continue;
            }
            rules.insert(rule.symbol, rule.replacement.clone());
        }

        Ok(Self { config, rules })
    }

    /// Validated configuration.
    pub fn config(&self) -> &LSystemConfig {
        &self.config
    }

    /// Rewrite the axiom `iterations` times.
    pub fn expand(&self) -> String {
        let mut current = self.config.axiom.clone();
        for _ in 0..self.config.iterations {
            let mut next = String::with_capacity(current.len() * 2);
            for symbol in current.chars() {
                match self.rules.get(&symbol) {
                    Some(replacement) => next.push_str(replacement),
                    None => next.push(symbol),
                }
            }
            current = next;
        }
        log::debug!(
            "L-system expanded to {} symbols after {} iterations",
            current.len(),
            self.config.iterations
        );
        current
    }

    /// Expand and interpret in one go.
    pub fn generate(&self) -> Interpretation {
        self.interpret(&self.expand())
    }

    /// Run the turtle over `symbols` and build the branch graph.
    pub fn interpret(&self, symbols: &str) -> Interpretation {
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut graph = BranchGraph::new();
        let mut stack = vec![BranchContext::new(Vec3::ZERO)];
        let mut unbalanced_pops = 0;
        let mut orphan_segments = 0;
        let mut orphan_shapes = 0;

        for symbol in symbols.chars() {
            match symbol {
                'F' => {
                    if !self.advance(&mut graph, &mut stack) {
                        orphan_segments += 1;
                    }
                }
                '+' => {
                    if let Some(ctx) = stack.last_mut() {
                        ctx.angle += self.config.angle_degrees;
                    }
                }
                '-' => {
                    if let Some(ctx) = stack.last_mut() {
                        ctx.angle -= self.config.angle_degrees;
                    }
                }
                '[' => {
                    let tip = latest_segment(&stack)
                        .map(|id| graph.segment(id).end)
                        .unwrap_or(Vec3::ZERO);
                    stack.push(BranchContext::new(tip));
                }
                ']' => {
                    if stack.len() > 1 {
                        stack.pop();
                    } else {
                        unbalanced_pops += 1;
                        log::warn!("Unmatched ']' in L-system string ignored");
                    }
                }
                'L' | 'B' => {
                    let kind = if symbol == 'L' {
                        ShapeKind::Leaf
                    } else {
                        ShapeKind::Flower
                    };
                    match stack.last().and_then(|ctx| ctx.segments.last().copied()) {
                        Some(id) => {
                            let orientation = random_unit_vector(&mut rng);
                            graph.attach_shape(id, kind, orientation);
                        }
                        None => {
                            orphan_shapes += 1;
                            log::warn!("'{}' before any segment of its branch ignored", symbol);
                        }
                    }
                }
                _ => {}
            }
        }

        graph.promote_last_children();

        if stack.len() > 1 {
            log::warn!("L-system string left {} branch(es) open", stack.len() - 1);
        }
        log::info!(
            "L-system interpreted into {} segments on {} strands",
            graph.len(),
            graph.strand_count()
        );

        Interpretation {
            graph,
            unbalanced_pops,
            final_depth: stack.len(),
            orphan_segments,
            orphan_shapes,
        }
    }

    /// Emit one segment from the current branch tip. Returns `false` when
    /// the segment could not be attached anywhere.
    fn advance(&self, graph: &mut BranchGraph, stack: &mut [BranchContext]) -> bool {
        let parent = latest_segment(stack);
        let Some(ctx) = stack.last_mut() else {
            return false;
        };

        let rotation = Quat::from_rotation_z(ctx.angle.to_radians());
        let end = ctx.tip + rotation * Vec3::Y * self.config.step_length;

        let id = if let Some(&last) = ctx.segments.last() {
            graph.add_continuation(last, end)
        } else if let Some(parent) = parent {
            graph.add_divergence(parent, end)
        } else if graph.is_empty() {
            graph.add_root(ctx.tip, end)
        } else {
            log::warn!("'F' with no segment to grow from ignored");
            ctx.tip = end;
            return false;
        };

        ctx.tip = end;
        ctx.segments.push(id);
        true
    }
}

/// Latest segment of the innermost context that has one.
fn latest_segment(stack: &[BranchContext]) -> Option<SegmentId> {
    stack
        .iter()
        .rev()
        .find_map(|ctx| ctx.segments.last().copied())
}
