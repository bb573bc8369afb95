//! Dependency graph construction.
//!
//! Nodes are every step followed by every assumption. Edges come in three
//! kinds and are emitted in that order: the sequential chain, uses of an
//! assumption's entities by later steps, and explicit backward references
//! between steps.
//! The graph is a multigraph keyed by `(source, target, kind)`; two edges of
//! different kinds may join the same pair.

mod dot;

pub use dot::DotConfig;

use crate::annotate::{in_math, math_regions};
use crate::types::{
    Assumption, DependencyGraph, EdgeKind, GraphEdge, GraphNode, NodeId, NodeKind, Step,
    StyleHint,
};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static STEP_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bsteps?\s*(?:\((?P<paren>\d+)\)|(?P<num>\d+))").expect("invalid regex")
});

static PREVIOUS_STEP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:previous|preceding|last)\s+step\b").expect("invalid regex")
});

static TAG_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\((?P<tag>\*{1,3}|\\ast|\\star|∗|†|\\dagger)\)").expect("invalid regex")
});

static LABEL_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\(?:eq|c|auto)?ref\{(?P<label>[^}]*)\}").expect("invalid regex")
});

static NUMBER_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((?P<n>\d+)\)").expect("invalid regex"));

static LEADING_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\\item\s*)?(?:\(\d+\)|\d+[.)]|Step\s+\(?\d+\)?[.:)]?)").expect("invalid regex")
});

/// Builds the dependency graph of one analysis.
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    label_width: usize,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self { label_width: 40 }
    }
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum characters of text in a node label.
    pub fn with_label_width(mut self, width: usize) -> Self {
        self.label_width = width;
        self
    }

    /// Build the graph. Returns the graph plus warnings for references that
    /// could not be bound to an earlier step.
    pub fn build(&self, steps: &[Step], assumptions: &[Assumption]) -> (DependencyGraph, Vec<String>) {
        let mut graph = DependencyGraph {
            nodes: self.nodes(steps, assumptions),
            edges: Vec::new(),
        };
        let mut seen: HashSet<GraphEdge> = HashSet::new();

        for pair in steps.windows(2) {
            let sequential = edge(pair[0].id, pair[1].id, EdgeKind::Sequential);
            insert_edge(&mut graph, &mut seen, sequential);
        }

        for step in steps {
            // only assumptions already made can be relied on
            for assumption in assumptions.iter().filter(|a| a.step_id < step.id) {
                if step.tokens.iter().any(|t| assumption.binds(&t.text)) {
                    let uses = edge(step.id, assumption.id, EdgeKind::UsesAssumption);
                    insert_edge(&mut graph, &mut seen, uses);
                }
            }
        }

        let mut warnings = Vec::new();
        let tags = TagOwners::new(steps);
        for step in steps {
            for target in references(steps, step, &tags, &mut warnings) {
                let reference = edge(step.id, steps[target].id, EdgeKind::ExplicitReference);
                insert_edge(&mut graph, &mut seen, reference);
            }
        }

        (graph, warnings)
    }

    fn nodes(&self, steps: &[Step], assumptions: &[Assumption]) -> Vec<GraphNode> {
        let step_nodes = steps.iter().map(|s| GraphNode {
            id: s.id.into(),
            kind: NodeKind::Step,
            label: format!("{}: {}", s.id, truncate_label(&s.text, self.label_width)),
            style_hint: StyleHint::Step,
        });
        let assumption_nodes = assumptions.iter().map(|a| GraphNode {
            id: a.id.into(),
            kind: NodeKind::Assumption,
            label: format!("{}: {}", a.id, truncate_label(&a.text, self.label_width)),
            style_hint: a.scope.into(),
        });
        step_nodes.chain(assumption_nodes).collect()
    }
}

/// Build the graph with default label width, discarding reference warnings.
pub fn build_graph(steps: &[Step], assumptions: &[Assumption]) -> DependencyGraph {
    GraphBuilder::default().build(steps, assumptions).0
}

/// Append `edge` unless an edge with the same source, target and kind is
/// already present. Returns whether it was added.
fn insert_edge(graph: &mut DependencyGraph, seen: &mut HashSet<GraphEdge>, edge: GraphEdge) -> bool {
    let added = seen.insert(edge);
    if added {
        graph.edges.push(edge);
    }
    added
}

fn edge(source: impl Into<NodeId>, target: impl Into<NodeId>, kind: EdgeKind) -> GraphEdge {
    GraphEdge {
        source: source.into(),
        target: target.into(),
        kind,
    }
}

/// Collapse whitespace and cut to `width` characters, marking the cut with `...`.
fn truncate_label(text: &str, width: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= width {
        collapsed
    } else {
        let kept: String = collapsed.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", kept.trim_end())
    }
}

/// First step carrying each `(*)`-style tag.
struct TagOwners {
    owners: Vec<(String, usize)>,
}

impl TagOwners {
    fn new(steps: &[Step]) -> Self {
        let mut owners: Vec<(String, usize)> = Vec::new();
        for step in steps {
            let mentioned = TAG_REFERENCE
                .captures_iter(&step.text)
                .map(|c| normalize_tag(&c["tag"]))
                .chain(step.labels.iter().map(|l| normalize_tag(l)));
            for tag in mentioned {
                if !owners.iter().any(|(t, _)| *t == tag) {
                    owners.push((tag, step.index()));
                }
            }
        }
        Self { owners }
    }

    fn owner(&self, tag: &str) -> Option<usize> {
        self.owners.iter().find(|(t, _)| t == tag).map(|(_, i)| *i)
    }
}

fn normalize_tag(tag: &str) -> String {
    match tag {
        "\\ast" | "∗" => "*".to_string(),
        "\\dagger" => "†".to_string(),
        other => other.to_string(),
    }
}

/// Zero-based indices of the earlier steps `step` refers back to, in order of mention.
fn references(
    steps: &[Step],
    step: &Step,
    tags: &TagOwners,
    warnings: &mut Vec<String>,
) -> Vec<usize> {
    let text = step.text.as_str();
    let here = step.index();
    let regions = math_regions(text);
    let own_marker = LEADING_MARKER.find(text).map_or(0, |m| m.end());
    let mut mentions: Vec<(usize, usize)> = Vec::new();

    for caps in STEP_REFERENCE.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        if whole.end() <= own_marker {
            continue;
        }
        let Some(number) = caps.name("paren").or_else(|| caps.name("num")) else {
            continue;
        };
        let n = number.as_str();
        let target = steps
            .iter()
            .position(|s| s.has_label(&format!("step:{}", n)))
            .or_else(|| steps.iter().position(|s| s.has_label(n)))
            .or_else(|| n.parse::<usize>().ok().and_then(|k| k.checked_sub(1)));
        match target {
            Some(t) if t < here => mentions.push((whole.start(), t)),
            Some(t) if t == here => {}
            _ => warnings.push(format!(
                "{}: '{}' does not refer to an earlier step",
                step.id,
                whole.as_str()
            )),
        }
    }

    if here > 0 {
        if let Some(m) = PREVIOUS_STEP.find(text) {
            mentions.push((m.start(), here - 1));
        }
    }

    for caps in TAG_REFERENCE.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        if let Some(owner) = tags.owner(&normalize_tag(&caps["tag"])) {
            if owner < here {
                mentions.push((whole.start(), owner));
            }
        }
    }

    for caps in LABEL_REFERENCE.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let label = caps["label"].trim();
        match steps.iter().position(|s| s.has_label(label)) {
            Some(t) if t < here => mentions.push((whole.start(), t)),
            Some(t) if t == here => {}
            _ => warnings.push(format!(
                "{}: '{}' does not refer to an earlier step",
                step.id,
                whole.as_str()
            )),
        }
    }

    for caps in NUMBER_REFERENCE.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        if whole.end() <= own_marker || in_math(&regions, whole.start()) {
            continue;
        }
        if let Some(t) = steps.iter().position(|s| s.has_label(&caps["n"])) {
            if t < here {
                mentions.push((whole.start(), t));
            }
        }
    }

    mentions.sort_by_key(|&(pos, _)| pos);
    let mut targets = Vec::new();
    for (_, target) in mentions {
        if !targets.contains(&target) {
            targets.push(target);
        }
    }
    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::annotate_all;
    use crate::assumptions::AssumptionExtractor;
    use crate::segment::segment;
    use crate::types::{AssumptionId, StepId};
    use crate::vocabulary::Vocabulary;
    use pretty_assertions::assert_eq;

    fn build(input: &str) -> (Vec<Step>, Vec<Assumption>, DependencyGraph, Vec<String>) {
        let vocabulary = Vocabulary::standard();
        let (steps, _) = annotate_all(&segment(input), &vocabulary);
        let assumptions = AssumptionExtractor::new(vocabulary).extract(&steps);
        let (graph, warnings) = GraphBuilder::new().build(&steps, &assumptions);
        (steps, assumptions, graph, warnings)
    }

    fn pairs(graph: &DependencyGraph, kind: EdgeKind) -> Vec<String> {
        graph
            .edges_of_kind(kind)
            .map(|e| format!("{}->{}", e.source, e.target))
            .collect()
    }

    #[test]
    fn test_empty_graph() {
        let (graph, warnings) = GraphBuilder::new().build(&[], &[]);
        assert!(graph.is_empty());
        assert!(graph.edges.is_empty());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_nodes_and_uses_assumption() {
        let (_, _, graph, _) = build("Let G be a finite group. Then |G| divides |Sym(G)|.");
        let ids: Vec<String> = graph.nodes.iter().map(|n| n.id.to_string()).collect();
        assert_eq!(ids, vec!["S1", "S2", "A1"]);
        assert_eq!(graph.nodes[0].label, "S1: Let G be a finite group.");
        assert_eq!(graph.nodes[2].style_hint, StyleHint::GlobalAssumption);
        assert_eq!(pairs(&graph, EdgeKind::Sequential), vec!["S1->S2"]);
        assert_eq!(pairs(&graph, EdgeKind::UsesAssumption), vec!["S2->A1"]);
        assert!(graph.contains_node(AssumptionId(1).into()));
    }

    #[test]
    fn test_sequential_chain() {
        let (steps, _, graph, _) = build("Let $x$ be real. Then $x^2 \\geq 0$. Hence done. Thus fine.");
        assert_eq!(steps.len(), 4);
        assert_eq!(
            pairs(&graph, EdgeKind::Sequential),
            vec![
                "S1->S2",
                "S2->S3",
                "S3->S4",
            ]
        );
    }

    #[test]
    fn test_step_and_previous_references() {
        let input = "Step 1: Let $n = 1$.\nStep 2: Then $n > 0$.\nStep 3: By Step 1 and the previous step, $n$ is positive.";
        let (_, _, graph, warnings) = build(input);
        assert!(warnings.is_empty(), "{:?}", warnings);
        assert_eq!(
            pairs(&graph, EdgeKind::ExplicitReference),
            vec!["S3->S1", "S3->S2"]
        );
    }

    #[test]
    fn test_tag_and_label_references() {
        let input = "Let $x$ be real. Then $$x^2 \\geq 0 \\tag{*}$$ holds.\n\nHence from (*) the claim follows. Finally by \\eqref{missing} we are done.";
        let (_, _, graph, warnings) = build(input);
        assert_eq!(
            pairs(&graph, EdgeKind::ExplicitReference),
            vec!["S3->S2"]
        );
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("S4:"));
    }

    #[test]
    fn test_forward_reference_warns() {
        let (_, _, graph, warnings) = build("Let $x$ be real. Then by Step 5, $x = 0$.");
        assert_eq!(graph.edges_of_kind(EdgeKind::ExplicitReference).count(), 0);
        assert_eq!(warnings, vec!["S2: 'Step 5' does not refer to an earlier step".to_string()]);
    }

    #[test]
    fn test_uses_assumption_only_points_backward() {
        let input = "Let $n$ be an integer. Case 1: Suppose $n$ is even. Then $n = 2k$ for some $k$.";
        let (steps, assumptions, graph, _) = build(input);
        assert_eq!(steps.len(), 3);
        assert_eq!(assumptions.len(), 2);
        assert_eq!(
            pairs(&graph, EdgeKind::UsesAssumption),
            vec!["S2->A1", "S3->A1", "S3->A2"]
        );
    }

    #[test]
    fn test_parallel_edges_of_different_kinds_kept() {
        let mut graph = DependencyGraph::default();
        let mut seen = HashSet::new();
        assert!(insert_edge(&mut graph, &mut seen, edge(StepId(1), StepId(2), EdgeKind::Sequential)));
        assert!(insert_edge(
            &mut graph,
            &mut seen,
            edge(StepId(1), StepId(2), EdgeKind::ExplicitReference)
        ));
        assert!(!insert_edge(&mut graph, &mut seen, edge(StepId(1), StepId(2), EdgeKind::Sequential)));

        let kinds: Vec<EdgeKind> = graph.edges.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EdgeKind::Sequential, EdgeKind::ExplicitReference]);
    }

    #[test]
    fn test_back_reference_is_distinct_from_sequential_edge() {
        let input = "Let $x$ be real. Now by the previous step, $x^2 \\geq 0$.";
        let (_, _, graph, _) = build(input);
        let between: Vec<EdgeKind> = graph
            .edges
            .iter()
            .filter(|e| e.source == NodeId::from(StepId(2)) && e.target == NodeId::from(StepId(1)))
            .map(|e| e.kind)
            .collect();
        assert_eq!(between, vec![EdgeKind::ExplicitReference]);
        assert_eq!(graph.edges_of_kind(EdgeKind::Sequential).count(), 1);
        let unique: HashSet<GraphEdge> = graph.edges.iter().copied().collect();
        assert_eq!(unique.len(), graph.edges.len());
    }

    #[test]
    fn test_truncate_label() {
        assert_eq!(truncate_label("short", 40), "short");
        assert_eq!(truncate_label("a  b\n c", 40), "a b c");
        assert_eq!(truncate_label("abcdefghij", 8), "abcde...");
        assert_eq!(truncate_label("αβγδεζηθ", 5), "αβ...");
    }
}
