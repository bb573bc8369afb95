//! Data model for proof analysis.
//!
//! Every record here is produced once by a pipeline stage and never mutated
//! afterwards. Serialization follows the fixed key layout consumed by
//! presentation layers: ids render as strings (`S1`, `A1`, `F1`), enum values
//! as snake_case, and internal bookkeeping (spans, paragraph numbers, style
//! hints) is left out.

use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::ops::Range;

macro_rules! ordinal_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub usize);

        impl $name {
            /// Id for the zero-based position `index`.
            pub fn from_index(index: usize) -> Self {
                Self(index + 1)
            }

            /// Zero-based position.
            pub fn index(&self) -> usize {
                self.0.saturating_sub(1)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }
    };
}

ordinal_id!(
    /// Identifier of a step, `S1`, `S2`, … in document order.
    StepId,
    "S"
);
ordinal_id!(
    /// Identifier of an assumption, `A1`, `A2`, … in order of appearance.
    AssumptionId,
    "A"
);
ordinal_id!(
    /// Identifier of a gap flag, `F1`, `F2`, ….
    FlagId,
    "F"
);

/// A math symbol extracted from a step, with its byte span inside the step text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub span: Range<usize>,
}

impl Token {
    pub fn new(text: impl Into<String>, span: Range<usize>) -> Self {
        Self {
            text: text.into(),
            span,
        }
    }

    /// Whether the token is a numeric literal.
    pub fn is_numeric(&self) -> bool {
        self.text.chars().next().is_some_and(|c| c.is_ascii_digit())
    }
}

impl Serialize for Token {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

/// One segmented unit of proof text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    pub id: StepId,
    /// Verbatim segment, trimmed of surrounding whitespace.
    pub text: String,
    /// Math symbols in first-seen order; duplicates kept.
    pub tokens: Vec<Token>,
    /// Matched vocabulary keywords, deduplicated, first-seen order.
    pub keywords: Vec<String>,
    /// Byte range of `text` within the analyzed input.
    #[serde(skip)]
    pub span: Range<usize>,
    /// Blank-line separated paragraph the step starts in (zero-based).
    #[serde(skip)]
    pub paragraph: usize,
    /// Labels this step can be referred back to by (`3`, `*`, `eq:main`).
    #[serde(skip)]
    pub labels: Vec<String>,
}

impl Step {
    /// Zero-based position in the proof.
    pub fn index(&self) -> usize {
        self.id.index()
    }

    /// Token texts in order.
    pub fn token_texts(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(|t| t.text.as_str())
    }

    /// Whether any token equals `symbol`.
    pub fn uses_symbol(&self, symbol: &str) -> bool {
        self.tokens.iter().any(|t| t.text == symbol)
    }

    /// Whether the step carries `label`.
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

/// Applicability of an assumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Holds for the whole proof.
    Global,
    /// Holds inside a sub-argument, case or quantifier body.
    Local,
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Global => write!(f, "global"),
            Self::Local => write!(f, "local"),
        }
    }
}

/// A hypothesis introduced by some step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assumption {
    pub id: AssumptionId,
    pub scope: Scope,
    pub text: String,
    /// Symbols the assumption binds, in order.
    pub entities: Vec<String>,
    /// Qualifying phrases such as `finite` or `of finite order`.
    pub properties: Vec<String>,
    /// Step that introduced the assumption.
    pub step_id: StepId,
}

impl Assumption {
    pub fn binds(&self, symbol: &str) -> bool {
        self.entities.iter().any(|e| e == symbol)
    }

    pub fn is_local(&self) -> bool {
        self.scope == Scope::Local
    }
}

/// Flag severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Kind of potential gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagType {
    UndefinedSymbol,
    UncitedTheorem,
    ScopeViolation,
    MissingJustification,
}

impl FlagType {
    /// Severity from the canonical rule table.
    pub fn default_severity(&self) -> Severity {
        match self {
            Self::UndefinedSymbol => Severity::Medium,
            Self::UncitedTheorem => Severity::Low,
            Self::ScopeViolation => Severity::High,
            Self::MissingJustification => Severity::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UndefinedSymbol => "undefined_symbol",
            Self::UncitedTheorem => "uncited_theorem",
            Self::ScopeViolation => "scope_violation",
            Self::MissingJustification => "missing_justification",
        }
    }
}

impl std::fmt::Display for FlagType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A heuristically detected potential gap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Flag {
    pub id: FlagId,
    #[serde(rename = "type")]
    pub flag_type: FlagType,
    pub step_id: StepId,
    pub severity: Severity,
    pub message: String,
    pub suggestion: String,
}

/// Identifier of a graph node: a step or an assumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeId {
    Step(StepId),
    Assumption(AssumptionId),
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Step(id) => id.fmt(f),
            Self::Assumption(id) => id.fmt(f),
        }
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl From<StepId> for NodeId {
    fn from(id: StepId) -> Self {
        Self::Step(id)
    }
}

impl From<AssumptionId> for NodeId {
    fn from(id: AssumptionId) -> Self {
        Self::Assumption(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Step,
    Assumption,
}

/// Rendering hint derived from node kind and assumption scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StyleHint {
    Step,
    GlobalAssumption,
    LocalAssumption,
}

impl From<Scope> for StyleHint {
    fn from(scope: Scope) -> Self {
        match scope {
            Scope::Global => Self::GlobalAssumption,
            Scope::Local => Self::LocalAssumption,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub label: String,
    #[serde(skip)]
    pub style_hint: StyleHint,
}

/// Relationship carried by an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Step i to step i+1.
    Sequential,
    /// Step to an assumption whose entities it uses.
    UsesAssumption,
    /// Step to an earlier step it refers back to.
    ExplicitReference,
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sequential => write!(f, "sequential"),
            Self::UsesAssumption => write!(f, "uses_assumption"),
            Self::ExplicitReference => write!(f, "explicit_reference"),
        }
    }
}

/// Directed edge; parallel edges of different kinds may join one pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct GraphEdge {
    pub source: NodeId,
    pub target: NodeId,
    pub kind: EdgeKind,
}

/// Dependency multigraph over steps and assumptions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DependencyGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl DependencyGraph {
    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    /// Edges of one kind, in insertion order.
    pub fn edges_of_kind(&self, kind: EdgeKind) -> impl Iterator<Item = &GraphEdge> {
        self.edges.iter().filter(move |e| e.kind == kind)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Complete output of one analysis run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisResult {
    pub steps: Vec<Step>,
    pub assumptions: Vec<Assumption>,
    pub flags: Vec<Flag>,
    pub graph: DependencyGraph,
    /// Non-fatal stage warnings, in the order they were raised.
    pub errors: Vec<String>,
}

impl AnalysisResult {
    pub fn step(&self, id: StepId) -> Option<&Step> {
        self.steps.get(id.index()).filter(|s| s.id == id)
    }

    pub fn assumption(&self, id: AssumptionId) -> Option<&Assumption> {
        self.assumptions.get(id.index()).filter(|a| a.id == id)
    }

    /// Flags of one type.
    pub fn flags_of_type(&self, flag_type: FlagType) -> impl Iterator<Item = &Flag> {
        self.flags.iter().filter(move |f| f.flag_type == flag_type)
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Compact JSON in the presentation contract layout.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// SHA-256 of the compact JSON, hex encoded. Identical inputs give
    /// identical fingerprints.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(serde_json::to_vec(self).unwrap_or_default());
        format!("{:x}", hasher.finalize())
    }

    pub fn summary(&self) -> AnalysisSummary {
        AnalysisSummary {
            steps: self.steps.len(),
            assumptions: self.assumptions.len(),
            flags: self.flags.len(),
            warnings: self.errors.clone(),
        }
    }
}

/// Counts reported after an analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisSummary {
    pub steps: usize,
    pub assumptions: usize,
    pub flags: usize,
    pub warnings: Vec<String>,
}

impl std::fmt::Display for AnalysisSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Analysis complete")?;
        writeln!(f, "- Steps found: {}", self.steps)?;
        writeln!(f, "- Assumptions detected: {}", self.assumptions)?;
        write!(f, "- Issues flagged: {}", self.flags)?;
        if !self.warnings.is_empty() {
            write!(f, "\n- Warnings: {}", self.warnings.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_step() -> Step {
        Step {
            id: StepId(1),
            text: "Let $x$ be real.".to_string(),
            tokens: vec![Token::new("x", 5..6)],
            keywords: vec!["let".to_string()],
            span: 0..16,
            paragraph: 0,
            labels: vec![],
        }
    }

    #[test]
    fn test_ids_display() {
        assert_eq!(StepId::from_index(0).to_string(), "S1");
        assert_eq!(AssumptionId(3).to_string(), "A3");
        assert_eq!(FlagId(12).to_string(), "F12");
        assert_eq!(NodeId::from(StepId(2)).to_string(), "S2");
        assert_eq!(StepId(4).index(), 3);
    }

    #[test]
    fn test_step_serializes_contract_keys_only() {
        let value = serde_json::to_value(sample_step()).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "S1",
                "text": "Let $x$ be real.",
                "tokens": ["x"],
                "keywords": ["let"],
            })
        );
    }

    #[test]
    fn test_flag_serializes_type_key() {
        let flag = Flag {
            id: FlagId(1),
            flag_type: FlagType::UndefinedSymbol,
            step_id: StepId(2),
            severity: Severity::Medium,
            message: "m".into(),
            suggestion: "s".into(),
        };
        let value = serde_json::to_value(&flag).unwrap();
        assert_eq!(value["type"], "undefined_symbol");
        assert_eq!(value["severity"], "medium");
        assert_eq!(value["step_id"], "S2");
    }

    #[test]
    fn test_graph_node_hides_style_hint() {
        let node = GraphNode {
            id: NodeId::Assumption(AssumptionId(1)),
            kind: NodeKind::Assumption,
            label: "A1: Let G be a group".into(),
            style_hint: StyleHint::GlobalAssumption,
        };
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(
            value,
            json!({"id": "A1", "kind": "assumption", "label": "A1: Let G be a group"})
        );
    }

    #[test]
    fn test_empty_result_layout() {
        let value = serde_json::to_value(AnalysisResult::default()).unwrap();
        assert_eq!(
            value,
            json!({
                "steps": [],
                "assumptions": [],
                "flags": [],
                "graph": {"nodes": [], "edges": []},
                "errors": [],
            })
        );
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let mut result = AnalysisResult::default();
        result.steps.push(sample_step());
        assert_eq!(result.fingerprint(), result.clone().fingerprint());
        assert_eq!(result.fingerprint().len(), 64);
        assert_ne!(result.fingerprint(), AnalysisResult::default().fingerprint());
    }

    #[test]
    fn test_summary_display() {
        let mut result = AnalysisResult::default();
        result.steps.push(sample_step());
        result.errors.push("detector 'x' skipped".into());
        let text = result.summary().to_string();
        assert!(text.contains("Steps found: 1"));
        assert!(text.contains("Warnings: detector 'x' skipped"));
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::High > Severity::Medium);
        assert_eq!(FlagType::ScopeViolation.default_severity(), Severity::High);
        assert_eq!(FlagType::UncitedTheorem.default_severity(), Severity::Low);
    }
}
