//! # proof-analyzer
//!
//! Structural analysis of natural-language mathematical proofs written in
//! LaTeX. A proof is split into steps, its hypotheses are extracted, likely
//! logical gaps are flagged, and a dependency graph over steps and
//! assumptions is built.
//!
//! ## Core Components
//!
//! - **Segment / Annotate**: step boundaries, symbol tokens and keywords
//! - **Assumptions**: explicit hypotheses with entities, properties and scope
//! - **Gaps**: a registry of [`GapDetector`]s producing typed, ranked flags
//! - **Graph**: the dependency multigraph and its DOT export
//! - **Pipeline**: the orchestrating state machine behind [`analyze_proof`]
//!
//! ## Example
//!
//! ```rust
//! use proof_analyzer::{analyze_proof, FlagType};
//!
//! let result = analyze_proof("Let $x$ be a real number. Then $x + y > 0$.");
//! assert_eq!(result.steps.len(), 2);
//! assert_eq!(result.flags_of_type(FlagType::UndefinedSymbol).count(), 1);
//! println!("{}", result.graph.to_dot());
//! ```

pub mod annotate;
pub mod assumptions;
pub mod config;
pub mod error;
pub mod export;
pub mod gaps;
pub mod graph;
pub mod pipeline;
pub mod render;
pub mod segment;
pub mod types;
pub mod vocabulary;

mod proptest;

// Re-exports for convenience
pub use assumptions::{extract_assumptions, AssumptionExtractor};
pub use config::AnalyzerConfig;
pub use error::{validate_input, Error, Result};
pub use export::{
    export, suggested_output_path, write_artifact, ExportFormat, ExportOptions, ExportResult,
};
pub use gaps::{flag_gaps, DetectionContext, FlagDraft, GapDetector, GapFlagger};
pub use graph::{build_graph, DotConfig, GraphBuilder};
pub use pipeline::{analyze_proof, PipelineState, ProofAnalyzer};
pub use render::{GraphRenderer, ImageFormat};
pub use segment::{segment, Segment};
pub use types::{
    AnalysisResult, AnalysisSummary, Assumption, AssumptionId, DependencyGraph, EdgeKind, Flag,
    FlagId, FlagType, GraphEdge, GraphNode, NodeId, NodeKind, Scope, Severity, Step, StepId,
    StyleHint, Token,
};
pub use vocabulary::{KeywordEntry, KeywordKind, Vocabulary};
