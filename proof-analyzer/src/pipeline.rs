//! Pipeline orchestration.
//!
//! [`ProofAnalyzer`] walks a fixed state machine
//!
//! ```text
//! Init -> Segmented -> Annotated -> AssumptionsExtracted -> Flagged -> GraphBuilt -> Done
//! ```
//!
//! running one component per transition. A stage that fails (error or panic)
//! leaves its artifact empty, appends a warning to `AnalysisResult::errors`
//! and the machine moves on, so `analyze` always returns a complete result.

use crate::annotate::annotate_all;
use crate::assumptions::AssumptionExtractor;
use crate::config::AnalyzerConfig;
use crate::error::{Error, Result};
use crate::gaps::{panic_message, DetectionContext, GapDetector, GapFlagger};
use crate::graph::GraphBuilder;
use crate::segment::{segment_with_limit, Segment};
use crate::types::{AnalysisResult, Assumption, DependencyGraph, Flag, Step};
use crate::vocabulary::Vocabulary;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, instrument, warn};

/// Position of a run in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    Init,
    Segmented,
    Annotated,
    AssumptionsExtracted,
    Flagged,
    GraphBuilt,
    Done,
}

impl PipelineState {
    /// The state after this one, `None` once done.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Init => Some(Self::Segmented),
            Self::Segmented => Some(Self::Annotated),
            Self::Annotated => Some(Self::AssumptionsExtracted),
            Self::AssumptionsExtracted => Some(Self::Flagged),
            Self::Flagged => Some(Self::GraphBuilt),
            Self::GraphBuilt => Some(Self::Done),
            Self::Done => None,
        }
    }

    /// Name of the stage whose completion leads into this state.
    pub fn stage(&self) -> Option<&'static str> {
        match self {
            Self::Init => None,
            Self::Segmented => Some("segmentation"),
            Self::Annotated => Some("annotation"),
            Self::AssumptionsExtracted => Some("assumption extraction"),
            Self::Flagged => Some("gap flagging"),
            Self::GraphBuilt => Some("graph construction"),
            Self::Done => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        *self == Self::Done
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Segmented => "segmented",
            Self::Annotated => "annotated",
            Self::AssumptionsExtracted => "assumptions_extracted",
            Self::Flagged => "flagged",
            Self::GraphBuilt => "graph_built",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Artifacts accumulated while walking the state machine.
#[derive(Default)]
struct Run {
    segments: Vec<Segment>,
    steps: Vec<Step>,
    assumptions: Vec<Assumption>,
    flags: Vec<Flag>,
    graph: DependencyGraph,
    errors: Vec<String>,
}

impl Run {
    fn finish(self) -> AnalysisResult {
        AnalysisResult {
            steps: self.steps,
            assumptions: self.assumptions,
            flags: self.flags,
            graph: self.graph,
            errors: self.errors,
        }
    }
}

/// Stateless proof analyzer. Configuration is fixed at construction; one
/// instance can serve concurrent calls from many threads.
pub struct ProofAnalyzer {
    config: AnalyzerConfig,
    vocabulary: Arc<Vocabulary>,
    flagger: GapFlagger,
}

impl Default for ProofAnalyzer {
    fn default() -> Self {
        Self {
            config: AnalyzerConfig::default(),
            vocabulary: Vocabulary::standard(),
            flagger: GapFlagger::standard(),
        }
    }
}

impl ProofAnalyzer {
    /// Build an analyzer, rejecting invalid configuration.
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        config.validate()?;
        let vocabulary = config.vocabulary();
        Ok(Self {
            config,
            vocabulary,
            flagger: GapFlagger::standard(),
        })
    }

    /// Register an additional gap detector after the canonical ones.
    pub fn with_detector(mut self, detector: impl GapDetector + 'static) -> Self {
        self.flagger = self.flagger.with_detector(detector);
        self
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn vocabulary(&self) -> &Arc<Vocabulary> {
        &self.vocabulary
    }

    /// Analyze one proof text. Never fails; empty or whitespace-only input
    /// yields an empty result.
    #[instrument(skip(self, text), fields(input_bytes = text.len()))]
    pub fn analyze(&self, text: &str) -> AnalysisResult {
        let mut run = Run::default();
        if text.trim().is_empty() {
            debug!("empty input, nothing to analyze");
            return run.finish();
        }

        let mut state = PipelineState::Init;
        while let Some(next) = state.next() {
            self.advance(next, text, &mut run);
            state = next;
        }
        debug_assert!(state.is_terminal());

        info!(
            steps = run.steps.len(),
            assumptions = run.assumptions.len(),
            flags = run.flags.len(),
            warnings = run.errors.len(),
            "analysis complete"
        );
        run.finish()
    }

    /// Run the stage leading into `state`.
    fn advance(&self, state: PipelineState, text: &str, run: &mut Run) {
        let Some(stage) = state.stage() else {
            return;
        };
        match state {
            PipelineState::Segmented => {
                run.segments = run_stage(stage, &mut run.errors, || self.segment(text));
            }
            PipelineState::Annotated => {
                let segments = &run.segments;
                run.steps = run_stage(stage, &mut run.errors, || {
                    Ok(annotate_all(segments, &self.vocabulary))
                });
            }
            PipelineState::AssumptionsExtracted => {
                let steps = &run.steps;
                run.assumptions = run_stage(stage, &mut run.errors, || {
                    let extractor = AssumptionExtractor::new(self.vocabulary.clone());
                    Ok((extractor.extract(steps), Vec::new()))
                });
            }
            PipelineState::Flagged => {
                let context = DetectionContext::new(&run.steps, &run.assumptions, &self.vocabulary);
                run.flags = run_stage(stage, &mut run.errors, || Ok(self.flagger.flag(&context)));
            }
            PipelineState::GraphBuilt => {
                let builder = GraphBuilder::new().with_label_width(self.config.label_width);
                let (steps, assumptions) = (&run.steps, &run.assumptions);
                run.graph = run_stage(stage, &mut run.errors, || {
                    Ok(builder.build(steps, assumptions))
                });
            }
            PipelineState::Init | PipelineState::Done => {}
        }
        debug!(%state, "stage finished");
    }

    fn segment(&self, text: &str) -> Result<(Vec<Segment>, Vec<String>)> {
        if text.len() > self.config.max_input_bytes {
            return Err(Error::input_too_large(text.len(), self.config.max_input_bytes));
        }
        let (segments, warning) = segment_with_limit(text, self.config.max_steps);
        Ok((segments, warning.into_iter().collect()))
    }
}

/// Run one stage behind an unwind boundary. Warnings the stage reports are
/// appended to `errors`; a failure appends one warning and yields the empty
/// artifact.
fn run_stage<T, F>(stage: &str, errors: &mut Vec<String>, f: F) -> T
where
    T: Default,
    F: FnOnce() -> Result<(T, Vec<String>)>,
{
    let outcome = catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|panic| Err(Error::stage(stage, panic_message(panic.as_ref()))));
    match outcome {
        Ok((artifact, warnings)) => {
            errors.extend(warnings);
            artifact
        }
        Err(e) => {
            let e = match e {
                Error::Stage { .. } => e,
                other => Error::stage(stage, other.to_string()),
            };
            warn!(stage, error = %e, "stage failed");
            errors.push(e.to_string());
            T::default()
        }
    }
}

static DEFAULT_ANALYZER: LazyLock<ProofAnalyzer> = LazyLock::new(ProofAnalyzer::default);

/// Analyze `text` with the standard configuration.
pub fn analyze_proof(text: &str) -> AnalysisResult {
    DEFAULT_ANALYZER.analyze(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        AssumptionId, EdgeKind, FlagType, NodeId, Scope, Severity, StepId,
    };
    use pretty_assertions::assert_eq;

    #[test]
    fn test_state_machine_order() {
        let mut states = vec![PipelineState::Init];
        while let Some(next) = states.last().and_then(|s| s.next()) {
            states.push(next);
        }
        let names: Vec<String> = states.iter().map(|s| s.to_string()).collect();
        assert_eq!(
            names,
            vec![
                "init",
                "segmented",
                "annotated",
                "assumptions_extracted",
                "flagged",
                "graph_built",
                "done"
            ]
        );
        assert!(PipelineState::Done.is_terminal());
        assert_eq!(PipelineState::Flagged.stage(), Some("gap flagging"));
    }

    #[test]
    fn test_scenario_empty_input() {
        let result = analyze_proof("");
        assert!(result.steps.is_empty());
        assert!(result.assumptions.is_empty());
        assert!(result.flags.is_empty());
        assert!(result.graph.nodes.is_empty());
        assert!(result.errors.is_empty());

        let result = analyze_proof("   \n\n  \t");
        assert!(result.is_empty());
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_scenario_finite_group() {
        let result = analyze_proof("Let G be a finite group. Then |G| divides |Sym(G)|.");
        assert_eq!(result.steps.len(), 2);
        assert_eq!(result.assumptions.len(), 1);

        let assumption = &result.assumptions[0];
        assert_eq!(assumption.scope, Scope::Global);
        assert_eq!(assumption.entities, vec!["G"]);
        assert_eq!(assumption.properties, vec!["finite"]);
        let introducing = result.step(assumption.step_id).unwrap();
        assert!(introducing.text.contains("Let G be a finite group"));

        let uses: Vec<_> = result.graph.edges_of_kind(EdgeKind::UsesAssumption).collect();
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].source, NodeId::Step(StepId(2)));
        assert_eq!(uses[0].target, NodeId::Assumption(AssumptionId(1)));
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_scenario_undefined_symbol() {
        let result = analyze_proof("Let $x$ be a real number. Then $x + y > 0$.");
        let flags: Vec<_> = result.flags_of_type(FlagType::UndefinedSymbol).collect();
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].severity, Severity::Medium);
        assert_eq!(flags[0].step_id, StepId(2));
        assert!(flags[0].message.contains("'y'"));
    }

    #[test]
    fn test_coordinated_and_map_hypotheses_define_their_symbols() {
        let result = analyze_proof("Let $G$ be a group and $H$ a subgroup of $G$. Then $|H|$ divides $|G|$.");
        assert_eq!(result.flags_of_type(FlagType::UndefinedSymbol).count(), 0);

        let result = analyze_proof("Suppose $f: X \\to Y$ is continuous. Then $f(X)$ lies in $Y$.");
        assert_eq!(result.flags_of_type(FlagType::UndefinedSymbol).count(), 0);
    }

    #[test]
    fn test_scenario_citation() {
        let cited = analyze_proof("Let $x$ be real. Then by Theorem 3, $x^2 \\geq 0$.");
        assert_eq!(cited.flags_of_type(FlagType::UncitedTheorem).count(), 0);

        let uncited = analyze_proof("Let $x$ be real. Then by Theorem, $x^2 \\geq 0$.");
        let flags: Vec<_> = uncited.flags_of_type(FlagType::UncitedTheorem).collect();
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].severity, Severity::Low);
        assert_eq!(flags[0].step_id, StepId(2));
    }

    #[test]
    fn test_numbered_proof_keeps_one_step_per_line() {
        let result = analyze_proof("1. Let $a = 1$.\n2. Then $a + 1 = 2$.\n3. By step 2 and (1), $a > 0$.");
        let texts: Vec<&str> = result.steps.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["1. Let $a = 1$.", "2. Then $a + 1 = 2$.", "3. By step 2 and (1), $a > 0$."]
        );
        let references: Vec<String> = result
            .graph
            .edges_of_kind(EdgeKind::ExplicitReference)
            .map(|e| format!("{}->{}", e.source, e.target))
            .collect();
        assert_eq!(references, vec!["S3->S2", "S3->S1"]);
        assert_eq!(result.flags_of_type(FlagType::MissingJustification).count(), 0);
        assert_eq!(result.assumptions.len(), 1);
        assert_eq!(result.assumptions[0].scope, Scope::Global);
    }

    #[test]
    fn test_result_json_layout() {
        let result = analyze_proof("Let G be a finite group. Then |G| divides |Sym(G)|.");
        let value: serde_json::Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(|k| k.as_str()).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(sorted, vec!["assumptions", "errors", "flags", "graph", "steps"]);
        assert_eq!(value["steps"][0]["id"], "S1");
        assert_eq!(value["steps"][1]["tokens"], serde_json::json!(["G", "Sym", "G"]));
        assert_eq!(value["assumptions"][0]["scope"], "global");
        assert_eq!(value["assumptions"][0]["step_id"], "S1");
        assert_eq!(value["graph"]["nodes"][2]["kind"], "assumption");
        assert_eq!(value["graph"]["edges"][0]["kind"], "sequential");
    }

    #[test]
    fn test_input_limit_fails_segmentation_only() {
        let analyzer =
            ProofAnalyzer::new(AnalyzerConfig::new().with_max_input_bytes(10)).unwrap();
        let result = analyzer.analyze("Let G be a finite group.");
        assert!(result.steps.is_empty());
        assert!(result.graph.is_empty());
        assert_eq!(
            result.errors,
            vec!["segmentation stage failed: Input is 24 bytes, exceeding the limit of 10 bytes"
                .to_string()]
        );
    }

    #[test]
    fn test_step_limit_warns() {
        let analyzer = ProofAnalyzer::new(AnalyzerConfig::new().with_max_steps(1)).unwrap();
        let result = analyzer.analyze("Let $x$ be real. Then $x^2 \\geq 0$.");
        assert_eq!(result.steps.len(), 1);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("limit of 1"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(matches!(
            ProofAnalyzer::new(AnalyzerConfig::new().with_max_steps(0)),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_run_stage_catches_panics() {
        let mut errors = Vec::new();
        let steps: Vec<Step> = run_stage("annotation", &mut errors, || -> Result<(Vec<Step>, Vec<String>)> {
            panic!("malformed span")
        });
        assert!(steps.is_empty());
        assert_eq!(errors, vec!["annotation stage failed: malformed span".to_string()]);

        let value: usize = run_stage("graph construction", &mut errors, || {
            Ok((7, vec!["note".to_string()]))
        });
        assert_eq!(value, 7);
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_shared_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ProofAnalyzer>();

        let analyzer = ProofAnalyzer::default();
        let input = "Let $n$ be odd. Then $n^2$ is odd. Hence $n^2 + m$ is even.";
        let expected = analyzer.analyze(input).fingerprint();
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| analyzer.analyze(input).fingerprint()))
                .collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap(), expected);
            }
        });
    }
}
