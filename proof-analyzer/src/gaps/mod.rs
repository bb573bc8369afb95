//! Gap flagging.
//!
//! Each rule of the flag table is a [`GapDetector`]: a self-contained unit
//! that inspects the immutable steps and assumptions and proposes flags.
//! [`GapFlagger`] holds the ordered registry, runs every detector, and turns
//! the proposals into numbered [`Flag`]s. A detector that fails is skipped
//! and reported as a warning; the others are unaffected.

mod detectors;

pub use detectors::{
    bound_symbols, MissingJustificationDetector, ScopeViolationDetector,
    UncitedTheoremDetector, UndefinedSymbolDetector,
};

use crate::error::{Error, Result};
use crate::types::{Assumption, Flag, FlagId, FlagType, Severity, Step, StepId};
use crate::vocabulary::Vocabulary;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, warn};

/// Read-only view handed to every detector.
#[derive(Debug, Clone, Copy)]
pub struct DetectionContext<'a> {
    pub steps: &'a [Step],
    pub assumptions: &'a [Assumption],
    pub vocabulary: &'a Vocabulary,
}

impl<'a> DetectionContext<'a> {
    pub fn new(steps: &'a [Step], assumptions: &'a [Assumption], vocabulary: &'a Vocabulary) -> Self {
        Self {
            steps,
            assumptions,
            vocabulary,
        }
    }

    pub fn step(&self, id: StepId) -> Option<&'a Step> {
        self.steps.get(id.index()).filter(|s| s.id == id)
    }

    /// Assumptions introduced at or before `step`.
    pub fn introduced_by(&self, step: StepId) -> impl Iterator<Item = &'a Assumption> {
        self.assumptions.iter().filter(move |a| a.step_id <= step)
    }

    /// Whether `symbol` is ignored by symbol-level rules.
    pub fn is_exempt(&self, symbol: &str) -> bool {
        symbol.starts_with(|c: char| c.is_ascii_digit()) || self.vocabulary.is_universal(symbol)
    }
}

/// A flag proposed by a detector, before id assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagDraft {
    pub step_id: StepId,
    pub message: String,
    pub suggestion: String,
    /// Overrides the flag type's default severity.
    pub severity: Option<Severity>,
}

impl FlagDraft {
    pub fn new(step_id: StepId, message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self {
            step_id,
            message: message.into(),
            suggestion: suggestion.into(),
            severity: None,
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }
}

/// One rule of the gap table.
pub trait GapDetector: Send + Sync {
    /// Name used in warnings.
    fn name(&self) -> &str;

    /// Type of every flag this detector emits.
    fn flag_type(&self) -> FlagType;

    /// Inspect the context and propose flags in step order.
    fn detect(&self, context: &DetectionContext<'_>) -> Result<Vec<FlagDraft>>;
}

/// Ordered registry of detectors.
pub struct GapFlagger {
    detectors: Vec<Box<dyn GapDetector>>,
}

impl Default for GapFlagger {
    fn default() -> Self {
        Self::standard()
    }
}

impl GapFlagger {
    /// A flagger with no rules.
    pub fn empty() -> Self {
        Self {
            detectors: Vec::new(),
        }
    }

    /// The canonical rule table, in order.
    pub fn standard() -> Self {
        Self::empty()
            .with_detector(UndefinedSymbolDetector)
            .with_detector(UncitedTheoremDetector)
            .with_detector(ScopeViolationDetector)
            .with_detector(MissingJustificationDetector)
    }

    /// Append a detector after the existing ones.
    pub fn with_detector(mut self, detector: impl GapDetector + 'static) -> Self {
        self.detectors.push(Box::new(detector));
        self
    }

    pub fn detector_names(&self) -> Vec<&str> {
        self.detectors.iter().map(|d| d.name()).collect()
    }

    /// Run every detector. Returns the flags plus one warning per skipped detector.
    pub fn flag(&self, context: &DetectionContext<'_>) -> (Vec<Flag>, Vec<String>) {
        let mut flags = Vec::new();
        let mut warnings = Vec::new();

        for detector in &self.detectors {
            match run_detector(detector.as_ref(), context) {
                Ok(mut drafts) => {
                    drafts.sort_by_key(|d| d.step_id);
                    debug!(detector = detector.name(), flags = drafts.len(), "detector finished");
                    let flag_type = detector.flag_type();
                    flags.extend(drafts.into_iter().map(|draft| Flag {
                        id: FlagId::from_index(0),
                        flag_type,
                        step_id: draft.step_id,
                        severity: draft.severity.unwrap_or_else(|| flag_type.default_severity()),
                        message: draft.message,
                        suggestion: draft.suggestion,
                    }));
                }
                Err(e) => {
                    warn!(detector = detector.name(), error = %e, "detector skipped");
                    warnings.push(format!("detector '{}' skipped: {}", detector.name(), reason(&e)));
                }
            }
        }

        for (index, flag) in flags.iter_mut().enumerate() {
            flag.id = FlagId::from_index(index);
        }
        (flags, warnings)
    }
}

fn run_detector(detector: &dyn GapDetector, context: &DetectionContext<'_>) -> Result<Vec<FlagDraft>> {
    let drafts = catch_unwind(AssertUnwindSafe(|| detector.detect(context)))
        .map_err(|panic| Error::detector(detector.name(), panic_message(panic.as_ref())))??;

    if let Some(draft) = drafts.iter().find(|d| context.step(d.step_id).is_none()) {
        return Err(Error::detector(
            detector.name(),
            format!("flag references unknown step {}", draft.step_id),
        ));
    }
    Ok(drafts)
}

fn reason(error: &Error) -> String {
    match error {
        Error::Detector { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

/// Text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panicked".to_string()
    }
}

/// Flag `steps`/`assumptions` with the canonical rule table.
pub fn flag_gaps(
    steps: &[Step],
    assumptions: &[Assumption],
    vocabulary: &Vocabulary,
) -> (Vec<Flag>, Vec<String>) {
    GapFlagger::standard().flag(&DetectionContext::new(steps, assumptions, vocabulary))
}
