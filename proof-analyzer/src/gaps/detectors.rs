//! The canonical gap detectors.

use super::{DetectionContext, FlagDraft, GapDetector};
use crate::annotate::{in_math, math_regions, tokenize};
use crate::assumptions::in_local_region;
use crate::error::Result;
use crate::types::{FlagType, Step};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

static QUANTIFIED_MATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\\forall|\\exists!?|∀|∃)\s*(?P<head>[^,.:;|)$]*)").expect("invalid regex")
});

static QUANTIFIED_PROSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:for\s+(?:all|each|every|any|some)|there\s+(?:exists?|is|are)(?:\s+(?:an?|some))?)\s+(?:[a-z\-]+\s+){0,2}?(?:\$(?P<math>[^$]*)\$|(?P<letter>[A-Za-z])\b)",
    )
    .expect("invalid regex")
});

static INDEXED_OPERATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\(?:sum|prod|bigcup|bigcap|bigoplus|coprod|lim)\s*_\{?\s*(?P<index>[A-Za-z])")
        .expect("invalid regex")
});

static RELATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\in\b|\\notin\b|\\subseteq?\b|=|<|>|\\leq?\b|\\geq?\b|\\neq?\b|\\to\b|:")
        .expect("invalid regex")
});

static THEOREM_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?P<name>[A-Z][a-z]+(?:[-–][A-Z][a-z]+)*)(?:'s)?\s+(?P<kind>(?i:inequality|principle|criterion|formula|identity|theorem|lemma))\b|\b(?P<word>[Tt]heorem|[Ll]emma|[Pp]roposition|[Cc]orollary)s?\b",
    )
    .expect("invalid regex")
});

static CITED_AFTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:~|\s)*(?:\d|\\(?:c|auto)?ref\b|\\eqref\b|\\cite\w*\b|\[|\(\d|[IVX]+\b|[A-Z](?:\.\d+)*\b)")
        .expect("invalid regex")
});

static CITATION_IN_SENTENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\cite\w*\b|\[\d+(?:\s*[,;]\s*\d+)*\]").expect("invalid regex")
});

static RECALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\brecall\s+that\b").expect("invalid regex"));

static SELF_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:the|this|that|our|above|previous|preceding|following|same|main|present)\s+$")
        .expect("invalid regex")
});

/// Capitalised words that precede "theorem"/"lemma" without naming it.
const NOT_A_NAME: &[&str] = &[
    "The", "This", "That", "These", "Our", "Above", "Previous", "Preceding", "Following", "Same",
    "Main", "Present", "By", "From", "Using", "Apply", "Applying", "Recall", "Hence", "Thus",
    "Then", "So", "Now", "Since", "Each", "Every", "Any", "Some", "Another", "Key", "Last",
];

fn is_result_word(word: &str) -> bool {
    word.eq_ignore_ascii_case("theorem") || word.eq_ignore_ascii_case("lemma")
}

/// Symbols bound by a quantifier or an indexed operator in `step`:
/// `\forall x`, "for each $x \in S$", "there exists $k$", `\sum_{i=1}`.
pub fn bound_symbols(step: &Step) -> HashSet<String> {
    fn bind_head(fragment: &str, bound: &mut HashSet<String>) {
        let head = RELATION.find(fragment).map_or(fragment, |m| &fragment[..m.start()]);
        for token in tokenize(&format!("${}$", head)) {
            bound.insert(token.text);
        }
    }

    let mut bound = HashSet::new();
    let text = step.text.as_str();
    let regions = math_regions(text);

    for caps in QUANTIFIED_MATH.captures_iter(text) {
        if let Some(head) = caps.name("head") {
            bind_head(head.as_str(), &mut bound);
        }
    }
    for caps in QUANTIFIED_PROSE.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        if in_math(&regions, whole.start()) {
            continue;
        }
        if let Some(math) = caps.name("math") {
            bind_head(math.as_str(), &mut bound);
        } else if let Some(letter) = caps.name("letter") {
            bound.insert(letter.as_str().to_string());
        }
    }
    for caps in INDEXED_OPERATOR.captures_iter(text) {
        bound.insert(caps["index"].to_string());
    }
    bound
}

/// Earliest step index at which each symbol is introduced, by an assumption
/// or a quantifier.
fn introductions(context: &DetectionContext<'_>) -> HashMap<String, usize> {
    let mut first: HashMap<String, usize> = HashMap::new();
    let mut record = |symbol: &str, index: usize| {
        first
            .entry(symbol.to_string())
            .and_modify(|i| *i = (*i).min(index))
            .or_insert(index);
    };
    for assumption in context.assumptions {
        for entity in &assumption.entities {
            record(entity, assumption.step_id.index());
        }
    }
    for step in context.steps {
        for symbol in bound_symbols(step) {
            record(&symbol, step.index());
        }
    }
    first
}

/// Symbols used without a prior introduction. Each symbol is reported once,
/// at its first offending step.
pub struct UndefinedSymbolDetector;

impl GapDetector for UndefinedSymbolDetector {
    fn name(&self) -> &str {
        "undefined_symbol"
    }

    fn flag_type(&self) -> FlagType {
        FlagType::UndefinedSymbol
    }

    fn detect(&self, context: &DetectionContext<'_>) -> Result<Vec<FlagDraft>> {
        let introduced = introductions(context);
        let mut reported: HashSet<&str> = HashSet::new();
        let mut drafts = Vec::new();

        for step in context.steps {
            for token in &step.tokens {
                let symbol = token.text.as_str();
                if context.is_exempt(symbol) || reported.contains(symbol) {
                    continue;
                }
                let defined = introduced.get(symbol).is_some_and(|&i| i <= step.index());
                if !defined {
                    reported.insert(symbol);
                    drafts.push(FlagDraft::new(
                        step.id,
                        format!("Symbol '{}' is used in {} but never introduced", symbol, step.id),
                        format!(
                            "Introduce '{}' with an explicit assumption (e.g. \"Let {} be ...\") before it is used",
                            symbol, symbol
                        ),
                    ));
                }
            }
        }
        Ok(drafts)
    }
}

/// Named results invoked without a citation marker.
pub struct UncitedTheoremDetector;

impl UncitedTheoremDetector {
    fn uncited_references(step: &Step) -> Vec<String> {
        let text = step.text.as_str();
        if RECALL.is_match(text) {
            return Vec::new();
        }
        let regions = math_regions(text);
        let mut found: Vec<String> = Vec::new();

        for caps in THEOREM_REFERENCE.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            if in_math(&regions, whole.start()) {
                continue;
            }
            let before = &text[..whole.start()];
            if before.ends_with(['{', '\\']) {
                continue;
            }
            // "By Theorem" is a bare theorem word after a non-name
            let mut reference = whole;
            if let Some(name) = caps.name("name") {
                if NOT_A_NAME.contains(&name.as_str()) {
                    match caps.name("kind").filter(|k| is_result_word(k.as_str())) {
                        Some(kind) if !SELF_REFERENCE.is_match(&text[..kind.start()]) => {
                            reference = kind;
                        }
                        _ => continue,
                    }
                }
            } else if SELF_REFERENCE.is_match(before) {
                continue;
            }

            let after = &text[whole.end()..];
            if CITED_AFTER.is_match(after) {
                continue;
            }
            let sentence_end = after
                .match_indices(". ")
                .map(|(i, _)| i)
                .next()
                .unwrap_or(after.len());
            if CITATION_IN_SENTENCE.is_match(&after[..sentence_end]) {
                continue;
            }

            let reference = reference.as_str().to_string();
            if !found.contains(&reference) {
                found.push(reference);
            }
        }
        found
    }
}

impl GapDetector for UncitedTheoremDetector {
    fn name(&self) -> &str {
        "uncited_theorem"
    }

    fn flag_type(&self) -> FlagType {
        FlagType::UncitedTheorem
    }

    fn detect(&self, context: &DetectionContext<'_>) -> Result<Vec<FlagDraft>> {
        let mut drafts = Vec::new();
        for step in context.steps {
            for reference in Self::uncited_references(step) {
                drafts.push(FlagDraft::new(
                    step.id,
                    format!("'{}' is invoked without a citation", reference),
                    format!(
                        "Add a citation for '{}' (a number, \\ref or \\cite), or state it with \"Recall that\"",
                        reference
                    ),
                ));
            }
        }
        Ok(drafts)
    }
}

/// Entities of local assumptions used outside the context that introduced them.
pub struct ScopeViolationDetector;

impl GapDetector for ScopeViolationDetector {
    fn name(&self) -> &str {
        "scope_violation"
    }

    fn flag_type(&self) -> FlagType {
        FlagType::ScopeViolation
    }

    fn detect(&self, context: &DetectionContext<'_>) -> Result<Vec<FlagDraft>> {
        let mut drafts = Vec::new();

        for step in context.steps {
            let rebound = bound_symbols(step);
            let mut seen: HashSet<&str> = HashSet::new();
            for token in &step.tokens {
                let symbol = token.text.as_str();
                if context.is_exempt(symbol) || rebound.contains(symbol) || !seen.insert(symbol) {
                    continue;
                }
                let visible: Vec<_> = context
                    .introduced_by(step.id)
                    .filter(|a| a.binds(symbol))
                    .collect();
                let Some(origin) = visible.last() else {
                    continue;
                };
                let escaped = visible.iter().all(|a| {
                    a.is_local() && !in_local_region(context.steps, a.step_id, step.id)
                });
                if escaped {
                    drafts.push(FlagDraft::new(
                        step.id,
                        format!(
                            "'{}' comes from local assumption {} (introduced in {}) but is used in {} outside that context",
                            symbol, origin.id, origin.step_id, step.id
                        ),
                        format!(
                            "Re-scope the assumption on '{}' as global, or re-derive it locally in {}",
                            symbol, step.id
                        ),
                    ));
                }
            }
        }
        Ok(drafts)
    }
}

/// Steps with no keyword tying them to what came before.
pub struct MissingJustificationDetector;

impl GapDetector for MissingJustificationDetector {
    fn name(&self) -> &str {
        "missing_justification"
    }

    fn flag_type(&self) -> FlagType {
        FlagType::MissingJustification
    }

    fn detect(&self, context: &DetectionContext<'_>) -> Result<Vec<FlagDraft>> {
        Ok(context
            .steps
            .iter()
            .skip(1)
            .filter(|step| step.keywords.is_empty())
            .map(|step| {
                FlagDraft::new(
                    step.id,
                    format!("{} does not say how it follows from the previous step", step.id),
                    "Add a transitional justification such as \"therefore\", \"since ...\" or \"by ...\"",
                )
            })
            .collect())
    }
}
