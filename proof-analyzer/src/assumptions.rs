//! Assumption extraction.
//!
//! Finds hypothesis-introducing phrases ("Let X be …", "Suppose …",
//! "Assume …", "Fix …", "Define …"), binds the symbols they introduce and
//! collects short qualifying phrases. Scope is decided here, once, from
//! textual position and local-context markers; nothing downstream re-scopes
//! an assumption.

use crate::annotate::{in_math, math_regions, tokens_in, MathRegion};
use crate::types::{Assumption, AssumptionId, Scope, Step, StepId};
use crate::vocabulary::Vocabulary;
use regex::Regex;
use std::ops::Range;
use std::sync::{Arc, LazyLock};

static TRIGGER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:let|suppose(?:\s+that)?|assume(?:\s+that)?|fix|define)\b")
        .expect("invalid regex")
});

static NOT_A_HYPOTHESIS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s+(?:us|me)\b").expect("invalid regex"));

static WORD_COPULA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:be|is|are|denotes?|satisf(?:y|ies)|such\s+that|with|where)\b")
        .expect("invalid regex")
});

static PREDICATE_COPULA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:be|is|are)\b").expect("invalid regex"));

static MATH_RELATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r":=|\\coloneqq\b|=|\\in\b|\\subseteq\b|\\subset\b|\\leq?\b|\\geq?\b|\\neq?\b|<|>|:|\\colon\b")
        .expect("invalid regex")
});

static COORDINATED_SUBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\band\s+\$(?P<math>[^$]+)\$\s+(?:an?|the|some|is|are|be)\b")
        .expect("invalid regex")
});

static MAP_SIGNATURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^:]*(?::|\\colon)[^:]*\\(?:to|rightarrow|longrightarrow)\b")
        .expect("invalid regex")
});

static SUCH_THAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bsuch\s+that\b").expect("invalid regex"));

static OF_PHRASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bof\s+(?:[a-z\-]+\s+){0,2}?(?:order|degree|dimension|index|rank|type|characteristic|genus|size|length)\b(?:\s*\$[^$]+\$|\s+[A-Za-z0-9]\b)?",
    )
    .expect("invalid regex")
});

static LOCAL_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:for\s+(?:each|every|all|any|some)|given\s+any|in\s+this\s+case|subcase|case|otherwise|claim|to\s+see\s+this|we\s+first\s+show)\b",
    )
    .expect("invalid regex")
});

static CASE_CLOSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bin\s+(?:all|either|both|any|each)\s+cases?\b").expect("invalid regex")
});

static CASE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:sub)?case\b").expect("invalid regex"));

static CASE_HEAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:\\item\s*(?:\[[^\]]*\]\s*)?)?(?:\(?[0-9ivx]+[.)]\s*)?(?:sub)?case\b")
        .expect("invalid regex")
});

const ARTICLES: &[&str] = &["a", "an", "the", "some"];

const STOP_WORDS: &[&str] = &[
    "of", "with", "such", "that", "which", "where", "for", "then", "so", "since", "because",
    "in", "on", "over", "under", "to", "at", "by", "as", "if", "when", "we", "it", "and", "or",
    "is", "are", "be", "whose",
];

const MAX_PREDICATE_WORDS: usize = 3;

/// Extracts assumptions from annotated steps.
pub struct AssumptionExtractor {
    vocabulary: Arc<Vocabulary>,
}

impl Default for AssumptionExtractor {
    fn default() -> Self {
        Self::new(Vocabulary::standard())
    }
}

impl AssumptionExtractor {
    pub fn new(vocabulary: Arc<Vocabulary>) -> Self {
        Self { vocabulary }
    }

    /// Extract assumptions from every step, ids assigned left to right.
    pub fn extract(&self, steps: &[Step]) -> Vec<Assumption> {
        let mut assumptions = Vec::new();
        let mut case_open = false;

        for step in steps {
            for candidate in self.candidates(step) {
                let scope = self.classify(step, &candidate, case_open);
                assumptions.push(Assumption {
                    id: AssumptionId::from_index(assumptions.len()),
                    scope,
                    text: candidate.text,
                    entities: candidate.entities,
                    properties: candidate.properties,
                    step_id: step.id,
                });
            }
            case_open = case_state_after(step, case_open);
        }

        assumptions
    }

    fn candidates(&self, step: &Step) -> Vec<Candidate> {
        let text = step.text.as_str();
        let regions = math_regions(text);
        let triggers: Vec<Range<usize>> = TRIGGER
            .find_iter(text)
            .filter(|m| !in_math(&regions, m.start()))
            .filter(|m| !NOT_A_HYPOTHESIS.is_match(&text[m.end()..]))
            .map(|m| m.range())
            .collect();

        triggers
            .iter()
            .enumerate()
            .map(|(i, trigger)| {
                let limit = triggers.get(i + 1).map_or(text.len(), |next| next.start);
                let end = span_end(text, &regions, trigger.end, limit);
                self.candidate(step, &regions, trigger.clone(), end)
            })
            .collect()
    }

    fn candidate(
        &self,
        step: &Step,
        regions: &[MathRegion],
        trigger: Range<usize>,
        end: usize,
    ) -> Candidate {
        let text = step.text.as_str();
        let body = trigger.end..end;
        let subject_end = first_copula(text, regions, body.clone()).unwrap_or(end);

        let mut entities = self.entities(step, body.start..subject_end);
        if entities.is_empty() {
            entities = self.entities(step, trigger.start..end);
        }
        let extra = coordinated_subjects(text, regions, body.clone())
            .into_iter()
            .chain(map_signature(text, regions, subject_end));
        for range in extra {
            for entity in self.entities(step, range) {
                if !entities.contains(&entity) {
                    entities.push(entity);
                }
            }
        }

        Candidate {
            text: text[trigger.start..end].trim().to_string(),
            entities,
            properties: properties(text, regions, body),
            end,
        }
    }

    fn entities(&self, step: &Step, range: Range<usize>) -> Vec<String> {
        let mut entities: Vec<String> = Vec::new();
        for token in tokens_in(&step.tokens, range) {
            if token.is_numeric() || self.vocabulary.is_universal(&token.text) {
                continue;
            }
            if !entities.contains(&token.text) {
                entities.push(token.text.clone());
            }
        }
        entities
    }

    fn classify(&self, step: &Step, candidate: &Candidate, case_open: bool) -> Scope {
        if step.index() == 0 {
            return Scope::Global;
        }
        let context = CASE_CLOSE.replace_all(&step.text[..candidate.end], "");
        if case_open || LOCAL_MARKER.is_match(&context) {
            Scope::Local
        } else {
            Scope::Global
        }
    }
}

struct Candidate {
    text: String,
    entities: Vec<String>,
    properties: Vec<String>,
    end: usize,
}

/// Extract assumptions with the standard vocabulary.
pub fn extract_assumptions(steps: &[Step]) -> Vec<Assumption> {
    AssumptionExtractor::default().extract(steps)
}

/// Steps (as a zero-based index range) in which a local assumption
/// introduced at `index` is visible: the introducing step and the steps that
/// follow it in the same paragraph, up to the next case head or case closer.
pub fn local_region(steps: &[Step], index: usize) -> Range<usize> {
    let Some(origin) = steps.get(index) else {
        return index..index;
    };
    let end = steps[index + 1..]
        .iter()
        .position(|s| {
            s.paragraph != origin.paragraph
                || CASE_HEAD.is_match(&s.text)
                || CASE_CLOSE.is_match(&s.text)
        })
        .map_or(steps.len(), |p| index + 1 + p);
    index..end
}

/// Whether `step` lies in the local region of an assumption introduced at `origin`.
pub fn in_local_region(steps: &[Step], origin: StepId, step: StepId) -> bool {
    local_region(steps, origin.index()).contains(&step.index())
}

/// Case-split state after reading `step`.
fn case_state_after(step: &Step, open: bool) -> bool {
    if CASE_CLOSE.is_match(&step.text) {
        false
    } else {
        open || CASE_MARKER.is_match(&step.text)
    }
}

/// End of an assumption span: the first terminator outside math at or after
/// `from`, bounded by `limit`.
fn span_end(text: &str, regions: &[MathRegion], from: usize, limit: usize) -> usize {
    let bytes = text.as_bytes();
    for (offset, c) in text[from..limit].char_indices() {
        let pos = from + offset;
        if in_math(regions, pos) {
            continue;
        }
        match c {
            ';' | '!' | '?' => return pos,
            '.' if bytes.get(pos + 1).map_or(true, |b| b.is_ascii_whitespace()) => return pos,
            _ => {}
        }
    }
    limit
}

/// Position of the first copula in `body`: a word copula outside math or a
/// relation symbol inside math.
fn first_copula(text: &str, regions: &[MathRegion], body: Range<usize>) -> Option<usize> {
    let slice = &text[body.clone()];
    let word = WORD_COPULA
        .find_iter(slice)
        .map(|m| body.start + m.start())
        .find(|&pos| !in_math(regions, pos));
    let relation = MATH_RELATION
        .find_iter(slice)
        .map(|m| body.start + m.start())
        .find(|&pos| in_math(regions, pos));
    match (word, relation) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Math subjects joined to the first one by "and": the `$H$` of
/// "let $G$ be a group and $H$ a subgroup". Each range stops at the first
/// relation inside the math.
fn coordinated_subjects(text: &str, regions: &[MathRegion], body: Range<usize>) -> Vec<Range<usize>> {
    COORDINATED_SUBJECT
        .captures_iter(&text[body.clone()])
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            if in_math(regions, body.start + whole.start()) {
                return None;
            }
            let math = caps.name("math")?;
            let start = body.start + math.start();
            let head = MATH_RELATION
                .find(math.as_str())
                .map_or(math.end(), |m| math.start() + m.start());
            Some(start..body.start + head)
        })
        .collect()
}

/// Domain and codomain of a map signature `f: X \to Y` whose colon ends the
/// subject at `subject_end`.
fn map_signature(text: &str, regions: &[MathRegion], subject_end: usize) -> Option<Range<usize>> {
    let region = regions.iter().find(|r| r.inner.contains(&subject_end))?;
    MAP_SIGNATURE
        .is_match(&text[region.inner.clone()])
        .then(|| subject_end..region.inner.end)
}

fn properties(text: &str, regions: &[MathRegion], body: Range<usize>) -> Vec<String> {
    let slice = &text[body.clone()];
    let mut found: Vec<String> = Vec::new();
    let mut push = |property: String| {
        if !property.is_empty() && !found.contains(&property) {
            found.push(property);
        }
    };

    let such_that = SUCH_THAT
        .find_iter(slice)
        .find(|m| !in_math(regions, body.start + m.start()));
    let predicate_end = such_that.as_ref().map_or(slice.len(), |m| m.start());

    let copula = PREDICATE_COPULA
        .find_iter(&slice[..predicate_end])
        .find(|m| !in_math(regions, body.start + m.start()));
    let predicate_start = copula.map_or(0, |m| m.end());
    let predicate = prose_words(text, regions, body.start + predicate_start..body.start + predicate_end);

    match predicate.first().map(|w| w.to_lowercase()) {
        Some(first) if ARTICLES.contains(&first.as_str()) => {
            for modifier in noun_phrase_modifiers(&predicate[1..]) {
                push(modifier);
            }
        }
        Some(_) if copula.is_some() => {
            for adjective in predicate_adjectives(&predicate) {
                push(adjective);
            }
        }
        _ => {}
    }

    for m in OF_PHRASE.find_iter(slice) {
        if !in_math(regions, body.start + m.start()) {
            push(collapse_whitespace(m.as_str()));
        }
    }

    if let Some(m) = such_that {
        let clause = slice[m.start()..].trim_end_matches([',', ' ', '\n', '\t']);
        push(collapse_whitespace(clause));
    }

    found
}

/// Prose of `range` as words; math regions become a `$` placeholder and
/// commas stay as separate words.
fn prose_words(text: &str, regions: &[MathRegion], range: Range<usize>) -> Vec<String> {
    fn flush(current: &mut String, words: &mut Vec<String>) {
        if !current.is_empty() {
            words.push(std::mem::take(current));
        }
    }

    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_region = false;

    for (offset, c) in text[range.clone()].char_indices() {
        let pos = range.start + offset;
        if in_math(regions, pos) {
            if !in_region {
                flush(&mut current, &mut words);
                words.push("$".to_string());
                in_region = true;
            }
            continue;
        }
        in_region = false;
        if c.is_alphanumeric() || c == '-' || c == '\'' {
            current.push(c);
        } else {
            flush(&mut current, &mut words);
            if c == ',' {
                words.push(",".to_string());
            }
        }
    }
    flush(&mut current, &mut words);
    words
}

/// Modifiers of an article noun phrase, head noun dropped: `finite abelian group` gives
/// `finite`, `abelian`.
fn noun_phrase_modifiers(words: &[String]) -> Vec<String> {
    let phrase: Vec<&String> = words.iter().take_while(|w| is_phrase_word(w)).collect();
    match phrase.split_last() {
        Some((_, modifiers)) => modifiers.iter().map(|w| w.to_lowercase()).collect(),
        None => Vec::new(),
    }
}

/// Predicate adjectives split on `and` and commas, each at most a few words.
fn predicate_adjectives(words: &[String]) -> Vec<String> {
    let mut adjectives = Vec::new();
    let mut current: Vec<String> = Vec::new();
    for word in words {
        let lower = word.to_lowercase();
        if lower == "and" || lower == "," {
            if !current.is_empty() {
                adjectives.push(current.join(" "));
                current.clear();
            }
            continue;
        }
        if !is_phrase_word(word) {
            break;
        }
        if current.len() < MAX_PREDICATE_WORDS {
            current.push(lower);
        }
    }
    if !current.is_empty() {
        adjectives.push(current.join(" "));
    }
    adjectives
}

fn is_phrase_word(word: &str) -> bool {
    word.chars().count() > 1
        && word.chars().all(|c| c.is_alphabetic() || c == '-')
        && !STOP_WORDS.contains(&word.to_lowercase().as_str())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::annotate_all;
    use crate::segment::segment;
    use pretty_assertions::assert_eq;

    fn extract(input: &str) -> (Vec<Step>, Vec<Assumption>) {
        let vocabulary = Vocabulary::standard();
        let (steps, _) = annotate_all(&segment(input), &vocabulary);
        let assumptions = AssumptionExtractor::new(vocabulary).extract(&steps);
        (steps, assumptions)
    }

    #[test]
    fn test_finite_group() {
        let (_, assumptions) = extract("Let G be a finite group. Then |G| divides |Sym(G)|.");
        assert_eq!(assumptions.len(), 1);
        let a = &assumptions[0];
        assert_eq!(a.id, AssumptionId(1));
        assert_eq!(a.scope, Scope::Global);
        assert_eq!(a.text, "Let G be a finite group");
        assert_eq!(a.entities, vec!["G"]);
        assert_eq!(a.properties, vec!["finite"]);
        assert_eq!(a.step_id, StepId(1));
    }

    #[test]
    fn test_no_pattern_no_assumption() {
        let (_, assumptions) = extract("The square of any real number is non-negative.");
        assert!(assumptions.is_empty());
        let (_, assumptions) = extract("Let us show that $x^2 \\geq 0$.");
        assert!(assumptions.is_empty());
    }

    #[test]
    fn test_math_subject_and_of_phrase() {
        let (_, assumptions) =
            extract("Let $g \\in G$ be an element of finite order such that $g^2 = e$.");
        assert_eq!(assumptions.len(), 1);
        let a = &assumptions[0];
        assert_eq!(a.entities, vec!["g"]);
        assert_eq!(
            a.properties,
            vec!["of finite order", "such that $g^2 = e$"]
        );
    }

    #[test]
    fn test_predicate_adjectives() {
        let (_, assumptions) = extract("Suppose that $X$ is compact and connected.");
        assert_eq!(assumptions[0].entities, vec!["X"]);
        assert_eq!(assumptions[0].properties, vec!["compact", "connected"]);
    }

    #[test]
    fn test_universal_symbols_not_bound() {
        let (_, assumptions) = extract("Fix $\\epsilon > 0$ and let $x \\in \\mathbb{R}$.");
        assert_eq!(assumptions.len(), 2);
        assert_eq!(assumptions[0].entities, vec!["\\epsilon"]);
        assert_eq!(assumptions[1].entities, vec!["x"]);
        assert_eq!(assumptions[1].id, AssumptionId(2));
    }

    #[test]
    fn test_define_uses_assignment() {
        let (_, assumptions) = extract("Define $f(x) := x^2 + c$.");
        assert_eq!(assumptions[0].entities, vec!["f", "x"]);
    }

    #[test]
    fn test_coordinated_subjects_are_bound() {
        let (_, assumptions) = extract("Let $G$ be a group and $H$ a subgroup of $G$.");
        assert_eq!(assumptions.len(), 1);
        assert_eq!(assumptions[0].entities, vec!["G", "H"]);

        let (_, assumptions) = extract("Suppose $x$ is positive and $y \\in S$ is negative.");
        assert_eq!(assumptions[0].entities, vec!["x", "y"]);
    }

    #[test]
    fn test_map_domain_and_codomain_are_bound() {
        let (_, assumptions) = extract("Suppose $f: X \\to Y$ is continuous.");
        assert_eq!(assumptions.len(), 1);
        assert_eq!(assumptions[0].entities, vec!["f", "X", "Y"]);
        assert_eq!(assumptions[0].properties, vec!["continuous"]);

        let (_, assumptions) = extract("Let $g \\colon A \\rightarrow B$ be a bijection.");
        assert_eq!(assumptions[0].entities, vec!["g", "A", "B"]);
    }

    #[test]
    fn test_local_scope_markers() {
        let input = "Let $n$ be an integer. Case 1: Suppose $n$ is even. Then $n = 2k$ for some $k$.\n\nIn either case, we are done. Assume $m$ is odd.";
        let (steps, assumptions) = extract(input);
        assert!(steps.len() >= 4);
        let scopes: Vec<Scope> = assumptions.iter().map(|a| a.scope).collect();
        assert_eq!(scopes, vec![Scope::Global, Scope::Local, Scope::Global]);
    }

    #[test]
    fn test_quantified_context_is_local() {
        let (_, assumptions) =
            extract("Let $S$ be a set. Now for each $x \\in S$, let $y$ be its successor.");
        assert_eq!(assumptions[0].scope, Scope::Global);
        assert_eq!(assumptions[1].scope, Scope::Local);
        assert_eq!(assumptions[1].entities, vec!["y"]);
    }

    #[test]
    fn test_local_region() {
        let input = "Let $n$ be odd. Now for each $k$, let $m = k$. Then $m > 0$.\n\nHence $m$ is fine.";
        let (steps, _) = extract(input);
        let region = local_region(&steps, 1);
        assert_eq!(region, 1..3);
        assert!(in_local_region(&steps, StepId(2), StepId(3)));
        assert!(!in_local_region(&steps, StepId(2), StepId(4)));
    }
}
