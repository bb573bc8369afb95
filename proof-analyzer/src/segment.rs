//! Segmentation of raw proof text into ordered steps.
//!
//! Boundaries come from paragraph breaks, `\item` and line-initial
//! enumeration markers, and sentence-initial proof keywords ("Let", "Then",
//! "Hence", …). Ambiguous boundaries are left unsplit: a spurious split
//! fragments assumption scope downstream, a missed one only makes a step
//! longer. Fragments that carry nothing but structural markers (`\qed`,
//! `\begin{proof}`) are folded into a neighbouring step.
//!
//! Segment spans are byte ranges into the input and cover every
//! non-whitespace character exactly once.

use crate::annotate::{in_math, math_regions, MathRegion};
use regex::Regex;
use std::collections::BTreeSet;
use std::ops::Range;
use std::sync::LazyLock;

/// One segment of input text, before annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Zero-based position in the proof.
    pub index: usize,
    /// `input[span]`.
    pub text: String,
    pub span: Range<usize>,
    /// Zero-based paragraph the segment starts in.
    pub paragraph: usize,
    /// Enumeration markers and `\label`/`\tag` names carried by the segment.
    pub labels: Vec<String>,
}

static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r?\n[ \t]*\r?\n").expect("invalid regex"));

static ITEM_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\item\b").expect("invalid regex"));

static LINE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?P<marker>\(\d+\)|\d+[.)]|Step\s+\d+[.:)]?)(?:[ \t]|$)")
        .expect("invalid regex")
});

static SENTENCE_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:(?P<term>[.!?])|\$\$|\\\]|\\end\{[A-Za-z*]+\}|\\begin\{proof\}(?:\[[^\]]*\])?)\s+(?P<kw>(?:Let|Suppose|Assume|Fix|Define|Consider|Then|Therefore|Hence|Thus|Now|Since|Finally|Conversely|Case|Subcase|Step\s+\d+)\b|Q\.\s?E\.\s?D\.?|\\qed\b)",
    )
    .expect("invalid regex")
});

static STRUCTURAL_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\\begin\{(?:proof|enumerate|itemize|description)\}(?:\[[^\]]*\])?|\\end\{(?:proof|enumerate|itemize|description)\}|\\(?:qed|qedhere|blacksquare|square|Box)\b|Q\.\s?E\.\s?D\.?|[∎□$.\s]|\\\[|\\\]",
    )
    .expect("invalid regex")
});

static LEADING_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\\item\s*)?(?:\((?P<paren>\d+)\)|(?P<num>\d+)[.)]|Step\s+(?P<step>\d+))")
        .expect("invalid regex")
});

static LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\(?:label|tag\*?)\{(?P<name>[^}]*)\}").expect("invalid regex")
});

const ABBREVIATIONS: &[&str] = &[
    "e.g", "i.e", "cf", "resp", "etc", "vs", "viz", "thm", "prop", "lem", "eq", "eqn", "fig",
    "sec", "def", "ch", "no",
];

/// Split `input` into segments.
pub fn segment(input: &str) -> Vec<Segment> {
    let regions = math_regions(input);
    let paragraph_breaks = paragraph_breaks(input, &regions);
    let points = split_points(input, &regions);

    let mut spans: Vec<Range<usize>> = Vec::new();
    let mut pending: Option<usize> = None;

    for window in points.windows(2) {
        let Some(span) = trimmed(input, window[0]..window[1]) else {
            continue;
        };
        if is_structural(&input[span.clone()]) {
            match spans.last_mut() {
                Some(previous) => previous.end = span.end,
                None => {
                    pending.get_or_insert(span.start);
                }
            }
            continue;
        }
        let start = pending.take().unwrap_or(span.start);
        spans.push(start..span.end);
    }
    if let Some(start) = pending {
        // nothing but structural markers: keep them as the single step
        if let Some(span) = trimmed(input, start..input.len()) {
            spans.push(span);
        }
    }

    spans
        .into_iter()
        .enumerate()
        .map(|(index, span)| build_segment(input, index, span, &paragraph_breaks))
        .collect()
}

/// Split `input`, merging segments past `max_steps` into the last permitted
/// one. Returns a warning when that happened.
pub fn segment_with_limit(input: &str, max_steps: usize) -> (Vec<Segment>, Option<String>) {
    let mut segments = segment(input);
    let max_steps = max_steps.max(1);
    if segments.len() <= max_steps {
        return (segments, None);
    }

    let total = segments.len();
    let tail = segments.split_off(max_steps);
    let end = tail.last().map(|s| s.span.end);
    if let (Some(last), Some(end)) = (segments.last_mut(), end) {
        last.span.end = end;
        last.text = input[last.span.clone()].to_string();
        for segment in tail {
            last.labels.extend(segment.labels);
        }
    }
    let warning = format!(
        "segmentation produced {} steps, above the limit of {}; the remainder was merged into the last step",
        total, max_steps
    );
    (segments, Some(warning))
}

fn split_points(input: &str, regions: &[MathRegion]) -> Vec<usize> {
    let mut points = BTreeSet::new();
    points.insert(0);
    points.insert(input.len());

    for m in PARAGRAPH_BREAK.find_iter(input) {
        if !in_math(regions, m.start()) {
            points.insert(m.end());
        }
    }
    for m in ITEM_MARKER.find_iter(input) {
        if !in_math(regions, m.start()) {
            points.insert(m.start());
        }
    }
    let mut markers: Vec<Range<usize>> = Vec::new();
    for caps in LINE_MARKER.captures_iter(input) {
        if let Some(marker) = caps.name("marker") {
            if !in_math(regions, marker.start()) {
                points.insert(marker.start());
                markers.push(marker.range());
            }
        }
    }
    for caps in SENTENCE_KEYWORD.captures_iter(input) {
        let Some(keyword) = caps.name("kw") else {
            continue;
        };
        if in_math(regions, keyword.start()) {
            continue;
        }
        if let Some(term) = caps.name("term") {
            if in_math(regions, term.start()) || ends_with_abbreviation(&input[..term.start()]) {
                continue;
            }
            // the dot of "1." or "Step 2." ends a marker, not a sentence
            if markers.iter().any(|m| m.contains(&term.start())) {
                continue;
            }
        }
        points.insert(keyword.start());
    }

    points.into_iter().collect()
}

fn paragraph_breaks(input: &str, regions: &[MathRegion]) -> Vec<usize> {
    PARAGRAPH_BREAK
        .find_iter(input)
        .filter(|m| !in_math(regions, m.start()))
        .map(|m| m.start())
        .collect()
}

fn trimmed(input: &str, range: Range<usize>) -> Option<Range<usize>> {
    let slice = &input[range.clone()];
    let leading = slice.len() - slice.trim_start().len();
    let trailing = slice.len() - slice.trim_end().len();
    if leading == slice.len() {
        return None;
    }
    Some(range.start + leading..range.end - trailing)
}

fn is_structural(text: &str) -> bool {
    STRUCTURAL_MARKER.replace_all(text, "").is_empty()
}

fn ends_with_abbreviation(before: &str) -> bool {
    let word: String = before
        .chars()
        .rev()
        .take_while(|c| c.is_alphanumeric() || *c == '.')
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    let word = word.trim_matches('.').to_lowercase();
    ABBREVIATIONS.contains(&word.as_str())
}

fn build_segment(
    input: &str,
    index: usize,
    span: Range<usize>,
    paragraph_breaks: &[usize],
) -> Segment {
    let text = input[span.clone()].to_string();
    let paragraph = paragraph_breaks.iter().filter(|&&b| b < span.start).count();
    let labels = labels_of(&text);
    Segment {
        index,
        text,
        span,
        paragraph,
        labels,
    }
}

fn labels_of(text: &str) -> Vec<String> {
    let mut labels = Vec::new();
    if let Some(caps) = LEADING_MARKER.captures(text) {
        if let Some(n) = caps.name("paren").or_else(|| caps.name("num")) {
            labels.push(n.as_str().to_string());
        }
        if let Some(n) = caps.name("step") {
            labels.push(format!("step:{}", n.as_str()));
        }
    }
    for caps in LABEL.captures_iter(text) {
        let name = caps["name"].trim().to_string();
        if !name.is_empty() && !labels.contains(&name) {
            labels.push(name);
        }
    }
    labels
}
