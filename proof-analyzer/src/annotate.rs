//! Lexical annotation of proof steps.
//!
//! Pulls math symbols out of each step and matches the keyword vocabulary.
//! Symbols come from two places:
//!
//! - math-mode content (`$…$`, `$$…$$`, `\(…\)`, `\[…\]`, math environments),
//!   tokenized into identifiers, commands and numeric literals with operators
//!   acting as separators;
//! - bare symbols in prose, so that plain-text proofs such as
//!   "Let G be a finite group" still yield `G`.

use crate::segment::Segment;
use crate::types::{Step, StepId, Token};
use crate::vocabulary::{classify_command, CommandClass, Vocabulary};
use std::ops::Range;

const MATH_ENVIRONMENTS: &[&str] = &[
    "equation",
    "align",
    "gather",
    "multline",
    "eqnarray",
    "displaymath",
    "math",
    "flalign",
    "alignat",
];

/// A math-mode region of some text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MathRegion {
    /// Range including delimiters.
    pub outer: Range<usize>,
    /// Range of the math content.
    pub inner: Range<usize>,
    /// False when the closing delimiter was missing and the region runs to
    /// the end of the text.
    pub terminated: bool,
}

/// Locate math regions in `text`, in order and non-overlapping.
pub fn math_regions(text: &str) -> Vec<MathRegion> {
    let bytes = text.as_bytes();
    let mut regions = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                let rest = &text[i..];
                let region = if rest.starts_with("\\(") {
                    Some(delimited(text, i, 2, "\\)"))
                } else if rest.starts_with("\\[") {
                    Some(delimited(text, i, 2, "\\]"))
                } else if rest.starts_with("\\begin{") {
                    math_environment(text, i)
                } else {
                    None
                };
                match region {
                    Some(region) => {
                        i = region.outer.end;
                        regions.push(region);
                    }
                    // skip the escaped character as well (`\$`)
                    None => i += if rest.starts_with("\\$") { 2 } else { 1 },
                }
            }
            b'$' => {
                let region = if bytes.get(i + 1) == Some(&b'$') {
                    delimited(text, i, 2, "$$")
                } else {
                    inline_dollar(text, i)
                };
                i = region.outer.end.max(i + 1);
                regions.push(region);
            }
            _ => i += 1,
        }
    }

    regions
}

fn delimited(text: &str, start: usize, open_len: usize, close: &str) -> MathRegion {
    let content_start = start + open_len;
    match text[content_start..].find(close) {
        Some(offset) => MathRegion {
            outer: start..content_start + offset + close.len(),
            inner: content_start..content_start + offset,
            terminated: true,
        },
        None => MathRegion {
            outer: start..text.len(),
            inner: content_start..text.len(),
            terminated: false,
        },
    }
}

fn inline_dollar(text: &str, start: usize) -> MathRegion {
    let bytes = text.as_bytes();
    let mut j = start + 1;
    while j < bytes.len() {
        if bytes[j] == b'$' && bytes[j - 1] != b'\\' {
            return MathRegion {
                outer: start..j + 1,
                inner: start + 1..j,
                terminated: true,
            };
        }
        j += 1;
    }
    MathRegion {
        outer: start..text.len(),
        inner: start + 1..text.len(),
        terminated: false,
    }
}

fn math_environment(text: &str, start: usize) -> Option<MathRegion> {
    let name_start = start + "\\begin{".len();
    let name_len = text[name_start..].find('}')?;
    let name = &text[name_start..name_start + name_len];
    if !MATH_ENVIRONMENTS.contains(&name.trim_end_matches('*')) {
        return None;
    }
    let open_len = "\\begin{".len() + name_len + 1;
    Some(delimited(text, start, open_len, &format!("\\end{{{}}}", name)))
}

/// Whether byte offset `pos` lies inside any region (delimiters included).
pub fn in_math(regions: &[MathRegion], pos: usize) -> bool {
    regions.iter().any(|r| r.outer.contains(&pos))
}

/// All symbol tokens of `text`, ordered by position.
pub fn tokenize(text: &str) -> Vec<Token> {
    let regions = math_regions(text);
    let mut tokens = Vec::new();
    let mut cursor = 0;
    for region in &regions {
        scan_prose(text, cursor..region.outer.start, &mut tokens);
        scan_math(text, region.inner.clone(), &mut tokens);
        cursor = region.outer.end;
    }
    scan_prose(text, cursor..text.len(), &mut tokens);
    tokens.sort_by_key(|t| t.span.start);
    tokens
}

/// Tokens whose start falls inside `range`.
pub fn tokens_in(tokens: &[Token], range: Range<usize>) -> impl Iterator<Item = &Token> {
    tokens.iter().filter(move |t| range.contains(&t.span.start))
}

/// Build the step for one segment.
pub fn annotate(segment: &Segment, vocabulary: &Vocabulary) -> Step {
    Step {
        id: StepId::from_index(segment.index),
        text: segment.text.clone(),
        tokens: tokenize(&segment.text),
        keywords: vocabulary.match_keywords(&segment.text),
        span: segment.span.clone(),
        paragraph: segment.paragraph,
        labels: segment.labels.clone(),
    }
}

/// Annotate every segment, reporting unterminated math as warnings.
pub fn annotate_all(segments: &[Segment], vocabulary: &Vocabulary) -> (Vec<Step>, Vec<String>) {
    let mut warnings = Vec::new();
    let steps = segments
        .iter()
        .map(|segment| {
            let step = annotate(segment, vocabulary);
            if math_regions(&step.text).iter().any(|r| !r.terminated) {
                warnings.push(format!(
                    "{}: unterminated math delimiter; the rest of the step was read as math",
                    step.id
                ));
            }
            step
        })
        .collect();
    (steps, warnings)
}

fn scan_math(text: &str, range: Range<usize>, out: &mut Vec<Token>) {
    let base = range.start;
    let slice = &text[range];
    let chars: Vec<(usize, char)> = slice.char_indices().collect();
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];
        if c == '\\' {
            let name_end = chars[i + 1..]
                .iter()
                .position(|(_, ch)| !ch.is_ascii_alphabetic())
                .map_or(chars.len(), |p| i + 1 + p);
            if name_end == i + 1 {
                // control symbol such as `\,` or `\{`
                i += 2;
                continue;
            }
            let name_start = chars[i + 1].0;
            let name_stop = chars.get(name_end).map_or(slice.len(), |(p, _)| *p);
            let name = &slice[name_start..name_stop];
            i = name_end;
            match classify_command(name) {
                CommandClass::Symbol => {
                    let (end, primes) = take_primes(&chars, i, slice.len());
                    out.push(Token::new(
                        format!("\\{}{}", name, primes),
                        base + pos..base + end,
                    ));
                    i += primes.len();
                }
                CommandClass::Font => {
                    if let Some((arg, next, end)) = command_argument(slice, &chars, i) {
                        out.push(Token::new(
                            format!("\\{}{{{}}}", name, arg),
                            base + pos..base + end,
                        ));
                        i = next;
                    }
                }
                CommandClass::Name => {
                    if let Some((arg, next, end)) = command_argument(slice, &chars, i) {
                        if !arg.is_empty() {
                            out.push(Token::new(arg, base + pos..base + end));
                        }
                        i = next;
                    }
                }
                CommandClass::Text => {
                    if let Some((_, next, _)) = braced_argument(slice, &chars, i) {
                        i = next;
                    }
                }
                CommandClass::Operator | CommandClass::Structural => {}
            }
        } else if c.is_ascii_alphabetic() {
            let mut j = i;
            while j < chars.len() && chars[j].1.is_ascii_alphanumeric() {
                j += 1;
            }
            let (end, primes) = take_primes(&chars, j, slice.len());
            let stop = chars.get(j).map_or(slice.len(), |(p, _)| *p);
            out.push(Token::new(
                format!("{}{}", &slice[pos..stop], primes),
                base + pos..base + end,
            ));
            i = j + primes.len();
        } else if c.is_ascii_digit() {
            let mut j = i;
            while j < chars.len() && chars[j].1.is_ascii_digit() {
                j += 1;
            }
            if j + 1 < chars.len() && chars[j].1 == '.' && chars[j + 1].1.is_ascii_digit() {
                j += 1;
                while j < chars.len() && chars[j].1.is_ascii_digit() {
                    j += 1;
                }
            }
            let stop = chars.get(j).map_or(slice.len(), |(p, _)| *p);
            out.push(Token::new(&slice[pos..stop], base + pos..base + stop));
            i = j;
        } else if c.is_alphabetic() {
            // unicode letters such as α or ℝ
            let (end, primes) = take_primes(&chars, i + 1, slice.len());
            out.push(Token::new(format!("{}{}", c, primes), base + pos..base + end));
            i += 1 + primes.len();
        } else {
            i += 1;
        }
    }
}

/// Consume `'` primes starting at char index `i`; returns the byte end and the primes.
fn take_primes(chars: &[(usize, char)], i: usize, slice_len: usize) -> (usize, String) {
    let mut primes = String::new();
    let mut j = i;
    while j < chars.len() && chars[j].1 == '\'' {
        primes.push('\'');
        j += 1;
    }
    let end = chars.get(j).map_or(slice_len, |(p, _)| *p);
    (end, primes)
}

/// Argument of a font/name command: `{...}` or a single following character.
/// Returns (argument, next char index, byte end).
fn command_argument(
    slice: &str,
    chars: &[(usize, char)],
    i: usize,
) -> Option<(String, usize, usize)> {
    let mut j = i;
    while j < chars.len() && chars[j].1 == ' ' {
        j += 1;
    }
    let (_, c) = *chars.get(j)?;
    if c == '{' {
        braced_argument(slice, chars, j)
    } else if c.is_alphanumeric() {
        let end = chars.get(j + 1).map_or(slice.len(), |(p, _)| *p);
        Some((c.to_string(), j + 1, end))
    } else {
        None
    }
}

/// Braced group starting at char index `i` (after optional spaces), with nesting.
fn braced_argument(
    slice: &str,
    chars: &[(usize, char)],
    i: usize,
) -> Option<(String, usize, usize)> {
    let mut j = i;
    while j < chars.len() && chars[j].1 == ' ' {
        j += 1;
    }
    if chars.get(j)?.1 != '{' {
        return None;
    }
    let open = j;
    let mut depth = 0usize;
    while j < chars.len() {
        match chars[j].1 {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let inner = &slice[chars[open].0 + 1..chars[j].0];
                    let end = chars.get(j + 1).map_or(slice.len(), |(p, _)| *p);
                    return Some((inner.trim().to_string(), j + 1, end));
                }
            }
            _ => {}
        }
        j += 1;
    }
    None
}

fn scan_prose(text: &str, range: Range<usize>, out: &mut Vec<Token>) {
    if range.is_empty() {
        return;
    }
    let base = range.start;
    let slice = &text[range];
    let chars: Vec<(usize, char)> = slice.char_indices().collect();
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];
        if c == '\\' {
            let mut j = i + 1;
            while j < chars.len() && chars[j].1.is_ascii_alphabetic() {
                j += 1;
            }
            if j == i + 1 {
                // control symbol such as `\$`
                i += 2;
                continue;
            }
            let name_stop = chars.get(j).map_or(slice.len(), |(p, _)| *p);
            let name = &slice[chars[i + 1].0..name_stop];
            i = j;
            if classify_command(name) == CommandClass::Text {
                if let Some((_, next, _)) = braced_argument(slice, &chars, i) {
                    i = next;
                }
            }
            continue;
        }
        if !c.is_ascii_alphanumeric() {
            i += 1;
            continue;
        }

        let word_index = i;
        let mut j = i;
        while j < chars.len() && chars[j].1.is_ascii_alphanumeric() {
            j += 1;
        }
        let word_stop = chars.get(j).map_or(slice.len(), |(p, _)| *p);
        let word = &slice[pos..word_stop];
        let (end, primes) = take_primes(&chars, j, slice.len());
        let next_index = j + primes.len();
        let before = i.checked_sub(1).map(|k| chars[k].1);
        let after = chars.get(next_index).map(|(_, ch)| *ch);
        let after_next = chars.get(next_index + 1).map(|(_, ch)| *ch);
        i = next_index;

        if word.starts_with(|ch: char| ch.is_ascii_digit()) {
            continue;
        }
        let is_application = after == Some('(');
        let is_symbol_word = is_bare_symbol(word)
            && !is_excluded_letter(word, sentence_start(&chars, word_index))
            && !matches!(before, Some('.') | Some('\''))
            && !before.is_some_and(|ch| ch.is_alphabetic())
            && !after.is_some_and(|ch| ch.is_alphabetic())
            && !(after == Some('.') && after_next.is_some_and(|ch| ch.is_alphabetic()))
            && !(before == Some('(') && after == Some(')') && word.len() == 1
                && word.chars().all(|ch| ch.is_ascii_lowercase()));
        if is_application || is_symbol_word {
            out.push(Token::new(
                format!("{}{}", word, primes),
                base + pos..base + end,
            ));
        }
    }
}

/// A single letter optionally followed by digits: `G`, `x`, `x1`.
fn is_bare_symbol(word: &str) -> bool {
    let mut chars = word.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic()) && chars.all(|c| c.is_ascii_digit())
}

fn is_excluded_letter(word: &str, at_sentence_start: bool) -> bool {
    matches!(word, "a" | "I") || (word == "A" && at_sentence_start)
}

fn sentence_start(chars: &[(usize, char)], index: usize) -> bool {
    chars[..index]
        .iter()
        .rev()
        .find(|(_, c)| !c.is_whitespace())
        .map_or(true, |(_, c)| matches!(c, '.' | '!' | '?' | ':'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn texts(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn test_math_regions() {
        let text = r"Let $x$ and \(y\) with $$z = 1$$ and \[w\].";
        let regions = math_regions(text);
        assert_eq!(regions.len(), 4);
        assert_eq!(&text[regions[0].inner.clone()], "x");
        assert_eq!(&text[regions[1].inner.clone()], "y");
        assert_eq!(&text[regions[2].inner.clone()], "z = 1");
        assert_eq!(&text[regions[3].inner.clone()], "w");
        assert!(regions.iter().all(|r| r.terminated));
    }

    #[test]
    fn test_math_environment_region() {
        let text = "We have \\begin{align*} a &= b \\end{align*} so done.";
        let regions = math_regions(text);
        assert_eq!(regions.len(), 1);
        assert_eq!(text[regions[0].inner.clone()].trim(), "a &= b");
        // non-math environments are not regions
        assert!(math_regions("\\begin{proof} x \\end{proof}").is_empty());
    }

    #[test]
    fn test_escaped_dollar_and_unterminated() {
        assert!(math_regions(r"costs \$5 today").is_empty());
        let regions = math_regions("Let $x be");
        assert_eq!(regions.len(), 1);
        assert!(!regions[0].terminated);
    }

    #[test]
    fn test_tokenize_math_operators_separate() {
        let tokens = tokenize(r"$f(x) = x^2 + 3.5 \cdot y'$");
        assert_eq!(texts(&tokens), vec!["f", "x", "x", "2", "3.5", "y'"]);
    }

    #[test]
    fn test_tokenize_commands() {
        let tokens = tokenize(r"$\alpha \in \mathbb{R}, \operatorname{Sym}(G), \frac{1}{n}, \text{for all } k$");
        assert_eq!(
            texts(&tokens),
            vec!["\\alpha", "\\mathbb{R}", "Sym", "G", "1", "n", "k"]
        );
    }

    #[test]
    fn test_tokenize_prose_symbols() {
        let tokens = tokenize("Then |G| divides |Sym(G)|.");
        assert_eq!(texts(&tokens), vec!["G", "Sym", "G"]);

        let tokens = tokenize("A group G is a set, i.e. I say so.");
        assert_eq!(texts(&tokens), vec!["G"]);
    }

    #[test]
    fn test_tokenize_skips_enumeration_and_numbers() {
        let tokens = tokenize("(i) By Theorem 3 and Case 2, x1 holds.");
        assert_eq!(texts(&tokens), vec!["x1"]);
    }

    #[test]
    fn test_token_spans_point_into_text() {
        let text = "Let $\\beta$ be given and take n.";
        for token in tokenize(text) {
            assert!(text[token.span.clone()].starts_with(token.text.trim_end_matches('\'')));
        }
    }

    #[test]
    fn test_prose_skips_label_arguments() {
        let tokens = tokenize("as shown in \\eqref{A} and \\label{b}.");
        assert!(tokens.is_empty());
    }

    #[test]
    fn test_annotate_segment() {
        let segment = Segment {
            index: 0,
            text: "Therefore $x > 0$, hence therefore done.".to_string(),
            span: 0..40,
            paragraph: 0,
            labels: vec![],
        };
        let step = annotate(&segment, &Vocabulary::standard());
        assert_eq!(step.id.to_string(), "S1");
        assert_eq!(texts(&step.tokens), vec!["x", "0"]);
        assert_eq!(step.keywords, vec!["therefore", "hence"]);
    }

    #[test]
    fn test_annotate_all_warns_on_unterminated_math() {
        let segment = Segment {
            index: 0,
            text: "Let $x be real.".to_string(),
            span: 0..15,
            paragraph: 0,
            labels: vec![],
        };
        let (steps, warnings) = annotate_all(&[segment], &Vocabulary::standard());
        assert_eq!(steps.len(), 1);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("S1:"));
    }
}
