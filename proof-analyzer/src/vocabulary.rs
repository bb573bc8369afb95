//! Read-only lookup tables shared by every analysis.
//!
//! The keyword vocabulary, the universal-symbol allowlist and the LaTeX
//! command classes are built once and never mutated. `Vocabulary::standard()`
//! hands out the process-wide instance; `Vocabulary::extended` derives a new,
//! equally immutable instance when a configuration adds entries.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock};

/// Role a keyword plays in the argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordKind {
    /// Logical connective linking a step to what came before.
    Connective,
    /// Appeal to an external or earlier result.
    Citation,
    /// Introduces a hypothesis or object.
    Hypothesis,
    /// Ends the proof or a sub-argument.
    Closing,
}

/// One vocabulary phrase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordEntry {
    pub phrase: String,
    pub kind: KeywordKind,
}

impl KeywordEntry {
    pub fn new(phrase: impl Into<String>, kind: KeywordKind) -> Self {
        Self {
            phrase: phrase.into(),
            kind,
        }
    }
}

const CONNECTIVES: &[&str] = &[
    "therefore", "hence", "thus", "so", "then", "since", "because", "as", "consequently",
    "it follows", "it follows that", "implies", "which implies", "we have", "we get",
    "we obtain", "we see", "we conclude", "we deduce", "gives", "yields", "shows",
    "in particular", "moreover", "furthermore", "similarly", "likewise", "conversely",
    "now", "finally", "next", "whence", "thereby", "so that", "but", "however",
    "otherwise", "indeed", "note that", "observe that", "by", "by definition",
    "by assumption", "by hypothesis", "by induction", "by contradiction",
    "by construction", "this means", "that is", "in this case", "using", "applying",
    "substituting", "combining", "from", "due to",
];

const CITATIONS: &[&str] = &[
    "by theorem", "by lemma", "by proposition", "by corollary", "recall", "recall that",
    "it is known that", "it is well known that", "well known", "see", "cf", "\\cite",
];

const HYPOTHESES: &[&str] = &[
    "let", "suppose", "assume", "fix", "define", "consider", "given", "for contradiction",
    "without loss of generality", "wlog",
];

const CLOSINGS: &[&str] = &[
    "qed", "q.e.d", "this completes the proof", "as required", "as desired", "which proves",
    "this proves", "we are done",
];

const UNIVERSAL_SYMBOLS: &[&str] = &[
    // number sets
    "\\mathbb{N}", "\\mathbb{Z}", "\\mathbb{Q}", "\\mathbb{R}", "\\mathbb{C}", "\\mathbb{F}",
    "ℕ", "ℤ", "ℚ", "ℝ", "ℂ",
    // constants
    "\\infty", "\\pi", "\\emptyset", "\\varnothing", "\\aleph", "∞", "π", "∅",
    // named functions and operators
    "\\sin", "\\cos", "\\tan", "\\log", "\\ln", "\\exp", "\\lim", "\\limsup", "\\liminf",
    "\\sup", "\\inf", "\\max", "\\min", "\\det", "\\dim", "\\ker", "\\deg", "\\gcd", "\\arg",
    "\\Pr", "\\mod", "\\bmod", "\\pmod", "\\hom",
    "sin", "cos", "tan", "log", "ln", "exp", "lim", "sup", "inf", "max", "min", "det", "dim",
    "ker", "deg", "gcd", "lcm", "mod", "id", "Id", "im", "Im", "Re", "tr", "rank", "span",
    "Sym", "Aut", "Hom", "End", "Gal", "GL", "SL", "Var",
];

static STANDARD: LazyLock<Arc<Vocabulary>> = LazyLock::new(|| {
    let mut keywords = Vec::new();
    for (phrases, kind) in [
        (CONNECTIVES, KeywordKind::Connective),
        (CITATIONS, KeywordKind::Citation),
        (HYPOTHESES, KeywordKind::Hypothesis),
        (CLOSINGS, KeywordKind::Closing),
    ] {
        keywords.extend(phrases.iter().map(|p| KeywordEntry::new(*p, kind)));
    }
    let symbols = UNIVERSAL_SYMBOLS.iter().map(|s| s.to_string()).collect();
    Arc::new(Vocabulary::new(keywords, symbols))
});

/// Keyword vocabulary plus universal-symbol allowlist.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    keywords: Vec<KeywordEntry>,
    kinds: HashMap<String, KeywordKind>,
    keyword_pattern: Option<Regex>,
    universal_symbols: HashSet<String>,
}

impl Vocabulary {
    /// Build a vocabulary from explicit tables.
    pub fn new(keywords: Vec<KeywordEntry>, universal_symbols: HashSet<String>) -> Self {
        let mut kinds = HashMap::new();
        let mut entries = Vec::new();
        for entry in keywords {
            let phrase = normalize_phrase(&entry.phrase);
            if phrase.is_empty() || kinds.contains_key(&phrase) {
                continue;
            }
            kinds.insert(phrase.clone(), entry.kind);
            entries.push(KeywordEntry::new(phrase, entry.kind));
        }
        let keyword_pattern = build_keyword_pattern(&entries);
        Self {
            keywords: entries,
            kinds,
            keyword_pattern,
            universal_symbols,
        }
    }

    /// The built-in vocabulary, shared process-wide.
    pub fn standard() -> Arc<Vocabulary> {
        Arc::clone(&STANDARD)
    }

    /// A copy of this vocabulary with extra keywords and symbols.
    pub fn extended(&self, keywords: &[KeywordEntry], symbols: &[String]) -> Self {
        let mut all = self.keywords.clone();
        all.extend(keywords.iter().cloned());
        let mut universal = self.universal_symbols.clone();
        universal.extend(symbols.iter().cloned());
        Self::new(all, universal)
    }

    pub fn keywords(&self) -> &[KeywordEntry] {
        &self.keywords
    }

    /// Kind of a canonical (lower-case) keyword.
    pub fn keyword_kind(&self, phrase: &str) -> Option<KeywordKind> {
        self.kinds.get(&normalize_phrase(phrase)).copied()
    }

    /// Vocabulary keywords present in `text`, canonical lower case,
    /// deduplicated in first-seen order.
    pub fn match_keywords(&self, text: &str) -> Vec<String> {
        let Some(pattern) = &self.keyword_pattern else {
            return Vec::new();
        };
        let mut found: Vec<String> = Vec::new();
        for m in pattern.find_iter(text) {
            let phrase = normalize_phrase(m.as_str());
            if self.kinds.contains_key(&phrase) && !found.contains(&phrase) {
                found.push(phrase);
            }
        }
        found
    }

    /// Whether a token belongs to the built-in symbol allowlist.
    pub fn is_universal(&self, symbol: &str) -> bool {
        self.universal_symbols.contains(symbol)
    }
}

fn normalize_phrase(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn build_keyword_pattern(entries: &[KeywordEntry]) -> Option<Regex> {
    let mut phrases: Vec<&str> = entries.iter().map(|e| e.phrase.as_str()).collect();
    if phrases.is_empty() {
        return None;
    }
    // Longest first so "by theorem" wins over "by".
    phrases.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
    let alternatives: Vec<String> = phrases
        .iter()
        .map(|phrase| {
            let mut alt = regex::escape(phrase).replace(' ', r"\s+");
            if phrase.chars().next().is_some_and(is_word_char) {
                alt.insert_str(0, r"\b");
            }
            if phrase.chars().last().is_some_and(is_word_char) {
                alt.push_str(r"\b");
            }
            alt
        })
        .collect();
    Regex::new(&format!("(?i)(?:{})", alternatives.join("|"))).ok()
}

/// How the annotator treats a LaTeX control word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandClass {
    /// A symbol in its own right (`\alpha`, `\phi`, `\sin`).
    Symbol,
    /// Separates symbols (`\in`, `\leq`, `\cdot`).
    Operator,
    /// Layout or markup with no symbol value (`\frac`, `\left`).
    Structural,
    /// Font command fused with its argument (`\mathbb{R}`).
    Font,
    /// Upright name whose argument is the symbol (`\operatorname{Sym}`).
    Name,
    /// Prose inside math; argument is skipped (`\text{...}`).
    Text,
}

/// Classify a control word given without its backslash.
pub fn classify_command(name: &str) -> CommandClass {
    match name {
        "mathbb" | "mathcal" | "mathfrak" | "mathbf" | "mathscr" | "mathsf" | "bm"
        | "boldsymbol" => CommandClass::Font,
        "operatorname" | "mathrm" | "mathit" => CommandClass::Name,
        "text" | "textrm" | "textbf" | "textit" | "mbox" | "emph" | "intertext" | "label"
        | "tag" | "ref" | "eqref" | "cite" | "begin" | "end" => CommandClass::Text,
        "frac" | "dfrac" | "tfrac" | "sqrt" | "left" | "right" | "big" | "Big" | "bigg"
        | "Bigg" | "bigl" | "bigr" | "Bigl" | "Bigr" | "quad" | "qquad" | "ldots" | "cdots"
        | "dots" | "vdots" | "ddots" | "displaystyle" | "textstyle" | "limits" | "nolimits"
        | "hat" | "bar" | "tilde" | "vec" | "overline" | "underline" | "widehat"
        | "widetilde" | "dot" | "ddot" | "nonumber" | "notag" | "not" | "qed" | "square"
        | "blacksquare" | "Box" | "prime" => CommandClass::Structural,
        "in" | "notin" | "ni" | "leq" | "le" | "geq" | "ge" | "neq" | "ne" | "lt" | "gt"
        | "equiv" | "approx" | "sim" | "simeq" | "cong" | "cdot" | "times" | "div" | "pm"
        | "mp" | "circ" | "ast" | "star" | "to" | "mapsto" | "rightarrow" | "leftarrow"
        | "Rightarrow" | "Leftarrow" | "leftrightarrow" | "Leftrightarrow" | "implies"
        | "iff" | "impliedby" | "subset" | "subseteq" | "subsetneq" | "supset"
        | "supseteq" | "cup" | "cap" | "bigcup" | "bigcap" | "setminus" | "wedge" | "vee"
        | "land" | "lor" | "neg" | "lnot" | "forall" | "exists" | "nexists" | "mid"
        | "nmid" | "parallel" | "perp" | "oplus" | "otimes" | "bigoplus" | "bigotimes"
        | "sum" | "prod" | "int" | "iint" | "oint" | "partial" | "nabla" | "langle"
        | "rangle" | "lfloor" | "rfloor" | "lceil" | "rceil" | "vert" | "Vert" | "lvert"
        | "rvert" | "lVert" | "rVert" | "colon" | "coloneqq" | "triangleleft"
        | "trianglelefteq" | "triangleq" | "ll" | "gg" | "propto" | "models" | "vdash"
        | "leqslant" | "geqslant" | "lesssim" | "gtrsim" => CommandClass::Operator,
        _ => CommandClass::Symbol,
    }
}
