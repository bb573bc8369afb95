//! Analyzer configuration.
//!
//! Configuration is resolved once when a `ProofAnalyzer` is built and is
//! read-only afterwards. Every field has a default, so a JSON file only needs
//! the keys it overrides:
//!
//! ```json
//! {
//!   "max_steps": 500,
//!   "extra_keywords": [{"phrase": "ergo", "kind": "connective"}],
//!   "extra_universal_symbols": ["\\mathbb{H}"]
//! }
//! ```

use crate::error::{Error, Result};
use crate::vocabulary::{KeywordEntry, KeywordKind, Vocabulary};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Settings for one analyzer instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Inputs longer than this fail segmentation.
    pub max_input_bytes: usize,
    /// Segments past this count are merged into the last step.
    pub max_steps: usize,
    /// Maximum characters of step/assumption text in graph node labels.
    pub label_width: usize,
    /// Keywords added to the built-in vocabulary.
    pub extra_keywords: Vec<KeywordEntry>,
    /// Symbols never reported as undefined, on top of the built-in set.
    pub extra_universal_symbols: Vec<String>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            max_input_bytes: 1024 * 1024,
            max_steps: 2000,
            label_width: 40,
            extra_keywords: Vec::new(),
            extra_universal_symbols: Vec::new(),
        }
    }
}

impl AnalyzerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Set the step limit.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Set the input size limit.
    pub fn with_max_input_bytes(mut self, max: usize) -> Self {
        self.max_input_bytes = max;
        self
    }

    /// Add a keyword.
    pub fn with_keyword(mut self, phrase: impl Into<String>, kind: KeywordKind) -> Self {
        self.extra_keywords.push(KeywordEntry::new(phrase, kind));
        self
    }

    /// Add a universal symbol.
    pub fn with_universal_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.extra_universal_symbols.push(symbol.into());
        self
    }

    /// Reject settings that would make every analysis degenerate.
    pub fn validate(&self) -> Result<()> {
        if self.max_steps == 0 {
            return Err(Error::Config("max_steps must be at least 1".to_string()));
        }
        if self.max_input_bytes == 0 {
            return Err(Error::Config(
                "max_input_bytes must be at least 1".to_string(),
            ));
        }
        if let Some(entry) = self
            .extra_keywords
            .iter()
            .find(|k| k.phrase.trim().is_empty())
        {
            return Err(Error::Config(format!(
                "empty keyword phrase (kind {:?})",
                entry.kind
            )));
        }
        Ok(())
    }

    /// Resolve the vocabulary: the shared standard one unless extended.
    pub fn vocabulary(&self) -> Arc<Vocabulary> {
        let standard = Vocabulary::standard();
        if self.extra_keywords.is_empty() && self.extra_universal_symbols.is_empty() {
            standard
        } else {
            Arc::new(standard.extended(&self.extra_keywords, &self.extra_universal_symbols))
        }
    }
}
