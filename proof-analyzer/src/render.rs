//! Graph rasterization through Graphviz.
//!
//! The renderer is a collaborator outside the analysis pipeline: it consumes
//! the DOT text of a finished [`DependencyGraph`] and never feeds anything
//! back into an `AnalysisResult`.

use crate::error::{Error, Result};
use crate::graph::DotConfig;
use crate::types::DependencyGraph;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, warn};

/// Output format passed to `dot -T`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFormat {
    #[default]
    Png,
    Svg,
    Pdf,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Svg => "svg",
            Self::Pdf => "pdf",
        }
    }

    /// Guess the format from a file extension, defaulting to PNG.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("svg") => Self::Svg,
            Some("pdf") => Self::Pdf,
            _ => Self::Png,
        }
    }
}

/// Runs the Graphviz `dot` binary over exported graphs.
#[derive(Debug, Clone, Default)]
pub struct GraphRenderer {
    binary_path: Option<String>,
    format: ImageFormat,
    dot_config: DotConfig,
}

impl GraphRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use this binary instead of searching for `dot`. `~` is expanded.
    pub fn with_binary_path(mut self, path: impl Into<String>) -> Self {
        self.binary_path = Some(path.into());
        self
    }

    pub fn with_format(mut self, format: ImageFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_dot_config(mut self, config: DotConfig) -> Self {
        self.dot_config = config;
        self
    }

    /// Render into a fresh temporary image that outlives the renderer.
    pub fn render(&self, graph: &DependencyGraph) -> Result<PathBuf> {
        let image = tempfile::Builder::new()
            .prefix("proof-graph-")
            .suffix(&format!(".{}", self.format.extension()))
            .tempfile()?;
        let (_, path) = image.keep().map_err(|e| Error::Io(e.error))?;
        self.render_to(graph, &path)
    }

    /// Render into `output`, replacing any existing file.
    pub fn render_to(&self, graph: &DependencyGraph, output: &Path) -> Result<PathBuf> {
        let binary = self.find_binary()?;

        let mut source = tempfile::Builder::new()
            .prefix("proof-graph-")
            .suffix(".dot")
            .tempfile()?;
        source.write_all(graph.to_dot_with_config(&self.dot_config).as_bytes())?;
        source.flush()?;

        debug!(binary = %binary.display(), output = %output.display(), "running graph renderer");
        let result = Command::new(&binary)
            .arg(format!("-T{}", self.format.extension()))
            .arg(source.path())
            .arg("-o")
            .arg(output)
            .output()?;

        if !result.status.success() {
            return Err(Error::RenderFailed {
                status: result.status.to_string(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }
        Ok(output.to_path_buf())
    }

    /// Like [`render`](Self::render), but a failure is logged and yields `None`.
    pub fn render_or_none(&self, graph: &DependencyGraph) -> Option<PathBuf> {
        match self.render(graph) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(error = %e, "graph rendering skipped");
                None
            }
        }
    }

    /// Like [`render_to`](Self::render_to), but a failure is logged and yields `None`.
    pub fn render_to_or_none(&self, graph: &DependencyGraph, output: &Path) -> Option<PathBuf> {
        match self.render_to(graph, output) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(error = %e, output = %output.display(), "graph rendering skipped");
                None
            }
        }
    }

    /// Locate the `dot` binary.
    pub fn find_binary(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.binary_path {
            let expanded = PathBuf::from(shellexpand::tilde(path).as_ref());
            if expanded.exists() {
                return Ok(expanded);
            }
            return Err(Error::RendererUnavailable(format!(
                "configured renderer '{}' does not exist",
                expanded.display()
            )));
        }

        if let Ok(path) = which::which("dot") {
            return Ok(path);
        }

        let common_paths = ["/usr/local/bin/dot", "/opt/homebrew/bin/dot", "/usr/bin/dot"];
        for path in common_paths {
            let path = Path::new(path);
            if path.exists() {
                return Ok(path.to_path_buf());
            }
        }

        Err(Error::RendererUnavailable(
            "Graphviz 'dot' not found. Install Graphviz or pass a renderer path.".to_string(),
        ))
    }
}
