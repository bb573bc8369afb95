//! CLI-facing export helpers.
//!
//! A deterministic surface the binary calls to turn an [`AnalysisResult`]
//! into a text artifact and optionally write it to disk.

use crate::error::{Error, Result};
use crate::graph::DotConfig;
use crate::types::AnalysisResult;
use std::fs;
use std::path::{Path, PathBuf};

/// Supported artifact formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Json,
    Dot,
    Summary,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Dot => "dot",
            Self::Summary => "txt",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "dot" => Ok(Self::Dot),
            "summary" | "text" => Ok(Self::Summary),
            other => Err(Error::Config(format!("unknown export format '{}'", other))),
        }
    }
}

/// Options for one export.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub format: ExportFormat,
    pub output: Option<PathBuf>,
    /// Pretty-print JSON.
    pub pretty: bool,
    pub dot_config: DotConfig,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            format: ExportFormat::Json,
            output: None,
            pretty: true,
            dot_config: DotConfig::default(),
        }
    }
}

impl ExportOptions {
    pub fn with_format(mut self, format: ExportFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }
}

/// Result of an export.
#[derive(Debug, Clone)]
pub struct ExportResult {
    pub format: ExportFormat,
    pub artifact: String,
    pub output_path: Option<PathBuf>,
}

/// Produce the artifact and write it when an output path is set.
pub fn export(result: &AnalysisResult, options: &ExportOptions) -> Result<ExportResult> {
    let artifact = match options.format {
        ExportFormat::Json if options.pretty => result.to_json_pretty()?,
        ExportFormat::Json => result.to_json()?,
        ExportFormat::Dot => result.graph.to_dot_with_config(&options.dot_config),
        ExportFormat::Summary => format!("{}\n", result.summary()),
    };

    let output_path = match &options.output {
        Some(path) => {
            write_artifact(path, &artifact)?;
            Some(path.clone())
        }
        None => None,
    };

    Ok(ExportResult {
        format: options.format,
        artifact,
        output_path,
    })
}

/// Write `artifact` to `path`, creating parent directories.
pub fn write_artifact(path: &Path, artifact: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|error| {
            Error::Config(format!(
                "failed to create output directory '{}': {}",
                parent.display(),
                error
            ))
        })?;
    }
    fs::write(path, artifact).map_err(|error| {
        Error::Config(format!(
            "failed to write analysis artifact to '{}': {}",
            path.display(),
            error
        ))
    })
}

/// Default artifact path for an input file: `<dir>/<stem>.analysis.<ext>`.
pub fn suggested_output_path(input: &Path, out_dir: &Path, format: ExportFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "proof".to_string());
    out_dir.join(format!("{}.analysis.{}", stem, format.extension()))
}
