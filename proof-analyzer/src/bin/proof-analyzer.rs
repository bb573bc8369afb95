//! Command-line front end for proof-analyzer.

use clap::{Args, Parser, Subcommand, ValueEnum};
use proof_analyzer::{
    export, suggested_output_path, validate_input, write_artifact, AnalyzerConfig,
    DependencyGraph, Error, ExportFormat, ExportOptions, GraphRenderer, ImageFormat,
    ProofAnalyzer, Result,
};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "proof-analyzer", about = "Structural analysis of LaTeX proofs", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze one proof and print or write the result.
    Analyze(AnalyzeArgs),
    /// Analyze every file matching a glob pattern.
    Batch(BatchArgs),
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Proof file, or `-` for standard input.
    input: String,
    /// Artifact to produce.
    #[arg(long, value_enum, default_value_t = Format::Json)]
    format: Format,
    /// Write the artifact here instead of standard output.
    #[arg(long)]
    output: Option<PathBuf>,
    /// Also rasterize the dependency graph with Graphviz into this file.
    #[arg(long, value_name = "IMAGE")]
    render: Option<PathBuf>,
    /// JSON analyzer configuration.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct BatchArgs {
    /// Glob pattern selecting proof files, e.g. `proofs/*.tex`.
    pattern: String,
    /// Directory receiving `<stem>.analysis.json` files.
    #[arg(long)]
    out_dir: PathBuf,
    /// JSON analyzer configuration.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Format {
    Json,
    Dot,
    Summary,
}

impl From<Format> for ExportFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Json => ExportFormat::Json,
            Format::Dot => ExportFormat::Dot,
            Format::Summary => ExportFormat::Summary,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Command::Analyze(args) => run_analyze(args),
        Command::Batch(args) => run_batch(args),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_analyzer(config: Option<&Path>) -> Result<ProofAnalyzer> {
    let config = match config {
        Some(path) => AnalyzerConfig::from_file(path)?,
        None => AnalyzerConfig::default(),
    };
    ProofAnalyzer::new(config)
}

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        Ok(text)
    } else {
        Ok(std::fs::read_to_string(input)?)
    }
}

fn run_analyze(args: AnalyzeArgs) -> Result<()> {
    let analyzer = load_analyzer(args.config.as_deref())?;
    let text = read_input(&args.input)?;
    let text = validate_input(&text)?;

    let result = analyzer.analyze(text);
    let mut options = ExportOptions::default().with_format(args.format.into());
    options.output = args.output;
    let exported = export(&result, &options)?;
    match exported.output_path {
        Some(path) => info!(path = %path.display(), "artifact written"),
        None => println!("{}", exported.artifact.trim_end()),
    }

    if let Some(image) = args.render {
        let renderer = GraphRenderer::new().with_format(ImageFormat::from_path(&image));
        eprintln!("{}", diagram_note(&renderer, &result.graph, &image));
    }
    Ok(())
}

/// Render the graph if Graphviz cooperates. A missing or failing renderer
/// never fails the analysis.
fn diagram_note(renderer: &GraphRenderer, graph: &DependencyGraph, image: &Path) -> String {
    match renderer.render_to_or_none(graph, image) {
        Some(path) => format!("graph rendered to {}", path.display()),
        None => "no diagram available".to_string(),
    }
}

fn run_batch(args: BatchArgs) -> Result<()> {
    let analyzer = load_analyzer(args.config.as_deref())?;
    let paths = glob::glob(&args.pattern)
        .map_err(|e| Error::Config(format!("invalid glob pattern '{}': {}", args.pattern, e)))?;

    let mut analyzed = 0usize;
    for entry in paths {
        let path = match entry {
            Ok(path) if path.is_file() => path,
            Ok(_) => continue,
            Err(e) => {
                warn!(error = %e, "unreadable glob entry");
                continue;
            }
        };
        let text = std::fs::read_to_string(&path)?;
        if validate_input(&text).is_err() {
            warn!(path = %path.display(), "skipping empty proof");
            continue;
        }

        let result = analyzer.analyze(&text);
        let output = suggested_output_path(&path, &args.out_dir, ExportFormat::Json);
        write_artifact(&output, &result.to_json_pretty()?)?;
        info!(input = %path.display(), output = %output.display(), flags = result.flags.len(), "analyzed");
        analyzed += 1;
    }

    eprintln!("analyzed {} proof(s) into {}", analyzed, args.out_dir.display());
    Ok(())
}
