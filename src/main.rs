use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use mdl_export::{ExportConfig, ExportError, ExportRequest, MaterialExporter, PathMode};
use tracing_subscriber::EnvFilter;

/// Export a single MDL material to a new scene document.
#[derive(Debug, Parser)]
#[command(name = "mdl-export", version, about)]
struct Cli {
    /// Source layer file path.
    #[arg(long = "in", value_name = "FILE")]
    input: PathBuf,

    /// Material prim path in the source stage.
    #[arg(long = "mat", value_name = "PRIM")]
    material: String,

    /// MDL shader prim path (auto-detected from the material when omitted).
    #[arg(long, value_name = "PRIM")]
    shader: Option<String>,

    /// Output file path (.usda, .json or .yaml).
    #[arg(long = "out", value_name = "FILE")]
    output: PathBuf,

    /// How to write asset paths in the exported file.
    #[arg(long, value_enum)]
    assets_path_mode: Option<PathMode>,

    /// Name of the exported material prim.
    #[arg(long)]
    name: Option<String>,

    /// Configuration file (JSON or YAML); defaults to mdl_export.config.json beside the source.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print the per-property export report as JSON.
    #[arg(long)]
    report: bool,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("ERROR: {err:#}");
            let code = err
                .downcast_ref::<ExportError>()
                .map(ExportError::exit_code)
                .unwrap_or(1);
            ExitCode::from(code)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let mut config = load_config(cli)?;
    if let Some(name) = &cli.name {
        config.material_name = name.clone();
    }

    let request = ExportRequest {
        material_path: &cli.material,
        shader_path: cli.shader.as_deref(),
        path_mode: cli.assets_path_mode.unwrap_or(config.default_path_mode),
    };

    let report = MaterialExporter::new(&config).export_file(&cli.input, &cli.output, &request)?;

    if cli.report {
        let json = serde_json::to_string_pretty(&report).context("failed to serialise report")?;
        println!("{json}");
    }
    println!("Exported to: {}", cli.output.display());
    Ok(())
}

fn load_config(cli: &Cli) -> Result<ExportConfig> {
    match &cli.config {
        Some(path) => ExportConfig::from_path(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => {
            let dir = cli
                .input
                .parent()
                .map(PathBuf::from)
                .unwrap_or_default();
            Ok(ExportConfig::discover(&dir))
        }
    }
}
