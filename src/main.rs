use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use imagepin::config::Layout;
use imagepin::error::is_declaration_error;
use imagepin::logging::init_logging;
use imagepin::pipeline::{self, Stage};
use imagepin::report::StageReport;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "imagepin",
    version,
    about = "Keep version records, tag pins and the digest map in sync with images.json"
)]
struct Cli {
    /// Root of the managed tree
    #[arg(long, env = "IMAGEPIN_ROOT", default_value = ".", global = true)]
    root: PathBuf,

    /// Declarative source, relative to the root unless absolute
    #[arg(long, env = "IMAGEPIN_IMAGES", global = true)]
    images: Option<PathBuf>,

    /// Digest map to write, relative to the root unless absolute
    #[arg(long, env = "IMAGEPIN_OUTPUT", global = true)]
    output: Option<PathBuf>,

    /// Read-only pin tree of an older layout; repeat in increasing precedence
    #[arg(
        long = "legacy-pins",
        env = "IMAGEPIN_LEGACY_PINS",
        value_delimiter = ',',
        global = true
    )]
    legacy_pins: Vec<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, env = "IMAGEPIN_JSON_LOGS", action = ArgAction::SetTrue, global = true)]
    json_logs: bool,

    /// Log planned changes without writing anything
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate version records from the declarations
    Generate,
    /// Harvest pins from resolved version records
    Harvest,
    /// Collect digests from pins into the digest map
    Collect,
    /// Run generate, harvest and collect in order
    Run,
    /// Validate declarations and show what every stage would change
    Check,
}

impl Cli {
    fn layout(&self) -> Layout {
        let mut layout = Layout::new(&self.root).with_legacy_pins(self.legacy_pins.clone());
        if let Some(images) = &self.images {
            layout = layout.with_images_file(images);
        }
        if let Some(output) = &self.output {
            layout = layout.with_output_file(output);
        }
        layout
    }
}

fn print_report(report: &StageReport) {
    let line = report.to_string();
    if report.changed() {
        println!("{} {}", "✏️ ".yellow(), line);
    } else {
        println!("{} {}", "✅".green(), line);
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json_logs).map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    let layout = cli.layout();
    tracing::debug!(?layout, "Resolved layout");

    let result = match cli.command {
        Commands::Generate => pipeline::run_stage(&layout, Stage::Generate, cli.dry_run).map(|r| vec![r]),
        Commands::Harvest => pipeline::run_stage(&layout, Stage::Harvest, cli.dry_run).map(|r| vec![r]),
        Commands::Collect => pipeline::run_stage(&layout, Stage::Collect, cli.dry_run).map(|r| vec![r]),
        Commands::Run => pipeline::run_all(&layout, cli.dry_run),
        Commands::Check => pipeline::check(&layout),
    };

    let reports = match result {
        Ok(reports) => reports,
        Err(err) => {
            let hint = if is_declaration_error(&err) {
                "fix the declarations file"
            } else {
                "check that the tree is writable"
            };
            tracing::error!(error = %err, "Structural failure, aborting run");
            return Err(err).with_context(|| format!("imagepin failed under {} ({})", layout.root.display(), hint));
        }
    };

    for report in &reports {
        print_report(report);
    }
    Ok(())
}
