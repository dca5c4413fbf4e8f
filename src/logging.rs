use crate::constants::DEFAULT_LOG_FILTER;
use std::io;
/// Structured logging utilities for imagepin
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

/// Initialize structured logging with optional JSON output. Logs go to stderr
/// so stdout stays free for the run summary.
pub fn init_logging(json_output: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let registry = Registry::default().with(env_filter);

    if json_output {
        // JSON output for CI log aggregation
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(io::stderr)
                    .with_current_span(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()?;
    } else {
        registry
            .with(
                fmt::layer()
                    .with_writer(io::stderr)
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_span_events(FmtSpan::NONE),
            )
            .try_init()?;
    }

    Ok(())
}

#[macro_export]
macro_rules! log_leaf_skipped {
    ($tree:expr, $path:expr, $issue:expr) => {
        tracing::warn!(
            tree = $tree,
            path = %$path.display(),
            issue = %$issue,
            "Treating leaf record as absent"
        );
    };
}

#[macro_export]
macro_rules! log_leaf_created {
    ($tree:expr, $path:expr) => {
        tracing::info!(tree = $tree, path = %$path.display(), "Created leaf");
    };
}

#[macro_export]
macro_rules! log_leaf_removed {
    ($tree:expr, $path:expr) => {
        tracing::info!(tree = $tree, path = %$path.display(), "Removed leaf");
    };
}

#[macro_export]
macro_rules! log_stage_complete {
    ($report:expr) => {
        tracing::info!(
            stage = $report.stage,
            created = $report.created,
            removed = $report.removed,
            pruned_dirs = $report.pruned_dirs,
            pending = $report.pending,
            skipped = $report.skipped,
            collected = $report.collected,
            dry_run = $report.dry_run,
            "Stage completed"
        );
    };
}
