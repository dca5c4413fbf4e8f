use crate::collector;
use crate::config::Layout;
use crate::declarations::Declarations;
use crate::error::Result;
use crate::generator;
use crate::harvester;
use crate::report::StageReport;

/// Which stage(s) to run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Generate,
    Harvest,
    Collect,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Generate, Stage::Harvest, Stage::Collect];
}

/// Load the declarations and run one stage.
pub fn run_stage(layout: &Layout, stage: Stage, dry_run: bool) -> Result<StageReport> {
    let decls = Declarations::load(&layout.images_file)?;
    run_with(layout, &decls, stage, dry_run)
}

pub fn run_with(
    layout: &Layout,
    decls: &Declarations,
    stage: Stage,
    dry_run: bool,
) -> Result<StageReport> {
    let _span = tracing::info_span!("stage", ?stage, dry_run).entered();
    match stage {
        Stage::Generate => generator::generate(layout, decls, dry_run),
        Stage::Harvest => harvester::harvest(layout, decls, dry_run),
        Stage::Collect => collector::collect(layout, decls, dry_run),
    }
}

/// Generator, harvester and collector in order, on one load of the
/// declarations. Stops at the first structural failure.
pub fn run_all(layout: &Layout, dry_run: bool) -> Result<Vec<StageReport>> {
    let decls = Declarations::load(&layout.images_file)?;
    Stage::ALL
        .into_iter()
        .map(|stage| run_with(layout, &decls, stage, dry_run))
        .collect()
}

/// Validate the declarations and report what every stage would change.
pub fn check(layout: &Layout) -> Result<Vec<StageReport>> {
    run_all(layout, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use tempfile::TempDir;

    #[test]
    fn test_missing_declarations_is_structural() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::new(dir.path());
        let err = run_all(&layout, false).unwrap_err();
        assert!(matches!(err, PipelineError::DeclarationsMissing { .. }));
        assert!(!layout.output_file.exists());
    }

    #[test]
    fn test_check_never_mutates() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::new(dir.path());
        std::fs::write(
            &layout.images_file,
            r#"[{"image": "docker.io/library/nginx", "platforms": ["linux/amd64"], "initialMajorMinor": ["1.24"]}]"#,
        )
        .unwrap();

        let reports = check(&layout).unwrap();
        assert_eq!(reports.len(), 3);
        assert_eq!(reports[0].created, 1);
        assert!(reports.iter().all(|r| r.dry_run));
        assert!(!layout.versions_dir.exists());
        assert!(!layout.output_file.exists());
    }
}
