use imagepin::collector;
use imagepin::config::Layout;
use imagepin::constants::LEAF_FILE_NAME;
use imagepin::pipeline::{self, Stage};
use imagepin::tree::merge::RefTree;
use imagepin::tree::walker::walk_leaves;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

const NGINX: &str = "docker.io/library/nginx";

fn digest(c: char) -> String {
    std::iter::repeat(c).take(64).collect()
}

fn nginx_decl() -> &'static str {
    r#"[{"image": "docker.io/library/nginx", "platforms": ["linux/amd64"], "initialMajorMinor": ["1.24"]}]"#
}

fn setup(images_json: &str) -> (TempDir, Layout) {
    let dir = tempdir().expect("Failed to create temp dir");
    let layout = Layout::new(dir.path());
    fs::write(&layout.images_file, images_json).expect("Failed to write images.json");
    (dir, layout)
}

fn leaf(dir: &Path, rel: &str) -> PathBuf {
    dir.join(rel).join(LEAF_FILE_NAME)
}

fn read_map(layout: &Layout) -> RefTree {
    let content = fs::read_to_string(&layout.output_file).expect("digest map missing");
    serde_json::from_str(&content).expect("digest map is not valid JSON")
}

/// Every file and directory under `root`, with file contents, for byte-level comparison
fn snapshot(root: &Path) -> Vec<(PathBuf, Option<String>)> {
    let mut entries: Vec<(PathBuf, Option<String>)> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| {
            let content = e
                .file_type()
                .is_file()
                .then(|| fs::read_to_string(e.path()).unwrap_or_default());
            (e.path().to_path_buf(), content)
        })
        .collect();
    entries.sort();
    entries
}

fn empty_dirs(root: &Path) -> Vec<PathBuf> {
    walkdir::WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .filter(|e| fs::read_dir(e.path()).map(|mut d| d.next().is_none()).unwrap_or(false))
        .map(|e| e.path().to_path_buf())
        .collect()
}

#[test]
fn test_end_to_end_nginx_scenario() {
    let (_dir, layout) = setup(nginx_decl());

    // 1. Generate
    pipeline::run_stage(&layout, Stage::Generate, false).expect("generate failed");
    let version = leaf(&layout.versions_dir, "major-minor/nginx/1.24");
    assert_eq!(
        fs::read_to_string(&version).unwrap(),
        "FROM docker.io/library/nginx:1.24\n"
    );
    assert_eq!(walk_leaves(&layout.versions_dir).len(), 1);

    // 2. Agent resolves nothing new: the seed is already concrete. Harvest.
    pipeline::run_stage(&layout, Stage::Harvest, false).expect("harvest failed");
    let pin = leaf(&layout.pins_dir, "nginx/1.24/linux/amd64");
    assert_eq!(
        fs::read_to_string(&pin).unwrap(),
        "FROM docker.io/library/nginx:1.24\n"
    );
    assert_eq!(walk_leaves(&layout.pins_dir).len(), 1);

    // 3. Agent appends a digest. Collect.
    let reference = format!("{}:1.24@sha256:{}", NGINX, digest('f'));
    fs::write(&pin, format!("FROM {}\n", reference)).unwrap();
    pipeline::run_stage(&layout, Stage::Collect, false).expect("collect failed");

    let map = read_map(&layout);
    assert_eq!(
        map.leaf(&["nginx", "1.24", "linux/amd64"]),
        Some(reference.as_str())
    );
    assert_eq!(map.leaf_count(), 1);

    // 4. Remove the declaration and re-run everything
    fs::write(&layout.images_file, "[]").unwrap();
    pipeline::run_all(&layout, false).expect("pipeline failed");

    let map = read_map(&layout);
    assert!(map.get(&["nginx"]).is_none());
    assert!(!layout.versions_dir.join("major-minor/nginx").exists());
    assert!(!layout.pins_dir.join("nginx").exists());
    assert!(empty_dirs(&layout.versions_dir).is_empty());
    assert!(empty_dirs(&layout.pins_dir).is_empty());
}

#[test]
fn test_full_pipeline_is_idempotent() {
    let (dir, layout) = setup(
        r#"[
            {"image": "docker.io/library/nginx", "platforms": ["linux/amd64", "linux/arm64"], "initialMajor": ["1"], "initialMajorMinor": ["1.24"]},
            {"image": "docker.io/library/redis", "platforms": [], "initialMajorMinorPatch": ["7.2.4"]}
        ]"#,
    );

    pipeline::run_all(&layout, false).expect("first run failed");
    // simulate the agent digesting one pin
    let pin = leaf(&layout.pins_dir, "redis/7.2.4");
    fs::write(
        &pin,
        format!("FROM docker.io/library/redis:7.2.4@sha256:{}\n", digest('0')),
    )
    .unwrap();

    pipeline::run_all(&layout, false).expect("second run failed");
    let before = snapshot(dir.path());

    let reports = pipeline::run_all(&layout, false).expect("third run failed");
    let after = snapshot(dir.path());

    assert_eq!(before, after, "re-run without agent activity must not change the tree");
    assert!(reports.iter().all(|r| !r.changed()));
}

#[test]
fn test_partial_resolution_tolerance() {
    let (_dir, layout) = setup(
        r#"[{"image": "docker.io/library/postgres", "platforms": ["linux/amd64"], "initialMajor": ["latest"], "initialMajorMinor": ["16.2"]}]"#,
    );
    pipeline::run_stage(&layout, Stage::Generate, false).unwrap();
    let report = pipeline::run_stage(&layout, Stage::Harvest, false).unwrap();

    // only the concrete seed is pinned; the placeholder waits for the agent
    assert_eq!(report.pending, 1);
    assert_eq!(walk_leaves(&layout.pins_dir).len(), 1);
    assert!(leaf(&layout.pins_dir, "postgres/16.2/linux/amd64").exists());

    fs::write(
        leaf(&layout.versions_dir, "major/postgres/latest"),
        "FROM docker.io/library/postgres:16\n",
    )
    .unwrap();
    let report = pipeline::run_stage(&layout, Stage::Harvest, false).unwrap();
    assert_eq!(report.created, 1);
    assert_eq!(report.pending, 0);
    assert!(leaf(&layout.pins_dir, "postgres/16/linux/amd64").exists());
    assert_eq!(walk_leaves(&layout.pins_dir).len(), 2);
}

#[test]
fn test_collection_gating() {
    let (_dir, layout) = setup(nginx_decl());
    pipeline::run_stage(&layout, Stage::Generate, false).unwrap();
    pipeline::run_stage(&layout, Stage::Harvest, false).unwrap();

    let report = pipeline::run_stage(&layout, Stage::Collect, false).unwrap();
    assert_eq!(report.collected, 0);
    assert_eq!(report.pending, 1);
    assert!(read_map(&layout).is_empty());

    let reference = format!("{}:1.24@sha256:{}", NGINX, digest('9'));
    fs::write(
        leaf(&layout.pins_dir, "nginx/1.24/linux/amd64"),
        format!("FROM {}\n", reference),
    )
    .unwrap();
    let report = pipeline::run_stage(&layout, Stage::Collect, false).unwrap();
    assert_eq!(report.collected, 1);

    let map = read_map(&layout);
    let leaves = map.leaves();
    assert_eq!(leaves.len(), 1);
    assert_eq!(leaves[0].1, reference);
}

#[test]
fn test_removing_a_platform_cascades() {
    let (_dir, layout) = setup(
        r#"[{"image": "docker.io/library/nginx", "platforms": ["linux/amd64", "linux/arm64"], "initialMajorMinor": ["1.24"]}]"#,
    );
    pipeline::run_all(&layout, false).unwrap();
    for platform in ["linux/amd64", "linux/arm64"] {
        fs::write(
            leaf(&layout.pins_dir, &format!("nginx/1.24/{}", platform)),
            format!("FROM {}:1.24@sha256:{}\n", NGINX, digest('a')),
        )
        .unwrap();
    }
    pipeline::run_all(&layout, false).unwrap();
    assert_eq!(read_map(&layout).leaf_count(), 2);

    fs::write(&layout.images_file, nginx_decl()).unwrap();
    pipeline::run_all(&layout, false).unwrap();

    let map = read_map(&layout);
    assert_eq!(map.leaf_count(), 1);
    assert!(map.get(&["nginx", "1.24", "linux/arm64"]).is_none());
    assert!(!layout.pins_dir.join("nginx/1.24/linux/arm64").exists());
    assert!(empty_dirs(&layout.pins_dir).is_empty());
}

#[test]
fn test_malformed_leaf_never_fails_the_run() {
    let (_dir, layout) = setup(nginx_decl());
    pipeline::run_all(&layout, false).unwrap();

    fs::write(leaf(&layout.pins_dir, "nginx/1.24/linux/amd64"), "FROM \n garbage").unwrap();
    let reports = pipeline::run_all(&layout, false).expect("leaf problems are not fatal");
    let collect = &reports[2];
    assert_eq!(collect.skipped, 1);
    assert_eq!(collect.collected, 0);
}

#[test]
fn test_legacy_layout_merge_precedence() {
    let (dir, layout) = setup(nginx_decl());
    let layout = layout.with_legacy_pins(vec![PathBuf::from("legacy-pins")]);
    let legacy_root = dir.path().join("legacy-pins");

    let legacy_124 = format!("{}:1.24@sha256:{}", NGINX, digest('1'));
    let legacy_122 = format!("{}:1.22@sha256:{}", NGINX, digest('2'));
    for (rel, reference) in [("nginx/1.24/linux/amd64", &legacy_124), ("nginx/1.22/linux/amd64", &legacy_122)] {
        let path = leaf(&legacy_root, rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, format!("FROM {}\n", reference)).unwrap();
    }

    pipeline::run_all(&layout, false).unwrap();
    let current_124 = format!("{}:1.24@sha256:{}", NGINX, digest('3'));
    fs::write(
        leaf(&layout.pins_dir, "nginx/1.24/linux/amd64"),
        format!("FROM {}\n", current_124),
    )
    .unwrap();
    pipeline::run_stage(&layout, Stage::Collect, false).unwrap();

    let map = read_map(&layout);
    assert_eq!(map.leaf(&["nginx", "1.24", "linux/amd64"]), Some(current_124.as_str()));
    assert_eq!(map.leaf(&["nginx", "1.22", "linux/amd64"]), Some(legacy_122.as_str()));

    // legacy trees are read, never rewritten
    assert!(leaf(&legacy_root, "nginx/1.22/linux/amd64").exists());
    let collection = collector::collect_map(&layout, &imagepin::declarations::Declarations::default());
    assert!(collection.map.is_empty());
}

#[test]
fn test_invalid_declarations_abort_before_touching_tree() {
    let (_dir, layout) = setup("{ this is not json");
    let err = pipeline::run_all(&layout, false).unwrap_err();
    assert!(imagepin::error::is_declaration_error(&err));
    assert!(!layout.versions_dir.exists());
    assert!(!layout.pins_dir.exists());
    assert!(!layout.output_file.exists());
}
