use crate::constants::PLACEHOLDER_TAG;
use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Version-constraint strategy; each one owns a subtree of the version tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Strategy {
    Major,
    MajorMinor,
    MajorMinorPatch,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [
        Strategy::Major,
        Strategy::MajorMinor,
        Strategy::MajorMinorPatch,
    ];

    /// Directory name of this strategy's subtree
    pub fn dir_name(self) -> &'static str {
        match self {
            Strategy::Major => "major",
            Strategy::MajorMinor => "major-minor",
            Strategy::MajorMinorPatch => "major-minor-patch",
        }
    }

    pub fn from_dir_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.dir_name() == name)
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// One tracked image of the declarative source.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImageSpec {
    pub image: String,
    #[serde(default)]
    pub platforms: Vec<String>,
    #[serde(default)]
    pub initial_major: Vec<String>,
    #[serde(default)]
    pub initial_major_minor: Vec<String>,
    #[serde(default)]
    pub initial_major_minor_patch: Vec<String>,
}

impl ImageSpec {
    /// Directory name used for this image in every tree: the last path
    /// segment of the image name.
    pub fn key(&self) -> &str {
        image_key(&self.image)
    }

    pub fn seeds(&self, strategy: Strategy) -> &[String] {
        match strategy {
            Strategy::Major => &self.initial_major,
            Strategy::MajorMinor => &self.initial_major_minor,
            Strategy::MajorMinorPatch => &self.initial_major_minor_patch,
        }
    }

    /// Platforms to pin, or `[None]` for a platform-less image.
    pub fn platform_slots(&self) -> Vec<Option<&str>> {
        if self.platforms.is_empty() {
            vec![None]
        } else {
            self.platforms.iter().map(|p| Some(p.as_str())).collect()
        }
    }

    pub fn declares_platform(&self, platform: Option<&str>) -> bool {
        match platform {
            None => self.platforms.is_empty(),
            Some(p) => self.platforms.iter().any(|declared| declared == p),
        }
    }
}

pub fn image_key(image: &str) -> &str {
    image.rsplit('/').next().unwrap_or(image)
}

/// The validated declarative source, indexed by image key.
#[derive(Clone, Debug, Default)]
pub struct Declarations {
    images: Vec<ImageSpec>,
    by_key: BTreeMap<String, usize>,
}

impl Declarations {
    /// Validate and index a list of image specs.
    pub fn new(images: Vec<ImageSpec>) -> Result<Self> {
        let mut by_key = BTreeMap::new();

        for (idx, spec) in images.iter().enumerate() {
            validate_image_name(&spec.image)?;
            let key = spec.key();
            check_segment("image key", key)?;

            for platform in &spec.platforms {
                validate_platform(platform)?;
            }
            for strategy in Strategy::ALL {
                for seed in spec.seeds(strategy) {
                    check_segment("seed version", seed)?;
                }
            }

            if let Some(&prev) = by_key.get(key) {
                let first: &ImageSpec = &images[prev];
                return Err(PipelineError::DuplicateImageKey {
                    key: key.to_string(),
                    first: first.image.clone(),
                    second: spec.image.clone(),
                });
            }
            by_key.insert(key.to_string(), idx);
        }

        Ok(Self { images, by_key })
    }

    /// Load `images.json`. Missing or unparseable sources are structural errors.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PipelineError::DeclarationsMissing {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::storage("read declarations", path, e))?;
        let images: Vec<ImageSpec> =
            serde_json::from_str(&content).map_err(|e| PipelineError::DeclarationsInvalid {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let decls = Self::new(images).map_err(|e| match e {
            PipelineError::UnsafeSegment { what, segment } => PipelineError::DeclarationsInvalid {
                path: path.to_path_buf(),
                reason: format!("unsafe {} {:?}", what, segment),
            },
            other => other,
        })?;

        tracing::debug!(
            path = %path.display(),
            images = decls.len(),
            "Loaded declarations"
        );
        Ok(decls)
    }

    pub fn images(&self) -> &[ImageSpec] {
        &self.images
    }

    pub fn get(&self, key: &str) -> Option<&ImageSpec> {
        self.by_key.get(key).map(|&idx| &self.images[idx])
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

fn validate_image_name(image: &str) -> Result<()> {
    let last = image_key(image);
    if image.is_empty() || image.contains('@') || last.contains(':') || image.contains(char::is_whitespace) {
        return Err(PipelineError::UnsafeSegment {
            what: "image name",
            segment: image.to_string(),
        });
    }
    Ok(())
}

fn validate_platform(platform: &str) -> Result<()> {
    for segment in platform.split('/') {
        check_segment("platform", segment).map_err(|_| PipelineError::UnsafeSegment {
            what: "platform",
            segment: platform.to_string(),
        })?;
    }
    Ok(())
}

/// Reject values that cannot be a single directory name.
pub fn check_segment(what: &'static str, segment: &str) -> Result<()> {
    let unsafe_segment = segment.is_empty()
        || segment == "."
        || segment == ".."
        || segment.contains('/')
        || segment.contains('\\')
        || segment.contains(char::is_whitespace);
    if unsafe_segment {
        return Err(PipelineError::UnsafeSegment {
            what,
            segment: segment.to_string(),
        });
    }
    Ok(())
}

/// Whether a declared seed is the placeholder sentinel rather than a concrete tag
pub fn is_placeholder_seed(seed: &str) -> bool {
    seed == PLACEHOLDER_TAG
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(image: &str, platforms: &[&str], major_minor: &[&str]) -> ImageSpec {
        ImageSpec {
            image: image.to_string(),
            platforms: platforms.iter().map(|s| s.to_string()).collect(),
            initial_major: vec![],
            initial_major_minor: major_minor.iter().map(|s| s.to_string()).collect(),
            initial_major_minor_patch: vec![],
        }
    }

    #[test]
    fn test_parse_camel_case_with_defaults() {
        let json = r#"[{"image": "docker.io/library/nginx", "platforms": ["linux/amd64"], "initialMajorMinor": ["1.24"]}]"#;
        let images: Vec<ImageSpec> = serde_json::from_str(json).unwrap();
        let decls = Declarations::new(images).unwrap();
        let nginx = decls.get("nginx").unwrap();
        assert_eq!(nginx.seeds(Strategy::MajorMinor), ["1.24".to_string()]);
        assert!(nginx.seeds(Strategy::Major).is_empty());
        assert!(nginx.seeds(Strategy::MajorMinorPatch).is_empty());
    }

    #[test]
    fn test_image_key_is_last_segment() {
        assert_eq!(image_key("docker.io/library/nginx"), "nginx");
        assert_eq!(image_key("localhost:5000/team/app"), "app");
        assert_eq!(image_key("alpine"), "alpine");
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let err = Declarations::new(vec![
            spec("docker.io/library/nginx", &[], &["1.24"]),
            spec("ghcr.io/acme/nginx", &[], &["2.0"]),
        ])
        .unwrap_err();
        assert!(matches!(err, PipelineError::DuplicateImageKey { .. }));
    }

    #[test]
    fn test_unsafe_segments_rejected() {
        assert!(Declarations::new(vec![spec("docker.io/library/nginx", &[], &[".."])]).is_err());
        assert!(Declarations::new(vec![spec("docker.io/library/nginx", &["linux//amd64"], &[])]).is_err());
        assert!(Declarations::new(vec![spec("docker.io/library/nginx:1.24", &[], &[])]).is_err());
        assert!(Declarations::new(vec![spec("docker.io/library/nginx", &["linux/arm64/v8"], &["1.24"])]).is_ok());
    }

    #[test]
    fn test_platform_slots() {
        let none = spec("alpine", &[], &[]);
        assert_eq!(none.platform_slots(), vec![None]);
        assert!(none.declares_platform(None));
        assert!(!none.declares_platform(Some("linux/amd64")));

        let multi = spec("alpine", &["linux/amd64", "linux/arm64"], &[]);
        assert_eq!(
            multi.platform_slots(),
            vec![Some("linux/amd64"), Some("linux/arm64")]
        );
        assert!(!multi.declares_platform(None));
    }

    #[test]
    fn test_load_missing_and_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("images.json");
        assert!(matches!(
            Declarations::load(&path),
            Err(PipelineError::DeclarationsMissing { .. })
        ));

        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            Declarations::load(&path),
            Err(PipelineError::DeclarationsInvalid { .. })
        ));
    }

    #[test]
    fn test_strategy_dir_names() {
        for strategy in Strategy::ALL {
            assert_eq!(Strategy::from_dir_name(strategy.dir_name()), Some(strategy));
        }
        assert_eq!(Strategy::from_dir_name("minor"), None);
    }
}
