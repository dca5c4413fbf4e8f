use crate::constants::{DIGEST_HEX_LEN, DIGEST_PREFIX, PLACEHOLDER_TAG};
use regex::Regex;
use std::sync::OnceLock;

/// A parsed `FROM` directive of a leaf record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FromDirective {
    /// Value of an optional `--platform=` flag
    pub platform: Option<String>,
    /// Image name without tag or digest
    pub image: String,
    pub tag: Option<String>,
    /// Hex part of an `@sha256:` suffix
    pub digest: Option<String>,
    /// The reference token exactly as written in the leaf
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveError {
    Empty,
    MultipleDirectives(usize),
    Unrecognized(String),
}

impl std::fmt::Display for DirectiveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "no FROM directive"),
            Self::MultipleDirectives(n) => write!(f, "expected one directive, found {}", n),
            Self::Unrecognized(line) => write!(f, "unrecognized directive: {}", line),
        }
    }
}

impl std::error::Error for DirectiveError {}

fn from_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // digest hex is matched case-insensitively and kept as written
        let pattern = format!(
            r"^(?i:FROM)\s+(?:(?i:--platform)=(?P<platform>\S+)\s+)?(?P<reference>(?P<image>[^\s@]+?)(?::(?P<tag>[^\s@/:]+))?(?:{}(?P<digest>(?i:[a-f0-9]){{{}}}))?)(?:\s+(?i:AS)\s+\S+)?\s*$",
            regex::escape(DIGEST_PREFIX),
            DIGEST_HEX_LEN
        );
        Regex::new(&pattern).expect("FROM pattern is valid")
    })
}

impl FromDirective {
    /// True once the update agent has attached a content digest.
    pub fn is_digested(&self) -> bool {
        self.digest.is_some()
    }

    /// True while the tag is missing or still the placeholder sentinel.
    pub fn is_placeholder(&self) -> bool {
        match self.tag.as_deref() {
            None => true,
            Some(tag) => tag == PLACEHOLDER_TAG,
        }
    }
}

/// Parse a single directive line.
pub fn parse_from_line(line: &str) -> Result<FromDirective, DirectiveError> {
    let line = line.trim();
    let caps = from_pattern()
        .captures(line)
        .ok_or_else(|| DirectiveError::Unrecognized(line.to_string()))?;

    let get = |name: &str| caps.name(name).map(|m| m.as_str().to_string());

    Ok(FromDirective {
        platform: get("platform"),
        image: get("image").unwrap_or_default(),
        tag: get("tag"),
        digest: get("digest"),
        reference: get("reference").unwrap_or_default(),
    })
}

/// Parse leaf record content. Blank lines and `#` comments are ignored; exactly
/// one directive line must remain.
pub fn parse_leaf(content: &str) -> Result<FromDirective, DirectiveError> {
    let lines: Vec<&str> = content
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .collect();

    match lines.as_slice() {
        [] => Err(DirectiveError::Empty),
        [line] => parse_from_line(line),
        more => Err(DirectiveError::MultipleDirectives(more.len())),
    }
}

/// Render the content of a freshly seeded leaf record.
pub fn render_leaf(image: &str, tag: &str) -> String {
    format!("FROM {}:{}\n", image, tag)
}
