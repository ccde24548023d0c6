use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::metadata::DistributionIdentity;
use crate::package::InterpreterTags;

pub const WHEEL_VERSION: &str = "1.0";

/// One payload file of the archive with its RECORD data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveEntry {
    pub archive_path: String,
    pub source_path: PathBuf,
    pub size_bytes: u64,
    /// `sha256=<urlsafe-b64-nopad>`
    pub digest: String,
}

impl ArchiveEntry {
    pub fn record_line(&self) -> String {
        record_line(&self.archive_path, Some((&self.digest, self.size_bytes)))
    }
}

/// Renders one RECORD row; `None` leaves hash and size empty (RECORD itself).
pub fn record_line(path: &str, digest: Option<(&str, u64)>) -> String {
    match digest {
        Some((hash, size)) => format!("{},{hash},{size}", csv_field(path)),
        None => format!("{},,", csv_field(path)),
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Converts a relative filesystem path to a forward-slash archive path,
/// refusing anything that could escape the archive root.
pub fn archive_path(relative: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?.to_string()),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WheelTag {
    pub python: String,
    pub abi: String,
    pub platform: String,
}

impl WheelTag {
    /// Pure Python, either major version, any platform.
    pub fn universal() -> Self {
        Self {
            python: "py2.py3".to_string(),
            abi: "none".to_string(),
            platform: "any".to_string(),
        }
    }

    pub fn for_interpreter(tags: &InterpreterTags) -> Self {
        Self {
            python: tags.python.clone(),
            abi: tags.abi.clone(),
            platform: tags.platform.clone(),
        }
    }

    /// Universal unless any path is a native artifact, in which case the
    /// tag is narrowed to the interpreter that owns the files.
    pub fn select<'a>(
        archive_paths: impl IntoIterator<Item = &'a str>,
        interpreter: &InterpreterTags,
    ) -> Self {
        if archive_paths.into_iter().any(is_binary_artifact) {
            Self::for_interpreter(interpreter)
        } else {
            Self::universal()
        }
    }

    pub fn is_universal(&self) -> bool {
        self.abi == "none" && self.platform == "any"
    }

    /// Every concrete `python-abi-platform` triple of a compressed tag set.
    pub fn expanded(&self) -> Vec<String> {
        let mut tags = Vec::new();
        for python in self.python.split('.') {
            for abi in self.abi.split('.') {
                for platform in self.platform.split('.') {
                    tags.push(format!("{python}-{abi}-{platform}"));
                }
            }
        }
        tags
    }
}

impl fmt::Display for WheelTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.python, self.abi, self.platform)
    }
}

const BINARY_SUFFIXES: [&str; 4] = [".so", ".pyd", ".dll", ".dylib"];

/// True for compiled extension modules and shared libraries, including
/// versioned `.so.N` names.
pub fn is_binary_artifact(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path).to_ascii_lowercase();
    if BINARY_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)) {
        return true;
    }
    match name.split_once(".so.") {
        Some((stem, version)) => {
            !stem.is_empty()
                && !version.is_empty()
                && version.split('.').all(|part| part.chars().all(|c| c.is_ascii_digit()))
        }
        None => false,
    }
}

pub fn wheel_filename(identity: &DistributionIdentity, tag: &WheelTag) -> String {
    format!(
        "{}-{}-{}.whl",
        identity.wheel_name(),
        identity.wheel_version(),
        tag
    )
}

pub fn render_wheel_file(generator: &str, tag: &WheelTag) -> String {
    let mut lines = vec![
        format!("Wheel-Version: {WHEEL_VERSION}"),
        format!("Generator: {generator}"),
        format!("Root-Is-Purelib: {}", tag.is_universal()),
    ];
    for expanded in tag.expanded() {
        lines.push(format!("Tag: {expanded}"));
    }
    lines.push(String::new());
    lines.join("\n")
}
