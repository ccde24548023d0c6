//! Read-only view of a dpkg administrative directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dirtbike_domain::OsPackage;

const INSTALLED_STATES: [&str; 3] = ["installed", "triggers-pending", "triggers-awaited"];

#[derive(Debug, Clone, PartialEq, Eq)]
struct StatusRecord {
    name: String,
    version: String,
    architecture: String,
    summary: Option<String>,
    provides: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DpkgDatabase {
    admindir: PathBuf,
}

impl DpkgDatabase {
    #[must_use]
    pub fn new(admindir: impl Into<PathBuf>) -> Self {
        Self {
            admindir: admindir.into(),
        }
    }

    #[must_use]
    pub fn admindir(&self) -> &Path {
        &self.admindir
    }

    /// Installed packages named `name` or declaring `Provides: name`.
    ///
    /// # Errors
    ///
    /// Returns an error when the status file or a file list cannot be read.
    pub fn lookup(&self, name: &str) -> Result<Vec<OsPackage>> {
        self.installed()?
            .into_iter()
            .filter(|record| record.name == name || record.provides.iter().any(|p| p == name))
            .map(|record| self.hydrate(record))
            .collect()
    }

    /// Installed packages whose file list contains `path`.
    ///
    /// # Errors
    ///
    /// Returns an error when the status file or a file list cannot be read.
    pub fn owners(&self, path: &Path) -> Result<Vec<OsPackage>> {
        let mut owners = Vec::new();
        for record in self.installed()? {
            let files = self.file_list(&record)?;
            if files.iter().any(|file| file == path) {
                owners.push(to_package(record, files));
            }
        }
        Ok(owners)
    }

    fn installed(&self) -> Result<Vec<StatusRecord>> {
        let status = self.admindir.join("status");
        let text = std::fs::read_to_string(&status)
            .with_context(|| format!("reading dpkg status {}", status.display()))?;
        Ok(parse_status(&text))
    }

    fn hydrate(&self, record: StatusRecord) -> Result<OsPackage> {
        let files = self.file_list(&record)?;
        Ok(to_package(record, files))
    }

    fn file_list(&self, record: &StatusRecord) -> Result<Vec<PathBuf>> {
        let info = self.admindir.join("info");
        let candidates = [
            info.join(format!("{}.list", record.name)),
            info.join(format!("{}:{}.list", record.name, record.architecture)),
        ];
        for list in &candidates {
            if !list.is_file() {
                continue;
            }
            let text = std::fs::read_to_string(list)
                .with_context(|| format!("reading file list {}", list.display()))?;
            return Ok(parse_file_list(&text));
        }
        tracing::debug!(package = %record.name, "no file list recorded");
        Ok(Vec::new())
    }
}

fn to_package(record: StatusRecord, files: Vec<PathBuf>) -> OsPackage {
    OsPackage {
        name: record.name,
        version: record.version,
        architecture: record.architecture,
        summary: record.summary,
        provides: record.provides,
        files,
    }
}

fn parse_file_list(text: &str) -> Vec<PathBuf> {
    text.lines()
        .map(str::trim_end)
        .filter(|line| line.starts_with('/') && *line != "/.")
        .map(PathBuf::from)
        .collect()
}

fn parse_status(text: &str) -> Vec<StatusRecord> {
    let mut records = Vec::new();
    let mut fields: Vec<(String, String)> = Vec::new();
    for line in text.lines().chain(std::iter::once("")) {
        if line.trim().is_empty() {
            if let Some(record) = record_from_fields(&fields) {
                records.push(record);
            }
            fields.clear();
            continue;
        }
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some((_, value)) = fields.last_mut() {
                value.push('\n');
                value.push_str(line.trim());
            }
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            fields.push((key.trim().to_string(), value.trim().to_string()));
        }
    }
    records
}

fn record_from_fields(fields: &[(String, String)]) -> Option<StatusRecord> {
    let field = |key: &str| {
        fields
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value.as_str())
    };
    let state = field("Status")?.split_whitespace().nth(2)?;
    if !INSTALLED_STATES.contains(&state) {
        return None;
    }
    Some(StatusRecord {
        name: field("Package")?.to_string(),
        version: field("Version")?.to_string(),
        architecture: field("Architecture").unwrap_or("all").to_string(),
        summary: field("Description")
            .and_then(|text| text.lines().next())
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ToString::to_string),
        provides: field("Provides").map(parse_provides).unwrap_or_default(),
    })
}

// "python3-foo (= 1.0), foo" -> ["python3-foo", "foo"]
fn parse_provides(value: &str) -> Vec<String> {
    value
        .split(',')
        .filter_map(|item| item.split_whitespace().next())
        .map(ToString::to_string)
        .collect()
}
