//! Name and version conventions shared by every pipeline stage.
//!
//! OS distributions rename Python projects when they package them (Debian
//! ships `pkg_resources` as `python3-pkg-resources`) and rewrite their
//! versions (`1:44.1.1-1+deb11u1`). [`NamingConvention`] captures both
//! directions so the locator and the metadata fallback agree on one rule set.

use std::str::FromStr;

use indexmap::IndexSet;
use pep440_rs::Version;

/// Maps between importable names and an OS distribution's package naming.
pub trait NamingConvention: Send + Sync {
    /// Ordered OS package names that may provide `requested` for a runtime
    /// of the given major version. Earlier names are tried first.
    fn candidate_names(&self, requested: &str, runtime_major: u8) -> Vec<String>;

    /// Distribution name encoded in an OS package name, or `None` when the
    /// package does not follow the runtime-prefix convention.
    fn distribution_name(&self, os_package: &str) -> Option<String>;

    /// Upstream (PEP 440) version encoded in an OS package version.
    fn upstream_version(&self, os_version: &str) -> Option<String>;
}

const DEBIAN_RUNTIME_PREFIXES: [&str; 5] = ["python3-", "python2-", "python-", "pypy3-", "pypy-"];

/// Debian and derivatives: `python3-<name>`, `python-<name>`, versions of the
/// form `[epoch:]upstream[-revision]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DebianConvention;

impl DebianConvention {
    fn debianize(name: &str) -> String {
        name.to_ascii_lowercase().replace('_', "-")
    }
}

impl NamingConvention for DebianConvention {
    fn candidate_names(&self, requested: &str, runtime_major: u8) -> Vec<String> {
        let debianized = Self::debianize(requested);
        let mut names = IndexSet::new();
        names.insert(requested.to_string());
        names.insert(debianized.clone());
        names.insert(format!("python{runtime_major}-{debianized}"));
        names.insert(format!("python-{debianized}"));
        names.into_iter().collect()
    }

    fn distribution_name(&self, os_package: &str) -> Option<String> {
        DEBIAN_RUNTIME_PREFIXES.iter().find_map(|prefix| {
            os_package
                .strip_prefix(prefix)
                .filter(|rest| !rest.is_empty())
                .map(ToString::to_string)
        })
    }

    fn upstream_version(&self, os_version: &str) -> Option<String> {
        let trimmed = os_version.trim();
        let without_epoch = match trimmed.split_once(':') {
            Some((epoch, rest)) if epoch.chars().all(|c| c.is_ascii_digit()) => rest,
            _ => trimmed,
        };
        let upstream = match without_epoch.rsplit_once('-') {
            Some((upstream, _revision)) => upstream,
            None => without_epoch,
        };
        let upstream = upstream.split('+').next().unwrap_or_default();
        let upstream = upstream.replace('~', "");
        normalize_version(&upstream)
    }
}

/// Normalizes a version through PEP 440, returning `None` if it does not parse.
pub fn normalize_version(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    Version::from_str(raw).ok().map(|version| version.to_string())
}

/// PEP 503 canonical form: lowercase, runs of `-`, `_`, `.` collapsed to `-`.
pub fn canonical_name(name: &str) -> String {
    collapse_runs(&name.to_ascii_lowercase(), |c| matches!(c, '-' | '_' | '.'), '-')
}

/// Escapes a distribution name or version for a wheel filename component:
/// anything other than alphanumerics and `.` becomes a single `_`.
pub fn wheel_component(value: &str) -> String {
    collapse_runs(value, |c| !(c.is_ascii_alphanumeric() || c == '.'), '_')
}

/// The module name Python would import for a requested name.
pub fn import_name(requested: &str) -> String {
    requested.trim().replace('-', "_")
}

fn collapse_runs(value: &str, is_separator: impl Fn(char) -> bool, replacement: char) -> String {
    let mut out = String::with_capacity(value.len());
    let mut in_run = false;
    for ch in value.chars() {
        if is_separator(ch) {
            if !in_run {
                out.push(replacement);
            }
            in_run = true;
        } else {
            out.push(ch);
            in_run = false;
        }
    }
    out
}
