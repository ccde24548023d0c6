use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use dirtbike_domain::{
    canonical_name, metadata_dir_of, normalize_version, CoreMetadata, DistributionIdentity,
    IdentitySource, NamingConvention, ResolvedPackage,
};

use crate::effects::FileSystem;
use crate::error::ConvertError;

/// Name and version for `resolved`: from a metadata directory next to the
/// import root when one parses, otherwise from the OS package record through
/// `convention`. Never invents a version.
///
/// # Errors
///
/// [`ConvertError::MetadataMissing`] when neither source yields both.
pub fn resolve_metadata(
    fs: &dyn FileSystem,
    convention: &dyn NamingConvention,
    resolved: &ResolvedPackage,
) -> Result<DistributionIdentity, ConvertError> {
    if let Some(identity) = from_metadata_dirs(fs, resolved) {
        return Ok(identity);
    }

    let requested = resolved.requested_name();
    let Some(package) = resolved.os_package() else {
        return Err(ConvertError::MetadataMissing {
            requested: requested.to_string(),
            os_package: None,
            reason: "no metadata directory and no owning OS package".to_string(),
        });
    };
    let name = convention
        .distribution_name(&package.name)
        .unwrap_or_else(|| resolved.import_name());
    let Some(version) = convention.upstream_version(&package.version) else {
        return Err(ConvertError::MetadataMissing {
            requested: requested.to_string(),
            os_package: Some(package.name.clone()),
            reason: format!(
                "no metadata directory, and OS version `{}` has no PEP 440 upstream form",
                package.version
            ),
        });
    };
    tracing::debug!(
        os_package = %package.name,
        name = %name,
        version = %version,
        "identity derived from OS package record"
    );
    Ok(
        DistributionIdentity::new(name, version, IdentitySource::OsPackage(package.name.clone()))
            .with_summary(package.summary.clone()),
    )
}

fn from_metadata_dirs(fs: &dyn FileSystem, resolved: &ResolvedPackage) -> Option<DistributionIdentity> {
    let site_dir = resolved.import_root().site_dir();
    let dirs: BTreeSet<PathBuf> = resolved
        .installed_files()
        .iter()
        .filter_map(|file| metadata_dir_of(file))
        .filter(|dir| dir.parent() == Some(site_dir))
        .collect();
    if dirs.is_empty() {
        return None;
    }

    let wanted = canonical_name(resolved.requested_name());
    let module = resolved.import_name();
    let mut preferred = Vec::new();
    let mut others = Vec::new();
    for dir in dirs {
        let Some(metadata) = read_metadata(fs, &dir) else {
            continue;
        };
        let (Some(name), Some(_)) = (metadata.name(), metadata.version()) else {
            tracing::warn!(dir = %dir.display(), "ignoring metadata without name and version");
            continue;
        };
        if canonical_name(name) == wanted || lists_top_level(fs, &dir, &module) {
            preferred.push((dir, metadata));
        } else {
            others.push((dir, metadata));
        }
    }
    let (dir, metadata) = preferred.into_iter().chain(others).next()?;
    let name = metadata.name()?.to_string();
    let raw_version = metadata.version()?;
    let version = normalize_version(raw_version).unwrap_or_else(|| raw_version.to_string());
    tracing::debug!(dir = %dir.display(), name = %name, version = %version, "identity read from metadata");
    Some(
        DistributionIdentity::new(name, version, IdentitySource::MetadataDir(dir))
            .with_summary(metadata.get("Summary").map(ToString::to_string))
            .with_carried(&metadata),
    )
}

fn read_metadata(fs: &dyn FileSystem, dir: &Path) -> Option<CoreMetadata> {
    let is_file = fs.metadata(dir).map(|meta| meta.is_file()).unwrap_or(false);
    let source = if is_file {
        dir.to_path_buf()
    } else if dir.extension().is_some_and(|ext| ext == "dist-info") {
        dir.join("METADATA")
    } else {
        dir.join("PKG-INFO")
    };
    match fs.read_to_string(&source) {
        Ok(text) => Some(CoreMetadata::parse(&text)),
        Err(err) => {
            tracing::warn!(path = %source.display(), "ignoring unreadable metadata: {err:#}");
            None
        }
    }
}

fn lists_top_level(fs: &dyn FileSystem, dir: &Path, module: &str) -> bool {
    fs.read_to_string(&dir.join("top_level.txt"))
        .map(|text| text.lines().any(|line| line.trim() == module))
        .unwrap_or(false)
}
