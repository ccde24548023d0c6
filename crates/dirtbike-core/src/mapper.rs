use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use dirtbike_domain::{
    archive_path, is_script_candidate, metadata_dir_of, DistributionIdentity, ResolvedPackage,
};
use serde::Serialize;

use crate::effects::FileSystem;
use crate::error::ConvertError;

/// A payload file and where it lands in the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappedFile {
    pub archive_path: String,
    pub source_path: PathBuf,
    pub executable: bool,
}

/// Rewrites the resolved files into archive paths relative to the import
/// root's site directory, sorted by archive path.
///
/// Bytecode caches, metadata directories (regenerated as dist-info), files
/// outside the import root and directories are dropped. Executables in
/// `bin`/`sbin` with a python shebang go to `<dist>.data/scripts/`.
///
/// # Errors
///
/// [`ConvertError::EncodingError`] for paths that escape the root, are not
/// UTF-8 or collide; [`ConvertError::EmptyPackage`] when nothing survives.
pub fn map_files(
    fs: &dyn FileSystem,
    resolved: &ResolvedPackage,
    identity: &DistributionIdentity,
) -> Result<Vec<MappedFile>, ConvertError> {
    let root = resolved.import_root();
    let site_dir = root.site_dir();
    let scripts_dir = format!("{}/scripts", identity.data_dir());
    let mut mapped: BTreeMap<String, MappedFile> = BTreeMap::new();

    for file in resolved.installed_files() {
        if is_bytecode(file) || metadata_dir_of(file).is_some() {
            continue;
        }
        let Some(executable) = regular_file(fs, file) else {
            continue;
        };
        let archive = if root.contains(file) {
            let relative = file
                .strip_prefix(site_dir)
                .map_err(|_| encoding(file, "outside the site directory"))?;
            archive_path(relative).ok_or_else(|| encoding(file, "not a valid archive path"))?
        } else if is_script_candidate(file) && executable && has_python_shebang(fs, file) {
            let name = file
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| encoding(file, "script name is not UTF-8"))?;
            format!("{scripts_dir}/{name}")
        } else {
            tracing::debug!(path = %file.display(), "not part of the importable footprint");
            continue;
        };
        match mapped.entry(archive.clone()) {
            Entry::Occupied(existing) => {
                return Err(encoding(
                    file,
                    &format!(
                        "archive path {archive} already taken by {}",
                        existing.get().source_path.display()
                    ),
                ));
            }
            Entry::Vacant(slot) => {
                slot.insert(MappedFile {
                    archive_path: archive,
                    source_path: file.clone(),
                    executable,
                });
            }
        }
    }

    if mapped.is_empty() {
        return Err(ConvertError::EmptyPackage {
            requested: resolved.requested_name().to_string(),
            import_root: root.path().to_path_buf(),
        });
    }
    Ok(mapped.into_values().collect())
}

fn encoding(path: &Path, reason: &str) -> ConvertError {
    ConvertError::EncodingError {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn is_bytecode(path: &Path) -> bool {
    path.components().any(|part| part.as_os_str() == "__pycache__")
        || path
            .extension()
            .is_some_and(|ext| ext == "pyc" || ext == "pyo")
}

/// `Some(executable)` for regular files, following file symlinks only.
fn regular_file(fs: &dyn FileSystem, path: &Path) -> Option<bool> {
    let link = match fs.symlink_metadata(path) {
        Ok(meta) => meta,
        Err(err) => {
            tracing::warn!(path = %path.display(), "skipping missing file: {err:#}");
            return None;
        }
    };
    if link.is_dir() {
        return None;
    }
    let meta = if link.file_type().is_symlink() {
        match fs.metadata(path) {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => return None,
            Err(err) => {
                tracing::warn!(path = %path.display(), "skipping dangling symlink: {err:#}");
                return None;
            }
        }
    } else {
        link
    };
    meta.is_file().then(|| is_executable(&meta))
}

#[cfg(unix)]
pub(crate) fn is_executable(meta: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
pub(crate) fn is_executable(_meta: &std::fs::Metadata) -> bool {
    false
}

fn has_python_shebang(fs: &dyn FileSystem, path: &Path) -> bool {
    let Ok(bytes) = fs.read(path) else {
        return false;
    };
    let first_line = bytes.split(|byte| *byte == b'\n').next().unwrap_or_default();
    first_line.starts_with(b"#!") && String::from_utf8_lossy(first_line).contains("python")
}
