use std::path::{Path, PathBuf};

/// `-d` beats `DIRTBIKE_DIRECTORY`, which beats the current directory.
/// Relative choices resolve against `cwd`.
pub fn resolve_destination(
    explicit: Option<&Path>,
    env_override: Option<&Path>,
    cwd: &Path,
) -> PathBuf {
    match explicit.or(env_override) {
        Some(dir) if dir.is_absolute() => dir.to_path_buf(),
        Some(dir) => cwd.join(dir),
        None => cwd.to_path_buf(),
    }
}
