//! Fallback through sibling Python runtimes installed on the host.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use dirtbike_domain::{footprint, import_name, ImportRoot, Interpreter, ResolvedPackage};

use crate::effects::Effects;
use crate::error::ConvertError;
use crate::python::{introspect_module, probe_interpreter, ModuleLocation, ALTERNATE_INTERPRETERS};

/// Asks each alternate runtime in [`ALTERNATE_INTERPRETERS`] to import
/// `requested` and translates the first hit into a [`ResolvedPackage`] for
/// that runtime.
///
/// Alternates that resolve to the current executable, report the current
/// `major.minor` or fail their probe are skipped.
///
/// # Errors
///
/// [`ConvertError::NotFound`] when no alternate can import the module,
/// [`ConvertError::Ambiguous`] when several OS packages own the reported
/// file, timeouts, and introspection failures of a usable alternate.
pub fn resolve_alternate(
    effects: &dyn Effects,
    current: &Interpreter,
    requested: &str,
    timeout: Duration,
) -> Result<ResolvedPackage, ConvertError> {
    let module = import_name(requested);
    let mut seen: HashSet<PathBuf> = HashSet::new();
    seen.insert(canonical(effects, &current.executable));
    let mut tried = Vec::new();

    for name in ALTERNATE_INTERPRETERS {
        let Some(path) = effects.python().locate(name) else {
            continue;
        };
        let located = canonical(effects, &path);
        if !seen.insert(located.clone()) {
            continue;
        }
        let alternate = match probe_interpreter(effects.python(), &path, timeout) {
            Ok(alternate) => alternate,
            Err(err @ ConvertError::InterpreterTimeout { .. }) => return Err(err),
            Err(err) => {
                tracing::debug!(path = %path.display(), "skipping unusable alternate: {err}");
                continue;
            }
        };
        let reported = canonical(effects, &alternate.executable);
        if alternate.same_version(current) || (reported != located && !seen.insert(reported)) {
            tracing::debug!(%alternate, "skipping alternate equivalent to a runtime already tried");
            continue;
        }
        tried.push(alternate.to_string());
        let Some(location) = introspect_module(effects.python(), &alternate, &module, timeout)? else {
            tracing::debug!(%alternate, module = %module, "module not importable");
            continue;
        };
        tracing::debug!(%alternate, file = %location.file.display(), "module found by alternate");
        return translate(effects, requested, &location, alternate);
    }

    Err(ConvertError::NotFound {
        requested: requested.to_string(),
        candidates: Vec::new(),
        interpreters: tried,
    })
}

fn canonical(effects: &dyn Effects, path: &std::path::Path) -> PathBuf {
    effects
        .fs()
        .canonicalize(path)
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Maps the file an alternate imported back to its owning OS package, or to
/// the files on disk when no package owns it.
fn translate(
    effects: &dyn Effects,
    requested: &str,
    location: &ModuleLocation,
    interpreter: Interpreter,
) -> Result<ResolvedPackage, ConvertError> {
    let root = location.import_root();
    let mut owners = effects
        .packages()
        .owners(&location.file)
        .map_err(|err| ConvertError::query(&err))?;
    if owners.is_empty() {
        let resolved = canonical(effects, &location.file);
        if resolved != location.file {
            owners = effects
                .packages()
                .owners(&resolved)
                .map_err(|err| ConvertError::query(&err))?;
        }
    }
    if owners.len() > 1 {
        return Err(ConvertError::Ambiguous {
            requested: requested.to_string(),
            providers: owners.into_iter().map(|pkg| pkg.name).collect(),
        });
    }

    let (os_package, files) = match owners.pop() {
        Some(package) => {
            let files = footprint(&package.files, &root);
            (Some(package), files)
        }
        None => {
            tracing::debug!(root = %root.path().display(), "no owning package; reading files from disk");
            let files = match &root {
                ImportRoot::Package(dir) => effects
                    .fs()
                    .walk_files(dir)
                    .map_err(|err| ConvertError::EncodingError {
                        path: dir.clone(),
                        reason: format!("{err:#}"),
                    })?,
                ImportRoot::Module(file) => vec![file.clone()],
            };
            (None, files)
        }
    };
    ResolvedPackage::new(requested, os_package, files, root.clone(), interpreter).ok_or_else(|| {
        ConvertError::EmptyPackage {
            requested: requested.to_string(),
            import_root: root.path().to_path_buf(),
        }
    })
}
