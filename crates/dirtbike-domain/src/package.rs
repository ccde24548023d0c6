use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::naming::import_name;

/// Compatibility tags reported by an interpreter (`cp311`, `cp311`,
/// `linux_x86_64`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterpreterTags {
    pub python: String,
    pub abi: String,
    pub platform: String,
}

/// A Python runtime as seen by one out-of-process probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Interpreter {
    pub executable: PathBuf,
    pub major: u8,
    pub minor: u8,
    pub tags: InterpreterTags,
    pub search_path: Vec<PathBuf>,
}

impl Interpreter {
    #[must_use]
    pub fn same_version(&self, other: &Interpreter) -> bool {
        self.major == other.major && self.minor == other.minor
    }
}

impl fmt::Display for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "python{}.{} ({})",
            self.major,
            self.minor,
            self.executable.display()
        )
    }
}

/// One installed OS package record and the paths it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OsPackage {
    pub name: String,
    pub version: String,
    pub architecture: String,
    pub summary: Option<String>,
    pub provides: Vec<String>,
    pub files: Vec<PathBuf>,
}

/// Where the importable code lives: a package directory or a single module
/// file (pure or extension).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum ImportRoot {
    Package(PathBuf),
    Module(PathBuf),
}

impl ImportRoot {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Package(path) | Self::Module(path) => path,
        }
    }

    /// The directory that must sit on `sys.path` for the root to import.
    #[must_use]
    pub fn site_dir(&self) -> &Path {
        self.path().parent().unwrap_or_else(|| Path::new("/"))
    }

    /// Entries beneath a package directory (not the directory itself), or
    /// the module file.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        match self {
            Self::Package(root) => path != root && path.starts_with(root),
            Self::Module(root) => path == root,
        }
    }
}

/// The normalized output of the locator and the cross-interpreter resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPackage {
    requested_name: String,
    os_package: Option<OsPackage>,
    installed_files: Vec<PathBuf>,
    import_root: ImportRoot,
    interpreter: Interpreter,
}

impl ResolvedPackage {
    /// Builds the record; `None` when no files remain, which callers report
    /// as an empty package rather than a valid resolution.
    #[must_use]
    pub fn new(
        requested_name: impl Into<String>,
        os_package: Option<OsPackage>,
        installed_files: impl IntoIterator<Item = PathBuf>,
        import_root: ImportRoot,
        interpreter: Interpreter,
    ) -> Option<Self> {
        let installed_files: Vec<PathBuf> = installed_files
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if installed_files.is_empty() {
            return None;
        }
        Some(Self {
            requested_name: requested_name.into(),
            os_package,
            installed_files,
            import_root,
            interpreter,
        })
    }

    pub fn requested_name(&self) -> &str {
        &self.requested_name
    }

    pub fn import_name(&self) -> String {
        import_name(&self.requested_name)
    }

    pub fn os_package(&self) -> Option<&OsPackage> {
        self.os_package.as_ref()
    }

    pub fn os_package_name(&self) -> Option<&str> {
        self.os_package.as_ref().map(|pkg| pkg.name.as_str())
    }

    /// Sorted, deduplicated absolute paths.
    pub fn installed_files(&self) -> &[PathBuf] {
        &self.installed_files
    }

    pub fn import_root(&self) -> &ImportRoot {
        &self.import_root
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }
}

const EXTENSION_SUFFIXES: [&str; 2] = [".so", ".pyd"];

/// Finds the import root for `requested` among `files`, scanning
/// `search_path` in order. A package directory beats a `.py` module, which
/// beats an extension module in the same directory.
pub fn find_import_root(
    files: &[PathBuf],
    requested: &str,
    search_path: &[PathBuf],
) -> Option<ImportRoot> {
    let module = import_name(requested);
    if module.is_empty() {
        return None;
    }
    let source_name = format!("{module}.py");
    let extension_prefix = format!("{module}.");
    for dir in search_path {
        let package_dir = dir.join(&module);
        let has_children = files
            .iter()
            .any(|file| file != &package_dir && file.starts_with(&package_dir));
        if has_children {
            return Some(ImportRoot::Package(package_dir));
        }
        let source = dir.join(&source_name);
        if files.contains(&source) {
            return Some(ImportRoot::Module(source));
        }
        let extension = files.iter().find(|file| {
            file.parent() == Some(dir.as_path())
                && file_name(file).is_some_and(|name| {
                    name.starts_with(&extension_prefix)
                        && EXTENSION_SUFFIXES.iter().any(|sfx| name.ends_with(sfx))
                })
        });
        if let Some(extension) = extension {
            return Some(ImportRoot::Module(extension.clone()));
        }
    }
    None
}

/// Narrows an OS package's file list to the parts that can belong to the
/// converted distribution: the import root, metadata directories next to it,
/// and script candidates in `bin`/`sbin` directories.
pub fn footprint(files: &[PathBuf], root: &ImportRoot) -> Vec<PathBuf> {
    let site_dir = root.site_dir();
    files
        .iter()
        .filter(|file| {
            root.contains(file)
                || metadata_dir_of(file).is_some_and(|dir| dir.parent() == Some(site_dir))
                || is_script_candidate(file)
        })
        .cloned()
        .collect()
}

/// True for `*.egg-info` / `*.dist-info` names.
pub fn is_metadata_dir_name(name: &str) -> bool {
    name.ends_with(".egg-info") || name.ends_with(".dist-info")
}

/// The enclosing (or self) metadata directory of `path`, if any.
pub fn metadata_dir_of(path: &Path) -> Option<PathBuf> {
    let mut current = Some(path);
    while let Some(candidate) = current {
        if file_name(candidate).is_some_and(is_metadata_dir_name) {
            return Some(candidate.to_path_buf());
        }
        current = candidate.parent();
    }
    None
}

const SCRIPT_DIRS: [&str; 2] = ["bin", "sbin"];

/// Files directly inside a `bin`-style directory.
pub fn is_script_candidate(path: &Path) -> bool {
    path.parent()
        .and_then(file_name)
        .is_some_and(|dir| SCRIPT_DIRS.contains(&dir))
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|name| name.to_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(items: &[&str]) -> Vec<PathBuf> {
        items.iter().map(PathBuf::from).collect()
    }

    fn site() -> Vec<PathBuf> {
        paths(&["/usr/lib/python3.11", "/usr/lib/python3/dist-packages"])
    }

    #[test]
    fn package_directory_is_preferred() {
        let files = paths(&[
            "/usr/lib/python3/dist-packages/stupid",
            "/usr/lib/python3/dist-packages/stupid/__init__.py",
            "/usr/lib/python3/dist-packages/stupid.py",
        ]);
        let root = find_import_root(&files, "stupid", &site()).expect("root");
        assert_eq!(
            root,
            ImportRoot::Package(PathBuf::from("/usr/lib/python3/dist-packages/stupid"))
        );
        assert_eq!(root.site_dir(), Path::new("/usr/lib/python3/dist-packages"));
    }

    #[test]
    fn single_module_and_extension_roots() {
        let files = paths(&["/usr/lib/python3/dist-packages/six.py"]);
        assert_eq!(
            find_import_root(&files, "six", &site()),
            Some(ImportRoot::Module(PathBuf::from(
                "/usr/lib/python3/dist-packages/six.py"
            )))
        );

        let files = paths(&["/usr/lib/python3/dist-packages/_yaml.cpython-311-x86_64-linux-gnu.so"]);
        assert!(matches!(
            find_import_root(&files, "_yaml", &site()),
            Some(ImportRoot::Module(_))
        ));
    }

    #[test]
    fn roots_outside_search_path_are_ignored() {
        let files = paths(&[
            "/usr/lib/python2.7/dist-packages/six.py",
            "/usr/share/doc/python-six/copyright",
        ]);
        assert_eq!(find_import_root(&files, "six", &site()), None);
    }

    #[test]
    fn bare_directory_entry_is_not_a_package() {
        let files = paths(&["/usr/lib/python3/dist-packages/stupid"]);
        assert_eq!(find_import_root(&files, "stupid", &site()), None);
    }

    #[test]
    fn footprint_keeps_root_metadata_and_scripts() {
        let files = paths(&[
            "/usr/bin/stupid",
            "/usr/lib/python3/dist-packages/stupid/__init__.py",
            "/usr/lib/python3/dist-packages/stupid-1.0.egg-info/PKG-INFO",
            "/usr/lib/python3/dist-packages/other/__init__.py",
            "/usr/lib/python3.11/stupid-0.1.egg-info",
            "/usr/share/doc/python3-stupid/changelog.gz",
            "/usr/lib/python3/dist-packages/stupid",
        ]);
        let root = ImportRoot::Package(PathBuf::from("/usr/lib/python3/dist-packages/stupid"));
        assert_eq!(
            footprint(&files, &root),
            paths(&[
                "/usr/bin/stupid",
                "/usr/lib/python3/dist-packages/stupid/__init__.py",
                "/usr/lib/python3/dist-packages/stupid-1.0.egg-info/PKG-INFO",
            ])
        );
    }

    #[test]
    fn resolved_package_rejects_empty_file_lists() {
        let interpreter = Interpreter {
            executable: PathBuf::from("/usr/bin/python3"),
            major: 3,
            minor: 11,
            tags: InterpreterTags {
                python: "cp311".into(),
                abi: "cp311".into(),
                platform: "linux_x86_64".into(),
            },
            search_path: site(),
        };
        let root = ImportRoot::Module(PathBuf::from("/usr/lib/python3/dist-packages/six.py"));
        assert!(ResolvedPackage::new("six", None, Vec::new(), root.clone(), interpreter.clone())
            .is_none());

        let resolved = ResolvedPackage::new(
            "six",
            None,
            paths(&[
                "/usr/lib/python3/dist-packages/six.py",
                "/usr/lib/python3/dist-packages/six.py",
            ]),
            root,
            interpreter,
        )
        .expect("resolved");
        assert_eq!(resolved.installed_files().len(), 1);
    }
}
