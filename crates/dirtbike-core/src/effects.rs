use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use dirtbike_domain::OsPackage;
use walkdir::WalkDir;
use which::which;

use crate::config::Config;
use crate::dpkg::DpkgDatabase;
use crate::process::{run_command, RunOutput};

pub trait PackageDatabase: Send + Sync {
    /// Installed packages named `name` or providing it.
    fn lookup(&self, name: &str) -> Result<Vec<OsPackage>>;
    /// Installed packages that list `path` among their files.
    fn owners(&self, path: &Path) -> Result<Vec<OsPackage>>;
}

pub trait PythonRuntime: Send + Sync {
    /// The current runtime: `explicit` when given, else the first of
    /// `python3`/`python` on `PATH`.
    fn detect_interpreter(&self, explicit: Option<&Path>) -> Result<PathBuf>;
    fn locate(&self, name: &str) -> Option<PathBuf>;
    fn run_script(&self, python: &Path, args: &[String], timeout: Duration) -> Result<RunOutput>;
}

pub trait FileSystem: Send + Sync {
    fn read(&self, path: &Path) -> Result<Vec<u8>>;
    fn read_to_string(&self, path: &Path) -> Result<String>;
    fn metadata(&self, path: &Path) -> Result<std::fs::Metadata>;
    fn symlink_metadata(&self, path: &Path) -> Result<std::fs::Metadata>;
    fn canonicalize(&self, path: &Path) -> Result<PathBuf>;
    fn create_dir_all(&self, path: &Path) -> Result<()>;
    /// Every non-directory entry below `root`, sorted, without following
    /// directory symlinks.
    fn walk_files(&self, root: &Path) -> Result<Vec<PathBuf>>;
}

pub trait Effects: Send + Sync {
    fn packages(&self) -> &dyn PackageDatabase;
    fn python(&self) -> &dyn PythonRuntime;
    fn fs(&self) -> &dyn FileSystem;
}

pub struct SystemEffects {
    packages: Arc<SystemPackageDatabase>,
    python: Arc<SystemPythonRuntime>,
    fs: Arc<SystemFileSystem>,
}

impl SystemEffects {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            packages: Arc::new(SystemPackageDatabase(DpkgDatabase::new(config.admindir()))),
            python: Arc::new(SystemPythonRuntime {
                max_capture_bytes: config.max_capture_bytes(),
            }),
            fs: Arc::new(SystemFileSystem),
        }
    }
}

impl Default for SystemEffects {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

impl Effects for SystemEffects {
    fn packages(&self) -> &dyn PackageDatabase {
        self.packages.as_ref()
    }

    fn python(&self) -> &dyn PythonRuntime {
        self.python.as_ref()
    }

    fn fs(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }
}

struct SystemPackageDatabase(DpkgDatabase);

impl PackageDatabase for SystemPackageDatabase {
    fn lookup(&self, name: &str) -> Result<Vec<OsPackage>> {
        self.0.lookup(name)
    }

    fn owners(&self, path: &Path) -> Result<Vec<OsPackage>> {
        self.0.owners(path)
    }
}

struct SystemPythonRuntime {
    max_capture_bytes: usize,
}

impl PythonRuntime for SystemPythonRuntime {
    fn detect_interpreter(&self, explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(explicit) = explicit {
            if explicit.components().count() > 1 {
                return Ok(explicit.to_path_buf());
            }
            return which(explicit)
                .with_context(|| format!("python interpreter {} not found", explicit.display()));
        }
        for candidate in ["python3", "python"] {
            if let Ok(path) = which(candidate) {
                return Ok(path);
            }
        }
        bail!("no python interpreter found; set DIRTBIKE_PYTHON or pass --python")
    }

    fn locate(&self, name: &str) -> Option<PathBuf> {
        which(name).ok()
    }

    fn run_script(&self, python: &Path, args: &[String], timeout: Duration) -> Result<RunOutput> {
        let program = python
            .to_str()
            .ok_or_else(|| anyhow!("non-utf8 interpreter path {}", python.display()))?;
        // Run from `/` so `-c` cannot import modules from the caller's cwd.
        run_command(
            program,
            args,
            &[],
            Path::new("/"),
            timeout,
            self.max_capture_bytes,
        )
    }
}

pub(crate) struct SystemFileSystem;

impl FileSystem for SystemFileSystem {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        std::fs::read(path).with_context(|| format!("reading {}", path.display()))
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
    }

    fn metadata(&self, path: &Path) -> Result<std::fs::Metadata> {
        std::fs::metadata(path).with_context(|| format!("metadata for {}", path.display()))
    }

    fn symlink_metadata(&self, path: &Path) -> Result<std::fs::Metadata> {
        std::fs::symlink_metadata(path)
            .with_context(|| format!("metadata for {}", path.display()))
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        std::fs::canonicalize(path).with_context(|| format!("canonicalizing {}", path.display()))
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path).with_context(|| format!("creating {}", path.display()))
    }

    fn walk_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
            let entry = entry.with_context(|| format!("walking {}", root.display()))?;
            if !entry.file_type().is_dir() {
                files.push(entry.into_path());
            }
        }
        files.sort();
        Ok(files)
    }
}
