use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Result};
use dirtbike_domain::{Interpreter, InterpreterTags, OsPackage};
use serde_json::json;

use crate::effects::{Effects, FileSystem, PackageDatabase, PythonRuntime, SystemFileSystem};
use crate::process::RunOutput;

pub(crate) fn interpreter(executable: &str, major: u8, minor: u8, search: &[&str]) -> Interpreter {
    Interpreter {
        executable: PathBuf::from(executable),
        major,
        minor,
        tags: InterpreterTags {
            python: format!("cp{major}{minor}"),
            abi: format!("cp{major}{minor}"),
            platform: "linux_x86_64".into(),
        },
        search_path: search.iter().map(PathBuf::from).collect(),
    }
}

pub(crate) fn probe_json(interpreter: &Interpreter) -> String {
    json!({
        "executable": interpreter.executable,
        "major": interpreter.major,
        "minor": interpreter.minor,
        "python": interpreter.tags.python,
        "abi": interpreter.tags.abi,
        "platform": interpreter.tags.platform,
        "sys_path": interpreter.search_path,
    })
    .to_string()
}

pub(crate) fn module_json(file: &Path, package: bool) -> String {
    json!({ "found": true, "file": file, "package": package }).to_string()
}

/// Writes `contents` at `root/relative`, creating parents.
pub(crate) fn write_file(root: &Path, relative: &str, contents: &str) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent");
    }
    fs::write(&path, contents).expect("write fixture");
    path
}

pub(crate) fn os_package(name: &str, version: &str, files: Vec<PathBuf>) -> OsPackage {
    OsPackage {
        name: name.to_string(),
        version: version.to_string(),
        architecture: "all".into(),
        summary: None,
        provides: Vec::new(),
        files,
    }
}

#[derive(Default)]
pub(crate) struct FakeDatabase {
    packages: Vec<OsPackage>,
}

impl FakeDatabase {
    pub(crate) fn new(packages: Vec<OsPackage>) -> Self {
        Self { packages }
    }
}

impl PackageDatabase for FakeDatabase {
    fn lookup(&self, name: &str) -> Result<Vec<OsPackage>> {
        Ok(self
            .packages
            .iter()
            .filter(|pkg| pkg.name == name || pkg.provides.iter().any(|p| p == name))
            .cloned()
            .collect())
    }

    fn owners(&self, path: &Path) -> Result<Vec<OsPackage>> {
        Ok(self
            .packages
            .iter()
            .filter(|pkg| pkg.files.iter().any(|file| file == path))
            .cloned()
            .collect())
    }
}

#[derive(Debug, Clone)]
enum Reply {
    Stdout(String),
    Stderr(String),
}

/// Scripted interpreters keyed by executable; introspection replies are
/// keyed by module name as well.
#[derive(Default)]
pub(crate) struct FakePython {
    current: Option<PathBuf>,
    on_path: HashMap<String, PathBuf>,
    replies: HashMap<(PathBuf, Option<String>), Reply>,
    hanging: HashSet<PathBuf>,
    calls: Mutex<Vec<(PathBuf, Vec<String>)>>,
}

impl FakePython {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_current(mut self, interpreter: &Interpreter) -> Self {
        self.current = Some(interpreter.executable.clone());
        self.with_probe(
            &interpreter.executable.display().to_string(),
            &probe_json(interpreter),
        )
    }

    pub(crate) fn with_alternate(mut self, name: &str, interpreter: &Interpreter) -> Self {
        self.on_path
            .insert(name.to_string(), interpreter.executable.clone());
        self.with_probe(
            &interpreter.executable.display().to_string(),
            &probe_json(interpreter),
        )
    }

    /// An executable on `PATH` with no scripted replies.
    pub(crate) fn with_on_path(mut self, name: &str, executable: &str) -> Self {
        self.on_path.insert(name.to_string(), PathBuf::from(executable));
        self
    }

    pub(crate) fn with_probe(mut self, executable: &str, stdout: &str) -> Self {
        self.replies.insert(
            (PathBuf::from(executable), None),
            Reply::Stdout(stdout.to_string()),
        );
        self
    }

    pub(crate) fn with_module(mut self, executable: &str, module: &str, stdout: &str) -> Self {
        self.replies.insert(
            (PathBuf::from(executable), Some(module.to_string())),
            Reply::Stdout(stdout.to_string()),
        );
        self
    }

    pub(crate) fn with_failure(mut self, executable: &str, module: &str, stderr: &str) -> Self {
        self.replies.insert(
            (PathBuf::from(executable), Some(module.to_string())),
            Reply::Stderr(stderr.to_string()),
        );
        self
    }

    pub(crate) fn with_timeout(mut self, executable: &str) -> Self {
        self.hanging.insert(PathBuf::from(executable));
        self
    }

    pub(crate) fn calls(&self) -> Vec<(PathBuf, Vec<String>)> {
        self.calls.lock().expect("calls lock").clone()
    }
}

impl PythonRuntime for FakePython {
    fn detect_interpreter(&self, explicit: Option<&Path>) -> Result<PathBuf> {
        explicit
            .map(Path::to_path_buf)
            .or_else(|| self.current.clone())
            .ok_or_else(|| anyhow!("no python interpreter found"))
    }

    fn locate(&self, name: &str) -> Option<PathBuf> {
        self.on_path.get(name).cloned()
    }

    fn run_script(&self, python: &Path, args: &[String], _timeout: Duration) -> Result<RunOutput> {
        self.calls
            .lock()
            .expect("calls lock")
            .push((python.to_path_buf(), args.to_vec()));
        if self.hanging.contains(python) {
            return Ok(RunOutput {
                code: -1,
                stdout: String::new(),
                stderr: String::new(),
                timed_out: true,
            });
        }
        let module = args.get(4).cloned();
        let reply = match self.replies.get(&(python.to_path_buf(), module.clone())) {
            Some(reply) => reply.clone(),
            None if module.is_some() && self.replies.contains_key(&(python.to_path_buf(), None)) => {
                Reply::Stdout(r#"{"found": false, "file": null, "package": false}"#.to_string())
            }
            None => return Err(anyhow!("failed to start {}", python.display())),
        };
        Ok(match reply {
            Reply::Stdout(stdout) => RunOutput {
                code: 0,
                stdout,
                stderr: String::new(),
                timed_out: false,
            },
            Reply::Stderr(stderr) => RunOutput {
                code: 1,
                stdout: String::new(),
                stderr,
                timed_out: false,
            },
        })
    }
}

pub(crate) struct FakeEffects {
    pub(crate) packages: FakeDatabase,
    pub(crate) python: FakePython,
    fs: SystemFileSystem,
}

impl FakeEffects {
    pub(crate) fn new(packages: FakeDatabase, python: FakePython) -> Self {
        Self {
            packages,
            python,
            fs: SystemFileSystem,
        }
    }
}

impl Effects for FakeEffects {
    fn packages(&self) -> &dyn PackageDatabase {
        &self.packages
    }

    fn python(&self) -> &dyn PythonRuntime {
        &self.python
    }

    fn fs(&self) -> &dyn FileSystem {
        &self.fs
    }
}
