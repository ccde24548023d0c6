use std::path::{Path, PathBuf};
use std::time::Duration;

use dirtbike_domain::{ImportRoot, Interpreter, InterpreterTags};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::effects::PythonRuntime;
use crate::error::ConvertError;
use crate::process::RunOutput;

/// Executables tried, in order, when the current runtime cannot see a module.
pub const ALTERNATE_INTERPRETERS: [&str; 11] = [
    "python2.7",
    "python2",
    "python3",
    "python3.14",
    "python3.13",
    "python3.12",
    "python3.11",
    "python3.10",
    "python3.9",
    "python3.8",
    "python",
];

// Must stay valid on Python 2.7 and 3.x: no f-strings, no print statement.
const PROBE_SCRIPT: &str = r#"import json, sys
try:
    import sysconfig
    platform = sysconfig.get_platform()
    soabi = sysconfig.get_config_var("SOABI")
    pymalloc = sysconfig.get_config_var("WITH_PYMALLOC")
except ImportError:
    from distutils.util import get_platform
    platform = get_platform()
    soabi = None
    pymalloc = None
major = sys.version_info[0]
minor = sys.version_info[1]
impl = getattr(sys, "implementation", None)
if impl is not None:
    name = impl.name
elif "__pypy__" in sys.builtin_module_names:
    name = "pypy"
else:
    name = "cpython"
prefix = {"cpython": "cp", "pypy": "pp"}.get(name, "py")
python = "%s%d%d" % (prefix, major, minor)
if soabi:
    parts = soabi.split("-")
    if parts[0] == "cpython" and len(parts) > 1:
        abi = "cp" + parts[1]
    else:
        abi = "_".join(parts[:2]).replace(".", "_")
elif name == "cpython":
    abi = python
    if pymalloc:
        abi += "m"
    if major == 2 and sys.maxunicode == 0x10ffff:
        abi += "u"
else:
    abi = "none"
data = {
    "executable": sys.executable,
    "major": major,
    "minor": minor,
    "python": python,
    "abi": abi,
    "platform": platform.lower().replace("-", "_").replace(".", "_"),
    "sys_path": [entry for entry in sys.path if entry],
}
sys.stdout.write(json.dumps(data) + "\n")
"#;

const INTROSPECT_SCRIPT: &str = r#"import json, os, sys
name = sys.argv[1]
result = {"found": False, "file": None, "package": False}
try:
    __import__(name)
    module = sys.modules[name]
except Exception:
    module = None
path = getattr(module, "__file__", None)
if path:
    path = os.path.abspath(path)
    if path[-4:] in (".pyc", ".pyo") and os.path.exists(path[:-1]):
        path = path[:-1]
    result = {"found": True, "file": path, "package": hasattr(module, "__path__")}
sys.stdout.write("\n" + json.dumps(result) + "\n")
"#;

fn script_args(script: &str) -> Vec<String> {
    vec![
        "-E".to_string(),
        "-s".to_string(),
        "-c".to_string(),
        script.to_string(),
    ]
}

#[derive(Deserialize)]
struct ProbePayload {
    executable: Option<String>,
    major: u8,
    minor: u8,
    python: String,
    abi: String,
    platform: String,
    #[serde(default)]
    sys_path: Vec<String>,
}

#[derive(Deserialize)]
struct IntrospectPayload {
    found: bool,
    file: Option<String>,
    #[serde(default)]
    package: bool,
}

/// Where an interpreter imported a module from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleLocation {
    pub file: PathBuf,
    pub package: bool,
}

impl ModuleLocation {
    #[must_use]
    pub fn import_root(&self) -> ImportRoot {
        match (self.package, self.file.parent()) {
            (true, Some(dir)) => ImportRoot::Package(dir.to_path_buf()),
            _ => ImportRoot::Module(self.file.clone()),
        }
    }
}

/// Asks `python` for its version, compatibility tags and search path.
///
/// # Errors
///
/// `InterpreterTimeout` when the probe outlives `timeout`, otherwise
/// `InterpreterFailed` for spawn failures, non-zero exits and bad payloads.
pub fn probe_interpreter(
    runtime: &dyn PythonRuntime,
    python: &Path,
    timeout: Duration,
) -> Result<Interpreter, ConvertError> {
    let label = python.display().to_string();
    let output = runtime
        .run_script(python, &script_args(PROBE_SCRIPT), timeout)
        .map_err(|err| ConvertError::InterpreterFailed {
            interpreter: label.clone(),
            reason: format!("{err:#}"),
        })?;
    let payload: ProbePayload = parse_payload(&output, &label, timeout)?;
    let executable = payload
        .executable
        .filter(|value| !value.is_empty())
        .map_or_else(|| python.to_path_buf(), PathBuf::from);
    Ok(Interpreter {
        executable,
        major: payload.major,
        minor: payload.minor,
        tags: InterpreterTags {
            python: payload.python,
            abi: payload.abi,
            platform: payload.platform,
        },
        search_path: payload.sys_path.into_iter().map(PathBuf::from).collect(),
    })
}

/// Imports `module` inside `interpreter` and reports the file it came from;
/// `None` when the import fails or the module has no file (builtins).
///
/// # Errors
///
/// Same taxonomy as [`probe_interpreter`].
pub fn introspect_module(
    runtime: &dyn PythonRuntime,
    interpreter: &Interpreter,
    module: &str,
    timeout: Duration,
) -> Result<Option<ModuleLocation>, ConvertError> {
    let label = interpreter.to_string();
    let mut args = script_args(INTROSPECT_SCRIPT);
    args.push(module.to_string());
    let output = runtime
        .run_script(&interpreter.executable, &args, timeout)
        .map_err(|err| ConvertError::InterpreterFailed {
            interpreter: label.clone(),
            reason: format!("{err:#}"),
        })?;
    let payload: IntrospectPayload = parse_payload(&output, &label, timeout)?;
    Ok(match payload.file {
        Some(file) if payload.found && !file.is_empty() => Some(ModuleLocation {
            file: PathBuf::from(file),
            package: payload.package,
        }),
        _ => None,
    })
}

// Imported modules may print on import; the payload is the last line.
fn parse_payload<T: DeserializeOwned>(
    output: &RunOutput,
    interpreter: &str,
    timeout: Duration,
) -> Result<T, ConvertError> {
    if output.timed_out {
        return Err(ConvertError::InterpreterTimeout {
            interpreter: interpreter.to_string(),
            timeout,
        });
    }
    if output.code != 0 {
        let stderr = output.stderr.trim();
        let reason = stderr
            .lines()
            .last()
            .filter(|line| !line.is_empty())
            .map_or_else(|| format!("exit status {}", output.code), ToString::to_string);
        return Err(ConvertError::InterpreterFailed {
            interpreter: interpreter.to_string(),
            reason,
        });
    }
    let line = output
        .stdout
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or_default();
    serde_json::from_str(line).map_err(|err| ConvertError::InterpreterFailed {
        interpreter: interpreter.to_string(),
        reason: format!("invalid payload: {err}"),
    })
}
