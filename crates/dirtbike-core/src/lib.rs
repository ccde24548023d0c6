#![deny(clippy::all)]

mod alternate;
mod assemble;
mod config;
mod convert;
mod dpkg;
mod effects;
mod error;
mod locate;
mod mapper;
mod metadata;
mod outcome;
mod process;
mod python;

#[cfg(test)]
mod test_support;

pub use crate::alternate::resolve_alternate;
pub use crate::assemble::{assemble_wheel, generator, WheelReport};
pub use crate::config::{
    Config, EnvSnapshot, GlobalOptions, DEFAULT_ADMINDIR, DEFAULT_MAX_CAPTURE_BYTES,
};
pub use crate::convert::{convert, execute, ConvertContext, ConvertRequest, Conversion};
pub use crate::dpkg::DpkgDatabase;
pub use crate::effects::{Effects, FileSystem, PackageDatabase, PythonRuntime, SystemEffects};
pub use crate::error::{codes, ConvertError};
pub use crate::locate::locate;
pub use crate::mapper::{map_files, MappedFile};
pub use crate::metadata::resolve_metadata;
pub use crate::outcome::{CommandStatus, ExecutionOutcome};
pub use crate::process::{run_command, RunOutput};
pub use crate::python::{
    introspect_module, probe_interpreter, ModuleLocation, ALTERNATE_INTERPRETERS,
};

pub const DIRTBIKE_VERSION: &str = env!("CARGO_PKG_VERSION");
