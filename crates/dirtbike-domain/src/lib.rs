#![deny(clippy::all)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

pub mod metadata;
pub mod naming;
pub mod package;
pub mod wheel;

pub use metadata::{CoreMetadata, DistributionIdentity, IdentitySource, CARRIED_HEADERS};
pub use naming::{
    canonical_name, import_name, normalize_version, wheel_component, DebianConvention,
    NamingConvention,
};
pub use package::{
    find_import_root, footprint, is_metadata_dir_name, is_script_candidate, metadata_dir_of,
    ImportRoot, Interpreter, InterpreterTags, OsPackage, ResolvedPackage,
};
pub use wheel::{
    archive_path, is_binary_artifact, record_line, render_wheel_file, wheel_filename,
    ArchiveEntry, WheelTag, WHEEL_VERSION,
};
