use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use dirtbike_domain::{
    record_line, render_wheel_file, wheel_filename, ArchiveEntry, DistributionIdentity,
    InterpreterTags, WheelTag,
};
use serde::Serialize;
use sha2::{Digest, Sha256};
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::effects::FileSystem;
use crate::error::ConvertError;
use crate::mapper::MappedFile;

/// The published archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WheelReport {
    pub path: PathBuf,
    pub filename: String,
    pub tag: String,
    pub entries: Vec<ArchiveEntry>,
    pub size_bytes: u64,
    pub sha256: String,
}

#[must_use]
pub fn generator() -> String {
    format!("dirtbike ({})", env!("CARGO_PKG_VERSION"))
}

pub(crate) fn record_digest(bytes: &[u8]) -> String {
    format!("sha256={}", URL_SAFE_NO_PAD.encode(Sha256::digest(bytes)))
}

/// Writes `<destination>/<name>-<version>-<tag>.whl`.
///
/// Payload entries are written in `files` order, followed by `METADATA`,
/// `WHEEL` and a stored `RECORD`. Entries carry the zip epoch timestamp, so
/// an unchanged installation produces a byte-identical archive. The archive
/// is built in a temporary file inside `destination` and renamed into place;
/// on any failure nothing appears at the final path.
///
/// # Errors
///
/// [`ConvertError::WriteTimeout`] once `timeout` elapses,
/// [`ConvertError::EncodingError`] for zip encoding failures and
/// [`ConvertError::WriteFailed`] for I/O failures.
pub fn assemble_wheel(
    fs: &dyn FileSystem,
    identity: &DistributionIdentity,
    files: &[MappedFile],
    tags: &InterpreterTags,
    destination: &Path,
    timeout: Duration,
) -> Result<WheelReport, ConvertError> {
    let deadline = Instant::now() + timeout;
    let tag = WheelTag::select(files.iter().map(|file| file.archive_path.as_str()), tags);
    let filename = wheel_filename(identity, &tag);
    let target = destination.join(&filename);
    let overdue = || {
        (Instant::now() >= deadline).then(|| ConvertError::WriteTimeout {
            path: target.clone(),
            timeout,
        })
    };

    fs.create_dir_all(destination)
        .map_err(|err| ConvertError::write(destination, format!("{err:#}")))?;
    let mut temp = tempfile::Builder::new()
        .prefix(".dirtbike-")
        .suffix(".whl.part")
        .tempfile_in(destination)
        .map_err(|err| ConvertError::write(destination, err))?;

    let stamped = FileOptions::default().last_modified_time(DateTime::default());
    let deflated = stamped.compression_method(CompressionMethod::Deflated);
    let zip_error = |path: &str, err: zip::result::ZipError| ConvertError::EncodingError {
        path: PathBuf::from(path),
        reason: err.to_string(),
    };

    let mut entries = Vec::with_capacity(files.len());
    {
        let mut zip = ZipWriter::new(temp.as_file_mut());
        for file in files {
            if let Some(err) = overdue() {
                return Err(err);
            }
            let bytes = fs
                .read(&file.source_path)
                .map_err(|err| ConvertError::write(&file.source_path, format!("{err:#}")))?;
            let mode = if file.executable { 0o755 } else { 0o644 };
            zip.start_file(file.archive_path.as_str(), deflated.unix_permissions(mode))
                .map_err(|err| zip_error(file.archive_path.as_str(), err))?;
            zip.write_all(&bytes)
                .map_err(|err| ConvertError::write(&target, err))?;
            entries.push(ArchiveEntry {
                archive_path: file.archive_path.clone(),
                source_path: file.source_path.clone(),
                size_bytes: bytes.len() as u64,
                digest: record_digest(&bytes),
            });
        }

        let dist_info = identity.dist_info_dir();
        let metadata_path = format!("{dist_info}/METADATA");
        let wheel_path = format!("{dist_info}/WHEEL");
        let record_path = format!("{dist_info}/RECORD");
        let metadata = identity.render_metadata();
        let wheel = render_wheel_file(&generator(), &tag);

        let mut record: Vec<String> = entries.iter().map(ArchiveEntry::record_line).collect();
        for (path, contents) in [(&metadata_path, &metadata), (&wheel_path, &wheel)] {
            zip.start_file(path.as_str(), deflated.unix_permissions(0o644))
                .map_err(|err| zip_error(path.as_str(), err))?;
            zip.write_all(contents.as_bytes())
                .map_err(|err| ConvertError::write(&target, err))?;
            record.push(record_line(
                path,
                Some((&record_digest(contents.as_bytes()), contents.len() as u64)),
            ));
        }
        record.push(record_line(&record_path, None));
        let mut record = record.join("\n");
        record.push('\n');

        let stored = stamped
            .compression_method(CompressionMethod::Stored)
            .unix_permissions(0o644);
        zip.start_file(record_path.as_str(), stored)
            .map_err(|err| zip_error(record_path.as_str(), err))?;
        zip.write_all(record.as_bytes())
            .map_err(|err| ConvertError::write(&target, err))?;
        zip.finish().map_err(|err| zip_error(record_path.as_str(), err))?;
    }

    temp.as_file()
        .sync_all()
        .map_err(|err| ConvertError::write(&target, err))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(temp.path(), std::fs::Permissions::from_mode(0o644))
            .map_err(|err| ConvertError::write(&target, err))?;
    }
    let written = fs
        .read(temp.path())
        .map_err(|err| ConvertError::write(&target, format!("{err:#}")))?;
    if let Some(err) = overdue() {
        return Err(err);
    }
    temp.persist(&target)
        .map_err(|err| ConvertError::write(&target, err.error))?;

    tracing::info!(
        path = %target.display(),
        tag = %tag,
        entries = entries.len(),
        "wrote wheel"
    );
    Ok(WheelReport {
        path: target,
        filename,
        tag: tag.to_string(),
        entries,
        size_bytes: written.len() as u64,
        sha256: hex::encode(Sha256::digest(&written)),
    })
}
