use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tracing::info;

use crate::error::KiraError;

/// Files at or below this size are treated as missing (empty dumps, bare headers).
pub const MIN_VALID_FILE_BYTES: u64 = 9;

pub fn validate_file(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.len() > MIN_VALID_FILE_BYTES)
        .unwrap_or(false)
}

/// Creates `outdir`, or accepts an existing one only when `force` is set.
pub fn prepare_output_dir(outdir: &Path, force: bool) -> Result<(), KiraError> {
    if outdir.is_dir() {
        if !force {
            return Err(KiraError::OutputExists(outdir.to_path_buf()));
        }
        return Ok(());
    }
    info!("creating download directory {}", outdir.display());
    fs::create_dir_all(outdir)
        .map_err(|err| KiraError::Filesystem(format!("create {}: {err}", outdir.display())))
}

/// Deletes `path`; a file that is already gone is not an error.
pub fn remove_stale_file(path: &Path) -> Result<(), KiraError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(KiraError::Filesystem(format!(
            "remove {}: {err}",
            path.display()
        ))),
    }
}

pub fn write_bytes_atomic(path: &Path, content: &[u8]) -> Result<(), KiraError> {
    let parent = path
        .parent()
        .ok_or_else(|| KiraError::Filesystem("invalid destination path".to_string()))?;
    fs::create_dir_all(parent).map_err(|err| KiraError::Filesystem(err.to_string()))?;
    let mut temp = tempfile::Builder::new()
        .prefix("kira-af-file")
        .tempfile_in(parent)
        .map_err(|err| KiraError::Filesystem(err.to_string()))?;
    temp.write_all(content)
        .map_err(|err| KiraError::Filesystem(err.to_string()))?;
    temp.persist(path)
        .map_err(|err| KiraError::Filesystem(err.to_string()))?;
    Ok(())
}
