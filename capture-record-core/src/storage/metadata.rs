use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::error::RecordError;
use crate::models::summary::RecordingSummary;

/// `{recording_path}.summary.json`.
pub fn summary_path(recording_path: &Path) -> PathBuf {
    let mut name = OsString::from(recording_path.as_os_str());
    name.push(".summary.json");
    PathBuf::from(name)
}

/// Write a recording summary as a JSON sidecar next to `recording_path`.
pub fn write_summary(summary: &RecordingSummary, recording_path: &Path) -> Result<PathBuf, RecordError> {
    let path = summary_path(recording_path);
    let json = serde_json::to_string_pretty(summary)
        .map_err(|e| RecordError::Storage(format!("failed to serialize summary: {}", e)))?;
    fs::write(&path, json)
        .map_err(|e| RecordError::Storage(format!("failed to write summary: {}", e)))?;
    Ok(path)
}

/// Read the summary sidecar of `recording_path`.
pub fn read_summary(recording_path: &Path) -> Result<RecordingSummary, RecordError> {
    let json = fs::read_to_string(summary_path(recording_path))
        .map_err(|e| RecordError::Storage(format!("failed to read summary: {}", e)))?;
    serde_json::from_str(&json)
        .map_err(|e| RecordError::Storage(format!("failed to parse summary: {}", e)))
}

/// SHA-256 hex digest of a file, streamed.
pub fn sha256_file(path: &Path) -> Result<String, RecordError> {
    let mut file = File::open(path)
        .map_err(|e| RecordError::Storage(format!("failed to open {} for checksum: {}", path.display(), e)))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)
        .map_err(|e| RecordError::Storage(format!("failed to read {} for checksum: {}", path.display(), e)))?;
    Ok(hex_encode(&hasher.finalize()))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
