//! Calibration record persistence.
//!
//! The record is stored as pretty-printed JSON so an operator can inspect
//! or hand-edit it on the device. A save writes a sibling `.tmp` file,
//! syncs it and renames it over the record, so an interrupted save leaves
//! the previous record intact.

use super::{CalibrationPoint, MapperError};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use turret_common::types::CameraParams;

/// On-disk calibration record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationFile {
    pub offset_pan_deg: f32,
    pub offset_tilt_deg: f32,
    pub scale_pan: f32,
    pub scale_tilt: f32,
    /// Unix epoch seconds of the last save.
    #[serde(default)]
    pub timestamp: u64,
    pub camera: CameraParams,
    /// Samples the calibration was derived from. Absent in older records.
    #[serde(default)]
    pub points: Vec<CalibrationPoint>,
}

/// Reads and writes the calibration record at one path.
#[derive(Debug, Clone)]
pub struct CalibrationStore {
    path: PathBuf,
}

impl CalibrationStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the record, stamping the current time. Creates parent directories.
    pub fn save(&self, record: &CalibrationFile) -> Result<(), MapperError> {
        debug!("Saving calibration to {:?}", self.path);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| MapperError::Io(format!("failed to create directory: {e}")))?;
        }

        let mut record = record.clone();
        record.timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let tmp = self.temp_path();
        if let Err(e) = write_synced(&tmp, &record).and_then(|()| {
            fs::rename(&tmp, &self.path)
                .map_err(|e| MapperError::Io(format!("failed to replace calibration file: {e}")))
        }) {
            if let Err(rm) = fs::remove_file(&tmp)
                && rm.kind() != std::io::ErrorKind::NotFound
            {
                warn!("Stale calibration temp file {:?} not removed: {rm}", tmp);
            }
            return Err(e);
        }

        info!(
            "Calibration saved to {:?}: offset=({:.2}, {:.2}) scale=({:.3}, {:.3})",
            self.path, record.offset_pan_deg, record.offset_tilt_deg, record.scale_pan, record.scale_tilt
        );
        Ok(())
    }

    /// Read the record. `Ok(None)` when the file does not exist.
    pub fn load(&self) -> Result<Option<CalibrationFile>, MapperError> {
        debug!("Loading calibration from {:?}", self.path);

        if !self.path.exists() {
            return Ok(None);
        }

        let file = File::open(&self.path)
            .map_err(|e| MapperError::Io(format!("failed to open calibration file: {e}")))?;
        let record: CalibrationFile = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| MapperError::Parse(e.to_string()))?;
        Ok(Some(record))
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

fn write_synced(path: &Path, record: &CalibrationFile) -> Result<(), MapperError> {
    let file = File::create(path)
        .map_err(|e| MapperError::Io(format!("failed to create calibration file: {e}")))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, record)
        .map_err(|e| MapperError::Io(format!("failed to write calibration: {e}")))?;
    writer
        .flush()
        .map_err(|e| MapperError::Io(format!("failed to flush calibration: {e}")))?;
    writer
        .get_ref()
        .sync_all()
        .map_err(|e| MapperError::Io(format!("failed to sync calibration: {e}")))
}
