//! JSON configuration, solve requests and analysis records.

use geocalib_core::{CalibrationReport, ModelKind, Point, RansacHomographyConfig};
use geocalib_select::TemplateMatchParams;
use geocalib_viewport::{ViewportConfig, ViewportConfigError};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(thiserror::Error, Debug)]
pub enum GeocalibIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Config(#[from] ViewportConfigError),
}

/// Everything a [`CalibrationSession`](crate::CalibrationSession) can be tuned
/// with. Missing fields take their defaults, so partial files are fine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub ransac: RansacHomographyConfig,
    pub viewport: ViewportConfig,
    pub template: TemplateMatchParams,
    /// Radius in image pixels within which a click picks an existing point.
    pub pick_radius_px: f64,
    /// Bounding box the base image is downscaled into for display.
    pub display_max: [f64; 2],
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ransac: RansacHomographyConfig::default(),
            viewport: ViewportConfig::default(),
            template: TemplateMatchParams::default(),
            pick_radius_px: 5.0,
            display_max: [1280.0, 720.0],
        }
    }
}

impl SessionConfig {
    /// Load a JSON config from disk and reject values the viewport cannot
    /// work with.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, GeocalibIoError> {
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ViewportConfigError> {
        self.viewport.validate()
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), GeocalibIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// One offline solve: reference points, a target pixel, and optionally the
/// target's surveyed global position for accuracy analysis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolveRequest {
    pub reference_points: Vec<Point>,
    pub target: [f64; 2],
    #[serde(default)]
    pub known_target: Option<[f64; 2]>,
    #[serde(default)]
    pub model: ModelKind,
    /// Operator consent to an affine fit when the homography cannot be
    /// solved.
    #[serde(default)]
    pub allow_affine_fallback: bool,
    #[serde(default)]
    pub ransac: RansacHomographyConfig,
    #[serde(default)]
    pub output_dir: Option<String>,
}

impl SolveRequest {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, GeocalibIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), GeocalibIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Directory analysis records go to; `logs` unless overridden.
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("logs"))
    }
}

/// `analysis_<unix-seconds>.json`
pub fn analysis_file_name(unix_secs: u64) -> String {
    format!("analysis_{unix_secs}.json")
}

/// Write `report` as pretty JSON into `dir` (created if missing) and return
/// the file path.
pub fn write_report(
    report: &CalibrationReport,
    dir: impl AsRef<Path>,
    unix_secs: u64,
) -> Result<PathBuf, GeocalibIoError> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    let path = dir.join(analysis_file_name(unix_secs));
    fs::write(&path, report.to_json_pretty()?)?;
    Ok(path)
}

pub fn load_report(path: impl AsRef<Path>) -> Result<CalibrationReport, GeocalibIoError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}
