//! Run request options and validation.

use crate::errors::UsageError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Slide formats the pipeline accepts.
pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["svs", "ndpi", "tiff", "tif", "mrxs"];

/// Default output root when the caller does not provide one.
pub const DEFAULT_OUTPUT_ROOT: &str = "slideqc_runs";

/// QC model magnification preset.
///
/// Each preset maps to the microns-per-pixel the segmentation model was
/// trained at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelResolution {
    /// 5x magnification, MPP 2.0.
    X5,
    /// 7x magnification, MPP 1.5.
    X7,
    /// 10x magnification, MPP 1.0.
    X10,
}

impl Default for ModelResolution {
    fn default() -> Self {
        Self::X10
    }
}

impl ModelResolution {
    /// The microns-per-pixel value passed to the QC stage.
    #[must_use]
    pub fn mpp(&self) -> f64 {
        match self {
            Self::X5 => 2.0,
            Self::X7 => 1.5,
            Self::X10 => 1.0,
        }
    }
}

impl fmt::Display for ModelResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X5 => write!(f, "5x"),
            Self::X7 => write!(f, "7x"),
            Self::X10 => write!(f, "10x"),
        }
    }
}

impl FromStr for ModelResolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "5x" | "5" => Ok(Self::X5),
            "7x" | "7" => Ok(Self::X7),
            "10x" | "10" => Ok(Self::X10),
            other => Err(format!("unknown magnification '{other}' (expected 5x, 7x or 10x)")),
        }
    }
}

/// A run request: one slide plus execution options.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Path to the input slide.
    pub slide: PathBuf,
    /// Root directory under which run directories are created.
    pub output_root: PathBuf,
    /// QC model magnification preset.
    pub resolution: ModelResolution,
    /// Emit GeoJSON geometry annotations from the QC stage.
    pub geojson: bool,
    /// Skip the report stage.
    pub skip_report: bool,
    /// Skip the overlay stage.
    pub skip_overlay: bool,
    /// Optional per-stage timeout.
    pub stage_timeout: Option<Duration>,
}

impl RunOptions {
    /// Creates options for a slide with all defaults.
    #[must_use]
    pub fn new(slide: impl Into<PathBuf>) -> Self {
        Self {
            slide: slide.into(),
            output_root: PathBuf::from(DEFAULT_OUTPUT_ROOT),
            resolution: ModelResolution::default(),
            geojson: false,
            skip_report: false,
            skip_overlay: false,
            stage_timeout: None,
        }
    }

    /// Sets the output root.
    #[must_use]
    pub fn with_output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.output_root = root.into();
        self
    }

    /// Sets the magnification preset.
    #[must_use]
    pub fn with_resolution(mut self, resolution: ModelResolution) -> Self {
        self.resolution = resolution;
        self
    }

    /// Enables GeoJSON annotation output.
    #[must_use]
    pub fn with_geojson(mut self) -> Self {
        self.geojson = true;
        self
    }

    /// Skips the report stage.
    #[must_use]
    pub fn skip_report(mut self) -> Self {
        self.skip_report = true;
        self
    }

    /// Skips the overlay stage.
    #[must_use]
    pub fn skip_overlay(mut self) -> Self {
        self.skip_overlay = true;
        self
    }

    /// Sets a per-stage timeout.
    #[must_use]
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = Some(timeout);
        self
    }

    /// Validates the request before any side effect.
    ///
    /// # Errors
    ///
    /// Returns a [`UsageError`] if the slide is missing or has an unsupported
    /// extension.
    pub fn validate(&self) -> Result<(), UsageError> {
        if !self.slide.is_file() {
            return Err(UsageError::SlideNotFound(self.slide.clone()));
        }
        if !has_supported_extension(&self.slide) {
            return Err(UsageError::UnsupportedFormat(
                self.slide.clone(),
                SUPPORTED_EXTENSIONS.join(", "),
            ));
        }
        Ok(())
    }
}

fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|s| s.eq_ignore_ascii_case(ext))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_mpp() {
        assert!((ModelResolution::X5.mpp() - 2.0).abs() < f64::EPSILON);
        assert!((ModelResolution::X7.mpp() - 1.5).abs() < f64::EPSILON);
        assert!((ModelResolution::X10.mpp() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_resolution_parse() {
        assert_eq!("5x".parse::<ModelResolution>().unwrap(), ModelResolution::X5);
        assert_eq!("10X".parse::<ModelResolution>().unwrap(), ModelResolution::X10);
        assert_eq!("7".parse::<ModelResolution>().unwrap(), ModelResolution::X7);
        assert!("40x".parse::<ModelResolution>().is_err());
    }

    #[test]
    fn test_resolution_display_round_trip() {
        for res in [ModelResolution::X5, ModelResolution::X7, ModelResolution::X10] {
            assert_eq!(res.to_string().parse::<ModelResolution>().unwrap(), res);
        }
    }

    #[test]
    fn test_validate_missing_slide() {
        let options = RunOptions::new("/nonexistent/sample.svs");
        assert!(matches!(
            options.validate(),
            Err(UsageError::SlideNotFound(_))
        ));
    }

    #[test]
    fn test_validate_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let slide = dir.path().join("scan.jpeg");
        std::fs::write(&slide, b"not a slide").unwrap();

        let options = RunOptions::new(&slide);
        assert!(matches!(
            options.validate(),
            Err(UsageError::UnsupportedFormat(_, _))
        ));
    }

    #[test]
    fn test_validate_accepts_supported_formats() {
        let dir = tempfile::tempdir().unwrap();
        for ext in SUPPORTED_EXTENSIONS {
            let slide = dir.path().join(format!("sample.{ext}"));
            std::fs::write(&slide, b"slide bytes").unwrap();
            assert!(RunOptions::new(&slide).validate().is_ok());
        }
    }
}
