use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ViewportConfigError {
    #[error("scale_min must be positive and finite, got {0}")]
    InvalidMinScale(f64),
    #[error("scale_max ({max}) must not be below scale_min ({min})")]
    InvertedRange { min: f64, max: f64 },
    #[error("scale_step must be positive and finite, got {0}")]
    InvalidStep(f64),
}

/// Zoom limits and wheel step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub scale_min: f64,
    pub scale_max: f64,
    /// Relative scale change per wheel step.
    pub scale_step: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            scale_min: 1.0,
            scale_max: 20.0,
            scale_step: 0.05,
        }
    }
}

impl ViewportConfig {
    pub fn validate(&self) -> Result<(), ViewportConfigError> {
        if !(self.scale_min.is_finite() && self.scale_min > 0.0) {
            return Err(ViewportConfigError::InvalidMinScale(self.scale_min));
        }
        if !(self.scale_max >= self.scale_min) {
            return Err(ViewportConfigError::InvertedRange {
                min: self.scale_min,
                max: self.scale_max,
            });
        }
        if !(self.scale_step.is_finite() && self.scale_step > 0.0) {
            return Err(ViewportConfigError::InvalidStep(self.scale_step));
        }
        Ok(())
    }
}
