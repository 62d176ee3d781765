use crate::error::{ProjectionError, Result};
use crate::focus::NeighborhoodSize;
use crate::projection::{focus_projection, ProjectionMethod};
use crate::sample::Sample;
use crate::selection::Proportion;
use ndarray::{Array2, ArrayView3};
use serde::{Deserialize, Serialize};

/// Parameters of the pixel-wise focus projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FocusProjectionConfig {
    pub proportion: Proportion,
    pub neighborhood_size: NeighborhoodSize,
    pub method: ProjectionMethod,
}

impl Default for FocusProjectionConfig {
    fn default() -> Self {
        FocusProjectionConfig {
            proportion: Proportion::Fraction(0.75),
            neighborhood_size: NeighborhoodSize::Square(7),
            method: ProjectionMethod::Median,
        }
    }
}

impl FocusProjectionConfig {
    pub fn validate(&self) -> Result<()> {
        self.neighborhood_size.dims()?;
        self.proportion.n_slices(1)?;
        Ok(())
    }

    /// Runs [`focus_projection`] with these parameters.
    pub fn project<T: Sample>(&self, volume: &ArrayView3<T>) -> Result<Array2<T>> {
        self.validate()?;
        focus_projection(volume, self.proportion, self.neighborhood_size, self.method)
    }
}

/// Parameters of the block-wise focal plane estimation and reassembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FocalPlaneConfig {
    /// Edge of the square blocks, must divide both spatial dimensions.
    pub block_size_xy: usize,
    /// Half width of the global depth interval around the focal plane.
    pub window: usize,
    /// Depth window of the per-block maximum projection; 0 copies one slice.
    pub reassembly_window: usize,
    /// Fits wider than this are discarded.
    pub threshold_fwhm: f64,
    /// Symmetric clipping factor for the global aggregation.
    pub sigma_clip: f64,
    pub max_fit_iterations: usize,
    /// Estimate blocks on the rayon pool.
    pub parallel: bool,
}

impl Default for FocalPlaneConfig {
    fn default() -> Self {
        FocalPlaneConfig {
            block_size_xy: 256,
            window: 10,
            reassembly_window: 0,
            threshold_fwhm: 20.0,
            sigma_clip: 3.0,
            max_fit_iterations: 200,
            parallel: true,
        }
    }
}

impl FocalPlaneConfig {
    /// Rejects values that cannot drive an estimation. Whether the block size
    /// divides the volume is checked once the volume is known.
    pub fn validate(&self) -> Result<()> {
        if self.block_size_xy == 0 {
            return Err(ProjectionError::InvalidConfig(
                "block_size_xy must be positive".to_string(),
            ));
        }
        if self.threshold_fwhm.is_nan() || self.threshold_fwhm <= 0.0 {
            return Err(ProjectionError::InvalidConfig(format!(
                "threshold_fwhm must be positive, got {}",
                self.threshold_fwhm
            )));
        }
        if !self.sigma_clip.is_finite() || self.sigma_clip <= 0.0 {
            return Err(ProjectionError::InvalidConfig(format!(
                "sigma_clip must be positive and finite, got {}",
                self.sigma_clip
            )));
        }
        if self.max_fit_iterations == 0 {
            return Err(ProjectionError::InvalidConfig(
                "max_fit_iterations must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_documents_fill_defaults() {
        let config: FocalPlaneConfig =
            serde_json::from_str(r#"{"block_size_xy": 128, "parallel": false}"#).unwrap();
        assert_eq!(config.block_size_xy, 128);
        assert!(!config.parallel);
        assert_eq!(config.window, 10);
        assert_eq!(config.threshold_fwhm, 20.0);

        let config: FocusProjectionConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, FocusProjectionConfig::default());
    }

    #[test]
    fn untagged_parameters() {
        let config: FocusProjectionConfig = serde_json::from_str(
            r#"{"proportion": 3, "neighborhood_size": [5, 9], "method": "max"}"#,
        )
        .unwrap();
        assert_eq!(config.proportion, Proportion::Count(3));
        assert_eq!(config.neighborhood_size, NeighborhoodSize::Rect(5, 9));
        assert_eq!(config.method, ProjectionMethod::Max);

        let config: FocusProjectionConfig =
            serde_json::from_str(r#"{"proportion": 0.5, "neighborhood_size": 3}"#).unwrap();
        assert_eq!(config.proportion, Proportion::Fraction(0.5));
        assert_eq!(config.neighborhood_size, NeighborhoodSize::Square(3));

        assert!(serde_json::from_str::<FocusProjectionConfig>(r#"{"method": "mean"}"#).is_err());
    }

    #[test]
    fn validation() {
        assert!(FocalPlaneConfig::default().validate().is_ok());
        assert!(FocusProjectionConfig::default().validate().is_ok());

        let config = FocalPlaneConfig {
            threshold_fwhm: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ProjectionError::InvalidConfig(_))));

        let config = FocalPlaneConfig {
            block_size_xy: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = FocusProjectionConfig {
            proportion: Proportion::Fraction(1.5),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ProjectionError::InvalidProportion(1.5)));
    }
}
