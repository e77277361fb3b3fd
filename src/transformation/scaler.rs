//! Feature scaling implementations

use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Type of scaler to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScalerType {
    /// Standard scaling (z-score normalization): (x - mean) / std
    #[default]
    Standard,
    /// Min-Max scaling: (x - min) / (max - min)
    MinMax,
    /// Robust scaling using median and IQR
    Robust,
    /// Max absolute scaling: x / max(|x|)
    MaxAbs,
    /// No scaling
    None,
}

/// Fitted parameters for one numeric column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    /// mean, min, median or 0
    pub center: f64,
    /// std, range, IQR or max |x|; never zero
    pub scale: f64,
}

impl ScalerParams {
    pub const IDENTITY: ScalerParams = ScalerParams {
        center: 0.0,
        scale: 1.0,
    };

    /// Fit on imputed training values
    pub fn fit(scaler_type: ScalerType, values: &[f64]) -> Self {
        let ca: Float64Chunked = values.iter().copied().map(Some).collect();

        let (center, scale) = match scaler_type {
            ScalerType::Standard => (ca.mean().unwrap_or(0.0), ca.std(1).unwrap_or(1.0)),
            ScalerType::MinMax => {
                let min = ca.min().unwrap_or(0.0);
                let max = ca.max().unwrap_or(1.0);
                (min, max - min)
            }
            ScalerType::Robust => {
                let median = ca.median().unwrap_or(0.0);
                let q1 = ca
                    .quantile(0.25, QuantileMethod::Linear)
                    .ok()
                    .flatten()
                    .unwrap_or(0.0);
                let q3 = ca
                    .quantile(0.75, QuantileMethod::Linear)
                    .ok()
                    .flatten()
                    .unwrap_or(1.0);
                (median, q3 - q1)
            }
            ScalerType::MaxAbs => {
                let max_abs = values.iter().fold(0.0f64, |a, b| a.max(b.abs()));
                (0.0, max_abs)
            }
            ScalerType::None => return Self::IDENTITY,
        };

        Self {
            center,
            scale: if scale == 0.0 || !scale.is_finite() { 1.0 } else { scale },
        }
    }

    #[inline]
    pub fn apply(&self, v: f64) -> f64 {
        (v - self.center) / self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATA: [f64; 5] = [1.0, 2.0, 3.0, 4.0, 5.0];

    #[test]
    fn test_standard_scaler() {
        let p = ScalerParams::fit(ScalerType::Standard, &DATA);
        let scaled: Vec<f64> = DATA.iter().map(|&v| p.apply(v)).collect();
        let mean: f64 = scaled.iter().sum::<f64>() / scaled.len() as f64;
        assert!(mean.abs() < 1e-10);
    }

    #[test]
    fn test_minmax_scaler() {
        let p = ScalerParams::fit(ScalerType::MinMax, &DATA);
        assert!((p.apply(1.0) - 0.0).abs() < 1e-10);
        assert!((p.apply(5.0) - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_robust_and_maxabs() {
        let p = ScalerParams::fit(ScalerType::Robust, &DATA);
        assert!((p.center - 3.0).abs() < 1e-10);
        assert!((p.scale - 2.0).abs() < 1e-10);

        let p = ScalerParams::fit(ScalerType::MaxAbs, &[-4.0, 2.0]);
        assert!((p.apply(-4.0) + 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_zero_spread_uses_unit_scale() {
        let p = ScalerParams::fit(ScalerType::Standard, &[7.0, 7.0, 7.0]);
        assert_eq!(p.scale, 1.0);
        assert_eq!(p.apply(7.0), 0.0);
    }
}
