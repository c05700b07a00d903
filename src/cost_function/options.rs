use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Reduction settings of a [CostFunction](crate::CostFunction)
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct CostFunctionOptions {
    /// Multiplier of the weighted sum of squared residuals
    #[serde(default = "CostFunctionOptions::default_factor")]
    pub factor: f64,
    /// Reduce over points on the rayon thread pool
    #[serde(default = "CostFunctionOptions::default_parallel")]
    pub parallel: bool,
    /// Number of points processed by a single rayon task
    #[serde(default = "CostFunctionOptions::default_chunk_size")]
    pub chunk_size: usize,
}

impl CostFunctionOptions {
    pub fn new(factor: f64, parallel: bool, chunk_size: usize) -> Self {
        assert!(factor.is_finite() && factor > 0.0, "factor must be positive");
        assert!(chunk_size > 0, "chunk_size must be positive");
        Self {
            factor,
            parallel,
            chunk_size,
        }
    }

    /// Sequential reduction with default settings
    pub fn sequential() -> Self {
        Self::new(Self::default_factor(), false, Self::default_chunk_size())
    }

    #[inline]
    pub fn default_factor() -> f64 {
        0.5
    }

    #[inline]
    pub fn default_parallel() -> bool {
        true
    }

    #[inline]
    pub fn default_chunk_size() -> usize {
        1024
    }
}

impl Default for CostFunctionOptions {
    fn default() -> Self {
        Self::new(
            Self::default_factor(),
            Self::default_parallel(),
            Self::default_chunk_size(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_with_defaults() {
        let options: CostFunctionOptions = serde_json::from_str(r#"{"parallel": false}"#).unwrap();
        assert_eq!(
            options,
            CostFunctionOptions::new(0.5, false, CostFunctionOptions::default_chunk_size())
        );
    }
}
