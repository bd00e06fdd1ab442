//! SOM hyperparameters and the configuration record handed to the trainer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Result, SomflowError};
use crate::models::workspace::WorkspaceLayout;

/// A decimal literal kept in its `.`-separated text form.
///
/// The trainer parses these values literally, so a locale form such as
/// `0,5` is normalized to `0.5` on construction and never re-formatted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DecimalText(String);

impl DecimalText {
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = raw.trim().replace(',', ".");
        if normalized.is_empty() {
            return Err(SomflowError::ParameterInvalid {
                key: "decimal".to_string(),
                reason: "value is empty".to_string(),
            });
        }
        match normalized.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(Self(normalized)),
            _ => Err(SomflowError::ParameterInvalid {
                key: "decimal".to_string(),
                reason: format!("'{}' is not a decimal number", raw),
            }),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn value(&self) -> f64 {
        // Validated in `parse`
        self.0.parse().unwrap_or(f64::NAN)
    }
}

impl FromStr for DecimalText {
    type Err = SomflowError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DecimalText {
    type Error = SomflowError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<DecimalText> for String {
    fn from(value: DecimalText) -> Self {
        value.0
    }
}

impl fmt::Display for DecimalText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Declares a lowercase keyword enum as understood by the SOM trainer.
macro_rules! keyword_enum {
    ($(#[$meta:meta])* $name:ident, $key:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = SomflowError;

            fn from_str(s: &str) -> Result<Self> {
                match s.trim().to_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    other => Err(SomflowError::ParameterInvalid {
                        key: $key.to_string(),
                        reason: format!(
                            "'{}' is not one of: {}",
                            other,
                            [$($text),+].join(", ")
                        ),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

keyword_enum!(
    /// Whether the map edges wrap around
    MapTopology, "map_topology" { Planar => "planar", Toroid => "toroid" }
);

keyword_enum!(
    /// Cell arrangement of the SOM grid
    GridShape, "grid_shape" { Rectangular => "rectangular", Hexagonal => "hexagonal" }
);

keyword_enum!(
    NeighborhoodFunction, "neighborhood" { Gaussian => "gaussian", Bubble => "bubble" }
);

keyword_enum!(
    /// How the prototype vectors are seeded
    Initialization, "initialization" { Random => "random", Pca => "pca" }
);

keyword_enum!(
    /// Cooling schedule for the radius and the learning rate
    Cooling, "cooling" { Linear => "linear", Exponential => "exponential" }
);

/// k-means cluster counts applied to the trained map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterCounts {
    /// Number of initial centroids
    pub initial: u32,
    pub min: u32,
    pub max: u32,
}

/// SOM training hyperparameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SomParameters {
    /// Number of cells in x-direction
    pub grid_width: u32,

    /// Number of cells in y-direction
    pub grid_height: u32,

    pub epochs: u32,
    pub topology: MapTopology,
    pub grid_shape: GridShape,
    pub neighborhood: NeighborhoodFunction,

    /// Standard deviation coefficient of the gaussian neighborhood
    pub neighborhood_coeff: DecimalText,

    pub initialization: Initialization,

    /// Initial neighborhood radius (0 lets the trainer choose)
    pub radius_initial: u32,
    pub radius_final: u32,
    pub radius_cooling: Cooling,

    pub rate_initial: DecimalText,
    pub rate_final: DecimalText,
    pub rate_cooling: Cooling,

    pub clusters: ClusterCounts,
}

impl SomParameters {
    /// Check ranges the trainer cannot recover from
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("grid_width", self.grid_width),
            ("grid_height", self.grid_height),
            ("epochs", self.epochs),
            ("min_clusters", self.clusters.min),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(SomflowError::ParameterInvalid {
                    key: key.to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }
        }

        if self.clusters.min > self.clusters.max {
            return Err(SomflowError::ParameterInvalid {
                key: "max_clusters".to_string(),
                reason: format!(
                    "maximum cluster count ({}) is below the minimum ({})",
                    self.clusters.max, self.clusters.min
                ),
            });
        }

        Ok(())
    }
}

/// File references written into the `som_files` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SomFiles {
    /// Input training set (lrn)
    pub training_set: PathBuf,
    pub somspace_export: PathBuf,
    pub geospace_export: PathBuf,
    pub output_dir: PathBuf,
}

/// Everything the SOM trainer reads from `SOM.xml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SomConfiguration {
    pub files: SomFiles,
    pub parameters: SomParameters,
}

impl SomConfiguration {
    /// Bind the hyperparameters to the well-known paths of a workspace
    pub fn for_layout(layout: &WorkspaceLayout, parameters: SomParameters) -> Self {
        Self {
            files: SomFiles {
                training_set: layout.training_set(),
                somspace_export: layout.somspace_export(),
                geospace_export: layout.geospace_export(),
                output_dir: layout.output.clone(),
            },
            parameters,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_comma_normalized() {
        let coeff = DecimalText::parse("0,5").unwrap();
        assert_eq!(coeff.as_str(), "0.5");
        assert_eq!(coeff, DecimalText::parse("0.5").unwrap());
        assert!((coeff.value() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_decimal_rejects_garbage() {
        assert!(DecimalText::parse("").is_err());
        assert!(DecimalText::parse("abc").is_err());
        assert!(DecimalText::parse("1,2,3").is_err());
        assert!(DecimalText::parse("inf").is_err());
    }

    #[test]
    fn test_keyword_parsing() {
        assert_eq!("toroid".parse::<MapTopology>().unwrap(), MapTopology::Toroid);
        assert_eq!("Hexagonal".parse::<GridShape>().unwrap(), GridShape::Hexagonal);
        assert_eq!("PCA".parse::<Initialization>().unwrap(), Initialization::Pca);
        assert_eq!(Cooling::Exponential.to_string(), "exponential");
        assert!("sphere".parse::<MapTopology>().is_err());
    }

    #[test]
    fn test_cluster_range_validation() {
        let mut params = crate::models::request::tests::sample_parameters();
        assert!(params.validate().is_ok());

        params.clusters.min = 30;
        params.clusters.max = 25;
        assert!(params.validate().is_err());

        params.clusters.min = 2;
        params.grid_width = 0;
        assert!(params.validate().is_err());
    }
}
