//! Registration configuration.
//!
//! All sections deserialize with defaults, so a JSON file only needs the keys
//! it changes:
//!
//! ```json
//! { "cluster": { "threshold": 25.0 }, "correspondence": "nearest_centroid" }
//! ```

use std::path::Path;

use crate::cluster::ClusterConfig;
use crate::correspondence::CorrespondenceMethod;
use crate::solver::{DetectionParams, IcpConfig};

/// How the coarse stage is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationMode {
    /// Cluster, correspond, fit a coarse rigid transform, then refine with ICP.
    #[default]
    Clustered,
    /// Skip clustering and the coarse fit; run ICP on the raw sets from identity.
    Direct,
}

/// Top-level configuration of a registration run.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    pub mode: RegistrationMode,
    pub cluster: ClusterConfig,
    pub correspondence: CorrespondenceMethod,
    pub detection: DetectionParams,
    pub icp: IcpConfig,
}

impl RegistrationConfig {
    /// Load a configuration from a JSON file; missing keys keep defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        self.cluster.validate()?;
        self.detection.validate()?;
        self.icp.validate()?;
        Ok(())
    }
}
