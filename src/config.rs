use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use log::info;
use serde_derive::Deserialize;
use uuid::Uuid;

use crate::beacon::Region;

#[derive(Deserialize, Debug, Default, Clone)]
pub struct AppConfig {
    pub scan: Option<ScanConfig>,
    pub region: Option<RegionConfig>,
    pub export: Option<ExportConfig>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct ScanConfig {
    pub adapter_index: Option<usize>,
    pub ranging_interval_ms: Option<u64>,
    pub scan_on_start: Option<bool>,
}

impl ScanConfig {
    pub fn ranging_interval(&self) -> Duration {
        Duration::from_millis(self.ranging_interval_ms.unwrap_or(1000).max(100))
    }
}

/// Filter applied to ranging results. Every field left out matches any beacon.
#[derive(Deserialize, Debug, Default, Clone)]
pub struct RegionConfig {
    pub identifier: Option<String>,
    pub proximity_uuid: Option<Uuid>,
    pub major: Option<u16>,
    pub minor: Option<u16>,
}

impl RegionConfig {
    pub fn to_region(&self) -> Region {
        Region {
            identifier: self.identifier.clone().unwrap_or_else(|| "rid".to_string()),
            proximity_uuid: self.proximity_uuid,
            major: self.major,
            minor: self.minor,
        }
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct ExportConfig {
    /// Directory receiving one JSON file per configured beacon. Stdout when unset.
    pub directory: Option<PathBuf>,
}

impl AppConfig {
    /// Read the TOML file at `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            info!("{} not found, using default configuration", path.display());
            return Ok(AppConfig::default());
        }
        let contents =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        toml::de::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn scan(&self) -> ScanConfig {
        self.scan.clone().unwrap_or_default()
    }

    pub fn region(&self) -> Region {
        self.region
            .as_ref()
            .map(RegionConfig::to_region)
            .unwrap_or_default()
    }
}
