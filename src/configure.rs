use std::fs;
use std::path::PathBuf;

use anyhow::Context as _;
use log::info;
use serde_derive::Serialize;

use crate::beacon::{Beacon, Proximity};
use crate::messages::ConfigurationOutcome;

/// The step a selected beacon is handed to.
pub trait Configurator {
    fn configure(&mut self, beacon: &Beacon) -> anyhow::Result<ConfigurationOutcome>;
}

#[derive(Debug, Serialize)]
struct BeaconRecord<'a> {
    #[serde(flatten)]
    beacon: &'a Beacon,
    distance: Option<f64>,
    proximity: Proximity,
}

/// Writes the selected beacon as JSON, to a directory or to stdout.
#[derive(Debug, Default, Clone)]
pub struct JsonExport {
    directory: Option<PathBuf>,
}

impl JsonExport {
    pub fn new(directory: Option<PathBuf>) -> Self {
        JsonExport { directory }
    }

    fn file_name(beacon: &Beacon) -> String {
        format!(
            "{}-{}-{}.json",
            beacon.proximity_uuid, beacon.major, beacon.minor
        )
    }
}

fn to_json(beacon: &Beacon) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&BeaconRecord {
        beacon,
        distance: beacon.accuracy(),
        proximity: beacon.proximity(),
    })
}

impl Configurator for JsonExport {
    fn configure(&mut self, beacon: &Beacon) -> anyhow::Result<ConfigurationOutcome> {
        let json = to_json(beacon)?;
        match &self.directory {
            Some(directory) => {
                fs::create_dir_all(directory)
                    .with_context(|| format!("creating {}", directory.display()))?;
                let path = directory.join(Self::file_name(beacon));
                fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
                info!("Exported beacon {} to {}", beacon.address, path.display());
            }
            None => println!("{json}"),
        }
        Ok(ConfigurationOutcome::Unchanged)
    }
}
