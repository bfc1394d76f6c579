use tokio::sync::mpsc;

use crate::beacon::{Beacon, Region};

/// Pushed by the ranging service from its own tasks, consumed by the UI loop.
#[derive(Clone, Debug)]
pub enum ServiceEvent {
    ServiceReady,
    ConnectFailed(String),
    BeaconsDiscovered { region: Region, beacons: Vec<Beacon> },
}

pub type EventSender = mpsc::UnboundedSender<ServiceEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ServiceEvent>;

pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Result code handed back by the configuration step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigurationOutcome {
    Modified,
    Unchanged,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartOutcome {
    Connecting,
    AwaitingEnable,
    AlreadyRunning,
}
