use log::{debug, info, warn};

use crate::beacon::{Beacon, Region};
use crate::error::ScanError;
use crate::messages::{ConfigurationOutcome, EventSender, ServiceEvent, StartOutcome};
use crate::ranging::RangingService;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScanState {
    #[default]
    Idle,
    Connecting,
    Scanning,
}

/// Scan session state machine.
///
/// Every method must be called from the UI loop. The view reads the
/// projections (`start_enabled`, `beacons`, `subtitle`, ...) and never
/// mutates anything itself.
pub struct ScanSessionController<S> {
    service: S,
    region: Region,
    events: EventSender,
    state: ScanState,
    beacons: Vec<Beacon>,
    subtitle: String,
    progress_visible: bool,
    notices: Vec<String>,
    awaiting_enable: bool,
    // Set when a stop was rejected, so the remote side may still be ranging.
    stale_ranging: bool,
}

impl<S: RangingService> ScanSessionController<S> {
    pub fn new(service: S, region: Region, events: EventSender) -> Self {
        ScanSessionController {
            service,
            region,
            events,
            state: ScanState::Idle,
            beacons: Vec::new(),
            subtitle: String::new(),
            progress_visible: false,
            notices: Vec::new(),
            awaiting_enable: false,
            stale_ranging: false,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn start_enabled(&self) -> bool {
        self.state == ScanState::Idle
    }

    pub fn stop_enabled(&self) -> bool {
        !self.start_enabled()
    }

    pub fn beacons(&self) -> &[Beacon] {
        &self.beacons
    }

    pub fn subtitle(&self) -> &str {
        &self.subtitle
    }

    pub fn progress_visible(&self) -> bool {
        self.progress_visible
    }

    pub fn awaiting_enable(&self) -> bool {
        self.awaiting_enable
    }

    /// Drain the one-shot notices queued since the last call.
    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }

    pub fn select(&self, index: usize) -> Option<&Beacon> {
        self.beacons.get(index)
    }

    pub async fn request_start(&mut self) -> Result<StartOutcome, ScanError> {
        if self.state != ScanState::Idle {
            debug!("Start requested while {:?}", self.state);
            return Ok(StartOutcome::AlreadyRunning);
        }

        if !self.service.has_capability().await {
            return Err(self.fail(ScanError::CapabilityUnavailable));
        }

        if !self.service.is_capability_enabled().await {
            info!("Bluetooth is disabled, waiting for the user to enable it");
            self.awaiting_enable = true;
            return Ok(StartOutcome::AwaitingEnable);
        }

        self.connect_to_service().await?;
        Ok(StartOutcome::Connecting)
    }

    pub async fn on_external_enable_result(&mut self, granted: bool) -> Result<(), ScanError> {
        if !std::mem::take(&mut self.awaiting_enable) || self.state != ScanState::Idle {
            debug!("Ignoring enable result, no request pending");
            return Ok(());
        }

        if !granted {
            let err = self.fail(ScanError::CapabilityDenied);
            self.subtitle = err.to_string();
            return Err(err);
        }

        self.connect_to_service().await
    }

    pub async fn request_stop(&mut self) -> Result<(), ScanError> {
        self.beacons.clear();
        self.awaiting_enable = false;
        if self.state == ScanState::Idle {
            debug!("Stop requested while idle");
            return Ok(());
        }

        self.subtitle = "Scanning stopped".to_string();
        self.state = ScanState::Idle;
        self.progress_visible = false;

        match self.service.stop_scanning(&self.region).await {
            Ok(()) => {
                info!("Ranging stopped for region {}", self.region.identifier);
                Ok(())
            }
            Err(err) => {
                self.stale_ranging = true;
                Err(self.fail(ScanError::StopFailed(err.to_string())))
            }
        }
    }

    /// Apply an event posted by the ranging service.
    pub async fn handle_event(&mut self, event: ServiceEvent) -> Result<(), ScanError> {
        match event {
            ServiceEvent::ServiceReady => self.on_service_ready().await,
            ServiceEvent::ConnectFailed(reason) => {
                if self.state == ScanState::Idle {
                    debug!("Late connect failure ignored: {reason}");
                    return Ok(());
                }
                if self.state == ScanState::Scanning {
                    if let Err(err) = self.service.stop_scanning(&self.region).await {
                        debug!("Error while stopping ranging: {err}");
                        self.stale_ranging = true;
                    }
                }
                Err(self.fail(ScanError::ConnectFailed(reason)))
            }
            ServiceEvent::BeaconsDiscovered { region, beacons } => {
                debug!(
                    "{} beacon(s) discovered in region {}",
                    beacons.len(),
                    region.identifier
                );
                self.on_beacons_updated(beacons);
                Ok(())
            }
        }
    }

    pub fn on_beacons_updated(&mut self, beacons: Vec<Beacon>) {
        if self.state == ScanState::Idle {
            debug!("Discarding ranging results while idle");
            return;
        }
        self.subtitle = format!("Found beacons: {}", beacons.len());
        self.beacons = beacons;
    }

    /// Completion of the configuration step. A modified beacon refreshes the list.
    pub async fn on_configuration_result(
        &mut self,
        outcome: ConfigurationOutcome,
    ) -> Result<Option<StartOutcome>, ScanError> {
        if outcome != ConfigurationOutcome::Modified {
            return Ok(None);
        }

        if self.state == ScanState::Idle {
            return self.request_start().await.map(Some);
        }

        self.subtitle = "Scanning...".to_string();
        self.beacons.clear();
        Ok(Some(StartOutcome::AlreadyRunning))
    }

    /// Stop ranging and release the service. Failures are only logged.
    pub async fn shutdown(&mut self) {
        if self.state != ScanState::Idle || self.stale_ranging {
            if let Err(err) = self.service.stop_scanning(&self.region).await {
                debug!("Error while stopping ranging: {err}");
            }
        }
        self.service.disconnect().await;
        self.state = ScanState::Idle;
        self.beacons.clear();
        self.progress_visible = false;
        self.stale_ranging = false;
    }

    async fn connect_to_service(&mut self) -> Result<(), ScanError> {
        self.awaiting_enable = false;
        if self.stale_ranging {
            match self.service.stop_scanning(&self.region).await {
                Ok(()) => self.stale_ranging = false,
                Err(err) => warn!("Ranging from previous session may still be active: {err}"),
            }
        }

        self.subtitle = "Scanning...".to_string();
        self.beacons.clear();
        self.state = ScanState::Connecting;

        match self.service.connect(self.events.clone()).await {
            Ok(()) => {
                info!("Connecting to ranging service");
                Ok(())
            }
            Err(err) => Err(self.fail(ScanError::ConnectFailed(err.to_string()))),
        }
    }

    async fn on_service_ready(&mut self) -> Result<(), ScanError> {
        if self.state != ScanState::Connecting {
            debug!("Service ready while {:?}, ignoring", self.state);
            return Ok(());
        }

        match self.service.start_scanning(&self.region).await {
            Ok(()) => {
                info!("Ranging started for region {}", self.region.identifier);
                self.state = ScanState::Scanning;
                self.progress_visible = true;
                Ok(())
            }
            Err(err) => Err(self.fail(ScanError::ConnectFailed(err.to_string()))),
        }
    }

    fn fail(&mut self, err: ScanError) -> ScanError {
        warn!("{err}");
        self.state = ScanState::Idle;
        self.beacons.clear();
        self.progress_visible = false;
        self.notices.push(err.to_string());
        err
    }

    #[cfg(test)]
    pub(crate) fn service(&self) -> &S {
        &self.service
    }

}
