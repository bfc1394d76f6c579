use std::cmp::Reverse;
use std::time::Duration;

use btleplug::api::{
    Central as _, CentralEvent, CentralState, Manager as _, Peripheral as _, ScanFilter,
};
use btleplug::platform::{Adapter, Manager};
use futures::StreamExt as _;
use log::{debug, info, warn};
use mac_address::MacAddress;
use tokio::task::JoinHandle;

use crate::beacon::{Beacon, Region};
use crate::error::{ServiceError, ServiceResult};
use crate::messages::{EventSender, ServiceEvent};
use crate::ranging::RangingService;

/// Ranging over a host Bluetooth adapter through btleplug.
pub struct BtleRanging {
    manager: Manager,
    adapter_index: usize,
    ranging_interval: Duration,
    adapter: Option<Adapter>,
    events: Option<EventSender>,
    watcher: Option<JoinHandle<()>>,
    ranging: Option<JoinHandle<()>>,
}

impl BtleRanging {
    pub async fn new(adapter_index: usize, ranging_interval: Duration) -> ServiceResult<Self> {
        Ok(BtleRanging {
            manager: Manager::new().await?,
            adapter_index,
            ranging_interval,
            adapter: None,
            events: None,
            watcher: None,
            ranging: None,
        })
    }

    async fn find_adapter(&self) -> ServiceResult<Adapter> {
        let adapters = self.manager.adapters().await?;
        adapters
            .into_iter()
            .nth(self.adapter_index)
            .ok_or(ServiceError::NoAdapter)
    }

    fn stop_ranging_task(&mut self) {
        if let Some(handle) = self.ranging.take() {
            handle.abort();
        }
    }
}

async fn watch_adapter(adapter: Adapter, events: EventSender) {
    let mut stream = match adapter.events().await {
        Ok(stream) => stream,
        Err(err) => {
            let _ = events.send(ServiceEvent::ConnectFailed(err.to_string()));
            return;
        }
    };

    if events.send(ServiceEvent::ServiceReady).is_err() {
        return;
    }

    while let Some(event) = stream.next().await {
        match event {
            CentralEvent::StateUpdate(CentralState::PoweredOff) => {
                warn!("Bluetooth adapter powered off");
                if events
                    .send(ServiceEvent::ConnectFailed(
                        "Bluetooth adapter powered off".to_string(),
                    ))
                    .is_err()
                {
                    break;
                }
            }
            CentralEvent::DeviceDiscovered(id) => debug!("DeviceDiscovered: {:?}", id),
            _ => {}
        }
    }
    debug!("Adapter event stream closed");
}

async fn range(adapter: &Adapter, region: &Region) -> ServiceResult<Vec<Beacon>> {
    let mut beacons = Vec::new();
    for peripheral in adapter.peripherals().await? {
        let Some(properties) = peripheral.properties().await? else {
            continue;
        };
        let address = MacAddress::new(properties.address.into_inner());
        let beacon = Beacon::from_advertisement(
            address,
            properties.local_name,
            &properties.manufacturer_data,
            properties.rssi,
        );
        if let Some(beacon) = beacon.filter(|b| region.matches(b)) {
            beacons.push(beacon);
        }
    }
    beacons.sort_by_key(|b| Reverse(b.rssi.unwrap_or(i16::MIN)));
    Ok(beacons)
}

async fn ranging_loop(adapter: Adapter, region: Region, interval: Duration, events: EventSender) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let beacons = match range(&adapter, &region).await {
            Ok(beacons) => beacons,
            Err(err) => {
                warn!("Error ranging beacons: {err}");
                continue;
            }
        };
        let event = ServiceEvent::BeaconsDiscovered {
            region: region.clone(),
            beacons,
        };
        if events.send(event).is_err() {
            debug!("Event receiver closed, ranging ends");
            break;
        }
    }
}

impl RangingService for BtleRanging {
    async fn has_capability(&self) -> bool {
        match self.manager.adapters().await {
            Ok(adapters) => adapters.len() > self.adapter_index,
            Err(err) => {
                warn!("Error listing Bluetooth adapters: {err}");
                false
            }
        }
    }

    async fn is_capability_enabled(&self) -> bool {
        let adapter = match self.find_adapter().await {
            Ok(adapter) => adapter,
            Err(_) => return false,
        };
        // Some backends cannot report power state; only a known-off adapter counts as disabled.
        match adapter.adapter_state().await {
            Ok(state) => !matches!(state, CentralState::PoweredOff),
            Err(err) => {
                debug!("Adapter state unavailable: {err}");
                true
            }
        }
    }

    async fn connect(&mut self, events: EventSender) -> ServiceResult<()> {
        let adapter = self.find_adapter().await?;
        if let Ok(info) = adapter.adapter_info().await {
            info!("Using Bluetooth adapter {info}");
        }

        if let Some(handle) = self.watcher.take() {
            handle.abort();
        }
        self.watcher = Some(tokio::spawn(watch_adapter(adapter.clone(), events.clone())));
        self.adapter = Some(adapter);
        self.events = Some(events);
        Ok(())
    }

    async fn start_scanning(&mut self, region: &Region) -> ServiceResult<()> {
        let (Some(adapter), Some(events)) = (self.adapter.clone(), self.events.clone()) else {
            return Err(ServiceError::NotConnected);
        };

        adapter.start_scan(ScanFilter::default()).await?;
        self.stop_ranging_task();
        self.ranging = Some(tokio::spawn(ranging_loop(
            adapter,
            region.clone(),
            self.ranging_interval,
            events,
        )));
        Ok(())
    }

    async fn stop_scanning(&mut self, _region: &Region) -> ServiceResult<()> {
        self.stop_ranging_task();
        let adapter = self.adapter.as_ref().ok_or(ServiceError::NotConnected)?;
        adapter.stop_scan().await?;
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.stop_ranging_task();
        if let Some(handle) = self.watcher.take() {
            handle.abort();
        }
        self.adapter = None;
        self.events = None;
    }
}

impl Drop for BtleRanging {
    fn drop(&mut self) {
        self.stop_ranging_task();
        if let Some(handle) = self.watcher.take() {
            handle.abort();
        }
    }
}
