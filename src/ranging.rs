use crate::beacon::Region;
use crate::error::ServiceResult;
use crate::messages::EventSender;

/// Source of beacon ranging results.
///
/// Implementations must never call back into the controller. Readiness,
/// asynchronous failures and ranging results are posted on the `EventSender`
/// handed to `connect`, and the UI loop feeds them to the controller.
#[allow(async_fn_in_trait)]
pub trait RangingService {
    /// Whether the host has any BLE hardware at all.
    async fn has_capability(&self) -> bool;

    async fn is_capability_enabled(&self) -> bool;

    /// Bind to the service. `ServiceEvent::ServiceReady` follows once it can range.
    async fn connect(&mut self, events: EventSender) -> ServiceResult<()>;

    async fn start_scanning(&mut self, region: &Region) -> ServiceResult<()>;

    async fn stop_scanning(&mut self, region: &Region) -> ServiceResult<()>;

    async fn disconnect(&mut self);
}
