//! Periodic refresh of the available port list.
//!
//! The refresher shares no state with the session machinery; it only emits
//! [`AirEvent::SerialPortsUpdated`]. Enumeration failures are logged and
//! retried on the next tick.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::events::{AirEvent, EventDispatcher};
use crate::traits::PortBackend;

/// Spawn the refresh task.
///
/// The first refresh happens one `period` after the call. The task runs
/// until `cancel` is signalled.
pub fn spawn_port_refresh(
    backend: Arc<dyn PortBackend>,
    events: EventDispatcher,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Port refresh cancelled, shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    match backend.available_ports().await {
                        Ok(ports) => {
                            debug!("Refreshed port list: {:?}", ports);
                            events.send(AirEvent::SerialPortsUpdated { ports });
                        }
                        Err(e) => warn!("Port refresh failed: {}", e),
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBackend, MockPort};

    #[tokio::test(start_paused = true)]
    async fn test_refresh_emits_port_list() {
        let backend = MockBackend::new().with_port("COM1", MockPort::new());
        let events = EventDispatcher::new(8);
        let mut rx = events.subscribe();
        let cancel = CancellationToken::new();

        let handle = spawn_port_refresh(
            Arc::new(backend),
            events,
            Duration::from_secs(5),
            cancel.clone(),
        );

        let event = rx.recv().await.unwrap();
        assert_eq!(
            event,
            AirEvent::SerialPortsUpdated {
                ports: vec!["COM1".to_string()]
            }
        );

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_survives_enumeration_failure() {
        let backend = MockBackend::new().with_port("COM1", MockPort::new());
        backend.set_list_error(Some("platform failure".to_string()));
        let events = EventDispatcher::new(8);
        let mut rx = events.subscribe();
        let cancel = CancellationToken::new();

        let handle = spawn_port_refresh(
            Arc::new(backend.clone()),
            events,
            Duration::from_secs(5),
            cancel.clone(),
        );

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(rx.try_recv().is_err());

        backend.set_list_error(None);
        let event = rx.recv().await.unwrap();
        assert_eq!(event.name(), "serial_ports_updated");

        cancel.cancel();
        handle.await.unwrap();
    }
}
