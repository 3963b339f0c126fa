//! Push subscription for stage-status events, with graceful degradation to
//! polling when no socket endpoint is configured.

use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_util::sync::CancellationToken;

use super::event::StageEvent;

/// Receiver for normalized stage events. Implemented by the analysis
/// controller; test code can drive it directly.
pub trait StageSink: Send + Sync {
    fn stage_event(&self, event: StageEvent);
}

struct ChannelHandle {
    photo_id: String,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

/// WebSocket subscription to per-photo status updates.
///
/// The channel is purely an optimization: delivery is best-effort and the
/// polling path alone must be able to reach a terminal state. Connect
/// failures are logged and swallowed.
pub struct StatusChannel {
    endpoint: Option<String>,
    active: Mutex<Option<ChannelHandle>>,
}

impl StatusChannel {
    pub fn new(endpoint: Option<String>) -> Self {
        Self {
            endpoint,
            active: Mutex::new(None),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some()
    }

    /// The photo id of the active subscription, if any.
    pub fn current_subscription(&self) -> Option<String> {
        self.lock_active()
            .as_ref()
            .map(|handle| handle.photo_id.clone())
    }

    /// Opens a subscription for the photo. Idempotent: connecting again for
    /// the same photo keeps the existing subscription; a different photo
    /// first disconnects the old one. Returns false when no endpoint is
    /// configured.
    pub fn connect(&self, photo_id: &str, sink: Arc<dyn StageSink>) -> bool {
        let endpoint = match &self.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => {
                debug!("No status socket endpoint configured; relying on polling");
                return false;
            }
        };

        {
            let guard = self.lock_active();
            if let Some(handle) = guard.as_ref() {
                if handle.photo_id == photo_id && !handle.task.is_finished() {
                    return true;
                }
            }
        }
        self.disconnect();

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(run_subscription(
            endpoint,
            photo_id.to_string(),
            sink,
            shutdown.clone(),
        ));

        *self.lock_active() = Some(ChannelHandle {
            photo_id: photo_id.to_string(),
            shutdown,
            task,
        });
        true
    }

    /// Closes the active subscription. Safe to call when none is open, and
    /// calling twice is a no-op the second time.
    pub fn disconnect(&self) {
        if let Some(handle) = self.lock_active().take() {
            debug!("Disconnecting status channel for photo {}", handle.photo_id);
            handle.shutdown.cancel();
            handle.task.abort();
        }
    }

    fn lock_active(&self) -> std::sync::MutexGuard<'_, Option<ChannelHandle>> {
        match self.active.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Status channel lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

async fn run_subscription(
    endpoint: String,
    photo_id: String,
    sink: Arc<dyn StageSink>,
    shutdown: CancellationToken,
) {
    let (stream, _) = match connect_async(endpoint.as_str()).await {
        Ok(connected) => connected,
        Err(e) => {
            warn!(
                "Status socket connect failed for photo {}: {}; relying on polling",
                photo_id, e
            );
            return;
        }
    };
    let (mut write, mut read) = stream.split();

    let subscribe = serde_json::json!({ "action": "subscribe", "photo_id": photo_id }).to_string();
    if let Err(e) = write.send(Message::Text(subscribe)).await {
        warn!("Status socket subscribe failed for photo {}: {}", photo_id, e);
        return;
    }
    info!("Subscribed to status updates for photo {}", photo_id);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                break;
            }
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => match StageEvent::parse(&text) {
                    Some(event) => sink.stage_event(event),
                    None => warn!(
                        "Dropping unparseable status frame for photo {}: {}",
                        photo_id, text
                    ),
                },
                Some(Ok(Message::Close(_))) | None => {
                    debug!("Status socket closed for photo {}", photo_id);
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Status socket read error for photo {}: {}", photo_id, e);
                    break;
                }
            }
        }
    }
}
