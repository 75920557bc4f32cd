//! Bus-to-browser fan-out
//!
//! Each configured channel is subscribed once; every envelope arriving on
//! it is wrapped as a [`BusFrame`] and broadcast to all open sockets. The
//! handler only serializes and enqueues, so it never blocks the
//! subscriber.

use crate::frames::BusFrame;
use crate::state::AppState;
use chrono::Utc;
use relay_core::BusError;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Subscribe the forwarding handlers for every configured channel.
pub async fn start_forwarding(state: &AppState) -> Result<(), BusError> {
    for channel in &state.config.forward_channels {
        let hub = Arc::clone(&state.hub);
        let channel_name = channel.clone();

        state
            .bus
            .subscribe(
                channel,
                Arc::new(move |envelope| {
                    let frame = BusFrame {
                        channel: channel_name.clone(),
                        data: envelope,
                        timestamp: Utc::now(),
                    };
                    match serde_json::to_string(&frame) {
                        Ok(text) => {
                            let delivered = hub.broadcast_text(&text);
                            debug!(
                                channel = %frame.channel,
                                delivered,
                                "forwarded bus envelope"
                            );
                        }
                        Err(e) => error!(channel = %frame.channel, %e, "frame serialization failed"),
                    }
                }),
            )
            .await?;
        info!(%channel, "forwarding channel to WebSocket clients");
    }
    Ok(())
}
