// ── Session task ──
//
// One spawned task owns the socket for the lifetime of a session: it
// issues the subscriptions, forwards outbound frames, sends heart-beats and
// routes every inbound MESSAGE, all from a single `select!` loop. Frames on
// one subscription are therefore handled in transport order.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use vigil_api::websocket::{StompReader, StompWriter, error_message};
use vigil_api::{Command, Error, Frame};

use crate::router::SubscriptionRouter;

const DISCONNECT_RECEIPT: &str = "vigil-disconnect";

/// How a session task ended.
#[derive(Debug)]
pub(super) enum SessionEnd {
    /// Cancelled by the manager; the socket was closed gracefully.
    Closed,
    /// The transport or the broker ended the session.
    Lost(Error),
}

pub(super) struct SessionIo {
    pub writer: StompWriter,
    pub reader: StompReader,
    pub outbound: mpsc::UnboundedReceiver<Frame>,
}

pub(super) async fn run_session(
    io: SessionIo,
    router: Arc<SubscriptionRouter>,
    heartbeat: Duration,
    cancel: CancellationToken,
) -> SessionEnd {
    let SessionIo {
        mut writer,
        mut reader,
        mut outbound,
    } = io;

    for sub in router.subscriptions() {
        if let Err(e) = writer
            .send(&Frame::subscribe(&sub.id, &sub.destination))
            .await
        {
            writer.close().await;
            return SessionEnd::Lost(e);
        }
    }
    tracing::debug!(count = router.subscriptions().len(), "subscriptions issued");

    let mut ticker = heartbeat_interval(heartbeat);

    let end = loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break SessionEnd::Closed,
            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    break SessionEnd::Closed;
                };
                if let Err(e) = writer.send(&frame).await {
                    break SessionEnd::Lost(e);
                }
            }
            () = tick(ticker.as_mut()) => {
                if let Err(e) = writer.heartbeat().await {
                    break SessionEnd::Lost(e);
                }
            }
            next = reader.next_frame() => match next {
                Some(Ok(frame)) => {
                    if let Some(end) = handle_frame(&router, &frame) {
                        break end;
                    }
                }
                Some(Err(e)) => break SessionEnd::Lost(e),
                None => {
                    break SessionEnd::Lost(Error::WebSocketClosed {
                        code: 1006,
                        reason: "stream ended".into(),
                    });
                }
            },
        }
    };

    if matches!(end, SessionEnd::Closed) {
        if let Err(e) = writer.send(&Frame::disconnect(DISCONNECT_RECEIPT)).await {
            tracing::trace!(error = %e, "DISCONNECT not sent");
        }
    }
    writer.close().await;
    end
}

fn handle_frame(router: &SubscriptionRouter, frame: &Frame) -> Option<SessionEnd> {
    match frame.command {
        Command::Message => {
            if router.route_frame(frame).is_none() {
                tracing::debug!(
                    destination = frame.destination().unwrap_or("?"),
                    "message for unknown subscription"
                );
            }
            None
        }
        Command::Error => {
            let message = error_message(frame);
            tracing::warn!(message = %message, "broker sent ERROR");
            Some(SessionEnd::Lost(Error::Stomp { message }))
        }
        other => {
            tracing::trace!(command = %other, "frame ignored");
            None
        }
    }
}

fn heartbeat_interval(period: Duration) -> Option<Interval> {
    if period.is_zero() {
        return None;
    }
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Some(interval)
}

async fn tick(interval: Option<&mut Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
