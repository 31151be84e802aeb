//! Live listing sockets shared by the admin collections.
//!
//! Each socket owns one subscription. Updates pass through a `watch`
//! channel, so a client that reads slowly skips straight to the latest
//! listing instead of queueing every intermediate one.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures_util::SinkExt;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, warn};

use certdesk_core::subscription::Subscription;

use crate::error::AppError;

/// Subprotocol a browser offers next to its session token, since browser
/// WebSockets cannot set an `Authorization` header.
pub const BEARER_PROTOCOL: &str = "bearer";

/// A frame on a live listing socket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveFrame<T> {
    /// The full listing, newest first.
    Snapshot { items: Vec<T> },
    /// The listing could not be refreshed. The socket stays open.
    Error { error: &'static str, message: String },
}

impl<T> From<Result<Vec<T>, AppError>> for LiveFrame<T> {
    fn from(update: Result<Vec<T>, AppError>) -> Self {
        match update {
            Ok(items) => Self::Snapshot { items },
            Err(err) => Self::Error {
                error: err.kind(),
                message: err.message(),
            },
        }
    }
}

/// Subscription callback that renders each update and keeps only the
/// newest frame in `tx`.
pub fn publish<T, E>(
    tx: watch::Sender<Option<String>>,
) -> impl FnMut(Result<Vec<T>, E>) + Send + 'static
where
    T: Serialize + 'static,
    E: Into<AppError> + 'static,
{
    move |update| {
        let frame = LiveFrame::from(update.map_err(Into::into));
        match serde_json::to_string(&frame) {
            Ok(text) => {
                tx.send_replace(Some(text));
            }
            Err(err) => warn!(%err, "live frame could not be encoded"),
        }
    }
}

/// Upgrade to a socket that streams the listing started by `subscribe`.
pub fn upgrade<S>(ws: WebSocketUpgrade, listing: &'static str, subscribe: S) -> Response
where
    S: FnOnce(watch::Sender<Option<String>>) -> Subscription + Send + 'static,
{
    ws.protocols([BEARER_PROTOCOL])
        .on_upgrade(move |socket| async move {
            let (tx, rx) = watch::channel(None);
            let subscription = subscribe(tx);
            forward(socket, rx, subscription, listing).await;
        })
}

/// Forward frames until either side goes away, then release the
/// subscription and close the socket.
async fn forward(
    mut socket: WebSocket,
    mut rx: watch::Receiver<Option<String>>,
    subscription: Subscription,
    listing: &'static str,
) {
    debug!(listing, "live listing opened");

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let Some(text) = rx.borrow_and_update().clone() else { continue };
                if socket.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    subscription.unsubscribe();
    // Sends our close frame, or flushes the reply to the client's.
    let _ = socket.close().await;
    debug!(listing, "live listing closed");
}
