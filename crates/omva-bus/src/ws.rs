//! WebSocket transport to the host's message bus.

use crate::error::BusError;
use crate::message::BusMessage;
use crate::registry::{Subscription, SubscriptionRegistry};
use crate::MessageBus;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Frames queued for sending while the connection is down or busy.
const OUTGOING_CAPACITY: usize = 256;

type BusStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A reconnecting bus client.
///
/// A background task owns the socket. Emitted messages are queued and
/// written in order; received frames are decoded and handed to the
/// subscription registry. When the socket drops the task reconnects after
/// `reconnect_delay`, keeping queued frames.
pub struct WsBus {
    outgoing: mpsc::Sender<String>,
    registry: SubscriptionRegistry,
    connected: watch::Receiver<bool>,
    task: JoinHandle<()>,
}

enum Disconnect {
    /// Every `WsBus` handle is gone.
    Shutdown,
    /// The peer closed or the socket failed.
    Lost,
}

impl WsBus {
    /// Starts connecting to `url` in the background and returns immediately.
    pub fn connect(url: impl Into<String>, reconnect_delay: Duration) -> Self {
        let url = url.into();
        let registry = SubscriptionRegistry::new();
        let (outgoing_tx, outgoing_rx) = mpsc::channel(OUTGOING_CAPACITY);
        let (connected_tx, connected_rx) = watch::channel(false);

        let task = tokio::spawn(run_connection(
            url,
            reconnect_delay,
            outgoing_rx,
            registry.clone(),
            connected_tx,
        ));

        Self {
            outgoing: outgoing_tx,
            registry,
            connected: connected_rx,
            task,
        }
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// Resolves once the socket is up.
    pub async fn wait_connected(&self) -> Result<(), BusError> {
        let mut connected = self.connected.clone();
        connected
            .wait_for(|up| *up)
            .await
            .map(|_| ())
            .map_err(|_| BusError::Closed)
    }
}

impl Drop for WsBus {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl MessageBus for WsBus {
    fn emit(&self, message: BusMessage) -> Result<(), BusError> {
        let frame = message.to_json()?;
        self.outgoing.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => BusError::Backpressure(message.msg_type),
            mpsc::error::TrySendError::Closed(_) => BusError::Closed,
        })
    }

    fn subscribe(&self, names: &[&str]) -> Subscription {
        self.registry.subscribe(names)
    }
}

async fn run_connection(
    url: String,
    reconnect_delay: Duration,
    mut outgoing: mpsc::Receiver<String>,
    registry: SubscriptionRegistry,
    connected: watch::Sender<bool>,
) {
    loop {
        match connect_async(url.as_str()).await {
            Ok((stream, _)) => {
                tracing::info!(%url, "connected to message bus");
                let _ = connected.send(true);
                let end = pump(stream, &mut outgoing, &registry).await;
                let _ = connected.send(false);
                match end {
                    Disconnect::Shutdown => {
                        tracing::info!(%url, "message bus client shut down");
                        return;
                    }
                    Disconnect::Lost => tracing::warn!(%url, "message bus connection lost"),
                }
            }
            Err(e) => tracing::warn!(%url, "failed to connect to message bus: {}", e),
        }

        if outgoing.is_closed() {
            return;
        }
        tokio::time::sleep(reconnect_delay).await;
    }
}

async fn pump(
    stream: BusStream,
    outgoing: &mut mpsc::Receiver<String>,
    registry: &SubscriptionRegistry,
) -> Disconnect {
    let (mut sink, mut source) = stream.split();

    loop {
        tokio::select! {
            frame = outgoing.recv() => match frame {
                Some(text) => {
                    if let Err(e) = sink.send(Message::text(text)).await {
                        tracing::warn!("failed to write bus frame: {}", e);
                        return Disconnect::Lost;
                    }
                }
                None => {
                    let _ = sink.close().await;
                    return Disconnect::Shutdown;
                }
            },
            incoming = source.next() => match incoming {
                Some(Ok(Message::Text(text))) => handle_frame(text.as_str(), registry),
                Some(Ok(Message::Close(_))) | None => return Disconnect::Lost,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!("failed to read bus frame: {}", e);
                    return Disconnect::Lost;
                }
            },
        }
    }
}

fn handle_frame(text: &str, registry: &SubscriptionRegistry) {
    match BusMessage::from_json(text) {
        Ok(message) => {
            registry.dispatch(&message);
        }
        Err(e) => tracing::debug!("ignoring malformed bus frame: {}", e),
    }
}
