use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use serde_json::json;
use tokio::{
    net::TcpStream,
    sync::{mpsc::UnboundedSender, Mutex},
    task::JoinHandle,
    time,
};
use tokio_tungstenite::{connect_async, tungstenite::protocol, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::prelude::*;
use crate::ws::message_types::{parse_frame, Message};

type Writer = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, protocol::Message>;
type Reader = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;
type SharedWriter = Arc<Mutex<Option<Writer>>>;

const PING_INTERVAL: Duration = Duration::from_secs(15);
const INITIAL_RECONNECT_DELAY: Duration = Duration::from_secs(1);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(60);

/// Push channels the bot subscribes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subscription {
    Ticker { contract_id: String },
    OrderUpdates,
}

impl Subscription {
    fn channel(&self) -> String {
        match self {
            Subscription::Ticker { contract_id } => format!("ticker.{contract_id}"),
            Subscription::OrderUpdates => "trade-event".to_string(),
        }
    }
}

fn next_backoff(delay: Duration) -> Duration {
    (delay * 2).min(MAX_RECONNECT_DELAY)
}

/// Owns one WebSocket endpoint for the life of the run. A background task
/// reads frames onto the shared feed channel and, when the connection
/// drops, reconnects with exponential backoff and replays every
/// subscription, so the feed never goes silently dead.
pub struct WsManager {
    writer: SharedWriter,
    stop_flag: Arc<AtomicBool>,
    subscriptions: Arc<Mutex<Vec<Subscription>>>,
    runner_handle: JoinHandle<()>,
}

impl WsManager {
    /// Connect and start the background task. The first connection failing
    /// is an error; later drops are handled by reconnecting.
    pub async fn new(url: String, sender: UnboundedSender<Arc<Message>>) -> Result<Self> {
        let (stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| Error::Websocket(e.to_string()))?;
        info!(url = %url, "websocket connected");

        let (first_writer, first_reader) = stream.split();
        let writer: SharedWriter = Arc::new(Mutex::new(Some(first_writer)));
        let stop_flag = Arc::new(AtomicBool::new(false));
        let subscriptions = Arc::new(Mutex::new(Vec::new()));

        let runner_handle = tokio::spawn(run_connection(
            url,
            sender,
            Arc::clone(&writer),
            Arc::clone(&stop_flag),
            Arc::clone(&subscriptions),
            first_reader,
        ));

        Ok(Self {
            writer,
            stop_flag,
            subscriptions,
            runner_handle,
        })
    }

    /// Register a channel. It is sent now and replayed on every reconnect.
    pub async fn subscribe(&self, subscription: Subscription) -> Result<()> {
        self.subscriptions.lock().await.push(subscription.clone());
        send_subscribe(&self.writer, &subscription).await
    }

    pub async fn shutdown(&self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(writer) = self.writer.lock().await.as_mut() {
            let _ = writer.send(protocol::Message::Close(None)).await;
        }
        self.runner_handle.abort();
    }
}

async fn send_subscribe(writer: &SharedWriter, subscription: &Subscription) -> Result<()> {
    let frame = json!({
        "type": "subscribe",
        "channel": subscription.channel(),
    })
    .to_string();
    debug!(channel = %subscription.channel(), "subscribing");
    match writer.lock().await.as_mut() {
        Some(w) => w
            .send(protocol::Message::Text(frame.into()))
            .await
            .map_err(|e| Error::WsSend(e.to_string())),
        None => Err(Error::WsSend("not connected".to_string())),
    }
}

enum ReadOutcome {
    /// Socket died; reconnect.
    ConnectionLost,
    /// Shutdown requested or the feed channel is gone; stop for good.
    Stopped,
}

async fn run_connection(
    url: String,
    sender: UnboundedSender<Arc<Message>>,
    writer: SharedWriter,
    stop_flag: Arc<AtomicBool>,
    subscriptions: Arc<Mutex<Vec<Subscription>>>,
    first_reader: Reader,
) {
    let mut reader = Some(first_reader);
    let mut delay = INITIAL_RECONNECT_DELAY;

    loop {
        let current = match reader.take() {
            Some(r) => r,
            None => match connect_async(url.as_str()).await {
                Ok((stream, _)) => {
                    let (w, r) = stream.split();
                    *writer.lock().await = Some(w);
                    info!(url = %url, "websocket reconnected");
                    let subs = subscriptions.lock().await.clone();
                    for sub in &subs {
                        if let Err(e) = send_subscribe(&writer, sub).await {
                            warn!(error = %e, channel = %sub.channel(), "resubscribe failed");
                        }
                    }
                    delay = INITIAL_RECONNECT_DELAY;
                    r
                }
                Err(e) => {
                    error!(
                        url = %url,
                        error = %e,
                        retry_in_secs = delay.as_secs(),
                        "websocket reconnect failed, backing off"
                    );
                    time::sleep(delay).await;
                    delay = next_backoff(delay);
                    if stop_flag.load(Ordering::Relaxed) || sender.is_closed() {
                        break;
                    }
                    continue;
                }
            },
        };

        let outcome = read_frames(current, &sender, &writer, &stop_flag).await;
        *writer.lock().await = None;
        match outcome {
            ReadOutcome::Stopped => break,
            ReadOutcome::ConnectionLost => {
                if stop_flag.load(Ordering::Relaxed) || sender.is_closed() {
                    break;
                }
                error!(url = %url, "websocket connection lost, reconnecting");
            }
        }
    }
    debug!(url = %url, "websocket task exiting");
}

/// Pump one live connection: decode frames onto the feed channel, answer
/// pings, and keep the connection warm with our own pings.
async fn read_frames(
    mut reader: Reader,
    sender: &UnboundedSender<Arc<Message>>,
    writer: &SharedWriter,
    stop_flag: &AtomicBool,
) -> ReadOutcome {
    let mut ping = time::interval(PING_INTERVAL);
    ping.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            frame = reader.next() => {
                if stop_flag.load(Ordering::Relaxed) {
                    return ReadOutcome::Stopped;
                }
                match frame {
                    Some(Ok(protocol::Message::Text(text))) => match parse_frame(&text) {
                        Ok(messages) => {
                            for message in messages {
                                if sender.send(Arc::new(message)).is_err() {
                                    debug!("feed channel closed, stopping reader");
                                    return ReadOutcome::Stopped;
                                }
                            }
                        }
                        Err(e) => warn!(error = %e, "failed to decode ws frame"),
                    },
                    Some(Ok(protocol::Message::Ping(payload))) => {
                        if let Some(w) = writer.lock().await.as_mut() {
                            if let Err(e) = w.send(protocol::Message::Pong(payload)).await {
                                warn!(error = %e, "failed to answer ws ping");
                            }
                        }
                    }
                    Some(Ok(protocol::Message::Close(_))) => {
                        info!("websocket closed by server");
                        return ReadOutcome::ConnectionLost;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!(error = %e, "websocket read error");
                        return ReadOutcome::ConnectionLost;
                    }
                    None => return ReadOutcome::ConnectionLost,
                }
            }
            _ = ping.tick() => {
                if stop_flag.load(Ordering::Relaxed) {
                    return ReadOutcome::Stopped;
                }
                let frame = json!({"type": "ping"}).to_string();
                match writer.lock().await.as_mut() {
                    Some(w) => {
                        if w.send(protocol::Message::Text(frame.into())).await.is_err() {
                            return ReadOutcome::ConnectionLost;
                        }
                    }
                    None => return ReadOutcome::ConnectionLost,
                }
            }
        }
    }
}
