use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use futures_util::future::BoxFuture;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{FutureExt, SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::correlator::Correlator;
use crate::error::{ObsError, Result};
use crate::models::*;
use crate::protocol::{self, Identify, Incoming, ObsEvent, RPC_VERSION};
use crate::requests::*;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

pub type EventHandler = Arc<dyn Fn(ObsEvent) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// One logical connection to OBS-WebSocket.
///
/// Cloning is cheap and every clone talks over the same socket. Reads happen
/// on a single background task per live connection and events are handed to a
/// second task that runs the handlers, so a handler may issue requests of its
/// own. Writes go through the send lock so frames from concurrent callers
/// never interleave.
#[derive(Clone)]
pub struct ObsClient {
    inner: Arc<Inner>,
}

struct Inner {
    config: ObsConnectionConfig,
    writer: Mutex<Option<WsSink>>,
    correlator: Correlator,
    handlers: RwLock<HashMap<String, Vec<EventHandler>>>,
    connected: AtomicBool,
    reconnect: AtomicBool,
    shutdown: std::sync::Mutex<CancellationToken>,
}

enum ReadEnd {
    Shutdown,
    Lost(String),
}

impl ObsClient {
    pub fn new(config: ObsConnectionConfig) -> Self {
        let reconnect = config.reconnect;
        Self {
            inner: Arc::new(Inner {
                config,
                writer: Mutex::new(None),
                correlator: Correlator::new(),
                handlers: RwLock::new(HashMap::new()),
                connected: AtomicBool::new(false),
                reconnect: AtomicBool::new(reconnect),
                shutdown: std::sync::Mutex::new(CancellationToken::new()),
            }),
        }
    }

    pub fn config(&self) -> &ObsConnectionConfig {
        &self.inner.config
    }

    /// Dials, completes the handshake and starts the receive loop.
    ///
    /// A failed dial is returned to the caller and not retried here; only an
    /// established connection that later drops is re-dialled by the client.
    pub async fn connect(&self) -> Result<()> {
        if self.is_connected() {
            debug!("connect() called while already connected to {}", self.inner.config.url());
            return Ok(());
        }

        // Retire any loop still trying to reconnect so only one survives.
        let token = CancellationToken::new();
        std::mem::replace(&mut *self.inner.shutdown_token(), token.clone()).cancel();
        self.inner
            .reconnect
            .store(self.inner.config.reconnect, Ordering::SeqCst);

        let source = self.inner.establish().await?;
        let inner = self.inner.clone();
        tokio::spawn(async move {
            inner.receive_loop(source, token).await;
        });
        Ok(())
    }

    /// Stops reconnecting and closes the socket. Pending requests fail.
    pub async fn close(&self) -> Result<()> {
        self.inner.reconnect.store(false, Ordering::SeqCst);
        self.inner.shutdown_token().cancel();
        self.inner.connected.store(false, Ordering::SeqCst);

        if let Some(mut sink) = self.inner.writer.lock().await.take() {
            if let Err(e) = sink.close().await {
                debug!("Error while closing OBS socket: {}", e);
            }
            info!("Disconnected from OBS at {}", self.inner.config.url());
        }
        self.inner.correlator.fail_all();
        Ok(())
    }

    /// Racy snapshot: the link can drop right after this returns true.
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    pub fn pending_requests(&self) -> usize {
        self.inner.correlator.pending_count()
    }

    /// Registers a handler for an event type. Handlers for the same type run
    /// in registration order; an error or panic in one is logged and does not
    /// affect the others or the connection.
    pub fn on_event<F, Fut>(&self, event_type: &str, handler: F)
    where
        F: Fn(ObsEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let handler: EventHandler = Arc::new(move |event| handler(event).boxed());
        let mut handlers = self
            .inner
            .handlers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        handlers
            .entry(event_type.to_string())
            .or_default()
            .push(handler);
        debug!("Registered OBS event handler for {}", event_type);
    }

    /// Sends a raw request and waits for its response data.
    pub async fn request(&self, request_type: &str, request_data: Option<Value>) -> Result<Value> {
        if !self.is_connected() {
            return Err(ObsError::NotConnected);
        }

        let correlator = &self.inner.correlator;
        let (request_id, rx) = correlator.register();

        // The receive loop flips `connected` before failing waiters, so a
        // waiter registered after that sweep is caught here.
        if !self.is_connected() {
            correlator.cancel(&request_id);
            return Err(ObsError::NotConnected);
        }

        let text = match protocol::encode_request(request_type, &request_id, request_data) {
            Ok(text) => text,
            Err(e) => {
                correlator.cancel(&request_id);
                return Err(e);
            }
        };
        if let Err(e) = self.inner.send_text(text).await {
            correlator.cancel(&request_id);
            return Err(e);
        }
        debug!("Sent {} as {}", request_type, request_id);

        let outcome = match self.inner.config.request_timeout {
            Some(limit) => match timeout(limit, rx).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    correlator.cancel(&request_id);
                    warn!("{} ({}) got no response within {:?}", request_type, request_id, limit);
                    return Err(ObsError::Timeout {
                        request_type: request_type.to_string(),
                        after: limit,
                    });
                }
            },
            None => rx.await,
        };

        let response = outcome.map_err(|_| ObsError::ConnectionClosed)??;
        response.into_result()
    }

    /// Sends a typed request and decodes its response.
    pub async fn call<R: ObsRequest>(&self, request: &R) -> Result<R::Response> {
        let data = serde_json::to_value(request)?;
        let response = self.request(R::REQUEST_TYPE, Some(data)).await?;
        serde_json::from_value(response).map_err(|e| {
            ObsError::Protocol(format!("unexpected {} response: {}", R::REQUEST_TYPE, e))
        })
    }

    // ------------------------------------------------------------------
    // Scene items
    // ------------------------------------------------------------------

    /// Resolves a source name to its scene item id. Not cached: every call
    /// asks OBS.
    pub async fn get_scene_item_id(&self, scene_name: &str, source_name: &str) -> Result<i64> {
        let request = GetSceneItemId {
            scene_name,
            source_name,
        };
        match self.call(&request).await {
            Ok(resp) => Ok(resp.scene_item_id),
            Err(ObsError::RequestFailed { comment, .. }) => Err(ObsError::SceneItemNotFound {
                scene: scene_name.to_string(),
                source_name: source_name.to_string(),
                comment: comment.unwrap_or_else(|| "lookup failed".to_string()),
            }),
            Err(e) => Err(e),
        }
    }

    pub async fn set_source_visibility(
        &self,
        scene_name: &str,
        source_name: &str,
        visible: bool,
    ) -> Result<()> {
        let scene_item_id = self.get_scene_item_id(scene_name, source_name).await?;
        self.call(&SetSceneItemEnabled {
            scene_name,
            scene_item_id,
            scene_item_enabled: visible,
        })
        .await?;
        debug!("Set {} / {} visible={}", scene_name, source_name, visible);
        Ok(())
    }

    pub async fn set_scene_item_index(
        &self,
        scene_name: &str,
        source_name: &str,
        position: ItemPosition,
    ) -> Result<()> {
        let scene_item_id = self.get_scene_item_id(scene_name, source_name).await?;
        let scene_item_index = match position {
            ItemPosition::Bottom => 0,
            ItemPosition::Index(index) => index,
            ItemPosition::Top => {
                let items = self.get_scene_item_list(scene_name).await?;
                (items.len() as i64 - 1).max(0)
            }
        };
        self.call(&SetSceneItemIndex {
            scene_name,
            scene_item_id,
            scene_item_index,
        })
        .await?;
        Ok(())
    }

    pub async fn set_current_program_scene(&self, scene_name: &str) -> Result<()> {
        self.call(&SetCurrentProgramScene { scene_name }).await?;
        info!("Switched program scene to {}", scene_name);
        Ok(())
    }

    pub async fn get_scene_item_list(&self, scene_name: &str) -> Result<Vec<SceneItem>> {
        let resp = self.call(&GetSceneItemList { scene_name }).await?;
        Ok(resp.scene_items)
    }

    // ------------------------------------------------------------------
    // Inputs
    // ------------------------------------------------------------------

    pub async fn set_input_volume(&self, input_name: &str, volume_db: f64) -> Result<()> {
        self.call(&SetInputVolume {
            input_name,
            input_volume_db: volume_db,
        })
        .await?;
        Ok(())
    }

    pub async fn get_input_volume(&self, input_name: &str) -> Result<InputVolume> {
        let resp = self.call(&GetInputVolume { input_name }).await?;
        Ok(InputVolume {
            mul: resp.input_volume_mul,
            db: resp.input_volume_db,
        })
    }

    pub async fn set_input_settings(
        &self,
        input_name: &str,
        settings: Value,
        overlay: bool,
    ) -> Result<()> {
        self.call(&SetInputSettings {
            input_name,
            input_settings: settings,
            overlay,
        })
        .await?;
        Ok(())
    }

    /// Points a media source at one local file.
    pub async fn set_local_file(&self, input_name: &str, path: &str) -> Result<()> {
        let settings = serde_json::to_value(LocalFileSettings::new(path))?;
        self.set_input_settings(input_name, settings, true).await?;
        info!("Loaded {} into {}", path, input_name);
        Ok(())
    }

    /// Replaces a VLC source's playlist.
    pub async fn set_playlist(&self, input_name: &str, paths: Vec<String>) -> Result<()> {
        let count = paths.len();
        let settings = serde_json::to_value(VlcPlaylistSettings::new(paths))?;
        self.set_input_settings(input_name, settings, true).await?;
        info!("Loaded playlist of {} item(s) into {}", count, input_name);
        Ok(())
    }
}

impl Inner {
    fn shutdown_token(&self) -> std::sync::MutexGuard<'_, CancellationToken> {
        self.shutdown
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn establish(&self) -> Result<WsSource> {
        let url = self.config.url();
        info!("Connecting to OBS at {}", url);

        let (ws, _) = connect_async(&url)
            .await
            .map_err(|e| ObsError::ConnectionError(format!("{}: {}", url, e)))?;
        let (mut sink, mut source) = ws.split();

        let negotiated = timeout(
            self.config.handshake_timeout,
            handshake(&mut sink, &mut source, self.config.effective_password()),
        )
        .await
        .map_err(|_| ObsError::ConnectionError(format!("{}: handshake timed out", url)))??;

        *self.writer.lock().await = Some(sink);
        self.connected.store(true, Ordering::SeqCst);
        info!("Connected to OBS at {} (rpc v{})", url, negotiated);
        Ok(source)
    }

    async fn send_text(&self, text: String) -> Result<()> {
        trace!("OBS <- {}", text);
        let mut guard = self.writer.lock().await;
        let sink = guard.as_mut().ok_or(ObsError::NotConnected)?;
        sink.send(Message::Text(text.into()))
            .await
            .map_err(|e| ObsError::WebSocketError(e.to_string()))
    }

    async fn receive_loop(self: Arc<Self>, mut source: WsSource, token: CancellationToken) {
        loop {
            let (events, queue) = mpsc::unbounded_channel();
            tokio::spawn(self.clone().dispatch_events(queue));

            let end = self.read_frames(&mut source, &token, &events).await;
            drop(events);

            self.connected.store(false, Ordering::SeqCst);
            self.writer.lock().await.take();
            self.correlator.fail_all();

            match end {
                ReadEnd::Shutdown => break,
                ReadEnd::Lost(reason) => warn!("Lost connection to OBS: {}", reason),
            }

            if !self.reconnect.load(Ordering::SeqCst) {
                break;
            }
            match self.reconnect_until_established(&token).await {
                Some(fresh) => source = fresh,
                None => break,
            }
        }
        debug!("OBS receive loop for {} finished", self.config.url());
    }

    async fn read_frames(
        &self,
        source: &mut WsSource,
        token: &CancellationToken,
        events: &mpsc::UnboundedSender<ObsEvent>,
    ) -> ReadEnd {
        loop {
            let next = tokio::select! {
                _ = token.cancelled() => return ReadEnd::Shutdown,
                next = source.next() => next,
            };
            match next {
                Some(Ok(Message::Text(text))) => self.handle_text(text.as_str(), events),
                Some(Ok(Message::Close(frame))) => {
                    return ReadEnd::Lost(format!("closed by server: {:?}", frame));
                }
                Some(Ok(Message::Binary(_))) => debug!("Ignoring binary frame from OBS"),
                Some(Ok(_)) => {}
                Some(Err(e)) => return ReadEnd::Lost(e.to_string()),
                None => return ReadEnd::Lost("stream ended".to_string()),
            }
        }
    }

    async fn reconnect_until_established(&self, token: &CancellationToken) -> Option<WsSource> {
        let delay = self.config.reconnect_delay;
        loop {
            info!("Reconnecting to OBS in {:?}", delay);
            tokio::select! {
                _ = token.cancelled() => return None,
                _ = sleep(delay) => {}
            }
            if !self.reconnect.load(Ordering::SeqCst) || token.is_cancelled() {
                return None;
            }
            match self.establish().await {
                Ok(source) => {
                    info!("Reconnected to OBS");
                    return Some(source);
                }
                Err(e) => warn!("Reconnect to OBS failed: {}", e),
            }
        }
    }

    fn handle_text(&self, text: &str, events: &mpsc::UnboundedSender<ObsEvent>) {
        trace!("OBS -> {}", text);
        match protocol::decode(text) {
            Ok(Incoming::Response(response)) => {
                let id = response.request_id.clone();
                if !self.correlator.resolve(response) {
                    debug!("Response {} has no waiting caller", id);
                }
            }
            Ok(Incoming::Event(event)) => {
                if events.send(event).is_err() {
                    debug!("Event dispatcher already stopped");
                }
            }
            Ok(other) => debug!("Ignoring OBS frame {:?}", other),
            Err(e) => warn!("Undecodable frame from OBS: {}", e),
        }
    }

    /// Runs handlers for one connection's events in wire order. Ends once the
    /// read side drops its sender and the queue is drained.
    async fn dispatch_events(self: Arc<Self>, mut queue: mpsc::UnboundedReceiver<ObsEvent>) {
        while let Some(event) = queue.recv().await {
            self.dispatch_event(event).await;
        }
    }

    async fn dispatch_event(&self, event: ObsEvent) {
        let handlers = {
            let table = self
                .handlers
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            match table.get(&event.event_type) {
                Some(list) => list.clone(),
                None => return,
            }
        };

        for handler in handlers {
            let event_type = event.event_type.clone();
            // Run on its own task so a panicking handler is contained.
            match tokio::spawn(handler(event.clone())).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Handler for {} failed: {:#}", event_type, e),
                Err(join) => error!("Handler for {} panicked: {}", event_type, join),
            }
        }
    }
}

async fn handshake(sink: &mut WsSink, source: &mut WsSource, password: Option<&str>) -> Result<u32> {
    let hello = match next_incoming(source).await? {
        Incoming::Hello(hello) => hello,
        other => {
            return Err(ObsError::ConnectionError(format!(
                "expected Hello, got {:?}",
                other
            )));
        }
    };
    debug!(
        "OBS hello: websocket {:?}, rpc v{}",
        hello.obs_web_socket_version, hello.rpc_version
    );

    let authentication = match (&hello.authentication, password) {
        (Some(challenge), Some(password)) => Some(protocol::auth_response(password, challenge)),
        (Some(_), None) => return Err(ObsError::AuthenticationFailed),
        (None, _) => None,
    };
    let identify = Identify {
        rpc_version: RPC_VERSION,
        authentication,
    };
    sink.send(Message::Text(protocol::encode_identify(&identify)?.into()))
        .await
        .map_err(|e| ObsError::ConnectionError(e.to_string()))?;

    match next_incoming(source).await {
        Ok(Incoming::Identified(identified)) => Ok(identified.negotiated_rpc_version),
        Ok(other) => Err(ObsError::ConnectionError(format!(
            "expected Identified, got {:?}",
            other
        ))),
        // OBS closes the socket with 4009 when the password is wrong.
        Err(_) if hello.authentication.is_some() => Err(ObsError::AuthenticationFailed),
        Err(e) => Err(e),
    }
}

async fn next_incoming(source: &mut WsSource) -> Result<Incoming> {
    loop {
        match source.next().await {
            Some(Ok(Message::Text(text))) => return protocol::decode(text.as_str()),
            Some(Ok(Message::Close(frame))) => {
                return Err(ObsError::ConnectionError(format!(
                    "closed during handshake: {:?}",
                    frame
                )));
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(ObsError::ConnectionError(e.to_string())),
            None => {
                return Err(ObsError::ConnectionError(
                    "closed during handshake".to_string(),
                ));
            }
        }
    }
}
