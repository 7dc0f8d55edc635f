//! The stream reader: connect, parse, buffer, dispatch, reconnect.

use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::registry::{EventKind, StreamEvent, SubscriberRegistry, SubscriptionId};
use super::transport::{Frame, Transport, WebSocketTransport};
use super::StreamConfig;
use crate::error::StreamError;
use crate::ringbuffer::Ringbuffer;
use crate::stats::{StreamStats, StreamStatsSnapshot};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Current transport session.
#[derive(Default)]
struct Session {
    address: Option<String>,
    task: Option<JoinHandle<()>>,
}

struct ReaderInner<T> {
    name: String,
    config: StreamConfig,
    transport: Arc<dyn Transport>,
    registry: SubscriberRegistry<T>,
    buffer: Mutex<Ringbuffer<Arc<T>>>,
    /// Held across buffer push and dispatch so subscribers see messages in
    /// buffer order.
    ingest: Mutex<()>,
    session: Mutex<Session>,
    /// Bumped on every connect and destroy; a transport task only dispatches
    /// while its generation is current.
    generation: AtomicU64,
    stats: StreamStats,
}

/// A reconnecting reader for one stream of JSON messages of type `T`.
///
/// The reader owns its transport task; dropping it is equivalent to calling
/// [`StreamReader::destroy`].
pub struct StreamReader<T> {
    inner: Arc<ReaderInner<T>>,
}

impl<T> StreamReader<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    /// Creates a reader over the WebSocket transport.
    pub fn new(name: impl Into<String>, config: StreamConfig) -> Self {
        Self::with_transport(name, config, Arc::new(WebSocketTransport))
    }

    pub fn with_transport(
        name: impl Into<String>,
        config: StreamConfig,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let buffer = Ringbuffer::new(config.buffer_length);
        Self {
            inner: Arc::new(ReaderInner {
                name: name.into(),
                config,
                transport,
                registry: SubscriberRegistry::new(),
                buffer: Mutex::new(buffer),
                ingest: Mutex::new(()),
                session: Mutex::new(Session::default()),
                generation: AtomicU64::new(0),
                stats: StreamStats::new(),
            }),
        }
    }

    /// Starts streaming from `address` on a background task.
    ///
    /// Calling it again with the same address while the task is alive is a
    /// no-op; a different address tears the old transport down first. Must be
    /// called from within a Tokio runtime.
    pub fn connect(&self, address: &str) {
        let Ok(runtime) = Handle::try_current() else {
            error!(
                "Stream reader '{}' cannot connect outside of a Tokio runtime",
                self.inner.name
            );
            return;
        };

        let mut session = lock(&self.inner.session);
        let alive = session.task.as_ref().is_some_and(|t| !t.is_finished());
        if alive && session.address.as_deref() == Some(address) {
            debug!("Stream reader '{}' already connected", self.inner.name);
            return;
        }

        if let Some(old) = session.task.take() {
            info!(
                "Stream reader '{}' switching address, closing previous transport",
                self.inner.name
            );
            old.abort();
        }

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        session.address = Some(address.to_string());

        let inner = Arc::clone(&self.inner);
        let address = address.to_string();
        session.task = Some(runtime.spawn(async move { inner.run(address, generation).await }));
    }

    /// Registers a handler for `kind`.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&StreamEvent<T>) + Send + Sync + 'static,
    {
        self.inner.registry.subscribe(kind, Arc::new(handler))
    }

    /// Registers a handler for parsed messages only.
    pub fn on_data<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.subscribe(EventKind::Data, move |event| {
            if let StreamEvent::Data(message) = event {
                handler(message);
            }
        })
    }

    /// Feeds one raw frame through the parse/buffer/dispatch pipeline, as if
    /// it had arrived on the transport.
    ///
    /// Safe to call alongside the transport task. Must not be called from a
    /// data handler of the same reader.
    pub fn push_frame(&self, frame: &str) -> Result<(), StreamError> {
        self.inner.ingest(frame)
    }
}

impl<T> StreamReader<T> {
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn unsubscribe(&self, subscription: SubscriptionId) -> bool {
        self.inner.registry.unsubscribe(subscription)
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.inner.registry.len(kind)
    }

    /// Address of the current transport, if any.
    pub fn address(&self) -> Option<String> {
        lock(&self.inner.session).address.clone()
    }

    /// True while a transport task is running (connected or backing off).
    pub fn is_active(&self) -> bool {
        lock(&self.inner.session)
            .task
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }

    /// Recent messages, oldest first.
    pub fn buffer(&self) -> Vec<Arc<T>> {
        lock(&self.inner.buffer).get_history()
    }

    pub fn stats(&self) -> StreamStatsSnapshot {
        let (len, capacity) = {
            let buffer = lock(&self.inner.buffer);
            (buffer.len(), buffer.capacity())
        };
        self.inner.stats.snapshot(len, capacity)
    }

    /// Closes the transport, cancels pending reconnects and drops every
    /// subscription. Safe to call repeatedly.
    pub fn destroy(&self) {
        self.inner.shutdown();
    }
}

impl<T> Drop for StreamReader<T> {
    fn drop(&mut self) {
        self.inner.shutdown();
    }
}

impl<T> ReaderInner<T> {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn shutdown(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let task = {
            let mut session = lock(&self.session);
            session.address = None;
            session.task.take()
        };
        if let Some(task) = task {
            debug!("Stream reader '{}' destroyed", self.name);
            task.abort();
        }
        self.registry.clear();
    }

    fn emit(&self, generation: u64, event: StreamEvent<T>) {
        if self.is_current(generation) {
            self.registry.dispatch(&event);
        }
    }
}

impl<T> ReaderInner<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    fn ingest(&self, text: &str) -> Result<(), StreamError> {
        self.stats.record_frame(text.len());

        match serde_json::from_str::<T>(text) {
            Ok(message) => {
                let message = Arc::new(message);
                let _ordered = lock(&self.ingest);
                lock(&self.buffer).push(Arc::clone(&message));
                self.registry.dispatch(&StreamEvent::Data(message));
                self.stats.record_delivered();
                Ok(())
            }
            Err(e) => {
                let err = StreamError::Parse(e.to_string());
                self.report_parse_error(err.clone());
                Err(err)
            }
        }
    }

    fn report_parse_error(&self, err: StreamError) {
        warn!("Stream reader '{}' dropping frame: {}", self.name, err);
        self.stats.record_parse_error();
        self.registry.dispatch(&StreamEvent::Error(err));
    }

    fn report_transport_error(&self, generation: u64, err: StreamError) {
        warn!("Stream reader '{}': {}", self.name, err);
        self.stats.record_transport_error();
        self.emit(generation, StreamEvent::Error(err));
    }

    async fn run(self: Arc<Self>, address: String, generation: u64) {
        let mut backoff = self.config.backoff();
        let mut has_connected = false;

        loop {
            if !self.is_current(generation) {
                return;
            }

            debug!("Stream reader '{}' opening {}", self.name, address);
            match self.transport.open(&address).await {
                Ok(mut frames) => {
                    if !self.is_current(generation) {
                        return;
                    }

                    let is_reconnect = has_connected;
                    has_connected = true;
                    backoff.reset();
                    self.stats.record_connect(is_reconnect);

                    if is_reconnect {
                        info!("Stream reader '{}' re-established", self.name);
                        self.emit(generation, StreamEvent::Reconnect);
                    } else {
                        info!("Stream reader '{}' connected", self.name);
                    }

                    while let Some(item) = frames.next().await {
                        if !self.is_current(generation) {
                            return;
                        }
                        match item {
                            Ok(Frame::Text(text)) => {
                                let _ = self.ingest(&text);
                            }
                            Ok(Frame::Binary(bytes)) => match String::from_utf8(bytes) {
                                Ok(text) => {
                                    let _ = self.ingest(&text);
                                }
                                Err(e) => {
                                    self.stats.record_frame(e.as_bytes().len());
                                    self.report_parse_error(StreamError::Parse(e.to_string()));
                                }
                            },
                            Ok(Frame::Close) => {
                                debug!("Stream reader '{}': peer closed the channel", self.name);
                                break;
                            }
                            Err(err) => {
                                self.report_transport_error(generation, err);
                                break;
                            }
                        }
                    }

                    info!("Stream reader '{}' transport closed", self.name);
                    self.emit(generation, StreamEvent::Close);
                }
                Err(err) => self.report_transport_error(generation, err),
            }

            if !self.is_current(generation) {
                return;
            }
            let delay = backoff.next_delay();
            debug!(
                "Stream reader '{}' reconnecting in {} ms",
                self.name,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
        }
    }
}
