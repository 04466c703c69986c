use crate::cache::QueryCache;
use crate::connection::{ChannelEvent, Connection, ConnectionEvent, ConnectionEvents, Connector};
use crate::models::{ChannelError, ChannelMessage, ConnectionState};
use crate::reconnect::ReconnectSlot;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Default delay before reconnecting after a close
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Configuration for the live channel
#[derive(Debug, Clone)]
pub struct LiveChannelConfig {
    /// WebSocket base URL including the version prefix, e.g. `ws://localhost:8000/api/v1`
    pub ws_base_url: String,
    pub reconnect_delay: Duration,
}

impl LiveChannelConfig {
    pub fn new(ws_base_url: String) -> Self {
        Self {
            ws_base_url,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }

    /// Push endpoint for one session token
    pub fn endpoint_for(&self, token: &str) -> String {
        format!(
            "{}/websocket/ws/{}",
            self.ws_base_url.trim_end_matches('/'),
            token
        )
    }
}

struct ActiveConnection {
    generation: u64,
    events: ConnectionEvents,
    connection: Box<dyn Connection>,
}

/// Live push channel bound to the session token.
///
/// All state changes happen on the task that owns the channel: socket
/// callbacks and the reconnect timer only enqueue events, which are applied
/// by [`LiveChannel::run`] (or [`LiveChannel::pump`] when embedded in another
/// loop).
pub struct LiveChannel {
    config: LiveChannelConfig,
    connector: Arc<dyn Connector>,
    cache: Arc<QueryCache>,
    token: Option<String>,
    active: Option<ActiveConnection>,
    generation: u64,
    reconnect: ReconnectSlot,
    events_tx: mpsc::UnboundedSender<ChannelEvent>,
    events_rx: Option<mpsc::UnboundedReceiver<ChannelEvent>>,
    state: watch::Sender<ConnectionState>,
    last_message: watch::Sender<Option<ChannelMessage>>,
}

impl LiveChannel {
    pub fn new(
        config: LiveChannelConfig,
        connector: Arc<dyn Connector>,
        cache: Arc<QueryCache>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state, _rx) = watch::channel(ConnectionState::Disconnected);
        let (last_message, _rx) = watch::channel(None);
        Self {
            config,
            connector,
            cache,
            token: None,
            active: None,
            generation: 0,
            reconnect: ReconnectSlot::new(),
            events_tx,
            events_rx: Some(events_rx),
            state,
            last_message,
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Subscribe to connection state changes
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Most recent decoded push message, if any arrived yet
    pub fn last_message(&self) -> Option<ChannelMessage> {
        self.last_message.borrow().clone()
    }

    pub fn subscribe_messages(&self) -> watch::Receiver<Option<ChannelMessage>> {
        self.last_message.subscribe()
    }

    pub fn is_reconnect_pending(&self) -> bool {
        self.reconnect.is_pending()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    /// Applies a session change: a token connects, `None` tears down.
    /// A different token replaces the current connection.
    pub fn set_session(&mut self, token: Option<String>) {
        match token {
            Some(token) => {
                if self.token.as_deref().is_some_and(|t| t != token) {
                    log::info!("Session token changed, replacing live connection");
                    self.teardown();
                }
                self.token = Some(token);
                self.connect();
            }
            None => {
                if self.token.take().is_some() {
                    log::info!("Session ended, closing live channel");
                }
                self.teardown();
            }
        }
    }

    /// Opens a connection for the current token. No-op while one is open or opening.
    fn connect(&mut self) {
        let Some(token) = self.token.clone() else {
            return;
        };
        if self.active.is_some() {
            log::debug!("Live channel already {:?}, not connecting again", self.state());
            return;
        }

        self.reconnect.cancel();
        self.generation += 1;
        let events = ConnectionEvents::new(self.generation, self.events_tx.clone());
        let url = self.config.endpoint_for(&token);
        let connection = self.connector.connect(&url, events.clone());

        self.active = Some(ActiveConnection {
            generation: self.generation,
            events,
            connection,
        });
        self.set_state(ConnectionState::Connecting);
    }

    /// Detaches callbacks, then closes the socket, then cancels any pending reconnect
    pub fn teardown(&mut self) {
        if let Some(mut active) = self.active.take() {
            active.events.detach();
            active.connection.close();
            log::debug!("Closed live connection #{}", active.generation);
        }
        if self.reconnect.cancel() {
            log::debug!("Cancelled pending live channel reconnect");
        }
        self.set_state(ConnectionState::Disconnected);
    }

    pub(crate) fn handle_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::ReconnectDue => {
                self.reconnect.clear_fired();
                if self.token.is_some() {
                    log::info!("Reconnecting live channel");
                    self.connect();
                }
            }
            ChannelEvent::Connection { generation, event } => {
                let current = self.active.as_ref().map(|a| a.generation);
                if current != Some(generation) {
                    log::debug!(
                        "Ignoring {:?} from stale live connection #{}",
                        event,
                        generation
                    );
                    return;
                }
                self.handle_connection_event(event);
            }
        }
    }

    fn handle_connection_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Opened => {
                log::info!("Live channel connected");
                self.set_state(ConnectionState::Connected);
            }
            ConnectionEvent::Frame(text) => self.dispatch(&text),
            ConnectionEvent::Closed { reason } => {
                let err = ChannelError::Connection(reason.unwrap_or_else(|| "closed".to_string()));
                log::warn!("Live channel disconnected: {}", err);
                self.active = None;
                self.set_state(ConnectionState::Disconnected);
                self.schedule_reconnect();
            }
        }
    }

    fn schedule_reconnect(&mut self) {
        if self.token.is_none() {
            return;
        }
        let tx = self.events_tx.clone();
        self.reconnect.schedule(self.config.reconnect_delay, move || {
            let _ = tx.send(ChannelEvent::ReconnectDue);
        });
        log::debug!(
            "Live channel reconnect scheduled in {:?}",
            self.config.reconnect_delay
        );
    }

    fn dispatch(&self, text: &str) {
        let message = match ChannelMessage::decode(text) {
            Ok(message) => message,
            Err(e) => {
                log::warn!("Dropping live channel frame: {}", e);
                return;
            }
        };

        match &message {
            ChannelMessage::Unknown { message_type } => {
                log::debug!("Ignoring live message of type {}", message_type);
            }
            _ => {
                log::debug!("Live message received: {:?}", message);
                for key in message.invalidation_keys() {
                    self.cache.invalidate(&key);
                }
            }
        }
        self.last_message.send_replace(Some(message));
    }

    /// Applies every queued event without waiting. Returns how many were handled.
    pub fn pump(&mut self) -> usize {
        let mut queued = Vec::new();
        if let Some(rx) = self.events_rx.as_mut() {
            while let Ok(event) = rx.try_recv() {
                queued.push(event);
            }
        }
        let handled = queued.len();
        for event in queued {
            self.handle_event(event);
        }
        handled
    }

    /// Drives the channel for the lifetime of the session watch.
    ///
    /// Returns (after tearing down) once the session sender is dropped.
    pub async fn run(mut self, mut session: watch::Receiver<Option<String>>) {
        let Some(mut events) = self.events_rx.take() else {
            log::warn!("Live channel event loop already running");
            return;
        };

        let token = session.borrow_and_update().clone();
        self.set_session(token);

        loop {
            tokio::select! {
                changed = session.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let token = session.borrow_and_update().clone();
                    self.set_session(token);
                }
                Some(event) = events.recv() => {
                    self.handle_event(event);
                }
            }
        }

        self.teardown();
        log::info!("Live channel stopped");
    }
}

impl Drop for LiveChannel {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::QueryKey;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeConnector {
        log: Arc<Mutex<Vec<String>>>,
        opened: Mutex<Vec<(String, ConnectionEvents)>>,
    }

    impl FakeConnector {
        fn connects(&self) -> usize {
            self.opened.lock().unwrap().len()
        }

        fn last_events(&self) -> ConnectionEvents {
            self.opened.lock().unwrap().last().unwrap().1.clone()
        }

        fn last_url(&self) -> String {
            self.opened.lock().unwrap().last().unwrap().0.clone()
        }

        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    struct FakeConnection {
        events: ConnectionEvents,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Connection for FakeConnection {
        fn close(&mut self) {
            let entry = if self.events.is_detached() {
                "close after detach"
            } else {
                "close while attached"
            };
            self.log.lock().unwrap().push(entry.to_string());
        }
    }

    impl Connector for FakeConnector {
        fn connect(&self, url: &str, events: ConnectionEvents) -> Box<dyn Connection> {
            self.log.lock().unwrap().push("connect".to_string());
            self.opened
                .lock()
                .unwrap()
                .push((url.to_string(), events.clone()));
            Box::new(FakeConnection {
                events,
                log: self.log.clone(),
            })
        }
    }

    fn channel() -> (LiveChannel, Arc<FakeConnector>, Arc<QueryCache>) {
        let connector = Arc::new(FakeConnector::default());
        let cache = Arc::new(QueryCache::new());
        let config = LiveChannelConfig::new("ws://localhost:8000/api/v1/".to_string());
        let channel = LiveChannel::new(config, connector.clone(), cache.clone());
        (channel, connector, cache)
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let (mut channel, connector, _cache) = channel();
        assert_eq!(channel.state(), ConnectionState::Disconnected);

        channel.set_session(Some("tok".to_string()));
        channel.set_session(Some("tok".to_string()));

        assert_eq!(connector.connects(), 1);
        assert_eq!(
            connector.last_url(),
            "ws://localhost:8000/api/v1/websocket/ws/tok"
        );
        assert_eq!(channel.state(), ConnectionState::Connecting);

        connector.last_events().opened();
        channel.pump();
        assert!(channel.is_connected());

        channel.set_session(Some("tok".to_string()));
        assert_eq!(connector.connects(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_close_leaves_one_pending_reconnect() {
        let (mut channel, connector, _cache) = channel();
        channel.set_session(Some("tok".to_string()));
        let events = connector.last_events();
        events.opened();
        events.closed(None);
        events.closed(Some("again".to_string()));
        channel.pump();

        assert_eq!(channel.state(), ConnectionState::Disconnected);
        assert!(channel.is_reconnect_pending());

        tokio::time::sleep(Duration::from_secs(6)).await;
        channel.pump();

        assert_eq!(connector.connects(), 2);
        assert_eq!(channel.state(), ConnectionState::Connecting);
        assert!(!channel.is_reconnect_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_reconnect_after_logout() {
        let (mut channel, connector, _cache) = channel();
        channel.set_session(Some("tok".to_string()));
        let events = connector.last_events();
        events.opened();
        channel.pump();

        channel.set_session(None);
        events.closed(None);
        channel.pump();

        assert!(!channel.is_reconnect_pending());
        tokio::time::sleep(Duration::from_secs(30)).await;
        channel.pump();

        assert_eq!(connector.connects(), 1);
        assert_eq!(channel.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_cancels_pending_reconnect() {
        let (mut channel, connector, _cache) = channel();
        channel.set_session(Some("tok".to_string()));
        connector.last_events().closed(None);
        channel.pump();
        assert!(channel.is_reconnect_pending());

        channel.set_session(None);

        assert!(!channel.is_reconnect_pending());
        tokio::time::sleep(Duration::from_secs(30)).await;
        channel.pump();
        assert_eq!(connector.connects(), 1);
    }

    #[tokio::test]
    async fn test_teardown_detaches_before_close() {
        let (mut channel, connector, _cache) = channel();
        channel.set_session(Some("tok".to_string()));

        channel.teardown();

        assert_eq!(connector.log(), vec!["connect", "close after detach"]);
    }

    #[tokio::test]
    async fn test_token_change_replaces_connection() {
        let (mut channel, connector, _cache) = channel();
        channel.set_session(Some("first".to_string()));
        let old = connector.last_events();

        channel.set_session(Some("second".to_string()));

        assert_eq!(connector.connects(), 2);
        assert!(old.is_detached());
        assert!(connector.last_url().ends_with("/second"));
    }

    #[tokio::test]
    async fn test_frames_invalidate_cache_and_bad_frames_are_dropped() {
        let (mut channel, connector, cache) = channel();
        let key = QueryKey::entity("property", "p-1");
        cache.put(key.clone(), json!({"status": "SUBMITTED"}));
        let mut invalidations = cache.subscribe();
        let mut messages = channel.subscribe_messages();

        channel.set_session(Some("tok".to_string()));
        let events = connector.last_events();
        events.opened();
        events.frame("not json".to_string());
        channel.pump();
        assert_eq!(channel.last_message(), None);
        assert!(!messages.has_changed().unwrap());

        events.frame(r#"{"type":"chat:typing"}"#.to_string());
        events.frame(r#"{"type":"property:updated","id":"p-1"}"#.to_string());
        channel.pump();

        let expected = ChannelMessage::EntityUpdated {
            kind: "property".to_string(),
            id: Some("p-1".to_string()),
        };
        assert_eq!(channel.last_message(), Some(expected.clone()));
        assert!(messages.has_changed().unwrap());
        assert_eq!(*messages.borrow_and_update(), Some(expected));

        assert!(channel.is_connected());
        assert!(cache.is_stale(&key));
        assert_eq!(
            invalidations.try_recv().unwrap(),
            QueryKey::collection("property")
        );
        assert_eq!(invalidations.try_recv().unwrap(), key);
    }

    #[tokio::test]
    async fn test_run_follows_session_watch() {
        let (channel, connector, _cache) = channel();
        let (session_tx, session_rx) = watch::channel(None::<String>);
        let handle = tokio::spawn(channel.run(session_rx));

        session_tx.send_replace(Some("tok".to_string()));
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(connector.connects(), 1);

        drop(session_tx);
        handle.await.unwrap();
        assert_eq!(connector.log().last().unwrap(), "close after detach");
    }
}
