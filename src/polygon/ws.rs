use anyhow::{anyhow, Result};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;

use super::decode::StreamDecoder;
use super::types::{ControlRequest, StatusKind, StatusMessage};
use crate::config::{ReconnectConfig, StreamConfig};
use crate::error::AppError;
use crate::event::ConnectionState;
use crate::model::tick::Tick;

/// Exponential backoff for reconnection.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    current: Duration,
    initial: Duration,
    max: Duration,
    factor: f64,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max: Duration, factor: f64) -> Self {
        Self {
            current: initial,
            initial,
            max,
            factor,
        }
    }

    pub fn from_config(cfg: &ReconnectConfig) -> Self {
        Self::new(
            Duration::from_millis(cfg.initial_delay_ms),
            Duration::from_millis(cfg.max_delay_ms),
            cfg.factor,
        )
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = Duration::from_secs_f64(
            (self.current.as_secs_f64() * self.factor).min(self.max.as_secs_f64()),
        );
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// Identifies one transport session. Stale tokens are ignored by [`ReconnectGate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionToken {
    generation: u64,
}

impl SessionToken {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Session-generation counter that lets at most one reconnect be pending.
///
/// Close and error handlers both report through [`ReconnectGate::session_ended`];
/// only the first report for the live generation gets a delay back.
#[derive(Debug, Clone)]
pub struct ReconnectGate {
    generation: u64,
    live: Option<u64>,
    pending: bool,
    backoff: ExponentialBackoff,
}

impl ReconnectGate {
    pub fn new(backoff: ExponentialBackoff) -> Self {
        Self {
            generation: 0,
            live: None,
            pending: false,
            backoff,
        }
    }

    pub fn open_session(&mut self) -> SessionToken {
        self.generation += 1;
        self.live = Some(self.generation);
        self.pending = false;
        SessionToken {
            generation: self.generation,
        }
    }

    pub fn session_ended(&mut self, token: SessionToken) -> Option<Duration> {
        if self.pending || self.live != Some(token.generation) {
            return None;
        }
        self.generation += 1;
        self.live = None;
        self.pending = true;
        Some(self.backoff.next_delay())
    }

    /// A session reached `Subscribed`; the next failure starts from the initial delay.
    pub fn mark_subscribed(&mut self) {
        self.backoff.reset();
    }

    pub fn is_reconnect_pending(&self) -> bool {
        self.pending
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

enum SessionOutcome {
    Shutdown,
    ConsumerGone,
    Ended(AppError),
}

enum StatusAction {
    Subscribe,
    Fail(AppError),
    Nothing,
}

pub struct PolygonWsClient {
    url: String,
    api_key: String,
    subscription: String,
    decoder: StreamDecoder,
    wait_for_auth_ack: bool,
    subscribe_delay: Duration,
    auth_timeout: Duration,
    keepalive: Option<Duration>,
    reconnect: ReconnectConfig,
    state_tx: watch::Sender<ConnectionState>,
}

impl PolygonWsClient {
    pub fn new(cfg: &StreamConfig) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            url: cfg.ws_url.clone(),
            api_key: cfg.api_key.clone(),
            subscription: cfg.subscription_params(),
            decoder: StreamDecoder::new(&cfg.trade_event),
            wait_for_auth_ack: cfg.wait_for_auth_ack,
            subscribe_delay: Duration::from_millis(cfg.subscribe_delay_ms),
            auth_timeout: Duration::from_millis(cfg.auth_timeout_ms),
            keepalive: cfg.keepalive_interval(),
            reconnect: cfg.reconnect.clone(),
            state_tx,
        }
    }

    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            tracing::debug!(from = %previous, to = %state, "Connection state changed");
        }
    }

    /// Connect and run the WebSocket loop with automatic reconnection.
    /// Ticks go to `tick_tx` in arrival order. Returns when `shutdown` flips.
    pub async fn connect_and_run(
        &self,
        tick_tx: mpsc::Sender<Tick>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let mut gate = ReconnectGate::new(ExponentialBackoff::from_config(&self.reconnect));
        let mut attempt: u32 = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }
            attempt += 1;
            let token = gate.open_session();
            self.set_state(ConnectionState::Connecting);

            let outcome = self
                .run_session(token, &mut gate, &tick_tx, &mut shutdown)
                .await;
            self.set_state(ConnectionState::Disconnected);

            match outcome {
                SessionOutcome::Shutdown => {
                    tracing::info!("Stream shut down");
                    break;
                }
                SessionOutcome::ConsumerGone => {
                    return Err(anyhow!("tick consumer closed; stopping stream"));
                }
                SessionOutcome::Ended(e) => {
                    let delay = next_reconnect_delay(&mut gate, token)?;
                    tracing::warn!(
                        error = %e,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Stream session ended, reconnecting"
                    );

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => continue,
                        _ = shutdown.changed() => {
                            tracing::info!("Shutdown during reconnect");
                            break;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    async fn run_session(
        &self,
        token: SessionToken,
        gate: &mut ReconnectGate,
        tick_tx: &mpsc::Sender<Tick>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> SessionOutcome {
        tracing::info!(url = %self.url, generation = token.generation(), "Connecting");

        let connected = tokio::select! {
            res = tokio_tungstenite::connect_async(self.url.as_str()) => res,
            _ = shutdown.changed() => return SessionOutcome::Shutdown,
        };
        let ws_stream = match connected {
            Ok((ws_stream, _resp)) => ws_stream,
            Err(e) => {
                return SessionOutcome::Ended(AppError::WebSocket(format!("connect failed: {}", e)))
            }
        };
        tracing::info!("WebSocket connected");

        let (mut write, mut read) = ws_stream.split();

        let auth = ControlRequest::auth(&self.api_key).to_json();
        if let Err(e) = write.send(Message::Text(auth)).await {
            return SessionOutcome::Ended(AppError::WebSocket(format!("auth send failed: {}", e)));
        }
        self.set_state(ConnectionState::AwaitingAuth);
        let mut state = ConnectionState::AwaitingAuth;

        let auth_wait = if self.wait_for_auth_ack {
            self.auth_timeout
        } else {
            self.subscribe_delay
        };
        let auth_deadline = tokio::time::sleep(auth_wait);
        tokio::pin!(auth_deadline);

        let keepalive_period = self.keepalive.unwrap_or(Duration::from_secs(3600));
        let mut keepalive =
            tokio::time::interval_at(Instant::now() + keepalive_period, keepalive_period);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            let decoded = match self.decoder.decode(&text) {
                                Ok(decoded) => decoded,
                                Err(e) => {
                                    tracing::warn!(error = %e, "Dropping undecodable frame");
                                    continue;
                                }
                            };
                            if decoded.dropped > 0 {
                                tracing::trace!(dropped = decoded.dropped, "Filtered frame elements");
                            }

                            for status in &decoded.statuses {
                                match self.on_status(status, state) {
                                    StatusAction::Subscribe => {
                                        if let Err(e) = self.subscribe(&mut write).await {
                                            return SessionOutcome::Ended(e);
                                        }
                                        state = ConnectionState::Subscribed;
                                        gate.mark_subscribed();
                                    }
                                    StatusAction::Fail(e) => return SessionOutcome::Ended(e),
                                    StatusAction::Nothing => {}
                                }
                            }

                            for tick in decoded.ticks {
                                tokio::select! {
                                    biased;
                                    _ = shutdown.changed() => {
                                        let _ = write.close().await;
                                        return SessionOutcome::Shutdown;
                                    }
                                    sent = tick_tx.send(tick) => {
                                        if sent.is_err() {
                                            let _ = write.close().await;
                                            if *shutdown.borrow() {
                                                return SessionOutcome::Shutdown;
                                            }
                                            return SessionOutcome::ConsumerGone;
                                        }
                                    }
                                }
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let reason = frame
                                .map(|f| format!("{} {}", u16::from(f.code), f.reason))
                                .unwrap_or_else(|| "no close frame".to_string());
                            return SessionOutcome::Ended(AppError::WebSocket(format!(
                                "closed by server: {}",
                                reason
                            )));
                        }
                        Some(Ok(_)) => {
                            // Ping/pong/binary; tungstenite answers pings itself.
                        }
                        Some(Err(e)) => {
                            return SessionOutcome::Ended(AppError::WebSocket(format!(
                                "read error: {}",
                                e
                            )));
                        }
                        None => {
                            return SessionOutcome::Ended(AppError::WebSocket(
                                "stream ended".to_string(),
                            ));
                        }
                    }
                }
                _ = &mut auth_deadline, if state == ConnectionState::AwaitingAuth => {
                    if self.wait_for_auth_ack {
                        return SessionOutcome::Ended(AppError::AuthTimeout(
                            self.auth_timeout.as_millis() as u64,
                        ));
                    }
                    if let Err(e) = self.subscribe(&mut write).await {
                        return SessionOutcome::Ended(e);
                    }
                    state = ConnectionState::Subscribed;
                    gate.mark_subscribed();
                }
                _ = keepalive.tick(), if self.keepalive.is_some() && state == ConnectionState::Subscribed => {
                    match write.send(Message::Ping(Vec::new())).await {
                        Ok(()) => tracing::trace!("Sent keep-alive ping"),
                        Err(e) => tracing::warn!(error = %e, "Keep-alive ping failed"),
                    }
                }
                _ = shutdown.changed() => {
                    // Sends the close frame and flushes.
                    let _ = write.close().await;
                    return SessionOutcome::Shutdown;
                }
            }
        }
    }

    fn on_status(&self, status: &StatusMessage, state: ConnectionState) -> StatusAction {
        match status.kind {
            StatusKind::AuthSuccess => {
                tracing::info!(message = %status.message, "Authenticated");
                if self.wait_for_auth_ack && state == ConnectionState::AwaitingAuth {
                    StatusAction::Subscribe
                } else {
                    StatusAction::Nothing
                }
            }
            StatusKind::AuthFailed => {
                StatusAction::Fail(AppError::AuthRejected(status.message.clone()))
            }
            StatusKind::SubscriptionSuccess => {
                tracing::info!(message = %status.message, "Subscription confirmed");
                StatusAction::Nothing
            }
            StatusKind::Connected | StatusKind::Other => {
                tracing::debug!(status = %status.status, message = %status.message, "Status message");
                StatusAction::Nothing
            }
        }
    }

    async fn subscribe<S>(&self, write: &mut S) -> std::result::Result<(), AppError>
    where
        S: futures_util::Sink<Message> + Unpin,
        S::Error: std::fmt::Display,
    {
        let frame = ControlRequest::subscribe(&self.subscription).to_json();
        write
            .send(Message::Text(frame))
            .await
            .map_err(|e| AppError::WebSocket(format!("subscribe send failed: {}", e)))?;
        self.set_state(ConnectionState::Subscribed);
        tracing::info!(params = %self.subscription, "Subscribed");
        Ok(())
    }
}

/// Delay before reconnecting after `token`'s session ended.
///
/// A session the gate no longer considers live is an error rather than an
/// immediate reconnect.
fn next_reconnect_delay(gate: &mut ReconnectGate, token: SessionToken) -> Result<Duration> {
    gate.session_ended(token).ok_or_else(|| {
        anyhow!(
            "session {} already ended; refusing to reconnect without a delay",
            token.generation()
        )
    })
}
