//! Async pump between the engine and a decision transport
//!
//! The engine never awaits: it hands requests to a `ServiceHandle` and
//! drains responses on its next tick. One spawned task owns the
//! transport, heartbeats it, and walks an exponential-backoff reconnect
//! when it goes quiet. Dropping the handle closes the request channel,
//! which is how the task learns to stop.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::ai::protocol::{DecisionRequest, DecisionResponse};
use crate::ai::transport::DecisionTransport;
use crate::core::config::AiConfig;

const CHANNEL_DEPTH: usize = 64;

/// Link state as the pump sees it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkHealth {
    Up,
    Reconnecting,
    /// Every reconnect attempt burned; requests are discarded
    Failed,
}

/// Engine-side end of the service link
pub struct ServiceHandle {
    requests: mpsc::Sender<DecisionRequest>,
    responses: mpsc::Receiver<DecisionResponse>,
    health: watch::Receiver<LinkHealth>,
}

impl ServiceHandle {
    /// Queue a request without blocking; false when the channel is full
    /// or the pump is gone
    pub fn submit(&self, request: DecisionRequest) -> bool {
        self.requests.try_send(request).is_ok()
    }

    /// Collect every response that has arrived since the last drain
    pub fn drain(&mut self) -> Vec<DecisionResponse> {
        let mut responses = Vec::new();
        while let Ok(response) = self.responses.try_recv() {
            responses.push(response);
        }
        responses
    }

    pub fn health(&self) -> LinkHealth {
        *self.health.borrow()
    }
}

pub struct AiService;

impl AiService {
    /// Spawn the pump task; the handle talks to it, the `JoinHandle`
    /// resolves once the handle is dropped
    pub fn spawn(
        transport: Arc<dyn DecisionTransport>,
        config: AiConfig,
    ) -> (ServiceHandle, JoinHandle<()>) {
        let (request_tx, request_rx) = mpsc::channel(CHANNEL_DEPTH);
        let (response_tx, response_rx) = mpsc::channel(CHANNEL_DEPTH);
        let (health_tx, health_rx) = watch::channel(LinkHealth::Up);

        let pump = ServicePump {
            transport,
            config,
            requests: request_rx,
            responses: response_tx,
            health: health_tx,
        };
        let task = tokio::spawn(pump.run());

        (
            ServiceHandle {
                requests: request_tx,
                responses: response_rx,
                health: health_rx,
            },
            task,
        )
    }
}

/// Background task that owns the transport
struct ServicePump {
    transport: Arc<dyn DecisionTransport>,
    config: AiConfig,
    requests: mpsc::Receiver<DecisionRequest>,
    responses: mpsc::Sender<DecisionResponse>,
    health: watch::Sender<LinkHealth>,
}

impl ServicePump {
    async fn run(mut self) {
        let mut heartbeat = tokio::time::interval(self.config.heartbeat_interval());
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                maybe = self.requests.recv() => {
                    match maybe {
                        Some(request) => self.handle_request(request).await,
                        None => break,
                    }
                }
                _ = heartbeat.tick() => {
                    self.heartbeat().await;
                }
            }
        }
        tracing::debug!("decision service pump stopped");
    }

    async fn handle_request(&mut self, request: DecisionRequest) {
        if *self.health.borrow() == LinkHealth::Failed {
            tracing::warn!(
                request = ?request.request_id,
                "decision link is down, discarding request"
            );
            return;
        }

        match self.transport.request_decision(&request).await {
            Ok(response) => {
                let _ = self.responses.send(response).await;
            }
            Err(err) => {
                tracing::warn!(request = ?request.request_id, %err, "decision request failed");
                if self.reconnect().await {
                    // one retry once the link is back; a second failure
                    // leaves the request to the engine's timeout sweep
                    if let Ok(response) = self.transport.request_decision(&request).await {
                        let _ = self.responses.send(response).await;
                    }
                }
            }
        }
    }

    async fn heartbeat(&mut self) {
        if *self.health.borrow() == LinkHealth::Failed {
            return;
        }
        if let Err(err) = self.transport.ping().await {
            tracing::warn!(%err, "heartbeat failed");
            self.reconnect().await;
        }
    }

    /// Backoff doubles from the configured base each attempt; true when
    /// the link came back
    async fn reconnect(&mut self) -> bool {
        let _ = self.health.send(LinkHealth::Reconnecting);
        let base = self.config.reconnect_base();

        for attempt in 1..=self.config.reconnect_max_attempts {
            tokio::time::sleep(base * 2u32.pow(attempt - 1)).await;
            match self.transport.connect().await {
                Ok(()) => {
                    tracing::info!(attempt, "decision link restored");
                    let _ = self.health.send(LinkHealth::Up);
                    return true;
                }
                Err(err) => {
                    tracing::warn!(attempt, %err, "reconnect attempt failed");
                }
            }
        }

        tracing::error!(
            attempts = self.config.reconnect_max_attempts,
            "decision link failed for good"
        );
        let _ = self.health.send(LinkHealth::Failed);
        false
    }
}
