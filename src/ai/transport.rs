//! Transports that carry decision requests to a service
//!
//! `HttpTransport` talks JSON to a real endpoint; `ScriptedTransport`
//! answers locally from a seeded RNG so demos and tests run without a
//! network.

use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use reqwest::Client;
use tokio::sync::Mutex;

use crate::ai::protocol::{
    AiAction, DecisionRequest, DecisionResponse, ServiceReply, ServiceRequest,
};
use crate::core::error::{EngineError, Result};

/// How decision requests reach a service
#[async_trait]
pub trait DecisionTransport: Send + Sync {
    /// Probe the link; used on startup and after failures
    async fn connect(&self) -> Result<()>;
    async fn request_decision(&self, request: &DecisionRequest) -> Result<DecisionResponse>;
    /// Lightweight liveness check; any success acknowledges
    async fn ping(&self) -> Result<()>;
}

/// JSON-over-HTTP transport with optional bearer auth
pub struct HttpTransport {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpTransport {
    pub fn new(endpoint: String, token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint,
            token,
        }
    }

    /// Create a transport from environment variables
    ///
    /// Required: AI_SERVICE_URL
    /// Optional: AI_SERVICE_TOKEN
    pub fn from_env() -> Result<Self> {
        let endpoint = std::env::var("AI_SERVICE_URL")
            .map_err(|_| EngineError::ConfigError("AI_SERVICE_URL not set".into()))?;
        let token = std::env::var("AI_SERVICE_TOKEN").ok();
        Ok(Self::new(endpoint, token))
    }

    async fn post(&self, message: &ServiceRequest) -> Result<reqwest::Response> {
        let mut call = self.client.post(&self.endpoint).json(message);
        if let Some(token) = &self.token {
            call = call.header("Authorization", format!("Bearer {}", token));
        }
        let response = call
            .send()
            .await
            .map_err(|e| EngineError::TransportError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::TransportError(format!(
                "decision service returned {}: {}",
                status, body
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl DecisionTransport for HttpTransport {
    async fn connect(&self) -> Result<()> {
        self.ping().await
    }

    async fn request_decision(&self, request: &DecisionRequest) -> Result<DecisionResponse> {
        let response = self
            .post(&ServiceRequest::RequestDecision(request.clone()))
            .await?;
        let ServiceReply::DecisionResponse(decision) = response
            .json()
            .await
            .map_err(|e| EngineError::InvalidDecision(e.to_string()))?;
        Ok(decision)
    }

    async fn ping(&self) -> Result<()> {
        self.post(&ServiceRequest::Ping).await?;
        Ok(())
    }
}

/// Deterministic local transport: picks one of the offered actions
pub struct ScriptedTransport {
    rng: Mutex<ChaCha8Rng>,
}

impl ScriptedTransport {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }
}

#[async_trait]
impl DecisionTransport for ScriptedTransport {
    async fn connect(&self) -> Result<()> {
        Ok(())
    }

    async fn request_decision(&self, request: &DecisionRequest) -> Result<DecisionResponse> {
        let mut rng = self.rng.lock().await;
        let decision = request
            .available_actions
            .choose(&mut *rng)
            .cloned()
            .unwrap_or(AiAction::Wait);
        Ok(DecisionResponse {
            request_id: request.request_id,
            decision,
            confidence: rng.gen_range(0.5..1.0),
            reasoning: None,
        })
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::snapshot::GameSnapshot;
    use crate::core::types::{PlayerId, RequestId, SessionId, UnitId};
    use crate::engine::units::UnitRoster;
    use crate::grid::battlefield::Battlefield;
    use crate::grid::position::GridPos;
    use crate::turn::state::TurnInfo;

    fn request(actions: Vec<AiAction>) -> DecisionRequest {
        let field = Battlefield::new(2, 2);
        let roster = UnitRoster::default();
        let turn = TurnInfo {
            current_player: PlayerId::new(),
            turn_number: 1,
            time_remaining: None,
        };
        DecisionRequest {
            request_id: RequestId::new(),
            session_id: SessionId::new(),
            unit_id: UnitId::new(),
            game_state: GameSnapshot::capture(SessionId::new(), &field, &roster, turn),
            available_actions: actions,
            timestamp: 0,
        }
    }

    #[tokio::test]
    async fn test_scripted_picks_an_offered_action() {
        let transport = ScriptedTransport::seeded(7);
        let req = request(vec![
            AiAction::Move {
                target_position: GridPos::new(1, 0),
            },
            AiAction::Wait,
        ]);
        let response = transport.request_decision(&req).await.unwrap();
        assert!(req.available_actions.contains(&response.decision));
        assert_eq!(response.request_id, req.request_id);
        assert!((0.5..1.0).contains(&response.confidence));
    }

    #[tokio::test]
    async fn test_scripted_is_deterministic_per_seed() {
        let req = request(vec![
            AiAction::Move {
                target_position: GridPos::new(1, 0),
            },
            AiAction::Move {
                target_position: GridPos::new(0, 1),
            },
            AiAction::Wait,
        ]);

        let first = ScriptedTransport::seeded(99)
            .request_decision(&req)
            .await
            .unwrap();
        let second = ScriptedTransport::seeded(99)
            .request_decision(&req)
            .await
            .unwrap();
        assert_eq!(first.decision, second.decision);
    }

    #[tokio::test]
    async fn test_scripted_answers_wait_when_offered_nothing() {
        let transport = ScriptedTransport::seeded(1);
        let response = transport.request_decision(&request(vec![])).await.unwrap();
        assert_eq!(response.decision, AiAction::Wait);
    }

    #[test]
    fn test_from_env_requires_url() {
        if std::env::var("AI_SERVICE_URL").is_err() {
            assert!(HttpTransport::from_env().is_err());
        }
    }
}
