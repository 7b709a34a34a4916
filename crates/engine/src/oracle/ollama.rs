//! Ollama decision oracle (OpenAI-compatible API)
//!
//! Sends the player's prompt and context to a chat-completions endpoint with
//! an instruction to answer in strict JSON, then parses the reply into the
//! decision shape the request named.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use howl_domain::{
    BaseDecision, Decision, DecisionSchema, DiscussionDecision, HealDecision, KnowledgeDecision,
    PoisonDecision, ReflectionDecision, SeerDecision, ShotDecision, VoteDecision,
};

use super::{DecisionOracle, DecisionRequest, OracleError};
use crate::config::OracleConfig;

/// Client for an OpenAI-compatible chat-completions endpoint
#[derive(Clone)]
pub struct OllamaOracle {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OllamaOracle {
    pub fn new(config: &OracleConfig) -> Self {
        // LLM requests can be slow; the timeout comes from configuration
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
        }
    }

    fn system_prompt(request: &DecisionRequest) -> String {
        format!(
            "You are {player}, a player in a werewolf social deduction game. \
             Stay in character. Respond with a single JSON object and nothing \
             else, with no prose and no code fences.\n\n{shape}",
            player = request.player,
            shape = schema_instructions(&request.schema),
        )
    }
}

#[async_trait]
impl DecisionOracle for OllamaOracle {
    async fn decide(&self, request: DecisionRequest) -> Result<Decision, OracleError> {
        let api_request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ApiMessage {
                    role: "system".to_string(),
                    content: Self::system_prompt(&request),
                },
                ApiMessage {
                    role: "user".to_string(),
                    content: format!("{}\n\n{}", request.prompt, request.context),
                },
            ],
            temperature: self.temperature,
            response_format: ResponseFormat {
                kind: "json_object".to_string(),
            },
        };

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&api_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OracleError::Timeout
                } else {
                    OracleError::Provider(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Provider(format!("{status}: {body}")));
        }

        let api_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Malformed(e.to_string()))?;

        let content = api_response
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| OracleError::Malformed("empty choices".to_string()))?;

        parse_decision(content, &request.schema)
    }
}

/// Render the JSON shape the model must answer with
fn schema_instructions(schema: &DecisionSchema) -> String {
    const BASE: &str = "\"thought\" (your private reasoning), \"behavior\" \
                        (a subjectless description of your visible demeanor), \
                        \"speech\" (what you say out loud)";
    match schema {
        DecisionSchema::Statement => format!("Required fields: {BASE}."),
        DecisionSchema::Discussion => format!(
            "Required fields: {BASE}, \"reachAgreement\" (boolean: has your \
             team settled on a target?)."
        ),
        DecisionSchema::Vote {
            candidates,
            allow_abstain,
        } => {
            let abstain = if *allow_abstain {
                "or null to abstain"
            } else {
                "abstention is not allowed"
            };
            format!(
                "Required fields: {BASE}, \"vote\" (one of {candidates:?}, {abstain})."
            )
        }
        DecisionSchema::WitchHeal { kill_target } => format!(
            "Required fields: {BASE}, \"heal\" (boolean: use your one heal \
             potion to save {kill_target}?)."
        ),
        DecisionSchema::WitchPoison { candidates } => format!(
            "Required fields: {BASE}, \"poison\" (boolean), \"target\" \
             (one of {candidates:?} when poison is true, else null)."
        ),
        DecisionSchema::SeerCheck { candidates } => format!(
            "Required fields: {BASE}, \"target\" (one of {candidates:?} whose \
             identity you want to check)."
        ),
        DecisionSchema::HunterShot { candidates } => format!(
            "Required fields: {BASE}, \"shoot\" (boolean), \"target\" \
             (one of {candidates:?} when shoot is true, else null)."
        ),
        DecisionSchema::Reflection => {
            "Required fields: \"thought\" (private), \"impressionUpdates\" \
             (object mapping player names to short impressions; include only \
             players whose impression changed)."
                .to_string()
        }
        DecisionSchema::KnowledgeUpdate => {
            "Required fields: \"knowledge\" (your distilled, reusable \
             understanding of the game; no specifics of this match)."
                .to_string()
        }
    }
}

/// Parse the model's reply into the decision variant the schema names
fn parse_decision(content: &str, schema: &DecisionSchema) -> Result<Decision, OracleError> {
    let json = extract_json(content);
    let malformed = |e: serde_json::Error| OracleError::Malformed(e.to_string());

    let decision = match schema {
        DecisionSchema::Statement => {
            Decision::Statement(serde_json::from_str::<BaseDecision>(json).map_err(malformed)?)
        }
        DecisionSchema::Discussion => Decision::Discussion(
            serde_json::from_str::<DiscussionDecision>(json).map_err(malformed)?,
        ),
        DecisionSchema::Vote { .. } => {
            Decision::Vote(serde_json::from_str::<VoteDecision>(json).map_err(malformed)?)
        }
        DecisionSchema::WitchHeal { .. } => {
            Decision::WitchHeal(serde_json::from_str::<HealDecision>(json).map_err(malformed)?)
        }
        DecisionSchema::WitchPoison { .. } => Decision::WitchPoison(
            serde_json::from_str::<PoisonDecision>(json).map_err(malformed)?,
        ),
        DecisionSchema::SeerCheck { .. } => {
            Decision::SeerCheck(serde_json::from_str::<SeerDecision>(json).map_err(malformed)?)
        }
        DecisionSchema::HunterShot { .. } => {
            Decision::HunterShot(serde_json::from_str::<ShotDecision>(json).map_err(malformed)?)
        }
        DecisionSchema::Reflection => Decision::Reflection(
            serde_json::from_str::<ReflectionDecision>(json).map_err(malformed)?,
        ),
        DecisionSchema::KnowledgeUpdate => Decision::KnowledgeUpdate(
            serde_json::from_str::<KnowledgeDecision>(json).map_err(malformed)?,
        ),
    };
    Ok(decision)
}

/// Models occasionally wrap JSON in code fences or prose despite the
/// instructions; recover the outermost object.
fn extract_json(content: &str) -> &str {
    let trimmed = content.trim();
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ApiMessage>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ApiMessage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vote_decision() {
        let content = r#"{"thought":"t","behavior":"b","speech":"s","vote":"Player2"}"#;
        let schema = DecisionSchema::Vote {
            candidates: vec!["Player2".to_string()],
            allow_abstain: true,
        };
        let decision = parse_decision(content, &schema).expect("parse");
        match decision {
            Decision::Vote(v) => assert_eq!(v.vote.as_deref(), Some("Player2")),
            other => panic!("unexpected variant: {}", other.label()),
        }
    }

    #[test]
    fn test_parse_recovers_fenced_json() {
        let content = "```json\n{\"thought\":\"\",\"behavior\":\"\",\"speech\":\"hi\"}\n```";
        let decision = parse_decision(content, &DecisionSchema::Statement).expect("parse");
        match decision {
            Decision::Statement(base) => assert_eq!(base.speech, "hi"),
            other => panic!("unexpected variant: {}", other.label()),
        }
    }

    #[test]
    fn test_parse_rejects_prose() {
        let err = parse_decision("I vote for Player2", &DecisionSchema::Statement)
            .expect_err("prose is not a decision");
        assert!(matches!(err, OracleError::Malformed(_)));
    }

    #[test]
    fn test_reflection_updates_parse() {
        let content = r#"{"thought":"t","impressionUpdates":{"Player1":"suspicious"}}"#;
        let decision = parse_decision(content, &DecisionSchema::Reflection).expect("parse");
        match decision {
            Decision::Reflection(r) => {
                assert_eq!(
                    r.impression_updates.get("Player1").map(String::as_str),
                    Some("suspicious")
                );
            }
            other => panic!("unexpected variant: {}", other.label()),
        }
    }
}
