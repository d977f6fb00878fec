use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use bouncetag_core::TransactionRecord;

use crate::classify::Classify;

const DEFAULT_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";
const DEFAULT_MODEL: &str = "google/gemma-3-27b-it";
const MAX_ATTEMPTS: u32 = 3;

const SYSTEM_PROMPT: &str = "You are an expert financial analyst specialized in \
bank statement bounce detection. Analyze the transaction and identify its bounce \
type. Always answer with JSON in the exact structure requested.";

const RULE_SUMMARY: &str = "\
Classify the bounce type of one bank-statement transaction from its narration.\n\
Categories: BOUNCE CHARGES - GST, BOUNCE CHARGES, Cheque Bounce - Technical, \
Cheque Bounce - Non-Technical, ACH, NEFT, IMPS, UPI, RTGS, ECS.\n\
A narration must name the instrument AND carry a failure indicator \
(return/ret/rtn/rev/reversal/reject/failed/bounce). Charge wordings \
(rtn chg, return charges, bounce charges) are BOUNCE CHARGES, or \
BOUNCE CHARGES - GST when gst is present. NEFT applies only to a credit with \
no debit. Never match indicators inside unrelated words (ret in retail, \
rt in transport). If nothing applies, the bounce type is null.";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: status {0}")]
    Api(reqwest::StatusCode),
    #[error("empty completion")]
    EmptyCompletion,
    #[error("unparseable completion: {0}")]
    BadCompletion(#[from] serde_json::Error),
}

/// Classification strategy that delegates the narration decision to a
/// chat-completions model. Transport, retry and response parsing are
/// internal; the pipeline only sees the `Classify` contract. Any failure
/// degrades to "no label" for the record rather than failing the batch.
pub struct LlmClassifier {
    endpoint: String,
    model: String,
    api_key: String,
    client: reqwest::blocking::Client,
}

impl LlmClassifier {
    pub fn new(api_key: impl Into<String>) -> Result<LlmClassifier, LlmError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(LlmClassifier {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn user_prompt(record: &TransactionRecord) -> String {
        format!(
            "{RULE_SUMMARY}\n\nTRANSACTION:\n{}\n\nReturn ONLY JSON: \
             {{\"bounce_type\": \"<category>\" or null}}",
            serde_json::json!({
                "narration": record.normalized_narration,
                "debit": record.debit,
                "credit": record.credit,
                "balance": record.balance,
                "cheque_no": record.cheque_number,
                "date": record.date,
            })
        )
    }

    fn complete(&self, user: &str) -> Result<String, LlmError> {
        let payload = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: SYSTEM_PROMPT.to_string() },
                ChatMessage { role: "user", content: user.to_string() },
            ],
            temperature: 0.1,
            max_tokens: 2000,
        };

        let mut last_err = LlmError::EmptyCompletion;
        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                thread::sleep(Duration::from_secs(1 << (attempt - 1)));
            }
            match self.try_complete(&payload) {
                Ok(content) => return Ok(content),
                Err(err) => {
                    tracing::warn!(attempt, error = %err, "completion attempt failed");
                    last_err = err;
                }
            }
        }
        Err(last_err)
    }

    fn try_complete(&self, payload: &ChatRequest<'_>) -> Result<String, LlmError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(payload)
            .send()?;
        if !response.status().is_success() {
            return Err(LlmError::Api(response.status()));
        }
        let body: ChatResponse = response.json()?;
        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(LlmError::EmptyCompletion)
    }
}

impl Classify for LlmClassifier {
    fn classify(&self, record: &TransactionRecord) -> Option<String> {
        let prompt = Self::user_prompt(record);
        match self.complete(&prompt).and_then(parse_verdict) {
            Ok(label) => label,
            Err(err) => {
                tracing::warn!(error = %err, "model classification failed, leaving record untagged");
                None
            }
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatContent,
}

#[derive(Deserialize)]
struct ChatContent {
    content: String,
}

#[derive(Deserialize)]
struct Verdict {
    #[serde(default)]
    bounce_type: Option<String>,
}

fn parse_verdict(completion: String) -> Result<Option<String>, LlmError> {
    let verdict: Verdict = serde_json::from_str(strip_code_fence(&completion))?;
    Ok(verdict.bounce_type.filter(|label| !label.trim().is_empty()))
}

/// Models often wrap JSON in a Markdown code fence.
fn strip_code_fence(s: &str) -> &str {
    let s = s.trim();
    let Some(s) = s.strip_prefix("```") else {
        return s;
    };
    let s = s.strip_prefix("json").unwrap_or(s);
    s.strip_suffix("```").unwrap_or(s).trim()
}
