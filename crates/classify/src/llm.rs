use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use deducto_core::Transaction;

use crate::ai::{AiClassifier, AiError, MerchantGuess};

const SYSTEM_PROMPT: &str = r#"You identify merchants in Australian bank transaction
descriptions. For every transaction, reply with the trading name of the merchant and
the four-digit ANZSIC industry code that best fits it. Use merchant_name "unknown"
and an empty industry_code when you cannot tell. Reply with a JSON array only, one
object per transaction: [{"id": "...", "merchant_name": "...", "industry_code": "...", "confidence": 0-100}]"#;

/// Chat-completion backed [`AiClassifier`]. Works against any
/// OpenAI-compatible endpoint; the key comes from configuration, never
/// from ambient globals.
pub struct LlmClassifier {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl LlmClassifier {
    pub fn new(endpoint: &str, model: &str, api_key: &str) -> Self {
        LlmClassifier {
            client: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl AiClassifier for LlmClassifier {
    async fn extract_merchants(
        &self,
        batch: &[Transaction],
    ) -> Result<Vec<MerchantGuess>, AiError> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }

        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            temperature: f32,
            messages: Vec<Msg<'a>>,
        }

        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }

        #[derive(Deserialize)]
        struct Choice {
            message: RespMsg,
        }

        #[derive(Deserialize)]
        struct RespMsg {
            content: String,
        }

        let listing = batch
            .iter()
            .map(|tx| format!("{} | {} | {}", tx.id, tx.description, tx.amount))
            .collect::<Vec<_>>()
            .join("\n");
        let user = format!("Transactions (id | description | amount):\n{listing}");

        let body = Req {
            model: &self.model,
            temperature: 0.0,
            messages: vec![
                Msg { role: "system", content: SYSTEM_PROMPT },
                Msg { role: "user", content: &user },
            ],
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(AiError::Backend(format!("{status}: {detail}")));
        }

        let parsed: Resp = resp.json().await?;
        let content = parsed
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| AiError::Malformed("no choices in completion".to_string()))?;

        debug!(chars = content.len(), "LLM reply received");
        parse_reply(content, batch)
    }
}

/// Pull the JSON array out of a completion reply and coerce each item
/// into a [`MerchantGuess`]. Tolerates code fences, numeric ids, and
/// confidence given as a string; items it cannot read at all come back
/// as unknown rather than failing the chunk.
pub fn parse_reply(content: &str, batch: &[Transaction]) -> Result<Vec<MerchantGuess>, AiError> {
    let start = content.find('[');
    let end = content.rfind(']');
    let json = match (start, end) {
        (Some(s), Some(e)) if s < e => &content[s..=e],
        _ => return Err(AiError::Malformed("reply contains no JSON array".to_string())),
    };

    let items: Vec<Value> = serde_json::from_str(json)
        .map_err(|e| AiError::Malformed(format!("bad JSON array: {e}")))?;

    let mut by_id = std::collections::HashMap::new();
    for item in &items {
        let id = match text_field(item, "id") {
            Some(id) => id,
            None => continue,
        };
        let merchant_name = text_field(item, "merchant_name")
            .unwrap_or_else(|| "unknown".to_string());
        let industry_code = text_field(item, "industry_code").unwrap_or_default();
        let confidence = confidence_field(item);
        by_id.insert(
            id.clone(),
            MerchantGuess { id, merchant_name, industry_code, confidence },
        );
    }

    Ok(batch
        .iter()
        .map(|tx| {
            by_id
                .remove(&tx.id)
                .unwrap_or_else(|| MerchantGuess::unknown(&tx.id))
        })
        .collect())
}

fn text_field(item: &Value, key: &str) -> Option<String> {
    match item.get(key)? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn confidence_field(item: &Value) -> u8 {
    let clamp = |n: i64| n.clamp(0, 100) as u8;
    match item.get("confidence") {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .map(clamp)
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse::<i64>().map(clamp).unwrap_or(0),
        _ => 0,
    }
}
