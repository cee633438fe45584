use serde_json::Value;

use crate::{Error, Result};

#[derive(Debug, serde::Serialize)]
struct ChatRequest<'a> {
	model: &'a str,
	temperature: f32,
	messages: &'a [Value],
}

#[derive(Debug, serde::Deserialize)]
struct ChatResponse {
	choices: Vec<ChatChoice>,
}

#[derive(Debug, serde::Deserialize)]
struct ChatChoice {
	message: ChatMessage,
}

#[derive(Debug, serde::Deserialize)]
struct ChatMessage {
	content: String,
}

/// Calls a chat-completion endpoint and returns the JSON object the model was
/// asked to emit. Non-JSON completions are retried a couple of times before
/// the call gives up.
pub async fn generate_json(
	cfg: &sieve_config::LlmProviderConfig,
	messages: &[Value],
) -> Result<Value> {
	let client = crate::http_client(cfg.timeout_ms)?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let request = ChatRequest { model: &cfg.model, temperature: cfg.temperature, messages };

	for _ in 0..3 {
		let res = client
			.post(&url)
			.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
			.json(&request)
			.send()
			.await?;
		let json = res.error_for_status()?.json::<Value>().await?;

		if let Ok(parsed) = extract_json(json) {
			return Ok(parsed);
		}
	}

	Err(Error::invalid_response("Generation response is not valid JSON."))
}

/// Accepts either a chat-completion envelope whose first choice carries a
/// JSON string, or a bare JSON object.
fn extract_json(json: Value) -> Result<Value> {
	if let Ok(response) = serde_json::from_value::<ChatResponse>(json.clone()) {
		let Some(choice) = response.choices.into_iter().next() else {
			return Err(Error::invalid_response("Generation response has no choices."));
		};

		return serde_json::from_str(choice.message.content.trim())
			.map_err(|_| Error::invalid_response("Generation content is not valid JSON."));
	}

	if json.is_object() {
		return Ok(json);
	}

	Err(Error::invalid_response("Generation response is missing JSON content."))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_choice_content_json() {
		let json = serde_json::json!({
			"choices": [
				{ "message": { "content": "{\"answer\": \"yes\", \"citations\": []}" } }
			]
		});
		let parsed = extract_json(json).expect("parse failed");

		assert!(parsed.get("answer").is_some());
	}

	#[test]
	fn rejects_prose_content() {
		let json = serde_json::json!({
			"choices": [
				{ "message": { "content": "The answer is yes." } }
			]
		});

		assert!(extract_json(json).is_err());
	}

	#[test]
	fn passes_bare_objects_through() {
		let json = serde_json::json!({ "answer": "yes", "citations": [] });
		let parsed = extract_json(json).expect("parse failed");

		assert_eq!(parsed.get("answer").and_then(Value::as_str), Some("yes"));
	}
}
