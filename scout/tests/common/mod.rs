use serde_json::json;

use scout::config::OracleConfig;

/// Oracle config pointed at a wiremock server, with near-zero backoff so
/// retry tests run fast.
pub fn oracle_config(base_url: String, max_retries: u32) -> OracleConfig {
    OracleConfig {
        model: "openai/gpt-4o-mini".to_string(),
        api_key: Some("test-key".to_string()),
        base_url: Some(base_url),
        timeout_secs: 5,
        max_retries,
        backoff_base_ms: 1,
        backoff_cap_ms: 5,
        rate_limit_per_minute: 10_000,
    }
}

/// A chat-completion body whose message content is `content`.
pub fn completion_body(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "created": 1,
        "model": "gpt-4o-mini",
        "choices": [
            {
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": content
                },
                "finish_reason": "stop"
            }
        ],
        "usage": {
            "prompt_tokens": 1,
            "completion_tokens": 1,
            "total_tokens": 2
        }
    })
}

/// Message content carrying a full six-criterion rubric.
pub fn criteria_content(values: [f64; 6]) -> String {
    let names = [
        "education",
        "trajectory",
        "company",
        "experience",
        "location",
        "tenure",
    ];
    let items: Vec<serde_json::Value> = names
        .iter()
        .zip(values)
        .map(|(name, value)| json!({"name": name, "value": value, "rationale": "fixture"}))
        .collect();
    json!({ "criteria": items }).to_string()
}

pub fn api_error_body(message: &str, error_type: &str, code: &str) -> serde_json::Value {
    json!({
        "error": {
            "message": message,
            "type": error_type,
            "param": serde_json::Value::Null,
            "code": code
        }
    })
}
