//! Wire mapping shared by OpenAI-style chat/completions envelopes

use super::client::unix_now;
use super::{
    ApiError, ChatMessage, ChatResult, CompletionResult, GeneratedImage, ImageResult,
    ModelDescriptor, Role, TokenUsage,
};
use serde_json::{json, Map, Value};

/// Inline message array, with an optional system prompt placed first
pub(crate) fn wire_messages(system: Option<&str>, messages: &[ChatMessage]) -> Vec<Value> {
    let mut wire = Vec::with_capacity(messages.len() + 1);

    if let Some(system) = system.filter(|s| !s.is_empty()) {
        wire.push(json!({ "role": "system", "content": system }));
    }

    for msg in messages {
        wire.push(json!({
            "role": msg.role.as_str(),
            "content": msg.content
        }));
    }

    wire
}

/// Forward function-calling fields untouched
pub(crate) fn insert_functions(body: &mut Value, args: &super::ChatArgs) {
    insert_opt(body, "functions", args.functions.clone());
    insert_opt(body, "function_call", args.function_call.clone());
}

/// Set `key` on a JSON object when the value is present
pub(crate) fn insert_opt<T: Into<Value>>(body: &mut Value, key: &str, value: Option<T>) {
    if let (Some(value), Some(obj)) = (value, body.as_object_mut()) {
        obj.insert(key.to_string(), value.into());
    }
}

pub(crate) fn parse_usage(json: &Value, model: &ModelDescriptor) -> TokenUsage {
    TokenUsage::from_counts(
        json["usage"]["prompt_tokens"].as_u64(),
        json["usage"]["completion_tokens"].as_u64(),
    )
    .with_cost(model.pricing.as_ref())
}

fn created(json: &Value) -> i64 {
    json["created"].as_i64().unwrap_or_else(unix_now)
}

fn model_id(json: &Value, model: &ModelDescriptor) -> String {
    json["model"].as_str().unwrap_or(&model.id).to_string()
}

fn first_choice<'a>(json: &'a Value) -> Result<&'a Map<String, Value>, ApiError> {
    json["choices"][0]
        .as_object()
        .ok_or_else(|| ApiError::InvalidResponse("missing choices[0]".to_string()))
}

pub(crate) fn parse_chat(json: Value, model: &ModelDescriptor) -> Result<ChatResult, ApiError> {
    let choice = first_choice(&json)?;
    let null = Value::Null;
    let message = choice.get("message").unwrap_or(&null);

    let role = match message["role"].as_str() {
        Some("system") => Role::System,
        Some("user") => Role::User,
        _ => Role::Assistant,
    };

    Ok(ChatResult {
        content: message["content"].as_str().unwrap_or("").to_string(),
        role,
        function_call: message
            .get("function_call")
            .filter(|call| !call.is_null())
            .cloned(),
        finish_reason: choice
            .get("finish_reason")
            .and_then(Value::as_str)
            .map(str::to_string),
        usage: parse_usage(&json, model),
        model_id: model_id(&json, model),
        created_at: created(&json),
        id: json["id"].as_str().map(str::to_string),
    })
}

pub(crate) fn parse_completion(
    json: Value,
    model: &ModelDescriptor,
) -> Result<CompletionResult, ApiError> {
    let choice = first_choice(&json)?;

    Ok(CompletionResult {
        text: choice
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        finish_reason: choice
            .get("finish_reason")
            .and_then(Value::as_str)
            .map(str::to_string),
        usage: parse_usage(&json, model),
        model_id: model_id(&json, model),
        created_at: created(&json),
        id: json["id"].as_str().map(str::to_string),
    })
}

pub(crate) fn parse_images(json: Value) -> Result<ImageResult, ApiError> {
    let data = json["data"].as_array().cloned().unwrap_or_default();

    let images: Vec<GeneratedImage> = data
        .iter()
        .filter_map(|item| {
            let revised_prompt = item["revised_prompt"].as_str().map(str::to_string);
            if let Some(url) = item["url"].as_str() {
                Some(GeneratedImage::Url {
                    url: url.to_string(),
                    revised_prompt,
                })
            } else {
                item["b64_json"].as_str().map(|b64| GeneratedImage::B64Json {
                    b64_json: b64.to_string(),
                    revised_prompt,
                })
            }
        })
        .collect();

    if images.is_empty() {
        return Err(ApiError::InvalidResponse("no images in response".to_string()));
    }

    Ok(ImageResult {
        images,
        created_at: created(&json),
    })
}

/// Request body shared by OpenAI-style image endpoints
pub(crate) fn image_body(args: &super::ImageArgs, model: &ModelDescriptor) -> Value {
    json!({
        "model": model.id,
        "prompt": args.prompt,
        "size": args.size.as_deref().unwrap_or("1024x1024"),
        "quality": args.quality.as_deref().unwrap_or("standard"),
        "style": args.style.as_deref().unwrap_or("vivid"),
        "response_format": args.response_format.as_deref().unwrap_or("url"),
        "n": args.n.unwrap_or(1),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> ModelDescriptor {
        ModelDescriptor::chat("gpt-3.5-turbo", "GPT-3.5 Turbo", "").with_pricing(0.0000005, 0.0000015)
    }

    #[test]
    fn test_wire_messages_keep_order() {
        let wire = wire_messages(
            Some("be brief"),
            &[ChatMessage::user("a"), ChatMessage::assistant("b"), ChatMessage::user("c")],
        );
        let roles: Vec<&str> = wire.iter().map(|m| m["role"].as_str().unwrap()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
        assert_eq!(wire[3]["content"], "c");
    }

    #[test]
    fn test_parse_chat() {
        let json = json!({
            "id": "abc",
            "created": 1677652288,
            "model": "gpt-3.5-turbo",
            "choices": [{"message": {"role": "assistant", "content": "hello"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 9, "completion_tokens": 12, "total_tokens": 21}
        });

        let result = parse_chat(json, &model()).unwrap();
        assert_eq!(result.content, "hello");
        assert_eq!(result.finish_reason.as_deref(), Some("stop"));
        assert_eq!(result.id.as_deref(), Some("abc"));
        assert_eq!(result.created_at, 1677652288);
        assert_eq!(result.usage.total_tokens, 21);
        assert!(result.usage.estimated_cost_usd.is_some());
    }

    #[test]
    fn test_parse_chat_function_call() {
        let json = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "function_call": {"name": "get_weather", "arguments": "{\"city\":\"Oslo\"}"}
                },
                "finish_reason": "function_call"
            }],
            "usage": {"prompt_tokens": 4294967295u64, "completion_tokens": 1}
        });

        let result = parse_chat(json, &model()).unwrap();
        assert_eq!(result.content, "");
        assert_eq!(result.function_call.as_ref().unwrap()["name"], "get_weather");
        assert_eq!(result.usage.total_tokens, u32::MAX);
    }

    #[test]
    fn test_parse_chat_without_choices() {
        let err = parse_chat(json!({"choices": []}), &model()).unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }

    #[test]
    fn test_parse_images() {
        let result = parse_images(json!({
            "created": 10,
            "data": [{"url": "https://img/1.png", "revised_prompt": "a cat"}, {"b64_json": "aGk="}]
        }))
        .unwrap();

        assert_eq!(result.images.len(), 2);
        assert!(matches!(&result.images[1], GeneratedImage::B64Json { b64_json, .. } if b64_json == "aGk="));
        assert!(parse_images(json!({"data": []})).is_err());
    }

    #[test]
    fn test_insert_opt() {
        let mut body = json!({"model": "m"});
        insert_opt(&mut body, "stop", Some(vec!["\n".to_string()]));
        insert_opt::<f64>(&mut body, "top_p", None);
        assert_eq!(body["stop"][0], "\n");
        assert!(body.get("top_p").is_none());
    }
}
