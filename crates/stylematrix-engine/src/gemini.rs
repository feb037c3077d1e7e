use anyhow::{anyhow, bail, Context, Result};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Value};
use stylematrix_contracts::errors::GenerationFailed;
use stylematrix_contracts::records::ImageHandle;
use stylematrix_contracts::themes::ThemePalette;

use crate::client::{RenderClient, RenderRequest};
use crate::config::SessionConfig;
use crate::prompt::compose_prompt;

const ERROR_BODY_MAX_CHARS: usize = 512;

pub struct GeminiRenderClient {
    api_base: String,
    model: String,
    api_key: String,
    http: HttpClient,
    palette: ThemePalette,
}

impl GeminiRenderClient {
    pub fn new(config: &SessionConfig, palette: ThemePalette) -> Result<Self> {
        let Some(api_key) = config.credential.clone() else {
            bail!("GEMINI_API_KEY or GOOGLE_API_KEY not set");
        };
        let http = HttpClient::builder()
            .timeout(config.request_timeout)
            .build()
            .context("failed to build Gemini HTTP client")?;
        Ok(Self {
            api_base: config.api_base.trim().trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            http,
            palette,
        })
    }

    fn endpoint(&self) -> String {
        endpoint_for_model(&self.api_base, &self.model)
    }

    fn build_payload(&self, request: &RenderRequest) -> Result<Value> {
        let theme = self.palette.get(request.theme_index)?;
        Ok(json!({
            "contents": [{
                "role": "user",
                "parts": [
                    {
                        "inlineData": {
                            "mimeType": request.reference.mime_type(),
                            "data": request.reference.base64_data(),
                        }
                    },
                    { "text": compose_prompt(theme, &request.style_prompt) },
                ],
            }],
            "generationConfig": {
                "responseModalities": ["IMAGE"],
                "imageConfig": {
                    "aspectRatio": "1:1",
                    "imageSize": request.tier.as_str(),
                },
            },
        }))
    }

    fn post(&self, endpoint: &str, payload: &Value) -> Result<HttpResponse> {
        self.http
            .post(endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(payload)
            .send()
            .map_err(|raw| anyhow::Error::new(raw.without_url()))
            .with_context(|| format!("Gemini request failed ({endpoint})"))
    }

    fn render_once(&self, request: &RenderRequest) -> Result<ImageHandle> {
        let endpoint = self.endpoint();
        let payload = self.build_payload(request)?;
        let response = self.post(&endpoint, &payload)?;
        let response_payload = response_json_or_error("Gemini", response)?;
        match extract_first_image(&response_payload)? {
            Some(image) => Ok(image),
            None => Err(anyhow!(no_image_message(&response_payload))),
        }
    }
}

impl RenderClient for GeminiRenderClient {
    fn name(&self) -> &str {
        "gemini"
    }

    fn render(&self, request: &RenderRequest) -> Result<ImageHandle, GenerationFailed> {
        self.render_once(request)
            .map_err(|err| GenerationFailed::new(error_chain_text(&err, ERROR_BODY_MAX_CHARS)))
    }
}

fn endpoint_for_model(api_base: &str, model: &str) -> String {
    let trimmed = model.trim();
    let model_path = if trimmed.starts_with("models/") {
        trimmed.to_string()
    } else {
        format!("models/{trimmed}")
    };
    format!("{api_base}/{model_path}:generateContent")
}

fn response_json_or_error(provider: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .with_context(|| format!("{provider} response body read failed"))?;
    if !status.is_success() {
        bail!(
            "{provider} request failed ({code}): {}",
            truncate_text(&body, ERROR_BODY_MAX_CHARS)
        );
    }
    let parsed: Value = serde_json::from_str(&body)
        .with_context(|| format!("{provider} returned invalid JSON payload"))?;
    Ok(parsed)
}

/// First inline image across all candidates, as a data URI.
fn extract_first_image(response_payload: &Value) -> Result<Option<ImageHandle>> {
    let candidates = response_payload
        .get("candidates")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for candidate in candidates {
        let parts = candidate
            .get("content")
            .and_then(|content| content.get("parts"))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for part in parts {
            let Some(inline) = part
                .get("inlineData")
                .or_else(|| part.get("inline_data"))
                .and_then(Value::as_object)
            else {
                continue;
            };
            let data = inline
                .get("data")
                .and_then(Value::as_str)
                .map(str::trim)
                .unwrap_or_default();
            if data.is_empty() {
                continue;
            }
            let mime_type = inline
                .get("mimeType")
                .or_else(|| inline.get("mime_type"))
                .and_then(Value::as_str)
                .filter(|value| !value.trim().is_empty())
                .unwrap_or("image/png");
            return Ok(Some(ImageHandle::new(format!(
                "data:{mime_type};base64,{data}"
            ))));
        }
    }

    Ok(None)
}

fn no_image_message(response_payload: &Value) -> String {
    let block_reason = response_payload
        .get("promptFeedback")
        .and_then(|feedback| feedback.get("blockReason"))
        .and_then(Value::as_str);
    let finish_reason = response_payload
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|rows| rows.first())
        .and_then(|candidate| candidate.get("finishReason"))
        .and_then(Value::as_str);
    match (block_reason, finish_reason) {
        (Some(reason), _) => format!("Gemini returned no image data (blocked: {reason})"),
        (None, Some(reason)) if reason != "STOP" => {
            format!("Gemini returned no image data (finish reason: {reason})")
        }
        _ => "Gemini returned no image data".to_string(),
    }
}

fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if parts.last().map(|existing| existing == trimmed).unwrap_or(false) {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Context;
    use serde_json::json;
    use stylematrix_contracts::phase::RenderTier;
    use stylematrix_contracts::themes::ThemePalette;

    use super::{
        endpoint_for_model, error_chain_text, extract_first_image, no_image_message,
        truncate_text, GeminiRenderClient,
    };
    use crate::client::RenderRequest;
    use crate::config::SessionConfig;
    use crate::reference::ReferenceImage;

    fn request(tier: RenderTier) -> anyhow::Result<RenderRequest> {
        Ok(RenderRequest {
            reference: Arc::new(ReferenceImage::from_data_uri(
                "data:image/png;base64,iVBORw0KGgo=",
            )?),
            style_prompt: "retro 8-bit pixel art style with visible blocks".to_string(),
            theme_index: 1,
            tier,
        })
    }

    #[test]
    fn endpoint_accepts_bare_and_prefixed_model_names() {
        assert_eq!(
            endpoint_for_model("https://api.test/v1beta", "gemini-3-pro-image-preview"),
            "https://api.test/v1beta/models/gemini-3-pro-image-preview:generateContent"
        );
        assert_eq!(
            endpoint_for_model("https://api.test/v1beta", " models/custom "),
            "https://api.test/v1beta/models/custom:generateContent"
        );
    }

    #[test]
    fn client_requires_credential() {
        let err = GeminiRenderClient::new(&SessionConfig::default(), ThemePalette::reference());
        assert!(err.is_err());
    }

    #[test]
    fn payload_carries_image_prompt_and_tier() -> anyhow::Result<()> {
        let client = GeminiRenderClient::new(
            &SessionConfig::default().with_credential("test-key"),
            ThemePalette::reference(),
        )?;
        let payload = client.build_payload(&request(RenderTier::FourK)?)?;

        let parts = &payload["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], json!("image/png"));
        assert_eq!(parts[0]["inlineData"]["data"], json!("iVBORw0KGgo="));
        let text = parts[1]["text"].as_str().unwrap_or_default();
        assert!(text.contains("Emerald Green"));
        assert!(text.contains("retro 8-bit pixel art"));
        assert_eq!(
            payload["generationConfig"]["imageConfig"],
            json!({ "aspectRatio": "1:1", "imageSize": "4K" })
        );
        Ok(())
    }

    #[test]
    fn payload_rejects_unknown_theme() -> anyhow::Result<()> {
        let client = GeminiRenderClient::new(
            &SessionConfig::default().with_credential("test-key"),
            ThemePalette::reference(),
        )?;
        let mut bad = request(RenderTier::OneK)?;
        bad.theme_index = 42;
        assert!(client.build_payload(&bad).is_err());
        Ok(())
    }

    #[test]
    fn extracts_first_inline_image_skipping_text_parts() -> anyhow::Result<()> {
        let payload = json!({
            "candidates": [{
                "content": { "parts": [
                    { "text": "here you go" },
                    { "inlineData": { "mimeType": "image/jpeg", "data": "AAEC" } },
                    { "inlineData": { "mimeType": "image/png", "data": "ZZZZ" } },
                ]}
            }]
        });
        let image = extract_first_image(&payload)?.context("expected an image")?;
        assert_eq!(image.as_str(), "data:image/jpeg;base64,AAEC");

        let snake = json!({
            "candidates": [{ "content": { "parts": [
                { "inline_data": { "data": "AAEC" } }
            ]}}]
        });
        let image = extract_first_image(&snake)?.context("expected an image")?;
        assert_eq!(image.as_str(), "data:image/png;base64,AAEC");
        Ok(())
    }

    #[test]
    fn empty_responses_yield_no_image_with_reason() -> anyhow::Result<()> {
        assert!(extract_first_image(&json!({}))?.is_none());
        let blocked = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        assert!(extract_first_image(&blocked)?.is_none());
        assert_eq!(
            no_image_message(&blocked),
            "Gemini returned no image data (blocked: SAFETY)"
        );
        let stopped = json!({ "candidates": [{ "finishReason": "STOP" }] });
        assert_eq!(no_image_message(&stopped), "Gemini returned no image data");
        Ok(())
    }

    #[test]
    fn error_chain_joins_distinct_causes_and_truncates() {
        let err = anyhow::anyhow!("connection reset").context("Gemini request failed (x)");
        assert_eq!(
            error_chain_text(&err, 200),
            "Gemini request failed (x) | caused by: connection reset"
        );
        assert_eq!(truncate_text("abcdef", 3), "abc…");
    }
}
