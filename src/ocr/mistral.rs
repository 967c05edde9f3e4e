//! Mistral OCR provider (uses Mistral's OCR API).

use super::{OcrInput, OcrPage, OcrProvider, OcrResult};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub struct MistralOcrProvider {
    api_key: String,
    api_base: String,
    model: String,
    client: reqwest::Client,
}

impl MistralOcrProvider {
    pub fn new(
        client: reqwest::Client,
        api_key: impl Into<String>,
        api_base: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: api_base.into(),
            model: model.into(),
            client,
        }
    }
}

// ── Mistral API request/response types ──────────────────────────────────────

#[derive(Serialize)]
struct OcrRequest<'a> {
    model: &'a str,
    document: DocumentSource,
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum DocumentSource {
    #[serde(rename = "image_url")]
    Image { image_url: String },
}

#[derive(Deserialize)]
struct OcrResponse {
    pages: Vec<MistralPage>,
}

#[derive(Deserialize)]
struct MistralPage {
    index: u32,
    markdown: String,
}

// ── Provider implementation ─────────────────────────────────────────────────

#[async_trait::async_trait]
impl OcrProvider for MistralOcrProvider {
    fn name(&self) -> &str {
        "mistral_ocr"
    }

    async fn process(&self, input: &OcrInput) -> anyhow::Result<OcrResult> {
        let body = OcrRequest {
            model: &self.model,
            document: DocumentSource::Image {
                image_url: input.data_url(),
            },
        };

        info!(
            "MistralOcrProvider: calling OCR API for {} ({})",
            input.filename, input.media_type
        );

        let resp = self
            .client
            .post(format!("{}/ocr", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to send request to Mistral OCR")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("Mistral OCR API error ({}): {}", status, text);
        }

        let raw_text = resp.text().await?;
        debug!(
            "MistralOcrProvider: raw response ({} bytes): {}",
            raw_text.len(),
            raw_text.chars().take(500).collect::<String>()
        );

        Ok(into_result(parse_response(&raw_text)?))
    }
}

fn parse_response(raw: &str) -> anyhow::Result<OcrResponse> {
    serde_json::from_str(raw).context("Failed to parse Mistral OCR response")
}

fn into_result(ocr: OcrResponse) -> OcrResult {
    let mut pages = ocr.pages;
    pages.sort_by_key(|p| p.index);

    let pages = pages
        .into_iter()
        .map(|p| OcrPage {
            page_num: p.index + 1, // Normalize 0-indexed → 1-indexed
            text: p.markdown,
        })
        .collect();

    OcrResult::from_pages("mistral_ocr", pages)
}
