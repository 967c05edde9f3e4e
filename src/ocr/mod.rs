//! OCR provider abstraction.
//!
//! The extractor only sees [`OcrProvider`], so the Mistral backend can be
//! replaced (or mocked in tests) without touching the pipeline.

pub mod mistral;

/// Per-page OCR output (always 1-indexed).
#[derive(Debug, Clone)]
pub struct OcrPage {
    pub page_num: u32,
    pub text: String,
}

/// Unified OCR result returned by every provider.
#[derive(Debug, Clone)]
pub struct OcrResult {
    /// All page texts joined in page order with no separator.
    pub markdown: String,
    pub pages: Vec<OcrPage>,
    pub provider_name: String,
}

impl OcrResult {
    pub fn from_pages(provider_name: impl Into<String>, pages: Vec<OcrPage>) -> Self {
        let markdown = pages.iter().map(|p| p.text.as_str()).collect::<String>();
        Self {
            markdown,
            pages,
            provider_name: provider_name.into(),
        }
    }
}

/// A single image handed to an OCR provider.
#[derive(Debug, Clone)]
pub struct OcrInput {
    pub filename: String,
    pub media_type: String,
    /// Base64 of the image bytes, without any prefix.
    pub base64: String,
}

impl OcrInput {
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.base64)
    }
}

/// Async trait implemented by each OCR backend.
#[async_trait::async_trait]
pub trait OcrProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn process(&self, input: &OcrInput) -> anyhow::Result<OcrResult>;
}
