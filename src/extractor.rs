//! Vocabulary extraction pipeline: upload → OCR → LLM → entries.

use crate::llm::ChatModel;
use crate::ocr::{OcrInput, OcrProvider};
use crate::prompt::build_messages;
use crate::upload::{sniff_media_type, TempImage, Upload};
use crate::vocabulary::{parse_vocabulary, VocabularyEntry};
use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Only this many uploads of a request are processed; the rest are ignored.
pub const MAX_IMAGES: usize = 5;

/// Extraction pipeline orchestrator.
pub struct VocabularyExtractor {
    ocr: Arc<dyn OcrProvider>,
    llm: Arc<dyn ChatModel>,
    scratch_dir: PathBuf,
}

impl VocabularyExtractor {
    pub fn new(ocr: Arc<dyn OcrProvider>, llm: Arc<dyn ChatModel>, scratch_dir: PathBuf) -> Self {
        Self {
            ocr,
            llm,
            scratch_dir,
        }
    }

    /// Run every upload (up to [`MAX_IMAGES`]) through the pipeline, in order.
    ///
    /// The first failure aborts the request; entries gathered from earlier
    /// images are dropped along with it.
    pub async fn extract_all(&self, uploads: &[Upload]) -> Result<Vec<VocabularyEntry>> {
        if uploads.len() > MAX_IMAGES {
            warn!(
                "Received {} uploads, only the first {} are processed",
                uploads.len(),
                MAX_IMAGES
            );
        }

        let mut vocabulary = Vec::new();
        for (i, upload) in uploads.iter().take(MAX_IMAGES).enumerate() {
            let batch = self
                .extract_one(upload)
                .await
                .with_context(|| format!("Image {} ('{}')", i + 1, upload.filename))?;
            vocabulary.extend(batch);
        }

        info!(
            "Extraction complete: {} entries from {} images",
            vocabulary.len(),
            uploads.len().min(MAX_IMAGES)
        );
        Ok(vocabulary)
    }

    /// Extract the vocabulary batch of a single image.
    pub async fn extract_one(&self, upload: &Upload) -> Result<Vec<VocabularyEntry>> {
        let data = upload.decode()?;
        info!("Processing {} ({} bytes)", upload.filename, data.len());

        // Removed when `image` drops, whichever way this function returns.
        let image = TempImage::write(&self.scratch_dir, &upload.filename, &data).await?;
        let bytes = image.read().await?;
        debug!("Scratch copy at {}", image.path().display());

        let input = OcrInput {
            filename: upload.filename.clone(),
            media_type: sniff_media_type(&bytes).to_string(),
            base64: BASE64.encode(&bytes),
        };

        let ocr = self
            .ocr
            .process(&input)
            .await
            .with_context(|| format!("OCR via {} failed", self.ocr.name()))?;
        debug!(
            "OCR ({}): pages {:?}, {} chars",
            ocr.provider_name,
            ocr.pages.iter().map(|p| p.page_num).collect::<Vec<_>>(),
            ocr.markdown.len()
        );

        let messages = build_messages(&ocr.markdown);
        debug!(
            "Prompt: {} chars",
            messages.iter().map(|m| m.text().len()).sum::<usize>()
        );
        let response = self
            .llm
            .complete_json(messages)
            .await
            .with_context(|| format!("Chat completion via {} failed", self.llm.name()))?;

        let batch = parse_vocabulary(&response)?;
        info!("{}: {} vocabulary entries", upload.filename, batch.len());
        Ok(batch)
    }
}
