//! Vocab Extractor - turns photos of textbook vocabulary tables into
//! English/German word lists via Mistral OCR and a Mistral chat model.

mod config;
mod error;
mod extractor;
mod llm;
mod ocr;
mod prompt;
mod render;
mod upload;
mod vocabulary;

#[cfg(test)]
mod test_util;

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{Html, Json},
    routing::{get, post},
    Router,
};
use config::AppConfig;
use error::UploadError;
use extractor::{VocabularyExtractor, MAX_IMAGES};
use llm::MistralChatClient;
use ocr::mistral::MistralOcrProvider;
use render::{render_page, PageView};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn, Instrument};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use upload::Upload;
use vocabulary::VocabularyEntry;

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    extractor: Arc<VocabularyExtractor>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "vocab_extractor=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let http = reqwest::Client::new();
    let ocr = MistralOcrProvider::new(
        http.clone(),
        &config.api_key,
        &config.api_base,
        &config.ocr_model,
    );
    let llm = MistralChatClient::new(http, &config.api_key, &config.api_base, &config.chat_model);
    info!("Mistral clients initialized");

    let state = AppState {
        extractor: Arc::new(VocabularyExtractor::new(
            Arc::new(ocr),
            Arc::new(llm),
            config.scratch_dir.clone(),
        )),
    };

    let app = Router::new()
        .route("/", get(index).post(upload_form))
        .route("/api/extract", post(extract_api))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Server listening on http://{}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Upload page with the placeholder output.
async fn index() -> Result<Html<String>, (StatusCode, String)> {
    page(&PageView::Placeholder)
}

/// Multipart form upload; renders the vocabulary table or the error message.
async fn upload_form(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Html<String>, (StatusCode, String)> {
    let mut uploads = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (StatusCode::BAD_REQUEST, format!("Multipart error: {}", e))
    })? {
        if field.name() != Some("files") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await.map_err(|e| {
            (StatusCode::BAD_REQUEST, format!("Failed to read file: {}", e))
        })?;

        // Browsers send one empty part when no file was picked.
        if filename.is_empty() && data.is_empty() {
            continue;
        }
        uploads.push(Upload::bytes(filename, data.to_vec()));
    }

    info!("Received {} files via form", uploads.len());
    page(&view_for_uploads(&state, &uploads).await)
}

#[derive(serde::Deserialize)]
struct ExtractRequest {
    #[serde(default)]
    files: Vec<UploadedFile>,
}

#[derive(serde::Deserialize)]
struct UploadedFile {
    filename: String,
    /// `data:<media type>;base64,<payload>`
    content: String,
}

#[derive(Debug, serde::Serialize)]
struct ExtractResponse {
    vocabulary: Vec<VocabularyEntry>,
    images_processed: usize,
}

/// JSON variant of the upload: data-URL files in, vocabulary out.
async fn extract_api(
    State(state): State<AppState>,
    Json(request): Json<ExtractRequest>,
) -> Result<Json<ExtractResponse>, (StatusCode, Json<serde_json::Value>)> {
    let uploads: Vec<Upload> = request
        .files
        .into_iter()
        .map(|f| Upload::data_url(f.filename, f.content))
        .collect();
    let images_processed = uploads.len().min(MAX_IMAGES);

    let result = state
        .extractor
        .extract_all(&uploads)
        .instrument(request_span())
        .await;

    match result {
        Ok(vocabulary) => Ok(Json(ExtractResponse {
            vocabulary,
            images_processed,
        })),
        Err(e) => {
            error!("Extraction failed: {:#}", e);
            Err((
                status_for(&e),
                Json(serde_json::json!({ "error": format!("{:#}", e) })),
            ))
        }
    }
}

// ============================================================================
// Helper functions
// ============================================================================

/// Run the pipeline for a form submission and decide what the page shows.
async fn view_for_uploads(state: &AppState, uploads: &[Upload]) -> PageView {
    if uploads.is_empty() {
        return PageView::Placeholder;
    }

    match state
        .extractor
        .extract_all(uploads)
        .instrument(request_span())
        .await
    {
        Ok(vocabulary) => PageView::Table(vocabulary),
        Err(e) => {
            warn!("Extraction failed: {:#}", e);
            PageView::Error(format!("{:#}", e))
        }
    }
}

/// Tags every log line of one extraction run with a request id.
fn request_span() -> tracing::Span {
    tracing::info_span!("extract", request_id = %uuid::Uuid::new_v4())
}

/// Bad uploads are the client's fault; scratch-file I/O is ours; the rest is upstream.
fn status_for(e: &anyhow::Error) -> StatusCode {
    match e.downcast_ref::<UploadError>() {
        Some(UploadError::Io { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
        Some(_) => StatusCode::BAD_REQUEST,
        None => StatusCode::BAD_GATEWAY,
    }
}

fn page(view: &PageView) -> Result<Html<String>, (StatusCode, String)> {
    render_page(view).map(Html).map_err(|e| {
        error!("Rendering failed: {:#}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, format!("Rendering failed: {}", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{text_data_url, EchoOcr, ScriptedChat};
    use axum::body::Body;
    use axum::extract::FromRequest;
    use axum::http::Request;
    use tempfile::{tempdir, TempDir};

    const BOUNDARY: &str = "vocab-test-boundary";

    /// The scratch dir lives as long as the returned `TempDir`.
    fn state(ocr: Arc<EchoOcr>, chat: Arc<ScriptedChat>) -> (AppState, TempDir) {
        let dir = tempdir().unwrap();
        let state = AppState {
            extractor: Arc::new(VocabularyExtractor::new(ocr, chat, dir.path().to_path_buf())),
        };
        (state, dir)
    }

    /// One multipart part: field name, optional filename, body.
    type Part<'a> = (&'a str, Option<&'a str>, &'a str);

    fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, filename, data) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            let disposition = match filename {
                Some(f) => format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{f}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n"
                ),
                None => format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n"),
            };
            body.extend_from_slice(disposition.as_bytes());
            body.extend_from_slice(data.as_bytes());
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    /// Submit the upload form with a real multipart body and return the page.
    async fn submit_form(state: &AppState, parts: &[Part<'_>]) -> String {
        let request = Request::builder()
            .method("POST")
            .uri("/")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap();
        let multipart = Multipart::from_request(request, state).await.unwrap();

        let Html(html) = upload_form(State(state.clone()), multipart).await.unwrap();
        html
    }

    fn three_each(prefix: &str) -> String {
        format!(
            r#"{{"vocabulary_lst": [{{"{p}1": "X"}}, {{"{p}2": "Y"}}, {{"{p}3": "Z"}}]}}"#,
            p = prefix
        )
    }

    #[tokio::test]
    async fn test_index_shows_placeholder() {
        let Html(html) = index().await.unwrap();
        assert!(html.contains(render::PLACEHOLDER));
    }

    #[tokio::test]
    async fn test_no_uploads_calls_no_service() {
        let ocr = Arc::new(EchoOcr::default());
        let chat = Arc::new(ScriptedChat::default());
        let (state, _dir) = state(ocr.clone(), chat.clone());

        let view = view_for_uploads(&state, &[]).await;
        assert!(matches!(view, PageView::Placeholder));
        assert_eq!(ocr.call_count(), 0);
        assert_eq!(chat.call_count(), 0);
    }

    #[tokio::test]
    async fn test_form_skips_empty_file_part() {
        let ocr = Arc::new(EchoOcr::default());
        let chat = Arc::new(ScriptedChat::default());
        let (state, _dir) = state(ocr.clone(), chat.clone());

        let html = submit_form(&state, &[("files", Some(""), "")]).await;

        assert!(html.contains(render::PLACEHOLDER));
        assert_eq!(ocr.call_count(), 0);
        assert_eq!(chat.call_count(), 0);
    }

    #[tokio::test]
    async fn test_form_only_reads_files_fields() {
        let ocr = Arc::new(EchoOcr::default());
        let chat = Arc::new(ScriptedChat::new(vec![Ok(
            r#"{"vocabulary_lst": [{"book": "Buch"}]}"#,
        )]));
        let (state, _dir) = state(ocr.clone(), chat.clone());

        let html = submit_form(
            &state,
            &[
                ("note", None, "ignore me"),
                ("files", Some("p1.jpg"), "| book | Buch |"),
                ("avatar", Some("me.png"), "not a page"),
                ("files", Some(""), ""),
            ],
        )
        .await;

        assert_eq!(ocr.filenames(), vec!["p1.jpg"]);
        assert_eq!(chat.call_count(), 1);
        assert!(chat.prompts.lock().unwrap()[0].contains("| book | Buch |"));
        assert!(html.contains("<tr><td>book</td><td>Buch</td></tr>"));
    }

    #[tokio::test]
    async fn test_two_images_render_six_rows() {
        let (a, b) = (three_each("a"), three_each("b"));
        let chat = Arc::new(ScriptedChat::new(vec![Ok(a.as_str()), Ok(b.as_str())]));
        let (state, _dir) = state(Arc::new(EchoOcr::default()), chat);

        let uploads = vec![
            Upload::bytes("p1.jpg", b"one".to_vec()),
            Upload::bytes("p2.jpg", b"two".to_vec()),
        ];
        let view = view_for_uploads(&state, &uploads).await;
        let Html(html) = page(&view).unwrap();

        assert_eq!(html.matches("<tr><td>").count(), 6);
        let a1 = html.find("<td>a1</td>").unwrap();
        let a3 = html.find("<td>a3</td>").unwrap();
        let b1 = html.find("<td>b1</td>").unwrap();
        assert!(a1 < a3 && a3 < b1);
    }

    #[tokio::test]
    async fn test_error_on_second_image_replaces_all_output() {
        let first = three_each("kept");
        let chat = Arc::new(ScriptedChat::new(vec![
            Ok(first.as_str()),
            Err("upstream exploded"),
            Ok(first.as_str()),
        ]));
        let (state, _dir) = state(Arc::new(EchoOcr::default()), chat.clone());

        let uploads: Vec<Upload> = (1..=3)
            .map(|i| Upload::bytes(format!("{i}.jpg"), b"x".to_vec()))
            .collect();
        let Html(html) = page(&view_for_uploads(&state, &uploads).await).unwrap();

        assert!(html.contains("upstream exploded"));
        assert!(!html.contains("kept1"));
        assert!(!html.contains("<table>"));
        assert_eq!(chat.call_count(), 2);
    }

    #[tokio::test]
    async fn test_api_returns_vocabulary() {
        let chat = Arc::new(ScriptedChat::new(vec![Ok(
            r#"{"vocabulary_lst": [{"book": "Buch"}, {"pen": "Stift"}]}"#,
        )]));
        let (state, _dir) = state(Arc::new(EchoOcr::default()), chat);

        let request = ExtractRequest {
            files: vec![UploadedFile {
                filename: "page.jpg".to_string(),
                content: text_data_url("| book | Buch |"),
            }],
        };
        let Json(response) = extract_api(State(state), Json(request)).await.unwrap();

        assert_eq!(response.images_processed, 1);
        assert_eq!(
            response.vocabulary,
            vec![VocabularyEntry::new("book", "Buch"), VocabularyEntry::new("pen", "Stift")]
        );
    }

    #[tokio::test]
    async fn test_api_error_statuses() {
        let (state, _dir) = state(
            Arc::new(EchoOcr::default()),
            Arc::new(ScriptedChat::new(vec![Ok(r#"{"nope": 1}"#)])),
        );

        let bad_upload = ExtractRequest {
            files: vec![UploadedFile {
                filename: "a.jpg".to_string(),
                content: "not a data url".to_string(),
            }],
        };
        let (status, Json(body)) = extract_api(State(state.clone()), Json(bad_upload))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("a.jpg"));

        let missing_key = ExtractRequest {
            files: vec![UploadedFile {
                filename: "b.jpg".to_string(),
                content: text_data_url("text"),
            }],
        };
        let (status, Json(body)) = extract_api(State(state), Json(missing_key))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].as_str().unwrap().contains("vocabulary_lst"));
    }

    #[tokio::test]
    async fn test_api_scratch_dir_failure_is_a_server_error() {
        let chat = Arc::new(ScriptedChat::default());
        let dir = tempdir().unwrap();
        let state = AppState {
            extractor: Arc::new(VocabularyExtractor::new(
                Arc::new(EchoOcr::default()),
                chat.clone(),
                dir.path().join("missing"),
            )),
        };

        let request = ExtractRequest {
            files: vec![UploadedFile {
                filename: "a.jpg".to_string(),
                content: text_data_url("text"),
            }],
        };
        let (status, _) = extract_api(State(state), Json(request)).await.unwrap_err();

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(chat.call_count(), 0);
    }

    #[tokio::test]
    async fn test_api_empty_request() {
        let chat = Arc::new(ScriptedChat::default());
        let (state, _dir) = state(Arc::new(EchoOcr::default()), chat.clone());

        let Json(response) = extract_api(State(state), Json(ExtractRequest { files: vec![] }))
            .await
            .unwrap();
        assert!(response.vocabulary.is_empty());
        assert_eq!(response.images_processed, 0);
        assert_eq!(chat.call_count(), 0);
    }
}
