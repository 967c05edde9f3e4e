//! Scripted OCR and chat doubles for pipeline and handler tests.

use crate::llm::{ChatModel, Message};
use crate::ocr::{OcrInput, OcrPage, OcrProvider, OcrResult};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Echoes the decoded image bytes back as the page markdown and records inputs.
#[derive(Default)]
pub struct EchoOcr {
    pub calls: Mutex<Vec<OcrInput>>,
}

impl EchoOcr {
    pub fn filenames(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|c| c.filename.clone()).collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl OcrProvider for EchoOcr {
    fn name(&self) -> &str {
        "echo"
    }

    async fn process(&self, input: &OcrInput) -> anyhow::Result<OcrResult> {
        self.calls.lock().unwrap().push(input.clone());
        let text = String::from_utf8(BASE64.decode(&input.base64)?)?;
        Ok(OcrResult::from_pages(
            "echo",
            vec![OcrPage { page_num: 1, text }],
        ))
    }
}

/// Replays queued replies in order; an `Err` reply is returned as a failure.
#[derive(Default)]
pub struct ScriptedChat {
    replies: Mutex<VecDeque<Result<String, String>>>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedChat {
    pub fn new(replies: Vec<Result<&str, &str>>) -> Self {
        Self {
            replies: Mutex::new(
                replies
                    .into_iter()
                    .map(|r| r.map(str::to_string).map_err(str::to_string))
                    .collect(),
            ),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl ChatModel for ScriptedChat {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete_json(&self, messages: Vec<Message>) -> anyhow::Result<String> {
        self.prompts
            .lock()
            .unwrap()
            .push(messages.iter().map(Message::text).collect());
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(anyhow::anyhow!(message)),
            None => Err(anyhow::anyhow!("no scripted reply left")),
        }
    }
}

/// A data URL whose payload is `text`, so [`EchoOcr`] returns `text` verbatim.
pub fn text_data_url(text: &str) -> String {
    format!("data:image/jpeg;base64,{}", BASE64.encode(text))
}
