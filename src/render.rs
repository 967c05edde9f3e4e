//! HTML page rendering.

use crate::extractor::MAX_IMAGES;
use crate::vocabulary::VocabularyEntry;
use anyhow::{Context, Result};
use tera::{Context as TeraContext, Tera};

const PAGE_TEMPLATE: &str = include_str!("../templates/page.html.tera");

pub const PLACEHOLDER: &str = "Bitte lade ein oder mehrere Bilder hoch.";

/// What the output area of the page shows.
#[derive(Debug)]
pub enum PageView {
    Placeholder,
    Table(Vec<VocabularyEntry>),
    Error(String),
}

/// Render the upload page with the given output.
pub fn render_page(view: &PageView) -> Result<String> {
    let mut context = TeraContext::new();
    context.insert("max_images", &MAX_IMAGES);
    context.insert("placeholder", PLACEHOLDER);

    match view {
        PageView::Placeholder => context.insert("mode", "placeholder"),
        PageView::Table(rows) => {
            context.insert("mode", "table");
            context.insert("rows", rows);
        }
        PageView::Error(message) => {
            context.insert("mode", "error");
            context.insert("error", message);
        }
    }

    Tera::one_off(PAGE_TEMPLATE, &context, true).context("failed to render page template")
}
