use std::str::FromStr;

use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};

use crate::error::{Error, Result};
use crate::models::EntryDetail;

/// Closed set of export targets; anything else is rejected before any
/// rendering work happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Markdown,
    Pdf,
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Ok(ExportFormat::Markdown),
            "pdf" => Ok(ExportFormat::Pdf),
            other => Err(Error::UnsupportedFormat(other.to_string())),
        }
    }
}

pub struct ExportedDocument {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub filename: String,
}

/// Renders a fully loaded entry. Both formats share the same logical layout:
/// title, date, mood, tags, then every page in page-number order. Identical
/// entry state always produces identical markdown output.
pub fn export(detail: &EntryDetail, format: ExportFormat) -> Result<ExportedDocument> {
    match format {
        ExportFormat::Markdown => Ok(ExportedDocument {
            bytes: to_markdown(detail).into_bytes(),
            content_type: "text/markdown; charset=utf-8",
            filename: export_filename(detail, "md"),
        }),
        ExportFormat::Pdf => Ok(ExportedDocument {
            bytes: to_pdf(detail)?,
            content_type: "application/pdf",
            filename: export_filename(detail, "pdf"),
        }),
    }
}

fn title_or_default(detail: &EntryDetail) -> &str {
    detail.entry.title.as_deref().unwrap_or("Untitled Entry")
}

/// `YYYY-MM-DD HH:MM` out of the stored RFC 3339 timestamp.
fn display_date(date: &str) -> String {
    let mut out = String::with_capacity(16);
    out.push_str(date.get(..10).unwrap_or(date));
    if let Some(time) = date.get(11..16) {
        out.push(' ');
        out.push_str(time);
    }
    out
}

fn export_filename(detail: &EntryDetail, extension: &str) -> String {
    let date = detail.entry.date.get(..10).unwrap_or("undated");
    let slug = match &detail.entry.title {
        Some(title) if !title.trim().is_empty() => title
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '-' })
            .collect::<String>(),
        _ => "untitled".to_string(),
    };
    format!("{date}_{slug}.{extension}")
}

pub fn to_markdown(detail: &EntryDetail) -> String {
    let mut out = String::new();

    out.push_str(&format!("# {}\n\n", title_or_default(detail)));
    out.push_str(&format!("Date: {}\n", display_date(&detail.entry.date)));
    if let Some(mood) = &detail.entry.mood {
        out.push_str(&format!("Mood: {mood}\n"));
    }
    if !detail.tags.is_empty() {
        out.push_str(&format!("Tags: {}\n", detail.tags.join(", ")));
    }
    out.push_str("\n---\n\n");

    for page in &detail.pages {
        out.push_str(&format!("## Page {}\n\n", page.page_number));
        out.push_str(&format!(
            "![Page {} Image]({})\n\n",
            page.page_number, page.image_path
        ));
        if let Some(text) = page.text_content.as_deref().filter(|t| !t.is_empty()) {
            out.push_str(text);
            out.push('\n');
        }
        out.push_str("\n---\n\n");
    }

    out
}

const PAGE_WIDTH_MM: f32 = 215.9;
const PAGE_HEIGHT_MM: f32 = 279.4;
const MARGIN_MM: f32 = 20.0;
const BODY_WRAP_COLUMNS: usize = 90;

fn to_pdf(detail: &EntryDetail) -> Result<Vec<u8>> {
    let (doc, page, layer) = PdfDocument::new(
        title_or_default(detail),
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "content",
    );
    let body_font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| Error::Export(e.to_string()))?;
    let heading_font = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| Error::Export(e.to_string()))?;

    {
        let mut writer = PdfWriter {
            doc: &doc,
            layer: doc.get_page(page).get_layer(layer),
            y_mm: PAGE_HEIGHT_MM - MARGIN_MM,
        };

        writer.text(title_or_default(detail), &heading_font, 18.0, 10.0);
        writer.text(
            &format!("Date: {}", display_date(&detail.entry.date)),
            &body_font,
            10.0,
            5.0,
        );
        if let Some(mood) = &detail.entry.mood {
            writer.text(&format!("Mood: {mood}"), &body_font, 10.0, 5.0);
        }
        if !detail.tags.is_empty() {
            writer.text(
                &format!("Tags: {}", detail.tags.join(", ")),
                &body_font,
                10.0,
                5.0,
            );
        }
        writer.space(6.0);

        for page in &detail.pages {
            writer.text(
                &format!("Page {}", page.page_number),
                &heading_font,
                14.0,
                8.0,
            );
            if let Some(text) = page.text_content.as_deref().filter(|t| !t.is_empty()) {
                for paragraph in text.split("\n\n") {
                    for line in wrap_text(paragraph, BODY_WRAP_COLUMNS) {
                        writer.text(&line, &body_font, 11.0, 5.0);
                    }
                    writer.space(3.0);
                }
            }
            writer.space(6.0);
        }
    }

    doc.save_to_bytes().map_err(|e| Error::Export(e.to_string()))
}

struct PdfWriter<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    y_mm: f32,
}

impl PdfWriter<'_> {
    fn text(&mut self, text: &str, font: &IndirectFontRef, size: f32, line_height_mm: f32) {
        if self.y_mm - line_height_mm < MARGIN_MM {
            self.break_page();
        }
        self.y_mm -= line_height_mm;
        self.layer
            .use_text(text, size, Mm(MARGIN_MM), Mm(self.y_mm), font);
    }

    fn space(&mut self, height_mm: f32) {
        self.y_mm -= height_mm;
    }

    fn break_page(&mut self) {
        let (page, layer) = self
            .doc
            .add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "content");
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y_mm = PAGE_HEIGHT_MM - MARGIN_MM;
    }
}

fn wrap_text(text: &str, columns: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for source_line in text.lines() {
        let mut current = String::new();
        for word in source_line.split_whitespace() {
            if !current.is_empty() && current.len() + 1 + word.len() > columns {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }
    lines
}
