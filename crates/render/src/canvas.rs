//! Page drawing primitives and document assembly on top of `lopdf`.
//!
//! Callers work in top-down coordinates (origin at the top-left corner of
//! the page, y growing downwards). Conversion to PDF user space happens
//! here and nowhere else.

use chrono::NaiveDate;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream, StringFormat};

use crate::error::RenderError;
use crate::format::encode_text;

pub const PAGE_WIDTH: f32 = 792.0;
pub const PAGE_HEIGHT: f32 = 612.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color(pub f32, pub f32, pub f32);

impl Color {
    pub const BLACK: Color = Color(0.0, 0.0, 0.0);
    pub const HEADER_BLUE: Color = Color(0.0, 0.0, 1.0);
    pub const WHITESMOKE: Color = Color(0.96, 0.96, 0.96);
    pub const ZEBRA: Color = Color(0.83, 0.83, 0.83);
    pub const LABEL_GREY: Color = Color(0.83, 0.83, 0.83);
    pub const MUTED: Color = Color(0.35, 0.35, 0.35);
    pub const BAR: Color = Color(0.53, 0.81, 0.92);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource_name(self) -> &'static [u8] {
        match self {
            Font::Regular => b"F1",
            Font::Bold => b"F2",
        }
    }
}

fn real(v: f32) -> Object {
    Object::Real(v.into())
}

fn color_operands(c: Color) -> Vec<Object> {
    vec![real(c.0), real(c.1), real(c.2)]
}

/// One page worth of content-stream operations.
#[derive(Debug, Default)]
pub struct Page {
    ops: Vec<Operation>,
    texts: Vec<String>,
}

impl Page {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every string drawn on the page, in drawing order.
    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    /// Draw `text` with its baseline at `baseline` (top-down).
    pub fn text(&mut self, x: f32, baseline: f32, font: Font, size: f32, color: Color, text: &str) {
        if text.is_empty() {
            return;
        }
        self.ops.push(Operation::new("BT", vec![]));
        self.ops.push(Operation::new(
            "Tf",
            vec![Object::Name(font.resource_name().to_vec()), real(size)],
        ));
        self.ops.push(Operation::new("rg", color_operands(color)));
        self.ops.push(Operation::new(
            "Td",
            vec![real(x), real(PAGE_HEIGHT - baseline)],
        ));
        self.ops.push(Operation::new(
            "Tj",
            vec![Object::String(encode_text(text), StringFormat::Literal)],
        ));
        self.ops.push(Operation::new("ET", vec![]));
        self.texts.push(text.to_owned());
    }

    fn rect_operands(x: f32, top: f32, w: f32, h: f32) -> Vec<Object> {
        vec![real(x), real(PAGE_HEIGHT - top - h), real(w), real(h)]
    }

    pub fn fill_rect(&mut self, x: f32, top: f32, w: f32, h: f32, color: Color) {
        self.ops.push(Operation::new("rg", color_operands(color)));
        self.ops.push(Operation::new("re", Self::rect_operands(x, top, w, h)));
        self.ops.push(Operation::new("f", vec![]));
    }

    pub fn stroke_rect(&mut self, x: f32, top: f32, w: f32, h: f32, width: f32) {
        self.ops.push(Operation::new("w", vec![real(width)]));
        self.ops.push(Operation::new("RG", color_operands(Color::BLACK)));
        self.ops.push(Operation::new("re", Self::rect_operands(x, top, w, h)));
        self.ops.push(Operation::new("S", vec![]));
    }

    pub fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, width: f32) {
        self.ops.push(Operation::new("w", vec![real(width)]));
        self.ops.push(Operation::new("RG", color_operands(Color::BLACK)));
        self.ops.push(Operation::new("m", vec![real(x1), real(PAGE_HEIGHT - y1)]));
        self.ops.push(Operation::new("l", vec![real(x2), real(PAGE_HEIGHT - y2)]));
        self.ops.push(Operation::new("S", vec![]));
    }

    fn encode(self) -> Result<Vec<u8>, RenderError> {
        let content = Content {
            operations: self.ops,
        };
        Ok(content.encode().map_err(lopdf::Error::from)?)
    }
}

/// Document-level metadata written to the Info dictionary.
#[derive(Debug, Clone)]
pub struct DocInfo {
    pub title: String,
    pub created: NaiveDate,
}

fn pdf_date(date: NaiveDate) -> String {
    format!("D:{}000000Z", date.format("%Y%m%d"))
}

/// Assemble `pages` into a serialised PDF.
///
/// Object ids are allocated in a fixed order so identical input yields
/// identical bytes.
pub fn assemble(pages: Vec<Page>, info: &DocInfo) -> Result<Vec<u8>, RenderError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular,
            "F2" => bold,
        },
    });

    let mut kids = Vec::with_capacity(pages.len());
    for page in pages {
        let stream = Stream::new(Dictionary::new(), page.encode()?);
        let content_id = doc.add_object(stream);
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(PAGE_WIDTH as i64),
                Object::Integer(PAGE_HEIGHT as i64),
            ],
        }),
    );

    let catalog = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::String(encode_text(&info.title), StringFormat::Literal),
        "Producer" => Object::string_literal("order-reports"),
        "CreationDate" => Object::string_literal(pdf_date(info.created)),
    });
    doc.trailer.set("Root", catalog);
    doc.trailer.set("Info", info_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).map_err(lopdf::Error::from)?;
    Ok(bytes)
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> DocInfo {
        DocInfo {
            title: "Daily Orders".into(),
            created: NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
        }
    }

    #[test]
    fn text_is_recorded_and_positioned_from_the_top() {
        let mut page = Page::new();
        page.text(36.0, 50.0, Font::Bold, 12.0, Color::BLACK, "Summary");
        page.text(36.0, 70.0, Font::Regular, 10.0, Color::BLACK, "");
        assert_eq!(page.texts(), ["Summary".to_owned()]);
        let td = page.ops.iter().find(|op| op.operator == "Td").unwrap();
        let y = td.operands[1].as_float().unwrap();
        assert!((y - (PAGE_HEIGHT - 50.0)).abs() < f32::EPSILON);
    }

    #[test]
    fn assembled_document_has_every_page() {
        let pages = (0..3)
            .map(|i| {
                let mut page = Page::new();
                page.text(36.0, 50.0, Font::Regular, 10.0, Color::BLACK, &format!("page {i}"));
                page
            })
            .collect();
        let bytes = assemble(pages, &info()).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 3);
    }

    #[test]
    fn creation_date_comes_from_the_run_date() {
        assert_eq!(pdf_date(info().created), "D:20261016000000Z");
        let bytes = assemble(vec![Page::new()], &info()).unwrap();
        let needle = b"D:20261016000000Z";
        assert!(bytes.windows(needle.len()).any(|w| w == needle));
    }
}
