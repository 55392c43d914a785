//! Cell formats for synthesized workbooks, plus a styles.xml reader that
//! resolves a cell's style index back to fill, font and alignment.
//!
//! The reader only understands what the synthesizer writes: solid pattern
//! fills with explicit RGB, font colour and bold, alignment and thin
//! borders. Theme and indexed colours come back as `None`.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder};
use serde::Serialize;

use auditgrid_engine::column::ColorPair;

use crate::xlsx_validation::parse_cell_ref;

pub const HEADER_FILL: u32 = 0x0F172A;
pub const HEADER_TEXT: u32 = 0xFFFFFF;
pub const HEADER_FONT_SIZE: f64 = 11.0;
/// Header row height in points.
pub const HEADER_ROW_HEIGHT: f64 = 35.0;

// =============================================================================
// Export formats
// =============================================================================

/// Bold white on dark, centred both ways.
pub fn header_format() -> Format {
    Format::new()
        .set_bold()
        .set_font_size(HEADER_FONT_SIZE)
        .set_font_color(Color::RGB(HEADER_TEXT))
        .set_background_color(Color::RGB(HEADER_FILL))
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
        .set_border(FormatBorder::Thin)
}

/// Wrapped, top-aligned, thin-bordered data cell. A colour pair adds fill,
/// font colour and bold.
pub fn data_format(color: Option<ColorPair>) -> Format {
    let format = Format::new()
        .set_text_wrap()
        .set_align(FormatAlign::Top)
        .set_border(FormatBorder::Thin);

    match color {
        Some(pair) => format
            .set_bold()
            .set_background_color(Color::RGB(pair.fill))
            .set_font_color(Color::RGB(pair.text)),
        None => format,
    }
}

// =============================================================================
// Read-back
// =============================================================================

/// Resolved formatting of one `cellXfs` entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellStyle {
    pub bold: bool,
    /// `0xRRGGBB`
    pub font_color: Option<u32>,
    /// `0xRRGGBB` of a solid fill
    pub fill: Option<u32>,
    pub wrap: bool,
    pub horizontal: Option<String>,
    pub vertical: Option<String>,
    pub bordered: bool,
}

/// Parsed `cellXfs` table, indexed by a cell's `s` attribute.
#[derive(Debug, Clone, Default)]
pub struct StyleTable {
    styles: Vec<CellStyle>,
}

impl StyleTable {
    pub fn get(&self, id: usize) -> Option<&CellStyle> {
        self.styles.get(id)
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
struct ParsedFont {
    bold: bool,
    color: Option<u32>,
}

/// Parse styles.xml into a style table.
pub fn parse_styles_xml(xml: &str) -> StyleTable {
    let fonts = parse_fonts(xml);
    let fills = parse_fills(xml);
    let borders = parse_borders(xml);
    let styles = parse_cell_xfs(xml, &fonts, &fills, &borders);
    StyleTable { styles }
}

/// `AARRGGBB` or `RRGGBB` to `0xRRGGBB`.
fn parse_argb(hex: &str) -> Option<u32> {
    let hex = hex.trim_start_matches('#');
    let rgb = match hex.len() {
        8 => &hex[2..],
        6 => hex,
        _ => return None,
    };
    u32::from_str_radix(rgb, 16).ok()
}

fn attr(e: &BytesStart, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .map(|a| String::from_utf8_lossy(&a.value).to_string())
}

fn attr_usize(e: &BytesStart, name: &[u8]) -> Option<usize> {
    attr(e, name).and_then(|v| v.parse().ok())
}

fn parse_fonts(xml: &str) -> Vec<ParsedFont> {
    let mut fonts = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut depth = 0; // 1 = <fonts>, 2 = <font>
    let mut current = ParsedFont::default();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"fonts" if depth == 0 => depth = 1,
                b"font" if depth == 1 => {
                    depth = 2;
                    current = ParsedFont::default();
                }
                _ => {}
            },
            Ok(Event::Empty(ref e)) if depth == 2 => match e.name().as_ref() {
                b"b" => current.bold = true,
                b"color" => current.color = attr(e, b"rgb").and_then(|v| parse_argb(&v)),
                _ => {}
            },
            Ok(Event::Empty(ref e)) if depth == 1 && e.name().as_ref() == b"font" => {
                fonts.push(ParsedFont::default());
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"font" if depth == 2 => {
                    fonts.push(std::mem::take(&mut current));
                    depth = 1;
                }
                b"fonts" => break,
                _ => {}
            },
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    fonts
}

/// Solid fill colour per `<fill>`; `None` for pattern "none"/"gray125".
fn parse_fills(xml: &str) -> Vec<Option<u32>> {
    let mut fills = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut depth = 0; // 1 = <fills>, 2 = <fill>
    let mut solid = false;
    let mut current: Option<u32> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"fills" if depth == 0 => depth = 1,
                b"fill" if depth == 1 => {
                    depth = 2;
                    current = None;
                    solid = false;
                }
                b"patternFill" if depth == 2 => {
                    solid = attr(e, b"patternType").as_deref() == Some("solid");
                }
                _ => {}
            },
            Ok(Event::Empty(ref e)) if depth == 2 => {
                if e.name().as_ref() == b"fgColor" && solid {
                    current = attr(e, b"rgb").and_then(|v| parse_argb(&v));
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"fill" if depth == 2 => {
                    fills.push(current.take());
                    depth = 1;
                }
                b"fills" => break,
                _ => {}
            },
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    fills
}

/// Whether each `<border>` has a styled edge.
fn parse_borders(xml: &str) -> Vec<bool> {
    let mut borders = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut depth = 0; // 1 = <borders>, 2 = <border>
    let mut styled = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"borders" if depth == 0 => depth = 1,
                b"border" if depth == 1 => {
                    depth = 2;
                    styled = false;
                }
                b"left" | b"right" | b"top" | b"bottom" if depth == 2 => {
                    styled |= attr(e, b"style").is_some();
                }
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"border" if depth == 1 => borders.push(false),
                b"left" | b"right" | b"top" | b"bottom" if depth == 2 => {
                    styled |= attr(e, b"style").is_some();
                }
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"border" if depth == 2 => {
                    borders.push(styled);
                    depth = 1;
                }
                b"borders" => break,
                _ => {}
            },
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    borders
}

fn parse_cell_xfs(xml: &str, fonts: &[ParsedFont], fills: &[Option<u32>], borders: &[bool]) -> Vec<CellStyle> {
    let mut styles = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_cell_xfs = false;
    let mut current: Option<CellStyle> = None;

    let resolve = |e: &BytesStart| -> CellStyle {
        let font = attr_usize(e, b"fontId").and_then(|i| fonts.get(i)).cloned().unwrap_or_default();
        CellStyle {
            bold: font.bold,
            font_color: font.color,
            fill: attr_usize(e, b"fillId").and_then(|i| fills.get(i).copied().flatten()),
            bordered: attr_usize(e, b"borderId").and_then(|i| borders.get(i).copied()).unwrap_or(false),
            ..CellStyle::default()
        }
    };

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"cellXfs" => in_cell_xfs = true,
                b"xf" if in_cell_xfs => current = Some(resolve(e)),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"xf" if in_cell_xfs => styles.push(resolve(e)),
                b"alignment" => {
                    if let Some(style) = current.as_mut() {
                        style.horizontal = attr(e, b"horizontal");
                        style.vertical = attr(e, b"vertical");
                        style.wrap = attr(e, b"wrapText").is_some_and(|v| v == "1" || v == "true");
                    }
                }
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"xf" => {
                    if let Some(style) = current.take() {
                        styles.push(style);
                    }
                }
                b"cellXfs" => break,
                _ => {}
            },
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    styles
}

/// `(row, col, style id)` for every `<c>` carrying an `s` attribute.
pub fn parse_cell_style_ids(sheet_xml: &str) -> Vec<(u32, u16, usize)> {
    let mut cells = Vec::new();
    let mut reader = Reader::from_str(sheet_xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) if e.name().as_ref() == b"c" => {
                let cell = attr(e, b"r").and_then(|r| parse_cell_ref(&r));
                if let (Some((row, col)), Some(style)) = (cell, attr_usize(e, b"s")) {
                    cells.push((row, col, style));
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    cells
}
