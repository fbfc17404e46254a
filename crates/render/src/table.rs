//! Summary and detail tables.

use reports::{OrderRecord, Summary};

use crate::canvas::{Color, Font};
use crate::error::RenderError;
use crate::format::{format_scalar, format_summary, truncate_to_width};
use crate::layout::{Layout, BODY_SIZE, CONTENT_WIDTH, MARGIN};

const SUMMARY_WIDTHS: [f32; 2] = [300.0, 200.0];
const SUMMARY_ROW_HEIGHT: f32 = 22.0;

const HEADER_SIZE: f32 = 12.0;
const HEADER_ROW_HEIGHT: f32 = 24.0;
const ROW_HEIGHT: f32 = 18.0;
const MAX_COLUMN_WIDTH: f32 = 200.0;
pub const MIN_COLUMN_WIDTH: f32 = 40.0;
const CELL_PADDING: f32 = 4.0;
const GRID_WIDTH: f32 = 0.75;

pub const NO_RECORDS: &str = "No records found for the specified period.";

/// Most columns the detail table can hold.
pub fn max_columns() -> usize {
    (CONTENT_WIDTH / MIN_COLUMN_WIDTH) as usize
}

/// Column width for `columns` detail columns.
pub fn column_width(columns: usize) -> Result<f32, RenderError> {
    if columns == 0 {
        return Err(RenderError::NoColumns);
    }
    let width = (CONTENT_WIDTH / columns as f32).min(MAX_COLUMN_WIDTH);
    if width < MIN_COLUMN_WIDTH {
        return Err(RenderError::TooManyColumns {
            columns,
            max: max_columns(),
        });
    }
    Ok(width)
}

fn baseline(top: f32, row_height: f32, size: f32) -> f32 {
    top + (row_height + size * 0.7) / 2.0
}

/// Label/value rows with a grey label column.
pub fn summary_table(layout: &mut Layout, summary: &Summary) {
    let total_width: f32 = SUMMARY_WIDTHS.iter().sum();
    for entry in summary.entries() {
        layout.ensure(SUMMARY_ROW_HEIGHT);
        let top = layout.cursor();
        let value = format_summary(&entry.value);
        let page = layout.page();

        page.fill_rect(MARGIN, top, SUMMARY_WIDTHS[0], SUMMARY_ROW_HEIGHT, Color::LABEL_GREY);
        let text_y = baseline(top, SUMMARY_ROW_HEIGHT, BODY_SIZE);
        let label = truncate_to_width(&entry.label, SUMMARY_WIDTHS[0] - 2.0 * CELL_PADDING, BODY_SIZE);
        page.text(MARGIN + CELL_PADDING, text_y, Font::Regular, BODY_SIZE, Color::BLACK, &label);
        let value = truncate_to_width(&value, SUMMARY_WIDTHS[1] - 2.0 * CELL_PADDING, BODY_SIZE);
        page.text(
            MARGIN + SUMMARY_WIDTHS[0] + CELL_PADDING,
            text_y,
            Font::Regular,
            BODY_SIZE,
            Color::BLACK,
            &value,
        );

        page.stroke_rect(MARGIN, top, total_width, SUMMARY_ROW_HEIGHT, GRID_WIDTH);
        page.line(
            MARGIN + SUMMARY_WIDTHS[0],
            top,
            MARGIN + SUMMARY_WIDTHS[0],
            top + SUMMARY_ROW_HEIGHT,
            GRID_WIDTH,
        );
        layout.advance(SUMMARY_ROW_HEIGHT);
    }
}

struct RowStyle {
    height: f32,
    font: Font,
    size: f32,
    fill: Option<Color>,
    text: Color,
}

const HEADER_STYLE: RowStyle = RowStyle {
    height: HEADER_ROW_HEIGHT,
    font: Font::Bold,
    size: HEADER_SIZE,
    fill: Some(Color::HEADER_BLUE),
    text: Color::WHITESMOKE,
};

fn draw_row(layout: &mut Layout, cells: &[String], width: f32, style: &RowStyle) {
    let top = layout.cursor();
    let row_width = width * cells.len() as f32;
    let page = layout.page();
    if let Some(fill) = style.fill {
        page.fill_rect(MARGIN, top, row_width, style.height, fill);
    }
    let text_y = baseline(top, style.height, style.size);
    for (i, cell) in cells.iter().enumerate() {
        let x = MARGIN + width * i as f32;
        let text = truncate_to_width(cell, width - 2.0 * CELL_PADDING, style.size);
        page.text(x + CELL_PADDING, text_y, style.font, style.size, style.text, &text);
    }
    page.stroke_rect(MARGIN, top, row_width, style.height, GRID_WIDTH);
    for i in 1..cells.len() {
        let x = MARGIN + width * i as f32;
        page.line(x, top, x, top + style.height, GRID_WIDTH);
    }
    layout.advance(style.height);
}

/// The detail table. The header row repeats at the top of every page the
/// table spans, and a row is never split across pages.
pub fn detail_table(
    layout: &mut Layout,
    columns: &[String],
    records: &[OrderRecord],
) -> Result<(), RenderError> {
    let width = column_width(columns.len())?;

    if records.is_empty() {
        layout.paragraph(NO_RECORDS, BODY_SIZE, Color::BLACK);
        return Ok(());
    }

    layout.ensure(HEADER_ROW_HEIGHT + ROW_HEIGHT);
    draw_row(layout, columns, width, &HEADER_STYLE);

    for (index, record) in records.iter().enumerate() {
        if layout.remaining() < ROW_HEIGHT {
            layout.break_page();
            draw_row(layout, columns, width, &HEADER_STYLE);
        }
        let cells: Vec<String> = columns
            .iter()
            .map(|field| record.get(field).map(format_scalar).unwrap_or_default())
            .collect();
        // data rows are 1-based under the header; every even one is shaded
        let style = RowStyle {
            height: ROW_HEIGHT,
            font: Font::Regular,
            size: BODY_SIZE,
            fill: (index % 2 == 1).then_some(Color::ZEBRA),
            text: Color::BLACK,
        };
        draw_row(layout, &cells, width, &style);
    }
    Ok(())
}
