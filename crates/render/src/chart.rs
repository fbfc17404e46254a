//! Vector bar chart for `group` summaries.

use reports::aggregate::GroupCount;

use crate::canvas::{Color, Font};
use crate::format::{format_int, text_width, truncate_to_width};
use crate::layout::{Layout, MARGIN};

pub const CHART_WIDTH: f32 = 432.0;
pub const CHART_HEIGHT: f32 = 216.0;

const AXIS_GUTTER: f32 = 36.0;
const LABEL_BAND: f32 = 30.0;
const VALUE_BAND: f32 = 14.0;
const LABEL_SIZE: f32 = 8.0;

/// Draw one bar per group, tallest scaled to the plot height. The caller
/// has already placed the chart heading.
pub fn bar_chart(layout: &mut Layout, axis_label: &str, groups: &[GroupCount]) {
    layout.ensure(CHART_HEIGHT);
    let top = layout.cursor();
    let page = layout.page();

    let plot_left = MARGIN + AXIS_GUTTER;
    let plot_width = CHART_WIDTH - AXIS_GUTTER;
    let plot_top = top + VALUE_BAND;
    let plot_bottom = top + CHART_HEIGHT - LABEL_BAND;
    let plot_height = plot_bottom - plot_top;

    page.line(plot_left, plot_top, plot_left, plot_bottom, 0.75);
    page.line(plot_left, plot_bottom, plot_left + plot_width, plot_bottom, 0.75);
    page.text(MARGIN, plot_top + LABEL_SIZE, Font::Regular, LABEL_SIZE, Color::MUTED, "Count");

    let max = groups.iter().map(|g| g.count).max().unwrap_or(0);
    if max > 0 {
        let slot = plot_width / groups.len() as f32;
        let bar_width = slot * 0.7;
        for (i, group) in groups.iter().enumerate() {
            let height = plot_height * group.count as f32 / max as f32;
            let x = plot_left + slot * i as f32 + (slot - bar_width) / 2.0;
            let bar_top = plot_bottom - height;
            page.fill_rect(x, bar_top, bar_width, height, Color::BAR);

            let count = format_int(group.count as i64);
            let count_x = x + (bar_width - text_width(&count, LABEL_SIZE)) / 2.0;
            page.text(count_x, bar_top - 3.0, Font::Regular, LABEL_SIZE, Color::BLACK, &count);

            let label = truncate_to_width(&group.value, slot - 2.0, LABEL_SIZE);
            let label_x = plot_left + slot * i as f32 + (slot - text_width(&label, LABEL_SIZE)) / 2.0;
            page.text(
                label_x,
                plot_bottom + LABEL_SIZE + 4.0,
                Font::Regular,
                LABEL_SIZE,
                Color::BLACK,
                &label,
            );
        }
    }

    let axis_x = plot_left + (plot_width - text_width(axis_label, LABEL_SIZE)) / 2.0;
    page.text(
        axis_x,
        top + CHART_HEIGHT - 4.0,
        Font::Bold,
        LABEL_SIZE,
        Color::MUTED,
        axis_label,
    );
    layout.advance(CHART_HEIGHT);
}
