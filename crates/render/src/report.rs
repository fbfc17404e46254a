//! Report layout: section order and the rendering entry point.

use chrono::NaiveDate;
use reports::{OrderRecord, ReportArtifact, ReportConfig, ReportPeriod, Summary, SummaryValue};
use tracing::{debug, info};

use crate::canvas::{assemble, Color, DocInfo};
use crate::chart::{bar_chart, CHART_HEIGHT};
use crate::error::RenderError;
use crate::format::format_int;
use crate::layout::{Layout, BODY_SIZE, HEADING_SIZE, SUBHEADING_SIZE};
use crate::table::{column_width, detail_table, summary_table};

/// Everything one rendering needs. Borrowed so the executor keeps
/// ownership of the records between stages.
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    pub config: &'a ReportConfig,
    pub records: &'a [OrderRecord],
    pub summary: &'a Summary,
    pub period: ReportPeriod,
    pub run_date: NaiveDate,
}

impl RenderRequest<'_> {
    pub fn title(&self) -> String {
        format!("{} - {}", self.config.name, self.run_date.format("%Y-%m-%d"))
    }
}

/// Lays a report out on landscape US-Letter pages.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReportRenderer;

impl ReportRenderer {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&self, request: &RenderRequest<'_>) -> Result<ReportArtifact, RenderError> {
        let pages = self.layout(request)?;
        debug!("laid out {} pages", pages.len());

        let info = DocInfo {
            title: request.title(),
            created: request.run_date,
        };
        let bytes = assemble(pages, &info)?;
        let filename = ReportArtifact::filename_for(&request.config.report_id, request.run_date);
        info!("rendered {filename} ({} bytes)", bytes.len());
        Ok(ReportArtifact { filename, bytes })
    }

    pub(crate) fn layout(
        &self,
        request: &RenderRequest<'_>,
    ) -> Result<Vec<crate::canvas::Page>, RenderError> {
        let config = request.config;
        // fail before drawing anything
        column_width(config.report_fields.len())?;

        let mut layout = Layout::new();
        layout.title(&request.title());

        if let Some(description) = config.description.as_deref().filter(|d| !d.trim().is_empty()) {
            layout.paragraph(description, BODY_SIZE, Color::BLACK);
            layout.advance(8.0);
        }
        layout.paragraph(
            &format!("Period: {}", request.period),
            BODY_SIZE,
            Color::MUTED,
        );
        layout.paragraph(
            &format!("Records: {}", format_int(request.records.len() as i64)),
            BODY_SIZE,
            Color::MUTED,
        );
        layout.advance(12.0);

        if !request.summary.is_empty() {
            layout.heading("Summary", HEADING_SIZE);
            summary_table(&mut layout, request.summary);
            layout.advance(24.0);

            for entry in request.summary.entries() {
                if let SummaryValue::Groups(groups) = &entry.value {
                    layout.heading_above(&entry.label, SUBHEADING_SIZE, CHART_HEIGHT);
                    bar_chart(&mut layout, &entry.field, groups);
                    layout.advance(12.0);
                }
            }
        }

        layout.heading("Detailed Data", HEADING_SIZE);
        detail_table(&mut layout, &config.report_fields, request.records)?;
        Ok(layout.finish())
    }
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use reports::{aggregate, SummaryField, SummaryOperation};

    fn config() -> ReportConfig {
        serde_json::from_value(serde_json::json!({
            "report_id": "daily_order_summary",
            "name": "Daily Order Summary",
            "description": "Orders placed yesterday",
            "schedule": "0 6 * * *",
            "email": { "recipients": ["ops@example.com"] },
            "report_fields": ["OrderId", "Status", "TotalValue"],
            "summary_fields": [
                { "field": "TotalValue", "operation": "sum", "label": "Total Revenue" },
                { "field": "Status", "operation": "group", "label": "Orders by Status" }
            ]
        }))
        .unwrap()
    }

    fn records(n: i64) -> Vec<OrderRecord> {
        (0..n)
            .map(|i| {
                OrderRecord::new()
                    .with("OrderId", i)
                    .with("Status", if i % 3 == 0 { "Open" } else { "Shipped" })
                    .with("TotalValue", 10.5 * i as f64)
            })
            .collect()
    }

    fn run_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    fn render(config: &ReportConfig, records: &[OrderRecord]) -> Result<ReportArtifact, RenderError> {
        let summary = aggregate(records, &config.summary_fields).unwrap();
        let request = RenderRequest {
            config,
            records,
            summary: &summary,
            period: config.period_for(run_date()),
            run_date: run_date(),
        };
        ReportRenderer::new().render(&request)
    }

    #[test]
    fn identical_input_renders_identical_bytes() {
        let config = config();
        let records = records(40);
        let first = render(&config, &records).unwrap();
        let second = render(&config, &records).unwrap();
        assert_eq!(first.filename, "daily_order_summary_20261016.pdf");
        assert_eq!(first.bytes, second.bytes);
    }

    #[test]
    fn layout_runs_title_summary_chart_then_details() {
        let config = config();
        let records = records(5);
        let summary = aggregate(&records, &config.summary_fields).unwrap();
        let request = RenderRequest {
            config: &config,
            records: &records,
            summary: &summary,
            period: config.period_for(run_date()),
            run_date: run_date(),
        };
        let pages = ReportRenderer::new().layout(&request).unwrap();
        let texts: Vec<&str> = pages.iter().flat_map(|p| p.texts()).map(String::as_str).collect();

        let position = |needle: &str| texts.iter().position(|t| *t == needle).unwrap();
        assert_eq!(texts[0], "Daily Order Summary - 2026-10-16");
        assert!(position("Orders placed yesterday") < position("Summary"));
        assert!(position("Summary") < position("Total Revenue"));
        assert!(position("Total Revenue") < position("Orders by Status"));
        assert!(position("Orders by Status") < position("Detailed Data"));
        assert!(texts.contains(&"Period: 2026-10-15"));
        assert!(texts.contains(&"Records: 5"));
        assert!(texts.contains(&"105.00"));
    }

    #[test]
    fn chart_heading_stays_on_the_chart_page() {
        let records = records(5);
        // push the chart through every position on the first two pages
        for lines in 0..60 {
            let mut config = config();
            config.description = Some("lorem ".repeat(25 * lines + 1));
            let summary = aggregate(&records, &config.summary_fields).unwrap();
            let request = RenderRequest {
                config: &config,
                records: &records,
                summary: &summary,
                period: config.period_for(run_date()),
                run_date: run_date(),
            };
            let pages = ReportRenderer::new().layout(&request).unwrap();
            // the label also appears in the summary table, so take the last page
            let page_of = |needle: &str| {
                pages
                    .iter()
                    .rposition(|p| p.texts().iter().any(|t| t == needle))
                    .unwrap()
            };
            assert_eq!(
                page_of("Orders by Status"),
                page_of("Count"),
                "heading split from its chart with {lines} description lines"
            );
        }
    }

    #[test]
    fn large_record_sets_span_pages_with_a_valid_document() {
        let config = config();
        let records = records(300);
        let artifact = render(&config, &records).unwrap();
        let doc = lopdf::Document::load_mem(&artifact.bytes).unwrap();
        assert!(doc.get_pages().len() > 3);
    }

    #[test]
    fn empty_record_set_still_renders() {
        let config = config();
        let artifact = render(&config, &[]).unwrap();
        assert!(artifact.bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn too_many_columns_is_refused() {
        let mut config = config();
        config.report_fields = (0..30).map(|i| format!("Field{i}")).collect();
        config.summary_fields = vec![SummaryField {
            field: "Field0".into(),
            operation: SummaryOperation::Count,
            label: "Rows".into(),
        }];
        let err = render(&config, &[]).unwrap_err();
        assert!(matches!(err, RenderError::TooManyColumns { columns: 30, .. }));
    }
}
