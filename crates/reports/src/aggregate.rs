//! Summary statistics over a record set.
//!
//! Null values are skipped rather than imputed: `count` is the number of
//! non-null values, `avg` divides by that same number. A statistic with no
//! values to work on is [`SummaryValue::NotAvailable`] instead of an error.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::{AggregateError, OrderRecord, Scalar, SummaryField, SummaryOperation};

/// Number of distinct values kept for a `group` statistic.
pub const MAX_GROUPS: usize = 10;

/// How often one value occurs in a `group` statistic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupCount {
    pub value: String,
    pub count: u64,
}

/// The computed value of one summary field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SummaryValue {
    Number(f64),
    Count(u64),
    /// Sentinel for a statistic with nothing to compute over.
    NotAvailable,
    /// Most frequent values, most frequent first.
    Groups(Vec<GroupCount>),
}

impl fmt::Display for SummaryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n:.2}"),
            Self::Count(n) => write!(f, "{n}"),
            Self::NotAvailable => f.write_str("N/A"),
            Self::Groups(groups) => write!(f, "{} groups", groups.len()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryEntry {
    pub label: String,
    pub field: String,
    pub operation: SummaryOperation,
    pub value: SummaryValue,
}

/// Aggregator output: one entry per configured summary field, in
/// configuration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Summary {
    entries: Vec<SummaryEntry>,
}

impl Summary {
    /// Value for the first entry with this label.
    pub fn get(&self, label: &str) -> Option<&SummaryValue> {
        self.entries
            .iter()
            .find(|e| e.label == label)
            .map(|e| &e.value)
    }

    pub fn entries(&self) -> &[SummaryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Compute every summary field over `records`.
///
/// # Errors
/// - [`AggregateError::MissingField`] if a record lacks a summarised field.
/// - [`AggregateError::NonNumeric`] if a numeric statistic meets text that
///   is not a number.
pub fn aggregate(
    records: &[OrderRecord],
    fields: &[SummaryField],
) -> Result<Summary, AggregateError> {
    let mut entries = Vec::with_capacity(fields.len());

    for summary_field in fields {
        let values = column(records, &summary_field.field)?;
        let numbers = || numeric(&values, &summary_field.field);
        let value = match summary_field.operation {
            SummaryOperation::Count => SummaryValue::Count(values.len() as u64),
            SummaryOperation::Group => SummaryValue::Groups(group_counts(&values)),
            SummaryOperation::Sum => reduce(NumericOp::Sum, &numbers()?),
            SummaryOperation::Avg => reduce(NumericOp::Avg, &numbers()?),
            SummaryOperation::Min => reduce(NumericOp::Min, &numbers()?),
            SummaryOperation::Max => reduce(NumericOp::Max, &numbers()?),
        };

        entries.push(SummaryEntry {
            label: summary_field.label.clone(),
            field: summary_field.field.clone(),
            operation: summary_field.operation,
            value,
        });
    }

    Ok(Summary { entries })
}

/// Non-null values of `field`, with the index of the record they came from.
fn column<'a>(
    records: &'a [OrderRecord],
    field: &str,
) -> Result<Vec<(usize, &'a Scalar)>, AggregateError> {
    let mut values = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        match record.get(field) {
            None => {
                return Err(AggregateError::MissingField {
                    field: field.to_owned(),
                    index,
                })
            }
            Some(v) if v.is_null() => {}
            Some(v) => values.push((index, v)),
        }
    }
    Ok(values)
}

fn numeric(values: &[(usize, &Scalar)], field: &str) -> Result<Vec<f64>, AggregateError> {
    values
        .iter()
        .map(|(index, v)| {
            v.as_f64().ok_or_else(|| AggregateError::NonNumeric {
                field: field.to_owned(),
                index: *index,
                value: v.to_string(),
            })
        })
        .collect()
}

/// Operations that reduce a numeric column to one number.
#[derive(Debug, Clone, Copy)]
enum NumericOp {
    Sum,
    Avg,
    Min,
    Max,
}

fn reduce(op: NumericOp, numbers: &[f64]) -> SummaryValue {
    let sum: f64 = numbers.iter().sum();
    match op {
        NumericOp::Sum => SummaryValue::Number(sum),
        NumericOp::Avg if numbers.is_empty() => SummaryValue::NotAvailable,
        NumericOp::Avg => SummaryValue::Number(sum / numbers.len() as f64),
        NumericOp::Min => numbers
            .iter()
            .copied()
            .reduce(f64::min)
            .map_or(SummaryValue::NotAvailable, SummaryValue::Number),
        NumericOp::Max => numbers
            .iter()
            .copied()
            .reduce(f64::max)
            .map_or(SummaryValue::NotAvailable, SummaryValue::Number),
    }
}

fn group_counts(values: &[(usize, &Scalar)]) -> Vec<GroupCount> {
    let mut counts: HashMap<String, u64> = HashMap::new();
    for (_, v) in values {
        *counts.entry(v.to_string()).or_insert(0) += 1;
    }

    let mut groups: Vec<GroupCount> = counts
        .into_iter()
        .map(|(value, count)| GroupCount { value, count })
        .collect();
    // Ties broken by value so the chart is stable across runs.
    groups.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    groups.truncate(MAX_GROUPS);
    groups
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, operation: SummaryOperation, label: &str) -> SummaryField {
        SummaryField {
            field: name.into(),
            operation,
            label: label.into(),
        }
    }

    fn orders() -> Vec<OrderRecord> {
        vec![
            OrderRecord::new().with("OrderId", 1).with("TotalValue", 10),
            OrderRecord::new().with("OrderId", 2).with("TotalValue", 20),
        ]
    }

    #[test]
    fn sum_of_total_value() {
        let summary = aggregate(
            &orders(),
            &[field("TotalValue", SummaryOperation::Sum, "Total Revenue")],
        )
        .unwrap();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary.get("Total Revenue"), Some(&SummaryValue::Number(30.0)));
    }

    #[test]
    fn one_entry_per_field_in_configured_order() {
        let fields = vec![
            field("TotalValue", SummaryOperation::Avg, "Average"),
            field("OrderId", SummaryOperation::Count, "Orders"),
            field("TotalValue", SummaryOperation::Max, "Largest"),
            field("TotalValue", SummaryOperation::Sum, "Revenue"),
        ];
        let summary = aggregate(&orders(), &fields).unwrap();
        let labels: Vec<&str> = summary.entries().iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["Average", "Orders", "Largest", "Revenue"]);
        assert_eq!(summary.get("Average"), Some(&SummaryValue::Number(15.0)));
        assert_eq!(summary.get("Orders"), Some(&SummaryValue::Count(2)));
        assert_eq!(summary.get("Largest"), Some(&SummaryValue::Number(20.0)));
    }

    #[test]
    fn empty_record_set_yields_zeros_and_sentinel() {
        let fields = vec![
            field("TotalValue", SummaryOperation::Sum, "Revenue"),
            field("OrderId", SummaryOperation::Count, "Orders"),
            field("TotalValue", SummaryOperation::Avg, "Average"),
            field("TotalValue", SummaryOperation::Min, "Smallest"),
        ];
        let summary = aggregate(&[], &fields).unwrap();
        assert_eq!(summary.get("Revenue"), Some(&SummaryValue::Number(0.0)));
        assert_eq!(summary.get("Orders"), Some(&SummaryValue::Count(0)));
        assert_eq!(summary.get("Average"), Some(&SummaryValue::NotAvailable));
        assert_eq!(summary.get("Smallest"), Some(&SummaryValue::NotAvailable));
        assert_eq!(SummaryValue::NotAvailable.to_string(), "N/A");
    }

    #[test]
    fn every_operation_yields_its_own_value_kind() {
        let records = vec![
            OrderRecord::new().with("TotalValue", 10).with("Status", "open"),
            OrderRecord::new().with("TotalValue", 30).with("Status", "open"),
            OrderRecord::new().with("TotalValue", 20).with("Status", "closed"),
        ];
        let summary = aggregate(
            &records,
            &[
                field("TotalValue", SummaryOperation::Min, "Min"),
                field("TotalValue", SummaryOperation::Max, "Max"),
                field("TotalValue", SummaryOperation::Avg, "Avg"),
                field("TotalValue", SummaryOperation::Count, "Count"),
                field("Status", SummaryOperation::Group, "By Status"),
            ],
        )
        .unwrap();

        assert_eq!(summary.get("Min"), Some(&SummaryValue::Number(10.0)));
        assert_eq!(summary.get("Max"), Some(&SummaryValue::Number(30.0)));
        assert_eq!(summary.get("Avg"), Some(&SummaryValue::Number(20.0)));
        assert_eq!(summary.get("Count"), Some(&SummaryValue::Count(3)));
        assert!(matches!(
            summary.get("By Status"),
            Some(SummaryValue::Groups(groups)) if groups[0].value == "open" && groups[0].count == 2
        ));
    }

    #[test]
    fn nulls_are_skipped_not_imputed() {
        let records = vec![
            OrderRecord::new().with("TotalValue", 10),
            OrderRecord::new().with("TotalValue", Scalar::Null),
            OrderRecord::new().with("TotalValue", "30"),
        ];
        let summary = aggregate(
            &records,
            &[
                field("TotalValue", SummaryOperation::Count, "Priced"),
                field("TotalValue", SummaryOperation::Avg, "Average"),
            ],
        )
        .unwrap();
        assert_eq!(summary.get("Priced"), Some(&SummaryValue::Count(2)));
        assert_eq!(summary.get("Average"), Some(&SummaryValue::Number(20.0)));
    }

    #[test]
    fn absent_field_fails_fast() {
        let records = vec![
            OrderRecord::new().with("TotalValue", 10),
            OrderRecord::new().with("OrderId", 2),
        ];
        let err = aggregate(&records, &[field("TotalValue", SummaryOperation::Sum, "Revenue")])
            .unwrap_err();
        assert_eq!(
            err,
            AggregateError::MissingField {
                field: "TotalValue".into(),
                index: 1
            }
        );
    }

    #[test]
    fn text_in_numeric_field_is_an_error() {
        let records = vec![OrderRecord::new().with("TotalValue", "n/a")];
        let err = aggregate(&records, &[field("TotalValue", SummaryOperation::Sum, "Revenue")])
            .unwrap_err();
        assert!(matches!(err, AggregateError::NonNumeric { index: 0, .. }));
    }

    #[test]
    fn group_counts_most_frequent_first_with_stable_ties() {
        let statuses = ["Shipped", "Open", "Shipped", "Cancelled", "Open", "Shipped"];
        let records: Vec<OrderRecord> = statuses
            .iter()
            .map(|s| OrderRecord::new().with("Status", *s))
            .collect();
        let summary =
            aggregate(&records, &[field("Status", SummaryOperation::Group, "By Status")]).unwrap();
        let Some(SummaryValue::Groups(groups)) = summary.get("By Status") else {
            panic!("expected groups");
        };
        let flat: Vec<(&str, u64)> = groups.iter().map(|g| (g.value.as_str(), g.count)).collect();
        assert_eq!(flat, vec![("Shipped", 3), ("Open", 2), ("Cancelled", 1)]);
    }

    #[test]
    fn group_keeps_only_the_top_values() {
        let records: Vec<OrderRecord> = (0..25)
            .map(|i| OrderRecord::new().with("Store", format!("S{i:02}").as_str()))
            .collect();
        let summary =
            aggregate(&records, &[field("Store", SummaryOperation::Group, "Stores")]).unwrap();
        let Some(SummaryValue::Groups(groups)) = summary.get("Stores") else {
            panic!("expected groups");
        };
        assert_eq!(groups.len(), MAX_GROUPS);
        assert_eq!(groups[0].value, "S00");
    }
}
