use crate::error::Error;
use crate::report::{Platform, Report, APP_NAME_FIELD};
use crate::watermark::parse_sheet_date;
use chrono::NaiveDate;
use log::warn;
use serde_json::{Number, Value};
use std::collections::BTreeMap;

/// One normalized destination row.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    pub date: NaiveDate,
    /// Labels in the report's dimension order.
    pub dimensions: Vec<String>,
    pub metrics: BTreeMap<String, f64>,
}

/// Row identity used to recognise rows already present in the destination.
pub type Fingerprint = (NaiveDate, Vec<String>);

impl MetricRecord {
    pub fn fingerprint(&self) -> Fingerprint {
        (self.date, self.dimensions.clone())
    }

    /// Lays the record out positionally: date, dimensions, then metrics in report order.
    /// Metrics missing from the record are written as 0.
    pub fn to_row(&self, report: &Report) -> Vec<Value> {
        let mut row = Vec::with_capacity(report.width());
        row.push(Value::String(self.date.format("%Y-%m-%d").to_string()));
        row.extend(self.dimensions.iter().cloned().map(Value::String));
        row.extend(
            report
                .metrics
                .iter()
                .map(|m| number(self.metrics.get(m.field).copied().unwrap_or(0.0))),
        );
        row
    }
}

///
/// Flattens raw breakdown groups into one [`MetricRecord`] per nested metric entry.
///
/// Groups with an unparseable date or a `data` field that is not a list are skipped
/// with a warning.
///
/// # Arguments
/// * `raw` - Breakdown groups as returned by the metrics API
/// * `platform` - Platform whose tag is appended to the app name
/// * `report` - Descriptor naming the dimension and metric fields
pub fn normalize(raw: &[Value], platform: Platform, report: &Report) -> Vec<MetricRecord> {
    let mut records = Vec::new();

    for group in raw {
        let date_str = group
            .get("date")
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim_matches('\'');

        let date = match parse_date(date_str) {
            Ok(date) => date,
            Err(err) => {
                warn!("{}. Skipping {} entry.", err, platform);
                continue;
            }
        };

        let entries = match group.get("data") {
            Some(Value::Array(entries)) => entries,
            _ => {
                warn!("Unexpected format for 'data' in {} entry: {}", platform, group);
                continue;
            }
        };

        let dimensions: Vec<String> = report
            .dimensions
            .iter()
            .map(|dim| {
                let label = dimension_label(group.get(dim.field));
                if dim.field == APP_NAME_FIELD {
                    tag_platform(&label, platform)
                } else {
                    label
                }
            })
            .collect();

        for entry in entries {
            let metrics = report
                .metrics
                .iter()
                .map(|m| {
                    let value = entry.get(m.field).and_then(Value::as_f64).unwrap_or(0.0);
                    (m.field.to_string(), value)
                })
                .collect();

            records.push(MetricRecord {
                date,
                dimensions: dimensions.clone(),
                metrics,
            });
        }
    }

    records
}

/// Rebuilds the fingerprint of a row read back from the destination.
/// Rows whose date cell does not parse (headers, notes) yield `None`.
pub fn row_fingerprint(row: &[String], report: &Report) -> Option<Fingerprint> {
    let date = parse_sheet_date(row.first()?.trim()).ok()?;
    let dimensions = (1..=report.dimensions.len())
        .map(|i| row.get(i).cloned().unwrap_or_default())
        .collect();
    Some((date, dimensions))
}

/// Appends `" (iOS)"` style tags, leaving names that already carry the tag untouched.
pub fn tag_platform(name: &str, platform: Platform) -> String {
    let tag = format!("({})", platform.label());
    if name.ends_with(&tag) {
        name.to_string()
    } else {
        format!("{} {}", name, tag)
    }
}

fn dimension_label(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| dimension_label(Some(item)))
            .collect::<Vec<_>>()
            .join(", "),
        Some(other) => other.to_string(),
    }
}

fn number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Value::from(value as i64)
    } else {
        Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or_else(|| Value::from(0))
    }
}

fn parse_date(date: &str) -> Result<NaiveDate, Error> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| Error::InvalidDate {
        date: date.to_string(),
    })
}
