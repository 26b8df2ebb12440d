//! Small filter dashboard used by the demo binary and the end-to-end tests.
//!
//! A few cities are always shown; the others can be added through a
//! multi-select, and a select switches the ordering.

use docsync_core::{Document, Model, Patch};
use docsync_runtime::{Application, ApplicationError};
use serde_json::{json, Value};

const KEY_CITIES: &[(&str, f64)] = &[
    ("Cincinnati", 9_521.0),
    ("Akron", 2_729.0),
    ("Toledo", 1_857.0),
    ("Cleveland", 11_683.0),
    ("Columbus", 15_215.0),
];

const OTHER_CITIES: &[(&str, f64)] = &[
    ("Dayton", 2_412.0),
    ("Kent", 1_022.0),
    ("Lima", 1_411.0),
    ("Mentor", 1_340.0),
    ("Newark", 1_029.0),
];

/// Ordering option that keeps key cities grouped at the end.
pub const SORT_KEY_CITIES: &str = "Key Cities";
/// Ordering option that sorts every bar by value.
pub const SORT_SALES: &str = "Sales";

/// The demo application.
#[derive(Debug, Default, Clone, Copy)]
pub struct SalesFilter;

impl SalesFilter {
    /// Create the application.
    pub fn new() -> Self {
        Self
    }
}

impl Application for SalesFilter {
    fn build(&mut self, document: &mut Document) -> Result<(), ApplicationError> {
        document.enable_location();

        let options: Vec<Value> = OTHER_CITIES.iter().map(|(c, _)| json!(c)).collect();
        document.add_root(
            Model::new("cities", "MultiSelect")
                .with("options", Value::Array(options))
                .with("value", json!([])),
        )?;
        document.add_root(
            Model::new("sort_by", "Select")
                .with("options", json!([SORT_KEY_CITIES, SORT_SALES]))
                .with("value", json!(SORT_KEY_CITIES)),
        )?;

        let (labels, values) = bars(&[], SORT_KEY_CITIES);
        document.add_root(
            Model::new("chart", "Bars")
                .with("labels", labels)
                .with("values", values),
        )?;

        for widget in ["cities", "sort_by"] {
            document.bind(widget, &["value"], redraw);
        }
        Ok(())
    }
}

fn redraw(document: &Document) -> Patch {
    let selected: Vec<String> = document
        .attr("cities", "value")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let sort_by = document
        .attr("sort_by", "value")
        .and_then(Value::as_str)
        .unwrap_or(SORT_KEY_CITIES);

    let (labels, values) = bars(&selected, sort_by);
    Patch::new()
        .changed("chart", "labels", labels)
        .changed("chart", "values", values)
}

fn bars(selected: &[String], sort_by: &str) -> (Value, Value) {
    let mut extra: Vec<(&str, f64)> = OTHER_CITIES
        .iter()
        .filter(|(city, _)| selected.iter().any(|s| s == city))
        .copied()
        .collect();
    extra.sort_by(|a, b| a.1.total_cmp(&b.1));

    let mut rows = extra;
    rows.extend_from_slice(KEY_CITIES);
    if sort_by == SORT_SALES {
        rows.sort_by(|a, b| a.1.total_cmp(&b.1));
    }

    let labels = rows.iter().map(|(c, _)| json!(c)).collect();
    let values = rows.iter().map(|(_, v)| json!(v)).collect();
    (Value::Array(labels), Value::Array(values))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selected_cities_come_first_when_grouping_key_cities() {
        let (labels, _) = bars(&["Kent".to_string(), "Dayton".to_string()], SORT_KEY_CITIES);
        assert_eq!(labels[0], "Kent");
        assert_eq!(labels[1], "Dayton");
        assert_eq!(labels[2], "Cincinnati");
    }

    #[test]
    fn sales_ordering_mixes_all_bars() {
        let (labels, values) = bars(&["Dayton".to_string()], SORT_SALES);
        assert_eq!(labels.as_array().unwrap().len(), 6);
        assert_eq!(labels[0], "Toledo");
        assert_eq!(values[5], 15_215.0);
    }
}
