//! One-shot table output for `--dump`.

use std::fmt::Write as _;

use serde::Serialize;

use crate::error::Result;
use crate::labels::LabelTable;
use crate::orchestrator::PassReport;
use crate::types::Category;

#[derive(Debug, Serialize)]
pub struct ExportField {
    pub label: &'static str,
    pub value: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExportCategory {
    pub name: &'static str,
    pub fields: Vec<ExportField>,
}

/// Whole table plus the pass error total
#[derive(Debug, Serialize)]
pub struct TableExport {
    pub errors: usize,
    pub categories: Vec<ExportCategory>,
}

impl TableExport {
    pub fn new(labels: &LabelTable, report: &PassReport) -> Self {
        let categories = Category::ALL
            .iter()
            .map(|&category| ExportCategory {
                name: category.label(),
                fields: labels
                    .category(category)
                    .into_iter()
                    .map(|(field, value)| ExportField {
                        label: field.label(),
                        value: value.map(str::to_string),
                    })
                    .collect(),
            })
            .collect();

        Self {
            errors: report.error_count(),
            categories,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Aligned `label  value` lines, grouped by category; unset fields are omitted
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for category in &self.categories {
            let _ = writeln!(out, "[{}]", category.name);
            for field in &category.fields {
                if let Some(value) = &field.value {
                    let _ = writeln!(out, "  {:<16} {}", field.label, value);
                }
            }
            out.push('\n');
        }
        if self.errors > 0 {
            let _ = writeln!(out, "{} probe error(s); run with --verbose for details", self.errors);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::Field;

    fn table() -> LabelTable {
        let mut labels = LabelTable::new();
        labels.set(Field::Vendor, "Intel");
        labels.set(Field::Kernel, "Linux 6.6.1");
        labels
    }

    #[test]
    fn text_lists_set_fields_under_their_category() {
        let text = TableExport::new(&table(), &PassReport::default()).to_text();
        assert!(text.starts_with("[CPU]\n  Vendor           Intel\n"));
        assert!(text.contains("[System]\n  Kernel           Linux 6.6.1\n"));
        assert!(!text.contains("Code Name"));
        assert!(!text.contains("probe error"));
    }

    #[test]
    fn json_keeps_unset_fields_as_null() {
        let json = TableExport::new(&table(), &PassReport::default()).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let cpu = &value["categories"][0];
        assert_eq!(cpu["name"], "CPU");
        assert_eq!(cpu["fields"][0]["value"], "Intel");
        assert!(cpu["fields"][1]["value"].is_null());
        assert_eq!(value["errors"], 0);
    }
}
