//! Diagnostics collected while publishing a table.
//!
//! Schema drift, skipped catalog entries, unmatched geography codes and
//! backfilled buildings are not errors: the pipeline keeps going with a
//! best-effort result. Each stage records what it noticed here so the batch
//! runner can put it in the run manifest next to the output paths.
//!
//! # Example
//!
//! ```
//! use respub_core::diagnostics::{Diagnostics, Severity};
//!
//! let mut diag = Diagnostics::new();
//! diag.add_warning("schema", "column not declared in catalog");
//! diag.add_warning_with_column("geo", "county has no FIPS match", "in.county");
//!
//! assert_eq!(diag.warning_count(), 2);
//! assert_eq!(diag.error_count(), 0);
//! ```

use serde::{Deserialize, Serialize};

pub const SCHEMA: &str = "schema";
pub const TRANSFORM: &str = "transform";
pub const DERIVE: &str = "derive";
pub const GEO: &str = "geo";
pub const RECONCILE: &str = "reconcile";
pub const PUBLISH: &str = "publish";

/// Severity level for diagnostic issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Unusual but the stage continued (e.g. column dropped)
    Warning,
    /// Stage could not produce part of its output
    Error,
}

/// A single issue noticed while publishing a table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticIssue {
    pub severity: Severity,
    /// Stage that raised the issue (`schema`, `transform`, `derive`, `geo`, `reconcile`, `publish`)
    pub category: String,
    pub message: String,
    /// Column the issue refers to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
}

impl DiagnosticIssue {
    pub fn new(
        severity: Severity,
        category: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category: category.into(),
            message: message.into(),
            column: None,
        }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }
}

impl std::fmt::Display for DiagnosticIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let severity = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };

        write!(f, "[{}:{}] {}", severity, self.category, self.message)?;

        if let Some(column) = &self.column {
            write!(f, " ({})", column)?;
        }

        Ok(())
    }
}

/// Collection of diagnostic issues for one published table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<DiagnosticIssue>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, issue: DiagnosticIssue) {
        self.issues.push(issue);
    }

    pub fn add_warning(&mut self, category: &str, message: &str) {
        self.issues
            .push(DiagnosticIssue::new(Severity::Warning, category, message));
    }

    pub fn add_warning_with_column(&mut self, category: &str, message: &str, column: &str) {
        self.issues
            .push(DiagnosticIssue::new(Severity::Warning, category, message).with_column(column));
    }

    pub fn add_error(&mut self, category: &str, message: &str) {
        self.issues
            .push(DiagnosticIssue::new(Severity::Error, category, message));
    }

    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
            .count()
    }

    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count()
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    pub fn issues_by_category<'a>(
        &'a self,
        category: &'a str,
    ) -> impl Iterator<Item = &'a DiagnosticIssue> {
        self.issues.iter().filter(move |i| i.category == category)
    }

    pub fn merge(&mut self, other: Diagnostics) {
        self.issues.extend(other.issues);
    }

    pub fn summary(&self) -> String {
        let warnings = self.warning_count();
        let errors = self.error_count();

        match (warnings, errors) {
            (0, 0) => "No issues".to_string(),
            (w, 0) => format!("{} warning{}", w, if w == 1 { "" } else { "s" }),
            (0, e) => format!("{} error{}", e, if e == 1 { "" } else { "s" }),
            (w, e) => format!(
                "{} warning{}, {} error{}",
                w,
                if w == 1 { "" } else { "s" },
                e,
                if e == 1 { "" } else { "s" }
            ),
        }
    }
}

impl std::fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Diagnostics: {}", self.summary())?;
        for issue in &self.issues {
            writeln!(f, "  {}", issue)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostics_counts() {
        let mut diag = Diagnostics::new();
        diag.add_warning(SCHEMA, "extra column");
        diag.add_error(RECONCILE, "upgrade table empty");
        diag.add_warning_with_column(GEO, "unmatched county", "in.county");

        assert_eq!(diag.warning_count(), 2);
        assert_eq!(diag.error_count(), 1);
        assert!(diag.has_issues());
    }

    #[test]
    fn test_diagnostics_serialization() {
        let mut diag = Diagnostics::new();
        diag.add_warning_with_column(SCHEMA, "missing from data", "out.site_energy.total");

        let json = serde_json::to_string_pretty(&diag).unwrap();
        assert!(json.contains("\"warning\""));
        assert!(json.contains("\"column\": \"out.site_energy.total\""));

        let parsed: Diagnostics = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.warning_count(), 1);
    }

    #[test]
    fn test_diagnostic_issue_display() {
        let issue = DiagnosticIssue::new(Severity::Warning, GEO, "no PUMA match")
            .with_column("in.puma");

        let display = format!("{}", issue);
        assert!(display.contains("warning"));
        assert!(display.contains("geo"));
        assert!(display.contains("in.puma"));
    }

    #[test]
    fn test_diagnostics_summary() {
        let mut diag = Diagnostics::new();
        assert_eq!(diag.summary(), "No issues");

        diag.add_warning(SCHEMA, "warning");
        assert_eq!(diag.summary(), "1 warning");

        diag.add_error(SCHEMA, "error");
        assert_eq!(diag.summary(), "1 warning, 1 error");

        diag.add_warning(TRANSFORM, "another warning");
        assert_eq!(diag.summary(), "2 warnings, 1 error");
    }

    #[test]
    fn test_issues_by_category_and_merge() {
        let mut diag1 = Diagnostics::new();
        diag1.add_warning(SCHEMA, "extra");

        let mut diag2 = Diagnostics::new();
        diag2.add_warning(DERIVE, "no pv column");
        diag2.add_warning(SCHEMA, "missing");

        diag1.merge(diag2);
        assert_eq!(diag1.issues_by_category(SCHEMA).count(), 2);
        assert_eq!(diag1.issues_by_category(DERIVE).count(), 1);
    }
}
