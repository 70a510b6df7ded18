//! Tabular responsibility matrix report.
//!
//! # Responsibility
//! - Flatten the catalog into one row per objective with effective entries.
//! - Hand the row model to an export sink (PDF renderers live outside core).
//!
//! # Invariants
//! - Rows follow catalog order and cover every objective exactly once.
//! - Prose in rows is rendered; raw placeholder markup never reaches a sink.

use crate::model::catalog::Catalog;
use crate::model::entry::{EntryLookup, Responsibility, Revision};
use serde::Serialize;
use std::io::{self, Write};

pub const REPORT_TITLE: &str = "Shared Responsibility Matrix (SRM)";

/// One objective row of the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub family_title: String,
    pub control_label: String,
    /// Short objective id shown in the "AO" column.
    pub objective_display_id: String,
    pub prose: String,
    pub objective_id: String,
    pub responsibility: Responsibility,
    pub implementation: String,
}

/// Complete report model consumed by a [`ReportSink`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SrmReport {
    pub title: &'static str,
    pub revision: Revision,
    pub revision_label: &'static str,
    pub include_implementation: bool,
    pub rows: Vec<ReportRow>,
}

impl SrmReport {
    pub fn file_name(&self) -> String {
        report_file_name(self.revision)
    }
}

/// Report file name for a revision (`NIST-800-171-Rev3-SRM.pdf`).
pub fn report_file_name(revision: Revision) -> String {
    let tag = match revision {
        Revision::Rev2 => "Rev2",
        Revision::Rev3 => "Rev3",
    };
    format!("NIST-800-171-{tag}-SRM.pdf")
}

/// Builds the flattened report with defaults expanded.
pub fn build_report(
    catalog: &Catalog,
    entries: &impl EntryLookup,
    revision: Revision,
    include_implementation: bool,
) -> SrmReport {
    let rows = catalog
        .objectives()
        .map(|item| {
            let entry = entries.effective_entry(&item.objective.id);
            ReportRow {
                family_title: item.family.title.clone(),
                control_label: item.control.label.clone(),
                objective_display_id: item.objective.display_id().to_string(),
                prose: item.objective.rendered_prose(),
                objective_id: item.objective.id.clone(),
                responsibility: entry.responsibility,
                implementation: entry.implementation,
            }
        })
        .collect();

    SrmReport {
        title: REPORT_TITLE,
        revision,
        revision_label: revision.label(),
        include_implementation,
        rows,
    }
}

/// Opaque export target for a finished report (PDF, spreadsheet, terminal).
pub trait ReportSink {
    fn write_report(&mut self, report: &SrmReport) -> io::Result<()>;
}

/// Plain-text, tab-separated rendering of the report.
pub struct TextReportSink<W: Write> {
    out: W,
}

impl<W: Write> TextReportSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ReportSink for TextReportSink<W> {
    fn write_report(&mut self, report: &SrmReport) -> io::Result<()> {
        writeln!(
            self.out,
            "{} - NIST SP 800-171 {}",
            report.title, report.revision_label
        )?;

        let mut header = vec!["Domain", "Control", "AO", "Assessment Objective", "Responsibility"];
        if report.include_implementation {
            header.push("Implementation");
        }
        writeln!(self.out, "{}", header.join("\t"))?;

        for row in &report.rows {
            let mut cells = vec![
                flatten_cell(&row.family_title),
                flatten_cell(&row.control_label),
                flatten_cell(&row.objective_display_id),
                flatten_cell(&row.prose),
                row.responsibility.to_string(),
            ];
            if report.include_implementation {
                cells.push(flatten_cell(&row.implementation));
            }
            writeln!(self.out, "{}", cells.join("\t"))?;
        }
        self.out.flush()
    }
}

fn flatten_cell(value: &str) -> String {
    value.replace(['\t', '\n', '\r'], " ")
}
