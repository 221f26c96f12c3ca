//! Fixed-width console rendering of evaluated QC tables.

use std::fmt::Write;

use crate::app::RunSummary;
use crate::metrics::MetricRow;

pub const COLUMN_WIDTHS: [usize; 4] = [30, 6, 6, 7];

const COLUMN_TITLES: [&str; 4] = ["Parameter", "Value", "Limit", "Outcome"];

/// Renders one pass/fail table: dashed border, header, rows with the value
/// and limit right-justified.
pub fn render_table(rows: &[MetricRow]) -> String {
    let border = "-".repeat(COLUMN_WIDTHS.iter().sum::<usize>() + COLUMN_WIDTHS.len() + 1);
    let mut out = String::new();
    out.push_str(&border);
    out.push('\n');

    out.push(' ');
    for (title, width) in COLUMN_TITLES.iter().zip(COLUMN_WIDTHS) {
        let _ = write!(out, "{title:<width$} ");
    }
    out.push('\n');
    out.push_str(&border);
    out.push('\n');

    for row in rows {
        let outcome = if row.pass { "Pass" } else { "FAIL" };
        let _ = writeln!(
            out,
            "|{label:<w0$} {value:>w1$} {limit:>w2$} {outcome:>w3$}|",
            label = row.label,
            value = row.value,
            limit = row.limit,
            w0 = COLUMN_WIDTHS[0],
            w1 = COLUMN_WIDTHS[1],
            w2 = COLUMN_WIDTHS[2],
            w3 = COLUMN_WIDTHS[3],
        );
    }
    out.push_str(&border);
    out.push('\n');
    out
}

/// Full console report: run header, sample listing, the global table, then
/// one table per sample.
pub fn render_run_summary(summary: &RunSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Report ID:   {}", summary.report_id);
    let _ = writeln!(out, "Report name: {}", summary.report_name);
    let _ = writeln!(out, "Generated:   {}", summary.generated_at);

    let _ = writeln!(out, "\nSamples:");
    for sample in &summary.samples {
        let _ = writeln!(out, "  {}  \"{}\"", sample.barcode, sample.sample);
    }

    let _ = writeln!(out, "\nGlobal parameters:\n");
    out.push_str(&render_table(&summary.global));

    let _ = writeln!(out, "\nSample parameters:\n");
    for sample in &summary.samples {
        let _ = writeln!(out, "{}  \"{}\"", sample.barcode, sample.sample);
        out.push_str(&render_table(&sample.rows));
        out.push('\n');
    }
    out
}
