//! CSV and console output for the inventory.

use std::fs::File;
use std::path::Path;
use std::time::Instant;

use chrono::{DateTime, Local};
use tracing::info;

use crate::error::Result;
use crate::models::FileRecord;

/// Column headers for both the CSV file and the console table.
pub const HEADERS: [&str; 5] = ["Name", "Path", "Owner", "Shared With", "Shared With Me"];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Concatenate the three views. Files seen in several views appear once per view.
pub fn combine(
    root: Vec<FileRecord>,
    tree: Vec<FileRecord>,
    shared: Vec<FileRecord>,
) -> Vec<FileRecord> {
    let mut all = Vec::with_capacity(root.len() + tree.len() + shared.len());
    all.extend(root);
    all.extend(tree);
    all.extend(shared);
    all
}

/// Write the records as UTF-8 CSV with a header row.
pub fn write_csv<P: AsRef<Path>>(path: P, records: &[FileRecord]) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    write_records(csv::Writer::from_writer(file), records)?;
    info!(path = %path.display(), rows = records.len(), "wrote CSV");
    Ok(())
}

fn write_records<W: std::io::Write>(mut writer: csv::Writer<W>, records: &[FileRecord]) -> Result<()> {
    writer.write_record(HEADERS)?;
    for record in records {
        writer.write_record(record.to_row())?;
    }
    writer.flush()?;
    Ok(())
}

/// Render the records as a plain aligned table.
pub fn render_table(records: &[FileRecord]) -> String {
    let rows: Vec<[String; 5]> = records.iter().map(FileRecord::to_row).collect();

    // Widths count chars, matching how `{:<width$}` pads. Wide glyphs still overhang.
    let mut widths = HEADERS.map(|h| h.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_line(&mut out, HEADERS.iter().copied(), &widths);
    let rules: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_line(&mut out, rules.iter().map(String::as_str), &widths);
    for row in &rows {
        push_line(&mut out, row.iter().map(String::as_str), &widths);
    }
    out
}

fn push_line<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>, widths: &[usize]) {
    let line: Vec<String> = cells
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
        .collect();
    out.push_str(line.join("  ").trim_end());
    out.push('\n');
}

/// Wall-clock timing for a run.
pub struct RunTimer {
    started_at: DateTime<Local>,
    started: Instant,
}

/// Start, end and elapsed time of a finished run.
pub struct RunSummary {
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub elapsed_secs: f64,
}

impl RunTimer {
    pub fn start() -> Self {
        Self {
            started_at: Local::now(),
            started: Instant::now(),
        }
    }

    pub fn start_line(&self) -> String {
        format!("Start time: {}", self.started_at.format(TIMESTAMP_FORMAT))
    }

    pub fn finish(self) -> RunSummary {
        RunSummary {
            started_at: self.started_at,
            finished_at: Local::now(),
            elapsed_secs: self.started.elapsed().as_secs_f64(),
        }
    }
}

impl RunSummary {
    pub fn end_line(&self) -> String {
        format!("End time: {}", self.finished_at.format(TIMESTAMP_FORMAT))
    }

    pub fn duration_line(&self) -> String {
        format!("Duration: {:.2} seconds", self.elapsed_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, path: &str, shared: &[&str], shared_with_me: bool) -> FileRecord {
        FileRecord {
            name: name.to_string(),
            path: path.to_string(),
            owner_email: "a@x.com".to_string(),
            shared_with: shared.iter().map(|s| s.to_string()).collect(),
            shared_with_me,
        }
    }

    #[test]
    fn test_combine_keeps_order_and_duplicates() {
        let dup = record("dup.txt", "S/", &[], true);
        let all = combine(
            vec![record("r.txt", "", &[], false)],
            vec![dup.clone()],
            vec![dup.clone(), record("s.txt", "", &[], true)],
        );

        let names: Vec<&str> = all.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["r.txt", "dup.txt", "dup.txt", "s.txt"]);
    }

    #[test]
    fn test_write_records_quotes_joined_emails() {
        let mut buf = Vec::new();
        write_records(
            csv::Writer::from_writer(&mut buf),
            &[record("f.txt", "A/", &["b@x.com", "c@x.com"], true)],
        )
        .unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "Name,Path,Owner,Shared With,Shared With Me\nf.txt,A/,a@x.com,\"b@x.com, c@x.com\",True\n"
        );
    }

    #[test]
    fn test_render_table_alignment() {
        let table = render_table(&[
            record("long-name.txt", "A/B/", &["b@x.com"], false),
            record("f", "", &[], true),
        ]);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("Name           Path  Owner"));
        assert!(lines[1].starts_with("-------------  ----  -------"));
        assert!(lines[2].starts_with("long-name.txt  A/B/  a@x.com  b@x.com"));
        assert!(lines[2].ends_with("False"));
        assert!(lines[3].ends_with("True"));
    }

    #[test]
    fn test_render_table_aligns_accented_names_by_char() {
        let table = render_table(&[
            record("résumé.pdf", "", &[], false),
            record("f", "", &[], false),
        ]);
        let owner_column = |line: &str| line[..line.find("a@x.com").unwrap()].chars().count();
        let lines: Vec<&str> = table.lines().collect();

        assert!(lines[1].starts_with("----------  "));
        assert_eq!(owner_column(lines[2]), 18);
        assert_eq!(owner_column(lines[3]), 18);
    }

    #[test]
    fn test_render_table_empty() {
        let table = render_table(&[]);
        assert_eq!(
            table,
            "Name  Path  Owner  Shared With  Shared With Me\n----  ----  -----  -----------  --------------\n"
        );
    }

    #[test]
    fn test_duration_line() {
        let summary = RunTimer::start().finish();
        assert!(summary.duration_line().starts_with("Duration: "));
        assert!(summary.duration_line().ends_with(" seconds"));
        assert!(summary.finished_at >= summary.started_at);
    }
}
