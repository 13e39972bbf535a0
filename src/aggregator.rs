//! Report output: per-plugin fragments, the master index and the run log.
//!
//! Output layout under the report root:
//!
//! ```text
//! <output>/
//! ├── index.html
//! ├── _HTML/<category>/<identity>.html
//! ├── _TSV Exports/<identity>.tsv
//! ├── _Timeline/parts/<identity>.tsv (one per timeline plugin)
//! ├── _Timeline/timeline.tsv        (merged at finalization)
//! └── _Logs/run_log.json
//! ```
//!
//! Every fragment file is namespaced by the plugin's identity. The
//! index, the merged timeline and the run log are only written by
//! [`finalize`], after all plugins have completed.

use crate::case_data::CaseData;
use crate::engine::{CrunchOutcome, RunStatus};
use crate::error::Result;
use crate::plugin::{sanitize_file_name, ArtifactTable, PluginDescriptor};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const HTML_DIR: &str = "_HTML";
pub const TSV_DIR: &str = "_TSV Exports";
pub const TIMELINE_DIR: &str = "_Timeline";
const TIMELINE_PARTS_DIR: &str = "parts";
pub const LOG_DIR: &str = "_Logs";
pub const TIMELINE_FILE: &str = "timeline.tsv";
pub const RUN_LOG_FILE: &str = "run_log.json";
pub const INDEX_FILE: &str = "index.html";

/// Files a plugin contributed to the report.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportFragment {
    pub row_count: usize,
    pub files: Vec<PathBuf>,
    pub lava_only: bool,
}

impl ReportFragment {
    pub fn html_page(&self) -> Option<&Path> {
        self.files
            .iter()
            .find(|f| f.extension().map(|e| e == "html").unwrap_or(false))
            .map(|f| f.as_path())
    }
}

/// Folder a plugin may write extra material into.
pub fn report_folder(output: &Path, descriptor: &PluginDescriptor) -> PathBuf {
    output
        .join(HTML_DIR)
        .join(sanitize_file_name(&descriptor.category))
}

/// Writes a plugin's table as TSV, HTML and (when opted in) timeline rows.
///
/// LAVA-only plugins get no HTML page. An empty table writes nothing.
pub fn write_fragment(
    output: &Path,
    descriptor: &PluginDescriptor,
    table: &ArtifactTable,
    wrap_text: bool,
) -> Result<ReportFragment> {
    let mut fragment = ReportFragment {
        row_count: table.rows.len(),
        files: Vec::new(),
        lava_only: descriptor.output.lava_only,
    };

    if table.is_empty() {
        return Ok(fragment);
    }

    let stem = descriptor.file_stem();

    let tsv_path = output.join(TSV_DIR).join(format!("{}.tsv", stem));
    write_tsv(&tsv_path, &table.headers, &table.rows)?;
    fragment.files.push(tsv_path);

    if !descriptor.output.lava_only {
        let html_path = report_folder(output, descriptor).join(format!("{}.html", stem));
        write_html_page(&html_path, descriptor, table, wrap_text)?;
        fragment.files.push(html_path);
    }

    if descriptor.output.timeline {
        let timeline_path = output
            .join(TIMELINE_DIR)
            .join(TIMELINE_PARTS_DIR)
            .join(format!("{}.tsv", stem));
        let rows: Vec<Vec<String>> = table
            .rows
            .iter()
            .map(|row| timeline_row(&descriptor.name, &table.headers, row))
            .collect();
        write_tsv(&timeline_path, &timeline_headers(), &rows)?;
        fragment.files.push(timeline_path);
    }

    debug!("Wrote {} files for {}", fragment.files.len(), descriptor.identity);
    Ok(fragment)
}

fn timeline_headers() -> Vec<String> {
    vec!["timestamp".into(), "activity".into(), "data".into()]
}

fn timeline_row(activity: &str, headers: &[String], row: &[String]) -> Vec<String> {
    let timestamp = row.first().cloned().unwrap_or_default();
    let data = headers
        .iter()
        .zip(row.iter())
        .skip(1)
        .filter(|(_, value)| !value.is_empty())
        .map(|(header, value)| format!("{}: {}", header, value))
        .collect::<Vec<_>>()
        .join("; ");
    vec![timestamp, activity.to_string(), data]
}

/// Cells holding a tab, line break or quote are wrapped in double quotes
/// with inner quotes doubled, so multi-line values survive intact.
fn tsv_cell(value: &str) -> String {
    if value.contains(['\t', '\r', '\n', '"']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn write_tsv(path: &Path, headers: &[String], rows: &[Vec<String>]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut out = String::new();
    out.push_str(&headers.iter().map(|h| tsv_cell(h)).collect::<Vec<_>>().join("\t"));
    out.push('\n');
    for row in rows {
        out.push_str(&row.iter().map(|v| tsv_cell(v)).collect::<Vec<_>>().join("\t"));
        out.push('\n');
    }

    fs::write(path, out)?;
    Ok(())
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn write_html_page(
    path: &Path,
    descriptor: &PluginDescriptor,
    table: &ArtifactTable,
    wrap_text: bool,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let white_space = if wrap_text { "normal" } else { "nowrap" };
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\">");
    html.push_str(&format!("<title>{}</title>", escape_html(&descriptor.name)));
    html.push_str(&format!(
        "<style>td {{ white-space: {}; }} table {{ border-collapse: collapse; }} \
         td, th {{ border: 1px solid #999; padding: 2px 6px; }}</style>",
        white_space
    ));
    html.push_str("</head><body>\n");
    html.push_str(&format!("<h1>{}</h1>\n", escape_html(&descriptor.name)));

    if let Some(description) = table
        .description
        .as_deref()
        .or(descriptor.metadata.description.as_deref())
    {
        html.push_str(&format!("<p>{}</p>\n", escape_html(description)));
    }
    if let Some(source) = &table.source {
        html.push_str(&format!(
            "<p>Source: <code>{}</code></p>\n",
            escape_html(&source.to_string_lossy())
        ));
    }

    html.push_str(&format!("<p>Total entries: {}</p>\n<table>\n<tr>", table.rows.len()));
    for header in &table.headers {
        html.push_str(&format!("<th>{}</th>", escape_html(header)));
    }
    html.push_str("</tr>\n");
    for row in &table.rows {
        html.push_str("<tr>");
        for value in row {
            html.push_str(&format!("<td>{}</td>", escape_html(value)));
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</table>\n</body></html>\n");

    fs::write(path, html)?;
    Ok(())
}

/// Paths written by [`finalize`].
#[derive(Debug, Clone)]
pub struct FinalReport {
    pub index: PathBuf,
    pub run_log: PathBuf,
    pub timeline: Option<PathBuf>,
}

/// Writes the merged timeline, the index and the run log.
pub fn finalize(output: &Path, outcome: &CrunchOutcome, case_data: &CaseData) -> Result<FinalReport> {
    let timeline = merge_timeline(output, outcome)?;

    let log_dir = output.join(LOG_DIR);
    fs::create_dir_all(&log_dir)?;
    let run_log = log_dir.join(RUN_LOG_FILE);
    fs::write(&run_log, serde_json::to_string_pretty(outcome)?)?;

    let index = output.join(INDEX_FILE);
    fs::write(&index, render_index(output, outcome, case_data))?;

    info!("Report index written to {:?}", index);
    Ok(FinalReport {
        index,
        run_log,
        timeline,
    })
}

fn merge_timeline(output: &Path, outcome: &CrunchOutcome) -> Result<Option<PathBuf>> {
    let parts_dir = output.join(TIMELINE_DIR).join(TIMELINE_PARTS_DIR);
    let parts: Vec<&PathBuf> = outcome
        .results
        .iter()
        .filter_map(|r| r.fragment.as_ref())
        .flat_map(|f| f.files.iter())
        .filter(|f| f.starts_with(&parts_dir))
        .collect();

    if parts.is_empty() {
        return Ok(None);
    }

    let merged_path = output.join(TIMELINE_DIR).join(TIMELINE_FILE);
    let mut merged = fs::File::create(&merged_path)?;
    writeln!(merged, "{}", timeline_headers().join("\t"))?;

    for part in parts {
        let content = fs::read_to_string(part)?;
        for line in content.lines().skip(1) {
            writeln!(merged, "{}", line)?;
        }
    }

    Ok(Some(merged_path))
}

fn status_label(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Success => "success",
        RunStatus::Failure => "failure",
        RunStatus::SkippedNoFiles => "no files found",
    }
}

fn render_index(output: &Path, outcome: &CrunchOutcome, case_data: &CaseData) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>Extraction Report</title></head><body>\n");

    if let Some(logo) = case_data.logo_data_uri() {
        html.push_str(&format!("<img src=\"{}\" alt=\"Agency logo\" height=\"64\">\n", logo));
    }
    html.push_str("<h1>Extraction Report</h1>\n");

    let banner = case_data.banner();
    if !banner.is_empty() {
        html.push_str("<table class=\"case-data\">\n");
        for (field, value) in banner {
            html.push_str(&format!(
                "<tr><th>{}</th><td>{}</td></tr>\n",
                escape_html(field),
                escape_html(value)
            ));
        }
        html.push_str("</table>\n");
    }

    html.push_str(&format!(
        "<p>Generated {} &middot; {} plugins &middot; {}</p>\n",
        outcome.finished.format("%Y-%m-%d %H:%M:%S %:z"),
        outcome.results.len(),
        if outcome.success { "completed" } else { "completed with errors" }
    ));

    let lava_only = outcome.lava_only();
    if !lava_only.is_empty() {
        html.push_str(&format!(
            "<p class=\"warning\">{} artifact(s) are too large for this report and are only available in LAVA.</p>\n",
            lava_only.len()
        ));
    }

    let mut current_category: Option<&str> = None;
    for result in &outcome.results {
        if current_category != Some(result.category.as_str()) {
            if current_category.is_some() {
                html.push_str("</ul>\n");
            }
            html.push_str(&format!("<h2>{}</h2>\n<ul>\n", escape_html(&result.category)));
            current_category = Some(result.category.as_str());
        }

        let fragment = result.fragment.as_ref();
        let name = escape_html(&result.name);
        let title = match fragment.and_then(|f| f.html_page()) {
            Some(page) => {
                let href = page
                    .strip_prefix(output)
                    .unwrap_or(page)
                    .to_string_lossy()
                    .replace('\\', "/");
                format!("<a href=\"{}\">{}</a>", escape_html(&href), name)
            }
            None => name,
        };

        let mut line = format!("<li>{} ({}", title, status_label(result.status));
        if let Some(f) = fragment {
            line.push_str(&format!(", {} rows", f.row_count));
            if f.lava_only {
                line.push_str(", LAVA only");
            }
        }
        line.push_str(&format!(", {:.2}s)", result.elapsed.as_secs_f64()));
        if result.status == RunStatus::Failure {
            line.push_str(" &ndash; see log for details");
        }
        line.push_str("</li>\n");
        html.push_str(&line);
    }
    if current_category.is_some() {
        html.push_str("</ul>\n");
    }

    html.push_str(&format!(
        "<p>Run log: <a href=\"{}/{}\">{}</a></p>\n</body></html>\n",
        LOG_DIR, RUN_LOG_FILE, RUN_LOG_FILE
    ));
    html
}
