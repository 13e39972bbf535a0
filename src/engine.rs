//! Plugin execution.
//!
//! Plugins run one at a time in catalogue order. A plugin that returns an
//! error or panics is recorded as a failure and the run moves on; only
//! run-level preconditions (empty selection, unreadable input, unwritable
//! output) abort a run, and they do so before any plugin starts.

use crate::aggregator::{self, ReportFragment};
use crate::case_data::CaseData;
use crate::error::{LeappError, Result};
use crate::plugin::{ArtifactPlugin, RunContext};
use crate::registry::Catalogue;
use crate::resolver::{md5_digest, FileSeeker};
use crate::selection::{SelectionState, DEFAULT_EXCLUDED};
use chrono::{DateTime, Local};
use serde::{Serialize, Serializer};
use std::any::Any;
use std::fmt;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, info_span, warn};

/// Outcome of one plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunStatus {
    Success,
    Failure,
    SkippedNoFiles,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Failure => "failure",
            RunStatus::SkippedNoFiles => "skipped-no-files",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved input file, with its digest when hashing is enabled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceFile {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,
}

/// Record of one plugin invocation.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub identity: String,
    pub name: String,
    pub category: String,
    pub status: RunStatus,
    #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
    pub elapsed: Duration,
    pub error: Option<String>,
    pub fragment: Option<ReportFragment>,
    pub source_files: Vec<SourceFile>,
}

fn serialize_secs<S: Serializer>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

/// Terminal record of a run.
#[derive(Debug, Clone, Serialize)]
pub struct CrunchOutcome {
    /// True when at least one plugin succeeded or was skipped, and the run
    /// was not cancelled.
    pub success: bool,
    pub cancelled: bool,
    pub started: DateTime<Local>,
    pub finished: DateTime<Local>,
    pub results: Vec<RunResult>,
}

impl CrunchOutcome {
    pub fn result(&self, identity: &str) -> Option<&RunResult> {
        self.results.iter().find(|r| r.identity == identity)
    }

    pub fn count(&self, status: RunStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    /// Plugins whose output is only viewable outside the HTML report.
    pub fn lava_only(&self) -> Vec<&RunResult> {
        self.results
            .iter()
            .filter(|r| r.fragment.as_ref().map(|f| f.lava_only && f.row_count > 0).unwrap_or(false))
            .collect()
    }
}

/// Progress after each plugin.
#[derive(Debug, Clone, Copy)]
pub struct Progress<'a> {
    pub completed: usize,
    pub total: usize,
    pub identity: &'a str,
    pub status: RunStatus,
}

/// Cooperative cancellation, checked between plugins.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Inputs of a run other than the selection and case data.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Extraction root, already unpacked.
    pub input: PathBuf,
    /// Report output folder; created if missing.
    pub output: PathBuf,
    pub wrap_text: bool,
    pub timezone_offset: String,
    pub os_version: Option<String>,
    /// Record an MD5 digest of every resolved input file.
    pub hash_inputs: bool,
    pub cancel: Option<CancelFlag>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::new(PathBuf::new(), PathBuf::new())
    }
}

impl RunOptions {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            wrap_text: false,
            timezone_offset: String::from("UTC"),
            os_version: None,
            hash_inputs: false,
            cancel: None,
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map(|c| c.is_cancelled()).unwrap_or(false)
    }
}

/// Owns the catalogue and the current selection for the process.
pub struct Engine {
    catalogue: Catalogue,
    selection: SelectionState,
}

impl Engine {
    pub fn new(catalogue: Catalogue) -> Self {
        let selection = SelectionState::initialize(&catalogue, DEFAULT_EXCLUDED);
        Self {
            catalogue,
            selection,
        }
    }

    /// Engine over the compiled-in plugin table.
    pub fn discover() -> Result<Self> {
        Ok(Self::new(Catalogue::discover()?))
    }

    pub fn catalogue(&self) -> &Catalogue {
        &self.catalogue
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut SelectionState {
        &mut self.selection
    }

    /// Runs the current selection.
    pub fn run(
        &self,
        options: &RunOptions,
        case_data: &CaseData,
        progress: &mut dyn FnMut(Progress<'_>),
    ) -> Result<CrunchOutcome> {
        let selected = self.selection.selected_in_order();
        execute(&self.catalogue, &selected, options, case_data, progress)
    }
}

/// Runs `selected` plugins from `catalogue` and finalizes the report.
///
/// Identities run in catalogue order regardless of the order given.
pub fn execute(
    catalogue: &Catalogue,
    selected: &[String],
    options: &RunOptions,
    case_data: &CaseData,
    progress: &mut dyn FnMut(Progress<'_>),
) -> Result<CrunchOutcome> {
    let plugins: Vec<&dyn ArtifactPlugin> = catalogue
        .iter()
        .filter(|p| selected.iter().any(|id| *id == p.descriptor().identity))
        .collect();

    if plugins.is_empty() {
        return Err(LeappError::NoPluginsSelected);
    }

    let seeker = FileSeeker::new(&options.input)?;
    fs::create_dir_all(&options.output).map_err(|e| {
        LeappError::global_io(format!("Cannot create output folder {:?}", options.output), e)
    })?;

    let started = Local::now();
    let total = plugins.len();
    let mut results = Vec::with_capacity(total);
    let mut cancelled = false;

    info!(
        "Processing {} plugins against {:?} ({} files indexed)",
        total,
        seeker.root(),
        seeker.file_count()
    );

    for (position, plugin) in plugins.into_iter().enumerate() {
        if options.is_cancelled() {
            warn!("Run cancelled after {} of {} plugins", position, total);
            cancelled = true;
            break;
        }

        let result = run_plugin(plugin, &seeker, options);
        progress(Progress {
            completed: position + 1,
            total,
            identity: &result.identity,
            status: result.status,
        });
        results.push(result);
    }

    let success = !cancelled && results.iter().any(|r| r.status != RunStatus::Failure);
    let outcome = CrunchOutcome {
        success,
        cancelled,
        started,
        finished: Local::now(),
        results,
    };

    aggregator::finalize(&options.output, &outcome, case_data)?;

    info!(
        "Run finished: {} succeeded, {} skipped, {} failed",
        outcome.count(RunStatus::Success),
        outcome.count(RunStatus::SkippedNoFiles),
        outcome.count(RunStatus::Failure)
    );

    Ok(outcome)
}

fn run_plugin(plugin: &dyn ArtifactPlugin, seeker: &FileSeeker, options: &RunOptions) -> RunResult {
    let descriptor = plugin.descriptor();
    let _span = info_span!("plugin", identity = %descriptor.identity).entered();
    let clock = Instant::now();

    let mut result = RunResult {
        identity: descriptor.identity.clone(),
        name: descriptor.name.clone(),
        category: descriptor.category.clone(),
        status: RunStatus::SkippedNoFiles,
        elapsed: Duration::ZERO,
        error: None,
        fragment: None,
        source_files: Vec::new(),
    };

    let files = seeker.resolve(&descriptor.search_patterns);
    if files.is_empty() {
        info!("No files found for {}", descriptor.name);
        result.elapsed = clock.elapsed();
        return result;
    }

    result.source_files = files
        .iter()
        .map(|path| SourceFile {
            path: path.clone(),
            md5: if options.hash_inputs {
                md5_digest(path)
                    .map_err(|e| warn!("Cannot hash {:?}: {}", path, e))
                    .ok()
            } else {
                None
            },
        })
        .collect();

    info!("{} file(s) found for {}", files.len(), descriptor.name);

    match invoke(plugin, &files, options) {
        Ok(fragment) => {
            if fragment.row_count == 0 {
                info!("No data for {}", descriptor.name);
            }
            result.status = RunStatus::Success;
            result.fragment = Some(fragment);
        }
        Err(message) => {
            error!(
                "{}",
                LeappError::PluginExecution {
                    identity: descriptor.identity.clone(),
                    message: message.clone(),
                }
            );
            result.status = RunStatus::Failure;
            result.error = Some(message);
        }
    }

    result.elapsed = clock.elapsed();
    info!("{} done in {:.2}s", descriptor.name, result.elapsed.as_secs_f64());
    result
}

/// Runs one plugin and writes its fragment. Errors and panics become a message.
fn invoke(
    plugin: &dyn ArtifactPlugin,
    files: &[PathBuf],
    options: &RunOptions,
) -> std::result::Result<ReportFragment, String> {
    let descriptor = plugin.descriptor();
    let report_folder = aggregator::report_folder(&options.output, descriptor);

    let ctx = RunContext {
        report_folder: &report_folder,
        input_root: &options.input,
        wrap_text: options.wrap_text,
        timezone_offset: &options.timezone_offset,
        os_version: options.os_version.as_deref(),
    };

    let table = match panic::catch_unwind(AssertUnwindSafe(|| plugin.run(files, &ctx))) {
        Ok(Ok(table)) => table,
        Ok(Err(e)) => return Err(format!("{:#}", e)),
        Err(payload) => return Err(format!("panicked: {}", panic_message(payload.as_ref()))),
    };

    aggregator::write_fragment(&options.output, descriptor, &table, options.wrap_text)
        .map_err(|e| format!("Cannot write report fragment: {}", e))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("unknown panic payload")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{ArtifactTable, FnPlugin, PluginDescriptor};
    use std::cell::RefCell;
    use tempfile::TempDir;

    fn one_row(_: &[PathBuf], _: &RunContext<'_>) -> anyhow::Result<ArtifactTable> {
        let mut table = ArtifactTable::new(&["value"]);
        table.push_row(vec!["1".into()]);
        Ok(table)
    }

    fn catalogue() -> Catalogue {
        Catalogue::from_plugins(vec![
            Box::new(FnPlugin::new(
                PluginDescriptor::new("t", "a", "A", "X", &["*/a.db"]),
                one_row,
            )),
            Box::new(FnPlugin::new(
                PluginDescriptor::new("t", "b", "B", "X", &["*/b.db"]),
                one_row,
            )),
            Box::new(FnPlugin::new(
                PluginDescriptor::new("t", "c", "C", "Y", &["*"]),
                |_, _| panic!("malformed database"),
            )),
        ])
        .unwrap()
    }

    fn extraction() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("data")).unwrap();
        fs::write(dir.path().join("data/a.db"), b"a").unwrap();
        dir
    }

    #[test]
    fn test_panic_is_recorded_as_failure() {
        let input = extraction();
        let output = TempDir::new().unwrap();
        let options = RunOptions::new(input.path(), output.path());

        let outcome = execute(
            &catalogue(),
            &["t.c".to_string(), "t.a".to_string()],
            &options,
            &CaseData::new(),
            &mut |_| {},
        )
        .unwrap();

        assert_eq!(outcome.results[0].status, RunStatus::Success);
        assert_eq!(outcome.results[1].status, RunStatus::Failure);
        assert!(outcome.results[1]
            .error
            .as_deref()
            .unwrap()
            .contains("malformed database"));
        assert!(outcome.success);
    }

    #[test]
    fn test_all_failed_is_unsuccessful() {
        let input = extraction();
        let output = TempDir::new().unwrap();
        let options = RunOptions::new(input.path(), output.path());

        let outcome = execute(&catalogue(), &["t.c".to_string()], &options, &CaseData::new(), &mut |_| {})
            .unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.count(RunStatus::Failure), 1);
    }

    #[test]
    fn test_empty_selection_is_fatal() {
        let input = extraction();
        let output = TempDir::new().unwrap();
        let options = RunOptions::new(input.path(), output.path());

        let err = execute(&catalogue(), &[], &options, &CaseData::new(), &mut |_| {}).unwrap_err();
        assert!(matches!(err, LeappError::NoPluginsSelected));
    }

    #[test]
    fn test_missing_input_is_fatal_before_output_created() {
        let output = TempDir::new().unwrap();
        let out_dir = output.path().join("report");
        let options = RunOptions::new(output.path().join("absent"), &out_dir);

        let err = execute(&catalogue(), &["t.a".to_string()], &options, &CaseData::new(), &mut |_| {})
            .unwrap_err();
        assert!(matches!(err, LeappError::GlobalIo { .. }));
        assert!(!out_dir.exists());
    }

    #[test]
    fn test_progress_is_monotonic() {
        let input = extraction();
        let output = TempDir::new().unwrap();
        let options = RunOptions::new(input.path(), output.path());
        let seen = RefCell::new(Vec::new());

        let mut engine = Engine::new(catalogue());
        engine.selection_mut().select_all();
        engine
            .run(&options, &CaseData::new(), &mut |p| {
                seen.borrow_mut().push((p.completed, p.total))
            })
            .unwrap();

        assert_eq!(seen.into_inner(), vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[test]
    fn test_cancel_stops_between_plugins() {
        let input = extraction();
        let output = TempDir::new().unwrap();
        let flag = CancelFlag::new();
        let mut options = RunOptions::new(input.path(), output.path());
        options.cancel = Some(flag.clone());

        let engine = Engine::new(catalogue());
        let outcome = engine
            .run(&options, &CaseData::new(), &mut |p| {
                if p.completed == 1 {
                    flag.cancel();
                }
            })
            .unwrap();

        assert!(outcome.cancelled);
        assert!(!outcome.success);
        assert_eq!(outcome.results.len(), 1);
    }

    #[test]
    fn test_no_html_folder_without_html_page() {
        let input = extraction();
        let output = TempDir::new().unwrap();
        let options = RunOptions::new(input.path(), output.path());
        let catalogue = Catalogue::from_plugins(vec![
            Box::new(FnPlugin::new(
                PluginDescriptor::new("t", "empty", "Empty", "Quiet", &["*/a.db"]),
                |_, _| Ok(ArtifactTable::empty()),
            )),
            Box::new(FnPlugin::new(
                PluginDescriptor::new("t", "big", "Big", "Large", &["*/a.db"]).with_lava_only(),
                one_row,
            )),
        ])
        .unwrap();

        let outcome = execute(
            &catalogue,
            &["t.empty".to_string(), "t.big".to_string()],
            &options,
            &CaseData::new(),
            &mut |_| {},
        )
        .unwrap();

        assert_eq!(outcome.count(RunStatus::Success), 2);
        assert!(!output.path().join(aggregator::HTML_DIR).exists());
    }

    #[test]
    fn test_hash_inputs_records_digest() {
        let input = extraction();
        let output = TempDir::new().unwrap();
        let mut options = RunOptions::new(input.path(), output.path());
        options.hash_inputs = true;

        let outcome = execute(&catalogue(), &["t.a".to_string()], &options, &CaseData::new(), &mut |_| {})
            .unwrap();

        let source = &outcome.results[0].source_files[0];
        assert_eq!(source.md5.as_deref(), Some("0cc175b9c0f1b6a831c399e269772661"));
    }
}
