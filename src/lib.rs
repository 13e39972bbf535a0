//! LEAPP Core Library
//!
//! Plugin engine for forensic artifact parsing over extracted device file
//! systems (iOS-first). Each artifact plugin declares the files it needs as
//! glob patterns; the engine resolves those against the extraction, runs the
//! selected plugins one at a time and collects their tables into a report.
//!
//! # Architecture
//!
//! The library is consumed in two ways:
//! - **CLI**: the `leapp` binary in `src/bin`
//! - **Native front-ends**: through the C ABI in the `ffi` module (cdylib/staticlib)
//!
//! # Modules
//!
//! ## Plugin Catalogue (`registry` module)
//! - `Catalogue::discover()` - Load and validate the compiled-in plugin table
//! - Sorted by category then name; malformed plugins are reported and skipped
//!
//! ## Selection and Profiles (`selection` module)
//! - `SelectionState` - Enabled flag per identity, toggle/select-all/filter
//! - `Profile` - Saved selection files with a format marker and version
//!
//! ## File Resolution (`resolver` module)
//! - `FileSeeker` - Walks the extraction once and matches search patterns
//!
//! ## Execution (`engine` module)
//! - `Engine::run()` - Sequential run with per-plugin isolation and progress
//! - `RunResult` / `CrunchOutcome` - Status, timing and errors per plugin
//!
//! ## Report (`aggregator` module)
//! - Per-plugin TSV/HTML fragments, merged timeline, run log and index page
//!
//! ## Case Data (`case_data` module)
//! - Case number, agency, logo and examiner shown on the report banner
//!
//! ## Artifacts (`artifacts` module)
//! - Built-in plugins, with `schema`/`sqlite` helpers for version-dependent
//!   SQLite layouts

pub mod aggregator;
pub mod artifacts;
pub mod case_data;
pub mod engine;
pub mod error;
pub mod ffi;
pub mod logging;
pub mod plugin;
pub mod registry;
pub mod resolver;
pub mod schema;
pub mod selection;
pub mod sqlite;

pub use aggregator::{FinalReport, ReportFragment};
pub use case_data::{CaseData, CaseField};
pub use engine::{
    execute, CancelFlag, CrunchOutcome, Engine, Progress, RunOptions, RunResult, RunStatus,
    SourceFile,
};
pub use error::{LeappError, Result};
pub use plugin::{
    ArtifactMetadata, ArtifactPlugin, ArtifactTable, FnPlugin, OutputHints, PluginDescriptor,
    RunContext,
};
pub use registry::Catalogue;
pub use resolver::FileSeeker;
pub use selection::{Profile, SelectionState};
