//! FFI (Foreign Function Interface) bindings for native desktop front-ends.
//!
//! This module exposes the engine through C-compatible functions so a GUI
//! shell can list plugins, manage the selection, load/save profiles and start
//! a run without reimplementing any of it.
//!
//! # Memory Management
//!
//! - Rust allocates memory and returns pointers to the caller
//! - The calling code MUST call the corresponding `_free` functions to prevent leaks
//! - Strings are null-terminated UTF-8
//!
//! # Usage from C
//!
//! ```c
//! LeappEngine *engine = leapp_engine_new();
//! leapp_select_all(engine);
//! LeappOutcome *outcome = leapp_run(engine, "/cases/fs", "/cases/report", NULL, "UTC", 0, NULL, NULL);
//! int ok = leapp_outcome_success(outcome);
//! leapp_outcome_free(outcome);
//! leapp_engine_free(engine);
//! ```

use crate::case_data::CaseData;
use crate::engine::{CrunchOutcome, Engine, RunOptions, RunStatus};
use std::ffi::{c_void, CStr, CString};
use std::os::raw::{c_char, c_int};
use std::path::PathBuf;
use std::ptr;
use tracing::error;

// ============================================================================
// C-Compatible Types
// ============================================================================

/// Opaque handle to an engine (catalogue plus selection).
pub struct CEngine {
    engine: Engine,
}

/// Opaque handle to a finished run.
pub struct COutcome {
    outcome: CrunchOutcome,
}

/// Opaque handle to a list of identities.
pub struct CStringList {
    items: Vec<String>,
}

/// C-compatible plugin information
#[repr(C)]
pub struct CPluginInfo {
    pub identity: *mut c_char,
    pub name: *mut c_char,
    pub category: *mut c_char,
    pub enabled: c_int,
    pub lava_only: c_int,
}

/// Progress callback: completed count, total count, caller data.
pub type CProgressCallback = Option<extern "C" fn(c_int, c_int, *mut c_void)>;

// ============================================================================
// Engine Lifecycle
// ============================================================================

/// Build an engine over the compiled-in plugin table.
/// Caller MUST call leapp_engine_free() when done.
#[no_mangle]
pub extern "C" fn leapp_engine_new() -> *mut CEngine {
    match Engine::discover() {
        Ok(engine) => Box::into_raw(Box::new(CEngine { engine })),
        Err(e) => {
            error!("Error building plugin catalogue: {}", e);
            ptr::null_mut()
        }
    }
}

/// Free an engine returned by leapp_engine_new().
#[no_mangle]
pub extern "C" fn leapp_engine_free(engine: *mut CEngine) {
    if !engine.is_null() {
        unsafe {
            let _ = Box::from_raw(engine);
        }
    }
}

// ============================================================================
// Catalogue
// ============================================================================

/// Number of plugins in the catalogue.
#[no_mangle]
pub extern "C" fn leapp_catalogue_count(engine: *const CEngine) -> c_int {
    if engine.is_null() {
        return 0;
    }
    unsafe { (&*engine).engine.catalogue().len() as c_int }
}

/// Plugin at `index` in catalogue order.
/// Caller MUST call leapp_free_plugin_info() when done.
#[no_mangle]
pub extern "C" fn leapp_plugin_get(engine: *const CEngine, index: c_int) -> *mut CPluginInfo {
    if engine.is_null() || index < 0 {
        return ptr::null_mut();
    }

    unsafe {
        let engine = &(*engine).engine;
        let Some(descriptor) = engine.catalogue().descriptors().nth(index as usize) else {
            return ptr::null_mut();
        };

        Box::into_raw(Box::new(CPluginInfo {
            identity: string_to_c_char(&descriptor.identity),
            name: string_to_c_char(&descriptor.name),
            category: string_to_c_char(&descriptor.category),
            enabled: engine.selection().is_enabled(&descriptor.identity) as c_int,
            lava_only: descriptor.output.lava_only as c_int,
        }))
    }
}

/// Free a CPluginInfo returned by leapp_plugin_get().
#[no_mangle]
pub extern "C" fn leapp_free_plugin_info(info: *mut CPluginInfo) {
    if !info.is_null() {
        unsafe {
            let info = Box::from_raw(info);
            free_c_char(info.identity);
            free_c_char(info.name);
            free_c_char(info.category);
        }
    }
}

// ============================================================================
// Selection
// ============================================================================

#[no_mangle]
pub extern "C" fn leapp_select_all(engine: *mut CEngine) {
    if !engine.is_null() {
        unsafe { (&mut *engine).engine.selection_mut().select_all() }
    }
}

#[no_mangle]
pub extern "C" fn leapp_deselect_all(engine: *mut CEngine) {
    if !engine.is_null() {
        unsafe { (&mut *engine).engine.selection_mut().deselect_all() }
    }
}

/// Enable or disable one plugin.
/// Returns 0 on success, 1 for an unknown identity or bad arguments.
#[no_mangle]
pub extern "C" fn leapp_toggle(engine: *mut CEngine, identity: *const c_char, enabled: c_int) -> c_int {
    if engine.is_null() {
        return 1;
    }
    let Some(identity) = c_char_to_string(identity) else {
        return 1;
    };

    unsafe {
        if (&mut *engine).engine.selection_mut().toggle(&identity, enabled != 0) {
            0
        } else {
            1
        }
    }
}

/// Number of selected plugins.
#[no_mangle]
pub extern "C" fn leapp_selected_count(engine: *const CEngine) -> c_int {
    if engine.is_null() {
        return 0;
    }
    unsafe { (&*engine).engine.selection().selected().len() as c_int }
}

/// Identities whose category or name contains `text`.
/// Caller MUST call leapp_free_string_list() when done.
#[no_mangle]
pub extern "C" fn leapp_filter(engine: *const CEngine, text: *const c_char) -> *mut CStringList {
    if engine.is_null() {
        return ptr::null_mut();
    }
    let text = c_char_to_string(text).unwrap_or_default();

    unsafe {
        let items = (&*engine).engine.selection().filter(&text);
        Box::into_raw(Box::new(CStringList { items }))
    }
}

#[no_mangle]
pub extern "C" fn leapp_string_list_count(list: *const CStringList) -> c_int {
    if list.is_null() {
        return 0;
    }
    unsafe { (&*list).items.len() as c_int }
}

/// Item at `index`. Caller MUST call leapp_free_string() when done.
#[no_mangle]
pub extern "C" fn leapp_string_list_get(list: *const CStringList, index: c_int) -> *mut c_char {
    if list.is_null() || index < 0 {
        return ptr::null_mut();
    }
    unsafe {
        match (&*list).items.get(index as usize) {
            Some(item) => string_to_c_char(item),
            None => ptr::null_mut(),
        }
    }
}

#[no_mangle]
pub extern "C" fn leapp_free_string_list(list: *mut CStringList) {
    if !list.is_null() {
        unsafe {
            let _ = Box::from_raw(list);
        }
    }
}

// ============================================================================
// Profiles
// ============================================================================

/// Replace the selection with a saved profile.
/// Returns 0 on success, 1 on error (selection unchanged).
#[no_mangle]
pub extern "C" fn leapp_load_profile(engine: *mut CEngine, path: *const c_char) -> c_int {
    if engine.is_null() {
        return 1;
    }
    let Some(path) = c_char_to_path(path) else {
        return 1;
    };

    unsafe {
        match (&mut *engine).engine.selection_mut().load_profile(&path) {
            Ok(_) => 0,
            Err(e) => {
                error!("Error loading profile: {}", e);
                1
            }
        }
    }
}

/// Save the current selection as a profile.
/// Returns 0 on success, 1 on error.
#[no_mangle]
pub extern "C" fn leapp_save_profile(engine: *const CEngine, path: *const c_char) -> c_int {
    if engine.is_null() {
        return 1;
    }
    let Some(path) = c_char_to_path(path) else {
        return 1;
    };

    unsafe {
        match (&*engine).engine.selection().save_profile(&path) {
            Ok(()) => 0,
            Err(e) => {
                error!("Error saving profile: {}", e);
                1
            }
        }
    }
}

// ============================================================================
// Run
// ============================================================================

/// Run the current selection.
/// `case_data` and `timezone` may be null. `progress` may be null.
/// Returns null if the run could not start (see the log for the reason).
/// Caller MUST call leapp_outcome_free() when done.
#[no_mangle]
pub extern "C" fn leapp_run(
    engine: *const CEngine,
    input: *const c_char,
    output: *const c_char,
    case_data: *const c_char,
    timezone: *const c_char,
    wrap_text: c_int,
    progress: CProgressCallback,
    user_data: *mut c_void,
) -> *mut COutcome {
    if engine.is_null() {
        return ptr::null_mut();
    }
    let (Some(input), Some(output)) = (c_char_to_path(input), c_char_to_path(output)) else {
        return ptr::null_mut();
    };

    let case_data = match c_char_to_path(case_data) {
        Some(path) => match CaseData::read(&path) {
            Ok(data) => data,
            Err(e) => {
                error!("Error loading case data: {}", e);
                return ptr::null_mut();
            }
        },
        None => CaseData::new(),
    };

    let mut options = RunOptions::new(input, output);
    options.wrap_text = wrap_text != 0;
    if let Some(tz) = c_char_to_string(timezone) {
        options.timezone_offset = tz;
    }

    let mut on_progress = |p: crate::engine::Progress<'_>| {
        if let Some(callback) = progress {
            callback(p.completed as c_int, p.total as c_int, user_data);
        }
    };

    unsafe {
        match (&*engine).engine.run(&options, &case_data, &mut on_progress) {
            Ok(outcome) => Box::into_raw(Box::new(COutcome { outcome })),
            Err(e) => {
                error!("Error running plugins: {}", e);
                ptr::null_mut()
            }
        }
    }
}

/// 1 if the run succeeded, 0 otherwise.
#[no_mangle]
pub extern "C" fn leapp_outcome_success(outcome: *const COutcome) -> c_int {
    if outcome.is_null() {
        return 0;
    }
    unsafe { (&*outcome).outcome.success as c_int }
}

#[no_mangle]
pub extern "C" fn leapp_outcome_count(outcome: *const COutcome) -> c_int {
    if outcome.is_null() {
        return 0;
    }
    unsafe { (&*outcome).outcome.results.len() as c_int }
}

/// Status of result `index`: 0=success, 1=failure, 2=skipped (no files), -1=invalid.
#[no_mangle]
pub extern "C" fn leapp_outcome_status(outcome: *const COutcome, index: c_int) -> c_int {
    if outcome.is_null() || index < 0 {
        return -1;
    }
    unsafe {
        match (&*outcome).outcome.results.get(index as usize) {
            Some(result) => status_to_int(result.status),
            None => -1,
        }
    }
}

/// Identity of result `index`. Caller MUST call leapp_free_string() when done.
#[no_mangle]
pub extern "C" fn leapp_outcome_identity(outcome: *const COutcome, index: c_int) -> *mut c_char {
    if outcome.is_null() || index < 0 {
        return ptr::null_mut();
    }
    unsafe {
        match (&*outcome).outcome.results.get(index as usize) {
            Some(result) => string_to_c_char(&result.identity),
            None => ptr::null_mut(),
        }
    }
}

#[no_mangle]
pub extern "C" fn leapp_outcome_free(outcome: *mut COutcome) {
    if !outcome.is_null() {
        unsafe {
            let _ = Box::from_raw(outcome);
        }
    }
}

// ============================================================================
// String Management
// ============================================================================

/// Free a string returned by FFI functions.
#[no_mangle]
pub extern "C" fn leapp_free_string(s: *mut c_char) {
    free_c_char(s);
}

// ============================================================================
// Helper Functions
// ============================================================================

fn string_to_c_char(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(c_str) => c_str.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

fn free_c_char(s: *mut c_char) {
    if !s.is_null() {
        unsafe {
            let _ = CString::from_raw(s);
        }
    }
}

fn c_char_to_string(s: *const c_char) -> Option<String> {
    if s.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(s).to_str().ok().map(|s| s.to_string()) }
}

fn c_char_to_path(s: *const c_char) -> Option<PathBuf> {
    c_char_to_string(s)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}

fn status_to_int(status: RunStatus) -> c_int {
    match status {
        RunStatus::Success => 0,
        RunStatus::Failure => 1,
        RunStatus::SkippedNoFiles => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn c(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    fn take(s: *mut c_char) -> String {
        let owned = unsafe { CStr::from_ptr(s).to_string_lossy().into_owned() };
        leapp_free_string(s);
        owned
    }

    #[test]
    fn test_catalogue_and_selection() {
        let engine = leapp_engine_new();
        assert!(!engine.is_null());

        let count = leapp_catalogue_count(engine);
        assert!(count > 0);

        let info = leapp_plugin_get(engine, 0);
        let identity = unsafe { CStr::from_ptr((*info).identity).to_owned() };
        leapp_free_plugin_info(info);
        assert!(leapp_plugin_get(engine, count).is_null());

        leapp_deselect_all(engine);
        assert_eq!(leapp_selected_count(engine), 0);
        assert_eq!(leapp_toggle(engine, identity.as_ptr(), 1), 0);
        assert_eq!(leapp_selected_count(engine), 1);
        assert_eq!(leapp_toggle(engine, c("no.such.plugin").as_ptr(), 1), 1);

        let list = leapp_filter(engine, c("PHOTOS").as_ptr());
        assert!(leapp_string_list_count(list) >= 1);
        assert_eq!(take(leapp_string_list_get(list, 0)), identity.to_str().unwrap());
        leapp_free_string_list(list);

        leapp_engine_free(engine);
    }

    #[test]
    fn test_profile_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = c(dir.path().join("p.json").to_str().unwrap());
        let engine = leapp_engine_new();

        leapp_deselect_all(engine);
        assert_eq!(leapp_save_profile(engine, path.as_ptr()), 0);
        leapp_select_all(engine);
        assert_eq!(leapp_load_profile(engine, path.as_ptr()), 0);
        assert_eq!(leapp_selected_count(engine), 0);
        assert_eq!(leapp_load_profile(engine, c("/no/such/profile.json").as_ptr()), 1);

        leapp_engine_free(engine);
    }

    extern "C" fn count_progress(_completed: c_int, _total: c_int, user_data: *mut c_void) {
        unsafe { *(user_data as *mut c_int) += 1 };
    }

    #[test]
    fn test_run_over_empty_extraction() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let engine = leapp_engine_new();
        leapp_select_all(engine);

        let mut calls: c_int = 0;
        let outcome = leapp_run(
            engine,
            c(input.path().to_str().unwrap()).as_ptr(),
            c(output.path().to_str().unwrap()).as_ptr(),
            ptr::null(),
            ptr::null(),
            0,
            Some(count_progress),
            &mut calls as *mut c_int as *mut c_void,
        );

        assert!(!outcome.is_null());
        assert_eq!(leapp_outcome_success(outcome), 1);
        assert_eq!(leapp_outcome_count(outcome), leapp_catalogue_count(engine));
        assert_eq!(leapp_outcome_status(outcome, 0), 2);
        assert_eq!(leapp_outcome_status(outcome, 999), -1);
        assert!(!take(leapp_outcome_identity(outcome, 0)).is_empty());
        assert_eq!(calls, leapp_catalogue_count(engine));

        leapp_outcome_free(outcome);
        leapp_engine_free(engine);
    }
}
