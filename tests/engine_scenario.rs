use anyhow::anyhow;
use leapp_core::aggregator::{INDEX_FILE, LOG_DIR, RUN_LOG_FILE};
use leapp_core::{
    ArtifactPlugin, ArtifactTable, CaseData, CaseField, Catalogue, Engine, FnPlugin,
    PluginDescriptor, Profile, Progress, RunOptions, RunStatus,
};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn mixed_catalogue() -> Catalogue {
    let a = FnPlugin::new(
        PluginDescriptor::new("scenario", "a", "Artifact A", "X", &["**/a.db"]),
        |files, _ctx| {
            let mut table = ArtifactTable::new(&["File"]).with_source(&files[0]);
            for file in files {
                table.push_row(vec![file.display().to_string()]);
            }
            Ok(table)
        },
    );
    let b = FnPlugin::new(
        PluginDescriptor::new("scenario", "b", "Artifact B", "X", &["**/never-present.plist"]),
        |_, _| Ok(ArtifactTable::empty()),
    );
    let c = FnPlugin::new(
        PluginDescriptor::new("scenario", "c", "Artifact C", "Y", &["**/a.db"]),
        |_, _| Err(anyhow!("malformed record at offset 12")),
    );

    let plugins: Vec<Box<dyn ArtifactPlugin>> = vec![Box::new(c), Box::new(b), Box::new(a)];
    Catalogue::from_plugins(plugins).unwrap()
}

fn extraction() -> TempDir {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("private/var/mobile");
    fs::create_dir_all(&nested).unwrap();
    fs::write(nested.join("a.db"), b"data").unwrap();
    dir
}

#[test]
fn mixed_outcomes_produce_successful_report() {
    let input = extraction();
    let output = TempDir::new().unwrap();
    let report = output.path().join("report");

    let mut engine = Engine::new(mixed_catalogue());
    engine.selection_mut().select_all();

    let mut case_data = CaseData::new();
    case_data.set(CaseField::CaseNumber, "2024-117");

    let mut seen = Vec::new();
    let outcome = engine
        .run(
            &RunOptions::new(input.path(), &report),
            &case_data,
            &mut |p: Progress<'_>| seen.push((p.completed, p.identity.to_string())),
        )
        .unwrap();

    let statuses: Vec<(&str, RunStatus)> = outcome
        .results
        .iter()
        .map(|r| (r.identity.as_str(), r.status))
        .collect();
    assert_eq!(
        statuses,
        vec![
            ("scenario.a", RunStatus::Success),
            ("scenario.b", RunStatus::SkippedNoFiles),
            ("scenario.c", RunStatus::Failure),
        ]
    );
    assert!(outcome.success);
    assert!(!outcome.cancelled);

    let c = outcome.result("scenario.c").unwrap();
    assert!(c.error.as_deref().unwrap().contains("malformed record"));

    let a = outcome.result("scenario.a").unwrap();
    assert_eq!(a.source_files.len(), 1);
    assert_eq!(a.fragment.as_ref().unwrap().row_count, 1);

    assert_eq!(seen.len(), 3);
    assert_eq!(seen.last().unwrap().0, 3);

    let index = fs::read_to_string(report.join(INDEX_FILE)).unwrap();
    assert!(index.contains("Artifact A"));
    assert!(index.contains("2024-117"));

    let run_log = fs::read_to_string(report.join(LOG_DIR).join(RUN_LOG_FILE)).unwrap();
    let run_log: serde_json::Value = serde_json::from_str(&run_log).unwrap();
    assert_eq!(run_log["results"].as_array().unwrap().len(), 3);
    assert_eq!(run_log["results"][1]["status"], "skipped-no-files");
}

#[test]
fn profile_limits_the_run() {
    let input = extraction();
    let output = TempDir::new().unwrap();
    let profile_path = output.path().join("only-b.json");

    Profile::new(vec!["scenario.b".to_string(), "scenario.gone".to_string()])
        .write(&profile_path)
        .unwrap();

    let mut engine = Engine::new(mixed_catalogue());
    assert_eq!(engine.selection_mut().load_profile(&profile_path).unwrap(), 1);

    let outcome = engine
        .run(
            &RunOptions::new(input.path(), output.path().join("report")),
            &CaseData::new(),
            &mut |_: Progress<'_>| {},
        )
        .unwrap();

    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.results[0].status, RunStatus::SkippedNoFiles);
    assert!(outcome.success);
}

#[test]
fn case_data_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("case.json");

    let mut data = CaseData::new();
    data.set(CaseField::CaseNumber, "A-1");
    data.set(CaseField::Agency, "Metro Forensics");
    data.set(CaseField::Examiner, "R. Lane");
    data.save(&path).unwrap();

    let mut loaded = CaseData::new();
    loaded.load(&path).unwrap();
    assert_eq!(loaded, data);
}

#[test]
fn same_name_plugins_keep_their_own_rows() {
    let input = extraction();
    let output = TempDir::new().unwrap();
    let report = output.path().join("report");

    let messages = |key: &str, category: &str, value: &'static str| -> Box<dyn ArtifactPlugin> {
        Box::new(FnPlugin::new(
            PluginDescriptor::new("m", key, "Messages", category, &["**/a.db"]).with_timeline(),
            move |_, _| {
                let mut table = ArtifactTable::new(&["Date", "v"]);
                table.push_row(vec!["2024".to_string(), value.to_string()]);
                Ok(table)
            },
        ))
    };
    let catalogue =
        Catalogue::from_plugins(vec![messages("x", "X", "from-X"), messages("y", "Y", "from-Y")])
            .unwrap();

    let mut engine = Engine::new(catalogue);
    engine.selection_mut().select_all();
    let outcome = engine
        .run(
            &RunOptions::new(input.path(), &report),
            &CaseData::new(),
            &mut |_: Progress<'_>| {},
        )
        .unwrap();
    assert_eq!(outcome.count(RunStatus::Success), 2);

    let timeline = fs::read_to_string(report.join("_Timeline").join("timeline.tsv")).unwrap();
    assert_eq!(timeline.matches("from-X").count(), 1);
    assert_eq!(timeline.matches("from-Y").count(), 1);

    let x = fs::read_to_string(report.join("_TSV Exports").join("m.x.tsv")).unwrap();
    assert!(x.contains("from-X"));
}
