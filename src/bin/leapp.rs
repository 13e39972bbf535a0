//! `leapp` - parse forensic artifacts from an extracted device file system.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use leapp_core::aggregator::{INDEX_FILE, LOG_DIR};
use leapp_core::resolver::check_root;
use leapp_core::{logging, CaseData, CaseField, Engine, Progress, RunOptions, RunStatus};
use tracing::{error, info, warn};

/// Application exit codes
#[repr(u8)]
enum Exit {
    Success = 0,
    GeneralError = 1,
    /// The run finished but produced nothing usable.
    RunFailed = 2,
}

impl From<Exit> for ExitCode {
    fn from(exit: Exit) -> Self {
        ExitCode::from(exit as u8)
    }
}

#[derive(Parser)]
#[command(name = "leapp", version, about = "Forensic artifact parser for extracted device file systems")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List available artifact plugins
    List {
        /// Only show plugins whose category or name contains TEXT
        #[arg(long, value_name = "TEXT")]
        filter: Option<String>,
    },

    /// Run plugins over an extraction and write a report
    Run(RunArgs),

    /// Manage selection profiles
    #[command(subcommand)]
    Profile(ProfileCommand),

    /// Manage case data files
    #[command(subcommand)]
    CaseData(CaseDataCommand),
}

#[derive(Args)]
struct RunArgs {
    /// Root folder of the extracted file system
    #[arg(short, long, value_name = "DIR")]
    input: PathBuf,

    /// Report output folder
    #[arg(short, long, value_name = "DIR")]
    output: PathBuf,

    /// Load the selection from a profile
    #[arg(long, value_name = "FILE")]
    profile: Option<PathBuf>,

    /// Case data to show on the report banner
    #[arg(long, value_name = "FILE")]
    case_data: Option<PathBuf>,

    /// Run only these plugins (repeatable; overrides --profile)
    #[arg(long = "plugin", value_name = "ID")]
    plugins: Vec<String>,

    /// Timezone offset applied to timestamps
    #[arg(long, default_value = "UTC", value_name = "OFFSET")]
    timezone: String,

    /// OS version of the extraction (detected from the data when omitted)
    #[arg(long, value_name = "VERSION", env = "LEAPP_OS_VERSION")]
    os_version: Option<String>,

    /// Wrap long cell text in HTML reports
    #[arg(long)]
    wrap_text: bool,

    /// Record MD5 digests of every input file used
    #[arg(long)]
    hash_inputs: bool,
}

#[derive(Subcommand)]
enum ProfileCommand {
    /// Write a profile. Without --plugin or --filter all plugins are saved.
    Save {
        file: PathBuf,

        #[arg(long = "plugin", value_name = "ID")]
        plugins: Vec<String>,

        #[arg(long, value_name = "TEXT")]
        filter: Option<String>,
    },
    /// Print the plugins enabled by a profile
    Show { file: PathBuf },
}

#[derive(Subcommand)]
enum CaseDataCommand {
    /// Create or update a case data file
    Save {
        file: PathBuf,

        #[arg(long)]
        case_number: Option<String>,

        #[arg(long)]
        agency: Option<String>,

        #[arg(long)]
        examiner: Option<String>,

        /// Agency logo image (png, jpg, gif, bmp)
        #[arg(long, value_name = "IMAGE")]
        logo: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_file = match log_file_for(&cli.command) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("Error: {e}");
            return Exit::GeneralError.into();
        }
    };

    if let Err(e) = logging::init(cli.verbose, cli.quiet, log_file.as_deref()) {
        eprintln!("Error: {e:#}");
        return Exit::GeneralError.into();
    }

    let result = match cli.command {
        Command::List { filter } => list(filter.as_deref()),
        Command::Run(args) => run(args),
        Command::Profile(command) => profile(command),
        Command::CaseData(command) => case_data(command),
    };

    match result {
        Ok(exit) => {
            if !matches!(exit, Exit::Success) {
                print_log_hint(log_file.as_deref());
            }
            exit.into()
        }
        Err(e) => {
            error!("{e:#}");
            print_log_hint(log_file.as_deref());
            Exit::GeneralError.into()
        }
    }
}

/// Where the run log goes. A run over a missing input root fails here,
/// before anything is created under the output folder.
fn log_file_for(command: &Command) -> leapp_core::Result<Option<PathBuf>> {
    match command {
        Command::Run(args) => {
            check_root(&args.input)?;
            Ok(Some(args.output.join(LOG_DIR).join(logging::LOG_FILE)))
        }
        _ => Ok(None),
    }
}

fn print_log_hint(log_file: Option<&Path>) {
    if let Some(path) = log_file {
        if path.exists() {
            eprintln!("See log for details: {}", path.display());
        }
    }
}

fn list(filter: Option<&str>) -> Result<Exit> {
    let engine = Engine::discover()?;
    let identities = engine.selection().filter(filter.unwrap_or(""));

    for identity in &identities {
        if let Some(descriptor) = engine.catalogue().descriptor(identity) {
            let marker = if descriptor.output.lava_only { " [LAVA only]" } else { "" };
            println!(
                "{}\t{}\t{}{}",
                descriptor.identity, descriptor.category, descriptor.name, marker
            );
        }
    }

    for (identity, reason) in engine.catalogue().rejected() {
        warn!("Plugin {} unavailable: {}", identity, reason);
    }

    Ok(Exit::Success)
}

fn run(args: RunArgs) -> Result<Exit> {
    let mut engine = Engine::discover()?;

    if let Some(path) = &args.profile {
        let enabled = engine.selection_mut().load_profile(path)?;
        info!("Loaded profile {:?} ({} plugins)", path, enabled);
    }

    if !args.plugins.is_empty() {
        select_only(&mut engine, &args.plugins)?;
    }

    let case_data = match &args.case_data {
        Some(path) => CaseData::read(path)?,
        None => CaseData::new(),
    };

    let options = RunOptions {
        wrap_text: args.wrap_text,
        timezone_offset: args.timezone,
        os_version: args.os_version,
        hash_inputs: args.hash_inputs,
        ..RunOptions::new(&args.input, &args.output)
    };

    let outcome = engine.run(&options, &case_data, &mut |progress: Progress<'_>| {
        info!(
            "[{}/{}] {} {}",
            progress.completed, progress.total, progress.identity, progress.status
        );
    })?;

    println!(
        "{} succeeded, {} failed, {} skipped (no files) in {:.1}s",
        outcome.count(RunStatus::Success),
        outcome.count(RunStatus::Failure),
        outcome.count(RunStatus::SkippedNoFiles),
        (outcome.finished - outcome.started).num_milliseconds() as f64 / 1000.0
    );
    for result in outcome.lava_only() {
        println!("{} is only viewable in LAVA", result.name);
    }
    println!("Report: {}", args.output.join(INDEX_FILE).display());

    if outcome.success {
        Ok(Exit::Success)
    } else {
        Ok(Exit::RunFailed)
    }
}

fn select_only(engine: &mut Engine, identities: &[String]) -> Result<()> {
    let selection = engine.selection_mut();
    selection.deselect_all();
    for identity in identities {
        if !selection.toggle(identity, true) {
            bail!("Unknown plugin {:?}", identity);
        }
    }
    Ok(())
}

fn profile(command: ProfileCommand) -> Result<Exit> {
    match command {
        ProfileCommand::Save {
            file,
            plugins,
            filter,
        } => {
            let mut engine = Engine::discover()?;
            engine.selection_mut().select_all();

            if let Some(text) = filter {
                let mut matched = engine.selection().filter(&text);
                matched.extend(plugins);
                select_only(&mut engine, &matched)?;
            } else if !plugins.is_empty() {
                select_only(&mut engine, &plugins)?;
            }

            engine
                .selection()
                .save_profile(&file)
                .with_context(|| format!("Failed to save profile {:?}", file))?;
            println!(
                "Saved {} plugins to {}",
                engine.selection().selected().len(),
                file.display()
            );
        }
        ProfileCommand::Show { file } => {
            let mut engine = Engine::discover()?;
            engine.selection_mut().load_profile(&file)?;
            for identity in engine.selection().selected_in_order() {
                println!("{}", identity);
            }
        }
    }

    Ok(Exit::Success)
}

fn case_data(command: CaseDataCommand) -> Result<Exit> {
    let CaseDataCommand::Save {
        file,
        case_number,
        agency,
        examiner,
        logo,
    } = command;

    let mut data = if file.exists() {
        CaseData::read(&file)?
    } else {
        CaseData::new()
    };

    for (field, value) in [
        (CaseField::CaseNumber, case_number),
        (CaseField::Agency, agency),
        (CaseField::Examiner, examiner),
    ] {
        if let Some(value) = value {
            data.set(field, value);
        }
    }

    if let Some(path) = logo {
        data.set_agency_logo(&path)?;
    }

    data.save(&file)?;
    println!("Saved case data to {}", file.display());

    Ok(Exit::Success)
}
