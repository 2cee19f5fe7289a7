use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::LevelFilter;
use p3build::orchestrator::load_config;
use p3build::{Orchestrator, PackageFormat, RootUser, SystemRunner};

/// Exit status after Ctrl-C, as a shell reports SIGINT.
const INTERRUPTED_EXIT: i32 = 130;

/// Package a Python program into deb, rpm and tgz files.
#[derive(Parser, Debug)]
#[command(name = "p3build", version)]
struct Cli {
    /// Show debug output and the full error chain on failure
    #[arg(long)]
    debug: bool,

    /// Remove the build and packages directories, then exit
    #[arg(long)]
    clean: bool,

    /// Leave the build directory in place after building
    #[arg(long)]
    lbp: bool,

    /// Also build an rpm package
    #[arg(long)]
    rpm: bool,

    /// Also build a tgz package
    #[arg(long)]
    tgz: bool,

    /// Directory holding the python/ and debian/ folders
    #[arg(short = 'C', long, value_name = "DIR", default_value = ".")]
    directory: PathBuf,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    ctrlc::set_handler(|| {
        std::process::exit(INTERRUPTED_EXIT);
    })
    .context("installing Ctrl-C handler")?;

    if cli.debug {
        run(&cli)?;
        return Ok(ExitCode::SUCCESS);
    }

    match run(&cli) {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            println!("ERROR: {}", root_message(&e));
            Ok(ExitCode::FAILURE)
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let privilege = RootUser;
    let mut config = load_config(&cli.directory, &privilege)
        .with_context(|| format!("preparing build in '{}'", cli.directory.display()))?;
    if cli.rpm {
        config.request_format(PackageFormat::Rpm);
    }
    if cli.tgz {
        config.request_format(PackageFormat::Tgz);
    }
    if cli.lbp {
        config.leave_build_path = true;
    }

    let orchestrator = Orchestrator::new(config, &privilege, &SystemRunner);

    if cli.clean {
        return orchestrator.run_clean_only().context("cleaning build outputs");
    }

    let report = orchestrator.run().with_context(|| {
        format!("packaging '{}'", orchestrator.config().work_dir.display())
    })?;
    log::info!(
        "Built {} artifact(s) for {}",
        report.artifacts.len(),
        report.identity.artifact_stem()
    );
    Ok(())
}

/// The library error without the context added here; that is the one line
/// shown when not debugging.
fn root_message(err: &anyhow::Error) -> String {
    match err.downcast_ref::<p3build::Error>() {
        Some(inner) => inner.to_string(),
        None => err.to_string(),
    }
}

/// `INFO:  message` lines on stdout; `--debug` lowers the filter to debug.
fn init_logging(debug: bool) {
    let default = if debug { LevelFilter::Debug } else { LevelFilter::Info };
    env_logger::Builder::new()
        .filter_level(default)
        .parse_default_env()
        .target(env_logger::Target::Stdout)
        .format(|buf, record| {
            let level = record.level().to_string();
            writeln!(buf, "{:<6} {}", format!("{level}:"), record.args())
        })
        .init();
}
