// Copyright 2021 - 2025 Martin Pool

//! `bcmutants`: inject bugs into compiled bitcode and see if your tests
//! catch them.
//!
//! This binary is a thin CLI over the `bcmutants` library: it parses
//! arguments, reads an already-decoded module and test list from disk
//! (this crate never parses a compiler's native bitcode format, see
//! `bcmutants::bitcode`), wires up the default `Toolchain`/`Launcher`/
//! `Sandbox`/`JunkFilter`, runs the engine, and formats the result.

use std::fs;
use std::process::ExitCode;

use anyhow::Context;
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use bcmutants::config::{Config, Options};
use bcmutants::engine::Engine;
use bcmutants::ir::Module;
use bcmutants::junk::NullJunkFilter;
use bcmutants::launcher::Launcher;
use bcmutants::report;
use bcmutants::sandbox::Sandbox;
use bcmutants::test_case::TestCase;
use bcmutants::toolchain::ShellToolchain;
use bcmutants::{bitcode::BitcodeStore, bitcode::ModuleId, cache::ObjectCache, exit_code};

#[derive(Parser, Debug)]
#[command(name = "bcmutants", about = "Inject bugs into compiled bitcode and see if your tests catch them")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding `bcmutants.toml`, if any.
    #[arg(long, global = true, default_value = ".")]
    dir: Utf8PathBuf,

    /// Fail the whole run on any toolchain error, overriding config.
    #[arg(long, global = true)]
    strict: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the mutation points that would be generated, without running them.
    List {
        /// Path to a JSON-serialized module (`bcmutants::ir::Module`).
        #[arg(long)]
        module: Utf8PathBuf,

        #[arg(long, value_enum, default_value = "ide")]
        format: ListFormat,
    },
    /// Plan mutations, run every test against every mutant, and report the result.
    Run {
        #[arg(long)]
        module: Utf8PathBuf,
        /// Path to a JSON array of `bcmutants::test_case::TestCase`.
        #[arg(long)]
        tests: Utf8PathBuf,
        #[arg(long, value_enum, default_value = "ide")]
        format: ReportFormat,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ListFormat {
    Ide,
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ReportFormat {
    Ide,
    Json,
    Elements,
}

fn load_module(store: &BitcodeStore, path: &Utf8PathBuf) -> anyhow::Result<(ModuleId, Module)> {
    let bytes = fs::read(path).with_context(|| format!("read module {path}"))?;
    let module = Module::from_bytes(&bytes).with_context(|| format!("parse module {path}"))?;
    let module_id = store.insert(module.clone())?;
    Ok((module_id, module))
}

fn load_tests(path: &Utf8PathBuf) -> anyhow::Result<Vec<TestCase>> {
    let bytes = fs::read(path).with_context(|| format!("read test list {path}"))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parse test list {path}"))
}

fn default_sandbox() -> Box<dyn Sandbox> {
    #[cfg(unix)]
    {
        Box::new(bcmutants::sandbox::ForkSandbox)
    }
    #[cfg(not(unix))]
    {
        Box::new(bcmutants::sandbox::NullSandbox)
    }
}

fn default_launcher() -> Box<dyn Launcher> {
    #[cfg(unix)]
    {
        Box::new(bcmutants::launcher::DlopenLauncher)
    }
    #[cfg(not(unix))]
    {
        Box::new(bcmutants::launcher::NullLauncher)
    }
}

fn run() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    bcmutants::interrupt::install_handler();

    let cli = Cli::parse();
    let mut config = Config::read_tree_config(&cli.dir)?;
    if cli.strict {
        config.strict = true;
    }
    let options = Options::from_config(&config)?;

    let bitcode_store = BitcodeStore::new();

    match cli.command {
        Command::List { module, format } => {
            let (module_id, module) = load_module(&bitcode_store, &module)?;
            let operators = bcmutants::operators::catalog_for(&options.operator_ids);
            let plan = bcmutants::planner::plan(&module_id, &module, &operators, &NullJunkFilter, options.workers)?;
            match format {
                ListFormat::Ide => {
                    for point in &plan.points {
                        println!("{}", point.user_identifier());
                    }
                }
                ListFormat::Json => {
                    serde_json::to_writer_pretty(std::io::stdout(), &plan.points)?;
                    println!();
                }
            }
            Ok(ExitCode::from(exit_code::SUCCESS as u8))
        }
        Command::Run { module, tests, format } => {
            let (module_id, module) = load_module(&bitcode_store, &module)?;
            let tests = load_tests(&tests)?;
            let work_dir = tempfile::tempdir().context("create working directory")?;
            let work_dir = Utf8PathBuf::from_path_buf(work_dir.path().to_owned())
                .map_err(|p| anyhow::anyhow!("working directory {p:?} is not utf-8"))?;
            let toolchain = ShellToolchain::default();
            let sandbox = default_sandbox();
            let launcher = default_launcher();
            let cache = match &options.cache_dir {
                Some(dir) => ObjectCache::with_disk_dir(dir.clone())?,
                None => ObjectCache::in_memory_only(),
            };
            let engine = Engine {
                options: &options,
                toolchain: &toolchain,
                launcher: launcher.as_ref(),
                sandbox: sandbox.as_ref(),
                junk_filter: &NullJunkFilter,
                cache: &cache,
                work_dir,
            };
            let result = engine.run(&module_id, &module, &tests)?;
            match format {
                ReportFormat::Ide => {
                    for line in report::ide_lines(&result) {
                        println!("{line}");
                    }
                }
                ReportFormat::Json => {
                    serde_json::to_writer_pretty(std::io::stdout(), &result.mutation_points)?;
                    println!();
                }
                ReportFormat::Elements => {
                    println!("{}", report::elements_document_json(&result)?);
                }
            }
            eprintln!("mutation score: {:.1}%", result.mutation_score());
            if result.mutation_results.iter().any(|r| !r.is_killed()) {
                Ok(ExitCode::from(exit_code::FOUND_PROBLEMS as u8))
            } else {
                Ok(ExitCode::from(exit_code::SUCCESS as u8))
            }
        }
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(exit_code::USAGE as u8)
        }
    }
}
