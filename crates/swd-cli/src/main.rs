//! `swd` - incremental build/operations orchestrator over a filesystem
//! namespace of executable steps.
//!
//! Flow: load `.swd.conf`, resolve the cache directory against the
//! directory it was found in (before any further chdir), switch the
//! process into the discovery root (`exec_path`/`canonical_path` are root-
//! relative, not absolute), scan and probe the tree, restore the hash
//! cache, run the requested operation, and save the cache back out.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, FromArgMatches, Parser};

use swd_core::{cache, EngineSignal, ExecuteOptions, Executor, Master};

use swd_cli::{config, info, output, scan, signal};

/// Incremental build/operations orchestrator.
#[derive(Parser, Debug)]
#[command(name = "swd", version, about = "Incremental build/operations orchestrator")]
struct Cli {
    /// Change to this directory before doing anything else.
    #[arg(short = 'C', value_name = "path")]
    chdir: Option<PathBuf>,

    /// Raise the log level to debug.
    #[arg(short, long)]
    verbose: bool,

    /// List every step and whether it is completed.
    #[arg(long = "list-steps")]
    list_steps: bool,

    /// List every declared artifact and its staleness status.
    #[arg(long = "list-artifacts")]
    list_artifacts: bool,

    /// Print the next step that would run and stop.
    #[arg(short = 'n', long)]
    next: bool,

    /// Clear completion of the named unit (step, script, or group) and
    /// everything after it, without running anything.
    #[arg(short = 'u', long, value_name = "unit")]
    undo: Option<String>,

    /// Run the named step unconditionally.
    #[arg(short = 'f', long, value_name = "step")]
    force: Option<String>,

    /// Recompute and store an artifact's hash outside of normal execution.
    #[arg(short = 'r', long, value_name = "artifact")]
    rehash: Option<String>,

    /// Prompt before running each step.
    #[arg(short, long)]
    interactive: bool,

    /// Run at most this many steps (default: unbounded).
    #[arg(short, long, value_name = "n")]
    step: Option<u32>,
}

enum Operation {
    ListSteps,
    ListArtifacts,
    Undo(String),
    Force(String),
    Rehash(String),
    ShowNext,
    Interactive,
    Execute(Option<u32>),
}

fn pick_operation(cli: &Cli) -> Result<Operation> {
    let mut named = Vec::new();
    if cli.list_steps {
        named.push("--list-steps");
    }
    if cli.list_artifacts {
        named.push("--list-artifacts");
    }
    if cli.next {
        named.push("--next");
    }
    if cli.undo.is_some() {
        named.push("--undo");
    }
    if cli.force.is_some() {
        named.push("--force");
    }
    if cli.rehash.is_some() {
        named.push("--rehash");
    }
    if cli.interactive {
        named.push("--interactive");
    }
    if named.len() > 1 {
        bail!("only one of {} may be given at a time", named.join(", "));
    }

    if cli.list_steps {
        return Ok(Operation::ListSteps);
    }
    if cli.list_artifacts {
        return Ok(Operation::ListArtifacts);
    }
    if let Some(unit) = &cli.undo {
        return Ok(Operation::Undo(unit.clone()));
    }
    if let Some(step) = &cli.force {
        return Ok(Operation::Force(step.clone()));
    }
    if let Some(artifact) = &cli.rehash {
        return Ok(Operation::Rehash(artifact.clone()));
    }
    if cli.next {
        return Ok(Operation::ShowNext);
    }
    if cli.interactive {
        return Ok(Operation::Interactive);
    }
    if let Some(n) = cli.step {
        if n == 0 {
            bail!("value for --step must be a positive number");
        }
    }
    Ok(Operation::Execute(cli.step))
}

fn engine_err(e: EngineSignal) -> anyhow::Error {
    match e {
        EngineSignal::Fatal(core_err) => anyhow::anyhow!(core_err.to_string()),
        EngineSignal::InvalidateScope(scope) => {
            anyhow::anyhow!("internal error: scope invalidation for '{scope}' escaped the executor")
        }
    }
}

fn run() -> Result<()> {
    // `-?` is the original tool's help alias alongside the usual `-h`/`--help`.
    let command = Cli::command().mut_arg("help", |a| a.short_alias('?'));
    let cli = Cli::from_arg_matches(&command.get_matches())?;

    swd_core::init_logging(if cli.verbose { "debug" } else { "info" });

    if let Some(dir) = &cli.chdir {
        std::env::set_current_dir(dir).with_context(|| format!("chdir to {}", dir.display()))?;
    }

    let operation = pick_operation(&cli)?;

    let cfg = config::load()?;
    // cache_dir is relative to the directory .swd.conf was found in, not to
    // the discovery root — resolve it to an absolute path before the
    // upcoming chdir into root changes what "relative" means.
    let cache_dir = if cfg.engine.cache_dir.is_absolute() {
        cfg.engine.cache_dir.clone()
    } else {
        cfg.base_path.join(&cfg.engine.cache_dir)
    };

    std::env::set_current_dir(&cfg.root)
        .with_context(|| format!("chdir to discovery root {}", cfg.root.display()))?;

    signal::install().context("installing SIGINT handler")?;

    let tree = scan::scan(&cfg.root)?;
    let mut master = Master {
        tree,
        artifacts: Default::default(),
        config: cfg.engine.clone(),
    };
    info::populate(&mut master.tree, &mut master.artifacts, &cfg.root)?;
    cache::restore(&mut master, &cache_dir)?;

    let result = dispatch(&mut master, operation);

    if let Err(e) = cache::save(&master, &cache_dir) {
        log::warn!("failed to save cache: {e}");
    }

    result
}

fn dispatch(master: &mut Master, operation: Operation) -> Result<()> {
    match operation {
        Operation::ListSteps => {
            output::list_steps(master);
            Ok(())
        }
        Operation::ListArtifacts => output::list_artifacts(master),
        Operation::Undo(unit_path) => {
            let id = master.tree.find_unit(&unit_path)?;
            master.undo_unit(id);
            Ok(())
        }
        Operation::Force(step_path) => {
            let id = master.tree.find_unit(&step_path)?;
            let mut executor = Executor::new(master, ExecuteOptions::to_completion());
            executor.force_step(id).map_err(engine_err)
        }
        Operation::Rehash(name) => {
            let (old, new) = master.rehash_artifact(&name)?;
            println!("{name}: {old} -> {new}");
            Ok(())
        }
        Operation::ShowNext => {
            let opts = ExecuteOptions::new(-1, true, false)?;
            Executor::new(master, opts).run().map_err(engine_err)
        }
        Operation::Interactive => {
            std::env::set_var("SWD_INTERACTIVE", "yes");
            let opts = ExecuteOptions::new(-1, false, true)?;
            Executor::new(master, opts).run().map_err(engine_err)
        }
        Operation::Execute(step_count) => {
            let limit = step_count.map(i64::from).unwrap_or(-1);
            let opts = ExecuteOptions::new(limit, false, false)?;
            Executor::new(master, opts).run().map_err(engine_err)
        }
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
