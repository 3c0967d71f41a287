//! The scoped executor (§4.6): a pre-order walk of the tree that runs Steps,
//! catching `InvalidateScope` at the Group/Script frame it names and
//! restarting that frame's children loop.

use std::io::{self, BufRead, Write};

use crate::error::{CoreError, CoreResult};
use crate::interrupt::interrupt_flag;
use crate::master::Master;
use crate::signal::{EngineResult, EngineSignal};
use crate::unit::{Node, NodeId};

use swd_exec::process::RunOutcome;

/// Mutually exclusive execution modes. `iteration_limit < 0` means
/// unbounded; `0` halts the run without doing anything further (used
/// internally once `--next` or a declined `--interactive` prompt fires).
#[derive(Debug, Clone, Copy)]
pub struct ExecuteOptions {
    pub iteration_limit: i64,
    pub show_next: bool,
    pub interactive: bool,
}

impl ExecuteOptions {
    pub fn new(iteration_limit: i64, show_next: bool, interactive: bool) -> CoreResult<Self> {
        let modes_requested = [iteration_limit >= 0, show_next, interactive]
            .iter()
            .filter(|&&requested| requested)
            .count();
        if modes_requested > 1 {
            return Err(CoreError::ConflictingModes);
        }
        Ok(Self {
            iteration_limit,
            show_next,
            interactive,
        })
    }

    pub fn to_completion() -> Self {
        Self {
            iteration_limit: -1,
            show_next: false,
            interactive: false,
        }
    }
}

pub struct Executor<'a> {
    master: &'a mut Master,
    opts: ExecuteOptions,
}

impl<'a> Executor<'a> {
    pub fn new(master: &'a mut Master, opts: ExecuteOptions) -> Self {
        Self { master, opts }
    }

    /// Run from the tree root to completion (or until a mode halts it).
    pub fn run(&mut self) -> EngineResult<()> {
        let root = self.master.tree.root();
        self.run_group(root)
    }

    fn run_group(&mut self, group: NodeId) -> EngineResult<()> {
        let scope = self.master.tree.canonical_path(group);
        loop {
            match self.run_group_children(group) {
                Ok(()) => return Ok(()),
                Err(EngineSignal::InvalidateScope(s)) if s == scope => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn run_group_children(&mut self, group: NodeId) -> EngineResult<()> {
        let children = self.master.tree.group_children(group).to_vec();
        for child in children {
            match self.master.tree.node(child) {
                Node::Group(_) => self.run_group(child)?,
                Node::Script(_) => self.run_script(child)?,
                Node::Step(_) => unreachable!("groups never own steps directly"),
            }
        }
        Ok(())
    }

    fn run_script(&mut self, script: NodeId) -> EngineResult<()> {
        let scope = self.master.tree.canonical_path(script);
        loop {
            match self.run_script_steps(script) {
                Ok(()) => return Ok(()),
                Err(EngineSignal::InvalidateScope(s)) if s == scope => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn run_script_steps(&mut self, script: NodeId) -> EngineResult<()> {
        let steps = self.master.tree.script_steps(script).to_vec();
        for step in steps {
            self.run_step(step)?;
        }
        Ok(())
    }

    fn run_step(&mut self, step: NodeId) -> EngineResult<()> {
        if self.opts.iteration_limit == 0 {
            return Ok(());
        }

        let rebuild = !self.master.everything_up_to_date(step)?;
        if !rebuild {
            return Ok(());
        }

        let step_path = self.master.tree.canonical_path(step);

        if self.opts.show_next {
            println!("{step_path}");
            self.opts.iteration_limit = 0;
            return Ok(());
        }

        if self.opts.interactive {
            if !prompt_yes(&step_path).map_err(|e| EngineSignal::Fatal(CoreError::Io(e)))? {
                self.opts.iteration_limit = 0;
                return Ok(());
            }
        }

        self.exec_step(step, &step_path)?;
        self.master.recalculate_hashes(step)?;
        self.master.tree.complete_step(step)?;
        if self.opts.iteration_limit > 0 {
            self.opts.iteration_limit -= 1;
        }
        Ok(())
    }

    fn exec_step(&mut self, step: NodeId, step_path: &str) -> EngineResult<()> {
        let sudo = match self.master.tree.node(step) {
            Node::Step(s) => s.flags.sudo,
            _ => panic!("not a step"),
        };
        // exec_path is "<script-exec-path> <step-name>": the script file run
        // with the step name as its sole argument. The two words are
        // escaped independently so the separating space stays a real word
        // boundary instead of being swallowed into one escaped token.
        let exec_path = self.master.tree.exec_path(step);
        let (script_part, step_name) = exec_path
            .rsplit_once(' ')
            .expect("a step's exec path always has a script part and a step name");
        let invocation = format!(
            "{} {}",
            swd_exec::escape_bash(script_part),
            swd_exec::escape_bash(step_name)
        );
        let command = if sudo {
            format!("sudo --non-interactive --preserve-env {invocation}")
        } else {
            invocation
        };

        let outcome = swd_exec::run_via_shell(&self.master.config.bash_bin, &command, interrupt_flag())
            .map_err(|e| EngineSignal::Fatal(CoreError::Io(e)))?;

        match outcome {
            RunOutcome::Success => Ok(()),
            RunOutcome::Failure => Err(EngineSignal::Fatal(CoreError::StepFailed {
                step_path: step_path.to_string(),
            })),
            RunOutcome::Interrupted => Err(EngineSignal::Fatal(CoreError::Interrupted)),
        }
    }

    /// `force(stepPath)`: execute a single step unconditionally, still
    /// recalculating hashes and completing it on success. A Group or Script
    /// target is not an error — only single steps can be forced, so nothing
    /// happens.
    pub fn force_step(&mut self, step: NodeId) -> EngineResult<()> {
        if !matches!(self.master.tree.node(step), Node::Step(_)) {
            println!("Only single steps can be forced.");
            return Ok(());
        }
        let step_path = self.master.tree.canonical_path(step);
        self.exec_step(step, &step_path)?;
        self.master.recalculate_hashes(step)?;
        self.master.tree.complete_step(step)?;
        Ok(())
    }
}

fn prompt_yes(step_path: &str) -> io::Result<bool> {
    print!("exec '{step_path}' ? [Y]: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let answer = line.trim().to_ascii_lowercase();
    Ok(answer.is_empty() || answer == "y" || answer == "yes")
}
