//! Apply/undo bookkeeping for command-driven backends
//!
//! A fault is applied as a list of steps, each with the commands that undo it.
//! When a step fails, the steps already done are rolled back. On success the
//! undo commands are stored under the handle id until Revert runs them.

use std::collections::HashMap;

use application::ApplicationError;
use parking_lot::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use super::command_runner::{CommandRunner, CommandSpec};

/// Commands that apply one part of a fault, and the commands that undo it
#[derive(Debug, Clone, Default)]
pub struct Step {
    pub apply: Vec<CommandSpec>,
    pub undo: Vec<CommandSpec>,
}

impl Step {
    pub const fn new(apply: Vec<CommandSpec>, undo: Vec<CommandSpec>) -> Self {
        Self { apply, undo }
    }

    /// A step that cannot be undone (crash, restart)
    pub const fn irreversible(apply: Vec<CommandSpec>) -> Self {
        Self {
            apply,
            undo: Vec::new(),
        }
    }
}

/// Pending undo commands per live handle
#[derive(Debug, Default)]
pub struct UndoLog {
    pending: Mutex<HashMap<Uuid, Vec<CommandSpec>>>,
}

impl UndoLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every step; on failure undo the completed steps and return the error
    ///
    /// Returns the undo commands of all steps, newest step first.
    pub async fn execute(
        runner: &dyn CommandRunner,
        steps: Vec<Step>,
    ) -> Result<Vec<CommandSpec>, ApplicationError> {
        let mut done: Vec<Vec<CommandSpec>> = Vec::with_capacity(steps.len());

        for step in steps {
            for command in &step.apply {
                if let Err(err) = runner.run(command).await {
                    // The failing step may be half applied; undo it too.
                    done.push(step.undo);
                    Self::rollback(runner, done).await;
                    return Err(err.into());
                }
            }
            done.push(step.undo);
        }

        Ok(done.into_iter().rev().flatten().collect())
    }

    async fn rollback(runner: &dyn CommandRunner, done: Vec<Vec<CommandSpec>>) {
        for command in done.into_iter().rev().flatten() {
            if let Err(err) = runner.run(&command).await {
                debug!(command = %command, error = %err, "Rollback command failed");
            }
        }
    }

    /// Remember the undo commands for a handle; empty lists are not stored
    pub fn store(&self, id: Uuid, undo: Vec<CommandSpec>) {
        if !undo.is_empty() {
            self.pending.lock().insert(id, undo);
        }
    }

    /// Run the undo commands of a handle
    ///
    /// Commands that fail are kept so a retry only repeats what is left.
    /// An unknown id is a no-op.
    pub async fn revert(&self, runner: &dyn CommandRunner, id: Uuid) -> Result<(), ApplicationError> {
        let Some(commands) = self.pending.lock().remove(&id) else {
            debug!(handle = %id, "Nothing to revert");
            return Ok(());
        };

        let mut failed = Vec::new();
        let mut last_error = None;
        for command in commands {
            if let Err(err) = runner.run(&command).await {
                warn!(handle = %id, command = %command, error = %err, "Undo command failed");
                last_error = Some(err);
                failed.push(command);
            }
        }

        match last_error {
            None => Ok(()),
            Some(err) => {
                let remaining = failed.len();
                self.pending.lock().insert(id, failed);
                Err(ApplicationError::Injection(format!(
                    "{remaining} undo command(s) failed, last: {err}"
                )))
            },
        }
    }

    /// Number of handles with undo commands outstanding
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.pending.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::command_runner::scripted::ScriptedRunner;

    fn cmd(line: &str) -> CommandSpec {
        let mut parts = line.split(' ');
        let program = parts.next().unwrap_or_default();
        CommandSpec::new(program, parts)
    }

    #[tokio::test]
    async fn undo_commands_come_back_newest_step_first() {
        let runner = ScriptedRunner::new();
        let steps = vec![
            Step::new(vec![cmd("add a")], vec![cmd("del a")]),
            Step::new(vec![cmd("add b")], vec![cmd("del b")]),
        ];

        let undo = UndoLog::execute(&runner, steps).await.unwrap();
        let lines: Vec<String> = undo.iter().map(ToString::to_string).collect();
        assert_eq!(lines, vec!["del b", "del a"]);
    }

    #[tokio::test]
    async fn failed_step_rolls_back_everything_done() {
        let runner = ScriptedRunner::new().failing("add b", "boom");
        let steps = vec![
            Step::new(vec![cmd("add a")], vec![cmd("del a")]),
            Step::new(vec![cmd("add b")], vec![cmd("del b")]),
            Step::new(vec![cmd("add c")], vec![cmd("del c")]),
        ];

        let result = UndoLog::execute(&runner, steps).await;
        assert!(matches!(result, Err(ApplicationError::Injection(_))));
        assert_eq!(runner.calls(), vec!["add a", "add b", "del b", "del a"]);
    }

    #[tokio::test]
    async fn revert_keeps_only_failed_commands() {
        let runner = ScriptedRunner::new().failing_once("del b", "busy");
        let log = UndoLog::new();
        let id = Uuid::new_v4();
        log.store(id, vec![cmd("del a"), cmd("del b")]);

        assert!(log.revert(&runner, id).await.is_err());
        assert_eq!(log.live_count(), 1);

        log.revert(&runner, id).await.unwrap();
        assert_eq!(log.live_count(), 0);
        assert_eq!(runner.calls(), vec!["del a", "del b", "del b"]);
    }

    #[tokio::test]
    async fn unknown_handle_is_a_no_op() {
        let runner = ScriptedRunner::new();
        let log = UndoLog::new();
        log.store(Uuid::new_v4(), Vec::new());

        assert_eq!(log.live_count(), 0);
        log.revert(&runner, Uuid::new_v4()).await.unwrap();
        assert!(runner.calls().is_empty());
    }
}
