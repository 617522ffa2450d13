//! Scripted command runner for unit tests.

use std::cell::RefCell;
use std::collections::VecDeque;

use crate::command::{CommandOutput, CommandRunner, CommandSpec};
use crate::error::HarnessResult;

/// Records every command and replays queued outputs in order.
///
/// Once the queue is empty every command succeeds with empty output.
#[derive(Default)]
pub(crate) struct ScriptedRunner {
    calls: RefCell<Vec<CommandSpec>>,
    replies: RefCell<VecDeque<CommandOutput>>,
}

impl ScriptedRunner {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reply(&self, out: CommandOutput) -> &Self {
        self.replies.borrow_mut().push_back(out);
        self
    }

    pub(crate) fn calls(&self) -> Vec<CommandSpec> {
        self.calls.borrow().clone()
    }

    pub(crate) fn argvs(&self) -> Vec<Vec<String>> {
        self.calls.borrow().iter().map(CommandSpec::argv).collect()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, spec: &CommandSpec) -> HarnessResult<CommandOutput> {
        self.calls.borrow_mut().push(spec.clone());
        Ok(self
            .replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| CommandOutput::ok("")))
    }
}

/// Shorthand for building expected argument vectors.
pub(crate) fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}
