//! Operator confirmation before anything is mutated

use std::io::{BufRead, Write};

use imdsv2_common::RemediationPlan;
use thiserror::Error;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::info;

/// Kind of work the operator is asked to approve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum Category {
    /// Continue although the permission preflight did not pass
    #[strum(to_string = "missing permissions")]
    MissingPermissions,
    #[strum(to_string = "instances")]
    Instances,
    #[strum(to_string = "account defaults")]
    AccountDefaults,
}

impl Category {
    /// Question shown to the operator for `pending` items
    pub fn question(&self, pending: usize) -> String {
        match self {
            Category::MissingPermissions => {
                "Some required permissions may be missing. Continue anyway?".to_string()
            }
            Category::Instances => {
                format!("Enforce IMDSv2 on {pending} instance(s)?")
            }
            Category::AccountDefaults => {
                format!("Set the IMDSv2 account default to required in {pending} region(s)?")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Decline,
}

#[derive(Debug, Error)]
pub enum GateError {
    #[error("Input closed before a decision was made")]
    EndOfInput,

    #[error("Failed to read confirmation: {0}")]
    Io(#[from] std::io::Error),
}

/// Source of operator decisions
#[cfg_attr(test, mockall::automock)]
pub trait DecisionProvider {
    fn decide(&mut self, category: Category, pending: usize) -> Result<Decision, GateError>;
}

/// Interactive yes/no prompt over any reader and writer
pub struct ConsolePrompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> ConsolePrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }
}

impl ConsolePrompt<std::io::BufReader<std::io::Stdin>, std::io::Stdout> {
    /// Prompt on the process's stdin and stdout
    pub fn stdio() -> Self {
        Self::new(std::io::BufReader::new(std::io::stdin()), std::io::stdout())
    }
}

/// Run a blocking read, handing the worker thread back to the runtime first
/// when called from a multi-threaded runtime
fn blocking_read<T>(read: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(read)
        }
        _ => read(),
    }
}

fn parse_answer(line: &str) -> Option<Decision> {
    match line.trim().to_ascii_lowercase().as_str() {
        "yes" | "y" => Some(Decision::Approve),
        "no" | "n" => Some(Decision::Decline),
        _ => None,
    }
}

impl<R: BufRead, W: Write> DecisionProvider for ConsolePrompt<R, W> {
    fn decide(&mut self, category: Category, pending: usize) -> Result<Decision, GateError> {
        let question = category.question(pending);
        loop {
            write!(self.output, "{question} (yes/no): ")?;
            self.output.flush()?;

            let mut line = String::new();
            if blocking_read(|| self.input.read_line(&mut line))? == 0 {
                writeln!(self.output)?;
                return Err(GateError::EndOfInput);
            }

            match parse_answer(&line) {
                Some(decision) => return Ok(decision),
                None => writeln!(self.output, "Please answer 'yes' or 'no'.")?,
            }
        }
    }
}

/// Per-category result of the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum GateState {
    Confirmed,
    Declined,
    /// Nothing pending, so no question was asked
    Skipped,
}

impl GateState {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, GateState::Confirmed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateOutcome {
    pub instances: GateState,
    pub account_defaults: GateState,
}

impl GateOutcome {
    pub fn any_confirmed(&self) -> bool {
        self.instances.is_confirmed() || self.account_defaults.is_confirmed()
    }
}

fn ask<D: DecisionProvider + ?Sized>(
    provider: &mut D,
    category: Category,
    pending: usize,
) -> Result<GateState, GateError> {
    if pending == 0 {
        return Ok(GateState::Skipped);
    }
    let state = match provider.decide(category, pending)? {
        Decision::Approve => GateState::Confirmed,
        Decision::Decline => GateState::Declined,
    };
    info!(category = %category, pending, decision = %state, "Confirmation recorded");
    Ok(state)
}

/// Ask for each category with pending work, instances first
pub fn confirm<D: DecisionProvider + ?Sized>(
    plan: &RemediationPlan,
    provider: &mut D,
) -> Result<GateOutcome, GateError> {
    let instances = ask(&mut *provider, Category::Instances, plan.instances_to_update.len())?;
    let account_defaults = ask(provider, Category::AccountDefaults, plan.defaults_to_update.len())?;
    Ok(GateOutcome {
        instances,
        account_defaults,
    })
}
