//! Scripted operator decisions

use std::collections::HashMap;

use imdsv2_enforcer::orchestrator::{Category, Decision, DecisionProvider, GateError};

/// Answers each category from a fixed table and records every question.
///
/// A category without a scripted answer fails like closed input.
#[derive(Debug, Default)]
pub struct ScriptedDecisions {
    answers: HashMap<Category, Decision>,
    asked: Vec<(Category, usize)>,
}

impl ScriptedDecisions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Approve every category
    pub fn approve_all() -> Self {
        Self::new()
            .answer(Category::MissingPermissions, Decision::Approve)
            .answer(Category::Instances, Decision::Approve)
            .answer(Category::AccountDefaults, Decision::Approve)
    }

    pub fn answer(mut self, category: Category, decision: Decision) -> Self {
        self.answers.insert(category, decision);
        self
    }

    /// Questions asked so far, with their pending counts
    pub fn asked(&self) -> &[(Category, usize)] {
        &self.asked
    }
}

impl DecisionProvider for ScriptedDecisions {
    fn decide(&mut self, category: Category, pending: usize) -> Result<Decision, GateError> {
        self.asked.push((category, pending));
        self.answers
            .get(&category)
            .copied()
            .ok_or(GateError::EndOfInput)
    }
}
