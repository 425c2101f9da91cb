//! Rule storage with atomic snapshot swap.
//!
//! # Design Decisions
//! - A rule set is installed wholesale as an immutable [`RuleSnapshot`]
//! - Readers load one snapshot per evaluation and never see a mix of generations
//! - Cohort assignments live in the same snapshot as the rules they name
//! - A rejected rule set leaves the previous snapshot installed

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use arc_swap::ArcSwap;

use crate::governance::cohort::CohortConfig;
use crate::governance::error::GovernanceError;
use crate::governance::matcher::CompiledPattern;
use crate::governance::rules::{Rule, RuleType};

/// One immutable generation of the rule set.
#[derive(Debug, Default)]
pub struct RuleSnapshot {
    generation: u64,
    rules: Vec<Arc<Rule>>,
    by_id: HashMap<String, usize>,
    by_type: HashMap<RuleType, Vec<usize>>,
    patterns: HashMap<usize, CompiledPattern>,
    cohorts: Arc<CohortConfig>,
}

impl RuleSnapshot {
    /// Validate and index a rule set.
    pub fn build(rules: Vec<Rule>, generation: u64) -> Result<Self, GovernanceError> {
        let mut seen = HashSet::with_capacity(rules.len());
        for rule in &rules {
            if !seen.insert(rule.id.as_str()) {
                return Err(GovernanceError::DuplicateRuleId(rule.id.clone()));
            }
        }

        let mut snapshot = Self {
            generation,
            ..Default::default()
        };

        for (idx, rule) in rules.into_iter().enumerate() {
            if rule.rule_type() == RuleType::Regex {
                snapshot.patterns.insert(idx, CompiledPattern::compile(&rule)?);
            }
            snapshot.by_id.insert(rule.id.clone(), idx);
            snapshot.by_type.entry(rule.rule_type()).or_default().push(idx);
            snapshot.rules.push(Arc::new(rule));
        }

        Ok(snapshot)
    }

    /// Attach the cohort assignments evaluated alongside these rules.
    pub fn with_cohorts(mut self, cohorts: impl Into<Arc<CohortConfig>>) -> Self {
        self.cohorts = cohorts.into();
        self
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Cohort assignments of this generation.
    pub fn cohorts(&self) -> &Arc<CohortConfig> {
        &self.cohorts
    }

    /// All rules in supplied order.
    pub fn rules(&self) -> &[Arc<Rule>] {
        &self.rules
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Rule>> {
        self.by_id.get(id).map(|&idx| &self.rules[idx])
    }

    /// Rules of one type, in supplied order.
    pub fn of_type(&self, rule_type: RuleType) -> impl Iterator<Item = &Arc<Rule>> + '_ {
        self.by_type
            .get(&rule_type)
            .into_iter()
            .flatten()
            .map(|&idx| &self.rules[idx])
    }

    /// Regex rules paired with their compiled patterns.
    pub(crate) fn patterns(&self) -> impl Iterator<Item = (&Arc<Rule>, &CompiledPattern)> + '_ {
        self.by_type
            .get(&RuleType::Regex)
            .into_iter()
            .flatten()
            .filter_map(|&idx| self.patterns.get(&idx).map(|p| (&self.rules[idx], p)))
    }

    pub fn count(&self, rule_type: RuleType) -> usize {
        self.by_type.get(&rule_type).map(Vec::len).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Shared, read-mostly holder of the current rule snapshot.
#[derive(Debug)]
pub struct RuleStore {
    current: ArcSwap<RuleSnapshot>,
    // Serializes writers so a generation is never built from a stale parent.
    write: Mutex<()>,
}

impl RuleStore {
    /// An empty store.
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(RuleSnapshot::default()),
            write: Mutex::new(()),
        }
    }

    /// Atomically replace the whole rule set, keeping the installed cohorts.
    pub fn replace_all(&self, rules: Vec<Rule>) -> Result<(), GovernanceError> {
        let _guard = self.lock_writer();
        let current = self.current.load_full();
        let snapshot = RuleSnapshot::build(rules, current.generation + 1)?.with_cohorts(current.cohorts.clone());
        self.publish(snapshot);
        Ok(())
    }

    /// Atomically replace the rule set and the cohort assignments together.
    pub fn install(&self, rules: Vec<Rule>, cohorts: CohortConfig) -> Result<(), GovernanceError> {
        let _guard = self.lock_writer();
        let generation = self.current.load().generation + 1;
        let snapshot = RuleSnapshot::build(rules, generation)?.with_cohorts(cohorts);
        self.publish(snapshot);
        Ok(())
    }

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.write.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, snapshot: RuleSnapshot) {
        tracing::info!(
            generation = snapshot.generation,
            rules = snapshot.len(),
            regex = snapshot.count(RuleType::Regex),
            user = snapshot.count(RuleType::User),
            company = snapshot.count(RuleType::Company),
            user_assignments = snapshot.cohorts.user_rules.len(),
            company_assignments = snapshot.cohorts.company_rules.len(),
            "Rule set installed"
        );
        self.current.store(Arc::new(snapshot));
    }

    /// The current generation. Hold on to it for the length of one evaluation.
    pub fn snapshot(&self) -> Arc<RuleSnapshot> {
        self.current.load_full()
    }

    pub fn rules_of_type(&self, rule_type: RuleType) -> Vec<Arc<Rule>> {
        self.current.load().of_type(rule_type).cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<Arc<Rule>> {
        self.current.load().get(id).cloned()
    }

    pub fn generation(&self) -> u64 {
        self.current.load().generation
    }

    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.load().is_empty()
    }
}

impl Default for RuleStore {
    fn default() -> Self {
        Self::new()
    }
}
