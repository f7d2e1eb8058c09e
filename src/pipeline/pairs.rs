//! Preference-pair construction from scored tasks.
//!
//! Pipeline flow:
//! Scored tasks → group by (src, base direction) → stable rank by score → tie-break → JSONL
//!
//! Groups come out in the order their key was first seen, and members keep
//! arrival order until ranked. Only the top two ranked members of a group
//! reach the output; a single-member group pairs its candidate with itself.

use crate::models::{
    BaseDirection, PairStats, PairsConfig, PrefsError, PreferencePair, Result, ScoredTask,
    TiePolicy,
};
use crate::sink::{JsonlRead, read_jsonl};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

/// Decides exact-score ties between the top two ranked members of a group.
pub trait TieBreak: Send + Sync {
    /// Return true to make `second` the chosen candidate instead of `top`.
    ///
    /// Only consulted when the group has at least two members and both
    /// scores compare equal.
    fn prefer_second(&self, top: &ScoredTask, second: &ScoredTask) -> bool;
}

/// Reference translations beat machine candidates on a tie.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreferReference;

impl TieBreak for PreferReference {
    fn prefer_second(&self, top: &ScoredTask, _second: &ScoredTask) -> bool {
        top.direction.is_machine()
    }
}

/// Ties keep the stable rank order.
#[derive(Debug, Clone, Copy, Default)]
pub struct RankOrder;

impl TieBreak for RankOrder {
    fn prefer_second(&self, _top: &ScoredTask, _second: &ScoredTask) -> bool {
        false
    }
}

impl TiePolicy {
    /// Comparator implementing this policy.
    pub fn tie_break(self) -> Box<dyn TieBreak> {
        match self {
            TiePolicy::PreferReference => Box::new(PreferReference),
            TiePolicy::RankOrder => Box::new(RankOrder),
        }
    }
}

/// Scored tasks sharing a source sentence and base direction.
#[derive(Debug, Clone)]
pub struct PreferenceGroup<'a> {
    pub src: &'a str,
    pub base: BaseDirection,
    /// Members in arrival order
    pub members: Vec<&'a ScoredTask>,
}

impl<'a> PreferenceGroup<'a> {
    /// Members ordered by score, highest first. Equal scores keep arrival
    /// order; NaN sorts below every number.
    pub fn ranked(&self) -> Vec<&'a ScoredTask> {
        let mut ranked = self.members.clone();
        ranked.sort_by(|a, b| by_score_desc(a, b));
        ranked
    }
}

fn by_score_desc(a: &ScoredTask, b: &ScoredTask) -> Ordering {
    b.quality_score
        .partial_cmp(&a.quality_score)
        .unwrap_or_else(|| a.quality_score.is_nan().cmp(&b.quality_score.is_nan()))
}

/// Group tasks by `(src, base direction)` in first-seen key order.
pub fn group_tasks(tasks: &[ScoredTask]) -> Vec<PreferenceGroup<'_>> {
    let mut index: HashMap<(&str, BaseDirection), usize> = HashMap::new();
    let mut groups: Vec<PreferenceGroup<'_>> = Vec::new();

    for task in tasks {
        let key = (task.src.as_str(), task.direction.base());
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push(PreferenceGroup {
                src: key.0,
                base: key.1,
                members: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].members.push(task);
    }

    groups
}

/// Load scored tasks from a JSONL file, skipping lines that do not parse.
pub fn load_scored(path: &Path) -> Result<JsonlRead<ScoredTask>> {
    let read = read_jsonl::<ScoredTask>(path)?;
    info!(
        count = read.items.len(),
        malformed = read.malformed,
        "Loaded scored tasks"
    );
    Ok(read)
}

/// Builds one preference pair per group.
pub struct PreferenceBuilder {
    tie_break: Box<dyn TieBreak>,
    system_prompt: String,
}

impl PreferenceBuilder {
    /// Builder with the default tie policy.
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            tie_break: Box::new(PreferReference),
            system_prompt: system_prompt.into(),
        }
    }

    /// Builder configured from the `[pairs]` section.
    pub fn from_config(config: &PairsConfig) -> Self {
        Self::new(config.system_prompt.clone()).with_tie_break(config.tie_policy.tie_break())
    }

    /// Replace the tie-break comparator.
    pub fn with_tie_break(mut self, tie_break: Box<dyn TieBreak>) -> Self {
        self.tie_break = tie_break;
        self
    }

    /// System instruction written into each output line.
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Pair for one group, and whether the tie-break swapped the top two.
    ///
    /// Returns `None` only for an empty group, which `group_tasks` never
    /// produces.
    pub fn pair_for_group(&self, group: &PreferenceGroup<'_>) -> Option<(PreferencePair, bool)> {
        let ranked = group.ranked();
        let top = *ranked.first()?;
        let second = ranked.get(1).copied().unwrap_or(top);

        let swap = ranked.len() >= 2
            && top.quality_score == second.quality_score
            && self.tie_break.prefer_second(top, second);
        let (chosen, rejected) = if swap { (second, top) } else { (top, second) };

        Some((
            PreferencePair {
                prompt: group.src.to_string(),
                chosen: chosen.mt.clone(),
                rejected: rejected.mt.clone(),
            },
            swap,
        ))
    }

    /// Build pairs for every group in `tasks`.
    pub fn build_pairs(&self, tasks: &[ScoredTask]) -> Vec<PreferencePair> {
        self.build_with_stats(tasks).0
    }

    fn build_with_stats(&self, tasks: &[ScoredTask]) -> (Vec<PreferencePair>, PairStats) {
        let groups = group_tasks(tasks);
        let mut stats = PairStats {
            input_tasks: tasks.len(),
            groups: groups.len(),
            ..Default::default()
        };

        let mut pairs = Vec::with_capacity(groups.len());
        for group in &groups {
            let Some((pair, swapped)) = self.pair_for_group(group) else {
                continue;
            };
            if group.members.len() == 1 {
                stats.degenerate_groups += 1;
            }
            if swapped {
                debug!(src = %group.src, base = %group.base, "Tie resolved by policy");
                stats.tie_swaps += 1;
            }
            pairs.push(pair);
        }

        stats.pairs = pairs.len();
        (pairs, stats)
    }

    /// Write pairs to `output_path`, replacing any existing file.
    pub fn write_pairs(&self, pairs: &[PreferencePair], output_path: &Path) -> Result<()> {
        let output_file =
            File::create(output_path).map_err(|e| PrefsError::io("creating output file", e))?;
        let mut writer = BufWriter::new(output_file);

        for pair in pairs {
            let json = serde_json::to_string(&pair.to_record(&self.system_prompt))
                .map_err(|e| PrefsError::Internal(format!("Failed to serialize pair: {e}")))?;
            writeln!(writer, "{json}").map_err(|e| PrefsError::io("writing output", e))?;
        }

        writer
            .flush()
            .map_err(|e| PrefsError::io("flushing output", e))
    }

    /// Read scored tasks from `input_path` and write one pair per group.
    pub fn run(&self, input_path: &Path, output_path: &Path) -> Result<PairStats> {
        let scored = load_scored(input_path)?;
        let (pairs, mut stats) = self.build_with_stats(&scored.items);
        stats.malformed_lines = scored.malformed;

        self.write_pairs(&pairs, output_path)?;

        info!(
            groups = stats.groups,
            pairs = stats.pairs,
            degenerate = stats.degenerate_groups,
            tie_swaps = stats.tie_swaps,
            "Preference pairs written"
        );
        Ok(stats)
    }
}

impl Default for PreferenceBuilder {
    fn default() -> Self {
        Self::new(crate::models::DEFAULT_SYSTEM_PROMPT)
    }
}
