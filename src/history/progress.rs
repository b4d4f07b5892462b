use std::collections::BTreeMap;

use crate::history::model::{Goal, HistoryStore, LogEntry};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TitleTotals {
    pub sessions: u32,
    pub seconds: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GoalProgress {
    pub title: String,
    pub goal: Goal,
    pub totals: TitleTotals,
}

impl GoalProgress {
    pub fn hours_done(&self) -> f64 {
        self.totals.seconds as f64 / 3_600.0
    }

    /// Fraction of the session target reached, uncapped.
    pub fn sessions_ratio(&self) -> Option<f64> {
        self.goal
            .target_sessions
            .map(|target| f64::from(self.totals.sessions) / f64::from(target.max(1)))
    }

    pub fn hours_ratio(&self) -> Option<f64> {
        self.goal
            .target_hours
            .filter(|target| *target > 0.0)
            .map(|target| self.hours_done() / target)
    }

    /// Met when every target that is set has been reached.
    pub fn is_met(&self) -> bool {
        let sessions_met = self.sessions_ratio().is_none_or(|ratio| ratio >= 1.0);
        let hours_met = self.hours_ratio().is_none_or(|ratio| ratio >= 1.0);
        sessions_met && hours_met
    }
}

fn title_key(title: &str) -> String {
    title.trim().to_lowercase()
}

/// Session count and total seconds per title, titles compared
/// case-insensitively.
pub fn totals_by_title<'a>(logs: impl IntoIterator<Item = &'a LogEntry>) -> BTreeMap<String, TitleTotals> {
    let mut totals: BTreeMap<String, TitleTotals> = BTreeMap::new();
    for entry in logs {
        let slot = totals.entry(title_key(&entry.title)).or_default();
        slot.sessions = slot.sessions.saturating_add(1);
        slot.seconds = slot.seconds.saturating_add(entry.seconds);
    }
    totals
}

pub fn goal_progress(store: &HistoryStore) -> Vec<GoalProgress> {
    let totals = totals_by_title(&store.logs);
    store
        .goals
        .iter()
        .map(|(title, goal)| GoalProgress {
            title: title.clone(),
            goal: goal.clone(),
            totals: totals.get(&title_key(title)).copied().unwrap_or_default(),
        })
        .collect()
}
