use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

pub const STORE_VERSION: u32 = 1;
pub const MAX_LOG_ENTRIES: usize = 500;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub title: String,
    pub seconds: u64,
    pub started_at: DateTime<Local>,
    pub completed_at: DateTime<Local>,
    pub color: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_sessions: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_hours: Option<f64>,
}

impl Goal {
    pub fn validate(&self, title: &str) -> Result<()> {
        if self.target_sessions.is_none() && self.target_hours.is_none() {
            bail!("goal '{title}' needs a session target, an hour target, or both");
        }
        if self.target_sessions == Some(0) {
            bail!("goal '{title}' must target at least one session");
        }
        if let Some(hours) = self.target_hours
            && (!hours.is_finite() || hours <= 0.0)
        {
            bail!("goal '{title}' must target a positive number of hours");
        }
        Ok(())
    }
}

/// Everything the timer keeps between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryStore {
    pub version: u32,
    #[serde(default)]
    pub settings: StoredSettings,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
    #[serde(default)]
    pub goals: BTreeMap<String, Goal>,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self {
            version: STORE_VERSION,
            settings: StoredSettings::default(),
            logs: Vec::new(),
            goals: BTreeMap::new(),
        }
    }
}

impl HistoryStore {
    /// Appends and drops the oldest entries beyond the cap.
    pub fn append_log(&mut self, entry: LogEntry) {
        self.logs.push(entry);
        if self.logs.len() > MAX_LOG_ENTRIES {
            let excess = self.logs.len() - MAX_LOG_ENTRIES;
            self.logs.drain(..excess);
        }
    }

    /// Most recent first.
    pub fn recent_logs(&self, limit: usize) -> impl Iterator<Item = &LogEntry> {
        self.logs.iter().rev().take(limit)
    }

    pub fn set_goal(&mut self, title: &str, goal: Goal) -> Result<()> {
        let title = title.trim();
        if title.is_empty() {
            bail!("goal title must not be empty");
        }
        goal.validate(title)?;
        self.goals.insert(title.to_string(), goal);
        Ok(())
    }

    pub fn remove_goal(&mut self, title: &str) -> Option<Goal> {
        self.goals.remove(title.trim())
    }
}

/// A missing file is an empty store, not an error.
pub fn load_history(path: &Path) -> Result<HistoryStore> {
    if !path.exists() {
        return Ok(HistoryStore::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("unable to read history file {}", path.display()))?;
    parse_history_text(&content)
}

pub fn parse_history_text(content: &str) -> Result<HistoryStore> {
    let store = serde_json::from_str::<HistoryStore>(content).map_err(|err| {
        let line = err.line();
        let column = err.column();
        anyhow::anyhow!("invalid JSON at line {line}, column {column}: {err}")
    })?;

    if store.version != STORE_VERSION {
        bail!(
            "unsupported history version {}; expected version {STORE_VERSION}",
            store.version
        );
    }
    for (title, goal) in &store.goals {
        goal.validate(title)?;
    }
    if let Some(color) = &store.settings.theme_color {
        color
            .parse::<crate::theme::ThemeColor>()
            .with_context(|| format!("invalid theme_color '{color}'"))?;
    }

    let mut store = store;
    if store.logs.len() > MAX_LOG_ENTRIES {
        let excess = store.logs.len() - MAX_LOG_ENTRIES;
        store.logs.drain(..excess);
    }
    Ok(store)
}

pub fn save_history(path: &Path, store: &HistoryStore) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("unable to create directory {}", parent.display()))?;
    }

    let text = serde_json::to_string_pretty(store)?;
    let staging = staging_path(path);
    fs::write(&staging, format!("{text}\n"))
        .with_context(|| format!("unable to write history file {}", staging.display()))?;
    fs::rename(&staging, path)
        .with_context(|| format!("unable to replace history file {}", path.display()))?;
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| "timeto.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use tempfile::tempdir;

    use super::*;

    fn entry(index: usize) -> LogEntry {
        let started_at = Local
            .timestamp_opt(1_700_000_000 + index as i64 * 60, 0)
            .single()
            .expect("valid epoch");
        LogEntry {
            id: format!("log-{index}"),
            title: "focus".to_string(),
            seconds: 25,
            started_at,
            completed_at: started_at + chrono::Duration::seconds(25),
            color: "#00ffff".to_string(),
        }
    }

    #[test]
    fn parses_valid_history() {
        let json = r##"
{
  "version": 1,
  "settings": { "theme_color": "#ff00ff", "user": "sam" },
  "logs": [
    {
      "id": "log-1",
      "title": "read",
      "seconds": 1500,
      "started_at": "2026-02-07T07:30:00+00:00",
      "completed_at": "2026-02-07T07:55:00+00:00",
      "color": "#ff00ff"
    }
  ],
  "goals": {
    "read": { "target_sessions": 4 },
    "run": { "target_hours": 2.5 }
  }
}
"##;
        let store = parse_history_text(json).expect("valid history");
        assert_eq!(store.settings.user.as_deref(), Some("sam"));
        assert_eq!(store.settings.theme_color.as_deref(), Some("#ff00ff"));
        assert_eq!(store.logs.len(), 1);
        assert_eq!(store.logs[0].seconds, 1_500);
        assert_eq!(store.goals["read"].target_sessions, Some(4));
        assert_eq!(store.goals["run"].target_hours, Some(2.5));
    }

    #[test]
    fn missing_sections_default_to_empty() {
        let store = parse_history_text(r#"{ "version": 1 }"#).expect("minimal");
        assert!(store.logs.is_empty());
        assert!(store.goals.is_empty());
        assert_eq!(store.settings, StoredSettings::default());
    }

    #[test]
    fn rejects_malformed_json_with_position() {
        let err = parse_history_text("{ not-json ").expect_err("malformed");
        assert!(err.to_string().contains("invalid JSON at line 1"));
    }

    #[test]
    fn rejects_unknown_version() {
        let err = parse_history_text(r#"{ "version": 2 }"#).expect_err("version 2");
        assert!(err.to_string().contains("unsupported history version"));
    }

    #[test]
    fn rejects_goal_without_targets() {
        let json = r#"{ "version": 1, "goals": { "idle": {} } }"#;
        let err = parse_history_text(json).expect_err("empty goal");
        assert!(err.to_string().contains("needs a session target"));
    }

    #[test]
    fn rejects_bad_theme_colour() {
        let json = r#"{ "version": 1, "settings": { "theme_color": "cyan" } }"#;
        let err = parse_history_text(json).expect_err("bad colour");
        assert!(err.to_string().contains("invalid theme_color"));
    }

    #[test]
    fn log_is_capped_to_most_recent_entries() {
        let mut store = HistoryStore::default();
        for index in 0..(MAX_LOG_ENTRIES + 25) {
            store.append_log(entry(index));
        }
        assert_eq!(store.logs.len(), MAX_LOG_ENTRIES);
        assert_eq!(store.logs[0].id, "log-25");
        assert_eq!(
            store.recent_logs(1).next().map(|e| e.id.as_str()),
            Some("log-524")
        );
    }

    #[test]
    fn goal_validation() {
        let mut store = HistoryStore::default();
        assert!(store.set_goal("  ", Goal::default()).is_err());
        assert!(
            store
                .set_goal(
                    "run",
                    Goal {
                        target_sessions: Some(0),
                        target_hours: None
                    }
                )
                .is_err()
        );
        assert!(
            store
                .set_goal(
                    "run",
                    Goal {
                        target_sessions: None,
                        target_hours: Some(f64::NAN)
                    }
                )
                .is_err()
        );
        store
            .set_goal(
                " run ",
                Goal {
                    target_sessions: Some(3),
                    target_hours: Some(1.5),
                },
            )
            .expect("valid goal");
        assert!(store.goals.contains_key("run"));
        assert!(store.remove_goal("run").is_some());
        assert!(store.remove_goal("run").is_none());
    }

    #[test]
    fn save_then_load_preserves_contents() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("timeto.json");

        let mut store = HistoryStore::default();
        store.settings.user = Some("sam".to_string());
        store.append_log(entry(1));
        store
            .set_goal(
                "focus",
                Goal {
                    target_sessions: Some(2),
                    target_hours: None,
                },
            )
            .expect("goal");

        save_history(&path, &store).expect("save");
        assert!(!staging_path(&path).exists());
        let loaded = load_history(&path).expect("load");
        assert_eq!(loaded, store);
    }

    #[test]
    fn missing_file_loads_as_empty() {
        let dir = tempdir().expect("tempdir");
        let store = load_history(&dir.path().join("absent.json")).expect("missing is fine");
        assert_eq!(store, HistoryStore::default());
    }
}
