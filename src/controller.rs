use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use crate::chime::Chime;
use crate::history::model::{Goal, HistoryStore, LogEntry, load_history, save_history};
use crate::history::progress::{GoalProgress, goal_progress};
use crate::theme::{ThemeColor, ThemeState};
use crate::time_provider::TimeSample;
use crate::timer::engine::{CountdownEngine, Frame, SessionState};
use crate::timer::error::TimerError;
use crate::timer::parse::parse_duration;

const ERROR_NOTICE_TTL: Duration = Duration::from_secs(5);
const INFO_NOTICE_TTL: Duration = Duration::from_secs(3);

/// Who is timing and where their history lives. Passed in, never global.
#[derive(Debug, Clone, Default)]
pub struct TimerContext {
    pub user: Option<String>,
    pub store_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum NoticeKind {
    Info,
    Error,
}

#[derive(Debug, Clone)]
pub struct Notice {
    pub text: String,
    pub kind: NoticeKind,
    expires_at: Instant,
}

/// A finished untitled session waiting for the user to name it.
#[derive(Debug, Clone)]
struct PendingLog {
    seconds: u64,
    started_at: DateTime<Local>,
    completed_at: DateTime<Local>,
    color: ThemeColor,
}

pub struct TimerController {
    engine: CountdownEngine,
    context: TimerContext,
    theme: ThemeState,
    history: HistoryStore,
    chime: Box<dyn Chime>,
    notice: Option<Notice>,
    pending_title: Option<PendingLog>,
    started_wall: Option<DateTime<Local>>,
    next_log_seq: u64,
    last_frame: Frame,
}

impl TimerController {
    pub fn new(
        context: TimerContext,
        history: HistoryStore,
        theme: ThemeColor,
        chime: Box<dyn Chime>,
    ) -> Self {
        let mut engine = CountdownEngine::new();
        let last_frame = engine.tick(Instant::now()).frame;
        Self {
            engine,
            context,
            theme: ThemeState::new(theme),
            history,
            chime,
            notice: None,
            pending_title: None,
            started_wall: None,
            next_log_seq: 1,
            last_frame,
        }
    }

    /// Loads history from the context's store. An unreadable store is
    /// reported as a notice and replaced by an empty one.
    pub fn open(
        context: TimerContext,
        theme_override: Option<ThemeColor>,
        chime: Box<dyn Chime>,
    ) -> Self {
        let (history, failure) = match &context.store_path {
            Some(path) => match load_history(path) {
                Ok(store) => (store, None),
                Err(err) => {
                    let reason = format!("{err:#}");
                    warn!(path = %path.display(), error = %reason, "history unreadable, starting empty");
                    let failure = TimerError::Persistence {
                        path: path.display().to_string(),
                        reason,
                    };
                    (HistoryStore::default(), Some(failure))
                }
            },
            None => (HistoryStore::default(), None),
        };

        let theme = theme_override
            .or_else(|| {
                history
                    .settings
                    .theme_color
                    .as_deref()
                    .and_then(|hex| hex.parse().ok())
            })
            .unwrap_or_default();
        // An unreadable store is left untouched for the rest of the run.
        let context = TimerContext {
            user: context.user.or_else(|| history.settings.user.clone()),
            store_path: context.store_path.filter(|_| failure.is_none()),
        };
        let mut controller = Self::new(context, history, theme, chime);
        if let Some(failure) = failure {
            controller.set_notice(failure.user_message(), NoticeKind::Error);
        }
        controller
    }

    pub fn state(&self) -> SessionState {
        self.engine.state()
    }

    pub fn frame(&self) -> Frame {
        self.last_frame
    }

    pub fn title(&self) -> &str {
        self.engine
            .session()
            .map(|session| session.title.as_str())
            .unwrap_or("")
    }

    pub fn user(&self) -> Option<&str> {
        self.context.user.as_deref()
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn theme(&self) -> &ThemeState {
        &self.theme
    }

    pub fn theme_mut(&mut self) -> &mut ThemeState {
        &mut self.theme
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    pub fn has_pending_title(&self) -> bool {
        self.pending_title.is_some()
    }

    /// Parses `time_text` and starts a session. Rejected input leaves a
    /// notice behind and the engine untouched.
    pub fn start_from_input(
        &mut self,
        title: &str,
        time_text: &str,
        sample: TimeSample,
    ) -> Result<u64, TimerError> {
        let result = parse_duration(time_text)
            .and_then(|seconds| self.start(title, seconds, sample).map(|()| seconds));
        if let Err(err) = &result {
            info!(input = time_text, error = %err, "rejected timer input");
            self.set_notice(err.user_message(), NoticeKind::Error);
        }
        result
    }

    pub fn start(&mut self, title: &str, seconds: u64, sample: TimeSample) -> Result<(), TimerError> {
        self.engine.start_at(title.trim(), seconds, sample.monotonic)?;
        self.started_wall = Some(sample.wall);
        self.pending_title = None;
        self.notice = None;
        self.last_frame = self.engine.tick(sample.monotonic).frame;
        info!(title = title.trim(), seconds, "countdown started");
        Ok(())
    }

    /// Recomputes the display frame. Safe to call from any cadence.
    pub fn tick(&mut self, sample: TimeSample) -> Frame {
        if let Some(notice) = &self.notice
            && sample.monotonic >= notice.expires_at
        {
            self.notice = None;
        }

        let outcome = self.engine.tick(sample.monotonic);
        self.last_frame = outcome.frame;
        if let Some(completed) = outcome.completed {
            info!(title = %completed.title, seconds = completed.total_seconds, "countdown finished");
            if let Err(err) = self.chime.play() {
                debug!(error = %err, "chime failed");
            }
            self.record_completion(&completed.title, completed.total_seconds, sample.wall);
        }
        outcome.frame
    }

    pub fn reset(&mut self) {
        if self.engine.state() != SessionState::Idle {
            info!(state = self.engine.state().label(), "countdown reset");
        }
        self.engine.reset();
        self.started_wall = None;
        self.notice = None;
        self.pending_title = None;
        self.last_frame = self.engine.tick(Instant::now()).frame;
    }

    /// Names the pending untitled session and logs it.
    pub fn resolve_pending_title(&mut self, title: &str) -> bool {
        let title = title.trim();
        if title.is_empty() {
            return false;
        }
        let Some(pending) = self.pending_title.take() else {
            return false;
        };
        self.append_log(title, pending);
        true
    }

    pub fn save_theme(&mut self) {
        if self.theme.save() {
            self.history.settings.theme_color = Some(self.theme.committed().to_hex());
            self.persist();
        }
    }

    /// A rejected goal is reported as an error notice as well as returned.
    pub fn set_goal(&mut self, title: &str, goal: Goal) -> Result<()> {
        if let Err(err) = self.history.set_goal(title, goal) {
            self.set_notice(format!("{err:#}"), NoticeKind::Error);
            return Err(err);
        }
        self.persist();
        Ok(())
    }

    pub fn remove_goal(&mut self, title: &str) -> bool {
        let removed = self.history.remove_goal(title).is_some();
        if removed {
            self.persist();
        }
        removed
    }

    pub fn goal_progress(&self) -> Vec<GoalProgress> {
        goal_progress(&self.history)
    }

    fn record_completion(&mut self, title: &str, seconds: u64, completed_at: DateTime<Local>) {
        self.set_notice(
            if title.is_empty() {
                "Time's up!".to_string()
            } else {
                format!("Time's up: {title}")
            },
            NoticeKind::Info,
        );
        if self.context.user.is_none() {
            return;
        }

        let pending = PendingLog {
            seconds,
            started_at: self
                .started_wall
                .unwrap_or(completed_at - chrono::Duration::seconds(seconds as i64)),
            completed_at,
            color: self.theme.committed(),
        };
        if title.is_empty() {
            self.pending_title = Some(pending);
        } else {
            self.append_log(title, pending);
        }
    }

    fn append_log(&mut self, title: &str, pending: PendingLog) {
        let id = format!(
            "log-{}-{}",
            pending.completed_at.timestamp_millis(),
            self.next_log_seq
        );
        self.next_log_seq += 1;
        self.history.append_log(LogEntry {
            id,
            title: title.to_string(),
            seconds: pending.seconds,
            started_at: pending.started_at,
            completed_at: pending.completed_at,
            color: pending.color.to_hex(),
        });
        self.persist();
    }

    /// Best effort: a failed write becomes a notice, never an error.
    fn persist(&mut self) {
        let Some(path) = self.context.store_path.clone() else {
            return;
        };
        if let Err(err) = save_history(&path, &self.history) {
            let reason = format!("{err:#}");
            warn!(path = %path.display(), error = %reason, "history write failed");
            let failure = TimerError::Persistence {
                path: path.display().to_string(),
                reason,
            };
            self.set_notice(failure.user_message(), NoticeKind::Error);
        }
    }

    fn set_notice(&mut self, text: String, kind: NoticeKind) {
        let ttl = match kind {
            NoticeKind::Error => ERROR_NOTICE_TTL,
            NoticeKind::Info => INFO_NOTICE_TTL,
        };
        self.notice = Some(Notice {
            text,
            kind,
            expires_at: Instant::now() + ttl,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use tempfile::tempdir;

    use super::*;
    use crate::timer::error::{EMPTY_INPUT_MESSAGE, INVALID_INPUT_MESSAGE};

    struct CountingChime(Rc<Cell<u32>>);

    impl Chime for CountingChime {
        fn play(&self) -> Result<()> {
            self.0.set(self.0.get() + 1);
            Ok(())
        }
    }

    struct BrokenChime;

    impl Chime for BrokenChime {
        fn play(&self) -> Result<()> {
            anyhow::bail!("no audio device")
        }
    }

    fn sample_at(monotonic: Instant) -> TimeSample {
        TimeSample {
            monotonic,
            wall: Local::now(),
        }
    }

    fn controller(user: Option<&str>, store_path: Option<PathBuf>) -> (TimerController, Rc<Cell<u32>>) {
        let plays = Rc::new(Cell::new(0));
        let controller = TimerController::open(
            TimerContext {
                user: user.map(str::to_string),
                store_path,
            },
            None,
            Box::new(CountingChime(Rc::clone(&plays))),
        );
        (controller, plays)
    }

    #[test]
    fn empty_and_invalid_input_leave_notice_and_idle_state() {
        let (mut timer, _) = controller(None, None);
        let now = sample_at(Instant::now());

        let err = timer.start_from_input("focus", "  ", now).expect_err("empty");
        assert!(matches!(err, TimerError::InvalidFormat { .. }));
        assert_eq!(timer.notice().map(|n| n.text.as_str()), Some(EMPTY_INPUT_MESSAGE));
        assert_eq!(timer.state(), SessionState::Idle);

        let err = timer.start_from_input("focus", "0m", now).expect_err("zero");
        assert!(matches!(err, TimerError::InvalidDuration { .. }));
        assert_eq!(timer.notice().map(|n| n.text.as_str()), Some(INVALID_INPUT_MESSAGE));

        timer.start_from_input("focus", "abc", now).expect_err("garbage");
        assert_eq!(timer.notice().map(|n| n.kind), Some(NoticeKind::Error));
        assert_eq!(timer.state(), SessionState::Idle);
    }

    #[test]
    fn start_clears_notice_and_reports_full_frame() {
        let (mut timer, _) = controller(None, None);
        let now = sample_at(Instant::now());
        timer.start_from_input("", "", now).expect_err("empty");
        let seconds = timer
            .start_from_input(" read ", "25m", now)
            .expect("valid");
        assert_eq!(seconds, 1_500);
        assert!(timer.notice().is_none());
        assert_eq!(timer.title(), "read");
        assert_eq!(timer.frame().remaining_seconds, 1_500);
        assert_eq!(timer.frame().percent, 0.0);
    }

    #[test]
    fn completion_chimes_once_and_logs_for_known_user() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("timeto.json");
        let (mut timer, plays) = controller(Some("sam"), Some(path.clone()));
        let start = Instant::now();
        timer.start("stretch", 2, sample_at(start)).expect("start");

        timer.tick(sample_at(start + Duration::from_secs(1)));
        assert_eq!(plays.get(), 0);
        let frame = timer.tick(sample_at(start + Duration::from_secs(2)));
        assert_eq!(frame.state, SessionState::Finished);
        timer.tick(sample_at(start + Duration::from_secs(3)));
        assert_eq!(plays.get(), 1);

        assert_eq!(timer.history().logs.len(), 1);
        let entry = &timer.history().logs[0];
        assert_eq!(entry.title, "stretch");
        assert_eq!(entry.seconds, 2);
        assert_eq!(entry.color, "#00ffff");

        let reloaded = load_history(&path).expect("persisted");
        assert_eq!(reloaded.logs.len(), 1);
    }

    #[test]
    fn anonymous_completion_is_not_logged() {
        let (mut timer, plays) = controller(None, None);
        let start = Instant::now();
        timer.start("nap", 1, sample_at(start)).expect("start");
        timer.tick(sample_at(start + Duration::from_secs(5)));
        assert_eq!(plays.get(), 1);
        assert!(timer.history().logs.is_empty());
        assert_eq!(timer.notice().map(|n| n.kind), Some(NoticeKind::Info));
    }

    #[test]
    fn chime_failure_is_ignored() {
        let mut timer = TimerController::new(
            TimerContext::default(),
            HistoryStore::default(),
            ThemeColor::default(),
            Box::new(BrokenChime),
        );
        let start = Instant::now();
        timer.start("x", 1, sample_at(start)).expect("start");
        let frame = timer.tick(sample_at(start + Duration::from_secs(1)));
        assert_eq!(frame.state, SessionState::Finished);
    }

    #[test]
    fn untitled_completion_waits_for_a_title() {
        let (mut timer, _) = controller(Some("sam"), None);
        let start = Instant::now();
        timer.start("  ", 1, sample_at(start)).expect("start");
        timer.tick(sample_at(start + Duration::from_secs(1)));
        assert!(timer.has_pending_title());
        assert!(timer.history().logs.is_empty());

        assert!(!timer.resolve_pending_title("   "));
        assert!(timer.resolve_pending_title("deep work"));
        assert!(!timer.has_pending_title());
        assert_eq!(timer.history().logs[0].title, "deep work");
    }

    #[test]
    fn reset_discards_transient_state() {
        let (mut timer, _) = controller(Some("sam"), None);
        let start = Instant::now();
        timer.start("", 1, sample_at(start)).expect("start");
        timer.tick(sample_at(start + Duration::from_secs(2)));
        assert!(timer.has_pending_title());
        assert!(timer.notice().is_some());

        timer.reset();
        assert_eq!(timer.state(), SessionState::Idle);
        assert!(!timer.has_pending_title());
        assert!(timer.notice().is_none());
        assert!(!timer.resolve_pending_title("late"));
        assert!(timer.history().logs.is_empty());
    }

    #[test]
    fn unreadable_store_starts_empty_with_notice() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("timeto.json");
        std::fs::write(&path, "{ broken").expect("write");
        let (mut timer, _) = controller(Some("sam"), Some(path.clone()));
        assert!(timer.history().logs.is_empty());
        let notice = timer.notice().expect("notice");
        assert_eq!(notice.kind, NoticeKind::Error);
        assert!(notice.text.contains("invalid JSON"));
        assert_eq!(timer.state(), SessionState::Idle);

        let start = Instant::now();
        timer.start("walk", 1, sample_at(start)).expect("start");
        timer.tick(sample_at(start + Duration::from_secs(1)));
        assert_eq!(timer.history().logs.len(), 1);
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "{ broken");
    }

    #[test]
    fn saved_theme_is_persisted_and_stamped_on_logs() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("timeto.json");
        let (mut timer, _) = controller(Some("sam"), Some(path.clone()));
        let magenta = ThemeColor::rgb(255, 0, 255);
        timer.theme_mut().preview(magenta);
        timer.save_theme();
        assert_eq!(
            load_history(&path).expect("load").settings.theme_color.as_deref(),
            Some("#ff00ff")
        );

        let (mut reopened, _) = controller(Some("sam"), Some(path));
        assert_eq!(reopened.theme().committed(), magenta);
        let start = Instant::now();
        reopened.start("paint", 1, sample_at(start)).expect("start");
        reopened.tick(sample_at(start + Duration::from_secs(1)));
        assert_eq!(reopened.history().logs[0].color, "#ff00ff");
    }

    #[test]
    fn stored_user_applies_when_none_is_given() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("timeto.json");
        let mut store = HistoryStore::default();
        store.settings.user = Some("ari".to_string());
        save_history(&path, &store).expect("save");

        let (timer, _) = controller(None, Some(path.clone()));
        assert_eq!(timer.user(), Some("ari"));
        let (timer, _) = controller(Some("sam"), Some(path));
        assert_eq!(timer.user(), Some("sam"));
    }

    #[test]
    fn rejected_goal_leaves_an_error_notice() {
        let (mut timer, _) = controller(Some("sam"), None);
        let empty = Goal {
            target_sessions: None,
            target_hours: None,
        };
        timer.set_goal("read", empty).expect_err("no targets");
        let notice = timer.notice().expect("notice");
        assert_eq!(notice.kind, NoticeKind::Error);
        assert!(notice.text.contains("needs a session target"));

        let valid = Goal {
            target_sessions: Some(1),
            target_hours: None,
        };
        timer.set_goal("   ", valid).expect_err("blank title");
        assert!(timer.notice().expect("notice").text.contains("must not be empty"));
        assert!(timer.goal_progress().is_empty());
    }

    #[test]
    fn goals_track_logged_sessions() {
        let (mut timer, _) = controller(Some("sam"), None);
        timer
            .set_goal(
                "run",
                Goal {
                    target_sessions: Some(2),
                    target_hours: None,
                },
            )
            .expect("goal");
        let start = Instant::now();
        for round in 0..2_u64 {
            let at = start + Duration::from_secs(round * 10);
            timer.start("Run", 1, sample_at(at)).expect("start");
            timer.tick(sample_at(at + Duration::from_secs(1)));
        }
        let progress = timer.goal_progress();
        assert_eq!(progress.len(), 1);
        assert_eq!(progress[0].totals.sessions, 2);
        assert!(progress[0].is_met());
        assert!(timer.remove_goal("run"));
        assert!(timer.goal_progress().is_empty());
    }
}
