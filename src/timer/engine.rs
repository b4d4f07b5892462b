use std::time::{Duration, Instant};

use crate::timer::error::TimerError;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SessionState {
    Idle,
    Running,
    Finished,
}

impl SessionState {
    pub fn label(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Running => "running",
            SessionState::Finished => "finished",
        }
    }
}

/// One countdown run. Start and end references are fixed for its lifetime.
#[derive(Debug, Clone)]
pub struct Session {
    pub title: String,
    pub total_seconds: u64,
    started_at: Instant,
    ends_at: Instant,
}

impl Session {
    pub fn duration(&self) -> Duration {
        self.ends_at - self.started_at
    }
}

/// What the display surface needs after a tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub state: SessionState,
    pub percent: f64,
    pub remaining_seconds: u64,
}

impl Frame {
    fn idle() -> Self {
        Self {
            state: SessionState::Idle,
            percent: 0.0,
            remaining_seconds: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletedSession {
    pub title: String,
    pub total_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct TickOutcome {
    pub frame: Frame,
    /// Set on the single tick that crossed the end reference.
    pub completed: Option<CompletedSession>,
}

pub struct CountdownEngine {
    state: SessionState,
    session: Option<Session>,
    latest_reading: Option<Instant>,
}

impl Default for CountdownEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CountdownEngine {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            session: None,
            latest_reading: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Replaces any previous session, whatever state it was in.
    pub fn start_at(
        &mut self,
        title: impl Into<String>,
        total_seconds: u64,
        now: Instant,
    ) -> Result<(), TimerError> {
        if total_seconds == 0 {
            return Err(TimerError::InvalidDuration { value: 0.0 });
        }
        let ends_at = now
            .checked_add(Duration::from_secs(total_seconds))
            .ok_or(TimerError::InvalidDuration {
                value: total_seconds as f64,
            })?;

        self.session = Some(Session {
            title: title.into(),
            total_seconds,
            started_at: now,
            ends_at,
        });
        self.latest_reading = Some(now);
        self.state = SessionState::Running;
        Ok(())
    }

    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        let Some(session) = &self.session else {
            return TickOutcome {
                frame: Frame::idle(),
                completed: None,
            };
        };

        // Frame and coarse drivers may deliver readings out of order; the
        // newest reading always wins so the display never runs backward.
        let reading = match self.latest_reading {
            Some(latest) if latest > now => latest,
            _ => now,
        };
        self.latest_reading = Some(reading);

        let mut completed = None;
        if self.state == SessionState::Running && reading >= session.ends_at {
            self.state = SessionState::Finished;
            completed = Some(CompletedSession {
                title: session.title.clone(),
                total_seconds: session.total_seconds,
            });
        }

        let frame = match self.state {
            SessionState::Finished => Frame {
                state: SessionState::Finished,
                percent: 100.0,
                remaining_seconds: 0,
            },
            _ => Frame {
                state: self.state,
                percent: percent_complete(session, reading),
                remaining_seconds: remaining_seconds(session, reading),
            },
        };
        TickOutcome { frame, completed }
    }

    pub fn reset(&mut self) {
        self.state = SessionState::Idle;
        self.session = None;
        self.latest_reading = None;
    }
}

fn percent_complete(session: &Session, now: Instant) -> f64 {
    let duration = session.duration();
    if duration.is_zero() {
        return 100.0;
    }
    let elapsed = now.saturating_duration_since(session.started_at).min(duration);
    (elapsed.as_secs_f64() / duration.as_secs_f64() * 100.0).clamp(0.0, 100.0)
}

fn remaining_seconds(session: &Session, now: Instant) -> u64 {
    let remaining = session.ends_at.saturating_duration_since(now);
    let whole = remaining.as_secs();
    if remaining.subsec_nanos() > 0 {
        whole + 1
    } else {
        whole
    }
}
