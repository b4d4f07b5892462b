use std::io::{self, BufRead, Write};

use anyhow::{Result, anyhow};
use tracing::debug;

use crate::controller::TimerController;
use crate::pacing::{Cadence, sleep_until};
use crate::time_provider::TimeProvider;
use crate::timer::engine::{Frame, SessionState};
use crate::timer::parse::{format_hms, format_percent};

const BAR_WIDTH: usize = 30;
const TERMINAL_FPS: u16 = 10;

/// Runs one countdown in the terminal, redrawing a single status line until
/// the session finishes.
pub fn run_terminal(
    controller: &mut TimerController,
    provider: &dyn TimeProvider,
    title: &str,
    time_text: &str,
) -> Result<()> {
    let started = provider.now();
    let total = controller
        .start_from_input(title, time_text, started)
        .map_err(|err| anyhow!("{}", err.user_message()))?;
    debug!(total, "terminal countdown running");

    let cadence = Cadence::Frame { fps: TERMINAL_FPS };
    let mut stdout = io::stdout().lock();
    let mut last_line = String::new();
    let mut deadline = started.monotonic;
    loop {
        let sample = provider.now();
        let frame = controller.tick(sample);
        let line = render_line(&frame, controller.title());
        if line != last_line {
            write!(stdout, "\r{line}")?;
            stdout.flush()?;
            last_line = line;
        }
        if frame.state == SessionState::Finished {
            writeln!(stdout)?;
            break;
        }
        deadline = cadence.next_deadline(deadline, sample.monotonic);
        sleep_until(deadline);
    }

    if let Some(notice) = controller.notice() {
        writeln!(stdout, "{}", notice.text)?;
    }
    if controller.has_pending_title() {
        write!(stdout, "Name this session: ")?;
        stdout.flush()?;
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer)? > 0 && controller.resolve_pending_title(&answer) {
            writeln!(stdout, "Logged '{}'.", answer.trim())?;
        } else {
            writeln!(stdout)?;
        }
    }
    Ok(())
}

pub fn render_line(frame: &Frame, title: &str) -> String {
    let filled = ((frame.percent / 100.0) * BAR_WIDTH as f64).floor() as usize;
    let filled = filled.min(BAR_WIDTH);
    let bar = format!("{}{}", "#".repeat(filled), ".".repeat(BAR_WIDTH - filled));
    let mut line = format!(
        "[{bar}] {:>6}  {}",
        format_percent(frame.percent),
        format_hms(frame.remaining_seconds)
    );
    if !title.is_empty() {
        line.push_str("  ");
        line.push_str(title);
    }
    line
}
