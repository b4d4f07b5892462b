use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub const COARSE_INTERVAL: Duration = Duration::from_secs(1);

/// How often the countdown is re-evaluated. `Frame` follows the display
/// refresh; `Coarse` is the ~1 Hz fallback used while the surface is hidden
/// or throttled.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Cadence {
    Frame { fps: u16 },
    Coarse,
}

impl Cadence {
    pub fn for_surface(visible: bool, fps: u16) -> Self {
        if visible {
            Cadence::Frame { fps: fps.max(1) }
        } else {
            Cadence::Coarse
        }
    }

    pub fn interval(self) -> Duration {
        match self {
            Cadence::Frame { fps } => Duration::from_secs_f64(1.0 / f64::from(fps.max(1))),
            Cadence::Coarse => COARSE_INTERVAL,
        }
    }

    /// Next deadline after `previous`, skipping any that were missed so a
    /// stalled driver does not burst-tick to catch up.
    pub fn next_deadline(self, previous: Instant, now: Instant) -> Instant {
        let step = self.interval();
        let mut next = previous + step;
        if next <= now {
            let behind = now.saturating_duration_since(next);
            let skipped = (behind.as_nanos() / step.as_nanos().max(1)) as u32 + 1;
            next += step * skipped;
        }
        next
    }
}

pub fn sleep_until(deadline: Instant) {
    let remaining = deadline.saturating_duration_since(Instant::now());
    if !remaining.is_zero() {
        thread::sleep(remaining);
    }
}

/// Background thread that calls `wake` on a fixed interval, independent of
/// whether the display is repainting. Stops when dropped.
pub struct CoarseWaker {
    stop: Option<Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl CoarseWaker {
    pub fn spawn<F>(interval: Duration, wake: F) -> Self
    where
        F: Fn() + Send + 'static,
    {
        let (stop, stopped) = mpsc::channel::<()>();
        let join = thread::spawn(move || {
            while let Err(RecvTimeoutError::Timeout) = stopped.recv_timeout(interval) {
                wake();
            }
        });
        Self {
            stop: Some(stop),
            join: Some(join),
        }
    }
}

impl Drop for CoarseWaker {
    fn drop(&mut self) {
        // Disconnecting the channel ends the wait immediately.
        self.stop.take();
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn hidden_surface_falls_back_to_coarse() {
        assert_eq!(Cadence::for_surface(false, 144), Cadence::Coarse);
        assert_eq!(Cadence::for_surface(true, 0), Cadence::Frame { fps: 1 });
        assert_eq!(Cadence::Coarse.interval(), Duration::from_secs(1));
        assert_eq!(
            Cadence::Frame { fps: 50 }.interval(),
            Duration::from_millis(20)
        );
    }

    #[test]
    fn next_deadline_skips_missed_slots() {
        let base = Instant::now();
        let cadence = Cadence::Frame { fps: 10 };
        assert_eq!(
            cadence.next_deadline(base, base),
            base + Duration::from_millis(100)
        );
        let late = base + Duration::from_millis(350);
        assert_eq!(
            cadence.next_deadline(base, late),
            base + Duration::from_millis(400)
        );
    }

    #[test]
    fn sleep_until_waits_for_the_deadline() {
        let start = Instant::now();
        sleep_until(start);
        assert!(start.elapsed() < Duration::from_millis(50));

        let deadline = Instant::now() + Duration::from_millis(20);
        sleep_until(deadline);
        assert!(Instant::now() >= deadline);
    }

    #[test]
    fn waker_fires_repeatedly_until_dropped() {
        let wakes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&wakes);
        let waker = CoarseWaker::spawn(Duration::from_millis(10), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        thread::sleep(Duration::from_millis(100));
        drop(waker);

        let seen = wakes.load(Ordering::SeqCst);
        assert!(seen >= 2, "woke {seen} times");
        thread::sleep(Duration::from_millis(50));
        assert_eq!(wakes.load(Ordering::SeqCst), seen);
    }

    #[test]
    fn dropping_waker_does_not_wait_for_the_interval() {
        let waker = CoarseWaker::spawn(Duration::from_secs(30), || {});
        let start = Instant::now();
        drop(waker);
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
