use std::f32::consts::PI;
use std::io::{self, Write};

use anyhow::Result;
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamHandle, Sink};
use tracing::warn;

const SAMPLE_RATE: u32 = 44_100;
const NOTE_SECONDS: f32 = 0.22;
const FADE_SECONDS: f32 = 0.02;
/// Two rising notes, E5 then A5.
const CHIME_NOTES: [f32; 2] = [659.25, 880.0];

/// Completion cue. Callers ignore failures.
pub trait Chime {
    fn play(&self) -> Result<()>;
}

/// Rings the terminal bell on stdout.
pub struct TerminalBell;

impl Chime for TerminalBell {
    fn play(&self) -> Result<()> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(b"\x07")?;
        stdout.flush()?;
        Ok(())
    }
}

/// Plays a short generated tone on the default audio output.
pub struct ToneChime {
    // Dropping the stream silences every sink attached to it.
    _stream: OutputStream,
    handle: OutputStreamHandle,
}

impl ToneChime {
    pub fn open() -> Result<Self> {
        let (stream, handle) = OutputStream::try_default()?;
        Ok(Self {
            _stream: stream,
            handle,
        })
    }
}

impl Chime for ToneChime {
    fn play(&self) -> Result<()> {
        let sink = Sink::try_new(&self.handle)?;
        sink.append(SamplesBuffer::new(1, SAMPLE_RATE, chime_samples()));
        sink.detach();
        Ok(())
    }
}

pub struct SilentChime;

impl Chime for SilentChime {
    fn play(&self) -> Result<()> {
        Ok(())
    }
}

/// Mono samples for the completion tone, faded in and out per note.
pub fn chime_samples() -> Vec<f32> {
    let per_note = (SAMPLE_RATE as f32 * NOTE_SECONDS) as usize;
    let mut samples = Vec::with_capacity(per_note * CHIME_NOTES.len());
    for freq in CHIME_NOTES {
        for i in 0..per_note {
            let t = i as f32 / SAMPLE_RATE as f32;
            let envelope = if t < FADE_SECONDS {
                t / FADE_SECONDS
            } else {
                ((NOTE_SECONDS - t) / (NOTE_SECONDS - FADE_SECONDS)).max(0.0)
            };
            samples.push((t * freq * 2.0 * PI).sin() * 0.3 * envelope);
        }
    }
    samples
}

/// The terminal runner rings the bell.
pub fn terminal_chime(enabled: bool) -> Box<dyn Chime> {
    if enabled {
        Box::new(TerminalBell)
    } else {
        Box::new(SilentChime)
    }
}

/// The window plays a tone, falling back to the bell without an audio device.
pub fn window_chime(enabled: bool) -> Box<dyn Chime> {
    if !enabled {
        return Box::new(SilentChime);
    }
    match ToneChime::open() {
        Ok(chime) => Box::new(chime),
        Err(err) => {
            let reason = format!("{err:#}");
            warn!(error = %reason, "no audio output, using terminal bell");
            Box::new(TerminalBell)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tone_is_two_quiet_notes() {
        let samples = chime_samples();
        let per_note = (SAMPLE_RATE as f32 * NOTE_SECONDS) as usize;
        assert_eq!(samples.len(), per_note * 2);
        assert!(samples.iter().all(|s| s.abs() <= 0.3));
        assert_eq!(samples[0], 0.0);
        assert!(samples[per_note - 1].abs() < 0.01);
        assert!(samples.iter().any(|s| s.abs() > 0.2));
    }

    #[test]
    fn disabled_chimes_stay_silent() {
        assert!(terminal_chime(false).play().is_ok());
        assert!(window_chime(false).play().is_ok());
    }
}
