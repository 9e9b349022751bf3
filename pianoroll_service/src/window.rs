// Generation window: the absolute span of time the generator fills.
//
// The end of the window depends only on the configured step count and the
// tempo, never on the primer: `num_steps` counts from time zero. The start is
// wherever the primer ends, so a long primer eats into the generated part,
// and a primer that reaches the end leaves nothing to generate.

use crate::error::WindowError;
use pianoroll_sequence::NoteSequence;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationWindow {
    pub start_time: f64,
    pub end_time: f64,
}

impl GenerationWindow {
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// Length of one model step in seconds.
pub fn seconds_per_step(qpm: f64, steps_per_quarter: u32) -> f64 {
    60.0 / qpm / f64::from(steps_per_quarter)
}

/// Compute the window for `primer`. Fails if the primer already ends at or
/// after the requested end.
pub fn compute_window(
    primer: &NoteSequence,
    qpm: f64,
    steps_per_quarter: u32,
    num_steps: u32,
) -> Result<GenerationWindow, WindowError> {
    let end_time = f64::from(num_steps) * seconds_per_step(qpm, steps_per_quarter);
    let start_time = primer.total_time;
    // NaN from a degenerate tempo compares as None and fails too.
    if start_time.partial_cmp(&end_time) != Some(Ordering::Less) {
        return Err(WindowError {
            start_time,
            end_time,
        });
    }
    Ok(GenerationWindow {
        start_time,
        end_time,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primer::build_primer;

    #[test]
    fn window_for_three_note_primer() {
        let primer = build_primer(Some("[60,62,64]"), 60.0).unwrap();
        let window = compute_window(&primer, 60.0, 4, 128).unwrap();
        assert_eq!(window.start_time, 1.0);
        assert_eq!(window.end_time, 32.0);
        assert_eq!(window.duration(), 31.0);
    }

    #[test]
    fn end_time_ignores_primer_content() {
        let empty = build_primer(None, 120.0).unwrap();
        let chord = build_primer(Some("[48, 52, 55, 60]"), 120.0).unwrap();
        let a = compute_window(&empty, 120.0, 4, 64).unwrap();
        let b = compute_window(&chord, 120.0, 4, 64).unwrap();
        // 64 * 60 / (120 * 4)
        assert_eq!(a.end_time, 8.0);
        assert_eq!(b.end_time, 8.0);
        assert_eq!(a.start_time, 0.0);
        assert_eq!(b.start_time, 0.5);
    }

    #[test]
    fn primer_longer_than_request_fails() {
        let primer = build_primer(Some("[60]"), 60.0).unwrap();
        // 2 steps at 4 per quarter = half a beat, shorter than the primer.
        let err = compute_window(&primer, 60.0, 4, 2).unwrap_err();
        assert_eq!(
            err,
            WindowError {
                start_time: 1.0,
                end_time: 0.5
            }
        );
        // Exactly equal is also a failure.
        assert!(compute_window(&primer, 60.0, 4, 4).is_err());
    }

    #[test]
    fn zero_steps_with_empty_primer_fails() {
        let primer = build_primer(None, 60.0).unwrap();
        assert!(compute_window(&primer, 60.0, 4, 0).is_err());
    }

    #[test]
    fn step_length() {
        assert_eq!(seconds_per_step(60.0, 4), 0.25);
        assert_eq!(seconds_per_step(120.0, 4), 0.125);
    }
}
