// Primer construction.
//
// The client sends pitches as a bracketed literal, e.g. `[60, 62, 64]` or
// `(60, 62)`. Every pitch becomes a note starting at time zero and lasting
// one beat, so the primer is a single chord regardless of how many pitches
// are given. Pitch values are passed through unvalidated; the MIDI encoder
// is the first place that enforces 0..=127.

use crate::error::PrimerParseError;
use pianoroll_sequence::{NoteEvent, NoteSequence, STANDARD_PPQ};
use tracing::warn;

/// Tempo used when none is configured.
pub const DEFAULT_PRIMER_QPM: f64 = 60.0;

pub const PRIMER_VELOCITY: i32 = 100;

/// Apply the 60 qpm fallback. Zero counts as unset.
pub fn resolve_qpm(qpm: Option<f64>) -> f64 {
    match qpm {
        Some(q) if q != 0.0 => q,
        _ => DEFAULT_PRIMER_QPM,
    }
}

/// Parse a list or tuple literal of integers.
///
/// Accepts `[a, b, ...]` and `(a, b, ...)` with optional whitespace, a
/// trailing comma, and a sign on each integer. Integers may be written in
/// any of the literal forms `parse_integer` takes. A parenthesized single value
/// without a comma, `(60)`, is a plain integer rather than a tuple and is
/// rejected like any other non-sequence.
pub fn parse_pitch_list(text: &str) -> Result<Vec<i32>, PrimerParseError> {
    let trimmed = text.trim();
    let (inner, is_tuple) = if let Some(rest) = trimmed.strip_prefix('[') {
        let inner = rest
            .strip_suffix(']')
            .ok_or_else(|| PrimerParseError::new(text, "unterminated list"))?;
        (inner, false)
    } else if let Some(rest) = trimmed.strip_prefix('(') {
        let inner = rest
            .strip_suffix(')')
            .ok_or_else(|| PrimerParseError::new(text, "unterminated tuple"))?;
        (inner, true)
    } else {
        return Err(PrimerParseError::new(text, "expected a list of integers"));
    };

    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }

    let items: Vec<&str> = inner.split(',').map(str::trim).collect();
    // One trailing comma is allowed after at least one item.
    let items = match items.split_last() {
        Some((last, rest)) if last.is_empty() && !rest.is_empty() => rest,
        _ => &items[..],
    };
    if is_tuple && !inner.contains(',') {
        return Err(PrimerParseError::new(text, "expected a list of integers"));
    }

    items
        .iter()
        .map(|item| {
            parse_integer(item)
                .ok_or_else(|| PrimerParseError::new(text, format!("{item:?} is not an integer")))
        })
        .collect()
}

/// Integer literal with an optional sign: decimal, or `0x`/`0o`/`0b`
/// prefixed, with single `_` separators between digits. Leading zeros are
/// only allowed for zero itself.
fn parse_integer(item: &str) -> Option<i32> {
    let (negative, body) = match item.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, item.strip_prefix('+').unwrap_or(item)),
    };
    let lower = body.to_ascii_lowercase();
    let (radix, digits) = match lower.get(..2) {
        Some("0x") => (16, &lower[2..]),
        Some("0o") => (8, &lower[2..]),
        Some("0b") => (2, &lower[2..]),
        _ => (10, lower.as_str()),
    };
    // A separator may follow the radix prefix, as in `0x_3c`.
    let digits = match radix {
        10 => digits,
        _ => digits.strip_prefix('_').unwrap_or(digits),
    };
    if digits.is_empty()
        || digits.starts_with('_')
        || digits.ends_with('_')
        || digits.contains("__")
    {
        return None;
    }
    let digits: String = digits.chars().filter(|&c| c != '_').collect();
    if !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    if radix == 10 && digits.len() > 1 && digits.starts_with('0') && digits.bytes().any(|b| b != b'0') {
        return None;
    }
    let magnitude = i64::from_str_radix(&digits, radix).ok()?;
    i32::try_from(if negative { -magnitude } else { magnitude }).ok()
}

/// Build the primer sequence from the client's pitch text.
///
/// Absent, empty, or `[]` input yields an empty sequence with
/// `total_time = 0` and a warning. Otherwise every pitch becomes a note on
/// `[0, 60/qpm)` at velocity 100, and `total_time` is the last note's end.
pub fn build_primer(
    primer_pitches: Option<&str>,
    qpm: f64,
) -> Result<NoteSequence, PrimerParseError> {
    let mut primer = NoteSequence::new(STANDARD_PPQ, qpm);

    let pitches = match primer_pitches.filter(|text| !text.is_empty()) {
        Some(text) => parse_pitch_list(text)?,
        None => Vec::new(),
    };
    if pitches.is_empty() {
        warn!("No priming sequence specified. Defaulting to empty sequence.");
        return Ok(primer);
    }

    let beat = 60.0 / qpm;
    for pitch in pitches {
        primer.notes.push(NoteEvent {
            pitch,
            start_time: 0.0,
            end_time: beat,
            velocity: PRIMER_VELOCITY,
        });
    }
    primer.total_time = primer.notes.last().map_or(0.0, |n| n.end_time);
    Ok(primer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lists_and_tuples() {
        assert_eq!(parse_pitch_list("[60,62,64]").unwrap(), vec![60, 62, 64]);
        assert_eq!(parse_pitch_list(" [ 60 , 62 ] ").unwrap(), vec![60, 62]);
        assert_eq!(parse_pitch_list("[60, 62,]").unwrap(), vec![60, 62]);
        assert_eq!(parse_pitch_list("(60, 62)").unwrap(), vec![60, 62]);
        assert_eq!(parse_pitch_list("(60,)").unwrap(), vec![60]);
        assert_eq!(parse_pitch_list("[-1, +5, 0]").unwrap(), vec![-1, 5, 0]);
        assert_eq!(parse_pitch_list("[]").unwrap(), Vec::<i32>::new());
        assert_eq!(parse_pitch_list("()").unwrap(), Vec::<i32>::new());
    }

    #[test]
    fn accepts_prefixed_and_separated_integers() {
        assert_eq!(parse_pitch_list("[0x3c]").unwrap(), vec![60]);
        assert_eq!(parse_pitch_list("[0X3C, 0o74, 0b111100]").unwrap(), vec![60, 60, 60]);
        assert_eq!(parse_pitch_list("[1_000, 0x_3c, -0x3c]").unwrap(), vec![1000, 60, -60]);
        assert_eq!(parse_pitch_list("[00, 0_0]").unwrap(), vec![0, 0]);
    }

    #[test]
    fn rejects_non_lists() {
        for text in [
            "abc", "60", "(60)", "[60", "60]", "[60,,62]", "[,]", "[60.5]", "[[60]]",
            "[060]", "[ab]", "   ", "[99999999999]", "[0x]", "[1__000]", "[_1]", "[1_]", "[0x3g]",
            "[0b102]", "[0o8]", "[0x3c_]",
        ] {
            let err = parse_pitch_list(text).unwrap_err();
            assert_eq!(err.text, text);
        }
    }

    #[test]
    fn primer_notes_share_one_beat() {
        let primer = build_primer(Some("[60, 62, 64]"), 60.0).unwrap();
        assert_eq!(primer.notes.len(), 3);
        for note in &primer.notes {
            assert_eq!(note.start_time, 0.0);
            assert_eq!(note.end_time, 1.0);
            assert_eq!(note.velocity, 100);
        }
        assert_eq!(
            primer.notes.iter().map(|n| n.pitch).collect::<Vec<_>>(),
            vec![60, 62, 64]
        );
        assert_eq!(primer.total_time, 1.0);
        assert_eq!(primer.qpm(), 60.0);
        assert_eq!(primer.ticks_per_quarter, STANDARD_PPQ);
    }

    #[test]
    fn beat_length_follows_tempo() {
        let primer = build_primer(Some("[60]"), 120.0).unwrap();
        assert_eq!(primer.total_time, 0.5);
        assert_eq!(primer.notes[0].end_time, 0.5);
    }

    #[test]
    fn pitches_pass_through_unvalidated() {
        let primer = build_primer(Some("[200, -3]"), 60.0).unwrap();
        assert_eq!(primer.notes[0].pitch, 200);
        assert_eq!(primer.notes[1].pitch, -3);
    }

    #[test]
    fn absent_or_empty_primer_is_empty_sequence() {
        for input in [None, Some(""), Some("[]")] {
            let primer = build_primer(input, 60.0).unwrap();
            assert!(primer.notes.is_empty());
            assert_eq!(primer.total_time, 0.0);
            assert_eq!(primer.qpm(), 60.0);
        }
    }

    #[test]
    fn malformed_primer_propagates() {
        let err = build_primer(Some("abc"), 60.0).unwrap_err();
        assert_eq!(err.text, "abc");
    }

    #[test]
    fn qpm_fallback() {
        assert_eq!(resolve_qpm(None), 60.0);
        assert_eq!(resolve_qpm(Some(0.0)), 60.0);
        assert_eq!(resolve_qpm(Some(100.0)), 100.0);
    }
}
