// Pianoroll sequence generator.
//
// Represents music as a pianoroll: one frame per model step, each frame the
// set of pitches sounding during that step. Frames are sampled left to right
// from weight tables loaded from the bundle checkpoint:
// - interval_weights: for every pitch sounding in the previous frame, the
//   distribution over how it moves (0 = held, +2 = up a whole step, ...).
// - release_probability: chance that a sounding pitch stops instead.
// - start_pitch_weights: distribution for a fresh onset after silence.
//
// Beam search sits on top of the sampler. Each iteration extends every live
// beam by one frame `branch_factor` times, then keeps the `beam_size` most
// likely candidates by accumulated log-probability. With beam_size = 1 and
// branch_factor = 1 this reduces to plain ancestral sampling.
//
// Consecutive frames containing the same pitch become one held note when the
// pianoroll is converted back to a NoteSequence.

use crate::bundle::{Bundle, GeneratorDetails};
use crate::config::ModelConfig;
use crate::error::{ModelError, Result};
use crate::generator::SequenceGenerator;
use crate::options::GeneratorOptions;
use pianoroll_sequence::{NoteEvent, NoteSequence};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Lowest pitch on the pianoroll (A0).
pub const MIN_PITCH: i32 = 21;

/// Highest pitch on the pianoroll (C8).
pub const MAX_PITCH: i32 = 108;

const GENERATED_VELOCITY: i32 = 100;

/// Trained tables the sampler draws from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PianorollCheckpoint {
    /// Movement of a sounding pitch from one frame to the next, keyed by
    /// interval in semitones. Unnormalized.
    pub interval_weights: BTreeMap<i8, f64>,
    /// Pitch of a fresh onset after a silent frame. Unnormalized.
    pub start_pitch_weights: BTreeMap<i32, f64>,
    /// Per-frame chance that a sounding pitch is released.
    pub release_probability: f64,
    /// Frames are truncated to this many pitches (lowest kept).
    pub max_polyphony: usize,
}

impl Default for PianorollCheckpoint {
    fn default() -> Self {
        let mut interval_weights = BTreeMap::new();
        // Held notes dominate, then stepwise motion, then small leaps.
        interval_weights.insert(0, 40.0);
        for (interval, weight) in [(1, 6.0), (2, 10.0), (3, 4.0), (4, 4.0), (5, 2.0), (7, 2.0), (12, 1.0)] {
            interval_weights.insert(interval, weight);
            interval_weights.insert(-interval, weight);
        }

        // Onsets favor the C major triad around middle C.
        let mut start_pitch_weights = BTreeMap::new();
        for pitch in 48..=72 {
            let weight = match pitch % 12 {
                0 | 4 | 7 => 4.0,
                2 | 5 | 9 | 11 => 2.0,
                _ => 0.5,
            };
            start_pitch_weights.insert(pitch, weight);
        }

        PianorollCheckpoint {
            interval_weights,
            start_pitch_weights,
            release_probability: 0.1,
            max_polyphony: 4,
        }
    }
}

impl PianorollCheckpoint {
    fn validate(&self) -> Result<()> {
        check_table("interval_weights", &self.interval_weights)?;
        check_table("start_pitch_weights", &self.start_pitch_weights)?;
        if !(0.0..1.0).contains(&self.release_probability) {
            return Err(ModelError::InvalidCheckpoint(format!(
                "release_probability must be in [0, 1), got {}",
                self.release_probability
            )));
        }
        if self.max_polyphony == 0 {
            return Err(ModelError::InvalidCheckpoint(
                "max_polyphony must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn check_table<K>(name: &str, table: &BTreeMap<K, f64>) -> Result<()> {
    if table.values().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(ModelError::InvalidCheckpoint(format!(
            "{name} has a negative or non-finite weight"
        )));
    }
    if table.values().sum::<f64>() <= 0.0 {
        return Err(ModelError::InvalidCheckpoint(format!(
            "{name} has no positive weight"
        )));
    }
    Ok(())
}

/// A partial continuation under consideration by the beam search.
struct Beam {
    frames: Vec<Vec<i32>>,
    log_prob: f64,
}

pub struct PianorollGenerator {
    details: GeneratorDetails,
    steps_per_quarter: u32,
    checkpoint: PianorollCheckpoint,
    rng: Mutex<StdRng>,
}

impl PianorollGenerator {
    /// Build a generator from a resolved configuration and its bundle. With
    /// `seed` set, output is reproducible across runs for the same sequence
    /// of requests.
    pub fn new(config: &ModelConfig, bundle: &Bundle, seed: Option<u64>) -> Result<Self> {
        if config.steps_per_quarter == 0 {
            return Err(ModelError::InvalidCheckpoint(
                "steps_per_quarter must be at least 1".into(),
            ));
        }
        let checkpoint = bundle.checkpoint.clone().unwrap_or_default();
        checkpoint.validate()?;

        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_os_rng(),
        };

        Ok(PianorollGenerator {
            details: config.details.clone(),
            steps_per_quarter: config.steps_per_quarter,
            checkpoint,
            rng: Mutex::new(rng),
        })
    }

    /// Sample the frame following `previous`. Returns the frame and its
    /// log-probability under the checkpoint.
    fn sample_step(&self, previous: &[i32], rng: &mut StdRng) -> (Vec<i32>, f64) {
        let cp = &self.checkpoint;
        let mut next = Vec::with_capacity(previous.len().max(1));
        let mut log_prob = 0.0;

        for &pitch in previous {
            if rng.random::<f64>() < cp.release_probability {
                log_prob += cp.release_probability.ln();
                continue;
            }
            log_prob += (1.0 - cp.release_probability).ln();
            if let Some((interval, p)) = sample_from_table(&cp.interval_weights, rng.random()) {
                log_prob += p.ln();
                let moved = pitch + i32::from(interval);
                if (MIN_PITCH..=MAX_PITCH).contains(&moved) {
                    next.push(moved);
                }
            }
        }

        // A fresh onset only follows silence.
        let onset = if previous.is_empty() {
            sample_from_table(&cp.start_pitch_weights, rng.random())
        } else {
            None
        };
        if let Some((pitch, p)) = onset {
            log_prob += p.ln();
            if (MIN_PITCH..=MAX_PITCH).contains(&pitch) {
                next.push(pitch);
            }
        }

        next.sort_unstable();
        next.dedup();
        next.truncate(cp.max_polyphony);
        (next, log_prob)
    }

    fn beam_search(
        &self,
        context: &[i32],
        num_steps: usize,
        beam_size: usize,
        branch_factor: usize,
        rng: &mut StdRng,
    ) -> Vec<Vec<i32>> {
        let mut beams = vec![Beam {
            frames: Vec::with_capacity(num_steps),
            log_prob: 0.0,
        }];

        for _ in 0..num_steps {
            let mut candidates = Vec::with_capacity(beams.len() * branch_factor);
            for beam in &beams {
                let previous = beam.frames.last().map_or(context, Vec::as_slice);
                for _ in 0..branch_factor {
                    let (frame, log_prob) = self.sample_step(previous, rng);
                    let mut frames = beam.frames.clone();
                    frames.push(frame);
                    candidates.push(Beam {
                        frames,
                        log_prob: beam.log_prob + log_prob,
                    });
                }
            }
            candidates.sort_by(|a, b| b.log_prob.total_cmp(&a.log_prob));
            candidates.truncate(beam_size);
            beams = candidates;
        }

        beams.into_iter().next().map(|b| b.frames).unwrap_or_default()
    }
}

impl SequenceGenerator for PianorollGenerator {
    fn details(&self) -> &GeneratorDetails {
        &self.details
    }

    fn steps_per_quarter(&self) -> u32 {
        self.steps_per_quarter
    }

    fn generate(&self, primer: &NoteSequence, options: &GeneratorOptions) -> Result<NoteSequence> {
        let [section] = options.generate_sections.as_slice() else {
            return Err(ModelError::InvalidOptions(format!(
                "this model supports exactly 1 generate section, got {}",
                options.generate_sections.len()
            )));
        };
        if section.start_time < primer.total_time {
            return Err(ModelError::InvalidOptions(format!(
                "generate section starts at {}s, before the primer ends at {}s",
                section.start_time, primer.total_time
            )));
        }
        if section.end_time <= section.start_time {
            return Err(ModelError::InvalidOptions(format!(
                "generate section [{}s, {}s) is empty",
                section.start_time, section.end_time
            )));
        }
        let beam_size = search_arg(options, "beam_size")?;
        let branch_factor = search_arg(options, "branch_factor")?;

        let qpm = primer.qpm();
        if !qpm.is_finite() || qpm <= 0.0 {
            return Err(ModelError::InvalidOptions(format!(
                "primer tempo of {qpm} qpm is not usable"
            )));
        }
        let seconds_per_step = 60.0 / qpm / f64::from(self.steps_per_quarter);
        let start_step = (section.start_time / seconds_per_step).round() as i64;
        let end_step = (section.end_time / seconds_per_step).round() as i64;
        let num_steps = usize::try_from(end_step - start_step).unwrap_or(0);

        // Pitches held through the last primer step seed the first frame.
        let mut context: Vec<i32> = primer
            .pitches_sounding_at(section.start_time - seconds_per_step / 2.0)
            .into_iter()
            .filter(|p| (MIN_PITCH..=MAX_PITCH).contains(p))
            .collect();
        context.truncate(self.checkpoint.max_polyphony);

        let frames = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            self.beam_search(&context, num_steps, beam_size, branch_factor, &mut rng)
        };

        let mut generated = primer.clone();
        generated
            .notes
            .extend(frames_to_notes(&frames, start_step, seconds_per_step));
        generated.recompute_total_time();
        generated.total_time = generated.total_time.max(section.end_time);

        debug!(
            num_steps,
            beam_size,
            branch_factor,
            primer_notes = primer.notes.len(),
            generated_notes = generated.notes.len() - primer.notes.len(),
            "generated pianoroll continuation"
        );
        Ok(generated)
    }
}

/// Search width argument: absent means 1, anything below 1 is an error.
fn search_arg(options: &GeneratorOptions, name: &str) -> Result<usize> {
    match options.int_arg(name) {
        None => Ok(1),
        Some(v) if v >= 1 => usize::try_from(v)
            .map_err(|_| ModelError::InvalidOptions(format!("{name} of {v} is too large"))),
        Some(v) => Err(ModelError::InvalidOptions(format!(
            "{name} must be at least 1, got {v}"
        ))),
    }
}

/// Convert pianoroll frames starting at `start_step` into notes. A pitch
/// present in consecutive frames is one held note.
fn frames_to_notes(frames: &[Vec<i32>], start_step: i64, seconds_per_step: f64) -> Vec<NoteEvent> {
    let time_of = |frame_index: usize| (start_step + frame_index as i64) as f64 * seconds_per_step;
    let mut notes = Vec::new();
    // pitch -> frame index of its onset
    let mut open: BTreeMap<i32, usize> = BTreeMap::new();

    for (i, frame) in frames.iter().enumerate() {
        let ended: Vec<i32> = open
            .keys()
            .filter(|p| !frame.contains(p))
            .copied()
            .collect();
        for pitch in ended {
            if let Some(onset) = open.remove(&pitch) {
                notes.push(NoteEvent {
                    pitch,
                    start_time: time_of(onset),
                    end_time: time_of(i),
                    velocity: GENERATED_VELOCITY,
                });
            }
        }
        for &pitch in frame {
            open.entry(pitch).or_insert(i);
        }
    }
    for (pitch, onset) in open {
        notes.push(NoteEvent {
            pitch,
            start_time: time_of(onset),
            end_time: time_of(frames.len()),
            velocity: GENERATED_VELOCITY,
        });
    }

    notes.sort_by(|a, b| {
        a.start_time
            .total_cmp(&b.start_time)
            .then(a.pitch.cmp(&b.pitch))
    });
    notes
}

/// Sample a key from a weight table using a random value in [0, 1). Returns
/// the key and its normalized probability.
fn sample_from_table<K: Copy>(table: &BTreeMap<K, f64>, rng_val: f64) -> Option<(K, f64)> {
    let total: f64 = table.values().sum();
    if table.is_empty() || total <= 0.0 {
        return None;
    }

    let target = rng_val * total;
    let mut cumulative = 0.0;
    for (&key, &weight) in table {
        cumulative += weight;
        if cumulative > target {
            return Some((key, weight / total));
        }
    }
    // Floating-point shortfall: return the last positively weighted key.
    table
        .iter()
        .rev()
        .find(|(_, w)| **w > 0.0)
        .map(|(&key, &weight)| (key, weight / total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_configs;
    use pianoroll_sequence::STANDARD_PPQ;

    fn bundle(checkpoint: Option<PianorollCheckpoint>) -> Bundle {
        Bundle {
            generator_details: GeneratorDetails {
                id: "rnn-nade".into(),
                description: String::new(),
            },
            bundle_details: None,
            checkpoint,
        }
    }

    fn generator(seed: u64) -> PianorollGenerator {
        let config = &default_configs()["rnn-nade"];
        PianorollGenerator::new(config, &bundle(None), Some(seed)).unwrap()
    }

    fn primer(pitches: &[i32]) -> NoteSequence {
        let mut seq = NoteSequence::new(STANDARD_PPQ, 60.0);
        for &pitch in pitches {
            seq.notes.push(NoteEvent {
                pitch,
                start_time: 0.0,
                end_time: 1.0,
                velocity: 100,
            });
        }
        seq.recompute_total_time();
        seq
    }

    fn options(start_time: f64, end_time: f64, beam_size: i64, branch_factor: i64) -> GeneratorOptions {
        let mut options = GeneratorOptions::new();
        options.add_generate_section(start_time, end_time);
        options.set_int_arg("beam_size", beam_size);
        options.set_int_arg("branch_factor", branch_factor);
        options
    }

    #[test]
    fn default_checkpoint_is_valid() {
        assert!(PianorollCheckpoint::default().validate().is_ok());
    }

    #[test]
    fn invalid_checkpoints_are_rejected() {
        let config = &default_configs()["rnn-nade"];

        let mut cp = PianorollCheckpoint::default();
        cp.interval_weights.clear();
        assert!(PianorollGenerator::new(config, &bundle(Some(cp)), Some(1)).is_err());

        let cp = PianorollCheckpoint {
            release_probability: 1.0,
            ..Default::default()
        };
        assert!(PianorollGenerator::new(config, &bundle(Some(cp)), Some(1)).is_err());

        let mut cp = PianorollCheckpoint::default();
        cp.start_pitch_weights.insert(60, -1.0);
        assert!(PianorollGenerator::new(config, &bundle(Some(cp)), Some(1)).is_err());
    }

    #[test]
    fn generate_extends_primer_within_section() {
        let generator = generator(7);
        let primer = primer(&[60, 62, 64]);
        let result = generator.generate(&primer, &options(1.0, 32.0, 1, 1)).unwrap();

        assert_eq!(&result.notes[..3], &primer.notes[..]);
        assert!(result.notes.len() > 3);
        for note in &result.notes[3..] {
            assert!(note.start_time >= 1.0 - 1e-9, "note starts at {}", note.start_time);
            assert!(note.end_time <= 32.0 + 1e-9, "note ends at {}", note.end_time);
            assert!(note.end_time > note.start_time);
            assert!((MIN_PITCH..=MAX_PITCH).contains(&note.pitch));
            assert_eq!(note.velocity, GENERATED_VELOCITY);
        }
        assert_eq!(result.total_time, 32.0);
        assert_eq!(result.tempos, primer.tempos);
    }

    #[test]
    fn generate_from_empty_primer() {
        let generator = generator(3);
        let result = generator
            .generate(&primer(&[]), &options(0.0, 4.0, 1, 1))
            .unwrap();
        assert!(!result.notes.is_empty());
        assert_eq!(result.notes[0].start_time, 0.0);
    }

    #[test]
    fn same_seed_same_output() {
        let primer = primer(&[60]);
        let a = generator(42)
            .generate(&primer, &options(1.0, 8.0, 2, 3))
            .unwrap();
        let b = generator(42)
            .generate(&primer, &options(1.0, 8.0, 2, 3))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_wrong_section_count() {
        let generator = generator(1);
        let err = generator
            .generate(&primer(&[60]), &GeneratorOptions::new())
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidOptions(_)));

        let mut two = options(1.0, 4.0, 1, 1);
        two.add_generate_section(4.0, 8.0);
        assert!(generator.generate(&primer(&[60]), &two).is_err());
    }

    #[test]
    fn rejects_section_before_primer_end() {
        let generator = generator(1);
        let err = generator
            .generate(&primer(&[60]), &options(0.5, 4.0, 1, 1))
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidOptions(_)));
    }

    #[test]
    fn rejects_zero_beam_size() {
        let generator = generator(1);
        assert!(
            generator
                .generate(&primer(&[60]), &options(1.0, 4.0, 0, 1))
                .is_err()
        );
    }

    #[test]
    fn beam_search_yields_one_sorted_frame_per_step() {
        let generator = generator(9);
        let mut rng = StdRng::seed_from_u64(9);
        let frames = generator.beam_search(&[60], 16, 4, 4, &mut rng);
        assert_eq!(frames.len(), 16);
        for frame in &frames {
            assert!(frame.len() <= generator.checkpoint.max_polyphony);
            assert!(frame.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn frames_merge_into_held_notes() {
        let frames = vec![vec![60], vec![60, 64], vec![64], vec![]];
        let notes = frames_to_notes(&frames, 4, 0.25);
        assert_eq!(notes.len(), 2);
        assert_eq!((notes[0].pitch, notes[0].start_time, notes[0].end_time), (60, 1.0, 1.5));
        assert_eq!((notes[1].pitch, notes[1].start_time, notes[1].end_time), (64, 1.25, 1.75));
    }

    #[test]
    fn notes_still_open_end_with_the_last_frame() {
        let frames = vec![vec![67], vec![67]];
        let notes = frames_to_notes(&frames, 0, 0.5);
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].end_time, 1.0);
    }

    #[test]
    fn sample_from_table_boundaries() {
        let mut table = BTreeMap::new();
        table.insert(-2i8, 1.0);
        table.insert(0i8, 0.0);
        table.insert(2i8, 3.0);

        assert_eq!(sample_from_table(&table, 0.0), Some((-2, 0.25)));
        assert_eq!(sample_from_table(&table, 0.5), Some((2, 0.75)));
        assert_eq!(sample_from_table(&table, 0.999_999), Some((2, 0.75)));
        assert_eq!(sample_from_table(&BTreeMap::<i8, f64>::new(), 0.5), None);
    }
}
