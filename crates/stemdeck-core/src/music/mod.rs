//! Chord timeline
//!
//! Chords detected by the analysis service, looked up by playback time.

use serde::{Deserialize, Serialize};

/// One detected chord spanning `[start, end)` seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chord {
    pub chord: String,
    pub start: f64,
    pub end: f64,
}

impl Chord {
    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time < self.end
    }
}

/// Chords sorted by start time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChordTimeline {
    chords: Vec<Chord>,
}

impl ChordTimeline {
    pub fn new(mut chords: Vec<Chord>) -> Self {
        chords.retain(|c| c.start.is_finite() && c.end.is_finite() && c.end > c.start);
        chords.sort_by(|a, b| a.start.total_cmp(&b.start));
        Self { chords }
    }

    pub fn chords(&self) -> &[Chord] {
        &self.chords
    }

    pub fn is_empty(&self) -> bool {
        self.chords.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Chord> {
        self.chords.get(index)
    }

    /// Index of the chord sounding at `time`
    pub fn index_at(&self, time: f64) -> Option<usize> {
        // Last chord starting at or before `time`
        let idx = self.chords.partition_point(|c| c.start <= time).checked_sub(1)?;
        self.chords[idx].contains(time).then_some(idx)
    }

    pub fn chord_at(&self, time: f64) -> Option<&Chord> {
        self.index_at(time).map(|i| &self.chords[i])
    }
}
