//! Wire types for the analysis service

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use stemdeck_core::music::Chord;
use stemdeck_core::{ProgressNotice, FAILURE_STEP};

/// Number of stems to separate into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum StemsMode {
    /// Vocals + accompaniment
    #[serde(rename = "2")]
    Two,

    /// Vocals, drums, bass, other
    #[default]
    #[serde(rename = "4")]
    Four,

    /// Adds piano and guitar
    #[serde(rename = "6")]
    Six,
}

impl StemsMode {
    /// Form value sent to the service
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Two => "2",
            Self::Four => "4",
            Self::Six => "6",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Two => "2 stems (vocals + instrumental)",
            Self::Four => "4 stems (vocals, drums, bass, other)",
            Self::Six => "6 stems (adds piano, guitar)",
        }
    }

    pub fn all() -> &'static [Self] {
        &[Self::Two, Self::Four, Self::Six]
    }
}

impl FromStr for StemsMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|m| m.as_str() == s.trim())
            .ok_or_else(|| format!("stems mode must be 2, 4 or 6 (got {:?})", s))
    }
}

impl fmt::Display for StemsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Separation quality / speed trade-off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QualityMode {
    Basic,
    #[default]
    Intermediate,
    Maximum,
}

impl QualityMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Intermediate => "intermediate",
            Self::Maximum => "maximum",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Basic => "Basic (fast)",
            Self::Intermediate => "Intermediate",
            Self::Maximum => "Maximum (slow)",
        }
    }

    pub fn all() -> &'static [Self] {
        &[Self::Basic, Self::Intermediate, Self::Maximum]
    }
}

impl FromStr for QualityMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|q| q.as_str() == s)
            .ok_or_else(|| format!("quality must be basic, intermediate or maximum (got {:?})", s))
    }
}

impl fmt::Display for QualityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One separated stem; `url` may be relative to the service base URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StemInfo {
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
    pub url: String,
}

/// Progress of a separation or chord job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressData {
    pub step: i32,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub percentage: f32,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub stems: Option<Vec<StemInfo>>,
    #[serde(default)]
    pub chords: Option<Vec<Chord>>,
    #[serde(default)]
    pub processing_time: Option<f64>,
    #[serde(default)]
    pub stems_mode: Option<String>,
}

impl ProgressData {
    pub fn is_complete(&self) -> bool {
        self.percentage >= 100.0
    }

    pub fn is_failed(&self) -> bool {
        self.step == FAILURE_STEP
    }

    pub fn to_notice(&self) -> ProgressNotice {
        ProgressNotice::new(self.step, self.message.clone(), self.percentage)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeparateResponse {
    #[serde(default)]
    pub status: Option<String>,
    pub task_id: String,
    #[serde(default)]
    pub stems_mode: Option<String>,
    #[serde(default)]
    pub quality_mode: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChordsResponse {
    #[serde(default)]
    pub chords: Vec<Chord>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
}

/// Entry of the analysis history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub filename: String,
    #[serde(default)]
    pub stems_count: u32,
    #[serde(default)]
    pub chords_count: u32,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct HistoryResponse {
    #[serde(default)]
    pub history: Vec<HistoryItem>,
}

/// Cached result of a previous analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    #[serde(default)]
    pub stems: Vec<StemInfo>,
    #[serde(default)]
    pub chords: Vec<Chord>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub deleted_items: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub active_tasks: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: String,
}

/// Drop stems whose name was already seen (first wins)
pub fn dedupe_stems(stems: Vec<StemInfo>) -> Vec<StemInfo> {
    let mut seen = std::collections::HashSet::new();
    stems.into_iter().filter(|s| seen.insert(s.name.clone())).collect()
}

/// Stem used as the master/visual source: `other`, else the first one
pub fn visual_stem(stems: &[StemInfo]) -> Option<&StemInfo> {
    stems.iter().find(|s| s.name == "other").or_else(|| stems.first())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stem(name: &str) -> StemInfo {
        StemInfo {
            name: name.to_string(),
            path: None,
            url: format!("/api/download/htdemucs/song/{}", name),
        }
    }

    #[test]
    fn test_modes_parse_and_serialize() {
        assert_eq!("6".parse::<StemsMode>().unwrap(), StemsMode::Six);
        assert!("3".parse::<StemsMode>().is_err());
        assert_eq!(" Maximum ".parse::<QualityMode>().unwrap(), QualityMode::Maximum);
        assert_eq!(serde_json::to_string(&StemsMode::Two).unwrap(), "\"2\"");
        assert_eq!(serde_json::to_string(&QualityMode::Basic).unwrap(), "\"basic\"");
        assert_eq!(StemsMode::default(), StemsMode::Four);
        assert_eq!(QualityMode::default(), QualityMode::Intermediate);
    }

    #[test]
    fn test_progress_payload() {
        let json = r#"{
            "step": 6,
            "message": "Done",
            "percentage": 100,
            "timestamp": "2024-05-01T10:00:00",
            "stems": [{"name": "vocals", "url": "/api/download/htdemucs/song/vocals"}],
            "chords": [{"chord": "C", "start": 0.0, "end": 1.5}]
        }"#;
        let progress: ProgressData = serde_json::from_str(json).unwrap();
        assert!(progress.is_complete());
        assert!(!progress.is_failed());
        assert_eq!(progress.stems.unwrap()[0].name, "vocals");
        assert_eq!(progress.chords.unwrap()[0].chord, "C");
    }

    #[test]
    fn test_failed_progress_maps_to_failure_notice() {
        let progress: ProgressData =
            serde_json::from_str(r#"{"step": -1, "message": "Erro: out of memory", "percentage": 0}"#).unwrap();
        assert!(progress.is_failed());
        assert!(progress.to_notice().is_failure());
    }

    #[test]
    fn test_history_payload_tolerates_missing_fields() {
        let history: HistoryResponse =
            serde_json::from_str(r#"{"history": [{"filename": "song.mp3", "chords_count": 12}]}"#).unwrap();
        assert_eq!(history.history[0].filename, "song.mp3");
        assert_eq!(history.history[0].stems_count, 0);
        assert_eq!(history.history[0].chords_count, 12);
    }

    #[test]
    fn test_dedupe_keeps_first() {
        let mut dup = stem("vocals");
        dup.url = "/other".into();
        let stems = dedupe_stems(vec![stem("vocals"), stem("drums"), dup]);
        assert_eq!(stems.len(), 2);
        assert_eq!(stems[0].url, "/api/download/htdemucs/song/vocals");
    }

    #[test]
    fn test_visual_stem_prefers_other() {
        let stems = vec![stem("vocals"), stem("other"), stem("bass")];
        assert_eq!(visual_stem(&stems).unwrap().name, "other");
        assert_eq!(visual_stem(&stems[..1]).unwrap().name, "vocals");
        assert!(visual_stem(&[]).is_none());
    }
}
