//! Command line arguments and the interactive command language

use std::path::PathBuf;

use thiserror::Error;

use stemdeck_client::{QualityMode, StemsMode};
use stemdeck_core::engine::PlayerCommand;
use stemdeck_core::TrackId;

pub const USAGE: &str = "\
usage: stemdeck-player [OPTIONS] [FILE]

  FILE                 play a local audio file
  --separate           separate FILE into stems before playing
  --stems <2|4|6>      stem count for --separate
  --quality <MODE>     basic, intermediate or maximum
  --chords             detect chords for FILE
  --history <NAME>     load a previous analysis by filename
  --list-history       list previous analyses and exit
  --delete <NAME>      delete a previous analysis and exit
  --config <PATH>      config file (default ~/.config/stemdeck/player.yaml)
  -h, --help           show this help";

pub const COMMANDS_HELP: &str = "\
commands:
  play | pause | toggle | seek <secs> | reset
  vol <0-1> | mute | track-vol <id> <0-1> | track-mute <id> | solo <id>
  pitch <-12..12> | rate <0.5-2.0>
  status | help | quit";

#[derive(Debug, Error, PartialEq)]
pub enum ArgsError {
    #[error("missing value for {0}")]
    MissingValue(&'static str),

    #[error("invalid value for {flag}: {reason}")]
    InvalidValue { flag: &'static str, reason: String },

    #[error("unknown argument: {0}")]
    Unknown(String),

    #[error("{0} requires an audio file")]
    NeedsFile(&'static str),
}

/// What the binary should do
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Mode {
    /// Nothing loaded; wait for commands
    #[default]
    Idle,
    /// Play a local file, optionally separating it and detecting chords
    File { path: PathBuf, separate: bool, chords: bool },
    /// Load a stored analysis
    History(String),
    ListHistory,
    Delete(String),
    Help,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Args {
    pub mode: Mode,
    pub stems: Option<StemsMode>,
    pub quality: Option<QualityMode>,
    pub config: Option<PathBuf>,
}

impl Args {
    pub fn parse<I>(args: I) -> Result<Self, ArgsError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut parsed = Args::default();
        let mut file = None;
        let mut separate = false;
        let mut chords = false;
        let mut iter = args.into_iter();

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "-h" | "--help" => parsed.mode = Mode::Help,
                "--separate" => separate = true,
                "--chords" => chords = true,
                "--list-history" => parsed.mode = Mode::ListHistory,
                "--stems" => {
                    let value = iter.next().ok_or(ArgsError::MissingValue("--stems"))?;
                    parsed.stems = Some(value.parse().map_err(|reason| ArgsError::InvalidValue {
                        flag: "--stems",
                        reason,
                    })?);
                }
                "--quality" => {
                    let value = iter.next().ok_or(ArgsError::MissingValue("--quality"))?;
                    parsed.quality = Some(value.parse().map_err(|reason| ArgsError::InvalidValue {
                        flag: "--quality",
                        reason,
                    })?);
                }
                "--history" => {
                    parsed.mode = Mode::History(iter.next().ok_or(ArgsError::MissingValue("--history"))?);
                }
                "--delete" => {
                    parsed.mode = Mode::Delete(iter.next().ok_or(ArgsError::MissingValue("--delete"))?);
                }
                "--config" => {
                    parsed.config = Some(PathBuf::from(iter.next().ok_or(ArgsError::MissingValue("--config"))?));
                }
                other if other.starts_with('-') => return Err(ArgsError::Unknown(other.to_string())),
                other => file = Some(PathBuf::from(other)),
            }
        }

        if parsed.mode == Mode::Idle {
            match file {
                Some(path) => parsed.mode = Mode::File { path, separate, chords },
                None if separate => return Err(ArgsError::NeedsFile("--separate")),
                None if chords => return Err(ArgsError::NeedsFile("--chords")),
                None => {}
            }
        }
        Ok(parsed)
    }
}

// ─────────────────────────────────────────────────────────────
// Interactive commands
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq)]
pub enum CommandParseError {
    #[error("unknown command: {0} (type 'help')")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("not a number: {0}")]
    NotANumber(String),
}

/// One line of interactive input
pub enum Input {
    Command(PlayerCommand),
    Status,
    Help,
    Quit,
    Empty,
}

pub fn parse_command(line: &str) -> Result<Input, CommandParseError> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(Input::Empty);
    };
    let args: Vec<&str> = words.collect();

    let cmd = match (verb.to_ascii_lowercase().as_str(), args.as_slice()) {
        ("play", []) => PlayerCommand::Play,
        ("pause", []) => PlayerCommand::Pause,
        ("toggle" | "space", []) => PlayerCommand::TogglePlay,
        ("seek", [secs]) => PlayerCommand::Seek(number(secs)?),
        ("seek", _) => return Err(CommandParseError::Usage("seek <seconds>")),
        ("vol" | "volume", [v]) => PlayerCommand::SetMasterVolume(number(v)? as f32),
        ("vol" | "volume", _) => return Err(CommandParseError::Usage("vol <0-1>")),
        ("mute", []) => PlayerCommand::ToggleMasterMute,
        ("mute", [id]) | ("track-mute", [id]) => PlayerCommand::ToggleTrackMute(TrackId::from(*id)),
        ("track-mute", _) => return Err(CommandParseError::Usage("track-mute <id>")),
        ("track-vol", [id, v]) => PlayerCommand::SetTrackVolume {
            id: TrackId::from(*id),
            volume: number(v)? as f32,
        },
        ("track-vol", _) => return Err(CommandParseError::Usage("track-vol <id> <0-1>")),
        ("solo", [id]) => PlayerCommand::ToggleTrackSolo(TrackId::from(*id)),
        ("solo", _) => return Err(CommandParseError::Usage("solo <id>")),
        ("pitch", [n]) => PlayerCommand::SetPitch(n.parse().map_err(|_| CommandParseError::NotANumber(n.to_string()))?),
        ("pitch", _) => return Err(CommandParseError::Usage("pitch <-12..12>")),
        ("rate" | "tempo", [r]) => PlayerCommand::SetPlaybackRate(number(r)?),
        ("rate" | "tempo", _) => return Err(CommandParseError::Usage("rate <0.5-2.0>")),
        ("reset", []) => PlayerCommand::Reset,
        ("status" | "st", []) => return Ok(Input::Status),
        ("help" | "?", _) => return Ok(Input::Help),
        ("quit" | "exit" | "q", _) => return Ok(Input::Quit),
        _ => return Err(CommandParseError::Unknown(line.trim().to_string())),
    };
    Ok(Input::Command(cmd))
}

fn number(s: &str) -> Result<f64, CommandParseError> {
    s.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| CommandParseError::NotANumber(s.to_string()))
}
