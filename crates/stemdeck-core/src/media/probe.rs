//! Duration probing via symphonia
//!
//! Only container metadata and packet headers are read; no PCM is decoded.

use std::fs::File;
use std::io::Cursor;
use std::path::Path;

use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::error::{MediaError, MediaResult};

/// Duration in seconds of an audio file on disk
pub fn probe_file(path: &Path) -> MediaResult<f64> {
    let file = File::open(path).map_err(|e| MediaError::Read {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let ext = path.extension().and_then(|e| e.to_str());
    probe_duration(Box::new(file), ext)
}

/// Duration in seconds of an in-memory audio resource
pub fn probe_bytes(bytes: Vec<u8>, extension: Option<&str>) -> MediaResult<f64> {
    probe_duration(Box::new(Cursor::new(bytes)), extension)
}

fn probe_duration(source: Box<dyn MediaSource>, extension: Option<&str>) -> MediaResult<f64> {
    let mss = MediaSourceStream::new(source, Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| MediaError::UnsupportedFormat(e.to_string()))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| MediaError::UnsupportedFormat("No audio track found".to_string()))?;

    let track_id = track.id;
    let params = track.codec_params.clone();

    let sample_rate = params
        .sample_rate
        .ok_or_else(|| MediaError::UnsupportedFormat("Unknown sample rate".to_string()))?;

    if let Some(frames) = params.n_frames {
        return Ok(frames as f64 / sample_rate as f64);
    }

    // No frame count in the header (e.g. raw MP3): sum packet durations
    let mut ticks: u64 = 0;
    loop {
        match format.next_packet() {
            Ok(packet) if packet.track_id() == track_id => ticks += packet.dur,
            Ok(_) => {}
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(MediaError::UnsupportedFormat(e.to_string())),
        }
    }

    let seconds = match params.time_base {
        Some(tb) => {
            let time = tb.calc_time(ticks);
            time.seconds as f64 + time.frac
        }
        None => ticks as f64 / sample_rate as f64,
    };

    if seconds <= 0.0 {
        return Err(MediaError::UnsupportedFormat("Empty audio stream".to_string()));
    }
    Ok(seconds)
}
