//! Text rendering of player events and snapshots

use stemdeck_core::engine::PlayerSnapshot;
use stemdeck_core::services::PlayerEvent;
use stemdeck_core::{format_time, ProgressNotice};

fn notice_line(notice: &ProgressNotice) -> String {
    if notice.is_failure() {
        format!("error: {}", notice.message)
    } else {
        format!("[{:>3.0}%] {}", notice.percentage, notice.message)
    }
}

/// One printable line per event; `None` for events too chatty to print
pub fn format_event(event: &PlayerEvent) -> Option<String> {
    let line = match event {
        PlayerEvent::SourceLoading { source } => format!("loading {}", source),
        PlayerEvent::Ready { duration } => format!("ready ({})", format_time(*duration)),
        PlayerEvent::TimeUpdate { .. } => return None,
        PlayerEvent::PlaybackChanged { playing } => (if *playing { "playing" } else { "paused" }).to_string(),
        PlayerEvent::Finished => "finished".to_string(),
        PlayerEvent::TransportFailed { message } => format!("playback error: {}", message),
        PlayerEvent::StemsLoaded { ids } => {
            let names: Vec<&str> = ids.iter().map(|id| id.as_str()).collect();
            format!("stems: {}", names.join(", "))
        }
        PlayerEvent::TrackFailed { id, message } => format!("stem {} failed: {}", id, message),
        PlayerEvent::ChordChanged { chord, .. } => match chord {
            Some(chord) => format!("chord {}", chord.chord),
            None => return None,
        },
        PlayerEvent::EffectProcessing => "processing pitch/tempo...".to_string(),
        PlayerEvent::EffectApplied {
            pitch_shift,
            playback_rate,
        } => format!("effect applied ({:+} st, {:.2}x)", pitch_shift, playback_rate),
        PlayerEvent::EffectReverted => "original pitch".to_string(),
        PlayerEvent::Progress(notice) => notice_line(notice),
        PlayerEvent::ProgressCleared => return None,
    };
    Some(line)
}

pub fn format_snapshot(snapshot: &PlayerSnapshot) -> String {
    let playback = &snapshot.playback;
    let mut out = format!(
        "{} {} / {}  master {:.0}%{}",
        if playback.is_playing { "▶" } else { "⏸" },
        format_time(playback.current_time),
        format_time(playback.duration),
        snapshot.master.volume * 100.0,
        if snapshot.master.muted { " (muted)" } else { "" },
    );

    let effect = &snapshot.effect;
    out.push_str(&format!(
        "\npitch {:+} st  rate {:.2}x{}",
        effect.pitch_shift_semitones,
        effect.playback_rate,
        if effect.processing { "  (processing)" } else { "" }
    ));

    if let Some(chord) = &snapshot.chord {
        out.push_str(&format!("\nchord {}", chord.chord));
    }

    for (channel, gain) in &snapshot.channels {
        let mut flags = String::new();
        if channel.muted {
            flags.push_str(" M");
        }
        if channel.solo {
            flags.push_str(" S");
        }
        out.push_str(&format!(
            "\n  {:<10} vol {:>3.0}%  out {:>3.0}%{}",
            channel.id.as_str(),
            channel.volume * 100.0,
            gain * 100.0,
            flags
        ));
    }

    if let Some(notice) = &snapshot.notice {
        out.push('\n');
        out.push_str(&notice_line(notice));
    }
    out
}
