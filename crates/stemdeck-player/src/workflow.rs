//! Service workflows driving the player
//!
//! Each workflow talks to the analysis service and feeds the results to the
//! player as commands. Progress is forwarded as notices; failures end up as a
//! single failure notice.

use std::path::Path;

use tokio::sync::mpsc::UnboundedSender;

use stemdeck_client::{visual_stem, AnalysisClient, ClientResult, QualityMode, StemInfo, StemsMode};
use stemdeck_core::engine::{EffectSource, PlayerCommand};
use stemdeck_core::{AudioSource, ProgressNotice, Track};

/// Step reported once a stored analysis has been loaded
pub const HISTORY_LOADED_STEP: i32 = 7;

type Commands = UnboundedSender<PlayerCommand>;

fn send(commands: &Commands, cmd: PlayerCommand) {
    if commands.send(cmd).is_err() {
        log::warn!("[WORKFLOW] Player stopped; dropping command");
    }
}

fn notify_failure(commands: &Commands, context: &str, err: impl std::fmt::Display) {
    log::warn!("[WORKFLOW] {} failed: {}", context, err);
    send(commands, PlayerCommand::Notify(ProgressNotice::failure(format!("{} failed: {}", context, err))));
}

/// Tracks for a separated stem set, sources resolved against the service
pub fn stems_to_tracks(client: &AnalysisClient, stems: &[StemInfo]) -> Vec<Track> {
    stems
        .iter()
        .map(|s| Track::new(s.name.as_str(), AudioSource::Url(client.resolve_url(&s.url))))
        .collect()
}

/// Upload name for a remote stem when it is re-rendered
fn stem_filename(stem: &StemInfo) -> String {
    stem.path
        .as_deref()
        .and_then(|p| p.rsplit(['/', '\\']).next())
        .filter(|name| name.contains('.'))
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}.wav", stem.name))
}

/// Master source plus render source for a local file
pub fn load_file(commands: &Commands, path: &Path) {
    send(
        commands,
        PlayerCommand::LoadSource {
            source: AudioSource::File(path.to_path_buf()),
            effect_source: Some(EffectSource::Upload(path.to_path_buf())),
        },
    );
}

/// Separate `path` into stems and hand them to the player
///
/// Chords delivered with the job result replace the timeline.
pub async fn separate(
    client: &AnalysisClient,
    commands: &Commands,
    path: &Path,
    stems: StemsMode,
    quality: QualityMode,
) -> ClientResult<usize> {
    let result = async {
        let job = client.separate(path, stems, quality).await?;
        log::info!("[WORKFLOW] Separation task {}", job.task_id);
        client
            .wait_for_task(&job.task_id, |progress| {
                send(commands, PlayerCommand::Notify(progress.to_notice()));
            })
            .await
    }
    .await;

    let done = match result {
        Ok(done) => done,
        Err(e) => {
            notify_failure(commands, "Separation", &e);
            return Err(e);
        }
    };

    let stems = stemdeck_client::dedupe_stems(done.stems.unwrap_or_default());
    let count = stems.len();
    send(commands, PlayerCommand::LoadStems(stems_to_tracks(client, &stems)));
    if let Some(chords) = done.chords.filter(|c| !c.is_empty()) {
        send(commands, PlayerCommand::SetChords(chords));
    }
    Ok(count)
}

/// Detect chords for `path` and replace the timeline
pub async fn detect_chords(client: &AnalysisClient, commands: &Commands, path: &Path) -> ClientResult<usize> {
    send(commands, PlayerCommand::Notify(ProgressNotice::new(1, "Detecting chords", 0.0)));
    match client.detect_chords(path).await {
        Ok(resp) => {
            let count = resp.chords.len();
            send(commands, PlayerCommand::SetChords(resp.chords));
            send(
                commands,
                PlayerCommand::Notify(ProgressNotice::new(2, format!("{} chords detected", count), 100.0)),
            );
            Ok(count)
        }
        Err(e) => {
            notify_failure(commands, "Chord detection", &e);
            Err(e)
        }
    }
}

/// Load a stored analysis: visual stem as master, every stem as a track
pub async fn load_history(client: &AnalysisClient, commands: &Commands, filename: &str) -> ClientResult<usize> {
    let record = match client.analysis(filename).await {
        Ok(record) => record,
        Err(e) => {
            notify_failure(commands, "Loading analysis", &e);
            return Err(e);
        }
    };

    let Some(visual) = visual_stem(&record.stems) else {
        send(
            commands,
            PlayerCommand::Notify(ProgressNotice::failure(format!("{} has no stems", filename))),
        );
        send(commands, PlayerCommand::SetChords(record.chords));
        return Ok(0);
    };

    send(
        commands,
        PlayerCommand::LoadSource {
            source: AudioSource::Url(client.resolve_url(&visual.url)),
            effect_source: Some(EffectSource::Remote {
                url: visual.url.clone(),
                filename: stem_filename(visual),
            }),
        },
    );
    send(commands, PlayerCommand::LoadStems(stems_to_tracks(client, &record.stems)));
    send(commands, PlayerCommand::SetChords(record.chords));
    send(
        commands,
        PlayerCommand::Notify(ProgressNotice::new(HISTORY_LOADED_STEP, format!("Loaded {}", filename), 100.0)),
    );
    Ok(record.stems.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stemdeck_client::ServiceConfig;
    use tokio::sync::mpsc;

    fn client() -> AnalysisClient {
        AnalysisClient::new(ServiceConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            ..ServiceConfig::default()
        })
        .unwrap()
    }

    fn stem(name: &str, path: Option<&str>) -> StemInfo {
        StemInfo {
            name: name.to_string(),
            path: path.map(str::to_string),
            url: format!("/api/download/htdemucs/song/{}", name),
        }
    }

    #[test]
    fn test_stems_become_tracks_with_absolute_urls() {
        let tracks = stems_to_tracks(&client(), &[stem("vocals", None), stem("drums", None)]);
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].id.as_str(), "vocals");
        assert_eq!(
            tracks[1].source,
            AudioSource::Url("http://127.0.0.1:9/api/download/htdemucs/song/drums".into())
        );
        assert_eq!(tracks[1].volume, 1.0);
    }

    #[test]
    fn test_stem_filename() {
        assert_eq!(stem_filename(&stem("other", Some("separated/htdemucs/song/other.mp3"))), "other.mp3");
        assert_eq!(stem_filename(&stem("bass", None)), "bass.wav");
    }

    #[test]
    fn test_load_file_sets_upload_source() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        load_file(&tx, Path::new("/music/song.flac"));
        match rx.try_recv().unwrap() {
            PlayerCommand::LoadSource { source, effect_source } => {
                assert_eq!(source, AudioSource::File("/music/song.flac".into()));
                assert_eq!(effect_source, Some(EffectSource::Upload("/music/song.flac".into())));
            }
            _ => panic!("expected LoadSource"),
        }
    }

    #[tokio::test]
    async fn test_separation_failure_posts_failure_notice() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let result = separate(
            &client(),
            &tx,
            Path::new("/nonexistent/song.mp3"),
            StemsMode::Four,
            QualityMode::Basic,
        )
        .await;
        assert!(result.is_err());
        match rx.try_recv().unwrap() {
            PlayerCommand::Notify(notice) => assert!(notice.is_failure()),
            _ => panic!("expected failure notice"),
        }
        assert!(rx.try_recv().is_err());
    }
}
