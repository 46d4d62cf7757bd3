//! End-to-end: a live session written through the store writer replays and
//! spectates to the same states the live run produced.

use std::sync::Arc;

use dino_arcade::driver::{LiveDriver, LivePhase, ReplayDriver, SessionTranscript, SpectatorDriver, TracePoint};
use dino_arcade::store::{spawn_store_writer, InMemoryStore, OwnerId, SessionStatus, SessionStore};
use dino_arcade::{GameEvent, Pacing, SimConfig};

/// Bot jumps when the next obstacle is close, until `retire_frame`.
fn play_to_end(live: &mut LiveDriver, retire_frame: u64) -> u64 {
    live.press_jump();
    loop {
        let near = live.frames_to_next_obstacle().is_some_and(|f| f <= 8.0);
        if live.world().frame < retire_frame && live.world().actor.is_grounded() && near {
            live.press_jump();
        }
        if let LivePhase::Ended { final_score } = live.frame() {
            return final_score;
        }
        assert!(live.world().frame < 50_000, "bot session never ended");
    }
}

/// What the live run looked like, kept after the driver is dropped.
struct LiveRun {
    session_id: String,
    trace: Vec<TracePoint>,
    events_recorded: u64,
    final_score: u64,
}

/// Fixed session ids keep obstacle heights, and so every run, reproducible.
async fn record_session(session_id: &str, pacing: Pacing, retire_frame: u64) -> (Arc<InMemoryStore>, LiveRun) {
    let store = Arc::new(InMemoryStore::new());
    let (sink, writer) = spawn_store_writer(store.clone());
    let mut live = LiveDriver::new(SimConfig::default(), pacing, Some(OwnerId::new("rex")), sink)
        .with_session_id(session_id);

    let final_score = play_to_end(&mut live, retire_frame);
    let run = LiveRun {
        session_id: live.session_id().to_string(),
        trace: live.trace().to_vec(),
        events_recorded: live.events_recorded(),
        final_score,
    };

    // Dropping the driver drops its sink; the writer drains and exits
    drop(live);
    let stats = writer.await.unwrap();
    assert_eq!(stats.failed, 0);

    (store, run)
}

#[tokio::test]
async fn replay_reproduces_live_positions() {
    let (store, live) = record_session("fidelity-positions", Pacing::default(), 900).await;

    let record = store.get_session(&live.session_id).await.unwrap().unwrap();
    assert_eq!(record.status, SessionStatus::Done);
    assert_eq!(record.final_score, Some(live.final_score));

    let mut replay = ReplayDriver::load(store.as_ref(), SimConfig::default(), &live.session_id)
        .await
        .unwrap()
        .unwrap();
    replay.run_to_end();

    assert!(live.trace.len() > 10);
    assert_eq!(replay.trace(), live.trace.as_slice());
    assert_eq!(replay.final_score(), Some(live.final_score));
}

#[tokio::test]
async fn stage_pacing_replays_exactly() {
    let pacing = Pacing::Stages { stage_ms: 2_000.0, speeds: vec![3.0, 3.5, 4.0], gap: 450.0 };
    let (store, live) = record_session("fidelity-stages", pacing, 600).await;

    let record = store.get_session(&live.session_id).await.unwrap().unwrap();
    assert!(record.stage.is_some());

    let mut replay = ReplayDriver::load(store.as_ref(), SimConfig::default(), &live.session_id)
        .await
        .unwrap()
        .unwrap();
    replay.run_to_end();
    assert_eq!(replay.trace(), live.trace.as_slice());
}

#[tokio::test]
async fn log_survives_json_and_verifies() {
    let (store, live) = record_session("fidelity-transcript", Pacing::default(), 300).await;

    let events = store.list_events_since(&live.session_id, 0, 10_000).await.unwrap();
    let json = serde_json::to_string(&events).unwrap();
    let decoded: Vec<GameEvent> = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, events);

    let record = store.get_session(&live.session_id).await.unwrap().unwrap();
    let transcript = SessionTranscript::record(SimConfig::default(), record, decoded);
    assert_eq!(transcript.final_score(), Some(live.final_score));
    transcript.verify().unwrap();

    let checkpoint_hashes: Vec<_> = transcript.checkpoints.iter().map(|c| c.state_hash).collect();
    let live_hashes: Vec<_> = live.trace.iter().map(|p| p.state_hash).collect();
    assert_eq!(checkpoint_hashes, live_hashes);
}

#[tokio::test]
async fn spectator_catches_up_and_stops() {
    let (store, live) = record_session("fidelity-spectator", Pacing::default(), 600).await;

    let mut spectator = SpectatorDriver::new(SimConfig::default(), &live.session_id);
    let mut polls = 0;
    while !spectator.is_finished() {
        spectator.poll(store.as_ref()).await.unwrap();
        spectator.frame();
        polls += 1;
        assert!(polls < 1_000, "spectator never finished");
    }

    assert_eq!(spectator.final_score(), Some(live.final_score));
    assert_eq!(spectator.applied_idx(), live.events_recorded);
    assert_eq!(spectator.trace().len(), live.trace.len());
}

/// Logs that cross JSON (gateway transport, transcripts) must replay to the
/// same bits as the live run.
#[tokio::test]
async fn json_transport_replays_bit_exact() {
    for i in 0..8 {
        let session_id = format!("fidelity-json-{}", i);
        let (store, live) = record_session(&session_id, Pacing::default(), 900).await;

        let record = store.get_session(&session_id).await.unwrap().unwrap();
        let events = store.list_events_since(&session_id, 0, 10_000).await.unwrap();
        let wire = serde_json::to_string(&events).unwrap();
        let decoded: Vec<GameEvent> = serde_json::from_str(&wire).unwrap();

        let mut replay = ReplayDriver::new(SimConfig::default(), record.clone(), decoded.clone());
        replay.run_to_end();
        assert_eq!(replay.trace(), live.trace.as_slice(), "replay of {} diverged", session_id);

        let json = SessionTranscript::record(SimConfig::default(), record, decoded).to_json().unwrap();
        let transcript = SessionTranscript::from_json(&json).unwrap();
        assert!(transcript.verify().is_ok(), "transcript of {} failed to verify", session_id);

        let live_hashes: Vec<_> = live.trace.iter().map(|p| p.state_hash).collect();
        let checkpoint_hashes: Vec<_> = transcript.checkpoints.iter().map(|c| c.state_hash).collect();
        assert_eq!(checkpoint_hashes, live_hashes);
    }
}

#[tokio::test]
async fn recorded_physics_survive_a_different_frame_rate() {
    let (store, live) = record_session("fidelity-frame-rate", Pacing::default(), 600).await;

    let other = SimConfig { frame_rate: 144, ..Default::default() };
    let mut replay = ReplayDriver::load(store.as_ref(), other, &live.session_id).await.unwrap().unwrap();
    replay.run_to_end();

    assert_eq!(replay.trace(), live.trace.as_slice());
}
