//! Dino Arcade
//!
//! `dino-arcade serve` runs the store gateway. Without arguments, runs a
//! self-contained demo: a bot plays a live session while a spectator follows
//! it, then the session is replayed and checked against the live run.

use std::sync::Arc;

use anyhow::{bail, ensure, Context};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use dino_arcade::{
    config::AppConfig,
    driver::{LiveDriver, LivePhase, ReplayDriver, SessionTranscript, SpectatorDriver},
    network::GatewayServer,
    store::{spawn_store_writer, InMemoryStore, OwnerId, SessionStore},
    VERSION,
};

/// Frame after which the demo bot stops jumping, so the run ends.
const BOT_RETIRE_FRAME: u64 = 1800;

/// The spectator polls every this many live frames.
const POLL_EVERY_FRAMES: u64 = 10;

/// Hard stop for a runaway demo.
const MAX_DEMO_FRAMES: u64 = 100_000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set tracing subscriber")?;

    let config = AppConfig::load()?;

    info!("Dino Arcade v{}", VERSION);
    info!("Frame Rate: {} Hz", config.sim.frame_rate);

    match std::env::args().nth(1).as_deref() {
        Some("serve") => serve(config).await,
        _ => demo_session(config).await,
    }
}

/// Run the gateway until Ctrl-C.
async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let store = Arc::new(InMemoryStore::new());
    let server = Arc::new(GatewayServer::new(config.gateway, store));

    let runner = server.clone();
    let handle = tokio::spawn(async move { runner.run().await });

    tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;
    server.shutdown();
    handle.await??;

    Ok(())
}

/// Demo: live bot run, concurrent spectator, replay and transcript checks.
async fn demo_session(config: AppConfig) -> anyhow::Result<()> {
    info!("=== Starting Demo Session ===");

    let store = Arc::new(InMemoryStore::new());
    let (sink, writer) = spawn_store_writer(store.clone());

    let mut live = LiveDriver::new(config.sim.clone(), config.pacing.clone(), Some(OwnerId::new("demo")), sink);
    let session_id = live.session_id().to_string();
    info!("Session ID: {}", session_id);

    let mut spectator = SpectatorDriver::new(config.sim.clone(), session_id.clone());

    live.press_jump();
    let final_score = loop {
        if live.world().frame < BOT_RETIRE_FRAME && bot_wants_jump(&live) {
            live.press_jump();
        }

        if let LivePhase::Ended { final_score } = live.frame() {
            break final_score;
        }

        let frame = live.world().frame;
        if frame % POLL_EVERY_FRAMES == 0 {
            // Let the writer drain before the spectator reads
            tokio::task::yield_now().await;
            spectator.poll(store.as_ref()).await?;
        }
        spectator.frame();

        if frame % 600 == 0 {
            info!(
                "Frame {}: score {:.0}, speed {:.2}, spectator at idx {}",
                frame,
                live.score(),
                live.current_speed(),
                spectator.applied_idx()
            );
        }
        if frame >= MAX_DEMO_FRAMES {
            bail!("Demo did not end within {} frames", MAX_DEMO_FRAMES);
        }
    };

    let live_frames = live.world().frame;
    let live_trace = live.trace().to_vec();
    info!(
        "Live run ended after {} frames, {} events, final score {}",
        live_frames,
        live.events_recorded(),
        final_score
    );

    // Dropping the driver closes the sink; the writer drains and stops
    drop(live);
    let stats = writer.await.context("Store writer panicked")?;
    info!("Store writer: {} applied, {} failed", stats.applied, stats.failed);

    while !spectator.is_finished() {
        spectator.poll(store.as_ref()).await?;
        spectator.frame();
    }
    info!(
        "Spectator finished at idx {} with score {:?}",
        spectator.applied_idx(),
        spectator.final_score()
    );

    // Replay from the store
    let mut replay = ReplayDriver::load(store.as_ref(), config.sim.clone(), &session_id)
        .await?
        .context("Session missing from store")?;
    let replay_frames = replay.run_to_end();
    info!("Replay finished after {} frames", replay_frames);

    ensure!(
        replay.trace() == live_trace.as_slice(),
        "Replay diverged from the live run"
    );
    ensure!(replay.final_score() == Some(final_score), "Stored score mismatch");
    if let Some(last) = live_trace.last() {
        info!("Last event {} state hash: {}", last.idx, hex::encode(&last.state_hash[..8]));
    }
    info!("DETERMINISM VERIFIED: {} checkpoints match", live_trace.len());

    // Transcript
    let transcript = SessionTranscript::record(config.sim.clone(), replay.session().clone(), replay.events().to_vec());
    let json = transcript.to_json()?;
    SessionTranscript::from_json(&json)?.verify()?;
    info!("Transcript verified ({} bytes)", json.len());

    for (place, record) in store.top_scores().await?.iter().enumerate() {
        info!("#{} {} {:?}", place + 1, record.owner, record.final_score);
    }

    info!("=== Demo Complete ===");
    Ok(())
}

/// Jump when the next obstacle is at most eight frames away.
fn bot_wants_jump(live: &LiveDriver) -> bool {
    live.world().actor.is_grounded() && live.frames_to_next_obstacle().is_some_and(|f| f <= 8.0)
}
