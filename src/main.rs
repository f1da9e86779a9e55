use anyhow::{bail, Context, Result};
use clap::Parser;
use retrowave_lib::audio::{list_sources, AudioConfig, CpalBackend, SourceKind, SourceRequest};
use retrowave_lib::cli::Cli;
use retrowave_lib::config::{self, Config};
use retrowave_lib::quality::QualityMode;
use retrowave_lib::state::Session;
use retrowave_lib::viz::{DrawList, RendererId};
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;

/// Interval between HUD lines in the log
const HUD_LOG_INTERVAL: Duration = Duration::from_secs(5);

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    if cli.list_modes {
        for id in RendererId::ALL {
            println!("{id}");
        }
        return Ok(());
    }
    if cli.list_sources {
        for source in list_sources().context("Failed to enumerate audio devices")? {
            println!("{:<40} {}", source.id, source.name);
        }
        return Ok(());
    }

    // Load config: explicit --config path, or auto-detect retrowave.toml / user config
    let config_path = cli.config.clone().or_else(config::discover_config);
    let mut cfg = Config::default();
    if let Some(ref path) = config_path {
        cfg = config::load_config(path)?;
        log::info!("Loaded config from {}", path.display());
        // Merge: config values apply only when CLI is at its default
        if cli.mode == "neonTunnel" { cli.mode = cfg.visual.mode.clone(); }
        if cli.quality == QualityMode::Auto { cli.quality = cfg.quality.mode; }
        if cli.sensitivity == 1.0 { cli.sensitivity = cfg.visual.sensitivity; }
        if cli.intensity == 1.0 { cli.intensity = cfg.visual.intensity; }
        if cli.smoothing == 0.75 { cli.smoothing = cfg.audio.smoothing; }
        if cli.volume == 1.0 { cli.volume = cfg.audio.volume; }
        if cli.fps == 60 { cli.fps = cfg.quality.fps; }
        if cli.pixel_ratio == 1.0 { cli.pixel_ratio = cfg.quality.native_pixel_ratio; }
        cli.overlay |= cfg.visual.overlay_grid;
    }

    let request = source_request(&cli, &cfg)?;
    let audio = AudioConfig {
        smoothing: cli.smoothing,
        volume: cli.volume,
        ..cfg.audio.clone()
    };

    let seed = rand::random::<u64>();
    let mut session = Session::new(audio, Box::new(CpalBackend::new()), cli.pixel_ratio, seed);
    session.set_palette(cfg.visual.palette());
    session.set_mode_name(&cli.mode);
    session.set_sensitivity(cli.sensitivity);
    session.set_intensity(cli.intensity);
    session.set_overlay(cli.overlay);
    session.set_monitoring(cli.monitor);
    if cli.quality != QualityMode::Auto {
        session.set_quality_mode(cli.quality);
    }

    let file_source = match request {
        Some(request) => {
            let describe = request.describe();
            let kind = request.kind();
            session
                .activate_source(request)
                .with_context(|| format!("Failed to start {describe}"))?;
            kind == SourceKind::FileTrack
        }
        None => {
            log::warn!("No source selected, rendering silence (try --file, --mic, --display or --stream)");
            false
        }
    };

    if cli.game {
        session.set_game_active(true);
    }

    let mut surface = DrawList::new(cli.width as f32, cli.height as f32);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build runtime")?;
    let frames = runtime.block_on(run_frames(
        &mut session,
        &mut surface,
        cli.fps,
        cli.duration,
        file_source,
    ));

    let report = session.report();
    log::info!("Rendered {frames} frames, {} beats", report.beats);
    if let Some(scoreboard) = report.scoreboard {
        log::info!(
            "Score {} | max combo {} | hits {} | misses {}",
            scoreboard.score,
            scoreboard.max_combo,
            scoreboard.hits,
            scoreboard.misses
        );
    }
    if let Some(path) = &cli.stats_json {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!("Wrote report to {}", path.display());
    }

    session.graph_mut().stop();
    Ok(())
}

fn source_request(cli: &Cli, cfg: &Config) -> Result<Option<SourceRequest>> {
    if let Some(path) = &cli.file {
        return Ok(Some(SourceRequest::FileTrack { path: path.clone() }));
    }
    if let Some(device) = &cli.mic {
        let device_id = (!device.is_empty()).then(|| device.clone());
        return Ok(Some(SourceRequest::Microphone { device_id }));
    }
    if cli.display {
        return Ok(Some(SourceRequest::DisplayCapture));
    }
    if let Some(url) = &cli.stream {
        return Ok(Some(SourceRequest::LiveStream { url: url.clone() }));
    }
    if let Some(index) = cli.station {
        let Some(station) = index.checked_sub(1).and_then(|i| cfg.stations.get(i)) else {
            bail!("Station {index} not found ({} configured)", cfg.stations.len());
        };
        log::info!("Tuning in to {}", station.name);
        return Ok(Some(SourceRequest::LiveStream {
            url: station.url.clone(),
        }));
    }
    Ok(None)
}

/// Frame loop: draws at `fps` until ctrl-c, the duration elapses or a file
/// finishes playing
async fn run_frames(
    session: &mut Session,
    surface: &mut DrawList,
    fps: u32,
    duration: Option<f64>,
    stop_when_file_ends: bool,
) -> u64 {
    let mut interval = tokio::time::interval(Duration::from_secs_f64(1.0 / fps.max(1) as f64));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let deadline = duration.map(|secs| Instant::now() + Duration::from_secs_f64(secs.max(0.0)));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut frames = 0u64;
    let mut last_hud = Instant::now();
    log::info!("Render loop started at {fps} fps");

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                log::info!("Render loop received shutdown signal");
                break;
            }
            _ = interval.tick() => {
                surface.clear();
                let report = session.frame_now(surface);
                frames += 1;

                if report.beat {
                    log::debug!("Beat at {:.0} ms", report.timestamp_ms);
                }
                if report.game.missed > 0 {
                    log::debug!("Missed {} target(s)", report.game.missed);
                }
                if last_hud.elapsed() >= HUD_LOG_INTERVAL {
                    log::info!("{}", session.hud());
                    last_hud = Instant::now();
                }

                if deadline.is_some_and(|d| Instant::now() >= d) {
                    log::info!("Duration reached");
                    break;
                }
                if stop_when_file_ends && !session.graph().is_playing() {
                    log::info!("Playback finished");
                    break;
                }
            }
        }
    }

    frames
}
