//! SCC Replay CLI - Load, inspect and follow recordings.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use scc_replay::{
    recording::{
        EntityList, GridVolume, PlaybackSample, ProgressSink, RecordingStore, SceneSink,
        timeline::format_seconds,
    },
    schema::ReplayConfig,
};

/// Prints load progress to stderr in 10% steps.
struct TerminalProgress {
    last_step: Option<u32>,
}

impl ProgressSink for TerminalProgress {
    fn set_title(&mut self, title: &str) {
        eprintln!("{title}");
        self.last_step = None;
    }

    fn set_progress(&mut self, fraction: f32) {
        if fraction >= 1.0 {
            eprintln!("  done");
            return;
        }
        let step = (fraction.clamp(0.0, 1.0) * 10.0) as u32;
        if self.last_step != Some(step) {
            eprint!("  {}%\r", step * 10);
            let _ = std::io::stderr().flush();
            self.last_step = Some(step);
        }
    }
}

/// Logs what a renderer would be asked to draw.
#[derive(Default)]
struct LogScene {
    frame: Option<usize>,
}

impl SceneSink for LogScene {
    fn volume_ready(&mut self, entity_id: &str, volume: &GridVolume) {
        log::info!(
            "Volume {entity_id}: {} blocks, {} faces, centre of mass {}",
            volume.mesh.block_count,
            volume.mesh.mesh.quad_count(),
            volume.mesh.center_of_mass
        );
    }

    fn show_sample(&mut self, sample: &PlaybackSample) {
        if self.frame != Some(sample.frame_index) {
            log::info!(
                "Frame {} ({} entities)",
                sample.frame_index,
                sample.poses.len()
            );
            self.frame = Some(sample.frame_index);
        }
    }
}

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <recording.scc> [--follow] [--config <config.json>]", args[0]);
        eprintln!();
        eprintln!("Load an SCC recording and print a summary.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  recording.scc  Path to the recording");
        eprintln!("  --follow       Keep playing back and tailing the file as it grows");
        eprintln!("  --config       Path to a replay configuration file");
        eprintln!();
        eprintln!("Example configuration is generated with --example flag.");
        std::process::exit(1);
    }

    if args[1] == "--example" {
        print_example_config();
        return;
    }

    let recording_path = PathBuf::from(&args[1]);
    let follow = args.iter().skip(2).any(|a| a == "--follow");
    let config_path = args
        .iter()
        .position(|a| a == "--config")
        .map(|i| match args.get(i + 1) {
            Some(path) => PathBuf::from(path),
            None => {
                eprintln!("--config requires a path");
                std::process::exit(1);
            }
        });

    // Load configuration
    let config = match config_path {
        Some(path) => {
            let config_str = fs::read_to_string(&path).unwrap_or_else(|e| {
                eprintln!("Error reading config file: {}", e);
                std::process::exit(1);
            });
            serde_json::from_str::<ReplayConfig>(&config_str).unwrap_or_else(|e| {
                eprintln!("Error parsing config: {}", e);
                std::process::exit(1);
            })
        }
        None => ReplayConfig::default(),
    };
    if let Err(e) = config.validate() {
        eprintln!("Invalid config: {}", e);
        std::process::exit(1);
    }

    let start = Instant::now();
    let mut progress = TerminalProgress { last_step: None };
    let mut store = RecordingStore::load(&recording_path, config, &mut progress).unwrap_or_else(|e| {
        eprintln!("Error loading recording: {}", e);
        std::process::exit(1);
    });
    let elapsed = start.elapsed();

    print_summary(&store);
    println!("Load time: {:.2}s", elapsed.as_secs_f32());

    if !follow {
        return;
    }

    println!();
    println!("Following {} (Ctrl-C to stop)...", recording_path.display());

    let interval = Duration::from_secs_f32(store.config().poll_interval_secs);
    let mut scene = LogScene::default();
    let mut entities = EntityList::new(&store.config().hidden_name_prefix);
    store.take_diagnostics();
    store.playback_mut().set_playing(true);

    let mut last_tick = Instant::now();
    loop {
        thread::sleep(interval);
        let now = Instant::now();
        let delta = now.duration_since(last_tick).as_secs_f64();
        last_tick = now;

        let frames_before = store.frame_count();
        if let Err(e) = store.tick(delta, &mut scene, &mut entities) {
            log::error!("Tick failed: {}", e);
            continue;
        }
        for diagnostic in store.take_diagnostics() {
            eprintln!("  {}", diagnostic);
        }
        if store.frame_count() != frames_before {
            println!(
                "  {} frames, {} visible entities, {}",
                store.frame_count(),
                entities.visible().count(),
                store.playback().time_label(store.frame_count())
            );
        }
    }
}

fn print_summary(store: &RecordingStore) {
    let entities: HashSet<&str> = store
        .frames()
        .iter()
        .flat_map(|f| f.iter().map(|s| s.entity_id.as_str()))
        .collect();
    let faces: usize = store
        .scene()
        .volumes()
        .map(|(_, v)| v.mesh.mesh.quad_count())
        .sum();

    println!("SCC Recording");
    println!("=============");
    println!("File: {}", store.path().display());
    println!("Frames: {}", store.frame_count());
    println!("Duration: {}", format_seconds(store.frame_count() as u64));
    println!("Entities: {}", entities.len());
    println!("Volumes: {}", store.scene().volume_count());
    println!("Faces: {}", faces);
    println!("Row errors: {}", store.diagnostics().len());
    for diagnostic in store.diagnostics().iter().take(10) {
        println!("  {}", diagnostic);
    }
    if store.diagnostics().len() > 10 {
        println!("  ...");
    }
}

fn print_example_config() {
    let config = ReplayConfig::default();

    println!("Example configuration (config.json):");
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing config: {}", e),
    }
}
