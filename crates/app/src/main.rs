use std::path::PathBuf;

use clap::{Parser, Subcommand};
use songviz_core::{
    parse_song_list, AppConfig, SimulatedFactory, Song, VisualizerEngine, VizError,
};
use tracing_subscriber::EnvFilter;

fn main() -> songviz_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Effects => run_effects(),
        Commands::Play {
            songs,
            effect,
            duration,
        } => run_play(&songs, effect.as_deref(), duration),
        Commands::Export {
            songs,
            index,
            output,
        } => run_export(&songs, index, &output),
    }
}

fn run_effects() -> songviz_core::Result<()> {
    let engine = VisualizerEngine::new(AppConfig::default(), Vec::new(), simulated_factory(&[]));
    for descriptor in engine.registry().descriptors() {
        println!(
            "{:<18} background-image={:<5} lyric-words={}",
            descriptor.name, descriptor.draws_background_image, descriptor.draws_lyric_words
        );
    }
    Ok(())
}

fn run_play(
    songs_path: &PathBuf,
    effect: Option<&str>,
    duration: Option<f32>,
) -> songviz_core::Result<()> {
    let songs = load_songs(songs_path)?;
    let config = AppConfig::default();
    let fps = config.capture.fps.max(1);
    let factory = simulated_factory(&songs);
    let mut engine = VisualizerEngine::new(config, songs, factory);

    if let Some(name) = effect {
        engine.select_effect(name)?;
    }
    engine.select_song(0)?;
    tracing::info!(effect = ?engine.registry().active_name(), "starting playback session");

    let dt = 1.0 / fps as f32;
    let limit = duration.unwrap_or(f32::MAX);
    let mut elapsed = 0.0;
    let mut shown = String::new();
    while elapsed < limit {
        engine.tick(dt);
        elapsed += dt;

        let line: Vec<&str> = engine
            .current_line()
            .words
            .iter()
            .filter(|word| word.opacity > 0.5)
            .map(|word| word.text.as_str())
            .collect();
        let line = line.join(" ");
        if line != shown && !line.is_empty() {
            tracing::info!(position = engine.status().position, "{line}");
            shown = line;
        }

        let status = engine.status();
        if status.is_ended {
            tracing::info!("track finished");
            break;
        }
        if let Some(error) = status.error {
            tracing::warn!(%error, "playback error");
            break;
        }
    }
    Ok(())
}

fn run_export(songs_path: &PathBuf, index: usize, output: &PathBuf) -> songviz_core::Result<()> {
    let songs = load_songs(songs_path)?;
    let factory = simulated_factory(&songs);
    let mut engine = VisualizerEngine::new(AppConfig::default(), songs, factory);

    tracing::info!(index, ?output, "running headless export");
    let capture = engine.export_headless(index)?;
    std::fs::write(output, &capture.bytes)?;
    tracing::info!(
        frames = capture.frame_count,
        bytes = capture.bytes.len(),
        "export written"
    );
    Ok(())
}

fn load_songs(path: &PathBuf) -> songviz_core::Result<Vec<Song>> {
    let json = std::fs::read_to_string(path)?;
    let songs = parse_song_list(&json)?;
    if songs.is_empty() {
        return Err(VizError::InvalidInput("song list is empty"));
    }
    Ok(songs)
}

/// The CLI drives the deterministic simulated sources; a real application
/// supplies a decoder-backed [`songviz_core::SourceFactory`] instead.
fn simulated_factory(songs: &[Song]) -> Box<SimulatedFactory> {
    let config = AppConfig::default();
    let mut factory = SimulatedFactory::new(config.audio.sample_rate);
    for song in songs {
        factory.set_duration(&song.audio_source, song.duration_seconds);
    }
    Box::new(factory)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Audio-synchronised lyric visualiser", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the available visual effects in catalog order.
    Effects,
    /// Run a simulated playback session, logging the active lyric lines.
    Play {
        /// Path to a JSON file with the song list.
        songs: PathBuf,
        /// Effect to select instead of the catalog default.
        #[arg(short, long)]
        effect: Option<String>,
        /// Stop after this many seconds instead of playing to the end.
        #[arg(short, long)]
        duration: Option<f32>,
    },
    /// Record a song to a capture blob without user interaction.
    Export {
        /// Path to a JSON file with the song list.
        songs: PathBuf,
        /// Index of the song to export.
        #[arg(short, long, default_value_t = 0)]
        index: usize,
        /// Output path for the capture blob.
        #[arg(short, long)]
        output: PathBuf,
    },
}
