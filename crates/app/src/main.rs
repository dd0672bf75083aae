use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use beat_collage_core::{
    calculate_lines, parse_triggers, AppConfig, AssetStore, AudioEngine, CollageError,
    FixedAdvanceMetrics, FontSpec, FrameInput, PlaybackClock, Session, TextConfig,
    TriggerSourceKind, VideoFrame,
};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

fn main() -> beat_collage_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            manifest,
            output,
            fps,
            duration,
        } => run_render(&manifest, output.as_deref(), fps, duration),
        Commands::Triggers { midi } => run_triggers(&midi),
        Commands::Lines {
            text,
            width,
            font_size,
            padding,
        } => run_lines(&text, width, font_size, padding),
    }
}

/// Everything `render` needs to drive a run. Relative paths resolve against
/// the manifest's directory.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SessionManifest {
    config: AppConfig,
    midi: Option<PathBuf>,
    taps: Option<PathBuf>,
    text: Option<PathBuf>,
    images: Vec<ImageEntry>,
    video: Option<VideoEntry>,
    /// Mono 32-bit little-endian float samples at `config.audio.sample_rate`.
    pcm: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct ImageEntry {
    path: PathBuf,
    width: u32,
    height: u32,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct VideoEntry {
    width: u32,
    height: u32,
}

fn run_render(
    manifest_path: &Path,
    output: Option<&Path>,
    fps: u32,
    duration: Option<f64>,
) -> beat_collage_core::Result<()> {
    if fps == 0 {
        return Err(CollageError::InvalidInput("fps must be non-zero"));
    }
    let raw = std::fs::read_to_string(manifest_path)
        .map_err(|err| CollageError::asset_load(manifest_path.display().to_string(), err))?;
    let manifest: SessionManifest = serde_json::from_str(&raw)?;
    let base = manifest_path.parent().unwrap_or_else(|| Path::new("."));

    let assets = load_assets(&manifest, base)?;
    let pcm = match &manifest.pcm {
        Some(path) => Some(read_pcm(&base.join(path))?),
        None => None,
    };
    let sample_rate = manifest.config.audio.sample_rate;
    let duration = duration
        .or_else(|| {
            pcm.as_ref()
                .map(|samples| samples.len() as f64 / f64::from(sample_rate))
        })
        .unwrap_or(10.0);
    let total_frames = (duration * f64::from(fps)).ceil() as u64;

    tracing::info!(
        manifest = %manifest_path.display(),
        fps,
        duration,
        total_frames,
        "rendering session"
    );

    let audio_mode = manifest.config.trigger_source == TriggerSourceKind::Audio;
    let audio = AudioEngine::new(&manifest.config.audio)?;
    let analysis = audio.start()?;
    let video = manifest.video.map(|video| VideoFrame {
        width: video.width,
        height: video.height,
        playing: true,
    });

    let mut session = Session::start(manifest.config, &assets, FixedAdvanceMetrics::default())?;
    let mut clock = PlaybackClock::default();
    let mut out = open_output(output)?;
    let samples_per_frame = (sample_rate / fps).max(1) as usize;
    let mut fed = 0usize;
    let mut triggers = 0usize;

    for index in 0..total_frames {
        clock.seek(index as f64 / f64::from(fps));

        let mut spectrum = Vec::new();
        if audio_mode {
            if let Some(samples) = &pcm {
                let end = (fed + samples_per_frame).min(samples.len());
                audio.push_samples(&samples[fed..end])?;
                fed = end;
                spectrum = analysis.spectrum()?;
            }
        }

        let input = FrameInput {
            playback_time: clock.time_seconds,
            now_ms: clock.time_seconds * 1000.0,
            spectrum: audio_mode.then_some(spectrum.as_slice()),
            video,
        };
        let Some(frame) = session.tick(&input) else {
            break;
        };
        triggers += frame.triggers_fired;
        serde_json::to_writer(&mut out, &frame)?;
        writeln!(out)?;

        if pcm.as_ref().is_some_and(|samples| fed >= samples.len()) {
            tracing::debug!(frame = index, "audio exhausted");
            break;
        }
    }

    if let Some(frame) = session.on_audio_end() {
        serde_json::to_writer(&mut out, &frame)?;
        writeln!(out)?;
    }
    out.flush()?;

    tracing::info!(
        frames = session.frames_rendered(),
        triggers,
        "render complete"
    );
    Ok(())
}

fn load_assets(manifest: &SessionManifest, base: &Path) -> beat_collage_core::Result<AssetStore> {
    let mut assets = AssetStore::new();
    for image in &manifest.images {
        assets.register_image_file(base.join(&image.path), image.width, image.height)?;
    }
    if let Some(text) = &manifest.text {
        assets.load_text(base.join(text))?;
    }
    if let Some(midi) = &manifest.midi {
        assets.load_midi(base.join(midi))?;
    }
    if let Some(taps) = &manifest.taps {
        assets.load_taps(base.join(taps))?;
    }

    tracing::info!(
        images = assets.images().len(),
        words = assets.words().len(),
        taps = assets.taps().len(),
        "assets loaded"
    );
    Ok(assets)
}

fn read_pcm(path: &Path) -> beat_collage_core::Result<Vec<f32>> {
    let bytes = std::fs::read(path)
        .map_err(|err| CollageError::asset_load(path.display().to_string(), err))?;
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

fn open_output(output: Option<&Path>) -> beat_collage_core::Result<Box<dyn Write>> {
    Ok(match output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    })
}

fn run_triggers(midi: &Path) -> beat_collage_core::Result<()> {
    let bytes = std::fs::read(midi)
        .map_err(|err| CollageError::asset_load(midi.display().to_string(), err))?;
    let events = parse_triggers(&bytes)?;
    tracing::info!(path = %midi.display(), events = events.len(), "parsed MIDI file");

    let mut out = io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, &events)?;
    writeln!(out)?;
    Ok(())
}

fn run_lines(
    text: &Path,
    width: u32,
    font_size: f32,
    padding: f32,
) -> beat_collage_core::Result<()> {
    let mut assets = AssetStore::new();
    assets.load_text(text)?;

    let text_config = TextConfig {
        font_size,
        padding,
        ..TextConfig::default()
    };
    let font = FontSpec::from_config(&text_config);
    let max_width = beat_collage_core::text::paragraph_max_width(&text_config, width as f32);
    let lines = calculate_lines(
        &FixedAdvanceMetrics::default(),
        &font,
        assets.words(),
        max_width,
    );
    tracing::debug!(max_width, lines = lines.len(), "wrapped text");

    let mut out = io::stdout().lock();
    for line in lines {
        writeln!(out, "{}", line.join(" "))?;
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Beat-synchronised collage player", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a session headlessly and emit per-frame draw commands as JSON lines.
    Render {
        /// Session manifest (config, asset paths, image dimensions).
        #[arg(short, long)]
        manifest: PathBuf,
        /// Destination file; defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Frames rendered per second of playback.
        #[arg(long, default_value_t = 30)]
        fps: u32,
        /// Seconds to render; defaults to the PCM length or ten seconds.
        #[arg(long)]
        duration: Option<f64>,
    },
    /// Print the triggers decoded from a MIDI file.
    Triggers {
        /// Standard MIDI file to decode.
        midi: PathBuf,
    },
    /// Print the greedy line wrap of a text file.
    Lines {
        /// Text file to wrap.
        #[arg(short, long)]
        text: PathBuf,
        /// Canvas width in pixels.
        #[arg(long, default_value_t = 1080)]
        width: u32,
        #[arg(long, default_value_t = 80.0)]
        font_size: f32,
        #[arg(long, default_value_t = 50.0)]
        padding: f32,
    },
}
