//! Core library for the beat collage player.
//!
//! A run pairs an audio track with a pool of images and words. Triggers come
//! from MIDI note-ons, taps recorded along with the track, or peaks in the
//! live spectrum, and each one places the next image and word onto a layer
//! stack that is turned into draw commands every frame. Each module owns one
//! subsystem; [`Session`] ties them together for a single run.

pub mod analysis;
pub mod assets;
pub mod audio;
pub mod config;
pub mod error;
pub mod midi;
pub mod pool;
pub mod record;
pub mod render;
pub mod scene;
pub mod session;
pub mod text;
pub mod timeline;

pub use analysis::{PeakDetector, SpectrumAnalyser};
pub use assets::{AssetStore, ImageHandle};
pub use audio::{AnalysisHandle, AudioEngine};
pub use config::{AppConfig, AudioConfig, EditMode, TextConfig, TextStyle, TriggerSourceKind};
pub use error::{CollageError, Result};
pub use midi::{parse_triggers, MidiError};
pub use pool::MediaPool;
pub use record::TapRecorder;
pub use render::{DrawCommand, FrameRenderer, VideoFrame};
pub use scene::{LayerItem, LayerStack};
pub use session::{Frame, FrameInput, Session};
pub use text::{calculate_lines, FixedAdvanceMetrics, FontSpec, ParagraphComposer, TextMeasure};
pub use timeline::{PlaybackClock, Scheduler, TriggerEvent, TriggerSource};
