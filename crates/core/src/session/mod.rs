//! Per-run state and the frame tick.
//!
//! A [`Session`] is created when a run starts, driven once per rendered
//! frame by the host's scheduler through [`Session::tick`], and discarded
//! after [`Session::stop`]. All mutation happens inside `tick`, so the layer
//! stack and paragraph state never see concurrent writers.

use rand::{rngs::SmallRng, SeedableRng};
use serde::Serialize;

use crate::{
    assets::{AssetStore, ImageHandle},
    config::{AppConfig, EditMode, TextStyle},
    pool::MediaPool,
    render::{canvas_size, clear_command, DrawCommand, FrameRenderer, VideoFrame},
    scene::{random_rect, scaled_rect, LayerItem, LayerStack, MediaSize, Rect, TriggerOutcome},
    text::{LayoutKey, ParagraphComposer, TextMeasure},
    timeline::{TriggerProbe, TriggerWalker},
    Result,
};

/// Host-provided readings for one frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameInput<'a> {
    /// Audio playback position in seconds.
    pub playback_time: f64,
    /// Monotonic wall clock in milliseconds.
    pub now_ms: f64,
    /// Byte magnitude spectrum of the playing audio (audio trigger mode).
    pub spectrum: Option<&'a [u8]>,
    pub video: Option<VideoFrame>,
}

/// Output of one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub triggers_fired: usize,
    pub commands: Vec<DrawCommand>,
}

pub struct Session<M> {
    config: AppConfig,
    walker: TriggerWalker,
    images: MediaPool<ImageHandle>,
    words: MediaPool<String>,
    layers: LayerStack,
    paragraph: ParagraphComposer,
    renderer: FrameRenderer<M>,
    rng: SmallRng,
    running: bool,
    frames: u64,
}

impl<M: TextMeasure> Session<M> {
    /// Builds the trigger timeline from the configured source and starts a
    /// fresh run. Nothing is started if the assets fail to resolve.
    pub fn start(config: AppConfig, assets: &AssetStore, measure: M) -> Result<Self> {
        config.validate()?;
        let source = assets.trigger_source(config.trigger_source)?;
        let rng = match config.random_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };

        tracing::info!(
            source = ?config.trigger_source,
            mode = ?config.edit_mode,
            triggers = source.events().len(),
            images = assets.images().len(),
            words = assets.words().len(),
            "starting run"
        );

        Ok(Self {
            walker: source.into_walker(),
            images: MediaPool::new(assets.images().to_vec()),
            words: MediaPool::new(assets.words().to_vec()),
            layers: LayerStack::new(),
            paragraph: ParagraphComposer::new(),
            renderer: FrameRenderer::new(measure),
            rng,
            running: true,
            frames: 0,
            config,
        })
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn layers(&self) -> &LayerStack {
        &self.layers
    }

    pub fn paragraph(&self) -> &ParagraphComposer {
        &self.paragraph
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }

    /// Applies live configuration. Leaving the paragraph style drops the
    /// running paragraph.
    pub fn update_config(&mut self, config: AppConfig) -> Result<()> {
        config.validate()?;
        if self.config.text.style == TextStyle::Paragraph
            && config.text.style != TextStyle::Paragraph
        {
            self.paragraph.reset();
        }
        self.config = config;
        Ok(())
    }

    pub fn replace_images(&mut self, images: Vec<ImageHandle>, reset_cursor: bool) {
        self.images.replace(images, reset_cursor);
    }

    pub fn replace_words(&mut self, words: Vec<String>, reset_cursor: bool) {
        self.words.replace(words, reset_cursor);
    }

    /// Advances one step through the media pools and updates the layers.
    pub fn trigger(&mut self, now_ms: f64) {
        let style = self.config.text.style;
        let text = if style == TextStyle::Still {
            None
        } else {
            self.words.select_next().cloned()
        };
        if let (Some(word), TextStyle::Paragraph) = (&text, style) {
            let key = LayoutKey::new(&self.config.text, self.config.canvas.width_f32());
            self.paragraph.append_word(word, self.renderer.measure(), key);
        }

        let image = self.images.select_next().cloned().map(|image| {
            let rect = self.place_image(&image);
            (image, rect)
        });

        let outcome = TriggerOutcome { image, text };
        if outcome.is_empty() {
            tracing::trace!("trigger fired with no images and no words");
            return;
        }
        self.layers.apply_trigger(
            outcome,
            self.config.edit_mode,
            self.config.erase_time_ms,
            now_ms,
        );
    }

    /// Runs one frame: fires due triggers, evicts expired layers and
    /// returns the draw commands. Returns `None` once the run has stopped.
    pub fn tick(&mut self, input: &FrameInput<'_>) -> Option<Frame> {
        if !self.running {
            return None;
        }

        let probe = TriggerProbe {
            playback_time: input.playback_time,
            now_ms: input.now_ms,
            spectrum: input.spectrum,
            sensitivity: self.config.sensitivity,
        };
        let fired = self.walker.poll(&probe);
        if fired > 0 {
            tracing::debug!(fired, time = input.playback_time, "triggers fired");
        }
        for _ in 0..fired {
            self.trigger(input.now_ms);
        }

        self.layers.evict_expired(input.now_ms);
        self.frames += 1;

        Some(Frame {
            triggers_fired: fired,
            commands: self.draw(input.video),
        })
    }

    /// Ends the run. Only the first call returns the clearing frame.
    pub fn stop(&mut self) -> Option<Frame> {
        if !self.running {
            return None;
        }
        self.running = false;
        tracing::info!(frames = self.frames, "run stopped");
        Some(Frame {
            triggers_fired: 0,
            commands: vec![clear_command(&self.config)],
        })
    }

    /// The audio track finished playing.
    pub fn on_audio_end(&mut self) -> Option<Frame> {
        self.stop()
    }

    fn place_image(&mut self, image: &ImageHandle) -> Rect {
        let media = MediaSize::of_image(image);
        let canvas = canvas_size(&self.config);
        match self.config.edit_mode {
            EditMode::Random => random_rect(media, canvas, &mut self.rng),
            EditMode::Normal | EditMode::Overlap => {
                scaled_rect(media, canvas, self.config.scaling_mode)
            }
        }
    }

    fn draw(&mut self, video: Option<VideoFrame>) -> Vec<DrawCommand> {
        let config = &self.config;
        let mut commands = vec![self.renderer.background(config, video)];

        for layer in self.layers.iter() {
            match layer {
                LayerItem::Image { image, rect, .. } => commands.push(DrawCommand::DrawImage {
                    image: image.id.clone(),
                    rect: *rect,
                }),
                LayerItem::Text { content, .. } => {
                    if config.text.style == TextStyle::Paragraph {
                        let key = LayoutKey::new(&config.text, config.canvas.width_f32());
                        let lines = self.paragraph.lines(self.renderer.measure(), &key);
                        commands.extend(self.renderer.paragraph(lines, config));
                    } else {
                        commands.extend(self.renderer.word(content, config));
                    }
                }
            }
        }

        if config.text.style == TextStyle::Still {
            commands.extend(self.renderer.still(self.words.items(), config));
        }
        commands
    }
}

impl<M> std::fmt::Debug for Session<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("running", &self.running)
            .field("frames", &self.frames)
            .field("layers", &self.layers.len())
            .field("images", &self.images.len())
            .field("words", &self.words.len())
            .finish()
    }
}
