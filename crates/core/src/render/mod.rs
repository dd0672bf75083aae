use serde::{Deserialize, Serialize};

use crate::{
    config::{AppConfig, TextAlign, TextConfig},
    scene::{scaled_rect, MediaSize, Rect},
    text::{calculate_lines, paragraph_max_width, paragraph_padding, FontSpec, TextMeasure},
};

pub const BACKGROUND_COLOR: &str = "#000000";
pub const OUTLINE_COLOR: &str = "#000000";
pub const OUTLINE_WIDTH: f32 = 2.0;

/// Horizontal anchor of a text run. Runs are always vertically centred on
/// their `y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextAnchor {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub anchor: TextAnchor,
    pub font: FontSpec,
    pub color: String,
    /// Stroke width, set on outline runs only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_width: Option<f32>,
    /// Renderers squeeze the run horizontally to fit this width.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_width: Option<f32>,
}

/// Flat, ordered instruction list consumed by the drawing collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum DrawCommand {
    FillRect { rect: Rect, color: String },
    DrawVideo { rect: Rect },
    DrawImage { image: String, rect: Rect },
    StrokeText(TextRun),
    FillText(TextRun),
}

/// State of the background video on this frame, as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub playing: bool,
}

impl VideoFrame {
    fn is_drawable(&self) -> bool {
        self.playing && self.width > 0 && self.height > 0
    }
}

/// Turns layout decisions into draw commands.
#[derive(Debug, Clone)]
pub struct FrameRenderer<M> {
    measure: M,
}

impl<M: TextMeasure> FrameRenderer<M> {
    pub fn new(measure: M) -> Self {
        Self { measure }
    }

    pub fn measure(&self) -> &M {
        &self.measure
    }

    /// Playing video scaled per the scaling mode, or a flat fill while there
    /// is no video or it has stalled.
    pub fn background(&self, config: &AppConfig, video: Option<VideoFrame>) -> DrawCommand {
        let canvas = canvas_size(config);
        match video.filter(VideoFrame::is_drawable) {
            Some(video) => {
                let media = MediaSize::new(video.width as f32, video.height as f32);
                DrawCommand::DrawVideo {
                    rect: scaled_rect(media, canvas, config.scaling_mode),
                }
            }
            None => clear_command(config),
        }
    }

    /// Single current word, centred on the canvas and clamped to the
    /// padded width. No wrapping.
    pub fn word(&self, word: &str, config: &AppConfig) -> Vec<DrawCommand> {
        let text = &config.text;
        let run = TextRun {
            text: word.to_owned(),
            x: config.canvas.width_f32() / 2.0,
            y: config.canvas.height_f32() / 2.0,
            anchor: TextAnchor::Center,
            font: FontSpec::from_config(text),
            color: text.color.clone(),
            line_width: None,
            max_width: Some(config.canvas.width_f32() - 2.0 * text.padding),
        };
        let mut commands = Vec::with_capacity(2);
        push_run(&mut commands, run, text.outline);
        commands
    }

    /// Vertically centred block of wrapped lines.
    ///
    /// Under `justify`/`justify-center` every line except the last one of the
    /// block is stretched to the padded width; lines holding a single word
    /// use the fallback alignment instead.
    pub fn paragraph(&self, lines: &[Vec<String>], config: &AppConfig) -> Vec<DrawCommand> {
        let text = &config.text;
        let font = FontSpec::from_config(text);
        let canvas_width = config.canvas.width_f32();
        let padding = paragraph_padding(text);
        let max_width = paragraph_max_width(text, canvas_width);
        let line_height = font.line_height();
        let block_height = lines.len() as f32 * line_height;
        let top = (config.canvas.height_f32() - block_height) / 2.0;

        let mut commands = Vec::new();
        for (index, words) in lines.iter().enumerate() {
            let y = top + index as f32 * line_height + line_height / 2.0;
            let is_last = index + 1 == lines.len();

            if text.align.is_justify() && !is_last && words.len() > 1 {
                for (x, word) in self.justified_positions(words, &font, padding, max_width) {
                    let run = self.run(word, x, y, TextAnchor::Left, &font, text);
                    push_run(&mut commands, run, text.outline);
                }
            } else {
                let (x, anchor) = match text.align.fallback() {
                    TextAlign::Left | TextAlign::Justify => (padding, TextAnchor::Left),
                    TextAlign::Right => (canvas_width - padding, TextAnchor::Right),
                    TextAlign::Center | TextAlign::JustifyCenter => {
                        (canvas_width / 2.0, TextAnchor::Center)
                    }
                };
                let run = self.run(&words.join(" "), x, y, anchor, &font, text);
                push_run(&mut commands, run, text.outline);
            }
        }
        commands
    }

    /// Static overlay of the whole word pool, wrapped from scratch.
    pub fn still(&self, words: &[String], config: &AppConfig) -> Vec<DrawCommand> {
        if words.is_empty() {
            return Vec::new();
        }
        let font = FontSpec::from_config(&config.text);
        let max_width = paragraph_max_width(&config.text, config.canvas.width_f32());
        let lines = calculate_lines(&self.measure, &font, words, max_width);
        self.paragraph(&lines, config)
    }

    /// Left edges of each word when the gaps are stretched so the line
    /// spans exactly `max_width` starting at `padding`.
    pub fn justified_positions<'w>(
        &self,
        words: &'w [String],
        font: &FontSpec,
        padding: f32,
        max_width: f32,
    ) -> Vec<(f32, &'w str)> {
        let widths: Vec<f32> = words
            .iter()
            .map(|word| self.measure.measure(word, font))
            .collect();
        let gaps = words.len().saturating_sub(1).max(1) as f32;
        let gap = (max_width - widths.iter().sum::<f32>()) / gaps;

        let mut x = padding;
        words
            .iter()
            .zip(widths)
            .map(|(word, width)| {
                let left = x;
                x += width + gap;
                (left, word.as_str())
            })
            .collect()
    }

    fn run(
        &self,
        text: &str,
        x: f32,
        y: f32,
        anchor: TextAnchor,
        font: &FontSpec,
        config: &TextConfig,
    ) -> TextRun {
        TextRun {
            text: text.to_owned(),
            x,
            y,
            anchor,
            font: font.clone(),
            color: config.color.clone(),
            line_width: None,
            max_width: None,
        }
    }
}

/// Black fill over the whole canvas.
pub fn clear_command(config: &AppConfig) -> DrawCommand {
    DrawCommand::FillRect {
        rect: Rect {
            x: 0.0,
            y: 0.0,
            w: config.canvas.width_f32(),
            h: config.canvas.height_f32(),
        },
        color: BACKGROUND_COLOR.to_string(),
    }
}

pub fn canvas_size(config: &AppConfig) -> MediaSize {
    MediaSize::new(config.canvas.width_f32(), config.canvas.height_f32())
}

/// Emits the stroke pass first when outlining, then the fill.
fn push_run(commands: &mut Vec<DrawCommand>, run: TextRun, outline: bool) {
    if outline {
        commands.push(DrawCommand::StrokeText(TextRun {
            color: OUTLINE_COLOR.to_string(),
            line_width: Some(OUTLINE_WIDTH),
            ..run.clone()
        }));
    }
    commands.push(DrawCommand::FillText(run));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::ScalingMode,
        text::test_support::{words, UnitMetrics},
    };

    fn config(align: TextAlign, outline: bool) -> AppConfig {
        let mut config = AppConfig::default();
        config.canvas.width = 100;
        config.canvas.height = 200;
        config.text.align = align;
        config.text.outline = outline;
        config.text.padding = 20.0;
        config.text.font_size = 10.0;
        config
    }

    fn fills(commands: &[DrawCommand]) -> Vec<&TextRun> {
        commands
            .iter()
            .filter_map(|command| match command {
                DrawCommand::FillText(run) => Some(run),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn justified_lines_span_the_full_width() {
        let renderer = FrameRenderer::new(UnitMetrics);
        let config = config(TextAlign::Justify, false);
        let lines = vec![words(&["ab", "cde", "f"]), words(&["last", "line"])];

        let commands = renderer.paragraph(&lines, &config);
        let runs = fills(&commands);

        // Three words on the first line, one joined run for the last line.
        assert_eq!(runs.len(), 4);
        let first = &runs[..3];
        assert_eq!(first[0].x, 20.0);
        let right_edge = first[2].x + first[2].text.len() as f32;
        assert!((right_edge - 80.0).abs() < 1e-4);
        assert!(first.iter().all(|run| run.anchor == TextAnchor::Left));

        assert_eq!(runs[3].text, "last line");
        assert_eq!(runs[3].anchor, TextAnchor::Left);
        assert_eq!(runs[3].x, 20.0);
    }

    #[test]
    fn justify_positions_sum_to_max_width() {
        let renderer = FrameRenderer::new(UnitMetrics);
        let line = words(&["one", "two", "three", "four"]);
        let font = FontSpec::from_config(&TextConfig::default());
        let positions = renderer.justified_positions(&line, &font, 50.0, 980.0);
        let (last_x, last_word) = positions[3];
        assert!((last_x + last_word.len() as f32 - (50.0 + 980.0)).abs() < 1e-3);
    }

    #[test]
    fn single_word_lines_fall_back() {
        let renderer = FrameRenderer::new(UnitMetrics);
        let lines = vec![words(&["solo"]), words(&["end"])];

        let left = renderer.paragraph(&lines, &config(TextAlign::Justify, false));
        assert!(fills(&left)
            .iter()
            .all(|run| run.anchor == TextAnchor::Left && run.x == 20.0));

        let centered = renderer.paragraph(&lines, &config(TextAlign::JustifyCenter, false));
        assert!(fills(&centered)
            .iter()
            .all(|run| run.anchor == TextAnchor::Center && run.x == 50.0));
    }

    #[test]
    fn plain_alignments_draw_whole_lines() {
        let renderer = FrameRenderer::new(UnitMetrics);
        let lines = vec![words(&["a", "b"]), words(&["c"])];

        let right = renderer.paragraph(&lines, &config(TextAlign::Right, false));
        let runs = fills(&right);
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].text, "a b");
        assert_eq!(runs[0].x, 80.0);
        assert_eq!(runs[0].anchor, TextAnchor::Right);
    }

    #[test]
    fn block_is_vertically_centred() {
        let renderer = FrameRenderer::new(UnitMetrics);
        let lines = vec![words(&["a"]), words(&["b"])];
        let commands = renderer.paragraph(&lines, &config(TextAlign::Center, false));
        let runs = fills(&commands);
        // line height 14, block 28, top (200 - 28) / 2 = 86.
        assert!((runs[0].y - 93.0).abs() < 1e-3);
        assert!((runs[1].y - 107.0).abs() < 1e-3);
    }

    #[test]
    fn outline_strokes_before_filling() {
        let renderer = FrameRenderer::new(UnitMetrics);
        let commands = renderer.word("hey", &config(TextAlign::Left, true));
        assert_eq!(commands.len(), 2);
        match (&commands[0], &commands[1]) {
            (DrawCommand::StrokeText(stroke), DrawCommand::FillText(fill)) => {
                assert_eq!(stroke.line_width, Some(OUTLINE_WIDTH));
                assert_eq!(stroke.color, OUTLINE_COLOR);
                assert_eq!(fill.color, "#ffffff");
                assert_eq!(fill.x, 50.0);
                assert_eq!(fill.y, 100.0);
                assert_eq!(fill.anchor, TextAnchor::Center);
                assert_eq!(fill.max_width, Some(60.0));
            }
            other => panic!("unexpected commands {other:?}"),
        }
    }

    #[test]
    fn still_wraps_the_whole_pool() {
        let renderer = FrameRenderer::new(UnitMetrics);
        // Max width 60: "aaaaaaaaaa" words of 10 units fit five per line.
        let pool: Vec<String> = (0..7).map(|_| "aaaaaaaaaa".to_string()).collect();
        let commands = renderer.still(&pool, &config(TextAlign::Center, false));
        let runs = fills(&commands);
        assert_eq!(runs.len(), 2);
        assert!(renderer.still(&[], &config(TextAlign::Center, false)).is_empty());
    }

    #[test]
    fn background_falls_back_when_video_stalls() {
        let renderer = FrameRenderer::new(UnitMetrics);
        let mut config = config(TextAlign::Left, false);
        config.scaling_mode = ScalingMode::Fit;

        let stalled = VideoFrame {
            width: 200,
            height: 100,
            playing: false,
        };
        assert!(matches!(
            renderer.background(&config, Some(stalled)),
            DrawCommand::FillRect { .. }
        ));

        let playing = VideoFrame {
            playing: true,
            ..stalled
        };
        match renderer.background(&config, Some(playing)) {
            DrawCommand::DrawVideo { rect } => {
                assert_eq!(rect.w, 100.0);
                assert_eq!(rect.h, 50.0);
                assert_eq!(rect.y, 75.0);
            }
            other => panic!("expected video, got {other:?}"),
        }
    }

    #[test]
    fn commands_serialise_with_an_op_tag() {
        let renderer = FrameRenderer::new(UnitMetrics);
        let config = config(TextAlign::Left, false);
        let json = serde_json::to_string(&renderer.background(&config, None)).unwrap();
        assert!(json.contains("\"op\":\"fill-rect\""));
    }
}
