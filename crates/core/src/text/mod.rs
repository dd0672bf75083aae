//! Greedy line wrapping and the incremental paragraph composer.

use serde::{Deserialize, Serialize};

use crate::config::TextConfig;

/// A paragraph never grows past this many wrapped lines.
pub const MAX_PARAGRAPH_LINES: usize = 5;
/// Lower bound applied to the configured padding for paragraph layout.
pub const MIN_PARAGRAPH_PADDING: f32 = 20.0;
/// Line advance as a multiple of the font size.
pub const LINE_HEIGHT_FACTOR: f32 = 1.4;

/// Font used for every text run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontSpec {
    pub size: f32,
    pub family: String,
    pub bold: bool,
}

impl FontSpec {
    pub fn from_config(text: &TextConfig) -> Self {
        Self {
            size: text.font_size,
            family: text.font_family.clone(),
            bold: true,
        }
    }

    /// CSS shorthand, handy for canvas-style renderers.
    pub fn css(&self) -> String {
        let weight = if self.bold { "bold " } else { "" };
        format!("{weight}{}px \"{}\", sans-serif", self.size, self.family)
    }

    pub fn line_height(&self) -> f32 {
        self.size * LINE_HEIGHT_FACTOR
    }
}

/// Glyph metrics supplied by the rendering collaborator.
pub trait TextMeasure {
    /// Advance width of `text` set in `font`.
    fn measure(&self, text: &str, font: &FontSpec) -> f32;
}

impl<M: TextMeasure + ?Sized> TextMeasure for &M {
    fn measure(&self, text: &str, font: &FontSpec) -> f32 {
        (**self).measure(text, font)
    }
}

/// Every character advances by the same fraction of the font size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedAdvanceMetrics {
    pub advance: f32,
}

impl Default for FixedAdvanceMetrics {
    fn default() -> Self {
        Self { advance: 0.6 }
    }
}

impl TextMeasure for FixedAdvanceMetrics {
    fn measure(&self, text: &str, font: &FontSpec) -> f32 {
        text.chars().count() as f32 * self.advance * font.size
    }
}

/// Padding used by paragraph and still layouts.
pub fn paragraph_padding(text: &TextConfig) -> f32 {
    text.padding.max(MIN_PARAGRAPH_PADDING)
}

/// Width available to a wrapped line.
pub fn paragraph_max_width(text: &TextConfig, canvas_width: f32) -> f32 {
    canvas_width - 2.0 * paragraph_padding(text)
}

/// Greedy line fill.
///
/// A word joins the current line when `line + space + word <= max_width`.
/// A line always holds at least one word, even one wider than `max_width`.
pub fn calculate_lines<M: TextMeasure + ?Sized>(
    measure: &M,
    font: &FontSpec,
    words: &[String],
    max_width: f32,
) -> Vec<Vec<String>> {
    let mut lines = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_width = 0.0;
    let space_width = measure.measure(" ", font);

    for word in words {
        let word_width = measure.measure(word, font);
        if !current.is_empty() && current_width + space_width + word_width > max_width {
            lines.push(std::mem::take(&mut current));
            current_width = 0.0;
        }
        if !current.is_empty() {
            current_width += space_width;
        }
        current.push(word.clone());
        current_width += word_width;
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Layout parameters that change measured line breaks.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutKey {
    pub font: FontSpec,
    pub max_width: f32,
}

impl LayoutKey {
    pub fn new(text: &TextConfig, canvas_width: f32) -> Self {
        Self {
            font: FontSpec::from_config(text),
            max_width: paragraph_max_width(text, canvas_width),
        }
    }
}

/// Running paragraph built one word per trigger.
#[derive(Debug, Default, Clone)]
pub struct ParagraphComposer {
    buffer: Vec<String>,
    lines: Vec<Vec<String>>,
    key: Option<LayoutKey>,
}

impl ParagraphComposer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.lines.clear();
        self.key = None;
    }

    pub fn buffer(&self) -> &[String] {
        &self.buffer
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn cache_key(&self) -> Option<&LayoutKey> {
        self.key.as_ref()
    }

    /// Appends `word`, starting a fresh paragraph with it when the wrapped
    /// result would exceed [`MAX_PARAGRAPH_LINES`].
    pub fn append_word<M: TextMeasure + ?Sized>(
        &mut self,
        word: &str,
        measure: &M,
        key: LayoutKey,
    ) {
        let mut candidate = self.buffer.clone();
        candidate.push(word.to_owned());
        let lines = calculate_lines(measure, &key.font, &candidate, key.max_width);

        if lines.len() > MAX_PARAGRAPH_LINES {
            tracing::trace!(word, "paragraph overflow, starting a new one");
            self.buffer = vec![word.to_owned()];
            self.lines = calculate_lines(measure, &key.font, &self.buffer, key.max_width);
        } else {
            self.buffer = candidate;
            self.lines = lines;
        }
        self.key = Some(key);
    }

    /// Wrapped lines for `key`, recomputed only when the layout changed
    /// since the last wrap.
    pub fn lines<M: TextMeasure + ?Sized>(
        &mut self,
        measure: &M,
        key: &LayoutKey,
    ) -> &[Vec<String>] {
        if self.key.as_ref() != Some(key) {
            tracing::trace!("paragraph layout changed, re-wrapping");
            self.lines = calculate_lines(measure, &key.font, &self.buffer, key.max_width);
            self.key = Some(key.clone());
        }
        &self.lines
    }

    /// Lines from the most recent wrap, whatever layout produced them.
    pub fn cached_lines(&self) -> &[Vec<String>] {
        &self.lines
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// One unit per character regardless of font size; a space is one unit.
    #[derive(Debug, Default)]
    pub struct UnitMetrics;

    impl TextMeasure for UnitMetrics {
        fn measure(&self, text: &str, _font: &FontSpec) -> f32 {
            text.chars().count() as f32
        }
    }

    pub fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|w| w.to_string()).collect()
    }

    pub fn font() -> FontSpec {
        FontSpec {
            size: 10.0,
            family: "Inter".to_string(),
            bold: true,
        }
    }

    pub fn key(max_width: f32) -> LayoutKey {
        LayoutKey {
            font: font(),
            max_width,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{font, key, words, UnitMetrics};
    use super::*;

    #[test]
    fn two_words_per_line() {
        // "a b" is 3 units wide, "a b c" would be 5.
        let lines = calculate_lines(&UnitMetrics, &font(), &words(&["a", "b", "c", "d"]), 4.0);
        assert_eq!(lines, vec![words(&["a", "b"]), words(&["c", "d"])]);
    }

    #[test]
    fn exact_fit_stays_on_the_line() {
        let lines = calculate_lines(&UnitMetrics, &font(), &words(&["ab", "cd"]), 5.0);
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn oversized_word_gets_its_own_line() {
        let lines = calculate_lines(
            &UnitMetrics,
            &font(),
            &words(&["hi", "extraordinarily", "ok"]),
            6.0,
        );
        assert_eq!(
            lines,
            vec![words(&["hi"]), words(&["extraordinarily"]), words(&["ok"])]
        );
    }

    #[test]
    fn empty_input_has_no_lines() {
        assert!(calculate_lines(&UnitMetrics, &font(), &[], 100.0).is_empty());
    }

    #[test]
    fn wrapping_is_idempotent() {
        let text = words(&["the", "quick", "brown", "fox", "jumps", "over"]);
        let metrics = FixedAdvanceMetrics::default();
        let first = calculate_lines(&metrics, &font(), &text, 60.0);
        let second = calculate_lines(&metrics, &font(), &text, 60.0);
        assert_eq!(first, second);
    }

    #[test]
    fn composer_accumulates_until_overflow() {
        let mut composer = ParagraphComposer::new();
        // One word per line at this width.
        for word in ["aaa", "bbb", "ccc", "ddd", "eee"] {
            composer.append_word(word, &UnitMetrics, key(5.0));
        }
        assert_eq!(composer.buffer().len(), 5);
        assert_eq!(composer.cached_lines().len(), 5);

        composer.append_word("fff", &UnitMetrics, key(5.0));
        assert_eq!(composer.buffer(), &words(&["fff"])[..]);
        assert_eq!(composer.cached_lines(), &[words(&["fff"])][..]);
    }

    #[test]
    fn lines_rewrap_only_when_layout_changes() {
        let mut composer = ParagraphComposer::new();
        for word in ["aa", "bb", "cc"] {
            composer.append_word(word, &UnitMetrics, key(100.0));
        }
        assert_eq!(composer.lines(&UnitMetrics, &key(100.0)).len(), 1);

        let narrow = key(2.0);
        assert_eq!(composer.lines(&UnitMetrics, &narrow).len(), 3);
        assert_eq!(composer.cache_key(), Some(&narrow));
    }

    #[test]
    fn paragraph_padding_has_a_floor() {
        let mut text = TextConfig::default();
        text.padding = 5.0;
        assert_eq!(paragraph_max_width(&text, 1080.0), 1040.0);
        text.padding = 50.0;
        assert_eq!(paragraph_max_width(&text, 1080.0), 980.0);
    }

    #[test]
    fn fixed_metrics_scale_with_font_size() {
        let metrics = FixedAdvanceMetrics { advance: 0.5 };
        assert_eq!(metrics.measure("abcd", &font()), 20.0);
        assert_eq!(font().css(), "bold 10px \"Inter\", sans-serif");
        assert!((font().line_height() - 14.0).abs() < 1e-4);
    }
}
