use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{config::TriggerSourceKind, timeline::TriggerSource, CollageError, Result};

/// Opaque handle to an image the host has already decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageHandle {
    pub id: String,
    pub width: u32,
    pub height: u32,
}

impl ImageHandle {
    pub fn new(id: impl Into<String>, width: u32, height: u32) -> Result<Self> {
        let id = id.into();
        if width == 0 || height == 0 {
            return Err(CollageError::asset_load(id, "image has zero width or height"));
        }
        Ok(Self { id, width, height })
    }
}

/// Splits raw text on whitespace, dropping empty tokens.
pub fn tokenize_words(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_owned).collect()
}

/// Everything a run needs, loaded before the run starts.
#[derive(Debug, Default, Clone)]
pub struct AssetStore {
    images: Vec<ImageHandle>,
    words: Vec<String>,
    midi: Option<Vec<u8>>,
    taps: Vec<f64>,
}

impl AssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_image(&mut self, image: ImageHandle) {
        self.images.push(image);
    }

    /// Registers an image file whose dimensions the host decoded.
    pub fn register_image_file(
        &mut self,
        path: impl AsRef<Path>,
        width: u32,
        height: u32,
    ) -> Result<()> {
        let path = path.as_ref();
        let id = path.display().to_string();
        if !path.is_file() {
            return Err(CollageError::asset_load(id, "file not found"));
        }
        self.register_image(ImageHandle::new(id, width, height)?);
        Ok(())
    }

    pub fn clear_images(&mut self) {
        self.images.clear();
    }

    pub fn images(&self) -> &[ImageHandle] {
        &self.images
    }

    pub fn set_text(&mut self, raw: &str) {
        self.words = tokenize_words(raw);
    }

    pub fn load_text(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let raw = read_to_string(path.as_ref())?;
        self.set_text(&raw);
        Ok(())
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn set_midi(&mut self, bytes: Vec<u8>) {
        self.midi = Some(bytes);
    }

    pub fn load_midi(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|err| CollageError::asset_load(path.display().to_string(), err))?;
        self.set_midi(bytes);
        Ok(())
    }

    pub fn clear_midi(&mut self) {
        self.midi = None;
    }

    pub fn set_taps(&mut self, taps: Vec<f64>) {
        self.taps = taps;
    }

    /// Loads a JSON array of tap times in seconds.
    pub fn load_taps(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let raw = read_to_string(path.as_ref())?;
        self.taps = serde_json::from_str(&raw)?;
        Ok(())
    }

    pub fn taps(&self) -> &[f64] {
        &self.taps
    }

    /// Builds the trigger source for a run. Fails on malformed MIDI.
    pub fn trigger_source(&self, kind: TriggerSourceKind) -> Result<TriggerSource> {
        match kind {
            TriggerSourceKind::Midi => match &self.midi {
                Some(bytes) => TriggerSource::from_midi(bytes),
                None => {
                    tracing::warn!("no MIDI file loaded; the run will not trigger");
                    Ok(TriggerSource::Timed(Vec::new()))
                }
            },
            TriggerSourceKind::Manual => Ok(TriggerSource::from_taps(&self.taps)),
            TriggerSourceKind::Audio => Ok(TriggerSource::live_peaks()),
        }
    }
}

fn read_to_string(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|err| CollageError::asset_load(path.display().to_string(), err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::test_support::{smf, track};

    #[test]
    fn tokenizer_drops_empty_tokens() {
        assert_eq!(
            tokenize_words("  hello \n\t world  again "),
            vec!["hello", "world", "again"]
        );
        assert!(tokenize_words(" \n ").is_empty());
    }

    #[test]
    fn rejects_degenerate_images() {
        let err = ImageHandle::new("flat.png", 0, 10).unwrap_err();
        assert!(format!("{err}").contains("flat.png"));
    }

    #[test]
    fn errors_on_missing_files() {
        let mut store = AssetStore::new();
        let err = store
            .register_image_file("/definitely/missing.png", 10, 10)
            .unwrap_err();
        assert!(matches!(err, CollageError::AssetLoad { .. }));
        assert!(store.load_text("/definitely/missing.txt").is_err());
        assert!(store.images().is_empty());
    }

    #[test]
    fn builds_sources_per_kind() {
        let mut store = AssetStore::new();
        store.set_taps(vec![0.5, 1.0]);
        store.set_midi(smf(480, &[track(&[(480, &[0x90, 60, 127])])]));

        let manual = store.trigger_source(TriggerSourceKind::Manual).unwrap();
        assert_eq!(manual.events().len(), 2);

        let midi = store.trigger_source(TriggerSourceKind::Midi).unwrap();
        assert_eq!(midi.events().len(), 1);
        assert!((midi.events()[0].time - 0.5).abs() < 1e-9);

        let audio = store.trigger_source(TriggerSourceKind::Audio).unwrap();
        assert!(audio.events().is_empty());
    }

    #[test]
    fn malformed_midi_is_a_parse_error() {
        let mut store = AssetStore::new();
        store.set_midi(b"not midi at all".to_vec());
        let err = store.trigger_source(TriggerSourceKind::Midi).unwrap_err();
        assert!(matches!(err, CollageError::Parse(_)));
    }
}
