use serde::{Deserialize, Serialize};

use crate::timeline::TriggerSource;

/// Captures beats tapped along with the audio for the manual trigger source.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct TapRecorder {
    taps: Vec<f64>,
    #[serde(skip)]
    is_recording: bool,
}

impl TapRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discards previous taps and arms the recorder.
    pub fn start(&mut self) {
        self.taps.clear();
        self.is_recording = true;
        tracing::info!("tap recording started");
    }

    /// Records a tap at the current playback position. Ignored unless armed.
    pub fn record_tap(&mut self, playback_time: f64) -> bool {
        if !self.is_recording {
            return false;
        }
        self.taps.push(playback_time.max(0.0));
        true
    }

    /// Disarms the recorder and returns what was captured.
    pub fn finish(&mut self) -> &[f64] {
        if self.is_recording {
            self.is_recording = false;
            tracing::info!(taps = self.taps.len(), "tap recording complete");
        }
        &self.taps
    }

    pub fn is_recording(&self) -> bool {
        self.is_recording
    }

    pub fn taps(&self) -> &[f64] {
        &self.taps
    }

    pub fn to_source(&self) -> TriggerSource {
        TriggerSource::from_taps(&self.taps)
    }
}
