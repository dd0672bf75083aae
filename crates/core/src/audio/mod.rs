use std::sync::{Arc, Mutex, MutexGuard};

use crate::{config::AudioConfig, CollageError, Result, SpectrumAnalyser};

/// High level audio engine façade.
///
/// Decoding and playback belong to the host. The engine only sees the
/// decoded PCM the host is playing, which it forwards to the shared
/// [`SpectrumAnalyser`] and uses to track the playback position.
#[derive(Debug)]
pub struct AudioEngine {
    sample_rate: u32,
    shared: Arc<Mutex<SharedAudio>>,
}

#[derive(Debug)]
struct SharedAudio {
    analyser: SpectrumAnalyser,
    played_samples: u64,
}

impl AudioEngine {
    pub fn new(config: &AudioConfig) -> Result<Self> {
        if config.sample_rate == 0 {
            return Err(CollageError::InvalidInput("sample rate must be non-zero"));
        }
        Ok(Self {
            sample_rate: config.sample_rate,
            shared: Arc::new(Mutex::new(SharedAudio {
                analyser: SpectrumAnalyser::new(config.fft_size)?,
                played_samples: 0,
            })),
        })
    }

    /// Returns the sample rate the engine operates at.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Rewinds to the start of the track and returns a handle to the
    /// analysis state.
    pub fn start(&self) -> Result<AnalysisHandle> {
        {
            let mut shared = self.lock()?;
            shared.analyser.reset();
            shared.played_samples = 0;
        }

        Ok(AnalysisHandle {
            sample_rate: self.sample_rate,
            shared: self.shared.clone(),
        })
    }

    /// Feeds a block of mono samples that has just been played.
    pub fn push_samples(&self, samples: &[f32]) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let mut shared = self.lock()?;
        shared.analyser.process_block(samples)?;
        shared.played_samples += samples.len() as u64;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, SharedAudio>> {
        lock_shared(&self.shared)
    }
}

/// Shared, thread-safe view over the state managed by [`AudioEngine`].
#[derive(Clone)]
pub struct AnalysisHandle {
    sample_rate: u32,
    shared: Arc<Mutex<SharedAudio>>,
}

impl AnalysisHandle {
    /// Copy of the latest byte spectrum.
    pub fn spectrum(&self) -> Result<Vec<u8>> {
        let shared = lock_shared(&self.shared)?;
        Ok(shared.analyser.spectrum().to_vec())
    }

    /// Seconds of audio played since [`AudioEngine::start`].
    pub fn position_seconds(&self) -> Result<f64> {
        let shared = lock_shared(&self.shared)?;
        Ok(shared.played_samples as f64 / f64::from(self.sample_rate))
    }
}

impl std::fmt::Debug for AnalysisHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisHandle")
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

fn lock_shared(shared: &Mutex<SharedAudio>) -> Result<MutexGuard<'_, SharedAudio>> {
    shared
        .lock()
        .map_err(|_| CollageError::msg("audio analysis has been poisoned"))
}
