use std::{f32::consts::PI, fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

use crate::{CollageError, Result};

/// Minimum spacing between two audio peaks.
pub const PEAK_COOLDOWN_MS: f64 = 150.0;

const SMOOTHING: f32 = 0.8;
const MIN_DECIBELS: f32 = -100.0;
const MAX_DECIBELS: f32 = -30.0;

/// Produces the byte-scaled magnitude spectrum the peak detector consumes.
///
/// The output matches what a browser analyser node reports: `fft_size / 2`
/// bins, Blackman-windowed, temporally smoothed and mapped from
/// `[-100 dB, -30 dB]` onto `[0, 255]`.
pub struct SpectrumAnalyser {
    fft_size: usize,
    history: Vec<f32>,
    window: Vec<f32>,
    smoothed: Vec<f32>,
    bytes: Vec<u8>,
    fft_planner: RealFftPlanner<f32>,
    fft: Option<FftResources>,
}

impl SpectrumAnalyser {
    pub fn new(fft_size: usize) -> Result<Self> {
        if fft_size < 32 || !fft_size.is_power_of_two() {
            return Err(CollageError::InvalidInput(
                "fft size must be a power of two of at least 32",
            ));
        }

        let bins = fft_size / 2;
        Ok(Self {
            fft_size,
            history: vec![0.0; fft_size],
            window: (0..fft_size).map(|i| blackman_value(i, fft_size)).collect(),
            smoothed: vec![0.0; bins],
            bytes: vec![0; bins],
            fft_planner: RealFftPlanner::new(),
            fft: None,
        })
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Clears the sample history and the smoothing state.
    pub fn reset(&mut self) {
        self.history.iter_mut().for_each(|s| *s = 0.0);
        self.smoothed.iter_mut().for_each(|m| *m = 0.0);
        self.bytes.iter_mut().for_each(|b| *b = 0);
    }

    /// The most recent spectrum.
    pub fn spectrum(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes a block of mono samples and refreshes the spectrum from the
    /// latest `fft_size` samples seen.
    pub fn process_block(&mut self, samples: &[f32]) -> Result<&[u8]> {
        if samples.is_empty() {
            return Err(CollageError::InvalidInput(
                "analysis requires at least one sample",
            ));
        }

        let size = self.fft_size;
        if samples.len() >= size {
            self.history.copy_from_slice(&samples[samples.len() - size..]);
        } else {
            self.history.rotate_left(samples.len());
            self.history[size - samples.len()..].copy_from_slice(samples);
        }

        self.prepare_fft();
        let fft = self
            .fft
            .as_mut()
            .ok_or(CollageError::InvalidInput("fft resources were not prepared"))?;
        for (slot, (sample, weight)) in fft
            .input
            .iter_mut()
            .zip(self.history.iter().zip(self.window.iter()))
        {
            *slot = sample * weight;
        }

        fft.plan
            .process_with_scratch(&mut fft.input, &mut fft.spectrum, &mut fft.scratch)?;

        let scale = 1.0 / size as f32;
        for ((bin, smoothed), byte) in fft
            .spectrum
            .iter()
            .zip(self.smoothed.iter_mut())
            .zip(self.bytes.iter_mut())
        {
            *smoothed = SMOOTHING * *smoothed + (1.0 - SMOOTHING) * bin.norm() * scale;
            *byte = decibels_to_byte(*smoothed);
        }

        Ok(&self.bytes)
    }

    fn prepare_fft(&mut self) {
        if self.fft.is_some() {
            return;
        }
        let plan = self.fft_planner.plan_fft_forward(self.fft_size);
        self.fft = Some(FftResources {
            scratch: plan.make_scratch_vec(),
            spectrum: plan.make_output_vec(),
            input: plan.make_input_vec(),
            plan,
        });
    }
}

struct FftResources {
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
}

impl fmt::Debug for SpectrumAnalyser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectrumAnalyser")
            .field("fft_size", &self.fft_size)
            .field("prepared", &self.fft.is_some())
            .finish()
    }
}

fn decibels_to_byte(magnitude: f32) -> u8 {
    if magnitude <= 0.0 {
        return 0;
    }
    let db = 20.0 * magnitude.log10();
    let scaled = 255.0 * (db - MIN_DECIBELS) / (MAX_DECIBELS - MIN_DECIBELS);
    scaled.clamp(0.0, 255.0) as u8
}

fn blackman_value(index: usize, len: usize) -> f32 {
    const ALPHA: f32 = 0.16;
    let a0 = 0.5 * (1.0 - ALPHA);
    let a2 = 0.5 * ALPHA;
    let x = index as f32 / len as f32;
    a0 - 0.5 * (2.0 * PI * x).cos() + a2 * (4.0 * PI * x).cos()
}

/// Arithmetic mean of a byte spectrum.
pub fn mean_magnitude(spectrum: &[u8]) -> f32 {
    if spectrum.is_empty() {
        return 0.0;
    }
    let sum: u32 = spectrum.iter().map(|&b| u32::from(b)).sum();
    sum as f32 / spectrum.len() as f32
}

/// Mean magnitude a spectrum must exceed to count as a peak.
pub fn peak_threshold(sensitivity: f32) -> f32 {
    150.0 - sensitivity * 1.2
}

/// Threshold-crossing detector gated by a last-fire timestamp.
///
/// A signal that stays above the threshold fires once per cooldown window.
#[derive(Debug, Clone)]
pub struct PeakDetector {
    cooldown_ms: f64,
    last_fire_ms: Option<f64>,
}

impl Default for PeakDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl PeakDetector {
    pub fn new() -> Self {
        Self::with_cooldown(PEAK_COOLDOWN_MS)
    }

    pub fn with_cooldown(cooldown_ms: f64) -> Self {
        Self {
            cooldown_ms,
            last_fire_ms: None,
        }
    }

    pub fn reset(&mut self) {
        self.last_fire_ms = None;
    }

    pub fn last_fire_ms(&self) -> Option<f64> {
        self.last_fire_ms
    }

    pub fn poll(&mut self, spectrum: &[u8], sensitivity: f32, now_ms: f64) -> bool {
        if mean_magnitude(spectrum) <= peak_threshold(sensitivity) {
            return false;
        }
        let cooled = self
            .last_fire_ms
            .map_or(true, |last| now_ms - last > self.cooldown_ms);
        if cooled {
            self.last_fire_ms = Some(now_ms);
        }
        cooled
    }
}
