use serde::{Deserialize, Serialize};

use crate::{analysis::PeakDetector, midi, Result};

/// Position of the audio track, in seconds.
#[derive(Debug, Default, Clone)]
pub struct PlaybackClock {
    pub time_seconds: f64,
}

impl PlaybackClock {
    pub fn reset(&mut self) {
        self.time_seconds = 0.0;
    }

    pub fn advance(&mut self, delta: f64) {
        self.time_seconds = (self.time_seconds + delta).max(0.0);
    }

    pub fn seek(&mut self, seconds: f64) {
        self.time_seconds = seconds.max(0.0);
    }
}

/// A discrete, timestamped event that advances the presentation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TriggerEvent {
    /// Seconds from the start of the audio track.
    pub time: f64,
    /// Normalised strength in `[0, 1]`.
    pub velocity: f32,
}

impl TriggerEvent {
    pub fn new(time: f64, velocity: f32) -> Self {
        Self {
            time: time.max(0.0),
            velocity: velocity.clamp(0.0, 1.0),
        }
    }
}

/// The three trigger origins, normalised at run start.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerSource {
    /// Discrete events: MIDI note-ons or recorded taps.
    Timed(Vec<TriggerEvent>),
    /// Real-time amplitude peaks. No event list exists ahead of time.
    Peaks,
}

impl TriggerSource {
    /// Decodes a MIDI file into note-on triggers.
    pub fn from_midi(bytes: &[u8]) -> Result<Self> {
        let events = midi::parse_triggers(bytes)?;
        tracing::info!(events = events.len(), "decoded MIDI triggers");
        Ok(Self::Timed(events))
    }

    /// Uses recorded taps verbatim, each at full velocity.
    pub fn from_taps(taps: &[f64]) -> Self {
        Self::Timed(taps.iter().map(|&time| TriggerEvent::new(time, 1.0)).collect())
    }

    pub fn live_peaks() -> Self {
        Self::Peaks
    }

    /// Events known ahead of time; empty for live peak detection.
    pub fn events(&self) -> &[TriggerEvent] {
        match self {
            Self::Timed(events) => events,
            Self::Peaks => &[],
        }
    }

    pub fn into_walker(self) -> TriggerWalker {
        match self {
            Self::Timed(events) => {
                let mut scheduler = Scheduler::new();
                scheduler.set_events(events);
                TriggerWalker::Indexed(scheduler)
            }
            Self::Peaks => TriggerWalker::Threshold(PeakDetector::new()),
        }
    }
}

/// Walks a sorted event list against the playback position.
#[derive(Debug, Default)]
pub struct Scheduler {
    events: Vec<TriggerEvent>,
    next_event: usize,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the event list. The sort is stable: ties keep their order.
    pub fn set_events(&mut self, events: Vec<TriggerEvent>) {
        self.events = events;
        self.events.sort_by(|a, b| a.time.total_cmp(&b.time));
        self.next_event = 0;
    }

    pub fn reset(&mut self) {
        self.next_event = 0;
    }

    pub fn events(&self) -> &[TriggerEvent] {
        &self.events
    }

    pub fn remaining(&self) -> usize {
        self.events.len() - self.next_event
    }

    /// Returns how many events became due since the previous call.
    ///
    /// Every elapsed event is counted, so a coarse tick after a stall or a
    /// seek reports all of them rather than one.
    pub fn tick(&mut self, playback_time: f64) -> usize {
        let start = self.next_event;
        while self
            .events
            .get(self.next_event)
            .is_some_and(|event| event.time <= playback_time)
        {
            self.next_event += 1;
        }
        self.next_event - start
    }
}

/// What the walker may look at on one tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct TriggerProbe<'a> {
    pub playback_time: f64,
    pub now_ms: f64,
    /// Byte-scaled magnitude spectrum, required for peak detection.
    pub spectrum: Option<&'a [u8]>,
    pub sensitivity: f32,
}

/// Per-run trigger state for whichever source is active.
#[derive(Debug)]
pub enum TriggerWalker {
    Indexed(Scheduler),
    Threshold(PeakDetector),
}

impl TriggerWalker {
    /// Number of trigger actions to fire this tick.
    pub fn poll(&mut self, probe: &TriggerProbe<'_>) -> usize {
        match self {
            Self::Indexed(scheduler) => scheduler.tick(probe.playback_time),
            Self::Threshold(detector) => match probe.spectrum {
                Some(spectrum) => {
                    usize::from(detector.poll(spectrum, probe.sensitivity, probe.now_ms))
                }
                None => 0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler(times: &[f64]) -> Scheduler {
        let mut scheduler = Scheduler::new();
        scheduler.set_events(times.iter().map(|&t| TriggerEvent::new(t, 1.0)).collect());
        scheduler
    }

    #[test]
    fn fires_every_event_that_elapsed() {
        let mut walker = scheduler(&[0.5, 0.5, 1.2]);
        assert_eq!(walker.tick(1.0), 2);
        assert_eq!(walker.tick(2.0), 1);
        assert_eq!(walker.tick(3.0), 0);
    }

    #[test]
    fn coarse_and_fine_stepping_agree() {
        let times = [0.0, 0.1, 0.1, 0.33, 0.9, 1.7, 1.71, 2.5, 4.0];
        let horizon = 3.0;

        let mut coarse = scheduler(&times);
        let coarse_total = coarse.tick(horizon);

        let mut fine = scheduler(&times);
        let mut fine_total = 0;
        let mut t = 0.0;
        while t <= horizon {
            fine_total += fine.tick(t);
            t += 1.0 / 60.0;
        }
        fine_total += fine.tick(horizon);

        let expected = times.iter().filter(|&&time| time <= horizon).count();
        assert_eq!(coarse_total, expected);
        assert_eq!(fine_total, expected);
        assert_eq!(coarse.remaining(), 1);
    }

    #[test]
    fn set_events_sorts_stably() {
        let mut walker = Scheduler::new();
        walker.set_events(vec![
            TriggerEvent::new(1.0, 0.1),
            TriggerEvent::new(0.5, 0.2),
            TriggerEvent::new(1.0, 0.3),
        ]);
        let velocities: Vec<f32> = walker.events().iter().map(|e| e.velocity).collect();
        assert_eq!(velocities, vec![0.2, 0.1, 0.3]);
    }

    #[test]
    fn taps_get_full_velocity() {
        let source = TriggerSource::from_taps(&[0.25, 1.5]);
        assert_eq!(
            source.events(),
            &[TriggerEvent::new(0.25, 1.0), TriggerEvent::new(1.5, 1.0)]
        );
    }

    #[test]
    fn peak_walker_needs_a_spectrum() {
        let mut walker = TriggerSource::live_peaks().into_walker();
        let loud = [255u8; 128];
        let silent_probe = TriggerProbe {
            now_ms: 1000.0,
            sensitivity: 50.0,
            ..Default::default()
        };
        assert_eq!(walker.poll(&silent_probe), 0);

        let probe = TriggerProbe {
            spectrum: Some(&loud),
            ..silent_probe
        };
        assert_eq!(walker.poll(&probe), 1);
    }

    #[test]
    fn clock_never_goes_negative() {
        let mut clock = PlaybackClock::default();
        clock.advance(0.5);
        clock.advance(-2.0);
        assert_eq!(clock.time_seconds, 0.0);
        clock.seek(3.0);
        assert_eq!(clock.time_seconds, 3.0);
    }
}
