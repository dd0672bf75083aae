//! Minimal Standard MIDI File reader.
//!
//! Only what the trigger timeline needs is decoded: note-on events and the
//! tempo map. Everything else (controllers, SysEx, text meta events, unknown
//! chunks) is skipped structurally so that files written by any sequencer
//! load without complaint.

use crate::timeline::TriggerEvent;

/// Microseconds per quarter note when a file carries no tempo event (120 bpm).
const DEFAULT_TEMPO_USEC: u32 = 500_000;
const META_END_OF_TRACK: u8 = 0x2F;
const META_SET_TEMPO: u8 = 0x51;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MidiError {
    #[error("data does not start with an MThd header")]
    MissingHeader,
    #[error("unexpected end of data at byte {offset}")]
    Truncated { offset: usize },
    #[error("variable-length quantity longer than four bytes at byte {offset}")]
    InvalidVarLen { offset: usize },
    #[error("data byte without running status at byte {offset}")]
    MissingRunningStatus { offset: usize },
    #[error("unsupported status byte {status:#04x} at byte {offset}")]
    UnsupportedStatus { status: u8, offset: usize },
    #[error("unsupported MIDI file format {0}")]
    UnsupportedFormat(u16),
    #[error("time division of zero ticks")]
    ZeroDivision,
}

/// Timing basis declared in the header.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Division {
    TicksPerQuarter(u16),
    Smpte { frames_per_second: f64, ticks_per_frame: u8 },
}

#[derive(Debug, Default)]
struct RawTrack {
    notes: Vec<(u64, u8)>,
    tempos: Vec<(u64, u32)>,
}

/// Parses every note-on event across all tracks into trigger events.
///
/// Events are merged across tracks and stably sorted by time, so notes that
/// share a timestamp keep their track-then-file order.
pub fn parse_triggers(bytes: &[u8]) -> Result<Vec<TriggerEvent>, MidiError> {
    let mut reader = Reader::new(bytes);
    let division = read_header(&mut reader)?;

    let mut tracks = Vec::new();
    while reader.remaining() >= 8 {
        let id = reader.take(4)?;
        let len = reader.u32()? as usize;
        let body_offset = reader.pos;
        let body = reader.take(len)?;
        if id == b"MTrk" {
            tracks.push(read_track(body, body_offset)?);
        }
    }

    let mut tempos: Vec<(u64, u32)> = tracks
        .iter()
        .flat_map(|track| track.tempos.iter().copied())
        .collect();
    tempos.sort_by_key(|(tick, _)| *tick);
    let tempo_map = TempoMap::new(division, &tempos);

    let mut events: Vec<TriggerEvent> = tracks
        .iter()
        .flat_map(|track| track.notes.iter())
        .map(|&(tick, velocity)| {
            TriggerEvent::new(tempo_map.seconds_at(tick), f32::from(velocity) / 127.0)
        })
        .collect();
    events.sort_by(|a, b| a.time.total_cmp(&b.time));
    Ok(events)
}

fn read_header(reader: &mut Reader<'_>) -> Result<Division, MidiError> {
    if reader.remaining() < 14 || reader.take(4)? != b"MThd" {
        return Err(MidiError::MissingHeader);
    }
    let len = reader.u32()? as usize;
    if len < 6 {
        return Err(MidiError::MissingHeader);
    }
    let format = reader.u16()?;
    if format > 2 {
        return Err(MidiError::UnsupportedFormat(format));
    }
    let _track_count = reader.u16()?;
    let raw_division = reader.u16()?;
    reader.take(len - 6)?;

    if raw_division & 0x8000 != 0 {
        let fps = match (raw_division >> 8) as u8 as i8 {
            -29 => 29.97,
            other => -f64::from(other),
        };
        let ticks_per_frame = (raw_division & 0xFF) as u8;
        if ticks_per_frame == 0 || fps <= 0.0 {
            return Err(MidiError::ZeroDivision);
        }
        Ok(Division::Smpte {
            frames_per_second: fps,
            ticks_per_frame,
        })
    } else if raw_division == 0 {
        Err(MidiError::ZeroDivision)
    } else {
        Ok(Division::TicksPerQuarter(raw_division))
    }
}

fn read_track(body: &[u8], base_offset: usize) -> Result<RawTrack, MidiError> {
    let mut reader = Reader::with_base(body, base_offset);
    let mut track = RawTrack::default();
    let mut tick = 0u64;
    let mut running_status: Option<u8> = None;

    while reader.remaining() > 0 {
        tick += u64::from(reader.vlq()?);
        let offset = reader.offset();
        let status = match reader.peek()? {
            byte if byte & 0x80 != 0 => {
                reader.pos += 1;
                byte
            }
            _ => running_status.ok_or(MidiError::MissingRunningStatus { offset })?,
        };

        match status {
            0xFF => {
                running_status = None;
                let kind = reader.u8()?;
                let len = reader.vlq()? as usize;
                let data = reader.take(len)?;
                match kind {
                    META_SET_TEMPO if data.len() == 3 => {
                        let usec = u32::from_be_bytes([0, data[0], data[1], data[2]]);
                        track.tempos.push((tick, usec));
                    }
                    META_END_OF_TRACK => break,
                    _ => {}
                }
            }
            0xF0 | 0xF7 => {
                running_status = None;
                let len = reader.vlq()? as usize;
                reader.take(len)?;
            }
            0x80..=0xEF => {
                running_status = Some(status);
                let kind = status & 0xF0;
                let data_len = if kind == 0xC0 || kind == 0xD0 { 1 } else { 2 };
                let data = reader.take(data_len)?;
                if kind == 0x90 && data[1] > 0 {
                    track.notes.push((tick, data[1].min(127)));
                }
            }
            other => return Err(MidiError::UnsupportedStatus { status: other, offset }),
        }
    }

    Ok(track)
}

/// Piecewise-linear tick to seconds conversion.
struct TempoMap {
    /// `(start_tick, start_seconds, seconds_per_tick)`, ordered by tick.
    segments: Vec<(u64, f64, f64)>,
}

impl TempoMap {
    fn new(division: Division, tempos: &[(u64, u32)]) -> Self {
        match division {
            Division::Smpte {
                frames_per_second,
                ticks_per_frame,
            } => Self {
                segments: vec![(0, 0.0, 1.0 / (frames_per_second * f64::from(ticks_per_frame)))],
            },
            Division::TicksPerQuarter(tpq) => {
                let per_tick = |usec: u32| f64::from(usec) / 1_000_000.0 / f64::from(tpq);
                let mut segments = vec![(0, 0.0, per_tick(DEFAULT_TEMPO_USEC))];
                for &(tick, usec) in tempos {
                    let (start_tick, start_seconds, rate) = segments[segments.len() - 1];
                    let seconds = start_seconds + (tick - start_tick) as f64 * rate;
                    if tick == start_tick {
                        let last = segments.len() - 1;
                        segments[last] = (tick, seconds, per_tick(usec));
                    } else {
                        segments.push((tick, seconds, per_tick(usec)));
                    }
                }
                Self { segments }
            }
        }
    }

    fn seconds_at(&self, tick: u64) -> f64 {
        let index = self
            .segments
            .partition_point(|(start, _, _)| *start <= tick)
            .saturating_sub(1);
        let (start_tick, start_seconds, rate) = self.segments[index];
        start_seconds + (tick - start_tick) as f64 * rate
    }
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self::with_base(data, 0)
    }

    fn with_base(data: &'a [u8], base: usize) -> Self {
        Self { data, pos: 0, base }
    }

    fn offset(&self) -> usize {
        self.base + self.pos
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn peek(&self) -> Result<u8, MidiError> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or(MidiError::Truncated { offset: self.offset() })
    }

    fn u8(&mut self) -> Result<u8, MidiError> {
        let byte = self.peek()?;
        self.pos += 1;
        Ok(byte)
    }

    fn u16(&mut self) -> Result<u16, MidiError> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn u32(&mut self) -> Result<u32, MidiError> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], MidiError> {
        if self.remaining() < len {
            return Err(MidiError::Truncated {
                offset: self.base + self.data.len(),
            });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn vlq(&mut self) -> Result<u32, MidiError> {
        let start = self.offset();
        let mut value = 0u32;
        for _ in 0..4 {
            let byte = self.u8()?;
            value = (value << 7) | u32::from(byte & 0x7F);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(MidiError::InvalidVarLen { offset: start })
    }
}
