//! Filter parameters shared between the UI and the audio thread.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

pub const DRIVE_RANGE: (f32, f32) = (1.0, 100.0);
pub const RESONANCE_RANGE: (f32, f32) = (0.0, 1.0);
pub const CUTOFF_RANGE: (f32, f32) = (1.0, 24_000.0);
pub const VOLUME_RANGE: (f32, f32) = (0.0, 1.0);

/// Ladder filter responses; the number is the slope in dB/octave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FilterMode {
    Lpf12,
    Hpf12,
    Bpf12,
    #[default]
    Lpf24,
    Hpf24,
    Bpf24,
}

impl FilterMode {
    pub const ALL: [Self; 6] = [
        Self::Lpf12,
        Self::Hpf12,
        Self::Bpf12,
        Self::Lpf24,
        Self::Hpf24,
        Self::Bpf24,
    ];

    fn index(self) -> u32 {
        match self {
            Self::Lpf12 => 0,
            Self::Hpf12 => 1,
            Self::Bpf12 => 2,
            Self::Lpf24 => 3,
            Self::Hpf24 => 4,
            Self::Bpf24 => 5,
        }
    }

    fn from_index(index: u32) -> Self {
        Self::ALL
            .get(index as usize)
            .copied()
            .unwrap_or_default()
    }

    /// The following mode, wrapping after the last one.
    pub fn next(self) -> Self {
        Self::from_index((self.index() + 1) % Self::ALL.len() as u32)
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Lpf12 => "Low-pass, 12 dB/octave",
            Self::Hpf12 => "High-pass, 12 dB/octave",
            Self::Bpf12 => "Band-pass, 12 dB/octave",
            Self::Lpf24 => "Low-pass, 24 dB/octave",
            Self::Hpf24 => "High-pass, 24 dB/octave",
            Self::Bpf24 => "Band-pass, 24 dB/octave",
        };
        f.write_str(label)
    }
}

#[derive(Debug)]
struct AtomicF32(AtomicU32);

impl AtomicF32 {
    fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Point-in-time copy of [`FilterControls`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlSnapshot {
    pub drive: f32,
    pub resonance: f32,
    pub cutoff: f32,
    pub volume: f32,
    pub mode: FilterMode,
}

impl Default for ControlSnapshot {
    fn default() -> Self {
        Self {
            drive: 1.0,
            resonance: 0.0,
            cutoff: CUTOFF_RANGE.1,
            volume: 0.5,
            mode: FilterMode::default(),
        }
    }
}

/// Single-writer parameter block. Fields are independent relaxed atomics, so a
/// reader may observe a mix of old and new values across fields.
#[derive(Debug)]
pub struct FilterControls {
    drive: AtomicF32,
    resonance: AtomicF32,
    cutoff: AtomicF32,
    volume: AtomicF32,
    mode: AtomicU32,
}

impl Default for FilterControls {
    fn default() -> Self {
        Self::new(ControlSnapshot::default())
    }
}

impl FilterControls {
    pub fn new(initial: ControlSnapshot) -> Self {
        let controls = Self {
            drive: AtomicF32::new(DRIVE_RANGE.0),
            resonance: AtomicF32::new(RESONANCE_RANGE.0),
            cutoff: AtomicF32::new(CUTOFF_RANGE.1),
            volume: AtomicF32::new(VOLUME_RANGE.0),
            mode: AtomicU32::new(FilterMode::default().index()),
        };
        controls.apply(initial);
        controls
    }

    pub fn apply(&self, snapshot: ControlSnapshot) {
        self.set_drive(snapshot.drive);
        self.set_resonance(snapshot.resonance);
        self.set_cutoff_frequency(snapshot.cutoff);
        self.set_volume(snapshot.volume);
        self.set_mode(snapshot.mode);
    }

    pub fn set_drive(&self, drive: f32) {
        self.drive.store(clamp(drive, DRIVE_RANGE));
    }

    pub fn set_resonance(&self, resonance: f32) {
        self.resonance.store(clamp(resonance, RESONANCE_RANGE));
    }

    pub fn set_cutoff_frequency(&self, frequency: f32) {
        self.cutoff.store(clamp(frequency, CUTOFF_RANGE));
    }

    pub fn set_volume(&self, volume: f32) {
        self.volume.store(clamp(volume, VOLUME_RANGE));
    }

    pub fn set_mode(&self, mode: FilterMode) {
        self.mode.store(mode.index(), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ControlSnapshot {
        ControlSnapshot {
            drive: self.drive.load(),
            resonance: self.resonance.load(),
            cutoff: self.cutoff.load(),
            volume: self.volume.load(),
            mode: FilterMode::from_index(self.mode.load(Ordering::Relaxed)),
        }
    }
}

fn clamp(value: f32, (min, max): (f32, f32)) -> f32 {
    if value.is_nan() {
        min
    } else {
        value.clamp(min, max)
    }
}
