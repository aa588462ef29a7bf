//! Demo signal chain: a plucked saw wave through a four-pole ladder filter,
//! published one block per block period.

use super::controls::{ControlSnapshot, FilterControls, FilterMode};
use super::tap::TapWriter;
use anyhow::{Context, Result};
use std::f32::consts::PI;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info};

const PLUCK_INTERVAL: Duration = Duration::from_millis(600);
const PLUCK_DECAY_SECONDS: f32 = 0.35;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneConfig {
    pub sample_rate: f32,
    pub block_size: usize,
    pub frequency: f32,
}

impl Default for ToneConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000.0,
            block_size: 1_024,
            frequency: 110.0,
        }
    }
}

/// Tanh-saturated four-pole ladder.
#[derive(Debug, Clone, Default)]
struct Ladder {
    stages: [f32; 4],
}

impl Ladder {
    fn process(&mut self, input: f32, controls: &ControlSnapshot, sample_rate: f32) -> f32 {
        let nyquist = sample_rate * 0.45;
        let cutoff = controls.cutoff.min(nyquist);
        let g = 1.0 - (-2.0 * PI * cutoff / sample_rate).exp();
        let feedback = 4.0 * controls.resonance;
        let gain = 1.0 + (controls.drive - 1.0) * 0.1;

        let y0 = (input * gain - feedback * self.stages[3]).tanh();
        let mut x = y0;
        for stage in &mut self.stages {
            *stage += g * (x.tanh() - stage.tanh());
            x = *stage;
        }

        let [y1, y2, y3, y4] = self.stages;
        let taps = mode_taps(controls.mode);
        taps[0] * y0 + taps[1] * y1 + taps[2] * y2 + taps[3] * y3 + taps[4] * y4
    }
}

fn mode_taps(mode: FilterMode) -> [f32; 5] {
    match mode {
        FilterMode::Lpf12 => [0.0, 0.0, 1.0, 0.0, 0.0],
        FilterMode::Hpf12 => [1.0, -2.0, 1.0, 0.0, 0.0],
        FilterMode::Bpf12 => [0.0, 0.0, -1.0, 1.0, 0.0],
        FilterMode::Lpf24 => [0.0, 0.0, 0.0, 0.0, 1.0],
        FilterMode::Hpf24 => [1.0, -4.0, 6.0, -4.0, 1.0],
        FilterMode::Bpf24 => [0.0, 0.0, 1.0, -2.0, 1.0],
    }
}

/// Renders consecutive blocks of the demo signal.
#[derive(Debug, Clone)]
pub struct ToneSynth {
    config: ToneConfig,
    phase: f32,
    envelope_time: f32,
    ladder: Ladder,
    block: Vec<f32>,
}

impl ToneSynth {
    pub fn new(config: ToneConfig) -> Self {
        Self {
            config,
            phase: 0.0,
            envelope_time: 0.0,
            ladder: Ladder::default(),
            block: vec![0.0; config.block_size],
        }
    }

    pub fn render_block(&mut self, controls: &ControlSnapshot) -> &[f32] {
        let dt = 1.0 / self.config.sample_rate;
        let increment = self.config.frequency * dt;
        let pluck = PLUCK_INTERVAL.as_secs_f32();

        for sample in &mut self.block {
            let saw = 2.0 * self.phase - 1.0;
            let envelope = (-self.envelope_time / PLUCK_DECAY_SECONDS).exp();
            let filtered = self.ladder.process(saw * envelope, controls, self.config.sample_rate);
            *sample = (filtered * controls.volume).clamp(-1.0, 1.0);

            self.phase = (self.phase + increment).fract();
            self.envelope_time += dt;
            if self.envelope_time >= pluck {
                self.envelope_time -= pluck;
            }
        }

        &self.block
    }

    fn block_period(&self) -> Duration {
        Duration::from_secs_f32(self.config.block_size as f32 / self.config.sample_rate)
    }
}

/// Handle to the running tone thread; stops it on drop.
pub struct ToneHandle {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ToneHandle {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            debug!("[tone] generator thread panicked");
        }
    }
}

impl Drop for ToneHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

pub fn spawn(
    config: ToneConfig,
    controls: Arc<FilterControls>,
    mut writer: TapWriter,
) -> Result<ToneHandle> {
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);

    let thread = thread::Builder::new()
        .name("ladderscope-tone".into())
        .spawn(move || {
            let mut synth = ToneSynth::new(config);
            let period = synth.block_period();
            let mut deadline = Instant::now();
            info!(
                "[tone] generating {:.0} Hz at {:.0} Hz, {} samples per block",
                config.frequency, config.sample_rate, config.block_size
            );

            while flag.load(Ordering::Acquire) {
                let block = synth.render_block(&controls.snapshot());
                writer.publish(block, block);

                deadline += period;
                let now = Instant::now();
                if deadline > now {
                    thread::sleep(deadline - now);
                } else {
                    deadline = now;
                }
            }
            debug!("[tone] generator stopped");
        })
        .context("failed to spawn tone generator thread")?;

    Ok(ToneHandle {
        running,
        thread: Some(thread),
    })
}
