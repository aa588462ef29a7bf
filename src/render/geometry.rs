//! Turns one amplitude frame into the position and colour streams of a trace.

use super::history::Frame;

/// Horizontal distance between neighbouring samples.
pub const SAMPLE_STEP: f32 = 0.001;
/// Vertical offset applied to every (rectified) amplitude.
pub const BASELINE: f32 = -0.5;
/// Depth separation between consecutive slots.
pub const SLOT_DEPTH: f32 = -0.5;

pub const POSITION_COMPONENTS: usize = 3;
pub const COLOUR_COMPONENTS: usize = 4;

const GREEN_BASE: f32 = 0.57;
const DRIVE_SCALE: f32 = 100.0;

/// Control values that tint a trace.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TraceParams {
    pub drive: f32,
    pub resonance: f32,
}

impl TraceParams {
    fn rgb(self) -> [f32; 3] {
        let drive = self.drive / DRIVE_SCALE;
        [
            0.0,
            (GREEN_BASE - self.resonance - drive).clamp(0.0, 1.0),
            (1.0 - drive).clamp(0.0, 1.0),
        ]
    }
}

/// Reusable output of [`encode`]; vectors keep their capacity between calls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncodedTrace {
    pub positions: Vec<f32>,
    pub colours: Vec<f32>,
}

impl EncodedTrace {
    pub fn with_capacity(vertices: usize) -> Self {
        Self {
            positions: Vec::with_capacity(vertices * POSITION_COMPONENTS),
            colours: Vec::with_capacity(vertices * COLOUR_COMPONENTS),
        }
    }

    #[inline]
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / POSITION_COMPONENTS
    }
}

/// Encodes `frame` as the trace for `slot` into `out`, replacing its contents.
pub fn encode(frame: &Frame, slot: usize, params: TraceParams, out: &mut EncodedTrace) {
    let samples = frame.samples();
    let len = samples.len();

    out.positions.clear();
    out.colours.clear();
    if len == 0 {
        return;
    }

    let half = len as f32 * 0.5;
    let left = -half * SAMPLE_STEP;
    let z = SLOT_DEPTH * slot as f32;
    let [r, g, b] = params.rgb();

    for (index, &amplitude) in samples.iter().enumerate() {
        let x = left + index as f32 * SAMPLE_STEP;
        out.positions.extend_from_slice(&[x, BASELINE + amplitude, z]);

        let alpha = (1.0 - (index as f32 / half - 1.0).abs()).clamp(0.0, 1.0);
        out.colours.extend_from_slice(&[r, g, b, alpha]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize) -> Frame {
        let samples: Vec<f32> = (0..len).map(|i| (i as f32 * 0.37).sin()).collect();
        Frame::capture(&samples)
    }

    #[test]
    fn output_lengths_follow_the_frame() {
        let mut out = EncodedTrace::default();
        for len in [1, 7, 256, 2048] {
            encode(&ramp(len), 0, TraceParams::default(), &mut out);
            assert_eq!(out.positions.len(), len * POSITION_COMPONENTS);
            assert_eq!(out.colours.len(), len * COLOUR_COMPONENTS);
            assert_eq!(out.vertex_count(), len);
        }
    }

    #[test]
    fn encoding_is_deterministic_and_leaves_the_frame_alone() {
        let frame = ramp(300);
        let before = frame.clone();
        let params = TraceParams {
            drive: 42.0,
            resonance: 0.3,
        };

        let mut first = EncodedTrace::default();
        let mut second = EncodedTrace::with_capacity(300);
        encode(&frame, 3, params, &mut first);
        encode(&frame, 3, params, &mut second);

        assert_eq!(frame, before);
        let bits = |values: &[f32]| values.iter().map(|v| v.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&first.positions), bits(&second.positions));
        assert_eq!(bits(&first.colours), bits(&second.colours));
    }

    #[test]
    fn window_is_centred_and_slots_recede() {
        let frame = Frame::capture(&[0.0, -0.25, 0.5, 1.0]);
        let mut out = EncodedTrace::default();
        encode(&frame, 2, TraceParams::default(), &mut out);

        let xs: Vec<f32> = out.positions.chunks_exact(3).map(|p| p[0]).collect();
        let ys: Vec<f32> = out.positions.chunks_exact(3).map(|p| p[1]).collect();
        let zs: Vec<f32> = out.positions.chunks_exact(3).map(|p| p[2]).collect();

        assert!((xs[0] + 0.002).abs() < 1e-6);
        assert!((xs[3] - 0.001).abs() < 1e-6);
        assert_eq!(ys, vec![-0.5, -0.25, 0.0, 0.5]);
        assert!(zs.iter().all(|&z| z == -1.0));
    }

    #[test]
    fn alpha_fades_towards_both_edges() {
        let mut out = EncodedTrace::default();
        encode(&ramp(100), 0, TraceParams::default(), &mut out);
        let alphas: Vec<f32> = out.colours.chunks_exact(4).map(|c| c[3]).collect();

        assert_eq!(alphas[0], 0.0);
        assert_eq!(alphas[50], 1.0);
        assert!(alphas[10] < alphas[40]);
        assert!(alphas[90] < alphas[60]);
    }

    #[test]
    fn drive_and_resonance_tint_the_trace() {
        let mut out = EncodedTrace::default();
        let frame = ramp(8);

        encode(&frame, 0, TraceParams::default(), &mut out);
        assert_eq!(&out.colours[..3], &[0.0, 0.57, 1.0]);

        let params = TraceParams {
            drive: 50.0,
            resonance: 0.05,
        };
        encode(&frame, 0, params, &mut out);
        assert!((out.colours[1] - 0.02).abs() < 1e-6);
        assert!((out.colours[2] - 0.5).abs() < 1e-6);

        let hot = TraceParams {
            drive: 100.0,
            resonance: 1.0,
        };
        encode(&frame, 0, hot, &mut out);
        assert_eq!(&out.colours[..3], &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn empty_frame_encodes_nothing() {
        let mut out = EncodedTrace::default();
        encode(&ramp(16), 0, TraceParams::default(), &mut out);
        encode(&Frame::capture(&[]), 0, TraceParams::default(), &mut out);
        assert!(out.positions.is_empty());
        assert!(out.colours.is_empty());
    }
}
