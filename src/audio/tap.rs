//! Lock-free hand-off of the most recent audio block to the render thread.

use triple_buffer::TripleBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Left,
    #[cfg_attr(not(test), allow(dead_code))]
    Right,
}

/// Read-only view of one audio block.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockView<'a> {
    left: &'a [f32],
    right: &'a [f32],
}

impl<'a> BlockView<'a> {
    pub fn new(left: &'a [f32], right: &'a [f32]) -> Self {
        debug_assert_eq!(left.len(), right.len(), "channel lengths differ");
        Self { left, right }
    }

    pub const fn empty() -> Self {
        Self {
            left: &[],
            right: &[],
        }
    }

    #[inline]
    pub fn sample_count(&self) -> usize {
        self.left.len()
    }

    #[inline]
    pub fn channel_data(&self, channel: Channel) -> &'a [f32] {
        match channel {
            Channel::Left => self.left,
            Channel::Right => self.right,
        }
    }
}

/// Anything the renderer can pull audio blocks from.
pub trait AudioSource {
    /// The block published since the previous call, or an empty view when
    /// nothing new arrived.
    fn latest_block(&mut self) -> BlockView<'_>;
}

#[derive(Debug, Clone, Default)]
struct CapturedBlock {
    sequence: u64,
    left: Vec<f32>,
    right: Vec<f32>,
}

/// Producer half; owned by the audio thread.
pub struct TapWriter {
    input: triple_buffer::Input<CapturedBlock>,
    sequence: u64,
}

/// Consumer half; owned by the render thread.
pub struct TapReader {
    output: triple_buffer::Output<CapturedBlock>,
    last_sequence: u64,
}

pub fn tap() -> (TapWriter, TapReader) {
    let (input, output) = TripleBuffer::new(&CapturedBlock::default()).split();
    (
        TapWriter { input, sequence: 0 },
        TapReader {
            output,
            last_sequence: 0,
        },
    )
}

impl TapWriter {
    /// Publishes a stereo block. Never blocks.
    pub fn publish(&mut self, left: &[f32], right: &[f32]) {
        self.sequence = self.sequence.wrapping_add(1).max(1);
        self.input.write(CapturedBlock {
            sequence: self.sequence,
            left: left.to_vec(),
            right: right.to_vec(),
        });
    }
}

impl AudioSource for TapReader {
    fn latest_block(&mut self) -> BlockView<'_> {
        let block = self.output.read();
        if block.sequence == self.last_sequence {
            return BlockView::empty();
        }
        self.last_sequence = block.sequence;

        let len = block.left.len().min(block.right.len());
        BlockView::new(&block.left[..len], &block.right[..len])
    }
}
