use std::fmt;

/// Largest block the audio source may deliver; longer blocks are truncated.
pub const MAX_BLOCK_SIZE: usize = 2_048;

/// One block's rectified amplitudes.
#[derive(Clone, PartialEq)]
pub struct Frame {
    samples: Vec<f32>,
}

impl Frame {
    pub fn capture(channel: &[f32]) -> Self {
        let len = channel.len().min(MAX_BLOCK_SIZE);
        Self::capture_into(Vec::with_capacity(len), channel)
    }

    fn capture_into(mut storage: Vec<f32>, channel: &[f32]) -> Self {
        storage.clear();
        storage.extend(channel.iter().take(MAX_BLOCK_SIZE).map(|sample| sample.abs()));
        Self { samples: storage }
    }

    #[inline]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("len", &self.samples.len())
            .finish()
    }
}

/// Bounded newest-first history of frames.
///
/// Storage is a fixed ring of `capacity` slots; `head` points at the oldest
/// frame, so pushing at capacity overwrites it in place.
#[derive(Clone)]
pub struct WaveformHistory {
    slots: Vec<Option<Frame>>,
    head: usize,
    len: usize,
    depth: usize,
}

impl WaveformHistory {
    pub fn new(capacity: usize, depth: usize) -> Self {
        assert!(
            capacity > 0,
            "WaveformHistory capacity must be greater than zero"
        );
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);

        Self {
            slots,
            head: 0,
            len: 0,
            depth: depth.clamp(1, capacity),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    #[inline]
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of traces the next refresh will draw.
    #[inline]
    pub fn visible_len(&self) -> usize {
        self.depth.min(self.len)
    }

    /// Clamps `depth` to `[1, capacity]`. Does not touch stored frames.
    pub fn set_depth(&mut self, depth: usize) -> usize {
        self.depth = depth.clamp(1, self.capacity());
        self.depth
    }

    /// Prepends `frame`, returning the evicted oldest frame when full.
    pub fn push(&mut self, frame: Frame) -> Option<Frame> {
        let capacity = self.capacity();

        let idx = if self.is_full() {
            let current = self.head;
            self.head = (self.head + 1) % capacity;
            current
        } else {
            let idx = (self.head + self.len) % capacity;
            debug_assert!(
                self.slots[idx].is_none(),
                "slot should be vacant when history is not full"
            );
            self.len += 1;
            idx
        };

        self.slots[idx].replace(frame)
    }

    /// Captures a frame from a raw channel, recycling the storage of the frame
    /// it evicts once the history is full.
    pub fn record(&mut self, channel: &[f32]) {
        let recycled = if self.is_full() {
            self.slots[self.head].take().map(|frame| frame.samples)
        } else {
            None
        };

        let frame = match recycled {
            Some(storage) => Frame::capture_into(storage, channel),
            None => Frame::capture(channel),
        };
        self.push(frame);
    }

    /// The newest `min(depth, len)` frames, newest first.
    pub fn visible_frames(&self) -> VisibleFrames<'_> {
        VisibleFrames {
            history: self,
            offset: 0,
            remaining: self.visible_len(),
        }
    }

    fn newest_index(&self, offset: usize) -> usize {
        let capacity = self.capacity();
        (self.head + self.len - 1 - offset) % capacity
    }
}

impl fmt::Debug for WaveformHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaveformHistory")
            .field("capacity", &self.capacity())
            .field("len", &self.len)
            .field("depth", &self.depth)
            .finish()
    }
}

/// Newest-first iterator over a [`WaveformHistory`].
#[derive(Clone)]
pub struct VisibleFrames<'a> {
    history: &'a WaveformHistory,
    offset: usize,
    remaining: usize,
}

impl<'a> Iterator for VisibleFrames<'a> {
    type Item = &'a Frame;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let idx = self.history.newest_index(self.offset);
        self.offset += 1;
        self.remaining -= 1;
        self.history.slots[idx].as_ref()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for VisibleFrames<'_> {}
