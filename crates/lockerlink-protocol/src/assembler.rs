//! Frame assembler for locker byte streams.
//!
//! Serial ports deliver bytes in arbitrary chunks, sometimes one byte at a
//! time, and the locker protocol carries no length prefix that could be read
//! before the frame is complete. Frame boundaries are therefore found by
//! matching the literal markers `POST:` and `\r\n` against two sliding
//! windows that are updated one byte at a time. The windows live in the
//! assembler, so a marker split across two chunks is still recognised.
//!
//! # Usage
//!
//! ```
//! use lockerlink_protocol::FrameAssembler;
//!
//! let mut assembler = FrameAssembler::new();
//!
//! assembler.feed(b"noise POS");
//! assembler.feed(b"T:1,1,10,4,0001=DF26\r");
//! assert!(assembler.next_frame().is_none());
//!
//! assembler.feed(b"\n");
//! let frame = assembler.next_frame().unwrap();
//! assert_eq!(frame.as_bytes(), b"POST:1,1,10,4,0001=DF26\r\n");
//! ```

use crate::frame::Frame;
use bytes::BytesMut;
use lockerlink_core::constants::{FRAME_END, FRAME_START, MAX_FRAME_LEN};
use std::collections::VecDeque;

const START_LEN: usize = FRAME_START.len();
const END_LEN: usize = FRAME_END.len();

const INITIAL_FRAME_QUEUE_CAPACITY: usize = 4;

/// Whether the assembler is inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerState {
    /// Scanning for the start marker. Bytes seen here are discarded.
    Idle,
    /// Start marker seen, collecting bytes until the end marker.
    Gathering,
}

/// Recovers complete frames from an arbitrarily chunked byte stream.
///
/// # State Machine
///
/// ```text
/// ┌──────┐  window == "POST:"   ┌───────────┐  window == "\r\n"  ┌─────────────┐
/// │ Idle │─────────────────────>│ Gathering │───────────────────>│ Frame ready │
/// └──────┘                      └───────────┘                    └─────────────┘
///    ^                            │       ^                              │
///    │   buffer > MAX_FRAME_LEN   │       │ window == "POST:"            │
///    ├────────────────────────────┘       └ (partial frame discarded)    │
///    └───────────────────────────────────────────────────────────────────┘
/// ```
///
/// A start marker seen while gathering abandons the partial frame and starts
/// a new one. Frames are queued in arrival order, so several frames in one
/// chunk are all delivered.
///
/// One assembler serves one byte stream. It holds per-stream window state
/// and must not be shared between transports.
#[derive(Debug)]
pub struct FrameAssembler {
    start_window: [u8; START_LEN],
    end_window: [u8; END_LEN],
    state: AssemblerState,
    buffer: BytesMut,
    frames: VecDeque<Frame>,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self {
            start_window: [0; START_LEN],
            end_window: [0; END_LEN],
            state: AssemblerState::Idle,
            buffer: BytesMut::with_capacity(MAX_FRAME_LEN),
            frames: VecDeque::with_capacity(INITIAL_FRAME_QUEUE_CAPACITY),
        }
    }

    /// Feed a chunk of the byte stream.
    ///
    /// Every frame completed by this chunk is queued for
    /// [`next_frame`](Self::next_frame).
    pub fn feed(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.push_byte(byte);
        }
    }

    /// Next complete frame, if any.
    pub fn next_frame(&mut self) -> Option<Frame> {
        self.frames.pop_front()
    }

    pub fn state(&self) -> AssemblerState {
        self.state
    }

    pub fn frames_available(&self) -> usize {
        self.frames.len()
    }

    /// Bytes of the frame currently being gathered.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Drop all partial and queued frames and forget the window contents.
    pub fn clear(&mut self) {
        self.start_window = [0; START_LEN];
        self.end_window = [0; END_LEN];
        self.buffer.clear();
        self.frames.clear();
        self.state = AssemblerState::Idle;
    }

    /// Iterator over the currently queued frames.
    ///
    /// ```
    /// use lockerlink_protocol::FrameAssembler;
    ///
    /// let mut assembler = FrameAssembler::new();
    /// assembler.feed(b"POST:1,1,10,4,0001=DF26\r\nPOST:1,1,10,4,0003=BF27\r\n");
    ///
    /// let frames: Vec<_> = assembler.drain_frames().collect();
    /// assert_eq!(frames.len(), 2);
    /// assert_eq!(assembler.frames_available(), 0);
    /// ```
    pub fn drain_frames(&mut self) -> DrainFrames<'_> {
        DrainFrames { assembler: self }
    }

    fn push_byte(&mut self, byte: u8) {
        slide(&mut self.start_window, byte);
        slide(&mut self.end_window, byte);

        if self.start_window == FRAME_START {
            // Either a fresh frame or a restart that abandons the partial one
            self.begin_frame();
            return;
        }

        if self.state == AssemblerState::Idle {
            return;
        }

        self.buffer.extend_from_slice(&[byte]);

        if self.end_window == FRAME_END {
            self.complete_frame();
        } else if self.buffer.len() > MAX_FRAME_LEN {
            self.abandon_frame();
        }
    }

    fn begin_frame(&mut self) {
        self.buffer.clear();
        self.buffer.extend_from_slice(FRAME_START);
        self.state = AssemblerState::Gathering;
    }

    fn complete_frame(&mut self) {
        let data = self.buffer.split().freeze();
        self.frames.push_back(Frame::new(data));
        self.state = AssemblerState::Idle;
    }

    fn abandon_frame(&mut self) {
        self.buffer.clear();
        self.state = AssemblerState::Idle;
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Shift `window` left by one byte and append `byte`.
fn slide<const N: usize>(window: &mut [u8; N], byte: u8) {
    window.copy_within(1.., 0);
    window[N - 1] = byte;
}

/// Iterator returned by [`FrameAssembler::drain_frames`].
pub struct DrainFrames<'a> {
    assembler: &'a mut FrameAssembler,
}

impl Iterator for DrainFrames<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Self::Item> {
        self.assembler.next_frame()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.assembler.frames_available();
        (len, Some(len))
    }
}

impl ExactSizeIterator for DrainFrames<'_> {
    fn len(&self) -> usize {
        self.assembler.frames_available()
    }
}
