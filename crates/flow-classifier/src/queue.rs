//! A FIFO staging queue for frames awaiting classification.

use std::cmp::Ordering;
use std::collections::VecDeque;

/// One received frame: the ingress port it arrived on and its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub in_port: u16,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(in_port: u16, data: Vec<u8>) -> Self {
        Frame { in_port, data }
    }
}

/// A FIFO queue of [`Frame`]s.
///
/// Frames leave in arrival order unless [`sort_by`](PacketQueue::sort_by)
/// reorders them; the sort is stable, so ties keep their arrival order.
///
/// # Examples
///
/// ```
/// use flow_classifier::{Frame, PacketQueue};
///
/// let mut queue = PacketQueue::new();
/// queue.enqueue(Frame::new(1, vec![0xca, 0xfe]));
/// queue.enqueue(Frame::new(2, vec![0xbe, 0xef]));
///
/// assert_eq!(queue.dequeue().unwrap().in_port, 1);
/// assert_eq!(queue.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct PacketQueue {
    frames: VecDeque<Frame>,
}

impl PacketQueue {
    pub fn new() -> Self {
        PacketQueue {
            frames: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Appends a frame at the tail.
    pub fn enqueue(&mut self, frame: Frame) {
        self.frames.push_back(frame);
    }

    /// Removes and returns the head frame, or `None` if the queue is empty.
    pub fn dequeue(&mut self) -> Option<Frame> {
        self.frames.pop_front()
    }

    /// Returns the head frame without removing it.
    pub fn peek(&self) -> Option<&Frame> {
        self.frames.front()
    }

    /// Reorders the queued frames by `compare`; equal frames keep their
    /// arrival order.
    pub fn sort_by<F>(&mut self, compare: F)
    where
        F: FnMut(&Frame, &Frame) -> Ordering,
    {
        self.frames.make_contiguous().sort_by(compare);
    }
}
