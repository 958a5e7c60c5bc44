//! In-memory radio pair for exercising a client and a server in one process.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::error::LinkError;

use super::RadioLink;

type FrameQueue = Rc<RefCell<VecDeque<Vec<u8>>>>;

/// One end of a connected in-memory link. Frames transmitted on one end
/// become pollable on the other, in order, without loss or corruption.
///
/// Single-threaded by construction, matching the protocol's cooperative
/// model; drive both ends from the same loop.
pub struct LoopbackLink {
    tx: FrameQueue,
    rx: FrameQueue,
    frames_sent: usize,
}

impl LoopbackLink {
    /// Create a connected pair.
    pub fn pair() -> (Self, Self) {
        let a_to_b: FrameQueue = Rc::new(RefCell::new(VecDeque::new()));
        let b_to_a: FrameQueue = Rc::new(RefCell::new(VecDeque::new()));
        (
            Self {
                tx: Rc::clone(&a_to_b),
                rx: Rc::clone(&b_to_a),
                frames_sent: 0,
            },
            Self {
                tx: b_to_a,
                rx: a_to_b,
                frames_sent: 0,
            },
        )
    }

    /// Number of frames this end has transmitted.
    pub fn frames_sent(&self) -> usize {
        self.frames_sent
    }

    /// Inject a raw frame into this end's receive queue, bypassing the peer.
    pub fn inject(&mut self, frame: &[u8]) {
        self.rx.borrow_mut().push_back(frame.to_vec());
    }
}

impl RadioLink for LoopbackLink {
    fn transmit(&mut self, frame: &[u8]) -> Result<(), LinkError> {
        self.tx.borrow_mut().push_back(frame.to_vec());
        self.frames_sent += 1;
        Ok(())
    }

    fn poll_frame(&mut self, buf: &mut [u8]) -> Result<usize, LinkError> {
        let Some(frame) = self.rx.borrow_mut().pop_front() else {
            return Ok(0);
        };
        if frame.len() > buf.len() {
            return Err(LinkError::ReceiveFailed("frame exceeds receive buffer"));
        }
        buf[..frame.len()].copy_from_slice(&frame);
        Ok(frame.len())
    }

    fn reset(&mut self) {}
}
