//! Outbound frame buffer
//!
//! Holds frames accepted while no open, authenticated transport exists.
//! Cleared only on explicit teardown; a transient disconnect keeps
//! everything so user-authored messages survive a flaky network.

use crate::error::ConnectionError;
use crate::traits::{FrameCodec, OutboundFrame, Transport};
use std::collections::VecDeque;
use tracing::{debug, error};

#[derive(Debug, Default)]
pub struct OutboundQueue {
    frames: VecDeque<OutboundFrame>,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, frame: OutboundFrame) {
        self.frames.push_back(frame);
    }

    /// Put a frame back at the head, ahead of everything queued
    pub fn requeue_front(&mut self, frame: OutboundFrame) {
        self.frames.push_front(frame);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Discard all pending frames, returning how many were dropped
    pub fn clear(&mut self) -> usize {
        let dropped = self.frames.len();
        self.frames.clear();
        dropped
    }

    /// Transmit queued frames in FIFO order
    ///
    /// Stops at the first transport failure; the failed frame and
    /// everything behind it stay queued. Frames the codec cannot encode
    /// are logged and dropped since retrying cannot fix them.
    ///
    /// Returns the number of frames written.
    pub async fn flush(
        &mut self,
        transport: &mut dyn Transport,
        codec: &dyn FrameCodec,
    ) -> Result<usize, ConnectionError> {
        let mut written = 0;

        while let Some(frame) = self.frames.pop_front() {
            let message = match codec.encode(&frame) {
                Ok(message) => message,
                Err(e) => {
                    error!(error = %e, "Dropping queued frame that cannot be encoded");
                    continue;
                }
            };

            if let Err(e) = transport.send(message).await {
                self.frames.push_front(frame);
                return Err(e);
            }
            written += 1;
        }

        if written > 0 {
            debug!("Flushed {} queued frames", written);
        }
        Ok(written)
    }
}
