//! Counting semaphore limiting how many workers are inside a write at once.
//!
//! Permits are tokens in a bounded channel sized to the permit count: acquiring receives a
//! token, releasing (dropping the [`Permit`]) sends it back.

use crossbeam_channel::{Receiver, Sender, bounded};

pub struct Throttle {
    tokens_tx: Sender<()>,
    tokens_rx: Receiver<()>,
    permits: usize,
}

/// Held for the duration of one write. Returns its token on drop.
pub struct Permit<'a> {
    throttle: &'a Throttle,
}

impl Throttle {
    pub fn new(permits: usize) -> Self {
        let permits = permits.max(1);
        let (tokens_tx, tokens_rx) = bounded(permits);
        for _ in 0..permits {
            let _ = tokens_tx.send(());
        }
        Self {
            tokens_tx,
            tokens_rx,
            permits,
        }
    }

    /// Block until a permit is free.
    pub fn acquire(&self) -> Permit<'_> {
        // Cannot disconnect: `self` holds a sender.
        let _ = self.tokens_rx.recv();
        Permit { throttle: self }
    }

    pub fn permits(&self) -> usize {
        self.permits
    }

    /// Permits not currently held.
    pub fn available(&self) -> usize {
        self.tokens_rx.len()
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        // Never blocks: at most `permits` tokens exist.
        let _ = self.throttle.tokens_tx.send(());
    }
}
