//! Output channel (C2): the single path outbound messages take from callers
//! to the pump's writer half. Bounded at capacity 1 so a burst of calls
//! backpressures onto their callers rather than buffering unboundedly, with
//! an explicit [`OutputChannel::close`] so in-flight sends fail fast instead
//! of hanging once the pump is gone.

use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::DriverError;

#[derive(Clone)]
pub struct OutputSender {
    tx: mpsc::Sender<Value>,
}

pub struct OutputReceiver {
    rx: mpsc::Receiver<Value>,
}

/// Creates a linked sender/receiver pair for one driver's outbound side.
pub fn channel() -> (OutputSender, OutputReceiver) {
    let (tx, rx) = mpsc::channel(1);
    (OutputSender { tx }, OutputReceiver { rx })
}

impl OutputSender {
    pub async fn send(&self, value: Value) -> Result<(), DriverError> {
        self.tx
            .send(value)
            .await
            .map_err(|_| DriverError::ChannelClosed)
    }

    /// True once the paired receiver (and therefore the pump) is gone.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl OutputReceiver {
    pub async fn recv(&mut self) -> Option<Value> {
        self.rx.recv().await
    }

    /// Stops accepting new sends; senders already blocked in `send` observe
    /// a closed channel rather than hanging.
    pub fn close(&mut self) {
        self.rx.close();
    }
}
