//! Per-call completion handle (C5): a oneshot-backed waiter that the
//! correlation table hands out on `call()` and the pump fires once when a
//! matching reply, or a shutdown, arrives.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::DriverError;

/// The outcome a pump delivers to a waiting call.
pub type RawReply = Result<Value, DriverError>;

/// Sending half, held by the correlation table and fired exactly once by the
/// pump. Dropping it without calling [`Resolver::resolve`] completes the
/// paired [`Waiter`] with [`DriverError::Cancelled`].
pub struct Resolver {
    tx: oneshot::Sender<RawReply>,
}

impl Resolver {
    pub fn resolve(self, reply: RawReply) {
        let _ = self.tx.send(reply);
    }
}

/// Receiving half, held by the caller of `call()`.
pub struct Waiter {
    rx: oneshot::Receiver<RawReply>,
}

impl Waiter {
    /// Awaits the raw JSON result, with no timeout of its own: wrap this in
    /// `tokio::time::timeout` at the call site when a timeout is wanted.
    pub async fn await_raw(self) -> RawReply {
        match self.rx.await {
            Ok(reply) => reply,
            Err(_) => Err(DriverError::Cancelled),
        }
    }

    /// Awaits and decodes the result as `T`.
    pub async fn await_typed<T: DeserializeOwned>(self) -> Result<T, DriverError> {
        let value = self.await_raw().await?;
        serde_json::from_value(value).map_err(DriverError::Encode)
    }
}

/// Creates a fresh waiter/resolver pair for one in-flight call.
pub fn pair() -> (Resolver, Waiter) {
    let (tx, rx) = oneshot::channel();
    (Resolver { tx }, Waiter { rx })
}
