//! Full-duplex JSON-RPC 2.0 driver (C6): reads frames, dispatches method
//! calls and notifications to caller-supplied handlers, correlates replies
//! back to outstanding [`call`](JsonRpcDriver::call)s, and serializes
//! outgoing messages through the output channel.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Weak,
};

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncRead, AsyncWrite, BufReader};
use tracing::warn;

use crate::{
    channel::{self, OutputReceiver, OutputSender},
    correlation::CorrelationTable,
    error::DriverError,
    framing::{self, FrameMode},
};

/// Error code used for the automatic reply when no handler claims a method.
pub const METHOD_NOT_FOUND: i64 = -32601;

pub type MethodCallFn =
    Arc<dyn Fn(JsonRpcDriver, String, Value, Value) -> bool + Send + Sync>;
pub type NotificationFn = Arc<dyn Fn(JsonRpcDriver, String, Value) + Send + Sync>;

#[derive(Default)]
pub struct JsonRpcConfig {
    pub frame_mode: FrameMode,
    pub on_method_call: Option<MethodCallFn>,
    pub on_notification: Option<NotificationFn>,
}

struct Inner {
    output: OutputSender,
    pending: CorrelationTable<u64>,
    next_id: AtomicU64,
}

/// Cheap, cloneable handle to a running driver. Handlers receive one of
/// these so they can call back into `reply`/`reply_with_error` from a
/// spawned task, the way an MCP method dispatch does.
#[derive(Clone)]
pub struct JsonRpcDriver(Arc<Inner>);

impl JsonRpcDriver {
    /// Spawns the pump and returns a handle to the running driver. The pump
    /// holds only a [`Weak`] reference back to this handle's state, so
    /// dropping every `JsonRpcDriver` clone lets the pump notice and exit on
    /// its next iteration rather than keeping the transport alive forever.
    pub fn start<R, W>(reader: R, writer: W, config: JsonRpcConfig) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (output, output_rx) = channel::channel();
        let inner = Arc::new(Inner {
            output,
            pending: CorrelationTable::new(),
            next_id: AtomicU64::new(1),
        });
        let weak = Arc::downgrade(&inner);
        let driver = Self(inner);

        let reader = BufReader::new(reader);
        tokio::spawn(run_pump(
            reader,
            writer,
            config.frame_mode,
            output_rx,
            weak,
            config.on_method_call,
            config.on_notification,
        ));

        driver
    }

    /// Sends a request and awaits its correlated reply.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, DriverError> {
        let id = self.0.next_id.fetch_add(1, Ordering::SeqCst);
        let waiter = self.0.pending.insert(id).await;
        let message = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        if let Err(err) = self.0.output.send(message).await {
            self.0.pending.steal(&id).await;
            return Err(err);
        }
        waiter.await_raw().await
    }

    /// Sends a notification (no reply expected, nothing to correlate).
    pub async fn notify(&self, method: &str, params: Value) -> Result<(), DriverError> {
        let message = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        });
        self.0.output.send(message).await
    }

    /// Replies to an inbound method call with a success result.
    pub async fn reply(&self, id: Value, result: Value) -> Result<(), DriverError> {
        let message = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": result,
        });
        self.0.output.send(message).await
    }

    /// Replies to an inbound method call with a JSON-RPC error object.
    pub async fn reply_with_error(
        &self,
        id: Value,
        code: i64,
        message: impl Into<String>,
    ) -> Result<(), DriverError> {
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": { "code": code, "message": message.into() },
        });
        self.0.output.send(payload).await
    }

    pub async fn pending_count(&self) -> usize {
        self.0.pending.len().await
    }
}

async fn run_pump<R, W>(
    mut reader: R,
    mut writer: W,
    frame_mode: FrameMode,
    mut output_rx: OutputReceiver,
    weak: Weak<Inner>,
    on_method_call: Option<MethodCallFn>,
    on_notification: Option<NotificationFn>,
) where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            frame = framing::read_frame(&mut reader, &frame_mode) => {
                match frame {
                    Ok(Some(value)) => {
                        let Some(inner) = weak.upgrade() else { break; };
                        let driver = JsonRpcDriver(inner);
                        let protocol_error =
                            handle_message(&driver, value, &on_method_call, &on_notification).await;
                        if protocol_error {
                            warn!("closing stream after invalid jsonrpc message");
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        warn!("jsonrpc frame decode error: {err}");
                        break;
                    }
                }
            }
            outgoing = output_rx.recv() => {
                match outgoing {
                    Some(value) => {
                        if let Err(err) = framing::write_frame(&mut writer, &frame_mode, &value).await {
                            warn!("jsonrpc frame write error: {err}");
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    output_rx.close();
    if let Some(inner) = weak.upgrade() {
        inner.pending.drain_closed().await;
    }
}

/// Dispatches one decoded value. Returns `true` if the value was an
/// unrecognizable envelope — a protocol error that closes the stream
/// rather than something to silently ignore.
async fn handle_message(
    driver: &JsonRpcDriver,
    value: Value,
    on_method_call: &Option<MethodCallFn>,
    on_notification: &Option<NotificationFn>,
) -> bool {
    if let Value::Array(items) = value {
        for item in items {
            let protocol_error =
                Box::pin(handle_message(driver, item, on_method_call, on_notification)).await;
            if protocol_error {
                return true;
            }
        }
        return false;
    }

    let Some(obj) = value.as_object() else {
        warn!("received non-object, non-array jsonrpc message");
        return true;
    };

    let method = obj.get("method").and_then(Value::as_str);
    let id = obj.get("id").cloned();

    match (method, id) {
        (Some(method), None) => {
            let params = obj.get("params").cloned().unwrap_or(Value::Null);
            if let Some(handler) = on_notification {
                handler(driver.clone(), method.to_string(), params);
            }
            false
        }
        (Some(method), Some(id)) => {
            let params = obj.get("params").cloned().unwrap_or(Value::Null);
            let handled = on_method_call
                .as_ref()
                .map(|handler| handler(driver.clone(), method.to_string(), params, id.clone()))
                .unwrap_or(false);
            if !handled {
                // Spawned rather than awaited inline: this runs on the pump
                // task, and `reply_with_error` awaits a send on the same
                // capacity-1 output channel the pump itself drains. Awaiting
                // it here would deadlock if a concurrent `call`/`notify` had
                // already filled that one slot.
                let driver = driver.clone();
                tokio::spawn(async move {
                    let _ = driver
                        .reply_with_error(id, METHOD_NOT_FOUND, "Method not found")
                        .await;
                });
            }
            false
        }
        (None, Some(id)) => {
            handle_reply(driver, id, obj.get("result").cloned(), obj.get("error").cloned()).await;
            false
        }
        (None, None) => {
            warn!("received jsonrpc message with neither method nor id");
            true
        }
    }
}

async fn handle_reply(
    driver: &JsonRpcDriver,
    id: Value,
    result: Option<Value>,
    error: Option<Value>,
) {
    let Some(numeric_id) = parse_request_id(&id) else {
        warn!("received reply with non-numeric id");
        return;
    };

    let Some(resolver) = driver.0.pending.steal(&numeric_id).await else {
        warn!("received reply for unknown or already-resolved id {numeric_id}");
        return;
    };

    if let Some(error) = error {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or(-1);
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        resolver.resolve(Err(DriverError::Peer { code, message }));
    } else if let Some(result) = result {
        resolver.resolve(Ok(result));
    } else {
        resolver.resolve(Ok(Value::Null));
    }
}

fn parse_request_id(value: &Value) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    value.as_str().and_then(|s| s.parse::<u64>().ok())
}
