//! Debug Adapter Protocol client (C7): HTTP-framed JSON messages correlated
//! by `seq`/`request_seq`, layered on the same pump/correlation design as the
//! JSON-RPC driver but keyed on an `i64` sequence number and carrying a third
//! message kind — events — that has no reply to correlate.

use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc, Weak,
};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncRead, AsyncWrite, BufReader};
use tracing::warn;

use crate::{
    channel::{self, OutputReceiver, OutputSender},
    correlation::CorrelationTable,
    error::DapError,
    framing::{self, FrameMode},
};

/// A decoded response payload, still tagged with the command it answers.
#[derive(Debug, Clone)]
pub struct DapResponse {
    pub command: String,
    pub success: bool,
    pub body: Option<Value>,
    pub message: Option<String>,
}

impl DapResponse {
    /// Decodes `body` as `T`, or fails with [`DapError::Peer`] if the peer
    /// reported `success: false`.
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<T, DapError> {
        if !self.success {
            return Err(DapError::Peer(
                self.message.unwrap_or_else(|| "request failed".into()),
            ));
        }
        let body = self.body.unwrap_or(Value::Null);
        serde_json::from_value(body).map_err(|source| DapError::Decode {
            expected: "response body",
            source,
        })
    }
}

pub type EventFn = Arc<dyn Fn(DapClient, String, Value) + Send + Sync>;
/// Handles a reverse request the peer sent us. Returns `true` once it has
/// taken ownership of replying (typically via a spawned task calling
/// [`DapClient::respond`]).
pub type RequestFn = Arc<dyn Fn(DapClient, i64, String, Value) -> bool + Send + Sync>;

#[derive(Default)]
pub struct DapConfig {
    pub on_event: Option<EventFn>,
    pub on_request: Option<RequestFn>,
}

struct Inner {
    output: OutputSender,
    pending: CorrelationTable<i64>,
    next_seq: AtomicI64,
}

#[derive(Clone)]
pub struct DapClient(Arc<Inner>);

impl DapClient {
    pub fn start<R, W>(reader: R, writer: W, config: DapConfig) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (output, output_rx) = channel::channel();
        let inner = Arc::new(Inner {
            output,
            pending: CorrelationTable::new(),
            next_seq: AtomicI64::new(0),
        });
        let weak = Arc::downgrade(&inner);
        let client = Self(inner);

        let reader = BufReader::new(reader);
        tokio::spawn(run_pump(
            reader,
            writer,
            output_rx,
            weak,
            config.on_event,
            config.on_request,
        ));

        client
    }

    /// Sends a request and awaits its correlated response.
    pub async fn call(&self, command: &str, arguments: Value) -> Result<DapResponse, DapError> {
        let seq = self.0.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let waiter = self.0.pending.insert(seq).await;
        let message = serde_json::json!({
            "seq": seq,
            "type": "request",
            "command": command,
            "arguments": arguments,
        });
        if let Err(err) = self.0.output.send(message).await {
            self.0.pending.steal(&seq).await;
            return Err(err.into());
        }
        let value = waiter.await_raw().await.map_err(DapError::from)?;
        decode_response(value)
    }

    /// Replies to a reverse request the peer sent us.
    pub async fn respond(
        &self,
        request_seq: i64,
        success: bool,
        body: Option<Value>,
    ) -> Result<(), DapError> {
        let seq = self.0.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let mut message = serde_json::json!({
            "seq": seq,
            "type": "response",
            "request_seq": request_seq,
            "success": success,
        });
        if let Some(body) = body {
            message["body"] = body;
        }
        self.0.output.send(message).await.map_err(DapError::from)
    }

    pub async fn pending_count(&self) -> usize {
        self.0.pending.len().await
    }
}

fn decode_response(value: Value) -> Result<DapResponse, DapError> {
    let command = value
        .get("command")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let success = value
        .get("success")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let body = value.get("body").cloned();
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .map(|s| s.to_string());
    Ok(DapResponse {
        command,
        success,
        body,
        message,
    })
}

async fn run_pump<R, W>(
    mut reader: R,
    mut writer: W,
    mut output_rx: OutputReceiver,
    weak: Weak<Inner>,
    on_event: Option<EventFn>,
    on_request: Option<RequestFn>,
) where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mode = FrameMode::Http;
    loop {
        tokio::select! {
            frame = framing::read_frame(&mut reader, &mode) => {
                match frame {
                    Ok(Some(value)) => {
                        let Some(inner) = weak.upgrade() else { break; };
                        let client = DapClient(inner);
                        let protocol_error = handle_message(&client, value, &on_event, &on_request).await;
                        if protocol_error {
                            warn!("closing stream after invalid dap message");
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        warn!("dap frame decode error: {err}");
                        break;
                    }
                }
            }
            outgoing = output_rx.recv() => {
                match outgoing {
                    Some(value) => {
                        if let Err(err) = framing::write_frame(&mut writer, &mode, &value).await {
                            warn!("dap frame write error: {err}");
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

/// Dispatches one decoded DAP message. Returns `true` if `type` was absent
/// or not one of `request`/`response`/`event` — a protocol error that closes
/// the stream rather than something to silently ignore.
async fn handle_message(
    client: &DapClient,
    value: Value,
    on_event: &Option<EventFn>,
    on_request: &Option<RequestFn>,
) -> bool {
    let message_type = value.get("type").and_then(Value::as_str);

    match message_type {
        Some("response") => {
            let Some(request_seq) = value.get("request_seq").and_then(Value::as_i64) else {
                warn!("dap response missing request_seq");
                return false;
            };
            let Some(resolver) = client.0.pending.steal(&request_seq).await else {
                warn!("dap response for unknown or already-resolved request_seq {request_seq}");
                return false;
            };
            resolver.resolve(Ok(value));
            false
        }
        Some("event") => {
            let event = value
                .get("event")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let body = value.get("body").cloned().unwrap_or(Value::Null);
            if let Some(handler) = on_event {
                handler(client.clone(), event, body);
            }
            false
        }
        Some("request") => {
            let Some(seq) = value.get("seq").and_then(Value::as_i64) else {
                warn!("dap reverse request missing seq");
                return false;
            };
            let command = value
                .get("command")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let arguments = value.get("arguments").cloned().unwrap_or(Value::Null);
            let handled = on_request
                .as_ref()
                .map(|handler| handler(client.clone(), seq, command, arguments))
                .unwrap_or(false);
            if !handled {
                warn!("unhandled dap reverse request, seq {seq}");
            }
            false
        }
        other => {
            warn!("invalid dap message type: {other:?}");
            true
        }
    }
}
