//! Request/response correlation over one framed stream.
//!
//! A reader thread owns the server's output and forwards whole frames over a
//! channel, which lets every wait be bounded by a timeout. Requests are
//! strictly one at a time: `call` sends a request and consumes frames until
//! the response with the same id shows up, skipping notifications and
//! answering server-initiated requests along the way.

use super::framing::{read_frame, write_frame};
use super::protocol::{Incoming, NotificationMessage, RequestId, RequestMessage, ResponseMessage};
use crate::error::{GocallsError, Result};
use lsp_types::notification::Notification;
use lsp_types::request::Request;
use serde::Serialize;
use serde_json::Value;
use std::io::{BufReader, Read, Write};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

/// A framed JSON-RPC connection.
pub struct Transport<W: Write> {
    writer: W,
    incoming: Receiver<Result<Vec<u8>>>,
    next_id: AtomicI64,
    timeout: Option<Duration>,
}

impl<W: Write> Transport<W> {
    /// Attach to a server's output (`reader`) and input (`writer`).
    ///
    /// `timeout` bounds each wait for a response; `None` waits forever.
    pub fn new<R>(reader: R, writer: W, timeout: Option<Duration>) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("lsp-reader".to_string())
            .spawn(move || pump(BufReader::new(reader), tx))?;

        Ok(Transport {
            writer,
            incoming: rx,
            next_id: AtomicI64::new(1),
            timeout,
        })
    }

    /// Allocate the next request id.
    pub fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Send request `R` and wait for its response.
    pub fn call<R: Request>(&mut self, params: R::Params) -> Result<R::Result> {
        let id = self.next_id();
        self.send(&RequestMessage::new::<R>(id, params)?)?;
        let value = self.await_response(id, R::METHOD)?;
        serde_json::from_value(value).map_err(|e| {
            GocallsError::Protocol(format!("unexpected result for '{}': {}", R::METHOD, e))
        })
    }

    /// Send notification `N`; no response is expected.
    pub fn notify<N: Notification>(&mut self, params: N::Params) -> Result<()> {
        self.send(&NotificationMessage::new::<N>(params)?)
    }

    fn send<T: Serialize>(&mut self, message: &T) -> Result<()> {
        let body = serde_json::to_vec(message)?;
        log::trace!("--> {}", String::from_utf8_lossy(&body));
        write_frame(&mut self.writer, &body)
    }

    fn await_response(&mut self, id: i64, method: &str) -> Result<Value> {
        let expected = RequestId::Number(id);
        let deadline = self.timeout.map(|t| Instant::now() + t);

        loop {
            let frame = self.next_frame(deadline, method)?;
            log::trace!("<-- {}", String::from_utf8_lossy(&frame));

            match Incoming::decode(&frame)? {
                Incoming::Response {
                    id: Some(ref got),
                    outcome,
                } if *got == expected => {
                    return outcome.map_err(|e| server_error(method, e.code, e.message));
                }
                // Only one request is ever outstanding, so an error the
                // server could not attach an id to belongs to it.
                Incoming::Response {
                    id: None,
                    outcome: Err(e),
                } => return Err(server_error(method, e.code, e.message)),
                Incoming::Response { id, .. } => {
                    log::debug!("skipping response with unexpected id {:?}", id);
                }
                Incoming::Notification { method, .. } => {
                    log::trace!("ignoring notification {}", method);
                }
                Incoming::Request { id, method, params } => {
                    self.answer_server_request(id, &method, &params)?;
                }
            }
        }
    }

    fn next_frame(&self, deadline: Option<Instant>, method: &str) -> Result<Vec<u8>> {
        let closed = || {
            GocallsError::Protocol(format!(
                "server closed the connection while waiting for '{}'",
                method
            ))
        };

        match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                self.incoming.recv_timeout(remaining).map_err(|e| match e {
                    RecvTimeoutError::Timeout => GocallsError::Timeout {
                        method: method.to_string(),
                        timeout: self.timeout.unwrap_or_default(),
                    },
                    RecvTimeoutError::Disconnected => closed(),
                })?
            }
            None => self.incoming.recv().map_err(|_| closed())?,
        }
    }

    /// Servers stall if their requests go unanswered, so reply with the
    /// minimal valid result.
    fn answer_server_request(&mut self, id: RequestId, method: &str, params: &Value) -> Result<()> {
        let result = match method {
            "workspace/configuration" => {
                let items = params
                    .get("items")
                    .and_then(Value::as_array)
                    .map_or(0, Vec::len);
                Value::Array(vec![Value::Null; items])
            }
            _ => Value::Null,
        };
        log::trace!("answering server request {} {:?}", method, id);
        self.send(&ResponseMessage::new(id, result))
    }
}

fn server_error(method: &str, code: i64, message: String) -> GocallsError {
    GocallsError::Server {
        method: method.to_string(),
        code,
        message,
    }
}

/// Reader thread body: forward frames until end of stream, a read error, or
/// the transport being dropped.
fn pump<R: Read>(mut reader: BufReader<R>, tx: Sender<Result<Vec<u8>>>) {
    loop {
        match read_frame(&mut reader) {
            Ok(Some(frame)) => {
                if tx.send(Ok(frame)).is_err() {
                    return;
                }
            }
            Ok(None) => return,
            Err(e) => {
                let _ = tx.send(Err(e));
                return;
            }
        }
    }
}
