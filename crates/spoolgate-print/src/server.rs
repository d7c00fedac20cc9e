// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Streaming print service.
//
// Speaks newline-delimited JSON over TCP. Each connection may open any
// number of sessions; requests are tagged with a session identifier and the
// reply is routed back through that session's handle. A connection's write
// half is owned by a single writer task draining an mpsc channel, which
// gives per-session reply ordering for free.
//
// The same request/response types also serve the one-shot mode, where a
// single request is read from one stream and the reply written to another
// with no session bookkeeping.

use std::net::SocketAddr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Notify, mpsc};
use tracing::{debug, error, info, warn};

use spoolgate_core::config::AppConfig;
use spoolgate_core::error::{Result, SpoolgateError};
use spoolgate_core::options::PrintOptions;
use spoolgate_core::types::{RenderKind, SessionId, UploadEncoding};
use spoolgate_document::render::RenderOverrides;

use crate::pipeline::{FilePrintRequest, PrintOutcome, PrintPipeline, UploadPrintRequest};
use crate::session::SessionRegistry;

fn default_copies() -> u32 {
    1
}

/// One wire request. `op` selects the operation; unknown fields are ignored
/// so clients can carry their own bookkeeping.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Request {
    OpenSession,
    PrintFile {
        session: Option<SessionId>,
        path: String,
        printer: Option<String>,
        #[serde(default = "default_copies")]
        copies: u32,
        #[serde(default)]
        options: String,
        render_markdown: Option<bool>,
        render_code: Option<bool>,
        #[serde(default)]
        skip_confirmation: bool,
    },
    PrintUpload {
        session: Option<SessionId>,
        filename: String,
        content: String,
        encoding: UploadEncoding,
        printer: Option<String>,
        #[serde(default = "default_copies")]
        copies: u32,
        #[serde(default)]
        options: String,
        render_markdown: Option<bool>,
        render_code: Option<bool>,
        #[serde(default)]
        skip_confirmation: bool,
    },
    ListPrinters {
        session: Option<SessionId>,
    },
    QueueStatus {
        session: Option<SessionId>,
        printer: Option<String>,
    },
    CloseSession {
        session: SessionId,
    },
}

impl Request {
    /// Session carried by the request, if the operation has one.
    fn session(&self) -> Option<&SessionId> {
        match self {
            Request::OpenSession => None,
            Request::PrintFile { session, .. }
            | Request::PrintUpload { session, .. }
            | Request::ListPrinters { session }
            | Request::QueueStatus { session, .. } => session.as_ref(),
            Request::CloseSession { session } => Some(session),
        }
    }
}

/// One wire reply. The confirmation halt is a distinct non-error status;
/// typed failures carry a `kind` from the error taxonomy.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum Response {
    Ok {
        #[serde(skip_serializing_if = "Option::is_none")]
        session: Option<SessionId>,
        #[serde(skip_serializing_if = "Option::is_none")]
        printer: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        render_kind: Option<RenderKind>,
        #[serde(skip_serializing_if = "Option::is_none")]
        output: Option<String>,
    },
    AwaitingConfirmation {
        sheets: usize,
        threshold: usize,
    },
    Error {
        kind: &'static str,
        message: String,
    },
}

impl Response {
    fn ok() -> Self {
        Response::Ok {
            session: None,
            printer: None,
            render_kind: None,
            output: None,
        }
    }

    fn session(id: SessionId) -> Self {
        Response::Ok {
            session: Some(id),
            printer: None,
            render_kind: None,
            output: None,
        }
    }

    fn output(text: String) -> Self {
        Response::Ok {
            session: None,
            printer: None,
            render_kind: None,
            output: Some(text),
        }
    }

    fn from_outcome(outcome: PrintOutcome) -> Self {
        match outcome {
            PrintOutcome::Printed {
                printer,
                render_kind,
            } => Response::Ok {
                session: None,
                printer: Some(printer),
                render_kind,
                output: None,
            },
            PrintOutcome::AwaitingConfirmation { sheets, threshold } => {
                Response::AwaitingConfirmation { sheets, threshold }
            }
        }
    }

    fn from_error(err: &SpoolgateError) -> Self {
        Response::Error {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    fn to_line(&self) -> String {
        // Serialising a data-only enum cannot fail; the fallback keeps the
        // connection alive if it somehow does.
        serde_json::to_string(self).unwrap_or_else(|e| {
            error!(error = %e, "failed to serialise response");
            r#"{"status":"error","kind":"internal","message":"response serialisation failed"}"#
                .to_string()
        })
    }
}

/// TCP server front-end over the print pipeline.
pub struct PrintServer {
    pipeline: Arc<PrintPipeline>,
    registry: Arc<SessionRegistry>,
    shutdown: Arc<Notify>,
}

impl PrintServer {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self {
            pipeline: Arc::new(PrintPipeline::new(config)),
            registry: Arc::new(SessionRegistry::new()),
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Signal the accept loop to exit. In-flight connections finish their
    /// current request.
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }

    /// Accept connections until shutdown is signalled.
    pub async fn run(&self, listener: TcpListener) -> Result<()> {
        let local = listener.local_addr()?;
        info!(addr = %local, "print server listening");

        loop {
            tokio::select! {
                _ = self.shutdown.notified() => {
                    info!(addr = %local, "print server shutting down");
                    break;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            debug!(peer = %peer, "connection accepted");
                            let pipeline = Arc::clone(&self.pipeline);
                            let registry = Arc::clone(&self.registry);
                            tokio::spawn(async move {
                                if let Err(e) =
                                    handle_connection(stream, peer, pipeline, registry).await
                                {
                                    warn!(peer = %peer, error = %e, "connection handler error");
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "failed to accept connection");
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// One-shot mode: read a single request line from `reader`, write the
    /// reply line to `writer`. No session bookkeeping.
    pub async fn serve_once<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut line = String::new();
        BufReader::new(reader).read_line(&mut line).await?;

        let response = match serde_json::from_str::<Request>(line.trim_end()) {
            Ok(Request::OpenSession) | Ok(Request::CloseSession { .. }) => {
                Response::from_error(&SpoolgateError::Protocol(
                    "session management is only available in streaming mode".into(),
                ))
            }
            Ok(request) => execute(&self.pipeline, request).await,
            Err(e) => Response::from_error(&SpoolgateError::Protocol(e.to_string())),
        };

        writer.write_all(response.to_line().as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }
}

/// Read loop for one connection.
///
/// Session-tagged replies go to the session's registered handle, which need
/// not be the connection the request arrived on; protocol-level errors go
/// back down this connection's own channel.
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    pipeline: Arc<PrintPipeline>,
    registry: Arc<SessionRegistry>,
) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let writer = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            if write_half.write_all(line.as_bytes()).await.is_err()
                || write_half.write_all(b"\n").await.is_err()
            {
                break;
            }
            let _ = write_half.flush().await;
        }
    });

    // Sessions opened on this connection, reclaimed when it closes. The
    // loop result is captured rather than propagated so reclamation also
    // runs when the read half dies mid-stream (reset, invalid UTF-8).
    let mut opened: Vec<SessionId> = Vec::new();
    let mut lines = BufReader::new(read_half).lines();

    let result = loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break Ok(()),
            Err(e) => break Err(e.into()),
        };
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<Request>(&line) {
            Ok(Request::OpenSession) => {
                let id = registry.register(tx.clone());
                opened.push(id);
                if tx.send(Response::session(id).to_line()).is_err() {
                    break Ok(());
                }
            }
            Ok(Request::CloseSession { session }) => {
                // Only the connection that opened a session may close it;
                // other connections see it as not found.
                let reply = if opened.contains(&session) && registry.unregister(&session) {
                    opened.retain(|id| *id != session);
                    Response::ok()
                } else {
                    Response::from_error(&SpoolgateError::SessionNotFound(session.to_string()))
                };
                if tx.send(reply.to_line()).is_err() {
                    break Ok(());
                }
            }
            Ok(request) => match request.session().copied() {
                Some(id) => match registry.lookup(&id) {
                    Some(handle) => {
                        let response = execute(&pipeline, request).await;
                        if handle.send(response.to_line()).is_err() {
                            warn!(session = %id, "session transport closed before reply");
                        }
                    }
                    None => {
                        let reply = Response::from_error(&SpoolgateError::SessionNotFound(
                            id.to_string(),
                        ));
                        if tx.send(reply.to_line()).is_err() {
                            break Ok(());
                        }
                    }
                },
                None => {
                    let reply = Response::from_error(&SpoolgateError::Protocol(
                        "request carries no session".into(),
                    ));
                    if tx.send(reply.to_line()).is_err() {
                        break Ok(());
                    }
                }
            },
            Err(e) => {
                warn!(peer = %peer, error = %e, "malformed request");
                let reply = Response::from_error(&SpoolgateError::Protocol(e.to_string()));
                if tx.send(reply.to_line()).is_err() {
                    break Ok(());
                }
            }
        }
    };

    for id in &opened {
        registry.unregister(id);
    }
    drop(tx);
    let _ = writer.await;

    debug!(peer = %peer, "connection closed");
    result
}

/// Run a session-validated request through the pipeline.
async fn execute(pipeline: &PrintPipeline, request: Request) -> Response {
    let result = match request {
        Request::PrintFile {
            path,
            printer,
            copies,
            options,
            render_markdown,
            render_code,
            skip_confirmation,
            ..
        } => {
            pipeline
                .print_file(FilePrintRequest {
                    path,
                    printer,
                    copies,
                    options: PrintOptions::parse(&options),
                    overrides: RenderOverrides {
                        markdown: render_markdown,
                        code: render_code,
                    },
                    skip_confirmation,
                })
                .await
        }
        Request::PrintUpload {
            filename,
            content,
            encoding,
            printer,
            copies,
            options,
            render_markdown,
            render_code,
            skip_confirmation,
            ..
        } => {
            pipeline
                .print_upload(UploadPrintRequest {
                    filename,
                    content,
                    encoding,
                    printer,
                    copies,
                    options: PrintOptions::parse(&options),
                    overrides: RenderOverrides {
                        markdown: render_markdown,
                        code: render_code,
                    },
                    skip_confirmation,
                })
                .await
        }
        Request::ListPrinters { .. } => {
            return match pipeline.list_printers().await {
                Ok(listing) => Response::output(listing),
                Err(e) => Response::from_error(&e),
            };
        }
        Request::QueueStatus { printer, .. } => {
            return match pipeline.queue_status(printer.as_deref()).await {
                Ok(status) => Response::output(status),
                Err(e) => Response::from_error(&e),
            };
        }
        Request::OpenSession | Request::CloseSession { .. } => {
            // Handled by the connection loop; unreachable through `execute`.
            return Response::from_error(&SpoolgateError::Protocol(
                "session management op reached the pipeline".into(),
            ));
        }
    };

    match result {
        Ok(outcome) => Response::from_outcome(outcome),
        Err(e) => Response::from_error(&e),
    }
}
