// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Client for the persistent text-native OCR worker.
//
// The worker is spawned once and speaks JSON lines over stdio:
//
//   startup   worker -> {"ready": true} | {"ready": false, "error": "..."}
//   request   client -> {"id": "...", "pdf_path": "..."}
//   response  worker -> {"id": "...", "text": "...", "page_count": N}
//                     | {"id": "...", "error": "..."}
//
// Responses are matched to requests by `id`, so several requests may be in
// flight at once.  If the worker exits every pending request fails.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use cniwerk_core::error::{CniError, Result};

use crate::engine::{RecognizedText, TextNativeEngine};

/// Separator the worker puts between pages.
pub const PAGE_BREAK: &str = "\n\n--- PAGE BREAK ---\n\n";

#[derive(Debug, Serialize)]
struct WorkerRequest<'a> {
    id: &'a str,
    pdf_path: &'a str,
}

/// Any line the worker may print.
#[derive(Debug, Default, Deserialize)]
struct WorkerMessage {
    id: Option<String>,
    ready: Option<bool>,
    text: Option<String>,
    page_count: Option<usize>,
    error: Option<String>,
}

type Pending = Arc<Mutex<HashMap<String, oneshot::Sender<WorkerMessage>>>>;

/// A running worker process.
pub struct OcrWorker {
    stdin: tokio::sync::Mutex<ChildStdin>,
    pending: Pending,
    alive: Arc<AtomicBool>,
    request_timeout: Duration,
    reader: JoinHandle<()>,
    // Killed when the client is dropped.
    _child: Child,
}

impl OcrWorker {
    /// Spawn `command` and wait for its ready line.
    #[instrument(skip_all, fields(program = command.first().map(String::as_str).unwrap_or("")))]
    pub async fn spawn(
        command: &[String],
        startup_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| CniError::Config("empty OCR worker command".into()))?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CniError::Worker(format!("failed to start `{program}`: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| CniError::Worker("worker stdin not captured".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CniError::Worker("worker stdout not captured".into()))?;
        let mut lines = BufReader::new(stdout).lines();

        match tokio::time::timeout(startup_timeout, wait_ready(&mut lines)).await {
            Err(_) => {
                return Err(CniError::Worker(format!(
                    "no ready signal within {}ms",
                    startup_timeout.as_millis()
                )));
            }
            Ok(result) => result?,
        }
        info!("OCR worker ready");

        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let alive = Arc::new(AtomicBool::new(true));
        let reader = tokio::spawn(read_responses(
            lines,
            Arc::clone(&pending),
            Arc::clone(&alive),
        ));

        Ok(Self {
            stdin: tokio::sync::Mutex::new(stdin),
            pending,
            alive,
            request_timeout,
            reader,
            _child: child,
        })
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Requests sent but not yet answered.
    pub fn pending(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// OCR one PDF.
    pub async fn recognize_pdf(&self, pdf_path: &Path) -> Result<RecognizedText> {
        if !self.is_alive() {
            return Err(CniError::Worker("worker has exited".into()));
        }

        let id = Uuid::new_v4().to_string();
        let path = pdf_path.to_string_lossy();
        let mut line = serde_json::to_string(&WorkerRequest {
            id: &id,
            pdf_path: &path,
        })?;
        line.push('\n');

        let (tx, rx) = oneshot::channel();
        let _entry = self.register(&id, tx)?;
        if !self.is_alive() {
            return Err(CniError::Worker("worker has exited".into()));
        }

        let sent = {
            let mut stdin = self.stdin.lock().await;
            match stdin.write_all(line.as_bytes()).await {
                Ok(()) => stdin.flush().await,
                Err(e) => Err(e),
            }
        };
        if let Err(e) = sent {
            return Err(CniError::Worker(format!("failed to send request: {e}")));
        }
        debug!(request_id = %id, "request sent to OCR worker");

        let reply = match tokio::time::timeout(self.request_timeout, rx).await {
            Err(_) => {
                warn!(request_id = %id, "OCR worker request timed out");
                return Err(CniError::Worker(format!(
                    "no response within {}ms",
                    self.request_timeout.as_millis()
                )));
            }
            Ok(Err(_)) => return Err(CniError::Worker("worker exited mid-request".into())),
            Ok(Ok(reply)) => reply,
        };

        if let Some(message) = reply.error {
            return Err(CniError::Worker(message));
        }
        Ok(RecognizedText {
            text: reply.text.unwrap_or_default(),
            page_count: reply.page_count.unwrap_or(0),
        })
    }

    /// Add a pending entry, removed again when the returned guard drops.
    fn register(&self, id: &str, tx: oneshot::Sender<WorkerMessage>) -> Result<PendingEntry<'_>> {
        let mut pending = self
            .pending
            .lock()
            .map_err(|_| CniError::Worker("pending-request table poisoned".into()))?;
        pending.insert(id.to_owned(), tx);
        Ok(PendingEntry {
            pending: &self.pending,
            id: id.to_owned(),
        })
    }
}

/// A registered request.  Dropping it clears the entry, including when the
/// caller abandons the request future mid-flight.
struct PendingEntry<'a> {
    pending: &'a Pending,
    id: String,
}

impl Drop for PendingEntry<'_> {
    fn drop(&mut self) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(&self.id);
        }
    }
}

impl Drop for OcrWorker {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

impl TextNativeEngine for OcrWorker {
    async fn recognize(&self, pdf_path: &Path) -> Result<RecognizedText> {
        self.recognize_pdf(pdf_path).await
    }
}

impl<T: TextNativeEngine> TextNativeEngine for Arc<T> {
    async fn recognize(&self, pdf_path: &Path) -> Result<RecognizedText> {
        self.as_ref().recognize(pdf_path).await
    }
}

/// Read lines until the worker reports readiness.  Non-JSON lines (library
/// banners and the like) are skipped.
async fn wait_ready(lines: &mut Lines<BufReader<ChildStdout>>) -> Result<()> {
    loop {
        let line = lines
            .next_line()
            .await?
            .ok_or_else(|| CniError::Worker("worker exited before becoming ready".into()))?;
        let Ok(message) = serde_json::from_str::<WorkerMessage>(&line) else {
            debug!("skipping non-JSON worker output");
            continue;
        };
        match message.ready {
            Some(true) => return Ok(()),
            Some(false) => {
                return Err(CniError::Worker(
                    message.error.unwrap_or_else(|| "worker failed to start".into()),
                ));
            }
            None => continue,
        }
    }
}

/// Route every response line to its waiting request.  On EOF, mark the
/// worker dead and drop all pending senders so their requests fail.
async fn read_responses(
    mut lines: Lines<BufReader<ChildStdout>>,
    pending: Pending,
    alive: Arc<AtomicBool>,
) {
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let message = match serde_json::from_str::<WorkerMessage>(&line) {
                    Ok(m) => m,
                    Err(_) => {
                        debug!("skipping non-JSON worker output");
                        continue;
                    }
                };
                let Some(id) = message.id.clone() else {
                    continue;
                };
                let waiter = pending.lock().ok().and_then(|mut p| p.remove(&id));
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(message);
                    }
                    None => debug!(request_id = %id, "response for unknown or expired request"),
                }
            }
            Ok(None) => {
                error!("OCR worker exited");
                break;
            }
            Err(e) => {
                error!(error = %e, "failed to read from OCR worker");
                break;
            }
        }
    }

    alive.store(false, Ordering::Release);
    if let Ok(mut p) = pending.lock() {
        p.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
