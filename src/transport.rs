//! HTTP transport with request/response capture
//!
//! Every outbound call goes through [`DebugTransport`], which writes a
//! human-readable record of the exchange to a [`DebugSink`]. The sink is
//! purely diagnostic: it never changes what is sent or received, and a
//! failing sink never fails the call.

use crate::config::ClientConfig;
use crate::types::FORM_CONTENT_TYPE;
use crate::Result;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

const RECORD_SEPARATOR: &str = "--------------------";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

type SharedWriter = Arc<Mutex<Box<dyn Write + Send>>>;

/// Destination for request/response dumps. Discards by default.
#[derive(Clone, Default)]
pub struct DebugSink {
    writer: Option<SharedWriter>,
}

impl std::fmt::Debug for DebugSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugSink")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl DebugSink {
    /// Sink that drops everything
    pub fn discard() -> Self {
        Self::default()
    }

    /// Sink writing to any `Write` destination
    pub fn new<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            writer: Some(Arc::new(Mutex::new(Box::new(writer)))),
        }
    }

    /// Sink writing to standard output
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }

    pub fn is_enabled(&self) -> bool {
        self.writer.is_some()
    }

    /// Write one record. Errors are logged and otherwise ignored.
    pub fn write_record(&self, record: &str) {
        let Some(writer) = &self.writer else {
            return;
        };

        let mut guard = match writer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Err(e) = guard
            .write_all(record.as_bytes())
            .and_then(|_| guard.flush())
        {
            warn!(error = %e, "failed to write debug record");
        }
    }
}

/// Begin a record for an outgoing request
pub(crate) fn request_record(method: &str, url: &str, body: &str) -> String {
    let timestamp = chrono::Local::now().format(TIMESTAMP_FORMAT);
    format!("{RECORD_SEPARATOR}\n{timestamp}\n{method} {url}\n{body}\n")
}

/// Thin wrapper over `reqwest` that dumps each exchange to the configured sink
#[derive(Debug, Clone)]
pub struct DebugTransport {
    client: Client,
}

impl DebugTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// POST a form-encoded body and return the raw response body.
    ///
    /// The HTTP status is not inspected; the gateway reports failures in
    /// the JSON payload.
    pub async fn post_form(&self, config: &ClientConfig, url: &str, body: String) -> Result<String> {
        let mut record = request_record("POST", url, &body);
        debug!(url, "sending form request");

        let mut request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(body);
        if let Some(timeout) = config.timeout {
            request = request.timeout(timeout);
        }

        let result: Result<String> = match request.send().await {
            Ok(response) => {
                let status = response.status();
                let text = response.text().await;
                debug!(url, status = status.as_u16(), "received response");
                text.map_err(Into::into)
            }
            Err(e) => Err(e.into()),
        };

        match &result {
            Ok(text) => record.push_str(text),
            Err(e) => record.push_str(&format!("error: {e}")),
        }
        record.push('\n');
        config.debug_sink.write_record(&record);

        result
    }
}
