//! Bulk ingestion over the `_bulk` API

use crate::error::{Error, Result};
use crate::helper::SearchHelper;
use crate::metrics;
use crate::transport::{Method, TransportRequest};
use crate::types::{Document, IndexCoord};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

/// One index operation in a bulk request
#[derive(Debug, Clone, PartialEq)]
pub struct BulkAction {
    pub coord: IndexCoord,
    /// `None` lets the engine assign an id
    pub id: Option<String>,
    pub source: Document,
}

impl BulkAction {
    pub fn index(coord: IndexCoord, id: Option<String>, source: Document) -> Self {
        Self { coord, id, source }
    }

    /// Action line plus source line, both newline-terminated
    pub fn encode(&self, out: &mut String) -> Result<()> {
        let mut meta = Map::new();
        meta.insert("_index".to_string(), json!(self.coord.index));
        meta.insert("_type".to_string(), json!(self.coord.doc_type));
        if let Some(id) = &self.id {
            meta.insert("_id".to_string(), json!(id));
        }
        out.push_str(&serde_json::to_string(&json!({ "index": meta }))?);
        out.push('\n');
        out.push_str(&serde_json::to_string(&self.source)?);
        out.push('\n');
        Ok(())
    }
}

/// NDJSON body for `actions`
pub fn encode_actions(actions: &[BulkAction]) -> Result<String> {
    let mut body = String::new();
    for action in actions {
        action.encode(&mut body)?;
    }
    Ok(body)
}

/// Outcome of a bulk ingestion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkReport {
    /// Items (or file lines) seen
    pub count: usize,
    /// Items sent to the engine
    pub accepted: usize,
    /// Items rejected before sending
    pub rejected: usize,
    /// Sent items the engine reported as failed
    pub failed: usize,
    /// Sent items whose outcome the engine reply did not tell
    pub unconfirmed: usize,
    /// Bulk requests issued
    pub flushes: usize,
}

#[derive(Debug, Default, Deserialize)]
struct EsBulkResponse {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<Map<String, Value>>,
}

#[derive(Debug, Default, Deserialize)]
struct EsBulkItem {
    #[serde(rename = "_id", default)]
    id: Option<String>,
    #[serde(default)]
    status: u16,
    #[serde(default)]
    error: Option<Value>,
}

impl EsBulkItem {
    fn is_failure(&self) -> bool {
        self.error.is_some() || self.status >= 300
    }
}

/// Pending actions with the file line (or item position) each came from
#[derive(Default)]
struct Batch {
    actions: Vec<BulkAction>,
    origins: Vec<usize>,
}

impl Batch {
    fn push(&mut self, action: BulkAction, origin: usize) {
        self.actions.push(action);
        self.origins.push(origin);
    }

    fn len(&self) -> usize {
        self.actions.len()
    }

    fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    fn take(&mut self) -> Batch {
        std::mem::take(self)
    }
}

fn reject(report: &mut BulkReport, line: usize, reason: impl Into<String>) {
    let err = Error::PartialBulkItem {
        line,
        reason: reason.into(),
    };
    warn!(error = %err, "skipping bulk item");
    report.rejected += 1;
    metrics::record_bulk_line(false);
}

/// Parse one file line into a document source
fn parse_line(raw: &[u8]) -> std::result::Result<Document, String> {
    let text = std::str::from_utf8(raw).map_err(|e| format!("invalid UTF-8: {}", e))?;
    let text = text.trim_end_matches(['\n', '\r']);
    if text.trim().is_empty() {
        return Err("blank line".to_string());
    }
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(doc)) => Ok(doc),
        Ok(other) => Err(format!("expected a JSON object, got {}", json_kind(&other))),
        Err(e) => Err(format!("invalid JSON: {}", e)),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl SearchHelper {
    /// Index `docs` in one bulk request
    ///
    /// Items with a blank id are skipped; items without an id get an
    /// engine-assigned one.
    pub async fn index_many<I>(&self, coord: &IndexCoord, docs: I) -> Result<BulkReport>
    where
        I: IntoIterator<Item = (Option<String>, Document)>,
    {
        coord.validate()?;
        let mut report = BulkReport::default();
        let mut batch = Batch::default();

        for (position, (id, source)) in docs.into_iter().enumerate() {
            report.count += 1;
            if id.as_deref().is_some_and(|id| id.trim().is_empty()) {
                reject(&mut report, position + 1, "blank document id");
                continue;
            }
            batch.push(BulkAction::index(coord.clone(), id, source), position + 1);
            report.accepted += 1;
            metrics::record_bulk_line(true);
        }

        if !batch.is_empty() {
            self.flush(batch, &mut report).await?;
        }
        info!(coord = %coord, accepted = report.accepted, rejected = report.rejected, "index_many done");
        Ok(report)
    }

    /// Index a file holding one JSON document per line
    ///
    /// Unreadable lines are logged and skipped. Batches are sent every
    /// `bulk.flush_every` accepted lines and once more at end of file.
    /// `count` is the number of lines read.
    pub async fn bulk_from_file(&self, coord: &IndexCoord, path: &Path) -> Result<BulkReport> {
        coord.validate()?;
        let flush_every = self.config.bulk.flush_every.max(1);
        info!(coord = %coord, path = %path.display(), flush_every, "bulk load from file");

        let mut reader = BufReader::new(File::open(path).await?);
        let mut report = BulkReport::default();
        let mut batch = Batch::default();
        let mut raw = Vec::new();

        loop {
            raw.clear();
            if reader.read_until(b'\n', &mut raw).await? == 0 {
                break;
            }
            report.count += 1;
            let line = report.count;

            match parse_line(&raw) {
                Ok(source) => {
                    batch.push(BulkAction::index(coord.clone(), None, source), line);
                    report.accepted += 1;
                    metrics::record_bulk_line(true);
                }
                Err(reason) => {
                    reject(&mut report, line, reason);
                    continue;
                }
            }

            if batch.len() >= flush_every {
                self.flush(batch.take(), &mut report).await?;
            }
        }

        if !batch.is_empty() {
            self.flush(batch.take(), &mut report).await?;
        }

        info!(
            coord = %coord,
            lines = report.count,
            accepted = report.accepted,
            rejected = report.rejected,
            failed = report.failed,
            unconfirmed = report.unconfirmed,
            flushes = report.flushes,
            "bulk load finished"
        );
        Ok(report)
    }

    /// Send one batch; engine-side item failures are logged and counted
    ///
    /// Cached field sets of the written types are dropped afterwards, since
    /// indexing may extend their mappings.
    async fn flush(&self, batch: Batch, report: &mut BulkReport) -> Result<()> {
        let body = encode_actions(&batch.actions)?;
        debug!(items = batch.len(), bytes = body.len(), "flushing bulk batch");

        let sent = self
            .send_ok("bulk", TransportRequest::new(Method::Post, ["_bulk"]).ndjson(body))
            .await;
        let written: BTreeSet<&IndexCoord> = batch.actions.iter().map(|a| &a.coord).collect();
        for coord in written {
            self.resolver.invalidate(coord);
        }
        let response = sent?;
        report.flushes += 1;

        let response: EsBulkResponse = match serde_json::from_value(response) {
            Ok(response) => response,
            Err(e) => {
                warn!(items = batch.len(), error = %e, "unreadable bulk response, item outcomes unknown");
                report.unconfirmed += batch.len();
                return Ok(());
            }
        };
        if !response.errors {
            return Ok(());
        }

        for (position, item) in response.items.into_iter().enumerate() {
            let line = batch.origins.get(position).copied().unwrap_or(0);
            let Some((_, result)) = item.into_iter().next() else {
                continue;
            };
            let item: EsBulkItem = match serde_json::from_value(result) {
                Ok(item) => item,
                Err(e) => {
                    warn!(line, error = %e, "unreadable bulk item result");
                    report.unconfirmed += 1;
                    continue;
                }
            };
            if !item.is_failure() {
                continue;
            }
            let reason = item
                .error
                .as_ref()
                .map(|e| match e {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .unwrap_or_else(|| format!("status {}", item.status));
            let err = Error::PartialBulkItem { line, reason };
            warn!(id = ?item.id, status = item.status, error = %err, "engine rejected bulk item");
            report.failed += 1;
        }
        Ok(())
    }
}
