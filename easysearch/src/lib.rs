//! easysearch: an opinionated helper over Elasticsearch 1.x clusters
//!
//! The helper covers three recurring needs on top of a running cluster:
//!
//! - **Full-text querying** with term filters and range predicates
//!   ([`SearchHelper::query`], [`SearchHelper::match_query`])
//! - **Grouped aggregation** returning representative documents per group
//!   ([`SearchHelper::aggregate`])
//! - **Index/mapping lifecycle and bulk ingestion**
//!   ([`SearchHelper::create_mapping`], [`SearchHelper::bulk_from_file`], ...)
//!
//! # Query composition
//!
//! A [`QueryRequest`] is compiled into a `filtered` query: a `query_string`
//! text layer (dis-max over the match fields) plus an optional `bool` filter
//! layer built from term and range predicates. Fields referenced by filters
//! are checked against the type's mapping and silently dropped when unknown.
//!
//! # Aggregation
//!
//! Buckets are grouped by one field, or by a scripted composite key when
//! several fields are requested, ordered by the best score in each bucket,
//! and carry their top hits. Rows are deduplicated by canonical JSON.

pub mod bulk;
pub mod config;
pub mod error;
pub mod helper;
pub mod lifecycle;
pub mod logging;
pub mod metrics;
pub mod query;
pub mod response;
pub mod schema;
pub mod transport;
pub mod types;

pub use bulk::{BulkAction, BulkReport};
pub use config::Config;
pub use error::{Error, Result};
pub use helper::SearchHelper;
pub use schema::{FieldDescriptor, FieldType, SchemaResolver};
pub use transport::{HttpTransport, Transport};
pub use types::{
    AggregationRequest, Document, IndexCoord, QueryRequest, RangeOp, ResultEnvelope,
    StoredDocument,
};
