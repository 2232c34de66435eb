//! Tenant scoping for multi-search bodies
//!
//! A multi-search body is newline-delimited: a routing line, then a JSON
//! query line, optionally repeated. For every query line of the shape
//! `{"query":{"bool":{...}}}` the rewriter repairs blank time fields,
//! normalizes `bool.filter` to an array and appends one `term` clause per
//! scoping attribute of the tenant record.
//!
//! Anything the rewriter does not recognize passes through byte for byte.
//! Rewriting is not idempotent: a body rewritten twice carries every
//! tenant clause twice.

mod fixups;

use std::borrow::Cow;

use serde_json::{Map, Value, json};

use crate::tenant::TenantRecord;

pub use fixups::{fix_date_histograms, fix_range_clauses};

pub const DEFAULT_TIME_FIELD: &str = "time";

/// Why a body was, or was not, rewritten
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteOutcome {
    Rewritten {
        /// Query lines that received tenant clauses
        searches: usize,
        /// Tenant clauses appended across all query lines
        injected: usize,
    },
    /// Fewer than two lines
    MissingQueryLine,
    /// The second line is empty or whitespace
    BlankQueryLine,
    /// A query line is not a JSON object
    InvalidJson,
    /// A query line has no `query.bool` object
    NoBoolQuery,
    /// The scoped query could not be serialized again
    SerializeFailed,
}

impl RewriteOutcome {
    #[must_use]
    pub const fn is_rewritten(&self) -> bool {
        matches!(self, Self::Rewritten { .. })
    }

    /// Short, stable label for logs and metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Rewritten { .. } => "rewritten",
            Self::MissingQueryLine => "missing_query_line",
            Self::BlankQueryLine => "blank_query_line",
            Self::InvalidJson => "invalid_json",
            Self::NoBoolQuery => "no_bool_query",
            Self::SerializeFailed => "serialize_failed",
        }
    }
}

/// Result of [`QueryRewriter::rewrite`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite<'a> {
    pub body: Cow<'a, [u8]>,
    pub outcome: RewriteOutcome,
}

impl Rewrite<'_> {
    const fn unchanged(body: &[u8], outcome: RewriteOutcome) -> Rewrite<'_> {
        Rewrite {
            body: Cow::Borrowed(body),
            outcome,
        }
    }
}

/// Rewrites multi-search bodies for one deployment
#[derive(Debug, Clone)]
pub struct QueryRewriter {
    time_field: String,
    excluded_fields: Vec<String>,
}

impl Default for QueryRewriter {
    fn default() -> Self {
        Self::new(DEFAULT_TIME_FIELD)
    }
}

impl QueryRewriter {
    #[must_use]
    pub fn new(time_field: impl Into<String>) -> Self {
        Self {
            time_field: time_field.into(),
            excluded_fields: Vec::new(),
        }
    }

    /// Exclude more record attributes from scoping, on top of
    /// [`crate::tenant::EXCLUDED_FIELDS`]
    #[must_use]
    pub fn with_excluded_fields(mut self, excluded: Vec<String>) -> Self {
        self.excluded_fields = excluded;
        self
    }

    #[must_use]
    pub fn time_field(&self) -> &str {
        &self.time_field
    }

    /// Scope `body` to `record`. Never fails; unrecognized bodies come back
    /// unchanged with the reason in [`Rewrite::outcome`].
    #[must_use]
    pub fn rewrite<'a>(&self, body: &'a [u8], record: &TenantRecord) -> Rewrite<'a> {
        let lines: Vec<&[u8]> = body.split(|b| *b == b'\n').collect();

        match lines.get(1) {
            None => return Rewrite::unchanged(body, RewriteOutcome::MissingQueryLine),
            Some(line) if line.trim_ascii().is_empty() => {
                return Rewrite::unchanged(body, RewriteOutcome::BlankQueryLine);
            }
            Some(_) => {}
        }

        let significant: Vec<&[u8]> = lines
            .into_iter()
            .filter(|line| !line.trim_ascii().is_empty())
            .collect();

        let mut output = Vec::with_capacity(body.len() + 64);
        let mut searches = 0;
        let mut injected = 0;
        let mut first_skip = None;

        for pair in significant.chunks(2) {
            output.extend_from_slice(pair[0]);
            output.push(b'\n');
            let Some(query_line) = pair.get(1) else {
                continue;
            };

            match self.rewrite_query_line(query_line, record) {
                Ok((rewritten, count)) => {
                    output.extend_from_slice(&rewritten);
                    searches += 1;
                    injected += count;
                }
                Err(skip) => {
                    first_skip.get_or_insert(skip);
                    output.extend_from_slice(query_line);
                }
            }
            output.push(b'\n');
        }

        if searches == 0 {
            return Rewrite::unchanged(body, first_skip.unwrap_or(RewriteOutcome::NoBoolQuery));
        }

        Rewrite {
            body: Cow::Owned(output),
            outcome: RewriteOutcome::Rewritten { searches, injected },
        }
    }

    fn rewrite_query_line(
        &self,
        line: &[u8],
        record: &TenantRecord,
    ) -> Result<(Vec<u8>, usize), RewriteOutcome> {
        let mut document: Value =
            serde_json::from_slice(line).map_err(|_| RewriteOutcome::InvalidJson)?;
        let root = document
            .as_object_mut()
            .ok_or(RewriteOutcome::InvalidJson)?;

        let bool_query = root
            .get_mut("query")
            .and_then(Value::as_object_mut)
            .and_then(|q| q.get_mut("bool"))
            .and_then(Value::as_object_mut)
            .ok_or(RewriteOutcome::NoBoolQuery)?;

        if let Some(filter) = bool_query.get_mut("filter") {
            fix_range_clauses(filter, &self.time_field);
        }
        let mut filters = normalize_filter(bool_query.remove("filter"));

        let before = filters.len();
        for (key, value) in record.scoping_attributes(&self.excluded_fields) {
            filters.push(term_clause(key, value));
        }
        let injected = filters.len() - before;
        bool_query.insert("filter".into(), Value::Array(filters));

        for key in ["aggs", "aggregations"] {
            if let Some(aggs) = root.get_mut(key).and_then(Value::as_object_mut) {
                fix_date_histograms(aggs, &self.time_field);
            }
        }

        let rewritten = serde_json::to_vec(&document).map_err(|_| RewriteOutcome::SerializeFailed)?;
        Ok((rewritten, injected))
    }
}

/// `bool.filter` as an array: a lone clause is wrapped, anything else that
/// is not an array becomes empty.
#[must_use]
pub fn normalize_filter(filter: Option<Value>) -> Vec<Value> {
    match filter {
        Some(Value::Array(clauses)) => clauses,
        Some(clause @ Value::Object(_)) => vec![clause],
        _ => Vec::new(),
    }
}

fn term_clause(field: &str, value: &Value) -> Value {
    let mut term = Map::with_capacity(1);
    term.insert(field.to_string(), value.clone());
    json!({ "term": term })
}
