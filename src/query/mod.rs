//! Value extraction from message payloads.
//!
//! Every inbound message is decoded once into a [`Document`] and then handed
//! to each interested component, which runs its own compiled [`Extractor`]
//! over it and coerces the result into the type it tracks.
//!
//! ## Data Flow
//!
//! ```text
//! raw bytes
//!     │  Document::decode (UTF-8, then JSON or raw string)
//!     ▼
//! {"payload": ...}
//!     │  Extractor::search (JMESPath)
//!     ▼
//! serde_json::Value (Null on a miss)
//!     │  coerce_number / coerce_string
//!     ▼
//! f64 | String
//! ```

mod coerce;
mod document;

pub use coerce::{coerce_number, coerce_string};
pub use document::Document;

use std::fmt;

use serde_json::Value;

use crate::error::{Error, Result};

/// A compiled JMESPath expression.
///
/// Compilation happens exactly once, in [`Extractor::new`]; a malformed
/// expression is a construction error, never a per-message one.
///
/// # Example
///
/// ```
/// use thermostt::query::{Document, Extractor};
///
/// let extractor = Extractor::new("payload.POWER").unwrap();
/// let document = Document::decode(br#"{"POWER":"ON"}"#).unwrap();
///
/// assert_eq!(extractor.search(&document).unwrap(), "ON");
/// ```
pub struct Extractor {
    expression: jmespath::Expression<'static>,
}

impl Extractor {
    /// Compile a query expression.
    pub fn new(expression: &str) -> Result<Self> {
        let expression = jmespath::compile(expression).map_err(|e| Error::Query {
            expression: expression.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { expression })
    }

    /// The source text of the expression.
    pub fn expression(&self) -> &str {
        self.expression.as_str()
    }

    /// Evaluate against a document.
    ///
    /// Returns `Value::Null` when the expression selects nothing, and
    /// [`Error::Evaluation`] when the document's shape makes the expression
    /// fail (e.g. `values()` applied to a string).
    pub fn search(&self, document: &Document) -> Result<Value> {
        let found = self
            .expression
            .search(document.as_value())
            .map_err(|e| Error::Evaluation(e.to_string()))?;
        serde_json::to_value(&*found).map_err(|e| Error::Evaluation(e.to_string()))
    }
}

impl fmt::Debug for Extractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Extractor").field(&self.expression()).finish()
    }
}

impl fmt::Display for Extractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.expression())
    }
}
