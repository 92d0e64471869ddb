//! Collection queries: equality and prefix filters, one sort field, limit

use super::{path::CollectionPath, Document};
use serde_json::Value;
use std::cmp::Ordering;

/// Upper bound appended to a prefix to form a range query.
pub const PREFIX_RANGE_END: char = '\u{f8ff}';

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Smallest first
    Ascending,
    /// Largest first
    Descending,
}

/// Field predicate
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `field == value`
    Eq(String, Value),
    /// `prefix <= field <= prefix + '\u{f8ff}'` on string fields
    Prefix(String, String),
}

impl Filter {
    fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::Eq(field, value) => doc.field(field) == Some(value),
            Filter::Prefix(field, prefix) => match doc.field(field) {
                Some(Value::String(s)) => {
                    let mut upper = prefix.clone();
                    upper.push(PREFIX_RANGE_END);
                    s.as_str() >= prefix.as_str() && s.as_str() <= upper.as_str()
                }
                _ => false,
            },
        }
    }
}

/// Query over a single collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Collection being queried
    pub collection: CollectionPath,
    /// Conjunction of predicates
    pub filters: Vec<Filter>,
    /// Sort field and direction; ties and unsorted results go by document id
    pub order_by: Option<(String, Direction)>,
    /// Maximum number of results
    pub limit: Option<usize>,
}

impl Query {
    /// All documents in `collection`
    pub fn new(collection: CollectionPath) -> Self {
        Self {
            collection,
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    /// Add an equality filter
    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(field.to_string(), value.into()));
        self
    }

    /// Add a string prefix filter
    pub fn where_prefix(mut self, field: &str, prefix: &str) -> Self {
        self.filters
            .push(Filter::Prefix(field.to_string(), prefix.to_string()));
        self
    }

    /// Sort by `field`
    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some((field.to_string(), direction));
        self
    }

    /// Cap the result size
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Whether `doc` satisfies every filter (collection is not checked)
    pub fn matches(&self, doc: &Document) -> bool {
        self.filters.iter().all(|f| f.matches(doc))
    }

    /// Filter, sort and truncate the documents of the queried collection
    pub fn evaluate(&self, docs: Vec<Document>) -> Vec<Document> {
        let mut out: Vec<Document> = docs
            .into_iter()
            .filter(|d| d.path.parent() == &self.collection && self.matches(d))
            .collect();

        out.sort_by(|a, b| a.id().cmp(b.id()));
        if let Some((field, direction)) = &self.order_by {
            // Stable: equal keys keep id order. Missing fields sort last either way.
            out.sort_by(|a, b| match (a.field(field), b.field(field)) {
                (Some(x), Some(y)) => {
                    let ord = compare_values(x, y);
                    match direction {
                        Direction::Ascending => ord,
                        Direction::Descending => ord.reverse(),
                    }
                }
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            });
        }

        if let Some(n) = self.limit {
            out.truncate(n);
        }
        out
    }
}

/// Total order over JSON scalars: null < bool < number < string; others equal.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}
