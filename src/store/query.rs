//! Backend independent record filters.

use std::cmp::Ordering;

use serde_json::{Map, Value as JsonValue};

const DEFAULT_LIMIT: usize = 100;

/// Comparison applied by a [`Cond`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// `key <op> value` against one column of a record.
#[derive(Debug, Clone)]
pub struct Cond {
    pub key: String,
    pub op: Op,
    pub value: JsonValue,
}

impl Cond {
    /// Evaluate the condition against a JSON document of a record.
    pub fn matches(
        &self,
        doc: &Map<String, JsonValue>,
    ) -> bool {
        let actual = doc.get(&self.key).unwrap_or(&JsonValue::Null);
        let ord = compare(actual, &self.value);
        match self.op {
            Op::Eq => ord == Some(Ordering::Equal),
            Op::Ne => ord != Some(Ordering::Equal),
            Op::Lt => ord == Some(Ordering::Less),
            Op::Le => matches!(ord, Some(Ordering::Less | Ordering::Equal)),
            Op::Gt => ord == Some(Ordering::Greater),
            Op::Ge => matches!(ord, Some(Ordering::Greater | Ordering::Equal)),
        }
    }
}

/// Order two JSON scalars of the same kind, `None` when incomparable.
pub fn compare(
    a: &JsonValue,
    b: &JsonValue,
) -> Option<Ordering> {
    match (a, b) {
        (JsonValue::Null, JsonValue::Null) => Some(Ordering::Equal),
        (JsonValue::Bool(x), JsonValue::Bool(y)) => Some(x.cmp(y)),
        (JsonValue::Number(x), JsonValue::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (JsonValue::String(x), JsonValue::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Conjunction of conditions with ordering and pagination.
#[derive(Debug, Clone)]
pub struct Query {
    conds: Vec<Cond>,
    order_by: Vec<(String, bool)>,
    limit: usize,
    offset: usize,
}

impl Default for Query {
    fn default() -> Self {
        Self {
            conds: Vec::new(),
            order_by: Vec::new(),
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_cond(
        mut self,
        key: &str,
        op: Op,
        value: impl Into<JsonValue>,
    ) -> Self {
        self.conds.push(Cond {
            key: key.to_string(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn eq(
        self,
        key: &str,
        value: impl Into<JsonValue>,
    ) -> Self {
        self.with_cond(key, Op::Eq, value)
    }

    pub fn ne(
        self,
        key: &str,
        value: impl Into<JsonValue>,
    ) -> Self {
        self.with_cond(key, Op::Ne, value)
    }

    pub fn lt(
        self,
        key: &str,
        value: impl Into<JsonValue>,
    ) -> Self {
        self.with_cond(key, Op::Lt, value)
    }

    pub fn le(
        self,
        key: &str,
        value: impl Into<JsonValue>,
    ) -> Self {
        self.with_cond(key, Op::Le, value)
    }

    pub fn gt(
        self,
        key: &str,
        value: impl Into<JsonValue>,
    ) -> Self {
        self.with_cond(key, Op::Gt, value)
    }

    pub fn ge(
        self,
        key: &str,
        value: impl Into<JsonValue>,
    ) -> Self {
        self.with_cond(key, Op::Ge, value)
    }

    /// Sort by `key`, descending when `rev` is set.
    pub fn sort(
        mut self,
        key: &str,
        rev: bool,
    ) -> Self {
        self.order_by.push((key.to_string(), rev));
        self
    }

    pub fn with_limit(
        mut self,
        limit: usize,
    ) -> Self {
        self.limit = limit.max(1);
        self
    }

    pub fn with_offset(
        mut self,
        offset: usize,
    ) -> Self {
        self.offset = offset;
        self
    }

    pub fn conds(&self) -> &[Cond] {
        &self.conds
    }

    pub fn order_by(&self) -> &[(String, bool)] {
        &self.order_by
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Whether every condition holds for `doc`.
    pub fn matches(
        &self,
        doc: &Map<String, JsonValue>,
    ) -> bool {
        self.conds.iter().all(|c| c.matches(doc))
    }
}
