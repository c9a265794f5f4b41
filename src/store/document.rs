use std::cmp::Ordering;
use std::fmt;

use chrono::Utc;
use serde_json::{json, Map, Value};

/// A stored document: a JSON object keyed by field name
pub type Document = Map<String, Value>;

/// Path to a (possibly nested) field, kept as segments so keys may contain dots
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Builds a path from a dotted literal such as `"gameData.currentRound"`
    pub fn parse(dotted: &str) -> Self {
        Self::new(dotted.split('.'))
    }

    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Reads the value at this path, if every segment exists
    pub fn lookup<'a>(&self, document: &'a Document) -> Option<&'a Value> {
        let (first, rest) = self.0.split_first()?;
        let mut current = document.get(first)?;
        for segment in rest {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

impl From<&str> for FieldPath {
    fn from(value: &str) -> Self {
        FieldPath::parse(value)
    }
}

/// Value written to a field; the non-`Set` variants are resolved by the store at commit time
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Set(Value),
    Delete,
    /// Resolves to the store-native `{"seconds", "nanoseconds"}` timestamp object
    ServerTimestamp,
    /// Atomic add; a missing field counts as zero
    Increment(i64),
    /// Appends each value not already present in the array
    ArrayUnion(Vec<Value>),
}

/// Ordered list of field writes applied as one merge
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldUpdates {
    entries: Vec<(FieldPath, FieldValue)>,
}

impl FieldUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    /// One `Set` per top-level key of `document`
    pub fn from_document(document: Document) -> Self {
        let entries = document
            .into_iter()
            .map(|(key, value)| (FieldPath::new([key]), FieldValue::Set(value)))
            .collect();
        Self { entries }
    }

    pub fn set(mut self, path: impl Into<FieldPath>, value: Value) -> Self {
        self.push(path.into(), FieldValue::Set(value));
        self
    }

    pub fn delete(mut self, path: impl Into<FieldPath>) -> Self {
        self.push(path.into(), FieldValue::Delete);
        self
    }

    pub fn server_timestamp(mut self, path: impl Into<FieldPath>) -> Self {
        self.push(path.into(), FieldValue::ServerTimestamp);
        self
    }

    pub fn increment(mut self, path: impl Into<FieldPath>, delta: i64) -> Self {
        self.push(path.into(), FieldValue::Increment(delta));
        self
    }

    pub fn array_union(mut self, path: impl Into<FieldPath>, values: Vec<Value>) -> Self {
        self.push(path.into(), FieldValue::ArrayUnion(values));
        self
    }

    pub fn push(&mut self, path: FieldPath, value: FieldValue) {
        self.entries.push((path, value));
    }

    pub fn extend(&mut self, other: FieldUpdates) {
        self.entries.extend(other.entries);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(FieldPath, FieldValue)> {
        self.entries.iter()
    }

    /// Returns the write queued for `path`, the last one wins
    pub fn get(&self, path: &FieldPath) -> Option<&FieldValue> {
        self.entries
            .iter()
            .rev()
            .find(|(candidate, _)| candidate == path)
            .map(|(_, value)| value)
    }
}

/// Store-native timestamp object for the current instant
pub fn server_timestamp_now() -> Value {
    let now = Utc::now();
    json!({
        "seconds": now.timestamp(),
        "nanoseconds": now.timestamp_subsec_nanos(),
    })
}

/// Merges `updates` into `document`, resolving sentinels against a single commit timestamp
pub fn apply_updates(document: &mut Document, updates: &FieldUpdates) {
    let commit_time = server_timestamp_now();
    for (path, value) in updates.iter() {
        apply_one(document, path, value, &commit_time);
    }
}

fn apply_one(document: &mut Document, path: &FieldPath, value: &FieldValue, commit_time: &Value) {
    let Some((last, parents)) = path.segments().split_last() else {
        return;
    };

    if let FieldValue::Delete = value {
        if let Some(parent) = navigate_existing(document, parents) {
            parent.remove(last);
        }
        return;
    }

    let parent = navigate_create(document, parents);
    let resolved = match value {
        FieldValue::Set(value) => value.clone(),
        FieldValue::ServerTimestamp => commit_time.clone(),
        FieldValue::Increment(delta) => increment_value(parent.get(last), *delta),
        FieldValue::ArrayUnion(values) => union_array(parent.get(last), values),
        FieldValue::Delete => return,
    };
    parent.insert(last.clone(), resolved);
}

fn navigate_existing<'a>(document: &'a mut Document, segments: &[String]) -> Option<&'a mut Document> {
    let mut current = document;
    for segment in segments {
        current = current.get_mut(segment)?.as_object_mut()?;
    }
    Some(current)
}

fn navigate_create<'a>(document: &'a mut Document, segments: &[String]) -> &'a mut Document {
    match segments.split_first() {
        None => document,
        Some((head, rest)) => {
            let slot = document
                .entry(head.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            navigate_create(ensure_object(slot), rest)
        }
    }
}

// Merge writes through a non-object intermediate replace it, as the hosted store does
fn ensure_object(slot: &mut Value) -> &mut Document {
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    match slot {
        Value::Object(map) => map,
        _ => unreachable!("slot was just replaced with an object"),
    }
}

fn increment_value(existing: Option<&Value>, delta: i64) -> Value {
    match existing {
        Some(Value::Number(number)) => match number.as_i64() {
            Some(current) => json!(current.saturating_add(delta)),
            None => json!(number.as_f64().unwrap_or_default() + delta as f64),
        },
        _ => json!(delta),
    }
}

fn union_array(existing: Option<&Value>, values: &[Value]) -> Value {
    let mut items = match existing {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    };
    for value in values {
        if !items.contains(value) {
            items.push(value.clone());
        }
    }
    Value::Array(items)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: FieldPath,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    /// Documents missing the field never match
    pub fn matches(&self, document: &Document) -> bool {
        let Some(actual) = self.field.lookup(document) else {
            return false;
        };
        match self.op {
            FilterOp::Eq => values_equal(actual, &self.value),
            FilterOp::NotEq => !values_equal(actual, &self.value),
            op => {
                if type_rank(actual) != type_rank(&self.value) {
                    return false;
                }
                let ordering = compare_values(actual, &self.value);
                match op {
                    FilterOp::Lt => ordering == Ordering::Less,
                    FilterOp::Lte => ordering != Ordering::Greater,
                    FilterOp::Gt => ordering == Ordering::Greater,
                    _ => ordering != Ordering::Less,
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Filter, ordering and limit for a live collection query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    filters: Vec<Filter>,
    order_by: Option<(FieldPath, Direction)>,
    limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, field: impl Into<FieldPath>, op: FilterOp, value: Value) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            op,
            value,
        });
        self
    }

    pub fn where_eq(self, field: impl Into<FieldPath>, value: Value) -> Self {
        self.filter(field, FilterOp::Eq, value)
    }

    pub fn order_by(mut self, field: impl Into<FieldPath>, direction: Direction) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, document: &Document) -> bool {
        let ordered = match &self.order_by {
            Some((field, _)) => field.lookup(document).is_some(),
            None => true,
        };
        ordered && self.filters.iter().all(|filter| filter.matches(document))
    }

    /// Filters, sorts and truncates a collection listing
    pub fn apply<I>(&self, documents: I) -> Vec<(String, Document)>
    where
        I: IntoIterator<Item = (String, Document)>,
    {
        let mut results: Vec<(String, Document)> = documents
            .into_iter()
            .filter(|(_, document)| self.matches(document))
            .collect();

        match &self.order_by {
            Some((field, direction)) => results.sort_by(|(a_id, a), (b_id, b)| {
                let ordering = match (field.lookup(a), field.lookup(b)) {
                    (Some(a), Some(b)) => compare_values(a, b),
                    _ => Ordering::Equal,
                };
                let ordering = match direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                };
                ordering.then_with(|| a_id.cmp(b_id))
            }),
            None => results.sort_by(|(a_id, _), (b_id, _)| a_id.cmp(b_id)),
        }

        if let Some(limit) = self.limit {
            results.truncate(limit);
        }
        results
    }
}

fn timestamp_parts(value: &Value) -> Option<(i64, i64)> {
    let object = value.as_object()?;
    if object.len() != 2 {
        return None;
    }
    Some((
        object.get("seconds")?.as_i64()?,
        object.get("nanoseconds")?.as_i64()?,
    ))
}

// null < bool < number < timestamp < string < array < object
fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::Object(_) if timestamp_parts(value).is_some() => 3,
        Value::String(_) => 4,
        Value::Array(_) => 5,
        Value::Object(_) => 6,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => a == b,
    }
}

/// Total order used by range filters and `order_by`
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }
    match (a, b) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Object(_), Value::Object(_)) => match (timestamp_parts(a), timestamp_parts(b)) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => Ordering::Equal,
        },
        _ => Ordering::Equal,
    }
}
