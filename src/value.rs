//! The record value model and field-path accessor (spec §3, §4.1).
//!
//! `Value` is the tagged union every record field holds. `IndexMap` is used
//! for the record variant (instead of `HashMap`) for the same reason the
//! teacher's window state keeps `PartitionBatches`/`PartitionWindowAggStates`
//! as `IndexMap`s: stable iteration order makes output and debugging sane.

use indexmap::IndexMap;
use std::cmp::Ordering;
use std::fmt;

use crate::error::{Result, StreamError};

/// A record is an ordered mapping from field name to value.
pub type Record = IndexMap<String, Value>;

#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Null,
    Array(Vec<Value>),
    Record(Record),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Legacy numeric coercion used by `evaluate_numeric` (spec §4.2 mode 1).
    /// Strings convert to numbers if parseable, else to their length unless
    /// `legacy_string_coercion` is disabled, in which case this returns an
    /// error. Booleans: true -> 1, false -> 0. NULL -> error (callers should
    /// special-case NULL before reaching here; arithmetic-with-NULL is
    /// handled one level up in `evaluate_numeric`).
    pub fn as_numeric(&self, legacy_string_coercion: bool) -> Result<f64> {
        match self {
            Value::Int(i) => Ok(*i as f64),
            Value::Float(f) => Ok(*f),
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Str(s) => {
                if let Ok(n) = s.parse::<f64>() {
                    Ok(n)
                } else if legacy_string_coercion {
                    Ok(s.len() as f64)
                } else {
                    Err(StreamError::eval(format!(
                        "cannot coerce string {s:?} to a number"
                    )))
                }
            }
            Value::Null => Err(StreamError::eval("NULL has no numeric value")),
            Value::Array(_) | Value::Record(_) => Err(StreamError::eval(format!(
                "cannot coerce {self} to a number"
            ))),
        }
    }

    /// Truthiness for WHERE/HAVING/CASE-WHEN (spec §4.2 mode 3). NULL is
    /// always false; non-zero numeric and non-empty string are truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Null => false,
            Value::Array(a) => !a.is_empty(),
            Value::Record(_) => true,
        }
    }

    /// String form used for cross-type equality and LIKE/string comparisons.
    pub fn as_compare_string(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null => String::new(),
            Value::Array(_) | Value::Record(_) => format!("{self}"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Null => write!(f, "NULL"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Record(_) => write!(f, "<record>"),
        }
    }
}

/// Equality used for GROUP BY routing and CASE comparison: NULL != NULL for
/// routing purposes (spec §3 Group-key), but `Value::case_eq` below gives
/// CASE's NULL = NULL semantics where required.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                *a as f64 == *b
            }
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Null, Value::Null) => false,
            _ => false,
        }
    }
}

impl std::hash::Hash for Value {
    // `Int`/`Float` share a discriminant tag and both hash their `f64`
    // representation's bits, matching the cross-type coercion `PartialEq`
    // above performs (`Int(a) == Float(b)` iff `a as f64 == b`). Without
    // this, equal values could hash to different buckets and break
    // `GroupKey` routing in `window/manager.rs`.
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            Value::Int(i) => {
                0u8.hash(state);
                (*i as f64).to_bits().hash(state);
            }
            Value::Float(f) => {
                0u8.hash(state);
                f.to_bits().hash(state);
            }
            Value::Bool(b) => {
                2u8.hash(state);
                b.hash(state);
            }
            Value::Str(s) => {
                3u8.hash(state);
                s.hash(state);
            }
            Value::Null => 4u8.hash(state),
            Value::Array(items) => {
                5u8.hash(state);
                items.hash(state);
            }
            Value::Record(_) => 6u8.hash(state),
        }
    }
}

impl Eq for Value {}

/// `CASE` equality: unlike GROUP BY routing, NULL = NULL is true only here
/// (spec §3 Group-key invariant: "NULL = NULL only within CASE equality").
pub fn case_eq(a: &Value, b: &Value) -> bool {
    if a.is_null() && b.is_null() {
        return true;
    }
    a == b
}

pub fn partial_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x.partial_cmp(y),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y),
        (Value::Int(x), Value::Float(y)) => (*x as f64).partial_cmp(y),
        (Value::Float(x), Value::Int(y)) => x.partial_cmp(&(*y as f64)),
        (Value::Str(x), Value::Str(y)) => x.partial_cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.partial_cmp(y),
        _ => None,
    }
}

/// One step of a resolved field path (spec §4.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathStep {
    Field(String),
    Index(i64),
    Key(String),
}

/// A parsed path literal: `a.b[0]['k']`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path(pub Vec<PathStep>);

impl Path {
    pub fn single(name: impl Into<String>) -> Self {
        Path(vec![PathStep::Field(name.into())])
    }
}

/// Parses a dotted/bracketed path literal into an ordered sequence of steps.
///
/// Grammar (spec §4.1): dotted identifiers, `[n]` for a (possibly negative)
/// integer index, `["s"]`/`['s']` for a string key (quotes must match).
pub fn parse_path(text: &str) -> Result<Path> {
    let bytes = text.as_bytes();
    let mut steps = Vec::new();
    let mut i = 0usize;
    let mut first = true;

    while i < bytes.len() {
        if bytes[i] == b'.' {
            if first {
                return Err(StreamError::parse("path cannot start with '.'"));
            }
            i += 1;
            continue;
        }
        if bytes[i] == b'[' {
            let end = text[i + 1..]
                .find(']')
                .ok_or_else(|| StreamError::parse("unterminated '[' in path"))?
                + i
                + 1;
            let inner = &text[i + 1..end];
            steps.push(parse_bracket(inner)?);
            i = end + 1;
            first = false;
            continue;
        }
        // identifier run
        let start = i;
        while i < bytes.len() && bytes[i] != b'.' && bytes[i] != b'[' {
            i += 1;
        }
        let ident = &text[start..i];
        if ident.is_empty() {
            return Err(StreamError::parse("empty path segment"));
        }
        steps.push(PathStep::Field(ident.to_string()));
        first = false;
    }

    if steps.is_empty() {
        return Err(StreamError::parse("empty path"));
    }
    Ok(Path(steps))
}

fn parse_bracket(inner: &str) -> Result<PathStep> {
    let trimmed = inner.trim();
    if let Some(quoted) = strip_matching_quotes(trimmed)? {
        return Ok(PathStep::Key(quoted));
    }
    trimmed
        .parse::<i64>()
        .map(PathStep::Index)
        .map_err(|_| StreamError::parse(format!("invalid bracket contents: {inner:?}")))
}

fn strip_matching_quotes(s: &str) -> Result<Option<String>> {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' || first == b'\'') && first == last {
            return Ok(Some(s[1..s.len() - 1].to_string()));
        }
        if first == b'"' || first == b'\'' {
            return Err(StreamError::parse("mismatched quotes in bracket key"));
        }
    }
    Ok(None)
}

/// Resolves a parsed path against a value. Missing at any step resolves to
/// `None` (the caller maps this to NULL); the accessor never allocates on
/// the hot path beyond what the caller already passed in.
pub fn resolve<'a>(root: &'a Value, path: &Path) -> Option<&'a Value> {
    let mut current = root;
    for step in &path.0 {
        current = match (step, current) {
            (PathStep::Field(name), Value::Record(map)) => map.get(name)?,
            (PathStep::Key(key), Value::Record(map)) => map.get(key)?,
            (PathStep::Index(n), Value::Array(items)) => index_seq(items, *n)?,
            (PathStep::Index(n), Value::Record(map)) => map
                .get(&n.to_string())
                .or_else(|| map.get_index(usize::try_from(*n).ok()?).map(|(_, v)| v))?,
            _ => return None,
        };
    }
    Some(current)
}

fn index_seq(items: &[Value], n: i64) -> Option<&Value> {
    let len = items.len() as i64;
    let idx = if n < 0 { len + n } else { n };
    if idx < 0 || idx >= len {
        return None;
    }
    items.get(idx as usize)
}

/// Resolves a dotted path literal directly against a record, returning NULL
/// (not an error) for a missing path.
pub fn get_field(record: &Record, field: &str) -> Value {
    if let Some(v) = record.get(field) {
        return v.clone();
    }
    match parse_path(field) {
        Ok(path) => resolve(&Value::Record(record.clone()), &path)
            .cloned()
            .unwrap_or(Value::Null),
        Err(_) => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(pairs: &[(&str, Value)]) -> Value {
        let mut m = Record::new();
        for (k, v) in pairs {
            m.insert(k.to_string(), v.clone());
        }
        Value::Record(m)
    }

    #[test]
    fn dotted_path_resolves_nested_fields() {
        let v = rec(&[(
            "device",
            rec(&[("info", rec(&[("name", Value::Str("x".into()))]))]),
        )]);
        let path = parse_path("device.info.name").unwrap();
        assert_eq!(resolve(&v, &path), Some(&Value::Str("x".into())));
    }

    #[test]
    fn missing_path_is_none() {
        let v = rec(&[("temperature", Value::Int(25))]);
        let path = parse_path("description").unwrap();
        assert_eq!(resolve(&v, &path), None);
    }

    #[test]
    fn negative_index_counts_from_end() {
        let v = Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        let path = Path(vec![PathStep::Index(-1)]);
        assert_eq!(resolve(&v, &path), Some(&Value::Int(3)));
    }

    #[test]
    fn bracket_key_parses_with_matching_quotes() {
        let path = parse_path("a['k']").unwrap();
        assert_eq!(
            path.0,
            vec![PathStep::Field("a".into()), PathStep::Key("k".into())]
        );
    }

    #[test]
    fn mismatched_quotes_fail_to_parse() {
        assert!(parse_path("a[\"k']").is_err());
    }

    #[test]
    fn case_eq_treats_null_as_equal_but_partialeq_does_not() {
        assert!(case_eq(&Value::Null, &Value::Null));
        assert!(!(Value::Null == Value::Null));
    }

    #[test]
    fn int_and_float_that_compare_equal_hash_equal() {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        fn hash_of(v: &Value) -> u64 {
            let mut h = DefaultHasher::new();
            v.hash(&mut h);
            h.finish()
        }

        let i = Value::Int(7);
        let f = Value::Float(7.0);
        assert_eq!(i, f);
        assert_eq!(hash_of(&i), hash_of(&f));
    }
}
