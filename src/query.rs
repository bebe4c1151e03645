//! # Query Codec
//!
//! Nested parameter structures to and from the bracketed query-string form:
//!
//! ```text
//! {user: {name: "Bob", tags: ["a", "b"]}}
//!   <=> user[name]=Bob&user[tags][]=a&user[tags][]=b
//! ```
//!
//! [`to_query_string`] is what URL generation appends for params no path
//! segment consumed; [`parse_query`] is the matching decoder a request
//! parameter parser uses.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Top-level parameter map.
pub type QueryMap = BTreeMap<String, Value>;

/// A parameter value: a string, a sequence, or a nested map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Text(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// A text value from anything with a URL token form.
    pub fn param<T: ToParam + ?Sized>(value: &T) -> Self {
        Value::Text(value.to_param())
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::Text(text)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Text(n.to_string())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Text(n.to_string())
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Text(n.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Map(map)
    }
}

/// Canonical URL token of a value.
///
/// Records implement this by returning their identifier, so a record can be
/// passed wherever a path placeholder expects its id.
pub trait ToParam {
    fn to_param(&self) -> String;
}

impl ToParam for str {
    fn to_param(&self) -> String {
        self.to_string()
    }
}

impl ToParam for String {
    fn to_param(&self) -> String {
        self.clone()
    }
}

macro_rules! to_param_display {
    ($($ty:ty),*) => {
        $(impl ToParam for $ty {
            fn to_param(&self) -> String {
                self.to_string()
            }
        })*
    };
}

to_param_display!(i32, i64, u32, u64, usize, bool);

impl<T: ToParam + ?Sized> ToParam for &T {
    fn to_param(&self) -> String {
        (**self).to_param()
    }
}

impl ToParam for Value {
    /// Text as is, sequences joined with `/`, maps as a query string.
    fn to_param(&self) -> String {
        match self {
            Value::Text(text) => text.clone(),
            Value::List(items) => items
                .iter()
                .map(ToParam::to_param)
                .collect::<Vec<_>>()
                .join("/"),
            Value::Map(map) => to_query_string(map),
        }
    }
}

/// Errors decoding a query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// A key is used both as a scalar and as a nested structure
    TypeMismatch {
        /// The offending key path as written
        key: String,
    },
    /// A component is not valid percent-encoded UTF-8
    InvalidEncoding(String),
    /// A name nests deeper than [`MAX_NESTING`] brackets
    TooDeep {
        /// The top-level key of the offending name
        key: String,
    },
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::TypeMismatch { key } => {
                write!(f, "conflicting types for query parameter '{key}'")
            }
            QueryError::InvalidEncoding(component) => {
                write!(f, "invalid percent-encoding in query component '{component}'")
            }
            QueryError::TooDeep { key } => {
                write!(f, "query parameter '{key}' nests deeper than {MAX_NESTING} levels")
            }
        }
    }
}

impl std::error::Error for QueryError {}

/// Serialize a parameter map.
///
/// Keys and values are percent-encoded; the brackets of nested names are not.
#[must_use]
pub fn to_query_string(params: &QueryMap) -> String {
    let mut pairs = Vec::new();
    for (key, value) in params {
        encode_value(&urlencoding::encode(key), value, &mut pairs);
    }
    pairs.join("&")
}

fn encode_value(prefix: &str, value: &Value, pairs: &mut Vec<String>) {
    match value {
        Value::Text(text) => pairs.push(format!("{prefix}={}", urlencoding::encode(text))),
        Value::List(items) => {
            let name = format!("{prefix}[]");
            for item in items {
                encode_value(&name, item, pairs);
            }
        }
        Value::Map(map) => {
            for (key, nested) in map {
                let name = format!("{prefix}[{}]", urlencoding::encode(key));
                encode_value(&name, nested, pairs);
            }
        }
    }
}

/// Deepest bracket nesting `parse_query` accepts.
pub const MAX_NESTING: usize = 100;

/// Decode a query string into nested maps and sequences.
///
/// `a[]=1&a[]=2` builds a sequence; `a[][x]=1&a[][y]=2` keeps adding keys to
/// the last map of the sequence until the full key path repeats, which starts
/// a new map. `a[][]=1&a[][]=2` appends to the last nested sequence, so
/// `[["1", "2"]]` and `[["1"], ["2"]]` encode the same way and decode as the
/// former.
pub fn parse_query(query: &str) -> Result<QueryMap, QueryError> {
    let mut params = QueryMap::new();
    for pair in query.split(['&', ';']).filter(|p| !p.is_empty()) {
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        let name = decode_component(name)?;
        let value = decode_component(value)?;
        let path = key_path(&name)?;
        if matches!(path.first(), Some(KeySegment::Key(key)) if !key.is_empty()) {
            insert_path(&mut params, &path, &name, Value::Text(value))?;
        }
    }
    Ok(params)
}

fn decode_component(raw: &str) -> Result<String, QueryError> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .map_err(|_| QueryError::InvalidEncoding(raw.to_string()))
}

/// One step of a bracketed parameter name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeySegment<'a> {
    /// `name` or `[name]`
    Key(&'a str),
    /// `[]`
    Push,
}

/// `user[tags][]` -> `[Key("user"), Key("tags"), Push]`. Text after the last
/// closed bracket is ignored.
fn key_path(name: &str) -> Result<Vec<KeySegment<'_>>, QueryError> {
    let (head, mut rest) = name.split_at(name.find('[').unwrap_or(name.len()));
    let mut path = vec![KeySegment::Key(head)];
    while let Some(inner) = rest.strip_prefix('[') {
        let Some(end) = inner.find(']') else {
            break;
        };
        if path.len() == MAX_NESTING {
            return Err(QueryError::TooDeep {
                key: head.to_string(),
            });
        }
        path.push(match &inner[..end] {
            "" => KeySegment::Push,
            key => KeySegment::Key(key),
        });
        rest = &inner[end + 1..];
    }
    Ok(path)
}

/// Whether `map` already holds a value at the plain key path `path`. Paths
/// through a sequence never count as present.
fn has_path(map: &QueryMap, path: &[KeySegment<'_>]) -> bool {
    let mut current = map;
    for (i, segment) in path.iter().enumerate() {
        let KeySegment::Key(key) = segment else {
            return false;
        };
        match (current.get(*key), i + 1 == path.len()) {
            (Some(_), true) => return true,
            (Some(Value::Map(nested)), false) => current = nested,
            _ => return false,
        }
    }
    false
}

enum Container<'v> {
    Map(&'v mut QueryMap),
    List(&'v mut Vec<Value>),
}

fn insert_path(
    params: &mut QueryMap,
    path: &[KeySegment<'_>],
    name: &str,
    value: Value,
) -> Result<(), QueryError> {
    let mismatch = || QueryError::TypeMismatch {
        key: name.to_string(),
    };

    let mut container = Container::Map(params);
    for (i, segment) in path.iter().enumerate() {
        let next = path.get(i + 1);
        container = match (container, segment) {
            (Container::Map(map), KeySegment::Key(key)) => {
                let Some(next) = next else {
                    map.insert(key.to_string(), value);
                    return Ok(());
                };
                let slot = map.entry(key.to_string()).or_insert_with(|| match next {
                    KeySegment::Key(_) => Value::Map(QueryMap::new()),
                    KeySegment::Push => Value::List(Vec::new()),
                });
                match (slot, next) {
                    (Value::Map(nested), KeySegment::Key(_)) => Container::Map(nested),
                    (Value::List(items), KeySegment::Push) => Container::List(items),
                    _ => return Err(mismatch()),
                }
            }
            (Container::List(items), KeySegment::Push) => match next {
                None => {
                    items.push(value);
                    return Ok(());
                }
                Some(KeySegment::Key(_)) => {
                    let reuse = matches!(
                        items.last(),
                        Some(Value::Map(last)) if !has_path(last, &path[i + 1..])
                    );
                    if !reuse {
                        items.push(Value::Map(QueryMap::new()));
                    }
                    match items.last_mut() {
                        Some(Value::Map(last)) => Container::Map(last),
                        _ => return Err(mismatch()),
                    }
                }
                Some(KeySegment::Push) => {
                    if !matches!(items.last(), Some(Value::List(_))) {
                        items.push(Value::List(Vec::new()));
                    }
                    match items.last_mut() {
                        Some(Value::List(last)) => Container::List(last),
                        _ => return Err(mismatch()),
                    }
                }
            },
            _ => return Err(mismatch()),
        };
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: Vec<(&str, Value)>) -> QueryMap {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn flat_pairs() {
        let params = map(vec![("sort", "asc".into()), ("page", Value::from(2i64))]);
        assert_eq!(to_query_string(&params), "page=2&sort=asc");
    }

    #[test]
    fn nested_structures_use_brackets() {
        let user = map(vec![("name", "Bob".into()), ("tags", vec!["a", "b"].into())]);
        let params = map(vec![("user", Value::Map(user))]);
        assert_eq!(
            to_query_string(&params),
            "user[name]=Bob&user[tags][]=a&user[tags][]=b"
        );
    }

    #[test]
    fn values_are_percent_encoded() {
        let params = map(vec![("q", "a b&c".into())]);
        assert_eq!(to_query_string(&params), "q=a%20b%26c");
    }

    #[test]
    fn round_trip_nested() {
        let user = map(vec![("name", "Bob".into()), ("tags", vec!["a", "b"].into())]);
        let params = map(vec![("user", Value::Map(user))]);
        assert_eq!(parse_query(&to_query_string(&params)).unwrap(), params);
    }

    #[test]
    fn list_of_maps() {
        let parsed = parse_query("p[][x]=1&p[][y]=2&p[][x]=3").unwrap();
        let expected = map(vec![(
            "p",
            Value::List(vec![
                Value::Map(map(vec![("x", "1".into()), ("y", "2".into())])),
                Value::Map(map(vec![("x", "3".into())])),
            ]),
        )]);
        assert_eq!(parsed, expected);
    }

    #[test]
    fn plus_decodes_to_space() {
        let parsed = parse_query("name=Bob+Smith").unwrap();
        assert_eq!(parsed.get("name"), Some(&Value::from("Bob Smith")));
    }

    #[test]
    fn scalar_then_nested_is_a_mismatch() {
        let err = parse_query("a=1&a[b]=2").unwrap_err();
        assert_eq!(
            err,
            QueryError::TypeMismatch {
                key: "a[b]".to_string()
            }
        );
    }

    #[test]
    fn list_of_maps_with_nested_keys() {
        let inner = map(vec![("a", "1".into()), ("b", "2".into())]);
        let params = map(vec![(
            "p",
            Value::List(vec![Value::Map(map(vec![("x", Value::Map(inner))]))]),
        )]);
        let encoded = to_query_string(&params);
        assert_eq!(encoded, "p[][x][a]=1&p[][x][b]=2");
        assert_eq!(parse_query(&encoded).unwrap(), params);
    }

    #[test]
    fn nested_lists_keep_their_values() {
        let params = map(vec![(
            "a",
            Value::List(vec![Value::List(vec!["x".into(), "y".into()])]),
        )]);
        let encoded = to_query_string(&params);
        assert_eq!(encoded, "a[][]=x&a[][]=y");
        assert_eq!(parse_query(&encoded).unwrap(), params);
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let query = format!("a{}=1", "[b]".repeat(2000));
        assert_eq!(
            parse_query(&query),
            Err(QueryError::TooDeep { key: "a".to_string() })
        );

        let within = format!("a{}=1", "[b]".repeat(MAX_NESTING - 1));
        let parsed = parse_query(&within).unwrap();
        let mut depth = 0;
        let mut current = &parsed["a"];
        while let Value::Map(nested) = current {
            depth += 1;
            current = &nested["b"];
        }
        assert_eq!(depth, MAX_NESTING - 1);
        assert_eq!(current, &Value::from("1"));
    }

    #[test]
    fn list_to_param_joins_with_slash() {
        assert_eq!(Value::from(vec!["2024", "01"]).to_param(), "2024/01");
    }
}
