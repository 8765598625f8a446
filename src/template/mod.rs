//! URL template resolution and query string building.
//!
//! Templates use `:name` placeholders (`/projects/:projectId/environments/:id`).
//! A placeholder without a value resolves to an empty segment and its leading
//! separator is dropped, so the same template serves both the collection and
//! the instance endpoint.

use serde_json::{Map, Value};

/// Ordered parameter mapping used for path and query parameters.
pub type Params = Map<String, Value>;

/// How array values are written into a query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ArrayEncoding {
    /// Repeated bare keys: `key=a&key=b`.
    #[default]
    Repeat,
    /// Keys carrying a suffix, e.g. `key[]=a&key[]=b`.
    Suffix(String),
}

impl ArrayEncoding {
    /// Bracket-suffixed keys (`key[]=a`).
    pub fn brackets() -> Self {
        Self::Suffix("[]".to_string())
    }
}

/// Builds a [`Params`] map from a JSON object literal. Non-objects give an empty map.
pub fn params(value: Value) -> Params {
    match value {
        Value::Object(map) => map,
        _ => Params::new(),
    }
}

/// Substitutes `:name` placeholders from `params`, falling back to `defaults`.
pub fn resolve(template: &str, params: &Params, defaults: &Params) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((index, c)) = chars.next() {
        let starts_name = c == ':'
            && chars
                .peek()
                .map_or(false, |&(_, next)| next.is_ascii_alphabetic() || next == '_');
        if !starts_name {
            out.push(c);
            continue;
        }

        let start = index + 1;
        let mut end = start;
        while let Some(&(j, next)) = chars.peek() {
            if next.is_ascii_alphanumeric() || next == '_' {
                end = j + next.len_utf8();
                chars.next();
            } else {
                break;
            }
        }

        let name = &template[start..end];
        match lookup(name, params, defaults) {
            Some(value) => out.push_str(&urlencoding::encode(&value)),
            None => {
                let next = chars.peek().map(|&(_, n)| n);
                if out.ends_with('/') && matches!(next, None | Some('/') | Some('?')) {
                    out.pop();
                }
            }
        }
    }

    out
}

fn lookup(name: &str, params: &Params, defaults: &Params) -> Option<String> {
    params
        .get(name)
        .and_then(scalar_to_string)
        .or_else(|| defaults.get(name).and_then(scalar_to_string))
        .filter(|value| !value.is_empty())
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// Serializes a mapping into a query string, preserving insertion order.
pub fn build_query_string(params: &Params, encoding: &ArrayEncoding) -> String {
    let mut pairs = Vec::new();
    for (key, value) in params {
        flatten(encode_key(key), value, encoding, &mut pairs);
    }
    pairs.join("&")
}

/// Percent-encodes a key but leaves brackets literal, matching the array
/// suffix and `parent[child]` nesting.
fn encode_key(key: &str) -> String {
    urlencoding::encode(key)
        .replace("%5B", "[")
        .replace("%5D", "]")
}

fn flatten(key: String, value: &Value, encoding: &ArrayEncoding, pairs: &mut Vec<String>) {
    match value {
        Value::Null => {}
        Value::Array(items) => {
            let item_key = match encoding {
                ArrayEncoding::Repeat => key,
                ArrayEncoding::Suffix(suffix) => format!("{}{}", key, suffix),
            };
            for item in items {
                flatten(item_key.clone(), item, encoding, pairs);
            }
        }
        Value::Object(map) => {
            for (child, child_value) in map {
                let child_key = format!("{}[{}]", key, encode_key(child));
                flatten(child_key, child_value, encoding, pairs);
            }
        }
        scalar => {
            let text = scalar_to_string(scalar).unwrap_or_default();
            pairs.push(format!("{}={}", key, urlencoding::encode(&text)));
        }
    }
}

/// Appends a query string, omitting the `?` when there is nothing to append.
pub fn append_query(url: &str, query: &str) -> String {
    if query.is_empty() {
        return url.to_string();
    }
    let joiner = if url.contains('?') { '&' } else { '?' };
    format!("{}{}{}", url, joiner, query)
}
