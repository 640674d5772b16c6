//! URL helpers for visits: resolution, GET data merging, fragment handling.

use crate::error::Result;
use crate::types::{ArrayFormat, Method};
use serde_json::{Map, Value};
use url::form_urlencoded::byte_serialize;
use url::Url;

/// Resolve `target` against `base` (absolute, path-absolute, relative, `?query`, `#hash`).
pub fn resolve(base: &str, target: &str) -> Result<Url> {
    let base = Url::parse(base)?;
    Ok(base.join(target)?)
}

/// The URL as a string with its fragment removed.
pub fn without_fragment(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.to_string()
}

/// Whether both URLs point at the same document, ignoring fragments.
pub fn same_document(a: &Url, b: &Url) -> bool {
    without_fragment(a) == without_fragment(b)
}

/// Carry the requested fragment over to a response URL that lacks one.
///
/// Only applies when both URLs are otherwise identical; servers never see
/// fragments, so a redirect-free response loses them.
pub fn carry_fragment(requested: &Url, response: &Url) -> Url {
    match requested.fragment() {
        Some(fragment) if response.fragment().is_none() && same_document(requested, response) => {
            let mut carried = response.clone();
            carried.set_fragment(Some(fragment));
            carried
        }
        _ => response.clone(),
    }
}

/// `url` with its fragment replaced by `fragment` (removed for `None`).
///
/// Works on the text, so relative URLs stay relative.
pub fn with_fragment(url: &str, fragment: Option<&str>) -> String {
    let base = url.split_once('#').map_or(url, |(base, _)| base);
    match fragment {
        Some(fragment) => format!("{base}#{fragment}"),
        None => base.to_string(),
    }
}

/// `url` carrying the fragment of the current location `href`, in the
/// form `url` was given in.
pub fn with_location_fragment(url: &str, href: &str) -> String {
    let Ok(location) = Url::parse(href) else {
        return url.to_string();
    };
    let current = url.split_once('#').map(|(_, fragment)| fragment);
    if current == location.fragment() {
        return url.to_string();
    }
    with_fragment(url, location.fragment())
}

/// For GET visits, move `data` into the query string and return an empty body.
///
/// Keys already present in the query are overwritten by keys from `data`.
/// Other methods return the URL and data unchanged.
pub fn merge_data_into_query(
    method: Method,
    mut url: Url,
    data: Value,
    format: ArrayFormat,
) -> (Url, Value) {
    let has_data = match &data {
        Value::Object(map) => !map.is_empty(),
        Value::Null => false,
        _ => true,
    };
    if !method.is_get() || !has_data {
        return (url, data);
    }

    let mut incoming = Vec::new();
    match &data {
        Value::Object(map) => {
            for (key, value) in map {
                flatten(&mut incoming, encode_component(key), value, format);
            }
        }
        other => flatten(&mut incoming, "data".to_string(), other, format),
    }

    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (encode_key(&k), encode_component(&v)))
        .filter(|(k, _)| !incoming.iter().any(|(ik, _)| same_root(ik, k)))
        .collect();
    pairs.extend(incoming);

    let query = pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    url.set_query(if query.is_empty() { None } else { Some(&query) });

    (url, Value::Object(Map::new()))
}

/// Top-level key of a (possibly bracketed) query key: `a[b][]` -> `a`.
fn root_key(key: &str) -> &str {
    key.split('[').next().unwrap_or(key)
}

fn same_root(a: &str, b: &str) -> bool {
    root_key(a) == root_key(b)
}

fn encode_component(s: &str) -> String {
    byte_serialize(s.as_bytes()).collect()
}

/// Re-encode a decoded key, keeping bracket syntax readable.
fn encode_key(key: &str) -> String {
    let root = root_key(key);
    format!("{}{}", encode_component(root), &key[root.len()..])
}

fn flatten(out: &mut Vec<(String, String)>, prefix: String, value: &Value, format: ArrayFormat) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                flatten(out, format!("{prefix}[{}]", encode_component(key)), nested, format);
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                let key = match format {
                    ArrayFormat::Brackets => format!("{prefix}[]"),
                    ArrayFormat::Indices => format!("{prefix}[{index}]"),
                };
                flatten(out, key, item, format);
            }
        }
        Value::Null => out.push((prefix, String::new())),
        Value::Bool(b) => out.push((prefix, b.to_string())),
        Value::Number(n) => out.push((prefix, n.to_string())),
        Value::String(s) => out.push((prefix, encode_component(s))),
    }
}
