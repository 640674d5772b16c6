//! Core types for the navigation engine.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::NavigationError;

/// Prop key reserved for server-reported validation errors.
pub const ERRORS_PROP: &str = "errors";

/// Page props, keyed by prop name.
pub type Props = Map<String, Value>;

/// Validation errors: field name to message, or bag name to nested errors.
pub type Errors = Map<String, Value>;

/// Scroll offset of the document or a single scroll region.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrollRegion {
    pub top: f64,
    pub left: f64,
}

impl ScrollRegion {
    pub const ORIGIN: ScrollRegion = ScrollRegion { top: 0.0, left: 0.0 };

    pub fn new(top: f64, left: f64) -> Self {
        Self { top, left }
    }
}

/// A page snapshot: one rendered server page.
///
/// Snapshots are shared as `Arc<Page>` once they become current; changes
/// always produce a new snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// Name of the component the renderer mounts.
    pub component: String,

    /// Component props, including the reserved `errors` key.
    #[serde(default)]
    pub props: Props,

    /// URL of the page (path + query + fragment, or absolute).
    pub url: String,

    /// Server asset version.
    #[serde(default)]
    pub version: Option<String>,

    /// Offsets of the registered scroll regions, in document order.
    #[serde(default)]
    pub scroll_regions: Vec<ScrollRegion>,

    /// Arbitrary client state remembered against this page.
    #[serde(default)]
    pub remembered_state: Map<String, Value>,
}

impl Page {
    /// Create a page with no props.
    pub fn new(component: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            props: Props::new(),
            url: url.into(),
            version: None,
            scroll_regions: Vec::new(),
            remembered_state: Map::new(),
        }
    }

    /// Set the asset version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Set a single prop.
    pub fn with_prop(mut self, key: impl Into<String>, value: Value) -> Self {
        self.props.insert(key.into(), value);
        self
    }

    /// Validation errors carried under the reserved `errors` prop.
    pub fn errors(&self) -> Errors {
        match self.props.get(ERRORS_PROP) {
            Some(Value::Object(errors)) => errors.clone(),
            _ => Errors::new(),
        }
    }

    /// Whether the page carries any validation errors.
    pub fn has_errors(&self) -> bool {
        matches!(self.props.get(ERRORS_PROP), Some(Value::Object(errors)) if !errors.is_empty())
    }

    /// Errors scoped to `bag`, or all errors when no bag is given.
    pub fn scoped_errors(&self, bag: Option<&str>) -> Errors {
        let errors = self.errors();
        match bag {
            None => errors,
            Some(bag) => match errors.get(bag) {
                Some(Value::Object(scoped)) => scoped.clone(),
                _ => Errors::new(),
            },
        }
    }

    /// Whether both snapshots render the same component.
    pub fn is_same_component(&self, other: &Page) -> bool {
        self.component == other.component
    }

    /// Overlay `partial` props on top of this page's props.
    ///
    /// Keys absent from `partial` keep their current value.
    pub fn merge_props(&self, partial: &Props) -> Props {
        let mut merged = self.props.clone();
        for (key, value) in partial {
            merged.insert(key.clone(), value.clone());
        }
        merged
    }
}

/// HTTP method of a visit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    pub fn is_get(&self) -> bool {
        matches!(self, Method::Get)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = NavigationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Ok(Method::Get),
            "post" => Ok(Method::Post),
            "put" => Ok(Method::Put),
            "patch" => Ok(Method::Patch),
            "delete" => Ok(Method::Delete),
            other => Err(NavigationError::InvalidOperation(format!(
                "unsupported method: {other}"
            ))),
        }
    }
}

/// How arrays in GET data are written into the query string.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrayFormat {
    /// `tags[]=a&tags[]=b`
    #[default]
    Brackets,
    /// `tags[0]=a&tags[1]=b`
    Indices,
}

/// Policy deciding whether scroll position or component state survives a visit.
#[derive(Clone)]
pub enum PreserveOption {
    Bool(bool),
    /// True when the incoming page carries validation errors.
    Errors,
    Predicate(Arc<dyn Fn(&Page) -> bool + Send + Sync>),
}

impl PreserveOption {
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Page) -> bool + Send + Sync + 'static,
    {
        PreserveOption::Predicate(Arc::new(f))
    }

    /// Resolve the option against the incoming page.
    pub fn resolve(&self, page: &Page) -> bool {
        match self {
            PreserveOption::Bool(value) => *value,
            PreserveOption::Errors => page.has_errors(),
            PreserveOption::Predicate(f) => f(page),
        }
    }

    /// Whether the option is literally `true`.
    pub fn is_true(&self) -> bool {
        matches!(self, PreserveOption::Bool(true))
    }
}

impl Default for PreserveOption {
    fn default() -> Self {
        PreserveOption::Bool(false)
    }
}

impl From<bool> for PreserveOption {
    fn from(value: bool) -> Self {
        PreserveOption::Bool(value)
    }
}

impl fmt::Debug for PreserveOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreserveOption::Bool(value) => write!(f, "Bool({value})"),
            PreserveOption::Errors => f.write_str("Errors"),
            PreserveOption::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Upload/download progress tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Progress {
    pub loaded: u64,
    pub total: Option<u64>,
    pub percentage: Option<u8>,
}

impl Progress {
    pub fn new(loaded: u64, total: Option<u64>) -> Self {
        let percentage = total
            .filter(|total| *total > 0)
            .map(|total| ((loaded as f64 / total as f64) * 100.0).round().clamp(0.0, 100.0) as u8);
        Self {
            loaded,
            total,
            percentage,
        }
    }
}

/// Response handed back by the transport, before classification.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    /// Header names are stored lowercased.
    pub headers: BTreeMap<String, String>,
    pub body: Value,
}

impl RawResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: Value::Null,
        }
    }

    /// An inertia page response.
    pub fn page(page: &Page) -> Self {
        Self::new(200)
            .with_header(crate::visit::HEADER_INERTIA, "true")
            .with_body(serde_json::to_value(page).unwrap_or(Value::Null))
    }

    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Opaque handle returned by a renderer on first mount.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RenderHandle(pub u64);

/// Content hash (SHA-256), used to key decoded history blobs.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    /// Compute hash from bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Hash(hasher.finalize().into())
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({}...)", &self.to_hex()[..8])
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
