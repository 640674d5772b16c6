//! Document `<head>` management.
//!
//! Each mounted head component owns a [`HeadProvider`] and pushes its
//! rendered elements through it. The manager merges all providers on every
//! change: elements sharing an `inertia="key"` attribute replace each
//! other (last one wins) and only the last `<title>` is kept, passed
//! through the title callback.

use parking_lot::Mutex;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

/// Something that renders to a markup string.
pub trait Renderable {
    fn render(&self) -> String;
}

impl Renderable for String {
    fn render(&self) -> String {
        self.clone()
    }
}

impl Renderable for &str {
    fn render(&self) -> String {
        (*self).to_string()
    }
}

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "keygen", "link", "meta", "param",
    "source", "track", "wbr",
];

/// A single head element.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeadTag {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    /// Becomes the `inertia` attribute used for de-duplication.
    pub head_key: Option<String>,
    pub children: Option<String>,
}

impl HeadTag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn title(text: impl Into<String>) -> Self {
        Self::new("title").with_children(text)
    }

    /// Add an attribute. An empty value renders as a bare attribute.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        if name == "head-key" {
            self.head_key = Some(value);
        } else {
            self.attributes.push((name, value));
        }
        self
    }

    pub fn with_children(mut self, children: impl Into<String>) -> Self {
        self.children = Some(children.into());
        self
    }

    pub fn is_void(&self) -> bool {
        VOID_TAGS.contains(&self.name.as_str())
    }
}

impl Renderable for HeadTag {
    fn render(&self) -> String {
        let mut html = format!("<{}", self.name);
        for (name, value) in &self.attributes {
            if value.is_empty() {
                html.push_str(&format!(" {name}"));
            } else {
                html.push_str(&format!(" {name}=\"{value}\""));
            }
        }
        match &self.head_key {
            Some(key) if !key.is_empty() => html.push_str(&format!(" inertia=\"{key}\"")),
            _ => html.push_str(" inertia"),
        }
        html.push('>');

        if self.is_void() {
            return html;
        }

        if let Some(children) = &self.children {
            html.push_str(children);
        }
        html.push_str(&format!("</{}>", self.name));
        html
    }
}

fn title_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(<title [^>]+>)(.*?)(</title>)").expect("valid title pattern")
    })
}

fn key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#" inertia="[^"]+""#).expect("valid key pattern"))
}

type TitleCallback = Box<dyn Fn(&str) -> String + Send + Sync>;
type UpdateCallback = Box<dyn Fn(Vec<String>) + Send + Sync>;

struct HeadState {
    providers: Mutex<BTreeMap<u64, Vec<String>>>,
    next_id: AtomicU64,
    title: TitleCallback,
    on_update: UpdateCallback,
}

impl HeadState {
    fn collect(&self) -> Vec<String> {
        let providers = self.providers.lock();

        let default_title = (self.title)("");
        let mut title =
            (!default_title.is_empty()).then(|| format!("<title inertia>{default_title}</title>"));
        let mut elements: Vec<(Option<String>, String)> = Vec::new();

        for element in providers.values().flatten() {
            if !element.contains('<') {
                continue;
            }

            if element.starts_with("<title ") {
                title = Some(match title_pattern().captures(element) {
                    Some(parts) => format!(
                        "{}{}{}",
                        &parts[1],
                        (self.title)(&parts[2]),
                        &parts[3]
                    ),
                    None => element.clone(),
                });
                continue;
            }

            match key_pattern().find(element) {
                Some(key) => {
                    let key = key.as_str().to_string();
                    let existing = elements
                        .iter_mut()
                        .find(|(k, _)| k.as_deref() == Some(key.as_str()));
                    match existing {
                        Some(slot) => slot.1 = element.clone(),
                        None => elements.push((Some(key), element.clone())),
                    }
                }
                None => elements.push((None, element.clone())),
            }
        }

        title
            .into_iter()
            .chain(elements.into_iter().map(|(_, element)| element))
            .collect()
    }

    fn commit(&self) {
        let elements = self.collect();
        tracing::trace!(elements = elements.len(), "head updated");
        (self.on_update)(elements);
    }
}

/// Merges head elements from all providers and hands the result to the host.
pub struct HeadManager {
    state: Arc<HeadState>,
}

impl HeadManager {
    /// Create a manager. `on_update` receives the merged elements right
    /// away and after every change.
    pub fn new<T, U>(title_callback: T, on_update: U) -> Self
    where
        T: Fn(&str) -> String + Send + Sync + 'static,
        U: Fn(Vec<String>) + Send + Sync + 'static,
    {
        let state = Arc::new(HeadState {
            providers: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            title: Box::new(title_callback),
            on_update: Box::new(on_update),
        });
        state.commit();
        Self { state }
    }

    pub fn create_provider(&self) -> HeadProvider {
        let id = self.state.next_id.fetch_add(1, Ordering::SeqCst);
        self.state.providers.lock().insert(id, Vec::new());
        HeadProvider {
            id,
            state: Arc::downgrade(&self.state),
        }
    }

    /// Re-run the merge and notify the host.
    pub fn force_update(&self) {
        self.state.commit();
    }

    /// The merged elements.
    pub fn collect(&self) -> Vec<String> {
        self.state.collect()
    }
}

/// One head component's slot in the [`HeadManager`].
pub struct HeadProvider {
    id: u64,
    state: Weak<HeadState>,
}

impl HeadProvider {
    /// Replace this provider's elements.
    pub fn update<R: Renderable>(&self, elements: &[R]) {
        let Some(state) = self.state.upgrade() else {
            return;
        };
        {
            let mut providers = state.providers.lock();
            match providers.get_mut(&self.id) {
                Some(slot) => *slot = elements.iter().map(Renderable::render).collect(),
                None => return,
            }
        }
        state.commit();
    }

    /// Remove this provider's elements.
    pub fn disconnect(self) {
        let Some(state) = self.state.upgrade() else {
            return;
        };
        if state.providers.lock().remove(&self.id).is_some() {
            state.commit();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> (HeadManager, Arc<Mutex<Vec<Vec<String>>>>) {
        let updates = Arc::new(Mutex::new(Vec::new()));
        let sink = updates.clone();
        let manager = HeadManager::new(
            |title| {
                if title.is_empty() {
                    title.to_string()
                } else {
                    format!("{title} - App")
                }
            },
            move |elements| sink.lock().push(elements),
        );
        (manager, updates)
    }

    #[test]
    fn test_render_tags() {
        let meta = HeadTag::new("meta")
            .attr("name", "description")
            .attr("content", "Users")
            .attr("head-key", "description");
        assert_eq!(
            meta.render(),
            r#"<meta name="description" content="Users" inertia="description">"#
        );
        assert_eq!(HeadTag::title("Home").render(), "<title inertia>Home</title>");
    }

    #[test]
    fn test_keyed_elements_replace_each_other() {
        let (manager, _) = manager();
        let layout = manager.create_provider();
        let page = manager.create_provider();

        layout.update(&[HeadTag::new("meta")
            .attr("content", "default")
            .attr("head-key", "description")]);
        page.update(&[HeadTag::new("meta")
            .attr("content", "users")
            .attr("head-key", "description")]);

        let elements = manager.collect();
        assert_eq!(elements.len(), 1);
        assert!(elements[0].contains("users"));
    }

    #[test]
    fn test_last_title_wins_through_callback() {
        let (manager, _) = manager();
        let layout = manager.create_provider();
        let page = manager.create_provider();

        layout.update(&[HeadTag::title("Layout")]);
        page.update(&[HeadTag::title("Users")]);

        assert_eq!(
            manager.collect(),
            vec!["<title inertia>Users - App</title>".to_string()]
        );
    }

    #[test]
    fn test_disconnect_commits() {
        let (manager, updates) = manager();
        let provider = manager.create_provider();
        provider.update(&["<link rel=\"icon\" inertia>"]);
        provider.disconnect();

        let updates = updates.lock();
        // initial commit, update, disconnect
        assert_eq!(updates.len(), 3);
        assert_eq!(updates[1].len(), 1);
        assert!(updates[2].is_empty());
    }

    #[test]
    fn test_text_without_markup_is_ignored() {
        let (manager, _) = manager();
        manager.create_provider().update(&["just text"]);
        assert!(manager.collect().is_empty());
    }
}
