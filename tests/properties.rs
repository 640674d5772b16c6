//! Property tests for history encoding.

use pageturn::memory::MemoryBrowser;
use pageturn::{BrowserHistory, HistoryAdapter, MessagePackCodec, Page, RouterConfig};
use proptest::prelude::*;
use serde_json::{json, Map, Value};
use std::sync::Arc;

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(future)
}

fn adapter(config: RouterConfig) -> (Arc<MemoryBrowser>, HistoryAdapter) {
    let browser = Arc::new(MemoryBrowser::new("http://app.test/"));
    let adapter = HistoryAdapter::new(browser.clone(), Arc::new(MessagePackCodec::new()), &config);
    (browser, adapter)
}

fn arb_page() -> impl Strategy<Value = Page> {
    (
        "[A-Z][a-z]{0,8}(/[A-Z][a-z]{0,8})?",
        "/[a-z0-9/]{0,16}",
        proptest::option::of("[a-f0-9]{1,8}"),
        proptest::collection::btree_map("[a-z]{1,8}", any::<i64>(), 0..6),
        proptest::collection::vec(".{0,24}", 0..4),
    )
        .prop_map(|(component, url, version, numbers, strings)| {
            let mut page = Page::new(component, url);
            page.version = version;
            for (key, n) in numbers {
                page = page.with_prop(key, json!(n));
            }
            page.with_prop("strings", json!(strings))
        })
}

proptest! {
    #[test]
    fn prop_direct_entries_round_trip(page in arb_page()) {
        let (_, adapter) = adapter(RouterConfig::default());
        block_on(adapter.push_state(&page)).unwrap();

        let entry = adapter.current_entry().unwrap();
        prop_assert!(!entry.payload.is_encoded());
        prop_assert_eq!(block_on(adapter.decrypt(&entry)).unwrap(), page);
    }

    #[test]
    fn prop_encoded_entries_round_trip(page in arb_page()) {
        let (_, adapter) = adapter(RouterConfig {
            encrypt_history: true,
            ..Default::default()
        });
        block_on(adapter.push_state(&page)).unwrap();

        let entry = adapter.current_entry().unwrap();
        prop_assert!(entry.payload.is_encoded());
        prop_assert_eq!(block_on(adapter.decrypt(&entry)).unwrap(), page);
    }

    #[test]
    fn prop_written_states_are_valid(page in arb_page(), encrypt in any::<bool>()) {
        let (browser, adapter) = adapter(RouterConfig {
            encrypt_history: encrypt,
            ..Default::default()
        });
        block_on(adapter.push_state(&page)).unwrap();

        let state = browser.state().unwrap();
        prop_assert!(HistoryAdapter::is_valid_state(&state));
    }

    #[test]
    fn prop_unmarked_objects_are_invalid(
        fields in proptest::collection::btree_map("[a-z]{1,10}", any::<i32>(), 0..8)
    ) {
        let object: Map<String, Value> = fields
            .into_iter()
            .map(|(key, value)| (key, json!(value)))
            .collect();
        prop_assert!(!HistoryAdapter::is_valid_state(&Value::Object(object)));
    }
}

#[test]
fn test_scalars_are_invalid_states() {
    for state in [json!(null), json!(1), json!("page"), json!([1, 2])] {
        assert!(!HistoryAdapter::is_valid_state(&state));
    }
}
