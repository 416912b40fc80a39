//! Property tests for the shallow conflict merge.

use offsync_protocol::shallow_merge;
use proptest::prelude::*;
use serde_json::{Map, Value};

fn object_strategy() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map("[a-e]{1,2}", any::<i64>(), 0..8).prop_map(|fields| {
        fields
            .into_iter()
            .map(|(k, v)| (k, Value::from(v)))
            .collect()
    })
}

proptest! {
    #[test]
    fn client_fields_always_win(server in object_strategy(), client in object_strategy()) {
        let merged = shallow_merge(&Value::Object(server), &Value::Object(client.clone()));
        let merged = merged.as_object().unwrap();

        for (key, value) in &client {
            prop_assert_eq!(merged.get(key), Some(value));
        }
    }

    #[test]
    fn server_only_fields_survive(server in object_strategy(), client in object_strategy()) {
        let merged = shallow_merge(&Value::Object(server.clone()), &Value::Object(client.clone()));
        let merged = merged.as_object().unwrap();

        for (key, value) in &server {
            if !client.contains_key(key) {
                prop_assert_eq!(merged.get(key), Some(value));
            }
        }
    }

    #[test]
    fn merged_keys_are_the_union(server in object_strategy(), client in object_strategy()) {
        let merged = shallow_merge(&Value::Object(server.clone()), &Value::Object(client.clone()));
        let merged = merged.as_object().unwrap();

        for key in merged.keys() {
            prop_assert!(server.contains_key(key) || client.contains_key(key));
        }
    }
}
