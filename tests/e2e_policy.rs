//! Property tests for the overwrite policies.

use metadata_merge::{OverwritePolicy, PropertyMap, QName, Value};
use proptest::prelude::*;

const KEYS: [&str; 5] = ["title", "author", "subject", "pages", "created"];

fn q(local: &str) -> QName {
    QName::new("http://example.org/model", local)
}

fn value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        Just(Value::from("")),
        Just(Value::List(Vec::new())),
        "[a-c]{1,2}".prop_map(Value::from),
        (0i64..3).prop_map(Value::Int),
        prop::collection::vec("[a-c]", 1..3)
            .prop_map(|items| Value::List(items.into_iter().map(Value::from).collect())),
    ]
}

fn property_map() -> impl Strategy<Value = PropertyMap> {
    prop::collection::vec((0..KEYS.len(), value()), 0..6)
        .prop_map(|pairs| pairs.into_iter().map(|(i, v)| (q(KEYS[i]), v)).collect())
}

fn policy() -> impl Strategy<Value = OverwritePolicy> {
    prop_oneof![Just(OverwritePolicy::Eager), Just(OverwritePolicy::Pragmatic)]
}

fn merged(existing: &PropertyMap, incoming: &PropertyMap, policy: OverwritePolicy) -> PropertyMap {
    let mut out = existing.clone();
    for (name, value) in policy.apply(incoming, existing) {
        out.insert(name, value);
    }
    out
}

proptest! {
    #[test]
    fn delta_only_carries_incoming_changes(
        incoming in property_map(),
        existing in property_map(),
        policy in policy(),
    ) {
        let delta = policy.apply(&incoming, &existing);
        for (name, value) in delta.iter() {
            prop_assert_eq!(incoming.get(name), Some(value));
            prop_assert_ne!(existing.get(name), Some(value));
        }
    }

    #[test]
    fn eager_takes_every_differing_value(incoming in property_map(), existing in property_map()) {
        let delta = OverwritePolicy::Eager.apply(&incoming, &existing);
        for (name, value) in &incoming {
            prop_assert_eq!(delta.contains(name), existing.get(name) != Some(value));
        }
    }

    #[test]
    fn pragmatic_never_overwrites_populated_values(
        incoming in property_map(),
        existing in property_map(),
    ) {
        let delta = OverwritePolicy::Pragmatic.apply(&incoming, &existing);
        for name in delta.names() {
            prop_assert!(existing.get(name).is_none_or(Value::is_empty));
        }
        for (name, value) in &incoming {
            let fillable = existing.get(name).is_none_or(Value::is_empty);
            prop_assert_eq!(delta.contains(name), fillable && existing.get(name) != Some(value));
        }
    }

    #[test]
    fn applying_twice_changes_nothing_more(
        incoming in property_map(),
        existing in property_map(),
        policy in policy(),
    ) {
        let once = merged(&existing, &incoming, policy);
        prop_assert!(policy.apply(&incoming, &once).is_empty());
    }
}
