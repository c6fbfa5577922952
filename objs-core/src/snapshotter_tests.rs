/*!
Tests for the Snapshotter in both tracking modes.
*/

#[cfg(test)]
mod tests {
    use crate::comparer::ComparisonOptions;
    use crate::config::{IdentificationKind, PropertyNameCasingKind, SnapshotKind, SnapshotterConfig};
    use crate::error::{InvalidArgument, ObjsError};
    use crate::snapshotter::{Snapshotter, TrackingKey};
    use crate::types::ValueKind;
    use crate::value::Value;
    use chrono::Utc;
    use serde_json::json;
    use std::cell::Cell;
    use std::fmt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tracing::field::{Field, Visit};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    /// Counts "Snapshotter created" events
    struct CreationCounter(Arc<AtomicUsize>);

    struct MessageVisitor(String);

    impl Visit for MessageVisitor {
        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            if field.name() == "message" {
                self.0 = format!("{value:?}");
            }
        }
    }

    impl<S: tracing::Subscriber> Layer<S> for CreationCounter {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            let mut visitor = MessageVisitor(String::new());
            event.record(&mut visitor);
            if visitor.0 == "Snapshotter created" {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn with_reference_tracking(history_depth: usize) -> Snapshotter {
        Snapshotter::new(
            SnapshotterConfig::new()
                .with_history_depth(history_depth)
                .with_identification_kind(IdentificationKind::Reference),
        )
        .unwrap()
    }

    fn with_id_tracking(history_depth: usize) -> Snapshotter {
        Snapshotter::new(
            SnapshotterConfig::new()
                .with_history_depth(history_depth)
                .with_identification_kind(IdentificationKind::Id),
        )
        .unwrap()
    }

    fn primitives() -> Vec<Value> {
        vec![Value::from(true), Value::from(42), Value::from("text")]
    }

    fn prop(value: &Value) -> Option<String> {
        value.get("prop").as_str().map(str::to_string)
    }

    #[test]
    fn test_new_rejects_zero_history_depth() {
        let result = Snapshotter::new(SnapshotterConfig::new().with_history_depth(0));
        assert!(matches!(result, Err(ObjsError::Configuration(_))));
    }

    #[test]
    fn test_default_snapshotter() {
        let snapshotter = Snapshotter::default();
        assert_eq!(snapshotter.configuration(), &SnapshotterConfig::default());
        assert!(snapshotter.is_empty());
    }

    #[test]
    fn test_has_and_count_never_fail() {
        for snapshotter in [with_reference_tracking(3), with_id_tracking(3)] {
            let mut candidates = primitives();
            candidates.extend([
                Value::Null,
                Value::Undefined,
                Value::from(Utc::now()),
                Value::empty_object(),
                Value::object([("id", 1)]),
            ]);

            for value in &candidates {
                assert!(!snapshotter.has(value));
                assert_eq!(snapshotter.count(value), 0);
            }
        }
    }

    #[test]
    fn test_has_and_count_in_reference_tracking_mode() {
        let mut snapshotter = with_reference_tracking(3);
        let tracked = Value::object([("prop", "old")]);

        snapshotter.save(&tracked).unwrap();
        assert!(snapshotter.has(&tracked));
        assert_eq!(snapshotter.count(&tracked), 1);

        tracked.set("prop", "new");
        snapshotter.save(&tracked).unwrap();
        assert_eq!(snapshotter.count(&tracked), 2);

        // Same shape, different instance
        assert!(!snapshotter.has(&Value::object([("prop", "new")])));
    }

    #[test]
    fn test_has_and_count_in_id_tracking_mode() {
        let mut snapshotter = with_id_tracking(3);
        snapshotter.save(&Value::object([("id", "a"), ("prop", "old")])).unwrap();
        snapshotter.save(&Value::object([("id", "a"), ("prop", "new")])).unwrap();

        assert!(snapshotter.has(&Value::object([("id", "a")])));
        assert_eq!(snapshotter.count(&Value::object([("id", "a")])), 2);
        assert!(!snapshotter.has(&Value::object([("id", "b")])));
        assert_eq!(snapshotter.len(), 1);
    }

    #[test]
    fn test_save_validation_in_reference_tracking_mode() {
        let mut snapshotter = with_reference_tracking(3);

        let error = snapshotter.save(&Value::Null).unwrap_err();
        assert!(error.is_invalid_argument(&InvalidArgument::NotDefined("value")));
        let error = snapshotter.save(&Value::Undefined).unwrap_err();
        assert!(error.is_invalid_argument(&InvalidArgument::NotDefined("value")));

        for value in primitives() {
            let error = snapshotter.save(&value).unwrap_err();
            assert!(error.is_invalid_argument(&InvalidArgument::Primitive));
        }

        let error = snapshotter.save(&Value::from(Utc::now())).unwrap_err();
        assert!(error.is_invalid_argument(&InvalidArgument::Immutable(ValueKind::Date)));
        let error = snapshotter
            .save(&Value::function("noop", |_| Value::Undefined))
            .unwrap_err();
        assert!(error.is_invalid_argument(&InvalidArgument::Immutable(ValueKind::Function)));

        assert!(snapshotter.is_empty());
    }

    #[test]
    fn test_save_validation_in_id_tracking_mode() {
        let mut snapshotter = with_id_tracking(3);

        for value in primitives() {
            let error = snapshotter.save(&value).unwrap_err();
            assert!(error.is_invalid_argument(&InvalidArgument::Primitive));
        }

        let error = snapshotter.save(&Value::object([("prop", 1)])).unwrap_err();
        assert!(error.is_invalid_argument(&InvalidArgument::MissingIdentifier("id".to_string())));

        let error = snapshotter.save(&Value::array([1, 2])).unwrap_err();
        assert!(error.is_invalid_argument(&InvalidArgument::MissingIdentifier("id".to_string())));
    }

    #[test]
    fn test_upper_camel_case_identifier() {
        let mut snapshotter = Snapshotter::new(
            SnapshotterConfig::new()
                .with_identification_kind(IdentificationKind::Id)
                .with_property_name_casing_kind(PropertyNameCasingKind::UpperCamelCase),
        )
        .unwrap();

        let error = snapshotter.save(&Value::object([("id", 1)])).unwrap_err();
        assert!(error.is_invalid_argument(&InvalidArgument::MissingIdentifier("Id".to_string())));

        snapshotter.save(&Value::object([("Id", 1)])).unwrap();
        assert!(snapshotter.has(&Value::object([("Id", 1)])));
    }

    #[test]
    fn test_save_does_not_alter_value() {
        let mut snapshotter = with_reference_tracking(3);
        let tracked = Value::from(json!({"prop": "old", "nested": {"list": [1, 2]}}));
        let before = tracked.to_json().unwrap();

        snapshotter.save(&tracked).unwrap();
        assert_eq!(tracked.to_json().unwrap(), before);
    }

    #[test]
    fn test_save_unchanged_value_is_noop() {
        let mut snapshotter = with_reference_tracking(3);
        let tracked = Value::object([("prop", "old")]);

        snapshotter.save(&tracked).unwrap().save(&tracked).unwrap();
        assert_eq!(snapshotter.count(&tracked), 1);
    }

    #[test]
    fn test_save_evicts_oldest_snapshot() {
        let mut snapshotter = with_reference_tracking(2);
        let tracked = Value::object([("prop", "a")]);

        for state in ["a", "b", "c", "d"] {
            tracked.set("prop", state);
            snapshotter.save(&tracked).unwrap();
        }

        let history = snapshotter.history(&tracked).unwrap();
        let states: Vec<Option<String>> = history.iter().map(|entry| prop(&entry.snapshot)).collect();
        assert_eq!(states, vec![Some("d".to_string()), Some("c".to_string())]);
    }

    #[test]
    fn test_deep_snapshots_are_isolated() {
        let mut snapshotter = with_reference_tracking(3);
        let tracked = Value::from(json!({"nested": {"value": 1}}));
        snapshotter.save(&tracked).unwrap();

        tracked.get("nested").set("value", 2);
        assert!(snapshotter.is_changed(&tracked).unwrap());

        let peeked = snapshotter.peek(&tracked).unwrap();
        assert_eq!(peeked.get("nested").get("value").as_f64(), Some(1.0));
    }

    #[test]
    fn test_shallow_snapshots_share_nested_values() {
        let mut snapshotter = Snapshotter::new(
            SnapshotterConfig::new().with_snapshot_kind(SnapshotKind::ShallowClone),
        )
        .unwrap();
        let tracked = Value::from(json!({"nested": {"value": 1}}));
        snapshotter.save(&tracked).unwrap();

        // Nested objects are shared with the live value, so this is not a change
        tracked.get("nested").set("value", 2);
        assert!(!snapshotter.is_changed(&tracked).unwrap());

        tracked.set("nested", Value::object([("value", 3)]));
        assert!(snapshotter.is_changed(&tracked).unwrap());
    }

    #[test]
    fn test_is_changed_requires_tracking() {
        let snapshotter = with_reference_tracking(3);
        let result = snapshotter.is_changed(&Value::empty_object());
        assert!(matches!(result, Err(ObjsError::NotTracked)));

        let snapshotter = with_id_tracking(3);
        let result = snapshotter.is_changed(&Value::object([("id", 1)]));
        assert!(matches!(result, Err(ObjsError::NotTracked)));
    }

    #[test]
    fn test_is_changed_in_reference_tracking_mode() {
        let mut snapshotter = with_reference_tracking(3);
        let tracked = Value::from(json!({"prop": "old", "list": [{"item": 1}]}));
        snapshotter.save(&tracked).unwrap();
        assert!(!snapshotter.is_changed(&tracked).unwrap());

        tracked.get("list").as_array().unwrap().get(0).unwrap().set("item", 2);
        assert!(snapshotter.is_changed(&tracked).unwrap());
    }

    #[test]
    fn test_is_changed_in_id_tracking_mode() {
        let mut snapshotter = with_id_tracking(3);
        snapshotter.save(&Value::object([("id", 1), ("prop", 1)])).unwrap();

        assert!(!snapshotter.is_changed(&Value::object([("id", 1), ("prop", 1)])).unwrap());
        assert!(snapshotter.is_changed(&Value::object([("id", 1), ("prop", 2)])).unwrap());
    }

    #[test]
    fn test_is_changed_uses_comparison_options() {
        let mut snapshotter = with_reference_tracking(3);
        let tracked = Value::object([("prop", "same"), ("_cache", "a")]);
        snapshotter.save(&tracked).unwrap();
        tracked.set("_cache", "b");

        let calls = Cell::new(0);
        let options = ComparisonOptions::new().exclude_properties(|name, _| {
            calls.set(calls.get() + 1);
            name.starts_with('_')
        });

        assert!(!snapshotter.is_changed_with(&tracked, &options).unwrap());
        assert!(calls.get() > 0);
        assert!(snapshotter.is_changed(&tracked).unwrap());
    }

    #[test]
    fn test_clear_requires_tracking() {
        let mut snapshotter = with_reference_tracking(3);
        let result = snapshotter.clear(&Value::empty_object());
        assert!(matches!(result, Err(ObjsError::NotTracked)));

        let result = snapshotter.clear(&Value::from(1));
        assert!(result.unwrap_err().is_invalid_argument(&InvalidArgument::Primitive));
    }

    #[test]
    fn test_clear_keeps_one_fresh_snapshot() {
        let mut snapshotter = with_reference_tracking(5);
        let tracked = Value::object([("prop", "a")]);
        for state in ["a", "b", "c"] {
            tracked.set("prop", state);
            snapshotter.save(&tracked).unwrap();
        }
        tracked.set("prop", "now");

        snapshotter.clear(&tracked).unwrap();
        assert_eq!(snapshotter.count(&tracked), 1);
        assert_eq!(prop(&snapshotter.peek(&tracked).unwrap()), Some("now".to_string()));
        assert!(!snapshotter.is_changed(&tracked).unwrap());
    }

    #[test]
    fn test_clear_all_and_reset() {
        let mut snapshotter = with_reference_tracking(3);
        let first = Value::object([("prop", 1)]);
        let second = Value::object([("prop", 2)]);
        snapshotter.save(&first).unwrap().save(&second).unwrap();
        assert_eq!(snapshotter.len(), 2);

        snapshotter.clear_all();
        assert!(snapshotter.is_empty());
        assert!(!snapshotter.has(&first));

        snapshotter.save(&first).unwrap();
        snapshotter.reset();
        assert!(snapshotter.is_empty());
        assert!(matches!(snapshotter.peek(&first), Err(ObjsError::NotTracked)));
    }

    #[test]
    fn test_peek_does_not_revert() {
        let mut snapshotter = with_reference_tracking(3);
        let tracked = Value::object([("prop", "old")]);
        snapshotter.save(&tracked).unwrap();
        tracked.set("prop", "new");

        let peeked = snapshotter.peek(&tracked).unwrap();
        assert_eq!(prop(&peeked), Some("old".to_string()));
        assert_eq!(prop(&tracked), Some("new".to_string()));

        // Peeking twice returns the very same stored snapshot
        assert!(snapshotter.peek(&tracked).unwrap().same_instance(&peeked));
        assert_eq!(snapshotter.count(&tracked), 1);
    }

    #[test]
    fn test_peek_in_id_tracking_mode_with_another_reference() {
        let mut snapshotter = with_id_tracking(3);
        snapshotter.save(&Value::object([("id", Value::from(1)), ("prop", Value::from("old"))])).unwrap();

        let other = Value::object([("id", 1)]);
        let peeked = snapshotter.peek(&other).unwrap();
        assert_eq!(prop(&peeked), Some("old".to_string()));
        assert_eq!(prop(&other), None);
    }

    #[test]
    fn test_revert_requires_tracking() {
        let mut snapshotter = with_reference_tracking(3);
        assert!(matches!(
            snapshotter.revert(&Value::empty_object()),
            Err(ObjsError::NotTracked)
        ));

        let mut snapshotter = with_id_tracking(3);
        assert!(matches!(
            snapshotter.revert(&Value::object([("id", 1)])),
            Err(ObjsError::NotTracked)
        ));
        let error = snapshotter.revert(&Value::Null).unwrap_err();
        assert!(error.is_invalid_argument(&InvalidArgument::NotDefined("value")));
    }

    #[test]
    fn test_revert_restores_live_value() {
        let mut snapshotter = with_reference_tracking(1);
        let tracked = Value::object([("prop", "old")]);
        snapshotter.save(&tracked).unwrap();
        tracked.set("prop", "new");
        tracked.set("added", true);

        let reverted = snapshotter.revert(&tracked).unwrap();
        assert_eq!(prop(&reverted), Some("old".to_string()));
        assert_eq!(prop(&tracked), Some("old".to_string()));
        assert!(!tracked.as_object().unwrap().has_own("added"));
        assert!(!snapshotter.has(&tracked));
    }

    #[test]
    fn test_revert_multiple_times() {
        let mut snapshotter = with_reference_tracking(3);
        let tracked = Value::object([("prop", "old")]);
        snapshotter.save(&tracked).unwrap();
        tracked.set("prop", "new");
        snapshotter.save(&tracked).unwrap();
        tracked.set("prop", "last");
        snapshotter.save(&tracked).unwrap();

        assert_eq!(prop(&snapshotter.revert(&tracked).unwrap()), Some("last".to_string()));
        assert_eq!(prop(&snapshotter.revert(&tracked).unwrap()), Some("new".to_string()));
        assert_eq!(prop(&snapshotter.revert(&tracked).unwrap()), Some("old".to_string()));

        // History is exhausted until the next save
        assert!(matches!(snapshotter.revert(&tracked), Err(ObjsError::Exhausted("revert"))));
        assert!(matches!(snapshotter.peek(&tracked), Err(ObjsError::Exhausted("peek"))));
        assert!(snapshotter.is_changed(&tracked).unwrap());

        snapshotter.save(&tracked).unwrap();
        assert_eq!(snapshotter.count(&tracked), 1);
    }

    #[test]
    fn test_revert_in_id_tracking_mode_with_another_reference() {
        let mut snapshotter = with_id_tracking(1);
        let tracked = Value::object([("id", Value::from(1)), ("prop", Value::from("old"))]);
        snapshotter.save(&tracked).unwrap();

        let other = Value::object([("id", 1)]);
        let reverted = snapshotter.revert(&other).unwrap();
        assert!(crate::Comparer::are_equivalent(&reverted, &tracked));
        assert!(crate::Comparer::are_equivalent(&other, &tracked));
    }

    #[test]
    fn test_failed_revert_keeps_history() {
        let mut snapshotter = with_id_tracking(3);
        snapshotter
            .save(&Value::instance_of("Point", [("id", 1), ("x", 1)]))
            .unwrap();

        // Same identifier, different class: the snapshot can not be written back
        let vector = Value::instance_of("Vector", [("id", 1)]);
        let error = snapshotter.revert(&vector).unwrap_err();
        assert!(error.is_invalid_argument(&InvalidArgument::TypeMismatch));
        assert_eq!(snapshotter.count(&vector), 1);
    }

    #[test]
    fn test_shallow_revert() {
        let mut snapshotter = Snapshotter::new(
            SnapshotterConfig::new().with_snapshot_kind(SnapshotKind::ShallowClone),
        )
        .unwrap();
        let nested = Value::object([("value", 1)]);
        let tracked = Value::object([("nested", nested.clone())]);
        snapshotter.save(&tracked).unwrap();

        tracked.set("nested", Value::object([("value", 2)]));
        snapshotter.revert(&tracked).unwrap();
        assert!(tracked.get("nested").same_instance(&nested));
    }

    #[test]
    fn test_tracking_arrays_by_reference() {
        let mut snapshotter = with_reference_tracking(3);
        let tracked = Value::array([1, 2]);
        snapshotter.save(&tracked).unwrap();
        tracked.as_array().unwrap().push(3);

        assert!(snapshotter.is_changed(&tracked).unwrap());
        snapshotter.revert(&tracked).unwrap();
        assert_eq!(tracked.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_tracking_keys_use_same_value_zero() {
        assert_eq!(TrackingKey::of(&Value::from(0.0)), TrackingKey::of(&Value::from(-0.0)));
        assert_eq!(
            TrackingKey::of(&Value::from(f64::NAN)),
            TrackingKey::of(&Value::from(f64::NAN))
        );
        assert_ne!(TrackingKey::of(&Value::from(1)), TrackingKey::of(&Value::from("1")));
        assert_ne!(TrackingKey::of(&Value::Null), TrackingKey::of(&Value::Undefined));

        let object = Value::empty_object();
        assert_eq!(TrackingKey::of(&object), TrackingKey::of(&object.clone()));
        assert_ne!(TrackingKey::of(&object), TrackingKey::of(&Value::empty_object()));
    }

    #[test]
    fn test_id_tracking_with_nan_identifier() {
        let mut snapshotter = with_id_tracking(3);
        snapshotter
            .save(&Value::object([("id", Value::from(f64::NAN)), ("prop", Value::from(1))]))
            .unwrap();
        assert!(snapshotter.has(&Value::object([("id", f64::NAN)])));
    }

    #[test]
    fn test_history_versions() {
        let mut snapshotter = with_reference_tracking(3);
        let tracked = Value::object([("prop", 0)]);
        for state in 0..3 {
            tracked.set("prop", state);
            snapshotter.save(&tracked).unwrap();
        }

        let versions: Vec<u64> = snapshotter
            .history(&tracked)
            .unwrap()
            .iter()
            .map(|entry| entry.version)
            .collect();
        assert_eq!(versions, vec![3, 2, 1]);
    }

    #[test]
    fn test_is_changed_after_reverting_everything() {
        let mut snapshotter = with_reference_tracking(2);
        let tracked = Value::object([("prop", "old")]);
        snapshotter.save(&tracked).unwrap();
        snapshotter.revert(&tracked).unwrap();

        assert!(snapshotter.has(&tracked));
        assert_eq!(snapshotter.count(&tracked), 0);
        assert!(snapshotter.is_changed(&tracked).unwrap());
        assert!(snapshotter
            .is_changed_with(&tracked, &ComparisonOptions::new())
            .unwrap());
    }

    #[test]
    fn test_every_constructor_announces_creation() {
        let created = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(CreationCounter(created.clone()));

        tracing::subscriber::with_default(subscriber, || {
            let _ = Snapshotter::default();
            let _ = Snapshotter::new(SnapshotterConfig::new()).unwrap();
        });

        assert_eq!(created.load(Ordering::SeqCst), 2);
    }
}
