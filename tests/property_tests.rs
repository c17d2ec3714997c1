//! Property-Based Tests for ASH
//!
//! Uses proptest for the invariants of the recipe pipeline:
//! - legacy recipes of any size upgrade without losing steps
//! - upgrading twice equals upgrading once
//! - step keys order numerically, never lexically
//! - schema versions order like their numbers
//! - step state transitions never leave a terminal state

use ash::normalize::step_number;
use ash::version::{SchemaVersion, upgrade_to_current};
use ash::{StepState, is_truthy, normalize};
use proptest::prelude::*;
use serde_json::{Map, Value, json};
use strum::IntoEnumIterator;

// =============================================================================
// Strategies
// =============================================================================

/// A legacy step: a statement, maybe a function, maybe some extra fields
fn legacy_step_strategy() -> impl Strategy<Value = Value> {
    (
        "[a-zA-Z0-9 .,!?]{0,40}",
        proptest::option::of("[a-z_]{1,12}"),
        proptest::collection::btree_map("[a-z]{1,8}", any::<i32>(), 0..3),
    )
        .prop_map(|(statement, function, extras)| {
            let mut step = Map::new();
            step.insert("statement".into(), json!(statement));
            if let Some(name) = function {
                step.insert("function_name".into(), json!(name));
            }
            for (key, value) in extras {
                if key != "statement" {
                    step.entry(format!("x_{key}")).or_insert(json!(value));
                }
            }
            Value::Object(step)
        })
}

/// Where a legacy recipe keeps its end color, if anywhere
fn color_end_key_strategy() -> impl Strategy<Value = Option<&'static str>> {
    prop_oneof![Just(None), Just(Some("color_end")), Just(Some("colorEnd"))]
}

fn legacy_recipe_strategy() -> impl Strategy<Value = Value> {
    (
        "[A-Za-z ]{1,30}",
        proptest::option::of("[A-Za-z ]{1,60}"),
        color_end_key_strategy(),
        proptest::collection::vec(legacy_step_strategy(), 0..15),
    )
        .prop_map(|(title, description, color_end_key, steps)| {
            let mut metadata = Map::new();
            metadata.insert("title".into(), json!(title));
            if let Some(description) = description {
                metadata.insert("description".into(), json!(description));
            }
            if let Some(key) = color_end_key {
                metadata.insert(key.into(), json!("blue"));
            }
            let mut items = vec![Value::Object(metadata)];
            items.extend(steps);
            Value::Array(items)
        })
}

fn step_state_strategy() -> impl Strategy<Value = StepState> {
    prop_oneof![
        Just(StepState::Pending),
        Just(StepState::Running),
        Just(StepState::Retrying),
        Just(StepState::Succeeded),
        Just(StepState::Aborted),
    ]
}

// =============================================================================
// Upgrade Properties
// =============================================================================

proptest! {
    /// Upgrading a legacy recipe keeps every step, in order, unchanged
    #[test]
    fn legacy_upgrade_is_lossless(raw in legacy_recipe_strategy()) {
        let before = normalize(&raw).unwrap();
        let (upgraded, record) = upgrade_to_current(raw).unwrap();
        let after = normalize(&upgraded).unwrap();

        prop_assert!(record.was_upgraded);
        prop_assert_eq!(&after.title, &before.title);
        prop_assert_eq!(&after.description, &before.description);
        prop_assert_eq!(&after.display_hints, &before.display_hints);
        prop_assert_eq!(after.steps, before.steps);
    }

    /// A second upgrade is a no-op
    #[test]
    fn upgrade_is_idempotent(raw in legacy_recipe_strategy()) {
        let (once, _) = upgrade_to_current(raw).unwrap();
        let (twice, record) = upgrade_to_current(once.clone()).unwrap();
        prop_assert!(!record.was_upgraded);
        prop_assert_eq!(once, twice);
    }

    /// Flat recipes list their steps by number, whatever the key order
    #[test]
    fn flat_steps_sorted_numerically(
        numbers in proptest::collection::btree_set(1u64..500, 0..20),
        seed in any::<u64>(),
    ) {
        let mut keys: Vec<u64> = numbers.iter().copied().collect();
        // Deterministic shuffle so insertion order differs from numeric order
        keys.sort_by_key(|n| n.wrapping_mul(seed | 1).rotate_left(17));

        let mut map = Map::new();
        map.insert("version".into(), json!("1.1"));
        for n in &keys {
            map.insert(format!("step{n}"), json!({"statement": n.to_string()}));
        }
        let doc = normalize(&Value::Object(map)).unwrap();

        let statements: Vec<u64> = doc.steps.iter().map(|s| s.statement.parse().unwrap()).collect();
        let expected: Vec<u64> = numbers.into_iter().collect();
        prop_assert_eq!(statements, expected);
    }
}

// =============================================================================
// Step Keys and Versions
// =============================================================================

proptest! {
    /// `stepN` parses back to N
    #[test]
    fn step_number_roundtrip(n in any::<u32>()) {
        prop_assert_eq!(step_number(&format!("step{n}")), Some(u64::from(n)));
    }

    /// Keys with anything but digits after `step` are not steps
    #[test]
    fn step_number_rejects_suffixes(n in any::<u16>(), suffix in "[a-z_]{1,4}") {
        prop_assert_eq!(step_number(&format!("step{n}{suffix}")), None);
        prop_assert_eq!(step_number(&format!("{suffix}step{n}")), None);
    }

    /// Version ordering matches (major, minor) numeric ordering
    #[test]
    fn schema_version_orders_numerically(a in (0u32..20, 0u32..20), b in (0u32..20, 0u32..20)) {
        let va: SchemaVersion = format!("{}.{}", a.0, a.1).parse().unwrap();
        let vb: SchemaVersion = format!("{}.{}", b.0, b.1).parse().unwrap();
        prop_assert_eq!(va.cmp(&vb), a.cmp(&b));
        prop_assert_eq!(va.to_string().parse::<SchemaVersion>().unwrap(), va);
    }
}

// =============================================================================
// Step State Properties
// =============================================================================

proptest! {
    /// Terminal states accept no transition at all
    #[test]
    fn terminal_states_are_final(from in step_state_strategy(), to in step_state_strategy()) {
        if from.is_terminal() {
            prop_assert!(!from.can_transition_to(to));
        }
    }

    /// Display output is the variant name
    #[test]
    fn step_state_display_matches_variant(state in step_state_strategy()) {
        let s = state.to_string();
        prop_assert!(!s.is_empty());
        prop_assert_eq!(s, format!("{state:?}"));
    }

    /// Integers are truthy exactly when non-zero
    #[test]
    fn integer_truthiness(n in any::<i64>()) {
        prop_assert_eq!(is_truthy(&json!(n)), n != 0);
    }
}

#[test]
fn every_step_state_is_covered_by_strategy() {
    assert_eq!(StepState::iter().count(), 5);
}
