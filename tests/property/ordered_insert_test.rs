// tests/property/ordered_insert_test.rs

//! Property-based tests for priority ordering of handler lists

use crate::test_helpers::{Behavior, EventLog, TestBefore};
use actproxy::core::handler::{BeforeInterceptor, Handler, OrderedHandlerList};
use proptest::prelude::*;
use std::sync::Arc;

fn handler(log: &EventLog, name: &str, priority: i32) -> Arc<dyn BeforeInterceptor> {
    Arc::new(TestBefore::new(name, priority, log, Behavior::Pass))
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 200,
        ..ProptestConfig::default()
    })]

    #[test]
    fn test_list_stays_sorted(
        entries in prop::collection::vec(("[a-e]", -5i32..5), 0..40)
    ) {
        let log = EventLog::default();
        let mut list = OrderedHandlerList::<dyn BeforeInterceptor>::new();
        let mut inserted = 0;
        for (name, priority) in &entries {
            if list.insert(handler(&log, name, *priority)) {
                inserted += 1;
            }
        }

        let priorities: Vec<i32> = list.iter().map(|h| h.priority()).collect();
        prop_assert!(priorities.windows(2).all(|w| w[0] <= w[1]));
        prop_assert_eq!(list.len(), inserted);
        prop_assert!(list.len() <= entries.len());
    }

    #[test]
    fn test_immediate_reinsert_is_noop(
        entries in prop::collection::vec(("[a-e]", -5i32..5), 0..20),
        name in "[a-e]",
        priority in -5i32..5,
    ) {
        let log = EventLog::default();
        let mut list = OrderedHandlerList::<dyn BeforeInterceptor>::new();
        for (n, p) in &entries {
            list.insert(handler(&log, n, *p));
        }

        list.insert(handler(&log, &name, priority));
        let len = list.len();

        prop_assert!(!list.insert(handler(&log, &name, priority)));
        prop_assert_eq!(list.len(), len);
    }

    #[test]
    fn test_reinsert_of_any_member_is_noop(
        entries in prop::collection::vec(("[a-h]", -3i32..3), 1..30),
        pick in any::<prop::sample::Index>(),
        priority in -3i32..3,
    ) {
        let log = EventLog::default();
        let mut list = OrderedHandlerList::<dyn BeforeInterceptor>::new();
        for (n, p) in &entries {
            list.insert(handler(&log, n, *p));
        }
        let before = list.names().into_iter().map(str::to_string).collect::<Vec<_>>();
        let name = pick.get(before.as_slice()).clone();

        prop_assert!(!list.insert(handler(&log, &name, priority)));
        prop_assert_eq!(list.names(), before.iter().map(String::as_str).collect::<Vec<_>>());

        let mut unique = before.clone();
        unique.sort();
        unique.dedup();
        prop_assert_eq!(unique.len(), before.len());
    }

    #[test]
    fn test_distinct_priorities_sort_fully(
        priorities in prop::collection::hash_set(-1000i32..1000, 0..30)
    ) {
        let log = EventLog::default();
        let mut list = OrderedHandlerList::<dyn BeforeInterceptor>::new();
        for p in &priorities {
            let name = format!("h{}", p);
            prop_assert!(list.insert(handler(&log, &name, *p)));
        }

        let mut expected: Vec<i32> = priorities.into_iter().collect();
        expected.sort_unstable();
        let actual: Vec<i32> = list.iter().map(|h| h.priority()).collect();
        prop_assert_eq!(actual, expected);
    }
}
