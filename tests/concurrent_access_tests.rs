/// Concurrent access tests
///
/// Racing first-time configuration and cache population from many tasks.
/// Run with: cargo test --test concurrent_access_tests

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::{member, person, person_accessor};
use shapeproxy::prelude::*;
use shapeproxy::proxy::{RecordTypeFactory, ShapeMember, TypeFactory};
use tokio::sync::Barrier;

#[tokio::test]
async fn test_concurrent_configure_registers_members_once() {
    let accessor = Arc::new(person_accessor());
    let barrier = Arc::new(Barrier::new(8));

    let mut handles = vec![];
    for _ in 0..8 {
        let accessor = Arc::clone(&accessor);
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            accessor
                .generic_shape()
                .members()
                .iter()
                .map(|m| m.name.clone())
                .collect::<Vec<_>>()
        }));
    }

    for handle in handles {
        let members = handle.await.unwrap();
        assert_eq!(members, vec!["Id", "FullName", "managerName", "$managerName$0"]);
    }
}

#[tokio::test]
async fn test_racing_requests_share_one_shape() {
    let accessor = Arc::new(person_accessor());
    let num_tasks = 16;
    let barrier = Arc::new(Barrier::new(num_tasks));

    let mut handles = vec![];
    for task_id in 0..num_tasks {
        let accessor = Arc::clone(&accessor);
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            // Every task asks for the same set in a different order
            let mut fields = vec!["Id", "managerName", "FullName"];
            fields.rotate_left(task_id % 3);
            barrier.wait().await;
            accessor.resolve(fields).unwrap()
        }));
    }

    let mut resolved = vec![];
    for handle in handles {
        resolved.push(handle.await.unwrap());
    }

    let (shape, selector) = &resolved[0];
    for (other_shape, other_selector) in &resolved[1..] {
        assert!(Arc::ptr_eq(shape, other_shape));
        assert!(Arc::ptr_eq(selector, other_selector));
    }

    let stats = accessor.cache_stats();
    assert_eq!(stats.shapes.size, 1);
    assert_eq!(stats.selectors.size, 1);
}

#[tokio::test]
async fn test_distinct_field_sets_from_many_tasks() {
    let accessor = Arc::new(person_accessor());
    let field_sets: Vec<Vec<&'static str>> = vec![
        vec!["Id"],
        vec!["FullName"],
        vec!["managerName"],
        vec!["Id", "FullName"],
        vec!["Id", "managerName"],
    ];

    let mut handles = vec![];
    for round in 0..4 {
        for fields in field_sets.clone() {
            let accessor = Arc::clone(&accessor);
            handles.push(tokio::spawn(async move {
                let entity = Value::from(person(round, "Ann", None));
                let selector = accessor.create_selector_expression(fields).unwrap();
                selector
                    .evaluate(&EvaluatorRegistry::default(), &ExecutionContext::new(), &entity)
                    .unwrap()
            }));
        }
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(accessor.cache_stats().shapes.size, field_sets.len());
    assert_eq!(accessor.cache_stats().selectors.size, field_sets.len());
}

/// Fails its first `failures` calls, then delegates to the default factory.
struct FlakyFactory {
    failures: AtomicUsize,
    calls: AtomicUsize,
    inner: RecordTypeFactory,
}

impl TypeFactory for FlakyFactory {
    fn create_structural_type(
        &self,
        entity: &str,
        members: Vec<ShapeMember>,
        with_original: bool,
    ) -> Result<ProxyShape> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ProxyError::UnsupportedOperation("type emission unavailable".into()));
        }
        self.inner
            .create_structural_type(entity, members, with_original)
    }
}

#[tokio::test]
async fn test_failed_build_is_retried_not_cached() {
    let factory = Arc::new(FlakyFactory {
        failures: AtomicUsize::new(1),
        calls: AtomicUsize::new(0),
        inner: RecordTypeFactory::default(),
    });
    let mut accessor = ProxyAccessor::new("Person", common::person_catalog(), ProxyConfig::default())
        .unwrap()
        .with_type_factory(factory.clone());
    accessor.add_field(Field::computed("Id", member("Id"))).unwrap();
    let accessor = Arc::new(accessor);

    let err = accessor.create_selector_expression(["Id"]).unwrap_err();
    assert!(matches!(err, ProxyError::UnsupportedOperation(_)));
    assert_eq!(accessor.cache_stats().shapes.size, 0);
    assert_eq!(accessor.cache_stats().selectors.size, 0);

    let barrier = Arc::new(Barrier::new(4));
    let mut handles = vec![];
    for _ in 0..4 {
        let accessor = Arc::clone(&accessor);
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            accessor.get_concrete_proxy_type(["Id"]).unwrap()
        }));
    }
    let mut shapes = vec![];
    for handle in handles {
        shapes.push(handle.await.unwrap());
    }
    assert!(shapes.iter().all(|shape| Arc::ptr_eq(shape, &shapes[0])));
    assert_eq!(accessor.cache_stats().shapes.size, 1);
    assert!(factory.calls.load(Ordering::SeqCst) >= 2);
}
