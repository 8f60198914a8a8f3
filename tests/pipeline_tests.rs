/// Pipeline tests
///
/// Registry configuration through request-time projection and hooks, the way
/// a query executor drives the crate.
/// Run with: cargo test --test pipeline_tests

mod common;

use std::sync::{Arc, Mutex};

use common::{member, person, person_catalog};
use shapeproxy::prelude::*;

struct Fixture {
    pipeline: ProjectionPipeline,
    audited: Arc<Mutex<Vec<(String, Value)>>>,
}

fn fixture() -> Fixture {
    let mut registry = ProxyRegistry::new(person_catalog(), ProxyConfig::default()).unwrap();
    let audited = Arc::new(Mutex::new(Vec::new()));

    {
        let people = registry.entity("Person").unwrap();
        people.add_field(Field::computed("id", member("Id"))).unwrap();
        people.add_field(Field::computed("name", member("FullName"))).unwrap();
        people
            .add_field(Field::computed(
                "shout",
                lambda(
                    ["p"],
                    Expr::call("UPPER", vec![Expr::param("p").member("FullName")]),
                ),
            ))
            .unwrap();
        people
            .add_field(Field::computed(
                "isMine",
                lambda(
                    ["ctx", "p"],
                    Expr::param("p")
                        .member("OwnerId")
                        .equals(Expr::param("ctx").member("UserId")),
                ),
            ))
            .unwrap();
        people.add_field(Field::resolved("profile")).unwrap();
        people.add_all_members("profile").unwrap();

        let sink = Arc::clone(&audited);
        people
            .add_load_hook(member("Id"), move |ctx, id| {
                let sink = Arc::clone(&sink);
                async move {
                    let user = ctx
                        .variable("UserId")
                        .map(|v| v.to_string())
                        .unwrap_or_default();
                    sink.lock().unwrap().push((user, id));
                    anyhow::Ok(())
                }
            })
            .unwrap();
    }
    registry.configure_all();

    let source = InMemorySource::new()
        .with_records([
            person(1, "ada", None),
            person(2, "grace", None),
            person(3, "linus", None),
        ])
        .unwrap();

    Fixture {
        pipeline: ProjectionPipeline::new(Arc::new(registry), Arc::new(source)),
        audited,
    }
}

#[tokio::test]
async fn test_project_requested_fields_and_run_hooks() {
    let fixture = fixture();
    let ctx = ExecutionContext::new().with_variable("UserId", 20i64);

    let proxies = fixture
        .pipeline
        .project("Person", ["shout", "isMine"], &ctx)
        .await
        .unwrap();
    assert_eq!(proxies.len(), 3);

    let shape = proxies[0].shape();
    assert_eq!(shape.member_names().collect::<Vec<_>>(), vec!["shout", "isMine", "$m0"]);
    assert!(proxies.iter().all(|p| Arc::ptr_eq(p.shape(), shape)));

    let mine: Vec<Value> = proxies
        .iter()
        .filter(|p| p.get("isMine").unwrap().as_bool())
        .map(|p| p.get("shout").unwrap().clone())
        .collect();
    assert_eq!(mine, vec![Value::from("GRACE")]);

    let mut audited = fixture.audited.lock().unwrap().clone();
    audited.sort_by_key(|(_, id)| id.as_i64());
    assert_eq!(
        audited,
        vec![
            ("20".to_string(), Value::Integer(1)),
            ("20".to_string(), Value::Integer(2)),
            ("20".to_string(), Value::Integer(3)),
        ]
    );
}

#[tokio::test]
async fn test_whole_entity_field_carries_original() {
    let fixture = fixture();
    let ctx = ExecutionContext::new();

    let proxies = fixture
        .pipeline
        .project("Person", ["profile", "id"], &ctx)
        .await
        .unwrap();
    let first = &proxies[0];
    assert!(first.shape().with_original());
    assert_eq!(
        first.original().unwrap().member("FullName").unwrap(),
        Value::from("ada")
    );
    assert_eq!(Value::Proxy(Arc::new(first.clone())).member("id").unwrap(), Value::Integer(1));
}

#[tokio::test]
async fn test_same_request_twice_is_deterministic() {
    let fixture = fixture();
    let ctx = ExecutionContext::new().with_variable("UserId", 10i64);

    let a = fixture
        .pipeline
        .project("Person", ["name", "isMine"], &ctx)
        .await
        .unwrap();
    let b = fixture
        .pipeline
        .project("Person", ["isMine", "name", "name"], &ctx)
        .await
        .unwrap();
    assert_eq!(a, b);

    let stats = fixture
        .pipeline
        .registry()
        .accessor("Person")
        .unwrap()
        .cache_stats();
    assert_eq!(stats.selectors.size, 1);
    assert!(stats.selectors.hits >= 1);
}

#[tokio::test]
async fn test_unknown_entity_and_field() {
    let fixture = fixture();
    let ctx = ExecutionContext::new();

    let err = fixture.pipeline.project("Robot", ["id"], &ctx).await.unwrap_err();
    assert!(matches!(err, ProxyError::EntityNotFound(_)));

    let err = fixture
        .pipeline
        .project("Person", ["id", "age"], &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, ProxyError::UnknownMember { .. }));
    assert!(fixture.audited.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_configuration_closed_after_first_request() {
    let mut registry = ProxyRegistry::new(person_catalog(), ProxyConfig::default()).unwrap();
    registry
        .entity("Person")
        .unwrap()
        .add_field(Field::computed("id", member("Id")))
        .unwrap();
    registry.resolve_shape_and_selector("Person", ["id"]).unwrap();

    let err = registry
        .entity("Person")
        .unwrap()
        .add_field(Field::computed("name", member("FullName")))
        .unwrap_err();
    assert!(matches!(err, ProxyError::AlreadyConfigured(_)));
}
