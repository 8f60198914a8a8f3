#![allow(dead_code)]

use shapeproxy::prelude::*;

pub fn person_catalog() -> EntityCatalog {
    EntityCatalog::new()
        .with_entity(EntitySchema::new(
            "Person",
            vec![
                EntityMember::new("Id", DataType::Integer).not_null(),
                EntityMember::new("FullName", DataType::Text),
                EntityMember::new("ManagerId", DataType::Integer),
                EntityMember::new("Manager", DataType::entity("Person")),
                EntityMember::new("OwnerId", DataType::Integer),
                EntityMember::new("Salary", DataType::Float),
            ],
        ))
        .unwrap()
}

/// `p => p.{name}`
pub fn member(name: &str) -> Lambda {
    lambda(["p"], Expr::param("p").member(name))
}

pub fn person(id: i64, name: &str, manager: Option<&Record>) -> Record {
    let (manager_id, manager) = match manager {
        Some(m) => (
            m.get("Id").cloned().unwrap_or(Value::Null),
            Value::from(m.clone()),
        ),
        None => (Value::Null, Value::Null),
    };
    Record::new("Person")
        .with("Id", id)
        .with("FullName", name)
        .with("ManagerId", manager_id)
        .with("Manager", manager)
        .with("OwnerId", id * 10)
        .with("Salary", 1000.0 * id as f64)
}

/// Id, FullName and managerName (which also needs ManagerId).
pub fn person_accessor() -> ProxyAccessor {
    let mut accessor =
        ProxyAccessor::new("Person", person_catalog(), ProxyConfig::default()).unwrap();
    accessor.add_field(Field::computed("Id", member("Id"))).unwrap();
    accessor
        .add_field(Field::computed("FullName", member("FullName")))
        .unwrap();
    accessor
        .add_field(Field::computed(
            "managerName",
            lambda(["p"], Expr::param("p").member("Manager").member("FullName")),
        ))
        .unwrap();
    accessor
        .add_field_member("managerName", &member("ManagerId"))
        .unwrap();
    accessor
}

pub fn names(shape: &ProxyShape) -> Vec<&str> {
    shape.member_names().collect()
}
