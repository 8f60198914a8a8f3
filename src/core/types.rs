use std::fmt;

use serde::{Deserialize, Serialize};

use super::{ProxyError, Result, Value};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Integer,
    Float,
    Text,
    Boolean,
    List(Box<DataType>),
    /// Reference to another entity type registered in the catalog.
    Entity(String),
    /// Type could not be narrowed; accepts any value.
    Any,
}

impl DataType {
    pub fn list_of(item: DataType) -> Self {
        Self::List(Box::new(item))
    }

    pub fn entity(name: impl Into<String>) -> Self {
        Self::Entity(name.into())
    }

    pub fn is_compatible(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (Self::Any, _) => true,
            (Self::Integer, Value::Integer(_)) => true,
            (Self::Float, Value::Float(_)) => true,
            (Self::Float, Value::Integer(_)) => true, // Integer widens to Float
            (Self::Text, Value::Text(_)) => true,
            (Self::Boolean, Value::Boolean(_)) => true,
            (Self::List(item), Value::List(values)) => values.iter().all(|v| item.is_compatible(v)),
            (Self::Entity(name), Value::Record(record)) => record.type_name() == name,
            (Self::Entity(name), Value::Proxy(proxy)) => proxy.shape().entity() == name,
            _ => false,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }

    /// The type of a literal value, as far as it can be told from the value alone.
    pub fn of_value(value: &Value) -> Self {
        match value {
            Value::Integer(_) => Self::Integer,
            Value::Float(_) => Self::Float,
            Value::Text(_) => Self::Text,
            Value::Boolean(_) => Self::Boolean,
            Value::Record(record) => Self::Entity(record.type_name().to_string()),
            Value::Proxy(proxy) => Self::Entity(proxy.shape().entity().to_string()),
            Value::List(items) => {
                let item = items.first().map(Self::of_value).unwrap_or(Self::Any);
                Self::list_of(item)
            }
            Value::Null => Self::Any,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => write!(f, "INTEGER"),
            Self::Float => write!(f, "FLOAT"),
            Self::Text => write!(f, "TEXT"),
            Self::Boolean => write!(f, "BOOLEAN"),
            Self::List(item) => write!(f, "LIST<{}>", item),
            Self::Entity(name) => write!(f, "{}", name),
            Self::Any => write!(f, "ANY"),
        }
    }
}

/// A typed member of an entity type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityMember {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl EntityMember {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn validate(&self, value: &Value) -> Result<()> {
        if matches!(value, Value::Null) {
            if !self.nullable {
                return Err(ProxyError::TypeMismatch(format!(
                    "Member '{}' cannot be NULL",
                    self.name
                )));
            }
            return Ok(());
        }

        if !self.data_type.is_compatible(value) {
            return Err(ProxyError::TypeMismatch(format!(
                "Member '{}' expects type {}, got {}",
                self.name,
                self.data_type,
                value.type_name()
            )));
        }

        Ok(())
    }
}

/// Structural description of an entity type as seen by the configuration layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySchema {
    name: String,
    members: Vec<EntityMember>,
}

impl EntitySchema {
    pub fn new(name: impl Into<String>, members: Vec<EntityMember>) -> Self {
        Self {
            name: name.into(),
            members,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &[EntityMember] {
        &self.members
    }

    pub fn find_member_index(&self, name: &str) -> Option<usize> {
        self.members.iter().position(|member| member.name == name)
    }

    pub fn get_member(&self, name: &str) -> Option<&EntityMember> {
        self.find_member_index(name).map(|idx| &self.members[idx])
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}
