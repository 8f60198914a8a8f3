use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::shape::ProxyShape;
use crate::core::{ProxyError, Result, Value};

/// A materialized proxy: one slot per shape member plus the optional source entity.
#[derive(Debug, Clone)]
pub struct ProxyInstance {
    shape: Arc<ProxyShape>,
    values: Vec<Value>,
    original: Option<Value>,
}

impl ProxyInstance {
    /// Builds an instance, validating slot count, member types and the
    /// presence of the original entity against the shape.
    pub fn new(shape: Arc<ProxyShape>, values: Vec<Value>, original: Option<Value>) -> Result<Self> {
        if values.len() != shape.members().len() {
            return Err(ProxyError::TypeMismatch(format!(
                "Shape '{}' has {} member(s), got {} value(s)",
                shape.name(),
                shape.members().len(),
                values.len()
            )));
        }
        for (member, value) in shape.members().iter().zip(&values) {
            if !member.data_type.is_compatible(value) {
                return Err(ProxyError::TypeMismatch(format!(
                    "Member '{}' of '{}' expects type {}, got {}",
                    member.name,
                    shape.name(),
                    member.data_type,
                    value.type_name()
                )));
            }
        }
        if shape.with_original() != original.is_some() {
            return Err(ProxyError::TypeMismatch(format!(
                "Shape '{}' {} a reference to the original entity",
                shape.name(),
                if shape.with_original() { "requires" } else { "does not carry" }
            )));
        }
        Ok(Self {
            shape,
            values,
            original,
        })
    }

    pub fn shape(&self) -> &Arc<ProxyShape> {
        &self.shape
    }

    pub fn get(&self, member: &str) -> Result<&Value> {
        self.shape
            .position(member)
            .map(|idx| &self.values[idx])
            .ok_or_else(|| ProxyError::UnknownMember {
                entity: self.shape.entity().to_string(),
                member: member.to_string(),
            })
    }

    pub fn original(&self) -> Option<&Value> {
        self.original.as_ref()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.shape.member_names().zip(self.values.iter())
    }
}

impl PartialEq for ProxyInstance {
    fn eq(&self, other: &Self) -> bool {
        (Arc::ptr_eq(&self.shape, &other.shape) || self.shape == other.shape)
            && self.values == other.values
            && self.original == other.original
    }
}

impl Eq for ProxyInstance {}

impl Hash for ProxyInstance {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.shape.hash(state);
        self.values.hash(state);
        self.original.hash(state);
    }
}

impl fmt::Display for ProxyInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .iter()
            .map(|(name, value)| format!("{} = {}", name, value))
            .collect();
        write!(f, "{} {{ {} }}", self.shape.name(), parts.join(", "))
    }
}
