use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

use crate::core::{DataType, ProxyError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShapeMember {
    pub name: String,
    pub data_type: DataType,
}

impl ShapeMember {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Descriptor of a generated proxy type.
///
/// Equality and hashing are structural over entity, members and the
/// with-original flag. The fingerprint is computed once, at creation.
#[derive(Debug)]
pub struct ProxyShape {
    name: String,
    entity: String,
    members: Vec<ShapeMember>,
    index: HashMap<String, usize>,
    with_original: bool,
    fingerprint: u64,
}

impl ProxyShape {
    pub fn new(
        name: impl Into<String>,
        entity: impl Into<String>,
        members: Vec<ShapeMember>,
        with_original: bool,
    ) -> Result<Self> {
        let name = name.into();
        let entity = entity.into();

        let mut index = HashMap::with_capacity(members.len());
        for (idx, member) in members.iter().enumerate() {
            if index.insert(member.name.clone(), idx).is_some() {
                return Err(ProxyError::DuplicateMember {
                    shape: name,
                    member: member.name.clone(),
                });
            }
        }

        let mut hasher = DefaultHasher::new();
        entity.hash(&mut hasher);
        members.hash(&mut hasher);
        with_original.hash(&mut hasher);

        Ok(Self {
            name,
            entity,
            members,
            index,
            with_original,
            fingerprint: hasher.finish(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn members(&self) -> &[ShapeMember] {
        &self.members
    }

    pub fn member_names(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|m| m.name.as_str())
    }

    pub fn position(&self, member: &str) -> Option<usize> {
        self.index.get(member).copied()
    }

    pub fn has_member(&self, member: &str) -> bool {
        self.index.contains_key(member)
    }

    pub fn with_original(&self) -> bool {
        self.with_original
    }

    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }
}

impl PartialEq for ProxyShape {
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint == other.fingerprint
            && self.with_original == other.with_original
            && self.entity == other.entity
            && self.members == other.members
    }
}

impl Eq for ProxyShape {}

impl Hash for ProxyShape {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fingerprint.hash(state);
    }
}

impl fmt::Display for ProxyShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let members: Vec<String> = self
            .members
            .iter()
            .map(|m| format!("{}: {}", m.name, m.data_type))
            .collect();
        write!(f, "{} {{ {} }}", self.name, members.join(", "))?;
        if self.with_original {
            write!(f, " + {}", self.entity)?;
        }
        Ok(())
    }
}

/// Produces new structural types on demand. Memoization is the caller's job.
pub trait TypeFactory: Send + Sync {
    fn create_structural_type(
        &self,
        entity: &str,
        members: Vec<ShapeMember>,
        with_original: bool,
    ) -> Result<ProxyShape>;
}

/// Default factory: dictionary-backed shapes named `{Entity}{suffix}{n}`.
#[derive(Debug)]
pub struct RecordTypeFactory {
    suffix: String,
    counter: AtomicUsize,
}

impl RecordTypeFactory {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
            counter: AtomicUsize::new(0),
        }
    }

    /// Number of shapes created so far.
    pub fn created(&self) -> usize {
        self.counter.load(Ordering::Relaxed)
    }
}

impl Default for RecordTypeFactory {
    fn default() -> Self {
        Self::new("Proxy")
    }
}

impl TypeFactory for RecordTypeFactory {
    fn create_structural_type(
        &self,
        entity: &str,
        members: Vec<ShapeMember>,
        with_original: bool,
    ) -> Result<ProxyShape> {
        let id = self.counter.fetch_add(1, Ordering::Relaxed);
        ProxyShape::new(
            format!("{}{}{}", entity, self.suffix, id),
            entity,
            members,
            with_original,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_member_rejected() {
        let err = ProxyShape::new(
            "PersonProxy0",
            "Person",
            vec![
                ShapeMember::new("Id", DataType::Integer),
                ShapeMember::new("Id", DataType::Integer),
            ],
            false,
        )
        .unwrap_err();
        assert!(matches!(err, ProxyError::DuplicateMember { .. }));
    }

    #[test]
    fn test_structural_equality_ignores_name() {
        let factory = RecordTypeFactory::default();
        let members = vec![ShapeMember::new("Id", DataType::Integer)];
        let a = factory
            .create_structural_type("Person", members.clone(), false)
            .unwrap();
        let b = factory
            .create_structural_type("Person", members.clone(), false)
            .unwrap();
        let c = factory.create_structural_type("Person", members, true).unwrap();

        assert_ne!(a.name(), b.name());
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(factory.created(), 3);
    }

    #[test]
    fn test_display() {
        let shape = ProxyShape::new(
            "PersonProxy7",
            "Person",
            vec![
                ShapeMember::new("managerName", DataType::Text),
                ShapeMember::new("$m0", DataType::Integer),
            ],
            true,
        )
        .unwrap();
        assert_eq!(
            shape.to_string(),
            "PersonProxy7 { managerName: TEXT, $m0: INTEGER } + Person"
        );
        assert_eq!(shape.position("$m0"), Some(1));
    }
}
