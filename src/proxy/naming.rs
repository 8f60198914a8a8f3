use std::collections::{HashMap, HashSet};

use crate::core::DataType;
use crate::expression::ExprKey;

/// A dependency expression with its synthetic member name and inferred type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedExpression {
    pub name: String,
    pub key: ExprKey,
    pub data_type: DataType,
}

/// Assigns each distinct dependency expression one synthetic member name.
///
/// Names are `{prefix}{owner}{prefix}{n}` for field-owned dependencies and
/// `{prefix}m{n}` for accessor-level members, with `n` drawn from a single
/// counter. The prefix holds a character no field name can contain, so the
/// owner and counter parts never run together. An expression keeps the name
/// it was first given, and no name is handed out twice.
#[derive(Debug, Clone)]
pub struct NamingTable {
    prefix: String,
    entries: Vec<NamedExpression>,
    by_key: HashMap<ExprKey, usize>,
    used: HashSet<String>,
    next_id: usize,
}

impl NamingTable {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            entries: Vec::new(),
            by_key: HashMap::new(),
            used: HashSet::new(),
            next_id: 0,
        }
    }

    /// Returns the existing name for `key`, or allocates a fresh one.
    pub fn name_for(&mut self, key: &ExprKey, owner: Option<&str>, data_type: DataType) -> &str {
        if let Some(idx) = self.by_key.get(key).copied() {
            return &self.entries[idx].name;
        }

        let name = self.fresh_name(owner);
        self.used.insert(name.clone());
        self.entries.push(NamedExpression {
            name,
            key: key.clone(),
            data_type,
        });
        let idx = self.entries.len() - 1;
        self.by_key.insert(key.clone(), idx);
        &self.entries[idx].name
    }

    fn fresh_name(&mut self, owner: Option<&str>) -> String {
        loop {
            let id = self.next_id;
            self.next_id += 1;
            let name = match owner {
                Some(field) => format!("{0}{1}{0}{2}", self.prefix, field, id),
                None => format!("{}m{}", self.prefix, id),
            };
            if !self.used.contains(&name) {
                return name;
            }
        }
    }

    pub fn lookup(&self, key: &ExprKey) -> Option<&NamedExpression> {
        self.by_key.get(key).map(|idx| &self.entries[*idx])
    }

    /// Named expressions in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = &NamedExpression> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{Expr, lambda};

    fn key(param: &str, member: &str) -> ExprKey {
        ExprKey::new(&lambda([param], Expr::param(param).member(member)))
    }

    #[test]
    fn test_names_are_stable_and_structural() {
        let mut table = NamingTable::new("$");
        let first = table
            .name_for(&key("p", "ManagerId"), Some("managerName"), DataType::Integer)
            .to_string();
        let again = table
            .name_for(&key("x", "ManagerId"), None, DataType::Integer)
            .to_string();

        assert_eq!(first, "$managerName$0");
        assert_eq!(first, again);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_counter_is_shared() {
        let mut table = NamingTable::new("$");
        assert_eq!(table.name_for(&key("p", "A"), None, DataType::Any), "$m0");
        assert_eq!(table.name_for(&key("p", "B"), Some("f"), DataType::Any), "$f$1");
        assert_eq!(table.name_for(&key("p", "C"), None, DataType::Any), "$m2");
        assert_eq!(
            table.lookup(&key("q", "B")).map(|e| e.name.as_str()),
            Some("$f$1")
        );
    }

    #[test]
    fn test_owner_and_counter_never_run_together() {
        let mut table = NamingTable::new("$");
        let mut names = HashSet::new();
        for n in 0..24 {
            let owner = ["a", "a1", "a12"][n % 3];
            let name = table
                .name_for(&key("p", &format!("M{}", n)), Some(owner), DataType::Any)
                .to_string();
            assert!(names.insert(name.clone()), "duplicate name {}", name);
        }
        assert_eq!(table.len(), 24);
        assert_eq!(
            table.lookup(&key("p", "M12")).map(|e| e.name.as_str()),
            Some("$a$12")
        );
        assert_eq!(
            table.lookup(&key("p", "M2")).map(|e| e.name.as_str()),
            Some("$a12$2")
        );
    }
}
