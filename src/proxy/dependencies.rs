use std::collections::HashMap;

use crate::expression::ExprKey;

/// What one field's resolution needs from the source entity besides its own value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldDependencies {
    expressions: Vec<ExprKey>,
    depend_on_all_members: bool,
}

impl FieldDependencies {
    /// Insertion-ordered, free of structural duplicates.
    pub fn expressions(&self) -> &[ExprKey] {
        &self.expressions
    }

    pub fn depend_on_all_members(&self) -> bool {
        self.depend_on_all_members
    }

    pub fn contains(&self, key: &ExprKey) -> bool {
        self.expressions.contains(key)
    }

    fn push(&mut self, key: ExprKey) -> bool {
        if self.contains(&key) {
            return false;
        }
        self.expressions.push(key);
        true
    }
}

/// Per-field dependency bookkeeping, keyed by field name.
#[derive(Debug, Clone, Default)]
pub struct FieldDependencyRegistry {
    fields: HashMap<String, FieldDependencies>,
}

impl FieldDependencyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when a structurally equal expression was already recorded.
    pub fn add_dependency(&mut self, field_name: &str, key: ExprKey) -> bool {
        self.fields
            .entry(field_name.to_string())
            .or_default()
            .push(key)
    }

    /// Appends the keys not yet recorded for the field, in order. Returns the
    /// keys that were actually added.
    pub fn add_dependencies<I>(&mut self, field_name: &str, keys: I) -> Vec<ExprKey>
    where
        I: IntoIterator<Item = ExprKey>,
    {
        let entry = self.fields.entry(field_name.to_string()).or_default();
        keys.into_iter()
            .filter(|key| entry.push(key.clone()))
            .collect()
    }

    pub fn mark_depends_on_all_members(&mut self, field_name: &str) {
        self.fields
            .entry(field_name.to_string())
            .or_default()
            .depend_on_all_members = true;
    }

    pub fn get(&self, field_name: &str) -> Option<&FieldDependencies> {
        self.fields.get(field_name)
    }

    pub fn has_dependencies(&self, field_name: &str) -> bool {
        self.fields.contains_key(field_name)
    }

    /// Moves the bookkeeping of `old_name` to `new_name`, merging with any
    /// dependencies already recorded under the new name.
    pub fn rekey(&mut self, old_name: &str, new_name: &str) {
        if old_name == new_name {
            return;
        }
        let Some(moved) = self.fields.remove(old_name) else {
            return;
        };
        let entry = self.fields.entry(new_name.to_string()).or_default();
        for key in moved.expressions {
            entry.push(key);
        }
        entry.depend_on_all_members |= moved.depend_on_all_members;
    }

    /// Every dependency of every field, field by field.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldDependencies)> {
        self.fields.iter()
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
    fn test_structural_duplicates_are_ignored() {
        let mut registry = FieldDependencyRegistry::new();
        assert!(registry.add_dependency("managerName", key("p", "ManagerId")));
        assert!(!registry.add_dependency("managerName", key("x", "ManagerId")));

        let deps = registry.get("managerName").unwrap();
        assert_eq!(deps.expressions().len(), 1);
    }

    #[test]
    fn test_bulk_add_filters_and_keeps_order() {
        let mut registry = FieldDependencyRegistry::new();
        registry.add_dependency("f", key("p", "B"));

        let added = registry.add_dependencies(
            "f",
            vec![key("p", "A"), key("q", "B"), key("p", "C"), key("r", "A")],
        );
        assert_eq!(added, vec![key("p", "A"), key("p", "C")]);

        let names: Vec<String> = registry
            .get("f")
            .unwrap()
            .expressions()
            .iter()
            .map(|k| k.to_string())
            .collect();
        assert_eq!(names, vec!["$0 => $0.B", "$0 => $0.A", "$0 => $0.C"]);
    }

    #[test]
    fn test_all_members_flag_is_idempotent() {
        let mut registry = FieldDependencyRegistry::new();
        registry.mark_depends_on_all_members("f");
        registry.mark_depends_on_all_members("f");
        let deps = registry.get("f").unwrap();
        assert!(deps.depend_on_all_members());
        assert!(deps.expressions().is_empty());
    }

    #[test]
    fn test_rekey_merges() {
        let mut registry = FieldDependencyRegistry::new();
        registry.add_dependency("old", key("p", "A"));
        registry.mark_depends_on_all_members("old");
        registry.add_dependency("new", key("p", "A"));
        registry.add_dependency("new", key("p", "B"));

        registry.rekey("old", "new");

        assert!(!registry.has_dependencies("old"));
        let deps = registry.get("new").unwrap();
        assert_eq!(deps.expressions().len(), 2);
        assert!(deps.depend_on_all_members());
    }
}
