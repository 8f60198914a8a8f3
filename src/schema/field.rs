use regex::Regex;

use crate::core::DataType;
use crate::expression::Lambda;

lazy_static::lazy_static! {
    static ref GRAPHQL_NAME: Regex = Regex::new(r"^[_A-Za-z][_0-9A-Za-z]*$").expect("GraphQL name pattern compiles");
}

/// GraphQL name syntax: `[_A-Za-z][_0-9A-Za-z]*`
#[inline]
pub fn is_valid_field_name(name: &str) -> bool {
    GRAPHQL_NAME.is_match(name)
}

/// A field declared on an entity by the configuration layer.
///
/// Computed fields carry a lambda over `(entity)` or `(context, entity)`.
/// Resolved fields have no expression; their value is produced by a resolver
/// from dependencies and they never become shape members themselves.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: String,
    expression: Option<Lambda>,
    field_type: Option<DataType>,
    groupable: bool,
}

impl Field {
    pub fn computed(name: impl Into<String>, expression: Lambda) -> Self {
        Self {
            name: name.into(),
            expression: Some(expression),
            field_type: None,
            groupable: false,
        }
    }

    pub fn resolved(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expression: None,
            field_type: None,
            groupable: false,
        }
    }

    /// Sets the materialized type explicitly instead of inferring it.
    pub fn with_type(mut self, field_type: DataType) -> Self {
        self.field_type = Some(field_type);
        self
    }

    pub fn groupable(mut self) -> Self {
        self.groupable = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expression(&self) -> Option<&Lambda> {
        self.expression.as_ref()
    }

    pub fn field_type(&self) -> Option<&DataType> {
        self.field_type.as_ref()
    }

    pub fn is_expression(&self) -> bool {
        self.expression.is_some()
    }

    pub fn is_groupable(&self) -> bool {
        self.groupable
    }

    /// Has both an expression and a type, so it can be a shape member.
    pub fn is_materializable(&self) -> bool {
        self.expression.is_some() && self.field_type.is_some()
    }

    pub(crate) fn set_field_type(&mut self, field_type: DataType) {
        self.field_type = Some(field_type);
    }
}
