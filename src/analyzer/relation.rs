use indexmap::IndexMap;

use crate::{catalog::DataType, error::{PlanError, PlanResult}};

/// Type of a single output column: a scalar (or array) or an object whose
/// fields are reached with `.`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Scalar(DataType),
    Object(IndexMap<String, DataType>),
}

/// One column of a relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Relation the column belongs to; `None` for computed values.
    pub parent: Option<String>,
    pub name: String,
    pub value: FieldValue,
}

impl Field {
    pub fn new(parent: Option<&str>, name: &str, data_type: DataType) -> Self {
        Self { parent: parent.map(str::to_string), name: name.to_string(), value: FieldValue::Scalar(data_type) }
    }

    /// Computed value without a name, such as `a + b`.
    pub fn anonymous(data_type: DataType) -> Self {
        Self { parent: None, name: String::new(), value: FieldValue::Scalar(data_type) }
    }

    pub fn object(name: &str, fields: IndexMap<String, DataType>) -> Self {
        Self { parent: None, name: name.to_string(), value: FieldValue::Object(fields) }
    }

    pub fn scalar(&self) -> PlanResult<DataType> {
        match &self.value {
            FieldValue::Scalar(data_type) => Ok(*data_type),
            FieldValue::Object(_) => Err(PlanError::type_err(
                "referenced field is an object, expected scalar or array. specify a field to access using the . operator",
            )),
        }
    }

    pub fn as_object(&self) -> PlanResult<&IndexMap<String, DataType>> {
        match &self.value {
            FieldValue::Object(fields) => Ok(fields),
            FieldValue::Scalar(data_type) if data_type.is_array => {
                Err(PlanError::type_err("referenced expression is an array, expected object"))
            }
            FieldValue::Scalar(_) => Err(PlanError::type_err("referenced expression is a scalar, expected object")),
        }
    }

    fn matches(&self, parent: Option<&str>, name: &str) -> bool {
        if !self.name.eq_ignore_ascii_case(name) {
            return false;
        }
        match parent {
            Some(parent) => self.parent.as_deref().is_some_and(|p| p.eq_ignore_ascii_case(parent)),
            None => true,
        }
    }
}

/// Ordered list of fields produced by a plan node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relation {
    pub fields: Vec<Field>,
}

impl Relation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fields(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Both relations' fields, `self` first.
    pub fn join(mut self, other: Relation) -> Self {
        self.fields.extend(other.fields);
        self
    }

    pub fn with_parent(mut self, parent: &str) -> Self {
        for field in &mut self.fields {
            field.parent = Some(parent.to_string());
        }
        self
    }

    pub fn without_parents(mut self) -> Self {
        for field in &mut self.fields {
            field.parent = None;
        }
        self
    }

    pub fn columns_by_parent(&self, parent: &str) -> Vec<&Field> {
        self.fields
            .iter()
            .filter(|f| f.parent.as_deref().is_some_and(|p| p.eq_ignore_ascii_case(parent)))
            .collect()
    }

    /// Finds the single field named `name`, under `parent` when given.
    ///
    /// An unqualified name that matches fields of several relations is
    /// ambiguous.
    pub fn search(&self, parent: Option<&str>, name: &str) -> PlanResult<&Field> {
        let mut found = self.fields.iter().filter(|f| f.matches(parent, name));
        let Some(first) = found.next() else {
            let reference = match parent {
                Some(parent) => format!("{parent}.{name}"),
                None => name.to_string(),
            };
            return Err(PlanError::ColumnNotFound(reference));
        };
        if parent.is_none() && found.next().is_some() {
            return Err(PlanError::AmbiguousColumn(name.to_string()));
        }
        Ok(first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> Relation {
        Relation::from_fields(vec![
            Field::new(None, "id", DataType::INT),
            Field::new(None, "name", DataType::TEXT),
        ])
        .with_parent("users")
    }

    fn posts() -> Relation {
        Relation::from_fields(vec![
            Field::new(None, "id", DataType::INT),
            Field::new(None, "owner", DataType::INT),
        ])
        .with_parent("posts")
    }

    #[test]
    fn unqualified_search_requires_a_unique_match() {
        let rel = users().join(posts());
        assert_eq!(rel.search(None, "NAME").unwrap().parent.as_deref(), Some("users"));
        match rel.search(None, "id") {
            Err(PlanError::AmbiguousColumn(name)) => assert_eq!(name, "id"),
            other => panic!("unexpected {other:?}"),
        }
        match rel.search(None, "missing") {
            Err(PlanError::ColumnNotFound(name)) => assert_eq!(name, "missing"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn qualified_search_uses_the_parent() {
        let rel = users().join(posts());
        assert_eq!(rel.search(Some("posts"), "id").unwrap().parent.as_deref(), Some("posts"));
        match rel.search(Some("likes"), "id") {
            Err(PlanError::ColumnNotFound(name)) => assert_eq!(name, "likes.id"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(rel.columns_by_parent("users").len(), 2);
    }

    #[test]
    fn object_and_scalar_access() {
        let mut fields = IndexMap::new();
        fields.insert("age".to_string(), DataType::INT);
        let obj = Field::object("$user", fields);
        assert!(obj.scalar().is_err());
        assert_eq!(obj.as_object().unwrap()["age"], DataType::INT);

        let arr = Field::anonymous(DataType::INT.array_of());
        match arr.as_object() {
            Err(PlanError::Type(msg)) => assert_eq!(msg, "referenced expression is an array, expected object"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
