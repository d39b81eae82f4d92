pub mod data_type;
pub use data_type::*;

pub mod schema;
pub use schema::*;

/// Read-only catalog access used while planning.
pub trait SchemaProvider {
    /// Case-insensitive table lookup.
    fn find_table(&self, name: &str) -> Option<&Table>;
    fn find_procedure(&self, name: &str) -> Option<&Procedure>;
    fn find_foreign_procedure(&self, name: &str) -> Option<&ForeignProcedure>;
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    fn table(name: &str, columns: &[(&str, DataType)]) -> Table {
        Table {
            name: name.into(),
            columns: columns
                .iter()
                .map(|(name, data_type)| Column { name: (*name).into(), data_type: *data_type, primary_key: false })
                .collect(),
        }
    }

    fn named(fields: &[(&str, DataType)]) -> Vec<NamedType> {
        fields.iter().map(|(name, data_type)| NamedType { name: (*name).into(), data_type: *data_type }).collect()
    }

    /// users, posts and a small `a(b, c)` table, plus procedures returning
    /// tables, single values and nothing.
    pub(crate) fn schema() -> Schema {
        Schema::new()
            .with_table(table("users", &[("id", DataType::INT), ("name", DataType::TEXT), ("age", DataType::INT)]))
            .with_table(table("posts", &[("id", DataType::INT), ("owner_id", DataType::INT), ("content", DataType::TEXT)]))
            .with_table(table("a", &[("b", DataType::INT), ("c", DataType::INT)]))
            .with_procedure(Procedure {
                name: "get_posts".into(),
                parameters: named(&[("$owner", DataType::INT)]),
                returns: Some(ProcedureReturn {
                    is_table: true,
                    fields: named(&[("id", DataType::INT), ("content", DataType::TEXT)]),
                }),
            })
            .with_procedure(Procedure {
                name: "user_age".into(),
                parameters: named(&[("$id", DataType::INT)]),
                returns: Some(ProcedureReturn { is_table: false, fields: named(&[("age", DataType::INT)]) }),
            })
            .with_procedure(Procedure { name: "touch".into(), parameters: vec![], returns: None })
            .with_foreign_procedure(ForeignProcedure {
                name: "remote_posts".into(),
                parameters: vec![DataType::INT],
                returns: Some(ProcedureReturn { is_table: true, fields: named(&[("id", DataType::INT)]) }),
            })
            .with_foreign_procedure(ForeignProcedure {
                name: "remote_count".into(),
                parameters: vec![DataType::INT],
                returns: Some(ProcedureReturn { is_table: false, fields: named(&[("count", DataType::INT)]) }),
            })
    }
}
