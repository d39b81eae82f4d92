use std::{collections::HashSet, path::Path};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{catalog::{DataType, SchemaProvider}, error::{PlanError, PlanResult}};

static IDENTIFIER: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").ok());

/// A physical table column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
    #[serde(default)]
    pub primary_key: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
}

impl Table {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// A name/type pair used for procedure parameters and return fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedType {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
}

/// What a procedure hands back: a table (many rows) or a fixed list of values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureReturn {
    #[serde(default)]
    pub is_table: bool,
    #[serde(default)]
    pub fields: Vec<NamedType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Procedure {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<NamedType>,
    #[serde(default)]
    pub returns: Option<ProcedureReturn>,
}

impl Procedure {
    pub fn parameter_types(&self) -> Vec<DataType> {
        self.parameters.iter().map(|p| p.data_type).collect()
    }
}

/// A procedure living in another dataset, called with a `[dbid, procedure]` context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignProcedure {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<DataType>,
    #[serde(default)]
    pub returns: Option<ProcedureReturn>,
}

/// The catalog a query is planned against.
///
/// Loaded from JSON of the shape
/// `{"tables": [{"name": "users", "columns": [{"name": "id", "type": "uuid"}]}],
///   "procedures": [...], "foreign_procedures": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tables: Vec<Table>,
    #[serde(default)]
    pub procedures: Vec<Procedure>,
    #[serde(default)]
    pub foreign_procedures: Vec<ForeignProcedure>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: Table) -> Self {
        self.tables.push(table);
        self
    }

    pub fn with_procedure(mut self, procedure: Procedure) -> Self {
        self.procedures.push(procedure);
        self
    }

    pub fn with_foreign_procedure(mut self, procedure: ForeignProcedure) -> Self {
        self.foreign_procedures.push(procedure);
        self
    }

    pub fn from_json(text: &str) -> PlanResult<Self> {
        let schema: Schema = serde_json::from_str(text)
            .map_err(|e| PlanError::Schema(format!("invalid schema json: {e}")))?;
        schema.validate()?;
        Ok(schema)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> PlanResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| PlanError::Schema(format!("failed to read {}: {e}", path.display())))?;
        Self::from_json(&content)
    }

    /// Checks identifiers and rejects duplicate tables, columns and procedures.
    pub fn validate(&self) -> PlanResult<()> {
        let mut tables = HashSet::new();
        for table in &self.tables {
            check_identifier("table", &table.name)?;
            if !tables.insert(table.name.to_ascii_lowercase()) {
                return Err(PlanError::Schema(format!("duplicate table \"{}\"", table.name)));
            }
            let mut columns = HashSet::new();
            for column in &table.columns {
                check_identifier("column", &column.name)?;
                if !columns.insert(column.name.to_ascii_lowercase()) {
                    return Err(PlanError::Schema(format!(
                        "duplicate column \"{}\" in table \"{}\"", column.name, table.name
                    )));
                }
            }
        }

        let mut procedures = HashSet::new();
        let names = self.procedures.iter().map(|p| &p.name)
            .chain(self.foreign_procedures.iter().map(|p| &p.name));
        for name in names {
            check_identifier("procedure", name)?;
            if !procedures.insert(name.to_ascii_lowercase()) {
                return Err(PlanError::Schema(format!("duplicate procedure \"{name}\"")));
            }
        }

        Ok(())
    }
}

fn check_identifier(kind: &str, name: &str) -> PlanResult<()> {
    let valid = IDENTIFIER.as_ref().is_some_and(|re| re.is_match(name));
    if !valid {
        return Err(PlanError::Schema(format!("invalid {kind} name \"{name}\"")));
    }
    Ok(())
}

impl SchemaProvider for Schema {
    fn find_table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    fn find_procedure(&self, name: &str) -> Option<&Procedure> {
        self.procedures.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    fn find_foreign_procedure(&self, name: &str) -> Option<&ForeignProcedure> {
        self.foreign_procedures.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const SCHEMA: &str = r#"{
        "name": "social",
        "tables": [
            {"name": "users", "columns": [
                {"name": "id", "type": "uuid", "primary_key": true},
                {"name": "name", "type": "text"},
                {"name": "age", "type": "int"}
            ]}
        ],
        "procedures": [
            {"name": "post_count", "parameters": [{"name": "$id", "type": "uuid"}],
             "returns": {"fields": [{"name": "count", "type": "int"}]}}
        ],
        "foreign_procedures": [
            {"name": "car_count", "parameters": ["uuid"],
             "returns": {"fields": [{"name": "count", "type": "int"}]}}
        ]
    }"#;

    #[test]
    fn loads_tables_and_procedures_from_json() {
        let schema = Schema::from_json(SCHEMA).unwrap();
        let users = schema.find_table("USERS").unwrap();
        assert_eq!(users.columns.len(), 3);
        assert_eq!(users.column("age").unwrap().data_type, DataType::INT);
        assert!(users.column("id").unwrap().primary_key);

        let proc = schema.find_procedure("post_count").unwrap();
        assert_eq!(proc.parameter_types(), vec![DataType::UUID]);
        assert!(!proc.returns.as_ref().unwrap().is_table);

        assert!(schema.find_foreign_procedure("car_count").is_some());
        assert!(schema.find_procedure("car_count").is_none());
    }

    #[test]
    fn rejects_duplicates_and_bad_names() {
        let dup = r#"{"tables": [{"name": "a", "columns": []}, {"name": "A", "columns": []}]}"#;
        assert!(matches!(Schema::from_json(dup), Err(PlanError::Schema(_))));

        let bad = r#"{"tables": [{"name": "1a", "columns": []}]}"#;
        assert!(matches!(Schema::from_json(bad), Err(PlanError::Schema(_))));

        let bad_type = r#"{"tables": [{"name": "a", "columns": [{"name": "x", "type": "money"}]}]}"#;
        assert!(Schema::from_json(bad_type).is_err());
    }

    #[test]
    fn load_from_file_reads_json() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("schema.json");
        let mut file = std::fs::File::create(&file_path).unwrap();
        file.write_all(SCHEMA.as_bytes()).unwrap();

        let schema = Schema::load_from_file(&file_path).unwrap();
        assert_eq!(schema.name, "social");

        let missing = Schema::load_from_file(temp_dir.path().join("missing.json"));
        assert!(matches!(missing, Err(PlanError::Schema(_))));
    }
}
