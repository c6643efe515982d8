//! Labeled fields that make up a record's embeddable text.

use serde::{Deserialize, Serialize};

/// One line of record text: `"{label}: {value of column}"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextField {
    pub label: String,
    pub column: String,
}

impl TextField {
    pub fn new(label: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            column: column.into(),
        }
    }

    /// A field whose label is its column name.
    pub fn same(column: impl Into<String>) -> Self {
        let column = column.into();
        Self {
            label: column.clone(),
            column,
        }
    }
}

/// Ordered list of required fields used to build record text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSchema {
    pub fields: Vec<TextField>,
}

impl RecordSchema {
    pub fn new(fields: Vec<TextField>) -> Self {
        Self { fields }
    }

    /// The nutrition table layout: dish name plus calorie and macro columns.
    pub fn nutrition() -> Self {
        Self::new(vec![
            TextField::new("Food", "Dish Name"),
            TextField::same("Calories (kcal)"),
            TextField::same("Carbohydrates (g)"),
            TextField::same("Protein (g)"),
            TextField::same("Fats (g)"),
            TextField::new("Fiber (g)", "Fibre (g)"),
        ])
    }

    /// Column names the schema requires.
    pub fn required_columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.column.as_str())
    }
}

impl Default for RecordSchema {
    fn default() -> Self {
        Self::nutrition()
    }
}
