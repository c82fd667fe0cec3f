use serde::Deserialize;
use serde_json::Value;

/// Columnar document: field names once, then rows of positional values.
#[derive(Debug, Clone, Deserialize)]
pub struct Table {
    pub fields: Vec<String>,
    pub values: Vec<Vec<Value>>,
}

pub struct Row<'a> {
    fields: &'a [String],
    values: &'a [Value],
}

impl Table {
    pub fn has_field(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    /// Every row carries a value for every declared field.
    pub fn is_well_formed(&self) -> bool {
        self.values.iter().all(|row| row.len() >= self.fields.len())
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        let fields = self.fields.as_slice();
        self.values.iter().map(move |values| Row {
            fields,
            values: values.as_slice(),
        })
    }
}

impl<'a> Row<'a> {
    /// Value of `field` in this row; `None` when the table has no such field.
    pub fn get(&self, field: &str) -> Option<&'a Value> {
        self.fields
            .iter()
            .position(|f| f == field)
            .and_then(|index| self.values.get(index))
    }

    pub fn serial(&self) -> Option<String> {
        self.get("serialNumber").map(|serial| match serial {
            Value::String(s) => s.to_owned(),
            other => other.to_string(),
        })
    }
}

/// Installer device status document.
#[derive(Debug, Clone, Deserialize)]
pub struct DevStatus {
    pub pcu: Table,
    #[serde(default)]
    pub nsrb: Option<Table>,
}
