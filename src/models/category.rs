use rusqlite::Row;
use serde::{Deserialize, Serialize};

use crate::db::repository::Record;
use crate::db::schema::{Field, FieldType, FieldValue, Schema};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    /// Pk of the enclosing category; `None` for top-level categories.
    pub parent: Option<i64>,
    #[serde(default)]
    pub pk: i64,
}

impl Category {
    pub fn new(name: impl Into<String>, parent: Option<i64>) -> Self {
        Self {
            name: name.into(),
            parent,
            pk: 0,
        }
    }

    pub fn is_top_level(&self) -> bool {
        self.parent.is_none()
    }
}

impl Record for Category {
    fn schema() -> Schema {
        Schema::new(
            "category",
            vec![
                Field::new("name", FieldType::Text),
                Field::new("parent", FieldType::Integer),
            ],
        )
    }

    fn pk(&self) -> i64 {
        self.pk
    }

    fn set_pk(&mut self, pk: i64) {
        self.pk = pk;
    }

    fn values(&self) -> Vec<FieldValue> {
        vec![self.name.clone().into(), self.parent.into()]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Category {
            pk: row.get(0)?,
            name: row.get(1)?,
            parent: row.get(2)?,
        })
    }
}
