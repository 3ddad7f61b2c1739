use chrono::NaiveDateTime;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

use crate::date_utils;
use crate::db::repository::Record;
use crate::db::schema::{Field, FieldType, FieldValue, Schema};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub amount: f64,
    /// Category name as shown to the user; not a foreign key.
    pub category: String,
    pub expense_date: NaiveDateTime,
    pub added_date: NaiveDateTime,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub pk: i64,
}

impl Expense {
    /// New unsaved expense, stamped as added now.
    pub fn new(
        amount: f64,
        category: impl Into<String>,
        expense_date: NaiveDateTime,
        comment: impl Into<String>,
    ) -> Self {
        Self {
            amount,
            category: category.into(),
            expense_date,
            added_date: date_utils::now(),
            comment: comment.into(),
            pk: 0,
        }
    }

    pub fn has_comment(&self) -> bool {
        !self.comment.trim().is_empty()
    }
}

impl Record for Expense {
    fn schema() -> Schema {
        Schema::new(
            "expense",
            vec![
                Field::new("amount", FieldType::Real),
                Field::new("category", FieldType::Text),
                Field::new("expense_date", FieldType::Timestamp),
                Field::new("added_date", FieldType::Timestamp),
                Field::new("comment", FieldType::Text),
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
        vec![
            self.amount.into(),
            self.category.clone().into(),
            self.expense_date.into(),
            self.added_date.into(),
            self.comment.clone().into(),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Expense {
            pk: row.get(0)?,
            amount: row.get(1)?,
            category: row.get(2)?,
            expense_date: row.get(3)?,
            added_date: row.get(4)?,
            comment: row.get(5)?,
        })
    }
}
