use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ValueRef};
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::repository::Record;
use crate::db::schema::{Field, FieldType, FieldValue, Schema};

/// Length of a budget period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetDuration {
    Day,
    Week,
    Month,
}

#[derive(Debug, Error)]
#[error("unknown budget duration '{0}', expected day, week or month")]
pub struct ParseDurationError(pub String);

impl BudgetDuration {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }

    pub fn all() -> &'static [BudgetDuration] {
        &[Self::Day, Self::Week, Self::Month]
    }
}

impl FromStr for BudgetDuration {
    type Err = ParseDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            other => Err(ParseDurationError(other.to_string())),
        }
    }
}

impl fmt::Display for BudgetDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromSql for BudgetDuration {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

impl From<BudgetDuration> for FieldValue {
    fn from(d: BudgetDuration) -> Self {
        FieldValue::Text(d.as_str().to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    /// Running total spent within the period.
    pub amount: f64,
    /// Spending ceiling for the period.
    pub limits: f64,
    pub duration: BudgetDuration,
    pub expiration_date: NaiveDateTime,
    pub start_date: NaiveDateTime,
    #[serde(default)]
    pub pk: i64,
}

impl Budget {
    pub fn remaining(&self) -> f64 {
        self.limits - self.amount
    }

    pub fn is_exceeded(&self) -> bool {
        self.amount > self.limits
    }

    /// Whether an expense dated `date` counts against this budget.
    pub fn covers(&self, date: NaiveDateTime) -> bool {
        self.start_date < date && date <= self.expiration_date
    }
}

impl Record for Budget {
    fn schema() -> Schema {
        Schema::new(
            "budget",
            vec![
                Field::new("amount", FieldType::Real),
                Field::new("limits", FieldType::Real),
                Field::new("duration", FieldType::Text),
                Field::new("expiration_date", FieldType::Timestamp),
                Field::new("start_date", FieldType::Timestamp),
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
            self.limits.into(),
            self.duration.into(),
            self.expiration_date.into(),
            self.start_date.into(),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Budget {
            pk: row.get(0)?,
            amount: row.get(1)?,
            limits: row.get(2)?,
            duration: row.get(3)?,
            expiration_date: row.get(4)?,
            start_date: row.get(5)?,
        })
    }
}
