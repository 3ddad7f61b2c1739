//! Category, expense and budget workflows over the repositories.
//!
//! Nothing here is cached: the category tree is rebuilt from storage each
//! time it is needed, and every write is its own single-statement commit.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use crate::date_utils;
use crate::db::repository::{
    repository_factory, Filter, RawClause, RepositoryRegistry, SqliteRepository,
};
use crate::db::storage::Storage;
use crate::error::{AppError, AppResult};
use crate::models::{Budget, BudgetDuration, Category, Expense};
use crate::tree::{read_outline, CategoryTree};

/// What happens to the children of a deleted category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletePolicy {
    /// Delete the whole subtree from storage.
    #[default]
    Cascade,
    /// Move the direct children up to the deleted category's parent.
    Reparent,
}

#[derive(Debug, Clone)]
pub struct Bookkeeper {
    categories: SqliteRepository<Category>,
    expenses: SqliteRepository<Expense>,
    budgets: SqliteRepository<Budget>,
}

impl Bookkeeper {
    pub fn new(registry: &RepositoryRegistry) -> AppResult<Self> {
        Ok(Self {
            categories: registry.require::<Category>()?.clone(),
            expenses: registry.require::<Expense>()?.clone(),
            budgets: registry.require::<Budget>()?.clone(),
        })
    }

    /// Opens (and if needed creates) every table at `storage`.
    pub fn open(storage: Storage) -> AppResult<Self> {
        Self::new(&repository_factory(storage)?)
    }

    pub fn category_repository(&self) -> &SqliteRepository<Category> {
        &self.categories
    }

    pub fn expense_repository(&self) -> &SqliteRepository<Expense> {
        &self.expenses
    }

    pub fn budget_repository(&self) -> &SqliteRepository<Budget> {
        &self.budgets
    }

    // ---------------------------------------------------------------------
    // Categories
    // ---------------------------------------------------------------------

    pub fn category_tree(&self) -> AppResult<CategoryTree> {
        CategoryTree::build(&self.categories.list()?)
    }

    pub fn category_names(&self) -> AppResult<Vec<String>> {
        Ok(self
            .categories
            .list()?
            .into_iter()
            .map(|c| c.name)
            .collect())
    }

    pub fn add_category(&self, name: &str, parent: Option<i64>) -> AppResult<i64> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("category name is empty".into()));
        }
        if let Some(parent_id) = parent {
            if self.categories.get(parent_id)?.is_none() {
                return Err(AppError::NotFound(format!("parent category {}", parent_id)));
            }
        }

        let mut category = Category::new(name, parent);
        let pk = self.categories.add(&mut category)?;
        info!(category_id = pk, name, parent = ?parent, "Added category");
        Ok(pk)
    }

    /// Renames and/or moves a category. A `None` name keeps the stored one;
    /// `new_parent` is always applied, `None` making the category top-level.
    pub fn edit_category(
        &self,
        id: i64,
        new_name: Option<&str>,
        new_parent: Option<i64>,
    ) -> AppResult<Category> {
        let current = self
            .categories
            .get(id)?
            .ok_or_else(|| AppError::NotFound(format!("category {}", id)))?;

        let name = match new_name.map(str::trim) {
            Some("") => return Err(AppError::Validation("category name is empty".into())),
            Some(name) => name.to_string(),
            None => current.name,
        };

        // Validates the new parent exists and is outside the moved subtree.
        let mut tree = self.category_tree()?;
        tree.set(id, &name, new_parent).map_err(|e| match e {
            AppError::OrphanNode { parent, .. } => {
                AppError::NotFound(format!("parent category {}", parent))
            }
            other => other,
        })?;

        let updated = Category {
            name,
            parent: new_parent,
            pk: id,
        };
        self.categories.update(&updated)?;
        info!(category_id = id, name = %updated.name, parent = ?new_parent, "Edited category");
        Ok(updated)
    }

    /// Deletes a category from storage and returns the deleted pks.
    pub fn delete_category(&self, id: i64, policy: DeletePolicy) -> AppResult<Vec<i64>> {
        let mut tree = self.category_tree()?;
        let node = tree
            .find(id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("category {}", id)))?;

        let removed = match policy {
            DeletePolicy::Cascade => {
                let removed = tree.delete(id);
                // Children first, so no stored row points at a deleted parent.
                for pk in removed.iter().rev() {
                    self.categories.delete(*pk)?;
                }
                removed
            }
            DeletePolicy::Reparent => {
                for child_id in &node.children {
                    let mut child = self
                        .categories
                        .get(*child_id)?
                        .ok_or_else(|| AppError::NotFound(format!("category {}", child_id)))?;
                    child.parent = node.parent;
                    self.categories.update(&child)?;
                }
                self.categories.delete(id)?;
                vec![id]
            }
        };

        warn!(category_id = id, policy = ?policy, count = removed.len(), "Deleted categories");
        Ok(removed)
    }

    /// Adds the categories of an indented outline, reusing any category that
    /// already exists with the same name under the same parent. Returns the
    /// pks of the outline entries in outline order.
    pub fn seed_categories<I, S>(&self, lines: I) -> AppResult<Vec<i64>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let outline = read_outline(lines)?;
        let existing = self.categories.list()?;
        let mut by_name: HashMap<String, i64> = HashMap::new();
        let mut pks = Vec::with_capacity(outline.len());
        let mut created = 0;

        for (name, parent_name) in outline {
            let parent = match parent_name {
                Some(parent_name) => Some(*by_name.get(&parent_name).ok_or_else(|| {
                    AppError::NotFound(format!("parent category '{}'", parent_name))
                })?),
                None => None,
            };

            let pk = match existing
                .iter()
                .find(|c| c.name == name && c.parent == parent)
            {
                Some(found) => found.pk,
                None => {
                    let mut category = Category::new(name.clone(), parent);
                    created += 1;
                    self.categories.add(&mut category)?
                }
            };

            by_name.insert(name, pk);
            pks.push(pk);
        }

        info!(entries = pks.len(), created, "Seeded categories");
        Ok(pks)
    }

    // ---------------------------------------------------------------------
    // Expenses
    // ---------------------------------------------------------------------

    pub fn expenses(&self) -> AppResult<Vec<Expense>> {
        self.expenses.list()
    }

    pub fn expense(&self, pk: i64) -> AppResult<Option<Expense>> {
        self.expenses.get(pk)
    }

    pub fn expenses_in_category(&self, category: &str) -> AppResult<Vec<Expense>> {
        let filter = Filter::new().equals("category", category);
        self.expenses.get_all(Some(&filter), None)
    }

    /// Expenses dated after `start` and up to and including `end`.
    pub fn expenses_between(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> AppResult<Vec<Expense>> {
        let clause = RawClause::new("expense_date > ? AND expense_date <= ?")
            .bind(start)
            .bind(end);
        self.expenses.get_all(None, Some(&clause))
    }

    pub fn add_expense(
        &self,
        amount: f64,
        category: &str,
        expense_date: NaiveDateTime,
        comment: &str,
    ) -> AppResult<Expense> {
        self.add_expense_at(amount, category, expense_date, comment, date_utils::now())
    }

    /// Stores an expense added at `now` and charges it to every budget whose
    /// period covers the expense date.
    pub fn add_expense_at(
        &self,
        amount: f64,
        category: &str,
        expense_date: NaiveDateTime,
        comment: &str,
        now: NaiveDateTime,
    ) -> AppResult<Expense> {
        ensure_amount(amount)?;
        let mut expense = Expense {
            amount,
            category: category.to_string(),
            expense_date,
            added_date: now,
            comment: comment.to_string(),
            pk: 0,
        };
        self.expenses.add(&mut expense)?;
        self.charge_budgets(expense_date, amount)?;
        info!(expense_id = expense.pk, amount, category, "Added expense");
        Ok(expense)
    }

    /// Replaces an expense's editable fields, keeping its added date, and
    /// moves its amount between the affected budgets.
    pub fn edit_expense(
        &self,
        pk: i64,
        amount: f64,
        category: &str,
        expense_date: NaiveDateTime,
        comment: &str,
    ) -> AppResult<Expense> {
        ensure_amount(amount)?;
        let current = self
            .expenses
            .get(pk)?
            .ok_or_else(|| AppError::NotFound(format!("expense {}", pk)))?;

        let updated = Expense {
            amount,
            category: category.to_string(),
            expense_date,
            added_date: current.added_date,
            comment: comment.to_string(),
            pk,
        };
        self.expenses.update(&updated)?;
        self.charge_budgets(current.expense_date, -current.amount)?;
        self.charge_budgets(expense_date, amount)?;
        info!(expense_id = pk, amount, category, "Edited expense");
        Ok(updated)
    }

    /// Deletes an expense and releases its amount from the covering budgets.
    /// Returns `false` when there was nothing to delete.
    pub fn delete_expense(&self, pk: i64) -> AppResult<bool> {
        let Some(current) = self.expenses.get(pk)? else {
            return Ok(false);
        };
        let deleted = self.expenses.delete(pk)?;
        if deleted {
            self.charge_budgets(current.expense_date, -current.amount)?;
            info!(expense_id = pk, "Deleted expense");
        }
        Ok(deleted)
    }

    // ---------------------------------------------------------------------
    // Budgets
    // ---------------------------------------------------------------------

    pub fn set_budget(&self, limit: f64, duration: BudgetDuration) -> AppResult<Budget> {
        self.set_budget_at(limit, duration, date_utils::now())
    }

    /// Starts a budget period at `now`. The running amount starts at the sum
    /// of the expenses already recorded inside the new period.
    pub fn set_budget_at(
        &self,
        limit: f64,
        duration: BudgetDuration,
        now: NaiveDateTime,
    ) -> AppResult<Budget> {
        ensure_amount(limit)?;
        let expiration_date = date_utils::period_end(now, duration).ok_or_else(|| {
            AppError::Validation(format!("{} budget starting {} overflows", duration, now))
        })?;

        let spent: f64 = self
            .expenses_between(now, expiration_date)?
            .iter()
            .map(|e| e.amount)
            .sum();

        let mut budget = Budget {
            amount: spent,
            limits: limit,
            duration,
            expiration_date,
            start_date: now,
            pk: 0,
        };
        self.budgets.add(&mut budget)?;
        info!(budget_id = budget.pk, %duration, limit, spent, "Set budget");
        Ok(budget)
    }

    /// For each duration, the budgets with the latest expiration date.
    pub fn current_budgets(&self) -> AppResult<Vec<Budget>> {
        let mut current = Vec::new();
        for duration in BudgetDuration::all() {
            let filter = Filter::new().equals("duration", *duration);
            let clause = RawClause::new(
                "expiration_date = (SELECT MAX(expiration_date) FROM budget WHERE duration = ?)",
            )
            .bind(*duration);
            current.extend(self.budgets.get_all(Some(&filter), Some(&clause))?);
        }
        Ok(current)
    }

    /// Budgets whose period covers `date` (start exclusive, end inclusive).
    pub fn budgets_covering(&self, date: NaiveDateTime) -> AppResult<Vec<Budget>> {
        let clause = RawClause::new("start_date < ? AND expiration_date >= ?")
            .bind(date)
            .bind(date);
        self.budgets.get_all(None, Some(&clause))
    }

    fn charge_budgets(&self, date: NaiveDateTime, delta: f64) -> AppResult<()> {
        for mut budget in self.budgets_covering(date)? {
            budget.amount += delta;
            self.budgets.update(&budget)?;
            debug!(budget_id = budget.pk, delta, amount = budget.amount, "Charged budget");
        }
        Ok(())
    }
}

fn ensure_amount(amount: f64) -> AppResult<()> {
    if amount.is_finite() && amount >= 0.0 {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "amount must be a non-negative number, got {}",
            amount
        )))
    }
}
