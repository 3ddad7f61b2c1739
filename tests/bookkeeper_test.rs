//! Integration tests for the category, expense and budget workflows.

mod common;

use bookkeeper::error::AppError;
use bookkeeper::models::BudgetDuration;
use bookkeeper::services::DeletePolicy;
use common::{ts, TestDb};
use serde_json::json;

#[test]
fn test_category_tree_from_storage() {
    let db = TestDb::new();
    let books = db.bookkeeper();

    let a = books.add_category("A", None).unwrap();
    let b = books.add_category("B", Some(a)).unwrap();
    let c = books.add_category("C", Some(b)).unwrap();

    let tree = books.category_tree().unwrap();
    assert_eq!(
        tree.to_nested_json(),
        json!({ a.to_string(): {"name": "A", b.to_string(): {"name": "B", c.to_string(): {"name": "C"}}}})
    );
    assert_eq!(tree.find_parent(c), Some(b));
    assert_eq!(tree.find_parent(a), None);
    assert_eq!(books.category_names().unwrap(), vec!["A", "B", "C"]);
}

#[test]
fn test_add_category_requires_existing_parent() {
    let db = TestDb::new();
    let books = db.bookkeeper();

    assert!(matches!(
        books.add_category("Orphan", Some(404)),
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        books.add_category("   ", None),
        Err(AppError::Validation(_))
    ));
    assert!(books.category_names().unwrap().is_empty());
}

#[test]
fn test_edit_category_rename_and_move() {
    let db = TestDb::new();
    let books = db.bookkeeper();

    let food = books.add_category("Food", None).unwrap();
    let meat = books.add_category("Meat", Some(food)).unwrap();
    let other = books.add_category("Other", None).unwrap();

    let renamed = books.edit_category(meat, Some("Fish"), Some(food)).unwrap();
    assert_eq!(renamed.name, "Fish");

    let moved = books.edit_category(meat, None, Some(other)).unwrap();
    assert_eq!(moved.name, "Fish");

    let tree = books.category_tree().unwrap();
    assert_eq!(tree.find_parent(meat), Some(other));
    assert!(tree.children(food).is_empty());

    books.edit_category(meat, None, None).unwrap();
    assert_eq!(books.category_tree().unwrap().find_parent(meat), None);
}

#[test]
fn test_move_under_later_category_keeps_tree_usable() {
    let db = TestDb::new();
    let books = db.bookkeeper();

    let food = books.add_category("Food", None).unwrap();
    let meat = books.add_category("Meat", Some(food)).unwrap();
    let other = books.add_category("Other", None).unwrap();
    books.edit_category(meat, None, Some(other)).unwrap();

    let steak = books.add_category("Steak", Some(meat)).unwrap();
    let tree = books.category_tree().unwrap();
    assert_eq!(tree.find_parent(meat), Some(other));
    assert_eq!(tree.path(steak), Some(vec!["Other", "Meat", "Steak"]));
    assert_eq!(
        tree.to_nested_json(),
        json!({
            food.to_string(): {"name": "Food"},
            other.to_string(): {"name": "Other", meat.to_string(): {"name": "Meat", steak.to_string(): {"name": "Steak"}}}
        })
    );

    books.edit_category(food, Some("Groceries"), Some(meat)).unwrap();
    assert_eq!(
        books.delete_category(other, DeletePolicy::Cascade).unwrap(),
        vec![other, meat, food, steak]
    );
    assert!(books.category_names().unwrap().is_empty());
}

#[test]
fn test_edit_category_rejects_cycles_and_unknown_parents() {
    let db = TestDb::new();
    let books = db.bookkeeper();

    let food = books.add_category("Food", None).unwrap();
    let meat = books.add_category("Meat", Some(food)).unwrap();

    assert!(matches!(
        books.edit_category(food, None, Some(meat)),
        Err(AppError::InvalidState(_))
    ));
    assert!(matches!(
        books.edit_category(food, None, Some(999)),
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        books.edit_category(999, Some("x"), None),
        Err(AppError::NotFound(_))
    ));

    // Nothing changed in storage.
    assert_eq!(books.category_tree().unwrap().find_parent(meat), Some(food));
}

#[test]
fn test_delete_category_cascade() {
    let db = TestDb::new();
    let books = db.bookkeeper();

    let a = books.add_category("A", None).unwrap();
    let b = books.add_category("B", Some(a)).unwrap();
    let c = books.add_category("C", Some(b)).unwrap();

    assert_eq!(books.delete_category(b, DeletePolicy::Cascade).unwrap(), vec![b, c]);

    let repo = books.category_repository();
    assert!(repo.get(b).unwrap().is_none());
    assert!(repo.get(c).unwrap().is_none());
    assert_eq!(
        books.category_tree().unwrap().to_nested_json(),
        json!({ a.to_string(): {"name": "A"} })
    );
}

#[test]
fn test_delete_category_reparent() {
    let db = TestDb::new();
    let books = db.bookkeeper();

    let a = books.add_category("A", None).unwrap();
    let b = books.add_category("B", Some(a)).unwrap();
    let c = books.add_category("C", Some(b)).unwrap();
    let d = books.add_category("D", Some(b)).unwrap();

    assert_eq!(books.delete_category(b, DeletePolicy::Reparent).unwrap(), vec![b]);

    let tree = books.category_tree().unwrap();
    assert_eq!(tree.children(a), &[c, d]);
    assert_eq!(tree.find_parent(d), Some(a));

    assert!(matches!(
        books.delete_category(b, DeletePolicy::Cascade),
        Err(AppError::NotFound(_))
    ));
}

#[test]
fn test_seed_categories_from_outline() {
    let db = TestDb::new();
    let books = db.bookkeeper();

    let outline = "food\n    meat\n        raw meat\n    sweets\nbooks\n";
    let pks = books.seed_categories(outline.lines()).unwrap();
    assert_eq!(pks.len(), 5);

    let tree = books.category_tree().unwrap();
    assert_eq!(tree.path(pks[2]), Some(vec!["food", "meat", "raw meat"]));
    assert_eq!(tree.roots(), &[pks[0], pks[4]]);

    // Seeding again reuses the existing categories.
    let again = books.seed_categories(outline.lines()).unwrap();
    assert_eq!(again, pks);
    assert_eq!(books.category_names().unwrap().len(), 5);
}

#[test]
fn test_seed_rejects_bad_outline() {
    let db = TestDb::new();
    let books = db.bookkeeper();

    let err = books.seed_categories(["a", "    b", "  c"]).unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert!(books.category_names().unwrap().is_empty());
}

#[test]
fn test_expenses_by_category_and_range() {
    let db = TestDb::new();
    let books = db.bookkeeper();
    let now = ts(2024, 6, 30, 20, 0);

    books.add_expense_at(10.0, "Food", ts(2024, 6, 1, 12, 0), "", now).unwrap();
    books.add_expense_at(20.0, "Books", ts(2024, 6, 2, 12, 0), "novel", now).unwrap();
    books.add_expense_at(30.0, "Food", ts(2024, 6, 3, 12, 0), "", now).unwrap();

    let food = books.expenses_in_category("Food").unwrap();
    assert_eq!(food.iter().map(|e| e.amount).collect::<Vec<_>>(), vec![10.0, 30.0]);
    assert!(food.iter().all(|e| e.added_date == now));

    let range = books
        .expenses_between(ts(2024, 6, 1, 12, 0), ts(2024, 6, 3, 12, 0))
        .unwrap();
    assert_eq!(range.iter().map(|e| e.amount).collect::<Vec<_>>(), vec![20.0, 30.0]);
}

#[test]
fn test_expense_charges_covering_budgets() {
    let db = TestDb::new();
    let books = db.bookkeeper();
    let start = ts(2024, 6, 10, 9, 0);

    let day = books.set_budget_at(50.0, BudgetDuration::Day, start).unwrap();
    let week = books.set_budget_at(200.0, BudgetDuration::Week, start).unwrap();
    assert_eq!(day.expiration_date, ts(2024, 6, 11, 9, 0));
    assert_eq!(week.expiration_date, ts(2024, 6, 17, 9, 0));
    assert_eq!(day.amount, 0.0);

    // Inside both periods.
    books.add_expense_at(15.0, "Food", ts(2024, 6, 10, 18, 0), "", start).unwrap();
    // Inside the week only.
    books.add_expense_at(40.0, "Food", ts(2024, 6, 12, 18, 0), "", start).unwrap();
    // Before both periods.
    books.add_expense_at(99.0, "Food", ts(2024, 6, 1, 18, 0), "", start).unwrap();

    let budgets = books.budget_repository();
    assert_eq!(budgets.get(day.pk).unwrap().unwrap().amount, 15.0);
    assert_eq!(budgets.get(week.pk).unwrap().unwrap().amount, 55.0);
}

#[test]
fn test_edit_and_delete_expense_move_budget_amounts() {
    let db = TestDb::new();
    let books = db.bookkeeper();
    let start = ts(2024, 6, 10, 9, 0);

    let week = books.set_budget_at(200.0, BudgetDuration::Week, start).unwrap();
    let expense = books
        .add_expense_at(30.0, "Food", ts(2024, 6, 11, 12, 0), "lunch", start)
        .unwrap();

    let edited = books
        .edit_expense(expense.pk, 45.0, "Food", ts(2024, 6, 11, 12, 0), "big lunch")
        .unwrap();
    assert_eq!(edited.added_date, expense.added_date);
    assert_eq!(books.expense(expense.pk).unwrap(), Some(edited));
    assert_eq!(books.budget_repository().get(week.pk).unwrap().unwrap().amount, 45.0);

    // Moved out of the budget period.
    books
        .edit_expense(expense.pk, 45.0, "Food", ts(2024, 7, 1, 12, 0), "")
        .unwrap();
    assert_eq!(books.budget_repository().get(week.pk).unwrap().unwrap().amount, 0.0);

    books
        .edit_expense(expense.pk, 10.0, "Food", ts(2024, 6, 12, 12, 0), "")
        .unwrap();
    assert!(books.delete_expense(expense.pk).unwrap());
    assert!(!books.delete_expense(expense.pk).unwrap());
    assert_eq!(books.budget_repository().get(week.pk).unwrap().unwrap().amount, 0.0);

    assert!(matches!(
        books.edit_expense(expense.pk, 1.0, "Food", start, ""),
        Err(AppError::NotFound(_))
    ));
}

#[test]
fn test_set_budget_counts_expenses_already_in_period() {
    let db = TestDb::new();
    let books = db.bookkeeper();
    let now = ts(2024, 1, 31, 12, 0);

    books.add_expense_at(25.0, "Rent", ts(2024, 2, 15, 0, 0), "", now).unwrap();
    books.add_expense_at(5.0, "Food", ts(2024, 1, 30, 0, 0), "", now).unwrap();

    let month = books.set_budget_at(1000.0, BudgetDuration::Month, now).unwrap();
    assert_eq!(month.expiration_date, ts(2024, 2, 29, 12, 0));
    assert_eq!(month.amount, 25.0);
    assert_eq!(month.limits, 1000.0);
}

#[test]
fn test_current_budgets_pick_latest_per_duration() {
    let db = TestDb::new();
    let books = db.bookkeeper();

    books.set_budget_at(10.0, BudgetDuration::Day, ts(2024, 3, 1, 8, 0)).unwrap();
    let latest_day = books.set_budget_at(12.0, BudgetDuration::Day, ts(2024, 3, 2, 8, 0)).unwrap();
    let week = books.set_budget_at(70.0, BudgetDuration::Week, ts(2024, 3, 1, 8, 0)).unwrap();

    let current = books.current_budgets().unwrap();
    assert_eq!(current, vec![latest_day, week]);
}

#[test]
fn test_negative_amounts_are_rejected() {
    let db = TestDb::new();
    let books = db.bookkeeper();

    assert!(matches!(
        books.set_budget_at(-1.0, BudgetDuration::Day, ts(2024, 1, 1, 0, 0)),
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        books.add_expense(f64::NAN, "Food", ts(2024, 1, 1, 0, 0), ""),
        Err(AppError::Validation(_))
    ));
    assert!(books.expenses().unwrap().is_empty());
}
