pub mod budget;
pub mod category;
pub mod expense;

pub use budget::{Budget, BudgetDuration, ParseDurationError};
pub use category::Category;
pub use expense::Expense;
