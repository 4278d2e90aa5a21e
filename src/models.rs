pub mod auth;
pub mod expense;

pub use auth::AuthUser;
pub use expense::{DecodeError, Expense, ExpenseUpdate, NewExpense};
