pub mod expense_service;
pub mod session;

pub use expense_service::{ExpenseError, ExpenseService};
pub use session::{AuthError, Session};
