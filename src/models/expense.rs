use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::providers::document_store::Document;
use crate::validation::{validate_cost, validate_description};

/// A single expense record from the per-user collection.
///
/// `id` is assigned by the backend on creation and immutable thereafter.
/// `deleted` is a soft-delete flag; records are never physically removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: String,
    pub description: String,
    pub date: NaiveDate,
    pub cost: f64,
    pub deleted: bool,
}

/// Stored field layout of an expense document. Unknown fields such as
/// `created_at` are ignored on decode.
#[derive(Debug, Deserialize)]
struct StoredExpense {
    description: String,
    date: NaiveDate,
    cost: f64,
    deleted: bool,
}

/// A stored expense document that could not be decoded into an [`Expense`].
#[derive(Debug, Clone, thiserror::Error)]
#[error("stored expense '{id}' is malformed: {reason}")]
pub struct DecodeError {
    pub id: String,
    pub reason: String,
}

impl Expense {
    /// Decode a stored document into a typed expense.
    ///
    /// Missing or mistyped fields fail with a [`DecodeError`] naming the
    /// document, rather than being silently replaced with defaults.
    pub fn decode(document: &Document) -> Result<Self, DecodeError> {
        let stored: StoredExpense =
            serde_json::from_value(Value::Object(document.fields.clone())).map_err(|e| {
                DecodeError {
                    id: document.id.clone(),
                    reason: e.to_string(),
                }
            })?;

        Ok(Self {
            id: document.id.clone(),
            description: stored.description,
            date: stored.date,
            cost: stored.cost,
            deleted: stored.deleted,
        })
    }
}

/// Payload for creating a new expense. The soft-delete flag and creation
/// timestamp are assigned at write time, never by the caller.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewExpense {
    #[validate(custom(function = "validate_description"))]
    pub description: String,

    pub date: NaiveDate,

    #[validate(custom(function = "validate_cost"))]
    pub cost: f64,
}

/// Partial-update payload: only fields that are `Some` are applied, all
/// others are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ExpenseUpdate {
    #[validate(custom(function = "validate_description"))]
    pub description: Option<String>,

    pub date: Option<NaiveDate>,

    #[validate(custom(function = "validate_cost"))]
    pub cost: Option<f64>,

    pub deleted: Option<bool>,
}
