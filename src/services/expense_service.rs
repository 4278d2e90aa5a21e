use log::debug;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use validator::{Validate, ValidationErrors};

use crate::models::expense::{DecodeError, Expense, ExpenseUpdate, NewExpense};
use crate::providers::document_store::{
    DocumentStore, FieldFilter, OrderBy, StoreError, WriteValue,
};
use crate::services::session::Session;

/// Expense service errors
#[derive(Debug, thiserror::Error)]
pub enum ExpenseError {
    #[error("Description must not be empty")]
    EmptyDescription,

    #[error("Cost must be a finite number of at least zero")]
    InvalidCost,

    #[error("Not signed in")]
    NotSignedIn,

    #[error(transparent)]
    Malformed(#[from] DecodeError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// CRUD access to the per-identity expense collection.
///
/// Every operation resolves the current `uid` first and fails with
/// [`ExpenseError::NotSignedIn`] before touching the store when no identity
/// is resolved. Deletion is a soft delete: records are flagged, never
/// removed.
pub struct ExpenseService {
    session: Session,
    store: Arc<dyn DocumentStore>,
}

impl ExpenseService {
    pub fn new(session: Session, store: Arc<dyn DocumentStore>) -> Self {
        Self { session, store }
    }

    fn collection(uid: &str) -> String {
        format!("users/{uid}/expenses")
    }

    fn require_uid(&self) -> Result<String, ExpenseError> {
        self.session.uid().ok_or(ExpenseError::NotSignedIn)
    }

    /// Map coded validation failures from the payload models onto the
    /// service error taxonomy
    fn validation_error(errors: &ValidationErrors) -> ExpenseError {
        let has_code = |code: &str| {
            errors
                .field_errors()
                .values()
                .flat_map(|field_errors| field_errors.iter())
                .any(|error| error.code == code)
        };

        if has_code("empty_description") {
            ExpenseError::EmptyDescription
        } else {
            ExpenseError::InvalidCost
        }
    }

    /// Fetch all non-deleted expenses for the current identity, ordered by
    /// date descending. An identity with no records yields an empty vec.
    pub async fn fetch_expenses(&self) -> Result<Vec<Expense>, ExpenseError> {
        let uid = self.require_uid()?;

        let filter = FieldFilter::equals("deleted", Value::Bool(false));
        let order = OrderBy::descending("date");
        let documents = self
            .store
            .query(&Self::collection(&uid), &filter, &order)
            .await?;

        documents
            .iter()
            .map(|document| Expense::decode(document).map_err(ExpenseError::from))
            .collect()
    }

    /// Create a new expense and return its backend-assigned id.
    ///
    /// The description is trimmed before persisting; `deleted` starts false
    /// and the creation timestamp is assigned server-side.
    pub async fn add_expense(&self, request: NewExpense) -> Result<String, ExpenseError> {
        let uid = self.require_uid()?;

        request
            .validate()
            .map_err(|e| Self::validation_error(&e))?;
        let description = request.description.trim();

        let mut fields = HashMap::new();
        fields.insert(
            "description".to_string(),
            WriteValue::Value(Value::from(description)),
        );
        fields.insert(
            "date".to_string(),
            WriteValue::Value(Value::from(request.date.to_string())),
        );
        fields.insert("cost".to_string(), WriteValue::Value(Value::from(request.cost)));
        fields.insert("deleted".to_string(), WriteValue::Value(Value::Bool(false)));
        fields.insert("created_at".to_string(), WriteValue::ServerTimestamp);

        let id = self.store.add(&Self::collection(&uid), fields).await?;
        debug!("added expense {id} for {uid}");
        Ok(id)
    }

    /// Apply a partial update to the expense identified by `id`. Only fields
    /// present in the update are written; absent fields are left untouched.
    pub async fn update_expense(&self, id: &str, update: ExpenseUpdate) -> Result<(), ExpenseError> {
        let uid = self.require_uid()?;

        update
            .validate()
            .map_err(|e| Self::validation_error(&e))?;

        let mut fields = HashMap::new();
        if let Some(description) = update.description {
            fields.insert(
                "description".to_string(),
                WriteValue::Value(Value::from(description.trim())),
            );
        }
        if let Some(date) = update.date {
            fields.insert(
                "date".to_string(),
                WriteValue::Value(Value::from(date.to_string())),
            );
        }
        if let Some(cost) = update.cost {
            fields.insert("cost".to_string(), WriteValue::Value(Value::from(cost)));
        }
        if let Some(deleted) = update.deleted {
            fields.insert("deleted".to_string(), WriteValue::Value(Value::Bool(deleted)));
        }

        if fields.is_empty() {
            return Ok(());
        }

        self.store.update(&Self::collection(&uid), id, fields).await?;
        debug!("updated expense {id} for {uid}");
        Ok(())
    }

    /// Soft-delete the expense identified by `id` by flipping its `deleted`
    /// flag. The record stays in storage.
    pub async fn delete_expense(&self, id: &str) -> Result<(), ExpenseError> {
        let uid = self.require_uid()?;

        let mut fields = HashMap::new();
        fields.insert("deleted".to_string(), WriteValue::Value(Value::Bool(true)));

        self.store.update(&Self::collection(&uid), id, fields).await?;
        debug!("soft-deleted expense {id} for {uid}");
        Ok(())
    }
}
