use validator::ValidationError;

/// Validates that a description is non-empty after trimming whitespace
pub fn validate_description(description: &str) -> Result<(), ValidationError> {
    if description.trim().is_empty() {
        let mut error = ValidationError::new("empty_description");
        error.message = Some("Description must not be empty".into());
        return Err(error);
    }
    Ok(())
}

/// Validates that a cost is a finite number greater than or equal to zero
pub fn validate_cost(cost: f64) -> Result<(), ValidationError> {
    if !cost.is_finite() || cost < 0.0 {
        let mut error = ValidationError::new("invalid_cost");
        error.message = Some("Cost must be a finite number of at least zero".into());
        return Err(error);
    }
    Ok(())
}
