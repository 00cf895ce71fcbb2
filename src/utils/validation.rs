use crate::utils::error::{OatmealError, Result};

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(OatmealError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(OatmealError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_required_field<'a, T>(field_name: &str, value: &'a Option<T>) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| OatmealError::MissingConfigError {
        field: field_name.to_string(),
    })
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(OatmealError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_path() {
        assert!(validate_path("schema", "schema.toml").is_ok());
        assert!(validate_path("schema", "").is_err());
        assert!(validate_path("schema", "bad\0path").is_err());
    }

    #[test]
    fn test_validate_required_field() {
        let present = Some("User".to_string());
        assert_eq!(validate_required_field("model", &present).unwrap().as_str(), "User");

        let missing: Option<String> = None;
        assert!(matches!(
            validate_required_field("model", &missing),
            Err(OatmealError::MissingConfigError { .. })
        ));
    }

    #[test]
    fn test_validate_non_empty_string() {
        assert!(validate_non_empty_string("models.name", "User").is_ok());
        assert!(validate_non_empty_string("models.name", "   ").is_err());
    }
}
