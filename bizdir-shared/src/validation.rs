/// Field validators shared by the engine DTOs
///
/// Used through `#[validate(custom(function = "..."))]` on the create/update
/// structs in `models`, so the API and direct library callers reject the same
/// input.

use std::collections::BTreeMap;
use validator::ValidationError;

/// Prefix of plan feature keys that act as resource limits
pub const LIMIT_PREFIX: &str = "max_";

/// `resource:action`, lowercase letters, digits, `_` and `-`, exactly one `:`
pub fn validate_permission_name(name: &str) -> Result<(), ValidationError> {
    let mut parts = name.split(':');
    let (Some(resource), Some(action), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid("permission_name", "must look like resource:action"));
    };

    if !is_name_segment(resource) || !is_name_segment(action) {
        return Err(invalid(
            "permission_name",
            "segments use lowercase letters, digits, '_' and '-'",
        ));
    }

    Ok(())
}

/// Lowercase identifier `[a-z][a-z0-9_]*`, at most 64 bytes
pub fn validate_resource_type(resource_type: &str) -> Result<(), ValidationError> {
    let mut chars = resource_type.chars();
    let starts_with_letter = chars.next().map_or(false, |c| c.is_ascii_lowercase());

    if resource_type.len() > 64
        || !starts_with_letter
        || !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(invalid(
            "resource_type",
            "must be a lowercase identifier such as 'products'",
        ));
    }

    Ok(())
}

/// Three uppercase ASCII letters (ISO 4217 shape)
pub fn validate_currency(code: &str) -> Result<(), ValidationError> {
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase()) {
        Ok(())
    } else {
        Err(invalid("currency", "must be a three-letter code such as 'USD'"))
    }
}

/// Rejects names that are empty after trimming
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(invalid("blank", "must not be blank"))
    } else {
        Ok(())
    }
}

/// Plan feature map: lowercase identifier keys, non-negative values
pub fn validate_features(features: &BTreeMap<String, i64>) -> Result<(), ValidationError> {
    for (key, value) in features {
        if validate_resource_type(key).is_err() {
            return Err(invalid("feature_key", "feature names must be lowercase identifiers"));
        }
        if *value < 0 {
            return Err(invalid("feature_value", "feature limits must not be negative"));
        }
    }
    Ok(())
}

/// Plan module list: lowercase identifiers
pub fn validate_modules(modules: &[String]) -> Result<(), ValidationError> {
    if modules.iter().all(|m| validate_resource_type(m).is_ok()) {
        Ok(())
    } else {
        Err(invalid("module", "module names must be lowercase identifiers"))
    }
}

fn is_name_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_names() {
        assert!(validate_permission_name("users:create").is_ok());
        assert!(validate_permission_name("customer_types:manage").is_ok());
        assert!(validate_permission_name("blog-posts:publish").is_ok());

        assert!(validate_permission_name("users").is_err());
        assert!(validate_permission_name("users:create:all").is_err());
        assert!(validate_permission_name("Users:Create").is_err());
        assert!(validate_permission_name(":create").is_err());
        assert!(validate_permission_name("users:").is_err());
        assert!(validate_permission_name("users :create").is_err());
    }

    #[test]
    fn test_resource_types() {
        assert!(validate_resource_type("products").is_ok());
        assert!(validate_resource_type("team_members").is_ok());
        assert!(validate_resource_type("v2_items").is_ok());

        assert!(validate_resource_type("").is_err());
        assert!(validate_resource_type("2fast").is_err());
        assert!(validate_resource_type("Products").is_err());
        assert!(validate_resource_type("blog-posts").is_err());
        assert!(validate_resource_type(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_currency() {
        assert!(validate_currency("USD").is_ok());
        assert!(validate_currency("usd").is_err());
        assert!(validate_currency("US").is_err());
        assert!(validate_currency("EURO").is_err());
    }

    #[test]
    fn test_features() {
        let mut features = BTreeMap::new();
        features.insert("max_products".to_string(), 10);
        features.insert("max_services".to_string(), 0);
        assert!(validate_features(&features).is_ok());

        features.insert("Max Blog".to_string(), 3);
        assert!(validate_features(&features).is_err());

        let mut negative = BTreeMap::new();
        negative.insert("max_products".to_string(), -1);
        assert!(validate_features(&negative).is_err());
    }

    #[test]
    fn test_modules() {
        assert!(validate_modules(&["blog".to_string(), "careers".to_string()]).is_ok());
        assert!(validate_modules(&["Blog".to_string()]).is_err());
    }

    #[test]
    fn test_not_blank() {
        assert!(validate_not_blank("Retail").is_ok());
        assert!(validate_not_blank("   ").is_err());
    }
}
