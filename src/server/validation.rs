use crate::server::response::ApiError;

const MAX_SCRIPT_NAME_LEN: usize = 63;

fn is_valid_name_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_'
}

fn validate_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Script name cannot be empty".to_string());
    }
    if name.len() > MAX_SCRIPT_NAME_LEN {
        return Err(format!(
            "Script name cannot exceed {MAX_SCRIPT_NAME_LEN} characters"
        ));
    }
    if !name.chars().all(is_valid_name_char) {
        return Err(
            "Script name can only contain lowercase letters, digits, hyphens, and underscores"
                .to_string(),
        );
    }
    if name.starts_with('-') || name.starts_with('_') {
        return Err("Script name cannot start with a hyphen or underscore".to_string());
    }
    Ok(())
}

pub fn validate_script_name(name: &str) -> Result<(), ApiError> {
    validate_name(name).map_err(ApiError::bad_request)
}
