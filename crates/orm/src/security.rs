//! SQL identifier safety for generated repository queries
//!
//! Table and column names come from relation declarations, not user input,
//! but they are still validated at repository construction and always
//! quoted when rendered.

use crate::error::{OrmError, OrmResult};

/// Characters allowed in SQL identifiers (alphanumeric, underscore, dollar)
const ALLOWED_IDENTIFIER_CHARS: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_$";

/// PostgreSQL identifier length limit
const MAX_IDENTIFIER_LEN: usize = 63;

/// Escape an identifier for PostgreSQL.
///
/// ```
/// use polymorphic_orm::security::escape_identifier;
///
/// assert_eq!(escape_identifier("entityType"), "\"entityType\"");
/// assert_eq!(escape_identifier("odd\"name"), "\"odd\"\"name\"");
/// ```
pub fn escape_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Validate that an identifier is safe to embed in generated SQL
pub fn validate_identifier(identifier: &str) -> OrmResult<()> {
    let Some(first) = identifier.chars().next() else {
        return Err(OrmError::Query("Identifier cannot be empty".to_string()));
    };

    if identifier.len() > MAX_IDENTIFIER_LEN {
        return Err(OrmError::Query(format!(
            "Identifier '{}' is too long (max {} characters)",
            identifier, MAX_IDENTIFIER_LEN
        )));
    }

    if let Some(c) = identifier.chars().find(|c| !ALLOWED_IDENTIFIER_CHARS.contains(*c)) {
        return Err(OrmError::Query(format!(
            "Identifier '{}' contains invalid character '{}'",
            identifier, c
        )));
    }

    if first.is_ascii_digit() {
        return Err(OrmError::Query(format!(
            "Identifier '{}' cannot start with a number",
            identifier
        )));
    }

    Ok(())
}
