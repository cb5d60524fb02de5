//! Small helpers shared across the workspace.

use std::sync::OnceLock;

use regex::Regex;

/// Unquoted identifier, optionally qualified as `schema.table` or
/// `database.schema.table`.
fn table_identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*(\.[A-Za-z_][A-Za-z0-9_$]*){0,2}$")
            .expect("table identifier pattern is valid")
    })
}

/// Check a caller-supplied table name against the identifier allow-list.
///
/// Table names cannot be bound as statement parameters, so this is the only
/// guard when the name comes from untrusted input.
pub fn is_valid_table_identifier(name: &str) -> bool {
    table_identifier_re().is_match(name)
}

/// Mask a secret for log output, keeping only its length visible.
pub fn redact(secret: &str) -> String {
    "*".repeat(secret.chars().count().min(8))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_identifier_allow_list() {
        assert!(is_valid_table_identifier("PROMPTS"));
        assert!(is_valid_table_identifier("analytics.prompts"));
        assert!(is_valid_table_identifier("DB.PUBLIC.PROMPTS_V2"));
        assert!(!is_valid_table_identifier(""));
        assert!(!is_valid_table_identifier("a.b.c.d"));
        assert!(!is_valid_table_identifier("prompts; DROP TABLE x"));
        assert!(!is_valid_table_identifier("\"quoted\""));
        assert!(!is_valid_table_identifier("1prompts"));
    }

    #[test]
    fn test_redact() {
        assert_eq!(redact("abc"), "***");
        assert_eq!(redact("a-very-long-secret"), "********");
    }
}
