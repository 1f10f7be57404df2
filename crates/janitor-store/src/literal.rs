//! Literal type inference for custom filter rules.
//!
//! The comparison in a custom-rule clean must be type-correct, so the
//! operator-supplied value is tried as an integer, then as a GUID, and
//! otherwise treated as a generic quoted value.

use uuid::Uuid;

/// Inferred datastore type of a literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralType {
    Int,
    Guid,
    Variant,
}

impl LiteralType {
    /// Type name to use in a cast for the given dialect.
    pub fn sql_type(&self, dialect: &str) -> &'static str {
        match (dialect, self) {
            ("postgres", LiteralType::Int) => "integer",
            ("postgres", LiteralType::Guid) => "uuid",
            ("postgres", LiteralType::Variant) => "text",
            (_, LiteralType::Int) => "int",
            (_, LiteralType::Guid) => "uniqueidentifier",
            (_, LiteralType::Variant) => "sql_variant",
        }
    }
}

/// A literal ready for substitution into a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedLiteral {
    pub formatted: String,
    pub literal_type: LiteralType,
}

/// Wrap `value` in single quotes, doubling any embedded quote.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Infer the type of `value` and format it for a script.
///
/// Surrounding whitespace is ignored for every type.
pub fn parse_literal_type(value: &str) -> TypedLiteral {
    let trimmed = value.trim();
    if let Ok(number) = trimmed.parse::<i32>() {
        return TypedLiteral {
            formatted: number.to_string(),
            literal_type: LiteralType::Int,
        };
    }
    if Uuid::parse_str(trimmed).is_ok() {
        return TypedLiteral {
            formatted: quote_literal(trimmed),
            literal_type: LiteralType::Guid,
        };
    }
    TypedLiteral {
        formatted: quote_literal(trimmed),
        literal_type: LiteralType::Variant,
    }
}

/// True for a plain, optionally dotted, column identifier.
pub fn is_plain_identifier(column: &str) -> bool {
    let mut chars = column.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}
