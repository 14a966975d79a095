//! Short-code generation strategies and custom-code validation

pub mod random;
pub mod words;

use std::sync::Arc;
use thiserror::Error;

use crate::config::{ShortCodeConfig, ShortCodeStrategy};

pub use random::RandomCodeGenerator;
pub use words::WordCodeGenerator;

/// Path segments served by the application itself; never valid as codes
pub const RESERVED_CODES: &[&str] = &["api", "health"];

/// Produces candidate short codes. Uniqueness is enforced by the store, so a
/// generator only needs to make collisions unlikely.
pub trait CodeGenerator: Send + Sync {
    /// Produce a candidate code. `attempt` starts at 0 and increases each time
    /// the previous candidate collided, letting a strategy widen its space.
    fn generate(&self, attempt: u32) -> String;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidShortCode {
    #[error("Custom short code must be 1-{max} characters")]
    Length { max: usize },
    #[error("Custom short code may only contain letters, digits, '-' and '_'")]
    Charset,
    #[error("Custom short code '{0}' is reserved")]
    Reserved(String),
}

pub fn is_code_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// Check a caller-supplied short code against length, charset and reserved paths
pub fn validate_custom_code(code: &str, max_length: usize) -> Result<(), InvalidShortCode> {
    if code.is_empty() || code.chars().count() > max_length {
        return Err(InvalidShortCode::Length { max: max_length });
    }

    if !code.chars().all(is_code_char) {
        return Err(InvalidShortCode::Charset);
    }

    if is_reserved(code) {
        return Err(InvalidShortCode::Reserved(code.to_string()));
    }

    Ok(())
}

pub fn is_reserved(code: &str) -> bool {
    RESERVED_CODES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(code))
}

/// Build the generator selected by configuration
pub fn generator_for(config: &ShortCodeConfig) -> Arc<dyn CodeGenerator> {
    match config.strategy {
        ShortCodeStrategy::Random => Arc::new(RandomCodeGenerator::new(config.length)),
        ShortCodeStrategy::Words => Arc::new(WordCodeGenerator::new(config.length)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_letters_digits_hyphen_underscore() {
        assert!(validate_custom_code("my-Code_42", 50).is_ok());
        assert!(validate_custom_code("a", 1).is_ok());
    }

    #[test]
    fn rejects_bad_characters() {
        for code in ["has space", "slash/here", "dot.com", "ümlaut", "q?x=1"] {
            assert_eq!(
                validate_custom_code(code, 50),
                Err(InvalidShortCode::Charset),
                "{code} should be rejected"
            );
        }
    }

    #[test]
    fn enforces_length_bounds() {
        assert_eq!(
            validate_custom_code("", 5),
            Err(InvalidShortCode::Length { max: 5 })
        );
        assert_eq!(
            validate_custom_code("exceeds", 5),
            Err(InvalidShortCode::Length { max: 5 })
        );
        assert!(validate_custom_code("short", 5).is_ok());
    }

    #[test]
    fn rejects_reserved_paths_in_any_case() {
        assert!(matches!(
            validate_custom_code("api", 50),
            Err(InvalidShortCode::Reserved(_))
        ));
        assert!(matches!(
            validate_custom_code("Health", 50),
            Err(InvalidShortCode::Reserved(_))
        ));
    }

    #[test]
    fn generator_follows_configured_strategy() {
        let mut config = ShortCodeConfig {
            strategy: ShortCodeStrategy::Random,
            length: 8,
            max_length: 50,
            max_attempts: 10,
        };
        assert_eq!(generator_for(&config).name(), "random");

        config.strategy = ShortCodeStrategy::Words;
        assert_eq!(generator_for(&config).name(), "words");
    }
}
