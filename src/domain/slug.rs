//! Group slugs: derivation from titles and the accepted character set.

use slug::slugify;
use thiserror::Error;

/// Suffixed variants tried after the bare slug before giving up.
pub const MAX_SLUG_SUFFIXES: u32 = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("cannot derive a slug from `{input}`")]
    Underivable { input: String },
    #[error("`{input}` is not a valid slug")]
    Invalid { input: String },
    #[error("no free slug left for `{base}`")]
    Exhausted { base: String },
}

/// Lowercased, hyphenated ASCII form of a title (`Cats & Dogs` becomes `cats-dogs`).
pub fn derive_slug(title: &str) -> Result<String, SlugError> {
    let candidate = slugify(title);
    if candidate.is_empty() {
        Err(SlugError::Underivable {
            input: title.to_string(),
        })
    } else {
        Ok(candidate)
    }
}

/// Letters, digits, underscores and hyphens only.
pub fn validate_slug(input: &str) -> Result<(), SlugError> {
    let valid = !input.is_empty()
        && input
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
    if valid {
        Ok(())
    } else {
        Err(SlugError::Invalid {
            input: input.to_string(),
        })
    }
}

/// `base`, then `base-2`, `base-3` and so on, in the order they should be tried.
pub fn slug_candidates(base: &str) -> impl Iterator<Item = String> + '_ {
    std::iter::once(base.to_string())
        .chain((2..=MAX_SLUG_SUFFIXES + 1).map(move |suffix| format!("{base}-{suffix}")))
}
