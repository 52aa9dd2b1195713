//! URL slug type used for public merchant pages.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Slug`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SlugError {
    /// The input string is empty.
    #[error("slug cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("slug must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains a character outside `[a-z0-9-]`.
    #[error("slug may only contain lowercase letters, digits and hyphens")]
    InvalidCharacter,
    /// The input starts or ends with a hyphen, or has two in a row.
    #[error("slug hyphens must separate words")]
    MisplacedHyphen,
}

/// A merchant slug, e.g. `corner-cafe`.
///
/// ## Constraints
///
/// - Length: 1-64 characters
/// - Lowercase ASCII letters, digits and hyphens only
/// - No leading, trailing or doubled hyphens
///
/// ## Examples
///
/// ```
/// use queuehub_core::Slug;
///
/// assert!(Slug::parse("corner-cafe").is_ok());
/// assert!(Slug::parse("-cafe").is_err());
/// assert_eq!(Slug::from_name("Joe's Barber Shop!").unwrap().as_str(), "joe-s-barber-shop");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Slug(String);

impl Slug {
    /// Maximum length of a slug.
    pub const MAX_LENGTH: usize = 64;

    /// Parse a `Slug` from a string.
    ///
    /// # Errors
    ///
    /// Returns a [`SlugError`] describing the first violated constraint.
    pub fn parse(s: &str) -> Result<Self, SlugError> {
        if s.is_empty() {
            return Err(SlugError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(SlugError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(SlugError::InvalidCharacter);
        }
        if s.starts_with('-') || s.ends_with('-') || s.contains("--") {
            return Err(SlugError::MisplacedHyphen);
        }
        Ok(Self(s.to_owned()))
    }

    /// Derive a slug from a free-form business name.
    ///
    /// Runs of non-alphanumeric characters collapse into a single hyphen and
    /// the result is truncated to [`Self::MAX_LENGTH`].
    ///
    /// # Errors
    ///
    /// Returns `SlugError::Empty` if the name has no ASCII alphanumerics.
    pub fn from_name(name: &str) -> Result<Self, SlugError> {
        let mut out = String::with_capacity(name.len());
        for c in name.chars() {
            if c.is_ascii_alphanumeric() {
                out.push(c.to_ascii_lowercase());
            } else if !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
        }
        out.truncate(Self::MAX_LENGTH);
        while out.ends_with('-') {
            out.pop();
        }
        Self::parse(&out)
    }

    /// Returns a copy of this slug with a numeric suffix, e.g. `cafe-2`.
    #[must_use]
    pub fn with_suffix(&self, n: u32) -> Self {
        let suffix = format!("-{n}");
        let mut base = self.0.clone();
        base.truncate(Self::MAX_LENGTH.saturating_sub(suffix.len()));
        while base.ends_with('-') {
            base.pop();
        }
        Self(format!("{base}{suffix}"))
    }

    /// Returns the slug as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Slug {
    type Error = SlugError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Slug> for String {
    fn from(slug: Slug) -> Self {
        slug.0
    }
}

impl std::str::FromStr for Slug {
    type Err = SlugError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Slug {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Slug {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::parse(&s)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Slug {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        assert!(Slug::parse("cafe").is_ok());
        assert!(Slug::parse("corner-cafe-2").is_ok());
    }

    #[test]
    fn test_parse_invalid() {
        assert_eq!(Slug::parse(""), Err(SlugError::Empty));
        assert_eq!(Slug::parse("Cafe"), Err(SlugError::InvalidCharacter));
        assert_eq!(Slug::parse("cafe--bar"), Err(SlugError::MisplacedHyphen));
        assert_eq!(Slug::parse("cafe-"), Err(SlugError::MisplacedHyphen));
        assert!(matches!(
            Slug::parse(&"a".repeat(65)),
            Err(SlugError::TooLong { .. })
        ));
    }

    #[test]
    fn test_from_name_collapses_separators() {
        let slug = Slug::from_name("  The Corner   Café & Bar ").unwrap();
        assert_eq!(slug.as_str(), "the-corner-caf-bar");
    }

    #[test]
    fn test_from_name_without_alphanumerics() {
        assert_eq!(Slug::from_name("!!!"), Err(SlugError::Empty));
    }

    #[test]
    fn test_with_suffix_respects_max_length() {
        let slug = Slug::parse(&"a".repeat(64)).unwrap();
        let suffixed = slug.with_suffix(12);
        assert_eq!(suffixed.as_str().len(), 64);
        assert!(suffixed.as_str().ends_with("-12"));
        assert!(Slug::parse(suffixed.as_str()).is_ok());
    }

    #[test]
    fn test_serde_rejects_invalid() {
        assert!(serde_json::from_str::<Slug>("\"Not Valid\"").is_err());
        let slug: Slug = serde_json::from_str("\"ok-slug\"").unwrap();
        assert_eq!(slug.as_str(), "ok-slug");
    }
}
