//! Validated value types shared across the NAMASTE crates.
//!
//! Clinician input arrives as loosely-typed text. These wrappers are constructed once at the
//! boundary so downstream code never re-checks emptiness or numeric ranges.

/// Errors that can occur when creating validated value types.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,

    /// The confidence value was outside `0.0..=1.0` or not a finite number
    #[error("Confidence must be a finite number between 0 and 1, got {0}")]
    ConfidenceOutOfRange(f64),
}

/// A string type that guarantees non-empty content.
///
/// This type wraps a `String` and ensures it contains at least one non-whitespace character.
/// The input is automatically trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// The input is trimmed of leading and trailing whitespace. If the trimmed
    /// result is empty, an error is returned.
    ///
    /// # Errors
    ///
    /// Returns `Err(TextError::Empty)` if the input is empty or contains only whitespace.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the wrapper and returns the owned string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

/// Mapping confidence in the closed interval `[0, 1]`.
///
/// NaN and infinities are rejected, so `Confidence` has a total order and can be compared
/// directly when ranking mappings.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Confidence(f64);

impl Confidence {
    /// Validates and wraps a confidence value.
    ///
    /// # Errors
    ///
    /// Returns [`TextError::ConfidenceOutOfRange`] for values outside `0.0..=1.0` or non-finite
    /// values.
    pub fn new(value: f64) -> Result<Self, TextError> {
        if value.is_finite() && (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(TextError::ConfidenceOutOfRange(value))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Total ordering, highest confidence first.
    pub fn cmp_desc(&self, other: &Self) -> std::cmp::Ordering {
        other.0.total_cmp(&self.0)
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl serde::Serialize for Confidence {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_f64(self.0)
    }
}

impl<'de> serde::Deserialize<'de> for Confidence {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        Confidence::new(value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_text_trims_input() {
        let text = NonEmptyText::new("  Vata imbalance \n").expect("valid text");
        assert_eq!(text.as_str(), "Vata imbalance");
    }

    #[test]
    fn non_empty_text_rejects_whitespace() {
        assert_eq!(NonEmptyText::new("   \t"), Err(TextError::Empty));
        assert_eq!(NonEmptyText::new(""), Err(TextError::Empty));
    }

    #[test]
    fn non_empty_text_deserialize_rejects_blank() {
        let err = serde_json::from_str::<NonEmptyText>("\"  \"").expect_err("blank rejected");
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn confidence_accepts_bounds() {
        assert_eq!(Confidence::new(0.0).expect("zero").value(), 0.0);
        assert_eq!(Confidence::new(1.0).expect("one").value(), 1.0);
    }

    #[test]
    fn confidence_rejects_out_of_range_and_nan() {
        assert!(Confidence::new(1.01).is_err());
        assert!(Confidence::new(-0.1).is_err());
        assert!(Confidence::new(f64::NAN).is_err());
        assert!(Confidence::new(f64::INFINITY).is_err());
    }

    #[test]
    fn confidence_orders_descending() {
        let mut values = vec![
            Confidence::new(0.4).unwrap(),
            Confidence::new(0.95).unwrap(),
            Confidence::new(0.7).unwrap(),
        ];
        values.sort_by(Confidence::cmp_desc);
        let raw: Vec<f64> = values.into_iter().map(Confidence::value).collect();
        assert_eq!(raw, vec![0.95, 0.7, 0.4]);
    }

    #[test]
    fn confidence_deserialize_validates_range() {
        assert!(serde_json::from_str::<Confidence>("0.5").is_ok());
        assert!(serde_json::from_str::<Confidence>("1.5").is_err());
    }
}
