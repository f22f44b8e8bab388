#[cfg(feature = "local-model")]
mod model;

#[cfg(feature = "local-model")]
pub use model::BertSentimentClassifier;

/// Maps free text to a short label whose leading token is a star count,
/// e.g. `"4 stars"`. Implementations are shared read-only across requests.
pub trait SentimentClassifier: Send + Sync {
    fn classify(&self, text: &str) -> Result<String, ClassifierError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassifierError {
    #[error("Hugging Face Hub error: {0}")]
    HfHub(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("Model error: {0}")]
    Model(String),
}

/// Reads the star rating from a classifier label.
///
/// The first whitespace-separated token is parsed as a number and truncated,
/// so `"5 stars"` and `"4.0 stars"` both work. Anything outside 1..=5 is
/// rejected.
pub fn parse_star_rating(label: &str) -> Option<u8> {
    let leading = label.split_whitespace().next()?;
    let value: f64 = leading.parse().ok()?;
    if !value.is_finite() {
        return None;
    }

    let stars = value.trunc();
    if (1.0..=5.0).contains(&stars) {
        Some(stars as u8)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_leading_numeral() {
        assert_eq!(parse_star_rating("5 stars"), Some(5));
        assert_eq!(parse_star_rating("1 star"), Some(1));
        assert_eq!(parse_star_rating("  3 stars"), Some(3));
        assert_eq!(parse_star_rating("4.0 stars"), Some(4));
    }

    #[test]
    fn rejects_labels_without_star_count() {
        assert_eq!(parse_star_rating(""), None);
        assert_eq!(parse_star_rating("POSITIVE"), None);
        assert_eq!(parse_star_rating("0 stars"), None);
        assert_eq!(parse_star_rating("7 stars"), None);
        assert_eq!(parse_star_rating("NaN stars"), None);
    }
}
