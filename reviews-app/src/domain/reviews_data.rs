use super::Review;
use serde::{Deserialize, Serialize};

/// Result of one extraction call.
///
/// `reviews_count` is always derived from `reviews`, so the two can never
/// disagree; payloads that claim otherwise are rejected on deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawReviewsData")]
pub struct ReviewsData {
    reviews_count: usize,
    reviews: Vec<Review>,
}

impl ReviewsData {
    pub fn new(reviews: Vec<Review>) -> Self {
        Self {
            reviews_count: reviews.len(),
            reviews,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn reviews_count(&self) -> usize {
        self.reviews_count
    }

    pub fn reviews(&self) -> &[Review] {
        &self.reviews
    }
}

#[derive(Deserialize)]
struct RawReviewsData {
    reviews_count: usize,
    reviews: Vec<Review>,
}

impl TryFrom<RawReviewsData> for ReviewsData {
    type Error = String;

    fn try_from(raw: RawReviewsData) -> Result<Self, Self::Error> {
        if raw.reviews_count != raw.reviews.len() {
            return Err(format!(
                "reviews_count is {} but {} reviews were supplied",
                raw.reviews_count,
                raw.reviews.len()
            ));
        }
        Ok(Self::new(raw.reviews))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_follows_reviews() {
        let data = ReviewsData::new(vec![Review::new(), Review::new()]);
        assert_eq!(data.reviews_count(), 2);
        assert_eq!(data.reviews().len(), 2);

        let empty = ReviewsData::empty();
        assert_eq!(empty.reviews_count(), 0);
        assert!(empty.reviews().is_empty());
    }

    #[test]
    fn serializes_to_output_shape() {
        let data = ReviewsData::new(vec![Review::new()
            .with_title(Some("Product Review".to_string()))
            .with_body(Some("Works as advertised".to_string()))
            .with_rating(Some(4))
            .with_reviewer(None)]);

        let value = serde_json::to_value(&data).unwrap();
        assert_eq!(value["reviews_count"], 1);
        assert_eq!(value["reviews"][0]["title"], "Product Review");
        assert_eq!(value["reviews"][0]["rating"], 4);
        assert!(value["reviews"][0]["reviewer"].is_null());
    }

    #[test]
    fn rejects_mismatched_count() {
        let json = r#"{"reviews_count": 3, "reviews": []}"#;
        assert!(serde_json::from_str::<ReviewsData>(json).is_err());

        let json = r#"{"reviews_count": 0, "reviews": []}"#;
        let data: ReviewsData = serde_json::from_str(json).unwrap();
        assert_eq!(data, ReviewsData::empty());
    }
}
