mod extract_reviews;

pub use extract_reviews::{ExtractReviews, ExtractionError, ExtractorConfig};
