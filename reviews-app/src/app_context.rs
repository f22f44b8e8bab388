use crate::application::ExtractReviews;
use crate::infrastructure::render::Renderer;
use crate::infrastructure::sentiment::SentimentClassifier;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppContext {
    pub extract_reviews: Arc<ExtractReviews>,
}

impl AppContext {
    pub fn new(renderer: Arc<dyn Renderer>, classifier: Arc<dyn SentimentClassifier>) -> Self {
        Self {
            extract_reviews: Arc::new(ExtractReviews::new(renderer, classifier)),
        }
    }

    /// Headless Chrome plus the shared sentiment model, loading the model on
    /// first use.
    #[cfg(all(feature = "headless", feature = "local-model"))]
    pub async fn from_env() -> Result<Self, reviews_errors::AppError> {
        use crate::infrastructure::render::ChromeRenderer;
        use crate::infrastructure::sentiment::BertSentimentClassifier;

        let classifier = BertSentimentClassifier::get_or_init()
            .await
            .map_err(|e| reviews_errors::AppError::ClassifierUnavailable(e.to_string()))?;
        tracing::info!("Using headless Chrome renderer");

        Ok(Self::new(Arc::new(ChromeRenderer::from_env()), classifier))
    }
}
