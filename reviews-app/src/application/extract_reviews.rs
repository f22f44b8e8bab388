use crate::domain::{Review, ReviewsData};
use crate::infrastructure::render::{NodeHandle, RenderError, Renderer, ScopedSession};
use crate::infrastructure::scraper::SelectorDiscovery;
use crate::infrastructure::sentiment::{parse_star_rating, ClassifierError, SentimentClassifier};
use reviews_errors::AppError;
use std::sync::Arc;
use std::time::Duration;

const NAVIGATION_TIMEOUT_MS: u64 = 30_000;
const LAZY_CONTENT_GRACE_MS: u64 = 2_000;
const MIN_REVIEW_TEXT_LEN: usize = 10;
const REVIEWER_SELECTORS: &[&str] = &[".author", ".reviewer", ".user-name"];
const REVIEW_TITLE: &str = "Product Review";
const ANONYMOUS_REVIEWER: &str = "Anonymous";

#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub navigation_timeout: Duration,
    pub lazy_content_grace: Duration,
    pub min_text_len: usize,
    pub reviewer_selectors: Vec<String>,
    pub review_title: String,
    pub anonymous_reviewer: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_millis(NAVIGATION_TIMEOUT_MS),
            lazy_content_grace: Duration::from_millis(LAZY_CONTENT_GRACE_MS),
            min_text_len: MIN_REVIEW_TEXT_LEN,
            reviewer_selectors: REVIEWER_SELECTORS.iter().map(|s| s.to_string()).collect(),
            review_title: REVIEW_TITLE.to_string(),
            anonymous_reviewer: ANONYMOUS_REVIEWER.to_string(),
        }
    }
}

/// Failure that aborts a whole extraction before any reviews are produced.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("Failed to start browser session: {0}")]
    Session(#[source] RenderError),

    #[error("Failed to load {url}: {source}")]
    Navigation {
        url: String,
        #[source]
        source: RenderError,
    },

    #[error("Failed to read rendered page: {0}")]
    Page(#[source] RenderError),

    #[error("Failed to query review container {selector}: {source}")]
    Container {
        selector: String,
        #[source]
        source: RenderError,
    },

    #[error("Extraction task failed: {0}")]
    Task(String),
}

impl ExtractionError {
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Navigation {
                source: RenderError::Timeout(_),
                ..
            }
        )
    }
}

impl From<ExtractionError> for AppError {
    fn from(e: ExtractionError) -> Self {
        match e {
            e if e.is_timeout() => AppError::Timeout,
            ExtractionError::Task(message) => AppError::Internal(message),
            e => AppError::ExtractionFailed(e.to_string()),
        }
    }
}

/// Failure confined to one matched element; the element is dropped.
#[derive(Debug, thiserror::Error)]
enum ElementError {
    #[error("render: {0}")]
    Render(#[from] RenderError),

    #[error("classifier: {0}")]
    Classifier(#[from] ClassifierError),

    #[error("label {0:?} carries no star rating")]
    Rating(String),
}

#[derive(Clone)]
pub struct ExtractReviews {
    renderer: Arc<dyn Renderer>,
    classifier: Arc<dyn SentimentClassifier>,
    config: ExtractorConfig,
}

impl ExtractReviews {
    pub fn new(renderer: Arc<dyn Renderer>, classifier: Arc<dyn SentimentClassifier>) -> Self {
        Self::with_config(renderer, classifier, ExtractorConfig::default())
    }

    pub fn with_config(
        renderer: Arc<dyn Renderer>,
        classifier: Arc<dyn SentimentClassifier>,
        config: ExtractorConfig,
    ) -> Self {
        Self {
            renderer,
            classifier,
            config,
        }
    }

    pub async fn execute(&self, url: String) -> Result<ReviewsData, ExtractionError> {
        let pipeline = self.clone();

        // Browser calls and model inference both block.
        tokio::task::spawn_blocking(move || pipeline.extract(&url))
            .await
            .map_err(|e| ExtractionError::Task(e.to_string()))?
    }

    /// Blocking extraction of every review on the page at `url`.
    pub fn extract(&self, url: &str) -> Result<ReviewsData, ExtractionError> {
        let session = self.renderer.launch().map_err(ExtractionError::Session)?;
        let mut session = ScopedSession::new(session);

        session
            .navigate(url, self.config.navigation_timeout)
            .map_err(|source| ExtractionError::Navigation {
                url: url.to_string(),
                source,
            })?;

        session.wait(self.config.lazy_content_grace);

        let markup = session.content().map_err(ExtractionError::Page)?;
        let selectors = SelectorDiscovery::discover(&markup);

        let Some(container) = selectors.container else {
            tracing::warn!("No review selectors found for {}", url);
            return Ok(ReviewsData::empty());
        };

        let elements = session
            .query_all(&container)
            .map_err(|source| ExtractionError::Container {
                selector: container.clone(),
                source,
            })?;

        tracing::info!(
            "Found {} candidate review elements for {} using {}",
            elements.len(),
            url,
            container
        );

        let mut reviews = Vec::new();
        for element in &elements {
            match self.extract_review(&session, element) {
                Ok(Some(review)) => reviews.push(review),
                Ok(None) => {}
                Err(e) => tracing::error!("Error processing review element: {}", e),
            }
        }

        session.release();

        if reviews.is_empty() {
            tracing::warn!("No reviews found for {}", url);
        }

        Ok(ReviewsData::new(reviews))
    }

    fn extract_review(
        &self,
        session: &ScopedSession,
        element: &NodeHandle,
    ) -> Result<Option<Review>, ElementError> {
        let text = session.inner_text(element)?;
        if text.trim().chars().count() < self.config.min_text_len {
            tracing::debug!("Skipping short review element {:?}", element);
            return Ok(None);
        }

        let label = self.classifier.classify(&text)?;
        let rating = parse_star_rating(&label).ok_or(ElementError::Rating(label))?;

        let reviewer_selectors: Vec<&str> =
            self.config.reviewer_selectors.iter().map(String::as_str).collect();
        let reviewer = match session.query_descendant(element, &reviewer_selectors)? {
            Some(node) => session.inner_text(&node)?,
            None => self.config.anonymous_reviewer.clone(),
        };

        Ok(Some(
            Review::new()
                .with_title(Some(self.config.review_title.clone()))
                .with_body(Some(text))
                .with_rating(Some(rating))
                .with_reviewer(Some(reviewer)),
        ))
    }
}
