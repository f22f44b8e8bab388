use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use reviews_app::domain::ReviewsData;
use reviews_app::infrastructure::security::InputSanitizer;
use reviews_app::AppContext;
use reviews_errors::AppError;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tower_http::compression::CompressionLayer;
use tower_http::services::{ServeDir, ServeFile};

const DEFAULT_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_STATIC_DIR: &str = "static";

#[derive(Deserialize)]
struct ReviewsQuery {
    page: String,
}

struct ServerConfig {
    addr: SocketAddr,
    static_dir: PathBuf,
}

impl ServerConfig {
    fn from_env() -> Self {
        let addr = std::env::var("REVIEWS_ADDR")
            .ok()
            .and_then(|addr| match addr.parse::<SocketAddr>() {
                Ok(addr) => Some(addr),
                Err(e) => {
                    tracing::warn!("Ignoring invalid REVIEWS_ADDR {}: {}", addr, e);
                    None
                }
            })
            .unwrap_or_else(|| DEFAULT_ADDR.parse().expect("default address is valid"));

        let static_dir = std::env::var("REVIEWS_STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_STATIC_DIR));

        Self { addr, static_dir }
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = ServerConfig::from_env();

    // Load the sentiment model before accepting requests (downloads on first run)
    tracing::info!("Initializing sentiment model (this may take a while on first run)...");
    let app_context = match init_context().await {
        Ok(ctx) => {
            tracing::info!("Sentiment model ready!");
            ctx
        }
        Err(e) => {
            tracing::error!("Failed to initialize: {}", e);
            std::process::exit(1);
        }
    };

    let app = router(app_context, &config.static_dir);

    tracing::info!("Listening on http://{}", config.addr);
    tracing::info!("Serving static files from {}", config.static_dir.display());

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app.into_make_service())
        .await
        .expect("Server error");
}

#[cfg(all(feature = "headless", feature = "local-model"))]
async fn init_context() -> Result<AppContext, AppError> {
    AppContext::from_env().await
}

#[cfg(not(all(feature = "headless", feature = "local-model")))]
async fn init_context() -> Result<AppContext, AppError> {
    Err(AppError::ClassifierUnavailable(
        "built without the headless and local-model features".to_string(),
    ))
}

fn router(app_context: AppContext, static_dir: &Path) -> Router {
    Router::new()
        .route("/api/reviews", get(get_reviews))
        .route_service("/", ServeFile::new(static_dir.join("index.html")))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(CompressionLayer::new())
        .with_state(app_context)
}

async fn get_reviews(
    State(ctx): State<AppContext>,
    Query(query): Query<ReviewsQuery>,
) -> Result<Json<ReviewsData>, AppError> {
    let url = InputSanitizer::validate_url(&query.page)?;

    tracing::info!("Extracting reviews from {}", url);
    match ctx.extract_reviews.execute(url.clone()).await {
        Ok(data) => {
            tracing::info!("Extracted {} reviews from {}", data.reviews_count(), url);
            Ok(Json(data))
        }
        Err(e) => {
            tracing::error!("Error scraping reviews: {}", e);
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use reviews_app::infrastructure::render::{
        NodeHandle, RenderError, RenderSession, Renderer,
    };
    use reviews_app::infrastructure::sentiment::{ClassifierError, SentimentClassifier};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    struct StaticPage(&'static str);

    impl Renderer for StaticPage {
        fn launch(&self) -> Result<Box<dyn RenderSession>, RenderError> {
            Ok(Box::new(StaticSession(self.0)))
        }
    }

    struct StaticSession(&'static str);

    impl RenderSession for StaticSession {
        fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), RenderError> {
            if url.contains("slow") {
                return Err(RenderError::Timeout(timeout.as_millis() as u64));
            }
            if url.contains("broken") {
                return Err(RenderError::Navigation("net::ERR_FAILED".to_string()));
            }
            Ok(())
        }

        fn wait(&mut self, _duration: Duration) {}

        fn content(&self) -> Result<String, RenderError> {
            Ok(self.0.to_string())
        }

        fn query_all(&self, _selector: &str) -> Result<Vec<NodeHandle>, RenderError> {
            Ok(vec![NodeHandle(0)])
        }

        fn inner_text(&self, _node: &NodeHandle) -> Result<String, RenderError> {
            Ok("Solid blender, crushes ice easily".to_string())
        }

        fn query_descendant(
            &self,
            _node: &NodeHandle,
            _selectors: &[&str],
        ) -> Result<Option<NodeHandle>, RenderError> {
            Ok(None)
        }

        fn close(&mut self) -> Result<(), RenderError> {
            Ok(())
        }
    }

    struct FourStars;

    impl SentimentClassifier for FourStars {
        fn classify(&self, _text: &str) -> Result<String, ClassifierError> {
            Ok("4 stars".to_string())
        }
    }

    fn test_router() -> Router {
        let ctx = AppContext::new(
            Arc::new(StaticPage(r#"<div class="review-item">A review</div>"#)),
            Arc::new(FourStars),
        );
        router(ctx, Path::new("static"))
    }

    async fn request(uri: &str) -> (StatusCode, serde_json::Value) {
        let response = test_router()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn returns_reviews_as_json() {
        let (status, body) = request("/api/reviews?page=https%3A%2F%2Fshop.example.com%2Fblender").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["reviews_count"], 1);
        assert_eq!(body["reviews"][0]["rating"], 4);
        assert_eq!(body["reviews"][0]["reviewer"], "Anonymous");
        assert_eq!(body["reviews"][0]["title"], "Product Review");
    }

    #[tokio::test]
    async fn rejects_invalid_urls() {
        let (status, body) = request("/api/reviews?page=not-a-url").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn extraction_failures_are_server_errors() {
        let (status, body) = request("/api/reviews?page=https%3A%2F%2Fbroken.example.com").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["message"]
            .as_str()
            .unwrap()
            .contains("Failed to extract reviews"));
    }

    #[tokio::test]
    async fn navigation_timeouts_are_gateway_timeouts() {
        let (status, _) = request("/api/reviews?page=https%3A%2F%2Fslow.example.com").await;

        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    }

    #[cfg(not(all(feature = "headless", feature = "local-model")))]
    #[tokio::test]
    async fn init_without_backends_reports_unavailable_classifier() {
        match init_context().await {
            Err(AppError::ClassifierUnavailable(message)) => {
                assert!(message.contains("local-model"))
            }
            Err(other) => panic!("unexpected error {:?}", other),
            Ok(_) => panic!("context built without backends"),
        }
    }
}
