use crate::domain::SelectorMap;
use scraper::{ElementRef, Html, Selector};

const CONTAINER_TAGS: &str = "div, section, article";

const REVIEW_KEYWORDS: &[&str] = &["review", "rating", "comment", "testimonial"];

/// Guesses the selector of the repeating review container in rendered markup.
///
/// Walks `div`, `section` and `article` elements in document order and stops
/// at the first one whose class list or text mentions a review keyword and
/// that can be addressed by class or id. Never fails; no match gives an empty
/// map.
pub struct SelectorDiscovery;

impl SelectorDiscovery {
    pub fn discover(markup: &str) -> SelectorMap {
        let document = Html::parse_document(markup);
        let Ok(selector) = Selector::parse(CONTAINER_TAGS) else {
            return SelectorMap::new();
        };

        for element in document.select(&selector) {
            if !Self::mentions_review(&element) {
                continue;
            }

            if let Some(container) = Self::container_selector(&element) {
                tracing::debug!("Discovered review container {}", container);
                return SelectorMap::new().with_container(Some(container));
            }
        }

        SelectorMap::new()
    }

    fn mentions_review(element: &ElementRef<'_>) -> bool {
        let classes = Self::class_tokens(element).join(" ").to_lowercase();
        let text = element.text().collect::<String>().to_lowercase();

        REVIEW_KEYWORDS
            .iter()
            .any(|keyword| classes.contains(keyword) || text.contains(keyword))
    }

    // Matches on text alone with no class and no id yield nothing here and
    // the walk moves on.
    fn container_selector(element: &ElementRef<'_>) -> Option<String> {
        let classes = Self::class_tokens(element);
        if !classes.is_empty() {
            return Some(format!(".{}", classes.join(".")));
        }

        element
            .value()
            .attr("id")
            .filter(|id| !id.is_empty())
            .map(|id| format!("#{}", id))
    }

    fn class_tokens<'a>(element: &ElementRef<'a>) -> Vec<&'a str> {
        element
            .value()
            .attr("class")
            .map(|value| value.split_ascii_whitespace().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container(markup: &str) -> Option<String> {
        SelectorDiscovery::discover(markup).container
    }

    #[test]
    fn no_keywords_gives_empty_map() {
        let markup = r#"
            <html><body>
                <div class="header"><h1>Acme Kettle</h1></div>
                <section id="specs"><p>1.7 litres, stainless steel</p></section>
                <article class="description">Boils water quickly.</article>
            </body></html>
        "#;
        assert!(SelectorDiscovery::discover(markup).is_empty());
    }

    #[test]
    fn compound_class_selector_keeps_order_and_case() {
        let markup = r#"
            <html><body>
                <div class="review-box active"><p>Great kettle</p></div>
                <div class="review-box"><p>Too loud</p></div>
            </body></html>
        "#;
        assert_eq!(container(markup).as_deref(), Some(".review-box.active"));

        let markup = r#"<div class="Card  ReviewItem"><p>ok</p></div>"#;
        assert_eq!(container(markup).as_deref(), Some(".Card.ReviewItem"));
    }

    #[test]
    fn falls_back_to_id_without_classes() {
        let markup = r#"
            <html><body>
                <section id="reviews"><p>Customer reviews</p></section>
            </body></html>
        "#;
        assert_eq!(container(markup).as_deref(), Some("#reviews"));
    }

    #[test]
    fn first_match_in_document_order_wins() {
        // The wrapper mentions "rating" in its text and has a class, so it
        // wins over the better-looking inner container.
        let markup = r#"
            <html><body>
                <div class="page">
                    <span>Average rating: 4.2</span>
                    <div class="review-card">Nice</div>
                </div>
            </body></html>
        "#;
        assert_eq!(container(markup).as_deref(), Some(".page"));
    }

    #[test]
    fn text_only_match_without_class_or_id_is_skipped() {
        let markup = r#"
            <html><body>
                <div>
                    <h2>Testimonials</h2>
                    <div class="testimonial-item">Loved it</div>
                </div>
            </body></html>
        "#;
        assert_eq!(container(markup).as_deref(), Some(".testimonial-item"));

        let markup = r#"<html><body><div><p>Leave a comment</p></div></body></html>"#;
        assert!(container(markup).is_none());
    }

    #[test]
    fn matches_keywords_case_insensitively() {
        let markup = r#"<article id="feedback"><h2>TESTIMONIALS</h2></article>"#;
        assert_eq!(container(markup).as_deref(), Some("#feedback"));

        let markup = r#"<div class="UserComments"></div>"#;
        assert_eq!(container(markup).as_deref(), Some(".UserComments"));
    }

    #[test]
    fn ignores_non_container_tags() {
        let markup = r#"
            <html><body>
                <ul class="reviews"><li>Good</li></ul>
                <span class="rating">5</span>
            </body></html>
        "#;
        assert!(container(markup).is_none());
    }

    #[test]
    fn empty_id_does_not_count() {
        let markup = r#"<div id="" class=""><p>No reviews yet</p></div>"#;
        assert!(container(markup).is_none());
    }

    #[test]
    fn tolerates_malformed_markup() {
        let markup = r#"<div class="comment-list"><p>unclosed <b>tags<div>"#;
        assert_eq!(container(markup).as_deref(), Some(".comment-list"));
        assert!(SelectorDiscovery::discover("").is_empty());
    }
}
