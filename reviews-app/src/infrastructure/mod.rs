pub mod render;
pub mod scraper;
pub mod security;
pub mod sentiment;
