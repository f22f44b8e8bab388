mod review;
mod reviews_data;
mod selector_map;

pub use review::Review;
pub use reviews_data::ReviewsData;
pub use selector_map::SelectorMap;
