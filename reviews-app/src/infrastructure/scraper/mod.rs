mod selector_discovery;

pub use selector_discovery::SelectorDiscovery;
