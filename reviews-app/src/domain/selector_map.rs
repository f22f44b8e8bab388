use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorMap {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
}

impl SelectorMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_container(mut self, container: Option<String>) -> Self {
        self.container = container;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.container.is_none()
    }
}
