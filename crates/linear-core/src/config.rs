use thiserror::Error;

/// Largest page Linear will serve for a connection query.
pub const MAX_PAGE_SIZE: usize = 250;
pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const DEFAULT_MAX_IN_FLIGHT: usize = 8;

/// Tunables for a sync cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Issues requested per page while enumerating.
    pub page_size: usize,
    /// Upper bound on concurrently dispatched label mutations.
    pub max_in_flight: usize,
    /// Fixed label ids to apply; empty means each issue is labelled with its own id.
    pub label_ids: Vec<String>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            label_ids: Vec::new(),
        }
    }
}

impl SyncSettings {
    pub fn new(
        page_size: usize,
        max_in_flight: usize,
        label_ids: Vec<String>,
    ) -> Result<Self, ConfigError> {
        let settings = Self {
            page_size,
            max_in_flight,
            label_ids: label_ids
                .into_iter()
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .collect(),
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::PageSize(self.page_size));
        }
        if self.max_in_flight == 0 {
            return Err(ConfigError::MaxInFlight);
        }
        Ok(())
    }
}

/// Errors describing an unusable sync configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("page size must be between 1 and {MAX_PAGE_SIZE}, got {0}")]
    PageSize(usize),
    #[error("max in-flight mutations must be at least 1")]
    MaxInFlight,
}
