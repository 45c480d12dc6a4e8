use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::services::PageRequest;

/// Pagination parameters for list operations. `limit` is accepted as an
/// alias of `per_page`.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct PaginationParams {
    pub page: Option<u64>,
    #[serde(alias = "limit")]
    pub per_page: Option<u64>,
}

impl PaginationParams {
    /// Applies the configured default and ceiling.
    pub fn to_request(&self, config: &AppConfig) -> PageRequest {
        let per_page = self
            .per_page
            .unwrap_or(config.default_page_size)
            .clamp(1, config.max_page_size.max(1));
        PageRequest::new(self.page.unwrap_or(1), per_page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppConfig {
        AppConfig::new(
            "sqlite::memory:".into(),
            "unused".into(),
            3600,
            "127.0.0.1".into(),
            8080,
            "development".into(),
        )
    }

    #[test]
    fn defaults_and_ceiling_come_from_config() {
        let cfg = config();
        let req = PaginationParams::default().to_request(&cfg);
        assert_eq!(req.page, 1);
        assert_eq!(req.per_page, cfg.default_page_size);

        let huge = PaginationParams {
            page: Some(3),
            per_page: Some(10_000),
        }
        .to_request(&cfg);
        assert_eq!(huge.page, 3);
        assert_eq!(huge.per_page, cfg.max_page_size);
    }
}
