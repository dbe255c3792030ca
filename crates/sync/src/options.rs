use serde::{Deserialize, Serialize};

use liveops_core::Config;
use liveops_views::{DateRange, StatusFilter, ViewFilter};

/// Consumer-supplied view options. Everything is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewOptions {
    /// Raw search input; committed after the debounce period.
    pub search: String,
    pub date_range: Option<DateRange>,
    /// Status label, `"all"`, or absent.
    pub status: Option<String>,
    pub include_past: bool,
    /// Overrides the configured page size for both job queries.
    pub page_size: Option<usize>,
}

impl ViewOptions {
    pub fn effective_page_size(&self, config: &Config) -> usize {
        self.page_size.unwrap_or(config.sync.page_size).max(1)
    }

    /// Build the view filter for an already-committed search value.
    pub fn to_filter(&self, committed_search: String, config: &Config) -> ViewFilter {
        ViewFilter {
            search: committed_search,
            date_range: self.date_range,
            status: StatusFilter::from_option(self.status.as_deref()),
            include_past: self.include_past,
            ..ViewFilter::default()
        }
        .with_retention_hours(config.views.retention_hours)
    }
}
