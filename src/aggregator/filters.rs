/// Rich run filters applied on top of the upstream's raw pagination.
///
/// The upstream list endpoint only understands the completion flag;
/// text search and date ranges are applied here, after fetch.
use serde::{Deserialize, Serialize};

use crate::upstream::{TestRun, UpstreamRunFilters};

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunFilters {
    /// Case-insensitive substring match on the run name
    #[serde(default)]
    pub search: Option<String>,

    /// Inclusive lower bound on the normalized creation timestamp
    #[serde(default)]
    pub created_after: Option<i64>,

    /// Inclusive upper bound on the normalized creation timestamp
    #[serde(default)]
    pub created_before: Option<i64>,

    #[serde(default)]
    pub is_completed: Option<bool>,
}

impl RunFilters {
    /// Trim the search term and drop it when empty, so equivalent
    /// requests share a cache key.
    pub fn normalized(mut self) -> Self {
        self.search = self.search.and_then(|raw| {
            let trimmed = raw.trim().to_string();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed)
            }
        });
        self
    }

    /// The subset the upstream can apply server-side.
    pub fn upstream(&self) -> UpstreamRunFilters {
        UpstreamRunFilters {
            is_completed: self.is_completed,
        }
    }

    /// Apply the full filter set to one raw run.
    ///
    /// The completion flag is re-checked locally even though the
    /// upstream already filters on it; fake or misbehaving upstreams
    /// stay correct.
    pub fn matches(&self, run: &TestRun) -> bool {
        if let Some(search) = &self.search {
            if !run
                .name
                .to_lowercase()
                .contains(search.to_lowercase().as_str())
            {
                return false;
            }
        }

        if let Some(want) = self.is_completed {
            if run.is_completed != want {
                return false;
            }
        }

        if self.created_after.is_some() || self.created_before.is_some() {
            let created = run.created_on_epoch();
            if let Some(after) = self.created_after {
                if created < after {
                    return false;
                }
            }
            if let Some(before) = self.created_before {
                if created > before {
                    return false;
                }
            }
        }

        true
    }
}
