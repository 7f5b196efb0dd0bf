use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

use crate::error::AppError;

pub mod library;
pub mod record;
pub mod report;
pub mod request;

pub use library::{
    AddItemSpec, AddedItem, CollectionRef, DownloadItem, ItemRef, LibraryItem, LibrarySection,
    VoteStats,
};
pub use record::{
    BootstrapMarker, CuratedCollectionSnapshot, DownloadApproval, RecommendationRecord, RecommendationStatus,
    RecordFilter, RejectedSuggestion, ResetMarker, Suggestion,
};
pub use report::{
    ActivationSummary, DownloadSummary, Issue, LedgerSummary, LibraryReport, ReconcileSummary,
    RunMode, RunReport, RunStatus, ScopeStatus, Severity, UserReport,
};
pub use request::{RunRequest, SuggestionBatch};

/// Kind of media a recommendation refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Show,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Show => "show",
        }
    }

    /// Catalog the external ids of this kind come from
    pub fn external_source(&self) -> &'static str {
        "tmdb"
    }
}

impl Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "movie" | "movies" => Ok(MediaKind::Movie),
            "show" | "shows" | "tv" | "series" => Ok(MediaKind::Show),
            other => Err(AppError::InvalidInput(format!("Unknown media kind: {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_kind_display() {
        assert_eq!(format!("{}", MediaKind::Movie), "movie");
        assert_eq!(format!("{}", MediaKind::Show), "show");
    }

    #[test]
    fn test_media_kind_parse_aliases() {
        assert_eq!("Movies".parse::<MediaKind>().unwrap(), MediaKind::Movie);
        assert_eq!("tv".parse::<MediaKind>().unwrap(), MediaKind::Show);
        assert!("music".parse::<MediaKind>().is_err());
    }

    #[test]
    fn test_media_kind_serde() {
        let json = serde_json::to_string(&MediaKind::Show).unwrap();
        assert_eq!(json, "\"show\"");
        let kind: MediaKind = serde_json::from_str("\"movie\"").unwrap();
        assert_eq!(kind, MediaKind::Movie);
    }
}
