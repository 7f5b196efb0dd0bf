use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{RunMode, Suggestion};
use crate::error::{AppError, AppResult};

/// Suggestions for one library
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionBatch {
    pub library_id: String,
    #[serde(default)]
    pub suggestions: Vec<Suggestion>,
}

/// Parameters of a targeted run or a sweep
///
/// With `user_id` the run is targeted; without it every known user is swept.
/// A library named in `batches` gets a ledger pass (an empty batch is an
/// attrition run); other libraries are only refreshed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub library_id: Option<String>,
    #[serde(default)]
    pub batches: Option<Vec<SuggestionBatch>>,
    #[serde(default)]
    pub dry_run: Option<bool>,
}

impl RunRequest {
    pub fn sweep() -> Self {
        Self::default()
    }

    pub fn targeted(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Default::default()
        }
    }

    pub fn in_library(mut self, library_id: impl Into<String>) -> Self {
        self.library_id = Some(library_id.into());
        self
    }

    pub fn with_batch(mut self, library_id: impl Into<String>, suggestions: Vec<Suggestion>) -> Self {
        self.batches.get_or_insert_with(Vec::new).push(SuggestionBatch {
            library_id: library_id.into(),
            suggestions,
        });
        self
    }

    pub fn mode(&self) -> RunMode {
        if self.user_id.is_some() {
            RunMode::Targeted
        } else {
            RunMode::Sweep
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if let Some(user_id) = &self.user_id {
            if user_id.trim().is_empty() {
                return Err(AppError::InvalidInput("userId must not be blank".to_string()));
            }
        } else {
            if self.library_id.is_some() {
                return Err(AppError::InvalidInput(
                    "libraryId requires userId".to_string(),
                ));
            }
            if self.batches.is_some() {
                return Err(AppError::InvalidInput(
                    "suggestion batches require userId".to_string(),
                ));
            }
        }

        if let Some(library_id) = &self.library_id {
            if library_id.trim().is_empty() {
                return Err(AppError::InvalidInput("libraryId must not be blank".to_string()));
            }
        }

        for batch in self.batches.iter().flatten() {
            if batch.library_id.trim().is_empty() {
                return Err(AppError::InvalidInput(
                    "every batch needs a libraryId".to_string(),
                ));
            }
            if let Some(library_id) = &self.library_id {
                if batch.library_id != *library_id {
                    return Err(AppError::InvalidInput(format!(
                        "batch for library {} outside requested library {}",
                        batch.library_id, library_id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Batches keyed by library; repeated libraries are concatenated
    pub fn batches_by_library(&self) -> Option<HashMap<String, Vec<Suggestion>>> {
        self.batches.as_ref().map(|batches| {
            let mut by_library: HashMap<String, Vec<Suggestion>> = HashMap::new();
            for batch in batches {
                by_library
                    .entry(batch.library_id.clone())
                    .or_default()
                    .extend(batch.suggestions.iter().cloned());
            }
            by_library
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_follows_user() {
        assert_eq!(RunRequest::sweep().mode(), RunMode::Sweep);
        assert_eq!(RunRequest::targeted("admin").mode(), RunMode::Targeted);
    }

    #[test]
    fn test_validation() {
        assert!(RunRequest::sweep().validate().is_ok());
        assert!(RunRequest::targeted(" ").validate().is_err());
        assert!(RunRequest::sweep().in_library("1").validate().is_err());
        assert!(RunRequest::sweep().with_batch("1", vec![]).validate().is_err());
        assert!(RunRequest::targeted("admin")
            .in_library("1")
            .with_batch("2", vec![])
            .validate()
            .is_err());
        assert!(RunRequest::targeted("admin")
            .in_library("1")
            .with_batch("1", vec![Suggestion::new("603")])
            .validate()
            .is_ok());
    }

    #[test]
    fn test_batches_merge_per_library() {
        let request = RunRequest::targeted("admin")
            .with_batch("1", vec![Suggestion::new("1")])
            .with_batch("1", vec![Suggestion::new("2")])
            .with_batch("2", vec![]);
        let batches = request.batches_by_library().unwrap();
        assert_eq!(batches["1"].len(), 2);
        assert!(batches["2"].is_empty());
        assert!(RunRequest::targeted("admin").batches_by_library().is_none());
    }

    #[test]
    fn test_deserialize_camel_case() {
        let request: RunRequest = serde_json::from_value(serde_json::json!({
            "userId": "admin",
            "dryRun": true,
            "batches": [{"libraryId": "1", "suggestions": [{"externalId": "603", "presentInLibrary": true}]}]
        }))
        .unwrap();
        assert_eq!(request.dry_run, Some(true));
        assert!(request.batches.unwrap()[0].suggestions[0].present_in_library);
    }
}
