//! Database models

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Column limits enforced before insert
pub const MAX_CREATOR_LEN: usize = 80;
pub const MAX_MODEL_LEN: usize = 120;
pub const MAX_FILE_TYPE_LEN: usize = 20;
pub const MAX_FILENAME_LEN: usize = 120;

/// A confirmed 3D model entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    pub id: i64,
    pub creator: String,
    pub model: String,
    pub file_type: String,
    pub filename: String,
    pub original_filename: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when creating a `ModelRecord`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewModelRecord {
    pub creator: String,
    pub model: String,
    pub file_type: String,
    pub filename: String,
    #[serde(default)]
    pub original_filename: Option<String>,
}

impl NewModelRecord {
    /// Trim every field and check required/length constraints
    ///
    /// Blank `original_filename` collapses to `None`.
    pub fn validate(self) -> Result<Self> {
        let creator = required("creator", &self.creator, MAX_CREATOR_LEN)?;
        let model = required("model", &self.model, MAX_MODEL_LEN)?;
        let file_type = required("file_type", &self.file_type, MAX_FILE_TYPE_LEN)?;
        let filename = required("filename", &self.filename, MAX_FILENAME_LEN)?;

        let original_filename = match self.original_filename.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(name) if name.chars().count() > MAX_FILENAME_LEN => {
                return Err(Error::InvalidInput(format!(
                    "original_filename exceeds {} characters",
                    MAX_FILENAME_LEN
                )))
            }
            Some(name) => Some(name.to_string()),
        };

        Ok(Self {
            creator,
            model,
            file_type,
            filename,
            original_filename,
        })
    }
}

fn required(field: &str, value: &str, max_len: usize) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput(format!("{} is required", field)));
    }
    if trimmed.chars().count() > max_len {
        return Err(Error::InvalidInput(format!(
            "{} exceeds {} characters",
            field, max_len
        )));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NewModelRecord {
        NewModelRecord {
            creator: "  Loot Studios ".to_string(),
            model: "Dragon Bust".to_string(),
            file_type: "stl".to_string(),
            filename: "dragon_bust.stl".to_string(),
            original_filename: Some("   ".to_string()),
        }
    }

    #[test]
    fn test_validate_trims_and_drops_blank_original() {
        let record = sample().validate().unwrap();
        assert_eq!(record.creator, "Loot Studios");
        assert_eq!(record.original_filename, None);
    }

    #[test]
    fn test_validate_rejects_missing_field() {
        let mut record = sample();
        record.model = String::new();
        let err = record.validate().unwrap_err();
        assert!(err.to_string().contains("model is required"));
    }

    #[test]
    fn test_validate_rejects_long_file_type() {
        let mut record = sample();
        record.file_type = "x".repeat(MAX_FILE_TYPE_LEN + 1);
        assert!(matches!(record.validate(), Err(Error::InvalidInput(_))));
    }
}
