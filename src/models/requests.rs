use crate::models::domain::{Category, Gender, Platform};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Request to change any of the selection criteria
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectionRequest {
    #[serde(default)]
    pub platform: Option<Platform>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub gender: Option<Gender>,
}

impl SelectionRequest {
    pub fn is_empty(&self) -> bool {
        self.platform.is_none() && self.category.is_none() && self.gender.is_none()
    }
}

/// Query string of the upload endpoint
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UploadQuery {
    #[validate(length(min = 1, max = 255))]
    #[serde(alias = "file_name", rename = "fileName", default = "default_file_name")]
    pub file_name: String,
}

fn default_file_name() -> String {
    "upload".to_string()
}
