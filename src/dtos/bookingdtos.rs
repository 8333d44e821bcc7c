use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct CanCombineDto {
    #[validate(length(min = 1, message = "Service id is required"))]
    pub a: String,

    #[validate(length(min = 1, message = "Service id is required"))]
    pub b: String,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct CartCheckDto {
    pub existing: Vec<String>,

    #[validate(length(min = 1, message = "Candidate service id is required"))]
    pub candidate: String,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct AddonSuggestionDto {
    #[validate(length(min = 1, message = "Primary service id is required"))]
    pub primary: String,

    #[serde(rename = "providerOffered")]
    pub provider_offered: Vec<String>,

    #[serde(rename = "alreadySelected", default)]
    pub already_selected: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddonSuggestionResponseDto {
    pub status: String,
    pub addons: Vec<String>,
}
