use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::settings::{
    CityProfile, CustomServiceConfig, FaqEntry, FeeItem, FormConfig, FormField, FormStep,
    ServiceFlag, Settings,
};

/// Branding/contact/FAQ/flags update. Form configs have their own endpoints.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateSettingsRequest {
    pub city: Option<CityProfile>,
    pub faqs: Option<Vec<FaqEntry>>,
    pub service_flags: Option<Vec<ServiceFlag>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCustomServiceRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    pub description: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub fees: Vec<FeeItem>,
    #[serde(default)]
    pub steps: Vec<FormStep>,
    #[serde(default)]
    pub fields: Vec<FormField>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCustomServiceRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub enabled: Option<bool>,
    pub fees: Option<Vec<FeeItem>>,
    pub steps: Option<Vec<FormStep>>,
    pub fields: Option<Vec<FormField>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAddonServiceRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    pub description: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub steps: Vec<FormStep>,
    pub fields: Vec<FormField>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateAddonServiceRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub enabled: Option<bool>,
    pub steps: Option<Vec<FormStep>>,
    pub fields: Option<Vec<FormField>>,
}

fn default_enabled() -> bool {
    true
}

/// Subset of settings exposed without authentication: branding, FAQ, and the
/// enabled services a citizen can apply or pay for.
#[derive(Debug, Serialize)]
pub struct PublicSettings {
    pub city: CityProfile,
    pub faqs: Vec<FaqEntry>,
    pub service_flags: Vec<ServiceFlag>,
    pub addon_services: Vec<FormConfig>,
    pub custom_services: Vec<CustomServiceConfig>,
}

impl From<Settings> for PublicSettings {
    fn from(s: Settings) -> Self {
        Self {
            city: s.city,
            faqs: s.faqs,
            service_flags: s.service_flags,
            addon_services: s.addon_services.into_iter().filter(|f| f.enabled).collect(),
            custom_services: s
                .custom_services
                .into_iter()
                .filter(|c| c.enabled)
                .collect(),
        }
    }
}
