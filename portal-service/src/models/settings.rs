//! Portal settings: a single mutable document holding branding, contact details,
//! FAQ entries, per-service enable flags, and the admin-configurable dynamic form
//! schemas (add-on application services and custom payment services).

use bson::DateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Services every LGU deployment ships with, as (service_id, display name).
/// Historical transaction records may carry either form.
pub const BUILT_IN_SERVICES: &[(&str, &str)] = &[
    ("business_permit", "Business Permit"),
    ("real_property_tax", "Real Property Tax"),
    ("community_tax", "Community Tax Certificate"),
    ("market_stall_rental", "Market Stall Rental"),
    ("civil_registry", "Civil Registry"),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactInfo {
    pub email: String,
    pub phone: String,
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CityProfile {
    pub name: String,
    pub slogan: String,
    pub logo_url: Option<String>,
    pub contact: ContactInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaqEntry {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceFlag {
    pub service_id: String,
    pub enabled: bool,
}

/// One field of a dynamic form. Fields reference their step by id; the form-level
/// cascade keeps the two in sync when steps are removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormField {
    pub step_id: String,
    pub name: String,
    pub label: String,
    /// "text", "number", "date", "select", "file", ...; interpreted by the form
    /// renderer, opaque to the backend except for required-field checks.
    pub field_type: String,
    pub required: bool,
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormStep {
    pub step_id: String,
    pub title: String,
}

/// An admin-defined application form (add-on service).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormConfig {
    pub service_id: String,
    pub name: String,
    pub description: Option<String>,
    pub enabled: bool,
    pub steps: Vec<FormStep>,
    pub fields: Vec<FormField>,
}

impl FormConfig {
    /// Remove a step and everything it owns. Fields belonging to the removed step
    /// are stripped so the form never references a deleted step.
    pub fn remove_step(&mut self, step_id: &str) -> bool {
        let before = self.steps.len();
        self.steps.retain(|s| s.step_id != step_id);
        if self.steps.len() == before {
            return false;
        }
        self.fields.retain(|f| f.step_id != step_id);
        true
    }

    /// Drop fields that point at a step that no longer exists. Applied whenever a
    /// config is written, so a client sending a partial update cannot orphan
    /// fields.
    pub fn prune_orphan_fields(&mut self) {
        let step_ids: Vec<&str> = self.steps.iter().map(|s| s.step_id.as_str()).collect();
        self.fields.retain(|f| step_ids.contains(&f.step_id.as_str()));
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FormField> {
        self.fields.iter().filter(|f| f.required)
    }
}

/// One line of an admin-defined fee schedule, in minor currency units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeItem {
    pub label: String,
    pub amount_minor: i64,
}

/// An admin-defined payment service: a fee schedule plus an optional intake form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomServiceConfig {
    pub service_id: String,
    pub name: String,
    pub description: Option<String>,
    pub enabled: bool,
    pub fees: Vec<FeeItem>,
    #[serde(default)]
    pub steps: Vec<FormStep>,
    #[serde(default)]
    pub fields: Vec<FormField>,
}

impl CustomServiceConfig {
    pub fn total_fee_minor(&self) -> i64 {
        self.fees.iter().map(|f| f.amount_minor).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub city: CityProfile,
    pub faqs: Vec<FaqEntry>,
    pub service_flags: Vec<ServiceFlag>,
    pub addon_services: Vec<FormConfig>,
    pub custom_services: Vec<CustomServiceConfig>,
    pub updated_at: DateTime,
}

impl Settings {
    /// Initial document inserted by the get-or-create path.
    pub fn bootstrap() -> Self {
        Self {
            id: Uuid::new_v4(),
            city: CityProfile {
                name: "City Government".to_string(),
                slogan: String::new(),
                logo_url: None,
                contact: ContactInfo {
                    email: String::new(),
                    phone: String::new(),
                    address: String::new(),
                },
            },
            faqs: Vec::new(),
            service_flags: BUILT_IN_SERVICES
                .iter()
                .map(|(id, _)| ServiceFlag {
                    service_id: (*id).to_string(),
                    enabled: true,
                })
                .collect(),
            addon_services: Vec::new(),
            custom_services: Vec::new(),
            updated_at: DateTime::now(),
        }
    }

    /// Full catalog of (service_id, display name), built-ins plus admin-defined
    /// services. Report scoping normalizes allowed-service lists against this.
    pub fn service_catalog(&self) -> Vec<(String, String)> {
        let mut catalog: Vec<(String, String)> = BUILT_IN_SERVICES
            .iter()
            .map(|(id, name)| ((*id).to_string(), (*name).to_string()))
            .collect();
        catalog.extend(
            self.custom_services
                .iter()
                .map(|s| (s.service_id.clone(), s.name.clone())),
        );
        catalog.extend(
            self.addon_services
                .iter()
                .map(|s| (s.service_id.clone(), s.name.clone())),
        );
        catalog
    }

    pub fn service_id_taken(&self, service_id: &str) -> bool {
        self.service_catalog()
            .iter()
            .any(|(id, _)| id == service_id)
    }

    pub fn service_enabled(&self, service_id: &str) -> bool {
        if let Some(flag) = self
            .service_flags
            .iter()
            .find(|f| f.service_id == service_id)
        {
            return flag.enabled;
        }
        if let Some(svc) = self
            .custom_services
            .iter()
            .find(|s| s.service_id == service_id)
        {
            return svc.enabled;
        }
        if let Some(svc) = self
            .addon_services
            .iter()
            .find(|s| s.service_id == service_id)
        {
            return svc.enabled;
        }
        false
    }

    pub fn find_custom_service(&self, service_id: &str) -> Option<&CustomServiceConfig> {
        self.custom_services
            .iter()
            .find(|s| s.service_id == service_id)
    }

    pub fn find_addon_service(&self, service_id: &str) -> Option<&FormConfig> {
        self.addon_services
            .iter()
            .find(|s| s.service_id == service_id)
    }

    /// Display name for a service id, searching built-ins then admin services.
    pub fn service_display_name(&self, service_id: &str) -> Option<String> {
        self.service_catalog()
            .into_iter()
            .find(|(id, _)| id == service_id)
            .map(|(_, name)| name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form_with_two_steps() -> FormConfig {
        FormConfig {
            service_id: "tricycle_franchise".to_string(),
            name: "Tricycle Franchise".to_string(),
            description: None,
            enabled: true,
            steps: vec![
                FormStep {
                    step_id: "s1".to_string(),
                    title: "Applicant".to_string(),
                },
                FormStep {
                    step_id: "s2".to_string(),
                    title: "Vehicle".to_string(),
                },
            ],
            fields: vec![
                FormField {
                    step_id: "s1".to_string(),
                    name: "full_name".to_string(),
                    label: "Full name".to_string(),
                    field_type: "text".to_string(),
                    required: true,
                    options: vec![],
                },
                FormField {
                    step_id: "s2".to_string(),
                    name: "plate_number".to_string(),
                    label: "Plate number".to_string(),
                    field_type: "text".to_string(),
                    required: true,
                    options: vec![],
                },
            ],
        }
    }

    #[test]
    fn removing_a_step_strips_its_fields() {
        let mut form = form_with_two_steps();
        assert!(form.remove_step("s2"));
        assert_eq!(form.steps.len(), 1);
        assert_eq!(form.fields.len(), 1);
        assert_eq!(form.fields[0].name, "full_name");

        // Removing a missing step is a no-op.
        assert!(!form.remove_step("s9"));
        assert_eq!(form.fields.len(), 1);
    }

    #[test]
    fn prune_drops_fields_of_unknown_steps() {
        let mut form = form_with_two_steps();
        form.steps.remove(1);
        form.prune_orphan_fields();
        assert_eq!(form.fields.len(), 1);
    }

    #[test]
    fn bootstrap_enables_built_in_services() {
        let settings = Settings::bootstrap();
        assert!(settings.service_enabled("business_permit"));
        assert!(!settings.service_enabled("no_such_service"));
        assert!(settings.service_id_taken("real_property_tax"));
    }

    #[test]
    fn catalog_includes_admin_defined_services() {
        let mut settings = Settings::bootstrap();
        settings.custom_services.push(CustomServiceConfig {
            service_id: "garbage_collection".to_string(),
            name: "Garbage Collection Fee".to_string(),
            description: None,
            enabled: true,
            fees: vec![FeeItem {
                label: "Monthly fee".to_string(),
                amount_minor: 15_000,
            }],
            steps: vec![],
            fields: vec![],
        });
        assert!(settings.service_id_taken("garbage_collection"));
        assert!(settings.service_enabled("garbage_collection"));
        assert_eq!(
            settings.service_display_name("garbage_collection").as_deref(),
            Some("Garbage Collection Fee")
        );
    }
}
