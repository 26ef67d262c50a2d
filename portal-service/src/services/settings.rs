//! Settings service: the get-or-create singleton document and the
//! admin-configurable dynamic form schemas inside it.

use bson::{doc, DateTime};

use crate::dtos::settings::{
    CreateAddonServiceRequest, CreateCustomServiceRequest, UpdateAddonServiceRequest,
    UpdateCustomServiceRequest, UpdateSettingsRequest,
};
use crate::models::settings::{CustomServiceConfig, FormConfig};
use crate::models::Settings;
use crate::services::{PortalDb, ServiceError};
use crate::utils::slugify;

#[derive(Clone)]
pub struct SettingsService {
    db: PortalDb,
}

impl SettingsService {
    pub fn new(db: PortalDb) -> Self {
        Self { db }
    }

    /// Fetch the settings document, inserting the bootstrap document on first
    /// access. A concurrent first access can race the insert; the loser's
    /// retry read then observes the winner's document.
    pub async fn get_or_create(&self) -> Result<Settings, ServiceError> {
        if let Some(settings) = self.db.settings().find_one(doc! {}, None).await? {
            return Ok(settings);
        }

        let bootstrap = Settings::bootstrap();
        match self.db.settings().insert_one(&bootstrap, None).await {
            Ok(_) => Ok(bootstrap),
            Err(_) => self
                .db
                .settings()
                .find_one(doc! {}, None)
                .await?
                .ok_or_else(|| {
                    ServiceError::Internal(anyhow::anyhow!("settings bootstrap lost a race"))
                }),
        }
    }

    async fn replace(&self, settings: &mut Settings) -> Result<(), ServiceError> {
        settings.updated_at = DateTime::now();
        self.db
            .settings()
            .replace_one(doc! { "_id": settings.id.to_string() }, &*settings, None)
            .await?;
        Ok(())
    }

    pub async fn update(&self, req: UpdateSettingsRequest) -> Result<Settings, ServiceError> {
        let mut settings = self.get_or_create().await?;

        if let Some(city) = req.city {
            settings.city = city;
        }
        if let Some(faqs) = req.faqs {
            settings.faqs = faqs;
        }
        if let Some(flags) = req.service_flags {
            settings.service_flags = flags;
        }

        self.replace(&mut settings).await?;
        Ok(settings)
    }

    // ==================== Custom payment services ====================

    pub async fn create_custom_service(
        &self,
        req: CreateCustomServiceRequest,
    ) -> Result<CustomServiceConfig, ServiceError> {
        let mut settings = self.get_or_create().await?;

        let service_id = slugify(&req.name);
        if service_id.is_empty() {
            return Err(ServiceError::InvalidParameter(
                "service name produces an empty id".to_string(),
            ));
        }
        if settings.service_id_taken(&service_id) {
            return Err(ServiceError::DuplicateService(service_id));
        }

        let mut config = CustomServiceConfig {
            service_id,
            name: req.name,
            description: req.description,
            enabled: req.enabled,
            fees: req.fees,
            steps: req.steps,
            fields: req.fields,
        };
        prune_custom(&mut config);

        settings.custom_services.push(config.clone());
        self.replace(&mut settings).await?;
        Ok(config)
    }

    pub async fn update_custom_service(
        &self,
        service_id: &str,
        req: UpdateCustomServiceRequest,
    ) -> Result<CustomServiceConfig, ServiceError> {
        let mut settings = self.get_or_create().await?;

        let config = settings
            .custom_services
            .iter_mut()
            .find(|s| s.service_id == service_id)
            .ok_or_else(|| ServiceError::ServiceNotFound(service_id.to_string()))?;

        if let Some(name) = req.name {
            config.name = name;
        }
        if let Some(description) = req.description {
            config.description = Some(description);
        }
        if let Some(enabled) = req.enabled {
            config.enabled = enabled;
        }
        if let Some(fees) = req.fees {
            config.fees = fees;
        }
        if let Some(steps) = req.steps {
            config.steps = steps;
        }
        if let Some(fields) = req.fields {
            config.fields = fields;
        }
        prune_custom(config);

        let updated = config.clone();
        self.replace(&mut settings).await?;
        Ok(updated)
    }

    pub async fn delete_custom_service(&self, service_id: &str) -> Result<(), ServiceError> {
        let mut settings = self.get_or_create().await?;
        let before = settings.custom_services.len();
        settings
            .custom_services
            .retain(|s| s.service_id != service_id);
        if settings.custom_services.len() == before {
            return Err(ServiceError::ServiceNotFound(service_id.to_string()));
        }
        self.replace(&mut settings).await?;
        Ok(())
    }

    // ==================== Add-on application services ====================

    pub async fn create_addon_service(
        &self,
        req: CreateAddonServiceRequest,
    ) -> Result<FormConfig, ServiceError> {
        let mut settings = self.get_or_create().await?;

        let service_id = slugify(&req.name);
        if service_id.is_empty() {
            return Err(ServiceError::InvalidParameter(
                "service name produces an empty id".to_string(),
            ));
        }
        if settings.service_id_taken(&service_id) {
            return Err(ServiceError::DuplicateService(service_id));
        }

        let mut config = FormConfig {
            service_id,
            name: req.name,
            description: req.description,
            enabled: req.enabled,
            steps: req.steps,
            fields: req.fields,
        };
        config.prune_orphan_fields();

        settings.addon_services.push(config.clone());
        self.replace(&mut settings).await?;
        Ok(config)
    }

    pub async fn update_addon_service(
        &self,
        service_id: &str,
        req: UpdateAddonServiceRequest,
    ) -> Result<FormConfig, ServiceError> {
        let mut settings = self.get_or_create().await?;

        let config = settings
            .addon_services
            .iter_mut()
            .find(|s| s.service_id == service_id)
            .ok_or_else(|| ServiceError::ServiceNotFound(service_id.to_string()))?;

        if let Some(name) = req.name {
            config.name = name;
        }
        if let Some(description) = req.description {
            config.description = Some(description);
        }
        if let Some(enabled) = req.enabled {
            config.enabled = enabled;
        }
        if let Some(steps) = req.steps {
            config.steps = steps;
        }
        if let Some(fields) = req.fields {
            config.fields = fields;
        }
        // Cascade: fields of steps removed by this update go with them.
        config.prune_orphan_fields();

        let updated = config.clone();
        self.replace(&mut settings).await?;
        Ok(updated)
    }

    pub async fn delete_addon_service(&self, service_id: &str) -> Result<(), ServiceError> {
        let mut settings = self.get_or_create().await?;
        let before = settings.addon_services.len();
        settings
            .addon_services
            .retain(|s| s.service_id != service_id);
        if settings.addon_services.len() == before {
            return Err(ServiceError::ServiceNotFound(service_id.to_string()));
        }
        self.replace(&mut settings).await?;
        Ok(())
    }
}

fn prune_custom(config: &mut CustomServiceConfig) {
    let step_ids: Vec<&str> = config.steps.iter().map(|s| s.step_id.as_str()).collect();
    config
        .fields
        .retain(|f| step_ids.contains(&f.step_id.as_str()));
}
