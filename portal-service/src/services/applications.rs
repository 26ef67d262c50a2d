//! Citizen application drafts, submission, and admin review.

use bson::{doc, Bson, Document};
use futures::TryStreamExt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::dtos::applications::{
    CreateApplicationRequest, ListApplicationsQuery, ReviewRequest, UpdateApplicationRequest,
};
use crate::dtos::Paginated;
use crate::models::{Application, ApplicationStatus, Settings, User};
use crate::services::settings::SettingsService;
use crate::services::{EmailProvider, PortalDb, ServiceError};

#[derive(Clone)]
pub struct ApplicationService {
    db: PortalDb,
    settings: SettingsService,
    email: Arc<dyn EmailProvider>,
}

impl ApplicationService {
    pub fn new(db: PortalDb, settings: SettingsService, email: Arc<dyn EmailProvider>) -> Self {
        Self {
            db,
            settings,
            email,
        }
    }

    pub async fn create_draft(
        &self,
        user: &User,
        req: CreateApplicationRequest,
    ) -> Result<Application, ServiceError> {
        let settings = self.settings.get_or_create().await?;

        let service_name = settings
            .service_display_name(&req.service_id)
            .ok_or_else(|| ServiceError::ServiceNotFound(req.service_id.clone()))?;
        if !settings.service_enabled(&req.service_id) {
            return Err(ServiceError::ServiceDisabled(req.service_id.clone()));
        }

        let data = json_map_to_document(req.data)?;
        let app = Application::new_draft(req.service_id, service_name, user.id, data);
        self.db.applications().insert_one(&app, None).await?;
        Ok(app)
    }

    pub async fn update_draft(
        &self,
        user: &User,
        app_id: Uuid,
        req: UpdateApplicationRequest,
    ) -> Result<Application, ServiceError> {
        let mut app = self.get_owned(user, app_id).await?;
        if !app.is_draft() {
            return Err(ServiceError::InvalidTransition(
                "only drafts can be edited".to_string(),
            ));
        }

        app.data = json_map_to_document(req.data)?;
        app.updated_at = bson::DateTime::now();
        self.db
            .applications()
            .replace_one(doc! { "_id": app.id.to_string() }, &app, None)
            .await?;
        Ok(app)
    }

    /// Submit a draft. Required fields of the service's form must be present
    /// and non-empty in the draft data.
    pub async fn submit(&self, user: &User, app_id: Uuid) -> Result<Application, ServiceError> {
        let mut app = self.get_owned(user, app_id).await?;
        if !app.is_draft() {
            return Err(ServiceError::InvalidTransition(
                "application has already been submitted".to_string(),
            ));
        }

        let settings = self.settings.get_or_create().await?;
        if !settings.service_enabled(&app.service_id) {
            return Err(ServiceError::ServiceDisabled(app.service_id.clone()));
        }

        let missing = missing_required_fields(&settings, &app.service_id, &app.data);
        if !missing.is_empty() {
            return Err(ServiceError::InvalidParameter(format!(
                "missing required fields: {}",
                missing.join(", ")
            )));
        }

        let now = bson::DateTime::now();
        app.status = ApplicationStatus::Submitted;
        app.submitted_at = Some(now);
        app.updated_at = now;
        self.db
            .applications()
            .replace_one(doc! { "_id": app.id.to_string() }, &app, None)
            .await?;
        Ok(app)
    }

    pub async fn get(&self, user: &User, app_id: Uuid) -> Result<Application, ServiceError> {
        if user.role.is_admin() {
            return self
                .db
                .applications()
                .find_one(doc! { "_id": app_id.to_string() }, None)
                .await?
                .ok_or(ServiceError::ApplicationNotFound);
        }
        self.get_owned(user, app_id).await
    }

    pub async fn list_mine(
        &self,
        user: &User,
        query: &ListApplicationsQuery,
    ) -> Result<Paginated<Application>, ServiceError> {
        let mut filter = doc! { "user_id": user.id.to_string() };
        apply_list_filters(&mut filter, query)?;
        self.page(filter, query).await
    }

    pub async fn admin_list(
        &self,
        query: &ListApplicationsQuery,
    ) -> Result<Paginated<Application>, ServiceError> {
        let mut filter = doc! {};
        apply_list_filters(&mut filter, query)?;
        // Drafts stay private to their owner until submitted.
        filter.insert("status", doc! { "$ne": ApplicationStatus::Draft.as_str() });
        self.page(filter, query).await
    }

    pub async fn delete_draft(&self, user: &User, app_id: Uuid) -> Result<(), ServiceError> {
        let app = self.get_owned(user, app_id).await?;
        if !app.is_draft() {
            return Err(ServiceError::InvalidTransition(
                "only drafts can be deleted".to_string(),
            ));
        }
        self.db
            .applications()
            .delete_one(doc! { "_id": app.id.to_string() }, None)
            .await?;
        Ok(())
    }

    pub async fn review(
        &self,
        app_id: Uuid,
        req: ReviewRequest,
    ) -> Result<Application, ServiceError> {
        let next = ApplicationStatus::from_str(&req.status)
            .map_err(ServiceError::InvalidParameter)?;

        let mut app = self
            .db
            .applications()
            .find_one(doc! { "_id": app_id.to_string() }, None)
            .await?
            .ok_or(ServiceError::ApplicationNotFound)?;

        if !app.status.can_transition_to(next) {
            return Err(ServiceError::InvalidTransition(format!(
                "{} -> {}",
                app.status.as_str(),
                next.as_str()
            )));
        }

        app.status = next;
        app.remarks = req.remarks;
        app.updated_at = bson::DateTime::now();
        self.db
            .applications()
            .replace_one(doc! { "_id": app.id.to_string() }, &app, None)
            .await?;

        self.notify_applicant(&app).await;
        Ok(app)
    }

    /// Best-effort email to the applicant; review outcomes never fail on a
    /// mail error.
    async fn notify_applicant(&self, app: &Application) {
        let user = match self
            .db
            .users()
            .find_one(doc! { "_id": app.user_id.to_string() }, None)
            .await
        {
            Ok(Some(user)) => user,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(error = %e, application_id = %app.id, "Applicant lookup failed");
                return;
            }
        };

        let email = self.email.clone();
        let service_name = app.service_name.clone();
        let status = app.status.as_str().to_string();
        let remarks = app.remarks.clone();
        tokio::spawn(async move {
            if let Err(e) = email
                .send_application_status(&user.email, &service_name, &status, remarks.as_deref())
                .await
            {
                tracing::warn!(error = %e, "Application status email failed");
            }
        });
    }

    async fn get_owned(&self, user: &User, app_id: Uuid) -> Result<Application, ServiceError> {
        self.db
            .applications()
            .find_one(doc! { "_id": app_id.to_string(), "user_id": user.id.to_string() }, None)
            .await?
            .ok_or(ServiceError::ApplicationNotFound)
    }

    async fn page(
        &self,
        filter: Document,
        query: &ListApplicationsQuery,
    ) -> Result<Paginated<Application>, ServiceError> {
        let total = self
            .db
            .applications()
            .count_documents(filter.clone(), None)
            .await?;
        let options = mongodb::options::FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .skip(query.pagination.skip())
            .limit(query.pagination.limit())
            .build();
        let items: Vec<Application> = self
            .db
            .applications()
            .find(filter, options)
            .await?
            .try_collect()
            .await?;

        Ok(Paginated {
            items,
            total,
            page: query.pagination.page,
            per_page: query.pagination.limit(),
        })
    }
}

fn apply_list_filters(
    filter: &mut Document,
    query: &ListApplicationsQuery,
) -> Result<(), ServiceError> {
    if let Some(status) = query.status.as_deref().filter(|s| !s.is_empty()) {
        let status =
            ApplicationStatus::from_str(status).map_err(ServiceError::InvalidParameter)?;
        filter.insert("status", status.as_str());
    }
    if let Some(service_id) = query.service_id.as_deref().filter(|s| !s.is_empty()) {
        filter.insert("service_id", service_id);
    }
    Ok(())
}

pub(crate) fn json_map_to_document(
    map: serde_json::Map<String, serde_json::Value>,
) -> Result<Document, ServiceError> {
    bson::to_document(&serde_json::Value::Object(map))
        .map_err(|e| ServiceError::InvalidParameter(format!("invalid form data: {}", e)))
}

/// Names of required form fields absent (or blank) in the draft data.
fn missing_required_fields(settings: &Settings, service_id: &str, data: &Document) -> Vec<String> {
    let required: Vec<&str> = if let Some(form) = settings.find_addon_service(service_id) {
        form.required_fields().map(|f| f.name.as_str()).collect()
    } else if let Some(svc) = settings.find_custom_service(service_id) {
        svc.fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
            .collect()
    } else {
        // Built-in services carry no admin-defined form.
        Vec::new()
    };

    required
        .into_iter()
        .filter(|name| match data.get(*name) {
            None | Some(Bson::Null) => true,
            Some(Bson::String(s)) => s.trim().is_empty(),
            Some(_) => false,
        })
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FormConfig, FormField, FormStep};

    fn settings_with_form() -> Settings {
        let mut settings = Settings::bootstrap();
        settings.addon_services.push(FormConfig {
            service_id: "tricycle_franchise".to_string(),
            name: "Tricycle Franchise".to_string(),
            description: None,
            enabled: true,
            steps: vec![FormStep {
                step_id: "s1".to_string(),
                title: "Applicant".to_string(),
            }],
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
                    step_id: "s1".to_string(),
                    name: "plate_number".to_string(),
                    label: "Plate number".to_string(),
                    field_type: "text".to_string(),
                    required: false,
                    options: vec![],
                },
            ],
        });
        settings
    }

    #[test]
    fn missing_required_fields_flags_absent_and_blank() {
        let settings = settings_with_form();
        let data = doc! { "full_name": "  " };
        let missing = missing_required_fields(&settings, "tricycle_franchise", &data);
        assert_eq!(missing, vec!["full_name".to_string()]);

        let data = doc! { "full_name": "Juan dela Cruz" };
        assert!(missing_required_fields(&settings, "tricycle_franchise", &data).is_empty());
    }

    #[test]
    fn built_in_services_have_no_required_fields() {
        let settings = Settings::bootstrap();
        let data = doc! {};
        assert!(missing_required_fields(&settings, "business_permit", &data).is_empty());
    }
}
