use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use docroute_core::domain::application::{ApplicationId, FormData, NewApplication};
use docroute_core::domain::document::{DocumentId, NewDocument};
use docroute_core::domain::folder::{FolderId, FolderPermission, NewFolder};
use docroute_core::domain::form::{FormFieldType, FormId, NewApprovalForm, NewFormField};
use docroute_core::domain::principal::{Role, UserId};
use docroute_core::domain::route::{NewApprovalRoute, NewRouteStep, RouteId};
use docroute_core::errors::{DomainError, RepositoryError};

use crate::blobs::BlobError;
use crate::Store;

/// Demo principals. Identity is external, so a user id is simply the username.
pub const SEED_USERS: &[(&str, Role)] = &[("admin", Role::Admin), ("user", Role::User)];

const SAMPLE_DOCUMENT_KEY: &str = "documents/sample.txt";
const SAMPLE_DOCUMENT_BODY: &[u8] = b"Sample document for testing.\n";

#[derive(Debug, Error)]
pub enum SeedError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Blob(#[from] BlobError),
}

/// The demo dataset: one folder tree, one form, a single-step route and a draft application.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    pub async fn load(store: &Store) -> Result<SeedResult, SeedError> {
        let admin = UserId::new("admin");
        let user = UserId::new("user");

        let mut root = store
            .folders
            .create(NewFolder { name: "Root".to_string(), parent_id: None, created_by: admin.clone() })
            .await?;
        root.grant(user.clone(), FolderPermission::Read);
        let root = store.folders.save(root).await?;

        let documents_folder = store
            .folders
            .create(NewFolder {
                name: "Documents".to_string(),
                parent_id: Some(root.id.clone()),
                created_by: admin.clone(),
            })
            .await?;
        let applications_folder = store
            .folders
            .create(NewFolder {
                name: "Applications".to_string(),
                parent_id: Some(root.id.clone()),
                created_by: admin.clone(),
            })
            .await?;

        let file_path =
            store.blobs.store_blob(SAMPLE_DOCUMENT_KEY, SAMPLE_DOCUMENT_BODY.to_vec()).await?;
        let mut metadata = BTreeMap::new();
        metadata.insert("description".to_string(), json!("Sample document for testing"));
        let sample_document = store
            .documents
            .create(NewDocument {
                name: "Sample Document.txt".to_string(),
                folder_id: Some(documents_folder.id.clone()),
                file_path,
                file_type: "text/plain".to_string(),
                file_size: SAMPLE_DOCUMENT_BODY.len() as u64,
                created_by: admin.clone(),
                metadata,
            })
            .await?;

        let new_form = NewApprovalForm {
            name: "Expense Report".to_string(),
            description: Some("Form for submitting expense reports".to_string()),
            fields: vec![
                field("amount", "Amount", FormFieldType::Number, 1),
                field("description", "Description", FormFieldType::Textarea, 2),
                field("receipt", "Receipt", FormFieldType::File, 3),
            ],
            created_by: admin.clone(),
            target_folder_id: Some(applications_folder.id.clone()),
        };
        new_form.validate()?;
        let form = store.forms.create(new_form).await?;

        let new_route = NewApprovalRoute {
            name: "Manager Approval".to_string(),
            description: Some("Route for manager approval".to_string()),
            steps: vec![NewRouteStep { approver_id: admin.clone(), order: 1 }],
            created_by: admin.clone(),
        };
        new_route.validate()?;
        let route = store.routes.create(new_route).await?;

        let mut form_data = FormData::new();
        form_data.insert("amount".to_string(), json!(100.0));
        form_data.insert("description".to_string(), json!("Office supplies"));
        form_data.insert("receipt".to_string(), json!("uploads/receipt.jpg"));
        let application = store
            .applications
            .create(NewApplication {
                form_id: form.id.clone(),
                route_id: route.id.clone(),
                applicant_id: user,
                form_data,
            })
            .await?;

        Ok(SeedResult {
            users: SEED_USERS.iter().map(|(id, _)| UserId::new(*id)).collect(),
            root_folder_id: root.id,
            documents_folder_id: documents_folder.id,
            applications_folder_id: applications_folder.id,
            sample_document_id: sample_document.id,
            form_id: form.id,
            route_id: route.id,
            application_id: application.id,
        })
    }
}

fn field(name: &str, label: &str, field_type: FormFieldType, order: u32) -> NewFormField {
    NewFormField {
        name: name.to_string(),
        label: label.to_string(),
        field_type,
        required: true,
        options: None,
        default_value: None,
        order,
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SeedResult {
    pub users: Vec<UserId>,
    pub root_folder_id: FolderId,
    pub documents_folder_id: FolderId,
    pub applications_folder_id: FolderId,
    pub sample_document_id: DocumentId,
    pub form_id: FormId,
    pub route_id: RouteId,
    pub application_id: ApplicationId,
}
