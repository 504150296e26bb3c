use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use docroute_core::access::FolderAccess;
use docroute_core::domain::application::{
    Application, ApplicationFilter, ApplicationId, NewApplication,
};
use docroute_core::domain::document::{Document, DocumentId, NewDocument};
use docroute_core::domain::folder::{Folder, FolderId, FolderPermission, NewFolder};
use docroute_core::domain::form::{ApprovalForm, FormId, NewApprovalForm};
use docroute_core::domain::principal::UserId;
use docroute_core::domain::progress::StepProgress;
use docroute_core::domain::route::{ApprovalRoute, NewApprovalRoute, RouteId, StepId};
use docroute_core::errors::RepositoryError;
use docroute_core::store::{
    ApplicationRepository, FormRepository, RouteRepository, StepProgressRepository,
};

use super::{DocumentRepository, FolderRepository};

#[derive(Default)]
pub struct InMemoryRouteRepository {
    routes: RwLock<HashMap<String, ApprovalRoute>>,
}

#[async_trait]
impl RouteRepository for InMemoryRouteRepository {
    async fn find_by_id(&self, id: &RouteId) -> Result<Option<ApprovalRoute>, RepositoryError> {
        let routes = self.routes.read().await;
        Ok(routes.get(id.as_str()).cloned())
    }

    async fn list(&self) -> Result<Vec<ApprovalRoute>, RepositoryError> {
        let routes = self.routes.read().await;
        let mut listed: Vec<_> = routes.values().cloned().collect();
        listed.sort_by(|left, right| left.created_at.cmp(&right.created_at));
        Ok(listed)
    }

    async fn create(&self, route: NewApprovalRoute) -> Result<ApprovalRoute, RepositoryError> {
        let route = route.into_route(RouteId::generate(), Utc::now());
        let mut routes = self.routes.write().await;
        routes.insert(route.id.0.clone(), route.clone());
        Ok(route)
    }

    async fn save(&self, mut route: ApprovalRoute) -> Result<ApprovalRoute, RepositoryError> {
        let mut routes = self.routes.write().await;
        if !routes.contains_key(route.id.as_str()) {
            return Err(RepositoryError::Missing { kind: "route", id: route.id.0 });
        }
        route.updated_at = Utc::now();
        routes.insert(route.id.0.clone(), route.clone());
        Ok(route)
    }

    async fn delete(&self, id: &RouteId) -> Result<bool, RepositoryError> {
        let mut routes = self.routes.write().await;
        Ok(routes.remove(id.as_str()).is_some())
    }
}

#[derive(Default)]
pub struct InMemoryFormRepository {
    forms: RwLock<HashMap<String, ApprovalForm>>,
}

#[async_trait]
impl FormRepository for InMemoryFormRepository {
    async fn find_by_id(&self, id: &FormId) -> Result<Option<ApprovalForm>, RepositoryError> {
        let forms = self.forms.read().await;
        Ok(forms.get(id.as_str()).cloned())
    }

    async fn list(&self) -> Result<Vec<ApprovalForm>, RepositoryError> {
        let forms = self.forms.read().await;
        let mut listed: Vec<_> = forms.values().cloned().collect();
        listed.sort_by(|left, right| left.created_at.cmp(&right.created_at));
        Ok(listed)
    }

    async fn create(&self, form: NewApprovalForm) -> Result<ApprovalForm, RepositoryError> {
        let form = form.into_form(FormId::generate(), Utc::now());
        let mut forms = self.forms.write().await;
        forms.insert(form.id.0.clone(), form.clone());
        Ok(form)
    }

    async fn save(&self, mut form: ApprovalForm) -> Result<ApprovalForm, RepositoryError> {
        let mut forms = self.forms.write().await;
        if !forms.contains_key(form.id.as_str()) {
            return Err(RepositoryError::Missing { kind: "form", id: form.id.0 });
        }
        form.updated_at = Utc::now();
        forms.insert(form.id.0.clone(), form.clone());
        Ok(form)
    }

    async fn delete(&self, id: &FormId) -> Result<bool, RepositoryError> {
        let mut forms = self.forms.write().await;
        Ok(forms.remove(id.as_str()).is_some())
    }
}

#[derive(Default)]
pub struct InMemoryApplicationRepository {
    applications: RwLock<HashMap<String, Application>>,
}

#[async_trait]
impl ApplicationRepository for InMemoryApplicationRepository {
    async fn find_by_id(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<Application>, RepositoryError> {
        let applications = self.applications.read().await;
        Ok(applications.get(id.as_str()).cloned())
    }

    async fn list_by(
        &self,
        filter: &ApplicationFilter,
    ) -> Result<Vec<Application>, RepositoryError> {
        let applications = self.applications.read().await;
        let mut listed: Vec<_> =
            applications.values().filter(|application| filter.matches(application)).cloned().collect();
        listed.sort_by(|left, right| left.created_at.cmp(&right.created_at));
        Ok(listed)
    }

    async fn create(&self, application: NewApplication) -> Result<Application, RepositoryError> {
        let application = application.into_application(ApplicationId::generate(), Utc::now());
        let mut applications = self.applications.write().await;
        applications.insert(application.id.0.clone(), application.clone());
        Ok(application)
    }

    async fn update(
        &self,
        mut application: Application,
        expected_version: u64,
    ) -> Result<Application, RepositoryError> {
        let mut applications = self.applications.write().await;
        let stored = applications.get(application.id.as_str()).ok_or_else(|| {
            RepositoryError::Missing { kind: "application", id: application.id.0.clone() }
        })?;
        if stored.state_version != expected_version {
            return Err(RepositoryError::VersionConflict {
                kind: "application",
                id: application.id.0.clone(),
                expected: expected_version,
                actual: stored.state_version,
            });
        }

        application.state_version = expected_version + 1;
        application.updated_at = Utc::now();
        applications.insert(application.id.0.clone(), application.clone());
        Ok(application)
    }

    async fn delete(&self, id: &ApplicationId) -> Result<bool, RepositoryError> {
        let mut applications = self.applications.write().await;
        Ok(applications.remove(id.as_str()).is_some())
    }
}

#[derive(Default)]
pub struct InMemoryStepProgressRepository {
    rows: RwLock<HashMap<(String, String), StepProgress>>,
}

#[async_trait]
impl StepProgressRepository for InMemoryStepProgressRepository {
    async fn record(&self, progress: StepProgress) -> Result<(), RepositoryError> {
        let mut rows = self.rows.write().await;
        let key = (progress.application_id.0.clone(), progress.step_id.0.clone());
        rows.insert(key, progress);
        Ok(())
    }

    async fn list_for_application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Vec<StepProgress>, RepositoryError> {
        let rows = self.rows.read().await;
        let mut listed: Vec<_> = rows
            .values()
            .filter(|row| &row.application_id == application_id)
            .cloned()
            .collect();
        listed.sort_by_key(|row| row.position);
        Ok(listed)
    }

    async fn remove(
        &self,
        application_id: &ApplicationId,
        step_id: &StepId,
    ) -> Result<(), RepositoryError> {
        let mut rows = self.rows.write().await;
        rows.remove(&(application_id.0.clone(), step_id.0.clone()));
        Ok(())
    }

    async fn remove_all(&self, application_id: &ApplicationId) -> Result<(), RepositoryError> {
        let mut rows = self.rows.write().await;
        rows.retain(|(application, _), _| application != application_id.as_str());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryFolderRepository {
    folders: RwLock<HashMap<String, Folder>>,
}

#[async_trait]
impl FolderRepository for InMemoryFolderRepository {
    async fn find_by_id(&self, id: &FolderId) -> Result<Option<Folder>, RepositoryError> {
        let folders = self.folders.read().await;
        Ok(folders.get(id.as_str()).cloned())
    }

    async fn list(&self) -> Result<Vec<Folder>, RepositoryError> {
        let folders = self.folders.read().await;
        let mut listed: Vec<_> = folders.values().cloned().collect();
        listed.sort_by(|left, right| left.created_at.cmp(&right.created_at));
        Ok(listed)
    }

    async fn list_children(
        &self,
        parent_id: Option<&FolderId>,
    ) -> Result<Vec<Folder>, RepositoryError> {
        let folders = self.folders.read().await;
        let mut listed: Vec<_> = folders
            .values()
            .filter(|folder| folder.parent_id.as_ref() == parent_id)
            .cloned()
            .collect();
        listed.sort_by(|left, right| left.created_at.cmp(&right.created_at));
        Ok(listed)
    }

    async fn create(&self, folder: NewFolder) -> Result<Folder, RepositoryError> {
        let folder = folder.into_folder(FolderId::generate(), Utc::now());
        let mut folders = self.folders.write().await;
        folders.insert(folder.id.0.clone(), folder.clone());
        Ok(folder)
    }

    async fn save(&self, mut folder: Folder) -> Result<Folder, RepositoryError> {
        let mut folders = self.folders.write().await;
        if !folders.contains_key(folder.id.as_str()) {
            return Err(RepositoryError::Missing { kind: "folder", id: folder.id.0 });
        }
        folder.updated_at = Utc::now();
        folders.insert(folder.id.0.clone(), folder.clone());
        Ok(folder)
    }

    async fn delete(&self, id: &FolderId) -> Result<bool, RepositoryError> {
        let mut folders = self.folders.write().await;
        Ok(folders.remove(id.as_str()).is_some())
    }
}

#[async_trait]
impl FolderAccess for InMemoryFolderRepository {
    async fn has_permission(
        &self,
        folder_id: &FolderId,
        user_id: &UserId,
        level: FolderPermission,
    ) -> Result<bool, RepositoryError> {
        let folders = self.folders.read().await;
        Ok(folders.get(folder_id.as_str()).is_some_and(|folder| folder.has_permission(user_id, level)))
    }
}

#[derive(Default)]
pub struct InMemoryDocumentRepository {
    documents: RwLock<HashMap<String, Document>>,
}

#[async_trait]
impl DocumentRepository for InMemoryDocumentRepository {
    async fn find_by_id(&self, id: &DocumentId) -> Result<Option<Document>, RepositoryError> {
        let documents = self.documents.read().await;
        Ok(documents.get(id.as_str()).cloned())
    }

    async fn list(&self) -> Result<Vec<Document>, RepositoryError> {
        let documents = self.documents.read().await;
        let mut listed: Vec<_> = documents.values().cloned().collect();
        listed.sort_by(|left, right| left.created_at.cmp(&right.created_at));
        Ok(listed)
    }

    async fn list_in_folder(
        &self,
        folder_id: &FolderId,
    ) -> Result<Vec<Document>, RepositoryError> {
        let documents = self.documents.read().await;
        let mut listed: Vec<_> = documents
            .values()
            .filter(|document| document.folder_id.as_ref() == Some(folder_id))
            .cloned()
            .collect();
        listed.sort_by(|left, right| left.created_at.cmp(&right.created_at));
        Ok(listed)
    }

    async fn create(&self, document: NewDocument) -> Result<Document, RepositoryError> {
        let document = document.into_document(DocumentId::generate(), Utc::now());
        let mut documents = self.documents.write().await;
        documents.insert(document.id.0.clone(), document.clone());
        Ok(document)
    }

    async fn save(&self, mut document: Document) -> Result<Document, RepositoryError> {
        let mut documents = self.documents.write().await;
        if !documents.contains_key(document.id.as_str()) {
            return Err(RepositoryError::Missing { kind: "document", id: document.id.0 });
        }
        document.updated_at = Utc::now();
        documents.insert(document.id.0.clone(), document.clone());
        Ok(document)
    }

    async fn delete(&self, id: &DocumentId) -> Result<bool, RepositoryError> {
        let mut documents = self.documents.write().await;
        Ok(documents.remove(id.as_str()).is_some())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use docroute_core::access::FolderAccess;
    use docroute_core::domain::application::{
        ApplicationFilter, ApplicationStatus, FormData, NewApplication,
    };
    use docroute_core::domain::folder::{FolderPermission, NewFolder};
    use docroute_core::domain::form::FormId;
    use docroute_core::domain::principal::UserId;
    use docroute_core::domain::progress::{StepProgress, StepStatus};
    use docroute_core::domain::route::{NewApprovalRoute, NewRouteStep, RouteId, StepId};
    use docroute_core::errors::RepositoryError;
    use docroute_core::store::{ApplicationRepository, RouteRepository, StepProgressRepository};

    use crate::repositories::{
        DocumentRepository, FolderRepository, InMemoryApplicationRepository,
        InMemoryDocumentRepository, InMemoryFolderRepository, InMemoryRouteRepository,
        InMemoryStepProgressRepository,
    };

    fn new_application(applicant: &str) -> NewApplication {
        NewApplication {
            form_id: FormId::new("form-1"),
            route_id: RouteId::new("route-1"),
            applicant_id: UserId::new(applicant),
            form_data: FormData::new(),
        }
    }

    #[tokio::test]
    async fn create_assigns_identity_and_timestamps() {
        let repo = InMemoryRouteRepository::default();
        let route = repo
            .create(NewApprovalRoute {
                name: "Manager Approval".to_string(),
                description: None,
                steps: vec![NewRouteStep { approver_id: UserId::new("admin"), order: 1 }],
                created_by: UserId::new("admin"),
            })
            .await
            .expect("create route");

        assert!(!route.id.as_str().is_empty());
        assert_eq!(route.created_at, route.updated_at);
        let found = repo.find_by_id(&route.id).await.expect("find route");
        assert_eq!(found, Some(route.clone()));

        let saved = repo.save(route.clone()).await.expect("save route");
        assert!(saved.updated_at >= route.updated_at);
        assert!(repo.delete(&route.id).await.expect("delete route"));
        assert!(!repo.delete(&route.id).await.expect("delete twice"));
    }

    #[tokio::test]
    async fn application_update_is_compare_and_swap() {
        let repo = InMemoryApplicationRepository::default();
        let created = repo.create(new_application("user")).await.expect("create application");
        assert_eq!(created.state_version, 0);

        let mut pending = created.clone();
        pending.status = ApplicationStatus::Pending;
        let saved = repo.update(pending.clone(), 0).await.expect("first update wins");
        assert_eq!(saved.state_version, 1);

        let stale = repo.update(pending, 0).await.expect_err("stale version must conflict");
        assert!(matches!(
            stale,
            RepositoryError::VersionConflict { expected: 0, actual: 1, .. }
        ));
    }

    #[tokio::test]
    async fn application_update_of_missing_entity_is_a_store_fault() {
        let repo = InMemoryApplicationRepository::default();
        let other = InMemoryApplicationRepository::default();
        let detached = other.create(new_application("user")).await.expect("create elsewhere");

        let error = repo.update(detached, 0).await.expect_err("missing entity");
        assert!(matches!(error, RepositoryError::Missing { kind: "application", .. }));
    }

    #[tokio::test]
    async fn list_by_applies_the_filter() {
        let repo = InMemoryApplicationRepository::default();
        repo.create(new_application("user")).await.expect("create");
        repo.create(new_application("user")).await.expect("create");
        repo.create(new_application("other")).await.expect("create");

        let mine = repo
            .list_by(&ApplicationFilter::by_applicant(UserId::new("user")))
            .await
            .expect("list");
        assert_eq!(mine.len(), 2);

        let pending = repo
            .list_by(&ApplicationFilter::default().with_status(ApplicationStatus::Pending))
            .await
            .expect("list");
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn step_progress_rows_are_per_application() {
        let repo = InMemoryStepProgressRepository::default();
        let row = |application: &str| StepProgress {
            application_id: docroute_core::ApplicationId::new(application),
            step_id: StepId::new("step-1"),
            position: 0,
            approver_id: UserId::new("alice"),
            status: StepStatus::Approved,
            comment: None,
            decided_at: None,
        };
        repo.record(row("app-1")).await.expect("record");
        repo.record(row("app-2")).await.expect("record");

        let app_1 = docroute_core::ApplicationId::new("app-1");
        assert_eq!(repo.list_for_application(&app_1).await.expect("list").len(), 1);

        repo.remove(&app_1, &StepId::new("step-1")).await.expect("remove");
        assert!(repo.list_for_application(&app_1).await.expect("list").is_empty());

        let app_2 = docroute_core::ApplicationId::new("app-2");
        assert_eq!(repo.list_for_application(&app_2).await.expect("list").len(), 1);
        repo.remove_all(&app_2).await.expect("remove all");
        assert!(repo.list_for_application(&app_2).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn folder_repository_answers_permission_checks() {
        let repo = InMemoryFolderRepository::default();
        let mut root = repo
            .create(NewFolder {
                name: "Root".to_string(),
                parent_id: None,
                created_by: UserId::new("admin"),
            })
            .await
            .expect("create root");
        root.grant(UserId::new("user"), FolderPermission::Read);
        let root = repo.save(root).await.expect("save root");

        let user = UserId::new("user");
        assert!(repo.has_permission(&root.id, &user, FolderPermission::Read).await.expect("check"));
        assert!(!repo.has_permission(&root.id, &user, FolderPermission::Write).await.expect("check"));
        assert!(repo
            .has_permission(&root.id, &UserId::new("admin"), FolderPermission::Admin)
            .await
            .expect("check"));

        let missing = docroute_core::FolderId::new("missing");
        assert!(!repo.has_permission(&missing, &user, FolderPermission::Read).await.expect("check"));

        let child = repo
            .create(NewFolder {
                name: "Documents".to_string(),
                parent_id: Some(root.id.clone()),
                created_by: UserId::new("admin"),
            })
            .await
            .expect("create child");
        let children = repo.list_children(Some(&root.id)).await.expect("children");
        assert_eq!(children.iter().map(|folder| folder.id.clone()).collect::<Vec<_>>(), vec![child.id]);
        assert_eq!(repo.list_children(None).await.expect("top level").len(), 1);
    }

    #[tokio::test]
    async fn documents_are_listed_per_folder() {
        let repo = InMemoryDocumentRepository::default();
        let folder = docroute_core::FolderId::new("folder-1");
        let new_document = |folder_id| docroute_core::domain::document::NewDocument {
            name: "notes.txt".to_string(),
            folder_id,
            file_path: "documents/notes.txt".to_string(),
            file_type: "text/plain".to_string(),
            file_size: 5,
            created_by: UserId::new("user"),
            metadata: BTreeMap::new(),
        };
        repo.create(new_document(Some(folder.clone()))).await.expect("create filed");
        repo.create(new_document(None)).await.expect("create unfiled");

        assert_eq!(repo.list_in_folder(&folder).await.expect("list").len(), 1);
        assert_eq!(repo.list().await.expect("list").len(), 2);
    }
}
