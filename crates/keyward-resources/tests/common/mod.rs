use keyward_core::memory::InMemoryService;
use keyward_core::{
    ApplyOptions, ApplyResult, CancellationToken, DesiredSet, GlobalState, Provider, StateManager,
};
use keyward_resources::{
    ASSIGNMENTS_FAMILY, CREDENTIALS_FAMILY, ROLES_FAMILY, TEMPLATES_FAMILY, catalog,
};
use std::sync::Arc;
use tempfile::TempDir;

/// Provider wired to one in-memory service per family
pub struct TestBackend {
    pub credentials: Arc<InMemoryService>,
    pub templates: Arc<InMemoryService>,
    pub roles: Arc<InMemoryService>,
    pub assignments: Arc<InMemoryService>,
    pub provider: Provider,
    pub root: TempDir,
}

impl TestBackend {
    pub fn new() -> Self {
        let credentials = Arc::new(
            InMemoryService::new(CREDENTIALS_FAMILY)
                .with_id_prefix("cred-")
                .hiding("external_id")
                .hiding("secret_access_key")
                .hiding("service_account_key")
                .hiding("client_secret")
                .hiding("token"),
        );
        let templates = Arc::new(InMemoryService::new(TEMPLATES_FAMILY).with_id_prefix("tpl-"));
        let roles = Arc::new(InMemoryService::new(ROLES_FAMILY));
        let assignments =
            Arc::new(InMemoryService::new(ASSIGNMENTS_FAMILY).with_id_prefix("asg-"));

        let provider = Provider::new(catalog())
            .with_service(credentials.clone())
            .with_service(templates.clone())
            .with_service(roles.clone())
            .with_service(assignments.clone());

        Self {
            credentials,
            templates,
            roles,
            assignments,
            provider,
            root: tempfile::tempdir().unwrap(),
        }
    }

    #[allow(dead_code)]
    pub fn state_manager(&self) -> StateManager {
        StateManager::new(self.root.path())
    }

    /// Apply with default options and fail the test on any failed instance
    #[allow(dead_code)]
    pub async fn apply(&self, desired: &DesiredSet, state: &mut GlobalState) -> ApplyResult {
        let result = self
            .provider
            .apply_all(
                desired,
                state,
                &ApplyOptions::default(),
                &CancellationToken::new(),
            )
            .await;
        assert!(result.is_success(), "apply failed: {:?}", result.failed);
        result
    }

    #[allow(dead_code)]
    pub fn clear_calls(&self) {
        self.credentials.clear_calls();
        self.templates.clear_calls();
        self.roles.clear_calls();
        self.assignments.clear_calls();
    }
}
