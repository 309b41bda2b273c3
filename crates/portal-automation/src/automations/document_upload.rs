//! Partner-portal document upload.
//!
//! Logs in, opens the employee's profile, uploads the primary document and
//! any additional ones, then checks that the portal lists uploaded
//! documents. A missing listing is a verification failure even when every
//! step before it succeeded.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::context::AutomationContext;
use crate::error::AutomationError;
use crate::lifecycle::Automation;
use crate::selectors::{Selector, SelectorRegistry, Target};
use crate::task::{AuditEvent, AutomationResult, Task};

/// Task type handled by this automation.
pub const DOCUMENT_UPLOAD: &str = "document_upload";

/// Selector targets the steps look up.
pub const REQUIRED_TARGETS: &[&str] = &[
    "login.username",
    "login.password",
    "login.submit",
    "dashboard",
    "employee.search_input",
    "employee.search_submit",
    "employee.search_result",
    "employee.profile",
    "documents.tab",
    "upload.trigger",
    "upload.file_input",
    "upload.success",
    "documents.uploaded_item",
];

/// Where the partner portal lives.
#[derive(Debug, Clone)]
pub struct PortalSettings {
    pub base_url: String,
    pub login_path: String,
    pub service_name: String,
}

impl Default for PortalSettings {
    fn default() -> Self {
        Self {
            base_url: "https://portal.partner-hr.com".to_string(),
            login_path: "/login".to_string(),
            service_name: "partner_portal".to_string(),
        }
    }
}

/// `input_data` payload for a document upload task.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentUploadInput {
    /// Employee identifier as known to the portal.
    pub employee_id: String,

    /// Local path of the primary document.
    pub document_path: PathBuf,

    #[serde(default)]
    pub additional_documents: Vec<PathBuf>,

    #[serde(default)]
    pub document_type: Option<String>,

    /// Overrides the configured portal base URL.
    #[serde(default)]
    pub portal_url: Option<String>,

    /// Overrides the configured credential service name.
    #[serde(default)]
    pub service_name: Option<String>,
}

impl DocumentUploadInput {
    fn validate(&self) -> Result<(), AutomationError> {
        if self.employee_id.trim().is_empty() {
            return Err(AutomationError::InvalidInput("employee_id is empty".to_string()));
        }
        if self.document_path.as_os_str().is_empty() {
            return Err(AutomationError::InvalidInput("document_path is empty".to_string()));
        }
        Ok(())
    }
}

pub struct DocumentUploadAutomation {
    input: DocumentUploadInput,
    portal: Arc<PortalSettings>,
    selectors: Arc<SelectorRegistry>,
}

impl DocumentUploadAutomation {
    pub fn new(
        input: DocumentUploadInput,
        portal: Arc<PortalSettings>,
        selectors: Arc<SelectorRegistry>,
    ) -> Result<Self, AutomationError> {
        input.validate()?;
        Ok(Self {
            input,
            portal,
            selectors,
        })
    }

    pub fn from_task(
        task: &Task,
        portal: Arc<PortalSettings>,
        selectors: Arc<SelectorRegistry>,
    ) -> Result<Self, AutomationError> {
        let input: DocumentUploadInput = serde_json::from_value(task.input_data.clone())
            .map_err(|e| AutomationError::InvalidInput(e.to_string()))?;
        Self::new(input, portal, selectors)
    }

    fn target(&self, name: &str) -> Result<Target, AutomationError> {
        self.selectors.target(name)
    }

    fn base_url(&self) -> &str {
        self.input
            .portal_url
            .as_deref()
            .unwrap_or(&self.portal.base_url)
            .trim_end_matches('/')
    }

    fn service_name(&self) -> &str {
        self.input
            .service_name
            .as_deref()
            .unwrap_or(&self.portal.service_name)
    }

    async fn authenticate(&self, ctx: &mut AutomationContext) -> Result<(), AutomationError> {
        // Fail fast: no browser is launched without credentials.
        let credentials = ctx.credentials(self.service_name()).await?;

        let login_url = format!("{}{}", self.base_url(), self.portal.login_path);
        ctx.audit(
            AuditEvent::Navigation,
            "Navigating to portal login",
            json!({ "url": login_url }),
        )
        .await;

        let username = self.target("login.username")?;
        let password = self.target("login.password")?;
        let submit = self.target("login.submit")?;
        let dashboard = self.target("dashboard")?;

        let page = ctx.page().await?;
        page.goto(&login_url).await?;
        page.fill(&username, &credentials.username).await?;
        page.fill(&password, &credentials.password).await?;
        page.click(&submit).await?;
        page.wait_for(&dashboard).await?;
        drop(credentials);

        ctx.audit(
            AuditEvent::Authentication,
            "Logged in to portal",
            json!({ "service": self.service_name() }),
        )
        .await;
        ctx.screenshot("after-login").await;
        Ok(())
    }

    async fn open_employee(&self, ctx: &mut AutomationContext) -> Result<(), AutomationError> {
        let search = self.target("employee.search_input")?;
        let submit = self.target("employee.search_submit")?;
        let result = self.target("employee.search_result")?;
        let profile = self.target("employee.profile")?;

        let page = ctx.page().await?;
        page.fill(&search, &self.input.employee_id).await?;
        page.click(&submit).await?;
        page.click(&result).await?;
        page.wait_for(&profile).await?;

        ctx.audit(
            AuditEvent::Navigation,
            "Opened employee profile",
            json!({ "employee_id": self.input.employee_id }),
        )
        .await;
        ctx.screenshot("employee-profile").await;
        Ok(())
    }

    async fn open_documents(&self, ctx: &mut AutomationContext) -> Result<(), AutomationError> {
        let tab = self.target("documents.tab")?;
        let trigger = self.target("upload.trigger")?;

        let page = ctx.page().await?;
        page.click(&tab).await?;
        page.wait_for(&trigger).await?;

        ctx.audit(
            AuditEvent::Navigation,
            "Opened documents section",
            json!({ "employee_id": self.input.employee_id }),
        )
        .await;
        Ok(())
    }

    async fn upload(
        &self,
        ctx: &mut AutomationContext,
        path: &PathBuf,
        step: &str,
    ) -> Result<(), AutomationError> {
        let trigger = self.target("upload.trigger")?;
        let file_input = self.target("upload.file_input")?;
        let success = self.target("upload.success")?;

        let page = ctx.page().await?;
        page.click(&trigger).await?;
        page.set_input_files(&file_input, std::slice::from_ref(path))
            .await?;
        page.wait_for(&success).await?;

        ctx.audit(
            AuditEvent::DocumentUpload,
            format!("Uploaded {}", path.display()),
            json!({
                "employee_id": self.input.employee_id,
                "document": path.display().to_string(),
                "document_type": self.input.document_type,
            }),
        )
        .await;
        ctx.screenshot(step).await;
        Ok(())
    }

    async fn verify(&self, ctx: &mut AutomationContext) -> Result<usize, AutomationError> {
        let uploaded = self.target("documents.uploaded_item")?;
        let count = ctx.page().await?.count(&uploaded).await?;

        ctx.audit(
            AuditEvent::Verification,
            format!("Found {count} uploaded document(s)"),
            json!({ "verified_documents": count }),
        )
        .await;
        ctx.screenshot("verification").await;

        if count == 0 {
            return Err(AutomationError::Verification(
                "no uploaded documents found".to_string(),
            ));
        }
        Ok(count)
    }
}

#[async_trait]
impl Automation for DocumentUploadAutomation {
    fn name(&self) -> &'static str {
        DOCUMENT_UPLOAD
    }

    async fn execute(&self, ctx: &mut AutomationContext) -> Result<AutomationResult, AutomationError> {
        self.authenticate(ctx).await?;
        self.open_employee(ctx).await?;
        self.open_documents(ctx).await?;

        self.upload(ctx, &self.input.document_path, "document-uploaded")
            .await?;
        for (i, path) in self.input.additional_documents.iter().enumerate() {
            self.upload(ctx, path, &format!("additional-document-{}", i + 1))
                .await?;
        }

        let verified = self.verify(ctx).await?;
        let uploaded = 1 + self.input.additional_documents.len();

        Ok(AutomationResult::success(
            format!("Uploaded {uploaded} document(s) for employee {}", self.input.employee_id),
            json!({
                "employee_id": self.input.employee_id,
                "documents_uploaded": uploaded,
                "verified_documents": verified,
            }),
        ))
    }
}

/// Built-in selectors for the partner portal.
///
/// Placeholders; none have been checked against the live portal. Override
/// them with a selector file rather than editing the steps.
pub fn default_selectors() -> SelectorRegistry {
    let mut r = SelectorRegistry::new();
    r.insert(
        "login.username",
        vec![
            Selector::css("input[name='username']"),
            Selector::css("input[type='email']"),
            Selector::css("#username"),
        ],
    );
    r.insert(
        "login.password",
        vec![
            Selector::css("input[name='password']"),
            Selector::css("input[type='password']"),
        ],
    );
    r.insert(
        "login.submit",
        vec![
            Selector::css("button[type='submit']"),
            Selector::text("Sign in"),
            Selector::role("button", Some("Log in")),
        ],
    );
    r.insert(
        "dashboard",
        vec![
            Selector::css("[data-testid='dashboard']"),
            Selector::css(".dashboard"),
            Selector::role("navigation", Some("Main")),
        ],
    );
    r.insert(
        "employee.search_input",
        vec![
            Selector::css("input[type='search']"),
            Selector::css("input[placeholder*='Search']"),
        ],
    );
    r.insert(
        "employee.search_submit",
        vec![
            Selector::css("button[aria-label='Search']"),
            Selector::text("Search"),
        ],
    );
    r.insert(
        "employee.search_result",
        vec![
            Selector::css("[data-testid='search-result']"),
            Selector::css(".search-results tr"),
            Selector::css(".search-results li"),
        ],
    );
    r.insert(
        "employee.profile",
        vec![
            Selector::css("[data-testid='employee-profile']"),
            Selector::css(".employee-profile"),
            Selector::css(".profile-header"),
        ],
    );
    r.insert(
        "documents.tab",
        vec![
            Selector::css("a[href*='documents']"),
            Selector::text("Documents"),
            Selector::role("tab", Some("Documents")),
        ],
    );
    r.insert(
        "upload.trigger",
        vec![
            Selector::css("button[data-action='upload']"),
            Selector::text("Upload Document"),
            Selector::text("Upload"),
        ],
    );
    r.insert("upload.file_input", vec![Selector::css("input[type='file']")]);
    r.insert(
        "upload.success",
        vec![
            Selector::css(".upload-success"),
            Selector::css("[role='alert'].success"),
            Selector::text("uploaded successfully"),
        ],
    );
    r.insert(
        "documents.uploaded_item",
        vec![
            Selector::css("[data-testid='document-row']"),
            Selector::css(".document-list .document-item"),
            Selector::css(".uploaded-document"),
        ],
    );
    r
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::context::Services;
    use crate::lifecycle::LifecycleEngine;
    use crate::memory::{MemoryArtifactStore, MemoryAuditLog, MemoryCredentials, MemoryTaskStore};
    use crate::task::{Credentials, TaskStatus};
    use crate::testing::{fast_timeouts, ScriptedBrowser};
    use uuid::Uuid;

    /// A portal page where every primary selector is present.
    fn portal() -> ScriptedBrowser {
        ScriptedBrowser::new().with_present(&[
            "css=input[name='username']",
            "css=input[name='password']",
            "css=button[type='submit']",
            "css=[data-testid='dashboard']",
            "css=input[type='search']",
            "css=button[aria-label='Search']",
            "css=[data-testid='search-result']",
            "css=[data-testid='employee-profile']",
            "css=a[href*='documents']",
            "text=Upload Document",
            "css=input[type='file']",
            "css=.upload-success",
            "css=[data-testid='document-row']",
        ])
    }

    struct Scenario {
        tenant: Uuid,
        tasks: Arc<MemoryTaskStore>,
        audit: Arc<MemoryAuditLog>,
        artifacts: Arc<MemoryArtifactStore>,
        browser: ScriptedBrowser,
        engine: LifecycleEngine,
    }

    fn scenario(browser: ScriptedBrowser, with_credentials: bool) -> Scenario {
        let tenant = Uuid::new_v4();
        let tasks = Arc::new(MemoryTaskStore::new());
        let audit = Arc::new(MemoryAuditLog::new());
        let artifacts = Arc::new(MemoryArtifactStore::new());
        let mut credentials = MemoryCredentials::new();
        if with_credentials {
            credentials = credentials.with(
                tenant,
                "partner_portal",
                Credentials {
                    username: "payroll@acme.test".to_string(),
                    password: "s3cret".to_string(),
                    api_key: None,
                    additional_data: None,
                },
            );
        }
        let services = Services {
            tasks: tasks.clone(),
            audit: audit.clone(),
            artifacts: artifacts.clone(),
            credentials: Arc::new(credentials),
            launcher: Arc::new(browser.clone()),
        };
        Scenario {
            tenant,
            tasks,
            audit,
            artifacts,
            browser,
            engine: LifecycleEngine::new(services, fast_timeouts()),
        }
    }

    fn upload_task(s: &Scenario, additional: Vec<&str>) -> Task {
        let task = Task::new(
            s.tenant,
            DOCUMENT_UPLOAD,
            json!({
                "employee_id": "EMP-1042",
                "document_path": "/data/docs/passport.pdf",
                "additional_documents": additional,
                "document_type": "identity",
            }),
        );
        s.tasks.insert(task.clone());
        task
    }

    fn automation(task: &Task) -> DocumentUploadAutomation {
        DocumentUploadAutomation::from_task(
            task,
            Arc::new(PortalSettings::default()),
            Arc::new(default_selectors()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_happy_path_completes() {
        let s = scenario(portal(), true);
        let task = upload_task(&s, vec!["/data/docs/i9.pdf"]);

        let result = s.engine.run(&task, &automation(&task)).await;

        assert!(result.success, "{:?}", result);
        let stored = s.tasks.get(task.id).unwrap();
        assert_eq!(stored.status, TaskStatus::Completed);
        assert_eq!(
            stored.output_data,
            Some(json!({
                "employee_id": "EMP-1042",
                "documents_uploaded": 2,
                "verified_documents": 1,
            }))
        );
        assert!(!stored.screenshot_urls.is_empty());
        assert!(s
            .artifacts
            .keys()
            .contains(&format!("{}/document-uploaded.png", task.id)));
        assert!(s
            .artifacts
            .keys()
            .contains(&format!("{}/additional-document-1.png", task.id)));

        let actions = s.browser.actions();
        assert_eq!(actions[0], "goto https://portal.partner-hr.com/login");
        assert!(actions.contains(
            &"upload css=input[type='file'] /data/docs/passport.pdf".to_string()
        ));
        assert!(actions.contains(&"upload css=input[type='file'] /data/docs/i9.pdf".to_string()));
        assert!(s.browser.all_closed());

        let events = s.audit.event_types(task.id);
        assert_eq!(
            events
                .iter()
                .filter(|e| **e == AuditEvent::DocumentUpload)
                .count(),
            2
        );
        assert_eq!(events.last(), Some(&AuditEvent::TaskCompleted));
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_before_navigation() {
        let s = scenario(portal(), false);
        let task = upload_task(&s, vec![]);

        let result = s.engine.run(&task, &automation(&task)).await;

        assert!(!result.success);
        let stored = s.tasks.get(task.id).unwrap();
        assert_eq!(stored.status, TaskStatus::Failed);
        assert!(stored
            .error_message
            .unwrap()
            .starts_with("Credentials not found for service 'partner_portal'"));

        let events = s.audit.event_types(task.id);
        assert!(!events.contains(&AuditEvent::Navigation));
        assert!(events.contains(&AuditEvent::TaskError));
        assert_eq!(s.browser.launches(), 0);
        assert!(s.browser.actions().is_empty());
    }

    #[tokio::test]
    async fn test_ui_timeout_fails_with_error_screenshot() {
        let s = scenario(portal().without("css=[data-testid='employee-profile']"), true);
        let task = upload_task(&s, vec![]);

        let result = s.engine.run(&task, &automation(&task)).await;

        assert!(!result.success);
        let stored = s.tasks.get(task.id).unwrap();
        assert_eq!(stored.status, TaskStatus::Failed);
        assert_eq!(
            stored.error_message.as_deref(),
            Some("Timed out after 50ms waiting for employee.profile")
        );
        assert!(stored
            .screenshot_urls
            .iter()
            .any(|url| url.ends_with("/error.png")));
        assert!(s.audit.event_types(task.id).contains(&AuditEvent::TaskError));
        assert!(s.browser.all_closed());
        assert_eq!(s.browser.actions().last().map(String::as_str), Some("close"));
    }

    #[tokio::test]
    async fn test_zero_uploaded_documents_is_verification_failure() {
        let s = scenario(portal().without("css=[data-testid='document-row']"), true);
        let task = upload_task(&s, vec![]);

        let result = s.engine.run(&task, &automation(&task)).await;

        assert!(!result.success);
        let stored = s.tasks.get(task.id).unwrap();
        assert_eq!(stored.status, TaskStatus::Failed);
        assert_eq!(
            stored.error_message.as_deref(),
            Some("Verification failed: no uploaded documents found")
        );
        assert!(s.audit.event_types(task.id).contains(&AuditEvent::Verification));
        assert!(s.browser.all_closed());
    }

    #[tokio::test]
    async fn test_fallback_selector_is_used() {
        let browser = portal()
            .without("css=button[type='submit']")
            .with_present(&["text=Sign in"]);
        let s = scenario(browser, true);
        let task = upload_task(&s, vec![]);

        let result = s.engine.run(&task, &automation(&task)).await;

        assert!(result.success, "{:?}", result);
        assert!(s.browser.actions().contains(&"click text=Sign in".to_string()));
    }

    #[tokio::test]
    async fn test_portal_url_override() {
        let s = scenario(portal(), true);
        let task = Task::new(
            s.tenant,
            DOCUMENT_UPLOAD,
            json!({
                "employee_id": "EMP-7",
                "document_path": "/tmp/a.pdf",
                "portal_url": "https://staging.partner-hr.com/",
            }),
        );
        s.tasks.insert(task.clone());

        s.engine.run(&task, &automation(&task)).await;

        assert_eq!(s.browser.actions()[0], "goto https://staging.partner-hr.com/login");
    }

    #[test]
    fn test_invalid_input_rejected() {
        let task = Task::new(Uuid::new_v4(), DOCUMENT_UPLOAD, json!({ "employee_id": "" , "document_path": "/x"}));
        let result = DocumentUploadAutomation::from_task(
            &task,
            Arc::new(PortalSettings::default()),
            Arc::new(default_selectors()),
        );
        assert!(matches!(result, Err(AutomationError::InvalidInput(_))));

        let task = Task::new(Uuid::new_v4(), DOCUMENT_UPLOAD, json!({ "employee_id": "E1" }));
        let result = DocumentUploadAutomation::from_task(
            &task,
            Arc::new(PortalSettings::default()),
            Arc::new(default_selectors()),
        );
        assert!(matches!(result, Err(AutomationError::InvalidInput(_))));
    }

    #[test]
    fn test_default_selectors_cover_required_targets() {
        assert!(default_selectors().validate(REQUIRED_TARGETS).is_ok());
    }
}
