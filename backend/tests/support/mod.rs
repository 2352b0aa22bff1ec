#![allow(dead_code)]
//! In-memory collaborators and HTTP helpers for driving the full router.

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request as HttpRequest, StatusCode},
    Router,
};
use chrono::{DateTime, Utc};
use http_body_util::BodyExt;
use portal_backend::{
    config::{Config, SmtpConfig},
    error::AppError,
    models::{
        request::{Request, RequestChanges, RequestStatus, StatusCount},
        user::{Employee, UserRole},
    },
    repositories::{EmployeeDirectoryTrait, RequestFilter, RequestRepositoryTrait},
    services::{NotificationDispatcher, RequestLifecycleService},
    state::AppState,
    types::{EmployeeId, RequestId},
    utils::jwt::create_access_token,
};
use serde_json::Value;
use tower::ServiceExt;

pub const TEST_JWT_SECRET: &str = "test-secret";

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://unused".into(),
        database_max_connections: 1,
        jwt_secret: TEST_JWT_SECRET.into(),
        jwt_expiration_hours: 1,
        time_zone: chrono_tz::Asia::Ho_Chi_Minh,
        bind_address: SocketAddr::from(([127, 0, 0, 1], 0)),
        cors_allow_origins: Vec::new(),
        smtp: SmtpConfig {
            host: "localhost".into(),
            port: 2525,
            username: String::new(),
            password: String::new(),
            from_address: "noreply@portal.local".into(),
            skip_send: true,
        },
        portal_url: "http://portal.local".into(),
    }
}

#[derive(Default)]
pub struct InMemoryDirectory {
    employees: Mutex<HashMap<EmployeeId, Employee>>,
}

impl InMemoryDirectory {
    pub fn add(&self, name: &str, role: UserRole, department: Option<&str>) -> Employee {
        let employee = Employee {
            emp_id: EmployeeId::new(),
            full_name: name.to_string(),
            email: format!("{}@portal.local", name.to_lowercase()),
            department: department.map(str::to_string),
            role,
            created_at: Utc::now(),
        };
        self.employees
            .lock()
            .unwrap()
            .insert(employee.emp_id, employee.clone());
        employee
    }

    pub fn transfer(&self, emp_id: EmployeeId, department: Option<&str>) {
        if let Some(employee) = self.employees.lock().unwrap().get_mut(&emp_id) {
            employee.department = department.map(str::to_string);
        }
    }

    fn department(&self, emp_id: EmployeeId) -> Option<String> {
        self.employees
            .lock()
            .unwrap()
            .get(&emp_id)
            .and_then(|e| e.department.clone())
    }
}

#[async_trait]
impl EmployeeDirectoryTrait for InMemoryDirectory {
    async fn find_employee(&self, emp_id: EmployeeId) -> Result<Option<Employee>, AppError> {
        Ok(self.employees.lock().unwrap().get(&emp_id).cloned())
    }

    async fn department_of(&self, emp_id: EmployeeId) -> Result<Option<String>, AppError> {
        Ok(self.department(emp_id))
    }

    async fn departments_of(
        &self,
        emp_ids: Vec<EmployeeId>,
    ) -> Result<HashMap<EmployeeId, String>, AppError> {
        Ok(emp_ids
            .into_iter()
            .filter_map(|id| self.department(id).map(|d| (id, d)))
            .collect())
    }

    async fn find_managers(&self, department: String) -> Result<Vec<Employee>, AppError> {
        Ok(self
            .employees
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.role == UserRole::Manager && e.department.as_deref() == Some(department.as_str()))
            .cloned()
            .collect())
    }
}

/// Request store whose guarded writes check and mutate under one lock, the
/// same atomicity the SQL `WHERE status = 'pending'` gives.
pub struct InMemoryRequestStore {
    rows: Mutex<HashMap<RequestId, Request>>,
    directory: Arc<InMemoryDirectory>,
}

impl InMemoryRequestStore {
    pub fn new(directory: Arc<InMemoryDirectory>) -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            directory,
        }
    }

    pub fn get(&self, id: RequestId) -> Option<Request> {
        self.rows.lock().unwrap().get(&id).cloned()
    }

    pub fn insert(&self, request: Request) {
        self.rows.lock().unwrap().insert(request.request_id, request);
    }

    fn matching(&self, keep: impl Fn(&Request) -> bool, filter: RequestFilter) -> Vec<Request> {
        let mut rows: Vec<Request> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|r| keep(*r))
            .filter(|r| filter.request_type.map_or(true, |t| r.request_type == t))
            .filter(|r| filter.status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.request_date.cmp(&a.request_date));
        rows
    }

    fn approval_rows(
        &self,
        role: UserRole,
        department: Option<String>,
        filter: RequestFilter,
    ) -> Vec<Request> {
        let department = match (role, department) {
            (UserRole::Admin, _) => None,
            (UserRole::Manager, Some(d)) => Some(d),
            _ => return Vec::new(),
        };
        let directory = self.directory.clone();
        self.matching(
            move |r| {
                r.is_pending()
                    && department
                        .as_ref()
                        .map_or(true, |d| directory.department(r.emp_id).as_ref() == Some(d))
            },
            RequestFilter {
                status: None,
                ..filter
            },
        )
    }

    fn guarded(&self, id: RequestId, apply: impl FnOnce(&mut Request)) -> bool {
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(&id) {
            Some(row) if row.is_pending() => {
                apply(row);
                true
            }
            _ => false,
        }
    }
}

fn window(rows: Vec<Request>, limit: i64, offset: i64) -> Vec<Request> {
    rows.into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect()
}

#[async_trait]
impl RequestRepositoryTrait for InMemoryRequestStore {
    async fn create(&self, request: &Request) -> Result<Request, AppError> {
        self.insert(request.clone());
        Ok(request.clone())
    }

    async fn find_by_id(&self, id: RequestId) -> Result<Option<Request>, AppError> {
        Ok(self.get(id))
    }

    async fn find_by_employee_id(
        &self,
        emp_id: EmployeeId,
        filter: RequestFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Request>, AppError> {
        Ok(window(
            self.matching(|r| r.emp_id == emp_id, filter),
            limit,
            offset,
        ))
    }

    async fn count_by_employee_id(
        &self,
        emp_id: EmployeeId,
        filter: RequestFilter,
    ) -> Result<i64, AppError> {
        Ok(self.matching(|r| r.emp_id == emp_id, filter).len() as i64)
    }

    async fn find_for_approval(
        &self,
        role: UserRole,
        department: Option<String>,
        filter: RequestFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Request>, AppError> {
        Ok(window(
            self.approval_rows(role, department, filter),
            limit,
            offset,
        ))
    }

    async fn count_for_approval(
        &self,
        role: UserRole,
        department: Option<String>,
        filter: RequestFilter,
    ) -> Result<i64, AppError> {
        Ok(self.approval_rows(role, department, filter).len() as i64)
    }

    async fn update(
        &self,
        id: RequestId,
        changes: &RequestChanges,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        Ok(self.guarded(id, |row| {
            if let Some(title) = &changes.title {
                row.title = title.clone();
            }
            if let Some(content) = &changes.content {
                row.content = content.clone();
            }
            if let Some(attached_file) = &changes.attached_file {
                row.attached_file = attached_file.clone();
            }
            row.updated_at = at;
        }))
    }

    async fn approve(
        &self,
        id: RequestId,
        approver: EmployeeId,
        approver_role: UserRole,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        Ok(self.guarded(id, |row| {
            row.status = RequestStatus::Approved;
            row.approved_by = Some(approver);
            row.approver_role = Some(approver_role);
            row.approved_date = Some(at);
            row.rejection_reason = None;
            row.updated_at = at;
        }))
    }

    async fn reject(
        &self,
        id: RequestId,
        reason: &str,
        approver: EmployeeId,
        approver_role: UserRole,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        Ok(self.guarded(id, |row| {
            row.status = RequestStatus::Rejected;
            row.approved_by = Some(approver);
            row.approver_role = Some(approver_role);
            row.approved_date = Some(at);
            row.rejection_reason = Some(reason.to_string());
            row.updated_at = at;
        }))
    }

    async fn delete(&self, id: RequestId) -> Result<bool, AppError> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get(&id) {
            Some(row) if row.is_pending() => {
                rows.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get_statistics(
        &self,
        emp_id: Option<EmployeeId>,
        department: Option<String>,
    ) -> Result<Vec<StatusCount>, AppError> {
        let rows = self.rows.lock().unwrap();
        let mut counts: HashMap<RequestStatus, i64> = HashMap::new();
        for row in rows.values() {
            if emp_id.is_some_and(|id| row.emp_id != id) {
                continue;
            }
            if let Some(department) = &department {
                if self.directory.department(row.emp_id).as_ref() != Some(department) {
                    continue;
                }
            }
            *counts.entry(row.status).or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(status, count)| StatusCount { status, count })
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    NewRequest {
        request_id: RequestId,
        submitter: EmployeeId,
    },
    Approved {
        request_id: RequestId,
        approver: EmployeeId,
    },
    Rejected {
        request_id: RequestId,
        reason: String,
    },
}

/// Records every dispatch; optionally fails each one after recording it.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<NotificationEvent>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Notifications run on detached tasks; poll until `count` arrived.
    pub async fn wait_for(&self, count: usize) -> Vec<NotificationEvent> {
        for _ in 0..100 {
            let events = self.events();
            if events.len() >= count {
                return events;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.events()
    }

    fn record(&self, event: NotificationEvent) -> anyhow::Result<()> {
        self.events.lock().unwrap().push(event);
        if self.fail {
            anyhow::bail!("smtp unavailable");
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingNotifier {
    async fn notify_managers_of_new_request(
        &self,
        request: &Request,
        submitter: &Employee,
    ) -> anyhow::Result<()> {
        self.record(NotificationEvent::NewRequest {
            request_id: request.request_id,
            submitter: submitter.emp_id,
        })
    }

    async fn notify_approval(&self, request: &Request, approver: &Employee) -> anyhow::Result<()> {
        self.record(NotificationEvent::Approved {
            request_id: request.request_id,
            approver: approver.emp_id,
        })
    }

    async fn notify_rejection(
        &self,
        request: &Request,
        _approver: &Employee,
        reason: &str,
    ) -> anyhow::Result<()> {
        self.record(NotificationEvent::Rejected {
            request_id: request.request_id,
            reason: reason.to_string(),
        })
    }
}

pub struct TestApp {
    pub router: Router,
    pub lifecycle: RequestLifecycleService,
    pub directory: Arc<InMemoryDirectory>,
    pub store: Arc<InMemoryRequestStore>,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_notifier(RecordingNotifier::default())
    }

    pub fn with_notifier(notifier: RecordingNotifier) -> Self {
        let directory = Arc::new(InMemoryDirectory::default());
        let store = Arc::new(InMemoryRequestStore::new(directory.clone()));
        let notifier = Arc::new(notifier);
        let lifecycle =
            RequestLifecycleService::new(store.clone(), directory.clone(), notifier.clone());
        let state = AppState::new(test_config(), lifecycle.clone(), directory.clone());
        Self {
            router: portal_backend::app(state),
            lifecycle,
            directory,
            store,
            notifier,
        }
    }

    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        as_employee: Option<&Employee>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = HttpRequest::builder().method(method).uri(uri);
        if let Some(employee) = as_employee {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token_for(employee)));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }
}

pub fn token_for(employee: &Employee) -> String {
    create_access_token(
        employee.emp_id.to_string(),
        employee.role.as_str().to_string(),
        TEST_JWT_SECRET,
        1,
    )
    .expect("create token")
}
