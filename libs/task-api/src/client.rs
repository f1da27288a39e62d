use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::poll::{self, PollEvent, PollHandle, StatusSource};
use crate::result::{ClientError, Result};
use crate::types::project::*;
use crate::types::task::*;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for the task orchestration API.
///
/// Cloning is cheap; clones share the connection pool and may be used from
/// any number of polling sessions at once.
#[derive(Debug, Clone)]
pub struct Client {
    base_url: Url,
    token: Option<String>,
    client: reqwest::Client,
}

impl Client {
    pub fn new(base_url: Url, token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            base_url: with_trailing_slash(base_url),
            token,
            client,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Latest status snapshot of a task. Never retries.
    pub async fn fetch_status(&self, task_id: &str) -> Result<TaskStatusSnapshot> {
        let url = self.endpoint(&["api", "status", non_empty(task_id, "task id")?])?;
        self.send(self.request(Method::GET, url), || format!("task {task_id}"))
            .await
    }

    /// Polls the status of `task_id` every `interval` until it turns terminal.
    /// See [`poll::start_polling`].
    pub fn start_polling<F>(
        &self,
        task_id: &str,
        interval: Duration,
        on_update: F,
    ) -> Result<PollHandle>
    where
        F: FnMut(PollEvent) + Send + 'static,
    {
        poll::start_polling(self.clone(), task_id, interval, on_update)
    }

    pub async fn get_task(&self, task_id: &str) -> Result<Task> {
        let url = self.endpoint(&["api", "tasks", non_empty(task_id, "task id")?])?;
        let task: Task = self
            .send(self.request(Method::GET, url), || format!("task {task_id}"))
            .await?;
        if let Some(problem) = task.inconsistency() {
            log::warn!("{problem}");
        }
        Ok(task)
    }

    /// All tasks the server knows, or only those of `project_id`. The server
    /// has no filter, so it is applied here.
    pub async fn list_tasks(&self, project_id: Option<&str>) -> Result<Vec<Task>> {
        let url = self.endpoint(&["api", "tasks"])?;
        let mut tasks: Vec<Task> = self
            .send(self.request(Method::GET, url), || "tasks".to_owned())
            .await?;
        if let Some(project_id) = project_id {
            tasks.retain(|task| task.project_id == project_id);
        }
        for problem in tasks.iter().filter_map(Task::inconsistency) {
            log::warn!("{problem}");
        }
        Ok(tasks)
    }

    pub async fn create_task(&self, new_task: &NewTask) -> Result<Task> {
        new_task.validate()?;
        let url = self.endpoint(&["api", "tasks"])?;
        self.send(self.request(Method::POST, url).json(new_task), || {
            format!("project {}", new_task.project_id)
        })
        .await
    }

    /// The implementation plan, or `None` while it is not ready yet.
    pub async fn get_plan(&self, task_id: &str) -> Result<Option<Plan>> {
        let url = self.endpoint(&["api", "tasks", non_empty(task_id, "task id")?, "plan"])?;
        self.send_optional(self.request(Method::GET, url)).await
    }

    /// The completion report, or `None` while it is not ready yet.
    pub async fn get_report(&self, task_id: &str) -> Result<Option<Report>> {
        let url = self.endpoint(&["api", "tasks", non_empty(task_id, "task id")?, "report"])?;
        self.send_optional(self.request(Method::GET, url)).await
    }

    /// Answers a plan that is awaiting approval. Invalid decisions are
    /// refused before anything is sent.
    pub async fn approve(&self, task_id: &str, decision: ApprovalDecision) -> Result<()> {
        let task_id = non_empty(task_id, "task id")?;
        let body = ApprovalRequest::try_from(decision)?;
        let url = self.endpoint(&["api", "tasks", task_id, "approve"])?;
        self.send_empty(self.request(Method::POST, url).json(&body), || {
            format!("task {task_id}")
        })
        .await
    }

    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        let url = self.endpoint(&["api", "projects"])?;
        self.send(self.request(Method::GET, url), || "projects".to_owned())
            .await
    }

    pub async fn get_project(&self, project_id: &str) -> Result<Project> {
        let url = self.endpoint(&["api", "projects", non_empty(project_id, "project id")?])?;
        self.send(self.request(Method::GET, url), || {
            format!("project {project_id}")
        })
        .await
    }

    pub async fn create_project(&self, new_project: &NewProject) -> Result<Project> {
        new_project.validate()?;
        let url = self.endpoint(&["api", "projects"])?;
        self.send(self.request(Method::POST, url).json(new_project), || {
            "projects".to_owned()
        })
        .await
    }

    pub async fn delete_project(&self, project_id: &str) -> Result<()> {
        let url = self.endpoint(&["api", "projects", non_empty(project_id, "project id")?])?;
        self.send_empty(self.request(Method::DELETE, url), || {
            format!("project {project_id}")
        })
        .await
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let path = segments
            .iter()
            .map(|segment| urlencoding::encode(segment))
            .collect::<Vec<_>>()
            .join("/");
        Ok(self.base_url.join(&path)?)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        log::debug!("{method} {url}");
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        resource: impl FnOnce() -> String,
    ) -> Result<T> {
        let response = request.send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound {
                resource: resource(),
            });
        }
        Ok(response.error_for_status()?.json::<T>().await?)
    }

    async fn send_optional<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<Option<T>> {
        let response = request.send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(response.error_for_status()?.json::<T>().await?))
    }

    async fn send_empty(
        &self,
        request: RequestBuilder,
        resource: impl FnOnce() -> String,
    ) -> Result<()> {
        let response = request.send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound {
                resource: resource(),
            });
        }
        response.error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl StatusSource for Client {
    async fn fetch_status(&self, task_id: &str) -> Result<TaskStatusSnapshot> {
        Client::fetch_status(self, task_id).await
    }
}

/// `Url::join` replaces the last path segment unless the base ends in `/`.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn non_empty<'a>(value: &'a str, what: &str) -> Result<&'a str> {
    if value.trim().is_empty() {
        Err(ClientError::validation(format!("{what} must not be empty")))
    } else {
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> Client {
        Client::new(Url::parse(base).unwrap(), None).unwrap()
    }

    #[test]
    fn endpoints_keep_base_path_prefix() {
        let client = client("https://orchestrator.example.com/v1");
        let url = client.endpoint(&["api", "status", "abc"]).unwrap();
        assert_eq!(url.as_str(), "https://orchestrator.example.com/v1/api/status/abc");
    }

    #[test]
    fn endpoint_segments_are_percent_encoded() {
        let client = client("http://localhost:8000");
        let url = client.endpoint(&["api", "tasks", "a/b c", "plan"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/tasks/a%2Fb%20c/plan");
    }

    #[tokio::test]
    async fn empty_task_id_is_refused_locally() {
        let client = client("http://localhost:8000");
        let err = client.fetch_status("  ").await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
    }
}
