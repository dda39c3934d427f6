//! # Mock Project API
//!
//! An in-memory stand-in for a remote project-management backend. Every call sleeps for a
//! configurable latency and is counted, so tests can assert how many requests the cache
//! actually made.
//!
//! Endpoints:
//! - [`MockApi::list_projects`] returns every project with its tasks embedded
//! - [`MockApi::get_projects`] fetches projects by id, all or nothing
//! - [`MockApi::get_tasks`] fetches tasks by id, skipping ids it does not know

use crate::model::{Project, ProjectDetail, ProjectId, Task, TaskId};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("Project not found: {0}")]
    ProjectNotFound(ProjectId),
    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),
    #[error("Service unavailable")]
    Unavailable,
}

#[derive(Default)]
struct Tables {
    projects: BTreeMap<ProjectId, Project>,
    tasks: BTreeMap<TaskId, Task>,
}

/// Per-endpoint request counters.
#[derive(Debug, Default)]
pub struct CallCounts {
    pub list_projects: AtomicUsize,
    pub get_projects: AtomicUsize,
    pub get_tasks: AtomicUsize,
}

struct ApiInner {
    tables: Mutex<Tables>,
    latency: Duration,
    offline: AtomicBool,
    calls: CallCounts,
}

/// Cloneable handle; clones share data and counters.
#[derive(Clone)]
pub struct MockApi {
    inner: Arc<ApiInner>,
}

impl MockApi {
    pub fn new(latency: Duration) -> Self {
        Self {
            inner: Arc::new(ApiInner {
                tables: Mutex::new(Tables::default()),
                latency,
                offline: AtomicBool::new(false),
                calls: CallCounts::default(),
            }),
        }
    }

    /// Two projects with a handful of tasks between them.
    pub fn seeded(latency: Duration) -> Self {
        let api = Self::new(latency);
        api.insert_project(Project::new("p1", "Website relaunch"));
        api.insert_project(Project::new("p2", "Quarterly report"));
        api.insert_task(Task::new("t1", "p1", "Draft sitemap"));
        api.insert_task(Task::new("t2", "p1", "Pick a font"));
        api.insert_task(Task::new("t3", "p1", "Migrate blog posts"));
        api.insert_task(Task::new("t4", "p2", "Collect revenue figures"));
        api
    }

    pub fn insert_project(&self, project: Project) {
        self.tables().projects.insert(project.id.clone(), project);
    }

    /// Adds a task and links it to its project, if that project exists.
    pub fn insert_task(&self, task: Task) {
        let mut tables = self.tables();
        if let Some(project) = tables.projects.get_mut(&task.project_id) {
            if !project.task_ids.contains(&task.id) {
                project.task_ids.push(task.id.clone());
            }
        }
        tables.tasks.insert(task.id.clone(), task);
    }

    /// While offline, every endpoint fails with [`ApiError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> &CallCounts {
        &self.inner.calls
    }

    pub async fn list_projects(&self) -> Result<Vec<ProjectDetail>, ApiError> {
        self.request(&self.inner.calls.list_projects).await?;
        let tables = self.tables();
        let details = tables
            .projects
            .values()
            .map(|project| ProjectDetail {
                project: project.clone(),
                tasks: project
                    .task_ids
                    .iter()
                    .filter_map(|id| tables.tasks.get(id).cloned())
                    .collect(),
            })
            .collect::<Vec<_>>();
        debug!(projects = details.len(), "GET /projects");
        Ok(details)
    }

    /// Projects in the order of `ids`. Fails if any id is unknown.
    pub async fn get_projects(&self, ids: &[ProjectId]) -> Result<Vec<Project>, ApiError> {
        self.request(&self.inner.calls.get_projects).await?;
        debug!(ids = ids.len(), "GET /projects?ids");
        let tables = self.tables();
        ids.iter()
            .map(|id| {
                tables
                    .projects
                    .get(id)
                    .cloned()
                    .ok_or_else(|| ApiError::ProjectNotFound(id.clone()))
            })
            .collect()
    }

    /// The known tasks among `ids`, in request order.
    pub async fn get_tasks(&self, ids: &[TaskId]) -> Result<Vec<Task>, ApiError> {
        self.request(&self.inner.calls.get_tasks).await?;
        debug!(ids = ids.len(), "GET /tasks?ids");
        let tables = self.tables();
        Ok(ids
            .iter()
            .filter_map(|id| tables.tasks.get(id).cloned())
            .collect())
    }

    async fn request(&self, counter: &AtomicUsize) -> Result<(), ApiError> {
        counter.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.inner.latency).await;
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(ApiError::Unavailable);
        }
        Ok(())
    }

    fn tables(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.inner.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
