//! # Resource Types
//!
//! The three kinds of data the sample caches, and the loaders that fetch them from the
//! [`MockApi`].
//!
//! | Type | Key | Loader | Batching |
//! |------|-----|--------|----------|
//! | `ProjectList` | [`ALL_PROJECTS`] | one `GET /projects` | off |
//! | `Project` | project id | `GET /projects?ids` | unbounded |
//! | `Task` | task id | `GET /tasks?ids` | at most 10 keys |
//!
//! Loading the project list also fills every `Project` and every embedded `Task` through
//! the transaction, so opening a project after the list never hits the API.

use crate::api::{ApiError, MockApi};
use crate::model::{Project, ProjectId, Task, TaskId};
use async_trait::async_trait;
use resource_kit::{KitError, LoadTransaction, ResourceError, ResourceLoader, ResourceType};
use tracing::{debug, warn};

/// Key of the only `ProjectList` entry.
pub const ALL_PROJECTS: &str = "*";

pub const TASK_BATCH_SIZE: usize = 10;

/// The sample's resource types. Cheap to clone.
#[derive(Clone)]
pub struct Resources {
    pub project_list: ResourceType<Vec<ProjectId>>,
    pub project: ResourceType<Project>,
    pub task: ResourceType<Task>,
}

impl Resources {
    pub fn new(api: MockApi) -> Result<Self, KitError> {
        let project = ResourceType::<Project>::builder("Project")
            .loader(ProjectLoader { api: api.clone() })
            .build()?;
        let task = ResourceType::<Task>::builder("Task")
            .loader(TaskLoader { api: api.clone() })
            .max_batch_size(TASK_BATCH_SIZE)
            .build()?;
        let project_list = ResourceType::<Vec<ProjectId>>::builder("ProjectList")
            .loader(ProjectListLoader {
                api,
                project: project.clone(),
                task: task.clone(),
            })
            .batch(false)
            .build()?;

        Ok(Self {
            project_list,
            project,
            task,
        })
    }
}

struct ProjectListLoader {
    api: MockApi,
    project: ResourceType<Project>,
    task: ResourceType<Task>,
}

#[async_trait]
impl ResourceLoader<Vec<ProjectId>> for ProjectListLoader {
    async fn load(
        &self,
        project_list: &ResourceType<Vec<ProjectId>>,
        keys: Vec<String>,
        tx: LoadTransaction,
    ) -> Result<Vec<Vec<ProjectId>>, ResourceError> {
        for key in keys.iter().filter(|key| key.as_str() != ALL_PROJECTS) {
            tx.error(
                &project_list.reference(key.as_str()),
                format!("Unknown project list: {key}"),
            );
        }
        if !keys.iter().any(|key| key == ALL_PROJECTS) {
            return Ok(Vec::new());
        }

        let details = self
            .api
            .list_projects()
            .await
            .map_err(ResourceError::failed)?;
        let mut ids = Vec::with_capacity(details.len());
        for detail in details {
            for task in detail.tasks {
                tx.receive(&self.task.reference(task.id.0.as_str()), task);
            }
            ids.push(detail.project.id.clone());
            tx.receive(&self.project.reference(detail.project.id.0.as_str()), detail.project);
        }
        debug!(projects = ids.len(), "Project list loaded");
        tx.receive(&project_list.reference(ALL_PROJECTS), ids);
        Ok(Vec::new())
    }
}

struct ProjectLoader {
    api: MockApi,
}

#[async_trait]
impl ResourceLoader<Project> for ProjectLoader {
    async fn load(
        &self,
        _project: &ResourceType<Project>,
        keys: Vec<String>,
        _tx: LoadTransaction,
    ) -> Result<Vec<Project>, ResourceError> {
        let ids: Vec<ProjectId> = keys.iter().map(|key| ProjectId(key.clone())).collect();
        self.api
            .get_projects(&ids)
            .await
            .map_err(ResourceError::failed)
    }
}

struct TaskLoader {
    api: MockApi,
}

#[async_trait]
impl ResourceLoader<Task> for TaskLoader {
    async fn load(
        &self,
        task: &ResourceType<Task>,
        keys: Vec<String>,
        tx: LoadTransaction,
    ) -> Result<Vec<Task>, ResourceError> {
        let ids: Vec<TaskId> = keys.iter().map(|key| TaskId(key.clone())).collect();
        let found = self.api.get_tasks(&ids).await.map_err(ResourceError::failed)?;

        // The endpoint drops unknown ids, so results cannot be returned positionally
        for id in &ids {
            let reference = task.reference(id.0.as_str());
            match found.iter().find(|t| &t.id == id) {
                Some(t) => tx.receive(&reference, t.clone()),
                None => {
                    warn!(task_id = %id, "Task not found");
                    tx.error(
                        &reference,
                        ResourceError::failed(ApiError::TaskNotFound(id.clone())),
                    );
                }
            }
        }
        Ok(Vec::new())
    }
}
