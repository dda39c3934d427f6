//! # Resource Kit Demo
//!
//! Loads the project list, then opens a project and a few tasks, showing which reads are
//! served from side data and which trigger a (batched) request.
//!
//! ```bash
//! RUST_LOG=info cargo run -p resource-sample
//! RUST_LOG=debug cargo run -p resource-sample
//! ```

use resource_kit::CacheConfig;
use resource_sample::api::MockApi;
use resource_sample::app_state::UiAction;
use resource_sample::lifecycle::{setup_tracing, AppSystem};
use resource_sample::model::{Task, TaskId};
use resource_sample::resources::ALL_PROJECTS;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tracing::{info, warn, Instrument};

#[tokio::main]
async fn main() -> Result<(), String> {
    setup_tracing();

    let api = MockApi::seeded(Duration::from_millis(120));
    let system = AppSystem::new(api, &CacheConfig::from_env()).map_err(|e| e.to_string())?;
    let resources = system.resources.clone();

    // 1. The list view: one request fills the list, every project and every task
    let span = tracing::info_span!("project_list");
    let project_ids = async {
        let mut list = system
            .cache
            .subscribe(resources.project_list.reference(ALL_PROJECTS));
        let view = list.settled().await.map_err(|e| e.to_string())?;
        let ids = view.data.as_deref().cloned().unwrap_or_default();
        info!(projects = ids.len(), "Project list ready");
        Ok::<_, String>(ids)
    }
    .instrument(span)
    .await?;

    // 2. The detail view: already fresh, no request
    if let Some(first) = project_ids.first() {
        let span = tracing::info_span!("project_detail", project_id = %first);
        async {
            if let Err(e) = system.dispatch_ui(UiAction::SelectProject(first.clone())).await {
                warn!(error = %e, "Could not record selection");
            }
            let entry = system
                .cache
                .get_entry(&resources.project.reference(first.0.as_str()));
            match entry.data.as_deref() {
                Some(project) => info!(
                    name = %project.name,
                    tasks = project.task_ids.len(),
                    "Project served from cache"
                ),
                None => warn!("Project missing after list load"),
            }
        }
        .instrument(span)
        .await;
    }

    // 3. A task added on the server after the list load, plus an id that does not exist:
    //    both join one batched request
    system.api.insert_task(Task::new("t5", "p2", "Book venue"));
    let span = tracing::info_span!("task_batch");
    async {
        let mut subscriptions: Vec<_> = ["t1", "t5", "t404"]
            .into_iter()
            .map(|id| system.cache.subscribe(resources.task.reference(id)))
            .collect();
        for subscription in &mut subscriptions {
            let view = match subscription.settled().await {
                Ok(view) => view,
                Err(e) => {
                    warn!(error = %e, "Store closed while waiting");
                    continue;
                }
            };
            let id = TaskId(view.reference.key().to_string());
            match (&view.data, &view.error) {
                (Some(task), _) => info!(task_id = %id, title = %task.title, "Task ready"),
                (None, Some(error)) => warn!(task_id = %id, error = %error, "Task failed"),
                (None, None) => warn!(task_id = %id, "Task has neither data nor error"),
            }
        }
    }
    .instrument(span)
    .await;

    let ui = system.ui();
    info!(
        selected = ?ui.selected_project,
        navigations = ui.navigations,
        "UI state"
    );

    let calls = system.api.calls();
    info!(
        list_projects = calls.list_projects.load(Ordering::SeqCst),
        get_projects = calls.get_projects.load(Ordering::SeqCst),
        get_tasks = calls.get_tasks.load(Ordering::SeqCst),
        "API requests made"
    );

    system.shutdown().await?;
    info!("Application completed successfully");
    Ok(())
}
