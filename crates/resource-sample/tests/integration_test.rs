use resource_kit::{CacheConfig, StateStore};
use resource_sample::api::MockApi;
use resource_sample::app_state::UiAction;
use resource_sample::lifecycle::AppSystem;
use resource_sample::model::{ProjectDetail, ProjectId, Task};
use resource_sample::resources::{ALL_PROJECTS, TASK_BATCH_SIZE};
use std::sync::atomic::Ordering;
use std::time::Duration;

fn system(api: &MockApi) -> AppSystem {
    AppSystem::new(api.clone(), &CacheConfig::default()).expect("Failed to start system")
}

/// The list load fills projects and tasks; opening them afterwards makes no request.
#[tokio::test(start_paused = true)]
async fn test_project_list_populates_projects_and_tasks() {
    let api = MockApi::seeded(Duration::from_millis(50));
    let system = system(&api);
    let resources = system.resources.clone();

    let mut list = system
        .cache
        .subscribe(resources.project_list.reference(ALL_PROJECTS));
    let view = list.settled().await.unwrap();
    assert_eq!(
        view.data.as_deref(),
        Some(&vec![ProjectId::from("p1"), ProjectId::from("p2")])
    );

    let mut p1 = system.cache.subscribe(resources.project.reference("p1"));
    let project = p1.settled().await.unwrap();
    assert_eq!(project.data.as_ref().map(|p| p.name.as_str()), Some("Website relaunch"));

    let mut t3 = system.cache.subscribe(resources.task.reference("t3"));
    let task = t3.settled().await.unwrap();
    assert_eq!(task.data.as_ref().map(|t| t.title.as_str()), Some("Migrate blog posts"));

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(api.calls().list_projects.load(Ordering::SeqCst), 1);
    assert_eq!(api.calls().get_projects.load(Ordering::SeqCst), 0);
    assert_eq!(api.calls().get_tasks.load(Ordering::SeqCst), 0);

    drop((list, p1, t3));
    system.shutdown().await.unwrap();
}

/// Unknown task ids are reported per entry without failing the rest of the batch.
#[tokio::test(start_paused = true)]
async fn test_task_batch_reports_unknown_ids() {
    let api = MockApi::seeded(Duration::from_millis(20));
    let system = system(&api);
    let tasks = system.resources.task.clone();

    let mut subscriptions: Vec<_> = ["t1", "missing", "t4"]
        .into_iter()
        .map(|id| system.cache.subscribe(tasks.reference(id)))
        .collect();
    let mut views = Vec::new();
    for subscription in &mut subscriptions {
        views.push(subscription.settled().await.unwrap());
    }

    assert_eq!(api.calls().get_tasks.load(Ordering::SeqCst), 1);
    assert_eq!(views[0].data.as_ref().map(|t| t.title.as_str()), Some("Draft sitemap"));
    assert!(views[1].data.is_none());
    assert_eq!(
        views[1].error.as_ref().map(ToString::to_string).as_deref(),
        Some("Task not found: missing")
    );
    assert_eq!(views[2].data.as_ref().map(|t| t.title.as_str()), Some("Collect revenue figures"));

    drop(subscriptions);
    system.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_task_batches_respect_max_size() {
    let api = MockApi::new(Duration::from_millis(5));
    let ids: Vec<String> = (0..TASK_BATCH_SIZE + 3).map(|n| format!("t{n}")).collect();
    for id in &ids {
        api.insert_task(Task::new(id.as_str(), "p1", format!("Task {id}")));
    }
    let system = system(&api);

    let mut subscriptions: Vec<_> = ids
        .iter()
        .map(|id| system.cache.subscribe(system.resources.task.reference(id.as_str())))
        .collect();
    for subscription in &mut subscriptions {
        assert!(subscription.settled().await.unwrap().data.is_some());
    }

    assert_eq!(api.calls().get_tasks.load(Ordering::SeqCst), 2);

    drop(subscriptions);
    system.shutdown().await.unwrap();
}

/// Projects batch into one request; a failed request errors every project in it.
#[tokio::test(start_paused = true)]
async fn test_project_batch_failure_marks_every_key() {
    let api = MockApi::seeded(Duration::from_millis(5));
    api.set_offline(true);
    let system = system(&api);
    let projects = system.resources.project.clone();

    let mut p1 = system.cache.subscribe(projects.reference("p1"));
    let mut p2 = system.cache.subscribe(projects.reference("p2"));
    let p1_view = p1.settled().await.unwrap();
    let p2_view = p2.settled().await.unwrap();

    assert_eq!(api.calls().get_projects.load(Ordering::SeqCst), 1);
    for view in [&p1_view, &p2_view] {
        assert!(view.data.is_none());
        assert!(!view.loading);
        assert_eq!(
            view.error.as_ref().map(ToString::to_string).as_deref(),
            Some("Service unavailable")
        );
    }

    drop((p1, p2));
    system.shutdown().await.unwrap();
}

/// A server-side change delivered as an unsolicited update replaces the cached value.
#[tokio::test(start_paused = true)]
async fn test_pushed_update_replaces_cached_task() {
    let api = MockApi::seeded(Duration::from_millis(5));
    let system = system(&api);
    let t2 = system.resources.task.reference("t2");

    let mut subscription = system.cache.subscribe(t2.clone());
    let before = subscription.settled().await.unwrap();
    assert_eq!(before.data.as_ref().map(|t| t.done), Some(false));

    let mut done = Task::new("t2", "p1", "Pick a font");
    done.done = true;
    system.cache.receive(&t2, done).await.unwrap();

    let after = subscription.current();
    assert_eq!(after.data.as_ref().map(|t| t.done), Some(true));
    assert_eq!(api.calls().get_tasks.load(Ordering::SeqCst), 1);

    drop(subscription);
    system.shutdown().await.unwrap();
}

/// Resources live inside the app state; UI actions and resource loads share one store.
#[tokio::test(start_paused = true)]
async fn test_resources_embedded_in_app_state() {
    let api = MockApi::seeded(Duration::from_millis(10));
    let system = system(&api);

    system
        .dispatch_ui(UiAction::SelectProject(ProjectId::from("p2")))
        .await
        .unwrap();
    let mut p2 = system.cache.subscribe(system.resources.project.reference("p2"));
    let view = p2.settled().await.unwrap();
    assert_eq!(view.data.as_ref().map(|p| p.name.as_str()), Some("Quarterly report"));

    // The resource commit carried the UI state over
    let ui = system.ui();
    assert_eq!(ui.selected_project, Some(ProjectId::from("p2")));
    assert_eq!(ui.navigations, 1);

    // A UI action keeps the cached entry
    system.dispatch_ui(UiAction::ClearSelection).await.unwrap();
    let state = system.cache.store().get_state();
    assert!(state.ui.selected_project.is_none());
    assert!(state.resources().get(&system.resources.project.reference("p2")).data.is_some());
    assert_eq!(api.calls().get_projects.load(Ordering::SeqCst), 1);

    drop(p2);
    system.shutdown().await.unwrap();
}

#[test]
fn test_project_detail_wire_format() {
    let json = r#"{
        "id": "p1",
        "name": "Website relaunch",
        "task_ids": ["t1"],
        "tasks": [{"id": "t1", "project_id": "p1", "title": "Draft sitemap"}]
    }"#;
    let detail: ProjectDetail = serde_json::from_str(json).unwrap();

    assert_eq!(detail.project.id, ProjectId::from("p1"));
    assert_eq!(detail.tasks.len(), 1);
    assert!(!detail.tasks[0].done);
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let config = CacheConfig {
        store_buffer: 0,
        ..CacheConfig::default()
    };
    assert!(AppSystem::new(MockApi::seeded(Duration::ZERO), &config).is_err());
}
