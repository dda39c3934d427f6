//! # Application State
//!
//! The sample's store holds more than the resource cache: next to the [`ResourcesState`]
//! sits a little UI state (which project is open). [`AppState`] implements [`HostState`],
//! so one store actor applies both resource actions and [`UiAction`]s, and the cache finds
//! its part through [`AppState::resources`].

use crate::model::ProjectId;
use resource_kit::{reduce, HostState, ResourceAction, ResourcesState};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UiState {
    pub selected_project: Option<ProjectId>,
    /// Number of project switches since startup.
    pub navigations: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiAction {
    SelectProject(ProjectId),
    ClearSelection,
}

#[derive(Clone, Default)]
pub struct AppState {
    pub resources: ResourcesState,
    pub ui: UiState,
}

impl AppState {
    /// Selector handed to [`ResourceCache::with_selector`](resource_kit::ResourceCache::with_selector).
    pub fn resources(&self) -> &ResourcesState {
        &self.resources
    }
}

impl HostState for AppState {
    type Action = UiAction;

    fn reduce_resources(&self, action: &ResourceAction) -> Self {
        Self {
            resources: reduce(&self.resources, action),
            ui: self.ui.clone(),
        }
    }

    fn reduce_host(&self, action: &UiAction) -> Self {
        let ui = match action {
            UiAction::SelectProject(id) if self.ui.selected_project.as_ref() == Some(id) => {
                self.ui.clone()
            }
            UiAction::SelectProject(id) => UiState {
                selected_project: Some(id.clone()),
                navigations: self.ui.navigations + 1,
            },
            UiAction::ClearSelection => UiState {
                selected_project: None,
                ..self.ui.clone()
            },
        };
        Self {
            resources: self.resources.clone(),
            ui,
        }
    }
}
