//! Table id d'onglet → route de rendu (processus + routing id).
//!
//! Propriété explicite du contrôleur (injectée via `Arc`), pas un état global.
//! Les callbacks des processus de rendu de l'hôte peuvent arriver depuis
//! d'autres threads : la table est donc protégée par un `Mutex`.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::TabError;
use crate::ids::{RenderRoute, TabId};

#[derive(Debug, Default)]
pub struct RouteRegistry {
    routes: Mutex<HashMap<TabId, RenderRoute>>,
}

impl RouteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the route of a newly created render view. Only the first
    /// registration for an id is kept; returns whether it was stored.
    pub fn register(&self, tab: TabId, route: RenderRoute) -> bool {
        let mut routes = self.routes.lock();
        if routes.contains_key(&tab) {
            return false;
        }
        debug!(tab = %tab, route = %route, "render route registered");
        routes.insert(tab, route);
        true
    }

    /// Overwrites the route after the tab's render view moved to a new host.
    pub fn update(&self, tab: TabId, route: RenderRoute) {
        debug!(tab = %tab, route = %route, "render route updated");
        self.routes.lock().insert(tab, route);
    }

    pub fn erase(&self, tab: TabId) -> Option<RenderRoute> {
        self.routes.lock().remove(&tab)
    }

    pub fn lookup(&self, tab: TabId) -> Result<RenderRoute, TabError> {
        self.routes
            .lock()
            .get(&tab)
            .copied()
            .ok_or(TabError::RouteNotFound(tab))
    }

    pub fn len(&self) -> usize {
        self.routes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.lock().is_empty()
    }
}
