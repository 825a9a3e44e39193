//! Identifiants des onglets, des fenêtres et des routes de rendu.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Frame id designating the top-level frame of a tab.
pub const TOP_FRAME_ID: i32 = 0;

/// Stable identity of a tab. Allocated monotonically, never reused
/// within a process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub u32);

/// Identity of a browser window in the [`WindowRegistry`](crate::window::WindowRegistry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub u32);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hosting process + routing identity of a tab's render view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RenderRoute {
    pub process_id: i32,
    pub routing_id: i32,
}

impl RenderRoute {
    pub fn new(process_id: i32, routing_id: i32) -> Self {
        Self {
            process_id,
            routing_id,
        }
    }
}

impl fmt::Display for RenderRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.process_id, self.routing_id)
    }
}
