//! Read view of a managed tab and its extension-visible metadata.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::ids::{TabId, WindowId};

/// Lifecycle state of a tab, derived from its attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TabState {
    /// Not hosted by any window (also the initial state).
    Detached,
    /// Occupies a slot in a window's tab list.
    Attached,
    /// Stand-in occupying a slot while the real content lives elsewhere.
    Placeholder,
    /// Content closed; the id no longer resolves.
    Destroyed,
}

/// Snapshot of one tab, keyed by [`TabId`].
///
/// `window_id` and `index` are both `None` exactly when the tab is detached.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    pub id: TabId,
    pub window_id: Option<WindowId>,
    pub index: Option<usize>,
    pub pinned: bool,
    pub discarded: bool,
    pub auto_discardable: bool,
    pub active: bool,
    pub is_placeholder: bool,
    pub opener_id: Option<TabId>,
    #[serde(skip)]
    pub window_closing: bool,
    #[serde(flatten)]
    pub values: TabValues,
}

impl Tab {
    pub fn state(&self) -> TabState {
        if self.is_placeholder {
            TabState::Placeholder
        } else if self.window_id.is_some() {
            TabState::Attached
        } else {
            TabState::Detached
        }
    }
}

/// Loading status reported to extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStatus {
    Loading,
    Complete,
}

/// Extension-visible metadata pushed by the host.
///
/// Merging only overwrites the fields that are set on the incoming value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct TabValues {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<Url>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<LoadStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audible: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlighted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incognito: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected: Option<bool>,
}

impl TabValues {
    pub fn merge(&mut self, other: TabValues) {
        fn take<T>(slot: &mut Option<T>, incoming: Option<T>) {
            if incoming.is_some() {
                *slot = incoming;
            }
        }
        take(&mut self.title, other.title);
        take(&mut self.url, other.url);
        take(&mut self.status, other.status);
        take(&mut self.audible, other.audible);
        take(&mut self.highlighted, other.highlighted);
        take(&mut self.incognito, other.incognito);
        take(&mut self.selected, other.selected);
    }
}
