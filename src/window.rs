//! Registre des fenêtres et de leurs listes d'onglets ordonnées.
//!
//! Chaque fenêtre expose des *slots* ordonnés ; les onglets épinglés occupent
//! toujours le début de la liste. Les changements sont publiés sous forme de
//! [`WindowEvent`] typés à tous les abonnés (publish/subscribe explicite au lieu
//! d'observateurs à callbacks virtuels).
//!
//! ```text
//! WindowRegistry ──publish(WindowEvent)──► mpsc::Sender ─┬─► TabController
//!                                                       └─► autres abonnés
//! ```
//!
//! Les abonnés consomment les événements au tour suivant de la boucle, jamais
//! pendant que le registre itère ses propres slots.

use std::sync::mpsc::{self, Receiver, Sender};

use tracing::debug;

use crate::error::TabError;
use crate::ids::{TabId, WindowId};

/// Change published by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowEvent {
    WindowAdded(WindowId),
    WindowRemoved(WindowId),
    LastActiveChanged(WindowId),
    TabInserted {
        window: WindowId,
        tab: TabId,
        index: usize,
        foreground: bool,
    },
    TabDetached {
        window: WindowId,
        tab: TabId,
        index: usize,
    },
    TabReplaced {
        window: WindowId,
        old: TabId,
        new: TabId,
        index: usize,
    },
    TabMoved {
        window: WindowId,
        tab: TabId,
        from: usize,
        to: usize,
    },
    ActiveTabChanged {
        window: WindowId,
        old: Option<TabId>,
        new: Option<TabId>,
    },
    PinnedStateChanged {
        window: WindowId,
        tab: TabId,
        pinned: bool,
    },
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    tab: TabId,
    pinned: bool,
}

#[derive(Debug)]
struct WindowEntry {
    id: WindowId,
    slots: Vec<Slot>,
    active: Option<TabId>,
}

impl WindowEntry {
    fn pinned_count(&self) -> usize {
        self.slots.iter().take_while(|s| s.pinned).count()
    }

    /// Clamps an insertion index so pinned tabs stay ahead of unpinned ones.
    /// `None` means "append to the block the tab belongs to".
    fn constrain_insertion(&self, index: Option<usize>, pinned: bool) -> usize {
        let boundary = self.pinned_count();
        match (index, pinned) {
            (None, true) => boundary,
            (None, false) => self.slots.len(),
            (Some(i), true) => i.min(boundary),
            (Some(i), false) => i.clamp(boundary, self.slots.len()),
        }
    }

    fn index_of(&self, tab: TabId) -> Option<usize> {
        self.slots.iter().position(|s| s.tab == tab)
    }
}

/// Set of open windows, in creation order, plus a most-recently-active stack.
#[derive(Debug, Default)]
pub struct WindowRegistry {
    windows: Vec<WindowEntry>,
    /// Last element is the most recently active window.
    recency: Vec<WindowId>,
    next_id: u32,
    subscribers: Vec<Sender<WindowEvent>>,
}

impl WindowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new subscriber. Events published after this call are
    /// queued on the returned receiver.
    pub fn subscribe(&mut self) -> Receiver<WindowEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    fn publish(&mut self, event: WindowEvent) {
        debug!(?event, "window event");
        // Dropped receivers unsubscribe themselves.
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    // ── Windows ──────────────────────────────────────────────────────────

    /// Opens an empty window. A freshly opened window is the most recently
    /// active one.
    pub fn open_window(&mut self) -> WindowId {
        self.next_id += 1;
        let id = WindowId(self.next_id);
        self.windows.push(WindowEntry {
            id,
            slots: Vec::new(),
            active: None,
        });
        self.recency.push(id);
        self.publish(WindowEvent::WindowAdded(id));
        self.publish(WindowEvent::LastActiveChanged(id));
        id
    }

    /// Closes a window and returns the tabs it was hosting, in slot order.
    pub fn close_window(&mut self, window: WindowId) -> Result<Vec<TabId>, TabError> {
        let pos = self
            .windows
            .iter()
            .position(|w| w.id == window)
            .ok_or(TabError::WindowNotFound(window))?;
        let entry = self.windows.remove(pos);
        self.recency.retain(|&w| w != window);
        self.publish(WindowEvent::WindowRemoved(window));
        Ok(entry.slots.into_iter().map(|s| s.tab).collect())
    }

    pub fn set_last_active(&mut self, window: WindowId) -> Result<(), TabError> {
        if !self.contains(window) {
            return Err(TabError::WindowNotFound(window));
        }
        if self.last_active() == Some(window) {
            return Ok(());
        }
        self.recency.retain(|&w| w != window);
        self.recency.push(window);
        self.publish(WindowEvent::LastActiveChanged(window));
        Ok(())
    }

    pub fn last_active(&self) -> Option<WindowId> {
        self.recency.last().copied()
    }

    pub fn contains(&self, window: WindowId) -> bool {
        self.windows.iter().any(|w| w.id == window)
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Window ids in registry iteration (creation) order.
    pub fn ids(&self) -> impl Iterator<Item = WindowId> + '_ {
        self.windows.iter().map(|w| w.id)
    }

    fn entry(&self, window: WindowId) -> Result<&WindowEntry, TabError> {
        self.windows
            .iter()
            .find(|w| w.id == window)
            .ok_or(TabError::WindowNotFound(window))
    }

    fn entry_mut(&mut self, window: WindowId) -> Result<&mut WindowEntry, TabError> {
        self.windows
            .iter_mut()
            .find(|w| w.id == window)
            .ok_or(TabError::WindowNotFound(window))
    }

    // ── Slots ────────────────────────────────────────────────────────────

    pub fn tabs(&self, window: WindowId) -> Result<Vec<TabId>, TabError> {
        Ok(self.entry(window)?.slots.iter().map(|s| s.tab).collect())
    }

    pub fn tab_at(&self, window: WindowId, index: usize) -> Option<TabId> {
        self.entry(window).ok()?.slots.get(index).map(|s| s.tab)
    }

    pub fn index_of(&self, window: WindowId, tab: TabId) -> Option<usize> {
        self.entry(window).ok()?.index_of(tab)
    }

    pub fn is_pinned_at(&self, window: WindowId, index: usize) -> bool {
        self.entry(window)
            .ok()
            .and_then(|w| w.slots.get(index))
            .is_some_and(|s| s.pinned)
    }

    pub fn active_tab(&self, window: WindowId) -> Option<TabId> {
        self.entry(window).ok()?.active
    }

    /// Inserts `tab` at `index` (or appends), constrained by pinned-first
    /// ordering. Returns the slot actually used.
    pub fn insert(
        &mut self,
        window: WindowId,
        index: Option<usize>,
        tab: TabId,
        pinned: bool,
        foreground: bool,
    ) -> Result<usize, TabError> {
        let entry = self.entry_mut(window)?;
        let at = entry.constrain_insertion(index, pinned);
        entry.slots.insert(at, Slot { tab, pinned });
        let old_active = entry.active;
        let activate = foreground || old_active.is_none();
        if activate {
            entry.active = Some(tab);
        }
        self.publish(WindowEvent::TabInserted {
            window,
            tab,
            index: at,
            foreground,
        });
        if activate {
            self.publish(WindowEvent::ActiveTabChanged {
                window,
                old: old_active,
                new: Some(tab),
            });
        }
        Ok(at)
    }

    /// Removes the tab at `index`. When it was the active tab, the tab now at
    /// the same position (or the previous one) becomes active.
    pub fn detach(&mut self, window: WindowId, index: usize) -> Result<TabId, TabError> {
        let entry = self.entry_mut(window)?;
        if index >= entry.slots.len() {
            return Err(TabError::SlotNotFound { window, index });
        }
        let removed = entry.slots.remove(index).tab;
        let mut activation = None;
        if entry.active == Some(removed) {
            let next = entry
                .slots
                .get(index.min(entry.slots.len().saturating_sub(1)))
                .map(|s| s.tab);
            entry.active = next;
            activation = Some(next);
        }
        self.publish(WindowEvent::TabDetached {
            window,
            tab: removed,
            index,
        });
        if let Some(new) = activation {
            self.publish(WindowEvent::ActiveTabChanged {
                window,
                old: Some(removed),
                new,
            });
        }
        Ok(removed)
    }

    /// Puts `tab` in place of whatever occupies `index`, keeping the slot's
    /// pinned flag and active status. Returns the replaced tab.
    pub fn replace(&mut self, window: WindowId, index: usize, tab: TabId) -> Result<TabId, TabError> {
        let entry = self.entry_mut(window)?;
        let slot = entry
            .slots
            .get_mut(index)
            .ok_or(TabError::SlotNotFound { window, index })?;
        let old = std::mem::replace(&mut slot.tab, tab);
        if entry.active == Some(old) {
            entry.active = Some(tab);
        }
        self.publish(WindowEvent::TabReplaced {
            window,
            old,
            new: tab,
            index,
        });
        Ok(old)
    }

    /// Moves the tab at `from` towards `to`, staying within its pinned or
    /// unpinned block. Returns the final slot.
    pub fn move_tab(&mut self, window: WindowId, from: usize, to: usize) -> Result<usize, TabError> {
        let entry = self.entry_mut(window)?;
        if from >= entry.slots.len() {
            return Err(TabError::SlotNotFound { window, index: from });
        }
        let slot = entry.slots.remove(from);
        let at = entry.constrain_insertion(Some(to), slot.pinned);
        entry.slots.insert(at, slot);
        if at != from {
            self.publish(WindowEvent::TabMoved {
                window,
                tab: slot.tab,
                from,
                to: at,
            });
        }
        Ok(at)
    }

    pub fn activate_at(&mut self, window: WindowId, index: usize) -> Result<(), TabError> {
        let entry = self.entry_mut(window)?;
        let tab = entry
            .slots
            .get(index)
            .ok_or(TabError::SlotNotFound { window, index })?
            .tab;
        let old = entry.active.replace(tab);
        if old != Some(tab) {
            self.publish(WindowEvent::ActiveTabChanged {
                window,
                old,
                new: Some(tab),
            });
        }
        Ok(())
    }

    /// Updates the pinned flag of a slot and re-sorts it to the pinned/unpinned
    /// boundary. Returns the tab's new slot.
    pub fn set_tab_pinned(&mut self, window: WindowId, index: usize, pinned: bool) -> Result<usize, TabError> {
        let entry = self.entry_mut(window)?;
        if index >= entry.slots.len() {
            return Err(TabError::SlotNotFound { window, index });
        }
        if entry.slots[index].pinned == pinned {
            return Ok(index);
        }
        let mut slot = entry.slots.remove(index);
        slot.pinned = pinned;
        // Pinning lands at the end of the pinned block, unpinning at the start
        // of the unpinned block: both are the boundary after removal.
        let at = entry.pinned_count();
        entry.slots.insert(at, slot);
        if at != index {
            self.publish(WindowEvent::TabMoved {
                window,
                tab: slot.tab,
                from: index,
                to: at,
            });
        }
        self.publish(WindowEvent::PinnedStateChanged {
            window,
            tab: slot.tab,
            pinned,
        });
        Ok(at)
    }
}
