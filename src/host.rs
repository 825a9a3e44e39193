//! Collaborator seams to the host browser engine.
//!
//! The controller never renders, navigates or evicts content itself. It talks
//! to the host through these traits:
//!
//! - [`GuestContent`] : the displayable content a tab wraps (one per tab)
//! - [`GuestFactory`] : creates guest content for new tabs and placeholders
//! - [`DiscardPolicy`] : optional lifecycle-unit policy owning discard decisions
//! - [`NotificationSink`] : receives [`TabNotification`]s
//!
//! Headless implementations live here too. They are what the demo binary and
//! the tests drive the controller with.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, info};

use crate::ids::{TabId, WindowId};

/// Handle on the content displayed by one tab.
pub trait GuestContent {
    /// Starts (or restarts) loading the content.
    fn load(&mut self);
    /// Full reload, bypassing any restore state.
    fn reload(&mut self);
    fn show(&mut self);
    fn hide(&mut self);
    /// Asks the guest to attach to `window`'s embedder. Returns `true` when
    /// attachment completed synchronously; otherwise the host reports it later
    /// through [`TabController::did_attach`](crate::controller::TabController::did_attach).
    fn attach(&mut self, window: WindowId) -> bool;
    fn detach(&mut self);
    fn is_attached(&self) -> bool;
    fn destroy(&mut self);
}

/// Creates guest content for a freshly allocated tab id.
pub trait GuestFactory {
    fn create(&mut self, tab: TabId, placeholder: bool) -> Box<dyn GuestContent>;
}

impl<F> GuestFactory for F
where
    F: FnMut(TabId, bool) -> Box<dyn GuestContent>,
{
    fn create(&mut self, tab: TabId, placeholder: bool) -> Box<dyn GuestContent> {
        self(tab, placeholder)
    }
}

/// Lifecycle-unit policy provided by the host. Only consulted for the tabs it
/// reports as managed.
pub trait DiscardPolicy {
    fn manages(&self, tab: TabId) -> bool;
    fn discard(&mut self, tab: TabId) -> bool;
    fn is_discarded(&self, tab: TabId) -> bool;
    fn set_auto_discardable(&mut self, tab: TabId, auto_discardable: bool);
}

/// Visibility transition reported by the host for a tab's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
    Occluded,
}

/// Event emitted towards the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabNotification {
    /// The tab's owning window changed.
    Reparented { tab: TabId, window: WindowId },
    /// A tab carrying a pending close asks its window to close the page.
    WindowCloseRequested { tab: TabId, window: WindowId },
}

pub trait NotificationSink {
    fn notify(&mut self, notification: TabNotification);
}

/// Sink that only logs.
#[derive(Debug, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&mut self, notification: TabNotification) {
        info!(?notification, "Tab notification");
    }
}

/// Sink keeping every notification, shareable with the observer.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink(Rc<RefCell<Vec<TabNotification>>>);

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<TabNotification> {
        std::mem::take(&mut *self.0.borrow_mut())
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&mut self, notification: TabNotification) {
        self.0.borrow_mut().push(notification);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Headless guest
// ─────────────────────────────────────────────────────────────────────────────

/// Call made by the controller on a guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuestCall {
    Load,
    Reload,
    Show,
    Hide,
    Attach(WindowId),
    Detach,
    Destroy,
}

/// Shared, ordered record of guest calls across every headless guest.
#[derive(Debug, Clone, Default)]
pub struct GuestJournal(Rc<RefCell<Vec<(TabId, GuestCall)>>>);

impl GuestJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls_for(&self, tab: TabId) -> Vec<GuestCall> {
        self.0
            .borrow()
            .iter()
            .filter(|(t, _)| *t == tab)
            .map(|(_, c)| *c)
            .collect()
    }

    pub fn count(&self, tab: TabId, call: GuestCall) -> usize {
        self.0
            .borrow()
            .iter()
            .filter(|&&(t, c)| t == tab && c == call)
            .count()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    fn record(&self, tab: TabId, call: GuestCall) {
        self.0.borrow_mut().push((tab, call));
    }
}

/// Guest without any rendering: attaches synchronously and journals calls.
#[derive(Debug)]
pub struct HeadlessGuest {
    tab: TabId,
    attached: bool,
    journal: GuestJournal,
}

impl HeadlessGuest {
    pub fn new(tab: TabId, journal: GuestJournal) -> Self {
        Self {
            tab,
            attached: false,
            journal,
        }
    }

    /// Factory producing headless guests that all write to `journal`.
    pub fn factory(journal: GuestJournal) -> impl GuestFactory {
        move |tab: TabId, _placeholder: bool| -> Box<dyn GuestContent> {
            Box::new(HeadlessGuest::new(tab, journal.clone()))
        }
    }
}

impl GuestContent for HeadlessGuest {
    fn load(&mut self) {
        debug!(tab = %self.tab, "guest load");
        self.journal.record(self.tab, GuestCall::Load);
    }

    fn reload(&mut self) {
        debug!(tab = %self.tab, "guest reload");
        self.journal.record(self.tab, GuestCall::Reload);
    }

    fn show(&mut self) {
        self.journal.record(self.tab, GuestCall::Show);
    }

    fn hide(&mut self) {
        self.journal.record(self.tab, GuestCall::Hide);
    }

    fn attach(&mut self, window: WindowId) -> bool {
        self.attached = true;
        self.journal.record(self.tab, GuestCall::Attach(window));
        true
    }

    fn detach(&mut self) {
        self.attached = false;
        self.journal.record(self.tab, GuestCall::Detach);
    }

    fn is_attached(&self) -> bool {
        self.attached
    }

    fn destroy(&mut self) {
        self.attached = false;
        self.journal.record(self.tab, GuestCall::Destroy);
    }
}
