//! Contrôleur du cycle de vie des onglets.
//!
//! ## Machine à états
//!
//! ```text
//!              attach_guest / move_to
//!   Detached ─────────────────────────► Attached
//!      ▲                                  │
//!      └──────────── detach_guest ────────┤
//!                                         ▼
//!                         Placeholder (nouvel onglet, même slot)
//!                            │                    │
//!   did_attach (non épinglé) │                    │ maybe_attach_or_create_pinned_tab
//!   (différé au tour suivant)▼                    ▼ (épinglé, fenêtre la plus récente)
//!                        Destroyed             Attached
//! ```
//!
//! Tout tourne sur un seul thread, piloté par les événements de l'hôte. Les
//! mutations de la liste d'onglets déclenchées par une notification de cette
//! même liste (destruction d'un placeholder transitoire, `did_attach` des
//! guests synchrones) sont mises en file et exécutées par
//! [`TabController::run_pending`], au tour suivant de la boucle.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::sync::mpsc::Receiver;

use tracing::{debug, info, trace, warn};

use crate::config::TabsConfig;
use crate::error::TabError;
use crate::host::{
    DiscardPolicy, GuestContent, GuestFactory, NotificationSink, TabNotification, Visibility,
};
use crate::ids::{RenderRoute, TabId, WindowId};
use crate::options::{ScriptRequest, ScriptTarget, TabCreateParams};
use crate::routing::RouteRegistry;
use crate::tab::{Tab, TabState, TabValues};
use crate::window::{WindowEvent, WindowRegistry};

/// Outcome of [`TabController::will_close_window`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDecision {
    /// The window close destroys the tab's content as usual.
    Proceed,
    /// Content was hidden and deactivated instead, keeping the pinned tab
    /// available for a transfer to another window.
    HideContent,
}

/// Work deferred to the next turn of the event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deferred {
    DidAttach(TabId),
    DestroyPlaceholder(TabId),
}

struct TabRecord {
    guest: Box<dyn GuestContent>,
    window: Option<WindowId>,
    /// Insertion index remembered while detached.
    preferred_index: Option<usize>,
    pinned: bool,
    discarded: bool,
    /// Set by a local discard; the next visible transition reloads.
    needs_reload: bool,
    auto_discardable: bool,
    /// Local flag; for attached tabs the window's tab list is authoritative.
    active: bool,
    is_placeholder: bool,
    opener: Option<TabId>,
    window_closing: bool,
    values: TabValues,
}

impl TabRecord {
    fn new(guest: Box<dyn GuestContent>, auto_discardable: bool) -> Self {
        Self {
            guest,
            window: None,
            preferred_index: None,
            pinned: false,
            discarded: false,
            needs_reload: false,
            auto_discardable,
            active: false,
            is_placeholder: false,
            opener: None,
            window_closing: false,
            values: TabValues::default(),
        }
    }
}

/// Owns every managed tab and drives its lifecycle against the window
/// registry and the host collaborators.
pub struct TabController {
    tabs: BTreeMap<TabId, TabRecord>,
    windows: WindowRegistry,
    window_events: Receiver<WindowEvent>,
    routes: Arc<RouteRegistry>,
    guests: Box<dyn GuestFactory>,
    discard_policy: Option<Box<dyn DiscardPolicy>>,
    notifier: Box<dyn NotificationSink>,
    pending: VecDeque<Deferred>,
    next_tab_id: u32,
    quitting: bool,
    config: TabsConfig,
}

impl TabController {
    pub fn new(
        mut windows: WindowRegistry,
        routes: Arc<RouteRegistry>,
        guests: impl GuestFactory + 'static,
        notifier: impl NotificationSink + 'static,
        config: TabsConfig,
    ) -> Self {
        let window_events = windows.subscribe();
        Self {
            tabs: BTreeMap::new(),
            windows,
            window_events,
            routes,
            guests: Box::new(guests),
            discard_policy: None,
            notifier: Box::new(notifier),
            pending: VecDeque::new(),
            next_tab_id: 0,
            quitting: false,
            config,
        }
    }

    pub fn with_discard_policy(mut self, policy: impl DiscardPolicy + 'static) -> Self {
        self.discard_policy = Some(Box::new(policy));
        self
    }

    // ── Accessors ────────────────────────────────────────────────────────

    pub fn windows(&self) -> &WindowRegistry {
        &self.windows
    }

    pub fn routes(&self) -> &Arc<RouteRegistry> {
        &self.routes
    }

    pub fn tab_ids(&self) -> Vec<TabId> {
        self.tabs.keys().copied().collect()
    }

    pub fn contains(&self, id: TabId) -> bool {
        self.tabs.contains_key(&id)
    }

    fn record(&self, id: TabId) -> Result<&TabRecord, TabError> {
        self.tabs.get(&id).ok_or(TabError::TabNotFound(id))
    }

    /// Slot of an attached tab, read from its window's tab list.
    fn slot_of(&self, id: TabId) -> Option<(WindowId, usize)> {
        let window = self.tabs.get(&id)?.window?;
        let index = self.windows.index_of(window, id)?;
        Some((window, index))
    }

    /// Snapshot of every attribute of a live tab.
    pub fn tab(&self, id: TabId) -> Result<Tab, TabError> {
        let r = self.record(id)?;
        let slot = self.slot_of(id);
        let active = match slot {
            Some((window, _)) => self.windows.active_tab(window) == Some(id),
            None => r.active,
        };
        Ok(Tab {
            id,
            window_id: slot.map(|(w, _)| w),
            index: slot.map(|(_, i)| i),
            pinned: r.pinned,
            discarded: self.is_discarded(id)?,
            auto_discardable: r.auto_discardable,
            active,
            is_placeholder: r.is_placeholder,
            opener_id: r.opener,
            window_closing: r.window_closing,
            values: r.values.clone(),
        })
    }

    /// Lifecycle state of `id`. Ids that were allocated and whose tab is gone
    /// report [`TabState::Destroyed`]; never-allocated ids are `NotFound`.
    pub fn state(&self, id: TabId) -> Result<TabState, TabError> {
        match self.tab(id) {
            Ok(tab) => Ok(tab.state()),
            Err(_) if id.0 >= 1 && id.0 <= self.next_tab_id => Ok(TabState::Destroyed),
            Err(e) => Err(e),
        }
    }

    pub fn is_discarded(&self, id: TabId) -> Result<bool, TabError> {
        let r = self.record(id)?;
        let by_policy = self
            .discard_policy
            .as_ref()
            .is_some_and(|p| p.manages(id) && p.is_discarded(id));
        Ok(r.discarded || by_policy)
    }

    pub fn window_for_tab(&self, id: TabId) -> Result<Option<WindowId>, TabError> {
        self.record(id)?;
        Ok(self.slot_of(id).map(|(w, _)| w))
    }

    /// Returns `index` when some tab of `window` occupies it, `None` (the
    /// no-tab sentinel) otherwise.
    pub fn tab_strip_index(&self, window: WindowId, index: usize) -> Option<usize> {
        self.windows.tab_at(window, index).map(|_| index)
    }

    pub fn set_quitting(&mut self, quitting: bool) {
        self.quitting = quitting;
    }

    pub fn is_quitting(&self) -> bool {
        self.quitting
    }

    // ── Windows ──────────────────────────────────────────────────────────

    pub fn open_window(&mut self) -> WindowId {
        let id = self.windows.open_window();
        info!(window = %id, "Window opened");
        id
    }

    /// Closes `window`. Its tabs become detached once the removal is
    /// reconciled by [`run_pending`](Self::run_pending).
    pub fn close_window(&mut self, window: WindowId) -> Result<Vec<TabId>, TabError> {
        let orphans = self.windows.close_window(window)?;
        info!(window = %window, tabs = orphans.len(), "Window closed");
        Ok(orphans)
    }

    pub fn set_last_active(&mut self, window: WindowId) -> Result<(), TabError> {
        self.windows.set_last_active(window)
    }

    // ── Creation / destruction ───────────────────────────────────────────

    pub fn create_tab(&mut self, params: TabCreateParams) -> Result<TabId, TabError> {
        if let Some(window) = params.window_id
            && !self.windows.contains(window)
        {
            return Err(TabError::WindowNotFound(window));
        }

        let id = self.allocate_id();
        let auto_discardable = params
            .auto_discardable
            .unwrap_or(self.config.default_auto_discardable);
        let mut record = TabRecord::new(self.guests.create(id, false), auto_discardable);
        record.pinned = params.pinned;
        record.discarded = params.discarded;
        record.needs_reload = params.discarded;
        record.active = params.active;
        record.opener = params.opener_tab_id;
        record.preferred_index = params.index;
        record.values = params.initial_values();
        self.tabs.insert(id, record);

        if !auto_discardable
            && let Some(policy) = self.discard_policy.as_mut()
            && policy.manages(id)
        {
            policy.set_auto_discardable(id, false);
        }

        info!(tab = %id, window = ?params.window_id, pinned = params.pinned, "Tab created");

        if let Some(window) = params.window_id {
            self.install(id, window, params.index, params.active)?;
        }
        Ok(id)
    }

    /// Closes the tab's content: leaves its window, erases its render route
    /// and destroys the guest. The id never resolves again.
    pub fn destroy_tab(&mut self, id: TabId) -> Result<(), TabError> {
        if let Some((window, index)) = self.slot_of(id) {
            self.windows.detach(window, index)?;
        }
        let mut record = self.tabs.remove(&id).ok_or(TabError::TabNotFound(id))?;
        self.routes.erase(id);
        record.guest.destroy();
        info!(tab = %id, placeholder = record.is_placeholder, "Tab destroyed");
        Ok(())
    }

    fn allocate_id(&mut self) -> TabId {
        self.next_tab_id += 1;
        TabId(self.next_tab_id)
    }

    // ── Attach / detach ──────────────────────────────────────────────────

    /// Registers a detached tab at `index` of `window`. A placeholder found
    /// at that slot is replaced (its pinned state carries over) and destroyed
    /// on the next turn; any other slot receives an insertion.
    pub fn attach_guest(&mut self, id: TabId, window: WindowId, index: usize) -> Result<(), TabError> {
        // The registry decides: a tab orphaned by a closed window is detached
        // even before the removal event has been handled.
        if self.slot_of(id).is_some() {
            return Err(TabError::invalid_state(id, "already attached"));
        }
        let foreground = self.record(id)?.active;
        if !self.windows.contains(window) {
            return Err(TabError::WindowNotFound(window));
        }

        let occupant = self
            .windows
            .tab_at(window, index)
            .filter(|t| self.tabs.get(t).is_some_and(|r| r.is_placeholder));

        match occupant {
            Some(placeholder) => {
                self.windows.replace(window, index, id)?;
                let mut inherited_pinned = false;
                if let Some(p) = self.tabs.get_mut(&placeholder) {
                    inherited_pinned = p.pinned;
                    p.window = None;
                    p.guest.hide();
                    p.guest.detach();
                }
                if let Some(r) = self.tabs.get_mut(&id) {
                    r.pinned = inherited_pinned;
                    r.window = Some(window);
                    r.preferred_index = None;
                }
                self.pending.push_back(Deferred::DestroyPlaceholder(placeholder));
                info!(tab = %id, window = %window, index, placeholder = %placeholder, "Tab reattached over placeholder");
                self.finish_attach(id, window);
            }
            None => {
                self.install(id, window, Some(index), foreground)?;
            }
        }
        Ok(())
    }

    /// Detaches an attached tab, leaving a new placeholder tab in its slot.
    /// Returns the placeholder's id.
    pub fn detach_guest(&mut self, id: TabId) -> Result<TabId, TabError> {
        let Some((window, index)) = self.slot_of(id) else {
            return Err(TabError::invalid_state(id, "not attached"));
        };

        let placeholder = self.allocate_id();
        let guest = self.guests.create(placeholder, true);
        let source = self.tabs.get_mut(&id).ok_or(TabError::TabNotFound(id))?;
        let mut record = TabRecord::new(guest, source.auto_discardable);
        record.is_placeholder = true;
        record.pinned = source.pinned;
        record.values = source.values.clone();
        // The pending close request travels with the slot.
        record.window_closing = std::mem::take(&mut source.window_closing);
        record.window = Some(window);

        source.window = None;
        source.active = false;
        source.guest.hide();
        source.guest.detach();

        self.tabs.insert(placeholder, record);
        self.windows.replace(window, index, placeholder)?;
        info!(tab = %id, window = %window, index, placeholder = %placeholder, "Tab detached, placeholder installed");

        self.notifier.notify(TabNotification::Reparented {
            tab: placeholder,
            window,
        });
        self.attach_content(placeholder, window);
        Ok(placeholder)
    }

    /// Host callback: the tab's guest finished attaching to its embedder.
    pub fn did_attach(&mut self, id: TabId) -> Result<(), TabError> {
        self.maybe_request_window_close(id);

        let record = self.record(id)?;
        if !record.is_placeholder {
            return Ok(());
        }
        if !record.pinned && !self.is_discarded(id)? {
            // Transient placeholder of a move: removing it now would mutate the
            // tab list from inside its own notification.
            debug!(tab = %id, "Scheduling transient placeholder destruction");
            self.pending.push_back(Deferred::DestroyPlaceholder(id));
        } else {
            self.maybe_attach_or_create_pinned_tab(id)?;
        }
        Ok(())
    }

    /// Turns a pinned placeholder back into a real tab when its window is the
    /// most recently active one. Returns whether the placeholder was
    /// materialized.
    pub fn maybe_attach_or_create_pinned_tab(&mut self, id: TabId) -> Result<bool, TabError> {
        let last_active = self.windows.last_active();
        let record = self.tabs.get_mut(&id).ok_or(TabError::TabNotFound(id))?;
        let Some(window) = record.window else {
            return Ok(false);
        };
        if record.window_closing
            || !record.pinned
            || !record.is_placeholder
            || !record.guest.is_attached()
            || last_active != Some(window)
        {
            return Ok(false);
        }

        record.is_placeholder = false;
        record.guest.load();
        info!(tab = %id, window = %window, "Pinned placeholder materialized");
        Ok(true)
    }

    // ── Move / pin / index ───────────────────────────────────────────────

    /// Moves the tab to `target_index` of `target_window` (`None` appends, or
    /// uses the index stored by [`set_tab_index`](Self::set_tab_index) while
    /// detached). A pinned tab leaving its window leaves a placeholder behind.
    /// Nothing changes when the target window does not exist.
    pub fn move_to(
        &mut self,
        id: TabId,
        target_index: Option<usize>,
        target_window: WindowId,
        foreground: bool,
    ) -> Result<(), TabError> {
        let record = self.record(id)?;
        if !self.windows.contains(target_window) {
            return Err(TabError::WindowNotFound(target_window));
        }
        let index = target_index.or(record.preferred_index);
        let leaves_placeholder = record.pinned && !record.is_placeholder;

        if let Some((current, slot)) = self.slot_of(id) {
            if leaves_placeholder && current != target_window {
                self.detach_guest(id)?;
            } else {
                self.windows.detach(current, slot)?;
                if let Some(r) = self.tabs.get_mut(&id) {
                    r.window = None;
                    r.guest.detach();
                }
            }
        }

        self.install(id, target_window, index, foreground)?;
        if foreground && let Some(r) = self.tabs.get_mut(&id) {
            r.active = true;
        }
        Ok(())
    }

    /// Returns `Ok(false)` when the pinned state is already `pinned`.
    pub fn set_pinned(&mut self, id: TabId, pinned: bool) -> Result<bool, TabError> {
        let slot = self.slot_of(id);
        let record = self.tabs.get_mut(&id).ok_or(TabError::TabNotFound(id))?;
        if record.pinned == pinned {
            return Ok(false);
        }
        record.pinned = pinned;
        if let Some((window, index)) = slot {
            self.windows.set_tab_pinned(window, index, pinned)?;
        }
        debug!(tab = %id, pinned, "Pinned state changed");
        Ok(true)
    }

    pub fn set_tab_index(&mut self, id: TabId, index: usize) -> Result<(), TabError> {
        match self.slot_of(id) {
            Some((window, from)) => {
                self.windows.move_tab(window, from, index)?;
            }
            None => {
                let record = self.tabs.get_mut(&id).ok_or(TabError::TabNotFound(id))?;
                record.preferred_index = Some(index);
            }
        }
        Ok(())
    }

    // ── Discard ──────────────────────────────────────────────────────────

    /// Returns `Ok(false)` if the tab is already discarded. With a policy
    /// managing the tab the decision is the policy's; otherwise the tab is
    /// only flagged and reloads on its next visible transition.
    pub fn discard(&mut self, id: TabId) -> Result<bool, TabError> {
        if self.is_discarded(id)? {
            return Ok(false);
        }
        if let Some(policy) = self.discard_policy.as_mut()
            && policy.manages(id)
        {
            let discarded = policy.discard(id);
            debug!(tab = %id, discarded, "Discard delegated to policy");
            return Ok(discarded);
        }
        let record = self.tabs.get_mut(&id).ok_or(TabError::TabNotFound(id))?;
        record.discarded = true;
        record.needs_reload = true;
        info!(tab = %id, "Tab discarded");
        Ok(true)
    }

    pub fn set_auto_discardable(&mut self, id: TabId, auto_discardable: bool) -> Result<(), TabError> {
        let record = self.tabs.get_mut(&id).ok_or(TabError::TabNotFound(id))?;
        record.auto_discardable = auto_discardable;
        if let Some(policy) = self.discard_policy.as_mut()
            && policy.manages(id)
        {
            policy.set_auto_discardable(id, auto_discardable);
        }
        Ok(())
    }

    pub fn on_visibility_changed(&mut self, id: TabId, visibility: Visibility) -> Result<(), TabError> {
        let reload = self.config.reload_discarded_on_show;
        let record = self.tabs.get_mut(&id).ok_or(TabError::TabNotFound(id))?;
        if visibility == Visibility::Visible && record.needs_reload {
            record.discarded = false;
            record.needs_reload = false;
            if reload {
                record.guest.reload();
            }
            debug!(tab = %id, reload, "Discarded tab shown");
        }
        Ok(())
    }

    // ── Activation / close ───────────────────────────────────────────────

    /// Attached tabs are activated through their window and shown (unless
    /// discarded). Detached tabs only record the flag, applied when they are
    /// attached later.
    pub fn set_active(&mut self, id: TabId, active: bool) -> Result<(), TabError> {
        let slot = self.slot_of(id);
        let discarded = self.is_discarded(id)?;
        if active {
            if let Some((window, index)) = slot {
                self.windows.activate_at(window, index)?;
            }
            let record = self.tabs.get_mut(&id).ok_or(TabError::TabNotFound(id))?;
            record.active = true;
            if slot.is_some() && !discarded {
                record.guest.show();
            }
            self.maybe_attach_or_create_pinned_tab(id)?;
        } else {
            let record = self.tabs.get_mut(&id).ok_or(TabError::TabNotFound(id))?;
            record.active = false;
            if slot.is_some() {
                record.guest.hide();
            }
        }
        Ok(())
    }

    /// Called for each tab of a window about to close.
    pub fn will_close_window(&mut self, id: TabId) -> Result<CloseDecision, TabError> {
        let attached = self.slot_of(id).is_some();
        let other_windows = self.windows.len() > 1;
        let intercept = self.config.hide_pinned_on_window_close && !self.quitting;
        let record = self.tabs.get_mut(&id).ok_or(TabError::TabNotFound(id))?;
        record.window_closing = false;

        if intercept && attached && record.pinned && !record.is_placeholder && other_windows {
            record.guest.hide();
            record.active = false;
            record.window_closing = true;
            info!(tab = %id, "Pinned tab hidden instead of closed");
            return Ok(CloseDecision::HideContent);
        }
        Ok(CloseDecision::Proceed)
    }

    fn maybe_request_window_close(&mut self, id: TabId) {
        let Some(record) = self.tabs.get_mut(&id) else {
            return;
        };
        if !record.window_closing {
            return;
        }
        if let Some(window) = record.window {
            record.window_closing = false;
            self.notifier
                .notify(TabNotification::WindowCloseRequested { tab: id, window });
        }
    }

    /// Clears the attachment of every tab hosted by a removed window.
    pub fn on_window_removed(&mut self, window: WindowId) {
        let hosted: Vec<TabId> = self
            .tabs
            .iter()
            .filter(|(_, r)| r.window == Some(window))
            .map(|(id, _)| *id)
            .collect();
        for id in hosted {
            self.maybe_request_window_close(id);
            if let Some(record) = self.tabs.get_mut(&id)
                && record.window == Some(window)
            {
                record.window = None;
                record.guest.detach();
                debug!(tab = %id, window = %window, "Window removed, tab detached");
            }
        }
    }

    // ── Metadata ─────────────────────────────────────────────────────────

    pub fn set_opener(&mut self, id: TabId, opener: Option<TabId>) -> Result<(), TabError> {
        self.tabs
            .get_mut(&id)
            .ok_or(TabError::TabNotFound(id))?
            .opener = opener;
        Ok(())
    }

    pub fn set_tab_values(&mut self, id: TabId, values: TabValues) -> Result<(), TabError> {
        self.tabs
            .get_mut(&id)
            .ok_or(TabError::TabNotFound(id))?
            .values
            .merge(values);
        Ok(())
    }

    // ── Render routes ────────────────────────────────────────────────────

    /// Returns whether the route was recorded (only the first one is).
    pub fn on_render_view_created(&mut self, id: TabId, route: RenderRoute) -> Result<bool, TabError> {
        self.record(id)?;
        Ok(self.routes.register(id, route))
    }

    pub fn on_render_view_host_changed(&mut self, id: TabId, route: RenderRoute) -> Result<(), TabError> {
        self.record(id)?;
        self.routes.update(id, route);
        Ok(())
    }

    /// Route of a live tab. Ids of destroyed tabs never resolve.
    pub fn resolve_route(&self, id: TabId) -> Result<RenderRoute, TabError> {
        self.record(id)?;
        self.routes.lookup(id)
    }

    /// Resolves where a validated injection request must be delivered.
    pub fn route_script(&self, id: TabId, request: &ScriptRequest) -> Result<ScriptTarget, TabError> {
        let route = self.resolve_route(id)?;
        debug!(tab = %id, route = %route, extension = %request.extension_id, "Script injection routed");
        Ok(ScriptTarget {
            tab: id,
            route,
            frame_id: request.frame_id,
            frame_scope: request.frame_scope,
            world: request.world,
            run_at: request.run_at,
        })
    }

    // ── Event loop ───────────────────────────────────────────────────────

    /// Runs one turn: drains window events and deferred tasks until both
    /// queues are empty. Returns the number of items processed.
    pub fn run_pending(&mut self) -> usize {
        let mut processed = 0;
        loop {
            let mut progressed = false;
            while let Ok(event) = self.window_events.try_recv() {
                self.handle_window_event(event);
                processed += 1;
                progressed = true;
            }
            if let Some(task) = self.pending.pop_front() {
                self.run_deferred(task);
                processed += 1;
                progressed = true;
            }
            if !progressed {
                return processed;
            }
        }
    }

    fn run_deferred(&mut self, task: Deferred) {
        let result = match task {
            Deferred::DidAttach(id) => self.did_attach(id),
            Deferred::DestroyPlaceholder(id) => {
                // Already replaced or materialized: nothing to remove.
                if self.tabs.get(&id).is_some_and(|r| r.is_placeholder) {
                    self.destroy_tab(id)
                } else {
                    Ok(())
                }
            }
        };
        if let Err(error) = result {
            debug!(?task, %error, "Deferred task dropped");
        }
    }

    fn handle_window_event(&mut self, event: WindowEvent) {
        match event {
            WindowEvent::WindowRemoved(window) => self.on_window_removed(window),
            WindowEvent::LastActiveChanged(window) => {
                debug!(window = %window, "Last active window changed");
                for id in self.tab_ids() {
                    self.maybe_request_window_close(id);
                    if let Err(error) = self.maybe_attach_or_create_pinned_tab(id) {
                        warn!(tab = %id, %error, "Pinned tab check failed");
                    }
                }
            }
            WindowEvent::ActiveTabChanged { window, old, new } => {
                for (tab, active) in [(old, false), (new, true)] {
                    if let Some(record) = tab.and_then(|t| self.tabs.get_mut(&t))
                        && record.window == Some(window)
                    {
                        record.active = active;
                    }
                }
            }
            WindowEvent::PinnedStateChanged { tab, .. } => {
                if self.tabs.contains_key(&tab)
                    && let Err(error) = self.maybe_attach_or_create_pinned_tab(tab)
                {
                    warn!(tab = %tab, %error, "Pinned tab check failed");
                }
            }
            other => trace!(event = ?other, "window event"),
        }
    }

    // ── Internals ────────────────────────────────────────────────────────

    /// Inserts a detached tab into `window` and starts its attachment.
    fn install(
        &mut self,
        id: TabId,
        window: WindowId,
        index: Option<usize>,
        foreground: bool,
    ) -> Result<usize, TabError> {
        let pinned = self.record(id)?.pinned;
        let at = self.windows.insert(window, index, id, pinned, foreground)?;
        if let Some(record) = self.tabs.get_mut(&id) {
            record.window = Some(window);
            record.preferred_index = None;
        }
        debug!(tab = %id, window = %window, index = at, "Tab inserted");
        self.finish_attach(id, window);
        Ok(at)
    }

    /// Common tail of every attachment: reparent notification, guest attach,
    /// initial load.
    fn finish_attach(&mut self, id: TabId, window: WindowId) {
        self.notifier
            .notify(TabNotification::Reparented { tab: id, window });

        let discarded = self.is_discarded(id).unwrap_or(false);
        if discarded
            && let Some(policy) = self.discard_policy.as_mut()
            && policy.manages(id)
        {
            policy.set_auto_discardable(id, false);
        }
        if let Some(record) = self.tabs.get_mut(&id)
            && !discarded
            && !record.is_placeholder
        {
            record.guest.load();
        }
        self.attach_content(id, window);
    }

    fn attach_content(&mut self, id: TabId, window: WindowId) {
        if let Some(record) = self.tabs.get_mut(&id)
            && record.guest.attach(window)
        {
            self.pending.push_back(Deferred::DidAttach(id));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::rc::Rc;

    use super::*;
    use crate::error::ErrorKind;
    use crate::host::{GuestCall, GuestJournal, HeadlessGuest, RecordingSink};

    struct Harness {
        ctl: TabController,
        journal: GuestJournal,
        sink: RecordingSink,
    }

    fn harness_with(config: TabsConfig) -> Harness {
        let journal = GuestJournal::new();
        let sink = RecordingSink::new();
        let ctl = TabController::new(
            WindowRegistry::new(),
            Arc::new(RouteRegistry::new()),
            HeadlessGuest::factory(journal.clone()),
            sink.clone(),
            config,
        );
        Harness { ctl, journal, sink }
    }

    fn harness() -> Harness {
        harness_with(TabsConfig::default())
    }

    fn tab_in(ctl: &mut TabController, window: WindowId, pinned: bool) -> TabId {
        ctl.create_tab(TabCreateParams {
            window_id: Some(window),
            pinned,
            ..Default::default()
        })
        .unwrap()
    }

    /// `window_id == None ⇔ index == None` for every live tab.
    fn assert_slot_invariant(ctl: &TabController) {
        for id in ctl.tab_ids() {
            let tab = ctl.tab(id).unwrap();
            assert_eq!(tab.window_id.is_none(), tab.index.is_none(), "tab {id}");
        }
    }

    #[derive(Default)]
    struct PolicyState {
        managed: HashSet<TabId>,
        discarded: HashSet<TabId>,
        auto_discardable: Vec<(TabId, bool)>,
    }

    #[derive(Clone, Default)]
    struct FakePolicy(Rc<RefCell<PolicyState>>);

    impl DiscardPolicy for FakePolicy {
        fn manages(&self, tab: TabId) -> bool {
            self.0.borrow().managed.contains(&tab)
        }
        fn discard(&mut self, tab: TabId) -> bool {
            self.0.borrow_mut().discarded.insert(tab)
        }
        fn is_discarded(&self, tab: TabId) -> bool {
            self.0.borrow().discarded.contains(&tab)
        }
        fn set_auto_discardable(&mut self, tab: TabId, auto_discardable: bool) {
            self.0.borrow_mut().auto_discardable.push((tab, auto_discardable));
        }
    }

    // ── create / destroy ──────────────────────────────────────────────

    #[test]
    fn test_create_in_window_attaches_and_loads() {
        let mut h = harness();
        let w = h.ctl.open_window();
        let t = tab_in(&mut h.ctl, w, false);
        let tab = h.ctl.tab(t).unwrap();
        assert_eq!(tab.window_id, Some(w));
        assert_eq!(tab.index, Some(0));
        assert_eq!(tab.state(), TabState::Attached);
        assert_eq!(h.journal.count(t, GuestCall::Load), 1);
        assert_eq!(
            h.sink.take(),
            vec![TabNotification::Reparented { tab: t, window: w }]
        );
    }

    #[test]
    fn test_create_in_missing_window_creates_nothing() {
        let mut h = harness();
        let err = h
            .ctl
            .create_tab(TabCreateParams::in_window(WindowId(42)))
            .unwrap_err();
        assert_eq!(err, TabError::WindowNotFound(WindowId(42)));
        assert!(h.ctl.tab_ids().is_empty());
        assert!(h.journal.is_empty());
    }

    #[test]
    fn test_create_headless_uses_config_default_auto_discardable() {
        let mut h = harness_with(TabsConfig {
            default_auto_discardable: false,
            ..Default::default()
        });
        let t = h.ctl.create_tab(TabCreateParams::default()).unwrap();
        let tab = h.ctl.tab(t).unwrap();
        assert!(!tab.auto_discardable);
        assert_eq!(tab.state(), TabState::Detached);
        assert_eq!(tab.index, None);
    }

    #[test]
    fn test_destroyed_ids_are_never_reused() {
        let mut h = harness();
        let w = h.ctl.open_window();
        let t1 = tab_in(&mut h.ctl, w, false);
        h.ctl.destroy_tab(t1).unwrap();
        let t2 = tab_in(&mut h.ctl, w, false);
        assert_ne!(t1, t2);
        assert_eq!(h.ctl.state(t1), Ok(TabState::Destroyed));
        assert_eq!(h.ctl.tab(t1), Err(TabError::TabNotFound(t1)));
        assert_eq!(h.ctl.state(TabId(99)), Err(TabError::TabNotFound(TabId(99))));
        assert_eq!(h.ctl.windows().tabs(w).unwrap(), vec![t2]);
    }

    // ── attach / detach ───────────────────────────────────────────────

    #[test]
    fn test_attach_guest_twice_fails_without_duplicate_slot() {
        let mut h = harness();
        let w = h.ctl.open_window();
        let t = h.ctl.create_tab(TabCreateParams::default()).unwrap();
        h.ctl.attach_guest(t, w, 0).unwrap();
        let err = h.ctl.attach_guest(t, w, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(h.ctl.windows().tabs(w).unwrap(), vec![t]);
    }

    #[test]
    fn test_attach_guest_missing_window_is_not_found() {
        let mut h = harness();
        let t = h.ctl.create_tab(TabCreateParams::default()).unwrap();
        let err = h.ctl.attach_guest(t, WindowId(3), 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(h.ctl.tab(t).unwrap().state(), TabState::Detached);
    }

    #[test]
    fn test_detach_pinned_yields_one_placeholder_in_slot() {
        let mut h = harness();
        let w = h.ctl.open_window();
        // Keep `w` from being the most recently active window.
        let _other = h.ctl.open_window();
        let t = tab_in(&mut h.ctl, w, true);
        let p = h.ctl.detach_guest(t).unwrap();
        h.ctl.run_pending();

        let placeholder = h.ctl.tab(p).unwrap();
        assert!(placeholder.is_placeholder);
        assert!(placeholder.pinned);
        assert_eq!((placeholder.window_id, placeholder.index), (Some(w), Some(0)));

        let detached = h.ctl.tab(t).unwrap();
        assert_eq!(detached.state(), TabState::Detached);
        assert_eq!((detached.window_id, detached.index), (None, None));

        let placeholders = h
            .ctl
            .tab_ids()
            .into_iter()
            .filter(|id| h.ctl.tab(*id).unwrap().is_placeholder)
            .count();
        assert_eq!(placeholders, 1);
        assert_slot_invariant(&h.ctl);
    }

    #[test]
    fn test_detach_unpinned_placeholder_destroyed_next_turn() {
        let mut h = harness();
        let w = h.ctl.open_window();
        let t = tab_in(&mut h.ctl, w, false);
        let p = h.ctl.detach_guest(t).unwrap();
        // Still present until the loop turns.
        assert_eq!(h.ctl.state(p), Ok(TabState::Placeholder));
        h.ctl.run_pending();
        assert_eq!(h.ctl.state(p), Ok(TabState::Destroyed));
        assert!(h.ctl.windows().tabs(w).unwrap().is_empty());
        assert_eq!(h.journal.count(p, GuestCall::Destroy), 1);
    }

    #[test]
    fn test_detach_when_detached_is_invalid_state() {
        let mut h = harness();
        let t = h.ctl.create_tab(TabCreateParams::default()).unwrap();
        let err = h.ctl.detach_guest(t).unwrap_err();
        assert_eq!(err, TabError::invalid_state(t, "not attached"));
    }

    #[test]
    fn test_discarded_placeholder_is_kept() {
        let mut h = harness();
        let w = h.ctl.open_window();
        let t = tab_in(&mut h.ctl, w, false);
        let p = h.ctl.detach_guest(t).unwrap();
        h.ctl.discard(p).unwrap();
        h.ctl.run_pending();
        assert_eq!(h.ctl.state(p), Ok(TabState::Placeholder));
    }

    #[test]
    fn test_pinned_transfer_scenario() {
        let mut h = harness();
        let w1 = h.ctl.open_window();
        let w2 = h.ctl.open_window();
        let t1 = tab_in(&mut h.ctl, w1, true);
        h.ctl.run_pending();

        let p = h.ctl.detach_guest(t1).unwrap();
        h.ctl.run_pending();
        assert_eq!(h.ctl.tab(p).unwrap().index, Some(0));
        assert_eq!(h.ctl.state(t1), Ok(TabState::Detached));

        h.ctl.attach_guest(t1, w2, 0).unwrap();
        h.ctl.run_pending();
        let t = h.ctl.tab(t1).unwrap();
        assert_eq!((t.window_id, t.index), (Some(w2), Some(0)));
        assert_eq!(h.ctl.state(p), Ok(TabState::Placeholder));
        assert_eq!(h.journal.count(p, GuestCall::Load), 0);

        // W2 is still the most recently active window: nothing happens.
        assert!(!h.ctl.maybe_attach_or_create_pinned_tab(p).unwrap());

        h.ctl.set_last_active(w1).unwrap();
        h.ctl.run_pending();
        let placeholder = h.ctl.tab(p).unwrap();
        assert!(!placeholder.is_placeholder);
        assert_eq!(placeholder.window_id, Some(w1));
        assert_eq!(h.journal.count(p, GuestCall::Load), 1);
        assert_slot_invariant(&h.ctl);
    }

    #[test]
    fn test_each_pinned_placeholder_waits_for_its_own_window() {
        let mut h = harness();
        let w1 = h.ctl.open_window();
        let w2 = h.ctl.open_window();
        let w3 = h.ctl.open_window();
        let t = tab_in(&mut h.ctl, w1, true);
        h.ctl.run_pending();

        // w3 stays most recently active while the tab hops w1 → w2 → w3.
        let p1 = h.ctl.detach_guest(t).unwrap();
        h.ctl.attach_guest(t, w2, 0).unwrap();
        h.ctl.run_pending();
        let p2 = h.ctl.detach_guest(t).unwrap();
        h.ctl.attach_guest(t, w3, 0).unwrap();
        h.ctl.run_pending();
        assert_eq!(h.ctl.state(p1), Ok(TabState::Placeholder));
        assert_eq!(h.ctl.state(p2), Ok(TabState::Placeholder));

        h.ctl.set_last_active(w2).unwrap();
        h.ctl.run_pending();
        assert_eq!(h.ctl.state(p2), Ok(TabState::Attached));
        assert_eq!(h.journal.count(p2, GuestCall::Load), 1);
        assert_eq!(h.ctl.state(p1), Ok(TabState::Placeholder));
        assert_eq!(h.journal.count(p1, GuestCall::Load), 0);

        h.ctl.set_last_active(w1).unwrap();
        h.ctl.run_pending();
        assert_eq!(h.ctl.state(p1), Ok(TabState::Attached));
        assert_eq!(h.journal.count(p1, GuestCall::Load), 1);
        assert_eq!(h.journal.count(p2, GuestCall::Load), 1);

        // The real tab never left w3.
        assert_eq!(h.ctl.window_for_tab(t), Ok(Some(w3)));
        assert_eq!(h.ctl.windows().tabs(w1).unwrap(), vec![p1]);
        assert_eq!(h.ctl.windows().tabs(w2).unwrap(), vec![p2]);
        assert_slot_invariant(&h.ctl);
    }

    #[test]
    fn test_reattach_over_placeholder_inherits_pinned() {
        let mut h = harness();
        let w1 = h.ctl.open_window();
        let w2 = h.ctl.open_window();
        let t = tab_in(&mut h.ctl, w1, true);
        let p = h.ctl.detach_guest(t).unwrap();
        h.ctl.set_pinned(t, false).unwrap();

        h.ctl.attach_guest(t, w1, 0).unwrap();
        h.ctl.run_pending();
        let tab = h.ctl.tab(t).unwrap();
        assert!(tab.pinned);
        assert_eq!((tab.window_id, tab.index), (Some(w1), Some(0)));
        assert_eq!(h.ctl.state(p), Ok(TabState::Destroyed));
        assert_eq!(h.ctl.windows().tabs(w1).unwrap(), vec![t]);
        assert!(h.ctl.windows().tabs(w2).unwrap().is_empty());
    }

    // ── move ──────────────────────────────────────────────────────────

    #[test]
    fn test_move_to_missing_window_leaves_tab_untouched() {
        let mut h = harness();
        let w = h.ctl.open_window();
        let _first = tab_in(&mut h.ctl, w, false);
        let t = tab_in(&mut h.ctl, w, false);
        let before = h.ctl.tab(t).unwrap();
        let err = h.ctl.move_to(t, Some(0), WindowId(77), true).unwrap_err();
        assert_eq!(err, TabError::WindowNotFound(WindowId(77)));
        assert_eq!(h.ctl.tab(t).unwrap(), before);
        assert_eq!(h.ctl.windows().index_of(w, t), Some(1));
    }

    #[test]
    fn test_move_to_other_window_foreground() {
        let mut h = harness();
        let w1 = h.ctl.open_window();
        let w2 = h.ctl.open_window();
        let t = tab_in(&mut h.ctl, w1, false);
        let other = tab_in(&mut h.ctl, w2, false);
        h.sink.take();

        h.ctl.move_to(t, None, w2, true).unwrap();
        h.ctl.run_pending();
        let tab = h.ctl.tab(t).unwrap();
        assert_eq!((tab.window_id, tab.index), (Some(w2), Some(1)));
        assert!(tab.active);
        assert!(!h.ctl.tab(other).unwrap().active);
        assert!(h.ctl.windows().tabs(w1).unwrap().is_empty());
        assert!(
            h.sink
                .take()
                .contains(&TabNotification::Reparented { tab: t, window: w2 })
        );
    }

    #[test]
    fn test_move_pinned_across_windows_leaves_placeholder() {
        let mut h = harness();
        let w1 = h.ctl.open_window();
        let w2 = h.ctl.open_window();
        let t = tab_in(&mut h.ctl, w1, true);
        h.ctl.move_to(t, Some(0), w2, false).unwrap();
        h.ctl.run_pending();

        let left = h.ctl.windows().tabs(w1).unwrap();
        assert_eq!(left.len(), 1);
        assert!(h.ctl.tab(left[0]).unwrap().is_placeholder);
        assert_eq!(h.ctl.tab(t).unwrap().window_id, Some(w2));
        assert_slot_invariant(&h.ctl);
    }

    #[test]
    fn test_move_within_window_reorders() {
        let mut h = harness();
        let w = h.ctl.open_window();
        let a = tab_in(&mut h.ctl, w, false);
        let b = tab_in(&mut h.ctl, w, false);
        h.ctl.move_to(a, None, w, false).unwrap();
        assert_eq!(h.ctl.windows().tabs(w).unwrap(), vec![b, a]);
    }

    #[test]
    fn test_set_tab_index_while_detached_used_by_move() {
        let mut h = harness();
        let w = h.ctl.open_window();
        let a = tab_in(&mut h.ctl, w, false);
        let _b = tab_in(&mut h.ctl, w, false);
        let t = h.ctl.create_tab(TabCreateParams::default()).unwrap();
        h.ctl.set_tab_index(t, 0).unwrap();
        assert_eq!(h.ctl.tab(t).unwrap().index, None);
        h.ctl.move_to(t, None, w, false).unwrap();
        assert_eq!(h.ctl.windows().index_of(w, t), Some(0));
        assert_eq!(h.ctl.windows().index_of(w, a), Some(1));

        h.ctl.set_tab_index(t, 2).unwrap();
        assert_eq!(h.ctl.tab(t).unwrap().index, Some(2));
    }

    // ── pin ───────────────────────────────────────────────────────────

    #[test]
    fn test_set_pinned_is_idempotent_and_reorders() {
        let mut h = harness();
        let w = h.ctl.open_window();
        let a = tab_in(&mut h.ctl, w, false);
        let b = tab_in(&mut h.ctl, w, false);
        assert!(h.ctl.set_pinned(b, true).unwrap());
        assert!(!h.ctl.set_pinned(b, true).unwrap());
        assert_eq!(h.ctl.windows().tabs(w).unwrap(), vec![b, a]);
        assert!(h.ctl.windows().is_pinned_at(w, 0));
        assert!(h.ctl.set_pinned(b, false).unwrap());
        assert!(!h.ctl.windows().is_pinned_at(w, 0));
    }

    // ── discard ───────────────────────────────────────────────────────

    #[test]
    fn test_discard_round_trip() {
        let mut h = harness();
        let w = h.ctl.open_window();
        let t = tab_in(&mut h.ctl, w, false);

        assert!(h.ctl.discard(t).unwrap());
        assert!(h.ctl.is_discarded(t).unwrap());
        assert!(!h.ctl.discard(t).unwrap());

        h.ctl.on_visibility_changed(t, Visibility::Visible).unwrap();
        assert!(!h.ctl.is_discarded(t).unwrap());
        assert_eq!(h.journal.count(t, GuestCall::Reload), 1);

        assert!(h.ctl.discard(t).unwrap());
    }

    #[test]
    fn test_hidden_transition_keeps_discard() {
        let mut h = harness();
        let t = h.ctl.create_tab(TabCreateParams::default()).unwrap();
        h.ctl.discard(t).unwrap();
        for visibility in [Visibility::Hidden, Visibility::Occluded] {
            h.ctl.on_visibility_changed(t, visibility).unwrap();
            assert!(h.ctl.is_discarded(t).unwrap(), "{visibility:?}");
        }
        assert_eq!(h.journal.count(t, GuestCall::Reload), 0);
    }

    #[test]
    fn test_visible_without_reload_when_configured() {
        let mut h = harness_with(TabsConfig {
            reload_discarded_on_show: false,
            ..Default::default()
        });
        let t = h.ctl.create_tab(TabCreateParams::default()).unwrap();
        h.ctl.discard(t).unwrap();
        h.ctl.on_visibility_changed(t, Visibility::Visible).unwrap();
        assert!(!h.ctl.is_discarded(t).unwrap());
        assert_eq!(h.journal.count(t, GuestCall::Reload), 0);
    }

    #[test]
    fn test_discard_delegates_to_policy() {
        let policy = FakePolicy::default();
        let mut h = harness();
        h.ctl = h.ctl.with_discard_policy(policy.clone());
        let t = h.ctl.create_tab(TabCreateParams::default()).unwrap();
        policy.0.borrow_mut().managed.insert(t);

        assert!(h.ctl.discard(t).unwrap());
        assert!(h.ctl.is_discarded(t).unwrap());
        assert!(!h.ctl.discard(t).unwrap());
        // Policy discards do not arm the local reload.
        h.ctl.on_visibility_changed(t, Visibility::Visible).unwrap();
        assert_eq!(h.journal.count(t, GuestCall::Reload), 0);

        h.ctl.set_auto_discardable(t, false).unwrap();
        assert!(!h.ctl.tab(t).unwrap().auto_discardable);
        assert_eq!(policy.0.borrow().auto_discardable, vec![(t, false)]);
    }

    #[test]
    fn test_inserting_discarded_tab_disables_auto_discard_and_defers_load() {
        let policy = FakePolicy::default();
        policy.0.borrow_mut().managed.insert(TabId(1));
        let mut h = harness();
        h.ctl = h.ctl.with_discard_policy(policy.clone());
        let w = h.ctl.open_window();
        let t = h
            .ctl
            .create_tab(TabCreateParams {
                window_id: Some(w),
                discarded: true,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(t, TabId(1));
        assert_eq!(h.journal.count(t, GuestCall::Load), 0);
        assert_eq!(policy.0.borrow().auto_discardable, vec![(t, false)]);
    }

    // ── activation ────────────────────────────────────────────────────

    #[test]
    fn test_set_active_detached_only_sets_flag() {
        let mut h = harness();
        let w = h.ctl.open_window();
        let _existing = tab_in(&mut h.ctl, w, false);
        let t = h.ctl.create_tab(TabCreateParams::default()).unwrap();

        h.ctl.set_active(t, true).unwrap();
        assert!(h.ctl.tab(t).unwrap().active);
        assert!(h.journal.calls_for(t).is_empty());

        h.ctl.attach_guest(t, w, 1).unwrap();
        assert_eq!(h.ctl.windows().active_tab(w), Some(t));
    }

    #[test]
    fn test_set_active_attached_activates_and_shows() {
        let mut h = harness();
        let w = h.ctl.open_window();
        let a = tab_in(&mut h.ctl, w, false);
        let b = tab_in(&mut h.ctl, w, false);
        assert_eq!(h.ctl.windows().active_tab(w), Some(a));

        h.ctl.set_active(b, true).unwrap();
        h.ctl.run_pending();
        assert!(h.ctl.tab(b).unwrap().active);
        assert!(!h.ctl.tab(a).unwrap().active);
        assert_eq!(h.journal.count(b, GuestCall::Show), 1);

        h.ctl.set_active(b, false).unwrap();
        assert_eq!(h.journal.count(b, GuestCall::Hide), 1);
    }

    // ── close ─────────────────────────────────────────────────────────

    #[test]
    fn test_will_close_window_hides_pinned_when_other_windows_remain() {
        let mut h = harness();
        let w1 = h.ctl.open_window();
        let _w2 = h.ctl.open_window();
        let t = tab_in(&mut h.ctl, w1, true);
        assert_eq!(h.ctl.will_close_window(t), Ok(CloseDecision::HideContent));
        assert!(h.ctl.tab(t).unwrap().window_closing);
        assert_eq!(h.journal.count(t, GuestCall::Hide), 1);
        assert_eq!(h.journal.count(t, GuestCall::Destroy), 0);
    }

    #[test]
    fn test_will_close_window_proceeds_otherwise() {
        let mut h = harness();
        let w1 = h.ctl.open_window();
        let w2 = h.ctl.open_window();
        let unpinned = tab_in(&mut h.ctl, w1, false);
        assert_eq!(h.ctl.will_close_window(unpinned), Ok(CloseDecision::Proceed));
        assert!(!h.ctl.tab(unpinned).unwrap().window_closing);

        let pinned = tab_in(&mut h.ctl, w1, true);
        h.ctl.set_quitting(true);
        assert!(h.ctl.is_quitting());
        assert_eq!(h.ctl.will_close_window(pinned), Ok(CloseDecision::Proceed));
        h.ctl.set_quitting(false);
        assert!(!h.ctl.is_quitting());

        h.ctl.close_window(w2).unwrap();
        h.ctl.run_pending();
        assert_eq!(h.ctl.will_close_window(pinned), Ok(CloseDecision::Proceed));
    }

    #[test]
    fn test_close_intercept_disabled_by_config() {
        let mut h = harness_with(TabsConfig {
            hide_pinned_on_window_close: false,
            ..Default::default()
        });
        let w1 = h.ctl.open_window();
        let _w2 = h.ctl.open_window();
        let t = tab_in(&mut h.ctl, w1, true);
        assert_eq!(h.ctl.will_close_window(t), Ok(CloseDecision::Proceed));
    }

    #[test]
    fn test_pending_close_travels_with_placeholder() {
        let mut h = harness();
        let w1 = h.ctl.open_window();
        let w2 = h.ctl.open_window();
        let t = tab_in(&mut h.ctl, w1, true);
        h.ctl.will_close_window(t).unwrap();
        h.sink.take();

        h.ctl.move_to(t, None, w2, true).unwrap();
        assert!(!h.ctl.tab(t).unwrap().window_closing);
        h.ctl.run_pending();

        let notes = h.sink.take();
        let placeholder = h.ctl.windows().tab_at(w1, 0).unwrap();
        assert!(notes.contains(&TabNotification::WindowCloseRequested {
            tab: placeholder,
            window: w1,
        }));
        // One-shot request.
        h.ctl.did_attach(placeholder).unwrap();
        assert!(
            !h.sink
                .take()
                .iter()
                .any(|n| matches!(n, TabNotification::WindowCloseRequested { .. }))
        );
    }

    #[test]
    fn test_window_removal_detaches_hosted_tabs() {
        let mut h = harness();
        let w1 = h.ctl.open_window();
        let w2 = h.ctl.open_window();
        let a = tab_in(&mut h.ctl, w1, false);
        let b = tab_in(&mut h.ctl, w2, false);
        h.ctl.close_window(w1).unwrap();
        h.ctl.run_pending();

        let tab = h.ctl.tab(a).unwrap();
        assert_eq!((tab.window_id, tab.index), (None, None));
        assert_eq!(h.ctl.tab(b).unwrap().window_id, Some(w2));
        // Idempotent for an unrelated window.
        h.ctl.on_window_removed(w1);
        assert_eq!(h.ctl.tab(b).unwrap().window_id, Some(w2));
        assert_slot_invariant(&h.ctl);
    }

    #[test]
    fn test_orphan_of_closed_window_attaches_before_removal_is_handled() {
        let mut h = harness();
        let w1 = h.ctl.open_window();
        let w2 = h.ctl.open_window();
        let t = tab_in(&mut h.ctl, w1, false);
        h.ctl.run_pending();

        assert_eq!(h.ctl.close_window(w1), Ok(vec![t]));
        assert_eq!(h.ctl.state(t), Ok(TabState::Detached));
        h.ctl.attach_guest(t, w2, 0).unwrap();
        h.ctl.run_pending();

        let tab = h.ctl.tab(t).unwrap();
        assert_eq!((tab.window_id, tab.index), (Some(w2), Some(0)));
        assert_eq!(h.ctl.windows().tabs(w2).unwrap(), vec![t]);
        assert_eq!(h.journal.count(t, GuestCall::Attach(w2)), 1);
        assert_slot_invariant(&h.ctl);
    }

    // ── routes / metadata ─────────────────────────────────────────────

    #[test]
    fn test_routes_erased_on_destroy() {
        let mut h = harness();
        let t = h.ctl.create_tab(TabCreateParams::default()).unwrap();
        assert!(h.ctl.on_render_view_created(t, RenderRoute::new(3, 1)).unwrap());
        assert!(!h.ctl.on_render_view_created(t, RenderRoute::new(4, 1)).unwrap());
        h.ctl.on_render_view_host_changed(t, RenderRoute::new(5, 2)).unwrap();
        assert_eq!(h.ctl.resolve_route(t), Ok(RenderRoute::new(5, 2)));

        h.ctl.destroy_tab(t).unwrap();
        assert_eq!(h.ctl.resolve_route(t), Err(TabError::TabNotFound(t)));
        assert!(h.ctl.routes().is_empty());

        let fresh = h.ctl.create_tab(TabCreateParams::default()).unwrap();
        assert_eq!(h.ctl.resolve_route(fresh), Err(TabError::RouteNotFound(fresh)));
    }

    #[test]
    fn test_route_script_targets_render_route() {
        let mut h = harness();
        let t = h.ctl.create_tab(TabCreateParams::default()).unwrap();
        let request = ScriptRequest::parse("ext", "1", r#"{"allFrames":true}"#).unwrap();
        assert_eq!(
            h.ctl.route_script(t, &request).unwrap_err().kind(),
            ErrorKind::NotFound
        );
        h.ctl.on_render_view_created(t, RenderRoute::new(8, 2)).unwrap();
        let target = h.ctl.route_script(t, &request).unwrap();
        assert_eq!(target.route, RenderRoute::new(8, 2));
        assert_eq!(target.frame_scope, crate::options::FrameScope::IncludeSubFrames);
    }

    #[test]
    fn test_metadata_setters() {
        let mut h = harness();
        let w = h.ctl.open_window();
        let opener = tab_in(&mut h.ctl, w, false);
        let t = h
            .ctl
            .create_tab(TabCreateParams::from_json(r#"{"title":"a"}"#).unwrap())
            .unwrap();
        h.ctl.set_opener(t, Some(opener)).unwrap();
        h.ctl
            .set_tab_values(
                t,
                TabValues {
                    audible: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();
        let tab = h.ctl.tab(t).unwrap();
        assert_eq!(tab.opener_id, Some(opener));
        assert_eq!(tab.values.title.as_deref(), Some("a"));
        assert_eq!(tab.values.audible, Some(true));
        assert_eq!(h.ctl.tab_strip_index(w, 0), Some(0));
        assert_eq!(h.ctl.tab_strip_index(w, 1), None);
        assert_eq!(h.ctl.window_for_tab(opener), Ok(Some(w)));
    }
}
