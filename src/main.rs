//! Point d'entrée de la démo SuriTabs.
//!
//! Usage :
//!   suri-tabs [--json]
//!
//! Rejoue le transfert d'un onglet épinglé entre deux fenêtres avec des guests
//! headless, puis affiche l'état final des onglets.
//!
//! Exemples :
//!   cargo run                              → tableau texte
//!   cargo run -- --json                    → état des onglets en JSON
//!   RUST_LOG=suri_tabs=debug cargo run     → trace détaillée des transitions

use std::env;
use std::error::Error;
use std::sync::Arc;

use suri_tabs::config::Config;
use suri_tabs::controller::TabController;
use suri_tabs::host::{GuestJournal, HeadlessGuest, TracingSink};
use suri_tabs::options::TabCreateParams;
use suri_tabs::routing::RouteRegistry;
use suri_tabs::tab::Tab;
use suri_tabs::window::WindowRegistry;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn Error>> {
    let json = env::args().skip(1).any(|arg| arg == "--json");

    // ── 1. Configuration ───────────────────────────────────────────────
    // Loaded before the subscriber exists: its own logs are not shown.
    let config = Config::load();

    // ── 2. Logging / Tracing ───────────────────────────────────────────
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // ── 3. Contrôleur ──────────────────────────────────────────────────
    let journal = GuestJournal::new();
    let mut ctl = TabController::new(
        WindowRegistry::new(),
        Arc::new(RouteRegistry::new()),
        HeadlessGuest::factory(journal.clone()),
        TracingSink,
        config.tabs.clone(),
    );

    // ── 4. Scénario : transfert d'un onglet épinglé ────────────────────
    let w1 = ctl.open_window();
    let w2 = ctl.open_window();
    let pinned = ctl.create_tab(TabCreateParams::from_json(&format!(
        r#"{{"windowId":{w1},"pinned":true,"url":"https://servo.org"}}"#
    ))?)?;
    ctl.create_tab(TabCreateParams::in_window(w1))?;
    ctl.run_pending();

    let placeholder = ctl.detach_guest(pinned)?;
    ctl.run_pending();
    ctl.attach_guest(pinned, w2, 0)?;
    ctl.run_pending();

    info!(%placeholder, "Activating the original window");
    ctl.set_last_active(w1)?;
    ctl.run_pending();

    // ── 5. Affichage ───────────────────────────────────────────────────
    let tabs = ctl
        .tab_ids()
        .into_iter()
        .map(|id| ctl.tab(id))
        .collect::<Result<Vec<Tab>, _>>()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&tabs)?);
    } else {
        print_table(&tabs);
        println!("guest calls: {}", journal.len());
    }
    Ok(())
}

fn print_table(tabs: &[Tab]) {
    println!(
        "{:>4} {:>7} {:>6} {:>7} {:>12} {:>7}",
        "id", "window", "index", "pinned", "placeholder", "active"
    );
    for tab in tabs {
        let window = tab.window_id.map_or("-".to_string(), |w| w.to_string());
        let index = tab.index.map_or("-".to_string(), |i| i.to_string());
        println!(
            "{:>4} {:>7} {:>6} {:>7} {:>12} {:>7}",
            tab.id.0, window, index, tab.pinned, tab.is_placeholder, tab.active
        );
    }
}
