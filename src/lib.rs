//! # SuriTabs — Cycle de vie des onglets
//!
//! Machine à états qui gère l'attachement et le détachement des onglets aux
//! fenêtres du navigateur, les placeholders des onglets épinglés, le discard /
//! reload, et le routage des requêtes d'injection de script vers les frames de
//! rendu.
//!
//! ## Architecture des modules
//!
//! - [`controller`] : [`TabController`], la machine à états. Pilotée par les
//!   événements de l'hôte, un seul thread, mutations différées au tour suivant
//!   via [`TabController::run_pending`].
//!
//! - [`window`] : Registre des fenêtres — listes d'onglets ordonnées (épinglés
//!   en tête), fenêtre la plus récemment active, publish/subscribe d'événements
//!   typés.
//!
//! - [`host`] : Traits des collaborateurs externes (contenu guest, politique de
//!   discard, notifications) et leurs implémentations headless.
//!
//! - [`routing`] : Table id d'onglet → route de rendu, injectée dans le contrôleur.
//!
//! - [`options`] : Paramètres typés reçus à travers la frontière de processus
//!   (création d'onglet, injection de script), validés à l'entrée.
//!
//! - [`config`] : Configuration TOML.
//!
//! - [`tab`], [`ids`], [`error`] : Types de données partagés.

pub mod config;
pub mod controller;
pub mod error;
pub mod host;
pub mod ids;
pub mod options;
pub mod routing;
pub mod tab;
pub mod window;

pub use controller::{CloseDecision, TabController};
pub use error::{ErrorKind, TabError};
pub use ids::{RenderRoute, TabId, WindowId};
pub use tab::{Tab, TabState};
