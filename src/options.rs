//! Typed structures for options received across the process boundary.
//!
//! Tab creation parameters and script-injection options arrive as JSON
//! objects. They are validated here into named, typed, defaulted fields;
//! nothing past this module sees an open-ended dictionary.

use std::path::{Component, Path, PathBuf};

use serde::Deserialize;
use url::Url;

use crate::error::TabError;
use crate::ids::{RenderRoute, TOP_FRAME_ID, TabId, WindowId};
use crate::tab::TabValues;

/// Parameters for [`TabController::create_tab`](crate::controller::TabController::create_tab).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct TabCreateParams {
    /// Window to insert the new tab into. `None` creates a headless tab.
    pub window_id: Option<WindowId>,
    /// Insertion index; `None` appends.
    pub index: Option<usize>,
    pub active: bool,
    pub pinned: bool,
    /// Falls back to `tabs.default_auto_discardable` when unset.
    pub auto_discardable: Option<bool>,
    /// Creates the tab already discarded (lazy load on first show).
    pub discarded: bool,
    pub opener_tab_id: Option<TabId>,
    pub url: Option<Url>,
    pub title: Option<String>,
}

impl TabCreateParams {
    pub fn from_json(json: &str) -> Result<Self, TabError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn in_window(window: WindowId) -> Self {
        Self {
            window_id: Some(window),
            ..Default::default()
        }
    }

    pub(crate) fn initial_values(&self) -> TabValues {
        TabValues {
            title: self.title.clone(),
            url: self.url.clone(),
            ..Default::default()
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Script injection
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunLocation {
    DocumentStart,
    DocumentEnd,
    DocumentIdle,
    #[default]
    Undefined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameScope {
    SingleFrame,
    IncludeSubFrames,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptWorld {
    Isolated,
    Main,
}

/// Raw options object of an injection request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct InjectionOptions {
    pub all_frames: bool,
    pub frame_id: i32,
    pub match_about_blank: bool,
    pub main_world: bool,
    pub run_at: RunLocation,
    /// Extension-relative script file, used instead of inline code.
    pub file: Option<String>,
}

impl Default for InjectionOptions {
    fn default() -> Self {
        Self {
            all_frames: false,
            frame_id: TOP_FRAME_ID,
            match_about_blank: false,
            main_world: false,
            run_at: RunLocation::Undefined,
            file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptSource {
    Code(String),
    /// Path relative to the extension root.
    File(PathBuf),
}

/// Validated script-injection request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRequest {
    pub extension_id: String,
    pub source: ScriptSource,
    pub frame_scope: FrameScope,
    pub frame_id: i32,
    pub match_about_blank: bool,
    pub world: ScriptWorld,
    pub run_at: RunLocation,
}

impl ScriptRequest {
    /// Validates the three arguments of an injection call. `options_json` is
    /// the options object; an empty string means no options.
    pub fn parse(extension_id: &str, code: &str, options_json: &str) -> Result<Self, TabError> {
        if extension_id.trim().is_empty() {
            return Err(TabError::InvalidOptions("extensionId is a required field".into()));
        }
        let options: InjectionOptions = if options_json.trim().is_empty() {
            InjectionOptions::default()
        } else {
            serde_json::from_str(options_json)?
        };
        Self::from_options(extension_id, code, options)
    }

    pub fn from_options(
        extension_id: &str,
        code: &str,
        options: InjectionOptions,
    ) -> Result<Self, TabError> {
        let source = match options.file.as_deref() {
            Some(file) => ScriptSource::File(validate_resource_path(file)?),
            None if code.is_empty() => {
                return Err(TabError::InvalidOptions("codeString is a required field".into()));
            }
            None => ScriptSource::Code(code.to_owned()),
        };
        Ok(Self {
            extension_id: extension_id.to_owned(),
            source,
            frame_scope: if options.all_frames {
                FrameScope::IncludeSubFrames
            } else {
                FrameScope::SingleFrame
            },
            frame_id: options.frame_id,
            match_about_blank: options.match_about_blank,
            world: if options.main_world {
                ScriptWorld::Main
            } else {
                ScriptWorld::Isolated
            },
            run_at: options.run_at,
        })
    }
}

/// Extension resources must stay below the extension root.
fn validate_resource_path(file: &str) -> Result<PathBuf, TabError> {
    let path = Path::new(file);
    if file.is_empty() {
        return Err(TabError::InvalidOptions("file must not be empty".into()));
    }
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(TabError::InvalidOptions(format!(
            "file must be relative to the extension root: {file}"
        )));
    }
    Ok(path.to_path_buf())
}

/// Where a validated request must be delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptTarget {
    pub tab: TabId,
    pub route: RenderRoute,
    pub frame_id: i32,
    pub frame_scope: FrameScope,
    pub world: ScriptWorld,
    pub run_at: RunLocation,
}
