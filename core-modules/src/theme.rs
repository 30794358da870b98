//! # Theme
//!
//! Reads and changes the app's theme preference through the host's `Theme`
//! module, and follows changes through its `themechange` event.
//!
//! Theme changes are always delivered as module events, whether the change
//! came from [`set_theme`] or from the platform, so a single listener covers
//! both.
//!
//! ```ignore
//! use core_modules::theme::{self, ThemeMode};
//!
//! theme::set_theme(ThemeMode::Dark).await?;
//! let subscription = theme::add_theme_change_listener(|change| {
//!     tracing::info!(resolved = ?change.resolved(), "Theme changed");
//! });
//! ```

use std::fmt;
use std::sync::Arc;

use bridge_traits::host::HostLocator;
use bridge_traits::PlatformSendSync;
use core_bridge::events::{MissingPayload, ModuleEventKind, ModuleEventMap, Subscription};
use core_bridge::{module_args, shared_event_bus, BridgeConfig, ModuleInvoker};
use serde::{Deserialize, Serialize};

use crate::ModuleResult;

pub const MODULE_NAME: &str = "Theme";

/// User preference; `System` follows the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    Light,
    Dark,
    System,
}

/// Theme actually used for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolvedTheme {
    Light,
    Dark,
}

impl fmt::Display for ThemeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ThemeMode::Light => "light",
            ThemeMode::Dark => "dark",
            ThemeMode::System => "system",
        })
    }
}

impl fmt::Display for ResolvedTheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResolvedTheme::Light => "light",
            ResolvedTheme::Dark => "dark",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeState {
    pub theme_preference: ThemeMode,
    pub resolved_theme: ResolvedTheme,
}

/// Payload of a `themechange` event.
///
/// Hosts report either the new theme alone (`{ "theme": "dark" }`) or the
/// full [`ThemeState`]; every field is optional so both shapes decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeChangePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<ThemeMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme_preference: Option<ThemeMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_theme: Option<ResolvedTheme>,
}

impl ThemeChangePayload {
    /// Theme now used for rendering, if the event tells.
    pub fn resolved(&self) -> Option<ResolvedTheme> {
        self.resolved_theme.or(match self.theme {
            Some(ThemeMode::Light) => Some(ResolvedTheme::Light),
            Some(ThemeMode::Dark) => Some(ResolvedTheme::Dark),
            Some(ThemeMode::System) | None => None,
        })
    }

    /// Full state, when the event carries enough to build it.
    pub fn state(&self) -> Option<ThemeState> {
        Some(ThemeState {
            theme_preference: self.theme_preference.or(self.theme)?,
            resolved_theme: self.resolved()?,
        })
    }
}

impl From<ThemeState> for ThemeChangePayload {
    fn from(state: ThemeState) -> Self {
        Self {
            theme: None,
            theme_preference: Some(state.theme_preference),
            resolved_theme: Some(state.resolved_theme),
        }
    }
}

/// Client for the host's `Theme` module.
#[derive(Debug, Clone)]
pub struct ThemeModule {
    invoker: ModuleInvoker,
}

impl Default for ThemeModule {
    fn default() -> Self {
        Self::new()
    }
}

impl ThemeModule {
    pub fn new() -> Self {
        Self {
            invoker: ModuleInvoker::new(MODULE_NAME),
        }
    }

    pub fn with_locator(locator: Arc<dyn HostLocator>) -> Self {
        Self {
            invoker: ModuleInvoker::with_locator(MODULE_NAME, locator),
        }
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            invoker: ModuleInvoker::from_config(MODULE_NAME, config),
        }
    }

    pub async fn get_theme(&self) -> ModuleResult<ThemeState> {
        self.invoker.invoke("getTheme", module_args![]).await
    }

    pub async fn set_theme(&self, theme: ThemeMode) -> ModuleResult<()> {
        self.invoker.invoke("setTheme", module_args![theme]).await
    }

    pub async fn get_system_theme(&self) -> ModuleResult<ResolvedTheme> {
        self.invoker.invoke("getSystemTheme", module_args![]).await
    }
}

pub async fn get_theme() -> ModuleResult<ThemeState> {
    ThemeModule::new().get_theme().await
}

pub async fn set_theme(theme: ThemeMode) -> ModuleResult<()> {
    ThemeModule::new().set_theme(theme).await
}

pub async fn get_system_theme() -> ModuleResult<ResolvedTheme> {
    ThemeModule::new().get_system_theme().await
}

/// Event map of the `Theme` module.
#[derive(Debug)]
pub struct ThemeEvents;

impl ModuleEventMap for ThemeEvents {
    const MODULE_NAME: &'static str = MODULE_NAME;
}

/// `themechange`
#[derive(Debug)]
pub struct ThemeChange;

impl ModuleEventKind<ThemeEvents> for ThemeChange {
    const EVENT_TYPE: &'static str = "themechange";
    type Payload = ThemeChangePayload;
    // A theme change without state is a host bug worth surfacing.
    const MISSING_PAYLOAD: MissingPayload = MissingPayload::Error;
}

shared_event_bus!(
    /// Process-wide `Theme` event bus.
    pub fn theme_events() -> ThemeEvents
);

/// Follow theme changes on the process-wide bus.
pub fn add_theme_change_listener<F>(callback: F) -> Subscription
where
    F: Fn(ThemeChangePayload) + PlatformSendSync + 'static,
{
    theme_events().add_listener::<ThemeChange, F>(callback)
}
