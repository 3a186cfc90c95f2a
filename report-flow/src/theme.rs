use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::{error::Result, storage::PreferenceStore, store::Store};

pub const THEME_KEY: &str = "mr_theme";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("unknown theme: {}", other)),
        }
    }
}

/// Current theme, persisted under [`THEME_KEY`].
#[derive(Clone)]
pub struct ThemeController {
    store: Arc<dyn PreferenceStore>,
    theme: Store<Theme>,
}

impl ThemeController {
    /// Read the stored preference. Anything other than `light`/`dark` means dark.
    pub async fn load(store: Arc<dyn PreferenceStore>) -> Self {
        let theme = match store.get(THEME_KEY).await {
            Ok(Some(value)) => value.parse().unwrap_or_else(|e| {
                warn!("Ignoring stored theme: {}", e);
                Theme::default()
            }),
            Ok(None) => Theme::default(),
            Err(e) => {
                warn!("Could not read theme preference: {}", e);
                Theme::default()
            }
        };

        Self {
            store,
            theme: Store::new(theme),
        }
    }

    pub fn current(&self) -> Theme {
        self.theme.snapshot()
    }

    /// Persist first; the in-memory theme only changes once the store accepted it.
    pub async fn set(&self, theme: Theme) -> Result<()> {
        self.store.set(THEME_KEY, theme.as_str()).await?;
        self.apply(theme);
        info!("Theme set to {}", theme);
        Ok(())
    }

    /// Forget the stored preference and go back to the default theme.
    pub async fn reset(&self) -> Result<Theme> {
        self.store.remove(THEME_KEY).await?;
        let theme = Theme::default();
        self.apply(theme);
        info!("Theme preference cleared");
        Ok(theme)
    }

    fn apply(&self, theme: Theme) {
        self.theme.update(|current| {
            let changed = *current != theme;
            *current = theme;
            changed
        });
    }

    pub async fn toggle(&self) -> Result<Theme> {
        let next = self.current().toggled();
        self.set(next).await?;
        Ok(next)
    }
}
