use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::backend::{Identity, PreferenceBackend};
use crate::filter::GroupBy;
use crate::paging::{DEFAULT_PAGE_SIZE, PAGE_SIZE_CHOICES, is_valid_page_size};
use crate::task::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewDensity {
    #[default]
    Comfortable,
    Compact,
}

impl ViewDensity {
    pub fn as_str(self) -> &'static str {
        match self {
            ViewDensity::Comfortable => "comfortable",
            ViewDensity::Compact => "compact",
        }
    }
}

impl std::str::FromStr for ViewDensity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "comfortable" => Ok(ViewDensity::Comfortable),
            "compact" => Ok(ViewDensity::Compact),
            other => Err(anyhow::anyhow!("unknown view density: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub group_by: GroupBy,
    pub view_density: ViewDensity,
    pub items_per_page: usize,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            group_by: GroupBy::None,
            view_density: ViewDensity::Comfortable,
            items_per_page: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PreferencesPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_by: Option<GroupBy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_density: Option<ViewDensity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_per_page: Option<usize>,
}

impl PreferencesPatch {
    pub fn apply_to(&self, prefs: &mut Preferences) {
        if let Some(group_by) = self.group_by {
            prefs.group_by = group_by;
        }
        if let Some(density) = self.view_density {
            prefs.view_density = density;
        }
        if let Some(size) = self.items_per_page {
            prefs.items_per_page = size;
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PreferenceError {
    #[error("no signed-in user; preferences cannot be saved")]
    Unauthenticated,
    #[error("page size {0} is not one of {choices:?}", choices = PAGE_SIZE_CHOICES)]
    InvalidPageSize(usize),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Per-user view settings: read once, written on every change.
pub struct PreferenceSync<B, I> {
    backend: B,
    identity: I,
    current: Preferences,
}

impl<B, I> PreferenceSync<B, I>
where
    B: PreferenceBackend,
    I: Identity,
{
    pub fn new(backend: B, identity: I) -> Self {
        Self {
            backend,
            identity,
            current: Preferences::default(),
        }
    }

    pub fn current(&self) -> Preferences {
        self.current
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Reads the stored record, creating it with defaults the first time.
    #[instrument(skip(self))]
    pub async fn load(&mut self) -> Result<Preferences, PreferenceError> {
        let user = self.require_user()?;

        let stored = self
            .backend
            .get_preferences(user)
            .await
            .map_err(|err| backend_failure("get_preferences", err))?;

        let prefs = match stored {
            Some(prefs) => prefs,
            None => {
                info!(user_id = %user, "no stored preferences; creating defaults");
                self.backend
                    .create_default_preferences(user)
                    .await
                    .map_err(|err| backend_failure("create_default_preferences", err))?
            }
        };

        self.current = sanitize(prefs);
        Ok(self.current)
    }

    pub async fn set_group_by(&mut self, group_by: GroupBy) -> Result<(), PreferenceError> {
        self.update(PreferencesPatch {
            group_by: Some(group_by),
            ..PreferencesPatch::default()
        })
        .await
    }

    pub async fn set_view_density(&mut self, density: ViewDensity) -> Result<(), PreferenceError> {
        self.update(PreferencesPatch {
            view_density: Some(density),
            ..PreferencesPatch::default()
        })
        .await
    }

    pub async fn set_items_per_page(&mut self, size: usize) -> Result<(), PreferenceError> {
        if !is_valid_page_size(size) {
            return Err(PreferenceError::InvalidPageSize(size));
        }
        self.update(PreferencesPatch {
            items_per_page: Some(size),
            ..PreferencesPatch::default()
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn update(&mut self, patch: PreferencesPatch) -> Result<(), PreferenceError> {
        let user = self.require_user()?;
        if let Some(size) = patch.items_per_page
            && !is_valid_page_size(size)
        {
            return Err(PreferenceError::InvalidPageSize(size));
        }

        self.backend
            .update_preferences(user, &patch)
            .await
            .map_err(|err| backend_failure("update_preferences", err))?;

        patch.apply_to(&mut self.current);
        Ok(())
    }

    fn require_user(&self) -> Result<UserId, PreferenceError> {
        self.identity
            .current_user()
            .ok_or(PreferenceError::Unauthenticated)
    }
}

fn sanitize(mut prefs: Preferences) -> Preferences {
    if !is_valid_page_size(prefs.items_per_page) {
        prefs.items_per_page = DEFAULT_PAGE_SIZE;
    }
    prefs
}

fn backend_failure(op: &'static str, err: anyhow::Error) -> PreferenceError {
    let detail = format!("{err:#}");
    error!(op, error = %detail, "preference backend call failed");
    PreferenceError::Backend(err)
}
