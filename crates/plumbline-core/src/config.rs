use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::task::UserId;

const RC_FILE_NAME: &str =
  ".plumblinerc";
const RC_ENV_VAR: &str = "PLUMBLINE_RC";
const URL_ENV_VAR: &str =
  "PLUMBLINE_BACKEND_URL";
const API_KEY_ENV_VAR: &str =
  "PLUMBLINE_API_KEY";

pub const KEY_BACKEND_URL: &str =
  "backend.url";
pub const KEY_API_KEY: &str =
  "backend.api_key";
pub const KEY_USER_ID: &str =
  "auth.user_id";
pub const KEY_ACCESS_TOKEN: &str =
  "auth.access_token";
pub const KEY_TIMEZONE: &str =
  "timezone";

#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Config {
  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config {
      map:          HashMap::new(),
      loaded_files: vec![]
    };

    cfg.map.insert(
      "color".to_string(),
      "on".to_string()
    );

    let rc = resolve_rc_path(
      rc_override
    )?;
    if let Some(path) = rc {
      info!(rc = %path.display(), "loading rc file");
      cfg.load_file(&path)?;
    } else {
      warn!(
        "no rc file found; using \
         defaults and environment"
      );
    }

    cfg.apply_env();
    Ok(cfg)
  }

  /// `rc.` prefixes are accepted and
  /// stripped.
  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self
      .map
      .get(key)
      .map(|v| v.trim().to_string())
      .filter(|v| !v.is_empty())
  }

  /// The signed-in user, if the rc file
  /// names one.
  pub fn user_id(
    &self
  ) -> anyhow::Result<Option<UserId>> {
    self
      .get(KEY_USER_ID)
      .map(|raw| {
        raw.parse::<UserId>().with_context(|| {
          format!(
            "invalid {KEY_USER_ID}"
          )
        })
      })
      .transpose()
  }

  fn apply_env(&mut self) {
    for (var, key) in [
      (URL_ENV_VAR, KEY_BACKEND_URL),
      (API_KEY_ENV_VAR, KEY_API_KEY)
    ] {
      if let Ok(value) =
        std::env::var(var)
        && !value.trim().is_empty()
      {
        debug!(var, key, "config value taken from environment");
        self.map.insert(
          key.to_string(),
          value
        );
      }
    }
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    self
      .loaded_files
      .push(path.clone());

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let mut line = raw_line.trim();
      if line.is_empty()
        || line.starts_with('#')
      {
        continue;
      }

      if let Some((before, _)) =
        line.split_once(" #")
      {
        line = before.trim();
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, "loaded config key");
      self.map.insert(key, value);
    }

    Ok(())
  }
}

/// Connection details for the hosted
/// backend. Both the url and the api key
/// are required.
#[derive(Clone)]
pub struct BackendSettings {
  pub url:          String,
  pub api_key:      String,
  pub access_token: Option<String>
}

impl std::fmt::Debug for BackendSettings {
  fn fmt(
    &self,
    f: &mut std::fmt::Formatter<'_>
  ) -> std::fmt::Result {
    f.debug_struct("BackendSettings")
      .field("url", &self.url)
      .field("api_key", &"<redacted>")
      .field(
        "access_token",
        &self
          .access_token
          .as_ref()
          .map(|_| "<redacted>")
      )
      .finish()
  }
}

impl BackendSettings {
  #[tracing::instrument(skip(cfg))]
  pub fn from_config(
    cfg: &Config
  ) -> anyhow::Result<Self> {
    let url = cfg
      .get(KEY_BACKEND_URL)
      .ok_or_else(|| {
        anyhow!(
          "missing {KEY_BACKEND_URL} \
           (set it in the rc file or \
           {URL_ENV_VAR})"
        )
      })?;
    if !url.starts_with("https://")
      && !url.starts_with("http://")
    {
      return Err(anyhow!(
        "{KEY_BACKEND_URL} must be an \
         http(s) url, got {url}"
      ));
    }

    let api_key = cfg
      .get(KEY_API_KEY)
      .ok_or_else(|| {
        anyhow!(
          "missing {KEY_API_KEY} (set \
           it in the rc file or \
           {API_KEY_ENV_VAR})"
        )
      })?;

    info!(url = %url, "backend configured");
    Ok(Self {
      url,
      api_key,
      access_token: cfg
        .get(KEY_ACCESS_TOKEN)
    })
  }
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_rc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(rc_env) =
    std::env::var(RC_ENV_VAR)
  {
    if rc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      rc_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!(
      "cannot determine home \
       directory"
    );
    return Ok(None);
  };
  let candidate = home.join(RC_FILE_NAME);
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}
