use std::collections::BTreeMap;
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

const CONFIG_ENV_VAR: &str =
  "EDUCONNECT_CONFIG";

/// Flattened settings: `[render] title = "x"` is stored as `render.title`.
#[derive(Debug, Clone)]
pub struct Config {
  map:              BTreeMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let mut map = BTreeMap::new();
    for (key, value) in [
      ("data.location", "~/.educonnect"),
      ("student.default_id", "1"),
      ("render.title", "EduConnect"),
      ("color", "on")
    ] {
      map.insert(
        key.to_string(),
        value.to_string()
      );
    }
    Self {
      map,
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    config_override
  ))]
  pub fn load(
    config_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    let path = resolve_config_path(
      config_override
    )?;
    if let Some(path) = path {
      info!(config = %path.display(), "loading config");
      cfg.load_file(&path)?;
    } else {
      warn!(
        "no config file found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

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
      let key = k.trim().to_string();
      debug!(key = %key, value = %v, "applying override");
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
      .filter(|v| !v.trim().is_empty())
      .cloned()
  }

  pub fn get_u32(
    &self,
    key: &str
  ) -> anyhow::Result<Option<u32>> {
    self
      .get(key)
      .map(|v| {
        v.trim().parse::<u32>().with_context(
          || {
            format!(
              "config key {key} must be \
               a non-negative integer, \
               got {v:?}"
            )
          }
        )
      })
      .transpose()
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

    let table = toml::from_str::<
      toml::Table
    >(&text)
    .map_err(anyhow::Error::new)
    .with_context(|| {
      format!(
        "failed to parse TOML {}",
        path.display()
      )
    })?;

    self.loaded_files.push(path.clone());
    flatten_into(
      &mut self.map,
      "",
      &table
    );
    Ok(())
  }
}

fn flatten_into(
  map: &mut BTreeMap<String, String>,
  prefix: &str,
  table: &toml::Table
) {
  for (k, v) in table {
    let key = if prefix.is_empty() {
      k.clone()
    } else {
      format!("{prefix}.{k}")
    };
    let value = match v {
      | toml::Value::Table(inner) => {
        flatten_into(map, &key, inner);
        continue;
      }
      | toml::Value::String(s) => s.clone(),
      | other => other.to_string()
    };
    trace!(key = %key, value = %value, "loaded config key");
    map.insert(key, value);
  }
}

#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = if let Some(path) =
    override_dir
  {
    path.to_path_buf()
  } else if let Some(cfg_value) =
    cfg.get("data.location")
  {
    expand_tilde(Path::new(&cfg_value))
  } else {
    default_data_dir()?
  };

  if !dir.exists() {
    info!(dir = %dir.display(), "creating data directory");
    fs::create_dir_all(&dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
  }

  Ok(dir)
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_config_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(from_env) =
    std::env::var(CONFIG_ENV_VAR)
  {
    if from_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      from_env
    )));
  }

  let Some(config_dir) =
    dirs::config_dir()
  else {
    debug!(
      "no platform config directory"
    );
    return Ok(None);
  };
  let candidate = config_dir
    .join("educonnect")
    .join("config.toml");
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn default_data_dir()
-> anyhow::Result<PathBuf> {
  let base = dirs::data_dir()
    .or_else(dirs::home_dir)
    .ok_or_else(|| {
      anyhow!(
        "cannot determine a data \
         directory"
      )
    })?;
  Ok(base.join("educonnect"))
}

pub fn expand_tilde(
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

#[cfg(test)]
mod tests {
  use std::fs;

  use super::{
    Config,
    resolve_data_dir
  };

  #[test]
  fn toml_tables_flatten_to_dotted_keys()
  {
    let dir = tempfile::tempdir()
      .expect("tempdir");
    let path =
      dir.path().join("config.toml");
    fs::write(
      &path,
      "color = false\n\n[data]\nlocation = \"/srv/edu\"\n\n[student]\ndefault_id = 3\n"
    )
    .expect("write config");

    let cfg = Config::load(Some(path.as_path()))
      .expect("load config");
    assert_eq!(
      cfg.get("data.location").as_deref(),
      Some("/srv/edu")
    );
    assert_eq!(
      cfg
        .get_u32("student.default_id")
        .expect("parse id"),
      Some(3)
    );
    assert_eq!(
      cfg.get("color").as_deref(),
      Some("false")
    );
    assert_eq!(
      cfg.get("render.title").as_deref(),
      Some("EduConnect")
    );
    assert_eq!(cfg.loaded_files, vec![path]);
  }

  #[test]
  fn overrides_win_and_bad_numbers_error()
  {
    let mut cfg = Config::default();
    cfg.apply_overrides([(
      "student.default_id".to_string(),
      "two".to_string()
    )]);
    assert!(
      cfg
        .get_u32("student.default_id")
        .is_err()
    );
  }

  #[test]
  fn blank_values_read_as_unset() {
    let mut cfg = Config::default();
    cfg.apply_overrides([(
      "render.output".to_string(),
      "  ".to_string()
    )]);
    assert_eq!(
      cfg.get("render.output"),
      None
    );
  }

  #[test]
  fn data_dir_is_created_on_demand() {
    let dir = tempfile::tempdir()
      .expect("tempdir");
    let target =
      dir.path().join("nested").join("data");
    let resolved = resolve_data_dir(
      &Config::default(),
      Some(target.as_path())
    )
    .expect("resolve");
    assert_eq!(resolved, target);
    assert!(target.is_dir());
  }

  #[test]
  fn malformed_toml_names_the_file() {
    let dir = tempfile::tempdir()
      .expect("tempdir");
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[data\n")
      .expect("write config");
    let err = Config::load(Some(path.as_path()))
      .expect_err("parse error");
    assert!(
      format!("{err:#}")
        .contains("failed to parse TOML")
    );
  }
}
