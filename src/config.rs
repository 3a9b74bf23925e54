use crate::types::*;
use std::{
  env,
  fs,
  path::{Path, PathBuf},
};

pub fn repo_root() -> PathBuf {
  if let Some(raw) = env_default("BRACKET_DESK_ROOT") {
    return PathBuf::from(raw);
  }
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

pub fn resolve_repo_path(raw: &str) -> PathBuf {
  resolve_path_from(&repo_root(), raw)
}

pub fn resolve_path_from(root: &Path, raw: &str) -> PathBuf {
  let path = PathBuf::from(raw.trim());
  if path.is_absolute() {
    path
  } else {
    root.join(path)
  }
}

pub fn config_path() -> PathBuf {
  if let Some(raw) = env_default("BRACKET_CONFIG_PATH") {
    return resolve_repo_path(&raw);
  }
  repo_root().join("config.json")
}

pub fn env_default(key: &str) -> Option<String> {
  env::var(key)
    .ok()
    .map(|value| value.trim().to_string())
    .filter(|value| !value.is_empty())
}

/// Blank config fields are taken from the environment. `lookup` is injectable for tests.
pub fn apply_env_defaults_with<F>(mut config: AppConfig, lookup: F) -> AppConfig
where
  F: Fn(&str) -> Option<String>,
{
  if config.bind_addr.trim().is_empty() {
    if let Some(value) = lookup("BRACKET_BIND_ADDR") {
      config.bind_addr = value;
    }
  }
  if config.data_dir.trim().is_empty() {
    if let Some(value) = lookup("BRACKET_DATA_DIR") {
      config.data_dir = value;
    }
  }
  if config.static_dir.trim().is_empty() {
    if let Some(value) = lookup("BRACKET_STATIC_DIR") {
      config.static_dir = value;
    }
  }
  if config.log_dir.trim().is_empty() {
    if let Some(value) = lookup("BRACKET_LOG_DIR") {
      config.log_dir = value;
    }
  }
  config
}

pub fn apply_env_defaults(config: AppConfig) -> AppConfig {
  apply_env_defaults_with(config, env_default)
}

pub fn load_config_inner() -> Result<AppConfig, String> {
  load_config_from(&config_path())
}

pub fn load_config_from(path: &Path) -> Result<AppConfig, String> {
  if !path.is_file() {
    return Ok(apply_env_defaults(AppConfig::default()));
  }
  let data = fs::read_to_string(path).map_err(|e| format!("read config {}: {e}", path.display()))?;
  let config =
    serde_json::from_str::<AppConfig>(&data).map_err(|e| format!("parse config {}: {e}", path.display()))?;
  Ok(apply_env_defaults(config))
}

pub fn bind_addr(config: &AppConfig) -> String {
  let trimmed = config.bind_addr.trim();
  if trimmed.is_empty() {
    DEFAULT_BIND_ADDR.to_string()
  } else {
    trimmed.to_string()
  }
}

pub fn resolve_paths(config: &AppConfig) -> ResolvedPaths {
  let root = repo_root();
  let or_default = |raw: &str, fallback: &str| {
    let trimmed = raw.trim();
    resolve_path_from(&root, if trimmed.is_empty() { fallback } else { trimmed })
  };
  let static_dir = Some(config.static_dir.trim())
    .filter(|raw| !raw.is_empty())
    .map(|raw| resolve_path_from(&root, raw));
  ResolvedPaths {
    data_dir: or_default(&config.data_dir, DEFAULT_DATA_DIR),
    static_dir,
    log_dir: or_default(&config.log_dir, DEFAULT_LOG_DIR),
  }
}

pub fn load_env_file() {
  load_env_file_from(&repo_root().join(".env"));
}

/// Shell variables win over `.env` entries.
pub fn load_env_file_from(path: &Path) {
  let Ok(contents) = fs::read_to_string(path) else {
    return;
  };
  for (key, value) in contents.lines().filter_map(parse_env_line) {
    if env::var_os(&key).is_none() {
      env::set_var(key, value);
    }
  }
}

pub fn parse_env_line(line: &str) -> Option<(String, String)> {
  let line = line.trim();
  if line.is_empty() || line.starts_with('#') {
    return None;
  }
  let line = line.strip_prefix("export ").unwrap_or(line);
  let (key, raw) = line.split_once('=')?;
  let key = key.trim();
  if key.is_empty() {
    return None;
  }
  let raw = raw.trim();
  let value = unquote(raw, '"')
    .or_else(|| unquote(raw, '\''))
    .unwrap_or_else(|| raw.split('#').next().unwrap_or_default().trim_end());
  Some((key.to_string(), value.to_string()))
}

fn unquote(raw: &str, quote: char) -> Option<&str> {
  raw.strip_prefix(quote)?.strip_suffix(quote)
}

pub fn log_env_warnings(config: &AppConfig, paths: &ResolvedPaths) {
  let mut warnings = Vec::new();

  if config.data_dir.trim().is_empty() {
    warnings.push(format!(
      "BRACKET_DATA_DIR not set and no data dir in config; brackets are stored in {}",
      paths.data_dir.display()
    ));
  }
  if let Some(dir) = &paths.static_dir {
    if !dir.is_dir() {
      warnings.push(format!("static dir {} does not exist; admin UI will 404", dir.display()));
    }
  }
  let addr = bind_addr(config);
  if !addr.starts_with("127.") && !addr.starts_with("localhost") && !addr.starts_with("[::1]") {
    warnings.push(format!(
      "admin API bound to {addr}; it has no auth of its own, keep it behind the admin proxy"
    ));
  }

  for msg in warnings {
    tracing::warn!("{}", msg);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn env_lines() {
    assert_eq!(parse_env_line("# comment"), None);
    assert_eq!(parse_env_line(""), None);
    assert_eq!(
      parse_env_line("export BRACKET_DATA_DIR=\"/srv/brackets\""),
      Some(("BRACKET_DATA_DIR".to_string(), "/srv/brackets".to_string()))
    );
    assert_eq!(
      parse_env_line("BRACKET_BIND_ADDR=0.0.0.0:80 # public"),
      Some(("BRACKET_BIND_ADDR".to_string(), "0.0.0.0:80".to_string()))
    );
    assert_eq!(parse_env_line("=value"), None);
    assert_eq!(
      parse_env_line("BRACKET_LOG_DIR='/var/log/desk'"),
      Some(("BRACKET_LOG_DIR".to_string(), "/var/log/desk".to_string()))
    );
  }

  #[test]
  fn env_file_does_not_override_shell() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".env");
    fs::write(&path, "BRACKET_TEST_ENV_FILE_ONLY=from-file\nPATH=/nowhere\n").unwrap();
    let path_before = env::var_os("PATH");
    load_env_file_from(&path);
    assert_eq!(env::var("BRACKET_TEST_ENV_FILE_ONLY").unwrap(), "from-file");
    assert_eq!(env::var_os("PATH"), path_before);
  }

  #[test]
  fn env_fills_only_blank_fields() {
    let config = AppConfig {
      bind_addr: "0.0.0.0:9000".to_string(),
      ..AppConfig::default()
    };
    let lookup = |key: &str| match key {
      "BRACKET_BIND_ADDR" => Some("127.0.0.1:1".to_string()),
      "BRACKET_DATA_DIR" => Some("/tmp/brackets".to_string()),
      _ => None,
    };
    let merged = apply_env_defaults_with(config, lookup);
    assert_eq!(merged.bind_addr, "0.0.0.0:9000");
    assert_eq!(merged.data_dir, "/tmp/brackets");
    assert_eq!(merged.static_dir, "");
  }

  #[test]
  fn relative_paths_resolve_against_root() {
    let root = Path::new("/srv/desk");
    assert_eq!(resolve_path_from(root, "data"), PathBuf::from("/srv/desk/data"));
    assert_eq!(resolve_path_from(root, "/abs"), PathBuf::from("/abs"));
  }

  #[test]
  fn partial_config_file_uses_defaults() {
    let config: AppConfig = serde_json::from_str(r#"{"bindAddr":"0.0.0.0:1"}"#).unwrap();
    assert_eq!(config.bind_addr, "0.0.0.0:1");
    assert_eq!(config.log_filter, "info");
    assert_eq!(bind_addr(&AppConfig::default()), DEFAULT_BIND_ADDR);
  }
}
