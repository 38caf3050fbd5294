//! Configuration loading and environment parsing.

use super::validation::validate_config;
use super::Config;
use serde_json::{Map, Value};
use std::env;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "CLUSTER_BRIDGE__";
const ENV_JSON: &str = "CLUSTER_BRIDGE_CONFIG_JSON";
const ENV_STDIN: &str = "CLUSTER_BRIDGE_CONFIG_STDIN";
const ENV_PATH: &str = "CLUSTER_BRIDGE_CONFIG_PATH";

/// A place a JSON config document may come from.
enum Source {
    InlineEnv,
    Stdin,
    ExplicitPath(PathBuf),
    WorkingDir,
    ExecutableDir,
}

/// Load configuration with the following precedence (highest first):
/// 1) field overrides `CLUSTER_BRIDGE__SECTION__FIELD=value` (nested with `__`)
/// 2) `CLUSTER_BRIDGE_CONFIG_JSON` containing raw JSON
/// 3) stdin, when `CLUSTER_BRIDGE_CONFIG_STDIN` is truthy
/// 4) the file named by `CLUSTER_BRIDGE_CONFIG_PATH`
/// 5) `config.json` in the working directory
/// 6) `config.json` next to the executable
/// 7) compiled-in defaults
///
/// Read and parse problems are reported on stderr and the offending source is
/// skipped; `load()` always returns a `Config`. Validation failures are also
/// only reported here. Callers that need a hard failure call
/// [`validate_config`] on the result.
#[must_use]
pub fn load() -> Config {
    let defaults = Config::default();
    let mut merged =
        serde_json::to_value(&defaults).unwrap_or_else(|_| Value::Object(Map::new()));

    // Apply from lowest to highest precedence so later merges win.
    let sources = [
        Source::ExecutableDir,
        Source::WorkingDir,
        Source::ExplicitPath(env::var(ENV_PATH).map(PathBuf::from).unwrap_or_default()),
        Source::Stdin,
        Source::InlineEnv,
    ];
    for source in sources {
        if let Some(value) = read_source(source) {
            merge_values(&mut merged, value);
        }
    }

    apply_env_overrides(&mut merged, env::vars());

    let config = match serde_json::from_value::<Config>(merged) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to deserialize config; using defaults: {e}");
            defaults
        }
    };

    if let Err(e) = validate_config(&config) {
        eprintln!("Configuration validation error: {e}");
    }

    config
}

fn read_source(source: Source) -> Option<Value> {
    match source {
        Source::InlineEnv => env::var(ENV_JSON)
            .ok()
            .and_then(|json| parse_json_document(&json, ENV_JSON)),
        Source::Stdin => {
            if !env::var(ENV_STDIN).is_ok_and(|v| env_var_truthy(&v)) {
                return None;
            }
            let mut buf = String::new();
            match std::io::stdin().read_to_string(&mut buf) {
                Ok(_) => parse_json_document(&buf, "stdin"),
                Err(e) => {
                    eprintln!("Failed to read config from stdin: {e}");
                    None
                }
            }
        }
        Source::ExplicitPath(path) => read_file_source(&path),
        Source::WorkingDir => read_file_source(Path::new("config.json")),
        Source::ExecutableDir => env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join("config.json")))
            .and_then(|path| read_file_source(&path)),
    }
}

pub(crate) fn parse_json_document(raw: &str, label: &str) -> Option<Value> {
    if raw.trim().is_empty() {
        return None;
    }

    serde_json::from_str(raw)
        .map_err(|err| eprintln!("Failed to parse config from {label}: {err}"))
        .ok()
}

pub(crate) fn read_file_source(path: &Path) -> Option<Value> {
    if path.as_os_str().is_empty() || !path.exists() {
        return None;
    }

    match fs::read_to_string(path) {
        Ok(contents) => parse_json_document(&contents, &format!("file {}", path.display())),
        Err(err) => {
            eprintln!("Failed to read config from {}: {}", path.display(), err);
            None
        }
    }
}

pub(crate) fn merge_values(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target_map), Value::Object(source_map)) => {
            for (key, value) in source_map {
                match target_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        target_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

pub(crate) fn apply_env_overrides(root: &mut Value, vars: impl IntoIterator<Item = (String, String)>) {
    for (key, raw_value) in vars {
        let Some(stripped) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };

        let path: Vec<String> = stripped
            .split("__")
            .filter(|segment| !segment.is_empty())
            .map(str::to_ascii_lowercase)
            .collect();

        if !path.is_empty() {
            set_nested_value(root, &path, parse_env_value(&raw_value));
        }
    }
}

fn env_var_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

fn parse_env_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.contains(',') && !trimmed.starts_with('[') {
        return Value::Array(
            trimmed
                .split(',')
                .map(|segment| parse_scalar(segment.trim()))
                .collect(),
        );
    }

    parse_scalar(trimmed)
}

fn parse_scalar(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::String(String::new());
    }

    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn set_nested_value(target: &mut Value, path: &[String], value: Value) {
    let Some((head, rest)) = path.split_first() else {
        *target = value;
        return;
    };

    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    let Value::Object(map) = target else {
        return;
    };

    let entry = map
        .entry(head.clone())
        .or_insert_with(|| Value::Object(Map::new()));
    set_nested_value(entry, rest, value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    fn defaults_value() -> Value {
        serde_json::to_value(Config::default()).unwrap()
    }

    #[test]
    fn test_env_overrides_nest_and_parse_scalars() {
        let mut root = defaults_value();
        apply_env_overrides(
            &mut root,
            vec![
                ("CLUSTER_BRIDGE__SERVER_NAME".to_string(), "survival".to_string()),
                (
                    "CLUSTER_BRIDGE__BROKER__PUBLISH_POOL__MAX_SIZE".to_string(),
                    "64".to_string(),
                ),
                (
                    "CLUSTER_BRIDGE__CONTROL__CHECKPOINTS".to_string(),
                    "10,5,1".to_string(),
                ),
                ("UNRELATED".to_string(), "ignored".to_string()),
            ],
        );

        let config: Config = serde_json::from_value(root).unwrap();
        assert_eq!(config.server_name, "survival");
        assert_eq!(config.broker.publish_pool.max_size, 64);
        assert_eq!(config.broker.publish_pool.min_idle, 4);
        assert_eq!(config.control.checkpoints, vec![10, 5, 1]);
    }

    #[test]
    fn test_merge_keeps_untouched_defaults() {
        let mut root = defaults_value();
        merge_values(
            &mut root,
            serde_json::json!({ "broker": { "url": "redis://cache:6379" } }),
        );

        let config: Config = serde_json::from_value(root).unwrap();
        assert_eq!(config.broker.url, "redis://cache:6379");
        assert_eq!(config.broker.subscribe_pool.max_size, 2);
        assert_eq!(config.notifications.ttl_secs, 604_800);
    }

    #[test]
    fn test_unparseable_documents_are_skipped() {
        assert!(parse_json_document("   ", "blank").is_none());
        assert!(parse_json_document("{ nope", "broken").is_none());
        assert!(read_file_source(Path::new("/definitely/not/here.json")).is_none());
    }

    #[test]
    #[serial]
    fn test_load_reads_explicit_path_and_inline_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"server_name": "from-file", "transfer": {{"ttl_secs": 20}}}}"#
        )
        .unwrap();

        env::set_var(ENV_PATH, file.path());
        env::set_var(ENV_JSON, r#"{"server_name": "from-inline"}"#);
        let config = load();
        env::remove_var(ENV_PATH);
        env::remove_var(ENV_JSON);

        assert_eq!(config.server_name, "from-inline");
        assert_eq!(config.transfer.ttl_secs, 20);
    }
}
