//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::{ConduitConfig, ProcessorKind, StoreBackend};
use super::SecretString;
use crate::domain::errors::ConduitError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into ConduitConfig
/// 4. Applies environment variable overrides (CONDUIT_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns [`ConduitError::Configuration`] if the file cannot be read or
/// parsed, a referenced variable is unset, or validation fails.
///
/// # Examples
///
/// ```no_run
/// use conduit::config::loader::load_config;
///
/// let config = load_config("conduit.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<ConduitConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(ConduitError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        ConduitError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    load_config_from_str(&contents)
}

/// Loads configuration from TOML text
///
/// Same pipeline as [`load_config`] minus the file read.
///
/// # Errors
///
/// Returns [`ConduitError::Configuration`] on any substitution, parse,
/// override or validation failure.
pub fn load_config_from_str(contents: &str) -> Result<ConduitConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: ConduitConfig = toml::from_str(&contents)
        .map_err(|e| ConduitError::Configuration(format!("Failed to parse TOML: {}", e)))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        ConduitError::Configuration(format!("Configuration validation failed: {}", e))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are left untouched.
///
/// # Errors
///
/// Returns an error if a referenced environment variable is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| ConduitError::Configuration(format!("invalid substitution pattern: {e}")))?;
    let mut result = String::with_capacity(input.len());
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    let placeholder = format!("${{{}}}", var_name);
                    processed_line = processed_line.replace(&placeholder, &value);
                }
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(ConduitError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(val) => val.trim().parse().map(Some).map_err(|_| {
            ConduitError::Configuration(format!("Invalid value for {name}: '{val}'"))
        }),
        Err(_) => Ok(None),
    }
}

/// Applies environment variable overrides using CONDUIT_* prefix
///
/// Environment variables follow the pattern: CONDUIT_<SECTION>_<KEY>
/// For example: CONDUIT_PIPELINE_PAGE_SIZE, CONDUIT_STORE_BACKEND
fn apply_env_overrides(config: &mut ConduitConfig) -> Result<()> {
    // Application overrides
    if let Ok(val) = std::env::var("CONDUIT_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Some(dry_run) = env_parse("CONDUIT_APPLICATION_DRY_RUN")? {
        config.application.dry_run = dry_run;
    }

    // Pipeline overrides
    let pipeline = &mut config.pipeline;
    if let Some(limit) = env_parse("CONDUIT_PIPELINE_LIMIT")? {
        pipeline.limit = Some(limit);
    }
    if let Some(size) = env_parse("CONDUIT_PIPELINE_PAGE_SIZE")? {
        pipeline.page_size = size;
    }
    if let Some(concurrency) = env_parse("CONDUIT_PIPELINE_PROCESSING_CONCURRENCY")? {
        pipeline.processing_concurrency = concurrency;
    }
    if let Some(ms) = env_parse("CONDUIT_PIPELINE_PROCESSING_TIMEOUT_MS")? {
        pipeline.processing_timeout_ms = ms;
    }
    if let Some(size) = env_parse("CONDUIT_PIPELINE_INSERT_BATCH_SIZE")? {
        pipeline.insert_batch_size = size;
    }
    if let Some(ms) = env_parse("CONDUIT_PIPELINE_FLUSH_TIMEOUT_MS")? {
        pipeline.flush_timeout_ms = ms;
    }
    if let Some(ms) = env_parse("CONDUIT_PIPELINE_PROGRESS_REPORT_INTERVAL_MS")? {
        pipeline.progress_report_interval_ms = ms;
    }

    // Processing overrides
    if let Ok(val) = std::env::var("CONDUIT_PROCESSING_PROCESSOR") {
        config.processing.processor = match val.to_lowercase().as_str() {
            "enrich" => ProcessorKind::Enrich,
            "passthrough" => ProcessorKind::Passthrough,
            other => {
                return Err(ConduitError::Configuration(format!(
                    "Invalid CONDUIT_PROCESSING_PROCESSOR '{other}'. Must be enrich or passthrough"
                )))
            }
        };
    }
    if let Some(ms) = env_parse("CONDUIT_PROCESSING_SIMULATED_LATENCY_MS")? {
        config.processing.simulated_latency_ms = ms;
    }

    // Monitor overrides
    if let Some(enabled) = env_parse("CONDUIT_MONITOR_ENABLED")? {
        config.monitor.enabled = enabled;
    }

    // Store overrides
    if let Ok(val) = std::env::var("CONDUIT_STORE_BACKEND") {
        config.store.backend = match val.to_lowercase().as_str() {
            "memory" => StoreBackend::Memory,
            "postgresql" => StoreBackend::PostgreSQL,
            other => {
                return Err(ConduitError::Configuration(format!(
                    "Invalid CONDUIT_STORE_BACKEND '{other}'. Must be memory or postgresql"
                )))
            }
        };
    }
    if let Some(count) = env_parse("CONDUIT_STORE_MEMORY_SEED_RECORDS")? {
        config.store.memory.seed_records = count;
    }
    // Only applies if the PostgreSQL section is configured
    if let Some(ref mut pg_config) = config.store.postgresql {
        if let Ok(val) = std::env::var("CONDUIT_STORE_POSTGRESQL_CONNECTION_STRING") {
            pg_config.connection_string = SecretString::new(val);
        }
        if let Some(max) = env_parse("CONDUIT_STORE_POSTGRESQL_MAX_CONNECTIONS")? {
            pg_config.max_connections = max;
        }
    }

    // Logging overrides
    if let Some(enabled) = env_parse("CONDUIT_LOGGING_LOCAL_ENABLED")? {
        config.logging.local_enabled = enabled;
    }
    if let Ok(val) = std::env::var("CONDUIT_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_substitute_env_vars() {
        std::env::set_var("CONDUIT_TEST_SUBST_VAR", "test_value");
        let input = "connection_string = \"${CONDUIT_TEST_SUBST_VAR}\"";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result.trim_end(), "connection_string = \"test_value\"");
        std::env::remove_var("CONDUIT_TEST_SUBST_VAR");
    }

    #[test]
    fn test_substitute_env_vars_missing() {
        std::env::remove_var("CONDUIT_TEST_MISSING_VAR");
        let input = "connection_string = \"${CONDUIT_TEST_MISSING_VAR}\"";
        let err = substitute_env_vars(input).unwrap_err();
        assert!(err.to_string().contains("CONDUIT_TEST_MISSING_VAR"));
    }

    #[test]
    fn test_substitute_env_vars_skips_comments() {
        std::env::remove_var("CONDUIT_TEST_COMMENTED_VAR");
        let input = "# connection_string = \"${CONDUIT_TEST_COMMENTED_VAR}\"\npage_size = 10";
        assert!(substitute_env_vars(input).is_ok());
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("nonexistent.toml");
        assert!(matches!(result, Err(ConduitError::Configuration(_))));
    }

    #[test]
    fn test_load_config_valid() {
        let toml_content = r#"
[application]
log_level = "debug"

[pipeline]
page_size = 250
processing_concurrency = 8
insert_batch_size = 100

[store]
backend = "postgresql"

[store.postgresql]
connection_string = "postgresql://conduit:pw@localhost:5432/conduit"
sink_table = "out_records"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.application.log_level, "debug");
        assert_eq!(config.pipeline.page_size, 250);
        assert_eq!(config.pipeline.processing_concurrency, 8);
        assert_eq!(config.store.backend, StoreBackend::PostgreSQL);

        let pg = config.store.postgresql.unwrap();
        assert_eq!(pg.sink_table, "out_records");
        assert_eq!(pg.source_table, "records");
        assert!(pg.connection_string.expose_secret().starts_with("postgresql://"));
    }

    #[test]
    fn test_load_config_validation_error() {
        let err = load_config_from_str("[pipeline]\ninsert_batch_size = 0\n").unwrap_err();
        assert!(err.to_string().contains("insert_batch_size"));
    }

    #[test]
    fn test_load_config_parse_error() {
        let err = load_config_from_str("[pipeline\npage_size = 1").unwrap_err();
        assert!(err.to_string().contains("Failed to parse TOML"));
    }
}
