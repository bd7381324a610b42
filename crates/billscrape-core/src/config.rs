use crate::app_config::AppConfig;
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but cannot be parsed.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but cannot be parsed.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Every setting has a default, so only malformed values fail. Decoupled from
/// the process environment so tests can feed a plain `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_minutes = |var: &str, default: &str| -> Result<i64, ConfigError> {
        let raw = or_default(var, default);
        let minutes = raw.parse::<i64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })?;
        if minutes < 0 {
            return Err(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: format!("must not be negative, got {minutes}"),
            });
        }
        Ok(minutes)
    };

    let log_level = or_default("BILLSCRAPE_LOG_LEVEL", "info");
    let login_base_url = or_default("BILLSCRAPE_LOGIN_BASE_URL", "https://www.bukalapak.com/");
    let login_path = or_default("BILLSCRAPE_LOGIN_PATH", "listrik-pln/tagihan-listrik");
    let api_base_url = or_default("BILLSCRAPE_API_BASE_URL", "https://api.bukalapak.com/");
    let user_agent = or_default("BILLSCRAPE_USER_AGENT", "billscrape/0.1 (bill-inquiry)");
    let request_timeout_secs = parse_u64("BILLSCRAPE_REQUEST_TIMEOUT_SECS", "60")?;
    let token_cache_path = PathBuf::from(or_default("BILLSCRAPE_TOKEN_CACHE_PATH", "token_cache.json"));
    let token_expiry_minutes = parse_minutes("BILLSCRAPE_TOKEN_EXPIRY_MINUTES", "60")?;
    let token_refresh_margin_minutes = parse_minutes("BILLSCRAPE_TOKEN_REFRESH_MARGIN_MINUTES", "5")?;
    let max_retries = parse_u32("BILLSCRAPE_MAX_RETRIES", "2")?;
    let retry_delay_secs = parse_u64("BILLSCRAPE_RETRY_DELAY_SECS", "5")?;
    let max_empty_response_retries = parse_u32("BILLSCRAPE_MAX_EMPTY_RESPONSE_RETRIES", "3")?;
    let empty_response_retry_delay_secs =
        parse_u64("BILLSCRAPE_EMPTY_RESPONSE_RETRY_DELAY_SECS", "3")?;
    let max_in_flight = parse_usize("BILLSCRAPE_MAX_IN_FLIGHT", "0")?;
    let pipeline_path = PathBuf::from(or_default(
        "BILLSCRAPE_PIPELINE_PATH",
        "./config/pipeline.yaml",
    ));

    Ok(AppConfig {
        log_level,
        login_base_url,
        login_path,
        api_base_url,
        user_agent,
        request_timeout_secs,
        token_cache_path,
        token_expiry_minutes,
        token_refresh_margin_minutes,
        max_retries,
        retry_delay_secs,
        max_empty_response_retries,
        empty_response_retry_delay_secs,
        max_in_flight,
        pipeline_path,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::env::VarError;

    use super::*;

    fn lookup_from_map<'a>(
        map: &'a HashMap<&'a str, &'a str>,
    ) -> impl Fn(&str) -> Result<String, VarError> + 'a {
        move |key| {
            map.get(key)
                .map(|v| (*v).to_string())
                .ok_or(VarError::NotPresent)
        }
    }

    #[test]
    fn build_app_config_uses_defaults_for_empty_env() {
        let map: HashMap<&str, &str> = HashMap::new();
        let cfg = build_app_config(lookup_from_map(&map)).unwrap();
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.login_base_url, "https://www.bukalapak.com/");
        assert_eq!(cfg.login_path, "listrik-pln/tagihan-listrik");
        assert_eq!(cfg.api_base_url, "https://api.bukalapak.com/");
        assert_eq!(cfg.request_timeout_secs, 60);
        assert_eq!(cfg.token_cache_path.to_str(), Some("token_cache.json"));
        assert_eq!(cfg.token_expiry_minutes, 60);
        assert_eq!(cfg.token_refresh_margin_minutes, 5);
        assert_eq!(cfg.max_retries, 2);
        assert_eq!(cfg.retry_delay_secs, 5);
        assert_eq!(cfg.max_empty_response_retries, 3);
        assert_eq!(cfg.empty_response_retry_delay_secs, 3);
        assert_eq!(cfg.max_in_flight, 0);
        assert_eq!(cfg.pipeline_path.to_str(), Some("./config/pipeline.yaml"));
    }

    #[test]
    fn build_app_config_applies_overrides() {
        let mut map = HashMap::new();
        map.insert("BILLSCRAPE_MAX_RETRIES", "5");
        map.insert("BILLSCRAPE_RETRY_DELAY_SECS", "1");
        map.insert("BILLSCRAPE_MAX_IN_FLIGHT", "16");
        map.insert("BILLSCRAPE_TOKEN_CACHE_PATH", "/tmp/cache.json");
        let cfg = build_app_config(lookup_from_map(&map)).unwrap();
        assert_eq!(cfg.max_retries, 5);
        assert_eq!(cfg.retry_delay_secs, 1);
        assert_eq!(cfg.max_in_flight, 16);
        assert_eq!(cfg.token_cache_path.to_str(), Some("/tmp/cache.json"));
    }

    #[test]
    fn build_app_config_rejects_non_numeric_timeout() {
        let mut map = HashMap::new();
        map.insert("BILLSCRAPE_REQUEST_TIMEOUT_SECS", "not-a-number");
        let result = build_app_config(lookup_from_map(&map));
        assert!(
            matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "BILLSCRAPE_REQUEST_TIMEOUT_SECS"),
            "expected InvalidEnvVar(BILLSCRAPE_REQUEST_TIMEOUT_SECS), got: {result:?}"
        );
    }

    #[test]
    fn build_app_config_rejects_negative_token_margin() {
        let mut map = HashMap::new();
        map.insert("BILLSCRAPE_TOKEN_REFRESH_MARGIN_MINUTES", "-1");
        let result = build_app_config(lookup_from_map(&map));
        assert!(
            matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "BILLSCRAPE_TOKEN_REFRESH_MARGIN_MINUTES"),
            "expected InvalidEnvVar(BILLSCRAPE_TOKEN_REFRESH_MARGIN_MINUTES), got: {result:?}"
        );
    }

    #[test]
    fn build_app_config_rejects_invalid_max_in_flight() {
        let mut map = HashMap::new();
        map.insert("BILLSCRAPE_MAX_IN_FLIGHT", "-3");
        let result = build_app_config(lookup_from_map(&map));
        assert!(
            matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "BILLSCRAPE_MAX_IN_FLIGHT"),
            "expected InvalidEnvVar(BILLSCRAPE_MAX_IN_FLIGHT), got: {result:?}"
        );
    }
}
