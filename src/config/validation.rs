use crate::config::types::{Config, CrawlerConfig, OutputConfig, ProxyEntry, SiteConfig};
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_site_config(&config.site)?;
    validate_output_config(&config.output)?;
    validate_proxies(&config.proxies)?;
    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    // The name becomes a file name under the watermark directory
    if config.name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler name cannot be empty".to_string(),
        ));
    }

    if !config
        .name
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
        || config.name.starts_with('.')
    {
        return Err(ConfigError::Validation(format!(
            "crawler name must contain only alphanumerics, '-', '_' or '.' and not start with '.', got '{}'",
            config.name
        )));
    }

    if config.start_urls.is_empty() {
        return Err(ConfigError::Validation(
            "at least one start URL is required".to_string(),
        ));
    }

    for start in &config.start_urls {
        validate_http_url(start, "start URL")?;
    }

    if config.max_concurrent_fetches < 1 || config.max_concurrent_fetches > 100 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_fetches must be between 1 and 100, got {}",
            config.max_concurrent_fetches
        )));
    }

    Ok(())
}

fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    validate_http_url(&config.base_url, "base-url")?;
    validate_http_url(&config.item_url_base, "item-url-base")?;
    validate_selector(&config.category_zone, "category-zone")?;
    validate_selector(&config.location_zone, "location-zone")?;
    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.watermark_dir.is_empty() {
        return Err(ConfigError::Validation(
            "watermark_dir cannot be empty".to_string(),
        ));
    }

    if config.items_path.is_empty() {
        return Err(ConfigError::Validation(
            "items_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_proxies(proxies: &[ProxyEntry]) -> Result<(), ConfigError> {
    for proxy in proxies {
        Url::parse(&proxy.address).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid proxy address '{}': {}", proxy.address, e))
        })?;

        if proxy.password.is_some() && proxy.username.is_none() {
            return Err(ConfigError::Validation(format!(
                "proxy '{}' has a password but no username",
                proxy.address
            )));
        }
    }
    Ok(())
}

/// Checks that `value` is an absolute http(s) URL
fn validate_http_url(value: &str, what: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", what, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "{} '{}' must use http or https",
            what, value
        )));
    }

    Ok(())
}

fn validate_selector(value: &str, what: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::InvalidSelector(format!("{} cannot be empty", what)));
    }

    Selector::parse(value)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidSelector(format!("{} '{}': {:?}", what, value, e)))
}
