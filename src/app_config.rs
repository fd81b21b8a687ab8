//! Config file loading and merging with CLI options.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use qurancom_core::PipelineConfig;

use crate::cli::{Args, CliValueSources};

/// Defaults read from `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Default destination directory.
    pub destination: Option<PathBuf>,
    /// Default worker-pool size (1..=100).
    pub concurrency: Option<u64>,
    /// Default total attempts per resource (1..=10).
    pub max_retries: Option<u64>,
    /// Default backoff base in milliseconds (0..=60000).
    pub backoff_base_ms: Option<u64>,
    /// Default per-host request spacing in milliseconds (0..=60000).
    pub request_delay_ms: Option<u64>,
    /// Upstream API root.
    pub api_url: Option<String>,
    /// Language codes to process.
    pub languages: Option<Vec<String>>,
}

impl FileConfig {
    /// Validates config values against the CLI ranges.
    pub fn validate(&self) -> Result<()> {
        validate_range("concurrency", self.concurrency, 1, 100)?;
        validate_range("max_retries", self.max_retries, 1, 10)?;
        validate_range("backoff_base_ms", self.backoff_base_ms, 0, 60_000)?;
        validate_range("request_delay_ms", self.request_delay_ms, 0, 60_000)?;
        Ok(())
    }
}

fn validate_range(field: &str, value: Option<u64>, min: u64, max: u64) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(min..=max).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: {min}..={max}");
    }
    Ok(())
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/qurancom-dl/config.toml`
/// 2. `$HOME/.config/qurancom-dl/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("qurancom-dl")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("qurancom-dl")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the config file from the default path, if one exists.
pub fn load_default_file_config() -> Result<Option<FileConfig>> {
    match resolve_default_config_path() {
        Some(path) if path.exists() => load_file_config(&path).map(Some),
        _ => Ok(None),
    }
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!(
                "Invalid config syntax on line {}: expected key = value",
                line_index + 1
            );
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let line_no = line_index + 1;

        match key {
            "destination" => {
                let parsed = parse_string_literal(value)
                    .with_context(|| format!("Invalid `destination` value on line {line_no}"))?;
                cfg.destination = Some(PathBuf::from(parsed));
            }
            "api_url" => {
                let parsed = parse_string_literal(value)
                    .with_context(|| format!("Invalid `api_url` value on line {line_no}"))?;
                cfg.api_url = Some(parsed);
            }
            "languages" => {
                let parsed = parse_string_literal(value)
                    .with_context(|| format!("Invalid `languages` value on line {line_no}"))?;
                cfg.languages = Some(
                    parsed
                        .split(',')
                        .map(str::trim)
                        .filter(|code| !code.is_empty())
                        .map(str::to_string)
                        .collect(),
                );
            }
            "concurrency" | "max_retries" | "backoff_base_ms" | "request_delay_ms" => {
                let parsed = parse_integer_u64(value)
                    .with_context(|| format!("Invalid `{key}` value on line {line_no}"))?;
                let slot = match key {
                    "concurrency" => &mut cfg.concurrency,
                    "max_retries" => &mut cfg.max_retries,
                    "backoff_base_ms" => &mut cfg.backoff_base_ms,
                    _ => &mut cfg.request_delay_ms,
                };
                *slot = Some(parsed);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

/// Builds the pipeline configuration: CLI flag, then config file, then default.
pub fn resolve_pipeline_config(
    args: &Args,
    sources: &CliValueSources,
    file: Option<&FileConfig>,
) -> Result<PipelineConfig> {
    let file = file.cloned().unwrap_or_default();
    let defaults = PipelineConfig::default();

    let destination = pick(sources.dst, args.dst.clone(), file.destination);
    let concurrency = pick(
        sources.concurrency,
        u64::from(args.concurrency),
        file.concurrency,
    );
    let max_retries = pick(
        sources.max_retries,
        u64::from(args.max_retries),
        file.max_retries,
    );
    let backoff_ms = pick(sources.backoff_ms, args.backoff_ms, file.backoff_base_ms);
    let request_delay_ms = pick(
        sources.request_delay_ms,
        args.request_delay_ms,
        file.request_delay_ms,
    );
    let api_url = if sources.api_url {
        args.api_url.clone()
    } else {
        file.api_url.or_else(|| args.api_url.clone())
    }
    .unwrap_or(defaults.api_url);
    let languages = pick(sources.languages, args.languages.clone(), file.languages);

    let config = PipelineConfig {
        destination,
        clear_cache: args.clear_cache,
        concurrency: usize::try_from(concurrency).context("concurrency out of range")?,
        max_retries: u32::try_from(max_retries).context("max_retries out of range")?,
        backoff_base: Duration::from_millis(backoff_ms),
        request_delay: Duration::from_millis(request_delay_ms),
        api_url,
        languages,
    };
    config.validate()?;
    Ok(config)
}

/// CLI value when given explicitly, else the file value, else the CLI default.
fn pick<T>(from_cli: bool, cli_value: T, file_value: Option<T>) -> T {
    if from_cli {
        cli_value
    } else {
        file_value.unwrap_or(cli_value)
    }
}
