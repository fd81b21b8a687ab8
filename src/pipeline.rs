//! Orchestrator: Plan → Fetch → Parse → Write, one stage at a time.
//!
//! The run moves through [`Stage`]s strictly in order; parsing never starts
//! before every fetch has settled. Any error ends the run, leaving artifacts
//! already written on disk. Rerunning against the same cache is the recovery
//! path: cached resources are not fetched again.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use qurancom_core::config::PipelineConfig;
//! use qurancom_core::download::HttpClient;
//! use qurancom_core::pipeline::Pipeline;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::new("./data");
//! let catalog = config.catalog()?;
//! let pipeline = Pipeline::new(config, catalog, Arc::new(HttpClient::new()?));
//! let report = pipeline.run(&CancellationToken::new()).await?;
//! println!("{} artifacts", report.artifacts.len());
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::cache::{CacheError, CacheStore};
use crate::catalog::{Catalog, DataKind, Language};
use crate::config::{ConfigError, PipelineConfig};
use crate::download::{BatchFetcher, EngineError, RateLimiter, ResourceFetcher, RetryPolicy};
use crate::parser::{
    ParseError, parse_chapter_info, parse_chapter_list, parse_word_texts, parse_word_translations,
};
use crate::plan::{FetchPlan, plan_all, plan_requests};
use crate::writer::{
    LanguageRecords, WriteError, clean_output, write_language_artifacts, write_word_text_artifact,
};

/// Orchestrator states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Configuration accepted, nothing done yet.
    Init,
    /// Pending resources computed.
    Planned,
    /// Every pending resource cached.
    Fetched,
    /// Stale artifacts of the catalog's languages removed.
    Cleaned,
    /// Records of one kind parsed for every language.
    Parsed(DataKind),
    /// Artifacts of one kind written.
    Written(DataKind),
    /// Run complete.
    Done,
    /// Run aborted.
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => f.write_str("init"),
            Self::Planned => f.write_str("planned"),
            Self::Fetched => f.write_str("fetched"),
            Self::Cleaned => f.write_str("cleaned"),
            Self::Parsed(kind) => write!(f, "parsed({kind})"),
            Self::Written(kind) => write!(f, "written({kind})"),
            Self::Done => f.write_str("done"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The configuration was rejected.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The cache directory could not be prepared.
    #[error("cache setup failed: {0}")]
    Cache(#[source] CacheError),

    /// One or more resources could not be fetched.
    #[error("fetch failed: {0}")]
    Fetch(#[source] EngineError),

    /// The run was cancelled.
    #[error("interrupted: {completed} resources cached, {remaining} not fetched")]
    Cancelled {
        /// Resources persisted before cancellation.
        completed: usize,
        /// Resources left unfetched.
        remaining: usize,
    },

    /// A cached fragment could not be parsed.
    #[error("parsing {kind} for {lang} failed: {source}")]
    Parse {
        /// Data kind being parsed.
        kind: DataKind,
        /// Language code, or `shared` for word text.
        lang: String,
        /// Underlying parse error.
        #[source]
        source: ParseError,
    },

    /// An artifact could not be written or a stale one removed.
    #[error("writing {} artifacts failed: {source}", kind.map_or("stale", DataKind::as_str))]
    Write {
        /// Kind being written; `None` while cleaning stale artifacts.
        kind: Option<DataKind>,
        /// Underlying write error.
        #[source]
        source: WriteError,
    },

    /// The blocking aggregation task ended abnormally.
    #[error("aggregation task aborted: {message}")]
    Aborted {
        /// Join error description.
        message: String,
    },
}

impl PipelineError {
    /// The stage the run was trying to reach when it failed.
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            Self::Config(_) | Self::Cache(_) => Stage::Planned,
            Self::Fetch(_) | Self::Cancelled { .. } => Stage::Fetched,
            Self::Parse { kind, .. } => Stage::Parsed(*kind),
            Self::Write {
                kind: Some(kind), ..
            } => Stage::Written(*kind),
            Self::Write { kind: None, .. } => Stage::Cleaned,
            Self::Aborted { .. } => Stage::Failed,
        }
    }

    /// Whether the run stopped because it was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    fn parse(kind: DataKind, lang: impl Into<String>, source: ParseError) -> Self {
        Self::Parse {
            kind,
            lang: lang.into(),
            source,
        }
    }

    fn write(kind: Option<DataKind>, source: WriteError) -> Self {
        Self::Write { kind, source }
    }
}

/// Summary of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Distinct resources in the catalog.
    pub catalog_size: usize,
    /// Resources already cached when the run started.
    pub cached: usize,
    /// Resources fetched during this run.
    pub fetched: usize,
    /// Retry attempts made while fetching.
    pub retried: usize,
    /// Artifacts written, in write order.
    pub artifacts: Vec<PathBuf>,
}

/// One configured run over one catalog.
pub struct Pipeline {
    config: PipelineConfig,
    catalog: Catalog,
    fetcher: Arc<dyn ResourceFetcher>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Creates a pipeline fetching `catalog` through `fetcher`.
    #[must_use]
    pub fn new(
        config: PipelineConfig,
        catalog: Catalog,
        fetcher: Arc<dyn ResourceFetcher>,
    ) -> Self {
        Self {
            config,
            catalog,
            fetcher,
        }
    }

    /// The configuration this pipeline runs with.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Computes the fetch plan without touching the network or the filesystem.
    ///
    /// With `clear_cache` set, every resource is reported as pending.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] if the configuration is invalid.
    #[instrument(skip(self), fields(dst = %self.config.destination.display()))]
    pub fn plan_only(&self) -> Result<FetchPlan, PipelineError> {
        self.config.validate()?;
        let resources = self.catalog.resources();
        let plan = if self.config.clear_cache {
            plan_all(&resources)
        } else {
            plan_requests(&resources, &CacheStore::at(self.config.cache_dir()))
        };
        info!(
            catalog = plan.catalog_size,
            cached = plan.cached(),
            pending = plan.pending.len(),
            "dry run plan"
        );
        Ok(plan)
    }

    /// Runs every stage to completion.
    ///
    /// # Errors
    ///
    /// Returns the first [`PipelineError`]; [`PipelineError::stage`] names
    /// where the run stopped.
    #[instrument(skip_all, fields(dst = %self.config.destination.display()))]
    pub async fn run(&self, cancel: &CancellationToken) -> Result<RunReport, PipelineError> {
        let result = self.run_stages(cancel).await;
        match &result {
            Ok(report) => info!(
                stage = %Stage::Done,
                fetched = report.fetched,
                artifacts = report.artifacts.len(),
                "run complete"
            ),
            Err(e) => info!(stage = %Stage::Failed, failed_at = %e.stage(), "run aborted"),
        }
        result
    }

    async fn run_stages(&self, cancel: &CancellationToken) -> Result<RunReport, PipelineError> {
        self.config.validate()?;
        info!(stage = %Stage::Init, "starting run");

        let store = self.prepare_cache()?;
        let plan = plan_requests(&self.catalog.resources(), &store);
        info!(
            stage = %Stage::Planned,
            catalog = plan.catalog_size,
            cached = plan.cached(),
            pending = plan.pending.len(),
            "planned"
        );

        let (fetched, retried) = self.fetch(&store, &plan, cancel).await?;
        info!(stage = %Stage::Fetched, fetched, retried, "fetched");

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled {
                completed: fetched,
                remaining: 0,
            });
        }

        let config = self.config.clone();
        let catalog = self.catalog.clone();
        let artifacts = tokio::task::spawn_blocking(move || aggregate(&config, &catalog, &store))
            .await
            .map_err(|e| PipelineError::Aborted {
                message: e.to_string(),
            })??;

        Ok(RunReport {
            catalog_size: plan.catalog_size,
            cached: plan.cached(),
            fetched,
            retried,
            artifacts,
        })
    }

    fn prepare_cache(&self) -> Result<CacheStore, PipelineError> {
        let dir = self.config.cache_dir();
        if self.config.clear_cache {
            let store = CacheStore::at(dir);
            store.clear().map_err(PipelineError::Cache)?;
            return Ok(store);
        }
        CacheStore::open(dir).map_err(PipelineError::Cache)
    }

    async fn fetch(
        &self,
        store: &CacheStore,
        plan: &FetchPlan,
        cancel: &CancellationToken,
    ) -> Result<(usize, usize), PipelineError> {
        if plan.is_complete() {
            debug!("everything cached, skipping fetch");
            return Ok((0, 0));
        }

        let policy = RetryPolicy::with_max_attempts(self.config.max_retries)
            .with_base_delay(self.config.backoff_base);
        let limiter = if self.config.request_delay.is_zero() {
            RateLimiter::disabled()
        } else {
            RateLimiter::new(self.config.request_delay)
        };
        let fetcher = BatchFetcher::new(self.config.concurrency, policy, Arc::new(limiter))
            .map_err(PipelineError::Fetch)?;

        match fetcher
            .fetch_all(
                Arc::clone(&self.fetcher),
                store,
                plan.pending.clone(),
                cancel,
            )
            .await
        {
            Ok(stats) => Ok((stats.completed(), stats.retried())),
            Err(EngineError::Cancelled {
                completed,
                remaining,
            }) => Err(PipelineError::Cancelled {
                completed,
                remaining,
            }),
            Err(e) => Err(PipelineError::Fetch(e)),
        }
    }
}

/// Cleans stale artifacts, then parses and writes each kind in turn.
fn aggregate(
    config: &PipelineConfig,
    catalog: &Catalog,
    store: &CacheStore,
) -> Result<Vec<PathBuf>, PipelineError> {
    let dst = config.destination();
    clean_output(dst, catalog).map_err(|e| PipelineError::write(None, e))?;
    info!(stage = %Stage::Cleaned, "stale artifacts removed");

    let mut artifacts = Vec::new();

    let kind = DataKind::ChapterList;
    let records = parse_languages(kind, catalog.languages(), |lang| {
        parse_chapter_list(store, lang)
    })?;
    artifacts.extend(write_kind(dst, kind, &records)?);

    let kind = DataKind::ChapterInfo;
    let records = parse_languages(kind, catalog.languages(), |lang| {
        parse_chapter_info(store, catalog, lang)
    })?;
    artifacts.extend(write_kind(dst, kind, &records)?);

    let kind = DataKind::WordTranslation;
    let records = parse_languages(kind, catalog.word_languages(), |lang| {
        parse_word_translations(store, catalog, lang)
    })?;
    artifacts.extend(write_kind(dst, kind, &records)?);

    let kind = DataKind::WordText;
    let words =
        parse_word_texts(store, catalog).map_err(|e| PipelineError::parse(kind, "shared", e))?;
    info!(stage = %Stage::Parsed(kind), words = words.len(), "parsed");
    let written =
        write_word_text_artifact(dst, &words).map_err(|e| PipelineError::write(Some(kind), e))?;
    info!(stage = %Stage::Written(kind), artifacts = usize::from(written.is_some()), "written");
    artifacts.extend(written);

    Ok(artifacts)
}

/// Parses `kind` for every language, keeping only non-empty records.
fn parse_languages<K, V>(
    kind: DataKind,
    languages: &[Language],
    parse: impl Fn(Language) -> Result<BTreeMap<K, V>, ParseError>,
) -> Result<LanguageRecords<BTreeMap<K, V>>, PipelineError> {
    let mut records = LanguageRecords::new();
    for &lang in languages {
        let record = parse(lang).map_err(|e| PipelineError::parse(kind, lang.code, e))?;
        if record.is_empty() {
            debug!(%kind, %lang, "no data, no artifact");
            continue;
        }
        records.insert(lang, record);
    }
    info!(stage = %Stage::Parsed(kind), languages = records.len(), "parsed");
    Ok(records)
}

fn write_kind<K: serde::Serialize, V: serde::Serialize>(
    dst: &std::path::Path,
    kind: DataKind,
    records: &LanguageRecords<BTreeMap<K, V>>,
) -> Result<Vec<PathBuf>, PipelineError> {
    let written = write_language_artifacts(dst, kind, records)
        .map_err(|e| PipelineError::write(Some(kind), e))?;
    info!(stage = %Stage::Written(kind), artifacts = written.len(), "written");
    Ok(written)
}
