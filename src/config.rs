//! Configuration types for lecture-to-Notion runs.
//!
//! Run-independent behaviour is controlled through [`PipelineConfig`], built
//! via its [`PipelineConfigBuilder`]. Per-run identity (which PDF, which page,
//! which conversation) lives in [`crate::context::PipelineContext`] instead, so
//! one config can drive many runs.
//!
//! The course → destination page mapping is an explicit value,
//! [`CourseDirectory`], injected by the caller rather than looked up from
//! process-wide state inside the pipeline.

use crate::error::PipelineError;
use crate::progress::ProgressCallback;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Default reasoning model.
pub const DEFAULT_MODEL: &str = "gpt-5.2";

/// Blocks per append request. Notion rejects more than 100.
pub const DEFAULT_CHUNK_SIZE: usize = 50;

/// Hard per-request limit enforced by the Notion API.
pub const MAX_CHUNK_SIZE: usize = 100;

/// Prefix of the environment variables that map courses to pages.
pub const COURSE_ENV_PREFIX: &str = "NOTION_PAGE_";

/// Configuration for a lecture-to-Notion run.
///
/// # Example
/// ```rust
/// use edgequake_lecture2notion::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .model("gpt-5.2")
///     .chunk_size(50)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Reasoning model identifier. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// User instruction sent alongside every slide image.
    /// If None, uses [`crate::prompts::SLIDE_INSTRUCTION`].
    pub instruction: Option<String>,

    /// System prompt template. `{course_name}` is substituted per run.
    /// If None, uses [`crate::prompts::SYSTEM_PROMPT_TEMPLATE`].
    pub system_prompt: Option<String>,

    /// Blocks per append request. Range: 1–100. Default: 50.
    pub chunk_size: usize,

    /// Retry policy shared by every external call.
    pub retry: RetryPolicy,

    /// Longest edge of a rasterised slide in pixels. Default: 2000.
    ///
    /// Slides are wide and sparse; 2000 px keeps formulas legible for the
    /// model while staying well under Notion's per-file upload limit.
    pub max_rendered_pixels: u32,

    /// Optional per-slide progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            instruction: None,
            system_prompt: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            retry: RetryPolicy::default(),
            max_rendered_pixels: 2000,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("model", &self.model)
            .field("instruction", &self.instruction.as_ref().map(|_| "<custom>"))
            .field("system_prompt", &self.system_prompt.as_ref().map(|_| "<custom>"))
            .field("chunk_size", &self.chunk_size)
            .field("retry", &self.retry)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn PipelineProgressCallback>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn instruction(mut self, instruction: impl Into<String>) -> Self {
        self.config.instruction = Some(instruction.into());
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn chunk_size(mut self, n: usize) -> Self {
        self.config.chunk_size = n.clamp(1, MAX_CHUNK_SIZE);
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.retry.max_attempts = n.max(1);
        self
    }

    pub fn retry_scope(mut self, scope: RetryScope) -> Self {
        self.config.retry.scope = scope;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, PipelineError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(PipelineError::InvalidConfig("Model must not be empty".into()));
        }
        if c.chunk_size == 0 || c.chunk_size > MAX_CHUNK_SIZE {
            return Err(PipelineError::InvalidConfig(format!(
                "Chunk size must be 1–{MAX_CHUNK_SIZE}, got {}",
                c.chunk_size
            )));
        }
        if c.retry.max_attempts == 0 {
            return Err(PipelineError::InvalidConfig(
                "Retry policy needs at least one attempt".into(),
            ));
        }
        if c.retry.initial_backoff > c.retry.max_backoff {
            return Err(PipelineError::InvalidConfig(format!(
                "Initial backoff {:?} exceeds the cap {:?}",
                c.retry.initial_backoff, c.retry.max_backoff
            )));
        }
        Ok(self.config)
    }
}

// ── Retry policy ─────────────────────────────────────────────────────────

/// Which failures the retry executor is allowed to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RetryScope {
    /// Only errors classified as transient by
    /// [`crate::error::ServiceError::is_retryable`]. (default)
    #[default]
    TransientOnly,
    /// Every error, including permanent 4xx and malformed payloads.
    AllErrors,
}

/// Bounded exponential backoff shared by the Notion and reasoning clients.
///
/// With the defaults a failing call is attempted 3 times, waiting 2 s and
/// then 4 s in between, never longer than 30 s per wait.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first. Default: 3.
    pub max_attempts: u32,
    /// Wait after the first failure. Default: 2 s.
    pub initial_backoff: Duration,
    /// Upper bound on any single wait. Default: 30 s.
    pub max_backoff: Duration,
    /// Default: [`RetryScope::TransientOnly`].
    pub scope: RetryScope,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(30),
            scope: RetryScope::TransientOnly,
        }
    }
}

impl RetryPolicy {
    /// A policy that retries without waiting. Meant for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            scope: RetryScope::TransientOnly,
        }
    }

    /// Wait before the attempt that follows failed attempt `failed_attempt` (1-based).
    pub fn backoff(&self, failed_attempt: u32) -> Duration {
        let exp = failed_attempt.saturating_sub(1).min(31);
        self.initial_backoff
            .checked_mul(1u32 << exp)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

// ── Course directory ─────────────────────────────────────────────────────

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Explicit mapping from course name to the Notion page that collects its lectures.
///
/// Lookups are case- and whitespace-insensitive: "Machine Learning",
/// "machine  learning" and "MACHINE_LEARNING" resolve to the same entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CourseDirectory {
    pages: BTreeMap<String, String>,
}

impl CourseDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(course name, page id)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut dir = Self::new();
        for (course, page) in pairs {
            dir.insert(course.as_ref(), page);
        }
        dir
    }

    /// Build from `NOTION_PAGE_<COURSE>` variables in the process environment.
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Build from an arbitrary set of `(name, value)` variables.
    pub fn from_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut dir = Self::new();
        for (key, value) in vars {
            if let Some(suffix) = key.strip_prefix(COURSE_ENV_PREFIX) {
                if !suffix.is_empty() && !value.trim().is_empty() {
                    dir.pages.insert(suffix.to_string(), value.trim().to_string());
                }
            }
        }
        dir
    }

    pub fn insert(&mut self, course: &str, page_id: impl Into<String>) {
        self.pages.insert(course_key(course), page_id.into());
    }

    /// Destination page for `course`, if one is mapped.
    pub fn page_id(&self, course: &str) -> Option<&str> {
        self.pages.get(&course_key(course)).map(String::as_str)
    }

    /// Destination page for `course`, or [`PipelineError::CourseNotMapped`].
    pub fn resolve(&self, course: &str) -> Result<&str, PipelineError> {
        self.page_id(course)
            .ok_or_else(|| PipelineError::CourseNotMapped {
                course: course.to_string(),
                env_key: env_key(course),
            })
    }

    /// Display names of all mapped courses, sorted.
    pub fn courses(&self) -> Vec<String> {
        self.pages.keys().map(|k| display_name(k)).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// Normalised lookup key: upper case, runs of whitespace replaced by `_`.
pub fn course_key(course: &str) -> String {
    RE_WHITESPACE
        .replace_all(course.trim(), "_")
        .to_uppercase()
}

/// The environment variable that maps `course` to a page.
pub fn env_key(course: &str) -> String {
    format!("{COURSE_ENV_PREFIX}{}", course_key(course))
}

fn display_name(key: &str) -> String {
    key.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let lower = w.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
