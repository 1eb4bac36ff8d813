//! Job run identifier lookup.
//!
//! A [`JobIdResolver`] asks an ordered list of [`JobIdStrategy`]s for the
//! identifier of the current job run and takes the first answer. A strategy
//! that fails or has no answer hands over to the next one, so adding a
//! fallback is a matter of pushing another strategy.

use crate::Level;
use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Parameter key the fallback lookup reads.
pub const JOB_ID_PARAMETER: &str = "job_id";

/// Environment variable the default job context lookup reads.
pub const JOB_CONTEXT_VAR: &str = "LAKELOG_JOB_RUN_ID";

/// Failure of a single lookup strategy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// The source cannot be queried in this environment.
    #[error("job context unavailable: {0}")]
    Unavailable(String),

    /// An environment variable holds bytes that are not UTF-8.
    #[error("environment variable {0} is not valid unicode")]
    NotUnicode(String),
}

/// One way of finding the current job run identifier.
pub trait JobIdStrategy: Send + Sync {
    /// Short human-readable name used in diagnostics.
    fn name(&self) -> &str;

    /// Returns the identifier, `Ok(None)` if this source has none.
    ///
    /// # Errors
    ///
    /// Returns a [`LookupError`] if the source could not be queried.
    fn lookup(&self) -> Result<Option<String>, LookupError>;
}

/// Reads the job run identifier from an environment variable.
#[derive(Debug, Clone)]
pub struct EnvVarJobId {
    var: String,
    label: String,
}

impl EnvVarJobId {
    /// Reads `var`.
    pub fn new(var: impl Into<String>) -> Self {
        let var = var.into();
        Self {
            label: format!("environment variable {var}"),
            var,
        }
    }
}

impl JobIdStrategy for EnvVarJobId {
    fn name(&self) -> &str {
        &self.label
    }

    fn lookup(&self) -> Result<Option<String>, LookupError> {
        read_env_var(&self.var)
    }
}

/// Reads one variable at call time. Other variables are never touched, so
/// a non-UTF-8 entry elsewhere in the environment cannot affect the lookup.
fn read_env_var(var: &str) -> Result<Option<String>, LookupError> {
    match env::var(var) {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(LookupError::NotUnicode(var.to_string())),
    }
}

type ParamFn = dyn Fn(&str) -> Result<Option<String>, LookupError> + Send + Sync;

#[derive(Clone)]
enum ParamSource {
    Fixed(BTreeMap<String, String>),
    Live(Arc<ParamFn>),
}

/// Queries a key-value parameter store for [`JOB_ID_PARAMETER`].
///
/// A live store is queried on every lookup, so a parameter that appears
/// after the logger was built is still found when caching is initialized.
#[derive(Clone)]
pub struct ParameterJobId {
    source: ParamSource,
}

impl Default for ParameterJobId {
    /// An empty fixed store.
    fn default() -> Self {
        Self {
            source: ParamSource::Fixed(BTreeMap::new()),
        }
    }
}

impl fmt::Debug for ParameterJobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            ParamSource::Fixed(params) => f
                .debug_struct("ParameterJobId")
                .field("params", params)
                .finish(),
            ParamSource::Live(_) => f
                .debug_struct("ParameterJobId")
                .field("params", &"<live>")
                .finish(),
        }
    }
}

impl ParameterJobId {
    /// Uses the given parameters.
    pub fn new<K, V>(params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            source: ParamSource::Fixed(
                params
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    /// Uses a live parameter store. `get` receives the parameter key.
    ///
    /// ```rust
    /// use lakelog::{JobIdStrategy, ParameterJobId};
    ///
    /// let params = ParameterJobId::from_fn(|key| Ok((key == "job_id").then(|| "77".to_string())));
    /// assert_eq!(params.lookup().unwrap().as_deref(), Some("77"));
    /// ```
    pub fn from_fn<F>(get: F) -> Self
    where
        F: Fn(&str) -> Result<Option<String>, LookupError> + Send + Sync + 'static,
    {
        Self {
            source: ParamSource::Live(Arc::new(get)),
        }
    }

    /// Uses the process environment as the parameter store, read at lookup
    /// time.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_fn(read_env_var)
    }
}

impl JobIdStrategy for ParameterJobId {
    fn name(&self) -> &str {
        "job_id parameter"
    }

    fn lookup(&self) -> Result<Option<String>, LookupError> {
        match &self.source {
            ParamSource::Fixed(params) => Ok(params.get(JOB_ID_PARAMETER).cloned()),
            ParamSource::Live(get) => get(JOB_ID_PARAMETER),
        }
    }
}

type LookupFn = dyn Fn() -> Result<Option<String>, LookupError> + Send + Sync;

/// Adapts a closure into a strategy, for host-specific job contexts.
///
/// ```rust
/// use lakelog::{FnJobId, JobIdStrategy};
///
/// let strategy = FnJobId::new("scheduler", || Ok(Some("run-42".to_string())));
/// assert_eq!(strategy.lookup().unwrap().as_deref(), Some("run-42"));
/// ```
pub struct FnJobId {
    name: String,
    lookup: Box<LookupFn>,
}

impl FnJobId {
    /// Wraps `lookup` under `name`.
    pub fn new<F>(name: impl Into<String>, lookup: F) -> Self
    where
        F: Fn() -> Result<Option<String>, LookupError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            lookup: Box::new(lookup),
        }
    }
}

impl fmt::Debug for FnJobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnJobId").field("name", &self.name).finish()
    }
}

impl JobIdStrategy for FnJobId {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookup(&self) -> Result<Option<String>, LookupError> {
        (self.lookup)()
    }
}

/// Ordered list of job id strategies.
pub struct JobIdResolver {
    strategies: Vec<Box<dyn JobIdStrategy>>,
}

impl Default for JobIdResolver {
    /// The job context variable [`JOB_CONTEXT_VAR`], then the `job_id`
    /// parameter read from the process environment.
    fn default() -> Self {
        Self::empty()
            .then(EnvVarJobId::new(JOB_CONTEXT_VAR))
            .then(ParameterJobId::from_env())
    }
}

impl fmt::Debug for JobIdResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.strategies.iter().map(|s| s.name()))
            .finish()
    }
}

impl JobIdResolver {
    /// Creates a resolver with no strategies. It never resolves anything.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Creates the usual two-step resolver: a job context lookup first,
    /// then the `job_id` parameter.
    pub fn standard(context: impl JobIdStrategy + 'static, params: ParameterJobId) -> Self {
        Self::empty().then(context).then(params)
    }

    /// Appends a strategy to try after the existing ones.
    #[must_use]
    pub fn then(mut self, strategy: impl JobIdStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// Returns the strategy names in lookup order.
    pub fn strategy_names(&self) -> impl Iterator<Item = &str> {
        self.strategies.iter().map(|s| s.name())
    }

    /// Tries each strategy in order and returns the first non-empty id.
    ///
    /// Progress is reported through `diagnostics` so the console shows
    /// which source was used or why each one was skipped.
    pub fn resolve(&self, diagnostics: &mut dyn FnMut(Level, &str)) -> Option<String> {
        for strategy in &self.strategies {
            match strategy.lookup() {
                Ok(Some(id)) if !id.trim().is_empty() => {
                    debug!(strategy = strategy.name(), job_run_id = %id, "Resolved job run id");
                    diagnostics(
                        Level::Info,
                        &format!("Job run id {id} resolved from {}", strategy.name()),
                    );
                    return Some(id);
                }
                Ok(_) => {
                    debug!(strategy = strategy.name(), "No job run id from strategy");
                    diagnostics(
                        Level::Warning,
                        &format!("No job run id from {}; trying next source", strategy.name()),
                    );
                }
                Err(e) => {
                    warn!(strategy = strategy.name(), error = %e, "Job run id lookup failed");
                    diagnostics(
                        Level::Warning,
                        &format!("Job run id lookup via {} failed: {e}", strategy.name()),
                    );
                }
            }
        }
        None
    }
}
