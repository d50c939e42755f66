//! Two-level plan cache.
//!
//! Level 1 maps a [`PlanKey`] to a compiled [`Translator`]. Level 2 maps
//! a [`StatementKey`] (a plan key plus ordering and row range) to the
//! rendered SQL and its parameter adapter. Both levels are LRU bounded.
//! Locks are never held while compiling; two threads missing on the
//! same key both compile and the later insert wins.
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::panic::Location;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use lru::LruCache;
use tracing::{debug, trace};

use crate::ast::{PostgresRenderer, Rendered, SqlRenderer};
use crate::config::CacheConfig;
use crate::error::{Error, Result};
use crate::expr::Comprehension;
use crate::translate::{OrderKey, SemanticType, Translator};

static GLOBAL: OnceLock<Arc<PlanCache>> = OnceLock::new();

/// Source location of the `select` call that built a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Origin {
    pub file: &'static str,
    pub line: u32,
    pub column: u32,
}

impl Origin {
    #[track_caller]
    pub fn caller() -> Self {
        let location = Location::caller();
        Self {
            file: location.file(),
            line: location.line(),
            column: location.column(),
        }
    }
}

/// Identity of a compiled plan: where the query was written, its
/// structure, and the sorted types of its free variables.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlanKey {
    pub origin: Origin,
    pub fingerprint: u64,
    pub signature: Vec<(String, SemanticType)>,
}

impl PlanKey {
    pub fn new(origin: Origin, query: &Comprehension, vartypes: &BTreeMap<String, SemanticType>) -> Self {
        Self {
            origin,
            fingerprint: query.fingerprint(),
            signature: vartypes.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatementKey {
    pub plan: PlanKey,
    pub order: Vec<OrderKey>,
    pub limit: Option<(usize, usize)>,
}

pub struct PlanCache {
    translators: Mutex<LruCache<PlanKey, Arc<Translator>>>,
    statements: Mutex<LruCache<StatementKey, Arc<Rendered>>>,
    renderer: Box<dyn SqlRenderer>,
}

impl PlanCache {
    /// Cache rendering PostgreSQL.
    pub fn new(config: &CacheConfig) -> Result<Self> {
        Self::with_renderer(config, PostgresRenderer)
    }

    pub fn with_renderer(config: &CacheConfig, renderer: impl SqlRenderer + 'static) -> Result<Self> {
        let (translators, statements) = config.capacities()?;
        Ok(Self::build(translators, statements, Box::new(renderer)))
    }

    fn build(
        translators: NonZeroUsize,
        statements: NonZeroUsize,
        renderer: Box<dyn SqlRenderer>,
    ) -> Self {
        Self {
            translators: Mutex::new(LruCache::new(translators)),
            statements: Mutex::new(LruCache::new(statements)),
            renderer,
        }
    }

    /// Process-wide cache used by [`crate::select`]. Created with default
    /// capacities unless [`PlanCache::init_global`] ran first.
    pub fn global() -> Arc<PlanCache> {
        GLOBAL
            .get_or_init(|| {
                let defaults = CacheConfig::default();
                let capacity = |n| NonZeroUsize::new(n).unwrap_or(NonZeroUsize::MIN);
                Arc::new(Self::build(
                    capacity(defaults.translator_capacity),
                    capacity(defaults.statement_capacity),
                    Box::new(PostgresRenderer),
                ))
            })
            .clone()
    }

    /// Install the process-wide cache. Fails if it is already in use.
    pub fn init_global(config: &CacheConfig) -> Result<Arc<PlanCache>> {
        let cache = Arc::new(Self::new(config)?);
        GLOBAL
            .set(Arc::clone(&cache))
            .map_err(|_| Error::Config("plan cache is already initialized".into()))?;
        Ok(cache)
    }

    pub fn renderer(&self) -> &dyn SqlRenderer {
        self.renderer.as_ref()
    }

    /// Level 1: cached translator for `key`, compiling on a miss.
    pub fn translator(
        &self,
        key: &PlanKey,
        query: &Comprehension,
        vartypes: &BTreeMap<String, SemanticType>,
    ) -> Result<Arc<Translator>> {
        if let Some(translator) = lock(&self.translators).get(key) {
            trace!(fingerprint = key.fingerprint, "translator cache hit");
            return Ok(Arc::clone(translator));
        }

        debug!(
            fingerprint = key.fingerprint,
            file = key.origin.file,
            line = key.origin.line,
            "translator cache miss"
        );
        let translator = Arc::new(Translator::new(query, vartypes)?);
        lock(&self.translators).put(key.clone(), Arc::clone(&translator));
        Ok(translator)
    }

    /// Level 2: rendered statement for `key`, rendering on a miss.
    pub fn statement(&self, key: &StatementKey, translator: &Translator) -> Result<Arc<Rendered>> {
        if let Some(rendered) = lock(&self.statements).get(key) {
            trace!(fingerprint = key.plan.fingerprint, "statement cache hit");
            return Ok(Arc::clone(rendered));
        }

        let select = translator.statement(&key.order, key.limit)?;
        let rendered = Arc::new(self.renderer.render(&select));
        debug!(
            dialect = self.renderer.name(),
            sql = %rendered.sql,
            "rendered statement"
        );
        lock(&self.statements).put(key.clone(), Arc::clone(&rendered));
        Ok(rendered)
    }

    pub fn translator_count(&self) -> usize {
        lock(&self.translators).len()
    }

    pub fn statement_count(&self) -> usize {
        lock(&self.statements).len()
    }

    pub fn clear(&self) {
        lock(&self.translators).clear();
        lock(&self.statements).clear();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
