//! Query front-end.
//!
//! [`select`] binds a [`Comprehension`] to the caller's variables and
//! returns an immutable [`Query`]. Ordering and slicing return new
//! queries; [`Query::fetch`] runs the statement and hydrates objects.
//!
//! ```no_run
//! # async fn demo(pool: deadpool_postgres::Pool, diagram: std::sync::Arc<compsql::Diagram>) -> compsql::Result<()> {
//! use compsql::expr::{int, name, Comprehension};
//! use compsql::{select, Value};
//!
//! let adults = Comprehension::new(name("p"))
//!     .for_in("p", name("Person"))
//!     .filter(name("p").attr("age").gt(name("min_age")));
//! let query = select(adults, [
//!     ("Person", Value::from(diagram.entity("Person").expect("Person"))),
//!     ("min_age", Value::from(30)),
//! ])?;
//! for person in query.orderby(["name"])?.slice(0..10)?.fetch(&pool).await? {
//!     println!("{}", person.to_json());
//! }
//! # Ok(())
//! # }
//! ```
mod cache;

use std::collections::{BTreeMap, HashMap};
use std::ops::{Bound, RangeBounds};
use std::sync::Arc;

use tracing::debug;

pub use cache::{Origin, PlanCache, PlanKey, StatementKey};
pub use crate::translate::OrderKey;

use crate::ast::Rendered;
use crate::db::Executor;
use crate::error::{Error, Result};
use crate::expr::Comprehension;
use crate::translate::{normalize_value, SemanticType, Translator};
use crate::value::{Object, Value};

/// Build a query against the process-wide plan cache.
///
/// `vars` must bind every free name of `query`; extra bindings are
/// ignored.
#[track_caller]
pub fn select<I, K>(query: Comprehension, vars: I) -> Result<Query>
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    let origin = Origin::caller();
    Query::build(PlanCache::global(), origin, query, collect_vars(vars))
}

/// Like [`select`], with an explicit cache.
#[track_caller]
pub fn select_with<I, K>(cache: Arc<PlanCache>, query: Comprehension, vars: I) -> Result<Query>
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    let origin = Origin::caller();
    Query::build(cache, origin, query, collect_vars(vars))
}

fn collect_vars<I, K>(vars: I) -> HashMap<String, Value>
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    vars.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

struct Core {
    query: Comprehension,
    values: HashMap<String, Value>,
    vartypes: BTreeMap<String, SemanticType>,
    key: PlanKey,
    cache: Arc<PlanCache>,
}

/// An executable query. Cheap to clone; every refinement returns a new
/// value and leaves the receiver untouched.
#[derive(Clone)]
pub struct Query {
    core: Arc<Core>,
    order: Vec<OrderKey>,
    limit: Option<(usize, usize)>,
}

impl std::fmt::Debug for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("key", &self.core.key)
            .field("order", &self.order)
            .field("limit", &self.limit)
            .finish()
    }
}

impl Query {
    fn build(
        cache: Arc<PlanCache>,
        origin: Origin,
        query: Comprehension,
        values: HashMap<String, Value>,
    ) -> Result<Self> {
        let mut vartypes = BTreeMap::new();
        for name in query.free_names() {
            let value = values.get(&name).ok_or_else(|| Error::Name(name.clone()))?;
            let ty = normalize_value(value)?;
            vartypes.insert(name, ty);
        }
        let key = PlanKey::new(origin, &query, &vartypes);
        cache.translator(&key, &query, &vartypes)?;
        Ok(Self {
            core: Arc::new(Core {
                query,
                values,
                vartypes,
                key,
                cache,
            }),
            order: Vec::new(),
            limit: None,
        })
    }

    pub fn key(&self) -> &PlanKey {
        &self.core.key
    }

    pub fn order(&self) -> &[OrderKey] {
        &self.order
    }

    /// Current `[start, stop)` row range.
    pub fn limit(&self) -> Option<(usize, usize)> {
        self.limit
    }

    pub fn translator(&self) -> Result<Arc<Translator>> {
        let core = &self.core;
        core.cache.translator(&core.key, &core.query, &core.vartypes)
    }

    /// Replace the ordering. Each key is a dotted attribute path of the
    /// result entity; entity-valued keys order by their primary key.
    pub fn orderby<I, K>(&self, keys: I) -> Result<Query>
    where
        I: IntoIterator<Item = K>,
        K: Into<OrderKey>,
    {
        let keys: Vec<OrderKey> = keys.into_iter().map(Into::into).collect();
        if keys.is_empty() {
            return Err(Error::type_error("orderby requires at least one attribute"));
        }
        let translator = self.translator()?;
        for key in &keys {
            translator.check_order(key)?;
        }
        Ok(Query {
            core: Arc::clone(&self.core),
            order: keys,
            limit: self.limit,
        })
    }

    pub fn slice(&self, range: impl RangeBounds<i64>) -> Result<Query> {
        self.slice_by(range, 1)
    }

    /// Restrict to a row range relative to the current one. Only a step
    /// of 1 is supported and bounds may not be negative.
    pub fn slice_by(&self, range: impl RangeBounds<i64>, step: i64) -> Result<Query> {
        if step != 1 {
            return Err(Error::type_error(format!("slice step must be 1, got {}", step)));
        }
        let start = match range.start_bound() {
            Bound::Included(&s) => s,
            Bound::Excluded(&s) => s.saturating_add(1),
            Bound::Unbounded => 0,
        };
        let stop = match range.end_bound() {
            Bound::Included(&e) => Some(e.saturating_add(1)),
            Bound::Excluded(&e) => Some(e),
            Bound::Unbounded => None,
        };
        let start = to_index(start)?;
        let stop = stop.map(to_index).transpose()?;

        let limit = match (self.limit, stop) {
            (None, None) if start == 0 => return Ok(self.clone()),
            (None, None) => {
                return Err(Error::type_error("slice with a start needs a stop"));
            }
            (None, Some(stop)) => (start, stop),
            (Some((s1, e1)), None) => (s1.saturating_add(start), e1),
            (Some((s1, e1)), Some(stop)) => {
                (s1.saturating_add(start), e1.min(s1.saturating_add(stop)))
            }
        };
        let limit = if limit.0 >= limit.1 { (0, 0) } else { limit };
        Ok(Query {
            core: Arc::clone(&self.core),
            order: self.order.clone(),
            limit: Some(limit),
        })
    }

    /// The single row at index `i`, as a query.
    pub fn nth(&self, i: i64) -> Result<Query> {
        self.slice(i..i.saturating_add(1))
    }

    /// Same query with one variable rebound. The new value must have a
    /// type the query accepts; a changed type compiles a new plan.
    pub fn bind(&self, name: &str, value: impl Into<Value>) -> Result<Query> {
        let core = &self.core;
        if !core.vartypes.contains_key(name) {
            return Err(Error::Name(name.to_string()));
        }
        let mut values = core.values.clone();
        values.insert(name.to_string(), value.into());
        let rebound = Query::build(
            Arc::clone(&core.cache),
            core.key.origin,
            core.query.clone(),
            values,
        )?;
        Ok(Query {
            core: rebound.core,
            order: self.order.clone(),
            limit: self.limit,
        })
    }

    fn rendered(&self, translator: &Translator) -> Result<Arc<Rendered>> {
        let key = StatementKey {
            plan: self.core.key.clone(),
            order: self.order.clone(),
            limit: self.limit,
        };
        self.core.cache.statement(&key, translator)
    }

    /// Rendered SQL text for the current ordering and range.
    pub fn sql(&self) -> Result<String> {
        let translator = self.translator()?;
        Ok(self.rendered(&translator)?.sql.clone())
    }

    /// Positional arguments for the current variable values.
    pub fn arguments(&self) -> Result<Vec<Value>> {
        let translator = self.translator()?;
        let rendered = self.rendered(&translator)?;
        let params = translator.extract(&self.core.values)?;
        Ok(rendered.adapter.adapt(&params)?)
    }

    /// Run the query. Each call issues a fresh statement.
    pub async fn fetch<E: Executor>(&self, executor: &E) -> Result<Objects> {
        if self.limit == Some((0, 0)) {
            debug!("empty row range, skipping execution");
            return Ok(Objects {
                inner: Vec::new().into_iter(),
            });
        }
        let translator = self.translator()?;
        let rendered = self.rendered(&translator)?;
        let params = translator.extract(&self.core.values)?;
        let args = rendered.adapter.adapt(&params)?;
        debug!(sql = %rendered.sql, args = args.len(), "executing query");

        let rows = executor.query_rows(&rendered.sql, &args).await?;
        let objects = translator
            .entity()
            .hydrate(rows, &translator.projection().offsets)?;
        Ok(Objects {
            inner: objects.into_iter(),
        })
    }
}

fn to_index(n: i64) -> Result<usize> {
    usize::try_from(n).map_err(|_| Error::type_error(format!("negative slice bound {}", n)))
}

/// Objects produced by one execution.
#[derive(Debug)]
pub struct Objects {
    inner: std::vec::IntoIter<Object>,
}

impl Iterator for Objects {
    type Item = Object;

    fn next(&mut self) -> Option<Object> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Objects {}
