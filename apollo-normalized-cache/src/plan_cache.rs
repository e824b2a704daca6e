//! Compile-once cache of query plans.

use std::fmt;
use std::hash::Hash;
use std::hash::Hasher;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use sha2::Digest;
use sha2::Sha256;

use crate::configuration::Configuration;
use crate::error::PlanError;
use crate::plan::QueryPlan;
use crate::spec::SelectionNode;
use crate::spec::TypeOracle;

/// SHA-256 digest of a selection tree, identifying a query shape.
#[derive(Clone, Hash, PartialEq, Eq)]
pub struct QueryShape(Vec<u8>);

impl QueryShape {
    pub fn new(selections: &[SelectionNode]) -> Self {
        let mut hasher = StructHasher::new();
        selections.hash(&mut hasher);
        QueryShape(hasher.finalize())
    }
}

impl fmt::Display for QueryShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

impl fmt::Debug for QueryShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("QueryShape")
            .field(&hex::encode(&self.0))
            .finish()
    }
}

struct StructHasher {
    hasher: Sha256,
}

impl StructHasher {
    fn new() -> Self {
        Self {
            hasher: Sha256::new(),
        }
    }

    fn finalize(self) -> Vec<u8> {
        self.hasher.finalize().as_slice().into()
    }
}

impl Hasher for StructHasher {
    fn finish(&self) -> u64 {
        self.hasher
            .clone()
            .finalize()
            .iter()
            .take(8)
            .fold(0, |acc, byte| (acc << 8) | u64::from(*byte))
    }

    fn write(&mut self, bytes: &[u8]) {
        self.hasher.update(&[0xFF][..]);
        self.hasher.update(bytes);
    }
}

/// An LRU cache of compiled plans, keyed by [`QueryShape`].
///
/// Plans depend on the type oracle they were compiled with: use one cache per schema.
pub struct PlanCache {
    plans: Mutex<LruCache<QueryShape, Arc<QueryPlan>>>,
}

impl PlanCache {
    pub fn new(limit: NonZeroUsize) -> Self {
        Self {
            plans: Mutex::new(LruCache::new(limit)),
        }
    }

    pub fn from_configuration(configuration: &Configuration) -> Self {
        Self::new(configuration.plan_cache.limit)
    }

    /// Returns the plan for `selections`, compiling it on first use.
    ///
    /// Compilation errors are returned to every caller and never cached.
    #[tracing::instrument(skip_all, level = "trace")]
    pub fn get_or_compile(
        &self,
        selections: &[SelectionNode],
        oracle: &dyn TypeOracle,
    ) -> Result<Arc<QueryPlan>, PlanError> {
        let shape = QueryShape::new(selections);
        if let Some(plan) = self.plans.lock().get(&shape) {
            tracing::trace!(%shape, "plan cache hit");
            return Ok(plan.clone());
        }

        // compile outside of the lock, a racing caller may compile the same shape
        let plan = Arc::new(QueryPlan::compile(selections, oracle)?);
        tracing::trace!(%shape, "plan cache miss");
        self.plans.lock().put(shape, plan.clone());
        Ok(plan)
    }

    pub fn get(&self, shape: &QueryShape) -> Option<Arc<QueryPlan>> {
        self.plans.lock().get(shape).cloned()
    }

    pub fn limit(&self) -> NonZeroUsize {
        self.plans.lock().cap()
    }

    pub fn len(&self) -> usize {
        self.plans.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.lock().is_empty()
    }
}

impl Default for PlanCache {
    fn default() -> Self {
        Self::from_configuration(&Configuration::default())
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::spec::FieldType;
    use crate::spec::MockTypeOracle;
    use crate::test_utils::*;

    fn hero() -> Vec<SelectionNode> {
        vec![SelectionNode::object(
            "hero",
            FieldType::named("Character"),
            vec![id(), typename(), string("name")],
        )]
    }

    #[test]
    fn shapes_identify_selection_trees() {
        assert_eq!(QueryShape::new(&hero()), QueryShape::new(&hero()));
        let aliased = vec![hero().remove(0).with_alias("mainHero")];
        assert_ne!(QueryShape::new(&hero()), QueryShape::new(&aliased));
        assert_eq!(QueryShape::new(&hero()).to_string().len(), 64);
    }

    #[test]
    fn compiles_each_shape_once() {
        let mut oracle = MockTypeOracle::new();
        // four fields, compiled a single time
        oracle
            .expect_is_list_type()
            .times(4)
            .returning(|field_type| field_type.is_list());

        let cache = PlanCache::new(NonZeroUsize::new(2).unwrap());
        let first = cache.get_or_compile(&hero(), &oracle).unwrap();
        let second = cache.get_or_compile(&hero(), &oracle).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&QueryShape::new(&hero())).is_some());
    }

    #[test]
    fn errors_are_not_cached() {
        let cache = PlanCache::default();
        let broken = vec![string("name").with_is_list(true)];
        assert!(cache.get_or_compile(&broken, &Structural).is_err());
        assert!(cache.get_or_compile(&broken, &Structural).is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn evicts_least_recently_used_shapes() {
        let cache = PlanCache::new(NonZeroUsize::new(2).unwrap());
        let a = vec![string("a")];
        let b = vec![string("b")];
        let c = vec![string("c")];
        cache.get_or_compile(&a, &Structural).unwrap();
        cache.get_or_compile(&b, &Structural).unwrap();
        cache.get_or_compile(&a, &Structural).unwrap();
        cache.get_or_compile(&c, &Structural).unwrap();
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&QueryShape::new(&a)).is_some());
        assert!(cache.get(&QueryShape::new(&b)).is_none());
        assert!(cache.get(&QueryShape::new(&c)).is_some());
    }

    #[test]
    fn limit_comes_from_configuration() {
        let configuration = Configuration::from_yaml("plan_cache:\n  limit: 3\n").unwrap();
        assert_eq!(PlanCache::from_configuration(&configuration).limit().get(), 3);
        assert_eq!(PlanCache::default().limit().get(), 512);
    }
}
