//! Identifier model and cache-key normalization.
//!
//! Callers name objects either with a bare key or with a key carrying extra
//! context for the lookup. Only the key ever reaches the cache; the context is
//! handed to the lookup untouched.

/// A caller-supplied token naming one object to fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier<K, C = ()> {
    /// Bare identifier, used directly as the cache key.
    Simple(K),
    /// Cache key plus extra context passed through to the lookup.
    Composite(K, C),
}

impl<K, C> Identifier<K, C> {
    /// Create a simple identifier.
    pub fn simple(key: K) -> Self {
        Identifier::Simple(key)
    }

    /// Create a composite identifier carrying lookup context.
    pub fn composite(key: K, context: C) -> Self {
        Identifier::Composite(key, context)
    }

    /// The cache key: the identifier itself, or the first component of a
    /// composite identifier.
    pub fn key(&self) -> &K {
        match self {
            Identifier::Simple(key) | Identifier::Composite(key, _) => key,
        }
    }

    /// Extra context, if any.
    pub fn context(&self) -> Option<&C> {
        match self {
            Identifier::Simple(_) => None,
            Identifier::Composite(_, context) => Some(context),
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, Identifier::Composite(..))
    }

    /// Split into key and optional context.
    pub fn into_parts(self) -> (K, Option<C>) {
        match self {
            Identifier::Simple(key) => (key, None),
            Identifier::Composite(key, context) => (key, Some(context)),
        }
    }
}

impl<K, C> From<K> for Identifier<K, C> {
    fn from(key: K) -> Self {
        Identifier::Simple(key)
    }
}

/// One identifier or an ordered collection of them.
///
/// This is the input type of a fetch. A single identifier is normalized to a
/// one-element sequence at entry, see [`Identifiers::into_vec`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifiers<K, C = ()> {
    One(Identifier<K, C>),
    Many(Vec<Identifier<K, C>>),
}

impl<K, C> Identifiers<K, C> {
    /// Build a collection of simple identifiers from bare keys.
    pub fn from_keys<I>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
    {
        Identifiers::Many(keys.into_iter().map(Identifier::Simple).collect())
    }

    /// Normalize into an ordered sequence. Order and duplicates are kept.
    pub fn into_vec(self) -> Vec<Identifier<K, C>> {
        match self {
            Identifiers::One(identifier) => vec![identifier],
            Identifiers::Many(identifiers) => identifiers,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Identifiers::One(_) => 1,
            Identifiers::Many(identifiers) => identifiers.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the caller passed a single identifier rather than a collection.
    pub fn is_single(&self) -> bool {
        matches!(self, Identifiers::One(_))
    }
}

impl<K, C> From<Identifier<K, C>> for Identifiers<K, C> {
    fn from(identifier: Identifier<K, C>) -> Self {
        Identifiers::One(identifier)
    }
}

impl<K, C> From<Vec<Identifier<K, C>>> for Identifiers<K, C> {
    fn from(identifiers: Vec<Identifier<K, C>>) -> Self {
        Identifiers::Many(identifiers)
    }
}

impl<K, C> FromIterator<Identifier<K, C>> for Identifiers<K, C> {
    fn from_iter<I: IntoIterator<Item = Identifier<K, C>>>(iter: I) -> Self {
        Identifiers::Many(iter.into_iter().collect())
    }
}

// ============================================================================
// NORMALIZATION
// ============================================================================

/// Coerce a single identifier or a collection into an ordered sequence.
pub fn normalize<K, C>(identifiers: impl Into<Identifiers<K, C>>) -> Vec<Identifier<K, C>> {
    identifiers.into().into_vec()
}

/// Derive the cache key for one identifier.
pub fn cache_key<K: Clone, C>(identifier: &Identifier<K, C>) -> K {
    identifier.key().clone()
}

/// Derive cache keys for a sequence, preserving order and duplicates.
pub fn cache_keys<K: Clone, C>(identifiers: &[Identifier<K, C>]) -> Vec<K> {
    identifiers.iter().map(cache_key).collect()
}
