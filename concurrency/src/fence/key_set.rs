use bytes::Bytes;

/// An abstract set of byte-string keys that can be checked for overlap with another set.
///
/// Key sets are compared with [`KeySet::collides`], which is symmetric for every pair of
/// variants. A set that contains no keys collides with nothing, and [`KeySet::Entire`]
/// collides with every set that contains at least one key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeySet {
    /// Contains no keys.
    Empty,
    /// Contains every key.
    Entire,
    /// Every key `k` with `lower <= k <= upper`. Empty when `lower > upper`.
    Range { lower: Bytes, upper: Bytes },
    /// Every key starting with the prefix. The empty prefix matches every key.
    Prefix(Bytes),
    /// An explicit set of keys, kept sorted and deduplicated.
    Discrete(Vec<Bytes>),
}

impl KeySet {
    /// The set containing no key.
    pub fn empty() -> Self {
        KeySet::Empty
    }

    /// The set containing every key.
    pub fn entire() -> Self {
        KeySet::Entire
    }

    /// Creates the closed range `[lower, upper]`.
    pub fn range(lower: impl AsRef<[u8]>, upper: impl AsRef<[u8]>) -> Self {
        KeySet::Range {
            lower: Bytes::copy_from_slice(lower.as_ref()),
            upper: Bytes::copy_from_slice(upper.as_ref()),
        }
    }

    /// The set of keys starting with `prefix`.
    pub fn prefix(prefix: impl AsRef<[u8]>) -> Self {
        KeySet::Prefix(Bytes::copy_from_slice(prefix.as_ref()))
    }

    /// Creates a discrete set from `keys`, sorting and deduplicating them.
    pub fn discrete<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: AsRef<[u8]>,
    {
        let mut keys: Vec<Bytes> = keys
            .into_iter()
            .map(|key| Bytes::copy_from_slice(key.as_ref()))
            .collect();
        keys.sort();
        keys.dedup();

        KeySet::Discrete(keys)
    }

    /// Returns `true` if the set provably contains no keys.
    pub fn is_empty(&self) -> bool {
        match self {
            KeySet::Empty => true,
            KeySet::Entire | KeySet::Prefix(_) => false,
            KeySet::Range { lower, upper } => lower > upper,
            KeySet::Discrete(keys) => keys.is_empty(),
        }
    }

    /// Returns `true` if `self` and `other` may share a key.
    ///
    /// Range against discrete compares the range with the discrete set's first and last keys
    /// only, so a sparse discrete set may be reported as colliding with a range that falls
    /// between two of its keys.
    pub fn collides(&self, other: &KeySet) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }

        match (self, other) {
            (KeySet::Empty, _) | (_, KeySet::Empty) => false,
            (KeySet::Entire, _) | (_, KeySet::Entire) => true,

            (
                KeySet::Range {
                    lower: a_lower,
                    upper: a_upper,
                },
                KeySet::Range {
                    lower: b_lower,
                    upper: b_upper,
                },
            ) => ranges_overlap(a_lower, a_upper, b_lower, b_upper),
            (KeySet::Range { lower, upper }, KeySet::Prefix(prefix))
            | (KeySet::Prefix(prefix), KeySet::Range { lower, upper }) => {
                range_collides_prefix(lower, upper, prefix)
            }
            (KeySet::Range { lower, upper }, KeySet::Discrete(keys))
            | (KeySet::Discrete(keys), KeySet::Range { lower, upper }) => {
                range_collides_discrete(lower, upper, keys)
            }

            (KeySet::Prefix(a), KeySet::Prefix(b)) => a.starts_with(b) || b.starts_with(a),
            (KeySet::Prefix(prefix), KeySet::Discrete(keys))
            | (KeySet::Discrete(keys), KeySet::Prefix(prefix)) => {
                keys.iter().any(|key| key.starts_with(prefix))
            }

            (KeySet::Discrete(a), KeySet::Discrete(b)) => sorted_intersect(a, b),
        }
    }
}

fn ranges_overlap(a_lower: &[u8], a_upper: &[u8], b_lower: &[u8], b_upper: &[u8]) -> bool {
    a_lower <= b_upper && b_lower <= a_upper
}

/// Keys starting with `prefix` form the contiguous run that begins at `prefix` itself, so
/// the range collides iff it contains `prefix` or starts inside that run.
fn range_collides_prefix(lower: &[u8], upper: &[u8], prefix: &[u8]) -> bool {
    let first = lower.max(prefix);
    first <= upper && (lower <= prefix || lower.starts_with(prefix))
}

fn range_collides_discrete(lower: &[u8], upper: &[u8], keys: &[Bytes]) -> bool {
    match (keys.first(), keys.last()) {
        (Some(first), Some(last)) => ranges_overlap(lower, upper, first, last),
        _ => false,
    }
}

fn sorted_intersect(a: &[Bytes], b: &[Bytes]) -> bool {
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => return true,
        }
    }

    false
}
