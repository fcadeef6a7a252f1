use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

/// Random number generator threaded through every stochastic operation.
pub type SimRng = rand::rngs::StdRng;

/// Create a reproducible generator from a seed.
pub fn seeded_rng(seed: u64) -> SimRng {
    SimRng::seed_from_u64(seed)
}

/// Derive a child seed from a base seed and a path of identifiers
/// (splitmix64 finaliser applied per component).
pub fn derive_seed(base: u64, parts: &[u64]) -> u64 {
    let mut z = base;
    for part in parts {
        z = z.wrapping_add(0x9e3779b97f4a7c15).wrapping_add(*part);
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
        z ^= z >> 31;
    }
    z
}

/// FNV-1a hash of a label, used to fold names into seeds.
pub fn hash_label(label: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in label.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// One discrete variable of a space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub labels: Vec<String>,
}

impl Dimension {
    pub fn new(name: impl Into<String>, labels: Vec<String>) -> Self {
        Self {
            name: name.into(),
            labels,
        }
    }

    /// Boolean variable with values `[False, True]`.
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, vec!["False".to_string(), "True".to_string()])
    }

    pub fn cardinality(&self) -> usize {
        self.labels.len()
    }
}

/// Ordered set of discrete variables with mixed-radix indexing.
/// The last variable varies fastest.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Space {
    dims: Vec<Dimension>,
}

impl Space {
    pub fn new(dims: Vec<Dimension>) -> Self {
        Self { dims }
    }

    pub fn dims(&self) -> &[Dimension] {
        &self.dims
    }

    pub fn len(&self) -> usize {
        self.dims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dims.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.dims.iter().map(|d| d.name.as_str())
    }

    pub fn cardinalities(&self) -> Vec<usize> {
        self.dims.iter().map(Dimension::cardinality).collect()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.dims.iter().position(|d| d.name == name)
    }

    /// Number of joint assignments (1 for an empty space).
    pub fn size(&self) -> usize {
        self.dims.iter().map(Dimension::cardinality).product()
    }

    pub fn index_of(&self, values: &[usize]) -> usize {
        debug_assert_eq!(values.len(), self.dims.len());
        self.dims
            .iter()
            .zip(values)
            .fold(0, |index, (dim, &v)| index * dim.cardinality() + v)
    }

    pub fn values_at(&self, mut index: usize) -> Vec<usize> {
        let mut values = vec![0; self.dims.len()];
        for (slot, dim) in values.iter_mut().zip(&self.dims).rev() {
            *slot = index % dim.cardinality();
            index /= dim.cardinality();
        }
        values
    }

    /// Concatenation of two spaces, `self` first.
    pub fn concat(&self, other: &Space) -> Space {
        let mut dims = self.dims.clone();
        dims.extend(other.dims.iter().cloned());
        Space { dims }
    }

    /// Render an assignment as `C0=True, C1=False`.
    pub fn describe(&self, values: &[usize]) -> String {
        self.dims
            .iter()
            .zip(values)
            .map(|(dim, &v)| {
                let label = dim.labels.get(v).map(String::as_str).unwrap_or("?");
                format!("{}={}", dim.name, label)
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Value indices of the chance variables, in state-space order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct State(pub Vec<usize>);

/// Value indices of the decision variables, in action-space order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Action(pub Vec<usize>);

impl Deref for State {
    type Target = [usize];

    fn deref(&self) -> &[usize] {
        &self.0
    }
}

impl Deref for Action {
    type Target = [usize];

    fn deref(&self) -> &[usize] {
        &self.0
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}
