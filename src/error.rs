use core::fmt;

/// A positional access fell outside the live entries of an
/// [`IndexedMap`](crate::IndexedMap).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexOutOfRange {
    /// The requested position.
    pub index: usize,
    /// Number of live entries at the time of the access.
    pub len: usize,
}

impl fmt::Display for IndexOutOfRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "index out of range: the len is {} but the index is {}",
            self.len, self.index
        )
    }
}

impl core::error::Error for IndexOutOfRange {}
