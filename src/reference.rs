use std::fmt::{Display, Formatter};
use std::ops::Neg;

/// A handle to a node in the [`Bdd`][crate::bdd::Bdd] node table, possibly
/// complemented.
///
/// The least significant bit marks negation and the remaining bits store the
/// node index. Two handles are equal iff they denote the same boolean
/// function, so set equality is handle equality.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct Ref(u32);

impl Ref {
    /// Creates a new reference to node `index`.
    pub const fn new(index: u32, negated: bool) -> Self {
        assert!(index < 0x8000_0000, "Node index out of range");
        Self((index << 1) | (negated as u32))
    }

    /// Creates a positive (non-negated) reference.
    pub const fn positive(index: u32) -> Self {
        Self::new(index, false)
    }

    /// Returns the index of the node this reference points to.
    #[inline]
    pub const fn index(self) -> u32 {
        self.0 >> 1
    }

    #[inline]
    pub const fn is_negated(self) -> bool {
        (self.0 & 1) != 0
    }

    /// Returns the reference with the negation bit cleared.
    #[inline]
    pub const fn regular(self) -> Self {
        Self(self.0 & !1)
    }

    /// Returns the raw underlying value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl Neg for Ref {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(self.0 ^ 1)
    }
}

impl Display for Ref {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}@{}",
            if self.is_negated() { "~" } else { "" },
            self.index()
        )
    }
}
