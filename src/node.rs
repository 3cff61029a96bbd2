use crate::reference::Ref;
use crate::utils::{pairing3, MyHash};

/// A decision node: `if variable then high else low`.
///
/// The terminal has `variable == 0`. `high` is never complemented; the
/// manager pushes negation onto the incoming edge instead.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Node {
    pub variable: u32,
    pub low: Ref,
    pub high: Ref,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            variable: 0,
            low: Ref::positive(0),
            high: Ref::positive(0),
        }
    }
}

impl MyHash for Node {
    fn hash(&self) -> u64 {
        pairing3(
            self.variable as u64,
            self.low.raw() as u64,
            self.high.raw() as u64,
        )
    }
}
