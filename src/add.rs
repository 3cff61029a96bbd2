//! Algebraic decision diagrams: integer-valued functions over the same
//! variables as the [`Bdd`] manager.

use std::cell::RefCell;
use std::collections::HashMap;

use log::trace;

use crate::bdd::Bdd;
use crate::cache::Cache;
use crate::reference::Ref;
use crate::table::Table;
use crate::utils::{pairing2, pairing3, MyHash};

/// Handle to an ADD node. Equal handles denote equal functions.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct AddRef(u32);

/// Terminals have `variable == 0` and carry `value`.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
struct AddNode {
    variable: u32,
    low: AddRef,
    high: AddRef,
    value: i64,
}

impl MyHash for AddNode {
    fn hash(&self) -> u64 {
        pairing2(
            pairing3(self.variable as u64, self.low.0 as u64, self.high.0 as u64),
            self.value as u64,
        )
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AddOp {
    Plus,
    Times,
    Max,
    Min,
}

impl AddOp {
    fn eval(self, a: i64, b: i64) -> i64 {
        match self {
            AddOp::Plus => a.saturating_add(b),
            AddOp::Times => a.saturating_mul(b),
            AddOp::Max => a.max(b),
            AddOp::Min => a.min(b),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
struct ApplyKey(AddOp, AddRef, AddRef);

impl MyHash for ApplyKey {
    fn hash(&self) -> u64 {
        pairing3(self.0 as u64, self.1 .0 as u64, self.2 .0 as u64)
    }
}

pub struct AddManager {
    storage: RefCell<Table<AddNode>>,
    cache: RefCell<Cache<ApplyKey, AddRef>>,
}

impl Default for AddManager {
    fn default() -> Self {
        AddManager::new(12)
    }
}

impl AddManager {
    pub fn new(bits: usize) -> Self {
        Self {
            storage: RefCell::new(Table::new(bits)),
            cache: RefCell::new(Cache::new(bits.clamp(10, 20))),
        }
    }

    fn node(&self, f: AddRef) -> AddNode {
        *self.storage.borrow().value(f.0 as usize)
    }

    pub fn num_nodes(&self) -> usize {
        self.storage.borrow().real_size()
    }

    pub fn constant(&self, value: i64) -> AddRef {
        let i = self.storage.borrow_mut().put(AddNode {
            value,
            ..AddNode::default()
        });
        AddRef(i as u32)
    }

    /// The value of `f` if it is constant.
    pub fn value(&self, f: AddRef) -> Option<i64> {
        let node = self.node(f);
        (node.variable == 0).then_some(node.value)
    }

    fn level(&self, f: AddRef) -> u32 {
        match self.node(f).variable {
            0 => u32::MAX,
            v => v,
        }
    }

    pub fn mk_node(&self, v: u32, low: AddRef, high: AddRef) -> AddRef {
        assert_ne!(v, 0, "Variable index should not be zero");
        if low == high {
            return low;
        }
        let i = self.storage.borrow_mut().put(AddNode {
            variable: v,
            low,
            high,
            value: 0,
        });
        AddRef(i as u32)
    }

    /// `f ? then_value : else_value`, for a function `f` of `bdd`.
    pub fn from_bdd(&self, bdd: &Bdd, f: Ref, then_value: i64, else_value: i64) -> AddRef {
        let mut cache = HashMap::new();
        self.from_bdd_(bdd, f, then_value, else_value, &mut cache)
    }

    fn from_bdd_(
        &self,
        bdd: &Bdd,
        f: Ref,
        then_value: i64,
        else_value: i64,
        cache: &mut HashMap<Ref, AddRef>,
    ) -> AddRef {
        if bdd.is_one(f) {
            return self.constant(then_value);
        }
        if bdd.is_zero(f) {
            return self.constant(else_value);
        }
        if let Some(&res) = cache.get(&f) {
            return res;
        }

        let v = bdd.variable(f.index());
        let low = self.from_bdd_(bdd, bdd.low_node(f), then_value, else_value, cache);
        let high = self.from_bdd_(bdd, bdd.high_node(f), then_value, else_value, cache);
        let res = self.mk_node(v, low, high);

        cache.insert(f, res);
        res
    }

    pub fn apply(&self, op: AddOp, f: AddRef, g: AddRef) -> AddRef {
        if let (Some(a), Some(b)) = (self.value(f), self.value(g)) {
            return self.constant(op.eval(a, b));
        }

        let key = ApplyKey(op, f, g);
        let cached = self.cache.borrow_mut().get(&key);
        if let Some(res) = cached {
            trace!("cache: apply({:?}, {:?}, {:?}) -> {:?}", op, f, g, res);
            return res;
        }

        let m = self.level(f).min(self.level(g));
        let (f0, f1) = self.top_cofactors(f, m);
        let (g0, g1) = self.top_cofactors(g, m);
        let low = self.apply(op, f0, g0);
        let high = self.apply(op, f1, g1);
        let res = self.mk_node(m, low, high);

        self.cache.borrow_mut().insert(key, res);
        res
    }

    fn top_cofactors(&self, f: AddRef, v: u32) -> (AddRef, AddRef) {
        if v < self.level(f) {
            return (f, f);
        }
        let node = self.node(f);
        (node.low, node.high)
    }

    pub fn eval(&self, f: AddRef, assignment: impl Fn(u32) -> bool) -> i64 {
        let mut node = self.node(f);
        while node.variable != 0 {
            node = self.node(if assignment(node.variable) { node.high } else { node.low });
        }
        node.value
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_constants_are_shared() {
        let add = AddManager::default();
        assert_eq!(add.constant(5), add.constant(5));
        assert_ne!(add.constant(5), add.constant(-5));
        assert_eq!(add.value(add.constant(-1)), Some(-1));
    }

    #[test]
    fn test_from_bdd_and_eval() {
        let bdd = Bdd::default();
        let add = AddManager::default();

        let f = bdd.apply_xor(bdd.mk_var(1), bdd.mk_var(2));
        let a = add.from_bdd(&bdd, f, 7, 0);
        assert_eq!(add.eval(a, |v| v == 1), 7);
        assert_eq!(add.eval(a, |_| true), 0);
        assert_eq!(add.value(a), None);
    }

    #[test]
    fn test_apply_ops() {
        let bdd = Bdd::default();
        let add = AddManager::default();

        let a = add.from_bdd(&bdd, bdd.mk_var(1), 3, -1);
        let b = add.from_bdd(&bdd, bdd.mk_var(2), 10, 0);

        let sum = add.apply(AddOp::Plus, a, b);
        assert_eq!(add.eval(sum, |_| true), 13);
        assert_eq!(add.eval(sum, |v| v == 2), 9);

        let max = add.apply(AddOp::Max, a, add.constant(0));
        assert_eq!(add.eval(max, |_| false), 0);
        assert_eq!(add.eval(max, |_| true), 3);

        let min = add.apply(AddOp::Min, a, b);
        assert_eq!(add.eval(min, |v| v == 1), 0);

        let prod = add.apply(AddOp::Times, a, add.constant(2));
        assert_eq!(add.eval(prod, |_| false), -2);

        // Same operands, same handle.
        assert_eq!(add.apply(AddOp::Plus, a, b), sum);
    }
}
