//! The decision-diagram manager.
//!
//! All functions live in one shared node table. Nodes are hash-consed, so
//! two handles denote the same boolean function iff they are equal, and
//! every operation is memoized in the computed table. Negation is a flag on
//! the edge (complement edges), so `apply_not` is free.
//!
//! Variables are 1-indexed and their index is their level: variable 1 is at
//! the root.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Debug;

use log::{debug, trace};

use crate::bitset::BitSet;
use crate::cache::Cache;
use crate::node::Node;
use crate::reference::Ref;
use crate::table::Table;
use crate::utils::{pairing2, pairing3, MyHash};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum OpKey {
    Ite(Ref, Ref, Ref),
    Exists(Ref, Ref),
    AndExists(Ref, Ref, Ref),
}

impl MyHash for OpKey {
    fn hash(&self) -> u64 {
        match *self {
            OpKey::Ite(f, g, h) => pairing2(1, pairing3(f.raw() as u64, g.raw() as u64, h.raw() as u64)),
            OpKey::Exists(f, c) => pairing2(2, pairing2(f.raw() as u64, c.raw() as u64)),
            OpKey::AndExists(f, g, c) => pairing2(3, pairing3(f.raw() as u64, g.raw() as u64, c.raw() as u64)),
        }
    }
}

pub struct Bdd {
    storage: RefCell<Table<Node>>,
    cache: RefCell<Cache<OpKey, Ref>>,
    pub zero: Ref,
    pub one: Ref,
}

impl Bdd {
    /// Create a manager whose node table starts with `2^bits` buckets.
    pub fn new(bits: usize) -> Self {
        let mut storage = Table::new(bits);

        // Allocate the terminal node:
        let one = storage.alloc();
        assert_eq!(one, 1); // Make sure the terminal node is (1).
        let one = Ref::positive(one as u32);
        let zero = -one;

        Self {
            storage: RefCell::new(storage),
            cache: RefCell::new(Cache::new(bits.clamp(10, 20))),
            zero,
            one,
        }
    }
}

impl Default for Bdd {
    fn default() -> Self {
        Bdd::new(16)
    }
}

impl Debug for Bdd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let storage = self.storage.borrow();
        f.debug_struct("Bdd")
            .field("capacity", &storage.capacity())
            .field("real_size", &storage.real_size())
            .field("buckets", &storage.num_buckets())
            .finish()
    }
}

impl Bdd {
    /// Number of live nodes in the table, terminal included.
    pub fn num_nodes(&self) -> usize {
        self.storage.borrow().real_size()
    }

    /// Computed-table `(hits, misses)`.
    pub fn cache_stats(&self) -> (usize, usize) {
        let cache = self.cache.borrow();
        (cache.hits(), cache.misses())
    }

    pub fn variable(&self, index: u32) -> u32 {
        self.storage.borrow().value(index as usize).variable
    }
    pub fn low(&self, index: u32) -> Ref {
        self.storage.borrow().value(index as usize).low
    }
    pub fn high(&self, index: u32) -> Ref {
        self.storage.borrow().value(index as usize).high
    }

    pub fn low_node(&self, node: Ref) -> Ref {
        let low = self.low(node.index());
        if node.is_negated() {
            -low
        } else {
            low
        }
    }
    pub fn high_node(&self, node: Ref) -> Ref {
        let high = self.high(node.index());
        if node.is_negated() {
            -high
        } else {
            high
        }
    }

    pub fn is_zero(&self, node: Ref) -> bool {
        node == self.zero
    }
    pub fn is_one(&self, node: Ref) -> bool {
        node == self.one
    }
    pub fn is_terminal(&self, node: Ref) -> bool {
        node.index() == self.one.index()
    }

    /// Level of the top variable of `node`; terminals sit below every variable.
    pub fn level(&self, node: Ref) -> u32 {
        if self.is_terminal(node) {
            u32::MAX
        } else {
            self.variable(node.index())
        }
    }

    pub fn mk_node(&self, v: u32, low: Ref, high: Ref) -> Ref {
        trace!("mk(v = {}, low = {}, high = {})", v, low, high);

        assert_ne!(v, 0, "Variable index should not be zero");

        // Handle canonicity
        if high.is_negated() {
            trace!("mk: restoring canonicity");
            return -self.mk_node(v, -low, -high);
        }

        // Handle duplicates
        if low == high {
            trace!("mk: duplicates {} == {}", low, high);
            return low;
        }

        debug_assert!(v < self.level(low) && v < self.level(high), "Variable order violated at x{}", v);

        let i = self.storage.borrow_mut().put(Node { variable: v, low, high });
        Ref::positive(i as u32)
    }

    pub fn mk_var(&self, v: u32) -> Ref {
        assert_ne!(v, 0, "Variable index should not be zero");
        self.mk_node(v, self.zero, self.one)
    }

    /// Conjunction of DIMACS-style literals (`-v` is the negation of `v`).
    pub fn cube(&self, literals: impl IntoIterator<Item = i32>) -> Ref {
        let mut literals = literals.into_iter().collect::<Vec<_>>();
        literals.sort_by_key(|&v| std::cmp::Reverse(v.abs()));
        let mut current = self.one;
        for lit in literals {
            assert_ne!(lit, 0, "Variable index should not be zero");
            let v = lit.unsigned_abs();
            if self.level(current) == v {
                // Repeated variable: same polarity is idempotent, opposite is a contradiction.
                let keeps = if lit < 0 { self.low_node(current) } else { self.high_node(current) };
                current = if lit < 0 {
                    self.mk_node(v, keeps, self.zero)
                } else {
                    self.mk_node(v, self.zero, keeps)
                };
                continue;
            }
            current = if lit < 0 {
                self.mk_node(v, current, self.zero)
            } else {
                self.mk_node(v, self.zero, current)
            };
        }
        current
    }

    pub fn top_cofactors(&self, node: Ref, v: u32) -> (Ref, Ref) {
        assert_ne!(v, 0, "Variable index should not be zero");

        if v < self.level(node) {
            return (node, node);
        }
        assert_eq!(v, self.level(node));
        (self.low_node(node), self.high_node(node))
    }

    /// Apply the ITE operation to the arguments.
    ///
    /// ```text
    /// ITE(x, y, z) = (x ∧ y) ∨ (¬x ∧ z)
    /// ```
    pub fn apply_ite(&self, f: Ref, g: Ref, h: Ref) -> Ref {
        trace!("apply_ite(f = {}, g = {}, h = {})", f, g, h);

        // Base cases:
        //   ite(1,G,H) => G
        //   ite(0,G,H) => H
        if self.is_one(f) {
            return g;
        }
        if self.is_zero(f) {
            return h;
        }

        // More base cases:
        //   ite(F,G,G) => G
        //   ite(F,1,0) => F
        //   ite(F,0,1) => ~F
        if g == h {
            return g;
        }
        if self.is_one(g) && self.is_zero(h) {
            return f;
        }
        if self.is_zero(g) && self.is_one(h) {
            return -f;
        }

        // Standard triples:
        //   ite(F,F,H) => ite(F,1,H)
        //   ite(F,G,F) => ite(F,G,0)
        //   ite(F,~F,H) => ite(F,0,H)
        //   ite(F,G,~F) => ite(F,G,1)
        if g == f {
            return self.apply_ite(f, self.one, h);
        }
        if h == f {
            return self.apply_ite(f, g, self.zero);
        }
        if g == -f {
            return self.apply_ite(f, self.zero, h);
        }
        if h == -f {
            return self.apply_ite(f, g, self.one);
        }

        let i = self.level(f);
        let j = self.level(g);
        let k = self.level(h);

        // Equivalent pairs (choose the one with the lowest variable on top):
        //   ite(F,1,H) == ite(H,1,F) == F ∨ H
        //   ite(F,G,0) == ite(G,F,0) == F ∧ G
        //   ite(F,G,1) == ite(~G,~F,1) == F -> G
        //   ite(F,0,H) == ite(~H,0,~F) == ~F ∧ H
        if self.is_one(g) && k < i {
            return self.apply_ite(h, self.one, f);
        }
        if self.is_zero(h) && j < i {
            return self.apply_ite(g, f, self.zero);
        }
        if self.is_one(h) && j < i {
            return self.apply_ite(-g, -f, self.one);
        }
        if self.is_zero(g) && k < i {
            return self.apply_ite(-h, self.zero, -f);
        }

        // Make sure the first two pointers (f and g) are regular (not negated)
        let (mut f, mut g, mut h) = (f, g, h);

        // ite(~F,G,H) => ite(F,H,G)
        if f.is_negated() {
            f = -f;
            std::mem::swap(&mut g, &mut h);
        }

        // ite(F,~G,H) => ~ite(F,G,~H)
        let mut n = false;
        if g.is_negated() {
            n = true;
            g = -g;
            h = -h;
        }

        let key = OpKey::Ite(f, g, h);
        let cached = self.cache.borrow_mut().get(&key);
        if let Some(res) = cached {
            trace!("cache: apply_ite(f = {}, g = {}, h = {}) -> {}", f, g, h, res);
            return if n { -res } else { res };
        }

        // Determine the top variable:
        let m = i.min(j).min(k);
        assert_ne!(m, u32::MAX);

        let (f0, f1) = self.top_cofactors(f, m);
        let (g0, g1) = self.top_cofactors(g, m);
        let (h0, h1) = self.top_cofactors(h, m);

        let e = self.apply_ite(f0, g0, h0);
        let t = self.apply_ite(f1, g1, h1);

        let res = self.mk_node(m, e, t);
        self.cache.borrow_mut().insert(key, res);

        if n {
            -res
        } else {
            res
        }
    }

    pub fn apply_not(&self, f: Ref) -> Ref {
        -f
    }

    pub fn apply_and(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, v, self.zero)
    }

    pub fn apply_or(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, self.one, v)
    }

    pub fn apply_xor(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, -v, v)
    }

    pub fn apply_eq(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, v, -v)
    }

    pub fn apply_imply(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(u, v, self.one)
    }

    /// `u ∧ ¬v`.
    pub fn apply_diff(&self, u: Ref, v: Ref) -> Ref {
        self.apply_ite(v, self.zero, u)
    }

    pub fn apply_and_many(&self, nodes: impl IntoIterator<Item = Ref>) -> Ref {
        let mut res = self.one;
        for node in nodes {
            res = self.apply_and(res, node);
            if self.is_zero(res) {
                break;
            }
        }
        res
    }

    pub fn apply_or_many(&self, nodes: impl IntoIterator<Item = Ref>) -> Ref {
        let mut res = self.zero;
        for node in nodes {
            res = self.apply_or(res, node);
            if self.is_one(res) {
                break;
            }
        }
        res
    }

    /// Advance a positive cube past every variable above `level`.
    fn skip_cube(&self, mut cube: Ref, level: u32) -> Ref {
        while self.level(cube) < level {
            cube = self.high_node(cube);
        }
        cube
    }

    /// Existential quantification `∃ vars(cube). f`.
    ///
    /// `cube` must be a positive cube, as built by [`Bdd::cube`] from
    /// positive literals.
    pub fn exists(&self, f: Ref, cube: Ref) -> Ref {
        if self.is_terminal(f) || self.is_one(cube) {
            return f;
        }

        let v = self.level(f);
        let cube = self.skip_cube(cube, v);
        if self.is_one(cube) {
            return f;
        }

        let key = OpKey::Exists(f, cube);
        let cached = self.cache.borrow_mut().get(&key);
        if let Some(res) = cached {
            return res;
        }

        let (f0, f1) = self.top_cofactors(f, v);
        let res = if self.level(cube) == v {
            let rest = self.high_node(cube);
            let r0 = self.exists(f0, rest);
            if self.is_one(r0) {
                self.one
            } else {
                let r1 = self.exists(f1, rest);
                self.apply_or(r0, r1)
            }
        } else {
            let r0 = self.exists(f0, cube);
            let r1 = self.exists(f1, cube);
            self.mk_node(v, r0, r1)
        };

        self.cache.borrow_mut().insert(key, res);
        res
    }

    /// Relational product `∃ vars(cube). f ∧ g`, without building `f ∧ g`.
    pub fn and_exists(&self, f: Ref, g: Ref, cube: Ref) -> Ref {
        if self.is_zero(f) || self.is_zero(g) || f == -g {
            return self.zero;
        }
        if self.is_one(cube) {
            return self.apply_and(f, g);
        }
        if self.is_one(f) {
            return self.exists(g, cube);
        }
        if self.is_one(g) || f == g {
            return self.exists(f, cube);
        }

        let m = self.level(f).min(self.level(g));
        let cube = self.skip_cube(cube, m);
        if self.is_one(cube) {
            return self.apply_and(f, g);
        }

        // Conjunction is commutative: order the operands for the cache.
        let (f, g) = if f <= g { (f, g) } else { (g, f) };

        let key = OpKey::AndExists(f, g, cube);
        let cached = self.cache.borrow_mut().get(&key);
        if let Some(res) = cached {
            return res;
        }

        let (f0, f1) = self.top_cofactors(f, m);
        let (g0, g1) = self.top_cofactors(g, m);

        let res = if self.level(cube) == m {
            let rest = self.high_node(cube);
            let r0 = self.and_exists(f0, g0, rest);
            if self.is_one(r0) {
                self.one
            } else {
                let r1 = self.and_exists(f1, g1, rest);
                self.apply_or(r0, r1)
            }
        } else {
            let r0 = self.and_exists(f0, g0, cube);
            let r1 = self.and_exists(f1, g1, cube);
            self.mk_node(m, r0, r1)
        };

        self.cache.borrow_mut().insert(key, res);
        res
    }

    /// Simultaneous variable renaming: every `x_v` becomes `x_{perm[v]}`.
    ///
    /// Variables outside `perm` (or mapped to themselves) are kept.
    pub fn permute(&self, f: Ref, perm: &[u32]) -> Ref {
        let mut cache = HashMap::new();
        self.permute_(f, perm, &mut cache)
    }

    fn permute_(&self, f: Ref, perm: &[u32], cache: &mut HashMap<Ref, Ref>) -> Ref {
        if self.is_terminal(f) {
            return f;
        }
        if f.is_negated() {
            return -self.permute_(-f, perm, cache);
        }
        if let Some(&res) = cache.get(&f) {
            return res;
        }

        let i = f.index();
        let v = self.variable(i);
        let low = self.permute_(self.low(i), perm, cache);
        let high = self.permute_(self.high(i), perm, cache);
        let target = perm.get(v as usize).copied().unwrap_or(v);
        let res = self.apply_ite(self.mk_var(target), high, low);

        cache.insert(f, res);
        res
    }

    /// Evaluate `f` under a total assignment of its variables.
    pub fn eval(&self, f: Ref, assignment: impl Fn(u32) -> bool) -> bool {
        let mut current = f;
        while !self.is_terminal(current) {
            let v = self.variable(current.index());
            current = if assignment(v) {
                self.high_node(current)
            } else {
                self.low_node(current)
            };
        }
        self.is_one(current)
    }

    /// Indices of all nodes reachable from `nodes`, terminal included.
    pub fn descendants(&self, nodes: impl IntoIterator<Item = Ref>) -> BitSet {
        let mut visited = BitSet::default();
        visited.insert(self.one.index() as usize);
        let mut stack: Vec<u32> = nodes.into_iter().map(|r| r.index()).collect();

        while let Some(i) = stack.pop() {
            if visited.insert(i as usize) {
                stack.push(self.low(i).index());
                stack.push(self.high(i).index());
            }
        }

        visited
    }

    /// Number of nodes in `f`, terminal included.
    pub fn size(&self, f: Ref) -> usize {
        self.descendants([f]).len()
    }

    /// Drop every node not reachable from `roots`.
    ///
    /// Any handle not reachable from `roots` is invalid afterwards. The
    /// computed table is flushed since freed indices get recycled.
    pub fn collect_garbage(&self, roots: &[Ref]) -> usize {
        self.cache.borrow_mut().clear();

        let alive = self.descendants(roots.iter().copied());
        let dropped = self.storage.borrow_mut().retain(|i| alive.contains(i));
        debug!(
            "Collected garbage: {} nodes alive, {} dropped",
            alive.len(),
            dropped
        );
        dropped
    }

    pub fn to_bracket_string(&self, node: Ref) -> String {
        if self.is_zero(node) {
            return "(0)".to_string();
        } else if self.is_one(node) {
            return "(1)".to_string();
        }

        let v = self.variable(node.index());
        let low = self.low_node(node);
        let high = self.high_node(node);

        format!(
            "{}:(x{}, {}, {})",
            node,
            v,
            self.to_bracket_string(high),
            self.to_bracket_string(low)
        )
    }
}
