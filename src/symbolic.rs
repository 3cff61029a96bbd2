//! BDD-backed state sets.
//!
//! Each task variable with domain `d` is encoded by `ceil(log2(d))` boolean
//! variables holding the binary code of its value, most significant bit
//! first. Every bit has a pre-state copy and a post-state copy, interleaved
//! so that global bit `j` is BDD variable `2j + 1` (pre) and `2j + 2`
//! (post). Renaming between the copies is a swap of neighbours.

use std::cell::RefCell;

use log::debug;
use num_bigint::BigUint;

use crate::add::{AddManager, AddOp, AddRef};
use crate::bdd::Bdd;
use crate::packer::PackedState;
use crate::reference::Ref;
use crate::session::Session;
use crate::sets::StateSets;
use crate::task::{Effect, FactPair};
use crate::utils::bits_for_range;

/// Transition relation over pre- and post-state variables.
#[derive(Debug, Clone)]
pub struct SymRelation {
    tr: Ref,
    ops: Vec<usize>,
}

impl SymRelation {
    pub fn bdd(&self) -> Ref {
        self.tr
    }
    pub fn operators(&self) -> &[usize] {
        &self.ops
    }
}

pub struct SymVariables<'a> {
    session: &'a Session,
    bdd: Bdd,
    /// Global bit indices of each task variable, most significant first.
    bits: Vec<Vec<usize>>,
    num_bits: usize,
    valid: Ref,
    pre_cube: Ref,
    post_cube: Ref,
    swap: Vec<u32>,
    /// Relations handed out so far; they survive garbage collection.
    pinned: RefCell<Vec<Ref>>,
}

fn pre_var(bit: usize) -> u32 {
    2 * bit as u32 + 1
}

fn post_var(bit: usize) -> u32 {
    2 * bit as u32 + 2
}

impl<'a> SymVariables<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self::with_table_bits(session, 16)
    }

    /// Like [`SymVariables::new`], with `2^bits` initial buckets in the node table.
    pub fn with_table_bits(session: &'a Session, bits: usize) -> Self {
        let task = session.task();

        let mut next_bit = 0;
        let encoding: Vec<Vec<usize>> = task
            .variables
            .iter()
            .map(|variable| {
                let width = bits_for_range(variable.domain) as usize;
                let range = next_bit..next_bit + width;
                next_bit += width;
                range.collect()
            })
            .collect();
        let num_bits = next_bit;

        let bdd = Bdd::new(bits);
        let pre_cube = bdd.cube((0..num_bits).map(|b| pre_var(b) as i32));
        let post_cube = bdd.cube((0..num_bits).map(|b| post_var(b) as i32));
        let mut swap = vec![0; 2 * num_bits + 1];
        for b in 0..num_bits {
            swap[pre_var(b) as usize] = post_var(b);
            swap[post_var(b) as usize] = pre_var(b);
        }

        let mut vars = Self {
            session,
            bdd,
            bits: encoding,
            num_bits,
            valid: Ref::positive(0),
            pre_cube,
            post_cube,
            swap,
            pinned: RefCell::new(Vec::new()),
        };
        vars.valid = vars.build_valid();

        debug!(
            "Symbolic encoding: {} variables on {} bits, valid states: {} nodes",
            task.num_variables(),
            num_bits,
            vars.bdd.size(vars.valid)
        );
        vars
    }

    fn build_valid(&self) -> Ref {
        let task = self.session.task();
        let mut valid = self.bdd.one;

        // Exclude the unused codes of each variable.
        for (var, variable) in task.variables.iter().enumerate() {
            if variable.domain.is_power_of_two() {
                continue;
            }
            let in_range = self
                .bdd
                .apply_or_many((0..variable.domain).map(|v| self.fact(FactPair::new(var, v as i32))));
            valid = self.bdd.apply_and(valid, in_range);
        }

        for (a, b) in self.session.mutexes().pairs() {
            let both = self.bdd.apply_and(self.fact(a), self.fact(b));
            valid = self.bdd.apply_diff(valid, both);
        }

        valid
    }

    pub fn bdd(&self) -> &Bdd {
        &self.bdd
    }

    pub fn num_bits(&self) -> usize {
        self.num_bits
    }

    fn code(&self, fact: FactPair, var_of: fn(usize) -> u32) -> Ref {
        let bits = &self.bits[fact.var];
        let width = bits.len();
        self.bdd.cube(bits.iter().enumerate().map(|(k, &b)| {
            let v = var_of(b) as i32;
            if (fact.value >> (width - 1 - k)) & 1 == 1 {
                v
            } else {
                -v
            }
        }))
    }

    /// The fact `var = value` over pre-state variables.
    pub fn fact(&self, fact: FactPair) -> Ref {
        self.code(fact, pre_var)
    }

    /// The fact `var = value` over post-state variables.
    pub fn post_fact(&self, fact: FactPair) -> Ref {
        self.code(fact, post_var)
    }

    fn frame(&self, var: usize) -> Ref {
        self.bdd.apply_and_many(
            self.bits[var]
                .iter()
                .map(|&b| self.bdd.apply_eq(self.bdd.mk_var(pre_var(b)), self.bdd.mk_var(post_var(b)))),
        )
    }

    /// Transition relation of one operator.
    pub fn operator_relation(&self, op: usize) -> Ref {
        let task = self.session.task();
        let operator = &task.operators[op];

        let mut tr = self
            .bdd
            .apply_and_many(operator.preconditions.iter().map(|&f| self.fact(f)));

        for var in (0..task.num_variables()).rev() {
            let effects: Vec<&Effect> = operator.effects.iter().filter(|e| e.fact.var == var).collect();
            let part = if effects.is_empty() {
                self.frame(var)
            } else {
                let mut part = self.bdd.one;
                let mut any_fires = self.bdd.zero;
                for effect in effects {
                    let fires = self
                        .bdd
                        .apply_and_many(effect.conditions.iter().map(|&f| self.fact(f)));
                    part = self
                        .bdd
                        .apply_and(part, self.bdd.apply_imply(fires, self.post_fact(effect.fact)));
                    any_fires = self.bdd.apply_or(any_fires, fires);
                }
                // Variables whose effects do not fire keep their value.
                self.bdd.apply_and(part, self.bdd.apply_imply(-any_fires, self.frame(var)))
            };
            tr = self.bdd.apply_and(tr, part);
            if self.bdd.is_zero(tr) {
                break;
            }
        }

        tr
    }

    fn assignment(&self, state: &[i32]) -> Vec<bool> {
        let mut assignment = vec![false; 2 * self.num_bits + 1];
        for (var, bits) in self.bits.iter().enumerate() {
            let width = bits.len();
            for (k, &b) in bits.iter().enumerate() {
                assignment[pre_var(b) as usize] = (state[var] >> (width - 1 - k)) & 1 == 1;
            }
        }
        assignment
    }

    /// Integer-valued view: states of `set` map to `then_value`, others to `else_value`.
    pub fn to_add(&self, add: &AddManager, set: Ref, then_value: i64, else_value: i64) -> AddRef {
        add.from_bdd(&self.bdd, set, then_value, else_value)
    }

    /// Evaluate `f` on a concrete state.
    pub fn eval_add(&self, add: &AddManager, f: AddRef, state: &[i32]) -> i64 {
        let assignment = self.assignment(state);
        add.eval(f, |v| assignment[v as usize])
    }

    /// Pointwise maximum of `f` and the indicator of `set` scaled to `value`.
    pub fn add_max_with(&self, add: &AddManager, f: AddRef, set: Ref, value: i64) -> AddRef {
        let g = self.to_add(add, set, value, i64::MIN);
        add.apply(AddOp::Max, f, g)
    }
}

impl<'a> StateSets for SymVariables<'a> {
    type Set = Ref;
    type Relation = SymRelation;

    fn session(&self) -> &Session {
        self.session
    }

    fn empty(&self) -> Ref {
        self.bdd.zero
    }

    fn valid_states(&self) -> Ref {
        self.valid
    }

    fn from_state(&self, state: &[i32]) -> Ref {
        self.bdd.apply_and_many(
            state
                .iter()
                .enumerate()
                .map(|(var, &value)| self.fact(FactPair::new(var, value))),
        )
    }

    fn from_partial_state(&self, facts: &[FactPair]) -> Ref {
        let partial = self
            .bdd
            .apply_and_many(facts.iter().filter(|f| !f.is_undefined()).map(|&f| self.fact(f)));
        self.bdd.apply_and(partial, self.valid)
    }

    fn union(&self, a: &Ref, b: &Ref) -> Ref {
        self.bdd.apply_or(*a, *b)
    }

    fn intersect(&self, a: &Ref, b: &Ref) -> Ref {
        self.bdd.apply_and(*a, *b)
    }

    fn subtract(&self, a: &Ref, b: &Ref) -> Ref {
        self.bdd.apply_diff(*a, *b)
    }

    fn exists(&self, set: &Ref, vars: &[usize]) -> Ref {
        let cube = self
            .bdd
            .cube(vars.iter().flat_map(|&var| self.bits[var].iter().map(|&b| pre_var(b) as i32)));
        let projected = self.bdd.exists(*set, cube);
        self.bdd.apply_and(projected, self.valid)
    }

    fn is_empty(&self, set: &Ref) -> bool {
        self.bdd.is_zero(*set)
    }

    fn contains(&self, set: &Ref, state: &PackedState) -> bool {
        let values = self.session.packer().unpack(state);
        let assignment = self.assignment(&values);
        self.bdd.eval(*set, |v| assignment[v as usize])
    }

    fn pick_state(&self, set: &Ref) -> Option<Vec<i32>> {
        let path = self.bdd.one_sat(*set)?;
        // Bits skipped by the path are don't-cares; leave them at 0.
        let mut assignment = vec![false; 2 * self.num_bits + 1];
        for lit in path {
            assignment[lit.unsigned_abs() as usize] = lit > 0;
        }
        let state = self
            .bits
            .iter()
            .map(|bits| {
                bits.iter()
                    .fold(0, |acc, &b| (acc << 1) | assignment[pre_var(b) as usize] as i32)
            })
            .collect();
        Some(state)
    }

    fn count_states(&self, set: &Ref) -> BigUint {
        self.bdd.sat_count(*set, 2 * self.num_bits) >> self.num_bits
    }

    fn size(&self, set: &Ref) -> usize {
        self.bdd.size(*set)
    }

    fn relation(&self, ops: &[usize]) -> SymRelation {
        let tr = self
            .bdd
            .apply_or_many(ops.iter().map(|&op| self.operator_relation(op)));
        self.pinned.borrow_mut().push(tr);
        SymRelation { tr, ops: ops.to_vec() }
    }

    fn image(&self, set: &Ref, relation: &SymRelation) -> Ref {
        let next = self.bdd.and_exists(*set, relation.tr, self.pre_cube);
        let next = self.bdd.permute(next, &self.swap);
        self.bdd.apply_and(next, self.valid)
    }

    fn preimage(&self, set: &Ref, relation: &SymRelation) -> Ref {
        let next = self.bdd.permute(*set, &self.swap);
        let prev = self.bdd.and_exists(relation.tr, next, self.post_cube);
        self.bdd.apply_and(prev, self.valid)
    }

    fn num_nodes(&self) -> usize {
        self.bdd.num_nodes()
    }

    fn collect_garbage(&self, live: &[Ref]) -> usize {
        let mut roots = live.to_vec();
        roots.extend(self.pinned.borrow().iter().copied());
        roots.extend([self.valid, self.pre_cube, self.post_cube]);
        self.bdd.collect_garbage(&roots)
    }
}
