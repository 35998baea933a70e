//! Abstract values and per-point environments.
//!
//! An [`Env`] maps every local of one body to a [`Slot`]. Values form a flat
//! lattice: concrete values join with themselves, anything else joins to
//! `Unknown`. On top of the per-variable values the environment carries a
//! small set of learned equality relations between still-unknown variables,
//! recorded when control enters a branch guarded by `==`, `!=`, or `^`.

use std::collections::BTreeSet;

use vigil_hir::body::LocalId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Value {
    Unknown,
    Bool(bool),
    Null,
    NotNull,
    /// The variable currently holds exactly the value of another variable.
    /// Resolved eagerly against the owning environment; never compared
    /// across environments unresolved.
    Alias(LocalId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Tracked(Value),
    /// The variable is captured by a closure that assigns it. Reads yield
    /// `Unknown`, later assignments do not resurrect tracking, and the state
    /// survives joins.
    Invalidated,
}

/// Learned relation between two variables whose values are both unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Relation {
    Eq,
    Ne,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Env {
    slots: Vec<Slot>,
    /// Pairs are stored with the smaller `LocalId` first.
    relations: BTreeSet<(LocalId, LocalId, Relation)>,
}

impl Env {
    /// Environment at body entry: every local unknown, nothing invalidated.
    pub fn unknown(locals: usize) -> Self {
        Self {
            slots: vec![Slot::Tracked(Value::Unknown); locals],
            relations: BTreeSet::new(),
        }
    }

    pub fn is_invalidated(&self, var: LocalId) -> bool {
        matches!(self.slots[var.index()], Slot::Invalidated)
    }

    /// The concrete value the variable holds, with aliases resolved. Never
    /// returns `Value::Alias`.
    pub fn value_of(&self, var: LocalId) -> Value {
        self.resolved(var.index())
    }

    /// Resolves a value that may be an alias against this environment.
    pub fn resolve(&self, value: Value) -> Value {
        match value {
            Value::Alias(var) => self.resolved(var.index()),
            other => other,
        }
    }

    /// The variable at the end of the alias chain starting at `var`.
    pub fn alias_root(&self, var: LocalId) -> LocalId {
        let mut root = var;
        let mut hops = 0;
        while let Slot::Tracked(Value::Alias(next)) = self.slots[root.index()] {
            root = next;
            hops += 1;
            if hops > self.slots.len() {
                break;
            }
        }
        root
    }

    /// A real assignment `var = value`.
    ///
    /// Other variables aliasing `var` keep the value it held until now, the
    /// learned relations mentioning `var` are dropped, and an invalidated
    /// slot stays invalidated.
    pub fn assign(&mut self, var: LocalId, value: Value) {
        let old = self.resolved(var.index());
        self.materialize_aliases_of(var.index(), old);
        self.drop_relations_of(var);
        if matches!(self.slots[var.index()], Slot::Invalidated) {
            return;
        }
        // Stored aliases always point at a chain root, so chains stay one
        // hop long and a self-alias cannot form.
        let value = match value {
            Value::Alias(target) => {
                let root = self.alias_root(target);
                if root == var {
                    old
                } else if self.is_invalidated(root) {
                    Value::Unknown
                } else {
                    Value::Alias(root)
                }
            }
            other => other,
        };
        self.slots[var.index()] = Slot::Tracked(value);
    }

    /// Marks `var` untrackable for the rest of the body.
    pub fn invalidate(&mut self, var: LocalId) {
        let old = self.resolved(var.index());
        self.materialize_aliases_of(var.index(), old);
        self.drop_relations_of(var);
        self.slots[var.index()] = Slot::Invalidated;
    }

    /// Branch-entry refinement: assert that `var` holds `value` on this
    /// path. Writes through the alias chain so copies observe it; does not
    /// materialize aliases and does not touch relations.
    pub fn refine(&mut self, var: LocalId, value: Value) {
        let mut idx = var.index();
        let mut hops = 0;
        while let Slot::Tracked(Value::Alias(next)) = self.slots[idx] {
            idx = next.index();
            hops += 1;
            if hops > self.slots.len() {
                return;
            }
        }
        if let Slot::Tracked(_) = self.slots[idx] {
            self.slots[idx] = Slot::Tracked(value);
        }
    }

    pub fn record_relation(&mut self, a: LocalId, b: LocalId, relation: Relation) {
        if a == b || self.is_invalidated(a) || self.is_invalidated(b) {
            return;
        }
        let (a, b) = if a <= b { (a, b) } else { (b, a) };
        self.relations.insert((a, b, relation));
    }

    pub fn relation_between(&self, a: LocalId, b: LocalId) -> Option<Relation> {
        let (a, b) = if a <= b { (a, b) } else { (b, a) };
        if self.relations.contains(&(a, b, Relation::Eq)) {
            Some(Relation::Eq)
        } else if self.relations.contains(&(a, b, Relation::Ne)) {
            Some(Relation::Ne)
        } else {
            None
        }
    }

    /// All relations involving `var`, as (other variable, relation).
    pub fn relations_with(&self, var: LocalId) -> Vec<(LocalId, Relation)> {
        self.relations
            .iter()
            .filter_map(|&(a, b, rel)| {
                if a == var {
                    Some((b, rel))
                } else if b == var {
                    Some((a, rel))
                } else {
                    None
                }
            })
            .collect()
    }

    /// Pointwise lattice join. Identical slots survive as-is (including
    /// identical alias links); differing slots compare their resolved
    /// values, agreeing concrete values survive, anything else goes to
    /// `Unknown`. Invalidation wins over everything. Relations keep only
    /// what both sides learned.
    pub fn join(&self, other: &Env) -> Env {
        debug_assert_eq!(self.slots.len(), other.slots.len());
        let slots = self
            .slots
            .iter()
            .zip(&other.slots)
            .enumerate()
            .map(|(idx, (a, b))| match (a, b) {
                (Slot::Invalidated, _) | (_, Slot::Invalidated) => Slot::Invalidated,
                (Slot::Tracked(va), Slot::Tracked(vb)) => {
                    if va == vb {
                        Slot::Tracked(*va)
                    } else {
                        let ra = self.resolved(idx);
                        let rb = other.resolved(idx);
                        Slot::Tracked(if ra == rb { ra } else { Value::Unknown })
                    }
                }
            })
            .collect();
        let relations = self
            .relations
            .intersection(&other.relations)
            .cloned()
            .collect();
        Env { slots, relations }
    }

    fn resolved(&self, idx: usize) -> Value {
        let mut idx = idx;
        let mut hops = 0;
        loop {
            match self.slots[idx] {
                Slot::Invalidated => return Value::Unknown,
                Slot::Tracked(Value::Alias(next)) => {
                    idx = next.index();
                    hops += 1;
                    if hops > self.slots.len() {
                        return Value::Unknown;
                    }
                }
                Slot::Tracked(value) => return value,
            }
        }
    }

    fn materialize_aliases_of(&mut self, target: usize, old: Value) {
        for idx in 0..self.slots.len() {
            if idx == target {
                continue;
            }
            if let Slot::Tracked(Value::Alias(_)) = self.slots[idx] {
                if self.root_index(idx) == target {
                    self.slots[idx] = Slot::Tracked(old);
                }
            }
        }
    }

    fn root_index(&self, idx: usize) -> usize {
        let mut idx = idx;
        let mut hops = 0;
        while let Slot::Tracked(Value::Alias(next)) = self.slots[idx] {
            idx = next.index();
            hops += 1;
            if hops > self.slots.len() {
                break;
            }
        }
        idx
    }

    fn drop_relations_of(&mut self, var: LocalId) {
        self.relations.retain(|&(a, b, _)| a != var && b != var);
    }
}
