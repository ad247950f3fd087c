use crate::error::SolverError;
use ahash::{AHashMap, AHashSet};
use std::fmt;

/// Handle of a term inside a [`Context`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TermId(pub(crate) u32);

impl TermId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle of a declared variable inside a [`Context`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub(crate) u32);

impl VarId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sort {
    Bool,
    Int,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    /// `phase` is the value taken when no formula constrains the variable.
    Bool { phase: bool },
    Int { lo: i64, hi: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub kind: VarKind,
    pub term: TermId,
}

/// A structurally unique term. Children are always interned before their parents.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TermNode {
    Bool(bool),
    Int(i64),
    Var(VarId),
    Not(TermId),
    And(Vec<TermId>),
    Or(Vec<TermId>),
    Xor(TermId, TermId),
    Ite(TermId, TermId, TermId),
    Eq(TermId, TermId),
    Add(Vec<TermId>),
    Mul(i64, TermId),
}

/// Hash-consing term store shared by every encoder of one repair request.
///
/// Constructors fold constants and normalise operands, so structurally equal
/// formulas always come back as the same [`TermId`].
#[derive(Debug, Clone)]
pub struct Context {
    nodes: Vec<TermNode>,
    sorts: Vec<Sort>,
    interned: AHashMap<TermNode, TermId>,
    variables: Vec<Variable>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        let mut ctx = Self {
            nodes: Vec::new(),
            sorts: Vec::new(),
            interned: AHashMap::new(),
            variables: Vec::new(),
        };
        // #0 is false and #1 is true.
        ctx.intern(TermNode::Bool(false), Sort::Bool);
        ctx.intern(TermNode::Bool(true), Sort::Bool);
        ctx
    }

    fn intern(&mut self, node: TermNode, sort: Sort) -> TermId {
        if let Some(&id) = self.interned.get(&node) {
            return id;
        }
        let id = TermId(self.nodes.len() as u32);
        self.nodes.push(node.clone());
        self.sorts.push(sort);
        self.interned.insert(node, id);
        id
    }

    pub fn node(&self, term: TermId) -> &TermNode {
        &self.nodes[term.index()]
    }

    pub fn sort(&self, term: TermId) -> Sort {
        self.sorts[term.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn variable(&self, var: VarId) -> &Variable {
        &self.variables[var.index()]
    }

    pub fn as_bool(&self, term: TermId) -> Option<bool> {
        match self.node(term) {
            TermNode::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self, term: TermId) -> Option<i64> {
        match self.node(term) {
            TermNode::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_var(&self, term: TermId) -> Option<VarId> {
        match self.node(term) {
            TermNode::Var(v) => Some(*v),
            _ => None,
        }
    }

    pub fn bool_const(&mut self, value: bool) -> TermId {
        self.intern(TermNode::Bool(value), Sort::Bool)
    }

    pub fn tt(&mut self) -> TermId {
        self.bool_const(true)
    }

    pub fn ff(&mut self) -> TermId {
        self.bool_const(false)
    }

    pub fn int(&mut self, value: i64) -> TermId {
        self.intern(TermNode::Int(value), Sort::Int)
    }

    /// Declares a fresh boolean variable. Names are informational and need not be unique.
    pub fn bool_var(&mut self, name: impl Into<String>, phase: bool) -> TermId {
        self.declare(name.into(), VarKind::Bool { phase }, Sort::Bool)
    }

    /// Declares a fresh integer variable ranging over `lo..=hi`.
    pub fn int_var(
        &mut self,
        name: impl Into<String>,
        lo: i64,
        hi: i64,
    ) -> Result<TermId, SolverError> {
        let name = name.into();
        if lo > hi {
            return Err(SolverError::EmptyDomain { name, lo, hi });
        }
        Ok(self.declare(name, VarKind::Int { lo, hi }, Sort::Int))
    }

    fn declare(&mut self, name: String, kind: VarKind, sort: Sort) -> TermId {
        let var = VarId(self.variables.len() as u32);
        let term = self.intern(TermNode::Var(var), sort);
        self.variables.push(Variable { name, kind, term });
        term
    }

    pub fn not(&mut self, term: TermId) -> TermId {
        match self.node(term) {
            TermNode::Bool(b) => {
                let b = !*b;
                self.bool_const(b)
            }
            TermNode::Not(inner) => *inner,
            _ => self.intern(TermNode::Not(term), Sort::Bool),
        }
    }

    pub fn and(&mut self, terms: impl IntoIterator<Item = TermId>) -> TermId {
        self.junction(terms, true)
    }

    pub fn or(&mut self, terms: impl IntoIterator<Item = TermId>) -> TermId {
        self.junction(terms, false)
    }

    /// Shared folding for AND (`conjunction = true`) and OR.
    fn junction(&mut self, terms: impl IntoIterator<Item = TermId>, conjunction: bool) -> TermId {
        let neutral = conjunction;
        let mut operands = Vec::new();
        for term in terms {
            match self.node(term) {
                TermNode::Bool(b) if *b == neutral => {}
                TermNode::Bool(_) => return self.bool_const(!neutral),
                TermNode::And(inner) if conjunction => operands.extend_from_slice(inner),
                TermNode::Or(inner) if !conjunction => operands.extend_from_slice(inner),
                _ => operands.push(term),
            }
        }
        operands.sort_unstable();
        operands.dedup();

        // x and !x
        let complementary = operands.iter().any(|&t| match self.node(t) {
            TermNode::Not(inner) => operands.binary_search(inner).is_ok(),
            _ => false,
        });
        if complementary {
            return self.bool_const(!neutral);
        }

        match operands.len() {
            0 => self.bool_const(neutral),
            1 => operands[0],
            _ if conjunction => self.intern(TermNode::And(operands), Sort::Bool),
            _ => self.intern(TermNode::Or(operands), Sort::Bool),
        }
    }

    pub fn implies(&mut self, premise: TermId, conclusion: TermId) -> TermId {
        let negated = self.not(premise);
        self.or([negated, conclusion])
    }

    pub fn xor(&mut self, lhs: TermId, rhs: TermId) -> TermId {
        if lhs == rhs {
            return self.ff();
        }
        match (self.as_bool(lhs), self.as_bool(rhs)) {
            (Some(a), Some(b)) => self.bool_const(a != b),
            (Some(false), None) => rhs,
            (None, Some(false)) => lhs,
            (Some(true), None) => self.not(rhs),
            (None, Some(true)) => self.not(lhs),
            (None, None) => {
                let (a, b) = if lhs < rhs { (lhs, rhs) } else { (rhs, lhs) };
                self.intern(TermNode::Xor(a, b), Sort::Bool)
            }
        }
    }

    pub fn ite(&mut self, cond: TermId, then: TermId, otherwise: TermId) -> TermId {
        if let Some(c) = self.as_bool(cond) {
            return if c { then } else { otherwise };
        }
        if then == otherwise {
            return then;
        }
        match (self.as_bool(then), self.as_bool(otherwise)) {
            (Some(true), Some(false)) => cond,
            (Some(false), Some(true)) => self.not(cond),
            _ => {
                let sort = self.sort(then);
                self.intern(TermNode::Ite(cond, then, otherwise), sort)
            }
        }
    }

    pub fn eq(&mut self, lhs: TermId, rhs: TermId) -> TermId {
        if lhs == rhs {
            return self.tt();
        }
        match (self.node(lhs), self.node(rhs)) {
            (TermNode::Int(a), TermNode::Int(b)) => {
                let equal = a == b;
                self.bool_const(equal)
            }
            (TermNode::Bool(a), TermNode::Bool(b)) => {
                let equal = a == b;
                self.bool_const(equal)
            }
            _ => {
                let (a, b) = if lhs < rhs { (lhs, rhs) } else { (rhs, lhs) };
                self.intern(TermNode::Eq(a, b), Sort::Bool)
            }
        }
    }

    pub fn add(&mut self, terms: impl IntoIterator<Item = TermId>) -> TermId {
        let mut constant: i64 = 0;
        let mut operands = Vec::new();
        for term in terms {
            match self.node(term) {
                TermNode::Int(v) => constant = constant.saturating_add(*v),
                TermNode::Add(inner) => {
                    for &t in inner {
                        match self.node(t) {
                            TermNode::Int(v) => constant = constant.saturating_add(*v),
                            _ => operands.push(t),
                        }
                    }
                }
                _ => operands.push(term),
            }
        }
        if constant != 0 {
            operands.push(self.int(constant));
        }
        match operands.len() {
            0 => self.int(0),
            1 => operands[0],
            _ => self.intern(TermNode::Add(operands), Sort::Int),
        }
    }

    pub fn mul(&mut self, factor: i64, term: TermId) -> TermId {
        if factor == 0 {
            return self.int(0);
        }
        if factor == 1 {
            return term;
        }
        match self.node(term) {
            TermNode::Int(v) => {
                let product = v.saturating_mul(factor);
                self.int(product)
            }
            _ => self.intern(TermNode::Mul(factor, term), Sort::Int),
        }
    }

    /// Direct children of a term.
    pub fn children(&self, term: TermId) -> Vec<TermId> {
        match self.node(term) {
            TermNode::Bool(_) | TermNode::Int(_) | TermNode::Var(_) => Vec::new(),
            TermNode::Not(t) | TermNode::Mul(_, t) => vec![*t],
            TermNode::And(ts) | TermNode::Or(ts) | TermNode::Add(ts) => ts.clone(),
            TermNode::Xor(a, b) | TermNode::Eq(a, b) => vec![*a, *b],
            TermNode::Ite(c, t, e) => vec![*c, *t, *e],
        }
    }

    /// Number of distinct terms reachable from `roots`, shared subterms counted once.
    pub fn dag_size(&self, roots: &[TermId]) -> usize {
        self.reachable(roots).len()
    }

    /// Terms reachable from `roots`, in first-visit order.
    pub fn reachable(&self, roots: &[TermId]) -> Vec<TermId> {
        let mut seen = AHashSet::new();
        let mut order = Vec::new();
        let mut stack: Vec<TermId> = roots.iter().rev().copied().collect();
        while let Some(term) = stack.pop() {
            if !seen.insert(term) {
                continue;
            }
            order.push(term);
            stack.extend(self.children(term).into_iter().rev());
        }
        order
    }

    /// Variables occurring under `roots`, in declaration order.
    pub fn free_variables(&self, roots: &[TermId]) -> Vec<VarId> {
        let mut vars: Vec<VarId> = self
            .reachable(roots)
            .into_iter()
            .filter_map(|t| self.as_var(t))
            .collect();
        vars.sort_unstable();
        vars
    }

    /// Size of `root` with every shared subterm expanded, saturating at `u64::MAX`.
    pub fn tree_size(&self, root: TermId) -> u64 {
        let mut sizes: AHashMap<TermId, u64> = AHashMap::new();
        // Children have smaller ids than their parents, so ascending order is bottom-up.
        let mut terms = self.reachable(&[root]);
        terms.sort_unstable();
        for term in terms {
            let size = self
                .children(term)
                .iter()
                .fold(1u64, |acc, c| acc.saturating_add(sizes[c]));
            sizes.insert(term, size);
        }
        sizes.get(&root).copied().unwrap_or(1)
    }
}
