//! The weighted edit-cost objective.
use crate::solver::{Context, TermId};

/// Sums `weight * (proposed != reference)` over every registered decision.
#[derive(Debug, Clone, Default)]
pub struct CostFunction {
    terms: Vec<TermId>,
}

impl CostFunction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Charges `weight` for moving `proposed` away from `reference`. Weight 0 is free.
    pub fn add(&mut self, ctx: &mut Context, proposed: TermId, reference: TermId, weight: u32) {
        if weight == 0 {
            return;
        }
        let indicator = change_indicator(ctx, proposed, reference);
        self.terms.push(ctx.mul(i64::from(weight), indicator));
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// The objective term; the constant 0 when nothing was charged.
    pub fn build(self, ctx: &mut Context) -> TermId {
        ctx.add(self.terms)
    }
}

/// 1 when `proposed` differs from `reference`, else 0.
pub fn change_indicator(ctx: &mut Context, proposed: TermId, reference: TermId) -> TermId {
    let changed = ctx.xor(proposed, reference);
    let (one, zero) = (ctx.int(1), ctx.int(0));
    ctx.ite(changed, one, zero)
}
