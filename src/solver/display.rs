use super::term::{Context, TermId, TermNode};
use std::fmt;

/// Renders a term as an indented tree, naming variables by their declared names.
pub struct DisplayTerm<'a> {
    pub ctx: &'a Context,
    pub term: TermId,
}

impl<'a> fmt::Display for DisplayTerm<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_as_tree(self.term, f, "", true)
    }
}

impl<'a> DisplayTerm<'a> {
    fn fmt_as_tree(
        &self,
        term: TermId,
        f: &mut fmt::Formatter<'_>,
        prefix: &str,
        is_last: bool,
    ) -> fmt::Result {
        let node_marker = if is_last { "└── " } else { "├── " };
        write!(f, "{}{}", prefix, node_marker)?;

        let child_prefix = format!("{}{}", prefix, if is_last { "    " } else { "│   " });

        match self.ctx.node(term) {
            TermNode::Bool(b) => writeln!(f, "{}", b),
            TermNode::Int(v) => writeln!(f, "{}", v),
            TermNode::Var(var) => writeln!(f, "{}", self.ctx.variable(*var).name),
            TermNode::Not(t) => {
                writeln!(f, "NOT")?;
                self.fmt_as_tree(*t, f, &child_prefix, true)
            }
            TermNode::And(ts) => self.fmt_nary(f, "AND", ts, &child_prefix),
            TermNode::Or(ts) => self.fmt_nary(f, "OR", ts, &child_prefix),
            TermNode::Add(ts) => self.fmt_nary(f, "+", ts, &child_prefix),
            TermNode::Xor(a, b) => self.fmt_nary(f, "XOR", &[*a, *b], &child_prefix),
            TermNode::Eq(a, b) => self.fmt_nary(f, "==", &[*a, *b], &child_prefix),
            TermNode::Ite(c, t, e) => self.fmt_nary(f, "ITE", &[*c, *t, *e], &child_prefix),
            TermNode::Mul(k, t) => {
                writeln!(f, "* {}", k)?;
                self.fmt_as_tree(*t, f, &child_prefix, true)
            }
        }
    }

    fn fmt_nary(
        &self,
        f: &mut fmt::Formatter<'_>,
        op_name: &str,
        operands: &[TermId],
        child_prefix: &str,
    ) -> fmt::Result {
        writeln!(f, "{}", op_name)?;
        for (i, operand) in operands.iter().enumerate() {
            self.fmt_as_tree(*operand, f, child_prefix, i + 1 == operands.len())?;
        }
        Ok(())
    }
}
