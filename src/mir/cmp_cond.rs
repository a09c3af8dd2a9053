//! Comparison conditions for `Compare` instructions.

/// Condition of an integer comparison. All comparisons at this tier are
/// signed 32-bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpCond {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl CmpCond {
    /// Evaluate the condition on two concrete operands.
    pub fn eval(self, lhs: i32, rhs: i32) -> bool {
        match self {
            CmpCond::Lt => lhs < rhs,
            CmpCond::Le => lhs <= rhs,
            CmpCond::Gt => lhs > rhs,
            CmpCond::Ge => lhs >= rhs,
            CmpCond::Eq => lhs == rhs,
            CmpCond::Ne => lhs != rhs,
        }
    }

    /// `<` or `<=` — the shapes loop exit tests take for upward-counting
    /// loops.
    pub fn is_below(self) -> bool {
        matches!(self, CmpCond::Lt | CmpCond::Le)
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            CmpCond::Lt => "lt",
            CmpCond::Le => "le",
            CmpCond::Gt => "gt",
            CmpCond::Ge => "ge",
            CmpCond::Eq => "eq",
            CmpCond::Ne => "ne",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eval_table() {
        assert!(CmpCond::Lt.eval(1, 2));
        assert!(!CmpCond::Lt.eval(2, 2));
        assert!(CmpCond::Le.eval(2, 2));
        assert!(CmpCond::Gt.eval(3, 2));
        assert!(CmpCond::Ge.eval(2, 2));
        assert!(CmpCond::Eq.eval(-5, -5));
        assert!(CmpCond::Ne.eval(-5, 5));
    }

    #[test]
    fn below_shapes() {
        assert!(CmpCond::Lt.is_below());
        assert!(CmpCond::Le.is_below());
        assert!(!CmpCond::Ge.is_below());
        assert!(!CmpCond::Eq.is_below());
    }
}
