/// Sort of a prover term.
///
/// The prover distinguishes formulas (things that can be asserted) from
/// terms (things that can be compared). Booleans exist on both sides: a
/// formula-sorted `x` and a term-sorted `term$$x`, linked by an axiom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sort {
    /// Predicate-level truth value
    Formula,
    /// Term-level boolean
    Bool,
    /// Mathematical integer
    Int,
    /// Any other term: maps, tuples, user-defined types
    Value,
}

impl Sort {
    /// Whether terms of this sort can be asserted directly.
    pub fn is_formula(&self) -> bool {
        matches!(self, Sort::Formula)
    }

    /// Whether this is a term-level sort.
    pub fn is_term(&self) -> bool {
        !self.is_formula()
    }
}
