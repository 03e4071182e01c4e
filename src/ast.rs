use crate::filter::Predicate;

/// Boolean structure recovered from a fragment sequence.
///
/// Built transiently by the parser when a filter is validated or executed;
/// leaves borrow their predicates from the fragments. A run of operands
/// joined by the same operator is one node, so a long flat chain stays
/// shallow.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr<'f> {
    /// Logical AND over two or more operands
    And(Vec<FilterExpr<'f>>),
    /// Logical OR over two or more operands
    Or(Vec<FilterExpr<'f>>),
    /// A bracketed sub-expression
    Grouped(Box<FilterExpr<'f>>),
    /// Leaf test against a ticket
    Predicate(&'f Predicate),
}

impl FilterExpr<'_> {
    /// Number of predicate leaves.
    pub fn leaf_count(&self) -> usize {
        match self {
            FilterExpr::And(operands) | FilterExpr::Or(operands) => {
                operands.iter().map(FilterExpr::leaf_count).sum()
            }
            FilterExpr::Grouped(inner) => inner.leaf_count(),
            FilterExpr::Predicate(_) => 1,
        }
    }
}
