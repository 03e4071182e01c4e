//! SQL compiler that turns a parsed filter into a sea-query `SELECT` over the
//! ticket tables.
//!
//! Every value comes out of the [`ParamTable`] and is bound as a query
//! parameter by sea-query; nothing user-supplied is written into the SQL text.

use sea_query::{
    Condition, Expr, Iden, LikeExpr, Order, Query, SelectStatement, SimpleExpr, SqliteQueryBuilder,
    Value,
};

use crate::ast::FilterExpr;
use crate::filter::{Column, ParamName, ParamTable, ParamValue, Predicate, Relation, LIKE_ESCAPE};
use crate::store::StoreError;
use crate::token::RelOp;

/// Table identifiers for sea-query
#[derive(Debug, Clone, Copy)]
pub enum TableName {
    Tickets,
    Related(Relation),
}

impl Iden for TableName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        match self {
            TableName::Tickets => write!(s, "tickets").unwrap(),
            TableName::Related(relation) => write!(s, "{}", relation.table()).unwrap(),
        }
    }
}

/// Column identifier wrapper
#[derive(Debug, Clone, Copy)]
pub struct ColumnName(pub &'static str);

impl Iden for ColumnName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        write!(s, "{}", self.0).unwrap();
    }
}

fn ticket_col(column: Column) -> (TableName, ColumnName) {
    (TableName::Tickets, ColumnName(column.name()))
}

/// Compiles filters against one parameter table.
pub struct SqlCompiler<'p> {
    params: &'p ParamTable,
}

impl<'p> SqlCompiler<'p> {
    pub fn new(params: &'p ParamTable) -> Self {
        Self { params }
    }

    /// `SELECT tickets.id FROM tickets [WHERE ...] ORDER BY priority, project, id`
    ///
    /// `None` selects every ticket.
    pub fn select_ticket_ids(&self, filter: Option<&FilterExpr<'_>>) -> Result<SelectStatement, StoreError> {
        let mut select = Query::select();
        select
            .column(ticket_col(Column::Id))
            .from(TableName::Tickets);

        if let Some(expr) = filter {
            select.cond_where(self.compile_expr(expr)?);
        }

        select
            .order_by(ticket_col(Column::Priority), Order::Asc)
            .order_by(ticket_col(Column::Project), Order::Asc)
            .order_by(ticket_col(Column::Id), Order::Asc);

        Ok(select)
    }

    /// Renders the statement with values inlined. For display only.
    pub fn preview(&self, filter: Option<&FilterExpr<'_>>) -> Result<String, StoreError> {
        Ok(self.select_ticket_ids(filter)?.to_string(SqliteQueryBuilder))
    }

    /// Brackets map onto nested conditions, which sea-query parenthesizes.
    /// An n-ary node becomes one condition with n children.
    fn compile_expr(&self, expr: &FilterExpr<'_>) -> Result<Condition, StoreError> {
        let condition = match expr {
            FilterExpr::And(operands) => self.compile_operands(Condition::all(), operands)?,
            FilterExpr::Or(operands) => self.compile_operands(Condition::any(), operands)?,
            FilterExpr::Grouped(inner) => self.compile_expr(inner)?,
            FilterExpr::Predicate(predicate) => Condition::all().add(self.compile_predicate(predicate)?),
        };
        Ok(condition)
    }

    fn compile_operands(
        &self,
        mut condition: Condition,
        operands: &[FilterExpr<'_>],
    ) -> Result<Condition, StoreError> {
        for operand in operands {
            condition = condition.add(self.compile_expr(operand)?);
        }
        Ok(condition)
    }

    fn compile_predicate(&self, predicate: &Predicate) -> Result<SimpleExpr, StoreError> {
        let expr = match *predicate {
            Predicate::Compare { column, op, param } => {
                let col = Expr::col(ticket_col(column));
                let val = self.value(param)?;
                match op {
                    RelOp::Eq => col.eq(val),
                    RelOp::NotEq => col.ne(val),
                    RelOp::Lt => col.lt(val),
                    RelOp::Lte => col.lte(val),
                    RelOp::Gt => col.gt(val),
                    RelOp::Gte => col.gte(val),
                }
            }
            Predicate::Like { column, negated, param } => {
                let pattern = match self.lookup(param)? {
                    ParamValue::Text(s) => s.clone(),
                    other => {
                        return Err(StoreError::MalformedFilter(format!(
                            "LIKE pattern {} must be text, got {}",
                            param, other
                        )))
                    }
                };
                let like = LikeExpr::new(pattern).escape(LIKE_ESCAPE);
                let col = Expr::col(ticket_col(column));
                if negated {
                    col.not_like(like)
                } else {
                    col.like(like)
                }
            }
            Predicate::Related { relation, negated, param } => {
                let exists = Expr::exists(self.related_rows(relation, param)?);
                if negated {
                    exists.not()
                } else {
                    exists
                }
            }
        };
        Ok(expr)
    }

    /// Rows of `relation` for the current ticket whose value equals the parameter.
    fn related_rows(&self, relation: Relation, param: ParamName) -> Result<SelectStatement, StoreError> {
        let table = TableName::Related(relation);
        Ok(Query::select()
            .expr(Expr::cust("1"))
            .from(table)
            .and_where(Expr::col((table, ColumnName(relation.value_column()))).eq(self.value(param)?))
            .and_where(
                Expr::col((table, ColumnName("ticket_id"))).equals(ticket_col(Column::Id)),
            )
            .to_owned())
    }

    fn lookup(&self, name: ParamName) -> Result<&'p ParamValue, StoreError> {
        self.params.get(name).ok_or(StoreError::UnboundParameter(name))
    }

    /// Convert a bound parameter to a sea-query Value
    fn value(&self, name: ParamName) -> Result<Value, StoreError> {
        Ok(match self.lookup(name)? {
            ParamValue::Text(s) => Value::String(Some(Box::new(s.clone()))),
            ParamValue::Integer(n) => Value::BigInt(Some(*n)),
            ParamValue::Float(x) => Value::Double(Some(*x)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Fragment;
    use crate::parser::Parser;

    fn build(fragments: &[Fragment], params: &ParamTable) -> (String, Vec<Value>) {
        let expr = Parser::new(fragments).parse().unwrap();
        let select = SqlCompiler::new(params).select_ticket_ids(expr.as_ref()).unwrap();
        let (sql, values) = select.build(SqliteQueryBuilder);
        (sql, values.0)
    }

    #[test]
    fn test_no_filter_selects_everything_in_order() {
        let (sql, values) = build(&[], &ParamTable::new());
        assert!(!sql.contains("WHERE"));
        assert!(sql.contains(r#"ORDER BY "tickets"."priority" ASC, "tickets"."project" ASC"#));
        assert!(values.is_empty());
    }

    #[test]
    fn test_values_are_bound_not_inlined() {
        let mut params = ParamTable::new();
        let pattern = params.bind(ParamValue::Text("%it's%".to_string()));
        let fragments = [Fragment::Predicate(Predicate::Like {
            column: Column::Description,
            negated: false,
            param: pattern,
        })];
        let (sql, values) = build(&fragments, &params);
        assert!(sql.contains("LIKE ?"), "{}", sql);
        assert!(sql.contains("ESCAPE"), "{}", sql);
        assert!(!sql.contains("it's"));
        assert_eq!(values, vec![Value::String(Some(Box::new("%it's%".to_string())))]);
    }

    #[test]
    fn test_negated_existential() {
        let mut params = ParamTable::new();
        let user = params.bind(ParamValue::Text("bob".to_string()));
        let fragments = [Fragment::Predicate(Predicate::Related {
            relation: Relation::Assignment,
            negated: true,
            param: user,
        })];
        let (sql, _) = build(&fragments, &params);
        assert!(sql.contains("NOT EXISTS"), "{}", sql);
        assert!(sql.contains(r#""assignments"."ticket_id" = "tickets"."id""#), "{}", sql);
    }

    #[test]
    fn test_grouping_is_preserved() {
        let mut params = ParamTable::new();
        let a = params.bind(ParamValue::Integer(1));
        let b = params.bind(ParamValue::Integer(2));
        let c = params.bind(ParamValue::Integer(3));
        let p = |param| {
            Fragment::Predicate(Predicate::Compare {
                column: Column::Priority,
                op: RelOp::Eq,
                param,
            })
        };
        let fragments = [
            Fragment::OpenParen,
            p(a),
            Fragment::Or,
            p(b),
            Fragment::CloseParen,
            Fragment::And,
            p(c),
        ];
        let (sql, values) = build(&fragments, &params);
        assert!(sql.contains(" OR "), "{}", sql);
        assert!(sql.contains(") AND "), "{}", sql);
        assert_eq!(values.len(), 3);
    }

    #[test]
    fn test_long_chain_compiles_to_one_condition() {
        let mut params = ParamTable::new();
        let mut fragments = Vec::new();
        for n in 0..5_000 {
            if n > 0 {
                fragments.push(Fragment::And);
            }
            let param = params.bind(ParamValue::Integer(n));
            fragments.push(Fragment::Predicate(Predicate::Compare {
                column: Column::Priority,
                op: RelOp::NotEq,
                param,
            }));
        }
        let (sql, values) = build(&fragments, &params);
        assert_eq!(values.len(), 5_000);
        assert_eq!(sql.matches(" AND ").count(), 4_999);
    }

    #[test]
    fn test_unbound_parameter() {
        let params = ParamTable::new();
        let fragments = [Fragment::Predicate(Predicate::Compare {
            column: Column::Priority,
            op: RelOp::Gt,
            param: ParamName(1),
        })];
        let expr = Parser::new(&fragments).parse().unwrap();
        let err = SqlCompiler::new(&params)
            .select_ticket_ids(expr.as_ref())
            .unwrap_err();
        assert!(matches!(err, StoreError::UnboundParameter(ParamName(1))));
    }
}
