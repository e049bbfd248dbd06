//! Boolean composition of compiled fragments.
//!
//! Every connective absorbs a side that compiled to `None`, so tags that
//! only feed side channels (`sort:`, `use:`, blank free text) never force an
//! always-true or always-false clause into the tree. `NOT` of nothing is
//! nothing.

use crate::error::QueryError;

use super::ast::{LogicalOperator, QueryNode};
use super::compiler::{Accumulator, CompileOptions};
use super::fields::FieldRegistry;
use super::predicate::Predicate;

/// Compile one subtree.
pub fn compile_node(
    registry: &FieldRegistry,
    node: &QueryNode,
    acc: &mut Accumulator,
    options: &CompileOptions,
) -> Result<Option<Predicate>, QueryError> {
    walk(registry, node, acc, options, true)
}

/// `required` holds while every connective between the root and `node` is an
/// `AND` or a parenthesis, i.e. the node must match for the row to match.
/// Only a required `in:trash` opens the trash; under `OR` or `NOT` it is a
/// plain retention-window test.
fn walk(
    registry: &FieldRegistry,
    node: &QueryNode,
    acc: &mut Accumulator,
    options: &CompileOptions,
    required: bool,
) -> Result<Option<Predicate>, QueryError> {
    match node {
        QueryNode::Empty => Ok(None),
        QueryNode::Tag(tag) => {
            let trash = acc.trash;
            let predicate = registry.compile_tag(tag, acc, options)?;
            if !required {
                acc.trash = trash;
            }
            Ok(predicate)
        }
        QueryNode::Logical(expr) => {
            let required = required && expr.operator.operator == LogicalOperator::And;
            let left = walk(registry, &expr.left, acc, options, required)?;
            let right = walk(registry, &expr.right, acc, options, required)?;
            Ok(match expr.operator.operator {
                LogicalOperator::And => and(left, right),
                LogicalOperator::Or => or(left, right),
            })
        }
        QueryNode::Unary(expr) => Ok(not(walk(registry, &expr.operand, acc, options, false)?)),
        QueryNode::Parenthesized(expr) => Ok(parenthesize(walk(
            registry,
            &expr.expression,
            acc,
            options,
            required,
        )?)),
    }
}

pub fn and(left: Option<Predicate>, right: Option<Predicate>) -> Option<Predicate> {
    merge(left, right, Predicate::and)
}

pub fn or(left: Option<Predicate>, right: Option<Predicate>) -> Option<Predicate> {
    merge(left, right, Predicate::or)
}

pub fn not(inner: Option<Predicate>) -> Option<Predicate> {
    inner.map(Predicate::negate)
}

pub fn parenthesize(inner: Option<Predicate>) -> Option<Predicate> {
    inner.map(Predicate::group)
}

fn merge(
    left: Option<Predicate>,
    right: Option<Predicate>,
    join: fn(Predicate, Predicate) -> Predicate,
) -> Option<Predicate> {
    match (left, right) {
        (Some(l), Some(r)) => Some(join(l, r)),
        (l, None) => l,
        (None, r) => r,
    }
}
