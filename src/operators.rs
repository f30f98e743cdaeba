//! Set-oriented relational primitives shared by the three components.
//!
//! Everything here composes `LazyFrame`s; nothing is collected until a
//! component asks for its final table.

use polars::prelude::*;

/// Keep only the named columns, in the given order
pub fn project(lf: LazyFrame, columns: &[&str]) -> LazyFrame {
    let exprs: Vec<Expr> = columns.iter().map(|c| col(c)).collect();
    lf.select(exprs)
}

/// Remove exact duplicate rows, keeping the first occurrence in input order
pub fn distinct(lf: LazyFrame) -> LazyFrame {
    lf.unique_stable(None, UniqueKeepStrategy::First)
}

/// Remove rows that are duplicates over `subset`, keeping the first occurrence
pub fn distinct_on(lf: LazyFrame, subset: &[&str]) -> LazyFrame {
    let subset: Vec<String> = subset.iter().map(|s| s.to_string()).collect();
    lf.unique_stable(Some(subset), UniqueKeepStrategy::First)
}

/// Exact string equality filter
pub fn filter_eq(lf: LazyFrame, column: &str, value: &str) -> LazyFrame {
    lf.filter(col(column).eq(lit(value)))
}

/// Drop rows whose key column is null
pub fn drop_null_keys(lf: LazyFrame, key: &str) -> LazyFrame {
    lf.filter(col(key).is_not_null())
}

/// Inner equi-join; null keys never match
pub fn inner_join(left: LazyFrame, right: LazyFrame, left_on: &str, right_on: &str) -> LazyFrame {
    left.join(
        right,
        [col(left_on)],
        [col(right_on)],
        JoinArgs::new(JoinType::Inner),
    )
}
