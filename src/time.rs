//! Timestamp derivation and the `time` dimension.
//!
//! Event times arrive as epoch milliseconds. They are truncated to whole
//! seconds and rendered as naive datetimes in UTC. Calendar parts follow
//! ISO-8601: `week` is the ISO week number and `weekday` runs from
//! Monday = 1 to Sunday = 7.

use crate::operators::{distinct, drop_null_keys};
use crate::schema::columns::*;
use polars::prelude::*;

pub const TIME_COLUMNS: [&str; 7] = [START_TIME, HOUR, DAY, WEEK, MONTH, YEAR, WEEKDAY];

/// Expression for `timestamp`: epoch seconds, `ts // 1000`
pub fn timestamp_expr() -> Expr {
    col(TS).floor_div(lit(1000i64)).alias(TIMESTAMP)
}

/// Expression for `datetime`: the `timestamp` column as a UTC datetime
pub fn datetime_expr() -> Expr {
    (col(TIMESTAMP) * lit(1000i64))
        .cast(DataType::Datetime(TimeUnit::Milliseconds, None))
        .alias(DATETIME)
}

/// Add `timestamp` and `datetime` to a frame carrying `ts`
pub fn with_time_columns(lf: LazyFrame) -> LazyFrame {
    lf.with_column(timestamp_expr())
        .with_column(datetime_expr())
}

/// Add `year` and `month` derived from `column`
pub fn with_year_month(lf: LazyFrame, column: &str) -> LazyFrame {
    lf.with_columns([
        col(column).dt().year().cast(DataType::Int32).alias(YEAR),
        col(column).dt().month().cast(DataType::Int32).alias(MONTH),
    ])
}

/// One row per distinct start time, decomposed into calendar parts
pub fn time_table(events: LazyFrame) -> LazyFrame {
    let start = || col(DATETIME);
    let decomposed = events.select([
        start().alias(START_TIME),
        start().dt().hour().cast(DataType::Int32).alias(HOUR),
        start().dt().day().cast(DataType::Int32).alias(DAY),
        start().dt().week().cast(DataType::Int32).alias(WEEK),
        start().dt().month().cast(DataType::Int32).alias(MONTH),
        start().dt().year().cast(DataType::Int32).alias(YEAR),
        start().dt().weekday().cast(DataType::Int32).alias(WEEKDAY),
    ]);
    distinct(drop_null_keys(decomposed, START_TIME))
}
