//! Declared schemas for the two raw sources.
//!
//! Raw records are read schema-on-read; `SourceSchema::conform` then pins
//! every declared column to its type, null-fills optional columns that no
//! record carried, and rejects sources where a required column is missing
//! from every record.

use crate::error::{EtlError, Result};
use polars::prelude::*;
use tracing::debug;

/// Column names shared across components.
pub mod columns {
    pub const SONG_ID: &str = "song_id";
    pub const TITLE: &str = "title";
    pub const ARTIST_ID: &str = "artist_id";
    pub const ARTIST_NAME: &str = "artist_name";
    pub const ARTIST_LOCATION: &str = "artist_location";
    pub const ARTIST_LATITUDE: &str = "artist_latitude";
    pub const ARTIST_LONGITUDE: &str = "artist_longitude";
    pub const YEAR: &str = "year";
    pub const DURATION: &str = "duration";

    pub const USER_ID: &str = "userId";
    pub const FIRST_NAME: &str = "firstName";
    pub const LAST_NAME: &str = "lastName";
    pub const GENDER: &str = "gender";
    pub const LEVEL: &str = "level";
    pub const PAGE: &str = "page";
    pub const SONG: &str = "song";
    pub const ARTIST: &str = "artist";
    pub const LENGTH: &str = "length";
    pub const SESSION_ID: &str = "sessionId";
    pub const LOCATION: &str = "location";
    pub const USER_AGENT: &str = "userAgent";
    pub const TS: &str = "ts";

    pub const TIMESTAMP: &str = "timestamp";
    pub const DATETIME: &str = "datetime";
    pub const START_TIME: &str = "start_time";
    pub const HOUR: &str = "hour";
    pub const DAY: &str = "day";
    pub const WEEK: &str = "week";
    pub const MONTH: &str = "month";
    pub const WEEKDAY: &str = "weekday";

    pub const SONGPLAY_ID: &str = "songplay_id";
}

/// Logical column type of a declared column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Int32,
    Int64,
    Float64,
}

impl ColumnType {
    pub fn dtype(&self) -> DataType {
        match self {
            ColumnType::Text => DataType::String,
            ColumnType::Int32 => DataType::Int32,
            ColumnType::Int64 => DataType::Int64,
            ColumnType::Float64 => DataType::Float64,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub column_type: ColumnType,
    pub required: bool,
}

const fn required(name: &'static str, column_type: ColumnType) -> ColumnSpec {
    ColumnSpec { name, column_type, required: true }
}

const fn optional(name: &'static str, column_type: ColumnType) -> ColumnSpec {
    ColumnSpec { name, column_type, required: false }
}

/// Schema of one raw source
#[derive(Debug, Clone, Copy)]
pub struct SourceSchema {
    pub name: &'static str,
    pub columns: &'static [ColumnSpec],
}

pub const SONG_SOURCE: SourceSchema = SourceSchema {
    name: "song_data",
    columns: &[
        required(columns::SONG_ID, ColumnType::Text),
        required(columns::TITLE, ColumnType::Text),
        required(columns::ARTIST_ID, ColumnType::Text),
        required(columns::ARTIST_NAME, ColumnType::Text),
        optional(columns::ARTIST_LOCATION, ColumnType::Text),
        optional(columns::ARTIST_LATITUDE, ColumnType::Float64),
        optional(columns::ARTIST_LONGITUDE, ColumnType::Float64),
        optional(columns::YEAR, ColumnType::Int32),
        optional(columns::DURATION, ColumnType::Float64),
    ],
};

pub const USAGE_SOURCE: SourceSchema = SourceSchema {
    name: "log_data",
    columns: &[
        required(columns::USER_ID, ColumnType::Text),
        optional(columns::FIRST_NAME, ColumnType::Text),
        optional(columns::LAST_NAME, ColumnType::Text),
        optional(columns::GENDER, ColumnType::Text),
        required(columns::LEVEL, ColumnType::Text),
        required(columns::PAGE, ColumnType::Text),
        required(columns::SONG, ColumnType::Text),
        required(columns::ARTIST, ColumnType::Text),
        optional(columns::LENGTH, ColumnType::Float64),
        optional(columns::SESSION_ID, ColumnType::Int64),
        optional(columns::LOCATION, ColumnType::Text),
        optional(columns::USER_AGENT, ColumnType::Text),
        required(columns::TS, ColumnType::Int64),
    ],
};

impl SourceSchema {
    /// Pin a freshly read table to this schema.
    ///
    /// Columns outside the schema are kept as read. A table with no rows at
    /// all is a valid empty source and comes back with every declared column.
    pub fn conform(&self, df: DataFrame) -> Result<DataFrame> {
        if df.height() == 0 {
            debug!(source = self.name, "Empty source, producing typed empty table");
            return self.empty_frame();
        }

        let present: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();

        let missing: Vec<&str> = self.columns.iter()
            .filter(|c| c.required && !present.iter().any(|p| p == c.name))
            .map(|c| c.name)
            .collect();
        if !missing.is_empty() {
            return Err(EtlError::SchemaMismatch(format!(
                "{}: required column(s) {} absent from every record",
                self.name,
                missing.join(", ")
            )));
        }

        let exprs: Vec<Expr> = self.columns.iter()
            .map(|c| {
                if present.iter().any(|p| p == c.name) {
                    col(c.name).cast(c.column_type.dtype())
                } else {
                    lit(NULL).cast(c.column_type.dtype()).alias(c.name)
                }
            })
            .collect();

        let conformed = df.lazy()
            .with_columns(exprs)
            .collect()?;
        Ok(conformed)
    }

    fn empty_frame(&self) -> Result<DataFrame> {
        let series: Vec<Series> = self.columns.iter()
            .map(|c| Series::new_empty(c.name, &c.column_type.dtype()))
            .collect();
        Ok(DataFrame::new(series)?)
    }
}
