//! Song-Dimension Extractor
//!
//! Turns raw song metadata into the `songs` and `artists` dimensions and
//! keeps the conformed catalog for the fact reconciler.

use crate::error::Result;
use crate::ingestion::TableSource;
use crate::operators::{distinct, drop_null_keys, project};
use crate::schema::columns::*;
use crate::schema::SONG_SOURCE;
use polars::prelude::*;
use tracing::info;

pub const SONGS_COLUMNS: [&str; 5] = [SONG_ID, TITLE, ARTIST_ID, YEAR, DURATION];
pub const SONGS_PARTITION: [&str; 2] = [YEAR, ARTIST_ID];

pub const ARTISTS_COLUMNS: [&str; 5] = [
    ARTIST_ID,
    ARTIST_NAME,
    ARTIST_LOCATION,
    ARTIST_LATITUDE,
    ARTIST_LONGITUDE,
];

pub struct SongDimensions {
    pub songs: DataFrame,
    pub artists: DataFrame,
    /// Conformed song source, consumed by the reconciler
    pub catalog: DataFrame,
}

pub struct SongExtractor;

impl SongExtractor {
    pub fn extract(source: &dyn TableSource, pattern: &str) -> Result<SongDimensions> {
        let raw = source.read(pattern)?;
        Self::from_raw(raw)
    }

    pub fn from_raw(raw: DataFrame) -> Result<SongDimensions> {
        let catalog = SONG_SOURCE.conform(raw)?;

        let songs = songs_table(catalog.clone().lazy()).collect()?;
        let artists = artists_table(catalog.clone().lazy()).collect()?;

        info!(
            catalog = catalog.height(),
            songs = songs.height(),
            artists = artists.height(),
            "Song dimensions extracted"
        );

        Ok(SongDimensions { songs, artists, catalog })
    }
}

pub fn songs_table(catalog: LazyFrame) -> LazyFrame {
    distinct(drop_null_keys(project(catalog, &SONGS_COLUMNS), SONG_ID))
}

pub fn artists_table(catalog: LazyFrame) -> LazyFrame {
    distinct(drop_null_keys(project(catalog, &ARTISTS_COLUMNS), ARTIST_ID))
}
