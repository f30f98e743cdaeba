//! Fact Reconciler
//!
//! Rebuilds `songplays` by matching normalized play events to the song
//! catalog. Candidates come from an inner equi-join on artist name; a
//! `PlayMatcher` then decides which candidate pairs are real matches, and
//! any remaining fan-out is resolved by keeping the smallest
//! `(song_id, artist_id)` per event.

use crate::error::{EtlError, Result};
use crate::operators::{distinct_on, drop_null_keys, inner_join, project};
use crate::schema::columns::*;
use crate::time::with_year_month;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{info, warn};

pub const SONGPLAYS_COLUMNS: [&str; 11] = [
    SONGPLAY_ID,
    START_TIME,
    USER_ID,
    LEVEL,
    SESSION_ID,
    LOCATION,
    USER_AGENT,
    SONG_ID,
    ARTIST_ID,
    YEAR,
    MONTH,
];
pub const SONGPLAYS_PARTITION: [&str; 2] = [YEAR, MONTH];

const EVENT_ROW: &str = "__event_row";
const CANDIDATE_ARTIST: &str = "__candidate_artist";

/// The play-event side of a candidate pair
#[derive(Debug, Clone, Copy, Default)]
pub struct PlayEvent<'a> {
    pub artist: Option<&'a str>,
    pub song: Option<&'a str>,
    pub length: Option<f64>,
}

/// The song-catalog side of a candidate pair
#[derive(Debug, Clone, Copy, Default)]
pub struct SongCandidate<'a> {
    pub artist_name: Option<&'a str>,
    pub title: Option<&'a str>,
    pub duration: Option<f64>,
}

/// Decides whether a play event refers to a catalog song
pub trait PlayMatcher: Send + Sync {
    fn matches(&self, event: &PlayEvent<'_>, song: &SongCandidate<'_>) -> bool;
}

fn same_text(a: Option<&str>, b: Option<&str>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a == b)
}

/// Artist name equality only
pub struct ArtistMatcher;

impl PlayMatcher for ArtistMatcher {
    fn matches(&self, event: &PlayEvent<'_>, song: &SongCandidate<'_>) -> bool {
        same_text(event.artist, song.artist_name)
    }
}

/// Artist name and song title equality
pub struct ArtistTitleMatcher;

impl PlayMatcher for ArtistTitleMatcher {
    fn matches(&self, event: &PlayEvent<'_>, song: &SongCandidate<'_>) -> bool {
        same_text(event.artist, song.artist_name) && same_text(event.song, song.title)
    }
}

/// Artist and title equality plus played length within a tolerance of the
/// catalog duration
pub struct ArtistTitleDurationMatcher {
    pub tolerance_secs: f64,
}

impl PlayMatcher for ArtistTitleDurationMatcher {
    fn matches(&self, event: &PlayEvent<'_>, song: &SongCandidate<'_>) -> bool {
        if !ArtistTitleMatcher.matches(event, song) {
            return false;
        }
        match (event.length, song.duration) {
            (Some(length), Some(duration)) => (length - duration).abs() <= self.tolerance_secs,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    Artist,
    #[default]
    ArtistTitle,
    ArtistTitleDuration,
}

impl MatchStrategy {
    pub fn matcher(&self, tolerance_secs: f64) -> Box<dyn PlayMatcher> {
        match self {
            MatchStrategy::Artist => Box::new(ArtistMatcher),
            MatchStrategy::ArtistTitle => Box::new(ArtistTitleMatcher),
            MatchStrategy::ArtistTitleDuration => Box::new(ArtistTitleDurationMatcher { tolerance_secs }),
        }
    }
}

impl FromStr for MatchStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "artist" => Ok(MatchStrategy::Artist),
            "artist_title" => Ok(MatchStrategy::ArtistTitle),
            "artist_title_duration" => Ok(MatchStrategy::ArtistTitleDuration),
            other => Err(format!(
                "unknown match strategy '{}' (expected artist, artist_title or artist_title_duration)",
                other
            )),
        }
    }
}

/// Counters describing one reconciliation
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileStats {
    /// Play events offered to the reconciler
    pub play_events: usize,
    /// Event/song pairs sharing an artist name
    pub candidate_pairs: usize,
    /// Distinct pairs accepted by the matcher
    pub matched_pairs: usize,
    /// Events with more than one accepted song before the tiebreak
    pub fanout_events: usize,
    /// Rows in the fact table
    pub songplays: usize,
    /// Events that produced no fact row
    pub dropped_events: usize,
}

pub struct Songplays {
    pub table: DataFrame,
    pub stats: ReconcileStats,
}

pub struct FactReconciler {
    matcher: Box<dyn PlayMatcher>,
}

impl FactReconciler {
    pub fn new(matcher: Box<dyn PlayMatcher>) -> Self {
        Self { matcher }
    }

    pub fn from_strategy(strategy: MatchStrategy, tolerance_secs: f64) -> Self {
        Self::new(strategy.matcher(tolerance_secs))
    }

    /// Build the fact table from normalized play events and the song catalog
    pub fn reconcile(&self, events: &DataFrame, catalog: &DataFrame) -> Result<Songplays> {
        let mut stats = ReconcileStats {
            play_events: events.height(),
            ..Default::default()
        };

        let events_lf = events.clone().lazy().with_row_index(EVENT_ROW, None);
        let songs_lf = drop_null_keys(catalog.clone().lazy(), SONG_ID).select([
            col(SONG_ID),
            col(ARTIST_ID),
            col(ARTIST_NAME),
            col(ARTIST_NAME).alias(CANDIDATE_ARTIST),
            col(TITLE),
            col(DURATION),
        ]);

        let joined = inner_join(events_lf, songs_lf, ARTIST, ARTIST_NAME).collect()?;
        stats.candidate_pairs = joined.height();

        let mask = self.match_mask(&joined)?;
        let accepted = joined.filter(&mask)?;
        let matched_events = accepted.column(EVENT_ROW)?.n_unique()?;

        // Combined rows are distinct over everything but the event row number
        let content: Vec<&str> = accepted.get_column_names()
            .into_iter()
            .filter(|name| *name != EVENT_ROW)
            .collect();
        let ordered = accepted.clone().lazy().sort_by_exprs(
            [col(EVENT_ROW), col(SONG_ID), col(ARTIST_ID)],
            SortMultipleOptions::default(),
        );
        let matched = distinct_on(ordered, &content).collect()?;
        stats.matched_pairs = matched.height();

        stats.fanout_events = matched.clone().lazy()
            .group_by([col(EVENT_ROW)])
            .agg([len().alias("candidates")])
            .filter(col("candidates").gt(lit(1)))
            .collect()?
            .height();
        if stats.fanout_events > 0 {
            warn!(
                events = stats.fanout_events,
                "Play events matched more than one song; keeping smallest song_id"
            );
        }

        let one_per_event = distinct_on(matched.lazy(), &[EVENT_ROW])
            .sort_by_exprs(
                [col(DATETIME), col(USER_ID), col(SESSION_ID), col(EVENT_ROW)],
                SortMultipleOptions::default(),
            )
            .with_column(col(DATETIME).alias(START_TIME));

        let facts = project(
            one_per_event,
            &[START_TIME, USER_ID, LEVEL, SESSION_ID, LOCATION, USER_AGENT, SONG_ID, ARTIST_ID],
        )
        .with_row_index(SONGPLAY_ID, Some(1))
        .with_column(col(SONGPLAY_ID).cast(DataType::Int64));

        let table = project(with_year_month(facts, START_TIME), &SONGPLAYS_COLUMNS).collect()?;

        stats.songplays = table.height();
        // Identical plays collapsed by the distinct still count as matched
        stats.dropped_events = stats.play_events.saturating_sub(matched_events);

        info!(
            play_events = stats.play_events,
            candidates = stats.candidate_pairs,
            matched = stats.matched_pairs,
            songplays = stats.songplays,
            dropped = stats.dropped_events,
            "Song plays reconciled"
        );

        Ok(Songplays { table, stats })
    }

    fn match_mask(&self, joined: &DataFrame) -> Result<BooleanChunked> {
        let artists = text_values(joined, ARTIST)?;
        let songs = text_values(joined, SONG)?;
        let lengths = float_values(joined, LENGTH)?;
        let candidate_artists = text_values(joined, CANDIDATE_ARTIST)?;
        let titles = text_values(joined, TITLE)?;
        let durations = float_values(joined, DURATION)?;

        let mask: Vec<bool> = (0..joined.height())
            .map(|i| {
                let event = PlayEvent {
                    artist: artists[i],
                    song: songs[i],
                    length: lengths[i],
                };
                let song = SongCandidate {
                    artist_name: candidate_artists[i],
                    title: titles[i],
                    duration: durations[i],
                };
                self.matcher.matches(&event, &song)
            })
            .collect();

        let series = Series::new("matched", mask);
        Ok(series.bool()?.clone())
    }
}

fn text_values<'a>(df: &'a DataFrame, name: &str) -> Result<Vec<Option<&'a str>>> {
    match df.column(name) {
        Ok(column) => {
            let values = column.str()
                .map_err(|e| EtlError::SchemaMismatch(format!("Column {} is not text: {}", name, e)))?;
            Ok(values.into_iter().collect())
        }
        Err(_) => Ok(vec![None; df.height()]),
    }
}

fn float_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    match df.column(name) {
        Ok(column) => {
            let values = column.cast(&DataType::Float64)?;
            Ok(values.f64()?.into_iter().collect())
        }
        Err(_) => Ok(vec![None; df.height()]),
    }
}
