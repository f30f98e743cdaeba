//! Usage-Log Normalizer
//!
//! Filters raw usage logs down to song plays, derives the time columns and
//! produces the `users` and `time` dimensions plus the normalized play-event
//! table handed to the reconciler.

use crate::error::Result;
use crate::ingestion::TableSource;
use crate::operators::{distinct, drop_null_keys, filter_eq, project};
use crate::schema::columns::*;
use crate::schema::USAGE_SOURCE;
use crate::time::{time_table, with_time_columns};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::info;

/// Page value that marks a song play
pub const PLAY_PAGE: &str = "NextSong";

pub const USERS_COLUMNS: [&str; 5] = [USER_ID, FIRST_NAME, LAST_NAME, GENDER, LEVEL];
pub const TIME_PARTITION: [&str; 2] = [YEAR, MONTH];

const INPUT_ORDER: &str = "__input_order";

/// How the `users` dimension treats a user seen at more than one level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsersPolicy {
    /// One row per distinct (user, level) combination; level history is kept
    #[default]
    History,
    /// One row per user, taken from that user's most recent play
    Latest,
}

impl FromStr for UsersPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "history" => Ok(UsersPolicy::History),
            "latest" => Ok(UsersPolicy::Latest),
            other => Err(format!("unknown users policy '{}' (expected history or latest)", other)),
        }
    }
}

pub struct UsageTables {
    pub users: DataFrame,
    pub time: DataFrame,
    /// Play events with every source column plus `timestamp` and `datetime`
    pub events: DataFrame,
}

pub struct UsageNormalizer {
    users_policy: UsersPolicy,
}

impl UsageNormalizer {
    pub fn new(users_policy: UsersPolicy) -> Self {
        Self { users_policy }
    }

    pub fn normalize(&self, source: &dyn TableSource, pattern: &str) -> Result<UsageTables> {
        let raw = source.read(pattern)?;
        self.from_raw(raw)
    }

    pub fn from_raw(&self, raw: DataFrame) -> Result<UsageTables> {
        let conformed = USAGE_SOURCE.conform(raw)?;
        let total = conformed.height();

        let plays = filter_eq(conformed.lazy(), PAGE, PLAY_PAGE);
        let events = with_time_columns(plays).collect()?;

        let users = users_table(events.clone().lazy(), self.users_policy).collect()?;
        let time = time_table(events.clone().lazy()).collect()?;

        info!(
            events = total,
            plays = events.height(),
            users = users.height(),
            time = time.height(),
            policy = ?self.users_policy,
            "Usage logs normalized"
        );

        Ok(UsageTables { users, time, events })
    }
}

pub fn users_table(plays: LazyFrame, policy: UsersPolicy) -> LazyFrame {
    match policy {
        UsersPolicy::History => {
            distinct(drop_null_keys(project(plays, &USERS_COLUMNS), USER_ID))
        }
        UsersPolicy::Latest => {
            // Ascending by ts with input order as the final key; the last row per user wins
            let ordered = drop_null_keys(plays, USER_ID)
                .with_row_index(INPUT_ORDER, None)
                .sort_by_exprs(
                    [col(USER_ID), col(TS), col(INPUT_ORDER)],
                    SortMultipleOptions::default(),
                )
                .unique_stable(Some(vec![USER_ID.to_string()]), UniqueKeepStrategy::Last);
            project(ordered, &USERS_COLUMNS)
        }
    }
}
