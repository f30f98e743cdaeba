use polars::prelude::*;
use songplays_etl::reconcile::MatchStrategy;
use songplays_etl::storage::SUCCESS_MARKER;
use songplays_etl::usage::UsersPolicy;
use songplays_etl::{EtlConfig, EtlError, Pipeline};
use std::fs;
use std::path::{Path, PathBuf};

const ELENA_SONG: &str = r#"{"num_songs": 1, "artist_id": "AR5KOSW1187FB35FF4", "artist_latitude": 49.80388, "artist_longitude": 15.47491, "artist_location": "Dubai UAE", "artist_name": "Elena", "song_id": "SOZCTXZ12AB0182364", "title": "Setanta matins", "duration": 269.58322, "year": 0}"#;
const CLP_SONG: &str = r#"{"num_songs": 1, "artist_id": "ARNTLGG11E2835DDB9", "artist_latitude": null, "artist_longitude": null, "artist_location": "", "artist_name": "Clp", "song_id": "SOUDSGM12AC9618304", "title": "Insatiable (Instrumental Version)", "duration": 266.39628, "year": 0}"#;

fn log_line(user: &str, level: &str, page: &str, artist: &str, song: &str, length: f64, session: i64, ts: i64) -> String {
    serde_json::json!({
        "artist": artist,
        "auth": "Logged In",
        "firstName": "Lily",
        "gender": "F",
        "itemInSession": 0,
        "lastName": "Koch",
        "length": length,
        "level": level,
        "location": "Chicago-Naperville-Elgin, IL-IN-WI",
        "method": "PUT",
        "page": page,
        "registration": 1541048010796.0,
        "sessionId": session,
        "song": song,
        "status": 200,
        "ts": ts,
        "userAgent": "Mozilla/5.0",
        "userId": user,
    })
    .to_string()
}

/// Lay out song and log files the way the default patterns expect them
fn write_fixtures(input: &Path, songs: &[&str], logs: &[String]) {
    let song_dir = input.join("song_data/A/A/A");
    fs::create_dir_all(&song_dir).unwrap();
    for (i, song) in songs.iter().enumerate() {
        fs::write(song_dir.join(format!("TRAAAAA{:03}.json", i)), song).unwrap();
    }

    let log_dir = input.join("log_data/2018/11");
    fs::create_dir_all(&log_dir).unwrap();
    fs::write(log_dir.join("2018-11-15-events.json"), logs.join("\n")).unwrap();
}

fn config_for(root: &Path) -> EtlConfig {
    EtlConfig {
        input_root: root.join("input"),
        output_root: root.join("output"),
        ..Default::default()
    }
}

fn parquet_files(dir: &Path) -> Vec<PathBuf> {
    let pattern = format!("{}/**/*.parquet", dir.display());
    let mut files: Vec<PathBuf> = glob::glob(&pattern).unwrap().map(|p| p.unwrap()).collect();
    files.sort();
    files
}

/// Every part file of a table, stacked
fn read_table(dir: &Path) -> DataFrame {
    let mut frames = parquet_files(dir).into_iter().map(|path| {
        let file = fs::File::open(&path).unwrap();
        ParquetReader::new(file).finish().unwrap()
    });
    let mut table = frames.next().expect("table has no part files");
    for frame in frames {
        table.vstack_mut(&frame).unwrap();
    }
    table
}

/// Every row of every part file carries the partition values named by its directory
fn assert_partitions_match(table_dir: &Path, partition_by: &[&str], expected_files: usize) {
    let files = parquet_files(table_dir);
    assert_eq!(files.len(), expected_files, "{}", table_dir.display());
    for path in files {
        let rel = format!("/{}", path.strip_prefix(table_dir).unwrap().to_string_lossy());
        let part = ParquetReader::new(fs::File::open(&path).unwrap()).finish().unwrap();
        assert!(part.height() > 0);
        for name in partition_by {
            let values = part.column(name).unwrap().cast(&DataType::String).unwrap();
            for value in values.str().unwrap().into_iter() {
                let segment = format!("/{}={}/", name, value.unwrap());
                assert!(rel.contains(&segment), "{rel} does not contain {segment}");
            }
        }
    }
}

#[test]
fn test_single_matching_play_builds_star_schema() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(dir.path());
    write_fixtures(
        &config.input_root,
        &[ELENA_SONG, CLP_SONG],
        &[
            log_line("26", "free", "NextSong", "Elena", "Setanta matins", 269.58322, 583, 1542241826796),
            log_line("26", "free", "Home", "", "", 0.0, 583, 1542241826999),
            log_line("26", "free", "NextSong", "Des'ree", "You Gotta Be", 246.30812, 583, 1542242481796),
        ],
    );

    let summary = Pipeline::from_config(config.clone()).unwrap().run().unwrap();

    assert_eq!(summary.reconciliation.play_events, 2);
    assert_eq!(summary.reconciliation.songplays, 1);
    assert_eq!(summary.reconciliation.dropped_events, 1);

    let songplays = read_table(&config.output_root.join("songplays"));
    assert_eq!(songplays.height(), 1);
    let ids = songplays.column("songplay_id").unwrap().i64().unwrap();
    assert_eq!(ids.get(0), Some(1));
    let songs = songplays.column("song_id").unwrap().str().unwrap();
    assert_eq!(songs.get(0), Some("SOZCTXZ12AB0182364"));
    let artists = songplays.column("artist_id").unwrap().str().unwrap();
    assert_eq!(artists.get(0), Some("AR5KOSW1187FB35FF4"));

    assert!(config.output_root.join("songplays/year=2018/month=11").is_dir());
    assert!(config.output_root.join("time/year=2018/month=11").is_dir());
    assert!(config.output_root.join("songs/year=0/artist_id=AR5KOSW1187FB35FF4").is_dir());

    // Only plays feed the time table
    let time = read_table(&config.output_root.join("time"));
    assert_eq!(time.height(), 2);

    let artists = read_table(&config.output_root.join("artists"));
    assert_eq!(artists.height(), 2);

    for table in ["songs", "artists", "users", "time", "songplays"] {
        assert!(config.output_root.join(table).join(SUCCESS_MARKER).is_file(), "{table} not marked complete");
        assert!(summary.tables.contains_key(table));
    }
}

#[test]
fn test_duplicate_catalog_entries_yield_one_fact_row() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(dir.path());
    let twin = ELENA_SONG
        .replace("SOZCTXZ12AB0182364", "SOAAAAA12AB0182364")
        .replace("AR5KOSW1187FB35FF4", "AR0000001187FB35FF4");
    write_fixtures(
        &config.input_root,
        &[ELENA_SONG, &twin],
        &[log_line("26", "free", "NextSong", "Elena", "Setanta matins", 269.58322, 583, 1542241826796)],
    );

    let summary = Pipeline::from_config(config.clone()).unwrap().run().unwrap();

    assert_eq!(summary.reconciliation.fanout_events, 1);
    let songplays = read_table(&config.output_root.join("songplays"));
    assert_eq!(songplays.height(), 1);
    let songs = songplays.column("song_id").unwrap().str().unwrap();
    assert_eq!(songs.get(0), Some("SOAAAAA12AB0182364"));
}

#[test]
fn test_partition_directories_agree_with_file_contents() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(dir.path());
    write_fixtures(
        &config.input_root,
        &[ELENA_SONG, CLP_SONG],
        &[
            log_line("26", "free", "NextSong", "Elena", "Setanta matins", 269.58322, 583, 1542241826796),
            log_line("8", "paid", "NextSong", "Clp", "Insatiable (Instrumental Version)", 266.39628, 139, 1541106106796),
        ],
    );

    Pipeline::from_config(config.clone()).unwrap().run().unwrap();

    assert_partitions_match(&config.output_root.join("songs"), &["year", "artist_id"], 2);
    assert_partitions_match(&config.output_root.join("time"), &["year", "month"], 1);
    let songplays_dir = config.output_root.join("songplays");
    assert_partitions_match(&songplays_dir, &["year", "month"], 1);

    let songplays = read_table(&songplays_dir);
    let ids = songplays.column("songplay_id").unwrap().i64().unwrap();
    let mut ids: Vec<i64> = ids.into_iter().map(|v| v.unwrap()).collect();
    ids.sort();
    assert_eq!(ids, vec![1, 2]);
}

#[test]
fn test_users_table_is_distinct() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(dir.path());
    write_fixtures(
        &config.input_root,
        &[ELENA_SONG],
        &[
            log_line("26", "free", "NextSong", "Elena", "Setanta matins", 269.58322, 583, 1542241826796),
            log_line("26", "free", "NextSong", "Elena", "Setanta matins", 269.58322, 583, 1542242026796),
            log_line("26", "paid", "NextSong", "Elena", "Setanta matins", 269.58322, 584, 1542243026796),
        ],
    );

    Pipeline::from_config(config.clone()).unwrap().run().unwrap();
    let users = read_table(&config.output_root.join("users"));
    assert_eq!(users.height(), 2);

    let latest = EtlConfig {
        users_policy: UsersPolicy::Latest,
        ..config.clone()
    };
    Pipeline::from_config(latest).unwrap().run().unwrap();
    let users = read_table(&config.output_root.join("users"));
    assert_eq!(users.height(), 1);
    let levels = users.column("level").unwrap().str().unwrap();
    assert_eq!(levels.get(0), Some("paid"));
}

#[test]
fn test_duration_strategy_rejects_mismatched_length() {
    let dir = tempfile::tempdir().unwrap();
    let config = EtlConfig {
        match_strategy: MatchStrategy::ArtistTitleDuration,
        ..config_for(dir.path())
    };
    write_fixtures(
        &config.input_root,
        &[ELENA_SONG],
        &[log_line("26", "free", "NextSong", "Elena", "Setanta matins", 180.0, 583, 1542241826796)],
    );

    let summary = Pipeline::from_config(config.clone()).unwrap().run().unwrap();

    assert_eq!(summary.reconciliation.songplays, 0);
    assert!(config.output_root.join("songplays").join(SUCCESS_MARKER).is_file());
}

#[test]
fn test_rerun_overwrites_previous_output() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(dir.path());
    write_fixtures(
        &config.input_root,
        &[ELENA_SONG],
        &[log_line("26", "free", "NextSong", "Elena", "Setanta matins", 269.58322, 583, 1542241826796)],
    );

    let pipeline = Pipeline::from_config(config.clone()).unwrap();
    pipeline.run().unwrap();
    let first = read_table(&config.output_root.join("songplays"));
    pipeline.run().unwrap();
    let second = read_table(&config.output_root.join("songplays"));

    assert_eq!(parquet_files(&config.output_root.join("songplays")).len(), 1);
    assert!(first.equals_missing(&second));
}

#[test]
fn test_missing_source_files_fail_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(dir.path());
    fs::create_dir_all(&config.input_root).unwrap();

    let result = Pipeline::from_config(config.clone()).unwrap().run();

    assert!(matches!(result, Err(EtlError::SourceRead(_))));
    assert!(!config.output_root.join("songs").exists());
}

#[test]
fn test_song_records_without_song_id_are_a_schema_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(dir.path());
    write_fixtures(
        &config.input_root,
        &[r#"{"title": "Setanta matins", "artist_id": "AR5KOSW1187FB35FF4", "artist_name": "Elena"}"#],
        &[log_line("26", "free", "NextSong", "Elena", "Setanta matins", 269.58322, 583, 1542241826796)],
    );

    let result = Pipeline::from_config(config).unwrap().run();

    assert!(matches!(result, Err(EtlError::SchemaMismatch(_))));
}
