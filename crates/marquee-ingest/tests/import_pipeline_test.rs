//! End-to-end import tests over real gzip files

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use common::{test_config, title_line, write_dump, write_gzip, RecordingSink, HEADER};
use marquee_common::{IngestError, ValidRecord};
use marquee_ingest::{
    DirectoryEnumerator, FilterCriteria, ImportConfig, JsonLinesSink, Orchestrator,
};
use tempfile::TempDir;

fn orchestrator(
    config: ImportConfig,
    sink: Arc<RecordingSink>,
) -> Orchestrator<DirectoryEnumerator, RecordingSink> {
    let enumerator = DirectoryEnumerator::new(&config.import_directory, &config.file_extension);
    Orchestrator::new(config, enumerator, sink)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_five_files_two_lanes_each_record_once() {
    let dir = TempDir::new().unwrap();
    let counts = [10, 25, 3, 40, 7];
    for (i, count) in counts.iter().enumerate() {
        write_dump(dir.path(), &format!("f{i}_"), *count);
    }

    let sink = Arc::new(RecordingSink::default());
    let report = orchestrator(test_config(dir.path()), Arc::clone(&sink))
        .run()
        .await
        .unwrap();

    let expected: usize = counts.iter().sum();
    let ids = sink.ids();
    let unique: HashSet<&String> = ids.iter().collect();

    assert_eq!(ids.len(), expected);
    assert_eq!(unique.len(), expected);
    assert_eq!(report.stats.files_listed, 5);
    assert_eq!(report.stats.records_parsed, expected as u64);
    assert_eq!(report.stats.records_published, expected as u64);
    assert_eq!(report.stats.records_invalid, 0);
}

#[tokio::test]
async fn test_zero_files_is_a_successful_run() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("readme.txt"), "not a dump").unwrap();

    let sink = Arc::new(RecordingSink::default());
    let report = orchestrator(test_config(dir.path()), Arc::clone(&sink))
        .run()
        .await
        .unwrap();

    assert_eq!(report.stats.files_listed, 0);
    assert_eq!(report.stats.records_published, 0);
    assert!(sink.ids().is_empty());
}

#[tokio::test]
async fn test_missing_directory_fails_at_startup() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir.path().join("does-not-exist"));

    let err = orchestrator(config, Arc::new(RecordingSink::default()))
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::Enumeration { .. }));
}

#[tokio::test]
async fn test_criteria_filter_published_records() {
    let dir = TempDir::new().unwrap();
    let content = [
        HEADER.to_string(),
        title_line("tt001", "movie", "Comedy,Drama"),
        title_line("tt002", "movie", "Horror"),
        title_line("tt003", "short", "Comedy"),
        title_line("tt004", "movie", "comedy"),
        title_line("tt005", "movie", "Drama,Comedy"),
    ]
    .join("\n");
    write_gzip(dir.path(), "titles.tsv.gz", &content);

    let mut config = test_config(dir.path());
    config.criteria = Some(FilterCriteria::new("movie", "Comedy"));

    let sink = Arc::new(RecordingSink::default());
    let report = orchestrator(config, Arc::clone(&sink)).run().await.unwrap();

    assert_eq!(sink.ids(), vec!["tt001", "tt005"]);
    assert_eq!(report.stats.records_parsed, 5);
    assert_eq!(report.stats.records_accepted, 2);
}

#[tokio::test]
async fn test_invalid_lines_are_counted_not_published() {
    let dir = TempDir::new().unwrap();
    let content = [
        HEADER.to_string(),
        title_line("tt001", "movie", "Comedy"),
        "tt002\tmovie\ttruncated".to_string(),
        "tt003\tmovie\tA\tA\t0\tsoon\t\\N\t90\tComedy".to_string(),
        title_line("tt004", "movie", "Comedy"),
    ]
    .join("\n");
    write_gzip(dir.path(), "titles.tsv.gz", &content);

    let sink = Arc::new(RecordingSink::default());
    let report = orchestrator(test_config(dir.path()), Arc::clone(&sink))
        .run()
        .await
        .unwrap();

    assert_eq!(sink.ids(), vec!["tt001", "tt004"]);
    assert_eq!(report.stats.records_parsed, 4);
    assert_eq!(report.stats.records_invalid, 2);
}

#[tokio::test]
async fn test_corrupt_file_fails_the_run() {
    let dir = TempDir::new().unwrap();
    write_dump(dir.path(), "a_", 5);
    std::fs::write(dir.path().join("b_broken.tsv.gz"), b"definitely not gzip").unwrap();
    write_dump(dir.path(), "c_", 5);

    let err = orchestrator(test_config(dir.path()), Arc::new(RecordingSink::default()))
        .run()
        .await
        .unwrap_err();

    match err {
        IngestError::Resource { path, .. } => assert!(path.ends_with("b_broken.tsv.gz")),
        other => panic!("expected resource error, got {other}"),
    }
}

#[tokio::test]
async fn test_overlong_line_fails_the_run() {
    let dir = TempDir::new().unwrap();
    let content = format!(
        "{}\n{}\n{}\n",
        HEADER,
        title_line("tt001", "movie", "Comedy"),
        "x".repeat(2000)
    );
    write_gzip(dir.path(), "long.tsv.gz", &content);

    let err = orchestrator(test_config(dir.path()), Arc::new(RecordingSink::default()))
        .run()
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        IngestError::Framing {
            line: 3,
            max_length: 1064,
            ..
        }
    ));
}

#[tokio::test]
async fn test_publish_failure_fails_the_run() {
    let dir = TempDir::new().unwrap();
    write_dump(dir.path(), "a_", 50);

    let sink = Arc::new(RecordingSink::failing_on("a_00010"));
    let err = orchestrator(test_config(dir.path()), Arc::clone(&sink))
        .run()
        .await
        .unwrap_err();

    match err {
        IngestError::Publish { id, .. } => assert_eq!(id, "a_00010"),
        other => panic!("expected publish error, got {other}"),
    }
    assert!(sink.ids().len() < 50);
}

#[tokio::test]
async fn test_lines_to_skip_is_applied_per_file() {
    let dir = TempDir::new().unwrap();
    write_dump(dir.path(), "a_", 4);
    write_dump(dir.path(), "b_", 4);

    let mut config = test_config(dir.path());
    config.lines_to_skip = 3;

    let sink = Arc::new(RecordingSink::default());
    let report = orchestrator(config, Arc::clone(&sink)).run().await.unwrap();

    // Header plus two titles dropped from each file
    assert_eq!(report.stats.records_parsed, 4);
    assert_eq!(sink.ids(), vec!["a_00002", "a_00003", "b_00002", "b_00003"]);
}

#[tokio::test]
async fn test_json_lines_output() {
    let dir = TempDir::new().unwrap();
    let out_dir = TempDir::new().unwrap();
    write_dump(dir.path(), "a_", 3);

    let output = out_dir.path().join("published.jsonl");
    let sink = Arc::new(JsonLinesSink::create(&output).await.unwrap());
    let config = test_config(dir.path());
    let enumerator = DirectoryEnumerator::new(&config.import_directory, &config.file_extension);

    Orchestrator::new(config, enumerator, sink).run().await.unwrap();

    let mut ids: Vec<String> = std::fs::read_to_string(&output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str::<ValidRecord>(line).unwrap())
        .map(|record| record.id.unwrap())
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["a_00000", "a_00001", "a_00002"]);
}
