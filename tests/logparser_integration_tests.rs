// SPDX-License-Identifier: Apache-2.0

//! End-to-end tests for the logparser receiver: real files on disk, real
//! tail threads and dispatchers, measurements read back from the accumulator.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use logparser::receivers::logparser::{
    FieldValue, GrokParserConfig, LogParserConfig, LogParserReceiver, Measurement,
    MeasurementReceiver, StartError, WatchMode, accumulator,
};
use tempfile::TempDir;
use tokio::time::timeout;

const TEST_TIMEOUT: Duration = Duration::from_secs(10);

fn config(files: Vec<String>, grok: Option<GrokParserConfig>) -> LogParserConfig {
    LogParserConfig {
        files,
        from_beginning: true,
        grok,
        watch_mode: WatchMode::Poll,
        poll_interval_ms: 20,
        ..Default::default()
    }
}

fn glob_in(dir: &TempDir, pattern: &str) -> String {
    format!("{}/{}", dir.path().display(), pattern)
}

fn append(path: &Path, text: &str) {
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .unwrap();
    f.write_all(text.as_bytes()).unwrap();
    f.flush().unwrap();
}

async fn collect(rx: &mut MeasurementReceiver, n: usize) -> Vec<Measurement> {
    let mut out = Vec::with_capacity(n);
    while out.len() < n {
        match timeout(TEST_TIMEOUT, rx.next()).await {
            Ok(Some(m)) => out.push(m),
            Ok(None) => break,
            Err(_) => panic!("timed out after {} of {} measurements", out.len(), n),
        }
    }
    out
}

#[tokio::test]
async fn test_clientip_scenario() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("access.log");
    fs::write(&log, "10.0.0.1 GET\n").unwrap();

    let grok = GrokParserConfig {
        tag_keys: vec!["clientip".into()],
        ..GrokParserConfig::new("%{IPORHOST:clientip} %{WORD:verb}")
    };
    let (acc, mut rx) = accumulator::bounded(100);
    let running = LogParserReceiver::new(config(vec![glob_in(&dir, "*.log")], Some(grok)))
        .start(acc)
        .await
        .unwrap();

    let got = collect(&mut rx, 1).await;
    let m = &got[0];
    assert_eq!(m.name, "grok");
    assert_eq!(m.tags.len(), 1);
    assert_eq!(m.tag("clientip"), Some("10.0.0.1"));
    assert_eq!(m.fields.len(), 1);
    assert_eq!(m.field("verb"), Some(&FieldValue::String("GET".into())));

    let stopped = running.stop().await;
    assert_eq!(stopped.stats().measurements, 1);
}

#[tokio::test]
async fn test_apache_log_typed_fields() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("access.log");
    fs::write(
        &log,
        "127.0.0.1 - frank [10/Oct/2000:13:55:36 -0700] \"GET /apache_pb.gif HTTP/1.0\" 200 2326 \"http://www.example.com/start.html\" \"Mozilla/4.08\"\n",
    )
    .unwrap();

    let grok = GrokParserConfig {
        tag_keys: vec!["verb".into()],
        field_keys_int: vec!["response".into(), "bytes".into()],
        field_keys_float: vec!["http*".into()],
        ..GrokParserConfig::new("%{COMBINEDAPACHELOG}")
    };
    let (acc, mut rx) = accumulator::bounded(100);
    let running = LogParserReceiver::new(config(vec![glob_in(&dir, "*.log")], Some(grok)))
        .start(acc)
        .await
        .unwrap();

    let got = collect(&mut rx, 1).await;
    let m = &got[0];
    assert_eq!(m.tag("verb"), Some("GET"));
    assert_eq!(m.field("response"), Some(&FieldValue::Integer(200)));
    assert_eq!(m.field("bytes"), Some(&FieldValue::Integer(2326)));
    assert_eq!(m.field("httpversion"), Some(&FieldValue::Float(1.0)));
    assert_eq!(
        m.field("clientip"),
        Some(&FieldValue::String("127.0.0.1".into()))
    );
    assert!(m.field("verb").is_none());

    running.stop().await;
}

#[tokio::test]
async fn test_follows_appended_lines_in_order() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("app.log");
    fs::write(&log, "old 1\n").unwrap();

    let mut cfg = config(
        vec![glob_in(&dir, "*.log")],
        Some(GrokParserConfig::new("%{WORD:word} %{INT:n}")),
    );
    cfg.from_beginning = false;
    cfg.grok.as_mut().unwrap().field_keys_int = vec!["n".into()];

    let (acc, mut rx) = accumulator::bounded(100);
    let running = LogParserReceiver::new(cfg).start(acc).await.unwrap();

    append(&log, "new 1\nnew 2\n");
    append(&log, "new 3\n");

    let got = collect(&mut rx, 3).await;
    let ns: Vec<_> = got.iter().map(|m| m.field("n").cloned()).collect();
    assert_eq!(
        ns,
        vec![
            Some(FieldValue::Integer(1)),
            Some(FieldValue::Integer(2)),
            Some(FieldValue::Integer(3)),
        ]
    );
    assert!(got.iter().all(|m| m.field("word") == Some(&FieldValue::String("new".into()))));

    running.stop().await;
}

#[tokio::test]
async fn test_non_matching_lines_are_skipped() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("app.log");
    fs::write(&log, "!!! nothing here\nok 7\n").unwrap();

    let (acc, mut rx) = accumulator::bounded(100);
    let running = LogParserReceiver::new(config(
        vec![glob_in(&dir, "*.log")],
        Some(GrokParserConfig::new("^%{WORD:word} %{INT:n}$")),
    ))
    .start(acc)
    .await
    .unwrap();

    let got = collect(&mut rx, 1).await;
    assert_eq!(got[0].field("word"), Some(&FieldValue::String("ok".into())));

    let stopped = running.stop().await;
    assert_eq!(stopped.stats().lines, 2);
    assert_eq!(stopped.stats().parse_errors, 1);
    assert!(rx.is_empty());
}

#[tokio::test]
async fn test_start_without_parsers_opens_nothing() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.log"), "a\n").unwrap();

    let (acc, rx) = accumulator::bounded(100);
    let res = LogParserReceiver::new(config(vec![glob_in(&dir, "*.log")], None))
        .start(acc)
        .await;

    let err = res.err().unwrap();
    assert!(matches!(err, StartError::NoParsers));
    assert_eq!(err.to_string(), "logparser input plugin: no parsers defined");
    // The accumulator was dropped with the failed start, nothing was sent.
    assert!(rx.is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn test_unopenable_file_does_not_stop_others() {
    let dir = TempDir::new().unwrap();
    let good = dir.path().join("good.log");
    fs::write(&good, "good 1\n").unwrap();
    let broken = dir.path().join("broken.log");
    std::os::unix::fs::symlink(dir.path().join("missing-target"), &broken).unwrap();

    let (acc, mut rx) = accumulator::bounded(100);
    let running = LogParserReceiver::new(config(
        vec![glob_in(&dir, "*.log")],
        Some(GrokParserConfig::new("%{WORD:word} %{INT:n}")),
    ))
    .start(acc)
    .await
    .unwrap();

    let errors = running.open_errors().expect("combined open error");
    assert_eq!(errors.len(), 1);
    assert!(errors.to_string().contains("broken.log"));
    assert_eq!(running.sessions().len(), 1);

    let got = collect(&mut rx, 1).await;
    assert_eq!(got[0].field("word"), Some(&FieldValue::String("good".into())));

    running.stop().await;
}

#[tokio::test]
async fn test_recursive_glob_and_multiple_files() {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("a").join("b");
    fs::create_dir_all(&nested).unwrap();
    fs::write(dir.path().join("top.log"), "top 1\n").unwrap();
    fs::write(nested.join("deep.log"), "deep 2\n").unwrap();
    fs::write(nested.join("ignored.txt"), "nope 3\n").unwrap();

    let (acc, mut rx) = accumulator::bounded(100);
    let running = LogParserReceiver::new(config(
        vec![glob_in(&dir, "**/*.log"), glob_in(&dir, "top.log")],
        Some(GrokParserConfig::new("%{WORD:word} %{INT:n}")),
    ))
    .start(acc)
    .await
    .unwrap();
    assert_eq!(running.sessions().len(), 2);

    let got = collect(&mut rx, 2).await;
    let mut words: Vec<_> = got
        .iter()
        .filter_map(|m| match m.field("word") {
            Some(FieldValue::String(s)) => Some(s.clone()),
            _ => None,
        })
        .collect();
    words.sort();
    assert_eq!(words, vec!["deep", "top"]);

    running.stop().await;
}

#[tokio::test]
async fn test_stop_stops_sessions_and_joins_dispatchers() {
    let dir = TempDir::new().unwrap();
    for name in ["a.log", "b.log", "c.log"] {
        fs::write(dir.path().join(name), format!("{} 1\n", &name[..1])).unwrap();
    }

    let (acc, mut rx) = accumulator::bounded(100);
    let running = LogParserReceiver::new(config(
        vec![glob_in(&dir, "*.log")],
        Some(GrokParserConfig::new("%{WORD:word} %{INT:n}")),
    ))
    .start(acc)
    .await
    .unwrap();
    collect(&mut rx, 3).await;

    let stopped = timeout(TEST_TIMEOUT, running.stop()).await.unwrap();
    assert_eq!(stopped.dispatchers_joined(), 3);
    assert_eq!(stopped.sessions().len(), 3);
    assert!(
        stopped
            .sessions()
            .iter()
            .all(|s| s.is_stopped() && s.is_released())
    );

    // Every dispatcher held a clone of the accumulator; once they are joined
    // the queue reports closed.
    assert!(timeout(TEST_TIMEOUT, rx.next()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_custom_patterns_from_file_and_inline() {
    let dir = TempDir::new().unwrap();
    let patterns = dir.path().join("patterns");
    fs::write(&patterns, "# service patterns\nSERVICE [a-z]+-svc\n").unwrap();
    fs::write(dir.path().join("svc.log"), "auth-svc took 12.5ms\n").unwrap();

    let grok = GrokParserConfig {
        custom_patterns: "DURATION %{NUMBER:took}ms".into(),
        custom_pattern_file: Some(patterns),
        tag_keys: vec!["service".into()],
        field_keys_float: vec!["took".into()],
        measurement: Some("services".into()),
        ..GrokParserConfig::new("%{SERVICE:service} took %{DURATION}")
    };
    let (acc, mut rx) = accumulator::bounded(100);
    let running = LogParserReceiver::new(config(vec![glob_in(&dir, "*.log")], Some(grok)))
        .start(acc)
        .await
        .unwrap();

    let got = collect(&mut rx, 1).await;
    assert_eq!(got[0].name, "services");
    assert_eq!(got[0].tag("service"), Some("auth-svc"));
    assert_eq!(got[0].field("took"), Some(&FieldValue::Float(12.5)));

    running.stop().await;
}
