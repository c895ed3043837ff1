//! End-to-end supervisor tests: scripted source → multiplexer → storage
//! server → trail directory.

use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use prometheus::Registry;
use tokio::sync::mpsc;

use aviary_storage::{StorageConfig, StorageServer};
use aviary_stream::{EventSource, Multiplexer, StreamEvent};
use aviary_trail::Trail;
use tempfile::TempDir;

/// Upstream double: plays one script of events, optionally keeping the
/// stream open afterwards.
struct ScriptedSource {
    scripts: VecDeque<Vec<StreamEvent<String>>>,
    hold_open: bool,
}

impl ScriptedSource {
    fn new(events: Vec<StreamEvent<String>>, hold_open: bool) -> Self {
        Self {
            scripts: VecDeque::from([events]),
            hold_open,
        }
    }
}

#[async_trait]
impl EventSource for ScriptedSource {
    type Record = String;

    async fn open(
        &mut self,
        _terms: &[String],
    ) -> aviary_stream::Result<mpsc::Receiver<StreamEvent<String>>> {
        let events = self.scripts.pop_front().unwrap_or_default();
        let hold_open = self.hold_open;
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            for event in events {
                if tx.send(event).await.is_err() {
                    return;
                }
            }
            if hold_open {
                std::future::pending::<()>().await;
            }
        });
        Ok(rx)
    }
}

fn records(texts: &[&str]) -> Vec<StreamEvent<String>> {
    texts.iter().map(|t| StreamEvent::Record(t.to_string())).collect()
}

fn encode_upper(record: &String) -> anyhow::Result<Vec<u8>> {
    Ok(record.to_uppercase().into_bytes())
}

/// Everything persisted across all packed segments, chronological order.
fn read_back(dir: &Path) -> Vec<String> {
    let trail = Trail::open(dir, 0o644, true).unwrap();
    let mut entries = Vec::new();
    for name in trail.segment_names().unwrap() {
        let mut reader = trail.open_segment(&name).unwrap();
        while let Some(entry) = reader.next_entry().unwrap() {
            entries.push(String::from_utf8(entry.to_vec()).unwrap());
        }
    }
    entries
}

fn quick_config(dir: &Path) -> StorageConfig {
    StorageConfig {
        sync_interval: Duration::from_millis(20),
        pack_interval: Duration::from_millis(200),
        trim_check_interval: Duration::from_millis(200),
        ..StorageConfig::new(dir)
    }
}

fn counter_value(registry: &Registry, name: &str) -> u64 {
    registry
        .gather()
        .iter()
        .find(|family| family.get_name() == name)
        .map(|family| family.get_metric()[0].get_counter().get_value() as u64)
        .unwrap_or_default()
}

#[tokio::test]
async fn test_records_persist_across_stop() {
    let dir = TempDir::new().unwrap();
    let registry = Registry::new();

    let source = ScriptedSource::new(records(&["ola", "mundo", "hello"]), true);
    let (mux, handle) = Multiplexer::new(source, vec!["term".into()], &registry).unwrap();

    let server =
        StorageServer::new(quick_config(dir.path()), handle.clone(), encode_upper, &registry)
            .unwrap();
    let stop = server.shutdown_handle();
    let running = tokio::spawn(server.serve());

    // Let the server subscribe before events start flowing.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let serving = tokio::spawn(mux.serve());
    tokio::time::sleep(Duration::from_millis(150)).await;

    stop.request_stop();
    running.await.unwrap().unwrap();
    handle.stop().await;
    serving.await.unwrap();

    assert_eq!(read_back(dir.path()), vec!["OLA", "MUNDO", "HELLO"]);
    assert_eq!(counter_value(&registry, "entries_written"), 3);
    assert_eq!(counter_value(&registry, "bytes_written"), "OLAMUNDOHELLO".len() as u64);
}

#[tokio::test]
async fn test_upstream_close_triggers_final_flush() {
    let dir = TempDir::new().unwrap();
    let registry = Registry::new();

    let mut events = records(&["first", "second"]);
    events.push(StreamEvent::Disconnect {
        reason: "gone".into(),
    });
    let source = ScriptedSource::new(events, false);
    let (mux, handle) = Multiplexer::new(source, vec!["term".into()], &registry).unwrap();

    let config = StorageConfig {
        // Sync far in the future: only the close-path flush can persist.
        sync_interval: Duration::from_secs(3600),
        pack_interval: Duration::from_secs(3600),
        trim_check_interval: Duration::from_secs(3600),
        ..StorageConfig::new(dir.path())
    };
    let server = StorageServer::new(config, handle.clone(), encode_upper, &registry).unwrap();
    let running = tokio::spawn(server.serve());

    tokio::time::sleep(Duration::from_millis(50)).await;
    mux.serve().await; // disconnect closes every sink

    running.await.unwrap().unwrap();
    assert_eq!(read_back(dir.path()), vec!["FIRST", "SECOND"]);
}

#[tokio::test]
async fn test_batch_size_forces_flush_without_sync_tick() {
    let dir = TempDir::new().unwrap();
    let registry = Registry::new();

    let source = ScriptedSource::new(records(&["a", "b", "c", "d"]), true);
    let (mux, handle) = Multiplexer::new(source, vec!["term".into()], &registry).unwrap();

    let config = StorageConfig {
        sync_interval: Duration::from_secs(3600),
        pack_interval: Duration::from_secs(3600),
        trim_check_interval: Duration::from_secs(3600),
        batch_size: 2,
        ..StorageConfig::new(dir.path())
    };
    let server = StorageServer::new(config, handle.clone(), encode_upper, &registry).unwrap();
    let stop = server.shutdown_handle();
    let running = tokio::spawn(server.serve());

    tokio::time::sleep(Duration::from_millis(50)).await;
    let serving = tokio::spawn(mux.serve());

    // Both two-record batches flush on arrival, ahead of any timer.
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(counter_value(&registry, "entries_written"), 4);

    stop.request_stop();
    running.await.unwrap().unwrap();
    handle.stop().await;
    serving.await.unwrap();

    assert_eq!(read_back(dir.path()), vec!["A", "B", "C", "D"]);
}

#[tokio::test]
async fn test_encode_failure_skips_record() {
    let dir = TempDir::new().unwrap();
    let registry = Registry::new();

    let source = ScriptedSource::new(records(&["good", "poison", "fine"]), true);
    let (mux, handle) = Multiplexer::new(source, vec!["term".into()], &registry).unwrap();

    let encode = |record: &String| -> anyhow::Result<Vec<u8>> {
        if record == "poison" {
            anyhow::bail!("unconvertible record");
        }
        Ok(record.clone().into_bytes())
    };
    let server =
        StorageServer::new(quick_config(dir.path()), handle.clone(), encode, &registry).unwrap();
    let stop = server.shutdown_handle();
    let running = tokio::spawn(server.serve());

    tokio::time::sleep(Duration::from_millis(50)).await;
    let serving = tokio::spawn(mux.serve());
    tokio::time::sleep(Duration::from_millis(150)).await;

    stop.request_stop();
    running.await.unwrap().unwrap();
    handle.stop().await;
    serving.await.unwrap();

    assert_eq!(read_back(dir.path()), vec!["good", "fine"]);
    assert_eq!(counter_value(&registry, "entries_written"), 2);
}

#[tokio::test]
async fn test_zero_budget_trims_every_packed_segment() {
    let dir = TempDir::new().unwrap();
    let registry = Registry::new();

    let source = ScriptedSource::new(records(&["one", "two", "three"]), true);
    let (mux, handle) = Multiplexer::new(source, vec!["term".into()], &registry).unwrap();

    let config = StorageConfig {
        sync_interval: Duration::from_millis(20),
        pack_interval: Duration::from_millis(60),
        trim_check_interval: Duration::from_millis(100),
        disk_budget: 0,
        ..StorageConfig::new(dir.path())
    };
    let server = StorageServer::new(config, handle.clone(), encode_upper, &registry).unwrap();
    let stop = server.shutdown_handle();
    let running = tokio::spawn(server.serve());

    tokio::time::sleep(Duration::from_millis(50)).await;
    let serving = tokio::spawn(mux.serve());

    // Records flush at ~20ms, pack at ~60ms, trim at ~100ms. By 400ms the
    // packed segment has been trimmed away and nothing new arrived.
    tokio::time::sleep(Duration::from_millis(400)).await;

    stop.request_stop();
    running.await.unwrap().unwrap();
    handle.stop().await;
    serving.await.unwrap();

    // All three records were written and all packed data was trimmed.
    assert_eq!(counter_value(&registry, "entries_written"), 3);
    assert!(read_back(dir.path()).is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn test_trim_failure_is_fatal() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let registry = Registry::new();

    let source = ScriptedSource::new(records(&["doomed"]), true);
    let (mux, handle) = Multiplexer::new(source, vec!["term".into()], &registry).unwrap();

    let config = StorageConfig {
        sync_interval: Duration::from_millis(20),
        pack_interval: Duration::from_millis(60),
        trim_check_interval: Duration::from_millis(200),
        disk_budget: 0,
        ..StorageConfig::new(dir.path())
    };
    let server = StorageServer::new(config, handle.clone(), encode_upper, &registry).unwrap();
    let running = tokio::spawn(server.serve());

    tokio::time::sleep(Duration::from_millis(50)).await;
    let serving = tokio::spawn(mux.serve());

    // Wait for the record to be flushed and packed, then make the directory
    // read-only so the trim's unlink fails.
    tokio::time::sleep(Duration::from_millis(120)).await;
    let mut perms = std::fs::metadata(dir.path()).unwrap().permissions();
    perms.set_mode(0o555);
    std::fs::set_permissions(dir.path(), perms).unwrap();

    let result = running.await.unwrap();
    assert!(result.is_err(), "trim failure must terminate the supervisor");

    let mut perms = std::fs::metadata(dir.path()).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(dir.path(), perms).unwrap();

    handle.stop().await;
    serving.await.unwrap();
}
