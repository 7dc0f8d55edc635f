//! Integration tests for the connection store and its retention policy.

use chrono::{DateTime, Duration, TimeZone, Utc};
use lightsocks_monitor::{ConnectionStore, RawConnection, Settings, SettingsStore, Snapshot};
use std::sync::Arc;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

fn at(secs: i64) -> DateTime<Utc> {
    t0() + Duration::seconds(secs)
}

fn snapshot(ids: &[&str]) -> Snapshot {
    Snapshot {
        upload_total: 0,
        download_total: 0,
        connections: ids
            .iter()
            .map(|id| RawConnection {
                id: Some(id.to_string()),
                ..Default::default()
            })
            .collect(),
    }
}

fn memory_store(keep_closed: bool) -> ConnectionStore {
    ConnectionStore::new(Arc::new(SettingsStore::in_memory(Settings {
        keep_closed_connections: keep_closed,
        ..Settings::default()
    })))
}

fn ids(store: &ConnectionStore) -> Vec<String> {
    store.view().rows.iter().map(|r| r.id.clone()).collect()
}

#[test]
fn test_retention_on_keeps_closed_rows() {
    let store = memory_store(true);
    store.feed_at(&snapshot(&["a", "b"]), at(0));
    store.feed_at(&snapshot(&["b"]), at(1));

    let view = store.view();
    assert_eq!(ids(&store), vec!["a", "b"]);
    assert!(view.find("a").unwrap().completed);
    assert_eq!(view.open_count(), 1);
    assert_eq!(view.closed_count(), 1);
}

#[test]
fn test_retention_off_drops_rows_in_same_cycle() {
    let store = memory_store(false);
    store.feed_at(&snapshot(&["a", "b"]), at(0));
    store.feed_at(&snapshot(&["b"]), at(1));

    assert_eq!(ids(&store), vec!["b"]);
    assert_eq!(store.view().closed_count(), 0);
}

#[test]
fn test_toggle_off_purges_and_on_does_not_resurrect() {
    let store = memory_store(true);
    store.feed_at(&snapshot(&["a", "b"]), at(0));
    store.feed_at(&snapshot(&["b"]), at(1));
    assert_eq!(store.view().closed_count(), 1);

    assert!(!store.toggle_save());
    assert_eq!(ids(&store), vec!["b"]);

    assert!(store.toggle_save());
    assert_eq!(ids(&store), vec!["b"]);
    assert!(store.view().keep_closed);

    // Rows closing from now on are kept again
    store.feed_at(&snapshot(&[]), at(2));
    assert_eq!(store.view().closed_count(), 1);
}

#[test]
fn test_toggle_is_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");

    let settings = Arc::new(SettingsStore::load(&path).unwrap());
    let store = ConnectionStore::new(Arc::clone(&settings));
    assert!(store.keep_closed());
    store.toggle_save();

    let reloaded = SettingsStore::load(&path).unwrap();
    assert!(!reloaded.get().keep_closed_connections);

    // A fresh store starts from the persisted flag
    let store = ConnectionStore::new(Arc::new(reloaded));
    assert!(!store.keep_closed());
}

#[tokio::test]
async fn test_subscribers_see_every_change() {
    let store = memory_store(true);
    let mut rx = store.subscribe();

    store.feed_at(&snapshot(&["a"]), at(0));
    rx.changed().await.unwrap();
    let first = rx.borrow_and_update().revision;

    store.toggle_save();
    rx.changed().await.unwrap();
    let view = rx.borrow_and_update().clone();
    assert!(view.revision > first);
    assert!(!view.keep_closed);
}

#[test]
fn test_restart_counter_in_view() {
    let store = memory_store(true);
    store.feed_at(&snapshot(&["a"]), at(0));
    store.note_stream_restart();
    store.feed_at(&snapshot(&[]), at(5));

    let view = store.view();
    assert_eq!(view.stream_restarts, 1);
    assert!(view.find("a").unwrap().completed);
    assert_eq!(view.updated_at, Some(at(5)));
}

fn counters(id: &str, upload: u64) -> Snapshot {
    Snapshot {
        connections: vec![RawConnection {
            id: Some(id.to_string()),
            upload,
            start: Some(t0()),
            ..Default::default()
        }],
        ..Default::default()
    }
}

#[test]
fn test_end_to_end_with_and_without_retention() {
    for keep_closed in [true, false] {
        let store = memory_store(keep_closed);

        store.feed_at(&counters("c1", 0), at(0));
        let row = store.find("c1").unwrap();
        assert_eq!((row.upload_speed, row.download_speed), (0.0, 0.0));

        store.feed_at(&counters("c1", 500), at(1));
        let row = store.find("c1").unwrap();
        assert!((row.upload_speed - 500.0).abs() < 1e-9);

        let outcome = store.feed_at(&snapshot(&[]), at(2));
        assert_eq!(outcome.completed, vec!["c1".to_string()]);
        match store.find("c1") {
            Some(row) => {
                assert!(keep_closed);
                assert!(row.completed);
                assert_eq!((row.upload_speed, row.download_speed), (0.0, 0.0));
            }
            None => assert!(!keep_closed),
        }
    }
}

#[test]
fn test_concurrent_toggles_are_not_lost() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    let store = ConnectionStore::new(Arc::new(SettingsStore::load(&path).unwrap()));
    assert!(store.keep_closed());

    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                for _ in 0..50 {
                    store.toggle_save();
                }
            });
        }
    });

    // An even number of flips lands back on the starting value
    assert!(store.keep_closed());
    assert!(store.view().keep_closed);
    let persisted = SettingsStore::load(&path).unwrap().get();
    assert_eq!(persisted.keep_closed_connections, store.keep_closed());
}
