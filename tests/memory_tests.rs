//! External tests for the memory log: cap, ordering, eviction, persistence.

use draco_client::memory::{MemoryLog, MAX_MEMORY, MEMORY_KEY};
use draco_client::render::{CaptureRender, RenderEvent};
use draco_client::store::{JsonFileStore, KeyValueStore, MemoryStore};
use proptest::prelude::*;

fn mem_log() -> MemoryLog {
    MemoryLog::new(Box::new(MemoryStore::new()))
}

// -- eviction scenario -------------------------------------------------------

#[test]
fn test_forty_one_entries_keep_m41_down_to_m2() {
    let mut log = mem_log();
    for i in 1..=41 {
        log.record(format!("m{i}")).unwrap();
    }
    let entries = log.entries();
    assert_eq!(entries.len(), 40);
    for (idx, entry) in entries.iter().enumerate() {
        assert_eq!(entry.text, format!("m{}", 41 - idx));
    }
}

#[test]
fn test_cap_holds_from_the_first_record() {
    let mut log = mem_log();
    log.record("only one").unwrap();
    assert!(log.entries().len() <= MAX_MEMORY);
    assert_eq!(log.entries().len(), 1);
}

// -- clear + render -----------------------------------------------------------

#[test]
fn test_clear_then_render_yields_empty_list() {
    let mut log = mem_log();
    for i in 0..10 {
        log.record(format!("line {i}")).unwrap();
    }
    log.clear().unwrap();

    let mut render = CaptureRender::new();
    log.render(&mut render);
    assert_eq!(render.events, vec![RenderEvent::Memory(vec![])]);
}

// -- persistence across sessions ------------------------------------------------

#[test]
fn test_memory_survives_a_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    {
        let mut log = MemoryLog::new(Box::new(JsonFileStore::open(&path)));
        log.record("You: remember this").unwrap();
        log.record("Draco: noted").unwrap();
    }
    let log = MemoryLog::new(Box::new(JsonFileStore::open(&path)));
    let entries = log.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].text, "Draco: noted");
    assert_eq!(entries[1].text, "You: remember this");
}

#[test]
fn test_externally_corrupted_state_reads_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    {
        let mut log = MemoryLog::new(Box::new(JsonFileStore::open(&path)));
        log.record("You: hello").unwrap();
    }
    // Someone scribbles over the stored value.
    {
        let mut store = JsonFileStore::open(&path);
        store.set(MEMORY_KEY, "{]").unwrap();
    }
    let mut log = MemoryLog::new(Box::new(JsonFileStore::open(&path)));
    assert!(log.entries().is_empty());
    // And the log keeps working afterwards.
    log.record("You: again").unwrap();
    assert_eq!(log.entries().len(), 1);
}

// -- property: cap and order hold for every record sequence ------------------------

proptest! {
    #[test]
    fn prop_cap_and_newest_first_hold(texts in proptest::collection::vec("[a-z]{1,8}", 1..120)) {
        let mut log = MemoryLog::new(Box::new(MemoryStore::new()));
        for (i, t) in texts.iter().enumerate() {
            log.record(format!("{i}:{t}")).unwrap();
            let entries = log.entries();
            prop_assert!(entries.len() <= MAX_MEMORY);
            prop_assert_eq!(entries.len(), (i + 1).min(MAX_MEMORY));
            prop_assert_eq!(&entries[0].text, &format!("{i}:{t}"));
        }

        let entries = log.entries();
        let n = texts.len();
        for (j, entry) in entries.iter().enumerate() {
            let expected_index = n - 1 - j;
            let expected_prefix = format!("{}:", expected_index);
            prop_assert!(entry.text.starts_with(&expected_prefix));
        }
    }
}
