use chrono::{Duration, TimeZone, Utc};
use localnotes_core::{
    Clock, FieldKeys, IdStrategy, ManualClock, MemoryBackend, MemoryStore, NoteId, NotePatch,
    NoteRepository, NoteService, RepoOptions,
};
use serde_json::json;
use std::collections::HashSet;

fn repo_with_clock(store: MemoryStore, clock: &ManualClock) -> NoteRepository<MemoryStore> {
    NoteRepository::open_with(store, RepoOptions::default(), Box::new(clock.clone()))
}

fn start_clock() -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap())
}

#[test]
fn create_prepends_empty_note_and_selects_it() {
    let clock = start_clock();
    let mut repo = repo_with_clock(MemoryStore::isolated(), &clock);

    let first = repo.create();
    clock.advance(Duration::seconds(1));
    let second = repo.create();

    assert_eq!(repo.notes()[0].id, second.id);
    assert_eq!(repo.notes()[1].id, first.id);
    assert_eq!(second.title, "");
    assert_eq!(second.content, "");
    assert_eq!(second.created_at, second.updated_at);
    assert_eq!(repo.selected_note_id(), Some(&second.id));
}

#[test]
fn update_merges_patch_and_keeps_identity() {
    let clock = start_clock();
    let mut repo = repo_with_clock(MemoryStore::isolated(), &clock);
    let note = repo.create();
    clock.advance(Duration::minutes(3));

    assert!(repo.update(&note.id, NotePatch::title("Groceries")));
    assert!(repo.update(&note.id, NotePatch::content("milk")));

    let stored = repo.get(&note.id).unwrap();
    assert_eq!(stored.id, note.id);
    assert_eq!(stored.title, "Groceries");
    assert_eq!(stored.content, "milk");
    assert_eq!(stored.created_at, note.created_at);
    assert_eq!(stored.updated_at, note.created_at + Duration::minutes(3));
}

#[test]
fn patch_decoded_from_json_ignores_immutable_fields() {
    let clock = start_clock();
    let mut repo = repo_with_clock(MemoryStore::isolated(), &clock);
    let note = repo.create();

    let patch: NotePatch = serde_json::from_value(json!({
        "id": "hijacked",
        "createdAt": "1999-01-01T00:00:00Z",
        "title": "Renamed"
    }))
    .unwrap();
    repo.update(&note.id, patch);

    let stored = repo.get(&note.id).unwrap();
    assert_eq!(stored.title, "Renamed");
    assert_eq!(stored.created_at, note.created_at);
    assert!(repo.get(&NoteId::new("hijacked")).is_none());
}

#[test]
fn update_with_unknown_id_leaves_collection_unchanged() {
    let backend = MemoryBackend::new();
    let mut repo = NoteRepository::open(backend.open_context());
    repo.create();
    let before = repo.notes().to_vec();
    let stored_before = backend.raw_get("notes_app.notes");

    assert!(!repo.update(&NoteId::new("missing"), NotePatch::title("x")));

    assert_eq!(repo.notes(), before.as_slice());
    assert_eq!(backend.raw_get("notes_app.notes"), stored_before);
}

#[test]
fn delete_selected_note_clears_selection() {
    let mut repo = NoteRepository::open(MemoryStore::isolated());
    let note = repo.create();

    assert!(repo.delete(&note.id));

    assert!(repo.notes().is_empty());
    assert_eq!(repo.selected_note_id(), None);
}

#[test]
fn delete_other_note_keeps_selection() {
    let mut repo = NoteRepository::open(MemoryStore::isolated());
    let first = repo.create();
    let second = repo.create();

    assert!(repo.delete(&first.id));

    assert_eq!(repo.selected_note_id(), Some(&second.id));
    assert!(!repo.delete(&first.id));
}

#[test]
fn operation_sequences_preserve_id_and_timestamp_invariants() {
    let clock = start_clock();
    let mut repo = repo_with_clock(MemoryStore::isolated(), &clock);
    let mut seed: u64 = 0x5eed;

    for step in 0..400 {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let roll = (seed >> 33) % 10;
        let live = repo.notes().iter().map(|n| n.id.clone()).collect::<Vec<_>>();
        let target = if live.is_empty() {
            NoteId::new("none")
        } else {
            live[(seed >> 17) as usize % live.len()].clone()
        };

        match roll {
            0..=3 => {
                repo.create();
            }
            4..=7 => {
                repo.update(&target, NotePatch::content(format!("edit {step}")));
            }
            _ => {
                repo.delete(&target);
            }
        }

        // Occasionally step the clock backwards to exercise the clamp.
        if roll == 9 {
            clock.advance(Duration::milliseconds(-500));
        } else {
            clock.advance(Duration::milliseconds(7));
        }

        let mut seen = HashSet::new();
        for note in repo.notes() {
            assert!(note.updated_at >= note.created_at, "step {step}: {note:?}");
            assert!(seen.insert(note.id.clone()), "step {step}: duplicate {}", note.id);
        }
    }
}

#[test]
fn timestamp_strategy_produces_epoch_millis_ids() {
    let clock = start_clock();
    let mut repo = NoteRepository::open_with(
        MemoryStore::isolated(),
        RepoOptions {
            keys: FieldKeys::with_prefix("alt"),
            id_strategy: IdStrategy::Timestamp,
        },
        Box::new(clock.clone()),
    );

    let note = repo.create();

    assert_eq!(note.id.as_str(), clock_millis(&clock));
    assert!(repo.store().backend().raw_get("alt.notes").is_some());
}

fn clock_millis(clock: &ManualClock) -> String {
    clock.now().timestamp_millis().to_string()
}

#[test]
fn groceries_todo_scenario() {
    let clock = start_clock();
    let repo = repo_with_clock(MemoryStore::isolated(), &clock);
    let mut service = NoteService::new(repo);

    let a = service.create_note();
    service.update_note(&a.id, NotePatch::title_and_content("Groceries", "milk"));
    clock.advance(Duration::seconds(30));
    let b = service.create_note();
    service.update_note(&b.id, NotePatch::title_and_content("Todo", "call mom"));

    let order = service
        .visible_notes()
        .iter()
        .map(|n| n.id.clone())
        .collect::<Vec<_>>();
    assert_eq!(order, vec![b.id.clone(), a.id.clone()]);

    service.set_search_query("milk");
    let found = service
        .visible_notes()
        .iter()
        .map(|n| n.id.clone())
        .collect::<Vec<_>>();
    assert_eq!(found, vec![a.id.clone()]);

    assert_eq!(service.selected_note().map(|n| &n.id), Some(&b.id));
    assert!(service.delete_note(&b.id));
    assert!(service.selected_note().is_none());
}

#[test]
fn create_then_selected_note_returns_new_note() {
    let mut service = NoteService::new(NoteRepository::open(MemoryStore::isolated()));
    let created = service.create_note();
    assert_eq!(service.selected_note(), Some(&created));
}
