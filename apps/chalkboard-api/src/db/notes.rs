use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chalkboard_common::SequenceGenerator;
use parking_lot::Mutex;

use crate::models::note::Note;

/// Returned by [`NoteStore::add`] once every id has been handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdsExhausted;

impl fmt::Display for IdsExhausted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("note id space exhausted")
    }
}

impl std::error::Error for IdsExhausted {}

/// Abstraction over the note record store.
///
/// Notes live on named boards. Ids come from one sequence shared by all
/// boards, so an id is never handed out twice. Implementations serialize
/// their own access: callers may share one store across any number of
/// request tasks.
pub trait NoteStore: Send + Sync {
    /// Store `note` on `board` under a fresh id and return the stored copy.
    fn add(&self, board: &str, note: Note) -> Result<Note, IdsExhausted>;

    /// Overwrite the note at `note.id` on `board`. Creates it when absent.
    fn update(&self, board: &str, note: Note);

    /// Delete the note with `id` from `board`. Unknown ids are ignored.
    fn remove(&self, board: &str, id: i64);

    /// Visit every note on `board` once. No ordering is promised by the trait.
    ///
    /// The store stays locked for the whole traversal, so `visit` must not
    /// call back into the store.
    fn for_each(&self, board: &str, visit: &mut dyn FnMut(&Note));

    /// Notes across all boards.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Boards currently holding at least one note.
    fn board_count(&self) -> usize;
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

/// Process-memory store. Nothing survives a restart.
///
/// Traversal is in ascending id order. A board whose last note is removed is
/// forgotten.
pub struct MemoryNoteStore {
    boards: Mutex<HashMap<String, BTreeMap<i64, Note>>>,
    ids: SequenceGenerator,
}

impl MemoryNoteStore {
    pub fn new() -> Self {
        Self {
            boards: Mutex::new(HashMap::new()),
            ids: SequenceGenerator::default(),
        }
    }

    /// Build a store with `notes` pre-seeded on `board`. Fresh ids start
    /// above the largest seeded id.
    pub fn with_seed(board: &str, notes: impl IntoIterator<Item = Note>) -> Self {
        let notes: BTreeMap<i64, Note> = notes.into_iter().map(|n| (n.id, n)).collect();
        let seed = notes.keys().next_back().copied().unwrap_or(0);
        let mut boards = HashMap::new();
        if !notes.is_empty() {
            boards.insert(board.to_string(), notes);
        }
        Self {
            boards: Mutex::new(boards),
            ids: SequenceGenerator::starting_after(seed.max(0)),
        }
    }
}

impl Default for MemoryNoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NoteStore for MemoryNoteStore {
    fn add(&self, board: &str, mut note: Note) -> Result<Note, IdsExhausted> {
        let mut boards = self.boards.lock();
        note.id = self.ids.generate().ok_or(IdsExhausted)?;
        boards
            .entry(board.to_string())
            .or_default()
            .insert(note.id, note.clone());
        Ok(note)
    }

    fn update(&self, board: &str, note: Note) {
        let mut boards = self.boards.lock();
        // An upsert may land on an id the generator has not reached yet.
        self.ids.observe(note.id);
        boards
            .entry(board.to_string())
            .or_default()
            .insert(note.id, note);
    }

    fn remove(&self, board: &str, id: i64) {
        let mut boards = self.boards.lock();
        if let Some(notes) = boards.get_mut(board) {
            notes.remove(&id);
            if notes.is_empty() {
                boards.remove(board);
            }
        }
    }

    fn for_each(&self, board: &str, visit: &mut dyn FnMut(&Note)) {
        let boards = self.boards.lock();
        if let Some(notes) = boards.get(board) {
            for note in notes.values() {
                visit(note);
            }
        }
    }

    fn len(&self) -> usize {
        self.boards.lock().values().map(BTreeMap::len).sum()
    }

    fn board_count(&self) -> usize {
        self.boards.lock().len()
    }
}
