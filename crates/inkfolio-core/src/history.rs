//! Snapshot-based linear undo/redo history.
//!
//! History entries store full copies of prior state rather than inverse
//! operations. What a snapshot contains is up to the caller; the store uses
//! [`UndoState`](crate::store::UndoState).

/// Default maximum number of undo entries to keep.
pub const MAX_UNDO_HISTORY: usize = 50;

/// One undoable unit.
///
/// Most entries hold a single step. Grouped entries hold several steps in
/// the order they were recorded; they are undone in reverse order.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry<S> {
    pub steps: Vec<S>,
    pub description: String,
}

#[derive(Debug, Clone)]
struct Displaced<S> {
    redo: Vec<HistoryEntry<S>>,
    evicted: Vec<HistoryEntry<S>>,
}

#[derive(Debug, Clone)]
struct OpenGroup<S> {
    depth: usize,
    description: String,
    steps: Vec<S>,
}

/// Bounded undo/redo stacks.
#[derive(Debug, Clone)]
pub struct History<S> {
    undo_stack: Vec<HistoryEntry<S>>,
    redo_stack: Vec<HistoryEntry<S>>,
    group: Option<OpenGroup<S>>,
    /// What the newest recorded entry pushed out, while it is still on top.
    displaced: Option<Displaced<S>>,
    limit: usize,
}

impl<S> Default for History<S> {
    fn default() -> Self {
        Self::new(MAX_UNDO_HISTORY)
    }
}

impl<S> History<S> {
    /// Create an empty history keeping at most `limit` undo entries.
    pub fn new(limit: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            group: None,
            displaced: None,
            limit: limit.max(1),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Record a new undoable step (call before making changes).
    ///
    /// Clears the redo stack. Inside a group the step is held until the
    /// outermost group ends.
    pub fn record(&mut self, step: S, description: impl Into<String>) {
        if let Some(group) = &mut self.group {
            group.steps.push(step);
            return;
        }
        self.push_new(HistoryEntry {
            steps: vec![step],
            description: description.into(),
        });
    }

    /// Start collecting steps into a single entry. Groups nest; only the
    /// outermost description is kept.
    pub fn begin_group(&mut self, description: impl Into<String>) {
        match &mut self.group {
            Some(group) => group.depth += 1,
            None => {
                self.group = Some(OpenGroup {
                    depth: 1,
                    description: description.into(),
                    steps: Vec::new(),
                })
            }
        }
    }

    /// Close the current group. Returns `true` if an entry was pushed.
    pub fn end_group(&mut self) -> bool {
        let Some(group) = &mut self.group else {
            return false;
        };
        group.depth -= 1;
        if group.depth > 0 {
            return false;
        }
        let Some(group) = self.group.take() else {
            return false;
        };
        if group.steps.is_empty() {
            return false;
        }
        self.push_new(HistoryEntry {
            steps: group.steps,
            description: group.description,
        });
        true
    }

    pub fn in_group(&self) -> bool {
        self.group.is_some()
    }

    fn push_new(&mut self, entry: HistoryEntry<S>) {
        let redo = std::mem::take(&mut self.redo_stack);
        let evicted = self.push_bounded(entry);
        self.displaced = Some(Displaced { redo, evicted });
    }

    /// Push and evict the oldest entries over the limit. Returns the evicted ones.
    fn push_bounded(&mut self, entry: HistoryEntry<S>) -> Vec<HistoryEntry<S>> {
        self.undo_stack.push(entry);
        if self.undo_stack.len() <= self.limit {
            return Vec::new();
        }
        let excess = self.undo_stack.len() - self.limit;
        self.undo_stack.drain(..excess).collect()
    }

    /// Push onto the undo stack without touching the redo stack (used by redo).
    pub fn push_undo(&mut self, entry: HistoryEntry<S>) {
        self.displaced = None;
        self.push_bounded(entry);
    }

    pub fn push_redo(&mut self, entry: HistoryEntry<S>) {
        self.displaced = None;
        self.redo_stack.push(entry);
    }

    pub fn take_undo(&mut self) -> Option<HistoryEntry<S>> {
        self.displaced = None;
        self.undo_stack.pop()
    }

    pub fn take_redo(&mut self) -> Option<HistoryEntry<S>> {
        self.displaced = None;
        self.redo_stack.pop()
    }

    /// Pop the newest undo entry as if it had never been recorded.
    ///
    /// If nothing touched the stacks since it was recorded, the redo entries
    /// it cleared and the old entries it evicted are put back.
    pub fn retract(&mut self) -> Option<HistoryEntry<S>> {
        let entry = self.undo_stack.pop()?;
        if let Some(Displaced { redo, mut evicted }) = self.displaced.take() {
            evicted.append(&mut self.undo_stack);
            self.undo_stack = evicted;
            self.redo_stack = redo;
        }
        Some(entry)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    /// Description of the entry the next undo would revert.
    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.last().map(|e| e.description.as_str())
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.last().map(|e| e.description.as_str())
    }

    /// Undo entries, oldest first.
    pub fn undo_entries(&self) -> &[HistoryEntry<S>] {
        &self.undo_stack
    }

    /// Redo entries; the last one is redone first.
    pub fn redo_entries(&self) -> &[HistoryEntry<S>] {
        &self.redo_stack
    }

    /// Rewrite every stored snapshot, including an open group.
    pub fn map_steps(&mut self, mut f: impl FnMut(&mut S)) {
        let displaced = self
            .displaced
            .iter_mut()
            .flat_map(|d| d.redo.iter_mut().chain(d.evicted.iter_mut()));
        let entries = self
            .undo_stack
            .iter_mut()
            .chain(self.redo_stack.iter_mut())
            .chain(displaced);
        for entry in entries {
            entry.steps.iter_mut().for_each(&mut f);
        }
        if let Some(group) = &mut self.group {
            group.steps.iter_mut().for_each(&mut f);
        }
    }

    /// Drop both stacks and any open group.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.group = None;
        self.displaced = None;
    }
}
