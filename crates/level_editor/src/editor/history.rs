use crate::level::{Entity, Tid};

/// Groups edits that undo and redo as one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionHash(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    Place,
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EditAction {
    pub kind: EditKind,
    pub tid: Tid,
    pub entity: Entity,
}

impl EditAction {
    pub fn place(tid: Tid, entity: Entity) -> Self {
        Self {
            kind: EditKind::Place,
            tid,
            entity,
        }
    }

    pub fn remove(tid: Tid, entity: Entity) -> Self {
        Self {
            kind: EditKind::Remove,
            tid,
            entity,
        }
    }

    pub fn inverted(self) -> Self {
        let kind = match self.kind {
            EditKind::Place => EditKind::Remove,
            EditKind::Remove => EditKind::Place,
        };
        Self { kind, ..self }
    }
}

/// Actions as they were applied, displacements included.
#[derive(Debug, Clone, PartialEq)]
pub struct EditGroup {
    pub hash: TransactionHash,
    pub actions: Vec<EditAction>,
}

impl EditGroup {
    /// Actions that take the document back to before this group.
    pub fn undo_actions(&self) -> Vec<EditAction> {
        self.actions.iter().rev().map(|action| action.inverted()).collect()
    }
}

/// Linear undo/redo stacks.
#[derive(Debug, Default)]
pub struct History {
    undo: Vec<EditGroup>,
    redo: Vec<EditGroup>,
}

impl History {
    /// Pushes a fresh edit and drops the redo future.
    pub fn record(&mut self, group: EditGroup) {
        self.undo.push(group);
        self.redo.clear();
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    /// Pops the newest undo group and every directly preceding group sharing its hash,
    /// newest first.
    pub fn pop_undo(&mut self) -> Vec<EditGroup> {
        pop_transaction(&mut self.undo)
    }

    /// Pops the next redo step, oldest group first.
    pub fn pop_redo(&mut self) -> Vec<EditGroup> {
        pop_transaction(&mut self.redo)
    }

    /// Stores an undone step so that `pop_redo` returns it oldest first.
    pub fn push_redo(&mut self, undone: Vec<EditGroup>) {
        self.redo.extend(undone);
    }

    /// Stores a redone step back in chronological order.
    pub fn push_undo(&mut self, redone: Vec<EditGroup>) {
        self.undo.extend(redone);
    }
}

fn pop_transaction(stack: &mut Vec<EditGroup>) -> Vec<EditGroup> {
    let Some(hash) = stack.last().map(|group| group.hash) else {
        return Vec::new();
    };
    let mut popped = Vec::new();
    while stack.last().is_some_and(|group| group.hash == hash) {
        if let Some(group) = stack.pop() {
            popped.push(group);
        }
    }
    popped
}
