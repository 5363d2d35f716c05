//! The conversation as displayed: an ordered list of text blocks.
//!
//! Blocks are only ever appended to or tagged; every mutation is also recorded
//! as a [`Change`] so a front end can render incrementally.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Text,
    /// The block opened for the user's next spoken turn.
    Speech,
    /// A separator after a finished assistant message.
    Rule,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,
    pub text: String,
    pub id: Option<String>,
    pub struck: bool,
}

impl Block {
    fn new(kind: BlockKind, text: &str) -> Self {
        Self {
            kind,
            text: text.to_string(),
            id: None,
            struck: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Opened { index: usize, kind: BlockKind },
    Appended { index: usize, text: String },
    Struck { index: usize },
}

#[derive(Debug, Default)]
pub struct Transcript {
    blocks: Vec<Block>,
    changes: Vec<Change>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    pub fn find(&self, id: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id.as_deref() == Some(id))
    }

    /// Opens a new text block and returns its index.
    pub fn new_block(&mut self, text: &str) -> usize {
        self.open(BlockKind::Text, text)
    }

    pub fn new_speech_block(&mut self) -> usize {
        self.open(BlockKind::Speech, "")
    }

    pub fn push_rule(&mut self) -> usize {
        self.open(BlockKind::Rule, "")
    }

    fn open(&mut self, kind: BlockKind, text: &str) -> usize {
        let index = self.blocks.len();
        self.blocks.push(Block::new(kind, text));
        self.changes.push(Change::Opened { index, kind });
        if !text.is_empty() {
            self.changes.push(Change::Appended {
                index,
                text: text.to_string(),
            });
        }
        index
    }

    /// Appends to the last block, opening a text block if there is none or
    /// the last one is a rule.
    pub fn append(&mut self, text: &str) {
        let index = self.writable_last();
        self.append_to(index, text);
    }

    fn writable_last(&mut self) -> usize {
        let reuse = matches!(self.blocks.last(), Some(block) if block.kind != BlockKind::Rule);
        if reuse {
            self.blocks.len() - 1
        } else {
            self.new_block("")
        }
    }

    pub fn append_to(&mut self, index: usize, text: &str) {
        let Some(block) = self.blocks.get_mut(index) else {
            tracing::warn!(index, "Append to missing transcript block");
            return;
        };
        block.text.push_str(text);
        self.changes.push(Change::Appended {
            index,
            text: text.to_string(),
        });
    }

    /// Tags the block at `index` with `id`. A block keeps the first id it was
    /// given; returns whether the tag was applied.
    pub fn set_id(&mut self, index: usize, id: &str) -> bool {
        match self.blocks.get_mut(index) {
            Some(block) if block.id.is_none() => {
                block.id = Some(id.to_string());
                true
            }
            Some(block) => {
                tracing::debug!(index, existing = ?block.id, id, "Block already tagged");
                false
            }
            None => false,
        }
    }

    /// Tags the last block with `id` and shows the id after its text.
    pub fn append_message_id(&mut self, id: &str) {
        let index = self.writable_last();
        if self.set_id(index, id) {
            self.append_to(index, &format!(" >> {}", id));
        }
    }

    /// Strikes the block tagged `id`. Returns false when no block has it.
    pub fn mark_deleted(&mut self, id: &str) -> bool {
        let Some(index) = self
            .blocks
            .iter()
            .position(|b| b.id.as_deref() == Some(id))
        else {
            return false;
        };
        self.blocks[index].struck = true;
        self.changes.push(Change::Struck { index });
        true
    }

    /// Takes the changes recorded since the last call.
    pub fn drain_changes(&mut self) -> Vec<Change> {
        std::mem::take(&mut self.changes)
    }
}
