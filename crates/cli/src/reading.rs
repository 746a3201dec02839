//! Where the reader is inside a work's chapter list.

use folio_core::ChapterDescriptor;

/// A work's chapter list plus the chapter currently shown.
///
/// Moves never wrap around: stepping past either end leaves the position
/// unchanged and returns `false`.
#[derive(Debug, Clone)]
pub struct ReadingPosition {
    work: String,
    chapters: Vec<ChapterDescriptor>,
    current_index: usize,
}

impl ReadingPosition {
    /// Starts at `index`, clamped into the list.
    pub fn new(work: impl Into<String>, chapters: Vec<ChapterDescriptor>, index: usize) -> Self {
        let current_index = index.min(chapters.len().saturating_sub(1));
        Self { work: work.into(), chapters, current_index }
    }

    pub fn work(&self) -> &str {
        &self.work
    }

    pub fn current(&self) -> Option<&ChapterDescriptor> {
        self.chapters.get(self.current_index)
    }

    pub fn index(&self) -> usize {
        self.current_index
    }

    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    pub fn next(&mut self) -> bool {
        self.jump(self.current_index + 1)
    }

    pub fn prev(&mut self) -> bool {
        match self.current_index.checked_sub(1) {
            Some(index) => self.jump(index),
            None => false,
        }
    }

    /// Moves to `index` if it is in range.
    pub fn jump(&mut self, index: usize) -> bool {
        if index >= self.chapters.len() {
            return false;
        }
        self.current_index = index;
        true
    }

    pub fn first(&mut self) -> bool {
        self.jump(0)
    }

    pub fn last(&mut self) -> bool {
        match self.chapters.len().checked_sub(1) {
            Some(index) => self.jump(index),
            None => false,
        }
    }

    /// "Chapter i / n", one-based.
    pub fn footer(&self) -> String {
        format!("Chapter {} / {}", self.current_index + 1, self.chapters.len())
    }
}
