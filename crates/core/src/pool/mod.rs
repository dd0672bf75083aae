/// Cyclic index into a media pool.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MediaCursor {
    index: usize,
}

impl MediaCursor {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn reset(&mut self) {
        self.index = 0;
    }
}

/// Read-only, ordered media with its own selection cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaPool<T> {
    items: Vec<T>,
    cursor: MediaCursor,
}

impl<T> Default for MediaPool<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            cursor: MediaCursor::default(),
        }
    }
}

impl<T> MediaPool<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            cursor: MediaCursor::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn cursor(&self) -> MediaCursor {
        self.cursor
    }

    /// Returns `pool[index mod len]` and advances. Empty pools yield nothing
    /// and leave the cursor alone.
    pub fn select_next(&mut self) -> Option<&T> {
        if self.items.is_empty() {
            return None;
        }
        let slot = self.cursor.index % self.items.len();
        self.cursor.index += 1;
        self.items.get(slot)
    }

    /// Swaps the pool contents. The cursor keeps its position unless
    /// `reset_cursor` is set.
    pub fn replace(&mut self, items: Vec<T>, reset_cursor: bool) {
        self.items = items;
        if reset_cursor {
            self.cursor.reset();
        }
    }

    pub fn reset_cursor(&mut self) {
        self.cursor.reset();
    }
}
