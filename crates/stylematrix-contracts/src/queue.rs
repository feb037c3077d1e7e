/// Ordered style ids plus a cursor that only moves forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobQueue {
    ids: Vec<u32>,
    cursor: usize,
}

impl JobQueue {
    pub fn new(ids: Vec<u32>) -> Self {
        Self { ids, cursor: 0 }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn ids(&self) -> &[u32] {
        &self.ids
    }

    /// Job at the cursor, or `None` once the queue is exhausted.
    pub fn current(&self) -> Option<u32> {
        self.ids.get(self.cursor).copied()
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.ids.len()
    }

    pub fn advance(&mut self) {
        if !self.is_exhausted() {
            self.cursor += 1;
        }
    }
}
