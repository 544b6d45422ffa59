/// Next parameter position for one bind phase. Starts at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindCursor {
    next: usize,
}

impl BindCursor {
    #[must_use]
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Claim the current position and move past it.
    pub fn advance(&mut self) -> usize {
        let pos = self.next;
        self.next += 1;
        pos
    }

    /// Number of positions bound so far.
    #[must_use]
    pub fn bound(&self) -> usize {
        self.next - 1
    }
}

impl Default for BindCursor {
    fn default() -> Self {
        Self::new()
    }
}

/// Next result column for one read phase. Starts at 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadCursor {
    next: usize,
}

impl ReadCursor {
    #[must_use]
    pub fn new() -> Self {
        Self { next: 0 }
    }

    pub fn advance(&mut self) -> usize {
        let pos = self.next;
        self.next += 1;
        pos
    }

    #[must_use]
    pub fn consumed(&self) -> usize {
        self.next
    }
}
