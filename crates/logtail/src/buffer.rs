/// Append-only log text, kept as the fragments in arrival order.
///
/// Grows without bound while a tail is running; only an explicit
/// [`clear`](Self::clear) or a new session empties it.
#[derive(Debug, Clone, Default)]
pub struct LogBuffer {
    fragments: Vec<String>,
    len: usize,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.len += text.len();
        self.fragments.push(text.to_owned());
    }

    pub fn clear(&mut self) {
        self.fragments.clear();
        self.len = 0;
    }

    /// Replace the whole contents (one-shot refresh).
    pub fn replace(&mut self, text: &str) {
        self.clear();
        self.append(text);
    }

    /// The buffer as one string.
    pub fn export(&self) -> String {
        self.fragments.concat()
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }
}
