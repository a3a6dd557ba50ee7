/// Substring keyword list for one tag.
#[derive(Debug, Clone, Default)]
pub struct KeywordList {
    words: Vec<String>,
}

impl KeywordList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, word: &str) {
        if !word.is_empty() {
            self.words.push(word.to_string());
        }
    }

    /// Linear scan; true on the first keyword contained in `name`
    pub fn matches(&self, name: &str) -> bool {
        self.words.iter().any(|w| name.contains(w.as_str()))
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Visit at most `limit` keywords (0 means all)
    pub fn for_each<F>(&self, limit: usize, mut f: F)
    where
        F: FnMut(&str),
    {
        let limit = if limit == 0 { usize::MAX } else { limit };
        for word in self.words.iter().take(limit) {
            f(word);
        }
    }
}
