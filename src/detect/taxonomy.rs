use std::borrow::Cow;

/// Ordinal class index -> label name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelTaxonomy {
    labels: Vec<String>,
}

impl LabelTaxonomy {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    /// Parse a classes file: one label per non-empty line, surrounding
    /// whitespace trimmed.
    pub fn parse(text: &str) -> Self {
        Self::new(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    /// Label for `index`, or the index itself rendered as text when the
    /// taxonomy has no entry for it.
    pub fn label_for(&self, index: usize) -> Cow<'_, str> {
        match self.labels.get(index) {
            Some(label) => Cow::Borrowed(label.as_str()),
            None => Cow::Owned(index.to_string()),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_skips_blank_lines() {
        let taxonomy = LabelTaxonomy::parse("milk\n\n  bread  \r\neggs\n");
        assert_eq!(taxonomy.len(), 3);
        assert_eq!(taxonomy.label_for(1), "bread");
        assert_eq!(taxonomy.label_for(2), "eggs");
    }

    #[test]
    fn unknown_index_falls_back_to_number() {
        let taxonomy = LabelTaxonomy::parse("milk");
        assert_eq!(taxonomy.label_for(7), "7");
        assert_eq!(LabelTaxonomy::default().label_for(0), "0");
    }
}
