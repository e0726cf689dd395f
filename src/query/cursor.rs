use bson::Document as BsonDocument;

/// Materialized query results, already filtered, sorted, paginated and projected.
#[derive(Debug, Clone, Default)]
pub struct Cursor {
    docs: Vec<BsonDocument>,
    pos: usize,
}

impl Cursor {
    #[must_use]
    pub fn new(docs: Vec<BsonDocument>) -> Self {
        Self { docs, pos: 0 }
    }

    pub fn advance(&mut self) -> Option<BsonDocument> {
        let d = self.docs.get(self.pos)?.clone();
        self.pos += 1;
        Some(d)
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.docs.len().saturating_sub(self.pos)
    }

    /// Remaining documents.
    #[must_use]
    pub fn to_vec(mut self) -> Vec<BsonDocument> {
        self.docs.split_off(self.pos.min(self.docs.len()))
    }
}

impl Iterator for Cursor {
    type Item = BsonDocument;
    fn next(&mut self) -> Option<Self::Item> {
        self.advance()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining(), Some(self.remaining()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn to_vec_returns_only_unread_documents() {
        let mut c = Cursor::new(vec![doc! {"n": 1}, doc! {"n": 2}, doc! {"n": 3}]);
        assert_eq!(c.next(), Some(doc! {"n": 1}));
        assert_eq!(c.remaining(), 2);
        assert_eq!(c.to_vec(), vec![doc! {"n": 2}, doc! {"n": 3}]);
    }
}
