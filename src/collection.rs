use crate::error::Diagnostic;
use serde::Serialize;

/// An ordered result set whose `total` always equals `data.len()`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceCollection<T> {
    total: usize,
    data: Vec<T>,
}

impl<T> Default for ResourceCollection<T> {
    fn default() -> Self {
        Self {
            total: 0,
            data: Vec::new(),
        }
    }
}

impl<T> ResourceCollection<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn first(&self) -> Option<&T> {
        self.data.first()
    }

    pub fn push(&mut self, item: T) {
        self.data.push(item);
        self.total = self.data.len();
    }

    pub fn retain(&mut self, keep: impl FnMut(&T) -> bool) {
        self.data.retain(keep);
        self.total = self.data.len();
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }
}

impl<T> From<Vec<T>> for ResourceCollection<T> {
    fn from(data: Vec<T>) -> Self {
        Self {
            total: data.len(),
            data,
        }
    }
}

impl<T> Extend<T> for ResourceCollection<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.data.extend(iter);
        self.total = self.data.len();
    }
}

impl<T> IntoIterator for ResourceCollection<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.into_iter()
    }
}

/// Result of a list operation: the (possibly partial) collection plus a
/// record of every page request or item that failed along the way.
///
/// A listing never fails as a whole. When `diagnostics` is non-empty the
/// collection holds whatever was gathered before the first failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Listing<T> {
    pub collection: ResourceCollection<T>,
    pub diagnostics: Vec<Diagnostic>,
}

impl<T> Default for Listing<T> {
    fn default() -> Self {
        Self {
            collection: ResourceCollection::default(),
            diagnostics: Vec::new(),
        }
    }
}

impl<T> Listing<T> {
    pub fn is_complete(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn total(&self) -> usize {
        self.collection.total()
    }

    pub fn data(&self) -> &[T] {
        self.collection.data()
    }

    pub fn into_collection(self) -> ResourceCollection<T> {
        self.collection
    }

    /// Same as `into_collection`, but surfaces the first diagnostic as an
    /// error alongside the partial data.
    pub fn into_result(self) -> Result<ResourceCollection<T>, (ResourceCollection<T>, Diagnostic)> {
        let Listing {
            collection,
            mut diagnostics,
        } = self;
        if diagnostics.is_empty() {
            Ok(collection)
        } else {
            Err((collection, diagnostics.remove(0)))
        }
    }
}

impl<T> From<ResourceCollection<T>> for Listing<T> {
    fn from(collection: ResourceCollection<T>) -> Self {
        Self {
            collection,
            diagnostics: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_tracks_data() {
        let mut collection = ResourceCollection::from(vec![1, 2, 3]);
        assert_eq!(collection.total(), 3);
        collection.extend([4, 5]);
        collection.retain(|n| n % 2 == 1);
        assert_eq!(collection.total(), collection.data().len());
        assert_eq!(collection.data(), &[1, 3, 5]);
    }
}
