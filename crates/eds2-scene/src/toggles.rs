// SPDX-License-Identifier: CEPL-1.0
use crate::{Result, SceneError};

/// Dynamic rasterizer state for one object.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ObjectToggle {
    pub depth_bias: bool,
    pub rasterizer_discard: bool,
}

/// One [`ObjectToggle`] per scene object. Each bucket reads it from entry 0
/// by position within the bucket. Every access is bounds-checked.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ToggleTable {
    entries: Vec<ObjectToggle>,
}

impl From<Vec<ObjectToggle>> for ToggleTable {
    fn from(entries: Vec<ObjectToggle>) -> Self {
        Self { entries }
    }
}

impl ToggleTable {
    pub fn new(len: usize) -> Self {
        vec![ObjectToggle::default(); len].into()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<ObjectToggle> {
        self.entries.get(index).copied().ok_or(SceneError::ToggleOutOfRange {
            index,
            len: self.entries.len(),
        })
    }

    pub fn get_mut(&mut self, index: usize) -> Result<&mut ObjectToggle> {
        let len = self.entries.len();
        self.entries
            .get_mut(index)
            .ok_or(SceneError::ToggleOutOfRange { index, len })
    }

    /// Entries `first..first + count`. On failure the error carries the first
    /// requested index past the end of the table.
    pub fn slice(&self, first: usize, count: usize) -> Result<&[ObjectToggle]> {
        let len = self.entries.len();
        let end = first.saturating_add(count);
        if end > len {
            return Err(SceneError::ToggleOutOfRange {
                index: first.max(len),
                len,
            });
        }
        Ok(&self.entries[first..end])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ObjectToggle> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slices_are_bounds_checked() {
        let mut table = ToggleTable::new(3);
        table.get_mut(2).unwrap().rasterizer_discard = true;

        assert_eq!(table.slice(0, 3).unwrap().len(), 3);
        assert!(table.slice(2, 1).unwrap()[0].rasterizer_discard);
        assert!(table.slice(3, 0).unwrap().is_empty());

        assert_eq!(
            table.slice(1, 3),
            Err(SceneError::ToggleOutOfRange { index: 3, len: 3 })
        );
        assert_eq!(
            table.slice(5, 1),
            Err(SceneError::ToggleOutOfRange { index: 5, len: 3 })
        );
        assert!(table.slice(usize::MAX, 2).is_err());
    }

    #[test]
    fn point_access() {
        let mut table = ToggleTable::new(2);
        assert_eq!(table.get(1).unwrap(), ObjectToggle::default());
        assert!(table.get_mut(2).is_err());
        assert_eq!(
            table.get(7),
            Err(SceneError::ToggleOutOfRange { index: 7, len: 2 })
        );
    }
}
