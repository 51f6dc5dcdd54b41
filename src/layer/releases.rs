// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use crate::midi_state::NUM_NOTES;

/// A release postponed by a pedal.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DeferredRelease {
    /// The released note.
    pub note: u8,
    /// The note's on-velocity at the time it was deferred.
    pub velocity: f32,
}

/// A fixed-capacity, unordered set of deferred releases.
///
/// Entries past capacity are dropped. Removal swaps with the last entry, so the
/// order of entries is not stable.
#[derive(Clone, Debug)]
pub struct DeferredReleases {
    entries: [DeferredRelease; NUM_NOTES],
    len: usize,
}

impl Default for DeferredReleases {
    fn default() -> Self {
        DeferredReleases {
            entries: [DeferredRelease::default(); NUM_NOTES],
            len: 0,
        }
    }
}

impl DeferredReleases {
    /// The maximum number of entries.
    pub const CAPACITY: usize = NUM_NOTES;

    /// Adds a release. Returns false if the set is full and the entry was dropped.
    pub fn push(&mut self, note: u8, velocity: f32) -> bool {
        if self.len == Self::CAPACITY {
            return false;
        }
        self.entries[self.len] = DeferredRelease { note, velocity };
        self.len += 1;
        true
    }

    /// Removes the first entry for `note`. Returns it if there was one.
    pub fn remove(&mut self, note: u8) -> Option<DeferredRelease> {
        let index = self.as_slice().iter().position(|r| r.note == note)?;
        let removed = self.entries[index];
        self.len -= 1;
        self.entries.swap(index, self.len);
        Some(removed)
    }

    pub fn contains(&self, note: u8) -> bool {
        self.as_slice().iter().any(|r| r.note == note)
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[DeferredRelease] {
        &self.entries[..self.len]
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeferredRelease> {
        self.as_slice().iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_remove() {
        let mut releases = DeferredReleases::default();
        assert!(releases.is_empty());

        assert!(releases.push(60, 0.5));
        assert!(releases.push(62, 0.6));
        assert!(releases.push(64, 0.7));
        assert_eq!(releases.len(), 3);
        assert!(releases.contains(62));

        let removed = releases.remove(60);
        assert_eq!(
            removed,
            Some(DeferredRelease {
                note: 60,
                velocity: 0.5
            })
        );
        assert_eq!(releases.len(), 2);
        assert!(!releases.contains(60));
        assert!(releases.contains(62));
        assert!(releases.contains(64));

        assert_eq!(releases.remove(60), None);
    }

    #[test]
    fn test_overflow_is_dropped() {
        let mut releases = DeferredReleases::default();
        for i in 0..DeferredReleases::CAPACITY {
            assert!(releases.push((i % 128) as u8, 0.5));
        }
        assert!(!releases.push(1, 0.5));
        assert_eq!(releases.len(), DeferredReleases::CAPACITY);
    }

    #[test]
    fn test_clear() {
        let mut releases = DeferredReleases::default();
        releases.push(60, 0.5);
        releases.clear();
        assert!(releases.is_empty());
        assert_eq!(releases.iter().count(), 0);
    }
}
