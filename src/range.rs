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
use std::fmt;

use serde::{Deserialize, Serialize};

/// A numeric interval used for every configured bound of a layer.
///
/// In YAML a range is written as a two element sequence, e.g. `[0, 127]`.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq)]
#[serde(from = "[T; 2]", into = "[T; 2]")]
pub struct Range<T: Copy> {
    start: T,
    end: T,
}

impl<T: Copy + PartialOrd> Range<T> {
    /// Creates a new range. The range is not checked for validity.
    pub const fn new(start: T, end: T) -> Self {
        Range { start, end }
    }

    /// Returns the lower bound.
    pub fn start(&self) -> T {
        self.start
    }

    /// Returns the upper bound.
    pub fn end(&self) -> T {
        self.end
    }

    /// Half-open membership: `start <= value < end`.
    pub fn contains(&self, value: T) -> bool {
        self.start <= value && value < self.end
    }

    /// Closed membership: `start <= value <= end`.
    pub fn contains_with_end(&self, value: T) -> bool {
        self.start <= value && value <= self.end
    }

    /// A range is valid when its bounds are not inverted.
    pub fn is_valid(&self) -> bool {
        self.start <= self.end
    }
}

impl<T: Copy> From<[T; 2]> for Range<T> {
    fn from(bounds: [T; 2]) -> Self {
        Range {
            start: bounds[0],
            end: bounds[1],
        }
    }
}

impl<T: Copy> From<Range<T>> for [T; 2] {
    fn from(range: Range<T>) -> Self {
        [range.start, range.end]
    }
}

impl<T: Copy + fmt::Display> fmt::Display for Range<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}
