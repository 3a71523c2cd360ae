// Copyright 2025 Stoolap Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Singleton-then-promote container
//!
//! Most hash buckets, populated collections and groups hold exactly one
//! element. `OneOrMany` stores that element inline and only allocates a
//! `Vec` when a second element arrives.

use std::slice;

/// Zero, one or many values of `T`, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OneOrMany<T> {
    /// No element yet
    #[default]
    Empty,
    /// Exactly one element, stored inline
    One(T),
    /// Two or more elements
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    /// Create a container holding a single element.
    #[inline]
    pub fn one(value: T) -> Self {
        OneOrMany::One(value)
    }

    /// Append an element, promoting to a list on the second insert.
    pub fn push(&mut self, value: T) {
        match std::mem::take(self) {
            OneOrMany::Empty => *self = OneOrMany::One(value),
            OneOrMany::One(first) => {
                let mut list = Vec::with_capacity(4);
                list.push(first);
                list.push(value);
                *self = OneOrMany::Many(list);
            }
            OneOrMany::Many(mut list) => {
                list.push(value);
                *self = OneOrMany::Many(list);
            }
        }
    }

    /// Number of stored elements.
    #[inline]
    pub fn len(&self) -> usize {
        match self {
            OneOrMany::Empty => 0,
            OneOrMany::One(_) => 1,
            OneOrMany::Many(list) => list.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, OneOrMany::Empty)
    }

    /// Element at `index`, if any.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.as_slice().get(index)
    }

    /// First element, if any.
    #[inline]
    pub fn first(&self) -> Option<&T> {
        self.get(0)
    }

    /// View the elements as a slice (no allocation).
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        match self {
            OneOrMany::Empty => &[],
            OneOrMany::One(value) => slice::from_ref(value),
            OneOrMany::Many(list) => list.as_slice(),
        }
    }

    #[inline]
    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    /// Returns true once the container has allocated a list.
    #[inline]
    pub fn is_promoted(&self) -> bool {
        matches!(self, OneOrMany::Many(_))
    }

    /// Consume into a `Vec`.
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Empty => Vec::new(),
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(list) => list,
        }
    }
}

impl<T> From<Vec<T>> for OneOrMany<T> {
    fn from(mut list: Vec<T>) -> Self {
        match list.len() {
            0 => OneOrMany::Empty,
            1 => match list.pop() {
                Some(value) => OneOrMany::One(value),
                None => OneOrMany::Empty,
            },
            _ => OneOrMany::Many(list),
        }
    }
}

impl<T> FromIterator<T> for OneOrMany<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut result = OneOrMany::Empty;
        for value in iter {
            result.push(value);
        }
        result
    }
}

impl<'a, T> IntoIterator for &'a OneOrMany<T> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T> IntoIterator for OneOrMany<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.into_vec().into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_promotion() {
        let mut items = OneOrMany::Empty;
        assert!(items.is_empty());

        items.push(1);
        assert_eq!(items, OneOrMany::One(1));
        assert!(!items.is_promoted());

        items.push(2);
        items.push(3);
        assert!(items.is_promoted());
        assert_eq!(items.as_slice(), &[1, 2, 3]);
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn test_from_vec() {
        assert_eq!(OneOrMany::<i32>::from(vec![]), OneOrMany::Empty);
        assert_eq!(OneOrMany::from(vec![7]), OneOrMany::One(7));
        assert_eq!(OneOrMany::from(vec![1, 2]).into_vec(), vec![1, 2]);
    }

    #[test]
    fn test_iteration_order() {
        let items: OneOrMany<&str> = ["a", "b", "c"].into_iter().collect();
        let collected: Vec<_> = items.iter().copied().collect();
        assert_eq!(collected, vec!["a", "b", "c"]);
        assert_eq!(items.first(), Some(&"a"));
        assert_eq!(items.get(5), None);
    }
}
