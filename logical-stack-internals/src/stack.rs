//! Persistent, structurally shared last-in-first-out stack.
//!
//! A [`Stack`] is a singly linked list of reference counted nodes. Pushing
//! allocates exactly one node whose tail is the previous stack; popping
//! returns the tail. No node is ever mutated after it has been created, so
//! any number of holders (including futures running on other threads) can
//! keep a [`Stack`] value and advance it independently without
//! synchronization.

use core::{fmt, iter::FusedIterator};

use triomphe::Arc;

/// Error returned when an operation needs the top of an empty stack.
///
/// For the diagnostic stack this always means that a pop was not paired
/// with a push, which is a bug in the instrumentation rather than a runtime
/// condition to recover from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EmptyStackError;

impl fmt::Display for EmptyStackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "the stack is empty")
    }
}

impl core::error::Error for EmptyStackError {}

/// A single immutable link of a [`Stack`].
struct Node<T> {
    /// The value stored at this position.
    value: T,
    /// Number of nodes from this one to the bottom, inclusive.
    depth: usize,
    /// The rest of the stack below this node.
    next: Option<Arc<Node<T>>>,
}

/// An immutable stack with structural sharing.
///
/// Every operation is a pure function of `self`: [`push`](Self::push) and
/// [`pop`](Self::pop) return new stacks and leave the receiver untouched.
/// Cloning is `O(1)`.
///
/// # Examples
///
/// ```
/// use logical_stack_internals::Stack;
///
/// let empty = Stack::new();
/// let one = empty.push("a");
/// let two = one.push("b");
///
/// assert!(empty.is_empty());
/// assert_eq!(two.iter().copied().collect::<Vec<_>>(), ["b", "a"]);
/// assert_eq!(one.iter().copied().collect::<Vec<_>>(), ["a"]);
/// ```
pub struct Stack<T> {
    head: Option<Arc<Node<T>>>,
}

impl<T> Stack<T> {
    /// Creates an empty stack. Does not allocate.
    #[must_use]
    pub const fn new() -> Self {
        Self { head: None }
    }

    /// Alias for [`Stack::new`].
    #[must_use]
    pub const fn empty() -> Self {
        Self::new()
    }

    /// Returns `true` if the stack holds no values.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Returns the number of values on the stack in `O(1)`.
    #[inline]
    pub fn len(&self) -> usize {
        self.head.as_ref().map_or(0, |node| node.depth)
    }

    /// Returns a new stack with `value` on top of `self`.
    #[must_use]
    pub fn push(&self, value: T) -> Self {
        let depth = self.len() + 1;
        Self {
            head: Some(Arc::new(Node {
                value,
                depth,
                next: self.head.clone(),
            })),
        }
    }

    /// Returns the value on top of the stack.
    pub fn peek(&self) -> Result<&T, EmptyStackError> {
        self.head
            .as_deref()
            .map(|node| &node.value)
            .ok_or(EmptyStackError)
    }

    /// Returns the stack below the top value together with that value.
    pub fn pop(&self) -> Result<(Self, T), EmptyStackError>
    where
        T: Clone,
    {
        let node = self.head.as_deref().ok_or(EmptyStackError)?;
        Ok((
            Self {
                head: node.next.clone(),
            },
            node.value.clone(),
        ))
    }

    /// Returns the stack below the top value, discarding the value.
    pub fn pop_discard(&self) -> Result<Self, EmptyStackError> {
        let node = self.head.as_deref().ok_or(EmptyStackError)?;
        Ok(Self {
            head: node.next.clone(),
        })
    }

    /// Returns an empty stack.
    ///
    /// Provided for symmetry with the other value transformations; `self`
    /// is left as is.
    #[must_use]
    pub fn clear(&self) -> Self {
        Self::new()
    }

    /// Iterates over the values, most recently pushed first.
    ///
    /// Iteration borrows the stack and does not consume it, so iterating
    /// twice yields the same sequence.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            next: self.head.as_deref(),
            remaining: self.len(),
        }
    }

    /// Returns `true` if both stacks share the same top node.
    ///
    /// Two empty stacks are considered the same.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.head, &other.head) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T> Clone for Stack<T> {
    fn clone(&self) -> Self {
        Self {
            head: self.head.clone(),
        }
    }
}

impl<T> Default for Stack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for Stack<T> {
    fn drop(&mut self) {
        // Unlink uniquely owned nodes one at a time so that dropping a deep
        // stack does not recurse once per node.
        let mut next = self.head.take();
        while let Some(mut node) = next {
            match Arc::get_mut(&mut node) {
                Some(unique) => next = unique.next.take(),
                None => break,
            }
        }
    }
}

impl<T: PartialEq> PartialEq for Stack<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || (self.len() == other.len() && self.iter().eq(other.iter()))
    }
}

impl<T: Eq> Eq for Stack<T> {}

impl<T: fmt::Debug> fmt::Debug for Stack<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T> FromIterator<T> for Stack<T> {
    /// Pushes the values in iteration order, so the last value ends up on
    /// top.
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut stack = Self::new();
        for value in iter {
            stack = stack.push(value);
        }
        stack
    }
}

impl<'a, T> IntoIterator for &'a Stack<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the values of a [`Stack`], most recent first.
pub struct Iter<'a, T> {
    next: Option<&'a Node<T>>,
    remaining: usize,
}

impl<'a, T> Clone for Iter<'a, T> {
    fn clone(&self) -> Self {
        Self {
            next: self.next,
            remaining: self.remaining,
        }
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let node = self.next?;
        self.next = node.next.as_deref();
        self.remaining -= 1;
        Some(&node.value)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, T> ExactSizeIterator for Iter<'a, T> {}

impl<'a, T> FusedIterator for Iter<'a, T> {}
