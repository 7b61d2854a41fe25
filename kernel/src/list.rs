//! Tagged index lists
//!
//! PDs and EVBs live in fixed arrays and carry a single `link` field. The
//! list that currently owns a record is recorded in the record itself, so a
//! record can never be threaded onto two lists at once.

use core::fmt::Debug;

use crate::error::{KernelError, KernelResult};

/// A record that can sit on one tagged list
pub(crate) trait Linked {
    type Tag: Copy + Eq + Debug;

    fn link(&self) -> Option<usize>;
    fn set_link(&mut self, link: Option<usize>);
    fn owner(&self) -> Self::Tag;
    fn set_owner(&mut self, owner: Self::Tag);
}

/// Singly linked list threaded through `nodes[..].link`
#[derive(Debug, Clone, Copy)]
pub(crate) struct List<Tag> {
    tag: Tag,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl<Tag: Copy + Eq + Debug> List<Tag> {
    pub const fn new(tag: Tag) -> Self {
        Self { tag, head: None, tail: None, len: 0 }
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn front(&self) -> Option<usize> {
        self.head
    }

    /// `detached` is the tag of a record that belongs to no list
    fn claim<T: Linked<Tag = Tag>>(&self, node: &mut T, detached: Tag) -> KernelResult<()> {
        if node.owner() != detached {
            return Err(KernelError::violation("record already owned by a list"));
        }
        node.set_owner(self.tag);
        Ok(())
    }

    pub fn push_back<T: Linked<Tag = Tag>>(
        &mut self,
        nodes: &mut [T],
        idx: usize,
        detached: Tag,
    ) -> KernelResult<()> {
        self.claim(&mut nodes[idx], detached)?;
        nodes[idx].set_link(None);
        match self.tail {
            Some(tail) => nodes[tail].set_link(Some(idx)),
            None => self.head = Some(idx),
        }
        self.tail = Some(idx);
        self.len += 1;
        Ok(())
    }

    pub fn push_front<T: Linked<Tag = Tag>>(
        &mut self,
        nodes: &mut [T],
        idx: usize,
        detached: Tag,
    ) -> KernelResult<()> {
        self.claim(&mut nodes[idx], detached)?;
        nodes[idx].set_link(self.head);
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
        self.len += 1;
        Ok(())
    }

    /// Insert `idx` right after `after` (`None` = at the front)
    pub fn insert_after<T: Linked<Tag = Tag>>(
        &mut self,
        nodes: &mut [T],
        after: Option<usize>,
        idx: usize,
        detached: Tag,
    ) -> KernelResult<()> {
        let Some(prev) = after else {
            return self.push_front(nodes, idx, detached);
        };
        if nodes[prev].owner() != self.tag {
            return Err(KernelError::violation("insert position not on this list"));
        }
        self.claim(&mut nodes[idx], detached)?;
        let next = nodes[prev].link();
        nodes[idx].set_link(next);
        nodes[prev].set_link(Some(idx));
        if self.tail == Some(prev) {
            self.tail = Some(idx);
        }
        self.len += 1;
        Ok(())
    }

    pub fn pop_front<T: Linked<Tag = Tag>>(&mut self, nodes: &mut [T], detached: Tag) -> Option<usize> {
        let idx = self.head?;
        self.head = nodes[idx].link();
        if self.head.is_none() {
            self.tail = None;
        }
        nodes[idx].set_link(None);
        nodes[idx].set_owner(detached);
        self.len -= 1;
        Some(idx)
    }

    /// Unlink `idx`; false if it is not on this list
    pub fn remove<T: Linked<Tag = Tag>>(&mut self, nodes: &mut [T], idx: usize, detached: Tag) -> bool {
        if nodes[idx].owner() != self.tag {
            return false;
        }
        let mut prev: Option<usize> = None;
        let mut cur = self.head;
        while let Some(i) = cur {
            if i == idx {
                let next = nodes[i].link();
                match prev {
                    Some(p) => nodes[p].set_link(next),
                    None => self.head = next,
                }
                if self.tail == Some(i) {
                    self.tail = prev;
                }
                nodes[i].set_link(None);
                nodes[i].set_owner(detached);
                self.len -= 1;
                return true;
            }
            prev = cur;
            cur = nodes[i].link();
        }
        false
    }

    pub fn iter<'a, T: Linked<Tag = Tag>>(&self, nodes: &'a [T]) -> Iter<'a, T> {
        Iter { nodes, cur: self.head }
    }
}

/// Front-to-back walk over a list
pub(crate) struct Iter<'a, T> {
    nodes: &'a [T],
    cur: Option<usize>,
}

impl<'a, T: Linked> Iterator for Iter<'a, T> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let idx = self.cur?;
        self.cur = self.nodes[idx].link();
        Some(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Where {
        Nowhere,
        A,
        B,
    }

    #[derive(Clone, Copy)]
    struct Node {
        link: Option<usize>,
        owner: Where,
    }

    impl Linked for Node {
        type Tag = Where;
        fn link(&self) -> Option<usize> {
            self.link
        }
        fn set_link(&mut self, link: Option<usize>) {
            self.link = link;
        }
        fn owner(&self) -> Where {
            self.owner
        }
        fn set_owner(&mut self, owner: Where) {
            self.owner = owner;
        }
    }

    fn nodes(n: usize) -> Vec<Node> {
        (0..n).map(|_| Node { link: None, owner: Where::Nowhere }).collect()
    }

    #[test]
    fn test_fifo_order() {
        let mut n = nodes(4);
        let mut a = List::new(Where::A);
        for i in [2, 0, 3] {
            a.push_back(&mut n, i, Where::Nowhere).unwrap();
        }
        assert_eq!(a.iter(&n).collect::<Vec<_>>(), [2, 0, 3]);
        assert_eq!(a.pop_front(&mut n, Where::Nowhere), Some(2));
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn test_cannot_join_two_lists() {
        let mut n = nodes(2);
        let mut a = List::new(Where::A);
        let mut b = List::new(Where::B);
        a.push_back(&mut n, 1, Where::Nowhere).unwrap();
        assert!(b.push_back(&mut n, 1, Where::Nowhere).is_err());
        assert!(!b.remove(&mut n, 1, Where::Nowhere));
        assert!(a.remove(&mut n, 1, Where::Nowhere));
        b.push_back(&mut n, 1, Where::Nowhere).unwrap();
        assert_eq!(n[1].owner, Where::B);
    }

    #[test]
    fn test_remove_tail_then_append() {
        let mut n = nodes(3);
        let mut a = List::new(Where::A);
        for i in 0..3 {
            a.push_back(&mut n, i, Where::Nowhere).unwrap();
        }
        assert!(a.remove(&mut n, 2, Where::Nowhere));
        a.push_back(&mut n, 2, Where::Nowhere).unwrap();
        assert!(a.remove(&mut n, 0, Where::Nowhere));
        assert_eq!(a.iter(&n).collect::<Vec<_>>(), [1, 2]);
    }

    #[test]
    fn test_insert_after_moves_tail() {
        let mut n = nodes(3);
        let mut a = List::new(Where::A);
        a.push_back(&mut n, 0, Where::Nowhere).unwrap();
        a.insert_after(&mut n, Some(0), 1, Where::Nowhere).unwrap();
        a.push_back(&mut n, 2, Where::Nowhere).unwrap();
        assert_eq!(a.iter(&n).collect::<Vec<_>>(), [0, 1, 2]);
    }
}
