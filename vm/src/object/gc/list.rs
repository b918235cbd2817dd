//! Index based doubly linked lists holding every tracked object.
//!
//! All lists share one slab of links. The first `heads` links are the sentinels of the
//! lists (one per generation, the permanent generation and the unreachable set of a
//! running collection), every other link holds one item. Objects keep the [`SlotId`] of
//! their link in their header, so insert, remove, move and merge are all O(1) without
//! self referential pointers inside the objects.

use std::fmt;

/// Position of a tracked item inside a [`TrackingList`]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(u32);

impl fmt::Debug for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
struct Link<T> {
    prev: u32,
    next: u32,
    item: Option<T>,
}

#[derive(Debug)]
pub(crate) struct TrackingList<T> {
    links: Vec<Link<T>>,
    free: Vec<u32>,
    heads: u32,
}

impl<T: Copy> TrackingList<T> {
    pub fn new(heads: usize) -> Self {
        let heads = heads as u32;
        let links = (0..heads)
            .map(|i| Link {
                prev: i,
                next: i,
                item: None,
            })
            .collect();
        Self {
            links,
            free: Vec::new(),
            heads,
        }
    }

    #[inline]
    fn head(&self, head: usize) -> u32 {
        debug_assert!(head < self.heads as usize, "no such list head: {head}");
        head as u32
    }

    #[inline]
    fn link(&self, i: u32) -> &Link<T> {
        &self.links[i as usize]
    }

    #[inline]
    fn link_mut(&mut self, i: u32) -> &mut Link<T> {
        &mut self.links[i as usize]
    }

    fn unlink(&mut self, i: u32) {
        let Link { prev, next, .. } = *self.link(i);
        self.link_mut(prev).next = next;
        self.link_mut(next).prev = prev;
    }

    /// link `i` right before `at`, which is the tail of the list when `at` is a head
    fn link_before(&mut self, i: u32, at: u32) {
        let prev = self.link(at).prev;
        let link = self.link_mut(i);
        link.prev = prev;
        link.next = at;
        self.link_mut(prev).next = i;
        self.link_mut(at).prev = i;
    }

    /// append `item` to the list `head`
    pub fn insert(&mut self, head: usize, item: T) -> SlotId {
        let at = self.head(head);
        let i = match self.free.pop() {
            Some(i) => {
                self.link_mut(i).item = Some(item);
                i
            }
            None => {
                let i = self.links.len() as u32;
                self.links.push(Link {
                    prev: i,
                    next: i,
                    item: Some(item),
                });
                i
            }
        };
        self.link_before(i, at);
        SlotId(i)
    }

    /// unlink the slot and give back its item, `None` if the slot is not in use
    pub fn remove(&mut self, slot: SlotId) -> Option<T> {
        let i = slot.0;
        if i < self.heads {
            return None;
        }
        let item = self.links.get_mut(i as usize)?.item.take()?;
        self.unlink(i);
        let link = self.link_mut(i);
        link.prev = i;
        link.next = i;
        self.free.push(i);
        Some(item)
    }

    /// move a slot to the tail of another list
    pub fn move_to(&mut self, slot: SlotId, head: usize) {
        let at = self.head(head);
        debug_assert!(self.get(slot).is_some(), "moving a free slot {slot:?}");
        self.unlink(slot.0);
        self.link_before(slot.0, at);
    }

    /// append every item of `from` to `to`, leaving `from` empty
    pub fn merge(&mut self, from: usize, to: usize) {
        let (from, to) = (self.head(from), self.head(to));
        if from == to || self.link(from).next == from {
            return;
        }
        let first = self.link(from).next;
        let last = self.link(from).prev;
        let tail = self.link(to).prev;
        self.link_mut(tail).next = first;
        self.link_mut(first).prev = tail;
        self.link_mut(last).next = to;
        self.link_mut(to).prev = last;
        let head = self.link_mut(from);
        head.prev = from;
        head.next = from;
    }

    /// O(n), walks the list
    pub fn len(&self, head: usize) -> usize {
        self.iter(head).count()
    }

    pub fn first(&self, head: usize) -> Option<SlotId> {
        let h = self.head(head);
        let next = self.link(h).next;
        (next != h).then_some(SlotId(next))
    }

    /// the slot after `slot` in its list, `None` at the end
    pub fn next(&self, slot: SlotId) -> Option<SlotId> {
        let next = self.link(slot.0).next;
        (next >= self.heads).then_some(SlotId(next))
    }

    pub fn get(&self, slot: SlotId) -> Option<T> {
        if slot.0 < self.heads {
            return None;
        }
        self.links.get(slot.0 as usize).and_then(|link| link.item)
    }

    pub fn iter(&self, head: usize) -> Iter<'_, T> {
        Iter {
            list: self,
            cursor: self.first(head),
        }
    }
}

pub(crate) struct Iter<'a, T> {
    list: &'a TrackingList<T>,
    cursor: Option<SlotId>,
}

impl<'a, T: Copy> Iterator for Iter<'a, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let slot = self.cursor?;
        self.cursor = self.list.next(slot);
        self.list.get(slot)
    }
}
