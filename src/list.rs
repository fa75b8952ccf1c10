use std::fmt;
use std::mem;
use std::ptr::{self, NonNull};

/// A node in the recency list.
///
/// Contains a value and pointers to the previous and next entries.
/// This structure is not meant to be used directly by users of the `List`.
pub struct Entry<T> {
    /// The value stored in this entry. Uses MaybeUninit to allow for sigil nodes.
    val: mem::MaybeUninit<T>,
    /// Pointer to the previous entry in the list.
    prev: *mut Entry<T>,
    /// Pointer to the next entry in the list.
    next: *mut Entry<T>,
}

impl<T> Entry<T> {
    fn new(val: T) -> Self {
        Entry {
            val: mem::MaybeUninit::new(val),
            prev: ptr::null_mut(),
            next: ptr::null_mut(),
        }
    }

    /// Creates a sentinel entry without initializing the value.
    fn new_sigil() -> Self {
        Entry {
            val: mem::MaybeUninit::uninit(),
            prev: ptr::null_mut(),
            next: ptr::null_mut(),
        }
    }

    /// Returns a reference to the stored value.
    ///
    /// # Safety
    ///
    /// Must only be called on non-sigil nodes.
    pub unsafe fn get_value(&self) -> &T {
        // SAFETY: caller guarantees this is not a sentinel
        unsafe { self.val.assume_init_ref() }
    }

    /// Returns a mutable reference to the stored value.
    ///
    /// # Safety
    ///
    /// Must only be called on non-sigil nodes.
    pub unsafe fn get_value_mut(&mut self) -> &mut T {
        // SAFETY: caller guarantees this is not a sentinel
        unsafe { self.val.assume_init_mut() }
    }

    /// Consumes a detached entry and returns its value.
    ///
    /// # Safety
    ///
    /// Must only be called on non-sigil nodes.
    pub unsafe fn into_value(self: Box<Self>) -> T {
        // SAFETY: caller guarantees this is not a sentinel
        unsafe { self.val.assume_init() }
    }
}

/// An unbounded doubly linked list ordered by recency.
///
/// The front of the list holds the most recently used entry and the back the
/// least recently used one. Capacity is enforced by the owning map, not here.
/// Sentinel nodes (sigils) at both ends keep every splice branch-free.
pub struct List<T> {
    len: usize,
    head: *mut Entry<T>,
    tail: *mut Entry<T>,
}

impl<T> List<T> {
    pub fn new() -> List<T> {
        let head = Box::into_raw(Box::new(Entry::new_sigil()));
        let tail = Box::into_raw(Box::new(Entry::new_sigil()));

        let list = List { len: 0, head, tail };

        // SAFETY: head and tail are newly allocated and valid pointers
        unsafe {
            (*list.head).next = list.tail;
            (*list.tail).prev = list.head;
        }

        list
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Adds a value to the front (most recent end) of the list.
    pub fn push_front(&mut self, v: T) -> *mut Entry<T> {
        let node = NonNull::from(Box::leak(Box::new(Entry::new(v))));
        // SAFETY: node is a newly allocated entry that is not part of any list yet
        unsafe { self.attach(node.as_ptr()) };
        self.len += 1;
        node.as_ptr()
    }

    /// Removes the least recently used entry.
    pub fn pop_back(&mut self) -> Option<Box<Entry<T>>> {
        if self.is_empty() {
            return None;
        }
        // SAFETY: the list is not empty, so tail.prev is a real entry
        unsafe {
            let last = (*self.tail).prev;
            self.detach(last);
            self.len -= 1;
            Some(Box::from_raw(last))
        }
    }

    /// Unlinks `node` and hands ownership back to the caller.
    ///
    /// # Safety
    ///
    /// `node` must be a live, non-sigil entry of this list.
    pub unsafe fn remove(&mut self, node: *mut Entry<T>) -> Box<Entry<T>> {
        // SAFETY: caller guarantees node belongs to this list
        unsafe {
            self.detach(node);
            self.len -= 1;
            Box::from_raw(node)
        }
    }

    /// Promotes `node` to the most recent position.
    ///
    /// # Safety
    ///
    /// `node` must be a live, non-sigil entry of this list.
    pub unsafe fn move_to_front(&mut self, node: *mut Entry<T>) {
        // SAFETY: caller guarantees node belongs to this list
        unsafe {
            if (*self.head).next == node {
                return;
            }
            self.detach(node);
            self.attach(node);
        }
    }

    /// Iterates from the least recently used entry to the most recent one.
    pub fn iter_oldest_first(&self) -> OldestFirst<'_, T> {
        // SAFETY: tail is valid for the lifetime of the list
        let cursor = unsafe { (*self.tail).prev };
        OldestFirst {
            cursor,
            head: self.head,
            remaining: self.len,
            _marker: std::marker::PhantomData,
        }
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        while self.pop_back().is_some() {}
    }

    unsafe fn detach(&mut self, node: *mut Entry<T>) {
        // SAFETY: node is linked, so both neighbours are valid entries
        unsafe {
            (*(*node).prev).next = (*node).next;
            (*(*node).next).prev = (*node).prev;
        }
    }

    unsafe fn attach(&mut self, node: *mut Entry<T>) {
        // SAFETY: head is valid and node is not linked into any list
        unsafe {
            (*node).next = (*self.head).next;
            (*node).prev = self.head;
            (*self.head).next = node;
            (*(*node).next).prev = node;
        }
    }
}

impl<T> Default for List<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for List<T> {
    fn drop(&mut self) {
        self.clear();

        // SAFETY: head and tail were allocated in `new` and are freed exactly once
        unsafe {
            drop(Box::from_raw(self.head));
            drop(Box::from_raw(self.tail));
        }
    }
}

impl<T> fmt::Debug for List<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("List").field("len", &self.len).finish()
    }
}

/// Borrowing iterator over list values, least recently used first.
pub struct OldestFirst<'a, T> {
    cursor: *mut Entry<T>,
    head: *mut Entry<T>,
    remaining: usize,
    _marker: std::marker::PhantomData<&'a T>,
}

impl<'a, T> Iterator for OldestFirst<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        if self.cursor == self.head || self.remaining == 0 {
            return None;
        }
        // SAFETY: cursor walks real entries between the sentinels while the
        // list is immutably borrowed
        unsafe {
            let value = (*self.cursor).get_value();
            self.cursor = (*self.cursor).prev;
            self.remaining -= 1;
            Some(value)
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}
