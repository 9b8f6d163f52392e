//! Insertion-ordered doubly linked queue with O(1) removal by node reference.
//!
//! Nodes live in a generational arena so a [`NodeRef`] doubles as a stable
//! key: the watch registry uses it to address resources, and a reference to a
//! node that was already removed never resolves to whatever later reuses the
//! slot.

/// Reference to a node inside a [`Queue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef {
    index: usize,
    generation: u64,
}

#[derive(Debug)]
struct Node<T> {
    value: T,
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Debug)]
struct Slot<T> {
    generation: u64,
    node: Option<Node<T>>,
}

/// FIFO queue that also supports excising any node given its [`NodeRef`].
///
/// The queue owns its nodes and the values stored in them; dropping or
/// clearing the queue releases both.
#[derive(Debug)]
pub struct Queue<T> {
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Queue<T> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    /// Append a value at the back and return a reference to its node.
    pub fn enqueue(&mut self, value: T) -> NodeRef {
        let node = Node {
            value,
            prev: self.tail,
            next: None,
        };

        let index = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index];
                slot.generation += 1;
                slot.node = Some(node);
                index
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                self.slots.len() - 1
            }
        };

        match self.tail {
            Some(tail) => self.node_mut(tail).next = Some(index),
            None => self.head = Some(index),
        }
        self.tail = Some(index);
        self.len += 1;

        NodeRef {
            index,
            generation: self.slots[index].generation,
        }
    }

    /// Pop the value at the front, `None` when empty.
    pub fn dequeue(&mut self) -> Option<T> {
        let head = self.head?;
        self.unlink(head)
    }

    /// Remove the node behind `node` wherever it sits in the queue.
    ///
    /// Returns `None` if the reference is stale.
    pub fn remove(&mut self, node: NodeRef) -> Option<T> {
        if !self.contains(node) {
            return None;
        }
        self.unlink(node.index)
    }

    /// Whether `node` still refers to a live entry.
    pub fn contains(&self, node: NodeRef) -> bool {
        self.slots
            .get(node.index)
            .is_some_and(|slot| slot.generation == node.generation && slot.node.is_some())
    }

    pub fn get(&self, node: NodeRef) -> Option<&T> {
        let slot = self.slots.get(node.index)?;
        if slot.generation != node.generation {
            return None;
        }
        slot.node.as_ref().map(|n| &n.value)
    }

    pub fn get_mut(&mut self, node: NodeRef) -> Option<&mut T> {
        let slot = self.slots.get_mut(node.index)?;
        if slot.generation != node.generation {
            return None;
        }
        slot.node.as_mut().map(|n| &mut n.value)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drop every entry. Outstanding references become stale.
    pub fn clear(&mut self) {
        while self.dequeue().is_some() {}
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            queue: self,
            cursor: self.head,
        }
    }

    fn node_mut(&mut self, index: usize) -> &mut Node<T> {
        self.slots[index]
            .node
            .as_mut()
            .unwrap_or_else(|| unreachable!("linked slot {index} is vacant"))
    }

    fn unlink(&mut self, index: usize) -> Option<T> {
        let node = self.slots[index].node.take()?;

        match node.prev {
            Some(prev) => self.node_mut(prev).next = node.next,
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => self.node_mut(next).prev = node.prev,
            None => self.tail = node.prev,
        }

        self.free.push(index);
        self.len -= 1;
        Some(node.value)
    }
}

/// Borrowing iterator over a [`Queue`], front to back.
pub struct Iter<'a, T> {
    queue: &'a Queue<T>,
    cursor: Option<usize>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (NodeRef, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.cursor?;
        let slot = &self.queue.slots[index];
        let node = slot.node.as_ref()?;
        self.cursor = node.next;
        Some((
            NodeRef {
                index,
                generation: slot.generation,
            },
            &node.value,
        ))
    }
}

impl<T> Extend<T> for Queue<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.enqueue(value);
        }
    }
}

impl<T> FromIterator<T> for Queue<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut queue = Queue::new();
        queue.extend(iter);
        queue
    }
}
