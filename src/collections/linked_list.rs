use core::fmt;
use core::iter::Sum;
use core::sync::atomic::{AtomicUsize, Ordering};

cfg_if::cfg_if! {
    if #[cfg(feature = "no-std")] {
        use alloc::vec::Vec;
    } else {
        use std::vec::Vec;
    }
}

pub type LinkedListResult<T> = Result<T, LinkedListError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LinkedListError {
    /// the operation needs at least one node to anchor on
    #[error("operation requires a non-empty list")]
    EmptyList,
    /// the handle was minted by a different list
    #[error("node handle does not belong to this list")]
    InvalidTarget,
    #[error("position {position} is out of bounds for a list of length {len}")]
    OutOfBounds { position: usize, len: usize },
}

/// source of list ids, used to tell handles of different lists apart
static NEXT_LIST_ID: AtomicUsize = AtomicUsize::new(0);

/// a handle to a single node of a single list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    list: usize,
    index: usize,
}

impl NodeId {
    /// the arena index of the node, for debugging or external maps
    pub fn as_raw(&self) -> usize {
        self.index
    }
}

/// a singly-linked list whose nodes live in an arena owned by the list.
///
/// links are arena indices, so every node has exactly one owner: either
/// `head` or the `next` of its predecessor. nodes are never removed, which
/// keeps every index handed out as a `NodeId` stable for the life of the list.
pub struct LinkedList<T> {
    /// unique per list, stamped into every `NodeId`
    id: usize,
    nodes: Vec<LinkedListNode<T>>,
    head: Option<usize>,
    /// cached by `mark_tail` only, nothing else keeps it up to date
    tail: Option<usize>,
}

impl<T> LinkedList<T> {
    /// create a new, empty LinkedList
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// create a new, empty LinkedList with room for `capacity` nodes before
    /// the arena reallocates
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            id: NEXT_LIST_ID.fetch_add(1, Ordering::Relaxed),
            nodes: Vec::with_capacity(capacity),
            head: None,
            tail: None,
        }
    }

    /// count the nodes reachable from the head
    pub fn length(&self) -> usize {
        self.indices().count()
    }

    /// returns true if there is no head node
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// get the first node of the list, or None if the list is empty
    pub fn head(&self) -> Option<NodeId> {
        self.head.map(|index| self.handle(index))
    }

    /// get the cached tail, or None if no tail has been recorded.
    ///
    /// the cache is only written by `mark_tail`. any insertion after that may
    /// leave it pointing at a node that is no longer last, use `last` when the
    /// real end of the list is needed.
    pub fn tail(&self) -> Option<NodeId> {
        self.tail.map(|index| self.handle(index))
    }

    /// walk the list and return the node without a successor
    pub fn last(&self) -> Option<NodeId> {
        self.last_index().map(|index| self.handle(index))
    }

    /// record `node` as the cached tail. the node is not checked to actually
    /// be last.
    pub fn mark_tail(&mut self, node: NodeId) -> LinkedListResult<()> {
        let index = self.resolve(node)?;
        self.tail = Some(index);
        Ok(())
    }

    /// get the successor of `node`, or None if `node` is last
    pub fn next(&self, node: NodeId) -> LinkedListResult<Option<NodeId>> {
        let index = self.resolve(node)?;
        Ok(self.nodes[index].next.map(|next| self.handle(next)))
    }

    /// immutably borrow the data of `node`
    pub fn data(&self, node: NodeId) -> LinkedListResult<&T> {
        let index = self.resolve(node)?;
        Ok(self.nodes[index].data())
    }

    /// mutably borrow the data of `node`
    pub fn data_mut(&mut self, node: NodeId) -> LinkedListResult<&mut T> {
        let index = self.resolve(node)?;
        Ok(self.nodes[index].data_mut())
    }

    /// link a new node in front of the current head. the cached tail is left
    /// alone, even when the list was empty.
    pub fn prepend(&mut self, data: T) -> NodeId {
        let index = self.alloc(data, self.head);
        self.head = Some(index);
        log::trace!("list {}: prepended node {}", self.id, index);
        self.handle(index)
    }

    /// link a new node directly after `target`
    pub fn insert_after(&mut self, target: NodeId, data: T) -> LinkedListResult<NodeId> {
        let target = self.resolve(target)?;
        Ok(self.link_after(target, data))
    }

    /// link a new node directly after the node at zero-based `position`
    pub fn insert_after_position(
        &mut self,
        position: usize,
        data: T,
    ) -> LinkedListResult<NodeId> {
        if self.is_empty() {
            log::debug!("list {}: insert after {} on empty list", self.id, position);
            return Err(LinkedListError::EmptyList);
        }

        let target = self.indices().nth(position);
        match target {
            Some(target) => Ok(self.link_after(target, data)),
            None => {
                let len = self.length();
                log::debug!(
                    "list {}: insert after {} past the end (len {})",
                    self.id,
                    position,
                    len
                );
                Err(LinkedListError::OutOfBounds { position, len })
            }
        }
    }

    /// link a new node after the last node, walking the whole list to find
    /// it. on an empty list the new node becomes the head. the cached tail is
    /// neither consulted nor updated.
    pub fn append(&mut self, data: T) -> NodeId {
        match self.last_index() {
            Some(last) => self.link_after(last, data),
            None => {
                let index = self.alloc(data, None);
                self.head = Some(index);
                log::trace!("list {}: appended node {} as head", self.id, index);
                self.handle(index)
            }
        }
    }

    /// returns true if any node holds a value equal to `data`
    pub fn search(&self, data: &T) -> bool
    where
        T: PartialEq,
    {
        self.find(data).is_some()
    }

    /// get the first node holding a value equal to `data`
    pub fn find(&self, data: &T) -> Option<NodeId>
    where
        T: PartialEq,
    {
        self.indices()
            .find(|&index| self.nodes[index].data() == data)
            .map(|index| self.handle(index))
    }

    /// get the zero-based position of the first node holding a value equal
    /// to `data`
    pub fn position(&self, data: &T) -> Option<usize>
    where
        T: PartialEq,
    {
        self.iter().position(|d| d == data)
    }

    /// add up every value in the list, producing the zero of `S` when empty
    pub fn sum<'a, S>(&'a self) -> S
    where
        S: Sum<&'a T>,
    {
        self.iter().sum()
    }

    /// return an immutable iterator over the values, head first
    pub fn iter(&self) -> LinkedListIter<'_, T> {
        LinkedListIter {
            indices: self.indices(),
        }
    }

    /// return a mutable iterator over the values, head first
    pub fn iter_mut(&mut self) -> LinkedListIterMut<'_, T> {
        let order: Vec<usize> = self.indices().collect();
        let slots = self.nodes.iter_mut().map(|n| Some(&mut n.data)).collect();
        LinkedListIterMut {
            slots,
            order: order.into_iter(),
        }
    }

    /// return an iterator over the node handles, head first
    pub fn handles(&self) -> LinkedListHandles<'_, T> {
        LinkedListHandles {
            indices: self.indices(),
        }
    }

    fn indices(&self) -> Indices<'_, T> {
        Indices {
            ll: self,
            curr: self.head,
        }
    }

    fn last_index(&self) -> Option<usize> {
        let mut curr = self.head?;
        while let Some(next) = self.nodes[curr].next {
            curr = next;
        }
        Some(curr)
    }

    // Before: (target) -> (target.next)
    // After: (target) -> (n) -> (target.next)
    fn link_after(&mut self, target: usize, data: T) -> NodeId {
        let next = self.nodes[target].next;
        let index = self.alloc(data, next);
        self.nodes[target].next = Some(index);
        log::trace!("list {}: linked node {} after {}", self.id, index, target);
        self.handle(index)
    }

    fn alloc(&mut self, data: T, next: Option<usize>) -> usize {
        self.nodes.push(LinkedListNode::new(data, next));
        self.nodes.len() - 1
    }

    fn resolve(&self, node: NodeId) -> LinkedListResult<usize> {
        if node.list != self.id || node.index >= self.nodes.len() {
            log::debug!("list {}: rejected node handle {:?}", self.id, node);
            return Err(LinkedListError::InvalidTarget);
        }
        Ok(node.index)
    }

    fn handle(&self, index: usize) -> NodeId {
        NodeId {
            list: self.id,
            index,
        }
    }
}

impl<T> Default for LinkedList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for LinkedList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<'a, T> IntoIterator for &'a LinkedList<T> {
    type Item = &'a T;
    type IntoIter = LinkedListIter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// a node in the arena
struct LinkedListNode<T> {
    data: T,
    next: Option<usize>,
}

impl<T> LinkedListNode<T> {
    const fn new(data: T, next: Option<usize>) -> Self {
        Self { data, next }
    }

    fn data(&self) -> &T {
        &self.data
    }

    fn data_mut(&mut self) -> &mut T {
        &mut self.data
    }
}

/// walks arena indices by following `next` links
struct Indices<'a, T> {
    ll: &'a LinkedList<T>,
    curr: Option<usize>,
}

impl<'a, T> Iterator for Indices<'a, T> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        let curr = self.curr?;
        self.curr = self.ll.nodes[curr].next;
        Some(curr)
    }
}

pub struct LinkedListIter<'a, T> {
    indices: Indices<'a, T>,
}

impl<'a, T> Iterator for LinkedListIter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let ll = self.indices.ll;
        self.indices.next().map(|index| ll.nodes[index].data())
    }
}

pub struct LinkedListIterMut<'a, T> {
    /// one borrow per arena slot, taken out in list order
    slots: Vec<Option<&'a mut T>>,
    order: <Vec<usize> as IntoIterator>::IntoIter,
}

impl<'a, T> Iterator for LinkedListIterMut<'a, T> {
    type Item = &'a mut T;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.order.next()?;
        self.slots[index].take()
    }
}

pub struct LinkedListHandles<'a, T> {
    indices: Indices<'a, T>,
}

impl<'a, T> Iterator for LinkedListHandles<'a, T> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let ll = self.indices.ll;
        self.indices.next().map(|index| ll.handle(index))
    }
}


#[cfg(test)]
mod iter_test {
    use super::*;

    #[test]
    fn basic_iter_test() {
        let mut ll = LinkedList::new();
        let nums = [73, 42, 114, 901];
        for n in nums {
            ll.append(n);
        }

        for (data, num) in ll.iter().zip(nums.iter()) {
            assert_eq!(data, num);
        }
    }

    #[test]
    fn iter_terminates_properly_single_element() {
        let mut ll = LinkedList::new();
        let val = 42;
        ll.append(val);

        let mut iter = ll.iter();
        assert_eq!(&val, iter.next().expect("should produce a value"));

        for _i in 0..10 {
            assert!(iter.next().is_none());
        }
    }

    #[test]
    fn iter_on_empty_list_returns_none() {
        let ll = LinkedList::<u32>::new();
        assert!(ll.iter().next().is_none());
        assert!(ll.handles().next().is_none());
    }

    #[test]
    fn into_iter_for_reference() {
        let mut ll = LinkedList::new();
        ll.prepend(2);
        ll.prepend(1);
        let mut seen = Vec::new();
        for data in &ll {
            seen.push(*data);
        }
        assert_eq!(seen, [1, 2]);
    }

    #[test]
    fn basic_iter_mut_test() {
        let mut ll = LinkedList::new();
        let nums = [73, 42, 114, 901];
        for n in nums {
            ll.append(n);
        }

        for data in ll.iter_mut() {
            *data += 1;
        }

        for (data, num) in ll.iter().zip(nums.iter()) {
            assert_eq!(data, &(*num + 1));
        }
    }

    #[test]
    fn iter_mut_follows_links_not_arena_order() {
        let mut ll = LinkedList::new();
        // arena order is [3, 2, 1], list order is [1, 2, 3]
        ll.prepend(3);
        ll.prepend(2);
        ll.prepend(1);

        let mut seen = Vec::new();
        for (i, data) in ll.iter_mut().enumerate() {
            seen.push(*data);
            *data = i as u32 * 10;
        }
        assert_eq!(seen, [1, 2, 3]);
        assert_eq!(ll.iter().copied().collect::<Vec<_>>(), [0, 10, 20]);
    }

    #[test]
    fn iter_mut_terminates_properly_multi_element() {
        let mut ll = LinkedList::new();
        ll.append(42);
        ll.append(73);

        let mut iter = ll.iter_mut();
        assert_eq!(&42, iter.next().expect("should produce a value"));
        assert_eq!(&73, iter.next().expect("should produce a value"));

        for _i in 0..10 {
            assert!(iter.next().is_none());
        }
    }
}

// proptest doesn't run under miri with default config
#[cfg(all(not(miri), test))]
mod proptests {
    use proptest::collection::vec;
    use proptest::prelude::*;
    use proptest::sample::Index;
    use proptest::test_runner::Config;
    use proptest_derive::Arbitrary;
    use proptest_state_machine::{ReferenceStateMachine, StateMachineTest};
    use rand::Rng;

    use super::*;

    proptest_state_machine::prop_state_machine! {
        #![proptest_config(Config {
            failure_persistence: None,
            .. Config::default()
        })]

        #[test]
        fn linked_list_state_machine_test(
            sequential
            1..200
            =>
            LinkedList<u32>
        );
    }

    #[derive(Clone, Debug)]
    pub enum Transition {
        Prepend(u32),
        Append(u32),
        InsertAfter(Index, u32),
    }

    pub struct LinkedListStateMachine;

    impl ReferenceStateMachine for LinkedListStateMachine {
        type State = Vec<u32>;
        type Transition = Transition;

        fn init_state() -> BoxedStrategy<Self::State> {
            Just(Vec::new()).boxed()
        }

        fn transitions(state: &Self::State) -> BoxedStrategy<Self::Transition> {
            if state.is_empty() {
                prop_oneof![
                    any::<u32>().prop_map(Transition::Prepend),
                    any::<u32>().prop_map(Transition::Append),
                ]
                .boxed()
            } else {
                prop_oneof![
                    1 => any::<u32>().prop_map(Transition::Prepend),
                    1 => any::<u32>().prop_map(Transition::Append),
                    2 => (any::<Index>(), any::<u32>())
                        .prop_map(|(at, value)| Transition::InsertAfter(at, value)),
                ]
                .boxed()
            }
        }

        fn preconditions(state: &Self::State, transition: &Self::Transition) -> bool {
            match transition {
                Transition::InsertAfter(..) => !state.is_empty(),
                _ => true,
            }
        }

        fn apply(mut state: Self::State, transition: &Self::Transition) -> Self::State {
            match transition {
                Transition::Prepend(value) => state.insert(0, *value),
                Transition::Append(value) => state.push(*value),
                Transition::InsertAfter(at, value) => {
                    let position = at.index(state.len());
                    state.insert(position + 1, *value);
                }
            }
            state
        }
    }

    impl StateMachineTest for LinkedList<u32> {
        type SystemUnderTest = Self;
        type Reference = LinkedListStateMachine;

        fn init_test(
            _ref_state: &<Self::Reference as ReferenceStateMachine>::State,
        ) -> Self::SystemUnderTest {
            Self::new()
        }

        fn apply(
            mut state: Self::SystemUnderTest,
            _ref_state: &<Self::Reference as ReferenceStateMachine>::State,
            transition: Transition,
        ) -> Self::SystemUnderTest {
            match transition {
                Transition::Prepend(value) => {
                    state.prepend(value);
                }
                Transition::Append(value) => {
                    state.append(value);
                }
                Transition::InsertAfter(at, value) => {
                    let position = at.index(state.length());
                    let target = state
                        .handles()
                        .nth(position)
                        .expect("position is within the list");
                    state
                        .insert_after(target, value)
                        .expect("failed to insert_after");
                }
            }
            state
        }

        fn check_invariants(
            state: &Self::SystemUnderTest,
            ref_state: &<Self::Reference as ReferenceStateMachine>::State,
        ) {
            assert_eq!(state.length(), ref_state.len());
            // nothing is ever unlinked, so every arena node must be reachable
            assert_eq!(state.length(), state.nodes.len());
            assert_eq!(state.iter().copied().collect::<Vec<_>>(), *ref_state);

            for value in ref_state.iter() {
                assert!(state.search(value));
            }

            match state.last() {
                Some(last) => {
                    assert_eq!(state.next(last), Ok(None));
                    assert_eq!(state.data(last).ok(), ref_state.last());
                }
                None => assert!(ref_state.is_empty()),
            }
        }
    }

    #[derive(Arbitrary, Debug)]
    enum Operation {
        Prepend(u16),
        Append(u16),
        InsertAfter(u16),
        Search(u16),
        SearchExisting,
        Sum,
    }

    fn get_random(reference: &[u64]) -> Option<usize> {
        if reference.is_empty() {
            return None;
        }

        Some(rand::thread_rng().gen_range(0..reference.len()))
    }

    proptest! {
        #[test]
        fn operation_sequences(ops in vec(any::<Operation>(), 0..256)) {
            let mut reference: Vec<u64> = Vec::new();
            let mut ll = LinkedList::new();

            for op in ops.iter() {
                match op {
                    Operation::Prepend(i) => {
                        reference.insert(0, u64::from(*i));
                        ll.prepend(u64::from(*i));
                    }
                    Operation::Append(i) => {
                        reference.push(u64::from(*i));
                        ll.append(u64::from(*i));
                    }
                    Operation::InsertAfter(i) => match get_random(&reference) {
                        Some(position) => {
                            reference.insert(position + 1, u64::from(*i));
                            ll.insert_after_position(position, u64::from(*i))
                                .expect("failed to insert_after_position");
                        }
                        None => {
                            prop_assert_eq!(
                                ll.insert_after_position(0, u64::from(*i)),
                                Err(LinkedListError::EmptyList)
                            );
                        }
                    },
                    Operation::Search(i) => {
                        let i = u64::from(*i);
                        prop_assert_eq!(ll.search(&i), reference.contains(&i));
                        prop_assert_eq!(
                            ll.position(&i),
                            reference.iter().position(|r| *r == i)
                        );
                    }
                    Operation::SearchExisting => {
                        if let Some(position) = get_random(&reference) {
                            let target = reference[position];
                            prop_assert!(ll.search(&target));
                            let found = ll.find(&target).expect("value is in the list");
                            prop_assert_eq!(ll.data(found), Ok(&target));
                        }
                    }
                    Operation::Sum => {
                        prop_assert_eq!(ll.sum::<u64>(), reference.iter().sum::<u64>());
                    }
                }
                prop_assert_eq!(ll.length(), reference.len());
            }

            prop_assert_eq!(ll.iter().copied().collect::<Vec<_>>(), reference);
        }
    }
}
