pub mod linked_list;

pub use linked_list::{LinkedList, LinkedListError, LinkedListResult, NodeId};
