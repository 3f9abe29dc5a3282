use std::collections::VecDeque;

use crate::admin::HealResultItem;

pub const DEFAULT_STATUS_QUEUE_CAPACITY: usize = 1000;

/// Bounded log of heal results waiting to be polled. A push on a full
/// queue evicts the oldest item.
#[derive(Debug)]
pub struct StatusQueue {
    items: VecDeque<HealResultItem>,
    capacity: usize,
    last_index: u64,
}

impl Default for StatusQueue {
    fn default() -> Self {
        StatusQueue::new(DEFAULT_STATUS_QUEUE_CAPACITY)
    }
}

impl StatusQueue {
    pub fn new(capacity: usize) -> StatusQueue {
        let capacity = capacity.max(1);
        StatusQueue {
            items: VecDeque::with_capacity(capacity.min(DEFAULT_STATUS_QUEUE_CAPACITY)),
            capacity,
            last_index: 0,
        }
    }

    /// Appends `item`, stamping it with the next result index, and returns
    /// that index.
    pub fn push(&mut self, mut item: HealResultItem) -> u64 {
        if self.items.len() >= self.capacity {
            self.items.pop_front();
        }
        self.last_index += 1;
        item.result_index = self.last_index;
        self.items.push_back(item);
        self.last_index
    }

    pub fn drain(&mut self) -> Vec<HealResultItem> {
        self.items.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn last_index(&self) -> u64 {
        self.last_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(object: &str) -> HealResultItem {
        HealResultItem {
            object: object.to_owned(),
            ..Default::default()
        }
    }

    #[test]
    fn test_index_continues_across_drains() {
        let mut q = StatusQueue::default();
        assert_eq!(q.push(item("a")), 1);
        assert_eq!(q.push(item("b")), 2);
        let items = q.drain();
        assert_eq!(
            items.iter().map(|i| i.result_index).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert!(q.is_empty());

        assert_eq!(q.push(item("c")), 3);
        assert_eq!(q.drain()[0].result_index, 3);
    }

    #[test]
    fn test_full_queue_drops_oldest() {
        let mut q = StatusQueue::new(3);
        for name in &["a", "b", "c", "d", "e"] {
            q.push(item(name));
        }
        assert_eq!(q.len(), 3);
        assert_eq!(q.last_index(), 5);
        let items = q.drain();
        assert_eq!(
            items.iter().map(|i| i.object.as_str()).collect::<Vec<_>>(),
            vec!["c", "d", "e"]
        );
        assert_eq!(items[0].result_index, 3);
    }
}
