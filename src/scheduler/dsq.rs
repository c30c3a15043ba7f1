/*
 * Shared Dispatch Queue
 *
 * One ordering domain visible to every CPU. Any CPU may insert; the queue
 * pops one entry at a time under its lock, so concurrent consumers never
 * receive the same task twice.
 *
 * Ordering is delegated to a QueueDiscipline:
 * - FifoDiscipline: arrival order (SCX_ENQ_HEAD inserts at the front)
 * - VtimeDiscipline: lowest virtual time first, arrival order on ties
 *
 * Callers never know which discipline is plugged in, so a new ordering only
 * needs a new QueueDiscipline impl.
 */

use alloc::boxed::Box;
use alloc::collections::{BTreeMap, VecDeque};

use spin::Mutex;

use super::types::{DsqId, EnqFlags, SliceNs, TaskId};

/// A task waiting in a dispatch queue
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DsqEntry {
    pub task: TaskId,
    pub slice: SliceNs,
    pub enq_flags: EnqFlags,
    /// Ordering key for vtime queues (ignored by FIFO)
    pub vtime: u64,
}

impl DsqEntry {
    pub fn new(task: TaskId, slice: SliceNs, enq_flags: EnqFlags) -> Self {
        Self {
            task,
            slice,
            enq_flags,
            vtime: 0,
        }
    }

    pub fn with_vtime(mut self, vtime: u64) -> Self {
        self.vtime = vtime;
        self
    }
}

/// Ordering policy of a dispatch queue
pub trait QueueDiscipline: Send {
    fn insert(&mut self, entry: DsqEntry);

    fn pop(&mut self) -> Option<DsqEntry>;

    fn peek(&self) -> Option<&DsqEntry>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn name(&self) -> &'static str;
}

/// Arrival-order queue
#[derive(Debug, Default)]
pub struct FifoDiscipline {
    queue: VecDeque<DsqEntry>,
}

impl FifoDiscipline {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }
}

impl QueueDiscipline for FifoDiscipline {
    fn insert(&mut self, entry: DsqEntry) {
        if entry.enq_flags.contains(EnqFlags::HEAD) {
            self.queue.push_front(entry);
        } else {
            self.queue.push_back(entry);
        }
    }

    fn pop(&mut self) -> Option<DsqEntry> {
        self.queue.pop_front()
    }

    fn peek(&self) -> Option<&DsqEntry> {
        self.queue.front()
    }

    fn len(&self) -> usize {
        self.queue.len()
    }

    fn name(&self) -> &'static str {
        "fifo"
    }
}

/// Virtual-time ordered queue
///
/// Keyed on (vtime, seq); seq is a per-queue insertion counter so equal
/// vtimes drain in arrival order.
#[derive(Debug, Default)]
pub struct VtimeDiscipline {
    tree: BTreeMap<(u64, u64), DsqEntry>,
    seq: u64,
}

impl VtimeDiscipline {
    pub fn new() -> Self {
        Self {
            tree: BTreeMap::new(),
            seq: 0,
        }
    }
}

impl QueueDiscipline for VtimeDiscipline {
    fn insert(&mut self, entry: DsqEntry) {
        let seq = self.seq;
        self.seq = self.seq.wrapping_add(1);
        self.tree.insert((entry.vtime, seq), entry);
    }

    fn pop(&mut self) -> Option<DsqEntry> {
        self.tree.pop_first().map(|(_, entry)| entry)
    }

    fn peek(&self) -> Option<&DsqEntry> {
        self.tree.first_key_value().map(|(_, entry)| entry)
    }

    fn len(&self) -> usize {
        self.tree.len()
    }

    fn name(&self) -> &'static str {
        "vtime"
    }
}

/// Dispatch queue shared by all CPUs
pub struct DispatchQueue {
    id: DsqId,
    inner: Mutex<Box<dyn QueueDiscipline>>,
}

impl DispatchQueue {
    pub fn new(id: DsqId, discipline: Box<dyn QueueDiscipline>) -> Self {
        Self {
            id,
            inner: Mutex::new(discipline),
        }
    }

    pub fn fifo(id: DsqId) -> Self {
        Self::new(id, Box::new(FifoDiscipline::new()))
    }

    pub fn vtime(id: DsqId) -> Self {
        Self::new(id, Box::new(VtimeDiscipline::new()))
    }

    pub fn id(&self) -> DsqId {
        self.id
    }

    pub fn discipline(&self) -> &'static str {
        self.inner.lock().name()
    }

    /// Append a task
    pub fn insert(&self, entry: DsqEntry) {
        self.inner.lock().insert(entry);
    }

    /// Remove and return the next task in queue order
    pub fn pop(&self) -> Option<DsqEntry> {
        self.inner.lock().pop()
    }

    /// Task that the next `pop` would return
    pub fn peek(&self) -> Option<TaskId> {
        self.inner.lock().peek().map(|entry| entry.task)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl core::fmt::Debug for DispatchQueue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("DispatchQueue")
            .field("id", &self.id)
            .field("discipline", &inner.name())
            .field("len", &inner.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::sync::Arc;
    use alloc::vec::Vec;

    fn entry(task: u64) -> DsqEntry {
        DsqEntry::new(TaskId(task), SliceNs::DEFAULT, EnqFlags::empty())
    }

    #[test]
    fn test_fifo_preserves_arrival_order() {
        let dsq = DispatchQueue::fifo(DsqId::SHARED);
        for task in [3, 1, 2] {
            dsq.insert(entry(task));
        }

        assert_eq!(dsq.len(), 3);
        assert_eq!(dsq.peek(), Some(TaskId(3)));
        let drained: Vec<u64> = core::iter::from_fn(|| dsq.pop()).map(|e| e.task.0).collect();
        assert_eq!(drained, [3, 1, 2]);
        assert!(dsq.is_empty());
        assert_eq!(dsq.pop(), None);
    }

    #[test]
    fn test_fifo_head_flag() {
        let dsq = DispatchQueue::fifo(DsqId::SHARED);
        dsq.insert(entry(1));
        dsq.insert(DsqEntry::new(TaskId(2), SliceNs::DEFAULT, EnqFlags::HEAD));

        assert_eq!(dsq.pop().map(|e| e.task), Some(TaskId(2)));
        assert_eq!(dsq.pop().map(|e| e.task), Some(TaskId(1)));
    }

    #[test]
    fn test_vtime_orders_by_vtime_then_arrival() {
        let dsq = DispatchQueue::vtime(DsqId::SHARED);
        dsq.insert(entry(1).with_vtime(50));
        dsq.insert(entry(2).with_vtime(10));
        dsq.insert(entry(3).with_vtime(50));
        dsq.insert(entry(4).with_vtime(10));

        let drained: Vec<u64> = core::iter::from_fn(|| dsq.pop()).map(|e| e.task.0).collect();
        assert_eq!(drained, [2, 4, 1, 3]);
    }

    #[test]
    fn test_pop_keeps_slice_and_flags() {
        let dsq = DispatchQueue::fifo(DsqId::SHARED);
        dsq.insert(DsqEntry::new(TaskId(7), SliceNs(5), EnqFlags::WAKEUP));

        let e = dsq.pop().unwrap();
        assert_eq!(e.slice, SliceNs(5));
        assert_eq!(e.enq_flags, EnqFlags::WAKEUP);
        assert_eq!(dsq.discipline(), "fifo");
    }

    #[test]
    fn test_concurrent_producers_keep_per_producer_order() {
        let dsq = Arc::new(DispatchQueue::fifo(DsqId::SHARED));
        let producers: Vec<_> = (0..4u64)
            .map(|p| {
                let dsq = Arc::clone(&dsq);
                std::thread::spawn(move || {
                    for i in 0..250u64 {
                        dsq.insert(entry(p * 1000 + i));
                    }
                })
            })
            .collect();
        for handle in producers {
            handle.join().unwrap();
        }

        assert_eq!(dsq.len(), 1000);
        let mut last = [None::<u64>; 4];
        while let Some(e) = dsq.pop() {
            let producer = (e.task.0 / 1000) as usize;
            let seq = e.task.0 % 1000;
            if let Some(prev) = last[producer] {
                assert!(seq > prev, "producer {} reordered", producer);
            }
            last[producer] = Some(seq);
        }
    }
}
