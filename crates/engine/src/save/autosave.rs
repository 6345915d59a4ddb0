use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use super::error::PersistenceError;
use super::gateway::{lock_recovering, SaveGateway, SaveReceipt, SaveSlot};
use super::snapshot::Snapshot;

#[derive(Debug)]
pub struct BackgroundSaveOutcome {
    pub slot: SaveSlot,
    pub result: Result<SaveReceipt, PersistenceError>,
}

/// Pending writes, at most one per slot, in first-submitted order.
#[derive(Debug, Default)]
struct SaveQueue {
    pending: Vec<(SaveSlot, Snapshot)>,
    in_flight: usize,
    shutdown: bool,
}

impl SaveQueue {
    /// Returns `true` when an older pending write for the same slot was
    /// replaced.
    fn push(&mut self, slot: SaveSlot, snapshot: Snapshot) -> bool {
        if let Some(entry) = self.pending.iter_mut().find(|(queued, _)| *queued == slot) {
            entry.1 = snapshot;
            return true;
        }
        self.pending.push((slot, snapshot));
        false
    }

    fn pop(&mut self) -> Option<(SaveSlot, Snapshot)> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.pending.remove(0))
        }
    }

    fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.in_flight == 0
    }
}

#[derive(Debug, Default)]
struct Shared {
    queue: Mutex<SaveQueue>,
    changed: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SaveQueue> {
        lock_recovering(&self.queue, "save_queue")
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, SaveQueue>) -> MutexGuard<'a, SaveQueue> {
        match self.changed.wait(guard) {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("save queue lock poisoned while waiting; recovered inner value");
                poisoned.into_inner()
            }
        }
    }
}

/// Runs gateway saves on a dedicated thread.
///
/// A write that has not started yet is replaced when a newer snapshot for the
/// same slot arrives. Dropping the saver finishes every pending write first.
pub struct BackgroundSaver {
    shared: Arc<Shared>,
    outcomes: Receiver<BackgroundSaveOutcome>,
    worker: Option<JoinHandle<()>>,
}

impl BackgroundSaver {
    pub fn spawn(gateway: Arc<SaveGateway>) -> io::Result<Self> {
        let shared = Arc::new(Shared::default());
        let (sender, outcomes) = mpsc::channel();
        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("save-writer".to_string())
            .spawn(move || run_worker(&gateway, &worker_shared, &sender))?;
        Ok(Self {
            shared,
            outcomes,
            worker: Some(worker),
        })
    }

    pub fn submit(&self, slot: SaveSlot, snapshot: Snapshot) {
        let replaced = {
            let mut queue = self.shared.lock();
            queue.push(slot.clone(), snapshot)
        };
        debug!(slot = %slot, replaced, "save_queued");
        self.shared.changed.notify_all();
    }

    pub fn drain_outcomes_into(&self, out: &mut Vec<BackgroundSaveOutcome>) {
        out.extend(self.outcomes.try_iter());
    }

    /// Blocks until nothing is queued or being written.
    pub fn wait_idle(&self) {
        let mut queue = self.shared.lock();
        while !queue.is_idle() {
            queue = self.shared.wait(queue);
        }
    }

    pub fn is_idle(&self) -> bool {
        self.shared.lock().is_idle()
    }
}

impl Drop for BackgroundSaver {
    fn drop(&mut self) {
        self.shared.lock().shutdown = true;
        self.shared.changed.notify_all();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("save writer thread panicked");
            }
        }
    }
}

fn run_worker(gateway: &SaveGateway, shared: &Shared, sender: &Sender<BackgroundSaveOutcome>) {
    loop {
        let job = {
            let mut queue = shared.lock();
            loop {
                if let Some(job) = queue.pop() {
                    queue.in_flight += 1;
                    break Some(job);
                }
                if queue.shutdown {
                    break None;
                }
                queue = shared.wait(queue);
            }
        };
        let Some((slot, snapshot)) = job else {
            break;
        };

        let result = gateway.save(&slot, &snapshot);
        // The receiver is gone only while the saver is being dropped.
        let _ = sender.send(BackgroundSaveOutcome { slot, result });

        shared.lock().in_flight -= 1;
        shared.changed.notify_all();
    }
}
