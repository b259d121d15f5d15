use std::cell::RefCell;
use std::collections::VecDeque;

use serde::Serialize;
use tracing::{debug, warn};

use crate::sync::{record_last_error, KeyFailure, SyncEngine, SyncError};

/// Remote work queued by an accessor write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboxTask {
    Push { key: String },
    DeleteList { title: String },
}

impl OutboxTask {
    fn label(&self) -> String {
        match self {
            OutboxTask::Push { key } => key.clone(),
            OutboxTask::DeleteList { title } => format!("delete list '{title}'"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SettleReport {
    pub completed: u64,
    pub failures: Vec<KeyFailure>,
}

/// FIFO queue of pending remote work. A push reads the record at drain
/// time, so queuing the same key twice is redundant and coalesces. A
/// coalesced push moves to the back so it still runs after every task
/// queued before it.
#[derive(Debug, Default)]
pub struct Outbox {
    tasks: RefCell<VecDeque<OutboxTask>>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when an equal task is already queued. An equal push
    /// is moved to the back of the queue; an equal list delete stays put.
    pub fn enqueue(&self, task: OutboxTask) -> bool {
        let mut tasks = self.tasks.borrow_mut();
        let Some(position) = tasks.iter().position(|queued| *queued == task) else {
            debug!(task = %task.label(), "queued remote task");
            tasks.push_back(task);
            return true;
        };
        if matches!(task, OutboxTask::Push { .. }) && position + 1 < tasks.len() {
            if let Some(earlier) = tasks.remove(position) {
                debug!(task = %earlier.label(), "moved coalesced push to the back");
                tasks.push_back(earlier);
            }
        }
        false
    }

    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }

    pub fn pending(&self) -> Vec<OutboxTask> {
        self.tasks.borrow().iter().cloned().collect()
    }

    /// Runs every queued task in order. Failed pushes keep their dirty
    /// marker for the next sync cycle; the latest failure becomes the
    /// recorded sync error.
    pub fn settle(&self, engine: &SyncEngine<'_>) -> Result<SettleReport, SyncError> {
        let mut report = SettleReport::default();
        loop {
            let Some(task) = self.tasks.borrow_mut().pop_front() else {
                break;
            };
            let result = match &task {
                OutboxTask::Push { key } => engine.push_key(key).map(|_| ()),
                OutboxTask::DeleteList { title } => engine.delete_remote_list(title),
            };
            match result {
                Ok(()) => report.completed += 1,
                Err(SyncError::Db(err)) => return Err(SyncError::Db(err)),
                Err(err) => {
                    warn!(task = %task.label(), error = %err, "background remote task failed");
                    report.failures.push(KeyFailure {
                        key: task.label(),
                        message: err.to_string(),
                    });
                }
            }
        }

        if let Some(last) = report.failures.last() {
            record_last_error(engine.store(), Some(&last.message))?;
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::Month;

    use super::{Outbox, OutboxTask};
    use crate::remote::RemoteGateway;
    use crate::store::{LocalStore, Origin};
    use crate::sync::{current_status, SyncEngine, SyncStatus};
    use crate::test_support::{cleanup_db_files, date, unique_db_path, FakeRemote};

    fn push(key: &str) -> OutboxTask {
        OutboxTask::Push {
            key: key.to_string(),
        }
    }

    #[test]
    fn identical_tasks_coalesce() {
        let outbox = Outbox::new();
        assert!(outbox.enqueue(push("habits")));
        assert!(!outbox.enqueue(push("habits")));
        assert!(outbox.enqueue(OutboxTask::DeleteList {
            title: "Chores".to_string()
        }));
        assert!(outbox.enqueue(push("customListsMeta")));
        assert_eq!(outbox.len(), 3);
        assert_eq!(outbox.pending()[0], push("habits"));
        assert!(!outbox.enqueue(OutboxTask::DeleteList {
            title: "Chores".to_string()
        }));
        assert_eq!(
            outbox.pending()[1],
            OutboxTask::DeleteList {
                title: "Chores".to_string()
            }
        );
    }

    #[test]
    fn repeated_push_runs_after_later_list_delete() {
        let outbox = Outbox::new();
        outbox.enqueue(push("list-errands"));
        outbox.enqueue(OutboxTask::DeleteList {
            title: "Errands".to_string(),
        });
        outbox.enqueue(push("customListsMeta"));

        assert!(!outbox.enqueue(push("list-errands")));
        assert_eq!(
            outbox.pending(),
            vec![
                OutboxTask::DeleteList {
                    title: "Errands".to_string()
                },
                push("customListsMeta"),
                push("list-errands"),
            ]
        );
    }

    #[test]
    fn settle_runs_tasks_in_order_and_clears_markers() {
        let path = unique_db_path("daybook-outbox");
        let store = LocalStore::open(&path).expect("store should open");
        let remote = FakeRemote::signed_in("ada");
        remote
            .set_list("Chores", &[json!({"text": "dust"})], "🧹")
            .expect("seed list");
        store
            .set("customListsMeta", &json!([]), Origin::Local)
            .expect("local write");
        let outbox = Outbox::new();
        outbox.enqueue(OutboxTask::DeleteList {
            title: "Chores".to_string(),
        });
        outbox.enqueue(push("customListsMeta"));

        let engine = SyncEngine::new(&store, &remote, date(2024, Month::January, 5));
        let report = outbox.settle(&engine).expect("settle should run");

        assert_eq!(report.completed, 2);
        assert!(outbox.is_empty());
        assert!(remote.state.borrow().lists.is_empty());
        assert_eq!(
            *remote.calls.borrow(),
            vec![
                "set_list:Chores".to_string(),
                "delete_list:Chores".to_string(),
                "set_setting:customListsMeta".to_string()
            ]
        );
        assert_eq!(store.count_dirty().expect("count"), 0);

        cleanup_db_files(&path);
    }

    #[test]
    fn failed_task_keeps_marker_and_records_error() {
        let path = unique_db_path("daybook-outbox-fail");
        let store = LocalStore::open(&path).expect("store should open");
        let remote = FakeRemote::signed_in("ada");
        remote.fail_writes_to("habits");
        store
            .set("habits", &json!([{"name": "Run"}]), Origin::Local)
            .expect("local write");
        let outbox = Outbox::new();
        outbox.enqueue(push("habits"));

        let engine = SyncEngine::new(&store, &remote, date(2024, Month::January, 5));
        let report = outbox.settle(&engine).expect("settle should run");

        assert_eq!(report.completed, 0);
        assert_eq!(report.failures.len(), 1);
        assert!(outbox.is_empty());
        assert!(store.is_dirty("habits").expect("dirty lookup"));
        assert!(matches!(
            current_status(&store).expect("status"),
            SyncStatus::Error(_)
        ));

        cleanup_db_files(&path);
    }
}
