//! Shared state handed to every task
//!
//! [`SyncContext`] bundles the two ports, the run options and the reporter.
//! It is the [`TaskHandler`] the worker pool drives; the task bodies live in
//! the [`tasks`](crate::tasks) module as methods on this type.

use std::sync::Arc;

use odsync_core::domain::ChangeDetector;
use odsync_core::ports::{ICloudProvider, ILocalFileSystem};

use crate::engine::SyncOptions;
use crate::reporter::Reporter;
use crate::scheduler::{TaskHandler, TaskQueue};
use crate::tasks::Task;

pub type Queue = Arc<TaskQueue<Task>>;

pub struct SyncContext {
    pub(crate) cloud: Arc<dyn ICloudProvider>,
    pub(crate) fs: Arc<dyn ILocalFileSystem>,
    pub(crate) options: SyncOptions,
    pub(crate) detector: ChangeDetector,
    pub(crate) reporter: Arc<Reporter>,
}

impl SyncContext {
    pub fn new(
        cloud: Arc<dyn ICloudProvider>,
        fs: Arc<dyn ILocalFileSystem>,
        options: SyncOptions,
        reporter: Arc<Reporter>,
    ) -> Self {
        let detector = ChangeDetector::new(options.change_policy());
        Self {
            cloud,
            fs,
            options,
            detector,
            reporter,
        }
    }

    /// Key used to pair local and remote names
    pub(crate) fn match_key(&self, name: &str) -> String {
        if self.options.case_sensitive {
            name.to_string()
        } else {
            name.to_lowercase()
        }
    }

    async fn execute(&self, task: Task, queue: &Queue) -> anyhow::Result<()> {
        match task {
            Task::DirectoryCheck { remote, local } => {
                self.check_directory(remote, local, queue).await
            }
            Task::FileCheck {
                parent,
                remote,
                local,
            } => self.check_file(parent, remote, local, queue).await,
            Task::Upload {
                parent,
                local,
                replace,
            } => self.upload(parent, local, replace, queue).await,
            Task::CreateFolder { parent, local } => self.create_folder(parent, local, queue).await,
            Task::UpdateMetadata {
                target,
                created,
                modified,
            } => self.update_metadata(target, created, modified).await,
            Task::Delete { target, then } => self.delete(target, then, queue).await,
            Task::Download { remote, local } => self.download(remote, local, queue).await,
        }
    }
}

#[async_trait::async_trait]
impl TaskHandler<Task> for SyncContext {
    async fn handle(&self, task: Task, queue: &Queue) -> anyhow::Result<()> {
        self.execute(task, queue).await
    }

    fn on_failure(&self, _description: &str, _error: &anyhow::Error) {
        self.reporter.failed();
    }

    fn on_panic(&self, _description: &str) {
        self.reporter.failed();
    }
}
