//! Change-event adapter for watch sessions
//!
//! The filesystem watcher produces [`ChangeEvent`]s on its own thread and
//! pushes them into a bounded channel. A single [`EventWorker`] owns the
//! [`Formatter`] and handles events one at a time.

use std::io;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, SyncSender};

use notify::event::ModifyKind;
use notify::EventKind;

use super::{FormatError, Formatter, Outcome};
use crate::storage::FormatLock;
use crate::syntax::ShellSyntax;

/// Kind of filesystem change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// File contents changed
    Write,
    Create,
    Remove,
    /// Renames, metadata and access notifications
    Other,
}

impl From<&EventKind> for ChangeKind {
    fn from(kind: &EventKind) -> Self {
        match kind {
            EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any) => ChangeKind::Write,
            EventKind::Create(_) => ChangeKind::Create,
            EventKind::Remove(_) => ChangeKind::Remove,
            _ => ChangeKind::Other,
        }
    }
}

/// A change to one path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

impl ChangeEvent {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    /// Splits a watcher event into one change per path
    pub fn from_notify(event: &notify::Event) -> Vec<ChangeEvent> {
        let kind = ChangeKind::from(&event.kind);
        event
            .paths
            .iter()
            .map(|path| ChangeEvent::new(path.clone(), kind))
            .collect()
    }
}

impl<S: ShellSyntax> Formatter<S> {
    /// Formats the file behind a write event
    ///
    /// Returns `None` without touching the file unless the event is a
    /// [`ChangeKind::Write`] to a name with a script extension.
    pub fn handle_event(&mut self, event: &ChangeEvent) -> Option<Result<Outcome, FormatError>> {
        if event.kind != ChangeKind::Write {
            return None;
        }

        let name = event.path.file_name()?.to_str()?;
        if !self.settings().extensions.matches(name) {
            return None;
        }

        Some(self.format_path(&event.path))
    }
}

/// Bounded queue between the watcher and an [`EventWorker`]
///
/// Senders block once `capacity` events are pending.
pub fn event_channel(capacity: usize) -> (SyncSender<ChangeEvent>, Receiver<ChangeEvent>) {
    mpsc::sync_channel(capacity.max(1))
}

/// Serializes every pipeline call of a watch session
pub struct EventWorker<S: ShellSyntax> {
    formatter: Formatter<S>,
    events: Receiver<ChangeEvent>,
    lock_path: Option<PathBuf>,
}

impl<S: ShellSyntax> EventWorker<S> {
    pub fn new(formatter: Formatter<S>, events: Receiver<ChangeEvent>) -> Self {
        Self {
            formatter,
            events,
            lock_path: None,
        }
    }

    /// Holds the [`FormatLock`] at `path` while each batch is handled
    pub fn with_lock(mut self, path: impl Into<PathBuf>) -> Self {
        self.lock_path = Some(path.into());
        self
    }

    /// Handles events until every sender is dropped
    ///
    /// Events already queued are drained into one batch, keeping only the
    /// first occurrence of each path. `report` sees the result of every
    /// event that reached the pipeline; failures never stop the loop.
    pub fn run<F>(mut self, mut report: F) -> Formatter<S>
    where
        F: FnMut(&ChangeEvent, Result<Outcome, FormatError>),
    {
        while let Ok(first) = self.events.recv() {
            let batch = self.drain(first);

            let _lock = match self.lock_path.as_deref().map(FormatLock::acquire) {
                Some(Ok(lock)) => Some(lock),
                Some(Err(error)) => {
                    let message = format!("failed to take format lock: {error}");
                    for event in &batch {
                        let source = io::Error::new(error.kind(), message.clone());
                        report(event, Err(FormatError::io(&event.path, source)));
                    }
                    continue;
                }
                None => None,
            };

            for event in &batch {
                if let Some(result) = self.formatter.handle_event(event) {
                    report(event, result);
                }
            }
        }

        self.formatter
    }

    fn drain(&self, first: ChangeEvent) -> Vec<ChangeEvent> {
        let mut batch = vec![first];
        while let Ok(event) = self.events.try_recv() {
            if !batch.contains(&event) {
                batch.push(event);
            }
        }
        batch
    }
}
