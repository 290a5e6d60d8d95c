// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Toast queue with TTL + dedupe for user-facing map notices.
//!
//! The engine never surfaces errors by panicking or blocking; anything the
//! user should see (a rejected confirm, a catalog that failed to load) lands
//! here and the host draws it.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Default lifetime of an error toast.
pub const ERROR_TTL: Duration = Duration::from_secs(8);
/// Default lifetime of an info toast.
pub const INFO_TTL: Duration = Duration::from_secs(4);

/// Toast severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    /// Informational note.
    Info,
    /// Warning that may need attention.
    Warn,
    /// Error requiring user awareness.
    Error,
}

/// Subsystem that raised a toast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastSource {
    /// Layer catalog and scheduling.
    Layers,
    /// Parcel inspection and land-unit builder.
    Selection,
    /// Preferences storage.
    Config,
}

/// Identifier for a toast entry.
pub type ToastId = u64;

/// Toast data stored in the service.
#[derive(Debug, Clone)]
pub struct Toast {
    /// Stable identifier.
    pub id: ToastId,
    /// Severity.
    pub kind: ToastKind,
    /// Raising subsystem.
    pub source: ToastSource,
    /// Short title line.
    pub title: String,
    /// Optional body text.
    pub body: Option<String>,
    /// Time-to-live duration.
    pub ttl: Duration,
    /// Creation time.
    pub created: Instant,
}

impl Toast {
    fn alive_at(&self, now: Instant) -> bool {
        now.duration_since(self.created) < self.ttl
    }
}

/// Rendering-friendly view of a toast.
#[derive(Debug, Clone)]
pub struct ToastRender {
    /// Stable identifier.
    pub id: ToastId,
    /// Severity.
    pub kind: ToastKind,
    /// Raising subsystem.
    pub source: ToastSource,
    /// Short title line.
    pub title: String,
    /// Optional body text.
    pub body: Option<String>,
    /// 1.0 -> just created, 0.0 -> expired.
    pub progress: f32,
}

/// In-memory toast queue with TTL and dedupe window.
pub struct ToastService {
    queue: VecDeque<Toast>,
    max: usize,
    dedupe_window: Duration,
    next_id: ToastId,
}

impl ToastService {
    /// Create a new queue with a maximum length.
    pub fn new(max: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            max: max.max(1),
            dedupe_window: Duration::from_millis(500),
            next_id: 1,
        }
    }

    /// Push a toast, deduping identical recent entries (same kind/source/title/body within the dedupe window).
    pub fn push<S, B>(
        &mut self,
        kind: ToastKind,
        source: ToastSource,
        title: S,
        body: B,
        ttl: Duration,
        now: Instant,
    ) -> ToastId
    where
        S: Into<String>,
        B: Into<Option<String>>,
    {
        let title = title.into();
        let body = body.into();
        let window = self.dedupe_window;

        if let Some(existing) = self.queue.iter_mut().find(|t| {
            t.kind == kind
                && t.source == source
                && t.title == title
                && t.body == body
                && now.duration_since(t.created) <= window
        }) {
            existing.created = now;
            existing.ttl = ttl;
            return existing.id;
        }

        let id = self.next_id;
        self.next_id += 1;
        if self.queue.len() == self.max {
            self.queue.pop_front();
        }
        self.queue.push_back(Toast {
            id,
            kind,
            source,
            title,
            body,
            ttl,
            created: now,
        });
        id
    }

    /// Shorthand for an error toast with the default TTL.
    pub fn error<S, B>(&mut self, source: ToastSource, title: S, body: B, now: Instant) -> ToastId
    where
        S: Into<String>,
        B: Into<Option<String>>,
    {
        self.push(ToastKind::Error, source, title, body, ERROR_TTL, now)
    }

    /// Shorthand for an info toast with the default TTL.
    pub fn info<S>(&mut self, source: ToastSource, title: S, now: Instant) -> ToastId
    where
        S: Into<String>,
    {
        self.push(ToastKind::Info, source, title, None, INFO_TTL, now)
    }

    /// Drop expired toasts (call once per tick).
    pub fn retain_visible(&mut self, now: Instant) {
        self.queue.retain(|t| t.alive_at(now));
    }

    /// Return render-ready toasts with progress ratios.
    pub fn visible(&self, now: Instant) -> Vec<ToastRender> {
        self.queue
            .iter()
            .filter(|t| t.alive_at(now))
            .map(|t| ToastRender {
                id: t.id,
                kind: t.kind,
                source: t.source,
                title: t.title.clone(),
                body: t.body.clone(),
                progress: 1.0 - (now.duration_since(t.created).as_secs_f32() / t.ttl.as_secs_f32()),
            })
            .collect()
    }

    /// Number of queued toasts, expired ones included until the next `retain_visible`.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
