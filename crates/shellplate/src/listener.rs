/*
 * listener.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Diagnostic listeners.
//!
//! Every compile error, render error and warning produced by an engine is
//! funneled through a [`DiagnosticHub`]. Listeners subscribe per
//! [`EventKind`]; with no listener registered, diagnostics are dropped.

use std::sync::{Arc, Mutex, MutexGuard};

use shellplate_error_reporting::{DiagnosticKind, DiagnosticMessage, SourceContext};

use crate::error::TemplateError;

/// The event a listener subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Error,
    Warning,
}

impl EventKind {
    pub fn of(diagnostic: &DiagnosticMessage) -> Self {
        match diagnostic.kind {
            DiagnosticKind::Error => EventKind::Error,
            _ => EventKind::Warning,
        }
    }
}

/// Receives diagnostics from a hub.
pub trait DiagnosticListener: Send + Sync {
    fn on_diagnostic(&self, diagnostic: &DiagnosticMessage);

    /// A diagnostic whose location points into a file held by `ctx`.
    fn on_located(&self, diagnostic: &DiagnosticMessage, ctx: &SourceContext) {
        let _ = ctx;
        self.on_diagnostic(diagnostic);
    }
}

impl<F> DiagnosticListener for F
where
    F: Fn(&DiagnosticMessage) + Send + Sync,
{
    fn on_diagnostic(&self, diagnostic: &DiagnosticMessage) {
        self(diagnostic)
    }
}

/// Handle returned by [`DiagnosticHub::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Subscription {
    id: ListenerId,
    kind: EventKind,
    listener: Arc<dyn DiagnosticListener>,
}

#[derive(Default)]
struct HubState {
    next_id: u64,
    subscriptions: Vec<Subscription>,
}

/// Shared, cloneable list of listeners.
#[derive(Clone, Default)]
pub struct DiagnosticHub {
    state: Arc<Mutex<HubState>>,
}

impl std::fmt::Debug for DiagnosticHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticHub")
            .field("listeners", &self.lock().subscriptions.len())
            .finish()
    }
}

impl DiagnosticHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Subscribe a listener to one kind of event.
    pub fn on(&self, kind: EventKind, listener: impl DiagnosticListener + 'static) -> ListenerId {
        self.on_shared(kind, Arc::new(listener))
    }

    pub fn on_shared(&self, kind: EventKind, listener: Arc<dyn DiagnosticListener>) -> ListenerId {
        let mut state = self.lock();
        let id = ListenerId(state.next_id);
        state.next_id += 1;
        state.subscriptions.push(Subscription { id, kind, listener });
        id
    }

    /// Remove a subscription. Returns whether it existed.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut state = self.lock();
        let before = state.subscriptions.len();
        state.subscriptions.retain(|s| s.id != id);
        state.subscriptions.len() != before
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.lock()
            .subscriptions
            .iter()
            .filter(|s| s.kind == kind)
            .count()
    }

    /// Deliver a diagnostic to every listener of its kind.
    ///
    /// Listeners are called outside the lock, so a listener may subscribe
    /// or report without deadlocking.
    pub fn report(&self, diagnostic: &DiagnosticMessage) {
        for listener in self.listeners(EventKind::of(diagnostic)) {
            listener.on_diagnostic(diagnostic);
        }
    }

    /// Deliver a template error, with its source context when it has one.
    pub fn report_error(&self, err: &TemplateError) {
        let (diagnostic, ctx) = err.to_located_diagnostic();
        let Some(ctx) = ctx else {
            return self.report(&diagnostic);
        };
        for listener in self.listeners(EventKind::of(&diagnostic)) {
            listener.on_located(&diagnostic, &ctx);
        }
    }

    fn listeners(&self, kind: EventKind) -> Vec<Arc<dyn DiagnosticListener>> {
        self.lock()
            .subscriptions
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| Arc::clone(&s.listener))
            .collect()
    }
}

/// Logs diagnostics through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingListener;

impl TracingListener {
    fn log(diagnostic: &DiagnosticMessage, ctx: Option<&SourceContext>) {
        let code = diagnostic.code.as_deref().unwrap_or("-");
        let text = diagnostic.to_text(ctx);
        match diagnostic.kind {
            DiagnosticKind::Error => tracing::error!(code, "{}", text),
            _ => tracing::warn!(code, "{}", text),
        }
    }
}

impl DiagnosticListener for TracingListener {
    fn on_diagnostic(&self, diagnostic: &DiagnosticMessage) {
        Self::log(diagnostic, None);
    }

    fn on_located(&self, diagnostic: &DiagnosticMessage, ctx: &SourceContext) {
        Self::log(diagnostic, Some(ctx));
    }
}

/// Collects diagnostics in memory, with the source context of located ones.
#[derive(Debug, Clone, Default)]
pub struct CollectingListener {
    collected: Arc<Mutex<Vec<(DiagnosticMessage, Option<SourceContext>)>>>,
}

impl CollectingListener {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(DiagnosticMessage, Option<SourceContext>)>> {
        self.collected
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push(&self, diagnostic: &DiagnosticMessage, ctx: Option<&SourceContext>) {
        self.lock().push((diagnostic.clone(), ctx.cloned()));
    }

    pub fn diagnostics(&self) -> Vec<DiagnosticMessage> {
        self.lock().iter().map(|(d, _)| d.clone()).collect()
    }

    /// Each diagnostic rendered as text, with source snippets where known.
    pub fn texts(&self) -> Vec<String> {
        self.lock()
            .iter()
            .map(|(d, ctx)| d.to_text(ctx.as_ref()))
            .collect()
    }

    pub fn codes(&self) -> Vec<String> {
        self.diagnostics()
            .into_iter()
            .filter_map(|d| d.code)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics().is_empty()
    }
}

impl DiagnosticListener for CollectingListener {
    fn on_diagnostic(&self, diagnostic: &DiagnosticMessage) {
        self.push(diagnostic, None);
    }

    fn on_located(&self, diagnostic: &DiagnosticMessage, ctx: &SourceContext) {
        self.push(diagnostic, Some(ctx));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorSite;
    use pretty_assertions::assert_eq;
    use shellplate_error_reporting::DiagnosticMessageBuilder;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_report_routes_by_kind() {
        let hub = DiagnosticHub::new();
        let errors = CollectingListener::new();
        let warnings = CollectingListener::new();
        hub.on(EventKind::Error, errors.clone());
        hub.on(EventKind::Warning, warnings.clone());

        hub.report(&DiagnosticMessageBuilder::error("boom").with_code("T-3-1").build());
        hub.report(&DiagnosticMessageBuilder::warning("hmm").with_code("T-1-2").build());

        assert_eq!(errors.codes(), vec!["T-3-1".to_string()]);
        assert_eq!(warnings.codes(), vec!["T-1-2".to_string()]);
    }

    #[test]
    fn test_off_unsubscribes() {
        let hub = DiagnosticHub::new();
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let id = hub.on(EventKind::Error, move |_: &DiagnosticMessage| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        hub.report(&DiagnosticMessage::error("one"));
        assert!(hub.off(id));
        assert!(!hub.off(id));
        hub.report(&DiagnosticMessage::error("two"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clones_share_listeners() {
        let hub = DiagnosticHub::new();
        let other = hub.clone();
        let collected = CollectingListener::new();
        other.on(EventKind::Error, collected.clone());
        hub.report(&DiagnosticMessage::error("shared"));
        assert_eq!(collected.diagnostics().len(), 1);
        assert_eq!(hub.listener_count(EventKind::Error), 1);
    }

    #[test]
    fn test_report_error_passes_source_context() {
        let hub = DiagnosticHub::new();
        let collected = CollectingListener::new();
        let plain = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&plain);
        hub.on(EventKind::Error, collected.clone());
        hub.on(EventKind::Error, move |_: &DiagnosticMessage| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        hub.report_error(&TemplateError::Syntax {
            message: "Unrecognized tag: {{odd}}".into(),
            line: 2,
            syntax: String::new(),
            site: Some(ErrorSite {
                name: "page.html".into(),
                source: Arc::from("ok\n{{odd}}"),
                start: 3,
                end: 10,
            }),
        });
        hub.report_error(&TemplateError::NotFound {
            identity: "gone".into(),
        });

        assert_eq!(plain.load(Ordering::SeqCst), 2);
        assert_eq!(collected.codes(), vec!["T-1-1".to_string(), "T-4-2".to_string()]);
        let texts = collected.texts();
        assert!(texts[0].contains("page.html"));
        assert!(texts[0].contains("{{odd}}"));
        assert!(!texts[1].contains("page.html"));
    }
}
