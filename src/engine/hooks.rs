// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use crate::errors::CorpusError;
use crate::observability::messages::operator::HookFailed;

/// Events an operator or pipeline fires around one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    BeforeRun,
    AfterRun,
    OnError,
    OnComplete,
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleEvent::BeforeRun => "before_run",
            LifecycleEvent::AfterRun => "after_run",
            LifecycleEvent::OnError => "on_error",
            LifecycleEvent::OnComplete => "on_complete",
        };
        f.write_str(s)
    }
}

/// Events a framework fires across its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameworkEvent {
    BeforeInit,
    AfterInit,
    BeforePrepare,
    AfterPrepare,
    BeforeRun,
    AfterRun,
    OnError,
    OnComplete,
    OnPause,
    OnResume,
}

impl fmt::Display for FrameworkEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FrameworkEvent::BeforeInit => "before_init",
            FrameworkEvent::AfterInit => "after_init",
            FrameworkEvent::BeforePrepare => "before_prepare",
            FrameworkEvent::AfterPrepare => "after_prepare",
            FrameworkEvent::BeforeRun => "before_run",
            FrameworkEvent::AfterRun => "after_run",
            FrameworkEvent::OnError => "on_error",
            FrameworkEvent::OnComplete => "on_complete",
            FrameworkEvent::OnPause => "on_pause",
            FrameworkEvent::OnResume => "on_resume",
        };
        f.write_str(s)
    }
}

/// An event type a [`Hooks`] list can be keyed by.
pub trait HookEvent: Copy + PartialEq + fmt::Display + Send + Sync + 'static {}

impl HookEvent for LifecycleEvent {}
impl HookEvent for FrameworkEvent {}

/// What a hook is told about the event it is called for.
#[derive(Debug, Clone, Copy)]
pub struct HookContext<'a> {
    pub component: &'a str,
    /// Set for `OnError` events.
    pub error: Option<&'a CorpusError>,
}

/// One subscriber. Returning `Err` (or panicking) is logged and ignored.
pub type Hook = Arc<dyn Fn(&HookContext<'_>) -> Result<(), String> + Send + Sync>;

/// Ordered subscribers per event for one component.
pub struct Hooks<E: HookEvent> {
    component: String,
    subscribers: RwLock<Vec<(E, Hook)>>,
}

impl<E: HookEvent> Hooks<E> {
    pub fn new(component: &str) -> Self {
        Self {
            component: component.to_string(),
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Subscribe `hook` to `event`. Hooks fire in the order they were added.
    pub fn add(&self, event: E, hook: Hook) {
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((event, hook));
    }

    pub fn count(&self, event: E) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(e, _)| *e == event)
            .count()
    }

    /// Call every subscriber of `event`. Returns how many failed.
    ///
    /// The subscriber list is copied first, so a hook may add hooks without
    /// deadlocking.
    pub fn fire(&self, event: E, error: Option<&CorpusError>) -> usize {
        let hooks: Vec<Hook> = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(e, _)| *e == event)
            .map(|(_, hook)| hook.clone())
            .collect();

        let ctx = HookContext {
            component: &self.component,
            error,
        };
        let event_name = event.to_string();
        let mut failures = 0;
        for hook in hooks {
            let reason = match catch_unwind(AssertUnwindSafe(|| hook(&ctx))) {
                Ok(Ok(())) => continue,
                Ok(Err(reason)) => reason,
                Err(panic) => panic_reason(panic.as_ref()),
            };
            failures += 1;
            tracing::warn!(
                "{}",
                HookFailed {
                    component: &self.component,
                    event: &event_name,
                    reason: &reason,
                }
            );
        }
        failures
    }
}

fn panic_reason(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_hook(counter: &Arc<AtomicUsize>) -> Hook {
        let counter = counter.clone();
        Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[test]
    fn test_fire_only_matching_event() {
        let hooks = Hooks::new("op");
        let before = Arc::new(AtomicUsize::new(0));
        let after = Arc::new(AtomicUsize::new(0));
        hooks.add(LifecycleEvent::BeforeRun, counting_hook(&before));
        hooks.add(LifecycleEvent::BeforeRun, counting_hook(&before));
        hooks.add(LifecycleEvent::AfterRun, counting_hook(&after));

        assert_eq!(hooks.fire(LifecycleEvent::BeforeRun, None), 0);
        assert_eq!(before.load(Ordering::SeqCst), 2);
        assert_eq!(after.load(Ordering::SeqCst), 0);
        assert_eq!(hooks.count(LifecycleEvent::AfterRun), 1);
    }

    #[test]
    fn test_failing_hooks_do_not_stop_the_rest() {
        let hooks = Hooks::new("fw");
        let reached = Arc::new(AtomicUsize::new(0));
        hooks.add(FrameworkEvent::OnError, Arc::new(|_| Err("boom".into())));
        hooks.add(FrameworkEvent::OnError, Arc::new(|_| panic!("hook panicked")));
        hooks.add(FrameworkEvent::OnError, counting_hook(&reached));

        let error = CorpusError::Data("bad".into());
        assert_eq!(hooks.fire(FrameworkEvent::OnError, Some(&error)), 2);
        assert_eq!(reached.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_hook_sees_error_and_component() {
        let hooks = Hooks::new("cleaner");
        let seen = Arc::new(std::sync::Mutex::new(String::new()));
        let sink = seen.clone();
        hooks.add(
            LifecycleEvent::OnError,
            Arc::new(move |ctx| {
                let mut s = sink.lock().unwrap();
                *s = format!("{}:{}", ctx.component, ctx.error.map(|e| e.kind_name()).unwrap_or("-"));
                Ok(())
            }),
        );

        hooks.fire(LifecycleEvent::OnError, Some(&CorpusError::Timeout("t".into())));
        assert_eq!(*seen.lock().unwrap(), "cleaner:Timeout");
    }
}
