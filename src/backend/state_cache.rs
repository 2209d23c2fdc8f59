use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::backend::executor::{Env, ProcOutput};
use crate::backend::notifier::Category;
use crate::context::ExecutionContext;
use crate::model::{NotifyWhen, Switch};

/// Cache key: the same detector run with the same environment is the same probe,
/// no matter which entry (or which load of the entries file) asked for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    env: Env,
    detector: String,
}

impl Fingerprint {
    pub fn new(env: Env, detector: String) -> Self {
        Self { env, detector }
    }
}

/// Last observed state per fingerprint.
#[derive(Debug, Default)]
pub struct StateCache {
    states: RefCell<HashMap<Fingerprint, bool>>,
}

impl StateCache {
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<bool> {
        self.states.borrow().get(fingerprint).copied()
    }

    /// Store `state` and return what was there before.
    pub fn observe(&self, fingerprint: &Fingerprint, state: bool) -> Option<bool> {
        self.states
            .borrow_mut()
            .insert(fingerprint.clone(), state)
    }

    pub fn len(&self) -> usize {
        self.states.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.borrow().is_empty()
    }
}

/// Detector output means "on" when anything but whitespace was printed.
pub fn interpret(output: &ProcOutput) -> bool {
    !output.stdout.trim().is_empty()
}

/// The message to show for a detected transition, if any. First observations
/// and repeats are silent.
pub fn transition_notice(
    title: &str,
    previous: Option<bool>,
    current: bool,
    notify_when: NotifyWhen,
    auto_on: bool,
) -> Option<String> {
    let previous = previous?;
    if previous == current || !notify_when.wants(current) {
        return None;
    }

    let mut message = format!("{} is now {}", title, if current { "on" } else { "off" });
    if !current && auto_on {
        message.push_str(", trying to turn it back on");
    }
    Some(message)
}

/// Queue the toggler's detector; the result is settled when it completes.
pub fn detect(title: &str, switch: &Rc<Switch>, ctx: &Rc<ExecutionContext>) {
    if switch.is_inert() {
        return;
    }

    let issued = ctx.generation();
    let title = title.to_string();
    let switch_ref = Rc::clone(switch);
    let ctx_ref = Rc::clone(ctx);
    ctx.executor().enqueue(
        &switch.detector,
        switch.env.clone(),
        Some(Box::new(move |output: ProcOutput| {
            settle(&ctx_ref, &switch_ref, &title, issued, &output);
        })),
    );
}

fn settle(ctx: &ExecutionContext, switch: &Switch, title: &str, issued: u64, output: &ProcOutput) {
    if issued != ctx.generation() {
        log::debug!(
            "Detection for '{}' from load {} finished during load {}",
            title,
            issued,
            ctx.generation()
        );
    }
    if !output.success() {
        log::debug!(
            "Detector for '{}' exited with {}: {}",
            title,
            output.status,
            output.stderr.trim()
        );
    }

    let fresh = interpret(output);
    let previous = ctx.cache().observe(switch.fingerprint(), fresh);

    let restarts = switch.auto_on && ctx.auto_restart();
    if let Some(message) = transition_notice(title, previous, fresh, switch.notify_when, restarts) {
        ctx.notifier().notify(Category::State, &message, None);
    }

    switch.set_displayed(fresh);

    if fresh || !switch.auto_on || switch.manually_switched_off() {
        return;
    }
    if !ctx.auto_restart() {
        log::debug!("'{}' is off, restart suppressed", title);
        return;
    }
    // The display keeps showing "off"; the next detection confirms the restart.
    switch.switch_to(ctx, title, true);
}
