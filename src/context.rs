use std::cell::{Cell, Ref, RefCell};
use std::rc::Rc;

use crate::backend::executor::{Env, Executor, JobId};
use crate::backend::notifier::Notifier;
use crate::backend::state_cache::StateCache;
use crate::model::TypeRegistry;

/// Process-wide state shared by the loader, the entries and the pulse loop.
///
/// The type registry is replaced by every successful load; the state cache lives
/// as long as the context and is never cleared.
pub struct ExecutionContext {
    registry: RefCell<TypeRegistry>,
    cache: StateCache,
    executor: Executor,
    notifier: Rc<dyn Notifier>,
    generation: Cell<u64>,
    auto_restart: Cell<bool>,
}

impl ExecutionContext {
    pub fn new(executor: Executor, notifier: Rc<dyn Notifier>) -> Rc<Self> {
        Rc::new(Self {
            registry: RefCell::new(TypeRegistry::with_builtins()),
            cache: StateCache::default(),
            executor,
            notifier,
            generation: Cell::new(0),
            auto_restart: Cell::new(true),
        })
    }

    pub fn registry(&self) -> Ref<'_, TypeRegistry> {
        self.registry.borrow()
    }

    /// Make `registry` the live one and start a new load generation.
    pub fn install_registry(&self, registry: TypeRegistry) -> u64 {
        *self.registry.borrow_mut() = registry;
        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        generation
    }

    pub fn generation(&self) -> u64 {
        self.generation.get()
    }

    /// Whether detections that find an `auto_on` toggler off may turn it back on.
    /// One-shot commands switch this off so looking at a toggler never starts it.
    pub fn auto_restart(&self) -> bool {
        self.auto_restart.get()
    }

    pub fn set_auto_restart(&self, enabled: bool) {
        self.auto_restart.set(enabled);
    }

    pub fn cache(&self) -> &StateCache {
        &self.cache
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    pub fn notifier(&self) -> Rc<dyn Notifier> {
        Rc::clone(&self.notifier)
    }

    pub fn general_spawn(&self, cmdline: &str, env: Env, title: &str) -> JobId {
        self.executor
            .general_spawn(cmdline, env, title, self.notifier())
    }
}
