use std::cell::RefCell;
use std::rc::Rc;

use fnv::FnvHashMap;

use crate::basic_types::Variable;

/// A side-effect-only observer of variable assignment changes.
///
/// Implementations must not mutate the core or any theory from within a
/// callback.
pub trait ValueListener {
    /// Fired every time the observed variable's value changes, including
    /// repeated tightenings within the same decision level.
    fn on_value_changed(&mut self, var: Variable);

    /// Fired once when the observed variable's value is reset to
    /// Unassigned by backtracking.
    fn on_value_reset(&mut self, var: Variable);
}

/// Per-variable registry of listeners, reusable by the SAT core and by
/// each theory that exposes its own `listen_*` entry point (LRA, IDL/RDL).
///
/// Cloning shares the underlying `Rc`s: a snapshot's listeners are the same
/// receivers as the original's, not copies of them.
#[derive(Default, Clone)]
pub(crate) struct ListenerRegistry {
    listening: FnvHashMap<Variable, Vec<Rc<RefCell<dyn ValueListener>>>>,
}

impl ListenerRegistry {
    pub(crate) fn listen(&mut self, var: Variable, listener: Rc<RefCell<dyn ValueListener>>) {
        self.listening.entry(var).or_default().push(listener);
    }

    pub(crate) fn fire_changed(&self, var: Variable) {
        if let Some(listeners) = self.listening.get(&var) {
            for listener in listeners {
                listener.borrow_mut().on_value_changed(var);
            }
        }
    }

    pub(crate) fn fire_reset(&self, var: Variable) {
        if let Some(listeners) = self.listening.get(&var) {
            for listener in listeners {
                listener.borrow_mut().on_value_reset(var);
            }
        }
    }
}
