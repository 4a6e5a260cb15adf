use parking_lot::RwLock;
use std::sync::Arc;
use uuid::Uuid;

use super::Command;
use crate::host::Scope;

pub type CommandHandler = Arc<dyn Fn(&mut CommandEvent) + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

/// The cancelable pre-dispatch event listeners receive.
#[derive(Debug)]
pub struct CommandEvent {
    name: String,
    command: Option<Command>,
    source: Scope,
    cancelled: bool,
    propagation_stopped: bool,
}

impl CommandEvent {
    pub fn new(name: &str, source: Scope) -> Self {
        Self {
            name: name.to_string(),
            command: name.parse().ok(),
            source,
            cancelled: false,
            propagation_stopped: false,
        }
    }

    /// The raw command name, recognised or not.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn command(&self) -> Option<Command> {
        self.command
    }

    pub fn source(&self) -> &Scope {
        &self.source
    }

    /// Prevents the router's default action. Remaining listeners still run.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Skips listeners on scopes further up the path.
    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }
}

struct Listener {
    id: ListenerId,
    scope: Scope,
    handler: CommandHandler,
}

/// Listeners for the pre-dispatch command event, shared between the router
/// and anything that wants to intercept commands (slideshows, overlays).
#[derive(Default)]
pub struct CommandListeners {
    listeners: RwLock<Vec<Listener>>,
}

impl CommandListeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&self, scope: Scope, handler: F) -> ListenerId
    where
        F: Fn(&mut CommandEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(Uuid::new_v4());
        log::debug!("[CommandListeners] Listener added on {:?}", scope);
        self.listeners.write().push(Listener {
            id,
            scope,
            handler: Arc::new(handler),
        });
        id
    }

    /// Returns false when no such listener was registered on `scope`.
    pub fn off(&self, scope: &Scope, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| !(l.id == id && &l.scope == scope));
        before != listeners.len()
    }

    pub fn count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Runs listeners along `path` (source first, root last) and returns
    /// false when any of them cancelled the event.
    ///
    /// Handlers are called without the registry lock held, so they may
    /// register or remove listeners themselves.
    pub fn dispatch(&self, event: &mut CommandEvent, path: &[Scope]) -> bool {
        for scope in path {
            let handlers: Vec<CommandHandler> = self
                .listeners
                .read()
                .iter()
                .filter(|l| &l.scope == scope)
                .map(|l| l.handler.clone())
                .collect();

            for handler in handlers {
                handler(event);
            }

            if event.propagation_stopped {
                break;
            }
        }

        !event.cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ElementId;
    use parking_lot::Mutex;

    fn path() -> Vec<Scope> {
        vec![
            Scope::Element(ElementId::new("button")),
            Scope::Element(ElementId::new("list")),
            Scope::Root,
        ]
    }

    #[test]
    fn test_event_bubbles_from_source_to_root() {
        let listeners = CommandListeners::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let scopes = [
            ("root", Scope::Root),
            ("list", path()[1].clone()),
            ("button", path()[0].clone()),
        ];
        for (label, scope) in scopes {
            let seen = seen.clone();
            listeners.on(scope, move |_| seen.lock().push(label));
        }

        let mut event = CommandEvent::new("up", path()[0].clone());
        assert!(listeners.dispatch(&mut event, &path()));
        assert_eq!(*seen.lock(), vec!["button", "list", "root"]);
    }

    #[test]
    fn test_cancel_still_runs_remaining_listeners() {
        let listeners = CommandListeners::new();
        let root_calls = Arc::new(Mutex::new(0));

        listeners.on(path()[0].clone(), |e| e.cancel());
        let calls = root_calls.clone();
        listeners.on(Scope::Root, move |_| *calls.lock() += 1);

        let mut event = CommandEvent::new("stop", path()[0].clone());
        assert!(!listeners.dispatch(&mut event, &path()));
        assert_eq!(*root_calls.lock(), 1);
    }

    #[test]
    fn test_stop_propagation_skips_outer_scopes() {
        let listeners = CommandListeners::new();
        let root_calls = Arc::new(Mutex::new(0));

        listeners.on(path()[1].clone(), |e| e.stop_propagation());
        let calls = root_calls.clone();
        listeners.on(Scope::Root, move |_| *calls.lock() += 1);

        let mut event = CommandEvent::new("left", path()[0].clone());
        assert!(listeners.dispatch(&mut event, &path()));
        assert_eq!(*root_calls.lock(), 0);
    }

    #[test]
    fn test_off_requires_matching_scope() {
        let listeners = CommandListeners::new();
        let id = listeners.on(Scope::Root, |_| {});

        assert!(!listeners.off(&path()[0], id));
        assert_eq!(listeners.count(), 1);
        assert!(listeners.off(&Scope::Root, id));
        assert!(!listeners.off(&Scope::Root, id));
        assert_eq!(listeners.count(), 0);
    }

    #[test]
    fn test_handler_may_remove_itself() {
        let listeners = Arc::new(CommandListeners::new());
        let slot: Arc<Mutex<Option<ListenerId>>> = Arc::new(Mutex::new(None));

        let registry = listeners.clone();
        let own_id = slot.clone();
        let id = listeners.on(Scope::Root, move |_| {
            if let Some(id) = own_id.lock().take() {
                registry.off(&Scope::Root, id);
            }
        });
        *slot.lock() = Some(id);

        let mut event = CommandEvent::new("menu", Scope::Root);
        listeners.dispatch(&mut event, &[Scope::Root]);
        assert_eq!(listeners.count(), 0);
    }

    #[test]
    fn test_event_parses_known_names_only() {
        assert_eq!(CommandEvent::new("menu", Scope::Root).command(), Some(Command::Menu));
        assert_eq!(CommandEvent::new("warp", Scope::Root).command(), None);
    }
}
