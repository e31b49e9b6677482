//! # Typed Dispatch: Routing Commands to Typed Handlers
//!
//! A handler is written against one concrete command type and never sees
//! anything else:
//!
//! ```ignore
//! world.on_command::<Damage>(|target, cmd| {
//!     if let Some(hp) = target.get_mut::<Health>() {
//!         hp.0 = hp.0.saturating_sub(cmd.amount);
//!     }
//! });
//! world.commands().send(enemy, Damage { amount: 5 });
//! ```
//!
//! Two paths reach a handler:
//!
//! ```text
//! static:  cmd.accept(target, &mut dispatcher)
//!            -> <TypedDispatcher<C> as Dispatch<C>>::dispatch(target, &cmd)
//!
//! queued:  CommandBuffer::send(target, cmd)      (stored as Box<dyn Any> + TypeId)
//!            -> DispatchTable::dispatch(target, type_id, &dyn Any)
//!            -> downcast_ref::<C>()  (checked; a mismatch is reported, never UB)
//!            -> handler(target, &cmd)
//! ```
//!
//! For a closed family of commands, make the command an enum and register one
//! dispatcher for it; the handler is then an exhaustive `match`.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use crate::object::GameObject;

/// Something that can handle a `C` aimed at a game object.
pub trait Dispatch<C> {
    fn dispatch(&mut self, target: &mut GameObject<'_>, command: &C);
}

/// Visitor entry point: a command hands itself to a dispatcher for its own type.
///
/// Blanket-implemented for every `'static` type. `D` must dispatch `Self`, so a
/// command can only ever reach a handler for its own concrete type.
pub trait Accept: Sized + 'static {
    fn accept<D: Dispatch<Self>>(&self, target: &mut GameObject<'_>, dispatcher: &mut D) {
        dispatcher.dispatch(target, self);
    }
}

impl<C: 'static> Accept for C {}

type Handler<C> = Box<dyn FnMut(&mut GameObject<'_>, &C)>;

/// Boxed handler for commands of type `C`.
pub struct TypedDispatcher<C> {
    handler: Handler<C>,
    handled: u64,
}

impl<C: 'static> TypedDispatcher<C> {
    pub fn new(handler: impl FnMut(&mut GameObject<'_>, &C) + 'static) -> Self {
        Self {
            handler: Box::new(handler),
            handled: 0,
        }
    }

    /// Commands handled so far.
    pub fn handled(&self) -> u64 {
        self.handled
    }
}

impl<C: 'static> Dispatch<C> for TypedDispatcher<C> {
    fn dispatch(&mut self, target: &mut GameObject<'_>, command: &C) {
        self.handled += 1;
        (self.handler)(target, command);
    }
}

/// Type-erased front of a [`TypedDispatcher`].
trait ErasedDispatcher {
    fn command_name(&self) -> &'static str;
    /// `false` if `payload` is not this dispatcher's command type.
    fn dispatch_any(&mut self, target: &mut GameObject<'_>, payload: &dyn Any) -> bool;
}

impl<C: 'static> ErasedDispatcher for TypedDispatcher<C> {
    fn command_name(&self) -> &'static str {
        std::any::type_name::<C>()
    }

    fn dispatch_any(&mut self, target: &mut GameObject<'_>, payload: &dyn Any) -> bool {
        match payload.downcast_ref::<C>() {
            Some(command) => {
                self.dispatch(target, command);
                true
            }
            None => false,
        }
    }
}

/// One dispatcher per command type, keyed by [`TypeId`].
#[derive(Default)]
pub struct DispatchTable {
    dispatchers: HashMap<TypeId, Box<dyn ErasedDispatcher>>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the dispatcher for `C`, replacing any previous one.
    pub fn register<C: 'static>(&mut self, dispatcher: TypedDispatcher<C>) {
        let replaced = self
            .dispatchers
            .insert(TypeId::of::<C>(), Box::new(dispatcher))
            .is_some();
        if replaced {
            log::warn!(
                "dispatch: replaced handler for {}",
                std::any::type_name::<C>()
            );
        }
    }

    pub fn on<C: 'static>(&mut self, handler: impl FnMut(&mut GameObject<'_>, &C) + 'static) {
        self.register(TypedDispatcher::new(handler));
    }

    pub fn remove<C: 'static>(&mut self) -> bool {
        self.dispatchers.remove(&TypeId::of::<C>()).is_some()
    }

    pub fn contains<C: 'static>(&self) -> bool {
        self.contains_id(TypeId::of::<C>())
    }

    pub fn contains_id(&self, type_id: TypeId) -> bool {
        self.dispatchers.contains_key(&type_id)
    }

    pub fn len(&self) -> usize {
        self.dispatchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dispatchers.is_empty()
    }

    /// Names of every command type with a handler.
    pub fn command_names(&self) -> Vec<&'static str> {
        self.dispatchers.values().map(|d| d.command_name()).collect()
    }

    /// Route `payload` to the dispatcher registered for `type_id`.
    ///
    /// Returns `false` if no dispatcher is registered, or if `payload` is not
    /// actually of the type `type_id` names.
    pub fn dispatch(
        &mut self,
        target: &mut GameObject<'_>,
        type_id: TypeId,
        payload: &dyn Any,
    ) -> bool {
        let Some(dispatcher) = self.dispatchers.get_mut(&type_id) else {
            return false;
        };
        let handled = dispatcher.dispatch_any(target, payload);
        if !handled {
            log::error!(
                "dispatch: payload does not match registered type {}",
                dispatcher.command_name()
            );
        }
        handled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{Component, ComponentReflector, EntityManager};

    #[derive(Debug, PartialEq)]
    struct Health(i32);
    impl Component for Health {}

    #[derive(Debug, Clone, PartialEq)]
    struct Damage {
        amount: i32,
        source: &'static str,
        critical: bool,
    }

    enum Order {
        Heal(i32),
        Kill,
    }

    fn target() -> (EntityManager, ComponentReflector, crate::ecs::EntityHandle) {
        let mut m = EntityManager::new();
        let e = m.create();
        m.emplace(e, Health(100));
        (m, ComponentReflector::new(), e)
    }

    #[test]
    fn accept_reaches_typed_handler_with_all_fields() {
        let (mut m, r, e) = target();
        let mut dispatcher = TypedDispatcher::new(|obj: &mut GameObject<'_>, cmd: &Damage| {
            if let Some(hp) = obj.get_mut::<Health>() {
                hp.0 -= if cmd.critical { cmd.amount * 2 } else { cmd.amount };
            }
        });
        let cmd = Damage {
            amount: 7,
            source: "trap",
            critical: true,
        };
        let mut obj = GameObject::new(&mut m, &r, e);
        cmd.accept(&mut obj, &mut dispatcher);
        assert_eq!(obj.get::<Health>(), Some(&Health(86)));
        assert_eq!(dispatcher.handled(), 1);
    }

    #[test]
    fn table_routes_by_type_and_preserves_fields() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let (mut m, r, e) = target();
        let log: Rc<RefCell<Vec<Damage>>> = Rc::default();
        let sink = Rc::clone(&log);
        let mut table = DispatchTable::new();
        table.on::<Damage>(move |_, cmd| sink.borrow_mut().push(cmd.clone()));

        let cmd = Damage {
            amount: 3,
            source: "arrow",
            critical: false,
        };
        let mut obj = GameObject::new(&mut m, &r, e);
        assert!(table.dispatch(&mut obj, TypeId::of::<Damage>(), &cmd));
        assert_eq!(log.borrow().as_slice(), &[cmd]);
    }

    #[test]
    fn unregistered_and_mismatched_payloads_are_rejected() {
        let (mut m, r, e) = target();
        let mut table = DispatchTable::new();
        table.on::<Damage>(|_, _| panic!("must not run"));
        let mut obj = GameObject::new(&mut m, &r, e);

        assert!(!table.dispatch(&mut obj, TypeId::of::<u32>(), &5u32));
        // Key says Damage, payload is a u32: checked downcast refuses it.
        assert!(!table.dispatch(&mut obj, TypeId::of::<Damage>(), &5u32));
    }

    #[test]
    fn enum_commands_dispatch_by_match() {
        let (mut m, r, e) = target();
        let mut table = DispatchTable::new();
        table.on::<Order>(|obj, order| match order {
            Order::Heal(n) => {
                if let Some(hp) = obj.get_mut::<Health>() {
                    hp.0 += n;
                }
            }
            Order::Kill => {
                obj.destroy();
            }
        });

        let mut obj = GameObject::new(&mut m, &r, e);
        table.dispatch(&mut obj, TypeId::of::<Order>(), &Order::Heal(5));
        assert_eq!(obj.get::<Health>(), Some(&Health(105)));
        table.dispatch(&mut obj, TypeId::of::<Order>(), &Order::Kill);
        assert!(!obj.is_alive());
    }

    #[test]
    fn register_replaces_and_remove_forgets() {
        let mut table = DispatchTable::new();
        table.on::<Damage>(|_, _| {});
        table.on::<Damage>(|_, _| {});
        assert_eq!(table.len(), 1);
        assert!(table.contains::<Damage>());
        assert!(table.remove::<Damage>());
        assert!(table.is_empty());
    }
}
