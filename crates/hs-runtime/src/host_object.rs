use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use hs_compiler::CompiledUnit;
use hs_core::{ObjectId, Pid};
use rhai::{Dynamic, Engine, FnPtr, Map, INT};

/// A script callback attached to a host object or module event.
#[derive(Debug, Clone)]
pub struct Listener {
    pub owner: Pid,
    pub callback: FnPtr,
    /// Unit the callback was defined in; its AST is needed to invoke it.
    pub unit: Rc<CompiledUnit>,
}

/// Listener capability every host object exposed to scripts must provide.
pub trait ListenerTarget {
    fn object_id(&self) -> ObjectId;
    fn attach_listener(&self, event: &str, listener: Listener);
    fn detach_all_listeners(&self);
    fn listener_count(&self) -> usize;
}

pub type HostObjectHandle = Rc<dyn ListenerTarget>;

struct EventObjectInner {
    id: ObjectId,
    kind: String,
    props: RefCell<Map>,
    listeners: RefCell<Vec<(String, Listener)>>,
}

/// Host object with a property bag and ordered event listeners.
#[derive(Clone)]
pub struct EventObject {
    inner: Rc<EventObjectInner>,
}

impl EventObject {
    pub fn new(id: ObjectId, kind: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(EventObjectInner {
                id,
                kind: kind.into(),
                props: RefCell::new(Map::new()),
                listeners: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.inner.id
    }

    pub fn kind(&self) -> &str {
        &self.inner.kind
    }

    pub fn get(&self, key: &str) -> Dynamic {
        self.inner
            .props
            .borrow()
            .get(key)
            .cloned()
            .unwrap_or(Dynamic::UNIT)
    }

    pub fn set(&self, key: &str, value: Dynamic) {
        self.inner.props.borrow_mut().insert(key.into(), value);
    }

    /// Listeners for `event` in attach order, cloned so callbacks may modify the object.
    pub fn listeners_for(&self, event: &str) -> Vec<Listener> {
        self.inner
            .listeners
            .borrow()
            .iter()
            .filter(|(name, _)| name == event)
            .map(|(_, listener)| listener.clone())
            .collect()
    }

    pub fn handle(&self) -> HostObjectHandle {
        Rc::new(self.clone())
    }
}

impl ListenerTarget for EventObject {
    fn object_id(&self) -> ObjectId {
        self.inner.id
    }

    fn attach_listener(&self, event: &str, listener: Listener) {
        self.inner
            .listeners
            .borrow_mut()
            .push((event.to_string(), listener));
    }

    fn detach_all_listeners(&self) {
        self.inner.listeners.borrow_mut().clear();
    }

    fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }
}

impl fmt::Debug for EventObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventObject")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("listeners", &self.listener_count())
            .finish()
    }
}

#[derive(Debug, Default)]
struct HostObjectsInner {
    next_id: u64,
    objects: BTreeMap<ObjectId, EventObject>,
}

/// Live host objects, addressable by id from the host side of the channel.
#[derive(Debug, Clone, Default)]
pub struct HostObjects {
    inner: Rc<RefCell<HostObjectsInner>>,
}

impl HostObjects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&self, kind: &str) -> EventObject {
        let mut inner = self.inner.borrow_mut();
        inner.next_id += 1;
        let object = EventObject::new(ObjectId(inner.next_id), kind);
        inner.objects.insert(object.id(), object.clone());
        object
    }

    pub fn get(&self, id: ObjectId) -> Option<EventObject> {
        self.inner.borrow().objects.get(&id).cloned()
    }

    pub fn remove(&self, id: ObjectId) -> Option<EventObject> {
        self.inner.borrow_mut().objects.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().objects.is_empty()
    }
}

/// Script surface of [`EventObject`] that does not depend on the calling module.
pub(crate) fn register_object_api(engine: &mut Engine) {
    engine
        .register_type_with_name::<EventObject>("HostObject")
        .register_get("id", |object: &mut EventObject| object.id().0 as INT)
        .register_get("kind", |object: &mut EventObject| object.kind().to_string())
        .register_fn("listener_count", |object: &mut EventObject| {
            object.listener_count() as INT
        })
        .register_fn("get", |object: &mut EventObject, key: &str| object.get(key))
        .register_fn(
            "set",
            |object: &mut EventObject, key: &str, value: Dynamic| object.set(key, value),
        );
}
