use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use hs_core::{ObjectId, Pid};

/// Modules holding at least one listener on a host object.
///
/// Once an object is shared the list form is kept for the rest of its life:
/// releasing down to one module leaves `Shared([pid])`, never `Single(pid)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Owner {
    Single(Pid),
    Shared(Vec<Pid>),
}

impl Owner {
    pub fn contains(&self, pid: Pid) -> bool {
        match self {
            Self::Single(owner) => *owner == pid,
            Self::Shared(owners) => owners.contains(&pid),
        }
    }

    pub fn pids(&self) -> Vec<Pid> {
        match self {
            Self::Single(owner) => vec![*owner],
            Self::Shared(owners) => owners.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    Released,
    Untracked,
}

/// Ownership map from host object to the script modules referencing it.
///
/// Created once by the host and shared by every module; entries leave the map
/// one by one as modules release them. Only touched from the script thread.
#[derive(Debug, Default)]
pub struct ReferenceRegistry {
    owners: HashMap<ObjectId, Owner>,
}

impl ReferenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::new()))
    }

    pub fn owner(&self, object: ObjectId) -> Option<&Owner> {
        self.owners.get(&object)
    }

    pub fn owners_of(&self, object: ObjectId) -> Vec<Pid> {
        self.owners
            .get(&object)
            .map(Owner::pids)
            .unwrap_or_default()
    }

    pub fn is_owned_by(&self, object: ObjectId, pid: Pid) -> bool {
        self.owners
            .get(&object)
            .is_some_and(|owner| owner.contains(pid))
    }

    pub fn objects_owned_by(&self, pid: Pid) -> Vec<ObjectId> {
        let mut objects = self
            .owners
            .iter()
            .filter(|(_, owner)| owner.contains(pid))
            .map(|(object, _)| *object)
            .collect::<Vec<_>>();
        objects.sort();
        objects
    }

    pub fn contains(&self, object: ObjectId) -> bool {
        self.owners.contains_key(&object)
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Adds `pid` as an owner. Repeated calls for the same module append again.
    pub(crate) fn acquire(&mut self, object: ObjectId, pid: Pid) {
        let next = match self.owners.remove(&object) {
            None => Owner::Single(pid),
            Some(Owner::Single(existing)) => Owner::Shared(vec![existing, pid]),
            Some(Owner::Shared(mut owners)) => {
                owners.push(pid);
                Owner::Shared(owners)
            }
        };
        self.owners.insert(object, next);
    }

    /// Removes `pid` from the owners, keeping the order of the others.
    pub(crate) fn release(&mut self, object: ObjectId, pid: Pid) -> Release {
        let emptied = match self.owners.get_mut(&object) {
            Some(Owner::Shared(owners)) => {
                let Some(index) = owners.iter().position(|owner| *owner == pid) else {
                    return Release::Untracked;
                };
                owners.remove(index);
                owners.is_empty()
            }
            Some(Owner::Single(owner)) if *owner == pid => true,
            _ => return Release::Untracked,
        };

        if emptied {
            self.owners.remove(&object);
        }
        Release::Released
    }
}

#[cfg(test)]
mod registry_tests {
    use super::*;

    const OBJ: ObjectId = ObjectId(1);

    #[test]
    fn acquire_promotes_single_to_shared_in_order() {
        let mut registry = ReferenceRegistry::new();
        registry.acquire(OBJ, Pid(1));
        assert_eq!(registry.owner(OBJ), Some(&Owner::Single(Pid(1))));

        registry.acquire(OBJ, Pid(2));
        assert_eq!(
            registry.owner(OBJ),
            Some(&Owner::Shared(vec![Pid(1), Pid(2)]))
        );

        registry.acquire(OBJ, Pid(3));
        assert_eq!(
            registry.owner(OBJ),
            Some(&Owner::Shared(vec![Pid(1), Pid(2), Pid(3)]))
        );
    }

    #[test]
    fn acquire_does_not_deduplicate() {
        let mut registry = ReferenceRegistry::new();
        registry.acquire(OBJ, Pid(1));
        registry.acquire(OBJ, Pid(1));
        assert_eq!(
            registry.owner(OBJ),
            Some(&Owner::Shared(vec![Pid(1), Pid(1)]))
        );
    }

    #[test]
    fn release_compacts_without_demoting() {
        let mut registry = ReferenceRegistry::new();
        for pid in [1, 2, 3] {
            registry.acquire(OBJ, Pid(pid));
        }

        assert_eq!(registry.release(OBJ, Pid(2)), Release::Released);
        assert_eq!(
            registry.owner(OBJ),
            Some(&Owner::Shared(vec![Pid(1), Pid(3)]))
        );

        assert_eq!(registry.release(OBJ, Pid(1)), Release::Released);
        assert_eq!(registry.owner(OBJ), Some(&Owner::Shared(vec![Pid(3)])));

        assert_eq!(registry.release(OBJ, Pid(3)), Release::Released);
        assert!(!registry.contains(OBJ));
        assert!(registry.is_empty());
    }

    #[test]
    fn release_single_owner_deletes_entry() {
        let mut registry = ReferenceRegistry::new();
        registry.acquire(OBJ, Pid(4));
        assert_eq!(registry.release(OBJ, Pid(4)), Release::Released);
        assert_eq!(registry.owner(OBJ), None);
    }

    #[test]
    fn release_by_non_owner_is_untracked_and_keeps_state() {
        let mut registry = ReferenceRegistry::new();
        assert_eq!(registry.release(OBJ, Pid(1)), Release::Untracked);

        registry.acquire(OBJ, Pid(1));
        assert_eq!(registry.release(OBJ, Pid(2)), Release::Untracked);
        assert_eq!(registry.owner(OBJ), Some(&Owner::Single(Pid(1))));

        registry.acquire(OBJ, Pid(3));
        assert_eq!(registry.release(OBJ, Pid(9)), Release::Untracked);
        assert_eq!(
            registry.owner(OBJ),
            Some(&Owner::Shared(vec![Pid(1), Pid(3)]))
        );
    }

    #[test]
    fn lookups_report_owners() {
        let mut registry = ReferenceRegistry::new();
        registry.acquire(ObjectId(5), Pid(1));
        registry.acquire(ObjectId(2), Pid(1));
        registry.acquire(ObjectId(2), Pid(2));

        assert_eq!(registry.len(), 2);
        assert!(registry.is_owned_by(ObjectId(2), Pid(2)));
        assert!(!registry.is_owned_by(ObjectId(5), Pid(2)));
        assert_eq!(registry.owners_of(ObjectId(2)), vec![Pid(1), Pid(2)]);
        assert!(registry.owners_of(ObjectId(7)).is_empty());
        assert_eq!(
            registry.objects_owned_by(Pid(1)),
            vec![ObjectId(2), ObjectId(5)]
        );
    }
}
