//! Generic object-graph cloning.
//!
//! Cloning an object graph with shared and cyclic references is split into
//! two phases per object:
//!
//! 1. [`GraphClone::shallow_copy`] - a raw field copy. Every owned reference
//!    still points at the original's targets.
//! 2. [`GraphClone::resolve_fields`] - each reference field is replaced by
//!    whatever [`Cloner::resolve`] returns for it.
//!
//! The [`Cloner`] owns the sharing policy. It remembers every `Arc` it has
//! already cloned (by pointer identity), so a value reachable through several
//! fields is cloned once and the copies keep aliasing each other. Originals
//! are held alive for the cloner's lifetime so their addresses stay unique. Shared nodes
//! are registered before their fields are resolved, which makes the traversal
//! safe for cycles. [`Cloner::share`] pins a value so that it is reused
//! instead of copied.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use parking_lot::RwLock;
//! use redlilium_mesh::cloner::{Cloner, GraphClone};
//!
//! struct Node {
//!     children: Vec<Arc<RwLock<Node>>>,
//! }
//!
//! impl GraphClone for Node {
//!     fn shallow_copy(&self) -> Self {
//!         Self { children: self.children.clone() }
//!     }
//!
//!     fn resolve_fields(&mut self, cloner: &mut Cloner) {
//!         self.children = self
//!             .children
//!             .iter()
//!             .map(|child| cloner.clone_arc(child))
//!             .collect();
//!     }
//! }
//!
//! let leaf = Arc::new(RwLock::new(Node { children: Vec::new() }));
//! let root = Node { children: vec![leaf.clone(), leaf.clone()] };
//!
//! let copy = Cloner::new().clone_graph(&root);
//! assert!(!Arc::ptr_eq(&copy.children[0], &leaf));
//! assert!(Arc::ptr_eq(&copy.children[0], &copy.children[1]));
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;

/// Two-phase clone hook called by [`Cloner`].
pub trait GraphClone {
    /// Raw field copy. Must not fail and must not touch the cloner.
    fn shallow_copy(&self) -> Self
    where
        Self: Sized;

    /// Replace every owned reference field with `cloner.resolve(&field)`.
    fn resolve_fields(&mut self, cloner: &mut Cloner);
}

/// A field value the cloner knows how to resolve.
///
/// Plain values resolve to a copy of themselves; shared handles resolve to
/// the clone registered for them (creating it on first sight) or to the
/// original if it was pinned with [`Cloner::share`].
pub trait CloneResolve {
    fn resolve_clone(&self, cloner: &mut Cloner) -> Self
    where
        Self: Sized;
}

/// An original and the value it resolves to, both as `Arc<T>`.
struct Registration {
    original: Box<dyn Any>,
    clone: Box<dyn Any>,
}

/// Object-graph cloner with identity-preserving deduplication.
#[derive(Default)]
pub struct Cloner {
    clones: HashMap<usize, Registration>,
}

impl Cloner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone a root object: shallow copy, then resolve its fields.
    pub fn clone_graph<T: GraphClone>(&mut self, original: &T) -> T {
        let mut copy = original.shallow_copy();
        copy.resolve_fields(self);
        copy
    }

    /// Resolve a field value through this cloner.
    pub fn resolve<T: CloneResolve>(&mut self, value: &T) -> T {
        value.resolve_clone(self)
    }

    /// Clone a shared node, or return the clone already made for it.
    ///
    /// The new node is registered before its fields are resolved, so a cycle
    /// leading back to `original` resolves to the new node.
    pub fn clone_arc<T: GraphClone + 'static>(
        &mut self,
        original: &Arc<RwLock<T>>,
    ) -> Arc<RwLock<T>> {
        if let Some(existing) = self.cloned(original) {
            return existing;
        }
        let copy = Arc::new(RwLock::new(original.read().shallow_copy()));
        self.set_cloned(original, Arc::clone(&copy));
        copy.write().resolve_fields(self);
        copy
    }

    /// Pin `original` so that resolving it yields the same instance.
    pub fn share<T: 'static>(&mut self, original: &Arc<T>) {
        self.set_cloned(original, Arc::clone(original));
    }

    /// Register `clone` as the resolution of `original`.
    pub fn set_cloned<T: 'static>(&mut self, original: &Arc<T>, clone: Arc<T>) {
        self.clones.insert(
            identity(original),
            Registration {
                original: Box::new(Arc::clone(original)),
                clone: Box::new(clone),
            },
        );
    }

    /// The value registered for `original`, if any.
    pub fn cloned<T: 'static>(&self, original: &Arc<T>) -> Option<Arc<T>> {
        let registration = self.clones.get(&identity(original))?;
        let registered = registration.original.downcast_ref::<Arc<T>>()?;
        if !Arc::ptr_eq(registered, original) {
            return None;
        }
        registration.clone.downcast_ref::<Arc<T>>().cloned()
    }

    /// Whether a resolution has been registered for `original`.
    pub fn is_cloned<T: 'static>(&self, original: &Arc<T>) -> bool {
        self.cloned(original).is_some()
    }

    /// Number of registered resolutions.
    pub fn len(&self) -> usize {
        self.clones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clones.is_empty()
    }
}

impl std::fmt::Debug for Cloner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cloner")
            .field("clones", &self.clones.len())
            .finish()
    }
}

fn identity<T>(arc: &Arc<T>) -> usize {
    Arc::as_ptr(arc) as *const () as usize
}

// ---------------------------------------------------------------------------
// CloneResolve impls for plain values and containers
// ---------------------------------------------------------------------------

macro_rules! impl_resolve_by_copy {
    ($($ty:ty),* $(,)?) => {
        $(
            impl CloneResolve for $ty {
                fn resolve_clone(&self, _cloner: &mut Cloner) -> Self {
                    self.clone()
                }
            }
        )*
    };
}

impl_resolve_by_copy!(bool, u8, u16, u32, u64, i8, i16, i32, i64, f32, f64, usize, String);

impl<T: CloneResolve> CloneResolve for Option<T> {
    fn resolve_clone(&self, cloner: &mut Cloner) -> Self {
        self.as_ref().map(|value| value.resolve_clone(cloner))
    }
}

impl<T: CloneResolve> CloneResolve for Vec<T> {
    fn resolve_clone(&self, cloner: &mut Cloner) -> Self {
        self.iter().map(|value| value.resolve_clone(cloner)).collect()
    }
}

impl<K: Clone + Eq + Hash, V: CloneResolve> CloneResolve for HashMap<K, V> {
    fn resolve_clone(&self, cloner: &mut Cloner) -> Self {
        self.iter()
            .map(|(key, value)| (key.clone(), value.resolve_clone(cloner)))
            .collect()
    }
}

impl<T: GraphClone + 'static> CloneResolve for Arc<RwLock<T>> {
    fn resolve_clone(&self, cloner: &mut Cloner) -> Self {
        cloner.clone_arc(self)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Weak;

    use super::*;

    struct Node {
        value: i32,
        children: Vec<Arc<RwLock<Node>>>,
        parent: Option<Weak<RwLock<Node>>>,
    }

    impl Node {
        fn leaf(value: i32) -> Arc<RwLock<Self>> {
            Arc::new(RwLock::new(Self {
                value,
                children: Vec::new(),
                parent: None,
            }))
        }
    }

    impl GraphClone for Node {
        fn shallow_copy(&self) -> Self {
            Self {
                value: self.value,
                children: self.children.clone(),
                parent: self.parent.clone(),
            }
        }

        fn resolve_fields(&mut self, cloner: &mut Cloner) {
            self.children = cloner.resolve(&self.children);
            self.parent = self
                .parent
                .as_ref()
                .and_then(Weak::upgrade)
                .map(|parent| Arc::downgrade(&cloner.clone_arc(&parent)));
        }
    }

    #[test]
    fn diamond_stays_a_diamond() {
        let shared = Node::leaf(3);
        let a = Arc::new(RwLock::new(Node {
            value: 1,
            children: vec![shared.clone()],
            parent: None,
        }));
        let b = Arc::new(RwLock::new(Node {
            value: 2,
            children: vec![shared.clone()],
            parent: None,
        }));
        let root = vec![a, b];

        let mut cloner = Cloner::new();
        let copy = cloner.resolve(&root);

        let left = copy[0].read().children[0].clone();
        let right = copy[1].read().children[0].clone();
        assert!(Arc::ptr_eq(&left, &right));
        assert!(!Arc::ptr_eq(&left, &shared));
        assert_eq!(left.read().value, 3);
        assert_eq!(cloner.len(), 3);
    }

    #[test]
    fn cycles_resolve_to_the_new_node() {
        let root = Node::leaf(0);
        let child = Arc::new(RwLock::new(Node {
            value: 1,
            children: Vec::new(),
            parent: Some(Arc::downgrade(&root)),
        }));
        root.write().children.push(child);

        let mut cloner = Cloner::new();
        let copy = cloner.clone_arc(&root);
        let copied_child = copy.read().children[0].clone();
        let parent = copied_child
            .read()
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .unwrap();
        assert!(Arc::ptr_eq(&parent, &copy));
        assert!(!Arc::ptr_eq(&parent, &root));
    }

    #[test]
    fn shared_values_are_not_copied() {
        let pinned = Node::leaf(7);
        let mut cloner = Cloner::new();
        cloner.share(&pinned);
        let copy = cloner.resolve(&vec![pinned.clone()]);
        assert!(Arc::ptr_eq(&copy[0], &pinned));
    }

    #[test]
    fn plain_values_are_copied() {
        let mut cloner = Cloner::new();
        let lengths = Some(vec![3, 4, 5]);
        assert_eq!(cloner.resolve(&lengths), lengths);
        assert!(cloner.is_empty());
    }

    #[test]
    fn registrations_keep_originals_alive() {
        let mut cloner = Cloner::new();
        let first = Node::leaf(1);
        let first_copy = cloner.clone_arc(&first);
        let weak = Arc::downgrade(&first);
        drop(first);
        assert!(weak.upgrade().is_some());

        // A later allocation can never reuse the address of a registered original.
        for value in 2..50 {
            let next = Node::leaf(value);
            let copy = cloner.clone_arc(&next);
            assert_eq!(copy.read().value, value);
            assert!(!Arc::ptr_eq(&copy, &first_copy));
        }
        assert_eq!(cloner.len(), 49);
    }

    #[test]
    fn clone_graph_runs_both_phases() {
        let shared = Node::leaf(5);
        let root = Node {
            value: 9,
            children: vec![shared.clone(), shared.clone()],
            parent: None,
        };
        let copy = Cloner::new().clone_graph(&root);
        assert_eq!(copy.value, 9);
        assert!(Arc::ptr_eq(&copy.children[0], &copy.children[1]));
        assert!(!Arc::ptr_eq(&copy.children[0], &shared));
    }
}
