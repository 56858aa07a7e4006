use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// A progress payload.
///
/// Progress travels across `then` boundaries that change the value type, so
/// payloads are type-erased. Cloning an `Update` shares the payload.
#[derive(Clone)]
pub struct Update(Rc<dyn Any>);

impl Update {
    /// Wraps `value`. Wrapping an `Update` returns it unchanged.
    pub fn new<V: Any>(value: V) -> Self {
        let boxed: Box<dyn Any> = Box::new(value);
        match boxed.downcast::<Update>() {
            Ok(update) => *update,
            Err(other) => Self(Rc::from(other)),
        }
    }

    pub fn downcast_ref<V: Any>(&self) -> Option<&V> {
        self.0.downcast_ref::<V>()
    }

    pub fn is<V: Any>(&self) -> bool {
        self.0.is::<V>()
    }

    /// Whether both updates share the same payload.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Rc::ptr_eq(&this.0, &other.0)
    }
}

impl fmt::Debug for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Update").finish_non_exhaustive()
    }
}
