use std::ops::{Deref, DerefMut};

pub(crate) trait NullCheck {
    fn is_null(&self) -> bool;
}

impl<T> NullCheck for *mut T {
    fn is_null(&self) -> bool {
        (*self as *const T).is_null()
    }
}

/// Owned SQLite handle, released through `dealloc` unless null.
#[derive(Debug)]
pub(crate) struct CBox<T: NullCheck + Copy> {
    pub(crate) ptr: T,
    dealloc: fn(T),
}

impl<T: NullCheck + Copy> CBox<T> {
    pub(crate) fn new(ptr: T, dealloc: fn(T)) -> Self {
        Self { ptr, dealloc }
    }

    /// Handle sharing the pointer without owning it.
    pub(crate) fn borrowed(&self) -> Self {
        Self::new(self.ptr, |_| {})
    }
}

impl<T: NullCheck + Copy> Drop for CBox<T> {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            (self.dealloc)(self.ptr);
        }
    }
}

impl<T: NullCheck + Copy> Deref for CBox<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.ptr
    }
}

impl<T: NullCheck + Copy> DerefMut for CBox<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.ptr
    }
}

// SQLite is opened in serialized mode, handles can move between threads.
unsafe impl<T: NullCheck + Copy> Send for CBox<T> {}
unsafe impl<T: NullCheck + Copy> Sync for CBox<T> {}
