//! Access to the request being dispatched, without passing it around
//!
//! Each thread has a single slot holding its current request. [`Router::dispatch`] fills it
//! for the duration of a handler call, so code deep inside a handler can call [`current`]
//! instead of threading the request through every function.
//!
//! The slot is filled by [`register`], which returns a [`RequestScope`]. The previous occupant of
//! the slot is restored when the scope is dropped, whichever way the enclosing code exits.
//!
//! [`Router::dispatch`]: crate::Router::dispatch
use crate::context::Request;
use crate::error::Error;
use std::cell::RefCell;
use std::rc::Rc;

thread_local! {
    static CURRENT: RefCell<Option<Rc<Request>>> = const { RefCell::new(None) };
}

/// Keeps a request registered as the current one on this thread.
///
/// Scopes nest. Dropping one restores the request that was current when it was created, so
/// scopes must be dropped in the reverse order of their creation. Lexical scoping takes care
/// of that in practice.
#[must_use = "the request is unregistered as soon as the scope is dropped"]
#[derive(Debug)]
pub struct RequestScope {
    previous: Option<Rc<Request>>,
}

impl RequestScope {
    /// Unregisters the request now instead of at the end of the enclosing block
    pub fn unregister(self) {
        drop(self);
    }
}

impl Drop for RequestScope {
    fn drop(&mut self) {
        let previous = self.previous.take();
        // The slot is gone if the thread is already tearing down its locals.
        let _ = CURRENT.try_with(|slot| *slot.borrow_mut() = previous);
    }
}

/// Registers `request` as the current request of this thread until the returned scope is dropped
pub fn register(request: Rc<Request>) -> RequestScope {
    let previous = CURRENT.with(|slot| slot.borrow_mut().replace(request));
    RequestScope { previous }
}

/// Returns the request currently registered on this thread.
///
/// Fails with [`Error::NoActiveRequest`] outside of any [`RequestScope`], which usually means
/// the caller is not running inside a handler.
pub fn current() -> Result<Rc<Request>, Error> {
    CURRENT
        .with(|slot| slot.borrow().clone())
        .ok_or(Error::NoActiveRequest)
}

/// Returns `true` if a request is registered on this thread
pub fn is_active() -> bool {
    CURRENT.with(|slot| slot.borrow().is_some())
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_matches::assert_matches;
    use std::panic;
    use std::thread;

    #[test]
    fn outside_any_scope() {
        assert_matches!(current(), Err(Error::NoActiveRequest));
        assert!(!is_active());
    }

    #[test]
    fn inside_a_scope() {
        let request = Rc::new(Request::new("GET", "/inside"));
        let scope = register(request.clone());

        assert!(Rc::ptr_eq(&current().unwrap(), &request));

        scope.unregister();
        assert_matches!(current(), Err(Error::NoActiveRequest));
    }

    #[test]
    fn nested_scopes_restore_the_outer_request() {
        let outer = Rc::new(Request::new("GET", "/outer"));
        let _outer_scope = register(outer.clone());

        {
            let inner = Rc::new(Request::new("GET", "/inner"));
            let _inner_scope = register(inner);
            assert_eq!(current().unwrap().path(), "/inner");
        }

        assert!(Rc::ptr_eq(&current().unwrap(), &outer));
    }

    #[test]
    fn unwinding_unregisters() {
        let result = panic::catch_unwind(|| {
            let _scope = register(Rc::new(Request::new("GET", "/panics")));
            panic!("handler blew up");
        });

        assert!(result.is_err());
        assert_matches!(current(), Err(Error::NoActiveRequest));
    }

    #[test]
    fn threads_have_their_own_slot() {
        let _scope = register(Rc::new(Request::new("GET", "/main")));

        let seen = thread::spawn(|| {
            let before = current().is_err();
            let _scope = register(Rc::new(Request::new("GET", "/worker")));
            (before, current().unwrap().path().to_string())
        })
        .join()
        .unwrap();

        assert_eq!(seen, (true, "/worker".to_string()));
        assert_eq!(current().unwrap().path(), "/main");
    }
}
