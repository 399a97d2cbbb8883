use crate::handler::Handler;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A handler shared between the routes that use it
pub type SharedHandler = Arc<dyn Handler>;

/// Looks up handlers by a textual reference such as `"blog:archive"`.
///
/// A [`Router`](crate::Router) given a resolver can register routes by reference with
/// [`Router::add_route_ref`](crate::Router::add_route_ref). How references are spelled is up to
/// the resolver.
pub trait Resolve: Send + Sync {
    /// Returns the handler `reference` points to, if any
    fn resolve(&self, reference: &str) -> Option<SharedHandler>;
}

impl<F> Resolve for F
where
    F: Fn(&str) -> Option<SharedHandler> + Send + Sync,
{
    fn resolve(&self, reference: &str) -> Option<SharedHandler> {
        self(reference)
    }
}

/// A [`Resolve`] implementation backed by a map of references to handlers
#[derive(Default, Clone)]
pub struct HandlerMap {
    map: BTreeMap<String, SharedHandler>,
}

impl HandlerMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `handler` resolvable as `reference`, replacing any previous handler with that
    /// reference
    pub fn insert<H>(mut self, reference: impl Into<String>, handler: H) -> Self
    where
        H: Handler + 'static,
    {
        self.map.insert(reference.into(), Arc::new(handler));
        self
    }
}

impl Resolve for HandlerMap {
    fn resolve(&self, reference: &str) -> Option<SharedHandler> {
        self.map.get(reference).cloned()
    }
}

impl fmt::Debug for HandlerMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.map.keys()).finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::context::{Request, Response};

    #[test]
    fn resolving_from_a_map() {
        let map = HandlerMap::new().insert("pages:about", Response::text("about"));

        let handler = map.resolve("pages:about").unwrap();
        let response = handler.call(&Request::new("GET", "/")).unwrap();

        assert_eq!(response, Response::text("about"));
        assert!(map.resolve("pages:missing").is_none());
    }

    #[test]
    fn closures_resolve() {
        let resolver = |reference: &str| -> Option<SharedHandler> {
            reference
                .strip_prefix("static:")
                .map(|body| Arc::new(Response::text(body)) as SharedHandler)
        };

        assert!(resolver.resolve("static:hi").is_some());
        assert!(resolver.resolve("other:hi").is_none());
    }
}
