use crate::context::{Request, Response};
use crate::error::Error;
use crate::handler::{BoxError, Handler};
use crate::registry;
use crate::resolve::{Resolve, SharedHandler};
use crate::template::Template;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

/// Variables matched for a request, keyed by name
pub type RouteParams = BTreeMap<String, String>;

/// A single entry of a [`Router`]
pub struct Route {
    name: Option<String>,
    template: Template,
    handler: SharedHandler,
    statics: RouteParams,
}

impl Route {
    /// Returns the route's name, if it was registered with one
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the compiled template of the route
    pub fn template(&self) -> &Template {
        &self.template
    }

    /// Returns the static variables of the route
    pub fn statics(&self) -> &RouteParams {
        &self.statics
    }

    /// Returns the handler of the route
    pub fn handler(&self) -> &dyn Handler {
        self.handler.as_ref()
    }

    // Captures from `path`, overlaid with the static variables.
    fn params(&self, path: &str) -> Option<RouteParams> {
        let mut params = self.template.captures(path)?;
        for (key, value) in &self.statics {
            params.insert(key.clone(), value.clone());
        }
        Some(params)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("name", &self.name)
            .field("template", &self.template.as_str())
            .field("statics", &self.statics)
            .finish()
    }
}

/// Dispatches requests to handlers based on their path.
///
/// Routes are tried in the order they were added and the first one whose template matches the
/// whole request path wins, no matter how specific later routes are. Register specific templates
/// before general ones that would also match.
///
/// The router is meant to be built once and then shared, read-only, by the threads serving
/// requests.
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
    resolver: Option<Box<dyn Resolve>>,
}

fn collect_params<I, K, V>(pairs: I) -> RouteParams
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

impl Router {
    /// Creates a router without routes
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the resolver used by [`Router::add_route_ref`]
    pub fn with_resolver<R>(mut self, resolver: R) -> Self
    where
        R: Resolve + 'static,
    {
        self.resolver = Some(Box::new(resolver));
        self
    }

    fn push(
        &mut self,
        name: Option<String>,
        template: &str,
        handler: SharedHandler,
        statics: RouteParams,
    ) -> Result<&mut Self, Error> {
        let template = Template::compile(template)?;

        log::debug!(
            template = template.as_str(),
            position = self.routes.len();
            "Route added"
        );

        self.routes.push(Route {
            name,
            template,
            handler,
            statics,
        });
        Ok(self)
    }

    /// Appends a route dispatching paths matching `template` to `handler`.
    ///
    /// `statics` are added to the variables of every request the route matches. They take
    /// precedence over variables captured from the path under the same name.
    ///
    /// Fails if `template` does not compile.
    pub fn add_route<H, I, K, V>(
        &mut self,
        template: &str,
        handler: H,
        statics: I,
    ) -> Result<&mut Self, Error>
    where
        H: Handler + 'static,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.push(None, template, Arc::new(handler), collect_params(statics))
    }

    /// Appends a route without static variables
    ///
    /// See [`Router::add_route`]
    pub fn route<H>(&mut self, template: &str, handler: H) -> Result<&mut Self, Error>
    where
        H: Handler + 'static,
    {
        self.push(None, template, Arc::new(handler), RouteParams::new())
    }

    /// Appends a route that can later be turned back into a path with [`Router::url_for`]
    ///
    /// See [`Router::add_route`]
    pub fn add_named_route<H, I, K, V>(
        &mut self,
        name: impl Into<String>,
        template: &str,
        handler: H,
        statics: I,
    ) -> Result<&mut Self, Error>
    where
        H: Handler + 'static,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.push(
            Some(name.into()),
            template,
            Arc::new(handler),
            collect_params(statics),
        )
    }

    /// Appends a route whose handler is looked up by `reference` through the router's
    /// [resolver](Router::with_resolver).
    ///
    /// Fails with [`Error::UnresolvedHandler`] if there is no resolver or it does not know the
    /// reference.
    pub fn add_route_ref<I, K, V>(
        &mut self,
        template: &str,
        reference: &str,
        statics: I,
    ) -> Result<&mut Self, Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let handler = self
            .resolver
            .as_ref()
            .and_then(|r| r.resolve(reference))
            .ok_or_else(|| Error::UnresolvedHandler(reference.to_string()))?;

        self.push(None, template, handler, collect_params(statics))
    }

    /// Returns the routes in matching order
    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Returns the first route matching `path`, along with the variables it matched
    pub fn find(&self, path: &str) -> Option<(&Route, RouteParams)> {
        self.routes
            .iter()
            .find_map(|route| route.params(path).map(|params| (route, params)))
    }

    /// Builds the path of the route named `name` from `vars`
    pub fn url_for(&self, name: &str, vars: &RouteParams) -> Result<String, Error> {
        let route = self
            .routes
            .iter()
            .find(|r| r.name() == Some(name))
            .ok_or_else(|| Error::UnknownRoute(name.to_string()))?;

        route.template.expand(vars)
    }

    /// Dispatches `request` to the first route matching its path.
    ///
    /// The matched variables are attached to the request, and the request is registered as the
    /// [current](crate::registry::current) one for as long as the handler runs.
    ///
    /// Returns a plain `404 Not Found` if no route matches. Errors the handler could not turn into
    /// a response are returned as is.
    pub fn dispatch(&self, mut request: Request) -> Result<Response, BoxError> {
        let Some((route, vars)) = self.find(request.path()) else {
            log::debug!(
                method = request.method(),
                path = request.path();
                "No route matched"
            );
            return Ok(Response::not_found());
        };

        log::debug!(
            method = request.method(),
            path = request.path(),
            template = route.template.as_str();
            "Route matched"
        );

        request.vars = vars;
        let request = Rc::new(request);

        let scope = registry::register(request.clone());
        let result = route.handler.call(&request);
        scope.unregister();

        result
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes)
            .field("resolver", &self.resolver.is_some())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::handler::{self, Failure, HandlerResult, HttpError};
    use crate::resolve::HandlerMap;
    use crate::status;
    use assert_matches::assert_matches;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn make_request(method: &str, path: &str) -> Request {
        Request::new(method, path)
    }

    fn echo_vars(_req: &Request, vars: &RouteParams) -> HandlerResult<String> {
        let pairs: Vec<String> = vars.iter().map(|(k, v)| format!("{k}={v}")).collect();
        Ok(pairs.join("&"))
    }

    fn body(response: &Response) -> String {
        String::from_utf8_lossy(response.body()).into_owned()
    }

    #[test]
    fn segment_matching() {
        let mut router = Router::new();
        router
            .route(r"/{year:\d\d\d\d}/{month:\d\d}/{slug}", handler::function(echo_vars))
            .unwrap();

        let response = router.dispatch(make_request("GET", "/2024/03/hello")).unwrap();

        assert_eq!(body(&response), "month=03&slug=hello&year=2024");
    }

    #[test]
    fn non_matching_path() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);

        let mut router = Router::new();
        router
            .route(
                "/path",
                handler::function(|_req, _vars| {
                    CALLS.fetch_add(1, Ordering::SeqCst);
                    Ok("called".to_string())
                }),
            )
            .unwrap();

        let response = router.dispatch(make_request("GET", "/nope")).unwrap();

        assert_eq!(response, Response::not_found());
        assert_eq!(response.status(), status::NOT_FOUND);
        assert_eq!(CALLS.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn empty_router_is_not_found() {
        let router = Router::new();
        let response = router.dispatch(make_request("GET", "/")).unwrap();
        assert_eq!(response.status(), status::NOT_FOUND);
    }

    #[test]
    fn first_match_wins() {
        let mut router = Router::new();
        router
            .route("/pages/{name}", Response::text("general"))
            .unwrap()
            .route("/pages/about", Response::text("specific"))
            .unwrap();

        let response = router.dispatch(make_request("GET", "/pages/about")).unwrap();

        assert_eq!(response, Response::text("general"));
    }

    #[test]
    fn no_fallthrough_on_handler_errors() {
        let mut router = Router::new();
        router
            .route(
                "/items/{id}",
                handler::function(|_req, _vars| -> HandlerResult<String> {
                    Err(HttpError::not_found("no such item").into())
                }),
            )
            .unwrap()
            .route("/items/{rest:.*}", Response::text("fallback"))
            .unwrap();

        let response = router.dispatch(make_request("GET", "/items/3")).unwrap();

        assert_eq!(response.status(), status::NOT_FOUND);
        assert_eq!(body(&response), "no such item");
    }

    #[test]
    fn statics_are_merged_and_override_captures() {
        let mut router = Router::new();
        router
            .add_route(
                "/{lang}/{page}",
                handler::function(echo_vars),
                [("lang", "en"), ("section", "docs")],
            )
            .unwrap();

        let response = router.dispatch(make_request("GET", "/fr/intro")).unwrap();

        assert_eq!(body(&response), "lang=en&page=intro&section=docs");
    }

    #[test]
    fn dispatch_context_is_attached_to_the_request() {
        let mut router = Router::new();
        router
            .add_route(
                "/users/{id}",
                handler::function(|req, vars| {
                    assert_eq!(req.vars(), vars);
                    Ok(format!("{}:{}", req.var("id").unwrap(), req.var("kind").unwrap()))
                }),
                [("kind", "user")],
            )
            .unwrap();

        let response = router.dispatch(make_request("GET", "/users/5")).unwrap();
        assert_eq!(body(&response), "5:user");
    }

    #[test]
    fn invalid_templates_fail_at_registration() {
        let mut router = Router::new();

        assert_matches!(
            router.route("/{id", Response::default()),
            Err(Error::UnterminatedPlaceholder { .. })
        );
        assert_matches!(
            router.route("/{a}/{a}", Response::default()),
            Err(Error::DuplicateVariable { .. })
        );
        assert!(router.is_empty());
    }

    #[test]
    fn fatal_errors_reach_the_caller() {
        let mut router = Router::new();
        router
            .route(
                "/boom",
                handler::function(|_req, _vars| -> HandlerResult<String> {
                    Err(Failure::fatal("boom"))
                }),
            )
            .unwrap();

        let error = router.dispatch(make_request("GET", "/boom")).unwrap_err();
        assert_eq!(error.to_string(), "boom");
    }

    #[test]
    fn resolving_references() {
        let handlers = HandlerMap::new().insert("pages:about", Response::text("about"));
        let mut router = Router::new().with_resolver(handlers);

        router
            .add_route_ref("/about", "pages:about", [("from", "ref")])
            .unwrap();

        assert_matches!(
            router.add_route_ref("/x", "pages:missing", Vec::<(String, String)>::new()),
            Err(Error::UnresolvedHandler(r)) if r == "pages:missing"
        );

        let response = router.dispatch(make_request("GET", "/about")).unwrap();
        assert_eq!(response, Response::text("about"));
        assert_eq!(router.len(), 1);
    }

    #[test]
    fn references_need_a_resolver() {
        let mut router = Router::new();
        assert_matches!(
            router.add_route_ref("/about", "pages:about", [("a", "b")]),
            Err(Error::UnresolvedHandler(_))
        );
    }

    #[test]
    fn building_urls() {
        let mut router = Router::new();
        router
            .add_named_route(
                "archive",
                r"/{year:\d{4}}/{month:\d\d}",
                Response::default(),
                [("kind", "archive")],
            )
            .unwrap();

        let vars: RouteParams = collect_params([("year", "2024"), ("month", "03")]);
        assert_eq!(router.url_for("archive", &vars).unwrap(), "/2024/03");

        assert_matches!(
            router.url_for("missing", &vars),
            Err(Error::UnknownRoute(name)) if name == "missing"
        );
        assert_eq!(router.routes().next().unwrap().name(), Some("archive"));
    }

    #[test]
    fn finding_without_dispatching() {
        let mut router = Router::new();
        router
            .route("/a/{x}", Response::default())
            .unwrap()
            .route("/b/{y}", Response::default())
            .unwrap();

        let (route, vars) = router.find("/b/2").unwrap();
        assert_eq!(route.template().as_str(), "/b/{y}");
        assert_eq!(vars, collect_params([("y", "2")]));
        assert!(router.find("/c/3").is_none());
    }
}
