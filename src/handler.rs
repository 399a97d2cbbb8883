//! Adapting request handlers to a uniform contract
//!
//! The router only knows about the [`Handler`] trait: a request goes in, a response (or a fatal
//! error) comes out. Application code rarely implements it directly. Instead it is written in
//! one of two shapes and wrapped by an adapter at registration time:
//!
//! - A plain function receiving the request and its matched variables. See [`function`].
//! - An [`Action`]: a type built fresh for every request, whose method is picked from the
//!   request verb and an optional `action` variable. See [`action`].
//!
//! Both shapes return a [`HandlerResult`]. An [`HttpError`] in the error position is turned into
//! the matching error response by the adapter. A [`Failure::Fatal`] is passed on to the caller of
//! [`Router::dispatch`](crate::Router::dispatch) untouched.
use crate::context::{Request, Response};
use crate::router::RouteParams;
use crate::status;
use std::collections::BTreeMap;
use std::fmt;

/// A type-erased error that a handler could not recover from
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The result type of application handlers
pub type HandlerResult<T = Reply> = Result<T, Failure>;

/// Handles a dispatched request.
///
/// Implementations must not catch failures they do not understand. Returning `Err` hands the
/// error to the hosting server.
pub trait Handler: Send + Sync {
    fn call(&self, req: &Request) -> Result<Response, BoxError>;
}

impl Handler for Response {
    fn call(&self, _req: &Request) -> Result<Response, BoxError> {
        Ok(self.clone())
    }
}

/// An HTTP error signaled by a handler, with a status and a message for the client
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{status} {message}")]
pub struct HttpError {
    status: u16,
    message: String,
}

impl HttpError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(status::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(status::NOT_FOUND, message)
    }

    pub fn method_not_allowed(message: impl Into<String>) -> Self {
        Self::new(status::METHOD_NOT_ALLOWED, message)
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the plain-text response reporting this error
    pub fn into_response(self) -> Response {
        Response::text(self.message).set_status(self.status)
    }
}

/// Why a handler did not produce a reply
#[derive(Debug, thiserror::Error)]
pub enum Failure {
    /// An error the adapters turn into a response
    #[error(transparent)]
    Http(#[from] HttpError),

    /// Anything else. Propagated to the hosting server.
    #[error(transparent)]
    Fatal(BoxError),
}

impl Failure {
    pub fn fatal(error: impl Into<BoxError>) -> Self {
        Failure::Fatal(error.into())
    }
}

/// What a handler may return on success
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// A complete response, used as is
    Response(Response),
    /// Plain text, sent as a `200 OK` with a `text/plain` content type
    Text(String),
}

impl Reply {
    pub fn into_response(self) -> Response {
        match self {
            Reply::Response(response) => response,
            Reply::Text(text) => Response::text(text),
        }
    }
}

impl From<Response> for Reply {
    fn from(value: Response) -> Self {
        Reply::Response(value)
    }
}

impl From<String> for Reply {
    fn from(value: String) -> Self {
        Reply::Text(value)
    }
}

impl From<&str> for Reply {
    fn from(value: &str) -> Self {
        Reply::Text(value.to_string())
    }
}

// The error boundary shared by both adapters.
fn normalize<R>(req: &Request, result: HandlerResult<R>) -> Result<Response, BoxError>
where
    R: Into<Reply>,
{
    match result {
        Ok(reply) => Ok(reply.into().into_response()),
        Err(Failure::Http(e)) => {
            log::info!(
                status = e.status(),
                method = req.method(),
                path = req.path();
                "Handler signaled an HTTP error"
            );
            Ok(e.into_response())
        }
        Err(Failure::Fatal(e)) => {
            log::warn!(
                error:% = e,
                method = req.method(),
                path = req.path();
                "Handler failed"
            );
            Err(e)
        }
    }
}

/// Adapts a function taking the request and its matched variables
///
/// ```
/// use waymark::handler::{self, HandlerResult};
/// use waymark::{Request, RouteParams, Router};
///
/// fn greet(_req: &Request, vars: &RouteParams) -> HandlerResult<String> {
///     Ok(format!("Hello {}", vars["name"]))
/// }
///
/// let mut router = Router::new();
/// router.route("/hello/{name}", handler::function(greet)).unwrap();
///
/// let response = router.dispatch(Request::new("GET", "/hello/world")).unwrap();
/// assert_eq!(response.body(), b"Hello world");
/// ```
pub fn function<F, R>(f: F) -> Function<F>
where
    F: Fn(&Request, &RouteParams) -> HandlerResult<R> + Send + Sync,
    R: Into<Reply>,
{
    Function(f)
}

/// A [`Handler`] created by [`function`]
pub struct Function<F>(F);

impl<F, R> Handler for Function<F>
where
    F: Fn(&Request, &RouteParams) -> HandlerResult<R> + Send + Sync,
    R: Into<Reply>,
{
    fn call(&self, req: &Request) -> Result<Response, BoxError> {
        normalize(req, (self.0)(req, req.vars()))
    }
}

/// A method of an [`Action`] type
pub type ActionMethod<A> = fn(&mut A) -> HandlerResult;

/// A handler type instantiated once per request.
///
/// The instance receives everything it needs on construction, so its methods take no arguments.
/// Which method runs is decided by [`ActionHandler::method_name`].
///
/// ```
/// use waymark::handler::{self, Action, ActionMethods, Failure, HandlerResult};
/// use waymark::{action_methods, Request, RouteParams, Router};
///
/// struct Article {
///     id: String,
/// }
///
/// impl Article {
///     fn get(&mut self) -> HandlerResult {
///         Ok(format!("article {}", self.id).into())
///     }
///
///     fn publish_post(&mut self) -> HandlerResult {
///         Ok(format!("published {}", self.id).into())
///     }
/// }
///
/// impl Action for Article {
///     fn new(_req: &Request, vars: &RouteParams) -> Result<Self, Failure> {
///         Ok(Article { id: vars["id"].clone() })
///     }
///
///     fn methods() -> ActionMethods<Self> {
///         action_methods![get, publish_post]
///     }
/// }
///
/// let mut router = Router::new();
/// router
///     .route("/articles/{id}", handler::action::<Article>())
///     .unwrap()
///     .route("/articles/{id}/{action}", handler::action::<Article>())
///     .unwrap();
///
/// let response = router.dispatch(Request::new("POST", "/articles/7/publish")).unwrap();
/// assert_eq!(response.body(), b"published 7");
/// ```
pub trait Action: Sized + 'static {
    fn new(req: &Request, vars: &RouteParams) -> Result<Self, Failure>;

    /// Returns the methods requests may be routed to
    fn methods() -> ActionMethods<Self>;
}

/// The table of callable methods of an [`Action`], keyed by name.
///
/// Usually built with [`action_methods!`](crate::action_methods).
pub struct ActionMethods<A> {
    table: BTreeMap<String, ActionMethod<A>>,
}

impl<A> Default for ActionMethods<A> {
    fn default() -> Self {
        Self {
            table: BTreeMap::new(),
        }
    }
}

impl<A> ActionMethods<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `method` under `name`
    pub fn on(mut self, name: impl Into<String>, method: ActionMethod<A>) -> Self {
        self.table.insert(name.into(), method);
        self
    }

    fn get(&self, name: &str) -> Option<ActionMethod<A>> {
        self.table.get(name).copied()
    }
}

/// Builds the [`ActionMethods`] of an [`Action`] from a list of its method names
#[macro_export]
macro_rules! action_methods {
    ($($method:ident),* $(,)?) => {
        $crate::handler::ActionMethods::new()
            $(.on(stringify!($method), Self::$method))*
    };
}

/// Adapts an [`Action`] type
pub fn action<A: Action>() -> ActionHandler<A> {
    ActionHandler {
        methods: A::methods(),
    }
}

/// A [`Handler`] created by [`action`]
pub struct ActionHandler<A> {
    methods: ActionMethods<A>,
}

impl<A: Action> ActionHandler<A> {
    /// Returns the name of the method that would handle `req`.
    ///
    /// This is the lowercased request method, prefixed by the request's `action` variable and an
    /// underscore when that variable is set. A `POST` with `action` set to `publish` resolves to
    /// `publish_post`, while a plain `GET` resolves to `get`.
    pub fn method_name(req: &Request) -> String {
        let verb = req.method().to_lowercase();
        match req.var("action") {
            Some(action) => format!("{action}_{verb}"),
            None => verb,
        }
    }
}

impl<A: Action> fmt::Debug for ActionHandler<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionHandler")
            .field("action", &std::any::type_name::<A>())
            .field("methods", &self.methods.table.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<A: Action> Handler for ActionHandler<A> {
    fn call(&self, req: &Request) -> Result<Response, BoxError> {
        let name = Self::method_name(req);

        let Some(method) = self.methods.get(&name) else {
            log::debug!(
                method = name.as_str(),
                action = std::any::type_name::<A>(),
                path = req.path();
                "No such action method"
            );
            return Ok(HttpError::not_found("Not Found").into_response());
        };

        let mut instance = match A::new(req, req.vars()) {
            Ok(instance) => instance,
            Err(failure) => return normalize::<Reply>(req, Err(failure)),
        };

        normalize(req, method(&mut instance))
    }
}
