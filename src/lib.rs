//! Path-template routing and controller dispatch for CGI-style application servers.
//!
//! This crate sits between a server that has already parsed a request and the application code
//! answering it. It does not listen on sockets. The hosting server builds a [`Request`], hands
//! it to [`Router::dispatch`] and writes out the [`Response`] it gets back.
//!
//! ```
//! use waymark::handler::{self, HandlerResult};
//! use waymark::{Request, Response, RouteParams, Router};
//!
//! fn archive(_req: &Request, vars: &RouteParams) -> HandlerResult<String> {
//!     Ok(format!("{}-{}: {}", vars["year"], vars["month"], vars["slug"]))
//! }
//!
//! let mut router = Router::new();
//! router
//!     .route("/", Response::html("<h1>Home</h1>"))
//!     .unwrap()
//!     .route(r"/{year:\d{4}}/{month:\d\d}/{slug}", handler::function(archive))
//!     .unwrap();
//!
//! let response = router.dispatch(Request::new("GET", "/2024/03/hello")).unwrap();
//! assert_eq!(response.body(), b"2024-03: hello");
//!
//! let response = router.dispatch(Request::new("GET", "/nope")).unwrap();
//! assert_eq!(response.status(), 404);
//! ```
//!
//! # Templates
//!
//! Routes are described by URL templates: literal text with `{name}` or `{name:pattern}`
//! placeholders. See the [`template`] module for the syntax. Templates are compiled when a route
//! is added, so a malformed template is reported by [`Router::add_route`] and never while
//! serving.
//!
//! # Matching
//!
//! The router tries its routes in the order they were added and dispatches to the first one
//! whose template matches the whole path. There is no notion of a "more specific" route: a
//! general template registered first shadows a specific one registered after it.
//!
//! The variables captured from the path are merged with the route's static variables (which
//! win on a name clash) and attached to the request. Handlers read them with
//! [`Request::vars`].
//!
//! # Handlers
//!
//! Anything implementing [`Handler`] can be routed to, including a fixed [`Response`]. The
//! [`handler`] module adapts plain functions and per-request [`Action`](handler::Action) types
//! to that trait, and turns the [`HttpError`](handler::HttpError)s they return into error
//! responses.
//!
//! # The current request
//!
//! While a handler runs, its request is available on the same thread through
//! [`registry::current`], for code that has no request parameter of its own.

mod context;
mod error;
pub mod handler;
pub mod registry;
mod resolve;
mod router;
pub mod status;
pub mod template;

pub use context::{Request, Response};
pub use error::Error;
pub use handler::{BoxError, Handler};
pub use resolve::{HandlerMap, Resolve, SharedHandler};
pub use router::{Route, RouteParams, Router};
pub use template::Template;
