use crate::error::Error;
use crate::router::RouteParams;
use crate::status;
use convert_case::{Case, Casing};
use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::io::{self, Write};

macro_rules! impl_meta {
    ($($name:ident :: $doc:literal),*) => {
        $(
        paste::paste! {
            #[doc = $doc]
            pub fn [<get_$name:lower>](&self) -> Option<&str> {
                self.meta(stringify!($name))
            }
        }
        )*
    };
}

/// An inbound request as seen by the router and its handlers.
///
/// The router attaches the variables matched for the request (captures merged with the route's
/// static variables) before a handler runs. See [`Request::vars`].
#[derive(Debug)]
pub struct Request {
    method: String,
    path: String,
    query_string: String,
    headers: BTreeMap<String, String>,
    meta: BTreeMap<String, String>,
    body: Vec<u8>,
    pub(crate) vars: RouteParams,
    query: OnceCell<BTreeMap<String, String>>,
}

impl Default for Request {
    fn default() -> Self {
        Self {
            method: String::new(),
            path: String::new(),
            query_string: String::new(),
            headers: BTreeMap::new(),
            meta: BTreeMap::new(),
            body: Vec::new(),
            vars: RouteParams::new(),
            query: OnceCell::new(),
        }
    }
}

impl Request {
    /// Creates a request for `method` at `path`, with no headers, query or body
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    /// Builds a request from CGI meta-variables, as forwarded by a CGI or FastCGI client.
    ///
    /// `REQUEST_METHOD` is required. `PATH_INFO` defaults to `/` when absent or empty.
    /// `HTTP_*` variables become headers, with their names converted to `Train-Case`
    /// (e.g. `HTTP_ACCEPT_LANGUAGE` is stored as `Accept-Language`). `CONTENT_TYPE` and
    /// `CONTENT_LENGTH` are stored as headers too. Every other variable remains available through
    /// [`Request::meta`].
    pub fn from_cgi<I>(vars: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut vars: BTreeMap<String, String> = vars.into_iter().collect();

        let method = vars
            .remove("REQUEST_METHOD")
            .filter(|m| !m.is_empty())
            .ok_or(Error::MissingMetaVariable("REQUEST_METHOD"))?;

        let path = match vars.remove("PATH_INFO") {
            Some(p) if !p.is_empty() => p,
            _ => "/".to_string(),
        };

        let query_string = vars.remove("QUERY_STRING").unwrap_or_default();

        let mut headers = BTreeMap::new();
        let mut meta = BTreeMap::new();
        for (k, v) in vars {
            if let Some(suffix) = k.strip_prefix("HTTP_") {
                headers.insert(suffix.to_case(Case::Train), v);
            } else if k == "CONTENT_TYPE" || k == "CONTENT_LENGTH" {
                headers.insert(k.to_case(Case::Train), v);
            } else {
                meta.insert(k, v);
            }
        }

        Ok(Self {
            method,
            path,
            query_string,
            headers,
            meta,
            ..Self::default()
        })
    }

    /// Returns a request with the raw query string set
    pub fn with_query_string(mut self, query_string: impl Into<String>) -> Self {
        self.query_string = query_string.into();
        self.query = OnceCell::new();
        self
    }

    /// Returns a request with the header `key` set to `value`
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Returns a request with the given body
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Returns the request method
    pub fn method(&self) -> &str {
        self.method.as_str()
    }

    /// Returns the request path
    pub fn path(&self) -> &str {
        self.path.as_str()
    }

    /// Returns the value of the request header `name` if it exists
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Returns the request body
    pub fn body(&self) -> &[u8] {
        self.body.as_slice()
    }

    /// Returns the CGI meta-variable `name` the request was built with, if it exists.
    ///
    /// Variables consumed while building the request (the method, path, query string and
    /// headers) are not available here. An empty value is treated as absent.
    pub fn meta(&self, name: &str) -> Option<&str> {
        match self.meta.get(name).map(String::as_str) {
            Some("") => None,
            res => res,
        }
    }

    impl_meta![
        AUTH_TYPE :: "Returns the mechanism used by the server to authenticate the user, if any.",
        GATEWAY_INTERFACE :: "Returns the CGI version being used.",
        REMOTE_ADDR :: "Returns the address of the client sending the request.",
        REMOTE_HOST :: "Returns the fully qualified address of the client sending the request.",
        REMOTE_USER :: "Returns the user identification string supplied by the client as part of user authentication.",
        SCRIPT_NAME :: "Returns the path prefix under which the application is mounted.",
        SERVER_NAME :: "Returns the name of the server to which this request was directed.",
        SERVER_PORT :: "Returns the TCP/IP port on which this request was received",
        SERVER_PROTOCOL :: "Returns the name and version of the application protocol used for this request",
        SERVER_SOFTWARE :: "Returns the name and version of the client forwarding the request"
    ];

    /// Returns the variables matched for this request by the router.
    ///
    /// Empty until the request has been dispatched.
    pub fn vars(&self) -> &RouteParams {
        &self.vars
    }

    /// Returns a single matched variable
    pub fn var(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    fn parse_query(qs: &str) -> BTreeMap<String, String> {
        let mut query = BTreeMap::new();
        for (k, v) in form_urlencoded::parse(qs.as_bytes()) {
            query.insert(k.to_string(), v.to_string());
        }

        query
    }

    /// Returns the value of `key` from the parsed query string
    pub fn query(&self, key: &str) -> Option<&str> {
        let map = self
            .query
            .get_or_init(|| Self::parse_query(&self.query_string));

        map.get(key).map(String::as_str)
    }
}

/// An outbound response.
///
/// A `Response` is also a [`Handler`](crate::Handler) that answers every request with a copy of
/// itself, which makes it usable as a fixed route target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: u16,
    headers: BTreeMap<String, String>,
    body: Vec<u8>,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            // The CGI RFC says this is the default if no status is provided
            status: status::OK,
            headers: BTreeMap::new(),
            body: Vec::new(),
        }
    }
}

impl Response {
    /// Sets a response header, replacing any earlier value
    pub fn set_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Sets the status code
    pub fn set_status(mut self, code: u16) -> Self {
        self.status = code;
        self
    }

    /// Sets the response body
    pub fn set_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Returns the status code
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Returns the value of the response header `name` if it exists
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Returns the response body
    pub fn body(&self) -> &[u8] {
        self.body.as_slice()
    }

    fn typed(content_type: &str, body: impl Into<String>) -> Self {
        Response::default()
            .set_header("Content-Type", content_type)
            .set_body(body.into().into_bytes())
    }

    /// A `200` carrying `body` as `application/json`
    pub fn json(body: impl Into<String>) -> Self {
        Self::typed("application/json", body)
    }

    /// A `200` carrying `body` as `text/plain`
    pub fn text(body: impl Into<String>) -> Self {
        Self::typed("text/plain", body)
    }

    /// A `200` carrying `body` as `text/html`
    pub fn html(body: impl Into<String>) -> Self {
        Self::typed("text/html", body)
    }

    /// Returns the generic response used when no route matches a request
    pub fn not_found() -> Self {
        Self::text("Not Found").set_status(status::NOT_FOUND)
    }

    fn redirect(code: u16, location: impl Into<String>) -> Self {
        Response::default()
            .set_header("Location", location)
            .set_status(code)
    }

    /// A `307` pointing at `location`. Clients repeat the request there with the same method.
    pub fn temporary_redirect(location: impl Into<String>) -> Self {
        Self::redirect(status::TEMPORARY_REDIRECT, location)
    }

    /// A `308` pointing at `location`, marking the move as permanent
    pub fn permanent_redirect(location: impl Into<String>) -> Self {
        Self::redirect(status::PERMANENT_REDIRECT, location)
    }

    /// Serializes the response the way a CGI program writes it to stdout: header lines, a
    /// `Status` line, a blank line and the body.
    pub fn write_cgi<W: Write>(&self, writer: &mut W) -> Result<(), io::Error> {
        for (key, value) in self.headers.iter() {
            writeln!(writer, "{key}: {value}")?;
        }
        match status::reason(self.status) {
            Some(reason) => writeln!(writer, "Status: {} {reason}", self.status)?,
            None => writeln!(writer, "Status: {}", self.status)?,
        }
        writeln!(writer)?;
        writer.write_all(&self.body)
    }
}
