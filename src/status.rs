//! HTTP status code constants

macro_rules! status_codes {
    ($($name:ident  $value:literal  $reason:literal),* $(,)?) => {
        $(
            pub const $name: u16 = $value;
        )*

        /// Returns the canonical reason phrase for `code`, if it is one of the known constants
        pub fn reason(code: u16) -> Option<&'static str> {
            match code {
                $($value => Some($reason),)*
                _ => None,
            }
        }
    }
}

status_codes! {
    OK                          200 "OK",
    NOT_MODIFIED                304 "Not Modified",
    TEMPORARY_REDIRECT          307 "Temporary Redirect",
    PERMANENT_REDIRECT          308 "Permanent Redirect",
    BAD_REQUEST                 400 "Bad Request",
    UNAUTHORIZED                401 "Unauthorized",
    FORBIDDEN                   403 "Forbidden",
    NOT_FOUND                   404 "Not Found",
    METHOD_NOT_ALLOWED          405 "Method Not Allowed",
    CONFLICT                    409 "Conflict",
    GONE                        410 "Gone",
    TEAPOT                      418 "I'm a teapot",
    INTERNAL_SERVER_ERROR       500 "Internal Server Error",
}
