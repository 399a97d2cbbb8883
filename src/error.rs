/// Errors raised while configuring a [`Router`](crate::Router) or using the request registry.
///
/// None of these are produced while a matched handler runs. Handler failures travel as
/// [`Failure`](crate::handler::Failure) values instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unterminated placeholder at byte {offset} of template '{template}'")]
    UnterminatedPlaceholder { template: String, offset: usize },

    #[error("Invalid variable name '{name}' in template '{template}'")]
    InvalidVariableName { template: String, name: String },

    #[error("Variable '{name}' appears more than once in template '{template}'")]
    DuplicateVariable { template: String, name: String },

    #[error("Template '{template}' does not compile to a valid pattern")]
    InvalidPattern {
        template: String,
        #[source]
        source: regex::Error,
    },

    #[error("No value given for variable '{name}' of template '{template}'")]
    MissingVariable { template: String, name: String },

    #[error("Expanded path '{path}' does not match template '{template}'")]
    ExpansionMismatch { template: String, path: String },

    #[error("No route is named '{0}'")]
    UnknownRoute(String),

    #[error("Handler reference '{0}' could not be resolved")]
    UnresolvedHandler(String),

    #[error("No request is being dispatched on this thread")]
    NoActiveRequest,

    #[error("Missing CGI meta-variable '{0}'")]
    MissingMetaVariable(&'static str),
}
