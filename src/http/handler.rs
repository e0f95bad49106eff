//! Handler labels for the request counter.
//!
//! Routes opt into a stable label with [`named`], which tags every response
//! of the route with a [`HandlerName`]. The instrumentation layer reads the
//! tag back from the response, so the label never depends on how the handler
//! function happens to be called.

use std::sync::Arc;

use axum::{
    middleware::map_response,
    response::Response,
    routing::MethodRouter,
};

/// Label identifying the handler that produced a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerName(Arc<str>);

impl HandlerName {
    /// Build a label from an identifier, normalized by [`derive_handler_label`].
    pub fn new(identifier: impl AsRef<str>) -> Self {
        Self(Arc::from(derive_handler_label(identifier.as_ref())))
    }

    /// Label taken from the type name of a handler function.
    pub fn of<H>(_handler: &H) -> Self {
        Self::new(std::any::type_name::<H>())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Last path segment of `identifier` with a leading `Handle` stripped.
///
/// `routes.HandleUsers` and `app::routes::HandleUsers` both become `Users`;
/// a bare `Handle` becomes the empty label.
pub fn derive_handler_label(identifier: &str) -> &str {
    let last = identifier
        .rsplit(|c: char| c == '.' || c == ':')
        .next()
        .unwrap_or(identifier);
    last.strip_prefix("Handle").unwrap_or(last)
}

/// Tag every response of `route` with the handler label `label`.
pub fn named<S>(label: impl AsRef<str>, route: MethodRouter<S>) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    let name = HandlerName::new(label);
    route.layer(map_response(move |mut response: Response| {
        let name = name.clone();
        async move {
            response.extensions_mut().insert(name);
            response
        }
    }))
}
