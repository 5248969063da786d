//! The public route table.

use http::Method;

use crate::method_router::MethodRouter;
use crate::node::Node;
use crate::params::Params;
use crate::RouteError;

/// A radix tree route table.
///
/// Every successful lookup reports the *template* that matched alongside the
/// endpoint, so callers can label metrics with `/users/{id}` rather than the
/// literal request path.
///
/// Priority when several routes could match: static segments, then
/// `{param}` segments, then `*wildcard` tails.
///
/// ```rust
/// use janus_router::{MethodRouter, Router};
/// use http::Method;
///
/// let mut router = Router::new();
/// router.insert("/users/{id}", MethodRouter::new().get("show")).unwrap();
///
/// let found = router.lookup(&Method::GET, "/users/42").unwrap();
/// assert_eq!(*found.endpoint, "show");
/// assert_eq!(found.template, "/users/{id}");
/// assert_eq!(found.params.get("id"), Some("42"));
/// ```
#[derive(Debug, Clone)]
pub struct Router<T> {
    root: Node<T>,
    route_count: usize,
}

impl<T> Default for Router<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A successful lookup.
#[derive(Debug)]
pub struct RouteMatch<'a, T> {
    /// Endpoint registered for the method.
    pub endpoint: &'a T,
    /// Normalized template of the matched route.
    pub template: &'a str,
    /// Captured path parameters.
    pub params: Params,
}

/// Why a lookup produced no endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Miss<'a> {
    /// No template matches the path.
    NotFound,
    /// A template matches but does not accept the method.
    MethodNotAllowed {
        /// Template that matched the path.
        template: &'a str,
        /// Methods the template accepts.
        allowed: Vec<Method>,
    },
}

impl<T> Router<T> {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: Node::root(),
            route_count: 0,
        }
    }

    /// Registers `methods` under `template`.
    ///
    /// Registering a template twice merges the method sets; existing
    /// method entries are kept.
    pub fn insert(&mut self, template: &str, methods: MethodRouter<T>) -> Result<(), RouteError> {
        let segments = Node::<T>::parse(template)?;
        let canonical = Node::<T>::template_of(&segments);
        self.root.insert(&segments, &canonical, methods)?;
        self.route_count += 1;
        Ok(())
    }

    /// Registers a single endpoint.
    pub fn route(&mut self, method: Method, template: &str, endpoint: T) -> Result<(), RouteError> {
        self.insert(template, MethodRouter::new().on(method, endpoint))
    }

    /// Resolves a method and path to an endpoint.
    pub fn lookup(&self, method: &Method, path: &str) -> Result<RouteMatch<'_, T>, Miss<'_>> {
        let found = self.root.find(path).ok_or(Miss::NotFound)?;
        match found.route.methods.find(method) {
            Some(endpoint) => Ok(RouteMatch {
                endpoint,
                template: &found.route.template,
                params: found.params,
            }),
            None => Err(Miss::MethodNotAllowed {
                template: &found.route.template,
                allowed: found.route.methods.allowed_methods(),
            }),
        }
    }

    /// Returns the template matching `path`, regardless of method.
    #[must_use]
    pub fn template_for(&self, path: &str) -> Option<&str> {
        self.root.find(path).map(|f| f.route.template.as_str())
    }

    /// Lists every registered template with its accepted methods.
    #[must_use]
    pub fn routes(&self) -> Vec<(&str, Vec<Method>)> {
        let mut routes = Vec::with_capacity(self.route_count);
        self.root.collect(&mut routes);
        routes
            .into_iter()
            .map(|r| (r.template.as_str(), r.methods.allowed_methods()))
            .collect()
    }

    /// Number of `insert` calls that succeeded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.route_count
    }

    /// Returns true if nothing has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.route_count == 0
    }
}
