//! Per-path method dispatch.

use http::Method;

/// Maps HTTP methods to endpoint values for a single route template.
///
/// `HEAD` falls back to the `GET` endpoint when no explicit `HEAD` entry
/// exists.
///
/// ```rust
/// use janus_router::MethodRouter;
/// use http::Method;
///
/// let methods = MethodRouter::new().get("list").post("create");
///
/// assert_eq!(methods.find(&Method::GET), Some(&"list"));
/// assert_eq!(methods.find(&Method::HEAD), Some(&"list"));
/// assert_eq!(methods.find(&Method::DELETE), None);
/// ```
#[derive(Debug, Clone)]
pub struct MethodRouter<T> {
    entries: Vec<(Method, T)>,
}

impl<T> Default for MethodRouter<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> MethodRouter<T> {
    /// Creates an empty method router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `value` for `method`. An existing entry for the same method wins.
    #[must_use]
    pub fn on(mut self, method: Method, value: T) -> Self {
        if !self.contains(&method) {
            self.entries.push((method, value));
        }
        self
    }

    /// Registers a `GET` endpoint.
    #[must_use]
    pub fn get(self, value: T) -> Self {
        self.on(Method::GET, value)
    }

    /// Registers a `POST` endpoint.
    #[must_use]
    pub fn post(self, value: T) -> Self {
        self.on(Method::POST, value)
    }

    /// Registers a `PUT` endpoint.
    #[must_use]
    pub fn put(self, value: T) -> Self {
        self.on(Method::PUT, value)
    }

    /// Registers a `DELETE` endpoint.
    #[must_use]
    pub fn delete(self, value: T) -> Self {
        self.on(Method::DELETE, value)
    }

    /// Registers a `PATCH` endpoint.
    #[must_use]
    pub fn patch(self, value: T) -> Self {
        self.on(Method::PATCH, value)
    }

    /// Returns the endpoint registered for `method`.
    #[must_use]
    pub fn find(&self, method: &Method) -> Option<&T> {
        self.exact(method).or_else(|| {
            if *method == Method::HEAD {
                self.exact(&Method::GET)
            } else {
                None
            }
        })
    }

    fn exact(&self, method: &Method) -> Option<&T> {
        self.entries
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, v)| v)
    }

    /// Returns true if `method` has its own entry.
    #[must_use]
    pub fn contains(&self, method: &Method) -> bool {
        self.exact(method).is_some()
    }

    /// Moves entries from `other` for methods not registered here yet.
    pub fn merge(&mut self, other: MethodRouter<T>) {
        for (method, value) in other.entries {
            if !self.contains(&method) {
                self.entries.push((method, value));
            }
        }
    }

    /// Methods accepted by this route, in registration order.
    ///
    /// Used to build the `Allow` header of a 405 response.
    #[must_use]
    pub fn allowed_methods(&self) -> Vec<Method> {
        self.entries.iter().map(|(m, _)| m.clone()).collect()
    }

    /// Returns true if no method is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_registration_wins() {
        let methods = MethodRouter::new().get(1).get(2);
        assert_eq!(methods.find(&Method::GET), Some(&1));
    }

    #[test]
    fn test_head_falls_back_to_get() {
        let methods = MethodRouter::new().get("page");
        assert_eq!(methods.find(&Method::HEAD), Some(&"page"));

        let explicit = MethodRouter::new().get("page").on(Method::HEAD, "head");
        assert_eq!(explicit.find(&Method::HEAD), Some(&"head"));
    }

    #[test]
    fn test_merge_keeps_existing_entries() {
        let mut methods = MethodRouter::new().get("original");
        methods.merge(MethodRouter::new().get("replacement").post("create"));

        assert_eq!(methods.find(&Method::GET), Some(&"original"));
        assert_eq!(methods.find(&Method::POST), Some(&"create"));
        assert_eq!(methods.allowed_methods(), vec![Method::GET, Method::POST]);
    }

    #[test]
    fn test_custom_method() {
        let purge = Method::from_bytes(b"PURGE").unwrap();
        let methods = MethodRouter::new().on(purge.clone(), "purge");
        assert_eq!(methods.find(&purge), Some(&"purge"));
        assert!(!methods.is_empty());
    }
}
