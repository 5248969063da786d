//! Property tests for template matching.

use http::Method;
use janus_router::{MethodRouter, Router};
use proptest::prelude::*;

fn segment() -> impl Strategy<Value = String> {
    "[a-z0-9][a-z0-9_-]{0,11}"
}

proptest! {
    #[test]
    fn param_routes_report_template_not_path(prefix in segment(), value in segment()) {
        let mut router = Router::new();
        let template = format!("/{prefix}/{{id}}");
        router.insert(&template, MethodRouter::new().get(())).unwrap();

        let path = format!("/{prefix}/{value}");
        let found = router.lookup(&Method::GET, &path).unwrap();
        prop_assert_eq!(found.template, template.as_str());
        prop_assert_eq!(found.params.get("id"), Some(value.as_str()));
    }

    #[test]
    fn wildcard_captures_every_remaining_segment(tail in prop::collection::vec(segment(), 1..6)) {
        let mut router = Router::new();
        router.route(Method::GET, "/static/*rest", ()).unwrap();

        let joined = tail.join("/");
        let found = router.lookup(&Method::GET, &format!("/static/{joined}")).unwrap();
        prop_assert_eq!(found.params.get("rest"), Some(joined.as_str()));
    }
}
