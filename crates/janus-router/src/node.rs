//! Radix tree nodes.
//!
//! Each node owns one path segment. Nodes that terminate a registered route
//! carry the normalized route template and the [`MethodRouter`] for it.

use crate::method_router::MethodRouter;
use crate::params::Params;
use crate::RouteError;

/// Kind of segment a node matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SegmentKind {
    /// Literal text, e.g. `users`.
    Static,
    /// One segment captured under a name, e.g. `{id}`.
    Param(String),
    /// The rest of the path captured under a name, e.g. `*path`.
    Wildcard(String),
}

#[derive(Debug, Clone)]
pub(crate) struct Node<T> {
    segment: String,
    kind: SegmentKind,
    route: Option<Route<T>>,
    /// Kept sorted by segment for binary search.
    static_children: Vec<Node<T>>,
    param_child: Option<Box<Node<T>>>,
    wildcard_child: Option<Box<Node<T>>>,
}

#[derive(Debug, Clone)]
pub(crate) struct Route<T> {
    pub(crate) template: String,
    pub(crate) methods: MethodRouter<T>,
}

/// Result of matching a path against the tree.
#[derive(Debug)]
pub(crate) struct Found<'a, T> {
    pub(crate) route: &'a Route<T>,
    pub(crate) params: Params,
}

impl<T> Node<T> {
    pub(crate) fn root() -> Self {
        Self::new(String::new(), SegmentKind::Static)
    }

    fn new(segment: String, kind: SegmentKind) -> Self {
        Self {
            segment,
            kind,
            route: None,
            static_children: Vec::new(),
            param_child: None,
            wildcard_child: None,
        }
    }

    /// Splits a template into typed segments. Empty segments are dropped so
    /// `/users/` and `/users` share a node.
    pub(crate) fn parse(template: &str) -> Result<Vec<(String, SegmentKind)>, RouteError> {
        let raw: Vec<&str> = template.split('/').filter(|s| !s.is_empty()).collect();
        let mut segments = Vec::with_capacity(raw.len());

        for (index, segment) in raw.iter().enumerate() {
            let kind = if let Some(name) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                if name.is_empty() {
                    return Err(RouteError::EmptyParamName(template.to_string()));
                }
                SegmentKind::Param(name.to_string())
            } else if let Some(name) = segment.strip_prefix('*') {
                if index + 1 != raw.len() {
                    return Err(RouteError::WildcardNotLast(template.to_string()));
                }
                SegmentKind::Wildcard(name.to_string())
            } else {
                SegmentKind::Static
            };
            segments.push(((*segment).to_string(), kind));
        }

        Ok(segments)
    }

    /// Canonical template text for a parsed path.
    pub(crate) fn template_of(segments: &[(String, SegmentKind)]) -> String {
        let mut template = String::from("/");
        template.push_str(
            &segments
                .iter()
                .map(|(s, _)| s.as_str())
                .collect::<Vec<_>>()
                .join("/"),
        );
        template
    }

    pub(crate) fn insert(
        &mut self,
        segments: &[(String, SegmentKind)],
        template: &str,
        methods: MethodRouter<T>,
    ) -> Result<(), RouteError> {
        let Some(((segment, kind), rest)) = segments.split_first() else {
            match &mut self.route {
                Some(route) => route.methods.merge(methods),
                None => {
                    self.route = Some(Route {
                        template: template.to_string(),
                        methods,
                    });
                }
            }
            return Ok(());
        };

        let child = match kind {
            SegmentKind::Static => {
                match self
                    .static_children
                    .binary_search_by(|c| c.segment.as_str().cmp(segment))
                {
                    Ok(i) => &mut self.static_children[i],
                    Err(i) => {
                        self.static_children
                            .insert(i, Node::new(segment.clone(), SegmentKind::Static));
                        &mut self.static_children[i]
                    }
                }
            }
            SegmentKind::Param(name) => Self::named_child(&mut self.param_child, segment, kind, name, template)?,
            SegmentKind::Wildcard(name) => Self::named_child(&mut self.wildcard_child, segment, kind, name, template)?,
        };

        child.insert(rest, template, methods)
    }

    /// Reuses the single param or wildcard slot, rejecting a different capture name.
    fn named_child<'n>(
        slot: &'n mut Option<Box<Node<T>>>,
        segment: &str,
        kind: &SegmentKind,
        name: &str,
        template: &str,
    ) -> Result<&'n mut Node<T>, RouteError> {
        if let Some(existing) = slot.as_deref() {
            if existing.kind != *kind {
                return Err(RouteError::ConflictingParam {
                    template: template.to_string(),
                    existing: existing.segment.clone(),
                    new: name.to_string(),
                });
            }
        }
        Ok(slot.get_or_insert_with(|| Box::new(Node::new(segment.to_string(), kind.clone()))))
    }

    pub(crate) fn find(&self, path: &str) -> Option<Found<'_, T>> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut params = Params::new();
        let route = self.find_segments(&segments, &mut params)?;
        Some(Found { route, params })
    }

    /// Static children win over params, params over wildcards. Captures made
    /// by a branch that fails are rolled back before the next branch runs.
    fn find_segments<'a>(&'a self, segments: &[&str], params: &mut Params) -> Option<&'a Route<T>> {
        let Some((segment, rest)) = segments.split_first() else {
            return self.route.as_ref();
        };

        if let Ok(i) = self
            .static_children
            .binary_search_by(|c| c.segment.as_str().cmp(segment))
        {
            if let Some(route) = self.static_children[i].find_segments(rest, params) {
                return Some(route);
            }
        }

        if let Some(child) = &self.param_child {
            if let SegmentKind::Param(name) = &child.kind {
                let mark = params.len();
                params.push(name.clone(), *segment);
                if let Some(route) = child.find_segments(rest, params) {
                    return Some(route);
                }
                params.truncate(mark);
            }
        }

        if let Some(child) = &self.wildcard_child {
            if let (SegmentKind::Wildcard(name), Some(route)) = (&child.kind, &child.route) {
                params.push(name.clone(), segments.join("/"));
                return Some(route);
            }
        }

        None
    }

    /// Depth-first walk over every registered route.
    pub(crate) fn collect<'a>(&'a self, out: &mut Vec<&'a Route<T>>) {
        if let Some(route) = &self.route {
            out.push(route);
        }
        for child in &self.static_children {
            child.collect(out);
        }
        if let Some(child) = &self.param_child {
            child.collect(out);
        }
        if let Some(child) = &self.wildcard_child {
            child.collect(out);
        }
    }
}
