use std::collections::HashMap;

/// The routing trie. Maps HTTP paths + methods to registered handlers.
///
/// Patterns use the dispatcher's native placeholder syntax: `:name` captures
/// one segment, `*name` captures every remaining segment joined by `/`.
#[derive(Debug)]
pub struct Router<T> {
    root: Node<T>,
    len: usize,
}

impl<T> Default for Router<T> {
    fn default() -> Self {
        Self {
            root: Node::default(),
            len: 0,
        }
    }
}

/// A single node in the prefix trie.
#[derive(Debug)]
struct Node<T> {
    /// Static children keyed by segment name.
    static_children: HashMap<String, Node<T>>,
    /// Parameter child (at most one per node).
    param_child: Option<Box<Node<T>>>,
    /// Wildcard child — matches all remaining path segments joined by `/`.
    /// Only valid at a terminal position (no further trie nodes after it).
    wildcard_child: Option<Box<Node<T>>>,
    /// Method-to-route mapping at this terminal node.
    methods: HashMap<String, Route<T>>,
}

impl<T> Default for Node<T> {
    fn default() -> Self {
        Self {
            static_children: HashMap::new(),
            param_child: None,
            wildcard_child: None,
            methods: HashMap::new(),
        }
    }
}

/// A registered route at a terminal node.
///
/// Parameter names live on the route rather than on the trie nodes so two
/// patterns sharing a shape (`/pets/:id` and `/pets/:petId/toys`) each report
/// their own names.
#[derive(Debug)]
struct Route<T> {
    param_names: Vec<String>,
    handler: T,
}

/// The result of a route lookup.
#[derive(Debug)]
pub enum RouteMatch<'a, T> {
    /// Matched a path and method.
    Found {
        handler: &'a T,
        params: Vec<(String, String)>,
    },
    /// Path matched but method is not allowed.
    MethodNotAllowed { allowed: Vec<String> },
    /// No path matched.
    NotFound,
}

/// A parsed pattern segment.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Static(String),
    Param(String),
    /// Matches all remaining segments joined by `/`. Must be the last segment.
    Wildcard(String),
}

impl<T> Router<T> {
    /// Create a new empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered (method, pattern) pairs.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert a route into the trie.
    ///
    /// Pattern should look like "/users/:id/orders". Method is matched
    /// case-insensitively. Returns the handler previously registered under the
    /// same method and pattern shape, if any.
    pub fn insert(&mut self, pattern: &str, method: &str, handler: T) -> Option<T> {
        let segments = parse_pattern(pattern);
        let param_names = segments
            .iter()
            .filter_map(|s| match s {
                Segment::Param(name) | Segment::Wildcard(name) => Some(name.clone()),
                Segment::Static(_) => None,
            })
            .collect();

        let node = self.traverse_or_create(&segments);
        let previous = node.methods.insert(
            method.to_uppercase(),
            Route {
                param_names,
                handler,
            },
        );
        if previous.is_none() {
            self.len += 1;
        }
        previous.map(|route| route.handler)
    }

    /// Look up a request path and method.
    ///
    /// Path should be an actual request path (not a pattern).
    pub fn lookup(&self, path: &str, method: &str) -> RouteMatch<'_, T> {
        let normalized = normalize_path(path);
        let segments: Vec<&str> = normalized.split('/').filter(|s| !s.is_empty()).collect();

        let mut values = Vec::new();
        let Some(node) = traverse_and_match(&self.root, &segments, &mut values) else {
            return RouteMatch::NotFound;
        };

        if let Some(route) = node.methods.get(&method.to_uppercase()) {
            let params = route.param_names.iter().cloned().zip(values).collect();
            RouteMatch::Found {
                handler: &route.handler,
                params,
            }
        } else if node.methods.is_empty() {
            RouteMatch::NotFound
        } else {
            let mut allowed: Vec<String> = node.methods.keys().cloned().collect();
            allowed.sort();
            RouteMatch::MethodNotAllowed { allowed }
        }
    }

    /// Traverse or create nodes for a pattern.
    fn traverse_or_create(&mut self, segments: &[Segment]) -> &mut Node<T> {
        let mut current = &mut self.root;

        for segment in segments {
            current = match segment {
                Segment::Static(name) => current.static_children.entry(name.clone()).or_default(),
                Segment::Param(_) => &mut **current.param_child.get_or_insert_with(Box::default),
                Segment::Wildcard(_) => {
                    &mut **current.wildcard_child.get_or_insert_with(Box::default)
                }
            };
        }

        current
    }
}

/// Traverse the trie matching actual path segments, capturing parameter values
/// in order. Returns the terminal node if the path matches, None otherwise.
fn traverse_and_match<'a, T>(
    node: &'a Node<T>,
    segments: &[&str],
    values: &mut Vec<String>,
) -> Option<&'a Node<T>> {
    let Some((segment, remaining)) = segments.split_first() else {
        // Only a node with registered methods ends a match.
        return (!node.methods.is_empty()).then_some(node);
    };

    // Static children take precedence (most specific match).
    if let Some(child) = node.static_children.get(*segment) {
        if let Some(result) = traverse_and_match(child, remaining, values) {
            return Some(result);
        }
    }

    // Try single-segment parameter child.
    if let Some(param_child) = &node.param_child {
        let len = values.len();
        values.push((*segment).to_string());

        if let Some(result) = traverse_and_match(param_child, remaining, values) {
            return Some(result);
        }

        // Backtrack if this path didn't work.
        values.truncate(len);
    }

    // Try wildcard child — consumes all remaining segments (including the current one).
    if let Some(wildcard_child) = &node.wildcard_child {
        if !wildcard_child.methods.is_empty() {
            values.push(segments.join("/"));
            return Some(&**wildcard_child);
        }
    }

    None
}

/// Parse a pattern into segments.
fn parse_pattern(pattern: &str) -> Vec<Segment> {
    pattern
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| {
            if let Some(name) = s.strip_prefix(':') {
                Segment::Param(name.to_string())
            } else if let Some(name) = s.strip_prefix('*') {
                Segment::Wildcard(name.to_string())
            } else {
                Segment::Static(s.to_string())
            }
        })
        .collect()
}

/// Convert an OpenAPI path template to a router pattern: `/pets/{id}` becomes
/// `/pets/:id`.
pub fn template_to_pattern(template: &str) -> String {
    template.replace('{', ":").replace('}', "")
}

/// Shape of a pattern with parameter names erased, e.g. `/users/:/orders`.
///
/// Two patterns with the same shape land on the same trie node.
pub fn pattern_shape(pattern: &str) -> String {
    let mut shape = String::new();
    for segment in parse_pattern(pattern) {
        shape.push('/');
        match segment {
            Segment::Static(name) => shape.push_str(&name),
            Segment::Param(_) => shape.push(':'),
            Segment::Wildcard(_) => shape.push('*'),
        }
    }
    if shape.is_empty() {
        shape.push('/');
    }
    shape
}

/// Normalize a request path: strip trailing slashes, collapse double slashes.
pub fn normalize_path(path: &str) -> String {
    let mut normalized = String::with_capacity(path.len());
    let mut prev_slash = false;

    for ch in path.chars() {
        if ch == '/' {
            if !prev_slash {
                normalized.push('/');
            }
            prev_slash = true;
        } else {
            normalized.push(ch);
            prev_slash = false;
        }
    }

    // Strip trailing slash (but keep root "/")
    if normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }

    if normalized.is_empty() {
        "/".to_string()
    } else {
        normalized
    }
}
