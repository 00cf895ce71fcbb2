use crate::domain::value::{Deferred, Link, Node, Settlement, Shared, Value};

/// Options for [`deep_clone`].
#[derive(Debug, Clone, Copy)]
pub struct CloneOptions {
    /// Re-link repeated references to their existing clone. Turning this off
    /// on a cyclic graph recurses without bound.
    pub circular: bool,
    /// Nesting level past which sub-values are shared instead of copied.
    /// `None` clones everything.
    pub depth: Option<usize>,
    /// Also copy hidden (non-enumerable) properties of object nodes.
    pub include_non_enumerable: bool,
}

impl Default for CloneOptions {
    fn default() -> Self {
        Self {
            circular: true,
            depth: None,
            include_non_enumerable: false,
        }
    }
}

impl CloneOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn without_circular(mut self) -> Self {
        self.circular = false;
        self
    }

    pub fn with_non_enumerable(mut self) -> Self {
        self.include_non_enumerable = true;
        self
    }
}

/// Produces a structurally independent copy of `value`.
///
/// Primitives come back as-is. Composite values are copied recursively;
/// object nodes keep their class. With `circular` set, a value reached twice
/// maps to the same clone, so shared and cyclic structure is preserved.
/// Links whose target was copied anywhere in the graph are re-pointed at
/// that copy; links to values outside the cloned graph are kept. A pending
/// deferred clones to a pending deferred that settles with a copy of the
/// source's eventual outcome.
pub fn deep_clone(value: &Value, options: &CloneOptions) -> Value {
    let mut cloner = Cloner {
        options,
        visited_sources: Vec::new(),
        cloned_targets: Vec::new(),
    };
    let copy = cloner.clone_value(value, options.depth);
    cloner.fix_links();
    copy
}

struct Cloner<'a> {
    options: &'a CloneOptions,
    // parallel lists: cloned_targets[i] is the copy of visited_sources[i]
    visited_sources: Vec<usize>,
    cloned_targets: Vec<Value>,
}

impl Cloner<'_> {
    fn lookup(&self, addr: usize) -> Option<Value> {
        self.visited_sources
            .iter()
            .position(|visited| *visited == addr)
            .map(|index| self.cloned_targets[index].clone())
    }

    fn remember(&mut self, addr: usize, target: &Value) {
        if self.options.circular {
            self.visited_sources.push(addr);
            self.cloned_targets.push(target.clone());
        }
    }

    fn clone_value(&mut self, value: &Value, depth: Option<usize>) -> Value {
        if value.is_primitive() || depth == Some(0) {
            return value.clone();
        }

        if let Value::Link(link) = value {
            return self.relink(link);
        }

        if self.options.circular {
            if let Some(existing) = value.addr().and_then(|addr| self.lookup(addr)) {
                return existing;
            }
        }

        let next = depth.map(|d| d - 1);

        match value {
            Value::Object(node) => self.clone_node(node, next),
            Value::Array(items) => {
                let target = Shared::new(Vec::new());
                self.remember(items.addr(), &Value::Array(target.clone()));
                self.clone_elements(items, &target, next);
                Value::Array(target)
            }
            Value::Set(items) => {
                let target = Shared::new(Vec::new());
                self.remember(items.addr(), &Value::Set(target.clone()));
                self.clone_elements(items, &target, next);
                Value::Set(target)
            }
            Value::Map(entries) => {
                let target = Shared::new(Vec::new());
                self.remember(entries.addr(), &Value::Map(target.clone()));

                let source = entries.borrow().clone();
                for (key, val) in source {
                    let key = self.clone_value(&key, next);
                    let val = self.clone_value(&val, next);
                    target.borrow_mut().push((key, val));
                }
                Value::Map(target)
            }
            Value::Bytes(data) => {
                let copy = Value::Bytes(Shared::new(data.borrow().clone()));
                self.remember(data.addr(), &copy);
                copy
            }
            Value::Pattern(pattern) => {
                // source, flags and last_index carry over
                let copy = Value::Pattern(Shared::new(pattern.borrow().clone()));
                self.remember(pattern.addr(), &copy);
                copy
            }
            Value::Error(err) => {
                let copy = Value::Error(Shared::new(err.borrow().clone()));
                self.remember(err.addr(), &copy);
                copy
            }
            Value::Deferred(state) => {
                let target = Deferred::new(Settlement::Pending);
                self.remember(state.addr(), &Value::Deferred(target.clone()));

                match state.settlement() {
                    Settlement::Pending => {
                        let follower = target.clone();
                        let options = CloneOptions {
                            depth: next,
                            ..*self.options
                        };
                        state.on_settle(move |settled| {
                            let copy = match settled {
                                Settlement::Fulfilled(v) => Settlement::Fulfilled(deep_clone(v, &options)),
                                Settlement::Rejected(v) => Settlement::Rejected(deep_clone(v, &options)),
                                Settlement::Pending => return,
                            };
                            follower.settle(copy);
                        });
                    }
                    Settlement::Fulfilled(v) => {
                        let v = self.clone_value(&v, next);
                        target.settle(Settlement::Fulfilled(v));
                    }
                    Settlement::Rejected(v) => {
                        let v = self.clone_value(&v, next);
                        target.settle(Settlement::Rejected(v));
                    }
                }
                Value::Deferred(target)
            }
            // primitives and links were handled above
            other => other.clone(),
        }
    }

    fn clone_node(&mut self, node: &Node, depth: Option<usize>) -> Value {
        let target = match node.class() {
            Some(class) => Node::with_class(class),
            None => Node::new(),
        };
        self.remember(node.addr(), &Value::Object(target.clone()));

        for (key, value) in node.entries() {
            let copy = self.clone_value(&value, depth);
            target.set(key, copy);
        }

        if self.options.include_non_enumerable {
            for (key, value) in node.hidden_entries() {
                let copy = self.clone_value(&value, depth);
                target.set_hidden(key, copy);
            }
        }

        Value::Object(target)
    }

    fn clone_elements(&mut self, source: &Shared<Vec<Value>>, target: &Shared<Vec<Value>>, depth: Option<usize>) {
        let items = source.borrow().clone();
        for item in items {
            let copy = self.clone_value(&item, depth);
            target.borrow_mut().push(copy);
        }
    }

    fn relink(&self, link: &Link) -> Value {
        match self.lookup(link.addr()).and_then(|target| target.as_node()) {
            Some(node) => Value::Link(node.downgrade()),
            None => Value::Link(link.clone()),
        }
    }

    /// The copy of a link whose source target was cloned after the link
    /// itself was reached.
    fn late_link(&self, value: &Value) -> Option<Value> {
        match value {
            Value::Link(link) => self
                .lookup(link.addr())
                .and_then(|target| target.as_node())
                .map(|node| Value::Link(node.downgrade())),
            _ => None,
        }
    }

    /// Second pass over every copy made, re-pointing links that still
    /// refer into the source graph.
    fn fix_links(&self) {
        for target in &self.cloned_targets {
            match target {
                Value::Object(node) => {
                    for (key, value) in node.entries() {
                        if let Some(link) = self.late_link(&value) {
                            node.set(key, link);
                        }
                    }
                    for (key, value) in node.hidden_entries() {
                        if let Some(link) = self.late_link(&value) {
                            node.set_hidden(key, link);
                        }
                    }
                }
                Value::Array(items) | Value::Set(items) => {
                    for item in items.borrow_mut().iter_mut() {
                        if let Some(link) = self.late_link(item) {
                            *item = link;
                        }
                    }
                }
                Value::Map(entries) => {
                    for (key, value) in entries.borrow_mut().iter_mut() {
                        if let Some(link) = self.late_link(key) {
                            *key = link;
                        }
                        if let Some(link) = self.late_link(value) {
                            *value = link;
                        }
                    }
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> CloneOptions {
        CloneOptions::default()
    }

    #[test]
    fn test_primitives_are_returned_as_is() {
        assert_eq!(deep_clone(&Value::from(5), &options()), Value::from(5));
        assert!(deep_clone(&Value::Null, &options()).is_null());
    }

    #[test]
    fn test_self_reference() {
        let a = Node::from_pairs([("name", "a")]);
        a.set("self", a.clone());

        let b = deep_clone(&Value::Object(a.clone()), &options()).as_node().unwrap();
        assert!(!b.ptr_eq(&a));
        assert!(b.get("self").unwrap().as_node().unwrap().ptr_eq(&b));
        assert_eq!(b.get("name"), Some(Value::from("a")));

        // break the cycles so the test does not leak
        a.remove("self");
        b.remove("self");
    }

    #[test]
    fn test_shared_references_stay_shared() {
        let shared = Node::from_pairs([("id", 1)]);
        let root = Node::new();
        root.set("left", shared.clone());
        root.set("right", shared.clone());

        let copy = deep_clone(&Value::Object(root), &options()).as_node().unwrap();
        let left = copy.get("left").unwrap().as_node().unwrap();
        let right = copy.get("right").unwrap().as_node().unwrap();
        assert!(left.ptr_eq(&right));
        assert!(!left.ptr_eq(&shared));
    }

    #[test]
    fn test_without_circular_duplicates_shared_references() {
        let shared = Node::from_pairs([("id", 1)]);
        let items = Value::array(vec![Value::Object(shared.clone()), Value::Object(shared)]);

        let copy = deep_clone(&items, &options().without_circular()).elements().unwrap();
        assert!(!copy[0].same_value(&copy[1]));
        assert_eq!(copy[0], copy[1]);
    }

    #[test]
    fn test_mutation_does_not_leak_into_clone() {
        let child = Node::from_pairs([("x", 1)]);
        let root = Node::from_pairs([("child", child.clone())]);

        let copy = deep_clone(&Value::Object(root), &options()).as_node().unwrap();
        child.set("x", 2);

        let copied_child = copy.get("child").unwrap().as_node().unwrap();
        assert_eq!(copied_child.get("x"), Some(Value::from(1)));
    }

    #[test]
    fn test_depth_limit_shares_deeper_values() {
        let grandchild = Node::from_pairs([("z", 1)]);
        let child = Node::from_pairs([("grandchild", grandchild.clone())]);
        let root = Node::from_pairs([("child", child.clone())]);

        let copy = deep_clone(&Value::Object(root.clone()), &options().with_depth(2))
            .as_node()
            .unwrap();
        let copied_child = copy.get("child").unwrap().as_node().unwrap();
        assert!(!copied_child.ptr_eq(&child));
        assert!(copied_child
            .get("grandchild")
            .unwrap()
            .as_node()
            .unwrap()
            .ptr_eq(&grandchild));

        let shallow = deep_clone(&Value::Object(root.clone()), &options().with_depth(0));
        assert!(shallow.as_node().unwrap().ptr_eq(&root));
    }

    #[test]
    fn test_class_and_hidden_properties() {
        let node = Node::with_class("Account");
        node.set("id", 9);
        node.set_hidden("secret", "s3cr3t");

        let plain = deep_clone(&Value::Object(node.clone()), &options()).as_node().unwrap();
        assert_eq!(plain.class(), Some("Account".to_string()));
        assert!(plain.get_hidden("secret").is_none());

        let full = deep_clone(&Value::Object(node), &options().with_non_enumerable())
            .as_node()
            .unwrap();
        assert_eq!(full.get_hidden("secret"), Some(Value::from("s3cr3t")));
    }

    #[test]
    fn test_containers() {
        let member = Node::from_pairs([("id", 1)]);
        let map = Value::map(vec![(Value::Object(member.clone()), Value::from("one"))]);
        let set = Value::set(vec![Value::Object(member.clone()), Value::from(2)]);
        let root = Node::from_pairs([("map", map), ("set", set), ("member", Value::Object(member))]);

        let copy = deep_clone(&Value::Object(root), &options()).as_node().unwrap();
        let copied_member = copy.get("member").unwrap();

        let Some(Value::Map(entries)) = copy.get("map") else {
            panic!("map expected");
        };
        let (key, val) = entries.borrow()[0].clone();
        assert!(key.same_value(&copied_member));
        assert_eq!(val, Value::from("one"));

        let set_items = copy.get("set").unwrap().elements().unwrap();
        assert!(set_items[0].same_value(&copied_member));
    }

    #[test]
    fn test_bytes_pattern_error_and_deferred() {
        let bytes = Value::bytes(vec![1, 2, 3]);
        let pattern = Value::pattern("a+b", "gi").unwrap();
        if let Value::Pattern(p) = &pattern {
            p.borrow_mut().set_last_index(4);
        }
        let err = Value::error("TypeError", "boom");
        let payload = Node::from_pairs([("ok", true)]);
        let deferred = Value::deferred(Settlement::Fulfilled(Value::Object(payload.clone())));

        let root = Node::from_pairs([
            ("bytes", bytes.clone()),
            ("pattern", pattern),
            ("err", err),
            ("deferred", deferred),
        ]);
        let copy = deep_clone(&Value::Object(root), &options()).as_node().unwrap();

        let copied_bytes = copy.get("bytes").unwrap();
        assert!(!copied_bytes.same_value(&bytes));
        if let Value::Bytes(data) = &bytes {
            data.borrow_mut()[0] = 9;
        }
        assert_eq!(copied_bytes.to_json(), serde_json::json!([1, 2, 3]));

        let Some(Value::Pattern(p)) = copy.get("pattern") else {
            panic!("pattern expected");
        };
        assert_eq!(p.borrow().source(), "a+b");
        assert_eq!(p.borrow().flags(), "gi");
        assert_eq!(p.borrow().last_index(), 4);
        assert!(p.borrow().is_match("AAB"));

        assert_eq!(
            copy.get("err").unwrap().to_json(),
            serde_json::json!({"name": "TypeError", "message": "boom"})
        );

        let Some(Value::Deferred(state)) = copy.get("deferred") else {
            panic!("deferred expected");
        };
        let Settlement::Fulfilled(resolved) = state.settlement() else {
            panic!("fulfilled expected");
        };
        assert!(!resolved.as_node().unwrap().ptr_eq(&payload));
        assert_eq!(resolved.as_node().unwrap().get("ok"), Some(Value::from(true)));
    }

    #[test]
    fn test_links_follow_cloned_target() {
        let user = Node::from_pairs([("id", 1)]);
        let post = Node::new();
        post.set("author", user.downgrade());
        user.set("posts", Value::array(vec![Value::Object(post)]));

        let copy = deep_clone(&Value::Object(user.clone()), &options()).as_node().unwrap();
        let posts = copy.get("posts").unwrap().elements().unwrap();
        let author = posts[0].as_node().unwrap().get("author").unwrap();

        assert!(matches!(author, Value::Link(_)));
        assert!(author.as_node().unwrap().ptr_eq(&copy));
        assert!(!author.as_node().unwrap().ptr_eq(&user));
    }

    #[test]
    fn test_pending_deferred_follows_source_settlement() {
        let payload = Node::from_pairs([("ok", true)]);
        let source = Deferred::new(Settlement::Pending);

        let copy = deep_clone(&Value::Deferred(source.clone()), &options());
        let Value::Deferred(copy) = copy else {
            panic!("deferred expected");
        };
        assert!(!copy.ptr_eq(&source));
        assert!(copy.settlement().is_pending());

        source.settle(Settlement::Fulfilled(Value::Object(payload.clone())));

        let Settlement::Fulfilled(resolved) = copy.settlement() else {
            panic!("clone should settle with the source");
        };
        let resolved = resolved.as_node().unwrap();
        assert!(!resolved.ptr_eq(&payload));
        assert_eq!(resolved.get("ok"), Some(Value::from(true)));
    }

    #[test]
    fn test_pending_deferred_follows_source_rejection() {
        let source = Deferred::new(Settlement::Pending);
        let Value::Deferred(copy) = deep_clone(&Value::Deferred(source.clone()), &options()) else {
            panic!("deferred expected");
        };

        source.settle(Settlement::Rejected(Value::error("Error", "nope")));
        assert!(matches!(copy.settlement(), Settlement::Rejected(_)));
    }

    #[test]
    fn test_link_reached_before_its_target() {
        let target = Node::from_pairs([("id", 2)]);
        let root = Node::new();
        root.set("a", target.downgrade());
        root.set("b", target.clone());
        root.set("c", Value::array(vec![Value::Link(target.downgrade())]));

        let copy = deep_clone(&Value::Object(root), &options()).as_node().unwrap();
        let copied_target = copy.get("b").unwrap().as_node().unwrap();
        assert!(!copied_target.ptr_eq(&target));

        let a = copy.get("a").unwrap();
        assert!(matches!(a, Value::Link(_)));
        assert!(a.as_node().unwrap().ptr_eq(&copied_target));

        let c = copy.get("c").unwrap().elements().unwrap();
        assert!(c[0].as_node().unwrap().ptr_eq(&copied_target));
    }

    #[test]
    fn test_link_outside_the_graph_is_kept() {
        let outside = Node::from_pairs([("id", 3)]);
        let root = Node::new();
        root.set("ref", outside.downgrade());

        let copy = deep_clone(&Value::Object(root), &options()).as_node().unwrap();
        assert!(copy.get("ref").unwrap().as_node().unwrap().ptr_eq(&outside));
    }
}
