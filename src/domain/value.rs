use chrono::{DateTime, SecondsFormat, Utc};
use std::cell::{Ref, RefCell, RefMut};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

/// 序列化後寫在複合節點上的型別標記欄位
pub const TYPE_TAG: &str = "@@type";

/// 計算屬性在序列化輸出中的前綴
pub const COMPUTED_PREFIX: &str = "@";

/// Shared, interior-mutable handle with pointer identity.
pub struct Shared<T>(Rc<RefCell<T>>);

impl<T> Shared<T> {
    pub fn new(inner: T) -> Self {
        Self(Rc::new(RefCell::new(inner)))
    }

    pub fn borrow(&self) -> Ref<'_, T> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.0.borrow_mut()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

/// Keyed properties of an object node.
///
/// `class` plays the role of prototype identity and survives cloning.
/// `hidden` holds non-enumerable properties: they are skipped by rendering
/// and by cloning unless explicitly requested.
#[derive(Default)]
pub struct NodeData {
    pub class: Option<String>,
    pub properties: BTreeMap<String, Value>,
    pub hidden: BTreeMap<String, Value>,
}

/// An object in the graph. Cloning the handle shares the node.
#[derive(Clone)]
pub struct Node(Rc<RefCell<NodeData>>);

impl Node {
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(NodeData::default())))
    }

    pub fn with_class(class: impl Into<String>) -> Self {
        let node = Self::new();
        node.0.borrow_mut().class = Some(class.into());
        node
    }

    /// 從 (key, value) 配對建立節點
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let node = Self::new();
        for (key, value) in pairs {
            node.set(key, value);
        }
        node
    }

    pub fn class(&self) -> Option<String> {
        self.0.borrow().class.clone()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.borrow().properties.get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.borrow_mut().properties.insert(key.into(), value.into());
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.0.borrow_mut().properties.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.borrow().properties.contains_key(key)
    }

    /// Own enumerable keys, in sorted order.
    pub fn keys(&self) -> Vec<String> {
        self.0.borrow().properties.keys().cloned().collect()
    }

    pub fn entries(&self) -> Vec<(String, Value)> {
        self.0
            .borrow()
            .properties
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().properties.is_empty()
    }

    pub fn set_hidden(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.borrow_mut().hidden.insert(key.into(), value.into());
    }

    pub fn get_hidden(&self, key: &str) -> Option<Value> {
        self.0.borrow().hidden.get(key).cloned()
    }

    pub fn hidden_entries(&self) -> Vec<(String, Value)> {
        self.0
            .borrow()
            .hidden
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// The identity key used by parent resolution. `Null` when absent.
    pub fn id(&self) -> Value {
        self.get("id").unwrap_or(Value::Null)
    }

    pub fn type_tag(&self) -> Option<String> {
        self.get(TYPE_TAG).and_then(|v| v.as_str().map(str::to_string))
    }

    pub fn ptr_eq(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    /// Non-owning handle to this node.
    pub fn downgrade(&self) -> Link {
        Link(Rc::downgrade(&self.0))
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Value::Object(self.clone()).to_json())
    }
}

/// Weak back-edge to an object node.
///
/// Parent references are stored as links so that a serialized graph with
/// back-edges does not keep itself alive.
#[derive(Clone)]
pub struct Link(Weak<RefCell<NodeData>>);

impl Link {
    pub fn upgrade(&self) -> Option<Node> {
        self.0.upgrade().map(Node)
    }

    pub fn points_to(&self, node: &Node) -> bool {
        std::ptr::eq(self.0.as_ptr(), Rc::as_ptr(&node.0))
    }

    pub fn addr(&self) -> usize {
        self.0.as_ptr() as *const () as usize
    }
}

/// Regex value: source, flags and the index where the next match starts.
#[derive(Clone)]
pub struct Pattern {
    source: String,
    flags: String,
    last_index: usize,
    regex: regex::Regex,
}

impl Pattern {
    pub fn new(source: &str, flags: &str) -> std::result::Result<Self, regex::Error> {
        let regex = regex::RegexBuilder::new(source)
            .case_insensitive(flags.contains('i'))
            .multi_line(flags.contains('m'))
            .dot_matches_new_line(flags.contains('s'))
            .build()?;

        Ok(Self {
            source: source.to_string(),
            flags: flags.to_string(),
            last_index: 0,
            regex,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn flags(&self) -> &str {
        &self.flags
    }

    pub fn last_index(&self) -> usize {
        self.last_index
    }

    pub fn set_last_index(&mut self, index: usize) {
        self.last_index = index;
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.regex.is_match(haystack)
    }
}

/// State of a promise-like container.
#[derive(Clone)]
pub enum Settlement {
    Pending,
    Fulfilled(Value),
    Rejected(Value),
}

impl Settlement {
    pub fn is_pending(&self) -> bool {
        matches!(self, Settlement::Pending)
    }
}

type Continuation = Box<dyn FnOnce(&Settlement)>;

struct DeferredState {
    settlement: Settlement,
    continuations: Vec<Continuation>,
}

/// Promise-like container. Settles once; continuations registered while
/// pending run when it does.
#[derive(Clone)]
pub struct Deferred(Rc<RefCell<DeferredState>>);

impl Deferred {
    pub fn new(settlement: Settlement) -> Self {
        Self(Rc::new(RefCell::new(DeferredState {
            settlement,
            continuations: Vec::new(),
        })))
    }

    pub fn settlement(&self) -> Settlement {
        self.0.borrow().settlement.clone()
    }

    /// Settles a pending deferred and runs its continuations. Returns
    /// `false` and changes nothing if it was already settled.
    pub fn settle(&self, settlement: Settlement) -> bool {
        let continuations = {
            let mut state = self.0.borrow_mut();
            if !state.settlement.is_pending() || settlement.is_pending() {
                return false;
            }
            state.settlement = settlement.clone();
            std::mem::take(&mut state.continuations)
        };

        for continuation in continuations {
            continuation(&settlement);
        }
        true
    }

    /// Runs `f` on settlement, or right away if already settled.
    pub fn on_settle(&self, f: impl FnOnce(&Settlement) + 'static) {
        let settled = {
            let mut state = self.0.borrow_mut();
            if state.settlement.is_pending() {
                state.continuations.push(Box::new(f));
                return;
            }
            state.settlement.clone()
        };
        f(&settled);
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ErrorValue {
    pub class: Option<String>,
    pub name: String,
    pub message: String,
}

#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    DateTime(DateTime<Utc>),
    Array(Shared<Vec<Value>>),
    Object(Node),
    Map(Shared<Vec<(Value, Value)>>),
    Set(Shared<Vec<Value>>),
    Bytes(Shared<Vec<u8>>),
    Pattern(Shared<Pattern>),
    Deferred(Deferred),
    Error(Shared<ErrorValue>),
    Link(Link),
}

impl Value {
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Shared::new(items))
    }

    pub fn map(entries: Vec<(Value, Value)>) -> Self {
        Value::Map(Shared::new(entries))
    }

    /// Builds a set, dropping members equal to an earlier one.
    pub fn set(items: Vec<Value>) -> Self {
        let mut members: Vec<Value> = Vec::with_capacity(items.len());
        for item in items {
            if !members.iter().any(|m| m.same_value(&item)) {
                members.push(item);
            }
        }
        Value::Set(Shared::new(members))
    }

    pub fn bytes(data: Vec<u8>) -> Self {
        Value::Bytes(Shared::new(data))
    }

    pub fn pattern(source: &str, flags: &str) -> std::result::Result<Self, regex::Error> {
        Ok(Value::Pattern(Shared::new(Pattern::new(source, flags)?)))
    }

    pub fn deferred(settlement: Settlement) -> Self {
        Value::Deferred(Deferred::new(settlement))
    }

    pub fn error(name: impl Into<String>, message: impl Into<String>) -> Self {
        Value::Error(Shared::new(ErrorValue {
            class: None,
            name: name.into(),
            message: message.into(),
        }))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Primitives are copied by value and never wrapped or tagged.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Value::Null
                | Value::Bool(_)
                | Value::Integer(_)
                | Value::Float(_)
                | Value::String(_)
                | Value::DateTime(_)
        )
    }

    pub fn is_composite(&self) -> bool {
        !self.is_primitive()
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::DateTime(_) => "datetime",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Map(_) => "map",
            Value::Set(_) => "set",
            Value::Bytes(_) => "bytes",
            Value::Pattern(_) => "pattern",
            Value::Deferred(_) => "deferred",
            Value::Error(_) => "error",
            Value::Link(_) => "link",
        }
    }

    /// The object behind this value, following links.
    pub fn as_node(&self) -> Option<Node> {
        match self {
            Value::Object(node) => Some(node.clone()),
            Value::Link(link) => link.upgrade(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    /// Elements of an array or set.
    pub fn elements(&self) -> Option<Vec<Value>> {
        match self {
            Value::Array(items) | Value::Set(items) => Some(items.borrow().clone()),
            _ => None,
        }
    }

    /// Handle address for composites; primitives have no identity.
    pub fn addr(&self) -> Option<usize> {
        match self {
            Value::Array(h) | Value::Set(h) => Some(h.addr()),
            Value::Object(node) => Some(node.addr()),
            Value::Map(h) => Some(h.addr()),
            Value::Bytes(h) => Some(h.addr()),
            Value::Pattern(h) => Some(h.addr()),
            Value::Deferred(h) => Some(h.addr()),
            Value::Error(h) => Some(h.addr()),
            Value::Link(link) => Some(link.addr()),
            _ => None,
        }
    }

    /// Primitive equality by value, composite equality by identity.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self.addr(), other.addr()) {
            (Some(a), Some(b)) => a == b,
            (None, None) => primitive_eq(self, other),
            _ => false,
        }
    }

    /// Text form used by string coercion.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) if f.fract() == 0.0 && f.is_finite() => format!("{}", *f as i64),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
            Value::DateTime(dt) => dt.to_rfc3339_opts(SecondsFormat::Millis, true),
            other => other.to_json().to_string(),
        }
    }

    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::array(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => {
                let node = Node::new();
                for (key, value) in map {
                    node.set(key, Value::from_json(value));
                }
                Value::Object(node)
            }
        }
    }

    /// Renders the graph as JSON. Links and repeated ancestors become
    /// `{ "id": .. }` stubs so cyclic graphs render finitely.
    pub fn to_json(&self) -> serde_json::Value {
        let mut stack = Vec::new();
        self.render(&mut stack)
    }

    fn render(&self, stack: &mut Vec<usize>) -> serde_json::Value {
        use serde_json::Value as Json;

        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Integer(i) => Json::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::String(s) => Json::String(s.clone()),
            Value::DateTime(dt) => Json::String(dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Value::Object(node) => {
                if stack.contains(&node.addr()) {
                    return render_stub(node, stack);
                }
                stack.push(node.addr());
                let map = node
                    .entries()
                    .into_iter()
                    .map(|(k, v)| (k, v.render(stack)))
                    .collect();
                stack.pop();
                Json::Object(map)
            }
            Value::Link(link) => match link.upgrade() {
                Some(node) => render_stub(&node, stack),
                None => Json::Null,
            },
            Value::Array(items) | Value::Set(items) => {
                if stack.contains(&items.addr()) {
                    return Json::Null;
                }
                stack.push(items.addr());
                let elements = items.borrow().iter().map(|v| v.render(stack)).collect();
                stack.pop();
                Json::Array(elements)
            }
            Value::Map(entries) => {
                if stack.contains(&entries.addr()) {
                    return Json::Null;
                }
                stack.push(entries.addr());
                let pairs = entries
                    .borrow()
                    .iter()
                    .map(|(k, v)| Json::Array(vec![k.render(stack), v.render(stack)]))
                    .collect();
                stack.pop();
                Json::Array(pairs)
            }
            Value::Bytes(data) => Json::Array(data.borrow().iter().map(|b| Json::from(*b)).collect()),
            Value::Pattern(p) => {
                let p = p.borrow();
                Json::String(format!("/{}/{}", p.source(), p.flags()))
            }
            Value::Deferred(state) => {
                if stack.contains(&state.addr()) {
                    return Json::Null;
                }
                stack.push(state.addr());
                let rendered = match state.settlement() {
                    Settlement::Pending => Json::Null,
                    Settlement::Fulfilled(v) => v.render(stack),
                    Settlement::Rejected(v) => serde_json::json!({ "rejected": v.render(stack) }),
                };
                stack.pop();
                rendered
            }
            Value::Error(err) => {
                let err = err.borrow();
                serde_json::json!({ "name": err.name, "message": err.message })
            }
        }
    }
}

fn render_stub(node: &Node, stack: &mut Vec<usize>) -> serde_json::Value {
    let mut stub = serde_json::Map::new();
    let id = node.id();
    stub.insert(
        "id".to_string(),
        if id.is_primitive() { id.render(stack) } else { serde_json::Value::Null },
    );
    if let Some(tag) = node.type_tag() {
        stub.insert(TYPE_TAG.to_string(), serde_json::Value::String(tag));
    }
    serde_json::Value::Object(stub)
}

fn primitive_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Integer(x), Value::Integer(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::DateTime(x), Value::DateTime(y)) => x == y,
        _ => false,
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        if self.is_primitive() && other.is_primitive() {
            return primitive_eq(self, other);
        }
        self.same_value(other) || self.to_json() == other.to_json()
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{:?}", s),
            Value::DateTime(dt) => write!(f, "DateTime({})", dt.to_rfc3339()),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(dt: DateTime<Utc>) -> Self {
        Value::DateTime(dt)
    }
}

impl From<Node> for Value {
    fn from(node: Node) -> Self {
        Value::Object(node)
    }
}

impl From<Link> for Value {
    fn from(link: Link) -> Self {
        Value::Link(link)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::array(items)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::from_json(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_round_trip_for_plain_tree() {
        let input = json!({"id": 1, "name": "Ada", "tags": ["a", "b"], "score": 1.5});
        let value = Value::from_json(input.clone());
        assert_eq!(value.to_json(), input);
    }

    #[test]
    fn test_link_renders_as_stub() {
        let user = Node::from_pairs([("id", Value::from(7)), (TYPE_TAG, Value::from("User"))]);
        let post = Node::new();
        post.set("author", user.downgrade());

        assert_eq!(
            Value::Object(post).to_json(),
            json!({"author": {"id": 7, "@@type": "User"}})
        );
    }

    #[test]
    fn test_strong_cycle_renders_finitely() {
        let node = Node::from_pairs([("id", 3)]);
        node.set("self", node.clone());

        assert_eq!(Value::Object(node.clone()).to_json(), json!({"id": 3, "self": {"id": 3}}));
        node.remove("self");
    }

    #[test]
    fn test_dangling_link_is_null() {
        let link = {
            let node = Node::new();
            node.downgrade()
        };
        assert!(link.upgrade().is_none());
        assert_eq!(Value::Link(link).to_json(), serde_json::Value::Null);
    }

    #[test]
    fn test_deferred_settles_once_and_runs_continuations() {
        let deferred = Deferred::new(Settlement::Pending);
        let seen = Rc::new(RefCell::new(Vec::new()));

        let log = Rc::clone(&seen);
        deferred.on_settle(move |s| {
            if let Settlement::Fulfilled(v) = s {
                log.borrow_mut().push(v.clone());
            }
        });
        assert!(seen.borrow().is_empty());

        assert!(deferred.settle(Settlement::Fulfilled(Value::from(5))));
        assert!(!deferred.settle(Settlement::Rejected(Value::from("late"))));
        assert_eq!(*seen.borrow(), vec![Value::from(5)]);

        let log = Rc::clone(&seen);
        deferred.on_settle(move |_| log.borrow_mut().push(Value::Null));
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn test_self_resolving_deferred_renders_finitely() {
        let deferred = Deferred::new(Settlement::Pending);
        let holder = Value::array(vec![Value::Deferred(deferred.clone())]);
        deferred.settle(Settlement::Fulfilled(holder.clone()));

        assert_eq!(Value::Deferred(deferred.clone()).to_json(), json!([null]));
        assert_eq!(holder.to_json(), json!([null]));

        if let Value::Array(items) = &holder {
            items.borrow_mut().clear();
        }
    }

    #[test]
    fn test_primitiveness() {
        assert!(Value::Null.is_primitive());
        assert!(Value::DateTime(Utc::now()).is_primitive());
        assert!(!Value::array(vec![]).is_primitive());
        assert!(!Value::Object(Node::new()).is_primitive());
    }

    #[test]
    fn test_set_drops_duplicates() {
        let shared = Node::new();
        let set = Value::set(vec![
            Value::from(1),
            Value::from(1),
            Value::Object(shared.clone()),
            Value::Object(shared),
        ]);
        assert_eq!(set.elements().unwrap().len(), 2);
    }

    #[test]
    fn test_display_string_trims_integral_floats() {
        assert_eq!(Value::Float(3.0).to_display_string(), "3");
        assert_eq!(Value::Float(2.5).to_display_string(), "2.5");
        assert_eq!(Value::from(true).to_display_string(), "true");
    }
}
