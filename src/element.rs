//! Child descriptions produced by render functions.
//!
//! A description is cheap to clone: children lists are shared behind [`Rc`], so handing the
//! same description to the reconciler twice does not copy the tree below it.

use std::{
    any::Any,
    borrow::Cow,
    cell::Cell,
    collections::BTreeMap,
    fmt,
    rc::Rc,
    sync::atomic::{AtomicU64, Ordering},
};

use parse_display::Display;

use crate::{context::RenderCx, renderer::Event, BoxError, Flags, HostHandle, Signal};


pub type RenderResult = std::result::Result<Child, BoxError>;

/// A function component.
///
/// Identity is the identity of the `Component` value: two clones of one `Component` are the same
/// type for the reconciler, two separately created ones never are.
#[derive(Clone)]
pub struct Component(Rc<ComponentData>);

struct ComponentData {
    name: &'static str,
    render: Box<dyn Fn(&mut RenderCx) -> RenderResult>,
}

impl Component {
    pub fn new(name: &'static str, render: impl Fn(&mut RenderCx) -> RenderResult + 'static) -> Self {
        Self(Rc::new(ComponentData {
            name,
            render: Box::new(render),
        }))
    }
    pub fn name(&self) -> &'static str {
        self.0.name
    }
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
    pub(crate) fn render(&self, cx: &mut RenderCx) -> RenderResult {
        (self.0.render)(cx)
    }

    /// Creates an element invoking this component.
    pub fn element(&self) -> Element {
        Element::with_type(NodeType::Component(self.clone()))
    }
}
impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.0.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display("ctx{0}")]
pub struct ContextId(u64);

impl ContextId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        ContextId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// A typed context key. Values are provided with [`Context::provide`] and read with
/// [`RenderCx::context`].
pub struct Context<T> {
    id: ContextId,
    _value: std::marker::PhantomData<fn() -> T>,
}

impl<T: 'static> Context<T> {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            id: ContextId::next(),
            _value: std::marker::PhantomData,
        }
    }
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Creates a provider element making `value` visible to every descendant.
    pub fn provide(&self, value: T) -> Element {
        Element::with_type(NodeType::Provider(self.id))
            .attr(PROVIDER_VALUE, PropValue::Any(Rc::new(value)))
    }
}
impl<T> Clone for Context<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Context<T> {}

pub(crate) const PROVIDER_VALUE: &str = "value";

/// Which kind of node a description creates.
#[derive(Clone, Debug)]
pub enum NodeType {
    Host(Rc<str>),
    Component(Component),
    Fragment,
    Provider(ContextId),
    Text,
}

impl NodeType {
    /// Whether a node of type `self` may be reused for a description of type `other`.
    pub fn is_same(&self, other: &NodeType) -> bool {
        match (self, other) {
            (NodeType::Host(a), NodeType::Host(b)) => a == b,
            (NodeType::Component(a), NodeType::Component(b)) => a.ptr_eq(b),
            (NodeType::Fragment, NodeType::Fragment) => true,
            (NodeType::Provider(a), NodeType::Provider(b)) => a == b,
            (NodeType::Text, NodeType::Text) => true,
            _ => false,
        }
    }
    pub fn is_host(&self) -> bool {
        matches!(self, NodeType::Host(_) | NodeType::Text)
    }
    pub fn tag(&self) -> Option<&str> {
        match self {
            NodeType::Host(tag) => Some(tag),
            _ => None,
        }
    }
}
impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeType::Host(tag) => write!(f, "<{tag}>"),
            NodeType::Component(c) => write!(f, "{c:?}"),
            NodeType::Fragment => write!(f, "<>"),
            NodeType::Provider(id) => write!(f, "<provider {id}>"),
            NodeType::Text => write!(f, "#text"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub enum Key {
    #[display("{0}")]
    Str(Rc<str>),
    #[display("{0}")]
    Int(i64),
}
impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Str(value.into())
    }
}
impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Str(value.into())
    }
}
impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Int(value)
    }
}
impl From<i32> for Key {
    fn from(value: i32) -> Self {
        Key::Int(value.into())
    }
}
impl From<usize> for Key {
    fn from(value: usize) -> Self {
        Key::Int(value as i64)
    }
}
impl From<char> for Key {
    fn from(value: char) -> Self {
        Key::Str(value.to_string().into())
    }
}

pub type Handler = Rc<dyn Fn(&Event)>;
pub type Style = BTreeMap<Cow<'static, str>, Rc<str>>;

#[derive(Clone)]
pub enum PropValue {
    Str(Rc<str>),
    Num(f64),
    Bool(bool),
    Style(Rc<Style>),
    Handler(Handler),
    /// An attribute patched directly on the host whenever the signal changes.
    Signal(Signal<String>),
    Any(Rc<dyn Any>),
}

impl PropValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Str(s) => Some(s),
            _ => None,
        }
    }
    pub fn as_num(&self) -> Option<f64> {
        match self {
            PropValue::Num(n) => Some(*n),
            PropValue::Str(s) => s.parse().ok(),
            _ => None,
        }
    }
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
    pub fn downcast<T: 'static>(&self) -> Option<Rc<T>> {
        match self {
            PropValue::Any(value) => value.clone().downcast().ok(),
            _ => None,
        }
    }

    /// Attribute text of a scalar value. `None` means the attribute is absent.
    pub fn to_attr(&self) -> Option<String> {
        match self {
            PropValue::Str(s) => Some(s.to_string()),
            PropValue::Num(n) => Some(n.to_string()),
            PropValue::Bool(true) => Some(String::new()),
            PropValue::Bool(false) => None,
            PropValue::Signal(s) => Some(s.peek()),
            PropValue::Style(_) | PropValue::Handler(_) | PropValue::Any(_) => None,
        }
    }
}
impl PartialEq for PropValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PropValue::Str(a), PropValue::Str(b)) => a == b,
            (PropValue::Num(a), PropValue::Num(b)) => a == b,
            (PropValue::Bool(a), PropValue::Bool(b)) => a == b,
            (PropValue::Style(a), PropValue::Style(b)) => a == b,
            (PropValue::Handler(a), PropValue::Handler(b)) => Rc::ptr_eq(a, b),
            (PropValue::Signal(a), PropValue::Signal(b)) => a.ptr_eq(b),
            (PropValue::Any(a), PropValue::Any(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}
impl fmt::Debug for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Str(s) => write!(f, "{s:?}"),
            PropValue::Num(n) => write!(f, "{n}"),
            PropValue::Bool(b) => write!(f, "{b}"),
            PropValue::Style(s) => write!(f, "{s:?}"),
            PropValue::Handler(_) => write!(f, "<handler>"),
            PropValue::Signal(s) => write!(f, "<signal {:?}>", s.peek()),
            PropValue::Any(_) => write!(f, "<any>"),
        }
    }
}
impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Str(value.into())
    }
}
impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Str(value.into())
    }
}
impl From<Rc<str>> for PropValue {
    fn from(value: Rc<str>) -> Self {
        PropValue::Str(value)
    }
}
impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Num(value)
    }
}
impl From<i32> for PropValue {
    fn from(value: i32) -> Self {
        PropValue::Num(value.into())
    }
}
impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}
impl From<Signal<String>> for PropValue {
    fn from(value: Signal<String>) -> Self {
        PropValue::Signal(value)
    }
}

/// Content of a text node.
#[derive(Clone)]
pub enum TextContent {
    Static(Rc<str>),
    /// Text bound to a signal. Compared by signal identity, never by value.
    Signal(Signal<String>),
}
impl TextContent {
    pub fn get(&self) -> String {
        match self {
            TextContent::Static(s) => s.to_string(),
            TextContent::Signal(s) => s.peek(),
        }
    }
}
impl PartialEq for TextContent {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TextContent::Static(a), TextContent::Static(b)) => a == b,
            (TextContent::Signal(a), TextContent::Signal(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}
impl fmt::Debug for TextContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextContent::Static(s) => write!(f, "{s:?}"),
            TextContent::Signal(s) => write!(f, "<signal {:?}>", s.peek()),
        }
    }
}

/// Receives the host handle of the node it is attached to once that node is committed.
#[derive(Clone, Default)]
pub struct NodeRef(Rc<Cell<Option<HostHandle>>>);

impl NodeRef {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn get(&self) -> Option<HostHandle> {
        self.0.get()
    }
    pub(crate) fn set(&self, handle: Option<HostHandle>) {
        self.0.set(handle)
    }
}
impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeRef({:?})", self.get())
    }
}

/// Properties of a node.
///
/// Attributes keep insertion order. `children` is the reserved children slot; it never takes
/// part in [`PartialEq`], the reconciler compares children separately.
#[derive(Clone, Default)]
pub struct Props {
    attrs: Vec<(Cow<'static, str>, PropValue)>,
    pub(crate) children: Rc<Vec<Child>>,
    pub(crate) text: Option<TextContent>,
    pub(crate) inner_html: Option<Rc<str>>,
    pub(crate) node_ref: Option<NodeRef>,
    pub(crate) list_context: bool,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.attrs.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
    pub fn set(&mut self, name: impl Into<Cow<'static, str>>, value: impl Into<PropValue>) {
        let name = name.into();
        let value = value.into();
        if let Some(slot) = self.attrs.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.attrs.push((name, value));
        }
    }
    pub fn remove(&mut self, name: &str) -> Option<PropValue> {
        let index = self.attrs.iter().position(|(n, _)| n == name)?;
        Some(self.attrs.remove(index).1)
    }
    pub fn attrs(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.attrs.iter().map(|(n, v)| (n.as_ref(), v))
    }
    pub fn children(&self) -> &[Child] {
        &self.children
    }
    /// Returns `true` if the children describe at least one node. Empty arrays do not count.
    pub fn has_children(&self) -> bool {
        fn describes_node(child: &Child) -> bool {
            match child {
                Child::Fragment(_) | Child::List(_) => child.iter().any(describes_node),
                _ => !child.is_empty(),
            }
        }
        self.children.iter().any(describes_node)
    }
    pub fn text(&self) -> Option<&TextContent> {
        self.text.as_ref()
    }
    pub fn inner_html(&self) -> Option<&str> {
        self.inner_html.as_deref()
    }
    pub fn node_ref(&self) -> Option<&NodeRef> {
        self.node_ref.as_ref()
    }
    pub(crate) fn signals(&self) -> impl Iterator<Item = (&str, &Signal<String>)> {
        self.attrs().filter_map(|(n, v)| match v {
            PropValue::Signal(s) => Some((n, s)),
            _ => None,
        })
    }
    pub(crate) fn text_signal(&self) -> Option<&Signal<String>> {
        match &self.text {
            Some(TextContent::Signal(s)) => Some(s),
            _ => None,
        }
    }
}
impl PartialEq for Props {
    fn eq(&self, other: &Self) -> bool {
        self.attrs == other.attrs
            && self.text == other.text
            && self.inner_html == other.inner_html
            && self.node_ref == other.node_ref
    }
}
impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_map();
        for (name, value) in &self.attrs {
            d.entry(name, value);
        }
        if let Some(text) = &self.text {
            d.entry(&"#text", text);
        }
        if let Some(html) = &self.inner_html {
            d.entry(&"inner_html", html);
        }
        if !self.children.is_empty() {
            d.entry(&"children", &self.children.len());
        }
        d.finish()
    }
}

/// Description of one node.
#[derive(Clone, Debug)]
pub struct Element {
    pub(crate) ty: NodeType,
    pub(crate) key: Option<Key>,
    pub(crate) props: Props,
    pub(crate) hints: Flags,
}

/// Creates a host element description.
pub fn h(tag: &str) -> Element {
    Element::new(tag)
}

/// Creates a fragment grouping `children` without a host node of its own.
pub fn fragment(children: impl IntoIterator<Item = impl Into<Child>>) -> Element {
    Element::with_type(NodeType::Fragment).children(children)
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self::with_type(NodeType::Host(tag.into()))
    }
    pub fn with_type(ty: NodeType) -> Self {
        Self {
            ty,
            key: None,
            props: Props::default(),
            hints: Flags::empty(),
        }
    }
    pub fn ty(&self) -> &NodeType {
        &self.ty
    }
    pub fn key_ref(&self) -> Option<&Key> {
        self.key.as_ref()
    }
    pub fn props(&self) -> &Props {
        &self.props
    }

    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }
    pub fn attr(mut self, name: impl Into<Cow<'static, str>>, value: impl Into<PropValue>) -> Self {
        self.props.set(name, value);
        self
    }
    /// Attaches an event handler. `event` is the bare event name, such as `"click"`.
    pub fn on(mut self, event: &str, handler: impl Fn(&Event) + 'static) -> Self {
        let handler: Handler = Rc::new(handler);
        self.props.set(format!("on{event}"), PropValue::Handler(handler));
        self
    }
    pub fn style(mut self, name: impl Into<Cow<'static, str>>, value: &str) -> Self {
        let mut style = match self.props.get("style") {
            Some(PropValue::Style(s)) => Style::clone(s),
            _ => Style::new(),
        };
        style.insert(name.into(), value.into());
        self.props.set("style", PropValue::Style(Rc::new(style)));
        self
    }
    pub fn child(mut self, child: impl Into<Child>) -> Self {
        Rc::make_mut(&mut self.props.children).push(child.into());
        self
    }
    pub fn children(mut self, children: impl IntoIterator<Item = impl Into<Child>>) -> Self {
        Rc::make_mut(&mut self.props.children).extend(children.into_iter().map(Into::into));
        self
    }
    /// Sets raw host content. A host element must not combine this with children.
    pub fn inner_html(mut self, html: &str) -> Self {
        self.props.inner_html = Some(html.into());
        self
    }
    pub fn node_ref(mut self, node_ref: &NodeRef) -> Self {
        self.props.node_ref = Some(node_ref.clone());
        self
    }
    /// Skips re-rendering this component when its props did not change.
    pub fn memo(mut self) -> Self {
        self.hints |= Flags::MEMO;
        self
    }
    /// Declares that the props of this host element never change after creation.
    pub fn static_dom(mut self) -> Self {
        self.hints |= Flags::STATIC_DOM;
        self
    }
}

/// One entry of a children description.
#[derive(Clone, Default)]
pub enum Child {
    /// Renders nothing but still occupies its position.
    #[default]
    Empty,
    Text(Rc<str>),
    /// A text node bound to a signal.
    Signal(Signal<String>),
    Element(Element),
    /// A nested array of children.
    Fragment(Rc<Vec<Child>>),
    /// A nested array produced from a collection, where every entry should carry a key.
    List(Rc<Vec<Child>>),
}

impl Child {
    /// Creates a list-context array. Mixing keyed and unkeyed elements in it is diagnosed.
    pub fn list(items: impl IntoIterator<Item = impl Into<Child>>) -> Self {
        Child::List(Rc::new(items.into_iter().map(Into::into).collect()))
    }
    pub fn is_empty(&self) -> bool {
        matches!(self, Child::Empty)
    }
    pub fn key(&self) -> Option<&Key> {
        match self {
            Child::Element(e) => e.key.as_ref(),
            _ => None,
        }
    }

    /// The top-level entries of this description, with nested arrays expanded one level.
    pub fn iter(&self) -> impl Iterator<Item = &Child> {
        use iter_n::iter3::*;
        match self {
            Child::Fragment(items) | Child::List(items) => items.iter().into_iter0(),
            Child::Empty => std::iter::empty::<&Child>().into_iter1(),
            _ => std::iter::once(self).into_iter2(),
        }
    }

    pub(crate) fn as_items(&self) -> (&[Child], bool) {
        match self {
            Child::Fragment(items) => (items, false),
            Child::List(items) => (items, true),
            _ => (std::slice::from_ref(self), false),
        }
    }
}
impl fmt::Debug for Child {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Child::Empty => write!(f, "Empty"),
            Child::Text(s) => write!(f, "{s:?}"),
            Child::Signal(s) => write!(f, "<signal {:?}>", s.peek()),
            Child::Element(e) => e.fmt(f),
            Child::Fragment(items) => f.debug_list().entries(items.iter()).finish(),
            Child::List(items) => write!(f, "list{:?}", items),
        }
    }
}
impl From<Element> for Child {
    fn from(value: Element) -> Self {
        Child::Element(value)
    }
}
impl From<&Component> for Child {
    fn from(value: &Component) -> Self {
        Child::Element(value.element())
    }
}
impl From<&str> for Child {
    fn from(value: &str) -> Self {
        Child::Text(value.into())
    }
}
impl From<String> for Child {
    fn from(value: String) -> Self {
        Child::Text(value.into())
    }
}
impl From<Rc<str>> for Child {
    fn from(value: Rc<str>) -> Self {
        Child::Text(value)
    }
}
impl From<i64> for Child {
    fn from(value: i64) -> Self {
        Child::Text(value.to_string().into())
    }
}
impl From<i32> for Child {
    fn from(value: i32) -> Self {
        Child::Text(value.to_string().into())
    }
}
impl From<usize> for Child {
    fn from(value: usize) -> Self {
        Child::Text(value.to_string().into())
    }
}
impl From<f64> for Child {
    fn from(value: f64) -> Self {
        Child::Text(value.to_string().into())
    }
}
/// `true` and `false` render nothing, so `cond && element` style descriptions work.
impl From<bool> for Child {
    fn from(_: bool) -> Self {
        Child::Empty
    }
}
impl From<()> for Child {
    fn from(_: ()) -> Self {
        Child::Empty
    }
}
impl<T: Into<Child>> From<Option<T>> for Child {
    fn from(value: Option<T>) -> Self {
        value.map_or(Child::Empty, Into::into)
    }
}
impl From<Vec<Child>> for Child {
    fn from(value: Vec<Child>) -> Self {
        Child::Fragment(Rc::new(value))
    }
}
impl From<Signal<String>> for Child {
    fn from(value: Signal<String>) -> Self {
        Child::Signal(value)
    }
}
impl From<&Signal<String>> for Child {
    fn from(value: &Signal<String>) -> Self {
        Child::Signal(value.clone())
    }
}
