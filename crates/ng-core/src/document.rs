use serde_json::{Map, Value};

/// Protocol name reported in every response
pub const PROTOCOL: &str = "netgraph";
/// Application URL reported in every response
pub const APP: &str = "http://netgraph.qwirx.com/";
/// Protocol version, major and minor
pub const PROTOCOL_VERSION: (u64, u64) = (1, 1);

/// Where a closed scope gets attached: a named member of the enclosing object
struct Parent<'a> {
    members: &'a mut Map<String, Value>,
    name: String,
}

impl Parent<'_> {
    fn attach(&mut self, value: Value) {
        self.members.insert(std::mem::take(&mut self.name), value);
    }
}

/// Anything that holds named members: the document root or an open object scope.
pub trait ObjectBuilder {
    fn members_mut(&mut self) -> &mut Map<String, Value>;

    fn add_string(&mut self, name: &str, value: &str) {
        self.members_mut()
            .insert(name.to_string(), Value::String(value.to_string()));
    }

    fn add_int(&mut self, name: &str, value: u64) {
        self.members_mut().insert(name.to_string(), Value::from(value));
    }

    /// Open a nested object. It is attached to this builder when the returned
    /// scope is dropped, and this builder cannot be touched until then.
    fn begin_object(&mut self, name: &str) -> ObjectScope<'_> {
        ObjectScope {
            parent: Parent {
                members: self.members_mut(),
                name: name.to_string(),
            },
            members: Map::new(),
        }
    }

    /// Open a nested array, attached on drop like [`ObjectBuilder::begin_object`].
    fn begin_array(&mut self, name: &str) -> ArrayScope<'_> {
        ArrayScope {
            parent: Parent {
                members: self.members_mut(),
                name: name.to_string(),
            },
            items: Vec::new(),
        }
    }
}

/// An open object. Closing is dropping.
pub struct ObjectScope<'a> {
    parent: Parent<'a>,
    members: Map<String, Value>,
}

impl ObjectScope<'_> {
    pub fn end(self) {}
}

impl ObjectBuilder for ObjectScope<'_> {
    fn members_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.members
    }
}

impl Drop for ObjectScope<'_> {
    fn drop(&mut self) {
        let members = std::mem::take(&mut self.members);
        self.parent.attach(Value::Object(members));
    }
}

/// An open array. Closing is dropping.
pub struct ArrayScope<'a> {
    parent: Parent<'a>,
    items: Vec<Value>,
}

impl ArrayScope<'_> {
    pub fn push_int(&mut self, value: u64) {
        self.items.push(Value::from(value));
    }

    pub fn end(self) {}
}

impl Drop for ArrayScope<'_> {
    fn drop(&mut self) {
        let items = std::mem::take(&mut self.items);
        self.parent.attach(Value::Array(items));
    }
}

/// The response document. Members are append-only and keep insertion order;
/// the fixed header (`protocol`, `app`, `version`) is present from construction.
#[derive(Debug, Clone)]
pub struct ResultDocument {
    members: Map<String, Value>,
}

impl ResultDocument {
    pub fn new() -> Self {
        let mut doc = Self {
            members: Map::new(),
        };
        doc.add_string("protocol", PROTOCOL);
        doc.add_string("app", APP);

        let mut version = doc.begin_array("version");
        version.push_int(PROTOCOL_VERSION.0);
        version.push_int(PROTOCOL_VERSION.1);
        version.end();

        doc
    }

    pub fn set_error(&mut self, message: &str) {
        self.add_string("error", message);
    }

    /// Serialize the finished document. Every scope has been closed by the
    /// borrow rules by the time this can be called.
    pub fn render(&self, pretty: bool) -> String {
        let root = Value::Object(self.members.clone());
        if pretty {
            format!("{:#}", root)
        } else {
            root.to_string()
        }
    }
}

impl ObjectBuilder for ResultDocument {
    fn members_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.members
    }
}

impl Default for ResultDocument {
    fn default() -> Self {
        Self::new()
    }
}
