//! Intrinsic functions and pseudo parameters.

use serde::Serialize;
use serde_json::{json, Value};

/// CloudFormation pseudo parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pseudo {
    AccountId,
    Region,
    Partition,
    StackName,
    UrlSuffix,
}

impl Pseudo {
    /// Name as used in a `Ref`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Pseudo::AccountId => "AWS::AccountId",
            Pseudo::Region => "AWS::Region",
            Pseudo::Partition => "AWS::Partition",
            Pseudo::StackName => "AWS::StackName",
            Pseudo::UrlSuffix => "AWS::URLSuffix",
        }
    }
}

/// A template value: a literal or an intrinsic function.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Plain JSON value.
    Literal(Value),
    /// `{"Ref": id}`.
    Ref(String),
    /// `{"Fn::GetAtt": [id, attribute]}`.
    GetAtt { logical_id: String, attribute: String },
    /// `{"Fn::Join": [delimiter, [parts...]]}`.
    Join { delimiter: String, parts: Vec<Expr> },
    /// `{"Fn::Select": [index, list]}`.
    Select { index: usize, list: Box<Expr> },
    /// `{"Fn::GetAZs": region}`; an empty string means the stack's region.
    GetAzs(Box<Expr>),
    /// `{"Fn::Base64": value}`.
    Base64(Box<Expr>),
    /// `{"Fn::ImportValue": name}`.
    ImportValue(Box<Expr>),
    /// JSON array of expressions.
    List(Vec<Expr>),
}

impl Expr {
    /// A literal string.
    pub fn string(s: impl Into<String>) -> Self {
        Expr::Literal(Value::String(s.into()))
    }

    /// A literal of any JSON-convertible type.
    pub fn literal(v: impl Into<Value>) -> Self {
        Expr::Literal(v.into())
    }

    /// Reference to a resource or parameter.
    pub fn reference(logical_id: impl AsRef<str>) -> Self {
        Expr::Ref(logical_id.as_ref().to_string())
    }

    /// Reference to a pseudo parameter.
    pub fn pseudo(pseudo: Pseudo) -> Self {
        Expr::Ref(pseudo.as_str().to_string())
    }

    /// Attribute of a resource.
    pub fn get_att(logical_id: impl AsRef<str>, attribute: &str) -> Self {
        Expr::GetAtt {
            logical_id: logical_id.as_ref().to_string(),
            attribute: attribute.to_string(),
        }
    }

    /// Concatenation with a delimiter.
    pub fn join(delimiter: &str, parts: Vec<Expr>) -> Self {
        Expr::Join {
            delimiter: delimiter.to_string(),
            parts,
        }
    }

    /// Element of a list.
    pub fn select(index: usize, list: Expr) -> Self {
        Expr::Select {
            index,
            list: Box::new(list),
        }
    }

    /// Zones of the stack's own region.
    pub fn azs_of_current_region() -> Self {
        Expr::GetAzs(Box::new(Expr::string("")))
    }

    /// Base64 encoding (used for user data).
    pub fn base64(value: Expr) -> Self {
        Expr::Base64(Box::new(value))
    }

    /// Value exported by another stack.
    pub fn import_value(name: impl Into<String>) -> Self {
        Expr::ImportValue(Box::new(Expr::string(name)))
    }

    /// The literal string, if this is one.
    pub fn as_literal_str(&self) -> Option<&str> {
        match self {
            Expr::Literal(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// The logical id this expression points at, for `Ref` and `Fn::GetAtt`.
    pub fn target(&self) -> Option<&str> {
        match self {
            Expr::Ref(id) if !id.starts_with("AWS::") => Some(id),
            Expr::GetAtt { logical_id, .. } => Some(logical_id),
            _ => None,
        }
    }

    /// Render as template JSON.
    pub fn to_value(&self) -> Value {
        match self {
            Expr::Literal(v) => v.clone(),
            Expr::Ref(id) => json!({ "Ref": id }),
            Expr::GetAtt {
                logical_id,
                attribute,
            } => json!({ "Fn::GetAtt": [logical_id, attribute] }),
            Expr::Join { delimiter, parts } => {
                let parts: Vec<Value> = parts.iter().map(Expr::to_value).collect();
                json!({ "Fn::Join": [delimiter, parts] })
            }
            Expr::Select { index, list } => json!({ "Fn::Select": [index, list.to_value()] }),
            Expr::GetAzs(region) => json!({ "Fn::GetAZs": region.to_value() }),
            Expr::Base64(value) => json!({ "Fn::Base64": value.to_value() }),
            Expr::ImportValue(name) => json!({ "Fn::ImportValue": name.to_value() }),
            Expr::List(items) => Value::Array(items.iter().map(Expr::to_value).collect()),
        }
    }
}

impl From<Expr> for Value {
    fn from(expr: Expr) -> Self {
        expr.to_value()
    }
}

impl From<&Expr> for Value {
    fn from(expr: &Expr) -> Self {
        expr.to_value()
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        Expr::string(s)
    }
}

impl Serialize for Expr {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_value().serialize(serializer)
    }
}

/// A logical id referenced from template JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Reference {
    Ref(String),
    GetAtt(String),
}

/// Collect every `Ref` and `Fn::GetAtt` target below a JSON value.
pub(crate) fn collect_references(value: &Value, out: &mut Vec<Reference>) {
    match value {
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(Value::String(id)) = map.get("Ref") {
                    if !id.starts_with("AWS::") {
                        out.push(Reference::Ref(id.clone()));
                    }
                    return;
                }
                if let Some(Value::Array(args)) = map.get("Fn::GetAtt") {
                    if let Some(Value::String(id)) = args.first() {
                        out.push(Reference::GetAtt(id.clone()));
                    }
                    return;
                }
            }
            for v in map.values() {
                collect_references(v, out);
            }
        }
        Value::Array(items) => {
            for v in items {
                collect_references(v, out);
            }
        }
        _ => {}
    }
}

/// Names of every literal `Fn::ImportValue` below a JSON value.
pub fn import_names(value: &Value) -> Vec<String> {
    let mut out = Vec::new();
    collect_imports(value, &mut out);
    out
}

fn collect_imports(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(name)) = map.get("Fn::ImportValue") {
                out.push(name.clone());
                return;
            }
            for v in map.values() {
                collect_imports(v, out);
            }
        }
        Value::Array(items) => {
            for v in items {
                collect_imports(v, out);
            }
        }
        _ => {}
    }
}
