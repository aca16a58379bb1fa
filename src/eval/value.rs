use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::ast::Block;
use crate::common::Position;
use crate::diagnostics::Level;
use crate::eval::environment::Environment;

/// The runtime value sum type. Arrays, maps, and struct instances are
/// `Rc<RefCell<_>>` handles so multiple bindings can share and mutate the
/// same underlying storage; scalars are plain values and copy on clone.
#[derive(Clone)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Char(char),
    Nul,
    Array(Rc<RefCell<ArrayValue>>),
    Map(Rc<RefCell<MapValue>>),
    StructDef(Rc<StructDefValue>),
    StructInstance(Rc<RefCell<StructInstanceValue>>),
    Function(Rc<FunctionValue>),
    Builtin(Rc<BuiltinFunction>),
    BuiltinModule(Rc<ModuleValue>),
    UserModule(Rc<ModuleValue>),
    /// One or more values escaping a function body through `return`;
    /// unwrapped to a single value at the call boundary.
    Return(Vec<Value>),
    Skip,
    Break,
    Error(Rc<ErrorValue>),
}

pub struct ArrayValue {
    pub elements: Vec<Value>,
    pub fixed_size: Option<usize>,
}

pub struct MapValue {
    pub pairs: Vec<(Value, Value)>,
}

/// The shared definition behind every instance: field names (for display
/// and arity bookkeeping) and method closures, captured once when the
/// `struct { ... }` expression is bound to a name.
pub struct StructDefValue {
    pub name: String,
    pub field_names: Vec<String>,
    pub methods: HashMap<String, Rc<FunctionValue>>,
}

pub struct StructInstanceValue {
    pub def: Rc<StructDefValue>,
    pub fields: HashMap<String, Value>,
}

/// A closure: its parameter names, its body, and the environment it was
/// defined in, captured by value at the point the function expression was
/// evaluated.
pub struct FunctionValue {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub has_self: bool,
    pub body: Block,
    pub env: Environment,
}

/// A native callable, opaque to the interpreter core: just a name and a
/// boxed function pointer.
pub struct BuiltinFunction {
    pub name: String,
    pub call: Box<dyn Fn(&[Value]) -> Value>,
}

/// A named attribute bag, shared by built-in and user modules; which
/// variant of `Value` wraps it decides whether `_`-prefixed attributes are
/// filtered (user modules only).
pub struct ModuleValue {
    pub name: String,
    pub attributes: HashMap<String, Value>,
}

pub struct ErrorValue {
    pub message: String,
    pub level: Level,
    pub position: Position,
}

impl Value {
    /// Structural equality: arrays and maps compare by value, struct
    /// instances by identity (two distinct instances are never "equal" even
    /// with matching fields), and if either side is a string the other side
    /// is stringified before comparing.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Nul, Value::Nul) => true,
            (Value::Array(a), Value::Array(b)) => {
                let a = a.borrow();
                let b = b.borrow();
                a.elements.len() == b.elements.len()
                    && a.elements.iter().zip(b.elements.iter()).all(|(x, y)| x.equals(y))
            }
            (Value::Map(a), Value::Map(b)) => {
                let a = a.borrow();
                let b = b.borrow();
                a.pairs.len() == b.pairs.len()
                    && a.pairs
                        .iter()
                        .all(|(k, v)| b.pairs.iter().any(|(k2, v2)| k.equals(k2) && v.equals(v2)))
            }
            (Value::StructInstance(a), Value::StructInstance(b)) => Rc::ptr_eq(a, b),
            (Value::Str(_), _) | (_, Value::Str(_)) => self.to_string() == other.to_string(),
            _ => false,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Str(_) => "string",
            Value::Char(_) => "char",
            Value::Nul => "nul",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::StructDef(_) => "struct definition",
            Value::StructInstance(_) => "struct instance",
            Value::Function(_) => "function",
            Value::Builtin(_) => "built-in function",
            Value::BuiltinModule(_) => "built-in module",
            Value::UserModule(_) => "module",
            Value::Return(_) => "return",
            Value::Skip => "skip",
            Value::Break => "break",
            Value::Error(_) => "error",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Char(c) => write!(f, "{c}"),
            Value::Nul => write!(f, "nul"),
            Value::Array(array) => {
                let array = array.borrow();
                write!(f, "[")?;
                for (i, element) in array.elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{element}")?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                let map = map.borrow();
                write!(f, "{{")?;
                for (i, (key, value)) in map.pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "}}")
            }
            Value::StructDef(def) => write!(f, "<struct {}>", def.name),
            Value::StructInstance(instance) => write!(f, "{}[...]", instance.borrow().def.name),
            Value::Function(function) => match &function.name {
                Some(name) => write!(f, "<fn {name}>"),
                None => write!(f, "<fn>"),
            },
            Value::Builtin(builtin) => write!(f, "<built-in {}>", builtin.name),
            Value::BuiltinModule(module) | Value::UserModule(module) => write!(f, "<module {}>", module.name),
            Value::Return(values) => {
                write!(f, "return ")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{value}")?;
                }
                Ok(())
            }
            Value::Skip => write!(f, "skip"),
            Value::Break => write!(f, "break"),
            Value::Error(error) => write!(f, "{}: {}", error.level, error.message),
        }
    }
}

/// Short-circuit control values propagate instead of being evaluated into
/// further expressions: `Return`, `Break`, `Skip`, and `Error` all stop the
/// containing statement/expression and bubble to whichever construct is
/// waiting for them.
pub fn is_control_value(value: &Value) -> bool {
    matches!(value, Value::Return(_) | Value::Break | Value::Skip | Value::Error(_))
}
