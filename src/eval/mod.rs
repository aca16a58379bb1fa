//! The tree-walking evaluator: executes an already-analyzed `ast::Program`
//! against an `Environment`, producing a `Value`. There's no interpreter
//! here to adapt line-for-line, so the scope-chain environment and
//! control-value propagation follow the patterns common to small
//! tree-walking interpreters generally.

pub mod builtin;
pub mod environment;
pub mod evaluator;
pub mod value;

pub use builtin::{BuiltinModuleRegistry, EmptyModuleRegistry};
pub use environment::Environment;
pub use evaluator::Evaluator;
pub use value::{
    is_control_value, ArrayValue, BuiltinFunction, ErrorValue, FunctionValue, MapValue, ModuleValue, StructDefValue,
    StructInstanceValue, Value,
};
