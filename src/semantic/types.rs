use std::collections::HashMap;
use std::fmt;

use crate::ast::TypeExpr;

/// The normalized type system. Equality is structural: derived `PartialEq`
/// already gives us that, since every variant's payload is itself
/// structurally compared.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Type {
    Int,
    Float,
    Bool,
    String,
    Char,
    /// Top-like for assignability: any slot accepts `nul`, and a
    /// `nul`-typed slot accepts one concrete value afterward, narrowing to
    /// it.
    Nul,
    Void,
    Array(Box<Type>),
    Map(Box<Type>, Box<Type>),
    Struct(String),
    Function(Vec<Type>, Box<Type>),
    /// A type name the analyzer couldn't resolve; used so one bad
    /// annotation doesn't cascade into a diagnostic storm.
    Unknown,
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Float => write!(f, "float"),
            Type::Bool => write!(f, "bool"),
            Type::String => write!(f, "string"),
            Type::Char => write!(f, "char"),
            Type::Nul => write!(f, "nul"),
            Type::Void => write!(f, "void"),
            Type::Array(elem) => write!(f, "[{elem}]"),
            Type::Map(k, v) => write!(f, "{{{k}: {v}}}"),
            Type::Struct(name) => write!(f, "{name}"),
            Type::Function(params, ret) => {
                write!(f, "fn(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ") -> {ret}")
            }
            Type::Unknown => write!(f, "<unknown>"),
        }
    }
}

impl Type {
    /// Nul-compatibility: either side is `nul`, or the two types are
    /// structurally equal.
    pub fn compatible(&self, other: &Type) -> bool {
        matches!(self, Type::Nul) || matches!(other, Type::Nul) || self == other
    }
}

/// Resolves user `type` aliases to their canonical form, recursively
/// normalizing array/map containers and detecting alias cycles via a
/// visited-name set.
#[derive(Default)]
pub struct TypeAliasResolver {
    aliases: HashMap<String, TypeExpr>,
    /// Struct names declared so far, so a bare type name can resolve to a
    /// struct type rather than falling through to `Unknown`.
    structs: std::collections::HashSet<String>,
}

impl TypeAliasResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define_alias(&mut self, name: impl Into<String>, type_expr: TypeExpr) {
        self.aliases.insert(name.into(), type_expr);
    }

    pub fn define_struct(&mut self, name: impl Into<String>) {
        self.structs.insert(name.into());
    }

    pub fn is_known_type_name(&self, name: &str) -> bool {
        is_primitive_name(name) || self.aliases.contains_key(name) || self.structs.contains(name)
    }

    pub fn normalize(&self, type_expr: &TypeExpr) -> Type {
        let mut visited = std::collections::HashSet::new();
        self.normalize_inner(type_expr, &mut visited)
    }

    fn normalize_inner(&self, type_expr: &TypeExpr, visited: &mut std::collections::HashSet<String>) -> Type {
        match type_expr {
            TypeExpr::Node { element: Some(element), .. } => {
                Type::Array(Box::new(self.normalize_inner(element, visited)))
            }
            TypeExpr::Node { name, .. } => self.resolve_named(name, visited),
            TypeExpr::Map { key, value, .. } => Type::Map(
                Box::new(self.normalize_inner(key, visited)),
                Box::new(self.normalize_inner(value, visited)),
            ),
        }
    }

    fn resolve_named(&self, name: &str, visited: &mut std::collections::HashSet<String>) -> Type {
        if let Some(primitive) = primitive_type(name) {
            return primitive;
        }
        if let Some(alias_target) = self.aliases.get(name) {
            if !visited.insert(name.to_string()) {
                return Type::Unknown; // cyclic alias chain
            }
            return self.normalize_inner(alias_target, visited);
        }
        if self.structs.contains(name) {
            return Type::Struct(name.to_string());
        }
        Type::Unknown
    }
}

fn is_primitive_name(name: &str) -> bool {
    primitive_type(name).is_some()
}

fn primitive_type(name: &str) -> Option<Type> {
    match name {
        "int" => Some(Type::Int),
        "float" => Some(Type::Float),
        "bool" => Some(Type::Bool),
        "string" => Some(Type::String),
        "char" => Some(Type::Char),
        "nul" => Some(Type::Nul),
        "void" => Some(Type::Void),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Position;
    use crate::lexing::{Token, TokenKind};

    fn tok(name: &str) -> Token {
        Token::new(TokenKind::Identifier, name, Position::start())
    }

    #[test]
    fn resolves_primitive_types_directly() {
        let resolver = TypeAliasResolver::new();
        let type_expr = TypeExpr::named("int", tok("int"));
        assert_eq!(resolver.normalize(&type_expr), Type::Int);
    }

    #[test]
    fn resolves_alias_chain() {
        let mut resolver = TypeAliasResolver::new();
        resolver.define_alias("Age", TypeExpr::named("int", tok("int")));
        resolver.define_alias("Years", TypeExpr::named("Age", tok("Age")));
        let type_expr = TypeExpr::named("Years", tok("Years"));
        assert_eq!(resolver.normalize(&type_expr), Type::Int);
    }

    #[test]
    fn detects_alias_cycle() {
        let mut resolver = TypeAliasResolver::new();
        resolver.define_alias("A", TypeExpr::named("B", tok("B")));
        resolver.define_alias("B", TypeExpr::named("A", tok("A")));
        let type_expr = TypeExpr::named("A", tok("A"));
        assert_eq!(resolver.normalize(&type_expr), Type::Unknown);
    }

    #[test]
    fn normalizes_array_and_map_containers() {
        let resolver = TypeAliasResolver::new();
        let array = TypeExpr::array(TypeExpr::named("int", tok("int")), None, tok("["));
        assert_eq!(resolver.normalize(&array), Type::Array(Box::new(Type::Int)));

        let map = TypeExpr::Map {
            token: tok("{"),
            key: Box::new(TypeExpr::named("string", tok("string"))),
            value: Box::new(TypeExpr::named("int", tok("int"))),
        };
        assert_eq!(resolver.normalize(&map), Type::Map(Box::new(Type::String), Box::new(Type::Int)));
    }
}
