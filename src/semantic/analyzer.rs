use std::collections::{HashMap, HashSet};

use log::debug;

use crate::ast::{
    is_ignored, Alternative, BinaryOp, Block, Expression, ForBinding, MatchArm, Param, Pattern,
    Program, Statement, StructField, TypeExpr, UnaryOp,
};
use crate::diagnostics::DiagnosticCollector;
use crate::lexing::Token;
use crate::semantic::symbol::{Symbol, SymbolKind, SymbolResolver};
use crate::semantic::types::{Type, TypeAliasResolver};

#[derive(Clone, Default)]
struct StructInfo {
    fields: HashMap<String, Type>,
    methods: HashMap<String, (Vec<Type>, Type)>,
}

/// The combined symbol-building + type-checking pass, walking the program
/// once in source order and sharing one `SymbolResolver` and one
/// `TypeAliasResolver` across every statement.
pub struct Analyzer {
    symbols: SymbolResolver,
    aliases: TypeAliasResolver,
    structs: HashMap<String, StructInfo>,
    /// Declared return type of each function currently being walked, innermost last.
    function_stack: Vec<Type>,
    /// Name of the struct `self` refers to inside the method body currently being walked.
    self_stack: Vec<String>,
    loop_depth: usize,
    diagnostics: DiagnosticCollector,
}

impl Analyzer {
    pub fn new(filename: impl Into<String>, source: &str) -> Self {
        Self {
            symbols: SymbolResolver::new(),
            aliases: TypeAliasResolver::new(),
            structs: HashMap::new(),
            function_stack: Vec::new(),
            self_stack: Vec::new(),
            loop_depth: 0,
            diagnostics: DiagnosticCollector::new(filename, source),
        }
    }

    pub fn analyze(filename: impl Into<String>, source: &str, program: &Program) -> DiagnosticCollector {
        let mut analyzer = Analyzer::new(filename, source);
        for statement in &program.statements {
            analyzer.walk_statement(statement);
        }
        analyzer.diagnostics
    }

    // ---- statements --------------------------------------------------

    fn walk_statement(&mut self, statement: &Statement) {
        match statement {
            Statement::VarDecl { token, mutable, names, type_expr, value } => {
                self.walk_var_decl(token, *mutable, names, type_expr, value)
            }
            Statement::TypeAlias { token, name, type_expr } => self.walk_type_alias(token, name, type_expr),
            Statement::Return { token, values } => self.walk_return(token, values),
            Statement::While { condition, body, .. } => self.walk_while(condition, body),
            Statement::For { binding, iterable, body, .. } => self.walk_for(binding, iterable, body),
            Statement::Scope(block) => self.walk_block_in_new_scope(block),
            Statement::ExpressionStmt { expression, .. } => {
                self.infer_expr(expression);
            }
            Statement::Import { token, path, alias } => self.walk_import(token, path, alias),
            Statement::Break { token } => {
                if self.loop_depth == 0 {
                    self.diagnostics.error(token.position, token.lexeme.clone(), "'break' used outside a loop");
                }
            }
            Statement::Skip { token } => {
                if self.loop_depth == 0 {
                    self.diagnostics.error(token.position, token.lexeme.clone(), "'skip' used outside a loop");
                }
            }
            Statement::Assign(expr) => self.walk_assign(expr),
        }
    }

    fn walk_var_decl(
        &mut self,
        token: &Token,
        mutable: bool,
        names: &[String],
        type_expr: &Option<TypeExpr>,
        value: &Expression,
    ) {
        // Functions bound to a single name are pre-registered under that
        // name *before* their body is walked, so a recursive call inside
        // the body resolves back to the binding being defined.
        if let Expression::Function { token: fn_token, params, has_self, return_type, body } = value {
            if names.len() == 1 {
                self.walk_named_function_decl(token, mutable, &names[0], fn_token, params, *has_self, return_type, body);
                return;
            }
        }

        let inferred = match value {
            Expression::StructDef { token: struct_token, fields } if names.len() == 1 => {
                self.infer_struct_def_named(&names[0], struct_token, fields)
            }
            _ => self.infer_expr(value),
        };

        let declared = type_expr.as_ref().map(|te| self.aliases.normalize(te));
        if let Some(declared_ty) = &declared {
            if !declared_ty.compatible(&inferred) {
                self.diagnostics.error(
                    token.position,
                    token.lexeme.clone(),
                    format!("type mismatch: declared {declared_ty} but value is {inferred}"),
                );
            }
        }
        let final_type = declared.unwrap_or(inferred);

        let kind = match value {
            Expression::StructDef { .. } => SymbolKind::Struct,
            _ => SymbolKind::Variable,
        };
        if matches!(kind, SymbolKind::Struct) && mutable {
            self.diagnostics.error(
                token.position,
                token.lexeme.clone(),
                "function and struct bindings must be immutable",
            );
        }

        for name in names {
            if let Err(message) = self.symbols.define(Symbol {
                name: name.clone(),
                kind,
                declared_type: final_type.clone(),
                mutable,
                depth: 0,
            }) {
                self.diagnostics.error(token.position, name.clone(), message);
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn walk_named_function_decl(
        &mut self,
        decl_token: &Token,
        mutable: bool,
        name: &str,
        fn_token: &Token,
        params: &[Param],
        has_self: bool,
        return_type: &Option<TypeExpr>,
        body: &Block,
    ) {
        if mutable {
            self.diagnostics.error(
                decl_token.position,
                decl_token.lexeme.clone(),
                "function and struct bindings must be immutable",
            );
        }

        let param_types: Vec<Type> = params.iter().map(|p| self.aliases.normalize(&p.type_expr)).collect();
        let declared_return = return_type.as_ref().map(|te| self.aliases.normalize(te)).unwrap_or(Type::Void);
        let signature = Type::Function(param_types, Box::new(declared_return));

        if let Err(message) = self.symbols.define(Symbol {
            name: name.to_string(),
            kind: SymbolKind::Function,
            declared_type: signature,
            mutable: false,
            depth: 0,
        }) {
            self.diagnostics.error(decl_token.position, name.to_string(), message);
        }

        self.infer_function(fn_token, params, has_self, return_type, body, None);
    }

    fn walk_type_alias(&mut self, token: &Token, name: &str, type_expr: &TypeExpr) {
        self.validate_referenced_types(type_expr);
        self.aliases.define_alias(name.to_string(), type_expr.clone());
        if let Err(message) = self.symbols.define(Symbol {
            name: name.to_string(),
            kind: SymbolKind::TypeAlias,
            declared_type: Type::Unknown,
            mutable: false,
            depth: 0,
        }) {
            self.diagnostics.error(token.position, name.to_string(), message);
        }
    }

    /// Walks a type expression's named references to confirm every one
    /// refers to a type that's already been declared.
    fn validate_referenced_types(&mut self, type_expr: &TypeExpr) {
        match type_expr {
            TypeExpr::Node { element: Some(element), .. } => {
                self.validate_referenced_types(element);
            }
            TypeExpr::Node { token, name, element: None, .. } => {
                if !self.aliases.is_known_type_name(name) {
                    self.diagnostics.error(token.position, name.clone(), format!("unknown type '{name}'"));
                }
            }
            TypeExpr::Map { key, value, .. } => {
                self.validate_referenced_types(key);
                self.validate_referenced_types(value);
            }
        }
    }

    fn walk_return(&mut self, token: &Token, values: &[Expression]) {
        if self.function_stack.is_empty() {
            self.diagnostics.error(token.position, token.lexeme.clone(), "'return' used outside a function");
        }

        let inferred = if values.is_empty() {
            Type::Void
        } else {
            let types: Vec<Type> = values.iter().map(|v| self.infer_expr(v)).collect();
            types.into_iter().next().expect("non-empty values")
        };

        if let Some(expected) = self.function_stack.last().cloned() {
            if !expected.compatible(&inferred) {
                self.diagnostics.error(
                    token.position,
                    token.lexeme.clone(),
                    format!("return type mismatch: expected {expected}, found {inferred}"),
                );
            }
        }
    }

    fn walk_while(&mut self, condition: &Expression, body: &Block) {
        let condition_ty = self.infer_expr(condition);
        if !matches!(condition_ty, Type::Bool | Type::Nul | Type::Unknown) {
            self.diagnostics.error(
                condition.token().position,
                condition.token().lexeme.clone(),
                format!("while-condition must be boolean, found {condition_ty}"),
            );
        }
        self.loop_depth += 1;
        self.walk_block_in_new_scope(body);
        self.loop_depth -= 1;
    }

    fn walk_for(&mut self, binding: &ForBinding, iterable: &Expression, body: &Block) {
        let iterable_ty = self.infer_expr(iterable);
        let (element_ty, index_ty) = match &iterable_ty {
            Type::Array(elem) => ((**elem).clone(), Type::Int),
            Type::String => (Type::Char, Type::Int),
            Type::Map(key, value) => ((**key).clone(), (**value).clone()),
            Type::Unknown => (Type::Unknown, Type::Unknown),
            other => {
                self.diagnostics.error(
                    iterable.token().position,
                    iterable.token().lexeme.clone(),
                    format!("{other} is not iterable"),
                );
                (Type::Unknown, Type::Unknown)
            }
        };

        let handle = self.symbols.enter_scope();
        match binding {
            ForBinding::Single(name) => {
                if !is_ignored(name) {
                    let _ = self.symbols.define(Symbol {
                        name: name.clone(),
                        kind: SymbolKind::LoopBound,
                        declared_type: element_ty,
                        mutable: false,
                        depth: 0,
                    });
                }
            }
            ForBinding::Pair(first, second) => {
                if !is_ignored(first) {
                    let _ = self.symbols.define(Symbol {
                        name: first.clone(),
                        kind: SymbolKind::LoopBound,
                        declared_type: element_ty,
                        mutable: false,
                        depth: 0,
                    });
                }
                if !is_ignored(second) {
                    let _ = self.symbols.define(Symbol {
                        name: second.clone(),
                        kind: SymbolKind::LoopBound,
                        declared_type: index_ty,
                        mutable: false,
                        depth: 0,
                    });
                }
            }
        }

        self.loop_depth += 1;
        for statement in &body.statements {
            self.walk_statement(statement);
        }
        self.loop_depth -= 1;
        self.symbols.exit_scope(handle);
    }

    fn walk_import(&mut self, token: &Token, path: &str, alias: &Option<String>) {
        let name = alias.clone().unwrap_or_else(|| module_local_name(path));
        if let Err(message) = self.symbols.define(Symbol {
            name,
            kind: SymbolKind::Variable,
            declared_type: Type::Unknown,
            mutable: false,
            depth: 0,
        }) {
            self.diagnostics.error(token.position, token.lexeme.clone(), message);
        }
    }

    fn walk_assign(&mut self, expr: &Expression) {
        let Expression::Assign { token, target, value, .. } = expr else {
            unreachable!("Statement::Assign always wraps an Expression::Assign");
        };
        let value_ty = self.infer_expr(value);
        match target.as_ref() {
            Expression::Identifier { name, token: id_token } => match self.symbols.resolve(name).cloned() {
                Some(symbol) => {
                    if !symbol.mutable {
                        self.diagnostics.error(
                            id_token.position,
                            name.clone(),
                            format!("'{name}' can't be mutated, defined as const"),
                        );
                    } else if !symbol.declared_type.compatible(&value_ty) {
                        self.diagnostics.error(
                            id_token.position,
                            name.clone(),
                            format!("type mismatch assigning {value_ty} to '{name}' of type {}", symbol.declared_type),
                        );
                    } else if symbol.declared_type == Type::Nul && value_ty != Type::Nul && value_ty != Type::Unknown {
                        // A nul-declared binding accepts one concrete value, after
                        // which it's typed to that value; narrow it here so a
                        // later assignment of a *different* concrete type is
                        // rejected instead of silently accepted forever.
                        self.symbols.narrow(name, value_ty);
                    }
                }
                None => {
                    self.diagnostics.error(id_token.position, name.clone(), format!("'{name}' is not declared"));
                }
            },
            Expression::Index { target: inner, index, token: idx_token } => {
                let target_ty = self.infer_expr(inner);
                let index_ty = self.infer_expr(index);
                self.check_index_types(&target_ty, &index_ty, idx_token);
            }
            Expression::Member { receiver, property, token: member_token } => {
                self.infer_member(member_token, receiver, property);
            }
            _ => {
                self.diagnostics.error(
                    token.position,
                    token.lexeme.clone(),
                    "left-hand side of assignment is not assignable",
                );
            }
        }
    }

    fn walk_block_in_new_scope(&mut self, block: &Block) {
        let handle = self.symbols.enter_scope();
        for statement in &block.statements {
            self.walk_statement(statement);
        }
        self.symbols.exit_scope(handle);
    }

    /// A block used in expression position (if/else arms) evaluates to its
    /// last expression-statement's value, else `nul` — mirrored here so the
    /// analyzer's static type matches what the evaluator produces.
    fn infer_block_value(&mut self, block: &Block) -> Type {
        let handle = self.symbols.enter_scope();
        let mut result = Type::Nul;
        for (index, statement) in block.statements.iter().enumerate() {
            let is_last = index + 1 == block.statements.len();
            if is_last {
                if let Statement::ExpressionStmt { expression, .. } = statement {
                    result = self.infer_expr(expression);
                    continue;
                }
            }
            self.walk_statement(statement);
        }
        self.symbols.exit_scope(handle);
        result
    }

    // ---- expressions ---------------------------------------------------

    fn infer_expr(&mut self, expr: &Expression) -> Type {
        match expr {
            Expression::Int { .. } => Type::Int,
            Expression::Float { .. } => Type::Float,
            Expression::Bool { .. } => Type::Bool,
            Expression::Str { .. } => Type::String,
            Expression::Char { .. } => Type::Char,
            Expression::Nul { .. } => Type::Nul,
            Expression::Identifier { name, token } => match self.symbols.resolve(name) {
                Some(symbol) => symbol.declared_type.clone(),
                None => {
                    self.diagnostics.error(token.position, name.clone(), format!("'{name}' is not declared"));
                    Type::Unknown
                }
            },
            Expression::Unary { token, operator, operand } => self.infer_unary(token, *operator, operand),
            Expression::Binary { token, operator, left, right } => self.infer_binary(token, *operator, left, right),
            Expression::If { token, condition, consequence, alternative } => {
                self.infer_if(token, condition, consequence, alternative)
            }
            Expression::Function { token, params, has_self, return_type, body } => {
                self.infer_function(token, params, *has_self, return_type, body, None)
            }
            Expression::Call { token, callee, arguments } => self.infer_call(token, callee, arguments),
            Expression::Index { token, target, index } => self.infer_index(token, target, index),
            Expression::RangeIndex { target, start, end, .. } => {
                let target_ty = self.infer_expr(target);
                if let Some(s) = start {
                    self.infer_expr(s);
                }
                if let Some(e) = end {
                    self.infer_expr(e);
                }
                target_ty
            }
            Expression::Range { start, end, .. } => {
                self.infer_expr(start);
                self.infer_expr(end);
                Type::Array(Box::new(Type::Int))
            }
            Expression::Member { token, receiver, property } => self.infer_member(token, receiver, property),
            Expression::StructDef { token, .. } => {
                self.diagnostics.error(
                    token.position,
                    token.lexeme.clone(),
                    "struct definitions must be bound to a name",
                );
                Type::Unknown
            }
            Expression::StructInstance { token, name, fields } => self.infer_struct_instance(token, name, fields),
            Expression::Array { token, elements, .. } => self.infer_array(token, elements),
            Expression::Map { token, pairs } => self.infer_map(token, pairs),
            Expression::Match { token, subject, arms } => self.infer_match(token, subject, arms),
            Expression::Assign { token, .. } => {
                self.diagnostics.error(token.position, token.lexeme.clone(), "assignment cannot be used as a value");
                Type::Unknown
            }
        }
    }

    fn infer_unary(&mut self, token: &Token, operator: UnaryOp, operand: &Expression) -> Type {
        let ty = self.infer_expr(operand);
        match operator {
            UnaryOp::Not => {
                if !matches!(ty, Type::Bool | Type::Nul | Type::Unknown) {
                    self.diagnostics.error(
                        token.position,
                        token.lexeme.clone(),
                        format!("'!' requires a boolean operand, found {ty}"),
                    );
                }
                Type::Bool
            }
            UnaryOp::Negate => {
                if !matches!(ty, Type::Int | Type::Float | Type::Unknown) {
                    self.diagnostics.error(
                        token.position,
                        token.lexeme.clone(),
                        format!("unary '-' requires a numeric operand, found {ty}"),
                    );
                }
                ty
            }
            UnaryOp::BitNot => ty,
        }
    }

    fn infer_binary(&mut self, token: &Token, operator: BinaryOp, left: &Expression, right: &Expression) -> Type {
        let left_ty = self.infer_expr(left);
        let right_ty = self.infer_expr(right);
        let unknown = left_ty == Type::Unknown || right_ty == Type::Unknown;

        match operator {
            BinaryOp::And | BinaryOp::Or => {
                if !unknown && (left_ty != Type::Bool || right_ty != Type::Bool) {
                    self.diagnostics.error(token.position, token.lexeme.clone(), "logical operators require boolean operands");
                }
                Type::Bool
            }
            BinaryOp::Equal
            | BinaryOp::NotEqual
            | BinaryOp::LessThan
            | BinaryOp::LessEqual
            | BinaryOp::GreaterThan
            | BinaryOp::GreaterEqual => {
                if !unknown && !left_ty.compatible(&right_ty) {
                    self.diagnostics.error(
                        token.position,
                        token.lexeme.clone(),
                        format!("cannot compare {left_ty} with {right_ty}"),
                    );
                }
                Type::Bool
            }
            BinaryOp::Add => {
                if left_ty == Type::String || right_ty == Type::String {
                    Type::String
                } else if !unknown && left_ty == right_ty && matches!(left_ty, Type::Int | Type::Float) {
                    left_ty
                } else if unknown {
                    Type::Unknown
                } else {
                    self.diagnostics.error(
                        token.position,
                        token.lexeme.clone(),
                        format!("'+' is not defined for {left_ty} and {right_ty}"),
                    );
                    Type::Unknown
                }
            }
            BinaryOp::Subtract | BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Modulo => {
                if unknown {
                    Type::Unknown
                } else if left_ty == right_ty && matches!(left_ty, Type::Int | Type::Float) {
                    if operator == BinaryOp::Divide {
                        Type::Float
                    } else {
                        left_ty
                    }
                } else {
                    self.diagnostics.error(
                        token.position,
                        token.lexeme.clone(),
                        format!("arithmetic requires matching numeric operands, found {left_ty} and {right_ty}"),
                    );
                    Type::Unknown
                }
            }
        }
    }

    fn infer_if(
        &mut self,
        token: &Token,
        condition: &Expression,
        consequence: &Block,
        alternative: &Option<Box<Alternative>>,
    ) -> Type {
        let condition_ty = self.infer_expr(condition);
        if !matches!(condition_ty, Type::Bool | Type::Nul | Type::Unknown) {
            self.diagnostics.error(
                token.position,
                token.lexeme.clone(),
                format!("if-condition must be boolean, found {condition_ty}"),
            );
        }

        let consequence_ty = self.infer_block_value(consequence);
        match alternative {
            None => Type::Nul,
            Some(alt) => {
                let alternative_ty = match alt.as_ref() {
                    Alternative::Block(block) => self.infer_block_value(block),
                    Alternative::If(inner) => self.infer_expr(inner),
                };
                if !consequence_ty.compatible(&alternative_ty) {
                    self.diagnostics.error(
                        token.position,
                        token.lexeme.clone(),
                        format!("if/else branches have incompatible types: {consequence_ty} vs {alternative_ty}"),
                    );
                }
                consequence_ty
            }
        }
    }

    fn infer_function(
        &mut self,
        token: &Token,
        params: &[Param],
        has_self: bool,
        return_type: &Option<TypeExpr>,
        body: &Block,
        self_struct: Option<String>,
    ) -> Type {
        let handle = self.symbols.enter_scope();

        if has_self {
            let self_type = self_struct.clone().map(Type::Struct).unwrap_or(Type::Unknown);
            let _ = self.symbols.define(Symbol {
                name: "self".to_string(),
                kind: SymbolKind::Parameter,
                declared_type: self_type,
                mutable: true,
                depth: 0,
            });
        }

        let mut param_types = Vec::with_capacity(params.len());
        for param in params {
            let ty = self.aliases.normalize(&param.type_expr);
            param_types.push(ty.clone());
            if let Err(message) = self.symbols.define(Symbol {
                name: param.name.clone(),
                kind: SymbolKind::Parameter,
                declared_type: ty,
                mutable: true,
                depth: 0,
            }) {
                self.diagnostics.error(param.type_expr.token().position, param.name.clone(), message);
            }
        }

        let declared_return = return_type.as_ref().map(|te| self.aliases.normalize(te)).unwrap_or(Type::Void);
        self.function_stack.push(declared_return.clone());
        if let Some(name) = &self_struct {
            self.self_stack.push(name.clone());
        }

        for statement in &body.statements {
            self.walk_statement(statement);
        }

        if declared_return != Type::Void && !matches!(body.statements.last(), Some(Statement::Return { .. })) {
            self.diagnostics.error(
                token.position,
                token.lexeme.clone(),
                format!("function must end with a return of type {declared_return}"),
            );
        }

        if self_struct.is_some() {
            self.self_stack.pop();
        }
        self.function_stack.pop();
        self.symbols.exit_scope(handle);

        Type::Function(param_types, Box::new(declared_return))
    }

    fn infer_call(&mut self, token: &Token, callee: &Expression, arguments: &[Expression]) -> Type {
        let callee_ty = self.infer_expr(callee);
        let argument_types: Vec<Type> = arguments.iter().map(|arg| self.infer_expr(arg)).collect();

        match callee_ty {
            Type::Function(params, ret) => {
                if params.len() != arguments.len() {
                    self.diagnostics.error(
                        token.position,
                        token.lexeme.clone(),
                        format!("expected {} argument(s), found {}", params.len(), arguments.len()),
                    );
                } else {
                    for ((param_ty, arg_ty), arg) in params.iter().zip(argument_types.iter()).zip(arguments.iter()) {
                        if !param_ty.compatible(arg_ty) {
                            self.diagnostics.error(
                                arg.token().position,
                                arg.token().lexeme.clone(),
                                format!("argument type mismatch: expected {param_ty}, found {arg_ty}"),
                            );
                        }
                    }
                }
                *ret
            }
            Type::Unknown => Type::Unknown,
            other => {
                self.diagnostics.error(token.position, token.lexeme.clone(), format!("cannot call a value of type {other}"));
                Type::Unknown
            }
        }
    }

    fn infer_index(&mut self, token: &Token, target: &Expression, index: &Expression) -> Type {
        let target_ty = self.infer_expr(target);
        let index_ty = self.infer_expr(index);
        self.check_index_types(&target_ty, &index_ty, token)
    }

    fn check_index_types(&mut self, target_ty: &Type, index_ty: &Type, token: &Token) -> Type {
        match target_ty {
            Type::Array(element) => {
                if *index_ty != Type::Int && *index_ty != Type::Unknown {
                    self.diagnostics.error(
                        token.position,
                        token.lexeme.clone(),
                        format!("array index must be int, found {index_ty}"),
                    );
                }
                (**element).clone()
            }
            Type::String => {
                if *index_ty != Type::Int && *index_ty != Type::Unknown {
                    self.diagnostics.error(
                        token.position,
                        token.lexeme.clone(),
                        format!("string index must be int, found {index_ty}"),
                    );
                }
                Type::Char
            }
            Type::Map(key, value) => {
                if !key.compatible(index_ty) {
                    self.diagnostics.error(
                        token.position,
                        token.lexeme.clone(),
                        format!("map key must be {key}, found {index_ty}"),
                    );
                }
                (**value).clone()
            }
            Type::Unknown => Type::Unknown,
            other => {
                self.diagnostics.error(token.position, token.lexeme.clone(), format!("cannot index into a value of type {other}"));
                Type::Unknown
            }
        }
    }

    fn infer_member(&mut self, token: &Token, receiver: &Expression, property: &str) -> Type {
        let receiver_ty = self.infer_expr(receiver);
        match &receiver_ty {
            Type::Struct(name) => {
                if property.starts_with('_') {
                    let allowed = self.self_stack.last().is_some_and(|s| s == name);
                    if !allowed {
                        self.diagnostics.error(
                            token.position,
                            property.to_string(),
                            format!("'{property}' is private to struct '{name}'"),
                        );
                    }
                }
                match self.structs.get(name).cloned() {
                    Some(info) => {
                        if let Some(field_ty) = info.fields.get(property) {
                            field_ty.clone()
                        } else if let Some((params, ret)) = info.methods.get(property) {
                            Type::Function(params.clone(), Box::new(ret.clone()))
                        } else {
                            self.diagnostics.error(
                                token.position,
                                property.to_string(),
                                format!("struct '{name}' has no member '{property}'"),
                            );
                            Type::Unknown
                        }
                    }
                    None => Type::Unknown,
                }
            }
            Type::Unknown => Type::Unknown,
            other => {
                self.diagnostics.error(
                    token.position,
                    property.to_string(),
                    format!("cannot access member '{property}' on a value of type {other}"),
                );
                Type::Unknown
            }
        }
    }

    fn infer_struct_def_named(&mut self, name: &str, token: &Token, fields: &[StructField]) -> Type {
        self.aliases.define_struct(name.to_string());
        let handle = self.symbols.enter_scope();

        let mut seen = HashSet::new();
        let mut field_types = HashMap::new();
        let mut method_signatures = HashMap::new();

        for field in fields {
            let field_name = match field {
                StructField::Data { name, .. } => name,
                StructField::Method { name, .. } => name,
            };
            if !seen.insert(field_name.clone()) {
                self.diagnostics.error(
                    token.position,
                    field_name.clone(),
                    format!("duplicate field '{field_name}' in struct '{name}'"),
                );
            }

            match field {
                StructField::Data { name: field_name, type_expr } => {
                    field_types.insert(field_name.clone(), self.aliases.normalize(type_expr));
                }
                StructField::Method { name: method_name, function } => {
                    if let Expression::Function { token: fn_token, params, has_self, return_type, body } = function {
                        let fn_ty =
                            self.infer_function(fn_token, params, *has_self, return_type, body, Some(name.to_string()));
                        if let Type::Function(param_types, return_ty) = fn_ty {
                            method_signatures.insert(method_name.clone(), (param_types, *return_ty));
                        }
                    }
                }
            }
        }

        self.symbols.exit_scope(handle);
        debug!("registered struct '{name}' with {} field(s), {} method(s)", field_types.len(), method_signatures.len());
        self.structs.insert(
            name.to_string(),
            StructInfo { fields: field_types, methods: method_signatures },
        );
        Type::Struct(name.to_string())
    }

    fn infer_struct_instance(&mut self, token: &Token, name: &str, fields: &[(String, Expression)]) -> Type {
        let Some(info) = self.structs.get(name).cloned() else {
            self.diagnostics.error(token.position, name.to_string(), format!("'{name}' is not a declared struct"));
            for (_, value) in fields {
                self.infer_expr(value);
            }
            return Type::Unknown;
        };

        let mut provided = HashSet::new();
        for (field_name, value) in fields {
            let value_ty = self.infer_expr(value);
            if info.methods.contains_key(field_name) {
                self.diagnostics.error(
                    token.position,
                    field_name.clone(),
                    format!("'{field_name}' is a method, not a settable field"),
                );
            } else {
                match info.fields.get(field_name) {
                    Some(expected) => {
                        if !expected.compatible(&value_ty) {
                            self.diagnostics.error(
                                token.position,
                                field_name.clone(),
                                format!("field '{field_name}' expects {expected}, found {value_ty}"),
                            );
                        }
                    }
                    None => {
                        self.diagnostics.error(
                            token.position,
                            field_name.clone(),
                            format!("struct '{name}' has no field '{field_name}'"),
                        );
                    }
                }
            }
            provided.insert(field_name.clone());
        }

        for required in info.fields.keys() {
            if !provided.contains(required) {
                self.diagnostics.error(token.position, name.to_string(), format!("missing field '{required}' in '{name}' instance"));
            }
        }

        Type::Struct(name.to_string())
    }

    fn infer_array(&mut self, token: &Token, elements: &[Expression]) -> Type {
        if elements.is_empty() {
            return Type::Array(Box::new(Type::Unknown));
        }
        let first_ty = self.infer_expr(&elements[0]);
        for element in &elements[1..] {
            let element_ty = self.infer_expr(element);
            if element_ty != first_ty && element_ty != Type::Unknown && first_ty != Type::Unknown {
                self.diagnostics.error(
                    token.position,
                    token.lexeme.clone(),
                    format!("array elements must share one type: found {first_ty} and {element_ty}"),
                );
            }
        }
        Type::Array(Box::new(first_ty))
    }

    fn infer_map(&mut self, token: &Token, pairs: &[(Expression, Expression)]) -> Type {
        if pairs.is_empty() {
            return Type::Map(Box::new(Type::Unknown), Box::new(Type::Unknown));
        }
        let (first_key, first_value) = (&pairs[0].0, &pairs[0].1);
        let key_ty = self.infer_expr(first_key);
        let value_ty = self.infer_expr(first_value);
        for (key, value) in &pairs[1..] {
            let kt = self.infer_expr(key);
            let vt = self.infer_expr(value);
            if kt != key_ty && kt != Type::Unknown && key_ty != Type::Unknown {
                self.diagnostics.error(token.position, token.lexeme.clone(), format!("map keys must share one type: found {key_ty} and {kt}"));
            }
            if vt != value_ty && vt != Type::Unknown && value_ty != Type::Unknown {
                self.diagnostics.error(token.position, token.lexeme.clone(), format!("map values must share one type: found {value_ty} and {vt}"));
            }
        }
        Type::Map(Box::new(key_ty), Box::new(value_ty))
    }

    fn infer_match(&mut self, token: &Token, subject: &Expression, arms: &[MatchArm]) -> Type {
        let subject_ty = self.infer_expr(subject);
        let mut result_ty: Option<Type> = None;

        for arm in arms {
            let handle = self.symbols.enter_scope();
            match &arm.pattern {
                Pattern::Literal(expr) => {
                    self.infer_expr(expr);
                }
                Pattern::Range { start, end, .. } => {
                    self.infer_expr(start);
                    self.infer_expr(end);
                }
                Pattern::Identifier(name) => {
                    let _ = self.symbols.define(Symbol {
                        name: name.clone(),
                        kind: SymbolKind::Variable,
                        declared_type: subject_ty.clone(),
                        mutable: false,
                        depth: 0,
                    });
                }
                Pattern::Wildcard => {}
            }
            let body_ty = self.infer_expr(&arm.body);
            self.symbols.exit_scope(handle);

            result_ty = Some(match result_ty {
                Some(existing) => {
                    if !existing.compatible(&body_ty) {
                        self.diagnostics.error(token.position, token.lexeme.clone(), "match arms have incompatible types");
                    }
                    existing
                }
                None => body_ty,
            });
        }

        result_ty.unwrap_or(Type::Nul)
    }
}

fn module_local_name(path: &str) -> String {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    file_name.strip_suffix(".vsp").unwrap_or(file_name).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::Parser;

    fn analyze(source: &str) -> DiagnosticCollector {
        let (program, parse_diagnostics) = Parser::new("test", source).parse();
        assert!(!parse_diagnostics.has_errors(), "{}", parse_diagnostics.render_all());
        Analyzer::analyze("test", source, &program)
    }

    #[test]
    fn accepts_factorial_function() {
        let diagnostics = analyze("fact :: fn(n: int) -> int { if n <= 1 { 1 } else { n * fact(n-1) } }");
        assert!(!diagnostics.has_errors(), "{}", diagnostics.render_all());
    }

    #[test]
    fn rejects_mutation_of_an_immutable_binding() {
        let diagnostics = analyze("x :: 1\nx = 2");
        assert!(diagnostics.has_errors());
        assert!(diagnostics.render_all().contains("can't be mutated"));
    }

    #[test]
    fn nul_binding_narrows_to_the_first_concrete_type_assigned() {
        let diagnostics = analyze("x := nul\nx = 1\nx = 2");
        assert!(!diagnostics.has_errors(), "{}", diagnostics.render_all());
    }

    #[test]
    fn nul_binding_rejects_a_second_assignment_of_a_different_type() {
        let diagnostics = analyze("x := nul\nx = 1\nx = \"oops\"");
        assert!(diagnostics.has_errors());
        assert!(diagnostics.render_all().contains("type mismatch"));
    }

    #[test]
    fn rejects_type_mismatch_in_declaration() {
        let diagnostics = analyze("let x : int = \"oops\"");
        assert!(diagnostics.has_errors());
    }

    #[test]
    fn struct_instance_and_method_call_type_check() {
        let diagnostics = analyze(
            r#"Person :: struct { name: string, greet: fn(self) -> string { self.name } }
               p :: Person[name: "Ada"]
               p.greet()"#,
        );
        assert!(!diagnostics.has_errors(), "{}", diagnostics.render_all());
    }

    #[test]
    fn rejects_unknown_type_alias_reference() {
        let diagnostics = analyze("type Pair = NotDeclared");
        assert!(diagnostics.has_errors());
    }

    #[test]
    fn rejects_arity_mismatch_on_call() {
        let diagnostics = analyze("f :: fn(a: int) -> int { a }\nf(1, 2)");
        assert!(diagnostics.has_errors());
    }
}
