use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::rc::Rc;

use log::{debug, trace};

use crate::ast::{
    is_ignored, AssignOp, BinaryOp, Block, Expression, ForBinding, MatchArm, Pattern, Program, Statement, StructField,
    UnaryOp,
};
use crate::diagnostics::Level;
use crate::eval::builtin::{BuiltinModuleRegistry, EmptyModuleRegistry};
use crate::eval::environment::Environment;
use crate::eval::value::{
    is_control_value, ArrayValue, BuiltinFunction, ErrorValue, FunctionValue, MapValue, ModuleValue, StructDefValue,
    StructInstanceValue, Value,
};
use crate::lexing::Token;

enum LoopStep {
    Continue,
    Break,
    Propagate(Value),
}

fn step_loop(result: Value) -> LoopStep {
    match result {
        Value::Break => LoopStep::Break,
        Value::Skip => LoopStep::Continue,
        other if is_control_value(&other) => LoopStep::Propagate(other),
        _ => LoopStep::Continue,
    }
}

fn error(token: &Token, message: impl Into<String>) -> Value {
    Value::Error(Rc::new(ErrorValue { message: message.into(), level: Level::Error, position: token.position }))
}

fn module_local_name(path: &str) -> String {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    file_name.strip_suffix(".vsp").unwrap_or(file_name).to_string()
}

fn numeric_pair(left: &Value, right: &Value) -> Option<(f64, f64)> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Some((*a as f64, *b as f64)),
        (Value::Float(a), Value::Float(b)) => Some((*a, *b)),
        _ => None,
    }
}

fn arith(left: &Value, right: &Value, token: &Token, int_op: fn(i64, i64) -> i64, float_op: fn(f64, f64) -> f64) -> Value {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Value::Int(int_op(*a, *b)),
        (Value::Float(a), Value::Float(b)) => Value::Float(float_op(*a, *b)),
        _ => error(token, "arithmetic requires matching numeric operands"),
    }
}

/// Combines two already-evaluated operands. `&&` and `||` never reach here:
/// they short-circuit in `eval_binary` before the right-hand side is even
/// evaluated.
fn combine(operator: BinaryOp, left: Value, right: Value, token: &Token) -> Value {
    match operator {
        BinaryOp::Equal => Value::Bool(left.equals(&right)),
        BinaryOp::NotEqual => Value::Bool(!left.equals(&right)),
        BinaryOp::LessThan | BinaryOp::LessEqual | BinaryOp::GreaterThan | BinaryOp::GreaterEqual => {
            match numeric_pair(&left, &right) {
                Some((a, b)) => Value::Bool(match operator {
                    BinaryOp::LessThan => a < b,
                    BinaryOp::LessEqual => a <= b,
                    BinaryOp::GreaterThan => a > b,
                    BinaryOp::GreaterEqual => a >= b,
                    _ => unreachable!(),
                }),
                None => error(token, "comparison requires numeric operands"),
            }
        }
        BinaryOp::Add => match (&left, &right) {
            (Value::Str(_), _) | (_, Value::Str(_)) => Value::Str(format!("{left}{right}")),
            (Value::Int(a), Value::Int(b)) => Value::Int(a + b),
            (Value::Float(a), Value::Float(b)) => Value::Float(a + b),
            _ => error(token, "'+' is not defined for these operand types"),
        },
        BinaryOp::Subtract => arith(&left, &right, token, |a, b| a - b, |a, b| a - b),
        BinaryOp::Multiply => arith(&left, &right, token, |a, b| a * b, |a, b| a * b),
        BinaryOp::Divide => match (&left, &right) {
            (Value::Int(_), Value::Int(0)) => error(token, "division by zero"),
            (Value::Int(a), Value::Int(b)) => Value::Float(*a as f64 / *b as f64),
            (Value::Float(a), Value::Float(b)) => Value::Float(a / b),
            _ => error(token, "'/' requires numeric operands"),
        },
        BinaryOp::Modulo => match (&left, &right) {
            (Value::Int(_), Value::Int(0)) => error(token, "division by zero"),
            (Value::Int(a), Value::Int(b)) => Value::Int(a % b),
            (Value::Float(a), Value::Float(b)) => Value::Float(a % b),
            _ => error(token, "'%' requires numeric operands"),
        },
        BinaryOp::And | BinaryOp::Or => unreachable!("&&/|| short-circuit before reaching combine()"),
    }
}

fn bind_for_target(binding: &ForBinding, first: Value, second: Value, env: &Environment) {
    match binding {
        ForBinding::Single(name) => {
            if !is_ignored(name) {
                env.define(name.clone(), first, false);
            }
        }
        ForBinding::Pair(first_name, second_name) => {
            if !is_ignored(first_name) {
                env.define(first_name.clone(), first, false);
            }
            if !is_ignored(second_name) {
                env.define(second_name.clone(), second, false);
            }
        }
    }
}

/// The tree-walking interpreter: one recursive `eval` over the AST,
/// threading an `Environment` explicitly rather than a mutable "current
/// scope" pointer, so closures can capture a snapshot of it by cloning the
/// handle.
pub struct Evaluator {
    builtins: Box<dyn BuiltinModuleRegistry>,
    /// Keyed by the module's local name (or alias), not its path: two
    /// imports of the same file under different aliases load and evaluate
    /// independently, each getting its own cache slot.
    module_cache: HashMap<String, Value>,
    /// Keyed by path, unlike `module_cache` above — cycle detection is
    /// about the file being loaded, not the name it's bound to.
    loading_modules: HashSet<String>,
    self_stack: Vec<Rc<StructDefValue>>,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::with_builtins(Box::new(EmptyModuleRegistry))
    }

    pub fn with_builtins(builtins: Box<dyn BuiltinModuleRegistry>) -> Self {
        Self { builtins, module_cache: HashMap::new(), loading_modules: HashSet::new(), self_stack: Vec::new() }
    }

    pub fn eval_program(&mut self, program: &Program, env: &Environment) -> Value {
        self.eval_statements(&program.statements, env)
    }

    fn eval_statements(&mut self, statements: &[Statement], env: &Environment) -> Value {
        let mut last = Value::Nul;
        for statement in statements {
            last = self.eval_statement(statement, env);
            if is_control_value(&last) {
                return last;
            }
        }
        last
    }

    fn eval_block(&mut self, block: &Block, env: &Environment) -> Value {
        let child = env.child();
        self.eval_statements(&block.statements, &child)
    }

    fn eval_statement(&mut self, statement: &Statement, env: &Environment) -> Value {
        match statement {
            Statement::VarDecl { mutable, names, value, .. } => self.eval_var_decl(*mutable, names, value, env),
            Statement::TypeAlias { .. } => Value::Nul,
            Statement::Return { token, values } => self.eval_return(token, values, env),
            Statement::While { condition, body, .. } => self.eval_while(condition, body, env),
            Statement::For { binding, iterable, body, .. } => self.eval_for(binding, iterable, body, env),
            Statement::Scope(block) => self.eval_block(block, env),
            Statement::ExpressionStmt { expression, .. } => self.eval_expr(expression, env),
            Statement::Import { token, path, alias } => self.eval_import(token, path, alias, env),
            Statement::Break { .. } => Value::Break,
            Statement::Skip { .. } => Value::Skip,
            Statement::Assign(expr) => self.eval_assign(expr, env),
        }
    }

    fn eval_var_decl(&mut self, mutable: bool, names: &[String], value: &Expression, env: &Environment) -> Value {
        let evaluated = match value {
            Expression::StructDef { fields, .. } if names.len() == 1 => self.eval_struct_def(&names[0], fields, env),
            _ => self.eval_expr(value, env),
        };
        if is_control_value(&evaluated) {
            return evaluated;
        }

        if names.len() == 1 {
            env.define(names[0].clone(), evaluated, mutable);
        } else {
            let values = match evaluated {
                Value::Return(values) => values,
                other => vec![other],
            };
            for (index, name) in names.iter().enumerate() {
                if is_ignored(name) {
                    continue;
                }
                env.define(name.clone(), values.get(index).cloned().unwrap_or(Value::Nul), mutable);
            }
        }
        Value::Nul
    }

    fn eval_struct_def(&mut self, name: &str, fields: &[StructField], env: &Environment) -> Value {
        let mut field_names = Vec::new();
        let mut methods = HashMap::new();
        for field in fields {
            match field {
                StructField::Data { name: field_name, .. } => field_names.push(field_name.clone()),
                StructField::Method { name: method_name, function } => {
                    if let Expression::Function { params, has_self, body, .. } = function {
                        let closure = FunctionValue {
                            name: Some(method_name.clone()),
                            params: params.iter().map(|p| p.name.clone()).collect(),
                            has_self: *has_self,
                            body: body.clone(),
                            env: env.clone(),
                        };
                        methods.insert(method_name.clone(), Rc::new(closure));
                    }
                }
            }
        }
        debug!("defined struct '{name}' with {} field(s), {} method(s)", field_names.len(), methods.len());
        Value::StructDef(Rc::new(StructDefValue { name: name.to_string(), field_names, methods }))
    }

    fn eval_return(&mut self, token: &Token, values: &[Expression], env: &Environment) -> Value {
        let _ = token;
        let mut evaluated = Vec::with_capacity(values.len());
        for value in values {
            let v = self.eval_expr(value, env);
            if is_control_value(&v) {
                return v;
            }
            evaluated.push(v);
        }
        Value::Return(evaluated)
    }

    fn eval_while(&mut self, condition: &Expression, body: &Block, env: &Environment) -> Value {
        loop {
            let cond = self.eval_expr(condition, env);
            if is_control_value(&cond) {
                return cond;
            }
            let truthy = match cond {
                Value::Bool(true) => true,
                Value::Bool(false) | Value::Nul => false,
                _ => return error(condition.token(), "while-condition must be boolean"),
            };
            if !truthy {
                break;
            }
            match step_loop(self.eval_block(body, env)) {
                LoopStep::Break => break,
                LoopStep::Continue => continue,
                LoopStep::Propagate(v) => return v,
            }
        }
        Value::Nul
    }

    fn eval_for(&mut self, binding: &ForBinding, iterable: &Expression, body: &Block, env: &Environment) -> Value {
        let target = self.eval_expr(iterable, env);
        if is_control_value(&target) {
            return target;
        }
        match &target {
            Value::Array(array) => {
                let elements = array.borrow().elements.clone();
                for (index, element) in elements.into_iter().enumerate() {
                    let loop_env = env.child();
                    bind_for_target(binding, element, Value::Int(index as i64), &loop_env);
                    match step_loop(self.eval_block(body, &loop_env)) {
                        LoopStep::Break => break,
                        LoopStep::Continue => continue,
                        LoopStep::Propagate(v) => return v,
                    }
                }
            }
            Value::Str(s) => {
                for (index, ch) in s.chars().enumerate() {
                    let loop_env = env.child();
                    bind_for_target(binding, Value::Char(ch), Value::Int(index as i64), &loop_env);
                    match step_loop(self.eval_block(body, &loop_env)) {
                        LoopStep::Break => break,
                        LoopStep::Continue => continue,
                        LoopStep::Propagate(v) => return v,
                    }
                }
            }
            Value::Map(map) => {
                let pairs = map.borrow().pairs.clone();
                for (key, value) in pairs {
                    let loop_env = env.child();
                    bind_for_target(binding, key, value, &loop_env);
                    match step_loop(self.eval_block(body, &loop_env)) {
                        LoopStep::Break => break,
                        LoopStep::Continue => continue,
                        LoopStep::Propagate(v) => return v,
                    }
                }
            }
            other => return error(iterable.token(), format!("{} is not iterable", other.type_name())),
        }
        Value::Nul
    }

    fn eval_import(&mut self, token: &Token, path: &str, alias: &Option<String>, env: &Environment) -> Value {
        let binding_name = alias.clone().unwrap_or_else(|| module_local_name(path));

        if !path.contains('/') {
            return match self.builtins.lookup(path) {
                Some(value) => {
                    env.define(binding_name, value.clone(), false);
                    value
                }
                None => error(token, format!("no built-in module named '{path}'")),
            };
        }

        if let Some(cached) = self.module_cache.get(&binding_name).cloned() {
            env.define(binding_name, cached.clone(), false);
            return cached;
        }
        if self.loading_modules.contains(path) {
            return error(token, format!("circular dependency importing '{path}'"));
        }

        trace!("loading module '{path}' as '{binding_name}'");
        self.loading_modules.insert(path.to_string());
        let source = match fs::read_to_string(path) {
            Ok(source) => source,
            Err(io_error) => {
                self.loading_modules.remove(path);
                return error(token, format!("could not read module '{path}': {io_error}"));
            }
        };

        let module_env = Environment::new();
        let outcome = crate::pipeline::run(path, &source, self, &module_env);
        self.loading_modules.remove(path);

        let value = match outcome {
            Ok(result) if is_control_value(&result) && matches!(result, Value::Error(_)) => result,
            Ok(_) => Value::UserModule(Rc::new(ModuleValue { name: binding_name.clone(), attributes: module_env.exported_bindings() })),
            Err(diagnostics) => error(token, diagnostics.render_all()),
        };
        self.module_cache.insert(binding_name.clone(), value.clone());
        env.define(binding_name, value.clone(), false);
        value
    }

    fn eval_assign(&mut self, expr: &Expression, env: &Environment) -> Value {
        let Expression::Assign { token, operator, target, value } = expr else {
            unreachable!("Statement::Assign always wraps an Expression::Assign");
        };
        let rhs = self.eval_expr(value, env);
        if is_control_value(&rhs) {
            return rhs;
        }

        let computed = if *operator == AssignOp::Assign {
            rhs
        } else {
            let current = self.eval_expr(target, env);
            if is_control_value(&current) {
                return current;
            }
            self.apply_compound(*operator, &current, &rhs, token)
        };
        if is_control_value(&computed) {
            return computed;
        }
        self.eval_assignment_write(token, target, computed, env)
    }

    fn apply_compound(&self, operator: AssignOp, current: &Value, rhs: &Value, token: &Token) -> Value {
        match operator {
            AssignOp::AddAssign => combine(BinaryOp::Add, current.clone(), rhs.clone(), token),
            AssignOp::SubtractAssign => combine(BinaryOp::Subtract, current.clone(), rhs.clone(), token),
            AssignOp::MultiplyAssign => combine(BinaryOp::Multiply, current.clone(), rhs.clone(), token),
            AssignOp::DivideAssign => combine(BinaryOp::Divide, current.clone(), rhs.clone(), token),
            AssignOp::ModuloAssign => combine(BinaryOp::Modulo, current.clone(), rhs.clone(), token),
            AssignOp::AndAssign => combine(BinaryOp::And, current.clone(), rhs.clone(), token),
            AssignOp::OrAssign => combine(BinaryOp::Or, current.clone(), rhs.clone(), token),
            AssignOp::AndBitsAssign | AssignOp::OrBitsAssign | AssignOp::XorAssign | AssignOp::ShlAssign | AssignOp::ShrAssign => {
                match (current, rhs) {
                    (Value::Int(a), Value::Int(b)) => Value::Int(match operator {
                        AssignOp::AndBitsAssign => a & b,
                        AssignOp::OrBitsAssign => a | b,
                        AssignOp::XorAssign => a ^ b,
                        AssignOp::ShlAssign => a << b,
                        AssignOp::ShrAssign => a >> b,
                        _ => unreachable!(),
                    }),
                    _ => error(token, "bitwise compound assignment requires int operands"),
                }
            }
            AssignOp::Assign => unreachable!("handled directly in eval_assign"),
        }
    }

    fn eval_assignment_write(&mut self, token: &Token, target: &Expression, value: Value, env: &Environment) -> Value {
        match target {
            Expression::Identifier { name, .. } => match env.assign(name, value.clone()) {
                Ok(()) => value,
                Err(message) => error(token, message),
            },
            Expression::Index { target: inner, index, .. } => {
                let inner_val = self.eval_expr(inner, env);
                if is_control_value(&inner_val) {
                    return inner_val;
                }
                let index_val = self.eval_expr(index, env);
                if is_control_value(&index_val) {
                    return index_val;
                }
                match &inner_val {
                    Value::Array(array) => {
                        let len = array.borrow().elements.len();
                        match index_val {
                            Value::Int(i) if i >= 0 && (i as usize) < len => {
                                array.borrow_mut().elements[i as usize] = value.clone();
                                value
                            }
                            Value::Int(_) => error(token, "index out of bound"),
                            _ => error(token, "array index must be int"),
                        }
                    }
                    Value::Map(map) => {
                        let mut map = map.borrow_mut();
                        if let Some(entry) = map.pairs.iter_mut().find(|(k, _)| k.equals(&index_val)) {
                            entry.1 = value.clone();
                        } else {
                            map.pairs.push((index_val, value.clone()));
                        }
                        value
                    }
                    other => error(token, format!("cannot index-assign into a value of type {}", other.type_name())),
                }
            }
            Expression::Member { receiver, property, .. } => {
                let receiver_val = self.eval_expr(receiver, env);
                if is_control_value(&receiver_val) {
                    return receiver_val;
                }
                match &receiver_val {
                    Value::StructInstance(instance) => {
                        instance.borrow_mut().fields.insert(property.clone(), value.clone());
                        value
                    }
                    other => error(token, format!("cannot assign member '{property}' on a value of type {}", other.type_name())),
                }
            }
            _ => error(token, "left-hand side of assignment is not assignable"),
        }
    }

    fn eval_expr(&mut self, expr: &Expression, env: &Environment) -> Value {
        match expr {
            Expression::Int { value, .. } => Value::Int(*value),
            Expression::Float { value, .. } => Value::Float(*value),
            Expression::Bool { value, .. } => Value::Bool(*value),
            Expression::Str { value, .. } => Value::Str(value.clone()),
            Expression::Char { value, .. } => Value::Char(*value),
            Expression::Nul { .. } => Value::Nul,
            Expression::Identifier { name, token } => match env.get(name) {
                Some(value) => value,
                None => error(token, format!("'{name}' is not declared")),
            },
            Expression::Unary { token, operator, operand } => self.eval_unary(token, *operator, operand, env),
            Expression::Binary { token, operator, left, right } => self.eval_binary(token, *operator, left, right, env),
            Expression::If { condition, consequence, alternative, .. } => {
                self.eval_if(condition, consequence, alternative, env)
            }
            Expression::Function { params, has_self, body, .. } => Value::Function(Rc::new(FunctionValue {
                name: None,
                params: params.iter().map(|p| p.name.clone()).collect(),
                has_self: *has_self,
                body: body.clone(),
                env: env.clone(),
            })),
            Expression::Call { token, callee, arguments } => self.eval_call(token, callee, arguments, env),
            Expression::Index { token, target, index } => self.eval_index(token, target, index, env),
            Expression::RangeIndex { token, target, start, end } => self.eval_range_index(token, target, start, end, env),
            Expression::Range { start, end, inclusive, .. } => self.eval_range(start, end, *inclusive, env),
            Expression::Member { token, receiver, property } => {
                let receiver_val = self.eval_expr(receiver, env);
                if is_control_value(&receiver_val) {
                    return receiver_val;
                }
                self.eval_member(token, &receiver_val, property)
            }
            Expression::StructDef { token, .. } => error(token, "struct definitions must be bound to a name"),
            Expression::StructInstance { token, name, fields } => self.eval_struct_instance(token, name, fields, env),
            Expression::Array { elements, fixed_size, .. } => self.eval_array(elements, *fixed_size, env),
            Expression::Map { pairs, .. } => self.eval_map(pairs, env),
            Expression::Match { subject, arms, .. } => self.eval_match(subject, arms, env),
            Expression::Assign { .. } => error(expr.token(), "assignment cannot be used as a value"),
        }
    }

    fn eval_unary(&mut self, token: &Token, operator: UnaryOp, operand: &Expression, env: &Environment) -> Value {
        let value = self.eval_expr(operand, env);
        if is_control_value(&value) {
            return value;
        }
        match operator {
            UnaryOp::Not => match value {
                Value::Bool(b) => Value::Bool(!b),
                Value::Nul => Value::Bool(true),
                _ => error(token, "'!' requires a boolean operand"),
            },
            UnaryOp::Negate => match value {
                Value::Int(i) => Value::Int(-i),
                Value::Float(x) => Value::Float(-x),
                _ => error(token, "unary '-' requires a numeric operand"),
            },
            UnaryOp::BitNot => match value {
                Value::Int(i) => Value::Int(!i),
                _ => error(token, "'~' requires an int operand"),
            },
        }
    }

    fn eval_binary(&mut self, token: &Token, operator: BinaryOp, left: &Expression, right: &Expression, env: &Environment) -> Value {
        match operator {
            BinaryOp::And => {
                let left_val = self.eval_expr(left, env);
                if is_control_value(&left_val) {
                    return left_val;
                }
                match left_val {
                    Value::Bool(false) => Value::Bool(false),
                    Value::Bool(true) => self.eval_expr(right, env),
                    _ => error(token, "'&&' requires boolean operands"),
                }
            }
            BinaryOp::Or => {
                let left_val = self.eval_expr(left, env);
                if is_control_value(&left_val) {
                    return left_val;
                }
                match left_val {
                    Value::Bool(true) => Value::Bool(true),
                    Value::Bool(false) => self.eval_expr(right, env),
                    _ => error(token, "'||' requires boolean operands"),
                }
            }
            _ => {
                let left_val = self.eval_expr(left, env);
                if is_control_value(&left_val) {
                    return left_val;
                }
                let right_val = self.eval_expr(right, env);
                if is_control_value(&right_val) {
                    return right_val;
                }
                combine(operator, left_val, right_val, token)
            }
        }
    }

    fn eval_if(
        &mut self,
        condition: &Expression,
        consequence: &Block,
        alternative: &Option<Box<crate::ast::Alternative>>,
        env: &Environment,
    ) -> Value {
        let cond = self.eval_expr(condition, env);
        if is_control_value(&cond) {
            return cond;
        }
        let truthy = match cond {
            Value::Bool(true) => true,
            Value::Bool(false) | Value::Nul => false,
            _ => return error(condition.token(), "if-condition must be boolean"),
        };
        if truthy {
            return self.eval_block(consequence, env);
        }
        match alternative {
            None => Value::Nul,
            Some(alt) => match alt.as_ref() {
                crate::ast::Alternative::Block(block) => self.eval_block(block, env),
                crate::ast::Alternative::If(inner) => self.eval_expr(inner, env),
            },
        }
    }

    fn eval_call(&mut self, token: &Token, callee: &Expression, arguments: &[Expression], env: &Environment) -> Value {
        if let Expression::Member { receiver, property, token: member_token } = callee {
            let receiver_val = self.eval_expr(receiver, env);
            if is_control_value(&receiver_val) {
                return receiver_val;
            }
            if let Value::StructInstance(instance) = &receiver_val {
                let def = instance.borrow().def.clone();
                if let Some(denial) = self.check_struct_member_privacy(member_token, &def, property) {
                    return denial;
                }
                if let Some(method) = def.methods.get(property).cloned() {
                    let args = match self.eval_arguments(arguments, env) {
                        Ok(args) => args,
                        Err(control) => return control,
                    };
                    return self.call_function(&method, &args, Some(receiver_val));
                }
            }
            let callee_val = self.eval_member(member_token, &receiver_val, property);
            if is_control_value(&callee_val) {
                return callee_val;
            }
            return self.invoke(token, &callee_val, arguments, env);
        }

        let callee_val = self.eval_expr(callee, env);
        if is_control_value(&callee_val) {
            return callee_val;
        }
        self.invoke(token, &callee_val, arguments, env)
    }

    /// `_`-prefixed struct members are visible only while evaluating a
    /// method body of that same struct definition (tracked via
    /// `self_stack`). Shared between the direct-dispatch fast path in
    /// `eval_call` and `eval_member`, so a privacy violation is caught
    /// however the member is reached.
    fn check_struct_member_privacy(&self, token: &Token, def: &Rc<StructDefValue>, property: &str) -> Option<Value> {
        if !property.starts_with('_') {
            return None;
        }
        let allowed = self.self_stack.last().is_some_and(|top| Rc::ptr_eq(top, def));
        if allowed {
            None
        } else {
            Some(error(token, format!("'{property}' is private to struct '{}'", def.name)))
        }
    }

    fn eval_arguments(&mut self, arguments: &[Expression], env: &Environment) -> Result<Vec<Value>, Value> {
        let mut values = Vec::with_capacity(arguments.len());
        for argument in arguments {
            let value = self.eval_expr(argument, env);
            if is_control_value(&value) {
                return Err(value);
            }
            values.push(value);
        }
        Ok(values)
    }

    fn invoke(&mut self, token: &Token, callee_val: &Value, arguments: &[Expression], env: &Environment) -> Value {
        let args = match self.eval_arguments(arguments, env) {
            Ok(args) => args,
            Err(control) => return control,
        };
        match callee_val {
            Value::Function(function) => self.call_function(function, &args, None),
            Value::Builtin(builtin) => (builtin.call)(&args),
            other => error(token, format!("cannot call a value of type {}", other.type_name())),
        }
    }

    fn call_function(&mut self, function: &Rc<FunctionValue>, args: &[Value], receiver: Option<Value>) -> Value {
        let call_env = function.env.child();
        let mut pushed_self = false;
        if function.has_self {
            if let Some(self_value) = &receiver {
                call_env.define("self", self_value.clone(), true);
                if let Value::StructInstance(instance) = self_value {
                    self.self_stack.push(instance.borrow().def.clone());
                    pushed_self = true;
                }
            }
        }
        for (param, arg) in function.params.iter().zip(args.iter()) {
            call_env.define(param.clone(), arg.clone(), true);
        }

        let result = self.eval_statements(&function.body.statements, &call_env);
        if pushed_self {
            self.self_stack.pop();
        }

        match result {
            Value::Return(mut values) if values.len() == 1 => values.pop().expect("length checked above"),
            other => other,
        }
    }

    fn eval_index(&mut self, token: &Token, target: &Expression, index: &Expression, env: &Environment) -> Value {
        let target_val = self.eval_expr(target, env);
        if is_control_value(&target_val) {
            return target_val;
        }
        let index_val = self.eval_expr(index, env);
        if is_control_value(&index_val) {
            return index_val;
        }
        match &target_val {
            Value::Array(array) => {
                let array = array.borrow();
                match index_val {
                    Value::Int(i) if i >= 0 && (i as usize) < array.elements.len() => array.elements[i as usize].clone(),
                    Value::Int(_) => error(token, "index out of bound"),
                    _ => error(token, "array index must be int"),
                }
            }
            Value::Str(s) => match index_val {
                Value::Int(i) if i >= 0 => match s.chars().nth(i as usize) {
                    Some(c) => Value::Char(c),
                    None => error(token, "index out of bound"),
                },
                _ => error(token, "string index must be int"),
            },
            Value::Map(map) => {
                let map = map.borrow();
                match map.pairs.iter().find(|(k, _)| k.equals(&index_val)) {
                    Some((_, v)) => v.clone(),
                    None => error(token, "key not found in map"),
                }
            }
            other => error(token, format!("cannot index into a value of type {}", other.type_name())),
        }
    }

    fn eval_range_index(
        &mut self,
        token: &Token,
        target: &Expression,
        start: &Option<Box<Expression>>,
        end: &Option<Box<Expression>>,
        env: &Environment,
    ) -> Value {
        let target_val = self.eval_expr(target, env);
        if is_control_value(&target_val) {
            return target_val;
        }
        let length = match &target_val {
            Value::Array(array) => array.borrow().elements.len(),
            Value::Str(s) => s.chars().count(),
            other => return error(token, format!("cannot slice a value of type {}", other.type_name())),
        };

        let start_idx = match start {
            Some(expr) => match self.eval_expr(expr, env) {
                Value::Int(i) if i >= 0 => i as usize,
                Value::Int(_) => return error(token, "slice bounds must be non-negative"),
                control if is_control_value(&control) => return control,
                _ => return error(token, "slice bounds must be int"),
            },
            None => 0,
        };
        let end_idx = match end {
            Some(expr) => match self.eval_expr(expr, env) {
                Value::Int(i) if i >= 0 => i as usize,
                Value::Int(_) => return error(token, "slice bounds must be non-negative"),
                control if is_control_value(&control) => return control,
                _ => return error(token, "slice bounds must be int"),
            },
            None => length,
        };
        if start_idx > end_idx || end_idx > length {
            return error(token, "slice bounds out of range");
        }

        match &target_val {
            Value::Array(array) => {
                let slice = array.borrow().elements[start_idx..end_idx].to_vec();
                Value::Array(Rc::new(RefCell::new(ArrayValue { elements: slice, fixed_size: None })))
            }
            Value::Str(s) => Value::Str(s.chars().skip(start_idx).take(end_idx - start_idx).collect()),
            _ => unreachable!("length computed from the same two variants above"),
        }
    }

    fn eval_range(&mut self, start: &Expression, end: &Expression, inclusive: bool, env: &Environment) -> Value {
        let start_val = self.eval_expr(start, env);
        if is_control_value(&start_val) {
            return start_val;
        }
        let end_val = self.eval_expr(end, env);
        if is_control_value(&end_val) {
            return end_val;
        }
        match (start_val, end_val) {
            (Value::Int(a), Value::Int(b)) => {
                let elements = if inclusive { (a..=b).map(Value::Int).collect() } else { (a..b).map(Value::Int).collect() };
                Value::Array(Rc::new(RefCell::new(ArrayValue { elements, fixed_size: None })))
            }
            _ => error(start.token(), "range bounds must be int"),
        }
    }

    fn eval_member(&self, token: &Token, receiver_val: &Value, property: &str) -> Value {
        match receiver_val {
            Value::StructInstance(instance) => {
                let inst = instance.borrow();
                if let Some(denial) = self.check_struct_member_privacy(token, &inst.def, property) {
                    return denial;
                }
                if let Some(value) = inst.fields.get(property) {
                    return value.clone();
                }
                if let Some(method) = inst.def.methods.get(property) {
                    return Value::Function(method.clone());
                }
                error(token, format!("'{}' has no member '{property}'", inst.def.name))
            }
            Value::BuiltinModule(module) => match module.attributes.get(property) {
                Some(value) => value.clone(),
                None => error(token, format!("module '{}' has no member '{property}'", module.name)),
            },
            Value::UserModule(module) => {
                if property.starts_with('_') {
                    return error(token, format!("'{property}' is private to module '{}'", module.name));
                }
                match module.attributes.get(property) {
                    Some(value) => value.clone(),
                    None => error(token, format!("module '{}' has no member '{property}'", module.name)),
                }
            }
            other => error(token, format!("cannot access member '{property}' on a value of type {}", other.type_name())),
        }
    }

    fn eval_struct_instance(&mut self, token: &Token, name: &str, fields: &[(String, Expression)], env: &Environment) -> Value {
        let def = match env.get(name) {
            Some(Value::StructDef(def)) => def,
            _ => return error(token, format!("'{name}' is not a declared struct")),
        };
        let mut instance_fields = HashMap::new();
        for (field_name, value_expr) in fields {
            let value = self.eval_expr(value_expr, env);
            if is_control_value(&value) {
                return value;
            }
            instance_fields.insert(field_name.clone(), value);
        }
        Value::StructInstance(Rc::new(RefCell::new(StructInstanceValue { def, fields: instance_fields })))
    }

    fn eval_array(&mut self, elements: &[Expression], fixed_size: Option<usize>, env: &Environment) -> Value {
        let mut values = Vec::with_capacity(elements.len());
        for element in elements {
            let value = self.eval_expr(element, env);
            if is_control_value(&value) {
                return value;
            }
            values.push(value);
        }
        Value::Array(Rc::new(RefCell::new(ArrayValue { elements: values, fixed_size })))
    }

    fn eval_map(&mut self, pairs: &[(Expression, Expression)], env: &Environment) -> Value {
        let mut values = Vec::with_capacity(pairs.len());
        for (key_expr, value_expr) in pairs {
            let key = self.eval_expr(key_expr, env);
            if is_control_value(&key) {
                return key;
            }
            let value = self.eval_expr(value_expr, env);
            if is_control_value(&value) {
                return value;
            }
            values.push((key, value));
        }
        Value::Map(Rc::new(RefCell::new(MapValue { pairs: values })))
    }

    fn eval_match(&mut self, subject: &Expression, arms: &[MatchArm], env: &Environment) -> Value {
        let subject_val = self.eval_expr(subject, env);
        if is_control_value(&subject_val) {
            return subject_val;
        }
        for arm in arms {
            let arm_env = env.child();
            let matched = match &arm.pattern {
                Pattern::Wildcard => true,
                Pattern::Literal(expr) => {
                    let value = self.eval_expr(expr, &arm_env);
                    if is_control_value(&value) {
                        return value;
                    }
                    subject_val.equals(&value)
                }
                Pattern::Identifier(name) => {
                    arm_env.define(name.clone(), subject_val.clone(), false);
                    true
                }
                Pattern::Range { start, end, inclusive } => {
                    let start_val = self.eval_expr(start, &arm_env);
                    if is_control_value(&start_val) {
                        return start_val;
                    }
                    let end_val = self.eval_expr(end, &arm_env);
                    if is_control_value(&end_val) {
                        return end_val;
                    }
                    match (&subject_val, start_val, end_val) {
                        (Value::Int(s), Value::Int(lo), Value::Int(hi)) => {
                            if *inclusive {
                                *s >= lo && *s <= hi
                            } else {
                                *s >= lo && *s < hi
                            }
                        }
                        _ => false,
                    }
                }
            };
            if matched {
                return self.eval_expr(&arm.body, &arm_env);
            }
        }
        Value::Nul
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::Parser;
    use crate::semantic::Analyzer;

    fn run(source: &str) -> Value {
        let (program, parse_diagnostics) = Parser::new("test", source).parse();
        assert!(!parse_diagnostics.has_errors(), "{}", parse_diagnostics.render_all());
        let semantic_diagnostics = Analyzer::analyze("test", source, &program);
        assert!(!semantic_diagnostics.has_errors(), "{}", semantic_diagnostics.render_all());
        let mut evaluator = Evaluator::new();
        evaluator.eval_program(&program, &Environment::new())
    }

    #[test]
    fn factorial_recursion() {
        let result = run("fact :: fn(n: int) -> int { if n <= 1 { 1 } else { n * fact(n-1) } }\nfact(5)");
        assert!(matches!(result, Value::Int(120)), "{result}");
    }

    #[test]
    fn if_expression_value() {
        let result = run("res :: if true { \"Hello\" } else { \"See ya\" }\nres");
        assert!(matches!(result, Value::Str(ref s) if s == "Hello"));
    }

    #[test]
    fn array_indexing_arithmetic() {
        let result = run("res :: [1,2,3]\nres[0] * res[1] * res[2]");
        assert!(matches!(result, Value::Int(6)));
    }

    #[test]
    fn struct_method_with_self() {
        let result = run(
            r#"Person :: struct { name: string, greet: fn(self) -> string { self.name } }
               p :: Person[name: "Ada"]
               p.greet()"#,
        );
        assert!(matches!(result, Value::Str(ref s) if s == "Ada"));
    }

    #[test]
    fn short_circuit_and_never_evaluates_rhs() {
        let calls = Rc::new(RefCell::new(0));
        let calls_for_closure = calls.clone();
        let probe = BuiltinFunction {
            name: "probe".to_string(),
            call: Box::new(move |_| {
                *calls_for_closure.borrow_mut() += 1;
                Value::Bool(true)
            }),
        };
        let (program, parse_diagnostics) = Parser::new("test", "false && probe()").parse();
        assert!(!parse_diagnostics.has_errors(), "{}", parse_diagnostics.render_all());
        let env = Environment::new();
        env.define("probe", Value::Builtin(Rc::new(probe)), false);
        let mut evaluator = Evaluator::new();
        let result = evaluator.eval_program(&program, &env);
        assert!(matches!(result, Value::Bool(false)));
        assert_eq!(*calls.borrow(), 0);
    }

    #[test]
    fn mutating_an_immutable_binding_is_a_runtime_error_too() {
        let result = run_allow_errors("x :: 1\nx = 2");
        assert!(matches!(result, Value::Error(ref e) if e.message.contains("can't be mutated")));
    }

    #[test]
    fn calling_a_private_method_from_outside_is_a_runtime_error_too() {
        // The analyzer already rejects this statically; skipping it here
        // (via `run_allow_errors`) exercises the evaluator's own privacy
        // check in `eval_call`'s direct-dispatch fast path.
        let result = run_allow_errors(
            r#"Counter :: struct { n: int, _bump: fn(self) -> int { self.n + 1 } }
               c :: Counter[n: 1]
               c._bump()"#,
        );
        assert!(matches!(result, Value::Error(ref e) if e.message.contains("is private to struct")), "{result}");
    }

    fn run_allow_errors(source: &str) -> Value {
        let (program, _) = Parser::new("test", source).parse();
        let mut evaluator = Evaluator::new();
        evaluator.eval_program(&program, &Environment::new())
    }
}
