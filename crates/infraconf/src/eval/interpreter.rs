use super::functions::{FunctionRegistry, Host};
use super::EvalError;
use crate::value::{Kind, Value};
use hcl::expr::{
    BinaryOp, BinaryOperator, Conditional, Expression, ForExpr, FuncCall, ObjectKey, Operation,
    TemplateExpr, TraversalOperator, UnaryOperator,
};
use hcl::template::{Directive, Element, Strip, Template};
use indexmap::IndexMap;

/// Tree-walking evaluator over parsed HCL expressions
///
/// Variables of `for` expressions and template directives live in a stack of scopes on top of
/// the context variables.
pub(crate) struct Interpreter<'a> {
    variables: &'a IndexMap<String, Value>,
    functions: &'a FunctionRegistry,
    host: &'a dyn Host,
    scopes: Vec<IndexMap<String, Value>>,
}

type Result<T, E = EvalError> = std::result::Result<T, E>;

impl<'a> Interpreter<'a> {
    pub fn new(
        variables: &'a IndexMap<String, Value>,
        functions: &'a FunctionRegistry,
        host: &'a dyn Host,
    ) -> Self {
        Self {
            variables,
            functions,
            host,
            scopes: Vec::new(),
        }
    }

    pub fn evaluate(&mut self, expr: &Expression) -> Result<Value> {
        match expr {
            Expression::Null => Ok(Value::Null),
            Expression::Bool(b) => Ok(Value::Boolean(*b)),
            Expression::Number(n) => Ok(Value::from(*n)),
            Expression::String(s) => Ok(Value::String(s.clone())),
            Expression::Array(items) => items
                .iter()
                .map(|item| self.evaluate(item))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Expression::Object(entries) => {
                let mut object = IndexMap::with_capacity(entries.len());
                for (key, value) in entries.iter() {
                    let key = match key {
                        ObjectKey::Identifier(ident) => ident.as_str().to_string(),
                        ObjectKey::Expression(expr) => self.evaluate(expr)?.to_text(),
                        other => other.to_string(),
                    };
                    object.insert(key, self.evaluate(value)?);
                }
                Ok(Value::Object(object))
            }
            Expression::TemplateExpr(template) => self.template_expr(template),
            Expression::Variable(name) => self.lookup(name.as_str()),
            Expression::Traversal(traversal) => {
                let base = self.evaluate(&traversal.expr)?;
                self.traverse(base, &traversal.operators)
            }
            Expression::FuncCall(call) => self.call(call),
            Expression::Parenthesis(inner) => self.evaluate(inner),
            Expression::Conditional(conditional) => self.conditional(conditional),
            Expression::Operation(operation) => match operation.as_ref() {
                Operation::Unary(unary) => {
                    let operand = self.evaluate(&unary.expr)?;
                    unary_op(unary.operator, operand)
                }
                Operation::Binary(binary) => self.binary(binary),
            },
            Expression::ForExpr(for_expr) => self.for_expr(for_expr),
            other => Err(EvalError::TypeMismatch(format!(
                "unsupported expression `{other}`"
            ))),
        }
    }

    /// Evaluates a parsed template; a template that is a single interpolation keeps the raw value
    pub fn render(&mut self, template: &Template) -> Result<Value> {
        if let [Element::Interpolation(interpolation)] = template.elements() {
            return self.evaluate(&interpolation.expr);
        }

        let mut output = String::new();
        self.render_into(&mut output, template, Strip::None, Strip::None)?;
        Ok(Value::String(output))
    }

    fn lookup(&self, name: &str) -> Result<Value> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .or_else(|| self.variables.get(name))
            .cloned()
            .ok_or_else(|| EvalError::UndefinedVariable(name.to_string()))
    }

    fn scoped<T>(
        &mut self,
        scope: IndexMap<String, Value>,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        self.scopes.push(scope);
        let result = f(self);
        self.scopes.pop();
        result
    }

    fn traverse(&mut self, value: Value, operators: &[TraversalOperator]) -> Result<Value> {
        let Some((operator, rest)) = operators.split_first() else {
            return Ok(value);
        };

        let next = match operator {
            TraversalOperator::GetAttr(name) => get_attr(value, name.as_str())?,
            TraversalOperator::Index(index) => {
                let index = self.evaluate(index)?;
                index_into(value, &index)?
            }
            TraversalOperator::LegacyIndex(index) => {
                index_into(value, &Value::Integer(*index as i64))?
            }
            TraversalOperator::FullSplat => {
                let items = splat_items(value);
                let mapped = items
                    .into_iter()
                    .map(|item| self.traverse(item, rest))
                    .collect::<Result<Vec<_>>>()?;
                return Ok(Value::Array(mapped));
            }
            TraversalOperator::AttrSplat => {
                // only the attribute accesses directly after `.*` apply per element
                let attrs = rest
                    .iter()
                    .take_while(|op| matches!(op, TraversalOperator::GetAttr(_)))
                    .count();
                let (per_item, after) = rest.split_at(attrs);
                let mapped = splat_items(value)
                    .into_iter()
                    .map(|item| self.traverse(item, per_item))
                    .collect::<Result<Vec<_>>>()?;
                return self.traverse(Value::Array(mapped), after);
            }
        };

        self.traverse(next, rest)
    }

    fn call(&mut self, call: &FuncCall) -> Result<Value> {
        let name = if call.name.is_namespaced() {
            call.name
                .namespace
                .iter()
                .map(|part| part.as_str())
                .chain([call.name.name.as_str()])
                .collect::<Vec<_>>()
                .join("::")
        } else {
            call.name.name.to_string()
        };

        let mut args = call
            .args
            .iter()
            .map(|arg| self.evaluate(arg))
            .collect::<Result<Vec<_>>>()?;

        if call.expand_final {
            match args.pop() {
                Some(Value::Array(items)) => args.extend(items),
                Some(other) => {
                    return Err(EvalError::TypeMismatch(format!(
                        "cannot expand a {} into arguments of `{name}`",
                        other.kind()
                    )))
                }
                None => {}
            }
        }

        self.functions.call(&name, args, self.host)
    }

    fn conditional(&mut self, conditional: &Conditional) -> Result<Value> {
        if self.condition(&conditional.cond_expr)? {
            self.evaluate(&conditional.true_expr)
        } else {
            self.evaluate(&conditional.false_expr)
        }
    }

    fn condition(&mut self, expr: &Expression) -> Result<bool> {
        match self.evaluate(expr)? {
            Value::Boolean(b) => Ok(b),
            Value::String(s) if s == "true" => Ok(true),
            Value::String(s) if s == "false" => Ok(false),
            other => Err(EvalError::TypeMismatch(format!(
                "condition must be a bool, got {}",
                other.kind()
            ))),
        }
    }

    fn binary(&mut self, op: &BinaryOp) -> Result<Value> {
        let mut chain = Chain::default();
        chain.flatten(&op.lhs_expr);
        chain.operators.push(op.operator);
        chain.flatten(&op.rhs_expr);

        let tree = chain.climb(0);
        self.node(&tree)
    }

    fn node(&mut self, node: &Node<'_>) -> Result<Value> {
        let (lhs, operator, rhs) = match node {
            Node::Leaf(expr) => return self.evaluate(expr),
            Node::Op(lhs, operator, rhs) => (lhs, *operator, rhs),
        };

        match operator {
            BinaryOperator::And | BinaryOperator::Or => {
                let left = bool_operand(self.node(lhs)?, operator)?;
                // short-circuit
                if (operator == BinaryOperator::And) != left {
                    return Ok(Value::Boolean(left));
                }
                Ok(Value::Boolean(bool_operand(self.node(rhs)?, operator)?))
            }
            _ => {
                let left = self.node(lhs)?;
                let right = self.node(rhs)?;
                binary_op(left, operator, right)
            }
        }
    }

    fn for_expr(&mut self, for_expr: &ForExpr) -> Result<Value> {
        let collection = self.evaluate(&for_expr.collection_expr)?;
        let entries = iteration(collection)?;

        let mut list = Vec::new();
        let mut object: IndexMap<String, Value> = IndexMap::new();

        for (key, value) in entries {
            let mut scope = IndexMap::new();
            if let Some(key_var) = &for_expr.key_var {
                scope.insert(key_var.to_string(), key);
            }
            scope.insert(for_expr.value_var.to_string(), value);

            self.scoped(scope, |this| {
                if let Some(cond) = &for_expr.cond_expr {
                    if !this.condition(cond)? {
                        return Ok(());
                    }
                }

                let value = this.evaluate(&for_expr.value_expr)?;
                let Some(key_expr) = &for_expr.key_expr else {
                    list.push(value);
                    return Ok(());
                };

                let key = this.evaluate(key_expr)?.to_text();
                if for_expr.grouping {
                    let group = object
                        .entry(key)
                        .or_insert_with(|| Value::Array(Vec::new()));
                    if let Value::Array(group) = group {
                        group.push(value);
                    }
                } else if object.insert(key.clone(), value).is_some() {
                    return Err(EvalError::TypeMismatch(format!(
                        "duplicate key `{key}` in for expression"
                    )));
                }
                Ok(())
            })?;
        }

        Ok(match for_expr.key_expr {
            Some(_) => Value::Object(object),
            None => Value::Array(list),
        })
    }

    fn template_expr(&mut self, template: &TemplateExpr) -> Result<Value> {
        let parsed = Template::from_expr(template).map_err(|e| EvalError::Parse {
            expression: template.to_string(),
            message: e.to_string(),
        })?;

        // a quoted template is always a string, even if it is a single interpolation
        match self.render(&parsed)? {
            Value::String(s) => Ok(Value::String(s)),
            other => Ok(Value::String(interpolated(&other))),
        }
    }

    fn render_into(
        &mut self,
        output: &mut String,
        template: &Template,
        prev_strip: Strip,
        next_strip: Strip,
    ) -> Result<()> {
        let elements = template.elements();
        for (index, element) in elements.iter().enumerate() {
            let before = match index {
                0 => prev_strip,
                _ => strip_of(&elements[index - 1]),
            };
            let after = elements.get(index + 1).map_or(next_strip, strip_of);

            match element {
                Element::Literal(literal) => output.push_str(strip_literal(literal, before, after)),
                Element::Interpolation(interpolation) => {
                    let value = self.evaluate(&interpolation.expr)?;
                    output.push_str(&interpolated(&value));
                }
                Element::Directive(Directive::If(directive)) => {
                    if self.condition(&directive.cond_expr)? {
                        let end = match directive.false_template {
                            Some(_) => directive.else_strip,
                            None => directive.endif_strip,
                        };
                        self.render_into(
                            output,
                            &directive.true_template,
                            directive.if_strip,
                            end,
                        )?;
                    } else if let Some(false_template) = &directive.false_template {
                        self.render_into(
                            output,
                            false_template,
                            directive.else_strip,
                            directive.endif_strip,
                        )?;
                    }
                }
                Element::Directive(Directive::For(directive)) => {
                    let collection = self.evaluate(&directive.collection_expr)?;
                    for (key, value) in iteration(collection)? {
                        let mut scope = IndexMap::new();
                        if let Some(key_var) = &directive.key_var {
                            scope.insert(key_var.to_string(), key);
                        }
                        scope.insert(directive.value_var.to_string(), value);

                        self.scoped(scope, |this| {
                            this.render_into(
                                output,
                                &directive.template,
                                directive.for_strip,
                                directive.endfor_strip,
                            )
                        })?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Operands and operators of an unparenthesized binary chain, in source order
///
/// The parser nests chains to the right regardless of precedence, so they are regrouped here.
#[derive(Default)]
struct Chain<'e> {
    operands: Vec<&'e Expression>,
    operators: Vec<BinaryOperator>,
    position: usize,
}

enum Node<'e> {
    Leaf(&'e Expression),
    Op(Box<Node<'e>>, BinaryOperator, Box<Node<'e>>),
}

impl<'e> Chain<'e> {
    fn flatten(&mut self, expr: &'e Expression) {
        if let Expression::Operation(operation) = expr {
            if let Operation::Binary(binary) = operation.as_ref() {
                self.flatten(&binary.lhs_expr);
                self.operators.push(binary.operator);
                self.flatten(&binary.rhs_expr);
                return;
            }
        }
        self.operands.push(expr);
    }

    /// Precedence climbing, left associative
    fn climb(&mut self, min_precedence: u8) -> Node<'e> {
        let mut lhs = Node::Leaf(self.operands[self.position]);

        while let Some(&operator) = self.operators.get(self.position) {
            if operator.precedence() < min_precedence {
                break;
            }
            self.position += 1;
            let rhs = self.climb(operator.precedence() + 1);
            lhs = Node::Op(Box::new(lhs), operator, Box::new(rhs));
        }

        lhs
    }
}

fn strip_of(element: &Element) -> Strip {
    match element {
        Element::Literal(_) => Strip::None,
        Element::Interpolation(interpolation) => interpolation.strip,
        Element::Directive(Directive::If(directive)) => Strip::from((
            directive.if_strip.strip_start(),
            directive.endif_strip.strip_end(),
        )),
        Element::Directive(Directive::For(directive)) => Strip::from((
            directive.for_strip.strip_start(),
            directive.endfor_strip.strip_end(),
        )),
    }
}

/// Strips spaces up to and including the first line break on the marked sides
fn strip_literal(mut literal: &str, before: Strip, after: Strip) -> &str {
    fn is_space(c: char) -> bool {
        c.is_whitespace() && c != '\r' && c != '\n'
    }

    if before.strip_end() {
        let trimmed = literal.trim_start_matches(is_space);
        literal = trimmed
            .strip_prefix("\r\n")
            .or_else(|| trimmed.strip_prefix('\n'))
            .unwrap_or(trimmed);
    }

    if after.strip_start() {
        let trimmed = literal.trim_end_matches(is_space);
        literal = trimmed
            .strip_suffix("\r\n")
            .or_else(|| trimmed.strip_suffix('\n'))
            .unwrap_or(trimmed);
    }

    literal
}

/// Text of a value inside a template; null renders as nothing
fn interpolated(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => other.to_text(),
    }
}

fn iteration(collection: Value) -> Result<Vec<(Value, Value)>> {
    match collection {
        Value::Array(items) => Ok(items
            .into_iter()
            .enumerate()
            .map(|(index, item)| (Value::Integer(index as i64), item))
            .collect()),
        Value::Object(map) => Ok(map
            .into_iter()
            .map(|(key, value)| (Value::String(key), value))
            .collect()),
        Value::Null => Ok(Vec::new()),
        other => Err(EvalError::TypeMismatch(format!(
            "cannot iterate over a {}",
            other.kind()
        ))),
    }
}

fn splat_items(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

fn get_attr(value: Value, name: &str) -> Result<Value> {
    match value {
        Value::Object(mut map) => map
            .swap_remove(name)
            .ok_or_else(|| EvalError::MissingAttribute(name.to_string())),
        other => Err(EvalError::TypeMismatch(format!(
            "cannot read attribute `{name}` of a {}",
            other.kind()
        ))),
    }
}

fn index_into(value: Value, index: &Value) -> Result<Value> {
    match value {
        Value::Array(mut items) => {
            let position = numeric(index)
                .and_then(|n| n.as_i64())
                .ok_or_else(|| {
                    EvalError::TypeMismatch(format!("list index must be a number, got {index}"))
                })?;
            let len = items.len();
            if position < 0 || position as usize >= len {
                return Err(EvalError::IndexOutOfBounds {
                    index: position,
                    len,
                });
            }
            Ok(items.swap_remove(position as usize))
        }
        Value::Object(map) => get_attr(Value::Object(map), &index.to_text()),
        other => Err(EvalError::TypeMismatch(format!(
            "cannot index into a {}",
            other.kind()
        ))),
    }
}

/// Number view of a value; numeric strings qualify
fn numeric(value: &Value) -> Option<Value> {
    match value {
        Value::Integer(_) | Value::Decimal(_) => Some(value.clone()),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .map(Value::Integer)
                .or_else(|_| s.parse::<f64>().map(Value::Decimal))
                .ok()
        }
        _ => None,
    }
}

fn unary_op(operator: UnaryOperator, operand: Value) -> Result<Value> {
    match operator {
        UnaryOperator::Not => match operand {
            Value::Boolean(b) => Ok(Value::Boolean(!b)),
            other => Err(EvalError::TypeMismatch(format!(
                "`!` needs a bool, got {}",
                other.kind()
            ))),
        },
        UnaryOperator::Neg => match numeric(&operand) {
            Some(Value::Integer(i)) => Ok(Value::Integer(-i)),
            Some(Value::Decimal(d)) => Ok(Value::Decimal(-d)),
            _ => Err(EvalError::TypeMismatch(format!(
                "`-` needs a number, got {}",
                operand.kind()
            ))),
        },
    }
}

fn bool_operand(value: Value, operator: BinaryOperator) -> Result<bool> {
    value.as_bool().ok_or_else(|| {
        EvalError::TypeMismatch(format!(
            "`{}` needs bool operands, got {}",
            operator.as_str(),
            value.kind()
        ))
    })
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left.kind(), right.kind()) {
        (Kind::Number, Kind::Number) => left.as_f64() == right.as_f64(),
        _ => left == right,
    }
}

fn binary_op(left: Value, operator: BinaryOperator, right: Value) -> Result<Value> {
    use BinaryOperator::*;

    match operator {
        Eq => return Ok(Value::Boolean(values_equal(&left, &right))),
        NotEq => return Ok(Value::Boolean(!values_equal(&left, &right))),
        And | Or => {
            let (left, right) = (bool_operand(left, operator)?, bool_operand(right, operator)?);
            return Ok(Value::Boolean(match operator {
                And => left && right,
                _ => left || right,
            }));
        }
        _ => {}
    }

    let (Some(lhs), Some(rhs)) = (numeric(&left), numeric(&right)) else {
        return Err(EvalError::TypeMismatch(format!(
            "`{}` needs number operands, got {} and {}",
            operator.as_str(),
            left.kind(),
            right.kind()
        )));
    };

    let (a, b) = (lhs.as_f64().unwrap_or_default(), rhs.as_f64().unwrap_or_default());
    let integers = match (&lhs, &rhs) {
        (Value::Integer(a), Value::Integer(b)) => Some((*a, *b)),
        _ => None,
    };

    let value = match operator {
        Less => Value::Boolean(a < b),
        LessEq => Value::Boolean(a <= b),
        Greater => Value::Boolean(a > b),
        GreaterEq => Value::Boolean(a >= b),
        Plus => integers
            .and_then(|(a, b)| a.checked_add(b))
            .map_or(Value::Decimal(a + b), Value::Integer),
        Minus => integers
            .and_then(|(a, b)| a.checked_sub(b))
            .map_or(Value::Decimal(a - b), Value::Integer),
        Mul => integers
            .and_then(|(a, b)| a.checked_mul(b))
            .map_or(Value::Decimal(a * b), Value::Integer),
        Div | Mod if b == 0.0 => return Err(EvalError::DivisionByZero),
        Div => match integers {
            Some((a, b)) if a % b == 0 => Value::Integer(a / b),
            _ => Value::Decimal(a / b),
        },
        Mod => match integers {
            Some((a, b)) => Value::Integer(a % b),
            None => Value::Decimal(a % b),
        },
        Eq | NotEq | And | Or => return binary_op(lhs, operator, rhs),
    };

    Ok(value)
}
