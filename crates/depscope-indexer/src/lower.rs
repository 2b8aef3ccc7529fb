//! Lowering of tree-sitter nodes into [`Expr`]
//!
//! Only the node shapes the scanner cares about are lowered to their own
//! variants. Call shape matters most: local versus remote, parentheses,
//! trailing keywords, `do` blocks and pipes all feed into arity, and the
//! definition forms drive nesting. Every other named node becomes a
//! [`Expr::Block`] over its named children.

use tree_sitter::Node;

use crate::ast::{call_arity, keyword, DefKind, Expr, ImportFilter, Span};

/// Forms that take a `do` block but never resolve to a user macro.
const CONTROL_FORMS: &[&str] = &[
    "if", "unless", "case", "cond", "for", "with", "try", "receive", "quote",
];

pub(crate) struct Lowering<'s> {
    source: &'s [u8],
}

impl<'s> Lowering<'s> {
    pub(crate) fn new(source: &'s [u8]) -> Self {
        Lowering { source }
    }

    /// Top-level expressions of the `source` node.
    pub(crate) fn source(&self, root: Node<'_>) -> Vec<Expr> {
        self.items(root)
    }

    fn text(&self, node: Node<'_>) -> &'s str {
        node.utf8_text(self.source).unwrap_or_default()
    }

    /// Named children, with keyword lists spliced in as [`Expr::Keyword`]s.
    fn items(&self, node: Node<'_>) -> Vec<Expr> {
        let mut out = Vec::new();
        for child in named_children(node) {
            match child.kind() {
                "keywords" => out.extend(named_children(child).into_iter().map(|pair| self.expr(pair))),
                _ => out.push(self.expr(child)),
            }
        }
        out
    }

    fn block(&self, node: Node<'_>) -> Expr {
        Expr::Block { exprs: self.items(node), span: span_of(node) }
    }

    fn expr(&self, node: Node<'_>) -> Expr {
        let span = span_of(node);
        match node.kind() {
            "identifier" | "special_identifier" => Expr::Var { name: self.text(node).to_string(), span },
            "alias" => Expr::ModuleRef { name: compact(self.text(node)), span },
            "atom" | "quoted_atom" => {
                let name = self.text(node).trim_start_matches(':').trim_matches('"').to_string();
                Expr::Atom { name, span }
            }
            "integer" => match self.text(node).replace('_', "").parse::<i64>() {
                Ok(value) => Expr::Integer { value, span },
                Err(_) => Expr::Literal { span },
            },
            "float" | "char" | "boolean" | "nil" | "string" | "charlist" | "sigil" | "operator_identifier" => {
                Expr::Literal { span }
            }
            "pair" => self.pair(node),
            "map" => self.map(node),
            "unary_operator" => self.unary(node),
            "binary_operator" => self.binary(node),
            "dot" => self.dot(node),
            "call" => self.call(node),
            "do_block" => Expr::Block { exprs: self.do_body(node), span },
            _ => self.block(node),
        }
    }

    fn pair(&self, node: Node<'_>) -> Expr {
        let span = span_of(node);
        let key = node
            .child_by_field_name("key")
            .map(|k| self.text(k).trim().trim_end_matches(':').trim_matches('"').to_string())
            .unwrap_or_default();
        let value = match node.child_by_field_name("value") {
            Some(value) => self.expr(value),
            None => Expr::Literal { span },
        };
        Expr::Keyword { key, value: Box::new(value), span }
    }

    /// `%{...}`, `%Name{...}` and the update form `%Name{x | k: v}`.
    fn map(&self, node: Node<'_>) -> Expr {
        let span = span_of(node);
        let mut name = None;
        let mut fields = Vec::new();
        for child in named_children(node) {
            match child.kind() {
                "struct" => name = Some(compact(self.text(child))),
                _ => fields.extend(self.items(child)),
            }
        }
        match name {
            Some(name) => Expr::Struct { name, fields, span },
            None => Expr::Block { exprs: fields, span },
        }
    }

    fn unary(&self, node: Node<'_>) -> Expr {
        let span = span_of(node);
        let op = node.child_by_field_name("operator").map(|o| self.text(o)).unwrap_or_default();
        let Some(operand) = node.child_by_field_name("operand") else {
            return self.block(node);
        };
        match op {
            "@" => match operand.kind() {
                "call" if operand.child_by_field_name("target").is_some_and(|t| t.kind() == "identifier") => {
                    let name = operand.child_by_field_name("target").map(|t| self.text(t)).unwrap_or_default();
                    let value = named_children(operand)
                        .into_iter()
                        .find(|c| c.kind() == "arguments")
                        .and_then(|args| self.items(args).into_iter().next());
                    Expr::Attribute { name: name.to_string(), value: value.map(Box::new), span }
                }
                "identifier" => Expr::Attribute { name: self.text(operand).to_string(), value: None, span },
                _ => Expr::Operation { ops: vec![op.to_string()], operands: vec![self.expr(operand)], span },
            },
            "&" => self.capture(operand, span),
            _ => Expr::Operation { ops: vec![op.to_string()], operands: vec![self.expr(operand)], span },
        }
    }

    /// `&Mod.fun/2` and `&fun/1`; any other `&expr` is an anonymous function.
    fn capture(&self, operand: Node<'_>, span: Span) -> Expr {
        if operand.kind() == "binary_operator" {
            let op = operand.child_by_field_name("operator").map(|o| self.text(o));
            let left = operand.child_by_field_name("left");
            let right = operand.child_by_field_name("right");
            if let (Some("/"), Some(left), Some(right)) = (op, left, right) {
                let arity = match self.expr(right) {
                    Expr::Integer { value, .. } => usize::try_from(value).ok(),
                    _ => None,
                };
                let captured = match self.expr(left) {
                    Expr::RemoteCall { module, name, parens: false, args, .. } if args.is_empty() => {
                        Some((Some(module), name))
                    }
                    Expr::Var { name, .. } => Some((None, name)),
                    _ => None,
                };
                if let (Some(arity), Some((module, name))) = (arity, captured) {
                    return Expr::Capture { module, name, arity, span };
                }
            }
        }
        Expr::Block { exprs: vec![self.expr(operand)], span }
    }

    fn binary(&self, node: Node<'_>) -> Expr {
        let span = span_of(node);
        let op = node.child_by_field_name("operator").map(|o| self.text(o)).unwrap_or_default();
        let mut operands = Vec::with_capacity(2);
        operands.extend(node.child_by_field_name("left").map(|l| self.expr(l)));
        if let Some(right) = node.child_by_field_name("right") {
            let mut right = self.expr(right);
            if op == "|>" {
                bump_arity(&mut right);
            }
            operands.push(right);
        }
        Expr::Operation { ops: vec![compact_op(op)], operands, span }
    }

    /// `A.{B, C}` groups and dotted module paths such as `__MODULE__.Sub`.
    fn dot(&self, node: Node<'_>) -> Expr {
        let span = span_of(node);
        if let Some(name) = self.module_path(node) {
            return Expr::ModuleRef { name, span };
        }
        let base = node.child_by_field_name("left").and_then(|l| self.module_path(l));
        let right = node.child_by_field_name("right");
        if let (Some(base), Some(right)) = (base, right) {
            if right.kind() == "tuple" {
                let names = named_children(right)
                    .into_iter()
                    .filter(|n| n.kind() == "alias")
                    .map(|n| compact(self.text(n)))
                    .collect();
                return Expr::ModuleGroup { base, names, span };
            }
        }
        self.block(node)
    }

    fn module_path(&self, node: Node<'_>) -> Option<String> {
        match node.kind() {
            "alias" => Some(compact(self.text(node))),
            "identifier" if self.text(node) == "__MODULE__" => Some("__MODULE__".to_string()),
            "dot" => {
                let left = self.module_path(node.child_by_field_name("left")?)?;
                let right = node.child_by_field_name("right")?;
                (right.kind() == "alias").then(|| format!("{}.{}", left, compact(self.text(right))))
            }
            _ => None,
        }
    }

    fn call(&self, node: Node<'_>) -> Expr {
        let span = span_of(node);
        let Some(target) = node.child_by_field_name("target") else {
            return self.block(node);
        };

        let mut arguments = None;
        let mut do_node = None;
        for child in named_children(node) {
            match child.kind() {
                "arguments" => arguments = Some(child),
                "do_block" => do_node = Some(child),
                _ => {}
            }
        }
        let args = arguments.map(|a| self.items(a)).unwrap_or_default();
        let parens = arguments.is_some_and(|a| a.child(0).is_some_and(|c| c.kind() == "("));
        // Calls span their name and arguments; the `do` block is separate.
        let call_end = span_of(arguments.unwrap_or(target)).end;
        let call_span = Span::new(span.start, call_end);
        let do_block = do_node.map(|d| (self.do_body(d), span_of(d)));

        match target.kind() {
            "identifier" => lower_local_call(self.text(target).to_string(), args, do_block, call_span),
            "dot" => {
                let module = target.child_by_field_name("left").and_then(|l| self.module_path(l));
                let name = target.child_by_field_name("right").filter(|r| r.kind() == "identifier");
                match (module, name) {
                    (Some(module), Some(name)) => Expr::RemoteCall {
                        module,
                        name: self.text(name).to_string(),
                        arity: call_arity(&args, do_block.is_some()),
                        args: append_do_block(args, do_block),
                        parens,
                        span: call_span,
                    },
                    // `value.field`, `fun.(args)` and calls on non-module receivers.
                    _ => {
                        let mut exprs: Vec<Expr> =
                            target.child_by_field_name("left").map(|l| self.expr(l)).into_iter().collect();
                        exprs.extend(append_do_block(args, do_block));
                        Expr::Block { exprs, span }
                    }
                }
            }
            // `unquote(name)(args)` and other calls on call results.
            _ => {
                let mut exprs = vec![self.expr(target)];
                exprs.extend(append_do_block(args, do_block));
                Expr::Block { exprs, span }
            }
        }
    }

    /// Body of a `do` block with its `else`/`rescue`/`catch`/`after` clauses
    /// spliced in.
    fn do_body(&self, node: Node<'_>) -> Vec<Expr> {
        let mut body = Vec::new();
        for child in named_children(node) {
            if child.kind().ends_with("_block") {
                body.extend(self.items(child));
            } else {
                body.push(self.expr(child));
            }
        }
        body
    }
}

fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).filter(|c| c.kind() != "comment").collect()
}

fn span_of(node: Node<'_>) -> Span {
    let line = |row: usize| u32::try_from(row + 1).unwrap_or(u32::MAX);
    Span::new(line(node.start_position().row), line(node.end_position().row))
}

fn compact(text: &str) -> String {
    text.split_whitespace().collect()
}

/// Operator text with inner whitespace collapsed, so `not  in` reads `not in`.
fn compact_op(op: &str) -> String {
    op.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The pipe passes its left side as the first argument.
fn bump_arity(expr: &mut Expr) {
    match expr {
        Expr::RemoteCall { arity, .. } | Expr::LocalCall { arity, .. } => *arity += 1,
        _ => {}
    }
}

fn append_do_block(mut args: Vec<Expr>, do_block: Option<(Vec<Expr>, Span)>) -> Vec<Expr> {
    if let Some((exprs, span)) = do_block {
        args.push(Expr::Block { exprs, span });
    }
    args
}

fn module_name(expr: Option<&Expr>) -> Option<String> {
    match expr {
        Some(Expr::ModuleRef { name, .. }) => Some(name.clone()),
        Some(Expr::Var { name, .. }) if name == "__MODULE__" => Some(name.clone()),
        _ => None,
    }
}

/// `do` block body, or the `do:` keyword value.
fn body_of(args: &[Expr], do_block: Option<(Vec<Expr>, Span)>) -> Vec<Expr> {
    match do_block {
        Some((exprs, _)) => exprs,
        None => keyword(args, "do").cloned().into_iter().collect(),
    }
}

fn name_arity_list(expr: Option<&Expr>) -> Option<Vec<(String, usize)>> {
    let Some(Expr::Block { exprs, .. }) = expr else {
        return None;
    };
    Some(
        exprs
            .iter()
            .filter_map(|e| match e {
                Expr::Keyword { key, value, .. } => match value.as_ref() {
                    Expr::Integer { value, .. } => Some((key.clone(), usize::try_from(*value).ok()?)),
                    _ => None,
                },
                _ => None,
            })
            .collect(),
    )
}

fn import_filter(args: &[Expr]) -> ImportFilter {
    if let Some(only) = keyword(args, "only") {
        return match only {
            Expr::Atom { name, .. } if name == "functions" => ImportFilter::Functions,
            Expr::Atom { name, .. } if name == "macros" => ImportFilter::Macros,
            other => ImportFilter::Only(name_arity_list(Some(other)).unwrap_or_default()),
        };
    }
    match name_arity_list(keyword(args, "except")) {
        Some(list) => ImportFilter::Except(list),
        None => ImportFilter::All,
    }
}

/// Split a function head into (name, args), looking through `when` guards.
fn function_head(expr: Option<&Expr>) -> Option<(String, Vec<Expr>)> {
    match expr? {
        Expr::LocalCall { name, args, .. } => Some((name.clone(), args.clone())),
        Expr::Var { name, .. } => Some((name.clone(), Vec::new())),
        Expr::Operation { ops, operands, .. } if ops.first().is_some_and(|op| op == "when") => {
            function_head(operands.first())
        }
        // `def unquote(name)(args)` inside generated code.
        Expr::Block { exprs, .. } => match exprs.split_first() {
            Some((Expr::LocalCall { name, .. }, args)) if name == "unquote" => {
                Some((name.clone(), args.to_vec()))
            }
            _ => None,
        },
        _ => None,
    }
}

fn lower_local_call(name: String, args: Vec<Expr>, do_block: Option<(Vec<Expr>, Span)>, span: Span) -> Expr {
    let def_kind = match name.as_str() {
        "def" | "defdelegate" => Some(DefKind::Def),
        "defp" => Some(DefKind::Defp),
        "defmacro" | "defguard" => Some(DefKind::Defmacro),
        "defmacrop" | "defguardp" => Some(DefKind::Defmacrop),
        _ => None,
    };
    // Definitions span their whole body.
    let outer = match &do_block {
        Some((_, block)) => Span::new(span.start, block.end),
        None => span,
    };

    if let Some(kind) = def_kind {
        if let Some((fun, head)) = function_head(args.first()) {
            let defaults = head
                .iter()
                .filter(|a| matches!(a, Expr::Operation { ops, .. } if ops.first().is_some_and(|op| op == "\\\\")))
                .count();
            let mut body = body_of(&args, do_block);
            if name == "defdelegate" {
                body.extend(keyword(&args, "to").cloned());
            }
            return Expr::Def { kind, name: fun, arity: head.len(), defaults, head, body, span: outer };
        }
    }

    match name.as_str() {
        "defmodule" | "defprotocol" => {
            if let Some(module) = module_name(args.first()) {
                let body = body_of(&args, do_block);
                return Expr::Module { name: module, body, span: outer };
            }
        }
        "defimpl" => {
            if let Some(protocol) = module_name(args.first()) {
                let name = match module_name(keyword(&args, "for")) {
                    Some(target) => format!("{protocol}.{target}"),
                    None => protocol,
                };
                let body = body_of(&args, do_block);
                return Expr::Module { name, body, span: outer };
            }
        }
        "alias" => {
            let targets = match args.first() {
                Some(Expr::ModuleRef { name, .. }) => vec![name.clone()],
                Some(Expr::ModuleGroup { base, names, .. }) => {
                    names.iter().map(|n| format!("{base}.{n}")).collect()
                }
                _ => Vec::new(),
            };
            if !targets.is_empty() {
                let as_name = module_name(keyword(&args, "as"));
                return Expr::Alias { targets, as_name, span };
            }
        }
        "import" => {
            if let Some(target) = module_name(args.first()) {
                return Expr::Import { target, filter: import_filter(&args), span };
            }
        }
        "require" => {
            if let Some(target) = module_name(args.first()) {
                let as_name = module_name(keyword(&args, "as"));
                return Expr::Require { target, as_name, span };
            }
        }
        "use" => {
            if let Some(target) = module_name(args.first()) {
                let rest = args.into_iter().skip(1).collect();
                return Expr::Use { target, args: append_do_block(rest, do_block), span };
            }
        }
        "defstruct" | "defexception" => {
            return Expr::StructDef { fields: args, span };
        }
        control if CONTROL_FORMS.contains(&control) => {
            let mut exprs = args;
            if let Some((body, _)) = do_block {
                exprs.extend(body);
            }
            return Expr::Block { exprs, span };
        }
        _ => {}
    }

    let arity = call_arity(&args, do_block.is_some());
    Expr::LocalCall { name, arity, args: append_do_block(args, do_block), span }
}
