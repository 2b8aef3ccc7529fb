//! Syntax tree for scanned module source.
//!
//! Only the shapes the scanner pattern-matches get their own variant;
//! everything else is an opaque [`Expr::Block`] whose children are still
//! walked. Every node carries the line span it was parsed from.

use serde::{Deserialize, Serialize};

/// 1-based, inclusive line span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Span { start, end: end.max(start) }
    }

    pub fn line(line: u32) -> Self {
        Span { start: line, end: line }
    }
}

/// Which definition macro introduced a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefKind {
    Def,
    Defp,
    Defmacro,
    Defmacrop,
}

impl DefKind {
    pub fn is_public(&self) -> bool {
        matches!(self, DefKind::Def | DefKind::Defmacro)
    }

    pub fn is_macro(&self) -> bool {
        matches!(self, DefKind::Defmacro | DefKind::Defmacrop)
    }
}

/// `import` filter from `only:` / `except:` options.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ImportFilter {
    #[default]
    All,
    Only(Vec<(String, usize)>),
    Except(Vec<(String, usize)>),
    Functions,
    Macros,
}

impl ImportFilter {
    /// Whether `name/arity` is brought into scope. `is_macro` tells which
    /// export set the name comes from.
    pub fn allows(&self, name: &str, arity: usize, is_macro: bool) -> bool {
        match self {
            ImportFilter::All => true,
            ImportFilter::Only(list) => list.iter().any(|(n, a)| n == name && *a == arity),
            ImportFilter::Except(list) => !list.iter().any(|(n, a)| n == name && *a == arity),
            ImportFilter::Functions => !is_macro,
            ImportFilter::Macros => is_macro,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `defmodule Name do ... end` (also `defprotocol` / `defimpl`).
    Module { name: String, body: Vec<Expr>, span: Span },
    /// `def`-family definition. `defaults` counts `\\` default arguments.
    Def {
        kind: DefKind,
        name: String,
        arity: usize,
        defaults: usize,
        head: Vec<Expr>,
        body: Vec<Expr>,
        span: Span,
    },
    /// `alias A.B`, `alias A.B, as: C`, `alias A.{B, C}`.
    Alias { targets: Vec<String>, as_name: Option<String>, span: Span },
    Import { target: String, filter: ImportFilter, span: Span },
    Require { target: String, as_name: Option<String>, span: Span },
    Use { target: String, args: Vec<Expr>, span: Span },
    /// `defstruct` / `defexception`.
    StructDef { fields: Vec<Expr>, span: Span },
    /// `%Name{...}`
    Struct { name: String, fields: Vec<Expr>, span: Span },
    /// `Mod.fun(args)`; `parens` is false for `Mod.fun` and no-paren calls.
    RemoteCall {
        module: String,
        name: String,
        arity: usize,
        args: Vec<Expr>,
        parens: bool,
        span: Span,
    },
    LocalCall { name: String, arity: usize, args: Vec<Expr>, span: Span },
    /// `&Mod.fun/2` or `&fun/1`.
    Capture { module: Option<String>, name: String, arity: usize, span: Span },
    /// A bare module name used as a value.
    ModuleRef { name: String, span: Span },
    /// `A.{B, C}` outside of an alias.
    ModuleGroup { base: String, names: Vec<String>, span: Span },
    /// `@name value`
    Attribute { name: String, value: Option<Box<Expr>>, span: Span },
    /// `key: value` inside a keyword list.
    Keyword { key: String, value: Box<Expr>, span: Span },
    /// Unary or binary operator application.
    Operation { ops: Vec<String>, operands: Vec<Expr>, span: Span },
    /// Lists, tuples, maps, `fn`, control flow and any other container.
    Block { exprs: Vec<Expr>, span: Span },
    Var { name: String, span: Span },
    Atom { name: String, span: Span },
    Integer { value: i64, span: Span },
    Literal { span: Span },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Module { span, .. }
            | Expr::Def { span, .. }
            | Expr::Alias { span, .. }
            | Expr::Import { span, .. }
            | Expr::Require { span, .. }
            | Expr::Use { span, .. }
            | Expr::StructDef { span, .. }
            | Expr::Struct { span, .. }
            | Expr::RemoteCall { span, .. }
            | Expr::LocalCall { span, .. }
            | Expr::Capture { span, .. }
            | Expr::ModuleRef { span, .. }
            | Expr::ModuleGroup { span, .. }
            | Expr::Attribute { span, .. }
            | Expr::Keyword { span, .. }
            | Expr::Operation { span, .. }
            | Expr::Block { span, .. }
            | Expr::Var { span, .. }
            | Expr::Atom { span, .. }
            | Expr::Integer { span, .. }
            | Expr::Literal { span } => *span,
        }
    }

    /// Direct children in source order. Module and def bodies included.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Module { body, .. } => body.iter().collect(),
            Expr::Def { head, body, .. } => head.iter().chain(body.iter()).collect(),
            Expr::Use { args, .. } => args.iter().collect(),
            Expr::StructDef { fields, .. } | Expr::Struct { fields, .. } => fields.iter().collect(),
            Expr::RemoteCall { args, .. } | Expr::LocalCall { args, .. } => args.iter().collect(),
            Expr::Attribute { value, .. } => value.iter().map(Box::as_ref).collect(),
            Expr::Keyword { value, .. } => vec![value.as_ref()],
            Expr::Operation { operands, .. } => operands.iter().collect(),
            Expr::Block { exprs, .. } => exprs.iter().collect(),
            Expr::Alias { .. }
            | Expr::Import { .. }
            | Expr::Require { .. }
            | Expr::Capture { .. }
            | Expr::ModuleRef { .. }
            | Expr::ModuleGroup { .. }
            | Expr::Var { .. }
            | Expr::Atom { .. }
            | Expr::Integer { .. }
            | Expr::Literal { .. } => Vec::new(),
        }
    }
}

/// Arity of a call: positional arguments plus one for a trailing keyword
/// list (which a `do` block joins).
pub fn call_arity(args: &[Expr], has_do_block: bool) -> usize {
    let positional = args.iter().filter(|a| !matches!(a, Expr::Keyword { .. })).count();
    let has_keywords = has_do_block || args.iter().any(|a| matches!(a, Expr::Keyword { .. }));
    positional + usize::from(has_keywords)
}

/// Value of `key:` among trailing keyword arguments.
pub fn keyword<'a>(args: &'a [Expr], key: &str) -> Option<&'a Expr> {
    args.iter().find_map(|a| match a {
        Expr::Keyword { key: k, value, .. } if k == key => Some(value.as_ref()),
        _ => None,
    })
}
