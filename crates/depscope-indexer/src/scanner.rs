//! AST scanner: pattern-matches parsed source for the expression classes
//! that establish dependencies between modules.
//!
//! Every query walks the tree with a [`Cursor`] that tracks the lexical
//! alias/import scope and the nesting module path, so names are compared in
//! their canonical form.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::ast::{Expr, Span};
use crate::error::ScanError;
use crate::manifest::ModuleExports;
use crate::parser;
use crate::resolver::NameResolver;

/// A parsed source file.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub exprs: Vec<Expr>,
    pub line_count: usize,
}

impl SourceFile {
    pub fn load(path: &Path) -> Result<Self, ScanError> {
        let text = std::fs::read_to_string(path).map_err(|e| ScanError::FileNotFound {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::parse(path, &text)
    }

    pub fn parse(path: impl Into<PathBuf>, text: &str) -> Result<Self, ScanError> {
        let path = path.into();
        let exprs = parser::parse(text).map_err(|e| ScanError::Parse {
            path: path.clone(),
            line: e.line,
            message: e.message,
        })?;
        Ok(SourceFile { path, exprs, line_count: text.lines().count() })
    }
}

/// Module-level directive kinds for [`scan_module_exprs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleExprKind {
    Import,
    /// `require` and `use`.
    Require,
}

/// One matched expression.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ExprMatch {
    pub span: Span,
    /// Canonical module the expression refers to.
    pub target: String,
    /// Called `(name, arity)` for calls.
    pub function: Option<(String, usize)>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StructDefinition {
    pub module: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleReference {
    pub module: String,
    pub span: Span,
    pub in_function: bool,
    /// Target of an `import`, `require` or `use` rather than a use of the module.
    pub directive: bool,
}

/// Traversal state threaded through every visit.
struct Cursor {
    resolver: NameResolver,
    modules: Vec<String>,
    in_function: bool,
    descend_defs: bool,
}

impl Cursor {
    fn new(descend_defs: bool) -> Self {
        Cursor {
            resolver: NameResolver::new(),
            modules: Vec::new(),
            in_function: false,
            descend_defs,
        }
    }

    fn current_module(&self) -> Option<&str> {
        self.modules.last().map(String::as_str)
    }

    /// Canonical module name, with `__MODULE__` expanded.
    fn canonical(&self, name: &str) -> Option<String> {
        match name.strip_prefix("__MODULE__") {
            Some(rest) => self.current_module().map(|m| format!("{m}{rest}")),
            None => Some(self.resolver.resolve(name)),
        }
    }

    fn walk(&mut self, exprs: &[Expr], visit: &mut dyn FnMut(&Expr, &Cursor)) {
        for expr in exprs {
            self.walk_expr(expr, visit);
        }
    }

    fn walk_expr(&mut self, expr: &Expr, visit: &mut dyn FnMut(&Expr, &Cursor)) {
        match expr {
            Expr::Module { name, body, .. } => {
                let full = match self.current_module().map(str::to_string) {
                    Some(parent) => {
                        // Nested modules alias their first segment in the parent scope.
                        let first = name.split('.').next().unwrap_or(name);
                        let full = format!("{parent}.{name}");
                        self.resolver.bind(first, &format!("{parent}.{first}"));
                        full
                    }
                    None => self.resolver.resolve(name),
                };
                self.modules.push(full);
                self.resolver.push_scope();
                visit(expr, self);
                self.walk(body, visit);
                self.resolver.pop_scope();
                self.modules.pop();
            }
            Expr::Def { .. } => {
                visit(expr, self);
                if self.descend_defs {
                    let outer = std::mem::replace(&mut self.in_function, true);
                    self.resolver.push_scope();
                    for child in expr.children() {
                        self.walk_expr(child, visit);
                    }
                    self.resolver.pop_scope();
                    self.in_function = outer;
                }
            }
            Expr::Alias { targets, as_name, .. } => {
                visit(expr, self);
                let as_name = if targets.len() == 1 { as_name.as_deref() } else { None };
                for target in targets {
                    let Some(full) = self.canonical(target) else {
                        continue;
                    };
                    let short = as_name.unwrap_or_else(|| full.rsplit('.').next().unwrap_or(&full));
                    let short = short.to_string();
                    self.resolver.bind(&short, &full);
                }
            }
            Expr::Import { target, filter, .. } => {
                visit(expr, self);
                if let Some(target) = self.canonical(target) {
                    self.resolver.import(&target, filter.clone());
                }
            }
            Expr::Require { target, as_name, .. } => {
                visit(expr, self);
                if let Some(target) = self.canonical(target) {
                    self.resolver.require(&target);
                    if let Some(as_name) = as_name {
                        self.resolver.bind(as_name, &target);
                    }
                }
            }
            Expr::Use { target, args, .. } => {
                visit(expr, self);
                self.walk(args, visit);
                if let Some(target) = self.canonical(target) {
                    self.resolver.require(&target);
                }
            }
            Expr::Block { exprs, .. } => {
                visit(expr, self);
                self.resolver.push_scope();
                self.walk(exprs, visit);
                self.resolver.pop_scope();
            }
            _ => {
                visit(expr, self);
                for child in expr.children() {
                    self.walk_expr(child, visit);
                }
            }
        }
    }
}

fn walk_file(file: &SourceFile, descend_defs: bool, visit: &mut dyn FnMut(&Expr, &Cursor)) {
    Cursor::new(descend_defs).walk(&file.exprs, visit);
}

fn finish(mut matches: Vec<ExprMatch>) -> Vec<ExprMatch> {
    matches.sort();
    matches.dedup();
    matches
}

fn require_module(file: &SourceFile, module: &str) -> Result<(), ScanError> {
    if defined_modules(file).iter().any(|m| m == module) {
        Ok(())
    } else {
        Err(ScanError::ModuleNotFound { module: module.to_string(), path: file.path.clone() })
    }
}

/// Every module defined in the file, in definition order.
pub fn defined_modules(file: &SourceFile) -> Vec<String> {
    let mut modules = Vec::new();
    walk_file(file, false, &mut |expr, cursor| {
        if let (Expr::Module { .. }, Some(module)) = (expr, cursor.current_module()) {
            modules.push(module.to_string());
        }
    });
    modules
}

/// `import` (or `require`/`use`) directives written in `module`'s own body
/// or its function bodies. Directives of nested modules are not included.
pub fn scan_module_exprs(
    file: &SourceFile,
    module: &str,
    kind: ModuleExprKind,
) -> Result<Vec<ExprMatch>, ScanError> {
    require_module(file, module)?;
    let mut matches = Vec::new();
    walk_file(file, true, &mut |expr, cursor| {
        if cursor.current_module() != Some(module) {
            return;
        }
        let target = match (expr, kind) {
            (Expr::Import { target, .. }, ModuleExprKind::Import) => target,
            (Expr::Require { target, .. }, ModuleExprKind::Require) => target,
            (Expr::Use { target, .. }, ModuleExprKind::Require) => target,
            _ => return,
        };
        if let Some(target) = cursor.canonical(target) {
            matches.push(ExprMatch { span: expr.span(), target, function: None });
        }
    });
    Ok(finish(matches))
}

/// Struct literals whose canonical struct name is in `names`.
pub fn struct_exprs(file: &SourceFile, names: &HashSet<String>) -> Vec<ExprMatch> {
    let mut matches = Vec::new();
    walk_file(file, true, &mut |expr, cursor| {
        if let Expr::Struct { name, span, .. } = expr {
            if let Some(target) = cursor.canonical(name).filter(|t| names.contains(t)) {
                matches.push(ExprMatch { span: *span, target, function: None });
            }
        }
    });
    finish(matches)
}

/// `defstruct` / `defexception` statements with their owning module.
pub fn struct_defs(file: &SourceFile) -> Vec<StructDefinition> {
    let mut defs = Vec::new();
    walk_file(file, false, &mut |expr, cursor| {
        if let (Expr::StructDef { span, .. }, Some(module)) = (expr, cursor.current_module()) {
            defs.push(StructDefinition { module: module.to_string(), span: *span });
        }
    });
    defs
}

/// Invocations of `module`'s exported macros, anywhere in the file.
///
/// Qualified calls count once the module is required (or imported or
/// used); bare calls count when the import filter lets the macro through.
/// `use module` always counts as an invocation of its `__using__/1`.
pub fn macro_exprs(file: &SourceFile, module: &str, exports: &ModuleExports) -> Vec<ExprMatch> {
    let mut matches = Vec::new();
    walk_file(file, true, &mut |expr, cursor| {
        let hit = match expr {
            Expr::Use { target, .. } if cursor.canonical(target).as_deref() == Some(module) => {
                Some(("__using__".to_string(), 1))
            }
            Expr::RemoteCall { module: m, name, arity, .. }
                if cursor.canonical(m).as_deref() == Some(module)
                    && cursor.resolver.is_required(module)
                    && exports.has_macro(name, *arity) =>
            {
                Some((name.clone(), *arity))
            }
            Expr::LocalCall { name, arity, .. } if imports_bare(cursor, module, name, *arity, exports, true) => {
                Some((name.clone(), *arity))
            }
            _ => None,
        };
        if let Some(function) = hit {
            matches.push(ExprMatch { span: expr.span(), target: module.to_string(), function: Some(function) });
        }
    });
    finish(matches)
}

/// Calls to `module`'s exported functions made outside any function body.
pub fn compile_invocation_exprs(file: &SourceFile, module: &str, exports: &ModuleExports) -> Vec<ExprMatch> {
    let mut matches = Vec::new();
    walk_file(file, false, &mut |expr, cursor| {
        let hit = match expr {
            Expr::RemoteCall { module: m, name, arity, .. }
                if cursor.canonical(m).as_deref() == Some(module) && exports.has_function(name, *arity) =>
            {
                Some((name.clone(), *arity))
            }
            Expr::LocalCall { name, arity, .. } if imports_bare(cursor, module, name, *arity, exports, false) => {
                Some((name.clone(), *arity))
            }
            _ => None,
        };
        if let Some(function) = hit {
            matches.push(ExprMatch { span: expr.span(), target: module.to_string(), function: Some(function) });
        }
    });
    finish(matches)
}

fn imports_bare(
    cursor: &Cursor,
    module: &str,
    name: &str,
    arity: usize,
    exports: &ModuleExports,
    is_macro: bool,
) -> bool {
    let exported = if is_macro { exports.has_macro(name, arity) } else { exports.has_function(name, arity) };
    exported
        && cursor
            .resolver
            .import_filter(module)
            .is_some_and(|filter| filter.allows(name, arity, is_macro))
}

/// Every resolved module reference in the file.
pub fn module_references(file: &SourceFile) -> Vec<ModuleReference> {
    let mut refs = Vec::new();
    walk_file(file, true, &mut |expr, cursor| {
        let (names, directive): (Vec<&str>, bool) = match expr {
            Expr::RemoteCall { module, .. } => (vec![module.as_str()], false),
            Expr::Capture { module: Some(module), .. } => (vec![module.as_str()], false),
            Expr::Struct { name, .. } | Expr::ModuleRef { name, .. } => (vec![name.as_str()], false),
            Expr::Import { target, .. } | Expr::Require { target, .. } | Expr::Use { target, .. } => {
                (vec![target.as_str()], true)
            }
            Expr::ModuleGroup { base, names, span } => {
                for name in names {
                    if let Some(module) = cursor.canonical(&format!("{base}.{name}")) {
                        refs.push(ModuleReference {
                            module,
                            span: *span,
                            in_function: cursor.in_function,
                            directive: false,
                        });
                    }
                }
                (Vec::new(), false)
            }
            _ => (Vec::new(), false),
        };
        for name in names {
            if let Some(module) = cursor.canonical(name) {
                refs.push(ModuleReference {
                    module,
                    span: expr.span(),
                    in_function: cursor.in_function,
                    directive,
                });
            }
        }
    });
    refs.sort();
    refs.dedup();
    refs
}

/// Public functions and macros defined directly in `module`. Default
/// arguments make every shorter arity callable too.
pub fn module_exports(file: &SourceFile, module: &str) -> Result<ModuleExports, ScanError> {
    require_module(file, module)?;
    let mut exports = ModuleExports::default();
    walk_file(file, false, &mut |expr, cursor| {
        let Expr::Def { kind, name, arity, defaults, .. } = expr else {
            return;
        };
        if !kind.is_public() || cursor.current_module() != Some(module) {
            return;
        }
        let set: &mut BTreeSet<(String, usize)> =
            if kind.is_macro() { &mut exports.macros } else { &mut exports.functions };
        for callable in arity.saturating_sub(*defaults)..=*arity {
            set.insert((name.clone(), callable));
        }
    });
    Ok(exports)
}
