//! Lexical alias, require and import tracking.

use std::collections::HashMap;

use crate::ast::ImportFilter;

#[derive(Debug, Default, Clone)]
struct Frame {
    aliases: HashMap<String, String>,
    requires: Vec<String>,
    imports: Vec<(String, ImportFilter)>,
}

/// Scope stack mirroring the lexical nesting of modules, functions and
/// blocks. Directives only affect the frame they appear in and frames
/// pushed after it.
#[derive(Debug, Clone)]
pub struct NameResolver {
    frames: Vec<Frame>,
}

impl Default for NameResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl NameResolver {
    pub fn new() -> Self {
        NameResolver { frames: vec![Frame::default()] }
    }

    pub fn push_scope(&mut self) {
        self.frames.push(Frame::default());
    }

    /// Pop the innermost scope. The root scope is never popped.
    pub fn pop_scope(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    fn current(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    /// `alias target` or `alias target, as: name`.
    pub fn alias(&mut self, target: &str, as_name: Option<&str>) {
        let resolved = self.resolve(target);
        let short = match as_name {
            Some(name) => name.to_string(),
            None => resolved.rsplit('.').next().unwrap_or(&resolved).to_string(),
        };
        self.current().aliases.insert(short, resolved);
    }

    /// Bind `short` to an already canonical name.
    pub fn bind(&mut self, short: &str, full: &str) {
        self.current().aliases.insert(short.to_string(), full.to_string());
    }

    /// Expand the leading segment of `name` through the visible aliases.
    pub fn resolve(&self, name: &str) -> String {
        let name = name.strip_prefix("Elixir.").unwrap_or(name);
        let (head, rest) = match name.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (name, None),
        };
        let expanded = self
            .frames
            .iter()
            .rev()
            .find_map(|frame| frame.aliases.get(head));
        match (expanded, rest) {
            (Some(full), Some(rest)) => format!("{full}.{rest}"),
            (Some(full), None) => full.clone(),
            (None, _) => name.to_string(),
        }
    }

    pub fn require(&mut self, module: &str) {
        let module = self.resolve(module);
        self.current().requires.push(module);
    }

    pub fn import(&mut self, module: &str, filter: ImportFilter) {
        let module = self.resolve(module);
        self.current().imports.push((module, filter));
    }

    /// Required, imported or used: any of these makes the module's macros
    /// callable with a qualified name.
    pub fn is_required(&self, module: &str) -> bool {
        self.frames.iter().any(|frame| {
            frame.requires.iter().any(|m| m == module) || frame.imports.iter().any(|(m, _)| m == module)
        })
    }

    /// Innermost visible import filter for `module`.
    pub fn import_filter(&self, module: &str) -> Option<&ImportFilter> {
        self.frames.iter().rev().find_map(|frame| {
            frame.imports.iter().rev().find(|(m, _)| m == module).map(|(_, filter)| filter)
        })
    }
}
