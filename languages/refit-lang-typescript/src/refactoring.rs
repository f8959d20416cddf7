//! TypeScript/JavaScript specific refactoring logic.
//!
//! Every operation parses the file with SWC and works from the syntax tree:
//! selections must line up with expression or statement spans, and scope
//! questions are answered from the bindings, references and writes the
//! collectors below record. A selection the analysis cannot vouch for is
//! rejected with `InvalidInput` rather than rewritten on a guess.

use crate::import_support::import_block_end;
use crate::parser::{self, ParsedModule};
use async_trait::async_trait;
use refit_foundation::{byte_offset, position_at, EditLocation, EditType, TextEdit, WorkspaceEdit};
use refit_plugin_api::{
    DeleteSymbolParams, ExtractParams, InlineParams, PluginApiError, PluginResult,
    RefactoringProvider,
};
use std::path::Path;
use swc_common::{BytePos, Span, Spanned};
use swc_ecma_ast::*;
use swc_ecma_visit::{Visit, VisitWith};
use tracing::debug;

/// Refactoring provider for TypeScript and JavaScript.
///
/// Inline function is not offered: without type information a call site
/// cannot be rewritten safely.
#[derive(Debug, Default)]
pub struct TypeScriptRefactoringProvider;

impl TypeScriptRefactoringProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RefactoringProvider for TypeScriptRefactoringProvider {
    fn supports_extract_function(&self) -> bool {
        true
    }

    async fn plan_extract_function(
        &self,
        source: &str,
        params: &ExtractParams,
    ) -> PluginResult<WorkspaceEdit> {
        debug!(file = %params.file_path.display(), name = %params.name, "Planning extract function");
        plan_extract_function(source, params)
    }

    fn supports_extract_variable(&self) -> bool {
        true
    }

    async fn plan_extract_variable(
        &self,
        source: &str,
        params: &ExtractParams,
    ) -> PluginResult<WorkspaceEdit> {
        debug!(file = %params.file_path.display(), name = %params.name, "Planning extract variable");
        plan_extract_variable(source, params)
    }

    fn supports_extract_constant(&self) -> bool {
        true
    }

    async fn plan_extract_constant(
        &self,
        source: &str,
        params: &ExtractParams,
    ) -> PluginResult<WorkspaceEdit> {
        debug!(file = %params.file_path.display(), name = %params.name, "Planning extract constant");
        plan_extract_constant(source, params)
    }

    fn supports_inline_variable(&self) -> bool {
        true
    }

    async fn plan_inline_variable(
        &self,
        source: &str,
        params: &InlineParams,
    ) -> PluginResult<WorkspaceEdit> {
        debug!(file = %params.file_path.display(), position = ?params.position, "Planning inline variable");
        plan_inline_variable(source, params)
    }

    fn supports_symbol_delete(&self) -> bool {
        true
    }

    async fn plan_delete_symbol(
        &self,
        source: &str,
        params: &DeleteSymbolParams,
    ) -> PluginResult<WorkspaceEdit> {
        debug!(file = %params.file_path.display(), position = ?params.position, "Planning symbol delete");
        plan_symbol_delete(source, params)
    }
}

// ============================================================================
// Edit helpers
// ============================================================================

fn location(source: &str, start: usize, end: usize) -> EditLocation {
    let s = position_at(source, start);
    let e = position_at(source, end);
    EditLocation::new(s.line, s.character, e.line, e.character)
}

fn replace(source: &str, start: usize, end: usize, new_text: impl Into<String>) -> TextEdit {
    TextEdit::replace(location(source, start, end), &source[start..end], new_text)
}

fn insert(source: &str, at: usize, text: impl Into<String>) -> TextEdit {
    TextEdit::insert(position_at(source, at), text)
}

fn single_file(path: &Path, edits: Vec<TextEdit>) -> WorkspaceEdit {
    let mut edit = WorkspaceEdit::new();
    edit.add_edits(path, edits);
    edit
}

fn selection_bytes(source: &str, range: &EditLocation) -> PluginResult<(usize, usize)> {
    let (start, end) = range
        .to_byte_range(source)
        .ok_or_else(|| PluginApiError::invalid_input("Selection is outside the file"))?;
    let selected = &source[start..end];
    let start = start + (selected.len() - selected.trim_start().len());
    let end = end - (selected.len() - selected.trim_end().len());
    if start >= end {
        return Err(PluginApiError::invalid_input("Selection is empty"));
    }
    Ok((start, end))
}

fn parse(source: &str, path: &Path) -> PluginResult<ParsedModule> {
    parser::parse_module(source, Some(path))
}

/// Offset just past the optional `;` ending a statement at `end`.
fn after_semicolon(source: &str, end: usize) -> usize {
    if source[end..].starts_with(';') {
        end + 1
    } else {
        end
    }
}

// ============================================================================
// Scope information
// ============================================================================

#[derive(Debug, Clone)]
struct Binding {
    name: String,
    offset: usize,
}

#[derive(Debug, Clone)]
struct Reference {
    name: String,
    start: usize,
    end: usize,
    /// `{ name }` in an object literal
    shorthand: bool,
}

/// Bindings, reads and writes of plain identifiers across a module.
#[derive(Debug, Default)]
struct ScopeInfo {
    bindings: Vec<Binding>,
    references: Vec<Reference>,
    writes: Vec<(String, usize)>,
}

impl ScopeInfo {
    fn collect(parsed: &ParsedModule) -> Self {
        let mut collector = ScopeCollector {
            parsed,
            info: ScopeInfo::default(),
        };
        parsed.module.visit_with(&mut collector);
        collector.info
    }

    fn references_between<'a>(
        &'a self,
        name: &'a str,
        start: usize,
        end: usize,
    ) -> impl Iterator<Item = &'a Reference> + 'a {
        self.references
            .iter()
            .filter(move |r| r.name == name && r.start >= start && r.start < end)
    }

    fn is_written_between(&self, name: &str, start: usize, end: usize) -> bool {
        self.writes
            .iter()
            .any(|(n, at)| n == name && *at >= start && *at < end)
    }
}

struct ScopeCollector<'a> {
    parsed: &'a ParsedModule,
    info: ScopeInfo,
}

impl ScopeCollector<'_> {
    fn bind_pattern(&mut self, pat: &Pat) {
        let mut names = Vec::new();
        parser::pattern_names(pat, &mut names);
        for (name, span) in names {
            self.bind(name, span);
        }
    }

    fn bind(&mut self, name: String, span: Span) {
        let offset = self.parsed.offset(span.lo);
        self.info.bindings.push(Binding { name, offset });
    }

    fn write(&mut self, name: String, span: Span) {
        let offset = self.parsed.offset(span.lo);
        self.info.writes.push((name, offset));
    }
}

impl Visit for ScopeCollector<'_> {
    fn visit_var_declarator(&mut self, n: &VarDeclarator) {
        self.bind_pattern(&n.name);
        n.visit_children_with(self);
    }

    fn visit_param(&mut self, n: &Param) {
        self.bind_pattern(&n.pat);
        n.visit_children_with(self);
    }

    fn visit_arrow_expr(&mut self, n: &ArrowExpr) {
        for param in &n.params {
            self.bind_pattern(param);
        }
        n.visit_children_with(self);
    }

    fn visit_catch_clause(&mut self, n: &CatchClause) {
        if let Some(param) = &n.param {
            self.bind_pattern(param);
        }
        n.visit_children_with(self);
    }

    fn visit_fn_decl(&mut self, n: &FnDecl) {
        self.bind(n.ident.sym.to_string(), n.ident.span);
        n.visit_children_with(self);
    }

    fn visit_class_decl(&mut self, n: &ClassDecl) {
        self.bind(n.ident.sym.to_string(), n.ident.span);
        n.visit_children_with(self);
    }

    fn visit_expr(&mut self, n: &Expr) {
        if let Expr::Ident(ident) = n {
            let (start, end) = self.parsed.range(ident.span);
            self.info.references.push(Reference {
                name: ident.sym.to_string(),
                start,
                end,
                shorthand: false,
            });
        }
        n.visit_children_with(self);
    }

    fn visit_prop(&mut self, n: &Prop) {
        if let Prop::Shorthand(ident) = n {
            let (start, end) = self.parsed.range(ident.span);
            self.info.references.push(Reference {
                name: ident.sym.to_string(),
                start,
                end,
                shorthand: true,
            });
        }
        n.visit_children_with(self);
    }

    fn visit_assign_expr(&mut self, n: &AssignExpr) {
        let mut targets = Vec::new();
        match &n.left {
            AssignTarget::Simple(SimpleAssignTarget::Ident(binding)) => {
                targets.push((binding.id.sym.to_string(), binding.id.span));
            }
            AssignTarget::Pat(AssignTargetPat::Array(array)) => {
                parser::array_pattern_names(array, &mut targets);
            }
            AssignTarget::Pat(AssignTargetPat::Object(object)) => {
                parser::object_pattern_names(object, &mut targets);
            }
            _ => {}
        }
        for (name, span) in targets {
            self.write(name, span);
        }
        n.visit_children_with(self);
    }

    fn visit_update_expr(&mut self, n: &UpdateExpr) {
        if let Expr::Ident(ident) = &*n.arg {
            self.write(ident.sym.to_string(), ident.span);
        }
        n.visit_children_with(self);
    }
}

// ============================================================================
// Extract variable / constant
// ============================================================================

/// What encloses an expression, innermost last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    /// A statement or module item starting at this offset
    Statement(usize),
    /// The expression body of an arrow function
    ArrowBody,
    /// Evaluated somewhere a preceding declaration cannot reach: parameter
    /// defaults, class fields, loop conditions, decorators, enum members
    Opaque,
}

#[derive(Debug, Clone, Copy)]
struct ExpressionMatch {
    frame: Option<Frame>,
    literal: bool,
}

/// Finds the outermost expression spanning exactly `target`.
struct ExpressionFinder<'a> {
    parsed: &'a ParsedModule,
    target: (usize, usize),
    frames: Vec<Frame>,
    found: Option<ExpressionMatch>,
}

impl ExpressionFinder<'_> {
    fn within<N: VisitWith<Self> + ?Sized>(&mut self, frame: Frame, node: &N) {
        self.frames.push(frame);
        node.visit_children_with(self);
        self.frames.pop();
    }
}

fn is_literal(expr: &Expr) -> bool {
    match expr {
        Expr::Lit(lit) => matches!(lit, Lit::Str(_) | Lit::Num(_) | Lit::Bool(_) | Lit::Null(_)),
        Expr::Tpl(tpl) => tpl.exprs.is_empty(),
        _ => false,
    }
}

impl Visit for ExpressionFinder<'_> {
    fn visit_module_item(&mut self, n: &ModuleItem) {
        match n {
            ModuleItem::ModuleDecl(decl) => {
                let start = self.parsed.range(decl.span()).0;
                self.within(Frame::Statement(start), n);
            }
            ModuleItem::Stmt(_) => n.visit_children_with(self),
        }
    }

    fn visit_stmt(&mut self, n: &Stmt) {
        let start = self.parsed.range(n.span()).0;
        self.within(Frame::Statement(start), n);
    }

    fn visit_arrow_expr(&mut self, n: &ArrowExpr) {
        self.frames.push(Frame::Opaque);
        n.params.visit_with(self);
        self.frames.pop();
        match &*n.body {
            BlockStmtOrExpr::Expr(body) => {
                self.frames.push(Frame::ArrowBody);
                body.visit_with(self);
                self.frames.pop();
            }
            BlockStmtOrExpr::BlockStmt(body) => body.visit_with(self),
        }
    }

    fn visit_param(&mut self, n: &Param) {
        self.within(Frame::Opaque, n);
    }

    fn visit_pat(&mut self, n: &Pat) {
        self.within(Frame::Opaque, n);
    }

    fn visit_class_prop(&mut self, n: &ClassProp) {
        self.within(Frame::Opaque, n);
    }

    fn visit_private_prop(&mut self, n: &PrivateProp) {
        self.within(Frame::Opaque, n);
    }

    fn visit_decorator(&mut self, n: &Decorator) {
        self.within(Frame::Opaque, n);
    }

    fn visit_ts_enum_decl(&mut self, n: &TsEnumDecl) {
        self.within(Frame::Opaque, n);
    }

    fn visit_for_stmt(&mut self, n: &ForStmt) {
        n.init.visit_with(self);
        self.frames.push(Frame::Opaque);
        n.test.visit_with(self);
        n.update.visit_with(self);
        self.frames.pop();
        n.body.visit_with(self);
    }

    fn visit_while_stmt(&mut self, n: &WhileStmt) {
        self.frames.push(Frame::Opaque);
        n.test.visit_with(self);
        self.frames.pop();
        n.body.visit_with(self);
    }

    fn visit_do_while_stmt(&mut self, n: &DoWhileStmt) {
        n.body.visit_with(self);
        self.frames.push(Frame::Opaque);
        n.test.visit_with(self);
        self.frames.pop();
    }

    fn visit_expr(&mut self, n: &Expr) {
        if self.found.is_some() {
            return;
        }
        if self.parsed.range(n.span()) == self.target {
            self.found = Some(ExpressionMatch {
                frame: self.frames.last().copied(),
                literal: is_literal(n),
            });
            return;
        }
        n.visit_children_with(self);
    }
}

fn find_expression(
    parsed: &ParsedModule,
    start: usize,
    end: usize,
) -> PluginResult<ExpressionMatch> {
    let mut finder = ExpressionFinder {
        parsed,
        target: (start, end),
        frames: Vec::new(),
        found: None,
    };
    parsed.module.visit_with(&mut finder);
    finder
        .found
        .ok_or_else(|| PluginApiError::invalid_input("Selection is not a complete expression"))
}

/// Plans an extract variable refactoring.
///
/// The expression is bound to a `const` declared on the line before the
/// enclosing statement, at its indentation.
pub fn plan_extract_variable(source: &str, params: &ExtractParams) -> PluginResult<WorkspaceEdit> {
    let (start, end) = selection_bytes(source, &params.range)?;
    let parsed = parse(source, &params.file_path)?;
    let found = find_expression(&parsed, start, end)?;

    let statement = match found.frame {
        Some(Frame::Statement(statement)) => statement,
        Some(Frame::ArrowBody) => {
            return Err(PluginApiError::invalid_input(
                "Selection is inside an arrow function body",
            ))
        }
        Some(Frame::Opaque) | None => {
            return Err(PluginApiError::invalid_input(
                "Selection is not inside a statement a declaration can precede",
            ))
        }
    };
    if statement == start {
        return Err(PluginApiError::invalid_input(
            "Selection is a whole statement; select an expression within it",
        ));
    }
    let insert_at = parser::line_start(source, statement);
    if !source[insert_at..statement].trim().is_empty() {
        return Err(PluginApiError::invalid_input(
            "Enclosing statement does not start its own line",
        ));
    }

    let indent = parser::indentation(&source[insert_at..]);
    let declaration = format!("{}const {} = {};\n", indent, params.name, &source[start..end]);
    Ok(single_file(
        &params.file_path,
        vec![
            insert(source, insert_at, declaration)
                .with_description(format!("Declare '{}'", params.name)),
            replace(source, start, end, params.name.clone())
                .with_description(format!("Use '{}'", params.name)),
        ],
    ))
}

fn is_screaming_snake_case(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
        && name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// Literal expressions whose source text equals `text`.
struct LiteralCollector<'a> {
    parsed: &'a ParsedModule,
    source: &'a str,
    text: &'a str,
    sites: Vec<usize>,
}

impl Visit for LiteralCollector<'_> {
    fn visit_expr(&mut self, n: &Expr) {
        if is_literal(n) {
            let (start, end) = self.parsed.range(n.span());
            if self.source.get(start..end) == Some(self.text) {
                self.sites.push(start);
            }
            return;
        }
        n.visit_children_with(self);
    }
}

/// Plans an extract constant refactoring.
///
/// The literal becomes a module-level `const` after the imports, and every
/// identical literal below the imports is replaced with it.
pub fn plan_extract_constant(source: &str, params: &ExtractParams) -> PluginResult<WorkspaceEdit> {
    let (start, end) = selection_bytes(source, &params.range)?;
    let parsed = parse(source, &params.file_path)?;
    let is_literal = find_expression(&parsed, start, end).is_ok_and(|found| found.literal);
    if !is_literal {
        return Err(PluginApiError::invalid_input(
            "Only literal values can be extracted to a constant",
        ));
    }
    if !is_screaming_snake_case(&params.name) {
        return Err(PluginApiError::invalid_input(format!(
            "Constant name '{}' must be SCREAMING_SNAKE_CASE",
            params.name
        )));
    }

    let insert_at = import_block_end(source, &parsed);
    if start < insert_at {
        return Err(PluginApiError::invalid_input(
            "Selection is inside the import block",
        ));
    }

    let literal = &source[start..end];
    let mut collector = LiteralCollector {
        parsed: &parsed,
        source,
        text: literal,
        sites: Vec::new(),
    };
    parsed.module.visit_with(&mut collector);
    let mut sites = collector.sites;
    sites.retain(|&i| i >= insert_at);
    sites.sort_unstable();

    let declaration = if insert_at == 0 {
        format!("const {} = {};\n\n", params.name, literal)
    } else {
        format!("\nconst {} = {};\n", params.name, literal)
    };
    let mut edits = vec![insert(source, insert_at, declaration)
        .with_description(format!("Declare constant '{}'", params.name))];
    edits.extend(sites.into_iter().map(|i| {
        replace(source, i, i + literal.len(), params.name.clone())
            .with_description(format!("Use constant '{}'", params.name))
    }));
    Ok(single_file(&params.file_path, edits))
}

// ============================================================================
// Extract function
// ============================================================================

#[derive(Debug)]
struct ExtractableFunction {
    required_parameters: Vec<String>,
    return_variables: Vec<String>,
    /// Whether a returned variable was declared with `let` or `var`
    mutable_return: bool,
    is_async: bool,
}

/// Names a statement declares at its own level.
fn declared_names(stmt: &Stmt, out: &mut Vec<(String, bool)>) {
    let Stmt::Decl(decl) = stmt else {
        return;
    };
    match decl {
        Decl::Var(var) => {
            let mutable = var.kind != VarDeclKind::Const;
            for declarator in &var.decls {
                let mut names = Vec::new();
                parser::pattern_names(&declarator.name, &mut names);
                out.extend(names.into_iter().map(|(name, _)| (name, mutable)));
            }
        }
        Decl::Fn(f) => out.push((f.ident.sym.to_string(), false)),
        Decl::Class(c) => out.push((c.ident.sym.to_string(), false)),
        _ => {}
    }
}

/// A run of sibling statements spanning exactly the selection.
struct StatementRunFinder<'a> {
    parsed: &'a ParsedModule,
    target: (usize, usize),
    declared: Option<Vec<(String, bool)>>,
}

impl StatementRunFinder<'_> {
    fn check<'s>(&mut self, stmts: impl Iterator<Item = &'s Stmt>) {
        if self.declared.is_some() {
            return;
        }
        let mut run: Option<Vec<(String, bool)>> = None;
        for stmt in stmts {
            let (start, end) = self.parsed.range(stmt.span());
            if run.is_none() && start == self.target.0 {
                run = Some(Vec::new());
            }
            let Some(declared) = run.as_mut() else {
                continue;
            };
            declared_names(stmt, declared);
            if end == self.target.1 {
                self.declared = run;
                return;
            }
            if end > self.target.1 {
                return;
            }
        }
    }
}

impl Visit for StatementRunFinder<'_> {
    fn visit_module(&mut self, n: &Module) {
        let covers_module_decl = n.body.iter().any(|item| {
            let (start, end) = self.parsed.range(item.span());
            matches!(item, ModuleItem::ModuleDecl(_))
                && start >= self.target.0
                && end <= self.target.1
        });
        if !covers_module_decl {
            self.check(n.body.iter().filter_map(|item| match item {
                ModuleItem::Stmt(stmt) => Some(stmt),
                ModuleItem::ModuleDecl(_) => None,
            }));
        }
        n.visit_children_with(self);
    }

    fn visit_block_stmt(&mut self, n: &BlockStmt) {
        self.check(n.stmts.iter());
        n.visit_children_with(self);
    }

    fn visit_switch_case(&mut self, n: &SwitchCase) {
        self.check(n.cons.iter());
        n.visit_children_with(self);
    }
}

/// Control flow that cannot survive being moved into a new function.
#[derive(Default)]
struct FlowCheck {
    function_depth: usize,
    this_depth: usize,
    loop_depth: usize,
    switch_depth: usize,
    labels: Vec<String>,
    is_async: bool,
    blocked: Option<String>,
}

impl FlowCheck {
    fn block(&mut self, reason: impl Into<String>) {
        if self.blocked.is_none() {
            self.blocked = Some(reason.into());
        }
    }

    fn in_loop<N: VisitWith<Self> + ?Sized>(&mut self, node: &N) {
        self.loop_depth += 1;
        node.visit_children_with(self);
        self.loop_depth -= 1;
    }

    fn in_function<N: VisitWith<Self> + ?Sized>(&mut self, binds_this: bool, node: &N) {
        let loops = std::mem::take(&mut self.loop_depth);
        let switches = std::mem::take(&mut self.switch_depth);
        self.function_depth += 1;
        self.this_depth += usize::from(binds_this);
        node.visit_children_with(self);
        self.this_depth -= usize::from(binds_this);
        self.function_depth -= 1;
        self.loop_depth = loops;
        self.switch_depth = switches;
    }
}

impl Visit for FlowCheck {
    fn visit_return_stmt(&mut self, n: &ReturnStmt) {
        if self.function_depth == 0 {
            self.block("Selection contains 'return'; control flow cannot leave an extracted function");
        }
        n.visit_children_with(self);
    }

    fn visit_break_stmt(&mut self, n: &BreakStmt) {
        let escapes = match &n.label {
            Some(label) => !self.labels.iter().any(|l| *l == *label.sym),
            None => self.loop_depth == 0 && self.switch_depth == 0,
        };
        if escapes {
            self.block("Selection contains 'break' that leaves the selection");
        }
    }

    fn visit_continue_stmt(&mut self, n: &ContinueStmt) {
        let escapes = match &n.label {
            Some(label) => !self.labels.iter().any(|l| *l == *label.sym),
            None => self.loop_depth == 0,
        };
        if escapes {
            self.block("Selection contains 'continue' that leaves the selection");
        }
    }

    fn visit_labeled_stmt(&mut self, n: &LabeledStmt) {
        self.labels.push(n.label.sym.to_string());
        n.visit_children_with(self);
        self.labels.pop();
    }

    fn visit_yield_expr(&mut self, n: &YieldExpr) {
        if self.function_depth == 0 {
            self.block("Selection contains 'yield' and cannot leave its generator");
        }
        n.visit_children_with(self);
    }

    fn visit_this_expr(&mut self, _n: &ThisExpr) {
        if self.this_depth == 0 {
            self.block("Selection uses 'this' and cannot move out of its method");
        }
    }

    fn visit_await_expr(&mut self, n: &AwaitExpr) {
        if self.function_depth == 0 {
            self.is_async = true;
        }
        n.visit_children_with(self);
    }

    fn visit_for_stmt(&mut self, n: &ForStmt) {
        self.in_loop(n);
    }

    fn visit_for_in_stmt(&mut self, n: &ForInStmt) {
        self.in_loop(n);
    }

    fn visit_for_of_stmt(&mut self, n: &ForOfStmt) {
        if n.is_await && self.function_depth == 0 {
            self.is_async = true;
        }
        self.in_loop(n);
    }

    fn visit_while_stmt(&mut self, n: &WhileStmt) {
        self.in_loop(n);
    }

    fn visit_do_while_stmt(&mut self, n: &DoWhileStmt) {
        self.in_loop(n);
    }

    fn visit_switch_stmt(&mut self, n: &SwitchStmt) {
        self.switch_depth += 1;
        n.visit_children_with(self);
        self.switch_depth -= 1;
    }

    fn visit_function(&mut self, n: &Function) {
        self.in_function(true, n);
    }

    fn visit_constructor(&mut self, n: &Constructor) {
        self.in_function(true, n);
    }

    fn visit_getter_prop(&mut self, n: &GetterProp) {
        self.in_function(true, n);
    }

    fn visit_setter_prop(&mut self, n: &SetterProp) {
        self.in_function(true, n);
    }

    fn visit_arrow_expr(&mut self, n: &ArrowExpr) {
        self.in_function(false, n);
    }

    fn visit_class(&mut self, n: &Class) {
        self.this_depth += 1;
        n.visit_children_with(self);
        self.this_depth -= 1;
    }
}

/// Run [`FlowCheck`] over the statements inside `start..end`.
fn flow_check(parsed: &ParsedModule, start: usize, end: usize) -> FlowCheck {
    struct Selected<'a> {
        parsed: &'a ParsedModule,
        range: (usize, usize),
        check: FlowCheck,
    }

    impl Visit for Selected<'_> {
        fn visit_stmt(&mut self, n: &Stmt) {
            let (s, e) = self.parsed.range(n.span());
            if s >= self.range.0 && e <= self.range.1 {
                n.visit_with(&mut self.check);
            } else if s < self.range.1 && e > self.range.0 {
                n.visit_children_with(self);
            }
        }
    }

    let mut selected = Selected {
        parsed,
        range: (start, end),
        check: FlowCheck::default(),
    };
    parsed.module.visit_with(&mut selected);
    selected.check
}

fn analyze_extract_function(
    source: &str,
    parsed: &ParsedModule,
    start: usize,
    end: usize,
    declared_inside: Vec<(String, bool)>,
) -> PluginResult<ExtractableFunction> {
    let flow = flow_check(parsed, start, end);
    if let Some(reason) = flow.blocked {
        return Err(PluginApiError::invalid_input(reason));
    }

    let enclosing = parsed
        .module
        .body
        .iter()
        .map(|item| parsed.range(item.span()))
        .find(|&(s, e)| s < start && end <= e);
    let scope = ScopeInfo::collect(parsed);

    let mut required_parameters: Vec<String> = Vec::new();
    if let Some((scope_start, _)) = enclosing {
        for binding in scope
            .bindings
            .iter()
            .filter(|b| b.offset >= scope_start && b.offset < start)
        {
            let name = binding.name.as_str();
            if required_parameters.iter().any(|p| p == name)
                || declared_inside.iter().any(|(n, _)| n == name)
            {
                continue;
            }
            let written = scope.is_written_between(name, start, end);
            if written {
                return Err(PluginApiError::invalid_input(format!(
                    "Selection reassigns '{}', which is declared outside it",
                    name
                )));
            }
            if scope.references_between(name, start, end).next().is_some() {
                required_parameters.push(name.to_string());
            }
        }
    }

    let scope_end = enclosing.map_or(source.len(), |(_, e)| e);
    let mut return_variables = Vec::new();
    let mut mutable_return = false;
    for (name, mutable) in declared_inside {
        if return_variables.contains(&name) {
            continue;
        }
        if scope.references_between(&name, end, scope_end).next().is_some() {
            mutable_return |= mutable;
            return_variables.push(name);
        }
    }

    Ok(ExtractableFunction {
        required_parameters,
        return_variables,
        mutable_return,
        is_async: flow.is_async,
    })
}

fn generate_extracted_function(
    body: &str,
    analysis: &ExtractableFunction,
    function_name: &str,
) -> String {
    let base_indent = body
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| parser::indentation(line).len())
        .min()
        .unwrap_or(0);

    let mut rendered = String::new();
    for line in body.lines() {
        if line.trim().is_empty() {
            rendered.push('\n');
        } else {
            rendered.push_str("  ");
            rendered.push_str(&line[base_indent.min(parser::indentation(line).len())..]);
            rendered.push('\n');
        }
    }

    let return_statement = match analysis.return_variables.as_slice() {
        [] => String::new(),
        [single] => format!("  return {};\n", single),
        many => format!("  return {{ {} }};\n", many.join(", ")),
    };
    format!(
        "\n{}function {}({}) {{\n{}{}}}\n",
        if analysis.is_async { "async " } else { "" },
        function_name,
        analysis.required_parameters.join(", "),
        rendered,
        return_statement
    )
}

fn generate_function_call(analysis: &ExtractableFunction, function_name: &str) -> String {
    let call = format!(
        "{}{}({});",
        if analysis.is_async { "await " } else { "" },
        function_name,
        analysis.required_parameters.join(", ")
    );
    let binding = if analysis.mutable_return { "let" } else { "const" };
    match analysis.return_variables.as_slice() {
        [] => call,
        [single] => format!("{} {} = {}", binding, single, call),
        many => format!("{} {{ {} }} = {}", binding, many.join(", "), call),
    }
}

/// Plans an extract function refactoring.
///
/// The selection must cover whole lines holding a run of sibling
/// statements. Locals it reads become parameters and locals it declares
/// that are used afterwards are returned. The function is placed after the
/// enclosing top-level statement.
pub fn plan_extract_function(source: &str, params: &ExtractParams) -> PluginResult<WorkspaceEdit> {
    let (start, end) = selection_bytes(source, &params.range)?;

    let first_line = parser::line_start(source, start);
    let last_line_end = parser::line_end_inclusive(source, end);
    if !source[first_line..start].trim().is_empty()
        || !source[end..last_line_end].trim().is_empty()
    {
        return Err(PluginApiError::invalid_input(
            "Selection must cover whole statements",
        ));
    }

    let parsed = parse(source, &params.file_path)?;
    let mut finder = StatementRunFinder {
        parsed: &parsed,
        target: (start, end),
        declared: None,
    };
    parsed.module.visit_with(&mut finder);
    let declared_inside = finder.declared.ok_or_else(|| {
        PluginApiError::invalid_input("Selection must cover whole statements")
    })?;

    let analysis = analyze_extract_function(source, &parsed, start, end, declared_inside)?;
    let body = &source[first_line..last_line_end];
    let indent = parser::indentation(body);
    let newline = if body.ends_with('\n') { "\n" } else { "" };
    let call = format!(
        "{}{}{}",
        indent,
        generate_function_call(&analysis, &params.name),
        newline
    );

    let insert_at = parsed
        .module
        .body
        .iter()
        .map(|item| parsed.range(item.span()))
        .find(|&(s, e)| s < start && end <= e)
        .map_or(last_line_end, |(_, e)| parser::line_end_inclusive(source, e));
    let mut function = generate_extracted_function(body, &analysis, &params.name);
    if insert_at == source.len() && !source.ends_with('\n') {
        function.insert(0, '\n');
    }

    Ok(single_file(
        &params.file_path,
        vec![
            replace(source, first_line, last_line_end, call)
                .with_description(format!("Call '{}'", params.name)),
            insert(source, insert_at, function)
                .with_description(format!("Define '{}'", params.name)),
        ],
    ))
}

// ============================================================================
// Inline variable
// ============================================================================

#[derive(Debug, Clone)]
struct VariableDeclaration {
    kind: VarDeclKind,
    /// Byte range of the whole declaration, `;` included
    start: usize,
    end: usize,
    name_start: usize,
    declarators: usize,
    /// Initializer range and whether it needs parentheses once inlined
    initializer: Option<(usize, usize, bool)>,
    exported: bool,
    /// End of the block the declaration lives in
    scope_end: usize,
}

/// Every `const`/`let`/`var` binding `name` directly.
struct DeclarationCollector<'a> {
    parsed: &'a ParsedModule,
    source: &'a str,
    name: &'a str,
    blocks: Vec<usize>,
    exported: Vec<BytePos>,
    found: Vec<VariableDeclaration>,
}

fn needs_parens(expr: &Expr) -> bool {
    !matches!(
        expr,
        Expr::Ident(_)
            | Expr::Member(_)
            | Expr::Call(_)
            | Expr::New(_)
            | Expr::Lit(_)
            | Expr::Paren(_)
            | Expr::This(_)
            | Expr::Array(_)
            | Expr::Tpl(_)
            | Expr::OptChain(_)
    )
}

impl Visit for DeclarationCollector<'_> {
    fn visit_export_decl(&mut self, n: &ExportDecl) {
        if let Decl::Var(var) = &n.decl {
            self.exported.push(var.span.lo);
        }
        n.visit_children_with(self);
    }

    fn visit_block_stmt(&mut self, n: &BlockStmt) {
        self.blocks.push(self.parsed.range(n.span).1);
        n.visit_children_with(self);
        self.blocks.pop();
    }

    fn visit_var_decl(&mut self, n: &VarDecl) {
        let (start, end) = self.parsed.range(n.span);
        for declarator in &n.decls {
            let Pat::Ident(binding) = &declarator.name else {
                continue;
            };
            if &*binding.id.sym != self.name {
                continue;
            }
            let initializer = declarator.init.as_ref().map(|init| {
                let (s, e) = self.parsed.range(init.span());
                (s, e, needs_parens(init))
            });
            self.found.push(VariableDeclaration {
                kind: n.kind,
                start,
                end: after_semicolon(self.source, end),
                name_start: self.parsed.offset(binding.id.span.lo),
                declarators: n.decls.len(),
                initializer,
                exported: self.exported.contains(&n.span.lo),
                scope_end: self.blocks.last().copied().unwrap_or(self.source.len()),
            });
        }
        n.visit_children_with(self);
    }
}

/// The identifier under `offset`, as `(name, start)`. A cursor just past
/// the last character still counts.
fn identifier_at(parsed: &ParsedModule, offset: usize) -> Option<(String, usize)> {
    struct IdentAt<'a> {
        parsed: &'a ParsedModule,
        offset: usize,
        found: Option<(String, usize)>,
        touching: Option<(String, usize)>,
    }

    impl Visit for IdentAt<'_> {
        fn visit_ident(&mut self, n: &Ident) {
            let (start, end) = self.parsed.range(n.span);
            if self.found.is_none() && start <= self.offset && self.offset < end {
                self.found = Some((n.sym.to_string(), start));
            } else if self.touching.is_none() && self.offset == end {
                self.touching = Some((n.sym.to_string(), start));
            }
        }
    }

    let mut finder = IdentAt {
        parsed,
        offset,
        found: None,
        touching: None,
    };
    parsed.module.visit_with(&mut finder);
    finder.found.or(finder.touching)
}

/// Plans an inline variable refactoring.
///
/// Position may be on the declaration or any usage. The declaration is
/// removed and each usage in its block is replaced by the initializer,
/// parenthesized unless it is a plain name, call or member chain.
pub fn plan_inline_variable(source: &str, params: &InlineParams) -> PluginResult<WorkspaceEdit> {
    let offset = byte_offset(source, params.position)
        .ok_or_else(|| PluginApiError::invalid_input("Position is outside the file"))?;
    let parsed = parse(source, &params.file_path)?;
    let (name, ident_start) = identifier_at(&parsed, offset)
        .ok_or_else(|| PluginApiError::invalid_input("No identifier at position"))?;

    let mut collector = DeclarationCollector {
        parsed: &parsed,
        source,
        name: &name,
        blocks: Vec::new(),
        exported: Vec::new(),
        found: Vec::new(),
    };
    parsed.module.visit_with(&mut collector);
    let declarations = collector.found;
    let declaration = declarations
        .iter()
        .find(|d| d.name_start == ident_start)
        .or_else(|| {
            declarations
                .iter()
                .rev()
                .find(|d| d.name_start < ident_start && ident_start < d.scope_end)
        })
        .cloned()
        .ok_or_else(|| {
            PluginApiError::invalid_input(format!("No variable declaration found for '{}'", name))
        })?;

    if declaration.exported {
        return Err(PluginApiError::invalid_input(format!(
            "'{}' is exported and cannot be inlined",
            name
        )));
    }
    if declaration.declarators > 1 {
        return Err(PluginApiError::invalid_input(
            "Declarations of several variables are not supported",
        ));
    }
    let Some((init_start, init_end, parens)) = declaration.initializer else {
        return Err(PluginApiError::invalid_input(format!(
            "'{}' has no initializer",
            name
        )));
    };

    let statement_end = declaration.end;
    let scope_end = declaration.scope_end;
    let scope = ScopeInfo::collect(&parsed);
    if scope
        .bindings
        .iter()
        .any(|b| b.name == name && b.offset > statement_end && b.offset < scope_end)
    {
        return Err(PluginApiError::invalid_input(format!(
            "'{}' is redeclared in its scope",
            name
        )));
    }
    if declaration.kind != VarDeclKind::Const
        && scope.is_written_between(&name, statement_end, scope_end)
    {
        return Err(PluginApiError::invalid_input(format!(
            "'{}' is reassigned; only variables assigned once can be inlined",
            name
        )));
    }

    let line = parser::line_start(source, declaration.start);
    let line_end = parser::line_end_inclusive(source, statement_end);
    let whole_lines = source[line..declaration.start].trim().is_empty()
        && source[statement_end..line_end].trim().is_empty();
    let (remove_start, remove_end) = if whole_lines {
        (line, line_end)
    } else {
        (declaration.start, statement_end)
    };

    let initializer = &source[init_start..init_end];
    let value = if parens {
        format!("({})", initializer)
    } else {
        initializer.to_string()
    };
    let mut edits = vec![replace(source, remove_start, remove_end, "")
        .with_type(EditType::Delete)
        .with_description(format!("Remove declaration of '{}'", name))];
    for usage in scope.references_between(&name, statement_end, scope_end) {
        let text = if usage.shorthand {
            format!("{}: {}", name, value)
        } else {
            value.clone()
        };
        edits.push(
            replace(source, usage.start, usage.end, text)
                .with_description(format!("Inline '{}'", name)),
        );
    }
    Ok(single_file(&params.file_path, edits))
}

// ============================================================================
// Symbol delete
// ============================================================================

#[derive(Debug)]
struct DeclarationMatch {
    kind: &'static str,
    name: String,
    lo: BytePos,
    hi: BytePos,
    several: bool,
}

/// Kind, name, name span and decorator start of a declaration.
fn describe(decl: &Decl) -> Option<(&'static str, String, Span, Option<BytePos>, bool)> {
    match decl {
        Decl::Fn(f) => Some(("function", f.ident.sym.to_string(), f.ident.span, None, false)),
        Decl::Class(c) => Some((
            "class",
            c.ident.sym.to_string(),
            c.ident.span,
            c.class.decorators.first().map(|d| d.span.lo),
            false,
        )),
        Decl::Var(var) => {
            let mut names = Vec::new();
            parser::pattern_names(&var.decls.first()?.name, &mut names);
            let (name, span) = names.into_iter().next()?;
            let kind = match var.kind {
                VarDeclKind::Const => "const",
                VarDeclKind::Let => "let",
                VarDeclKind::Var => "var",
            };
            Some((kind, name, span, None, var.decls.len() > 1))
        }
        Decl::TsInterface(i) => Some(("interface", i.id.sym.to_string(), i.id.span, None, false)),
        Decl::TsTypeAlias(t) => Some(("type", t.id.sym.to_string(), t.id.span, None, false)),
        Decl::TsEnum(e) => Some(("enum", e.id.sym.to_string(), e.id.span, None, false)),
        _ => None,
    }
}

/// The first declaration whose keyword or name sits on `line`.
struct DeclarationAt<'a> {
    parsed: &'a ParsedModule,
    source: &'a str,
    line: u32,
    found: Option<DeclarationMatch>,
}

impl DeclarationAt<'_> {
    fn line_of(&self, pos: BytePos) -> u32 {
        position_at(self.source, self.parsed.offset(pos)).line
    }

    fn consider(&mut self, span: Span, decl: &Decl) {
        if self.found.is_some() {
            return;
        }
        let Some((kind, name, name_span, decorated, several)) = describe(decl) else {
            return;
        };
        if self.line_of(span.lo) != self.line && self.line_of(name_span.lo) != self.line {
            return;
        }
        self.found = Some(DeclarationMatch {
            kind,
            name,
            lo: decorated.map_or(span.lo, |d| d.min(span.lo)),
            hi: span.hi,
            several,
        });
    }
}

impl Visit for DeclarationAt<'_> {
    fn visit_module_item(&mut self, n: &ModuleItem) {
        if let ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(export)) = n {
            self.consider(export.span, &export.decl);
        }
        n.visit_children_with(self);
    }

    fn visit_stmt(&mut self, n: &Stmt) {
        if let Stmt::Decl(decl) = n {
            self.consider(decl.span(), decl);
        }
        n.visit_children_with(self);
    }
}

fn is_blank_line_at(source: &str, offset: usize) -> bool {
    offset < source.len()
        && source[offset..parser::line_end_inclusive(source, offset)]
            .trim()
            .is_empty()
}

/// Extend the declaration's first line upward over the comments attached
/// to it, stopping at a blank line.
fn attached_prefix_start(source: &str, parsed: &ParsedModule, lo: BytePos) -> usize {
    let mut start = parser::line_start(source, parsed.offset(lo));
    for comment in parsed.leading_comments(lo).iter().rev() {
        let (comment_start, comment_end) = parsed.range(comment.span);
        if comment_end > start {
            continue;
        }
        let gap = &source[comment_end..start];
        if !gap.trim().is_empty() || gap.matches('\n').count() > 1 {
            break;
        }
        let comment_line = parser::line_start(source, comment_start);
        if !source[comment_line..comment_start].trim().is_empty() {
            break;
        }
        start = comment_line;
    }
    start
}

/// Plans removal of the declaration starting on the line of `params.position`.
pub fn plan_symbol_delete(source: &str, params: &DeleteSymbolParams) -> PluginResult<WorkspaceEdit> {
    let parsed = parse(source, &params.file_path)?;
    let mut finder = DeclarationAt {
        parsed: &parsed,
        source,
        line: params.position.line,
        found: None,
    };
    parsed.module.visit_with(&mut finder);
    let found = finder.found.ok_or_else(|| {
        PluginApiError::invalid_input(format!(
            "No declaration found at line {}",
            params.position.line + 1
        ))
    })?;
    if found.several {
        return Err(PluginApiError::invalid_input(
            "Declarations of several variables are not supported",
        ));
    }

    let end = after_semicolon(source, parsed.offset(found.hi));
    let eol = parser::line_end_inclusive(source, end);
    let mut remove_end = if source[end..eol].trim().is_empty() {
        eol
    } else {
        end
    };
    let line = parser::line_start(source, parsed.offset(found.lo));
    let remove_start = if source[line..parsed.offset(found.lo)].trim().is_empty() {
        attached_prefix_start(source, &parsed, found.lo)
    } else {
        parsed.offset(found.lo)
    };
    let preceded_by_blank = remove_start == 0
        || is_blank_line_at(source, parser::line_start(source, remove_start - 1));
    if remove_end == eol && preceded_by_blank && is_blank_line_at(source, remove_end) {
        remove_end = parser::line_end_inclusive(source, remove_end);
    }

    Ok(single_file(
        &params.file_path,
        vec![replace(source, remove_start, remove_end, "")
            .with_type(EditType::Delete)
            .with_description(format!("Delete {} '{}'", found.kind, found.name))],
    ))
}
