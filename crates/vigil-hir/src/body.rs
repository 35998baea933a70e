//! Arena-allocated body IR.
//!
//! A [`Body`] owns three arenas (locals, statements, expressions) plus the id
//! of the root statement. Statements and expressions refer to each other and
//! to locals exclusively through copyable ids, so the flow analysis can walk
//! a body without touching reference counts or lifetimes.
//!
//! The front end is expected to have finished name resolution: every variable
//! mention is a [`LocalId`] into the body's own local table. Constructs the
//! analysis does not model are lowered to [`StmtKind::Unsupported`] rather
//! than dropped, so the analysis can see that a body opted out.

use std::fmt;

use thiserror::Error;
use vigil_types::Span;

/// Identity of a declared variable (parameter or local) within one body.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalId(u32);

/// Id of a statement in the body's statement arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StmtId(u32);

/// Id of an expression in the body's expression arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(u32);

impl LocalId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl StmtId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl ExprId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LocalId({})", self.0)
    }
}

impl fmt::Debug for StmtId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StmtId({})", self.0)
    }
}

impl fmt::Debug for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExprId({})", self.0)
    }
}

/// How a variable came to exist in the body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocalKind {
    /// Ordinary parameter. Holds an unknown caller-supplied value on entry.
    Param,
    /// `out` parameter. Also unknown on entry for analysis purposes.
    OutParam,
    /// Locally declared variable, including loop element variables.
    Local,
}

/// A declared variable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Local {
    pub name: String,
    pub kind: LocalKind,
}

/// Binary operators the analysis distinguishes.
///
/// Everything else the front end folds into [`ExprKind::Call`] or
/// [`ExprKind::Invalid`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    /// Logical or bitwise-on-bool `&` / `&&` (short-circuiting is encoded in
    /// the control-flow lowering, not here).
    And,
    /// Logical or bitwise-on-bool `|` / `||`.
    Or,
    /// Boolean `^`.
    Xor,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
}

/// How a call argument is passed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgMode {
    ByValue,
    /// `out` or `ref`. The callee may rebind the variable.
    ByOutRef,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallArg {
    pub value: ExprId,
    pub mode: ArgMode,
}

impl CallArg {
    pub fn by_value(value: ExprId) -> Self {
        Self { value, mode: ArgMode::ByValue }
    }

    pub fn by_out_ref(value: ExprId) -> Self {
        Self { value, mode: ArgMode::ByOutRef }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExprKind {
    /// Read of a resolved variable.
    Local(LocalId),
    Bool(bool),
    Int(i64),
    Str(String),
    Null,
    /// `default` of a nullable value type, or an empty nullable construction.
    /// Evaluates to a null-valued nullable.
    NullableDefault,
    /// Object or collection creation. Never null. Arguments carry the same
    /// per-site modes as call arguments.
    New { args: Vec<CallArg> },
    /// Lambda or anonymous method. `assigns` lists the captured locals the
    /// closure body writes to; reading a capture is not recorded.
    Closure { assigns: Vec<LocalId> },
    Unary { op: UnaryOp, operand: ExprId },
    Binary { op: BinaryOp, lhs: ExprId, rhs: ExprId },
    /// `operand is T`. The tested type is irrelevant to this analysis; only
    /// the operand's nullness participates.
    Is { operand: ExprId },
    /// `operand as T`.
    As { operand: ExprId },
    /// Any invocation. The receiver, if syntactically present, is lowered as
    /// the first by-value argument.
    Call { name: String, args: Vec<CallArg> },
    /// Field or property read. Always an unknown value.
    Field { receiver: Option<ExprId>, name: String },
    /// Placeholder the front end emits where it could not produce a real
    /// expression. Evaluates to an unknown value instead of failing.
    Invalid,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StmtKind {
    /// Variable declaration, with optional initializer.
    Decl { local: LocalId, init: Option<ExprId> },
    /// Plain assignment `target = value`.
    Assign { target: LocalId, value: ExprId },
    /// Compound assignment such as `target |= value`. Reads then writes.
    CompoundAssign { target: LocalId, op: BinaryOp, value: ExprId },
    /// Expression evaluated for effect.
    Expr(ExprId),
    Block(Vec<StmtId>),
    If { cond: ExprId, then_branch: StmtId, else_branch: Option<StmtId> },
    /// `cond: None` encodes `while (true)` and friends; the front end may
    /// also pass the literal and let the lowering normalize it.
    While { cond: Option<ExprId>, body: StmtId },
    For {
        init: Vec<StmtId>,
        cond: Option<ExprId>,
        update: Vec<StmtId>,
        body: StmtId,
    },
    /// `foreach (element in iterable) body`. The element variable is rebound
    /// to an unknown value on every entry into the body.
    ForEach { element: LocalId, iterable: ExprId, body: StmtId },
    /// `switch` with one lowered statement per section. `has_default` is true
    /// when some section carries a `default:` label; the analysis never
    /// learns from the case labels themselves, so they are not kept.
    Switch { scrutinee: ExprId, arms: Vec<StmtId>, has_default: bool },
    Break,
    Continue,
    Return(Option<ExprId>),
    /// `throw e`, or a bare rethrow when the operand is absent.
    Throw(Option<ExprId>),
    /// `try`/`catch`/`finally`. Exceptional flow is not modelled; a body
    /// containing one of these is analyzed as opaque.
    Try { body: StmtId },
    /// Any construct outside the modelled subset (`lock`, `goto`, `using`,
    /// local functions, ...). Also makes the body opaque.
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

/// Consistency fault in a lowered body.
///
/// Ids are plain indices, so a front end that mixes ids across bodies or
/// truncates an arena produces dangling references. [`Body::validate`]
/// reports the first one found.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BodyError {
    #[error("local #{local} referenced but only {count} locals declared")]
    UnknownLocal { local: usize, count: usize },
    #[error("statement #{stmt} referenced but only {count} statements allocated")]
    UnknownStmt { stmt: usize, count: usize },
    #[error("expression #{expr} referenced but only {count} expressions allocated")]
    UnknownExpr { expr: usize, count: usize },
}

/// One lowered method-like body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Body {
    locals: Vec<Local>,
    stmts: Vec<Stmt>,
    exprs: Vec<Expr>,
    root: StmtId,
}

impl Body {
    pub fn root(&self) -> StmtId {
        self.root
    }

    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id.index()]
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.index()]
    }

    pub fn local(&self, id: LocalId) -> &Local {
        &self.locals[id.index()]
    }

    pub fn locals(&self) -> &[Local] {
        &self.locals
    }

    pub fn stmts(&self) -> &[Stmt] {
        &self.stmts
    }

    pub fn exprs(&self) -> &[Expr] {
        &self.exprs
    }

    /// Checks that every id stored in the body points into its own arenas.
    ///
    /// This cannot catch an in-range id that belongs to a different body;
    /// like any index-based arena, that mistake is on the producer.
    pub fn validate(&self) -> Result<(), BodyError> {
        self.check_stmt(self.root)?;
        for stmt in &self.stmts {
            self.validate_stmt(&stmt.kind)?;
        }
        for expr in &self.exprs {
            self.validate_expr(&expr.kind)?;
        }
        Ok(())
    }

    fn check_local(&self, id: LocalId) -> Result<(), BodyError> {
        if id.index() < self.locals.len() {
            Ok(())
        } else {
            Err(BodyError::UnknownLocal { local: id.index(), count: self.locals.len() })
        }
    }

    fn check_stmt(&self, id: StmtId) -> Result<(), BodyError> {
        if id.index() < self.stmts.len() {
            Ok(())
        } else {
            Err(BodyError::UnknownStmt { stmt: id.index(), count: self.stmts.len() })
        }
    }

    fn check_expr(&self, id: ExprId) -> Result<(), BodyError> {
        if id.index() < self.exprs.len() {
            Ok(())
        } else {
            Err(BodyError::UnknownExpr { expr: id.index(), count: self.exprs.len() })
        }
    }

    fn validate_stmt(&self, kind: &StmtKind) -> Result<(), BodyError> {
        match kind {
            StmtKind::Decl { local, init } => {
                self.check_local(*local)?;
                if let Some(init) = init {
                    self.check_expr(*init)?;
                }
            }
            StmtKind::Assign { target, value } => {
                self.check_local(*target)?;
                self.check_expr(*value)?;
            }
            StmtKind::CompoundAssign { target, value, .. } => {
                self.check_local(*target)?;
                self.check_expr(*value)?;
            }
            StmtKind::Expr(expr) => self.check_expr(*expr)?,
            StmtKind::Block(stmts) => {
                for stmt in stmts {
                    self.check_stmt(*stmt)?;
                }
            }
            StmtKind::If { cond, then_branch, else_branch } => {
                self.check_expr(*cond)?;
                self.check_stmt(*then_branch)?;
                if let Some(else_branch) = else_branch {
                    self.check_stmt(*else_branch)?;
                }
            }
            StmtKind::While { cond, body } => {
                if let Some(cond) = cond {
                    self.check_expr(*cond)?;
                }
                self.check_stmt(*body)?;
            }
            StmtKind::For { init, cond, update, body } => {
                for stmt in init {
                    self.check_stmt(*stmt)?;
                }
                if let Some(cond) = cond {
                    self.check_expr(*cond)?;
                }
                for stmt in update {
                    self.check_stmt(*stmt)?;
                }
                self.check_stmt(*body)?;
            }
            StmtKind::ForEach { element, iterable, body } => {
                self.check_local(*element)?;
                self.check_expr(*iterable)?;
                self.check_stmt(*body)?;
            }
            StmtKind::Switch { scrutinee, arms, .. } => {
                self.check_expr(*scrutinee)?;
                for arm in arms {
                    self.check_stmt(*arm)?;
                }
            }
            StmtKind::Break | StmtKind::Continue | StmtKind::Unsupported => {}
            StmtKind::Return(expr) | StmtKind::Throw(expr) => {
                if let Some(expr) = expr {
                    self.check_expr(*expr)?;
                }
            }
            StmtKind::Try { body } => self.check_stmt(*body)?,
        }
        Ok(())
    }

    fn validate_expr(&self, kind: &ExprKind) -> Result<(), BodyError> {
        match kind {
            ExprKind::Local(local) => self.check_local(*local)?,
            ExprKind::Bool(_)
            | ExprKind::Int(_)
            | ExprKind::Str(_)
            | ExprKind::Null
            | ExprKind::NullableDefault
            | ExprKind::Invalid => {}
            ExprKind::Closure { assigns } => {
                for local in assigns {
                    self.check_local(*local)?;
                }
            }
            ExprKind::Unary { operand, .. }
            | ExprKind::Is { operand }
            | ExprKind::As { operand } => self.check_expr(*operand)?,
            ExprKind::Binary { lhs, rhs, .. } => {
                self.check_expr(*lhs)?;
                self.check_expr(*rhs)?;
            }
            ExprKind::Call { args, .. } | ExprKind::New { args } => {
                for arg in args {
                    self.check_expr(arg.value)?;
                }
            }
            ExprKind::Field { receiver, .. } => {
                if let Some(receiver) = receiver {
                    self.check_expr(*receiver)?;
                }
            }
        }
        Ok(())
    }
}

/// Incremental [`Body`] constructor used by the front end and by tests.
///
/// Nodes allocated without an explicit span get synthetic one-byte spans in
/// allocation order, so every node stays individually addressable in
/// diagnostics even when no real source positions are available.
#[derive(Default)]
pub struct BodyBuilder {
    locals: Vec<Local>,
    stmts: Vec<Stmt>,
    exprs: Vec<Expr>,
    next_offset: usize,
}

impl BodyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn local(&mut self, name: impl Into<String>, kind: LocalKind) -> LocalId {
        let id = LocalId(self.locals.len() as u32);
        self.locals.push(Local { name: name.into(), kind });
        id
    }

    pub fn expr(&mut self, kind: ExprKind) -> ExprId {
        let span = self.synth_span();
        self.expr_at(kind, span)
    }

    pub fn expr_at(&mut self, kind: ExprKind, span: Span) -> ExprId {
        let id = ExprId(self.exprs.len() as u32);
        self.exprs.push(Expr { kind, span });
        id
    }

    pub fn stmt(&mut self, kind: StmtKind) -> StmtId {
        let span = self.synth_span();
        self.stmt_at(kind, span)
    }

    pub fn stmt_at(&mut self, kind: StmtKind, span: Span) -> StmtId {
        let id = StmtId(self.stmts.len() as u32);
        self.stmts.push(Stmt { kind, span });
        id
    }

    pub fn finish(self, root: StmtId) -> Body {
        Body { locals: self.locals, stmts: self.stmts, exprs: self.exprs, root }
    }

    fn synth_span(&mut self) -> Span {
        let start = self.next_offset;
        self.next_offset += 1;
        Span::new(start, start + 1)
    }
}
