//! Abstract evaluation of expressions and statement transfer functions.
//!
//! Evaluation is conservative. Anything the lattice cannot express folds to
//! [`Value::Unknown`], and side effects are modeled only where they can
//! change a tracked local: closures that assign captured locals poison them,
//! `out`/`ref` arguments rebind the local to unknown.

use vigil_hir::body::{ArgMode, BinaryOp, Body, ExprId, ExprKind, LocalId, StmtId, StmtKind, UnaryOp};

use crate::lattice::{Env, Relation, Value};

/// Evaluates an expression to its abstract value. Never returns
/// [`Value::Alias`].
pub fn eval(body: &Body, env: &Env, expr: ExprId) -> Value {
    match &body.expr(expr).kind {
        ExprKind::Local(var) => env.value_of(*var),
        ExprKind::Bool(b) => Value::Bool(*b),
        ExprKind::Int(_) | ExprKind::Str(_) => Value::NotNull,
        ExprKind::Null => Value::Null,
        ExprKind::NullableDefault => Value::Null,
        ExprKind::New { .. } | ExprKind::Closure { .. } => Value::NotNull,
        ExprKind::Unary { op: UnaryOp::Not, operand } => match eval(body, env, *operand) {
            Value::Bool(b) => Value::Bool(!b),
            _ => Value::Unknown,
        },
        ExprKind::Binary { op, lhs, rhs } => eval_binary(body, env, *op, *lhs, *rhs),
        ExprKind::Is { operand } => match eval(body, env, *operand) {
            // A null operand fails every type test; anything else may pass.
            Value::Null => Value::Bool(false),
            _ => Value::Unknown,
        },
        ExprKind::As { operand } => match eval(body, env, *operand) {
            Value::Null => Value::Null,
            _ => Value::Unknown,
        },
        ExprKind::Call { .. } | ExprKind::Field { .. } | ExprKind::Invalid => Value::Unknown,
    }
}

fn eval_binary(body: &Body, env: &Env, op: BinaryOp, lhs: ExprId, rhs: ExprId) -> Value {
    match op {
        BinaryOp::And => match (eval(body, env, lhs), eval(body, env, rhs)) {
            (Value::Bool(false), _) | (_, Value::Bool(false)) => Value::Bool(false),
            (Value::Bool(true), Value::Bool(true)) => Value::Bool(true),
            _ => Value::Unknown,
        },
        BinaryOp::Or => match (eval(body, env, lhs), eval(body, env, rhs)) {
            (Value::Bool(true), _) | (_, Value::Bool(true)) => Value::Bool(true),
            (Value::Bool(false), Value::Bool(false)) => Value::Bool(false),
            _ => Value::Unknown,
        },
        BinaryOp::Xor => match (eval(body, env, lhs), eval(body, env, rhs)) {
            (Value::Bool(a), Value::Bool(b)) => Value::Bool(a != b),
            _ => match operand_pair(body, env, lhs, rhs) {
                Some((a, b, parity)) if a == b => Value::Bool(parity),
                Some((a, b, parity)) => match env.relation_between(a, b) {
                    Some(Relation::Eq) => Value::Bool(parity),
                    Some(Relation::Ne) => Value::Bool(!parity),
                    None => Value::Unknown,
                },
                None => Value::Unknown,
            },
        },
        BinaryOp::Eq => eval_equality(body, env, lhs, rhs, false),
        BinaryOp::Ne => eval_equality(body, env, lhs, rhs, true),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => Value::Unknown,
        // Arithmetic on value types and string concatenation cannot produce
        // null, but the result itself is not tracked.
        BinaryOp::Add | BinaryOp::Sub => match (eval(body, env, lhs), eval(body, env, rhs)) {
            (Value::NotNull, Value::NotNull) => Value::NotNull,
            _ => Value::Unknown,
        },
    }
}

/// Decides `lhs == rhs` (or `!=` when `negated`) from concrete values first
/// and variable identity second.
fn eval_equality(body: &Body, env: &Env, lhs: ExprId, rhs: ExprId, negated: bool) -> Value {
    let decided = match (eval(body, env, lhs), eval(body, env, rhs)) {
        (Value::Bool(a), Value::Bool(b)) => Some(a == b),
        (Value::Null, Value::Null) => Some(true),
        (Value::Null, Value::NotNull) | (Value::NotNull, Value::Null) => Some(false),
        (Value::Null, Value::Bool(_)) | (Value::Bool(_), Value::Null) => Some(false),
        _ => match operand_pair(body, env, lhs, rhs) {
            Some((a, b, parity)) if a == b => Some(!parity),
            Some((a, b, parity)) => env
                .relation_between(a, b)
                .map(|rel| matches!(rel, Relation::Eq) != parity),
            None => None,
        },
    };
    match decided {
        Some(eq) => Value::Bool(eq != negated),
        None => Value::Unknown,
    }
}

/// Both operands stripped down to plain locals, with the combined negation
/// parity of the stripped `!` wrappers. Roots are resolved through aliases;
/// invalidated variables have no usable identity.
fn operand_pair(body: &Body, env: &Env, lhs: ExprId, rhs: ExprId) -> Option<(LocalId, LocalId, bool)> {
    let (lhs, lhs_nots) = strip_not(body, lhs);
    let (rhs, rhs_nots) = strip_not(body, rhs);
    let (a, b) = match (&body.expr(lhs).kind, &body.expr(rhs).kind) {
        (ExprKind::Local(a), ExprKind::Local(b)) => (*a, *b),
        _ => return None,
    };
    let (a, b) = (env.alias_root(a), env.alias_root(b));
    if env.is_invalidated(a) || env.is_invalidated(b) {
        return None;
    }
    Some((a, b, (lhs_nots + rhs_nots) % 2 == 1))
}

fn strip_not(body: &Body, mut expr: ExprId) -> (ExprId, usize) {
    let mut nots = 0;
    while let ExprKind::Unary { op: UnaryOp::Not, operand } = &body.expr(expr).kind {
        expr = *operand;
        nots += 1;
    }
    (expr, nots)
}

/// The value stored by `target = expr`. A bare variable on the right becomes
/// an alias so later refinements reach both names.
pub fn assigned_value(body: &Body, env: &Env, expr: ExprId) -> Value {
    match &body.expr(expr).kind {
        ExprKind::Local(var) => Value::Alias(env.alias_root(*var)),
        _ => eval(body, env, expr),
    }
}

/// Applies the side effects of evaluating `expr`, without producing a value.
///
/// Closures invalidate every local they assign. A local passed by `out` or
/// `ref` is rebound to unknown; unlike closure capture this is an ordinary
/// assignment, so the local stays tracked afterwards.
pub fn apply_expr_effects(body: &Body, env: &mut Env, expr: ExprId) {
    match &body.expr(expr).kind {
        ExprKind::Closure { assigns } => {
            for var in assigns {
                env.invalidate(*var);
            }
        }
        ExprKind::Call { args, .. } | ExprKind::New { args } => {
            for arg in args {
                apply_expr_effects(body, env, arg.value);
                if arg.mode == ArgMode::ByOutRef {
                    if let ExprKind::Local(var) = body.expr(arg.value).kind {
                        env.assign(var, Value::Unknown);
                    }
                }
            }
        }
        ExprKind::Unary { operand, .. } => apply_expr_effects(body, env, *operand),
        ExprKind::Binary { lhs, rhs, .. } => {
            apply_expr_effects(body, env, *lhs);
            apply_expr_effects(body, env, *rhs);
        }
        ExprKind::Is { operand } | ExprKind::As { operand } => {
            apply_expr_effects(body, env, *operand)
        }
        ExprKind::Field { receiver: Some(receiver), .. } => {
            apply_expr_effects(body, env, *receiver)
        }
        ExprKind::Local(_)
        | ExprKind::Bool(_)
        | ExprKind::Int(_)
        | ExprKind::Str(_)
        | ExprKind::Null
        | ExprKind::NullableDefault
        | ExprKind::Field { receiver: None, .. }
        | ExprKind::Invalid => {}
    }
}

/// Transfer function for the statements that appear inside basic blocks.
/// Structured statements are lowered to control flow before this runs.
pub fn transfer_stmt(body: &Body, env: &mut Env, stmt: StmtId) {
    match &body.stmt(stmt).kind {
        StmtKind::Decl { local, init } => match init {
            Some(init) => {
                apply_expr_effects(body, env, *init);
                let value = assigned_value(body, env, *init);
                env.assign(*local, value);
            }
            None => env.assign(*local, Value::Unknown),
        },
        StmtKind::Assign { target, value } => {
            apply_expr_effects(body, env, *value);
            let stored = assigned_value(body, env, *value);
            env.assign(*target, stored);
        }
        StmtKind::CompoundAssign { target, op, value } => {
            apply_expr_effects(body, env, *value);
            let current = env.value_of(*target);
            let rhs = eval(body, env, *value);
            env.assign(*target, fold_compound(*op, current, rhs));
        }
        StmtKind::Expr(expr) => apply_expr_effects(body, env, *expr),
        _ => {}
    }
}

fn fold_compound(op: BinaryOp, current: Value, rhs: Value) -> Value {
    match op {
        BinaryOp::And => match (current, rhs) {
            (Value::Bool(false), _) | (_, Value::Bool(false)) => Value::Bool(false),
            (Value::Bool(true), Value::Bool(true)) => Value::Bool(true),
            _ => Value::Unknown,
        },
        BinaryOp::Or => match (current, rhs) {
            (Value::Bool(true), _) | (_, Value::Bool(true)) => Value::Bool(true),
            (Value::Bool(false), Value::Bool(false)) => Value::Bool(false),
            _ => Value::Unknown,
        },
        BinaryOp::Xor => match (current, rhs) {
            (Value::Bool(a), Value::Bool(b)) => Value::Bool(a != b),
            _ => Value::Unknown,
        },
        BinaryOp::Add | BinaryOp::Sub => match (current, rhs) {
            (Value::NotNull, Value::NotNull) => Value::NotNull,
            _ => Value::Unknown,
        },
        _ => Value::Unknown,
    }
}

/// Narrows `env` under the assumption that `cond` evaluated to `assumed`.
///
/// Refinements write through aliases but never count as assignments, so
/// learned relations survive. Recording happens here as well: an `==`, `!=`,
/// or `^` between two untracked variables leaves a relation behind for the
/// taken branch.
pub fn refine(body: &Body, env: &mut Env, cond: ExprId, assumed: bool) {
    match &body.expr(cond).kind {
        ExprKind::Local(var) => {
            let root = env.alias_root(*var);
            env.refine(root, Value::Bool(assumed));
            // One hop of relation propagation; enough for guards that test a
            // variable previously compared against another.
            for (other, rel) in env.relations_with(root) {
                if env.value_of(other) == Value::Unknown && !env.is_invalidated(other) {
                    let value = assumed != matches!(rel, Relation::Ne);
                    env.refine(other, Value::Bool(value));
                }
            }
        }
        ExprKind::Unary { op: UnaryOp::Not, operand } => refine(body, env, *operand, !assumed),
        ExprKind::Binary { op: BinaryOp::And, lhs, rhs } if assumed => {
            refine(body, env, *lhs, true);
            refine(body, env, *rhs, true);
        }
        ExprKind::Binary { op: BinaryOp::Or, lhs, rhs } if !assumed => {
            refine(body, env, *lhs, false);
            refine(body, env, *rhs, false);
        }
        ExprKind::Binary { op: BinaryOp::Eq, lhs, rhs } => {
            refine_equality(body, env, *lhs, *rhs, assumed);
        }
        ExprKind::Binary { op: BinaryOp::Ne, lhs, rhs } => {
            refine_equality(body, env, *lhs, *rhs, !assumed);
        }
        ExprKind::Binary { op: BinaryOp::Xor, lhs, rhs } => {
            refine_xor(body, env, *lhs, *rhs, assumed);
        }
        ExprKind::Is { operand } if assumed => {
            // A passed type test proves the operand non-null; a failed one
            // proves nothing.
            if let ExprKind::Local(var) = body.expr(*operand).kind {
                env.refine(env.alias_root(var), Value::NotNull);
            }
        }
        _ => {}
    }
}

fn refine_equality(body: &Body, env: &mut Env, lhs: ExprId, rhs: ExprId, eq_holds: bool) {
    let vl = eval(body, env, lhs);
    let vr = eval(body, env, rhs);
    let concrete = |v: Value| !matches!(v, Value::Unknown);
    match (concrete(vl), concrete(vr)) {
        (true, true) => {}
        (true, false) => refine_against(body, env, rhs, vl, eq_holds),
        (false, true) => refine_against(body, env, lhs, vr, eq_holds),
        (false, false) => {
            if let Some((a, b, parity)) = operand_pair(body, env, lhs, rhs) {
                if a != b {
                    let rel = if eq_holds != parity { Relation::Eq } else { Relation::Ne };
                    env.record_relation(a, b, rel);
                }
            }
        }
    }
}

/// Refines the variable under `target` given that it compares to a known
/// `value`: equal when `eq_holds`, different otherwise.
fn refine_against(body: &Body, env: &mut Env, target: ExprId, value: Value, eq_holds: bool) {
    let (core, nots) = strip_not(body, target);
    let var = match body.expr(core).kind {
        ExprKind::Local(var) => env.alias_root(var),
        _ => return,
    };
    if env.is_invalidated(var) {
        return;
    }
    let parity = nots % 2 == 1;
    match value {
        Value::Bool(b) => {
            let core_value = (b == eq_holds) != parity;
            env.refine(var, Value::Bool(core_value));
        }
        Value::Null if nots == 0 => {
            env.refine(var, if eq_holds { Value::Null } else { Value::NotNull });
        }
        // Matching a specific non-null value proves non-nullness; failing
        // to match it proves nothing.
        Value::NotNull if nots == 0 && eq_holds => env.refine(var, Value::NotNull),
        _ => {}
    }
}

fn refine_xor(body: &Body, env: &mut Env, lhs: ExprId, rhs: ExprId, assumed: bool) {
    let vl = eval(body, env, lhs);
    let vr = eval(body, env, rhs);
    match (vl, vr) {
        (Value::Bool(b), _) => refine_against(body, env, rhs, Value::Bool(b != assumed), true),
        (_, Value::Bool(b)) => refine_against(body, env, lhs, Value::Bool(b != assumed), true),
        _ => {
            if let Some((a, b, parity)) = operand_pair(body, env, lhs, rhs) {
                if a != b {
                    let rel = if assumed != parity { Relation::Ne } else { Relation::Eq };
                    env.record_relation(a, b, rel);
                }
            }
        }
    }
}
