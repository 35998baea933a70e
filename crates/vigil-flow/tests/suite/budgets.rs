// Step-budget exhaustion through the public entry point.

use pretty_assertions::assert_eq;
use vigil_flow::{analyze, AnalysisOutcome, Finding, FlowConfig};
use vigil_hir::body::{BodyBuilder, CallArg, ExprId, ExprKind, LocalKind, StmtId, StmtKind, UnaryOp};

fn write_block(b: &mut BodyBuilder, arg: ExprId) -> StmtId {
    let call = b.expr(ExprKind::Call { name: "Write".into(), args: vec![CallArg::by_value(arg)] });
    let stmt = b.stmt(StmtKind::Expr(call));
    b.stmt(StmtKind::Block(vec![stmt]))
}

fn starved() -> FlowConfig {
    FlowConfig { max_block_visits: u32::MAX, max_steps_per_block: 1 }
}

#[test]
fn an_abandoned_body_reports_nothing_from_unstable_blocks() {
    // var x = false;
    // while (Step()) { x = !x; }
    let mut b = BodyBuilder::new();
    let x = b.local("x", LocalKind::Local);
    let f = b.expr(ExprKind::Bool(false));
    let decl = b.stmt(StmtKind::Decl { local: x, init: Some(f) });
    let cond = b.expr(ExprKind::Call { name: "Step".into(), args: Vec::new() });
    let x_read = b.expr(ExprKind::Local(x));
    let toggled = b.expr(ExprKind::Unary { op: UnaryOp::Not, operand: x_read });
    let toggle = b.stmt(StmtKind::Assign { target: x, value: toggled });
    let loop_body = b.stmt(StmtKind::Block(vec![toggle]));
    let while_stmt = b.stmt(StmtKind::While { cond: Some(cond), body: loop_body });
    let root = b.stmt(StmtKind::Block(vec![decl, while_stmt]));
    let body = b.finish(root);

    let result = analyze(&body, starved()).unwrap();
    assert_eq!(result.outcome, AnalysisOutcome::Abandoned);
    assert_eq!(result.findings, Vec::new());

    let relaxed = analyze(&body, FlowConfig::default()).unwrap();
    assert_eq!(relaxed.outcome, AnalysisOutcome::Converged);
}

#[test]
fn stable_blocks_still_report_when_later_work_is_abandoned() {
    // var b = true; var x = false;
    // if (b) { Write(1); } else { Write(2); }
    // while (Step()) { x = !x; }
    let mut b = BodyBuilder::new();
    let flag = b.local("b", LocalKind::Local);
    let x = b.local("x", LocalKind::Local);
    let t = b.expr(ExprKind::Bool(true));
    let decl_b = b.stmt(StmtKind::Decl { local: flag, init: Some(t) });
    let f = b.expr(ExprKind::Bool(false));
    let decl_x = b.stmt(StmtKind::Decl { local: x, init: Some(f) });
    let guard_ref = b.expr(ExprKind::Local(flag));
    let one = b.expr(ExprKind::Int(1));
    let then_branch = write_block(&mut b, one);
    let two = b.expr(ExprKind::Int(2));
    let else_branch = write_block(&mut b, two);
    let guard = b.stmt(StmtKind::If {
        cond: guard_ref,
        then_branch,
        else_branch: Some(else_branch),
    });
    let cond = b.expr(ExprKind::Call { name: "Step".into(), args: Vec::new() });
    let x_read = b.expr(ExprKind::Local(x));
    let toggled = b.expr(ExprKind::Unary { op: UnaryOp::Not, operand: x_read });
    let toggle = b.stmt(StmtKind::Assign { target: x, value: toggled });
    let loop_body = b.stmt(StmtKind::Block(vec![toggle]));
    let while_stmt = b.stmt(StmtKind::While { cond: Some(cond), body: loop_body });
    let root = b.stmt(StmtKind::Block(vec![decl_b, decl_x, guard, while_stmt]));
    let body = b.finish(root);

    let result = analyze(&body, starved()).unwrap();
    assert_eq!(result.outcome, AnalysisOutcome::Abandoned);
    // The constant guard sat in a block that stabilized before the budget
    // ran out; only the loop's blocks are excluded.
    assert_eq!(
        result.findings,
        vec![Finding { span: body.expr(guard_ref).span, value: true }]
    );
}
