// Guards over a boolean local that only ever holds one literal.

use pretty_assertions::assert_eq;
use vigil_flow::Finding;
use vigil_hir::body::{BinaryOp, BodyBuilder, CallArg, ExprId, ExprKind, LocalKind, StmtId, StmtKind};

use crate::harness::converged_findings;

fn write_block(b: &mut BodyBuilder, arg: ExprId) -> StmtId {
    let call = b.expr(ExprKind::Call { name: "Write".into(), args: vec![CallArg::by_value(arg)] });
    let stmt = b.stmt(StmtKind::Expr(call));
    b.stmt(StmtKind::Block(vec![stmt]))
}

#[test]
fn an_unreassigned_true_local_resolves_its_guard() {
    // var b = true;
    // if (b) { Write(1); } else { Write(2); }
    let mut b = BodyBuilder::new();
    let flag = b.local("b", LocalKind::Local);
    let t = b.expr(ExprKind::Bool(true));
    let decl = b.stmt(StmtKind::Decl { local: flag, init: Some(t) });
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
    let root = b.stmt(StmtKind::Block(vec![decl, guard]));
    let body = b.finish(root);

    assert_eq!(
        converged_findings(&body),
        vec![Finding { span: body.expr(guard_ref).span, value: true }]
    );
}

#[test]
fn the_else_less_form_reports_identically() {
    // var b = true;
    // if (b) { Write(1); }
    let mut b = BodyBuilder::new();
    let flag = b.local("b", LocalKind::Local);
    let t = b.expr(ExprKind::Bool(true));
    let decl = b.stmt(StmtKind::Decl { local: flag, init: Some(t) });
    let guard_ref = b.expr(ExprKind::Local(flag));
    let one = b.expr(ExprKind::Int(1));
    let then_branch = write_block(&mut b, one);
    let guard = b.stmt(StmtKind::If { cond: guard_ref, then_branch, else_branch: None });
    let root = b.stmt(StmtKind::Block(vec![decl, guard]));
    let body = b.finish(root);

    assert_eq!(
        converged_findings(&body),
        vec![Finding { span: body.expr(guard_ref).span, value: true }]
    );
}

#[test]
fn a_true_local_guarding_a_while_loop_is_reported() {
    // var b = true;
    // while (b) { Write(b); }
    let mut b = BodyBuilder::new();
    let flag = b.local("b", LocalKind::Local);
    let t = b.expr(ExprKind::Bool(true));
    let decl = b.stmt(StmtKind::Decl { local: flag, init: Some(t) });
    let cond = b.expr(ExprKind::Local(flag));
    let arg = b.expr(ExprKind::Local(flag));
    let loop_body = write_block(&mut b, arg);
    let while_stmt = b.stmt(StmtKind::While { cond: Some(cond), body: loop_body });
    let root = b.stmt(StmtKind::Block(vec![decl, while_stmt]));
    let body = b.finish(root);

    assert_eq!(
        converged_findings(&body),
        vec![Finding { span: body.expr(cond).span, value: true }]
    );
}

#[test]
fn an_unknown_loop_before_the_constant_one_keeps_quiet() {
    // void M(bool cond) {
    //   while (cond) { Write(cond); }
    //   var b = true;
    //   while (b) { Write(b); }
    // }
    let mut b = BodyBuilder::new();
    let cond = b.local("cond", LocalKind::Param);
    let flag = b.local("b", LocalKind::Local);
    let first_cond = b.expr(ExprKind::Local(cond));
    let first_arg = b.expr(ExprKind::Local(cond));
    let first_body = write_block(&mut b, first_arg);
    let first = b.stmt(StmtKind::While { cond: Some(first_cond), body: first_body });
    let t = b.expr(ExprKind::Bool(true));
    let decl = b.stmt(StmtKind::Decl { local: flag, init: Some(t) });
    let second_cond = b.expr(ExprKind::Local(flag));
    let second_arg = b.expr(ExprKind::Local(flag));
    let second_body = write_block(&mut b, second_arg);
    let second = b.stmt(StmtKind::While { cond: Some(second_cond), body: second_body });
    let root = b.stmt(StmtKind::Block(vec![first, decl, second]));
    let body = b.finish(root);

    assert_eq!(
        converged_findings(&body),
        vec![Finding { span: body.expr(second_cond).span, value: true }]
    );
}

#[test]
fn arithmetic_in_a_preceding_loop_does_not_unsettle_the_guard() {
    // var i = 10;
    // while (i < 20) { i = i + 1; }
    // var b = true;
    // while (b) { Write(b); }
    let mut b = BodyBuilder::new();
    let i = b.local("i", LocalKind::Local);
    let flag = b.local("b", LocalKind::Local);
    let ten = b.expr(ExprKind::Int(10));
    let decl_i = b.stmt(StmtKind::Decl { local: i, init: Some(ten) });
    let i_ref = b.expr(ExprKind::Local(i));
    let twenty = b.expr(ExprKind::Int(20));
    let first_cond = b.expr(ExprKind::Binary { op: BinaryOp::Lt, lhs: i_ref, rhs: twenty });
    let i_read = b.expr(ExprKind::Local(i));
    let one = b.expr(ExprKind::Int(1));
    let bump = b.expr(ExprKind::Binary { op: BinaryOp::Add, lhs: i_read, rhs: one });
    let step = b.stmt(StmtKind::Assign { target: i, value: bump });
    let first_body = b.stmt(StmtKind::Block(vec![step]));
    let first = b.stmt(StmtKind::While { cond: Some(first_cond), body: first_body });
    let t = b.expr(ExprKind::Bool(true));
    let decl_b = b.stmt(StmtKind::Decl { local: flag, init: Some(t) });
    let second_cond = b.expr(ExprKind::Local(flag));
    let second_arg = b.expr(ExprKind::Local(flag));
    let second_body = write_block(&mut b, second_arg);
    let second = b.stmt(StmtKind::While { cond: Some(second_cond), body: second_body });
    let root = b.stmt(StmtKind::Block(vec![decl_i, first, decl_b, second]));
    let body = b.finish(root);

    assert_eq!(
        converged_findings(&body),
        vec![Finding { span: body.expr(second_cond).span, value: true }]
    );
}

#[test]
fn a_parameter_overwritten_with_a_literal_before_its_guard() {
    // set { value = true; if (value) { Write(3); } }
    let mut b = BodyBuilder::new();
    let value = b.local("value", LocalKind::Param);
    let t = b.expr(ExprKind::Bool(true));
    let assign = b.stmt(StmtKind::Assign { target: value, value: t });
    let guard_ref = b.expr(ExprKind::Local(value));
    let three = b.expr(ExprKind::Int(3));
    let then_branch = write_block(&mut b, three);
    let guard = b.stmt(StmtKind::If { cond: guard_ref, then_branch, else_branch: None });
    let root = b.stmt(StmtKind::Block(vec![assign, guard]));
    let body = b.finish(root);

    assert_eq!(
        converged_findings(&body),
        vec![Finding { span: body.expr(guard_ref).span, value: true }]
    );
}
