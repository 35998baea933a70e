// Out/ref arguments and mutating closures take a variable out of play.

use pretty_assertions::assert_eq;
use vigil_flow::Finding;
use vigil_hir::body::{BodyBuilder, CallArg, ExprId, ExprKind, LocalKind, StmtId, StmtKind, UnaryOp};

use crate::harness::converged_findings;

fn write_block(b: &mut BodyBuilder, arg: ExprId) -> StmtId {
    let call = b.expr(ExprKind::Call { name: "Write".into(), args: vec![CallArg::by_value(arg)] });
    let stmt = b.stmt(StmtKind::Expr(call));
    b.stmt(StmtKind::Block(vec![stmt]))
}

#[test]
fn an_out_argument_resets_whatever_was_known() {
    // bool b;
    // TryGetValue(out b);
    // if (b) { Write(1); }
    let mut b = BodyBuilder::new();
    let flag = b.local("b", LocalKind::Local);
    let decl = b.stmt(StmtKind::Decl { local: flag, init: None });
    let out_ref = b.expr(ExprKind::Local(flag));
    let call = b.expr(ExprKind::Call {
        name: "TryGetValue".into(),
        args: vec![CallArg::by_out_ref(out_ref)],
    });
    let call_stmt = b.stmt(StmtKind::Expr(call));
    let guard_ref = b.expr(ExprKind::Local(flag));
    let one = b.expr(ExprKind::Int(1));
    let then_branch = write_block(&mut b, one);
    let guard = b.stmt(StmtKind::If { cond: guard_ref, then_branch, else_branch: None });
    let root = b.stmt(StmtKind::Block(vec![decl, call_stmt, guard]));
    let body = b.finish(root);

    assert_eq!(converged_findings(&body), Vec::new());
}

#[test]
fn a_closure_that_writes_a_capture_invalidates_it_for_good() {
    // var fail = false;
    // var a = new Action(() => { fail = true; });
    // a();
    // if (fail) { Write(5); }
    let mut b = BodyBuilder::new();
    let fail = b.local("fail", LocalKind::Local);
    let action = b.local("a", LocalKind::Local);
    let f = b.expr(ExprKind::Bool(false));
    let decl_fail = b.stmt(StmtKind::Decl { local: fail, init: Some(f) });
    let closure = b.expr(ExprKind::Closure { assigns: vec![fail] });
    let new_action = b.expr(ExprKind::New { args: vec![CallArg::by_value(closure)] });
    let decl_action = b.stmt(StmtKind::Decl { local: action, init: Some(new_action) });
    let action_ref = b.expr(ExprKind::Local(action));
    let invoke = b.expr(ExprKind::Call {
        name: "Invoke".into(),
        args: vec![CallArg::by_value(action_ref)],
    });
    let invoke_stmt = b.stmt(StmtKind::Expr(invoke));
    let guard_ref = b.expr(ExprKind::Local(fail));
    let five = b.expr(ExprKind::Int(5));
    let then_branch = write_block(&mut b, five);
    let guard = b.stmt(StmtKind::If { cond: guard_ref, then_branch, else_branch: None });
    let root = b.stmt(StmtKind::Block(vec![decl_fail, decl_action, invoke_stmt, guard]));
    let body = b.finish(root);

    assert_eq!(converged_findings(&body), Vec::new());
}

#[test]
fn a_negated_guard_over_an_invalidated_capture_stays_quiet() {
    // var fail = false;
    // var ev = new Event(() => { fail = true; });
    // ev.Invoke();
    // if (!fail) { return; }
    // Write(0);
    let mut b = BodyBuilder::new();
    let fail = b.local("fail", LocalKind::Local);
    let ev = b.local("ev", LocalKind::Local);
    let f = b.expr(ExprKind::Bool(false));
    let decl_fail = b.stmt(StmtKind::Decl { local: fail, init: Some(f) });
    let closure = b.expr(ExprKind::Closure { assigns: vec![fail] });
    let new_event = b.expr(ExprKind::New { args: vec![CallArg::by_value(closure)] });
    let decl_ev = b.stmt(StmtKind::Decl { local: ev, init: Some(new_event) });
    let ev_ref = b.expr(ExprKind::Local(ev));
    let invoke = b.expr(ExprKind::Call {
        name: "Invoke".into(),
        args: vec![CallArg::by_value(ev_ref)],
    });
    let invoke_stmt = b.stmt(StmtKind::Expr(invoke));
    let fail_ref = b.expr(ExprKind::Local(fail));
    let negated = b.expr(ExprKind::Unary { op: UnaryOp::Not, operand: fail_ref });
    let ret = b.stmt(StmtKind::Return(None));
    let then_branch = b.stmt(StmtKind::Block(vec![ret]));
    let guard = b.stmt(StmtKind::If { cond: negated, then_branch, else_branch: None });
    let zero = b.expr(ExprKind::Int(0));
    let tail_call =
        b.expr(ExprKind::Call { name: "Write".into(), args: vec![CallArg::by_value(zero)] });
    let tail = b.stmt(StmtKind::Expr(tail_call));
    let root = b.stmt(StmtKind::Block(vec![decl_fail, decl_ev, invoke_stmt, guard, tail]));
    let body = b.finish(root);

    assert_eq!(converged_findings(&body), Vec::new());
}

#[test]
fn a_closure_body_is_analyzed_in_isolation() {
    // get {
    //   var a = new Action(() => { var b = true; if (b) { Write(b); } });
    //   return true;
    // }
    // The getter sees only an opaque closure value; the closure's own body is
    // handed to the engine separately and reports there.
    let mut getter = BodyBuilder::new();
    let action = getter.local("a", LocalKind::Local);
    let closure = getter.expr(ExprKind::Closure { assigns: Vec::new() });
    let new_action = getter.expr(ExprKind::New { args: vec![CallArg::by_value(closure)] });
    let decl = getter.stmt(StmtKind::Decl { local: action, init: Some(new_action) });
    let t = getter.expr(ExprKind::Bool(true));
    let ret = getter.stmt(StmtKind::Return(Some(t)));
    let root = getter.stmt(StmtKind::Block(vec![decl, ret]));
    let getter_body = getter.finish(root);

    assert_eq!(converged_findings(&getter_body), Vec::new());

    let mut closure_body = BodyBuilder::new();
    let flag = closure_body.local("b", LocalKind::Local);
    let t = closure_body.expr(ExprKind::Bool(true));
    let decl = closure_body.stmt(StmtKind::Decl { local: flag, init: Some(t) });
    let guard_ref = closure_body.expr(ExprKind::Local(flag));
    let arg = closure_body.expr(ExprKind::Local(flag));
    let then_branch = write_block(&mut closure_body, arg);
    let guard = closure_body.stmt(StmtKind::If { cond: guard_ref, then_branch, else_branch: None });
    let root = closure_body.stmt(StmtKind::Block(vec![decl, guard]));
    let inner = closure_body.finish(root);

    assert_eq!(
        converged_findings(&inner),
        vec![Finding { span: inner.expr(guard_ref).span, value: true }]
    );
}
