//! Lowering from the body IR to the block graph.
//!
//! Structured statements become blocks and terminator edges; simple
//! statements are appended to the current block. Statements that can never
//! execute (after a `return`, `break`, ...) are still lowered, into blocks
//! no edge points at, so the driver simply never visits them.

use vigil_hir::body::{Body, ExprId, ExprKind, StmtId, StmtKind};

use crate::cfg::{BlockId, CfgBuilder, ControlFlowGraph, Terminator};

/// True when the body contains a construct the analysis does not model
/// (`try`, or anything the front end lowered to `Unsupported`). Such bodies
/// are skipped wholesale rather than analyzed partially.
pub(crate) fn contains_opaque(body: &Body) -> bool {
    stmt_contains_opaque(body, body.root())
}

fn stmt_contains_opaque(body: &Body, stmt: StmtId) -> bool {
    match &body.stmt(stmt).kind {
        StmtKind::Try { .. } | StmtKind::Unsupported => true,
        StmtKind::Block(stmts) => stmts.iter().any(|s| stmt_contains_opaque(body, *s)),
        StmtKind::If {
            then_branch,
            else_branch,
            ..
        } => {
            stmt_contains_opaque(body, *then_branch)
                || else_branch.map_or(false, |s| stmt_contains_opaque(body, s))
        }
        StmtKind::While { body: b, .. } | StmtKind::ForEach { body: b, .. } => {
            stmt_contains_opaque(body, *b)
        }
        StmtKind::For {
            init,
            update,
            body: b,
            ..
        } => {
            init.iter().any(|s| stmt_contains_opaque(body, *s))
                || update.iter().any(|s| stmt_contains_opaque(body, *s))
                || stmt_contains_opaque(body, *b)
        }
        StmtKind::Switch { arms, .. } => arms.iter().any(|s| stmt_contains_opaque(body, *s)),
        StmtKind::Decl { .. }
        | StmtKind::Assign { .. }
        | StmtKind::CompoundAssign { .. }
        | StmtKind::Expr(_)
        | StmtKind::Break
        | StmtKind::Continue
        | StmtKind::Return(_)
        | StmtKind::Throw(_) => false,
    }
}

pub(crate) fn lower(body: &Body) -> ControlFlowGraph {
    let mut lowering = Lowering::new(body);
    let entry = lowering.cfg.new_block();
    let _ = lowering.build_stmt(body.root(), entry);
    lowering.cfg.build(entry)
}

struct Lowering<'a> {
    body: &'a Body,
    cfg: CfgBuilder,
    /// Innermost `break` target. Loops and switches both push here.
    break_stack: Vec<BlockId>,
    /// Innermost `continue` target. Only loops push here, so a `continue`
    /// inside a switch inside a loop still reaches the loop header.
    continue_stack: Vec<BlockId>,
}

impl<'a> Lowering<'a> {
    fn new(body: &'a Body) -> Self {
        Self {
            body,
            cfg: CfgBuilder::new(),
            break_stack: Vec::new(),
            continue_stack: Vec::new(),
        }
    }

    /// `while (true)` is lowered the same as an absent condition.
    fn loop_condition(&self, cond: &Option<ExprId>) -> Option<ExprId> {
        let cond = (*cond)?;
        match self.body.expr(cond).kind {
            ExprKind::Bool(true) => None,
            _ => Some(cond),
        }
    }

    /// Builds a statement sequence. Statements following a diverging one go
    /// into fresh blocks that nothing jumps to.
    fn build_seq(&mut self, stmts: &[StmtId], entry: BlockId) -> Option<BlockId> {
        let mut reachable_current: Option<BlockId> = Some(entry);
        let mut unreachable_current: Option<BlockId> = None;

        for &stmt in stmts {
            if let Some(cur) = reachable_current {
                reachable_current = self.build_stmt(stmt, cur);
                continue;
            }

            let cur = unreachable_current.unwrap_or_else(|| {
                let bb = self.cfg.new_block();
                unreachable_current = Some(bb);
                bb
            });

            unreachable_current = self.build_stmt(stmt, cur);
        }

        reachable_current
    }

    /// Builds `stmt` starting in `entry`; returns the block where execution
    /// falls through, or `None` if every path diverges.
    fn build_stmt(&mut self, stmt: StmtId, entry: BlockId) -> Option<BlockId> {
        let stmt_data = self.body.stmt(stmt);
        match &stmt_data.kind {
            StmtKind::Block(stmts) => self.build_seq(stmts, entry),

            StmtKind::Decl { .. }
            | StmtKind::Assign { .. }
            | StmtKind::CompoundAssign { .. }
            | StmtKind::Expr(_) => {
                self.cfg.push_stmt(entry, stmt);
                Some(entry)
            }

            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let then_entry = self.cfg.new_block();
                let else_entry = else_branch.map(|_| self.cfg.new_block());
                let join = self.cfg.new_block();

                self.cfg.set_terminator(
                    entry,
                    Terminator::Branch {
                        condition: *cond,
                        true_target: then_entry,
                        false_target: else_entry.unwrap_or(join),
                        from: stmt,
                    },
                );

                let then_fallthrough = self.build_stmt(*then_branch, then_entry);
                if let Some(bb) = then_fallthrough {
                    self.goto(bb, join);
                }

                let else_fallthrough = match (else_branch, else_entry) {
                    (Some(stmt), Some(bb)) => self.build_stmt(*stmt, bb),
                    // Without an `else` the false edge reaches the join
                    // directly.
                    _ => Some(join),
                };
                if let Some(bb) = else_fallthrough {
                    if bb != join {
                        self.goto(bb, join);
                    }
                }

                if then_fallthrough.is_some() || else_fallthrough.is_some() {
                    Some(join)
                } else {
                    None
                }
            }

            StmtKind::While { cond, body } => {
                let header = self.cfg.new_block();
                let body_bb = self.cfg.new_block();
                let after_bb = self.cfg.new_block();

                self.goto(entry, header);

                match self.loop_condition(cond) {
                    Some(cond) => self.cfg.set_terminator(
                        header,
                        Terminator::Branch {
                            condition: cond,
                            true_target: body_bb,
                            false_target: after_bb,
                            from: stmt,
                        },
                    ),
                    None => self.cfg.set_terminator(
                        header,
                        Terminator::Goto {
                            target: body_bb,
                            from: Some(stmt),
                        },
                    ),
                }

                self.break_stack.push(after_bb);
                self.continue_stack.push(header);
                let body_fallthrough = self.build_stmt(*body, body_bb);
                self.continue_stack.pop();
                self.break_stack.pop();

                if let Some(bb) = body_fallthrough {
                    self.goto(bb, header);
                }

                Some(after_bb)
            }

            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => {
                let init_end = self.build_seq(init, entry)?;

                let header = self.cfg.new_block();
                let body_bb = self.cfg.new_block();
                let update_bb = if update.is_empty() {
                    header
                } else {
                    self.cfg.new_block()
                };
                let after_bb = self.cfg.new_block();

                self.goto(init_end, header);

                match self.loop_condition(cond) {
                    Some(cond) => self.cfg.set_terminator(
                        header,
                        Terminator::Branch {
                            condition: cond,
                            true_target: body_bb,
                            false_target: after_bb,
                            from: stmt,
                        },
                    ),
                    None => self.cfg.set_terminator(
                        header,
                        Terminator::Goto {
                            target: body_bb,
                            from: Some(stmt),
                        },
                    ),
                }

                self.break_stack.push(after_bb);
                self.continue_stack.push(update_bb);
                let body_fallthrough = self.build_stmt(*body, body_bb);
                self.continue_stack.pop();
                self.break_stack.pop();

                if let Some(bb) = body_fallthrough {
                    self.goto(bb, update_bb);
                }

                if !update.is_empty() {
                    if let Some(bb) = self.build_seq(update, update_bb) {
                        self.goto(bb, header);
                    }
                }

                Some(after_bb)
            }

            StmtKind::ForEach {
                element,
                iterable,
                body,
            } => {
                let header = self.cfg.new_block();
                let body_bb = self.cfg.new_block();
                let after_bb = self.cfg.new_block();

                self.goto(entry, header);
                self.cfg.set_terminator(
                    header,
                    Terminator::Iterate {
                        element: *element,
                        iterable: *iterable,
                        body_target: body_bb,
                        exit_target: after_bb,
                        from: stmt,
                    },
                );

                self.break_stack.push(after_bb);
                self.continue_stack.push(header);
                let body_fallthrough = self.build_stmt(*body, body_bb);
                self.continue_stack.pop();
                self.break_stack.pop();

                if let Some(bb) = body_fallthrough {
                    self.goto(bb, header);
                }

                Some(after_bb)
            }

            StmtKind::Switch {
                scrutinee,
                arms,
                has_default,
            } => {
                let arm_entries: Vec<BlockId> =
                    arms.iter().map(|_| self.cfg.new_block()).collect();
                let after_bb = self.cfg.new_block();

                self.cfg.set_terminator(
                    entry,
                    Terminator::Switch {
                        scrutinee: *scrutinee,
                        arms: arm_entries.clone(),
                        fallthrough: (!has_default).then_some(after_bb),
                        from: stmt,
                    },
                );

                self.break_stack.push(after_bb);
                for (arm, arm_entry) in arms.iter().zip(&arm_entries) {
                    if let Some(bb) = self.build_stmt(*arm, *arm_entry) {
                        self.goto(bb, after_bb);
                    }
                }
                self.break_stack.pop();

                Some(after_bb)
            }

            StmtKind::Return(value) => {
                self.cfg.set_terminator(
                    entry,
                    Terminator::Return {
                        value: *value,
                        from: stmt,
                    },
                );
                None
            }

            StmtKind::Throw(value) => {
                self.cfg.set_terminator(
                    entry,
                    Terminator::Throw {
                        value: *value,
                        from: stmt,
                    },
                );
                None
            }

            StmtKind::Break => {
                match self.break_stack.last() {
                    Some(target) => {
                        let target = *target;
                        self.cfg.set_terminator(
                            entry,
                            Terminator::Goto {
                                target,
                                from: Some(stmt),
                            },
                        );
                    }
                    // Malformed input; treat as leaving the body.
                    None => self.cfg.set_terminator(entry, Terminator::Exit),
                }
                None
            }

            StmtKind::Continue => {
                match self.continue_stack.last() {
                    Some(target) => {
                        let target = *target;
                        self.cfg.set_terminator(
                            entry,
                            Terminator::Goto {
                                target,
                                from: Some(stmt),
                            },
                        );
                    }
                    None => self.cfg.set_terminator(entry, Terminator::Exit),
                }
                None
            }

            // Opaque bodies are filtered out before lowering; if one gets
            // here anyway, take the happy path through the protected region.
            StmtKind::Try { body } => self.build_stmt(*body, entry),
            StmtKind::Unsupported => Some(entry),
        }
    }

    fn goto(&mut self, from: BlockId, to: BlockId) {
        self.cfg.set_terminator(
            from,
            Terminator::Goto {
                target: to,
                from: None,
            },
        );
    }
}
