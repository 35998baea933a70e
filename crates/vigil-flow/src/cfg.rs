use vigil_hir::body::{ExprId, LocalId, StmtId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub usize);

impl BlockId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicBlock {
    /// Simple statements executed sequentially. Control-flow statements are
    /// represented by the `terminator`.
    pub stmts: Vec<StmtId>,
    pub terminator: Terminator,
}

impl BasicBlock {
    pub fn successors(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.terminator.successors()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminator {
    /// Unconditional jump. Also used for the headers of `while (true)` and
    /// `for (;;)`, which branch nowhere and are never reported on.
    Goto {
        target: BlockId,
        from: Option<StmtId>,
    },
    /// Two-way branch on a boolean condition expression. The only terminator
    /// the condition reporter looks at.
    Branch {
        condition: ExprId,
        true_target: BlockId,
        false_target: BlockId,
        from: StmtId,
    },
    /// `foreach` header: either enter the body with the element variable
    /// freshly bound, or leave the loop. Carries no boolean condition.
    Iterate {
        element: LocalId,
        iterable: ExprId,
        body_target: BlockId,
        exit_target: BlockId,
        from: StmtId,
    },
    /// Multi-way branch into switch sections. `fallthrough` is the implicit
    /// no-match edge to the block after the switch; present only when the
    /// switch has no `default` section.
    Switch {
        scrutinee: ExprId,
        arms: Vec<BlockId>,
        fallthrough: Option<BlockId>,
        from: StmtId,
    },
    Return {
        value: Option<ExprId>,
        from: StmtId,
    },
    /// `throw e`, or a bare rethrow when the operand is absent.
    Throw {
        value: Option<ExprId>,
        from: StmtId,
    },
    Exit,
}

impl Terminator {
    #[must_use]
    pub fn successors(&self) -> Successors<'_> {
        match self {
            Terminator::Goto { target, .. } => Successors::One(*target),
            Terminator::Branch {
                true_target,
                false_target,
                ..
            } => Successors::Two([*true_target, *false_target], 0),
            Terminator::Iterate {
                body_target,
                exit_target,
                ..
            } => Successors::Two([*body_target, *exit_target], 0),
            Terminator::Switch {
                arms, fallthrough, ..
            } => Successors::Many(arms.iter(), *fallthrough),
            Terminator::Return { .. } | Terminator::Throw { .. } | Terminator::Exit => {
                Successors::None
            }
        }
    }

    #[must_use]
    pub fn from_stmt(&self) -> Option<StmtId> {
        match *self {
            Terminator::Goto { from, .. } => from,
            Terminator::Branch { from, .. } => Some(from),
            Terminator::Iterate { from, .. } => Some(from),
            Terminator::Switch { from, .. } => Some(from),
            Terminator::Return { from, .. } => Some(from),
            Terminator::Throw { from, .. } => Some(from),
            Terminator::Exit => None,
        }
    }
}

#[derive(Debug)]
pub enum Successors<'a> {
    None,
    One(BlockId),
    Two([BlockId; 2], usize),
    Many(std::slice::Iter<'a, BlockId>, Option<BlockId>),
}

impl Iterator for Successors<'_> {
    type Item = BlockId;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Successors::None => None,
            Successors::One(bb) => {
                let out = *bb;
                *self = Successors::None;
                Some(out)
            }
            Successors::Two(blocks, idx) => {
                let out = blocks.get(*idx).copied();
                *idx += 1;
                if *idx >= blocks.len() {
                    *self = Successors::None;
                }
                out
            }
            Successors::Many(iter, extra) => {
                if let Some(next) = iter.next() {
                    return Some(*next);
                }
                extra.take()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlFlowGraph {
    pub entry: BlockId,
    pub blocks: Vec<BasicBlock>,
}

impl ControlFlowGraph {
    #[must_use]
    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.index()]
    }

    pub fn successors(&self, id: BlockId) -> impl Iterator<Item = BlockId> + '_ {
        self.blocks[id.index()].successors()
    }
}

pub(crate) struct CfgBuilder {
    blocks: Vec<BasicBlock>,
}

impl CfgBuilder {
    pub(crate) fn new() -> Self {
        Self { blocks: Vec::new() }
    }

    pub(crate) fn new_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len());
        self.blocks.push(BasicBlock {
            stmts: Vec::new(),
            terminator: Terminator::Exit,
        });
        id
    }

    pub(crate) fn push_stmt(&mut self, bb: BlockId, stmt: StmtId) {
        self.blocks[bb.index()].stmts.push(stmt);
    }

    pub(crate) fn set_terminator(&mut self, bb: BlockId, term: Terminator) {
        self.blocks[bb.index()].terminator = term;
    }

    pub(crate) fn build(self, entry: BlockId) -> ControlFlowGraph {
        ControlFlowGraph {
            entry,
            blocks: self.blocks,
        }
    }
}
