use super::ExecutionContext;
use super::context::DEFAULT_BATCH;
use crate::core::{ClusterOpsError, OpPhase, Result};
use crate::ops::{ClusterOp, OpState};
use tracing::{Instrument, Level, event, info_span};

/// Runs an ordered list of operations against one [`ExecutionContext`].
///
/// Each operation goes through prepare, execute and finalize before the next
/// one starts. The first error stops the run and is returned wrapped with the
/// operation name and phase. Nothing is rolled back.
pub struct OpEngine {
    ops: Vec<Box<dyn ClusterOp>>,
    batch: String,
}

impl OpEngine {
    pub fn new(ops: Vec<Box<dyn ClusterOp>>) -> Self {
        Self {
            ops,
            batch: DEFAULT_BATCH.to_string(),
        }
    }

    /// Set the batch label diagnostic operations stage their files under
    pub fn with_batch(mut self, batch: &str) -> Self {
        self.batch = batch.to_string();
        self
    }

    pub fn register(&mut self, op: Box<dyn ClusterOp>) {
        self.ops.push(op);
    }

    pub fn ops(&self) -> &[Box<dyn ClusterOp>] {
        &self.ops
    }

    pub async fn run(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        let run_id = ctx.begin_run(&self.batch);
        let span = info_span!("op_engine.run", run_id = %run_id, batch = %self.batch, ops = self.ops.len());
        event!(parent: &span, Level::INFO, "pipeline started");

        for op in self.ops.iter_mut() {
            let name = op.name().to_string();
            if op.base().state() != OpState::Created {
                return Err(ClusterOpsError::InvalidState(format!(
                    "[{}] operation already ran ({:?})",
                    name,
                    op.base().state()
                )));
            }

            let op_span = info_span!(parent: &span, "op", name = %name);
            let outcome = run_op(op.as_mut(), ctx).instrument(op_span).await;
            if let Err((phase, err)) = outcome {
                op.base_mut().mark_failed();
                event!(parent: &span, Level::ERROR, op = %name, phase = %phase, error = %err, "operation failed");
                return Err(err.in_op(name, phase));
            }
        }

        event!(parent: &span, Level::INFO, "pipeline finished");
        Ok(())
    }
}

async fn run_op(
    op: &mut dyn ClusterOp,
    ctx: &mut ExecutionContext,
) -> std::result::Result<(), (OpPhase, ClusterOpsError)> {
    let tag = |phase: OpPhase| move |err: ClusterOpsError| (phase, err);

    op.prepare(ctx).map_err(tag(OpPhase::Prepare))?;
    op.base_mut()
        .advance(OpState::Prepared)
        .map_err(tag(OpPhase::Prepare))?;
    event!(Level::DEBUG, "prepared");

    op.execute(ctx).await.map_err(tag(OpPhase::Execute))?;
    op.base_mut()
        .advance(OpState::Executed)
        .map_err(tag(OpPhase::Execute))?;
    event!(Level::DEBUG, "executed");

    op.finalize(ctx).map_err(tag(OpPhase::Finalize))?;
    op.base_mut()
        .advance(OpState::Finalized)
        .map_err(tag(OpPhase::Finalize))?;
    event!(Level::DEBUG, "finalized");
    Ok(())
}
