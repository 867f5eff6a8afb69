//! Pipeline filling — several self-contained batches in flight per target.

use tracing::debug;

use skim_core::{EngineConfig, OpKind, WorkerSnapshot};
use skim_world::World;
use skimgrid_dispatch::ReservePolicy;

use crate::batch::schedule_batch;

/// Keep up to `pipeline_depth` batches in flight against `target`,
/// landings spaced `chain_spacing_ms` apart. Returns the number of batches
/// scheduled this pass.
///
/// The first landing sits `weaken_duration + 3·pad` out so even the
/// longest leg can be delayed non-negatively. Scheduling stops at the
/// first batch that places nothing; the next tick re-fills from scratch,
/// which is safe because every batch is self-contained.
pub fn fill_pipeline<W: World + ?Sized>(
    world: &W,
    target: &str,
    workers: &[WorkerSnapshot],
    engine: &EngineConfig,
    reserve: &ReservePolicy,
) -> u32 {
    let weaken_ms = world.op_duration_ms(OpKind::Weaken, target);
    let mut landing = world.now_ms() + weaken_ms + 3 * engine.step_pad_ms;

    let mut scheduled = 0;
    for _ in 0..engine.pipeline_depth {
        let ok = schedule_batch(
            world,
            target,
            workers,
            engine.steal_fraction,
            engine.step_pad_ms,
            landing,
            reserve,
        );
        if !ok {
            break;
        }
        scheduled += 1;
        landing += engine.chain_spacing_ms;
    }
    if scheduled > 0 {
        debug!(target, scheduled, "pipeline filled");
    }
    scheduled
}
