use crate::domain::models::ScheduleBlock;
use rand::Rng;

pub const DEFAULT_BREAK_SECONDS: i64 = 900;
/// Blocks at or below this length are never split.
pub const SPLIT_THRESHOLD_SECONDS: i64 = 7200;
pub const CHUNK_STEP_SECONDS: i64 = 900;
pub const MIN_CHUNK_STEPS: u32 = 8;
pub const MAX_CHUNK_STEPS: u32 = 12;

/// Source of chunk sizes, in 15-minute steps.
pub trait StepSource {
    /// Uniform value in `min..=max`.
    fn next_steps(&mut self, min: u32, max: u32) -> u32;
}

#[derive(Debug, Default)]
pub struct RandomSteps<R> {
    rng: R,
}

impl<R: Rng> RandomSteps<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng> StepSource for RandomSteps<R> {
    fn next_steps(&mut self, min: u32, max: u32) -> u32 {
        self.rng.gen_range(min..=max)
    }
}

/// Splits long work blocks into 2h-3h chunks separated by breaks.
///
/// Breaks are added on top of the work time: the chunks of a block always sum to the
/// block's original duration. The last chunk of a block can be shorter than two hours.
pub fn insert_breaks(
    blocks: Vec<ScheduleBlock>,
    break_seconds: i64,
    steps: &mut dyn StepSource,
) -> Vec<ScheduleBlock> {
    let mut result = Vec::with_capacity(blocks.len());
    for block in blocks {
        if block.is_break || block.duration <= SPLIT_THRESHOLD_SECONDS {
            result.push(block);
            continue;
        }

        let mut remaining = block.duration;
        while remaining > 0 {
            let max_chunk = i64::from(steps.next_steps(MIN_CHUNK_STEPS, MAX_CHUNK_STEPS))
                * CHUNK_STEP_SECONDS;
            let chunk = remaining.min(max_chunk);
            result.push(block.with_duration(chunk));
            remaining -= chunk;
            if remaining > 0 {
                result.push(ScheduleBlock::pause(break_seconds));
            }
        }
    }
    result
}
