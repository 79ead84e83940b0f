use crate::cli::RunArgs;
use crate::commands::{consensus, select};
use crate::tools::StageTimeout;
use crate::utils::Result;

/// Full pipeline: reference selection, then consensus generation over the
/// directories selection staged.
pub fn run(args: RunArgs) -> Result<()> {
    let ctx = args.io.context();
    let timeout = StageTimeout::from_secs(args.io.stage_timeout);
    select::run_stage(&ctx, &args.selection, timeout)?;
    consensus::run_stage(&ctx, &args.consensus, timeout)
}
