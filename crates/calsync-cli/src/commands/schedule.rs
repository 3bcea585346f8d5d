//! Key-guarded scheduling pass.

use std::path::Path;

use super::{emit, PassArgs, Session};

pub fn run(config: Option<&Path>, key: Option<String>, args: PassArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let session = Session::open(config, args.fixture.as_deref())?;
    let response = session.ctx.trigger_schedule_at(key.as_deref(), args.now());
    session.finish(args.save)?;
    emit(&response)
}
