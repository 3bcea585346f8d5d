//! Pull, push and combined sync passes.

use std::path::Path;

use calsync_core::TriggerResponse;

use super::{emit, PassArgs, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    Pull,
    Push,
    Sync,
}

pub fn run(kind: PassKind, config: Option<&Path>, args: PassArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let session = Session::open(config, args.fixture.as_deref())?;
    let now = args.now();

    let response = match kind {
        PassKind::Pull => TriggerResponse::from_pass(&session.ctx.pull_at(now)),
        PassKind::Push => TriggerResponse::from_pass(&session.ctx.push()),
        PassKind::Sync => TriggerResponse::from_sync(&session.ctx.sync_at(now)),
    };

    session.finish(args.save)?;
    emit(&response)
}
