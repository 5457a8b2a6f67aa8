use anyhow::Context;
use invoker_api::checker_proto::{self, SubtaskContext};
use log::info;
use std::io;

fn main() -> anyhow::Result<()> {
    util::log::setup();
    let cx: SubtaskContext =
        checker_proto::read_message(io::stdin().lock()).context("failed to read context")?;
    let resp = checkers::tolerant_diff::check(&cx).context("failed to compare outputs")?;
    info!("Result: {:?} (line {})", resp.verdict, resp.lineno());
    checker_proto::write_message(io::stdout().lock(), &resp).context("failed to send response")?;
    Ok(())
}
