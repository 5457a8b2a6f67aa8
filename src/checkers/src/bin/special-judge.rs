use anyhow::Context;
use checkers::special_judge;
use invoker_api::checker_proto::{self, SubtaskContext};
use std::{io, path::PathBuf};

fn main() -> anyhow::Result<()> {
    util::log::setup();
    let mut args = std::env::args_os().skip(1);
    let checker_exe = match args.next() {
        Some(p) => PathBuf::from(p),
        None => anyhow::bail!("usage: special-judge <comparator> [link dir]"),
    };
    let link_dir = args
        .next()
        .map_or_else(|| PathBuf::from(special_judge::DEFAULT_LINK_DIR), PathBuf::from);
    let cx: SubtaskContext =
        checker_proto::read_message(io::stdin().lock()).context("failed to read context")?;
    let resp = special_judge::judge(&cx, &checker_exe, &link_dir)?;
    checker_proto::write_message(io::stdout().lock(), &resp).context("failed to send response")?;
    Ok(())
}
