//! Thin CLI front-end: load a `.ulx` image and run it to completion,
//! streaming output straight to stdout. There is no Glk window layer
//! here -- `glk` calls fail with `UnresolvedGlkSelector`, same as
//! `NullHost`, just with output actually visible.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use glulx_core::{
    load, BumpHeap, Fault, FaultResult, HostIo, InMemorySaveIo, StdHostRng, Vm,
};

/// Run a Glulx program image.
#[derive(Parser, Debug)]
#[command(name = "glulx-run", version, about)]
struct Args {
    /// Path to the .ulx program image.
    image: PathBuf,

    /// Override the image's declared stack size, in bytes.
    #[arg(long)]
    stack_size: Option<u32>,

    /// Upper bound on memory the program may grow to via setmemsize.
    #[arg(long, default_value_t = 16 * 1024 * 1024)]
    max_memory: u32,
}

struct StdoutHost;

impl HostIo for StdoutHost {
    fn glk(&mut self, selector: u32, _args: &[u32]) -> FaultResult<u32> {
        Err(Fault::UnresolvedGlkSelector(selector))
    }

    fn stream_char(&mut self, ch: u8) {
        print!("{}", ch as char);
    }

    fn stream_unichar(&mut self, ch: u32) {
        if let Some(c) = char::from_u32(ch) {
            print!("{c}");
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("glulx-run: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> FaultResult<()> {
    let data = fs::read(&args.image)
        .map_err(|e| Fault::Other(format!("reading {}: {e}", args.image.display())))?;

    let mut loaded = load(data, args.max_memory)?;
    if let Some(stack_size) = args.stack_size {
        loaded.header.stacksize = stack_size;
    }

    let heap_start = loaded.header.endmem;
    let mut vm = Vm::new(
        loaded,
        Box::new(StdoutHost),
        Box::new(InMemorySaveIo::default()),
        Box::new(StdHostRng::default()),
        Box::new(BumpHeap::new(heap_start, args.max_memory)),
    )?;

    vm.run()?;
    std::io::stdout().flush().ok();
    Ok(())
}
