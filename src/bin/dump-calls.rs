use docopt::Docopt;
use serde::Deserialize;

use glx_replay::dispatch::{self, Disposition};
use glx_replay::{Call, FileRecording};

use std::process;

const USAGE: &str = "
Dump glx-replay call logs.

Usage:
  dump-calls <dir>...
";

#[derive(Debug, Deserialize)]
struct Args {
    arg_dir: Vec<String>,
}

fn main() {
    let args: Args = Docopt::new(USAGE)
        .and_then(|d| d.deserialize())
        .unwrap_or_else(|e| e.exit());

    let mut failed = false;
    for dir in &args.arg_dir {
        let recording = match FileRecording::open(dir) {
            Ok(recording) => recording,
            Err(err) => {
                eprintln!("{}: {}", dir, err);
                failed = true;
                continue;
            }
        };

        if args.arg_dir.len() > 1 {
            println!("{}:", dir);
        }
        for (serial, call) in recording.calls.iter().enumerate() {
            println!("{:6} {}", serial, describe(call, &recording.variable));
        }
    }

    if failed {
        process::exit(1);
    }
}

/// Format `call`, with its side data decoded and, for calls recorded only by
/// name, what replay will do with it.
fn describe(call: &Call, variable: &[u8]) -> String {
    match *call {
        Call::create_context_attribs { config, share_context, attrib_list, returned } => {
            let attribs = match attrib_list.get::<Vec<i32>>(variable) {
                Ok(attribs) => format!("{:x?}", attribs),
                Err(err) => format!("<{}>", err),
            };
            format!(
                "create_context_attribs {{ config: 0x{:x}, share_context: 0x{:x}, attrib_list: {}, returned: 0x{:x} }}",
                config, share_context, attribs, returned
            )
        }
        Call::other { name } => match name.get::<&str>(variable) {
            Ok(name) => {
                let disposition = match dispatch::lookup(name) {
                    Some(Disposition::Ignore) => "ignored",
                    Some(Disposition::Replay) | None => "unsupported",
                };
                format!("{} ({})", name, disposition)
            }
            Err(err) => format!("other {{ name: <{}> }}", err),
        },
        ref call => format!("{:?}", call),
    }
}
