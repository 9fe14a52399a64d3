use std::env;

use rbrope::{
    cext::BridgeContext,
    encoding::{CodeRange, Encoding},
    options::Options,
    rope::Rope,
};
use tracing_subscriber::EnvFilter;

fn main() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();

    let mut args: Vec<String> = env::args().collect();
    let show_stats = args.iter().any(|arg| arg == "--stats");
    if show_stats {
        args.retain(|arg| arg != "--stats");
    }
    let options = match extract_options(&mut args) {
        Some(value) => value,
        None => return,
    };
    let encoding = match extract_encoding(&mut args) {
        Some(value) => value,
        None => return,
    };
    let repeat = match extract_usize(&mut args, "--repeat") {
        Some(value) => value,
        None => return,
    };
    let slice = match extract_slice(&mut args) {
        Some(value) => value,
        None => return,
    };

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_help();
        return;
    }

    let context = BridgeContext::new(options);
    let command = args[1].as_str();
    let parts = &args[2..];
    if parts.is_empty() {
        eprintln!("Usage: rbrope {} <text> [<text> ...]", command);
        return;
    }

    let rope = match build_rope(&context, parts, encoding, repeat, slice) {
        Ok(rope) => rope,
        Err(err) => {
            eprintln!("Error: {}", err);
            return;
        }
    };

    match command {
        "dump" => println!("{}", rope.dump_string()),
        "structure" => println!("{}", rope.structure()),
        "debug" => print!("{}", rope.debug_print(true)),
        other => {
            eprintln!("Error: unknown command `{}`", other);
            print_help();
            return;
        }
    }

    if show_stats {
        println!();
        print!("{}", context.stats().report());
    }
}

fn print_help() {
    println!(
        "\
rbrope CLI

Usage:
  rbrope dump <text> [<text> ...]
  rbrope structure <text> [<text> ...]
  rbrope debug <text> [<text> ...]

Each <text> becomes a leaf; the leaves are concatenated left to right.

Flags:
  --encoding <name>        Encoding of the leaves (default: UTF-8)
  --repeat <n>             Repeat the concatenation n times
  --slice <offset>:<len>   Take a byte substring of the result
  --options <file>         Load options from a JSON file
  --stats                  Print bridge and scan counters afterwards"
    );
}

fn build_rope(
    context: &BridgeContext,
    parts: &[String],
    encoding: Encoding,
    repeat: Option<usize>,
    slice: Option<(usize, usize)>,
) -> rbrope::error::RopeResult<Rope> {
    let mut rope = Rope::empty(encoding);
    for part in parts {
        let leaf = Rope::from_bytes(part.as_bytes(), encoding, CodeRange::Unknown);
        rope = context.concat(&rope, &leaf)?;
    }
    if let Some(times) = repeat {
        rope = rope.repeat(times)?;
    }
    if let Some((offset, length)) = slice {
        rope = rope.substring(offset, length)?;
    }
    Ok(rope)
}

fn take_value(args: &mut Vec<String>, flag: &str, usage: &str) -> Option<Option<String>> {
    let mut found = None;
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag {
            if i + 1 >= args.len() {
                eprintln!("Usage: rbrope <command> {} {}", flag, usage);
                return None;
            }
            found = Some(args.remove(i + 1));
            args.remove(i);
            continue;
        }
        i += 1;
    }
    Some(found)
}

fn extract_options(args: &mut Vec<String>) -> Option<Options> {
    match take_value(args, "--options", "<file>")? {
        None => Some(Options::default()),
        Some(path) => match Options::load_from_path(&path) {
            Ok(options) => Some(options),
            Err(err) => {
                eprintln!("Error: {}", err);
                None
            }
        },
    }
}

fn extract_encoding(args: &mut Vec<String>) -> Option<Encoding> {
    match take_value(args, "--encoding", "<name>")? {
        None => Some(Encoding::Utf8),
        Some(name) => match Encoding::from_name(&name) {
            Some(encoding) => Some(encoding),
            None => {
                eprintln!("Error: unknown encoding `{}`.", name);
                None
            }
        },
    }
}

fn extract_usize(args: &mut Vec<String>, flag: &str) -> Option<Option<usize>> {
    match take_value(args, flag, "<n>")? {
        None => Some(None),
        Some(value) => match value.parse::<usize>() {
            Ok(parsed) => Some(Some(parsed)),
            Err(_) => {
                eprintln!("Error: {} expects a non-negative integer.", flag);
                None
            }
        },
    }
}

fn extract_slice(args: &mut Vec<String>) -> Option<Option<(usize, usize)>> {
    let Some(value) = take_value(args, "--slice", "<offset>:<len>")? else {
        return Some(None);
    };
    let parsed = value
        .split_once(':')
        .and_then(|(offset, len)| Some((offset.parse().ok()?, len.parse().ok()?)));
    if parsed.is_none() {
        eprintln!("Error: --slice expects <offset>:<len>.");
        return None;
    }
    Some(parsed)
}
