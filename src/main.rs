//! Streamcore CLI
//!
//! This is a demonstration CLI for the streamcore library.

use anyhow::{bail, Context, Result};
use streamcore::prelude::*;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage(&args[0]);
        return;
    }

    let result = match args[1].as_str() {
        "kinds" => {
            list_kinds();
            Ok(())
        }
        "export" => export_module(),
        "run" => run_chain(&args[2..]),
        "help" | "--help" | "-h" => {
            print_usage(&args[0]);
            Ok(())
        }
        _ => {
            eprintln!("Unknown command: {}", args[1]);
            print_usage(&args[0]);
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        if let Some(fix) = e.downcast_ref::<CoreError>().and_then(CoreError::suggested_fix) {
            eprintln!("Hint: {}", fix);
        }
        std::process::exit(1);
    }
}

fn print_usage(program: &str) {
    println!("Streamcore v{}", streamcore::VERSION);
    println!();
    println!("Usage: {} <command> [options]", program);
    println!();
    println!("Commands:");
    println!("  kinds                 List the content kinds a stream can carry");
    println!("  export                Print the descriptor of a test module as JSON");
    println!("  run <steps> [options] Drive a chain of three test modules");
    println!("  help                  Show this help message");
    println!();
    println!("Run options:");
    println!("  --seed <n>     Seed of the random input (default: 42)");
    println!("  --size <WxH>   Image size of the modules (default: 64x48)");
    println!("  --save <dir>   Serialize the last module to a directory");
}

fn list_kinds() {
    println!("Content kinds ({} total):", TypeTag::all().len());
    for tag in TypeTag::all() {
        let stream = stream_of(*tag, "sample", ModuleId::new());
        let storage = if tag.is_inline() { "inline" } else { "stored as artifact" };
        println!("  • {:8} {:20} {}", tag.name(), stream.class_name(), storage);
    }
}

fn export_module() -> Result<()> {
    let module = FakeModule::new("fake", &ConfigDocument::new())?;
    let descriptor = module.export();
    println!("{}", serde_json::to_string_pretty(&descriptor)?);
    Ok(())
}

fn run_chain(args: &[String]) -> Result<()> {
    let Some(steps) = args.first() else {
        bail!("Please specify the number of steps");
    };
    let steps: u64 = steps
        .parse()
        .with_context(|| format!("Invalid number of steps: {}", steps))?;

    let mut seed: u32 = 42;
    let mut size = (64u32, 48u32);
    let mut save: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--seed" if i + 1 < args.len() => {
                seed = args[i + 1]
                    .parse()
                    .with_context(|| format!("Invalid seed: {}", args[i + 1]))?;
                i += 2;
            }
            "--size" if i + 1 < args.len() => {
                size = parse_dimensions(&args[i + 1])
                    .with_context(|| format!("Invalid size: {}", args[i + 1]))?;
                i += 2;
            }
            "--save" if i + 1 < args.len() => {
                save = Some(args[i + 1].clone());
                i += 2;
            }
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                i += 1;
            }
        }
    }

    let mut config = ConfigDocument::new();
    config.insert("width".to_string(), serde_json::json!(size.0));
    config.insert("height".to_string(), serde_json::json!(size.1));

    let mut a = FakeModule::new("source", &config)?;
    let mut b = FakeModule::new("relay", &config)?;
    let mut c = FakeModule::new("sink", &config)?;
    let mut connections = connect_matching_ids(&a, &mut b)?;
    connections.extend(connect_matching_ids(&b, &mut c)?);
    println!("Wired {} connections", connections.len());

    for _ in 0..steps {
        a.process_random_input(&mut seed)?;
        b.convert_inputs()?;
        b.process_frame()?;
        c.convert_inputs()?;
        c.process_frame()?;
    }

    println!("Processed {} steps (seed is now {})", c.frames(), seed);
    for (id, port) in c.inputs().iter() {
        let value = match port.value() {
            Ok(value) => value.to_string(),
            Err(_) => port.query(0, 0),
        };
        println!("  [{}] {:8} t={:<6} {}", id, port.name(), port.time_stamp(), value);
    }

    if let Some(dir) = save {
        let storage = ScopedStorage::new(&dir)?;
        let document = c.serialize(Some(&storage))?;
        let path = storage.artifact_path("sink.json");
        std::fs::write(&path, serde_json::to_string_pretty(&document)?)
            .with_context(|| format!("Cannot write {}", path.display()))?;
        println!("Saved to {}", path.display());
    }
    Ok(())
}

fn parse_dimensions(s: &str) -> Option<(u32, u32)> {
    let (w, h) = s.split_once('x')?;
    Some((w.parse().ok()?, h.parse().ok()?))
}
