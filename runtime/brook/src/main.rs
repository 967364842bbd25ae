//! Brook demo driver.
//!
//! Runs the bundled scenarios against an embedded runtime configured from
//! the `BROOK_*` environment variables.

use brook::{scenarios, with_runtime, HostConfig, HostError, Interpreter};
use brook_eval::{EvalError, MindId};

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        return;
    }

    let command = &args[1];

    let result = match command.as_str() {
        "counter" => {
            let times = parse_arg(&args, 2, 3_i64);
            run(|interp| counter(interp, times))
        }
        "timer" => {
            let duration = parse_arg(&args, 2, 2.0_f64);
            let tick = parse_arg(&args, 3, 1.0_f64);
            if tick <= 0.0 {
                eprintln!("error: tick length must be positive");
                std::process::exit(1);
            }
            run(|interp| timer(interp, duration, tick))
        }
        "patrol" => {
            let ticks = parse_arg(&args, 2, 6_u32);
            run(|interp| patrol(interp, ticks))
        }
        "config" => show_config(),
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        "version" | "--version" | "-V" => {
            println!("brook {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        _ => {
            eprintln!("Unknown command: {command}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn print_usage() {
    println!("Brook scripting runtime demo");
    println!();
    println!("Usage: brook <command> [args]");
    println!();
    println!("Commands:");
    println!("  counter [times]          Call Counter.increment repeatedly (default 3)");
    println!("  timer [duration] [tick]  Run Timer.wait_then_set, ticking the Mind (default 2.0 1.0)");
    println!("  patrol [ticks]           Run Sentry.patrol for some ticks, then stop it (default 6)");
    println!("  config                   Show the configuration read from the environment");
    println!("  help                     Show this help message");
    println!("  version                  Show version information");
    println!();
    println!("Environment:");
    println!("  BROOK_MAX_CALL_DEPTH     Nested invocations before StackOverflow");
    println!("  BROOK_LOG                Log filter, e.g. brook_eval=debug (falls back to RUST_LOG)");
    println!("  BROOK_LOG_TREE=1         Print logs as an indented span tree");
    println!("  BROOK_TRACE=1            Record and print frame transitions");
}

fn parse_arg<T: std::str::FromStr>(args: &[String], index: usize, default: T) -> T {
    let Some(raw) = args.get(index) else {
        return default;
    };
    if let Ok(value) = raw.parse() {
        value
    } else {
        eprintln!("error: invalid argument '{raw}'");
        std::process::exit(1);
    }
}

/// Initialise the runtime, run `scenario` against it and tear it down.
fn run(scenario: impl FnOnce(&mut Interpreter) -> Result<(), EvalError>) -> Result<(), HostError> {
    let config = brook::init_from_env()?;
    let outcome = with_runtime(|interp| {
        let result = scenario(interp);
        if config.trace {
            print_history(interp);
        }
        result
    });
    brook::teardown()?;
    outcome??;
    Ok(())
}

fn show_config() -> Result<(), HostError> {
    let config = HostConfig::from_env()?;
    println!("max call depth: {}", config.max_call_depth);
    println!(
        "log filter:     {}",
        config.log_filter.as_deref().unwrap_or("(off)")
    );
    println!("log tree:       {}", config.log_tree);
    println!("trace:          {}", config.trace);
    println!(
        "default mind:   {}",
        config.default_mind.as_deref().unwrap_or("(none)")
    );
    Ok(())
}

fn default_mind(interp: &Interpreter) -> Result<MindId, EvalError> {
    interp
        .default_mind()
        .ok_or_else(|| EvalError::new("the runtime has no default Mind"))
}

fn counter(interp: &mut Interpreter, times: i64) -> Result<(), EvalError> {
    let class = scenarios::counter(interp)?;
    let counter = interp.new_instance(class, &[])?;
    for _ in 0..times {
        let n = interp.invoke_method(&counter, "increment", &[])?;
        println!("increment -> {}", interp.describe(&n));
    }
    Ok(())
}

fn timer(interp: &mut Interpreter, duration: f64, tick: f64) -> Result<(), EvalError> {
    let classes = scenarios::delayed_set(interp)?;
    let mind = default_mind(interp)?;
    let flag = interp.new_instance(classes.flag, &[])?;
    let timer = interp.new_instance(classes.timer, &[])?;
    let args = [flag.clone(), interp.real(duration), interp.integer(42)];
    let handle = interp.invoke_coroutine(&timer, "wait_then_set", &args, mind)?;

    let mut ticks = 0;
    while !handle.is_finished() {
        interp.update(mind, tick);
        ticks += 1;
        let value = interp
            .data_member(&flag, "value")
            .map_or_else(|| "?".to_string(), |v| interp.describe(&v));
        println!(
            "tick {ticks} (t={:.2}): value = {value}, {}",
            interp.mind(mind).clock(),
            handle.status().as_str()
        );
    }
    report_failures(interp, mind);
    Ok(())
}

fn patrol(interp: &mut Interpreter, ticks: u32) -> Result<(), EvalError> {
    let class = scenarios::sentry(interp)?;
    let mind = default_mind(interp)?;
    let sentry = interp.new_instance(class, &[])?;
    let handle = interp.invoke_coroutine(&sentry, "patrol", &[], mind)?;

    for tick in 1..=ticks {
        interp.update(mind, 1.0);
        let count = |name: &str| {
            interp
                .data_member(&sentry, name)
                .and_then(|v| v.as_int())
                .unwrap_or_default()
        };
        println!(
            "tick {tick}: fast = {}, slow = {}, live frames = {}",
            count("fast"),
            count("slow"),
            interp.mind(mind).live_count()
        );
    }
    interp.stop(&handle);
    println!(
        "stopped: patrol is {}, live frames = {}",
        handle.status().as_str(),
        interp.mind(mind).live_count()
    );
    report_failures(interp, mind);
    Ok(())
}

fn report_failures(interp: &mut Interpreter, mind: MindId) {
    for failure in interp.take_failures(mind) {
        eprintln!("coroutine {} failed: {}", failure.name, failure.error);
    }
}

fn print_history(interp: &mut Interpreter) {
    let minds: Vec<MindId> = interp.minds().map(|(id, _)| id).collect();
    for mind in minds {
        let events = interp.take_history(mind);
        if events.is_empty() {
            continue;
        }
        println!("history of mind '{}':", interp.mind(mind).name());
        for event in events {
            println!(
                "  {:?} {} -> {}",
                event.frame,
                interp.symbols().text_of(event.name),
                event.status.as_str()
            );
        }
    }
}
