use anyhow::{anyhow, Context, Result};
use kestrel_func::{CallState, PersistentCall, PersistentCallGroup, PersistentListenerMode};
use std::env;
use std::path::Path;
use std::process;

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:?}");
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let mut args = env::args().skip(1);
    let Some(command) = args.next() else {
        print_usage();
        return Ok(());
    };
    match command.as_str() {
        "list" => {
            let path = args.next().ok_or_else(|| anyhow!("list requires a path: binding_tool list <bindings>"))?;
            cmd_list(&path)
        }
        "validate" => {
            let path = args
                .next()
                .ok_or_else(|| anyhow!("validate requires a path: binding_tool validate <bindings>"))?;
            cmd_validate(&path)
        }
        "tidy" => {
            let input =
                args.next().ok_or_else(|| anyhow!("tidy requires a path: binding_tool tidy <bindings> [out]"))?;
            let output = args.next().unwrap_or_else(|| input.clone());
            cmd_tidy(&input, &output)
        }
        "convert" => {
            let input = args
                .next()
                .ok_or_else(|| anyhow!("convert requires input path: binding_tool convert <in> <out>"))?;
            let output = args
                .next()
                .ok_or_else(|| anyhow!("convert requires output path: binding_tool convert <in> <out>"))?;
            cmd_convert(&input, &output)
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => Err(anyhow!("unknown command '{other}'")),
    }
}

fn print_usage() {
    eprintln!(
        "Binding Tool

Usage:
  binding_tool list <bindings>           List persistent listeners with target, method and argument
  binding_tool validate <bindings>       Check every listener names a target and a method
  binding_tool tidy <bindings> [out]     Rewrite stored type names in canonical form
  binding_tool convert <input> <output>  Convert between JSON (.json) and binary (.kfunc) bindings
  binding_tool help                      Show this message
"
    );
}

fn cmd_list(path: &str) -> Result<()> {
    let group = load_group(path)?;
    println!("{:<5} {:<12} {:<24} {:<8} {:<18} {}", "Idx", "Target", "Method", "Mode", "State", "Argument");
    println!("{}", "-".repeat(96));
    for (index, call) in group.listeners().enumerate() {
        let target = call.target().map(|target| target.to_string()).unwrap_or_else(|| "-".to_string());
        let method = if call.method_name().is_empty() { "-" } else { call.method_name() };
        println!(
            "{:<5} {:<12} {:<24} {:<8} {:<18} {}",
            index,
            target,
            method,
            call.mode().label(),
            format!("{:?}", call.call_state()),
            argument_label(call)
        );
    }
    Ok(())
}

fn cmd_validate(path: &str) -> Result<()> {
    let group = load_group(path)?;
    let mut issues = Vec::new();
    let mut disabled = 0;
    for (index, call) in group.listeners().enumerate() {
        if call.target().is_none() {
            issues.push(format!("listener {index} has no target"));
        }
        if call.method_name().is_empty() {
            issues.push(format!("listener {index} has no method name"));
        }
        let arguments = call.arguments();
        if call.mode() == PersistentListenerMode::Object
            && arguments.object_argument().is_some()
            && arguments.object_argument_type_name().is_empty()
        {
            issues.push(format!("listener {index} stores an object argument without a type name"));
        }
        if call.call_state() == CallState::Off {
            disabled += 1;
        }
    }

    if issues.is_empty() {
        println!("Bindings '{}' are valid. Listeners: {}  Off: {}", path, group.count(), disabled);
        Ok(())
    } else {
        Err(anyhow!(format!("bindings '{}' have issues:\n  - {}", path, issues.join("\n  - "))))
    }
}

fn cmd_tidy(input_path: &str, output_path: &str) -> Result<()> {
    // Type names are canonicalized on load, so a load/save cycle is the whole job.
    let group = load_group(input_path)?;
    let typed = group
        .listeners()
        .filter(|call| !call.arguments().object_argument_type_name().is_empty())
        .count();
    group.save_to_path(output_path)?;
    println!("Tidied {} object type name(s) from '{}' into '{}'", typed, input_path, output_path);
    Ok(())
}

fn cmd_convert(input_path: &str, output_path: &str) -> Result<()> {
    let group = load_group(input_path)?;
    group.save_to_path(output_path)?;
    println!("Converted '{}' -> '{}'", input_path, output_path);
    Ok(())
}

fn argument_label(call: &PersistentCall) -> String {
    let arguments = call.arguments();
    match call.mode() {
        PersistentListenerMode::EventDefined | PersistentListenerMode::Void => "-".to_string(),
        PersistentListenerMode::Int => arguments.int_argument().to_string(),
        PersistentListenerMode::Float => arguments.float_argument().to_string(),
        PersistentListenerMode::Bool => arguments.bool_argument().to_string(),
        PersistentListenerMode::String => format!("{:?}", arguments.string_argument()),
        PersistentListenerMode::Object => match arguments.object_argument() {
            Some(entity) => format!("{} ({})", entity, arguments.object_argument_type_name()),
            None => "null".to_string(),
        },
    }
}

fn load_group(path: &str) -> Result<PersistentCallGroup> {
    let normalized = Path::new(path).canonicalize().unwrap_or_else(|_| Path::new(path).to_path_buf());
    PersistentCallGroup::load_from_path(&normalized)
        .with_context(|| format!("loading bindings '{}'", normalized.display()))
}
