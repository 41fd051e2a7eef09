//! Dynamic special variables.
//!
//! These are computed on read rather than stored: `$?`, `$$`, `$!`, `$#`,
//! `$0`, `$-`, positional parameters, RANDOM, SECONDS, LINENO, BASHPID,
//! PPID, UID, EUID, PIPESTATUS, BASH_REMATCH, FUNCNAME.

use rand::Rng;

use super::value::Value;
use super::Environment;

pub(super) fn dynamic_value(env: &mut Environment, name: &str) -> Option<Value> {
    match name {
        "?" => Some(Value::scalar(env.last_status.to_string())),
        "$" => Some(Value::scalar(env.shell_pid.to_string())),
        "!" => env.last_bg_pid.map(|p| Value::scalar(p.to_string())),
        "#" => Some(Value::scalar(env.num_positional().to_string())),
        "0" => Some(Value::scalar(env.arg0.clone())),
        "-" => Some(Value::scalar(env.options.flag_string())),
        "*" | "@" => Some(Value::indexed_from(env.positional_params().to_vec())),
        "RANDOM" if !env.random_disabled => {
            Some(Value::scalar(env.rng.gen_range(0..32768).to_string()))
        }
        "SECONDS" if !env.seconds_disabled => Some(Value::scalar(env.seconds().to_string())),
        "LINENO" => Some(Value::scalar(env.current_line.to_string())),
        "BASHPID" => Some(Value::scalar(env.current_pid.to_string())),
        "PPID" => Some(Value::scalar(env.ppid.to_string())),
        "UID" => Some(Value::scalar(nix::unistd::getuid().as_raw().to_string())),
        "EUID" => Some(Value::scalar(nix::unistd::geteuid().as_raw().to_string())),
        "PIPESTATUS" => Some(Value::indexed_from(
            env.pipestatus.iter().map(|s| s.to_string()).collect(),
        )),
        "BASH_REMATCH" => {
            if env.rematch.is_empty() {
                None
            } else {
                Some(Value::indexed_from(env.rematch.clone()))
            }
        }
        "FUNCNAME" => {
            if env.func_stack.is_empty() {
                None
            } else {
                let mut names: Vec<String> = env.func_stack.iter().rev().cloned().collect();
                names.push(if env.options.interactive { "source".into() } else { "main".into() });
                Some(Value::indexed_from(names))
            }
        }
        _ => {
            if !name.is_empty() && name.chars().all(|c| c.is_ascii_digit()) {
                let n: usize = name.parse().ok()?;
                env.get_positional(n).map(Value::Scalar)
            } else {
                None
            }
        }
    }
}
