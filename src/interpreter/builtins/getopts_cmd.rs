//! getopts - POSIX option parsing over the positional parameters.
//!
//! OPTIND names the next argument to examine; the position inside a
//! cluster like `-abc` is interpreter state, resynchronized whenever the
//! user resets OPTIND.

use crate::interpreter::builtins::usage_error;
use crate::interpreter::control_flow::ExecOutcome;
use crate::interpreter::errors::ExecError;
use crate::interpreter::interpreter::Interpreter;

pub fn handle_getopts(interp: &mut Interpreter, args: &[String]) -> Result<ExecOutcome, ExecError> {
    let (optstring, name) = match (args.first(), args.get(1)) {
        (Some(o), Some(n)) => (o.clone(), n.clone()),
        _ => return usage_error(interp, "getopts: usage: getopts optstring name [arg ...]"),
    };
    let silent = optstring.starts_with(':');
    let spec: Vec<char> = optstring.trim_start_matches(':').chars().collect();

    let params: Vec<String> = if args.len() > 2 {
        args[2..].to_vec()
    } else {
        interp.env.positional_params().to_vec()
    };

    let mut optind: i64 = interp
        .env
        .get_scalar("OPTIND")
        .and_then(|s| s.parse().ok())
        .unwrap_or(1);
    if optind < 1 {
        optind = 1;
    }
    // User reset OPTIND: restart cluster scanning.
    if interp.getopts_state.0 != optind {
        interp.getopts_state = (optind, 0);
    }
    let mut char_pos = interp.getopts_state.1;

    let finish = |interp: &mut Interpreter, optind: i64, char_pos: usize| {
        let _ = interp.env.set_scalar("OPTIND", optind.to_string());
        interp.getopts_state = (optind, char_pos);
    };

    let arg = match params.get((optind - 1) as usize) {
        Some(a) => a.clone(),
        None => {
            let _ = interp.env.set_scalar(&name, "?");
            finish(interp, optind, 0);
            return Ok(ExecOutcome::status(1));
        }
    };
    if !arg.starts_with('-') || arg == "-" {
        let _ = interp.env.set_scalar(&name, "?");
        finish(interp, optind, 0);
        return Ok(ExecOutcome::status(1));
    }
    if arg == "--" {
        let _ = interp.env.set_scalar(&name, "?");
        finish(interp, optind + 1, 0);
        return Ok(ExecOutcome::status(1));
    }

    let cluster: Vec<char> = arg[1..].chars().collect();
    if char_pos >= cluster.len() {
        char_pos = 0;
    }
    let opt = cluster[char_pos];
    let spec_index = spec.iter().position(|c| *c == opt);
    let takes_arg = spec_index
        .map(|i| spec.get(i + 1) == Some(&':'))
        .unwrap_or(false);

    let advance_past_cluster = char_pos + 1 >= cluster.len();

    if spec_index.is_none() || opt == ':' {
        // Unknown option.
        let _ = interp.env.set_scalar(&name, "?");
        if silent {
            let _ = interp.env.set_scalar("OPTARG", opt.to_string());
        } else {
            let _ = interp.env.unset("OPTARG");
            interp.diagnostic(&format!("getopts: illegal option -- {}", opt));
        }
        if advance_past_cluster {
            finish(interp, optind + 1, 0);
        } else {
            finish(interp, optind, char_pos + 1);
        }
        return Ok(ExecOutcome::success());
    }

    if takes_arg {
        let rest: String = cluster[char_pos + 1..].iter().collect();
        let (optarg, next_ind) = if !rest.is_empty() {
            (Some(rest), optind + 1)
        } else {
            match params.get(optind as usize) {
                Some(v) => (Some(v.clone()), optind + 2),
                None => (None, optind + 1),
            }
        };
        match optarg {
            Some(v) => {
                let _ = interp.env.set_scalar("OPTARG", v);
                let _ = interp.env.set_scalar(&name, opt.to_string());
                finish(interp, next_ind, 0);
                Ok(ExecOutcome::success())
            }
            None => {
                // Missing required argument.
                if silent {
                    let _ = interp.env.set_scalar(&name, ":");
                    let _ = interp.env.set_scalar("OPTARG", opt.to_string());
                } else {
                    let _ = interp.env.set_scalar(&name, "?");
                    let _ = interp.env.unset("OPTARG");
                    interp.diagnostic(&format!("getopts: option requires an argument -- {}", opt));
                }
                finish(interp, next_ind, 0);
                Ok(ExecOutcome::success())
            }
        }
    } else {
        let _ = interp.env.set_scalar(&name, opt.to_string());
        let _ = interp.env.unset("OPTARG");
        if advance_past_cluster {
            finish(interp, optind + 1, 0);
        } else {
            finish(interp, optind, char_pos + 1);
        }
        Ok(ExecOutcome::success())
    }
}
