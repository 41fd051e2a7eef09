//! cd and pwd.
//!
//! cd maintains logical PWD/OLDPWD (unless -P), honors CDPATH and `cd -`.

use std::path::{Component, Path, PathBuf};

use crate::interpreter::builtins::usage_error;
use crate::interpreter::control_flow::ExecOutcome;
use crate::interpreter::errors::ExecError;
use crate::interpreter::interpreter::Interpreter;

pub fn handle_cd(interp: &mut Interpreter, args: &[String]) -> Result<ExecOutcome, ExecError> {
    let mut physical = false;
    let mut operand: Option<&str> = None;
    for arg in args {
        match arg.as_str() {
            "-P" => physical = true,
            "-L" => physical = false,
            "--" => {}
            "-" => operand = Some("-"),
            a if a.starts_with('-') && a.len() > 1 => {
                return usage_error(interp, &format!("cd: {}: invalid option", a));
            }
            a => operand = Some(a),
        }
    }

    let current = interp.env.get_scalar("PWD").unwrap_or_else(|| {
        std::env::current_dir()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "/".to_string())
    });

    let (target, echo) = match operand {
        None => match interp.env.get_scalar("HOME") {
            Some(home) if !home.is_empty() => (home, false),
            _ => {
                interp.diagnostic("cd: HOME not set");
                return Ok(ExecOutcome::status(1));
            }
        },
        Some("-") => match interp.env.get_scalar("OLDPWD") {
            Some(old) if !old.is_empty() => (old, true),
            _ => {
                interp.diagnostic("cd: OLDPWD not set");
                return Ok(ExecOutcome::status(1));
            }
        },
        Some(dir) => {
            // CDPATH search for relative, non-dot-anchored operands.
            let mut chosen = (dir.to_string(), false);
            if !dir.starts_with('/') && !dir.starts_with("./") && !dir.starts_with("../")
                && dir != "." && dir != ".."
            {
                if let Some(cdpath) = interp.env.get_scalar("CDPATH") {
                    for entry in cdpath.split(':') {
                        if entry.is_empty() {
                            continue;
                        }
                        let candidate = format!("{}/{}", entry, dir);
                        if Path::new(&candidate).is_dir() {
                            chosen = (candidate, true);
                            break;
                        }
                    }
                }
            }
            chosen
        }
    };

    let logical = if target.starts_with('/') {
        normalize(Path::new(&target))
    } else {
        normalize(&Path::new(&current).join(&target))
    };
    let destination = if physical {
        match std::fs::canonicalize(&logical) {
            Ok(p) => p,
            Err(e) => {
                interp.diagnostic(&format!("cd: {}: {}", target, e));
                return Ok(ExecOutcome::status(1));
            }
        }
    } else {
        logical
    };

    if let Err(e) = nix::unistd::chdir(&destination) {
        interp.diagnostic(&format!("cd: {}: {}", target, e.desc()));
        return Ok(ExecOutcome::status(1));
    }

    let new_pwd = destination.to_string_lossy().into_owned();
    let _ = interp.env.set_scalar("OLDPWD", current);
    let _ = interp.env.set_scalar("PWD", new_pwd.clone());
    let _ = interp.env.modify_attrs("PWD", |a| a.exported = true);
    let _ = interp.env.modify_attrs("OLDPWD", |a| a.exported = true);
    if echo {
        println!("{}", new_pwd);
    }
    Ok(ExecOutcome::success())
}

pub fn handle_pwd(interp: &mut Interpreter, args: &[String]) -> Result<ExecOutcome, ExecError> {
    let physical = args.iter().any(|a| a == "-P");
    let pwd = if physical {
        std::env::current_dir()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default()
    } else {
        interp.env.get_scalar("PWD").unwrap_or_else(|| {
            std::env::current_dir()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
    };
    println!("{}", pwd);
    Ok(ExecOutcome::success())
}

/// Collapse `.` and `..` textually (logical cd).
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            c => out.push(c),
        }
    }
    if out.as_os_str().is_empty() {
        out.push("/");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/a/b/../c/./d")), PathBuf::from("/a/c/d"));
        assert_eq!(normalize(Path::new("/..")), PathBuf::from("/"));
        assert_eq!(normalize(Path::new("/a/..")), PathBuf::from("/"));
    }
}
