//! umask - query or set the file-creation mask (numeric form).

use nix::sys::stat::{umask, Mode};

use crate::interpreter::control_flow::ExecOutcome;
use crate::interpreter::errors::ExecError;
use crate::interpreter::interpreter::Interpreter;

pub fn handle_umask(interp: &mut Interpreter, args: &[String]) -> Result<ExecOutcome, ExecError> {
    match args.iter().find(|a| !a.starts_with('-')) {
        None => {
            // Read without changing: set then restore.
            let current = umask(Mode::empty());
            umask(current);
            println!("{:04o}", current.bits());
            Ok(ExecOutcome::success())
        }
        Some(arg) => match u32::from_str_radix(arg, 8) {
            Ok(bits) if bits <= 0o777 => {
                umask(Mode::from_bits_truncate(bits as nix::libc::mode_t));
                Ok(ExecOutcome::success())
            }
            _ => {
                interp.diagnostic(&format!("umask: {}: octal number out of range", arg));
                Ok(ExecOutcome::status(1))
            }
        },
    }
}
