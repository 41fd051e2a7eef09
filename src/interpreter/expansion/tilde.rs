//! Tilde expansion.

use crate::interpreter::interpreter::Interpreter;

/// `~` → HOME, `~user` → that user's home directory, `~+` → PWD,
/// `~-` → OLDPWD. None means the prefix stays literal.
pub fn expand_tilde(interp: &mut Interpreter, user: Option<&str>) -> Option<String> {
    match user {
        None => interp
            .env
            .get_scalar("HOME")
            .or_else(|| home_of_uid()),
        Some("+") => interp.env.get_scalar("PWD"),
        Some("-") => interp.env.get_scalar("OLDPWD"),
        Some(name) => nix::unistd::User::from_name(name)
            .ok()
            .flatten()
            .map(|u| u.dir.to_string_lossy().into_owned()),
    }
}

fn home_of_uid() -> Option<String> {
    nix::unistd::User::from_uid(nix::unistd::getuid())
        .ok()
        .flatten()
        .map(|u| u.dir.to_string_lossy().into_owned())
}
