//! Shell front object.
//!
//! Owns the interpreter, bootstraps the environment from the process,
//! and feeds it one logical command unit at a time from an input source
//! (a `-c` string, a script file, or stdin). Front-end niceties stop at
//! writing PS1/PS2 verbatim; line editing and history live elsewhere.

use std::collections::HashMap;
use std::io::IsTerminal;
use std::path::PathBuf;

use crate::interpreter::control_flow::ControlFlow;
use crate::interpreter::signals;
use crate::interpreter::traps::TrapKey;
use crate::interpreter::Interpreter;
use crate::parser::parse_script;
use crate::parser::types::is_valid_name;

/// Startup configuration: CLI flags plus the hooks a front-end uses to
/// pre-populate state.
#[derive(Default)]
pub struct ShellConfig {
    pub arg0: String,
    pub positionals: Vec<String>,
    pub interactive: Option<bool>,
    pub login: bool,
    /// `-o name` and short-flag options to enable at startup.
    pub options: Vec<String>,
    /// Pre-seeded variables (override inherited environment).
    pub variables: HashMap<String, String>,
    /// Pre-seeded aliases.
    pub aliases: HashMap<String, String>,
}

pub enum InputSource {
    Command(String),
    File(PathBuf),
    Stdin,
}

pub struct Shell {
    pub interp: Interpreter,
    login: bool,
    exit_trap_ran: bool,
}

impl Shell {
    pub fn new(config: ShellConfig) -> Self {
        let mut interp = Interpreter::new();

        // Inherit the process environment as exported variables.
        for (key, value) in std::env::vars() {
            if !is_valid_name(&key) {
                continue;
            }
            let _ = interp.env.set_scalar(&key, value);
            let _ = interp.env.modify_attrs(&key, |a| a.exported = true);
        }

        let defaults: &[(&str, &str)] = &[
            ("IFS", " \t\n"),
            ("PS1", "marsh$ "),
            ("PS2", "> "),
            ("PS4", "+ "),
            ("OPTIND", "1"),
        ];
        for (key, value) in defaults {
            if interp.env.get_scalar(key).is_none() {
                let _ = interp.env.set_scalar(key, *value);
            }
        }
        if interp.env.get_scalar("PATH").is_none() {
            let _ = interp.env.set_scalar("PATH", "/usr/local/bin:/usr/bin:/bin");
            let _ = interp.env.modify_attrs("PATH", |a| a.exported = true);
        }
        if let Ok(pwd) = std::env::current_dir() {
            let _ = interp.env.set_scalar("PWD", pwd.to_string_lossy().into_owned());
            let _ = interp.env.modify_attrs("PWD", |a| a.exported = true);
        }
        if let Ok(hostname) = nix::unistd::gethostname() {
            let _ = interp
                .env
                .set_scalar("HOSTNAME", hostname.to_string_lossy().into_owned());
        }

        // SHLVL counts nested shells.
        let shlvl: i64 = interp
            .env
            .get_scalar("SHLVL")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        let _ = interp.env.set_scalar("SHLVL", (shlvl + 1).to_string());
        let _ = interp.env.modify_attrs("SHLVL", |a| a.exported = true);

        for (key, value) in &config.variables {
            let _ = interp.env.set_scalar(key, value.clone());
        }
        for (name, replacement) in &config.aliases {
            interp.env.aliases.define(name, replacement);
        }

        interp.env.arg0 = if config.arg0.is_empty() {
            "marsh".to_string()
        } else {
            config.arg0.clone()
        };
        interp.env.set_positionals(config.positionals.clone());

        let interactive = config
            .interactive
            .unwrap_or_else(|| std::io::stdin().is_terminal());
        interp.interactive = interactive;
        interp.env.options.interactive = interactive;
        if interactive {
            interp.env.options.monitor = true;
            interp.env.options.expand_aliases = true;
        }
        for option in &config.options {
            if option.len() == 1 {
                let flag = option.chars().next().unwrap_or(' ');
                if let Err(e) = interp.env.options.set_by_flag(flag, true) {
                    eprintln!("marsh: {}", e);
                }
            } else if let Err(e) = interp.env.options.set_by_name(option, true) {
                eprintln!("marsh: {}", e);
            }
        }

        signals::install_shell_handlers(interactive);

        Self { interp, login: config.login, exit_trap_ran: false }
    }

    /// Run to completion, returning the shell's exit status.
    pub fn run(&mut self, source: InputSource) -> i32 {
        let status = match source {
            InputSource::Command(text) => self.run_unit_to_end(&text),
            InputSource::File(path) => match std::fs::read_to_string(&path) {
                Ok(text) => self.run_unit_to_end(&text),
                Err(e) => {
                    eprintln!("marsh: {}: {}", path.display(), e);
                    127
                }
            },
            InputSource::Stdin => {
                if self.interp.interactive {
                    if self.login {
                        self.source_profile_files();
                    }
                    self.source_env_file();
                    self.run_interactive()
                } else {
                    self.run_stdin_units()
                }
            }
        };
        self.finalize(status)
    }

    /// Execute one complete source text (a `-c` string or script file).
    fn run_unit_to_end(&mut self, text: &str) -> i32 {
        match self.execute_unit(text) {
            UnitResult::Status(s) | UnitResult::Exit(s) => s,
            UnitResult::NeedsMore => {
                eprintln!("marsh: syntax error: unexpected end of file");
                2
            }
        }
    }

    /// Interactive loop: prompt, gather one logical unit (PS2 for
    /// continuations), execute, report job state changes.
    fn run_interactive(&mut self) -> i32 {
        let mut status = 0;
        loop {
            self.interp.safe_point();
            for line in self.interp.jobs.take_notifications() {
                eprintln!("{}", line);
            }

            let ps1 = self.interp.env.get_scalar("PS1").unwrap_or_default();
            eprint!("{}", ps1);
            let mut unit = match read_raw_line() {
                Some(line) => line,
                None => {
                    if self.interp.env.options.ignoreeof {
                        eprintln!("marsh: use `exit' to leave the shell");
                        continue;
                    }
                    break;
                }
            };
            if signals::take_interrupt() {
                status = 130;
                continue;
            }

            loop {
                match self.execute_unit(&unit) {
                    UnitResult::Status(s) => {
                        status = s;
                        break;
                    }
                    UnitResult::Exit(s) => return s,
                    UnitResult::NeedsMore => {
                        let ps2 = self.interp.env.get_scalar("PS2").unwrap_or_default();
                        eprint!("{}", ps2);
                        match read_raw_line() {
                            Some(more) => {
                                unit.push('\n');
                                unit.push_str(&more);
                            }
                            None => {
                                eprintln!("marsh: syntax error: unexpected end of file");
                                status = 2;
                                break;
                            }
                        }
                    }
                }
            }
        }
        status
    }

    /// Non-interactive stdin: accumulate units line by line so builtins
    /// reading stdin still see the rest of the stream.
    fn run_stdin_units(&mut self) -> i32 {
        let mut status = 0;
        loop {
            let mut unit = match read_raw_line() {
                Some(line) => line,
                None => break,
            };
            if unit.trim().is_empty() {
                continue;
            }
            loop {
                match self.execute_unit(&unit) {
                    UnitResult::Status(s) => {
                        status = s;
                        break;
                    }
                    UnitResult::Exit(s) => return s,
                    UnitResult::NeedsMore => match read_raw_line() {
                        Some(more) => {
                            unit.push('\n');
                            unit.push_str(&more);
                        }
                        None => {
                            eprintln!("marsh: syntax error: unexpected end of file");
                            return 2;
                        }
                    },
                }
            }
        }
        status
    }

    fn execute_unit(&mut self, source: &str) -> UnitResult {
        let aliases = if self.interp.env.options.expand_aliases {
            Some(self.interp.env.aliases.clone())
        } else {
            None
        };
        let script = match parse_script(source, aliases.as_ref()) {
            Ok(s) => s,
            Err(e) if e.needs_more_input => return UnitResult::NeedsMore,
            Err(e) => {
                eprintln!("marsh: {}", e);
                self.interp.env.last_status = 2;
                return UnitResult::Status(2);
            }
        };
        if self.interp.env.options.verbose {
            eprintln!("{}", source);
        }
        if self.interp.env.options.noexec {
            return UnitResult::Status(0);
        }
        match self.interp.run_script(&script) {
            Ok(out) => match out.flow {
                ControlFlow::Exit => UnitResult::Exit(out.status),
                // break/continue/return that escaped to the top level are
                // absorbed here.
                _ => UnitResult::Status(out.status),
            },
            Err(e) => {
                let out = self.interp.report(e);
                if out.flow == ControlFlow::Exit {
                    UnitResult::Exit(out.status)
                } else {
                    UnitResult::Status(out.status)
                }
            }
        }
    }

    /// Login shells read the profile files first.
    fn source_profile_files(&mut self) {
        let mut files = vec!["/etc/profile".to_string()];
        if let Some(home) = self.interp.env.get_scalar("HOME") {
            files.push(format!("{}/.profile", home));
        }
        for file in files {
            if let Ok(text) = std::fs::read_to_string(&file) {
                let _ = self.interp.run_string(&text);
            }
        }
    }

    /// `$ENV` is sourced at interactive startup.
    fn source_env_file(&mut self) {
        if let Some(env_file) = self.interp.env.get_scalar("ENV") {
            if !env_file.is_empty() {
                if let Ok(text) = std::fs::read_to_string(&env_file) {
                    let _ = self.interp.run_string(&text);
                }
            }
        }
    }

    /// Run the EXIT trap (once) and settle the final status.
    pub fn finalize(&mut self, status: i32) -> i32 {
        if !self.exit_trap_ran {
            self.exit_trap_ran = true;
            self.interp.env.last_status = status;
            self.interp.run_trap(TrapKey::Exit);
        }
        status
    }
}

enum UnitResult {
    Status(i32),
    Exit(i32),
    NeedsMore,
}

/// Read one line from fd 0 byte-at-a-time, so builtins that read stdin
/// afterwards see the remaining bytes. None on EOF with nothing read.
fn read_raw_line() -> Option<String> {
    let mut bytes: Vec<u8> = Vec::new();
    loop {
        let mut byte = [0u8; 1];
        match nix::unistd::read(0, &mut byte) {
            Ok(0) => {
                if bytes.is_empty() {
                    return None;
                }
                break;
            }
            Ok(_) => {
                if byte[0] == b'\n' {
                    break;
                }
                bytes.push(byte[0]);
            }
            Err(nix::errno::Errno::EINTR) => continue,
            Err(_) => {
                if bytes.is_empty() {
                    return None;
                }
                break;
            }
        }
    }
    Some(String::from_utf8_lossy(&bytes).into_owned())
}
