//! Shell options (`set -e`, `set -o pipefail`, ...).

/// The closed option set the executor honors.
#[derive(Debug, Clone, Default)]
pub struct ShellOptions {
    /// set -e: exit on untested non-zero status
    pub errexit: bool,
    /// set -u: unset-variable expansion is an error
    pub nounset: bool,
    /// set -x: trace expanded commands to stderr
    pub xtrace: bool,
    /// set -v: echo input lines as read
    pub verbose: bool,
    /// set -n: parse only
    pub noexec: bool,
    /// set -f: no pathname expansion
    pub noglob: bool,
    /// set -C: `>` refuses to clobber existing files
    pub noclobber: bool,
    /// set -o pipefail: pipeline status is the rightmost failure
    pub pipefail: bool,
    /// set -m: job control
    pub monitor: bool,
    /// set -a: export on every assignment
    pub allexport: bool,
    /// set -o ignoreeof: interactive EOF does not exit
    pub ignoreeof: bool,
    /// set -o posix
    pub posix: bool,
    /// set -o emacs / vi (mutually exclusive; front-end concern)
    pub emacs: bool,
    pub vi: bool,
    /// this shell reads commands from a terminal
    pub interactive: bool,
    /// alias expansion during lexing
    pub expand_aliases: bool,
    /// shopt nocasematch: case-insensitive `[[ == ]]` and `case`
    pub nocasematch: bool,
    /// shopt dotglob: `*` matches leading dots
    pub dotglob: bool,
    /// shopt nullglob: non-matching patterns expand to nothing
    pub nullglob: bool,
}

/// `(letter, set -o name)` pairs for the short-flag options.
pub const FLAG_OPTIONS: &[(char, &str)] = &[
    ('e', "errexit"),
    ('u', "nounset"),
    ('x', "xtrace"),
    ('v', "verbose"),
    ('n', "noexec"),
    ('f', "noglob"),
    ('C', "noclobber"),
    ('m', "monitor"),
    ('a', "allexport"),
];

impl ShellOptions {
    pub fn set_by_name(&mut self, name: &str, on: bool) -> Result<(), String> {
        match name {
            "errexit" => self.errexit = on,
            "nounset" => self.nounset = on,
            "xtrace" => self.xtrace = on,
            "verbose" => self.verbose = on,
            "noexec" => self.noexec = on,
            "noglob" => self.noglob = on,
            "noclobber" => self.noclobber = on,
            "pipefail" => self.pipefail = on,
            "monitor" => self.monitor = on,
            "allexport" => self.allexport = on,
            "ignoreeof" => self.ignoreeof = on,
            "posix" => self.posix = on,
            "emacs" => {
                self.emacs = on;
                if on {
                    self.vi = false;
                }
            }
            "vi" => {
                self.vi = on;
                if on {
                    self.emacs = false;
                }
            }
            "interactive" => self.interactive = on,
            "expand_aliases" => self.expand_aliases = on,
            "nocasematch" => self.nocasematch = on,
            "dotglob" => self.dotglob = on,
            "nullglob" => self.nullglob = on,
            _ => return Err(format!("{}: invalid option name", name)),
        }
        Ok(())
    }

    pub fn query(&self, name: &str) -> Option<bool> {
        Some(match name {
            "errexit" => self.errexit,
            "nounset" => self.nounset,
            "xtrace" => self.xtrace,
            "verbose" => self.verbose,
            "noexec" => self.noexec,
            "noglob" => self.noglob,
            "noclobber" => self.noclobber,
            "pipefail" => self.pipefail,
            "monitor" => self.monitor,
            "allexport" => self.allexport,
            "ignoreeof" => self.ignoreeof,
            "posix" => self.posix,
            "emacs" => self.emacs,
            "vi" => self.vi,
            "interactive" => self.interactive,
            "expand_aliases" => self.expand_aliases,
            "nocasematch" => self.nocasematch,
            "dotglob" => self.dotglob,
            "nullglob" => self.nullglob,
            _ => return None,
        })
    }

    pub fn set_by_flag(&mut self, flag: char, on: bool) -> Result<(), String> {
        for (c, name) in FLAG_OPTIONS {
            if *c == flag {
                return self.set_by_name(name, on);
            }
        }
        Err(format!("-{}: invalid option", flag))
    }

    /// The `$-` string: one letter per active short-flag option.
    pub fn flag_string(&self) -> String {
        let mut s = String::new();
        for (c, name) in FLAG_OPTIONS {
            if self.query(name).unwrap_or(false) {
                s.push(*c);
            }
        }
        if self.interactive {
            s.push('i');
        }
        s
    }

    /// `set -o` listing: (name, enabled) pairs in a stable order.
    pub fn listing(&self) -> Vec<(&'static str, bool)> {
        [
            "allexport",
            "emacs",
            "errexit",
            "ignoreeof",
            "monitor",
            "noclobber",
            "noexec",
            "noglob",
            "nounset",
            "pipefail",
            "posix",
            "verbose",
            "vi",
            "xtrace",
        ]
        .iter()
        .map(|n| (*n, self.query(n).unwrap_or(false)))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_by_name_and_flag() {
        let mut o = ShellOptions::default();
        o.set_by_name("pipefail", true).unwrap();
        assert!(o.pipefail);
        o.set_by_flag('e', true).unwrap();
        assert!(o.errexit);
        o.set_by_flag('e', false).unwrap();
        assert!(!o.errexit);
        assert!(o.set_by_name("bogus", true).is_err());
    }

    #[test]
    fn test_emacs_vi_exclusive() {
        let mut o = ShellOptions::default();
        o.set_by_name("vi", true).unwrap();
        o.set_by_name("emacs", true).unwrap();
        assert!(o.emacs && !o.vi);
    }

    #[test]
    fn test_flag_string() {
        let mut o = ShellOptions::default();
        o.set_by_flag('e', true).unwrap();
        o.set_by_flag('x', true).unwrap();
        assert_eq!(o.flag_string(), "ex");
    }
}
