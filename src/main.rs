use clap::Parser;
use marsh::shell::{InputSource, Shell, ShellConfig};

#[derive(Parser)]
#[command(name = "marsh")]
#[command(about = "A POSIX-compatible shell with selected bash extensions")]
#[command(version)]
struct Cli {
    /// Execute commands from this string
    #[arg(short = 'c', value_name = "STRING")]
    command: Option<String>,

    /// Read commands from standard input
    #[arg(short = 's')]
    stdin: bool,

    /// Force interactive mode
    #[arg(short = 'i')]
    interactive: bool,

    /// Act as a login shell
    #[arg(short = 'l', long = "login")]
    login: bool,

    /// Exit immediately on a command failure (set -e)
    #[arg(short = 'e')]
    errexit: bool,

    /// Treat unset variables as errors (set -u)
    #[arg(short = 'u')]
    nounset: bool,

    /// Trace commands before execution (set -x)
    #[arg(short = 'x')]
    xtrace: bool,

    /// Parse but do not execute (set -n)
    #[arg(short = 'n')]
    noexec: bool,

    /// Echo input lines as they are read (set -v)
    #[arg(short = 'v')]
    verbose: bool,

    /// Disable pathname expansion (set -f)
    #[arg(short = 'f')]
    noglob: bool,

    /// Enable a named option (set -o NAME)
    #[arg(short = 'o', value_name = "NAME")]
    options: Vec<String>,

    /// Script path (or NAME with -c) followed by positional arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn main() {
    let cli = Cli::parse();

    let mut options = cli.options.clone();
    for (enabled, name) in [
        (cli.errexit, "errexit"),
        (cli.nounset, "nounset"),
        (cli.xtrace, "xtrace"),
        (cli.noexec, "noexec"),
        (cli.verbose, "verbose"),
        (cli.noglob, "noglob"),
    ] {
        if enabled {
            options.push(name.to_string());
        }
    }

    let (source, arg0, positionals) = if let Some(command) = cli.command {
        // marsh -c STRING [NAME [ARGS...]]
        let arg0 = cli.args.first().cloned().unwrap_or_else(|| "marsh".to_string());
        let positionals = cli.args.iter().skip(1).cloned().collect();
        (InputSource::Command(command), arg0, positionals)
    } else if let Some(script) = cli.args.first().filter(|_| !cli.stdin) {
        // marsh SCRIPT [ARGS...]
        let positionals = cli.args.iter().skip(1).cloned().collect();
        (InputSource::File(script.into()), script.clone(), positionals)
    } else {
        // marsh [-s] [ARGS...]
        let positionals = if cli.stdin {
            cli.args.clone()
        } else {
            Vec::new()
        };
        (InputSource::Stdin, "marsh".to_string(), positionals)
    };

    let force_interactive = cli.interactive;
    let mut shell = Shell::new(ShellConfig {
        arg0,
        positionals,
        interactive: if force_interactive {
            Some(true)
        } else if matches!(source, InputSource::Stdin) {
            None
        } else {
            Some(false)
        },
        login: cli.login,
        options,
        ..Default::default()
    });

    let status = shell.run(source);
    std::process::exit(status & 0xff);
}
