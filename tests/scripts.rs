//! End-to-end script tests: run the shell binary with `-c` and check
//! observable output and exit status.

use assert_cmd::Command;
use predicates::prelude::*;

fn marsh() -> Command {
    Command::cargo_bin("marsh").unwrap()
}

fn run(script: &str) -> assert_cmd::assert::Assert {
    marsh().arg("-c").arg(script).assert()
}

#[test]
fn brace_expansion_product() {
    run("printf '%s\\n' {a,b}{1,2}")
        .success()
        .stdout("a1\na2\nb1\nb2\n");
}

#[test]
fn arithmetic_assignment_persists() {
    run("x=5; echo $((x*=3))$'\\n'$x").success().stdout("15\n15\n");
}

#[test]
fn pipefail_and_pipestatus() {
    run("set -o pipefail; false | true | true; echo $? ${PIPESTATUS[@]}")
        .success()
        .stdout("1 1 0 0\n");
}

#[test]
fn pipestatus_length_matches_stages() {
    run("true | false | true; echo ${#PIPESTATUS[@]} ${PIPESTATUS[1]}")
        .success()
        .stdout("3 1\n");
}

#[test]
fn temp_assignment_restores() {
    run("VAR=original; VAR=temp echo \"$VAR\"; echo \"$VAR\"")
        .success()
        .stdout("original\noriginal\n");
}

#[test]
fn temp_assignment_visible_to_child() {
    run("VAR=original; VAR=temp sh -c 'echo $VAR'; echo \"$VAR\"")
        .success()
        .stdout("temp\noriginal\n");
}

#[test]
fn subshell_isolation() {
    run("a=1; (a=2); echo $a").success().stdout("1\n");
}

#[test]
fn exit_trap_runs_with_status() {
    run("trap 'echo BYE' EXIT; echo hi; exit 3")
        .code(3)
        .stdout("hi\nBYE\n");
}

#[test]
fn case_glob_match() {
    run("case hello in h*o) echo m;; *) echo x;; esac")
        .success()
        .stdout("m\n");
}

#[test]
fn case_fallthrough_terminators() {
    run("case a in a) echo one;& b) echo two;; c) echo three;; esac")
        .success()
        .stdout("one\ntwo\n");
    run("case a in a*) echo one;;& *) echo two;; esac")
        .success()
        .stdout("one\ntwo\n");
}

#[test]
fn heredoc_quoted_delimiter_is_inert() {
    run("cat <<'EOF'\n$HOME\nEOF").success().stdout("$HOME\n");
}

#[test]
fn heredoc_unquoted_delimiter_expands() {
    marsh()
        .arg("-c")
        .arg("cat <<EOF\n$HOME\nEOF")
        .env("HOME", "/test-home")
        .assert()
        .success()
        .stdout("/test-home\n");
}

#[test]
fn heredoc_dash_strips_tabs_only() {
    run("cat <<-EOF\n\t\tindented\n\t    spaces\n\tEOF")
        .success()
        .stdout("indented\n    spaces\n");
}

#[test]
fn quoted_at_zero_params_expands_to_nothing() {
    run("set --; n=0; for x in \"$@\"; do n=$((n+1)); done; echo $n")
        .success()
        .stdout("0\n");
}

#[test]
fn star_joins_with_first_ifs_char() {
    run("set -- a b c; IFS=:; echo \"$*\"").success().stdout("a:b:c\n");
}

#[test]
fn empty_ifs_disables_splitting() {
    run("x='a b c'; IFS=; set -- $x; echo $#").success().stdout("1\n");
}

#[test]
fn substring_boundaries() {
    run("x=hello; echo \"${x:0:0}|${x: -2}|${x:1:2}\"")
        .success()
        .stdout("|lo|el\n");
}

#[test]
fn pattern_removal_ops() {
    run("p=a/b/c.txt; echo ${p##*/} ${p%.*}")
        .success()
        .stdout("c.txt a/b/c\n");
}

#[test]
fn replace_and_case_ops() {
    run("x=banana; echo ${x/a/A} ${x//a/A} ${x^} ${x^^}")
        .success()
        .stdout("bAnana bAnAnA Banana BANANA\n");
}

#[test]
fn arithmetic_wraps_at_64_bits() {
    run("echo $((2**62 + 2**62))").success().stdout("-9223372036854775808\n");
}

#[test]
fn arithmetic_bases() {
    run("echo $((0x1f)) $((010)) $((2#1010)) $((16#ff))")
        .success()
        .stdout("31 8 10 255\n");
}

#[test]
fn division_by_zero_is_an_error() {
    run("echo $((1/0))").failure().stderr(predicate::str::contains("division by 0"));
}

#[test]
fn command_substitution_strips_trailing_newlines() {
    run("x=$(printf 'a\\n\\n\\n'); echo \"<$x>\"").success().stdout("<a>\n");
}

#[test]
fn command_substitution_status_on_assignment() {
    run("x=$(false); echo $?").success().stdout("1\n");
}

#[test]
fn exit_codes_not_found_and_not_executable() {
    run("definitely-not-a-command-zz").code(127);
    run("touch /tmp/marsh-ne-test; /tmp/marsh-ne-test").code(126);
}

#[test]
fn errexit_skips_tested_contexts() {
    run("set -e; if false; then :; fi; false || true; echo ok")
        .success()
        .stdout("ok\n");
    run("set -e; false; echo unreachable").code(1).stdout("");
}

#[test]
fn errexit_err_then_exit_trap_order() {
    run("set -e; trap 'echo ERR' ERR; trap 'echo EXIT' EXIT; false")
        .code(1)
        .stdout("ERR\nEXIT\n");
}

#[test]
fn nounset_aborts() {
    run("set -u; echo $undefined_variable_xyz; echo after")
        .code(1)
        .stderr(predicate::str::contains("unbound variable"));
}

#[test]
fn functions_locals_and_return() {
    run("x=outer; f() { local x=inner; echo $x; return 7; }; f; echo $? $x")
        .success()
        .stdout("inner\n7 outer\n");
}

#[test]
fn function_args_and_funcname() {
    run("f() { echo $# $1 $2; }; f a b").success().stdout("2 a b\n");
}

#[test]
fn break_and_continue_levels() {
    run("for i in 1 2 3; do for j in a b; do break 2; done; done; echo $i$j")
        .success()
        .stdout("1a\n");
    run("out=; for i in 1 2 3; do [ $i = 2 ] && continue; out=$out$i; done; echo $out")
        .success()
        .stdout("13\n");
}

#[test]
fn c_style_for() {
    run("s=; for ((i=0; i<4; i++)); do s=$s$i; done; echo $s")
        .success()
        .stdout("0123\n");
}

#[test]
fn while_read_mutates_parent() {
    run("printf 'a\\nb\\n' | while read x; do last=$x; done; echo $last")
        .success()
        .stdout("b\n");
}

#[test]
fn until_loop() {
    run("n=0; until [ $n -ge 3 ]; do n=$((n+1)); done; echo $n")
        .success()
        .stdout("3\n");
}

#[test]
fn redirections_and_append() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("out.txt");
    let script = format!(
        "echo one > {f}; echo two >> {f}; cat {f}",
        f = file.display()
    );
    run(&script).success().stdout("one\ntwo\n");
}

#[test]
fn stderr_redirection_and_dup() {
    run("{ echo out; echo err >&2; } 2>&1 | sort")
        .success()
        .stdout("err\nout\n");
}

#[test]
fn noclobber_respected_and_overridden() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("x");
    std::fs::write(&file, "orig\n").unwrap();
    let script = format!("set -C; echo new > {f}", f = file.display());
    run(&script).code(1);
    let script = format!("set -C; echo new >| {f}; cat {f}", f = file.display());
    run(&script).success().stdout("new\n");
}

#[test]
fn glob_expansion_sorts_and_survives_no_match() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["b.rs", "a.rs"] {
        std::fs::File::create(dir.path().join(name)).unwrap();
    }
    marsh()
        .arg("-c")
        .arg("echo *.rs; echo *.zip")
        .current_dir(dir.path())
        .assert()
        .success()
        .stdout("a.rs b.rs\n*.zip\n");
}

#[test]
fn tilde_expansion() {
    marsh()
        .arg("-c")
        .arg("echo ~/x \"~/y\"")
        .env("HOME", "/h")
        .assert()
        .success()
        .stdout("/h/x ~/y\n");
}

#[test]
fn cond_command_and_regex() {
    run("[[ hello == h*o ]] && echo glob").success().stdout("glob\n");
    run("[[ abc123 =~ ([a-z]+)([0-9]+) ]] && echo ${BASH_REMATCH[1]} ${BASH_REMATCH[2]}")
        .success()
        .stdout("abc 123\n");
    run("[[ -z '' && ( -n x || -n '' ) ]] && echo logic").success().stdout("logic\n");
}

#[test]
fn test_builtin_basics() {
    run("[ 3 -gt 2 ] && echo num").success().stdout("num\n");
    run("test -d / && echo dir").success().stdout("dir\n");
    run("[ a = b ]; echo $?").success().stdout("1\n");
}

#[test]
fn arrays_indexed_and_assoc() {
    run("a=(x y z); echo ${a[1]} ${#a[@]} ${a[@]}")
        .success()
        .stdout("y 3 x y z\n");
    run("a=(x y z); a[5]=w; echo ${!a[@]}").success().stdout("0 1 2 5\n");
    run("declare -A m; m[k1]=v1; m[k2]=v2; echo ${m[k1]} ${#m[@]}")
        .success()
        .stdout("v1 2\n");
}

#[test]
fn declare_p_roundtrip() {
    run("x=hello; eval \"$(declare -p x | sed 's/x=/y=/')\"; echo $y")
        .success()
        .stdout("hello\n");
    run("a=(1 2); eval \"$(declare -p a | sed 's/ a=/ b=/')\"; echo ${b[1]}")
        .success()
        .stdout("2\n");
}

#[test]
fn positional_parameters_and_shift() {
    marsh()
        .args(["-c", "echo $0 $# $1; shift; echo $1", "name", "a", "b"])
        .assert()
        .success()
        .stdout("name 2 a\nb\n");
}

#[test]
fn getopts_parses_options() {
    run("set -- -ab -c val rest; while getopts abc: opt; do echo $opt $OPTARG; done; shift $((OPTIND-1)); echo rest=$1")
        .success()
        .stdout("a\nb\nc val\nrest=rest\n");
}

#[test]
fn printf_formats() {
    run("printf '%05d|%-4s|%x\\n' 42 ab 255").success().stdout("00042|ab  |ff\n");
    run("printf '%s,' a b c; echo").success().stdout("a,b,c,\n");
}

#[test]
fn echo_escape_flags() {
    run("echo -n no-newline").success().stdout("no-newline");
    run("echo -e 'a\\tb'").success().stdout("a\tb\n");
    run("echo -E 'a\\tb'").success().stdout("a\\tb\n");
}

#[test]
fn single_quote_roundtrip() {
    run("echo -E 'a b  c $x `q` \\n'").success().stdout("a b  c $x `q` \\n\n");
}

#[test]
fn eval_in_current_scope() {
    run("eval 'x=42'; echo $x").success().stdout("42\n");
}

#[test]
fn source_runs_in_current_scope() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("lib.sh");
    std::fs::write(&file, "sourced_var=yes\nreturn 5\necho unreachable\n").unwrap();
    let script = format!("source {}; echo $? $sourced_var", file.display());
    run(&script).success().stdout("5 yes\n");
}

#[test]
fn background_job_and_wait() {
    run("sleep 0.1 & wait $!; echo $?").success().stdout("0\n");
}

#[test]
fn dollar_bang_is_background_pid() {
    run("sleep 0.1 & test -n \"$!\" && echo have-pid; wait")
        .success()
        .stdout("have-pid\n");
}

#[test]
fn command_substitution_nested_quotes() {
    run("echo \"$(echo \"a b\")\"").success().stdout("a b\n");
}

#[test]
fn backquote_substitution() {
    run("echo `echo hi`").success().stdout("hi\n");
}

#[test]
fn process_substitution() {
    run("cat <(echo from-procsub)").success().stdout("from-procsub\n");
}

#[test]
fn herestring() {
    run("cat <<< 'here string'").success().stdout("here string\n");
}

#[test]
fn alias_expansion_when_enabled() {
    run("shopt -s expand_aliases; alias greet='echo hello'; eval greet")
        .success()
        .stdout("hello\n");
}

#[test]
fn type_and_command_v() {
    run("type cd").success().stdout(predicate::str::contains("shell builtin"));
    run("f() { :; }; type f").success().stdout(predicate::str::contains("function"));
    run("command -v sh").success().stdout(predicate::str::contains("sh"));
}

#[test]
fn exec_replaces_shell() {
    run("exec echo replaced; echo never").success().stdout("replaced\n");
}

#[test]
fn exec_redirections_persist() {
    run("exec >&2; echo to-stderr")
        .success()
        .stdout("")
        .stderr(predicate::str::contains("to-stderr"));
}

#[test]
fn ansi_c_quoting() {
    run("printf '%s' $'a\\tb\\n'").success().stdout("a\tb\n");
}

#[test]
fn ifs_splitting_of_expansions_only() {
    run("x='a:b'; IFS=:; printf '%s\\n' $x 'c:d'")
        .success()
        .stdout("a\nb\nc:d\n");
}

#[test]
fn negated_pipeline_status() {
    run("! false; echo $?").success().stdout("0\n");
    run("! true; echo $?").success().stdout("1\n");
}

#[test]
fn readonly_assignment_fails() {
    run("readonly r=1; r=2; echo after")
        .stdout(predicate::str::contains("after"))
        .stderr(predicate::str::contains("readonly"));
}

#[test]
fn syntax_error_status_is_two() {
    run("fi").code(2).stderr(predicate::str::contains("syntax error"));
}

#[test]
fn group_vs_subshell_redirection() {
    run("{ echo a; echo b; } | wc -l | tr -d ' '").success().stdout("2\n");
}

#[test]
fn read_splits_on_ifs() {
    run("printf 'one two three\\n' | { read a b; echo \"$a|$b\"; }")
        .success()
        .stdout("one|two three\n");
}

#[test]
fn indirect_expansion() {
    run("target=hello; ref=target; echo ${!ref}").success().stdout("hello\n");
}

#[test]
fn name_prefix_listing() {
    run("ab1=x; ab2=y; echo ${!ab*}").success().stdout("ab1 ab2\n");
}

#[test]
fn default_and_alternative_params() {
    run("unset u; echo ${u:-dflt} ${u:+alt}; v=set; echo ${v:-dflt} ${v:+alt}")
        .success()
        .stdout("dflt\nset alt\n");
}

#[test]
fn assign_default_param() {
    run("unset u; : ${u:=assigned}; echo $u").success().stdout("assigned\n");
}

#[test]
fn param_error_aborts() {
    run("unset u; echo ${u:?custom message}")
        .code(1)
        .stderr(predicate::str::contains("custom message"));
}

#[test]
fn length_expansions() {
    run("x=hello; a=(1 2 3); echo ${#x} ${#a[@]}").success().stdout("5 3\n");
}

#[test]
fn let_builtin_status() {
    run("let 'x = 2 + 3'; echo $x $?").success().stdout("5 0\n");
    run("let 0; echo $?").success().stdout("1\n");
}

#[test]
fn shlvl_increments() {
    marsh()
        .args(["-c", "echo $SHLVL"])
        .env("SHLVL", "3")
        .assert()
        .success()
        .stdout("4\n");
}
