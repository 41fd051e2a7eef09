//! The tree walker.
//!
//! run_script → run_list → run_and_or → run_pipeline → run_command,
//! with errexit/ERR applied at pipeline boundaries, DEBUG before simple
//! commands, and pending traps dispatched between list items.

use crate::ast::types::*;
use crate::environment::scope::FrameKind;
use crate::environment::value::Value;
use crate::environment::SetScope;
use crate::interpreter::command_resolution::Resolution;
use crate::interpreter::control_flow::{ControlFlow, ExecOutcome};
use crate::interpreter::errors::ExecError;
use crate::interpreter::interpreter::Interpreter;
use crate::interpreter::job_control::give_terminal_to;
use crate::interpreter::process::{exec_external, fork_process, ForkOutcome};
use crate::interpreter::signals;
use crate::interpreter::traps::TrapKey;

impl Interpreter {
    // =========================================================================
    // Top-level walk
    // =========================================================================

    pub fn run_script(&mut self, script: &ScriptNode) -> Result<ExecOutcome, ExecError> {
        let mut out = ExecOutcome::status(self.env.last_status);
        for list in &script.lists {
            out = self.run_list(list)?;
            if out.is_unwinding() {
                break;
            }
        }
        Ok(out)
    }

    /// Error-absorbing variant for subshell bodies and trap strings.
    pub fn run_script_to_status(&mut self, script: &ScriptNode) -> i32 {
        match self.run_script(script) {
            Ok(out) => out.status,
            Err(e) => self.report(e).status,
        }
    }

    pub fn run_list(&mut self, list: &ListNode) -> Result<ExecOutcome, ExecError> {
        let mut out = ExecOutcome::status(self.env.last_status);
        for (i, item) in list.items.iter().enumerate() {
            self.safe_point();
            let separator = list.separators.get(i).copied().unwrap_or(ListSeparator::Semi);
            out = match separator {
                ListSeparator::Amp => self.run_background(item)?,
                ListSeparator::Semi => self.run_and_or(item)?,
            };
            if out.is_unwinding() {
                return Ok(out);
            }
        }
        Ok(out)
    }

    pub fn run_list_to_status(&mut self, list: &ListNode) -> i32 {
        let script = ScriptNode { lists: vec![list.clone()] };
        self.run_script_to_status(&script)
    }

    fn run_and_or(&mut self, ao: &AndOrNode) -> Result<ExecOutcome, ExecError> {
        let total = 1 + ao.rest.len();
        let mut out = self.run_pipeline_guarded(&ao.first, total > 1)?;
        if out.is_unwinding() {
            return Ok(out);
        }
        for (i, (op, pipeline)) in ao.rest.iter().enumerate() {
            let run = match op {
                AndOr::And => out.status == 0,
                AndOr::Or => out.status != 0,
            };
            if !run {
                continue;
            }
            let tested = i + 1 < ao.rest.len();
            out = self.run_pipeline_guarded(pipeline, tested)?;
            if out.is_unwinding() {
                return Ok(out);
            }
        }
        Ok(out)
    }

    /// Run one pipeline, applying negation, `$?`, ERR trap and errexit.
    fn run_pipeline_guarded(
        &mut self,
        p: &PipelineNode,
        tested: bool,
    ) -> Result<ExecOutcome, ExecError> {
        let outer_checked = self.in_condition;
        if tested || p.negated {
            self.in_condition = true;
        }
        let result = self.run_pipeline_node(p);
        self.in_condition = outer_checked;

        let mut out = result?;
        if p.negated && !out.is_unwinding() {
            out.status = if out.status == 0 { 1 } else { 0 };
        }
        self.env.last_status = out.status;

        if !out.is_unwinding() && out.status != 0 && !tested && !p.negated && !outer_checked {
            self.run_trap(TrapKey::Err);
            if self.env.options.errexit {
                return Ok(ExecOutcome::exit(out.status));
            }
        }
        Ok(out)
    }

    fn run_background(&mut self, ao: &AndOrNode) -> Result<ExecOutcome, ExecError> {
        let job_control = self.job_control_active();
        match fork_process()? {
            ForkOutcome::Child => {
                signals::restore_child_handlers();
                if job_control {
                    let own = nix::unistd::getpid();
                    let _ = nix::unistd::setpgid(own, own);
                } else {
                    // Background without job control reads from /dev/null.
                    if let Ok(devnull) = std::fs::File::open("/dev/null") {
                        use std::os::fd::IntoRawFd;
                        let _ = nix::unistd::dup2(devnull.into_raw_fd(), 0);
                    }
                }
                self.become_subshell();
                let status = match self.run_and_or(ao) {
                    Ok(o) => o.status,
                    Err(e) => self.report(e).status,
                };
                std::process::exit(status);
            }
            ForkOutcome::Parent(pid) => {
                if job_control {
                    let _ = nix::unistd::setpgid(
                        nix::unistd::Pid::from_raw(pid),
                        nix::unistd::Pid::from_raw(pid),
                    );
                }
                let id = self.jobs.add(pid, vec![pid], describe_and_or(ao));
                self.env.last_bg_pid = Some(pid);
                if self.interactive {
                    eprintln!("[{}] {}", id, pid);
                }
                Ok(ExecOutcome::success())
            }
        }
    }

    // =========================================================================
    // Commands
    // =========================================================================

    pub fn run_command(&mut self, cmd: &CommandNode) -> Result<ExecOutcome, ExecError> {
        match cmd {
            CommandNode::Simple(c) => self.run_simple(c),
            CommandNode::Compound(c) => self.run_compound(c),
            CommandNode::FunctionDef(def) => {
                self.env.functions.define(def.clone());
                Ok(ExecOutcome::success())
            }
        }
    }

    fn run_compound(&mut self, cmd: &CompoundCommandNode) -> Result<ExecOutcome, ExecError> {
        match cmd {
            CompoundCommandNode::Group(n) => self.run_group(n),
            CompoundCommandNode::Subshell(n) => self.run_subshell(n),
            CompoundCommandNode::If(n) => self.run_if(n),
            CompoundCommandNode::While(n) => self.run_while(n),
            CompoundCommandNode::For(n) => self.run_for(n),
            CompoundCommandNode::CFor(n) => self.run_cfor(n),
            CompoundCommandNode::Case(n) => self.run_case(n),
            CompoundCommandNode::Arith(n) => self.run_arith_command(n),
            CompoundCommandNode::Cond(n) => self.run_cond_command(n),
        }
    }

    fn run_if(&mut self, n: &IfNode) -> Result<ExecOutcome, ExecError> {
        let guard = match self.apply_redirections(&n.redirections) {
            Ok(g) => g,
            Err(e) => return Ok(self.report(e)),
        };
        let mut out = ExecOutcome::success();
        let mut taken = false;
        for (cond, body) in &n.branches {
            let c = self.run_checked(cond)?;
            if c.is_unwinding() {
                guard.restore();
                return Ok(c);
            }
            if c.status == 0 {
                out = self.run_list(body)?;
                taken = true;
                break;
            }
        }
        if !taken {
            if let Some(body) = &n.else_body {
                out = self.run_list(body)?;
            }
        }
        guard.restore();
        Ok(out)
    }

    /// Run a condition list in checked context (errexit suppressed).
    fn run_checked(&mut self, list: &ListNode) -> Result<ExecOutcome, ExecError> {
        let saved = self.in_condition;
        self.in_condition = true;
        let out = self.run_list(list);
        self.in_condition = saved;
        out
    }

    fn run_while(&mut self, n: &WhileNode) -> Result<ExecOutcome, ExecError> {
        let guard = match self.apply_redirections(&n.redirections) {
            Ok(g) => g,
            Err(e) => return Ok(self.report(e)),
        };
        self.loop_depth += 1;
        let mut last_body_status = 0;
        let out = loop {
            let cond = match self.run_checked(&n.condition) {
                Ok(c) => c,
                Err(e) => {
                    self.loop_depth -= 1;
                    guard.restore();
                    return Err(e);
                }
            };
            if cond.is_unwinding() {
                break cond;
            }
            let truthy = (cond.status == 0) != n.until;
            if !truthy {
                break ExecOutcome::status(last_body_status);
            }
            match self.loop_body_step(&n.body, &mut last_body_status)? {
                Some(out) => break out,
                None => continue,
            }
        };
        self.loop_depth -= 1;
        guard.restore();
        Ok(out)
    }

    /// One loop-body iteration; Some(out) ends the loop.
    fn loop_body_step(
        &mut self,
        body: &ListNode,
        last_body_status: &mut i32,
    ) -> Result<Option<ExecOutcome>, ExecError> {
        let out = self.run_list(body)?;
        *last_body_status = out.status;
        Ok(match out.flow {
            ControlFlow::Break(k) => {
                if k > 1 {
                    Some(ExecOutcome { status: out.status, flow: ControlFlow::Break(k - 1) })
                } else {
                    Some(ExecOutcome::status(out.status))
                }
            }
            ControlFlow::Continue(k) => {
                if k > 1 {
                    Some(ExecOutcome { status: out.status, flow: ControlFlow::Continue(k - 1) })
                } else {
                    None
                }
            }
            ControlFlow::Return | ControlFlow::Exit => Some(out),
            ControlFlow::None => None,
        })
    }

    fn run_for(&mut self, n: &ForNode) -> Result<ExecOutcome, ExecError> {
        let words = match &n.words {
            Some(words) => match self.expand_words(words) {
                Ok(w) => w,
                Err(e) => return Ok(self.report(e)),
            },
            None => self.env.positional_params().to_vec(),
        };
        let guard = match self.apply_redirections(&n.redirections) {
            Ok(g) => g,
            Err(e) => return Ok(self.report(e)),
        };
        self.loop_depth += 1;
        let mut last_body_status = 0;
        let mut out = ExecOutcome::success();
        for value in words {
            if let Err(e) = self.env.set_scalar(&n.variable, value) {
                self.loop_depth -= 1;
                guard.restore();
                return Ok(self.report(e.into()));
            }
            if let Some(done) = self.loop_body_step(&n.body, &mut last_body_status)? {
                out = done;
                self.loop_depth -= 1;
                guard.restore();
                return Ok(out);
            }
            out = ExecOutcome::status(last_body_status);
        }
        self.loop_depth -= 1;
        guard.restore();
        Ok(out)
    }

    fn run_cfor(&mut self, n: &CForNode) -> Result<ExecOutcome, ExecError> {
        let guard = match self.apply_redirections(&n.redirections) {
            Ok(g) => g,
            Err(e) => return Ok(self.report(e)),
        };
        if let Some(init) = &n.init {
            if let Err(e) = self.eval_arith(init) {
                guard.restore();
                return Ok(self.report(e));
            }
        }
        self.loop_depth += 1;
        let mut last_body_status = 0;
        let out = loop {
            let cont = match &n.condition {
                Some(cond) => match self.eval_arith(cond) {
                    Ok(v) => v != 0,
                    Err(e) => {
                        self.loop_depth -= 1;
                        guard.restore();
                        return Ok(self.report(e));
                    }
                },
                None => true,
            };
            if !cont {
                break ExecOutcome::status(last_body_status);
            }
            if let Some(done) = self.loop_body_step(&n.body, &mut last_body_status)? {
                break done;
            }
            if let Some(update) = &n.update {
                if let Err(e) = self.eval_arith(update) {
                    self.loop_depth -= 1;
                    guard.restore();
                    return Ok(self.report(e));
                }
            }
        };
        self.loop_depth -= 1;
        guard.restore();
        Ok(out)
    }

    fn run_case(&mut self, n: &CaseNode) -> Result<ExecOutcome, ExecError> {
        let subject = match self.expand_word_unsplit(&n.subject) {
            Ok(s) => s,
            Err(e) => return Ok(self.report(e)),
        };
        let guard = match self.apply_redirections(&n.redirections) {
            Ok(g) => g,
            Err(e) => return Ok(self.report(e)),
        };
        let nocase = self.env.options.nocasematch;
        let mut out = ExecOutcome::success();
        let mut i = 0;
        'clauses: while i < n.clauses.len() {
            let mut matched = false;
            for pattern in &n.clauses[i].patterns {
                let pat = match self.expand_pattern_word(pattern) {
                    Ok(p) => p,
                    Err(e) => {
                        guard.restore();
                        return Ok(self.report(e));
                    }
                };
                if crate::interpreter::expansion::pattern::pattern_matches(&pat, &subject, nocase) {
                    matched = true;
                    break;
                }
            }
            if !matched {
                i += 1;
                continue;
            }
            // Run this clause and honor its terminator.
            loop {
                out = self.run_list(&n.clauses[i].body)?;
                if out.is_unwinding() {
                    break 'clauses;
                }
                match n.clauses[i].terminator {
                    CaseTerminator::Break => break 'clauses,
                    CaseTerminator::FallThrough => {
                        i += 1;
                        if i >= n.clauses.len() {
                            break 'clauses;
                        }
                        // Next body runs without testing its patterns.
                        continue;
                    }
                    CaseTerminator::Continue => {
                        i += 1;
                        continue 'clauses;
                    }
                }
            }
        }
        guard.restore();
        Ok(out)
    }

    fn run_arith_command(&mut self, n: &ArithCommandNode) -> Result<ExecOutcome, ExecError> {
        self.env.current_line = n.line;
        let guard = match self.apply_redirections(&n.redirections) {
            Ok(g) => g,
            Err(e) => return Ok(self.report(e)),
        };
        let out = match self.eval_arith(&n.expression) {
            Ok(v) => ExecOutcome::status(if v != 0 { 0 } else { 1 }),
            Err(e) => self.report(e),
        };
        guard.restore();
        Ok(out)
    }

    fn run_cond_command(&mut self, n: &CondCommandNode) -> Result<ExecOutcome, ExecError> {
        self.env.current_line = n.line;
        let guard = match self.apply_redirections(&n.redirections) {
            Ok(g) => g,
            Err(e) => return Ok(self.report(e)),
        };
        let out = match self.eval_cond(&n.expression) {
            Ok(true) => ExecOutcome::success(),
            Ok(false) => ExecOutcome::status(1),
            Err(e) => {
                let mut r = self.report(e);
                r.status = 2;
                r
            }
        };
        guard.restore();
        Ok(out)
    }

    // =========================================================================
    // Simple commands
    // =========================================================================

    pub(crate) fn run_simple(&mut self, cmd: &SimpleCommandNode) -> Result<ExecOutcome, ExecError> {
        self.env.current_line = cmd.line;
        self.last_subst_status = None;

        let argv = match self.expand_words(&cmd.words) {
            Ok(a) => a,
            Err(e) => {
                self.close_procsubs();
                return Ok(self.report(e));
            }
        };

        // Pure assignment (possibly with redirections).
        if argv.is_empty() {
            let out = self.run_assignment_only(cmd);
            self.close_procsubs();
            return out;
        }

        self.run_trap(TrapKey::Debug);
        if self.env.options.xtrace {
            self.print_xtrace(&argv);
        }

        let out = self.dispatch_simple(cmd, argv);
        self.close_procsubs();
        out
    }

    fn run_assignment_only(&mut self, cmd: &SimpleCommandNode) -> Result<ExecOutcome, ExecError> {
        let guard = match self.apply_redirections(&cmd.redirections) {
            Ok(g) => g,
            Err(e) => return Ok(self.report(e)),
        };
        for a in &cmd.assignments {
            if let Err(e) = self.eval_assignment(a, SetScope::Normal, false) {
                guard.restore();
                return Ok(self.report(e));
            }
        }
        guard.restore();
        Ok(ExecOutcome::status(self.last_subst_status.unwrap_or(0)))
    }

    fn dispatch_simple(
        &mut self,
        cmd: &SimpleCommandNode,
        mut argv: Vec<String>,
    ) -> Result<ExecOutcome, ExecError> {
        let resolution = match self.resolve_command(&argv[0], false) {
            Ok(r) => r,
            Err(e) => return Ok(self.report(e)),
        };

        match resolution {
            Resolution::Function(def) => {
                let guard = match self.apply_redirections(&cmd.redirections) {
                    Ok(g) => g,
                    Err(e) => return Ok(self.report(e)),
                };
                let pushed = match self.push_temp_assignments(&cmd.assignments) {
                    Ok(p) => p,
                    Err(e) => {
                        guard.restore();
                        return Ok(self.report(e));
                    }
                };
                let out = self.call_function(def, &argv[1..]);
                if pushed {
                    self.env.pop_scope();
                }
                guard.restore();
                out
            }
            Resolution::Builtin(builtin) => {
                let guard = match self.apply_redirections(&cmd.redirections) {
                    Ok(g) => g,
                    Err(e) => return Ok(self.report(e)),
                };
                // Assignments on special builtins persist; on regular
                // builtins they are scoped to the command.
                let pushed = if builtin.special {
                    for a in &cmd.assignments {
                        if let Err(e) = self.eval_assignment(a, SetScope::Normal, false) {
                            guard.restore();
                            return Ok(self.report(e));
                        }
                    }
                    false
                } else {
                    match self.push_temp_assignments(&cmd.assignments) {
                        Ok(p) => p,
                        Err(e) => {
                            guard.restore();
                            return Ok(self.report(e));
                        }
                    }
                };
                let out = match (builtin.run)(self, &argv[1..]) {
                    Ok(o) => o,
                    Err(e) => self.report(e),
                };
                if pushed {
                    self.env.pop_scope();
                }
                // `exec` without argv makes its redirections permanent.
                if self.exec_redirs_persist {
                    self.exec_redirs_persist = false;
                    guard.persist();
                } else {
                    guard.restore();
                }
                Ok(out)
            }
            Resolution::SuffixAlias(prefix) => {
                let mut rewritten = vec![prefix];
                rewritten.append(&mut argv);
                let path = match self.resolve_external(&rewritten[0]) {
                    Ok(p) => p,
                    Err(e) => return Ok(self.report(e)),
                };
                Ok(self.run_external(&path, &rewritten, &cmd.assignments, &cmd.redirections))
            }
            Resolution::External(path) => {
                Ok(self.run_external(&path, &argv, &cmd.assignments, &cmd.redirections))
            }
        }
    }

    fn push_temp_assignments(
        &mut self,
        assignments: &[AssignmentNode],
    ) -> Result<bool, ExecError> {
        if assignments.is_empty() {
            return Ok(false);
        }
        self.env.push_scope(FrameKind::TempAssign);
        for a in assignments {
            if let Err(e) = self.eval_assignment(a, SetScope::Top, true) {
                self.env.pop_scope();
                return Err(e);
            }
        }
        Ok(true)
    }

    pub(crate) fn run_external(
        &mut self,
        path: &str,
        argv: &[String],
        assignments: &[AssignmentNode],
        redirections: &[RedirectionNode],
    ) -> ExecOutcome {
        let job_control = self.job_control_active();
        match fork_process() {
            Err(e) => self.report(e),
            Ok(ForkOutcome::Child) => {
                if job_control {
                    let own = nix::unistd::getpid();
                    let _ = nix::unistd::setpgid(own, own);
                    give_terminal_to(own.as_raw());
                }
                signals::restore_child_handlers();
                for a in assignments {
                    let _ = self.eval_assignment(a, SetScope::Normal, true);
                }
                if let Err(e) = self.apply_redirections_permanent(redirections) {
                    self.diagnostic(&e.to_string());
                    std::process::exit(1);
                }
                let env_map = self.env.export_map();
                let err = exec_external(path, argv, &env_map);
                self.diagnostic(&err.to_string());
                std::process::exit(err.status());
            }
            Ok(ForkOutcome::Parent(pid)) => {
                if job_control {
                    let _ = nix::unistd::setpgid(
                        nix::unistd::Pid::from_raw(pid),
                        nix::unistd::Pid::from_raw(pid),
                    );
                    give_terminal_to(pid);
                }
                let statuses = self.wait_foreground(&[pid], pid, &argv.join(" "));
                if job_control {
                    give_terminal_to(self.shell_pgid);
                }
                ExecOutcome::status(statuses[0])
            }
        }
    }

    // =========================================================================
    // Assignments
    // =========================================================================

    /// Evaluate one assignment. `export` additionally marks the binding
    /// exported (temp-assign prefixes and external-child environments).
    pub(crate) fn eval_assignment(
        &mut self,
        a: &AssignmentNode,
        scope: SetScope,
        export: bool,
    ) -> Result<(), ExecError> {
        if let Some(elems) = &a.array {
            let value = self.build_array_value(&a.name, elems, a.append)?;
            self.env.set_value(&a.name, value, scope)?;
            if export {
                self.env.modify_attrs(&a.name, |attrs| attrs.exported = true)?;
            }
            return Ok(());
        }

        let text = match &a.value {
            Some(w) => self.expand_word_unsplit(w)?,
            None => String::new(),
        };

        match &a.subscript {
            Some(raw) => {
                let is_assoc = matches!(self.env.value_of(&a.name), Some(Value::Assoc(_)));
                if is_assoc {
                    let key = self.expand_subscript_key(raw)?;
                    let final_text = if a.append {
                        let old = match self.env.value_of(&a.name) {
                            Some(Value::Assoc(m)) => m.get(&key).cloned().unwrap_or_default(),
                            _ => String::new(),
                        };
                        format!("{}{}", old, text)
                    } else {
                        text
                    };
                    self.env.set_element(&a.name, &key, 0, &final_text)?;
                } else {
                    let mut idx = self.eval_subscript_index(raw)?;
                    if idx < 0 {
                        if let Some(Value::Indexed(m)) = self.env.value_of(&a.name) {
                            idx += m.keys().next_back().copied().unwrap_or(-1) + 1;
                        }
                    }
                    if idx < 0 {
                        return Err(ExecError::Expansion(format!(
                            "{}[{}]: bad array subscript",
                            a.name, raw
                        )));
                    }
                    let final_text = if a.append {
                        let old = match self.env.value_of(&a.name) {
                            Some(Value::Indexed(m)) => m.get(&idx).cloned().unwrap_or_default(),
                            Some(Value::Scalar(s)) if idx == 0 => s,
                            _ => String::new(),
                        };
                        format!("{}{}", old, text)
                    } else {
                        text
                    };
                    self.env.set_element(&a.name, "", idx, &final_text)?;
                }
            }
            None => {
                let attrs = self.env.attrs_of(&a.name);
                if attrs.integer {
                    let node = crate::parser::arithmetic_parser::parse_arith(&text, 0)
                        .map_err(|e| ExecError::Arith(e.message))?;
                    let mut v = self.eval_arith(&node)?;
                    if a.append {
                        let old: i64 = self
                            .env
                            .get_scalar(&a.name)
                            .and_then(|s| s.parse().ok())
                            .unwrap_or(0);
                        v = old.wrapping_add(v);
                    }
                    self.env.set_value(&a.name, Value::scalar(v.to_string()), scope)?;
                } else if a.append {
                    self.env.append_scalar(&a.name, &text)?;
                } else {
                    self.env.set_value(&a.name, Value::scalar(text.clone()), scope)?;
                }
                if self.env.options.xtrace {
                    let shown = self.env.get_scalar(&a.name).unwrap_or_default();
                    self.print_xtrace_assignment(&a.name, &shown);
                }
            }
        }
        if export {
            self.env.modify_attrs(&a.name, |attrs| attrs.exported = true)?;
        }
        Ok(())
    }

    /// `NAME=(elem ... [k]=v ...)`.
    fn build_array_value(
        &mut self,
        name: &str,
        elems: &[WordNode],
        append: bool,
    ) -> Result<Value, ExecError> {
        let existing = self.env.value_of(name);
        let assoc = matches!(existing, Some(Value::Assoc(_)));
        if assoc {
            let mut map = match (append, existing) {
                (true, Some(Value::Assoc(m))) => m,
                _ => indexmap::IndexMap::new(),
            };
            for elem in elems {
                match keyed_element(elem) {
                    Some((key_raw, value_word)) => {
                        let key = self.expand_subscript_key(&key_raw)?;
                        let value = self.expand_word_unsplit(&value_word)?;
                        map.insert(key, value);
                    }
                    None => {
                        return Err(ExecError::Expansion(format!(
                            "{}: associative array assignments must use [key]=value",
                            name
                        )))
                    }
                }
            }
            return Ok(Value::Assoc(map));
        }

        let mut map = match (append, existing) {
            (true, Some(Value::Indexed(m))) => m,
            (true, Some(Value::Scalar(s))) => {
                let mut m = std::collections::BTreeMap::new();
                m.insert(0, s);
                m
            }
            _ => std::collections::BTreeMap::new(),
        };
        let mut next = map.keys().next_back().map(|k| k + 1).unwrap_or(0);
        for elem in elems {
            match keyed_element(elem) {
                Some((key_raw, value_word)) => {
                    let idx = self.eval_subscript_index(&key_raw)?;
                    let value = self.expand_word_unsplit(&value_word)?;
                    map.insert(idx, value);
                    next = idx + 1;
                }
                None => {
                    // Unkeyed elements split and glob like argv words.
                    for value in self.expand_words(std::slice::from_ref(elem))? {
                        map.insert(next, value);
                        next += 1;
                    }
                }
            }
        }
        Ok(Value::Indexed(map))
    }

    // =========================================================================
    // Traps and safe points
    // =========================================================================

    /// Run a pseudo-signal trap (EXIT, ERR, DEBUG, RETURN) if installed.
    pub fn run_trap(&mut self, key: TrapKey) {
        if self.traps.running {
            return;
        }
        if let Some(action) = self.traps.action_of(key) {
            self.traps.running = true;
            let saved = self.env.last_status;
            let _ = self.run_string(&action);
            self.env.last_status = saved;
            self.traps.running = false;
        }
    }

    /// Between-commands housekeeping: reap children, run pending signal
    /// traps (coalesced).
    pub fn safe_point(&mut self) {
        if signals::take_child_pending() {
            self.jobs.reap();
        }
        if self.traps.running {
            return;
        }
        for sig in self.traps.take_pending() {
            if let Some(action) = self.traps.action_of(TrapKey::Sig(sig)) {
                self.traps.running = true;
                let saved = self.env.last_status;
                let _ = self.run_string(&action);
                self.env.last_status = saved;
                self.traps.running = false;
            }
        }
    }
}

/// A keyed array element `[k]=v`: split the subscript off the leading
/// literal part.
fn keyed_element(word: &WordNode) -> Option<(String, WordNode)> {
    let first = match word.parts.first() {
        Some(WordPart::Literal(s)) if s.starts_with('[') => s.clone(),
        _ => return None,
    };
    let chars: Vec<char> = first.chars().collect();
    let mut depth = 0i32;
    let mut close = None;
    for (i, &c) in chars.iter().enumerate() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(i);
                    break;
                }
            }
            _ => {}
        }
    }
    let close = close?;
    if chars.get(close + 1) != Some(&'=') {
        return None;
    }
    let key: String = chars[1..close].iter().collect();
    let remainder: String = chars[close + 2..].iter().collect();
    let mut parts = Vec::new();
    if !remainder.is_empty() {
        parts.push(WordPart::Literal(remainder));
    }
    parts.extend(word.parts[1..].iter().cloned());
    Some((key, WordNode { parts }))
}

// =============================================================================
// Display helpers (job table, background notices)
// =============================================================================

pub(crate) fn describe_and_or(ao: &AndOrNode) -> String {
    let mut text = describe_pipeline(&ao.first);
    for (op, p) in &ao.rest {
        let sep = match op {
            AndOr::And => " && ",
            AndOr::Or => " || ",
        };
        text.push_str(sep);
        text.push_str(&describe_pipeline(p));
    }
    text
}

pub(crate) fn describe_pipeline(p: &PipelineNode) -> String {
    let stages: Vec<String> = p.stages.iter().map(describe_command_node).collect();
    let mut text = stages.join(" | ");
    if p.negated {
        text.insert_str(0, "! ");
    }
    text
}

fn describe_command_node(cmd: &CommandNode) -> String {
    match cmd {
        CommandNode::Simple(c) => {
            let mut words: Vec<String> = c.assignments.iter().map(describe_assignment).collect();
            words.extend(c.words.iter().map(describe_word));
            words.join(" ")
        }
        CommandNode::Compound(CompoundCommandNode::Subshell(_)) => "( ... )".to_string(),
        CommandNode::Compound(CompoundCommandNode::Group(_)) => "{ ...; }".to_string(),
        CommandNode::Compound(CompoundCommandNode::If(_)) => "if ...".to_string(),
        CommandNode::Compound(CompoundCommandNode::While(n)) => {
            if n.until {
                "until ...".to_string()
            } else {
                "while ...".to_string()
            }
        }
        CommandNode::Compound(CompoundCommandNode::For(_))
        | CommandNode::Compound(CompoundCommandNode::CFor(_)) => "for ...".to_string(),
        CommandNode::Compound(CompoundCommandNode::Case(_)) => "case ...".to_string(),
        CommandNode::Compound(CompoundCommandNode::Arith(n)) => format!("(( {} ))", n.expression.text),
        CommandNode::Compound(CompoundCommandNode::Cond(_)) => "[[ ... ]]".to_string(),
        CommandNode::FunctionDef(f) => format!("{}()", f.name),
    }
}

fn describe_assignment(a: &AssignmentNode) -> String {
    match &a.value {
        Some(w) => format!("{}={}", a.name, describe_word(w)),
        None => format!("{}=", a.name),
    }
}

pub(crate) fn describe_word(w: &WordNode) -> String {
    let mut out = String::new();
    for part in &w.parts {
        match part {
            WordPart::Literal(s) => out.push_str(s),
            WordPart::SingleQuoted(s) => {
                out.push('\'');
                out.push_str(s);
                out.push('\'');
            }
            WordPart::DoubleQuoted(inner) => {
                out.push('"');
                out.push_str(&describe_word(&WordNode { parts: inner.clone() }));
                out.push('"');
            }
            WordPart::AnsiC(s) => {
                out.push_str("$'");
                out.push_str(s);
                out.push('\'');
            }
            WordPart::Escaped(s) => {
                out.push('\\');
                out.push_str(s);
            }
            WordPart::Parameter(p) => {
                out.push('$');
                out.push_str(&p.name);
            }
            WordPart::CommandSubst { .. } => out.push_str("$(...)"),
            WordPart::ArithSubst(e) => out.push_str(&format!("$(({}))", e.text)),
            WordPart::ProcessSubst { direction, .. } => match direction {
                ProcessDirection::Read => out.push_str("<(...)"),
                ProcessDirection::Write => out.push_str(">(...)"),
            },
            WordPart::Tilde(user) => {
                out.push('~');
                if let Some(u) = user {
                    out.push_str(u);
                }
            }
            WordPart::Brace(_) => out.push_str("{...}"),
        }
    }
    out
}
