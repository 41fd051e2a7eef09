//! Redirection application over real file descriptors.
//!
//! Redirections are applied with dup2 onto the shell's own fds for
//! builtins and compounds (saved to CLOEXEC fds >= 10 and restored on
//! every exit path), or permanently in forked children. Heredoc bodies
//! travel over a pipe, with a writer child when they exceed the pipe
//! buffer.

use std::fs::OpenOptions;
use std::io::Write;
use std::os::fd::{IntoRawFd, OwnedFd};
use std::os::unix::fs::OpenOptionsExt;

use nix::fcntl::{fcntl, FcntlArg};
use nix::unistd;

use crate::ast::types::{RedirOp, RedirTarget, RedirectionNode};
use crate::interpreter::errors::ExecError;
use crate::interpreter::interpreter::Interpreter;
use crate::interpreter::process::{fork_process, ForkOutcome};

/// Fds below this are never used for saved copies.
const SAVED_FD_BASE: i32 = 10;

/// Saved fds for restoration, in application order.
pub struct RedirGuard {
    saved: Vec<(i32, Option<i32>)>,
    restored: bool,
}

impl RedirGuard {
    fn new() -> Self {
        Self { saved: Vec::new(), restored: false }
    }

    /// Put every redirected fd back. Flushes stdio first so buffered
    /// output lands in the redirected file, not the restored one.
    pub fn restore(mut self) {
        self.restore_impl();
    }

    /// Keep the redirections (the `exec` builtin); saved fds are closed.
    pub fn persist(mut self) {
        self.restored = true;
        for (_, saved) in self.saved.drain(..) {
            if let Some(fd) = saved {
                let _ = nix::unistd::close(fd);
            }
        }
    }

    fn restore_impl(&mut self) {
        if self.restored {
            return;
        }
        self.restored = true;
        let _ = std::io::stdout().flush();
        let _ = std::io::stderr().flush();
        for (target, saved) in self.saved.drain(..).rev() {
            match saved {
                Some(fd) => {
                    let _ = unistd::dup2(fd, target);
                    let _ = unistd::close(fd);
                }
                None => {
                    let _ = unistd::close(target);
                }
            }
        }
    }
}

impl Drop for RedirGuard {
    fn drop(&mut self) {
        self.restore_impl();
    }
}

impl Interpreter {
    /// Apply for a builtin/compound in this process; the guard restores.
    pub fn apply_redirections(
        &mut self,
        redirs: &[RedirectionNode],
    ) -> Result<RedirGuard, ExecError> {
        let mut guard = RedirGuard::new();
        for redir in redirs {
            if let Err(e) = self.apply_one(redir, Some(&mut guard)) {
                return Err(e);
            }
        }
        Ok(guard)
    }

    /// Apply permanently: forked children and the `exec` builtin.
    pub fn apply_redirections_permanent(
        &mut self,
        redirs: &[RedirectionNode],
    ) -> Result<(), ExecError> {
        for redir in redirs {
            self.apply_one(redir, None)?;
        }
        Ok(())
    }

    fn apply_one(
        &mut self,
        redir: &RedirectionNode,
        guard: Option<&mut RedirGuard>,
    ) -> Result<(), ExecError> {
        let fd = redir.fd.unwrap_or_else(|| redir.operator.default_fd());
        let save = |g: Option<&mut RedirGuard>, fds: &[i32]| {
            if let Some(g) = g {
                let _ = std::io::stdout().flush();
                let _ = std::io::stderr().flush();
                for &target in fds {
                    let saved = fcntl(target, FcntlArg::F_DUPFD_CLOEXEC(SAVED_FD_BASE)).ok();
                    g.saved.push((target, saved));
                }
            }
        };

        match redir.operator {
            RedirOp::Less => {
                let path = self.redir_target_path(redir)?;
                let file = OpenOptions::new().read(true).open(&path).map_err(|e| {
                    ExecError::Redirect { context: path.clone(), source: e }
                })?;
                save(guard, &[fd]);
                dup_over(file.into_raw_fd(), fd)?;
            }
            RedirOp::Great | RedirOp::Clobber => {
                let path = self.redir_target_path(redir)?;
                if redir.operator == RedirOp::Great && self.env.options.noclobber {
                    if let Ok(md) = std::fs::metadata(&path) {
                        if md.is_file() {
                            return Err(ExecError::Redirect {
                                context: path,
                                source: std::io::Error::new(
                                    std::io::ErrorKind::AlreadyExists,
                                    "cannot overwrite existing file",
                                ),
                            });
                        }
                    }
                }
                let file = open_write(&path, false)?;
                save(guard, &[fd]);
                dup_over(file.into_raw_fd(), fd)?;
            }
            RedirOp::DGreat => {
                let path = self.redir_target_path(redir)?;
                let file = open_write(&path, true)?;
                save(guard, &[fd]);
                dup_over(file.into_raw_fd(), fd)?;
            }
            RedirOp::LessGreat => {
                let path = self.redir_target_path(redir)?;
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .mode(0o666)
                    .open(&path)
                    .map_err(|e| ExecError::Redirect { context: path.clone(), source: e })?;
                save(guard, &[fd]);
                dup_over(file.into_raw_fd(), fd)?;
            }
            RedirOp::GreatAnd | RedirOp::LessAnd => {
                let target = self.redir_target_path(redir)?;
                if target == "-" {
                    save(guard, &[fd]);
                    let _ = unistd::close(fd);
                } else if let Ok(src) = target.trim_end_matches('-').parse::<i32>() {
                    let moving = target.ends_with('-');
                    save(guard, &[fd]);
                    unistd::dup2(src, fd).map_err(|e| ExecError::Redirect {
                        context: format!("{}", src),
                        source: std::io::Error::from_raw_os_error(e as i32),
                    })?;
                    if moving {
                        let _ = unistd::close(src);
                    }
                } else if redir.operator == RedirOp::GreatAnd && redir.fd.is_none() {
                    // `>&file` == `>file 2>&1`.
                    let file = open_write(&target, false)?;
                    save(guard, &[1, 2]);
                    dup_both(file.into_raw_fd())?;
                } else {
                    return Err(ExecError::AmbiguousRedirect(target));
                }
            }
            RedirOp::AndGreat | RedirOp::AndDGreat => {
                let path = self.redir_target_path(redir)?;
                let file = open_write(&path, redir.operator == RedirOp::AndDGreat)?;
                save(guard, &[1, 2]);
                dup_both(file.into_raw_fd())?;
            }
            RedirOp::HereString => {
                let text = match &redir.target {
                    RedirTarget::Word(w) => self.expand_word_unsplit(w)?,
                    RedirTarget::HereDoc(_) => String::new(),
                };
                let heredoc_fd = self.heredoc_pipe(&format!("{}\n", text))?;
                save(guard, &[fd]);
                dup_over(heredoc_fd.into_raw_fd(), fd)?;
            }
            RedirOp::HereDoc | RedirOp::HereDocDash => {
                let body = match &redir.target {
                    RedirTarget::HereDoc(h) => {
                        if h.quoted {
                            self.literal_heredoc_text(h)
                        } else {
                            self.expand_word_unsplit(&h.body)?
                        }
                    }
                    RedirTarget::Word(_) => String::new(),
                };
                let heredoc_fd = self.heredoc_pipe(&body)?;
                save(guard, &[fd]);
                dup_over(heredoc_fd.into_raw_fd(), fd)?;
            }
        }
        Ok(())
    }

    fn literal_heredoc_text(&self, h: &crate::ast::types::HereDocNode) -> String {
        h.body
            .parts
            .iter()
            .map(|p| match p {
                crate::ast::types::WordPart::Literal(s) => s.clone(),
                _ => String::new(),
            })
            .collect()
    }

    /// Expand a redirection target to exactly one word.
    fn redir_target_path(&mut self, redir: &RedirectionNode) -> Result<String, ExecError> {
        let word = match &redir.target {
            RedirTarget::Word(w) => w.clone(),
            RedirTarget::HereDoc(_) => return Ok(String::new()),
        };
        let fields = self.expand_words(std::slice::from_ref(&word))?;
        if fields.len() != 1 {
            let text = self.expand_word_unsplit(&word).unwrap_or_default();
            return Err(ExecError::AmbiguousRedirect(text));
        }
        Ok(fields.into_iter().next().unwrap_or_default())
    }

    /// Deliver a heredoc body over a pipe; fork a writer for bodies the
    /// pipe buffer cannot hold.
    fn heredoc_pipe(&mut self, body: &str) -> Result<OwnedFd, ExecError> {
        let (read_end, write_end) = unistd::pipe()?;
        if body.len() <= 4096 {
            let mut file = std::fs::File::from(write_end);
            let _ = file.write_all(body.as_bytes());
            drop(file);
            return Ok(read_end);
        }
        match fork_process()? {
            ForkOutcome::Child => {
                drop(read_end);
                let mut file = std::fs::File::from(write_end);
                let _ = file.write_all(body.as_bytes());
                drop(file);
                std::process::exit(0);
            }
            ForkOutcome::Parent(_) => {
                drop(write_end);
                Ok(read_end)
            }
        }
    }
}

fn open_write(path: &str, append: bool) -> Result<std::fs::File, ExecError> {
    let mut opts = OpenOptions::new();
    opts.write(true).create(true).mode(0o666);
    if append {
        opts.append(true);
    } else {
        opts.truncate(true);
    }
    opts.open(path).map_err(|e| ExecError::Redirect { context: path.to_string(), source: e })
}

/// dup2 `src` onto `target` and close `src`.
fn dup_over(src: i32, target: i32) -> Result<(), ExecError> {
    if src != target {
        unistd::dup2(src, target)?;
        let _ = unistd::close(src);
    }
    Ok(())
}

/// `&>file` ordering: the file lands on 1, then 2 duplicates 1.
fn dup_both(src: i32) -> Result<(), ExecError> {
    if src != 1 {
        unistd::dup2(src, 1)?;
    }
    if src != 2 {
        unistd::dup2(1, 2)?;
    }
    if src != 1 && src != 2 {
        let _ = unistd::close(src);
    }
    Ok(())
}
