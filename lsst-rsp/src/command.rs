//! External commands: bounded subprocess runs and the final process replacement.
pub mod error;
pub mod exec;
pub mod process;

pub use error::CommandError;
pub use exec::{ExecvpExecutor, Executor};
pub use process::{Command, ProcessResult};

/// Joins `args` into a string a POSIX shell would split back into the same words.
pub fn shell_join<S: AsRef<str>>(args: &[S]) -> String {
    args.iter()
        .map(|a| shell_quote(a.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

fn shell_quote(arg: &str) -> String {
    let safe = |c: char| c.is_ascii_alphanumeric() || "@%+=:,./_-".contains(c);
    if !arg.is_empty() && arg.chars().all(safe) {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r#"'"'"'"#))
    }
}
