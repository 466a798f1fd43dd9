//! Environment and home-directory expansion for tunnel launch lines
//!
//! Pure helpers: the variable lookup and home directory are passed in, so
//! nothing here touches the process environment directly.

use crate::error::{AppError, Result};
use regex::{Captures, Regex};

/// Expands `$NAME` and `${NAME}` references, leaving unknown names as written
#[derive(Debug, Clone)]
pub struct EnvExpander {
    pattern: Regex,
}

impl EnvExpander {
    pub fn new() -> Result<Self> {
        let pattern = Regex::new(r"\$(\w+|\{[^}]*\})")
            .map_err(|e| AppError::internal(format!("variable pattern: {}", e)))?;
        Ok(Self { pattern })
    }

    /// Replace every defined variable reference in `input`
    pub fn expand<F>(&self, input: &str, lookup: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        self.pattern
            .replace_all(input, |caps: &Captures| {
                let raw = &caps[1];
                let name = raw
                    .strip_prefix('{')
                    .and_then(|n| n.strip_suffix('}'))
                    .unwrap_or(raw);
                lookup(name).unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }
}

/// Expand a leading `~` or `~/` using `home`; anything else is returned as is
pub fn expand_home(path: &str, home: Option<&str>) -> String {
    let Some(home) = home else {
        return path.to_string();
    };

    if path == "~" {
        home.to_string()
    } else if let Some(rest) = path.strip_prefix("~/") {
        format!("{}/{}", home.trim_end_matches('/'), rest)
    } else {
        path.to_string()
    }
}

/// Home-expand the value of every `--opt=VALUE` argument naming a log-path option
pub fn expand_log_path_args(args: Vec<String>, options: &[&str], home: Option<&str>) -> Vec<String> {
    args.into_iter()
        .map(|arg| {
            if !options.iter().any(|opt| arg.contains(opt)) {
                return arg;
            }
            match arg.split_once('=') {
                Some((key, value)) => format!("{}={}", key, expand_home(value, home)),
                None => arg,
            }
        })
        .collect()
}

/// Full launch-line preparation: variables first, then whitespace split, then
/// home expansion of log-path values
pub fn prepare_launch_argv<F>(
    expander: &EnvExpander,
    line: &str,
    options: &[&str],
    lookup: F,
    home: Option<&str>,
) -> Vec<String>
where
    F: Fn(&str) -> Option<String>,
{
    let expanded = expander.expand(line, lookup);
    let argv = expanded.split_whitespace().map(String::from).collect();
    expand_log_path_args(argv, options, home)
}

/// Lookup backed by the process environment
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// `$HOME` of the current process, if set
pub fn home_dir() -> Option<String> {
    std::env::var("HOME").ok().filter(|h| !h.is_empty())
}
