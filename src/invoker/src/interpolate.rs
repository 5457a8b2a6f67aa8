//! Command templates
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InterpolateError {
    #[error("template syntax violation: {message}")]
    BadSyntax { message: &'static str },
    #[error("unknown key {key} in command template")]
    MissingKey { key: String },
    #[error("command template is empty")]
    EmptyCommand,
}

/// Replaces every `$(Key)` in `template` with `dict[Key]`.
///
/// `$(` and `)` are reserved: `a$(X)b` and `$$(X)` are valid,
/// while `$(X`, `X)` and `$($(X))` are not.
pub fn interpolate_string(
    template: &str,
    dict: &HashMap<&str, String>,
) -> Result<String, InterpolateError> {
    const OPEN: usize = 0;
    const CLOSE: usize = 1;
    let delimiters = aho_corasick::AhoCorasick::new_auto_configured(&["$(", ")"]);
    let mut out = String::with_capacity(template.len());
    // start of pending text or key
    let mut pending = 0;
    let mut in_key = false;
    for delim in delimiters.find_iter(template) {
        let piece = &template[pending..delim.start()];
        pending = delim.end();
        match (in_key, delim.pattern()) {
            (false, OPEN) => out.push_str(piece),
            (true, CLOSE) => {
                let value = dict.get(piece).ok_or_else(|| InterpolateError::MissingKey {
                    key: piece.to_string(),
                })?;
                out.push_str(value);
            }
            (true, _) => {
                return Err(InterpolateError::BadSyntax {
                    message: "placeholders can not be nested",
                })
            }
            (false, _) => {
                return Err(InterpolateError::BadSyntax {
                    message: "unmatched `)`",
                })
            }
        }
        in_key = !in_key;
    }
    if in_key {
        return Err(InterpolateError::BadSyntax {
            message: "placeholder is not closed",
        });
    }
    out.push_str(&template[pending..]);
    Ok(out)
}

/// Builds command from argv template
pub fn interpolate_command(
    argv: &[String],
    dict: &HashMap<&str, String>,
) -> Result<std::process::Command, InterpolateError> {
    let argv = argv
        .iter()
        .map(|arg| interpolate_string(arg, dict))
        .collect::<Result<Vec<_>, _>>()?;
    let (program, args) = argv.split_first().ok_or(InterpolateError::EmptyCommand)?;
    let mut cmd = std::process::Command::new(program);
    cmd.args(args);
    Ok(cmd)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dict() -> HashMap<&'static str, String> {
        let mut dict = HashMap::new();
        dict.insert("Source", "test-file.cpp".to_string());
        dict.insert("LogFd", "5".to_string());
        dict
    }

    #[test]
    fn substitution() {
        let d = dict();
        assert_eq!(interpolate_string("foo", &d).unwrap(), "foo");
        assert_eq!(interpolate_string("$(Source)", &d).unwrap(), "test-file.cpp");
        assert_eq!(
            interpolate_string("--log_fd=$(LogFd)$(LogFd)", &d).unwrap(),
            "--log_fd=55"
        );
        assert_eq!(interpolate_string("a$$$$(LogFd)b", &d).unwrap(), "a$$$5b");
    }

    #[test]
    fn errors() {
        let d = dict();
        assert_eq!(
            interpolate_string("$(Nope)", &d),
            Err(InterpolateError::MissingKey {
                key: "Nope".to_string()
            })
        );
        assert!(matches!(
            interpolate_string("$(Source))", &d),
            Err(InterpolateError::BadSyntax { .. })
        ));
        assert!(matches!(
            interpolate_string("$(", &d),
            Err(InterpolateError::BadSyntax { .. })
        ));
        assert_eq!(
            interpolate_command(&[], &d).unwrap_err(),
            InterpolateError::EmptyCommand
        );
    }

    #[test]
    fn command() {
        let argv = vec!["g++".to_string(), "-o".to_string(), "$(Source).out".to_string()];
        let cmd = interpolate_command(&argv, &dict()).unwrap();
        assert_eq!(cmd.get_program(), "g++");
        let args: Vec<_> = cmd.get_args().collect();
        assert_eq!(args, ["-o", "test-file.cpp.out"]);
    }
}
