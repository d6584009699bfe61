use shell_escape::escape;
use std::borrow::Cow;

/// Heredoc delimiter unlikely to collide with payload content.
const HEREDOC_MARK: &str = "__STACKCTL_EOF__";

/// Structured builder for the shell script a remote host will execute.
///
/// Steps are accumulated as data and serialized to a single `bash` script
/// only at the execution boundary (inside [`super::SshRunner`]); nothing
/// builds remote command strings ad hoc.
#[derive(Debug, Default)]
pub struct RemoteScript {
    steps: Vec<Step>,
}

#[derive(Debug)]
enum Step {
    Run(String),
    WriteFile { path: String, contents: String },
}

impl RemoteScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command, taken verbatim.
    pub fn run(mut self, command: impl Into<String>) -> Self {
        self.steps.push(Step::Run(command.into()));
        self
    }

    /// Append a command built from a program and arguments, each argument
    /// shell-escaped.
    pub fn run_args(mut self, program: &str, args: &[&str]) -> Self {
        let mut command = program.to_string();
        for arg in args {
            command.push(' ');
            command.push_str(&escape(Cow::Borrowed(*arg)));
        }
        self.steps.push(Step::Run(command));
        self
    }

    /// Write a file on the remote host via heredoc before the following
    /// steps run.
    pub fn write_file(mut self, path: impl Into<String>, contents: impl Into<String>) -> Self {
        self.steps.push(Step::WriteFile {
            path: path.into(),
            contents: contents.into(),
        });
        self
    }

    /// Serialize to the script text the remote `bash` will execute.
    /// The script aborts on the first failing step.
    pub fn render(&self) -> String {
        let mut out = String::from("set -e\n");
        for step in &self.steps {
            match step {
                Step::Run(command) => {
                    out.push_str(command);
                    out.push('\n');
                }
                Step::WriteFile { path, contents } => {
                    out.push_str(&format!(
                        "cat << '{mark}' > {path}\n{contents}\n{mark}\n",
                        mark = HEREDOC_MARK,
                        path = escape(Cow::Borrowed(path.as_str())),
                        contents = contents
                    ));
                }
            }
        }
        out
    }
}
