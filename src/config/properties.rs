use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// One line of a property file. Comments and blank lines are kept verbatim
/// so a rewrite does not destroy hand-written annotations.
#[derive(Debug, Clone)]
enum Line {
    Pair { key: String, value: String },
    Verbatim(String),
}

/// Flat `key=value` property file.
///
/// Reads tolerate missing keys (`get` returns `None`); `require` turns an
/// absent key into a `Config` error naming the key and the file. Writes are
/// whole-file rewrites; callers that need the file owned by the service
/// account wrap `save` in an identity guard.
#[derive(Debug)]
pub struct PropertyFile {
    path: PathBuf,
    lines: Vec<Line>,
}

impl PropertyFile {
    /// Load a property file. Missing file is a configuration error: the
    /// installation is expected to ship one.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "cannot read property file at {}: {}",
                path.display(),
                e
            ))
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            lines: Self::parse(&contents),
        })
    }

    fn parse(contents: &str) -> Vec<Line> {
        contents
            .lines()
            .map(|raw| {
                let trimmed = raw.trim();
                if trimmed.is_empty() || trimmed.starts_with('#') {
                    return Line::Verbatim(raw.to_string());
                }
                match trimmed.split_once('=') {
                    Some((key, value)) => Line::Pair {
                        key: key.trim().to_string(),
                        value: value.trim().to_string(),
                    },
                    // Not key=value; keep it untouched rather than guessing.
                    None => Line::Verbatim(raw.to_string()),
                }
            })
            .collect()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up a key. Absent keys are not an error.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.lines.iter().rev().find_map(|line| match line {
            Line::Pair { key: k, value } if k == key => Some(value.as_str()),
            _ => None,
        })
    }

    /// Look up a key that must be present.
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key).ok_or_else(|| {
            Error::Config(format!(
                "cannot find '{}' in {}; please set it",
                key,
                self.path.display()
            ))
        })
    }

    /// All `(key, value)` pairs whose key starts with `prefix`, in file
    /// order. Used for indexed keys like `broker.host.0`, `broker.host.1`.
    pub fn get_prefix(&self, prefix: &str) -> Vec<(String, String)> {
        self.lines
            .iter()
            .filter_map(|line| match line {
                Line::Pair { key, value } if key.starts_with(prefix) => {
                    Some((key.clone(), value.clone()))
                }
                _ => None,
            })
            .collect()
    }

    /// Set a key, replacing an existing entry or appending a new one.
    pub fn set(&mut self, key: &str, value: &str) {
        for line in &mut self.lines {
            if let Line::Pair { key: k, value: v } = line {
                if k == key {
                    *v = value.to_string();
                    return;
                }
            }
        }
        self.lines.push(Line::Pair {
            key: key.to_string(),
            value: value.to_string(),
        });
    }

    /// Apply a batch of `key=value` assignments.
    pub fn set_many(&mut self, pairs: &[(String, String)]) {
        for (key, value) in pairs {
            self.set(key, value);
        }
    }

    /// Rewrite the whole file.
    pub fn save(&self) -> Result<()> {
        let mut out = String::new();
        for line in &self.lines {
            match line {
                Line::Pair { key, value } => {
                    out.push_str(key);
                    out.push('=');
                    out.push_str(value);
                }
                Line::Verbatim(raw) => out.push_str(raw),
            }
            out.push('\n');
        }
        fs::write(&self.path, out).map_err(|e| {
            Error::Config(format!(
                "cannot write property file at {}: {}",
                self.path.display(),
                e
            ))
        })
    }
}

/// Parse a `key=value` CLI argument into a pair.
pub fn parse_assignment(arg: &str) -> Result<(String, String)> {
    match arg.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(Error::Config(format!(
            "'{}' is not in the form key=value",
            arg
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("management.properties");
        fs::write(&path, contents).expect("write");
        (dir, path)
    }

    #[test]
    fn missing_key_returns_none() {
        let (_dir, path) = write_temp("db.user=stack\n");
        let props = PropertyFile::load(&path).unwrap();
        assert_eq!(props.get("db.user"), Some("stack"));
        assert_eq!(props.get("db.password"), None);
    }

    #[test]
    fn require_names_the_key_and_file() {
        let (_dir, path) = write_temp("");
        let props = PropertyFile::load(&path).unwrap();
        let err = props.require("db.url").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("db.url"), "message should name the key: {}", msg);
        assert!(
            msg.contains("management.properties"),
            "message should name the file: {}",
            msg
        );
    }

    #[test]
    fn prefix_scan_preserves_file_order() {
        let (_dir, path) = write_temp("broker.host.0=10.0.0.1\nother=x\nbroker.host.1=10.0.0.2\n");
        let props = PropertyFile::load(&path).unwrap();
        let hosts = props.get_prefix("broker.host.");
        assert_eq!(
            hosts,
            vec![
                ("broker.host.0".to_string(), "10.0.0.1".to_string()),
                ("broker.host.1".to_string(), "10.0.0.2".to_string()),
            ]
        );
    }

    #[test]
    fn set_and_save_round_trip_keeps_comments() {
        let (_dir, path) = write_temp("# managed by stackctl\ndb.user=stack\n\ndb.url=jdbc:mysql://localhost:3306\n");
        let mut props = PropertyFile::load(&path).unwrap();
        props.set("db.user", "admin");
        props.set("db.password", "secret");
        props.save().unwrap();

        let reread = fs::read_to_string(&path).unwrap();
        assert!(reread.starts_with("# managed by stackctl\n"));
        assert!(reread.contains("db.user=admin\n"));
        assert!(reread.ends_with("db.password=secret\n"));

        let reloaded = PropertyFile::load(&path).unwrap();
        assert_eq!(reloaded.get("db.user"), Some("admin"));
        assert_eq!(reloaded.get("db.password"), Some("secret"));
    }

    #[test]
    fn missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = PropertyFile::load(&dir.path().join("nope.properties")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn parse_assignment_rejects_bare_words() {
        assert!(parse_assignment("key=value").is_ok());
        assert!(parse_assignment("novalue").is_err());
        assert!(parse_assignment("=value").is_err());
    }
}
