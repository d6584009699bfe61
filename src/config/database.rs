use super::PropertyFile;
use crate::error::{Error, Result};

/// Connection coordinates of the database, resolved from the property file.
///
/// The URL is JDBC-style (`jdbc:mysql://host:port`); host and port are
/// extracted from it rather than stored as separate keys, matching what the
/// management node itself reads.
#[derive(Debug, Clone)]
pub struct DatabasePortal {
    pub host: String,
    pub port: u16,
    pub user: String,
    /// `None` means "no password" (passed as no `-p` flag to the client).
    pub password: Option<String>,
}

impl DatabasePortal {
    /// Resolve the portal from properties. Newer `db.*` keys are preferred;
    /// the legacy `dataSource.*` keys written by old installers still work.
    pub fn from_properties(props: &PropertyFile) -> Result<Self> {
        let url = props
            .get("db.url")
            .or_else(|| props.get("dataSource.jdbcUrl"))
            .ok_or_else(|| {
                Error::Config(format!(
                    "cannot find database URL in {}; please set db.url",
                    props.path().display()
                ))
            })?;

        let user = props
            .get("db.user")
            .or_else(|| props.get("dataSource.user"))
            .ok_or_else(|| {
                Error::Config(format!(
                    "cannot find database user in {}; please set db.user",
                    props.path().display()
                ))
            })?
            .to_string();

        // Password may legitimately be empty; only a fully absent key errors.
        let password = props
            .get("db.password")
            .or_else(|| props.get("dataSource.password"))
            .ok_or_else(|| {
                Error::Config(format!(
                    "cannot find database password in {}; please set db.password (empty value is allowed)",
                    props.path().display()
                ))
            })?;
        let password = if password.is_empty() {
            None
        } else {
            Some(password.to_string())
        };

        let (host, port) = parse_jdbc_host_port(url)?;

        Ok(Self {
            host,
            port,
            user,
            password,
        })
    }
}

/// Extract `(host, port)` from a JDBC-style URL such as
/// `jdbc:mysql://192.168.0.10:3306/stack`. The port defaults to 3306 when
/// omitted.
pub fn parse_jdbc_host_port(url: &str) -> Result<(String, u16)> {
    let rest = url
        .strip_prefix("jdbc:")
        .unwrap_or(url)
        .split("://")
        .nth(1)
        .ok_or_else(|| Error::Config(format!("cannot parse database URL '{}'", url)))?;

    let authority = rest.split('/').next().unwrap_or(rest);
    if authority.is_empty() {
        return Err(Error::Config(format!(
            "database URL '{}' has no host",
            url
        )));
    }

    match authority.split_once(':') {
        Some((host, port)) => {
            let port = port.parse::<u16>().map_err(|_| {
                Error::Config(format!("database URL '{}' has an invalid port", url))
            })?;
            Ok((host.to_string(), port))
        }
        None => Ok((authority.to_string(), 3306)),
    }
}

/// Broker endpoints from the indexed `broker.host.N` keys.
///
/// Returns `(key, host)` pairs so connectivity errors can name the exact
/// property that pointed at the unreachable host.
pub fn broker_hosts(props: &PropertyFile) -> Result<Vec<(String, String)>> {
    let hosts = props.get_prefix("broker.host.");
    if hosts.is_empty() {
        return Err(Error::Config(format!(
            "no broker hosts defined in {}; please set broker.host.0=the_ip",
            props.path().display()
        )));
    }
    Ok(hosts)
}

/// Port the message broker listens on.
pub const BROKER_PORT: u16 = 5672;

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn props_with(contents: &str) -> (tempfile::TempDir, PropertyFile) {
        let dir = tempfile::tempdir().unwrap();
        let path: PathBuf = dir.path().join("management.properties");
        fs::write(&path, contents).unwrap();
        let props = PropertyFile::load(&path).unwrap();
        (dir, props)
    }

    #[test]
    fn parses_host_and_port_from_jdbc_url() {
        assert_eq!(
            parse_jdbc_host_port("jdbc:mysql://192.168.0.10:3306").unwrap(),
            ("192.168.0.10".to_string(), 3306)
        );
        assert_eq!(
            parse_jdbc_host_port("jdbc:mysql://db.internal:3307/stack").unwrap(),
            ("db.internal".to_string(), 3307)
        );
    }

    #[test]
    fn port_defaults_to_3306() {
        assert_eq!(
            parse_jdbc_host_port("jdbc:mysql://localhost").unwrap(),
            ("localhost".to_string(), 3306)
        );
    }

    #[test]
    fn rejects_unparseable_urls() {
        assert!(parse_jdbc_host_port("not-a-url").is_err());
        assert!(parse_jdbc_host_port("jdbc:mysql://host:notaport").is_err());
    }

    #[test]
    fn portal_prefers_new_keys_over_legacy() {
        let (_dir, props) = props_with(
            "db.url=jdbc:mysql://primary:3306\n\
             dataSource.jdbcUrl=jdbc:mysql://legacy:3306\n\
             db.user=stack\n\
             dataSource.user=old\n\
             db.password=\n",
        );
        let portal = DatabasePortal::from_properties(&props).unwrap();
        assert_eq!(portal.host, "primary");
        assert_eq!(portal.user, "stack");
        assert_eq!(portal.password, None);
    }

    #[test]
    fn portal_falls_back_to_legacy_keys() {
        let (_dir, props) = props_with(
            "dataSource.jdbcUrl=jdbc:mysql://legacy:3307\n\
             dataSource.user=old\n\
             dataSource.password=pw\n",
        );
        let portal = DatabasePortal::from_properties(&props).unwrap();
        assert_eq!(portal.host, "legacy");
        assert_eq!(portal.port, 3307);
        assert_eq!(portal.user, "old");
        assert_eq!(portal.password.as_deref(), Some("pw"));
    }

    #[test]
    fn portal_requires_url_and_user() {
        let (_dir, props) = props_with("db.user=stack\ndb.password=\n");
        assert!(DatabasePortal::from_properties(&props).is_err());

        let (_dir2, props2) = props_with("db.url=jdbc:mysql://h:3306\ndb.password=\n");
        assert!(DatabasePortal::from_properties(&props2).is_err());
    }

    #[test]
    fn broker_hosts_requires_at_least_one_entry() {
        let (_dir, props) = props_with("broker.host.0=10.0.0.1\nbroker.host.1=10.0.0.2\n");
        let hosts = broker_hosts(&props).unwrap();
        assert_eq!(hosts.len(), 2);
        assert_eq!(hosts[0].1, "10.0.0.1");

        let (_dir2, empty) = props_with("");
        assert!(broker_hosts(&empty).is_err());
    }
}
