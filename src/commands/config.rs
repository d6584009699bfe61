use crate::config::{parse_assignment, PropertyFile};
use crate::context::CtlContext;
use crate::error::Error;
use crate::output::UserOutput;
use crate::privilege::ServiceAccount;
use shell_escape::escape;
use std::path::PathBuf;

/// Copy the property file out to a safe place (used by the upgrade flows
/// and by operators before manual experiments).
pub async fn run_save_config(
    ctx: &CtlContext,
    save_to: Option<PathBuf>,
    output: &dyn UserOutput,
) -> anyhow::Result<()> {
    let dir = save_to.unwrap_or_else(|| ctx.data_dir().join("saved-config"));
    std::fs::create_dir_all(&dir)?;

    let file_name = ctx
        .properties_path()
        .file_name()
        .ok_or_else(|| Error::Config("property file has no file name".to_string()))?;
    let dest = dir.join(file_name);
    std::fs::copy(ctx.properties_path(), &dest)?;

    output.success(&format!(
        "successfully saved {} to {}",
        ctx.properties_path().display(),
        dest.display()
    ));
    Ok(())
}

/// Copy a saved property file back into place.
pub async fn run_restore_config(
    ctx: &CtlContext,
    restore_from: Option<PathBuf>,
    output: &dyn UserOutput,
) -> anyhow::Result<()> {
    let source = restore_from.unwrap_or_else(|| ctx.data_dir().join("saved-config"));

    let file_name = ctx
        .properties_path()
        .file_name()
        .ok_or_else(|| Error::Config("property file has no file name".to_string()))?;
    let source_file = if source.is_dir() {
        source.join(file_name)
    } else {
        source
    };
    if !source_file.is_file() {
        return Err(Error::Config(format!(
            "cannot find a saved property file at {}",
            source_file.display()
        ))
        .into());
    }

    std::fs::copy(&source_file, ctx.properties_path())?;
    output.success(&format!(
        "successfully restored {} to {}",
        source_file.display(),
        ctx.properties_path().display()
    ));
    Ok(())
}

/// Apply `key=value` assignments to the property file. The rewrite runs
/// under the service account's identity so the file stays owned by it.
pub async fn run_configure(
    ctx: &CtlContext,
    host: Option<String>,
    assignments: Vec<String>,
    output: &dyn UserOutput,
) -> anyhow::Result<()> {
    if assignments.is_empty() {
        return Err(Error::Config(
            "please give properties in the form key=value, separated by spaces".to_string(),
        )
        .into());
    }

    if let Some(host) = host {
        let args: Vec<String> = assignments
            .iter()
            .map(|a| escape(a.as_str().into()).into_owned())
            .collect();
        return super::reinvoke_remote(
            &host,
            &format!("configure {}", args.join(" ")),
            ctx.verbose(),
        )
        .await;
    }

    let pairs = assignments
        .iter()
        .map(|a| parse_assignment(a))
        .collect::<crate::error::Result<Vec<_>>>()?;

    let mut props = PropertyFile::load(ctx.properties_path())?;
    props.set_many(&pairs);

    let account = ServiceAccount::lookup(ctx.service_account())?;
    {
        let _identity = account.assume()?;
        props.save()?;
    }

    output.success(&format!(
        "successfully wrote {} propert{} to {}",
        pairs.len(),
        if pairs.len() == 1 { "y" } else { "ies" },
        ctx.properties_path().display()
    ));
    Ok(())
}
