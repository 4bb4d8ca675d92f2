//! Flat `KEY=VALUE` output artifact for downstream deployment tooling
//!
//! ```text
//! STATUS=completed
//! RUN_SEED=1718000000000
//! RESOURCE_GROUP=microservices-rg-1718000000000
//! SQL_SERVER=sqlserver-1718000000000
//! ...
//! ```
//!
//! Attributes exported by their step are written under the declared key;
//! every other attribute is written as `<STEP_ID>_<ATTRIBUTE>`.

use crate::context::RunContext;
use crate::error::{ProvisionError, Result};
use crate::resource::ResourceRecord;
use std::collections::HashSet;
use std::io::Write;
use std::path::Path;
use tokio::fs;

pub const STATUS_KEY: &str = "STATUS";
pub const RUN_SEED_KEY: &str = "RUN_SEED";

/// Convert an identifier such as `user-service.url` to `USER_SERVICE_URL`
pub fn upper_snake(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_uppercase());
        } else if !out.is_empty() && !out.ends_with('_') {
            out.push('_');
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

/// Artifact key for `attribute` of `record`
pub fn output_key(record: &ResourceRecord, attribute: &str) -> String {
    match record.exports().get(attribute) {
        Some(key) => key.clone(),
        None => upper_snake(&format!("{}_{}", record.step_id(), attribute)),
    }
}

/// All `(key, value)` pairs of the artifact, in output order
///
/// Fails when two entries share a key or a value contains a line break;
/// either would make the file ambiguous to read back.
pub fn entries(ctx: &RunContext) -> Result<Vec<(String, String)>> {
    let mut entries = vec![
        (STATUS_KEY.to_string(), ctx.status().to_string()),
        (RUN_SEED_KEY.to_string(), ctx.run_seed().to_string()),
    ];
    for record in ctx.records() {
        for (attribute, value) in record.attributes() {
            entries.push((output_key(record, attribute), value.clone()));
        }
    }

    let mut seen = HashSet::new();
    for (key, value) in &entries {
        if !seen.insert(key.as_str()) {
            return Err(ProvisionError::Output(format!("key {} is written twice", key)));
        }
        if value.contains(['\n', '\r']) {
            return Err(ProvisionError::Output(format!(
                "value of {} contains a line break",
                key
            )));
        }
    }
    Ok(entries)
}

/// Serialize `ctx` to `dest`
///
/// Works for completed and aborted runs alike; an aborted run yields the
/// records that existed when it stopped. Nothing is written when the
/// context cannot be serialized.
pub fn write<W: Write>(ctx: &RunContext, dest: &mut W) -> Result<()> {
    for (key, value) in entries(ctx)? {
        writeln!(dest, "{}={}", key, value)?;
    }
    dest.flush()?;
    Ok(())
}

/// Render the artifact as a string
pub fn render(ctx: &RunContext) -> Result<String> {
    let mut buf = Vec::new();
    write(ctx, &mut buf)?;
    String::from_utf8(buf).map_err(|e| ProvisionError::Output(e.to_string()))
}

/// Write the artifact to `path`, replacing any previous file atomically
pub async fn write_to_path(ctx: &RunContext, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let content = render(ctx)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    let file_name = path
        .file_name()
        .ok_or_else(|| ProvisionError::Output(format!("{} is not a file path", path.display())))?;
    let tmp = path.with_file_name(format!(".{}.tmp", file_name.to_string_lossy()));

    fs::write(&tmp, content).await?;
    fs::rename(&tmp, path).await?;

    tracing::debug!("Wrote output artifact to {}", path.display());
    Ok(())
}

/// Parse an artifact back into ordered `(key, value)` pairs
pub fn parse(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RunStatus;
    use crate::naming::RunSeed;
    use crate::resource::{Attributes, ResourceType};
    use std::collections::BTreeMap;

    fn record(step_id: &str, attrs: &[(&str, &str)], exports: &[(&str, &str)]) -> ResourceRecord {
        let attributes: Attributes = attrs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let exports: BTreeMap<String, String> = exports
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ResourceRecord::new(step_id, ResourceType::AppInstance, "app-1", attributes, exports)
    }

    fn context() -> RunContext {
        let mut ctx = RunContext::with_seed(RunSeed::new(1234));
        ctx.start();
        ctx.push_record(record(
            "app-user",
            &[("name", "user-1234"), ("url", "https://user-1234.example")],
            &[("url", "USER_SERVICE_URL")],
        ));
        ctx
    }

    #[test]
    fn test_upper_snake() {
        assert_eq!(upper_snake("user-service.url"), "USER_SERVICE_URL");
        assert_eq!(upper_snake("--a--b--"), "A_B");
        assert_eq!(upper_snake("login_server"), "LOGIN_SERVER");
    }

    #[test]
    fn test_render_uses_exports_and_fallback_keys() {
        let mut ctx = context();
        ctx.finish(RunStatus::Completed);

        let text = render(&ctx).unwrap();
        assert_eq!(
            text,
            "STATUS=completed\n\
             RUN_SEED=1234\n\
             APP_USER_NAME=user-1234\n\
             USER_SERVICE_URL=https://user-1234.example\n"
        );
    }

    #[test]
    fn test_aborted_context_writes_partial_output() {
        let mut ctx = context();
        ctx.finish(RunStatus::Aborted);

        let pairs = parse(&render(&ctx).unwrap());
        assert_eq!(pairs[0], ("STATUS".to_string(), "aborted".to_string()));
        assert_eq!(pairs.len(), 4);
    }

    #[test]
    fn test_line_break_in_value_is_rejected() {
        let mut ctx = RunContext::with_seed(RunSeed::new(1));
        ctx.push_record(record("app", &[("note", "a\nb")], &[]));

        let err = render(&ctx).unwrap_err();
        assert!(matches!(err, ProvisionError::Output(_)));
    }

    #[test]
    fn test_invalid_context_writes_nothing() {
        let mut ctx = RunContext::with_seed(RunSeed::new(1));
        ctx.push_record(record("app", &[("a", "ok"), ("note", "a\nb")], &[]));

        let mut buf = Vec::new();
        assert!(write(&ctx, &mut buf).is_err());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_repeated_key_is_rejected() {
        // `rg.name` exported as SQL_ID meets the generated key of `sql.id`
        let mut ctx = RunContext::with_seed(RunSeed::new(1));
        ctx.push_record(record("rg", &[("name", "rg-1")], &[("name", "SQL_ID")]));
        ctx.push_record(record("sql", &[("id", "/mock/server/sql-1")], &[]));

        let err = entries(&ctx).unwrap_err();
        assert!(matches!(err, ProvisionError::Output(_)));
        assert!(err.to_string().contains("SQL_ID"));
    }

    #[test]
    fn test_values_keep_equals_signs() {
        let mut ctx = RunContext::with_seed(RunSeed::new(1));
        ctx.push_record(record(
            "bind",
            &[("connection_string", "Server=tcp:x;Database=y;")],
            &[("connection_string", "CONNECTION_STRING")],
        ));

        let pairs = parse(&render(&ctx).unwrap());
        assert!(pairs.contains(&(
            "CONNECTION_STRING".to_string(),
            "Server=tcp:x;Database=y;".to_string()
        )));
    }

    #[tokio::test]
    async fn test_write_to_path_creates_parent_dirs() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("out").join("deployment-output.txt");

        write_to_path(&context(), &path).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("STATUS=running\n"));
        assert!(!temp_dir.path().join("out").join(".deployment-output.txt.tmp").exists());
    }
}
