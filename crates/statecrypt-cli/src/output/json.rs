//! JSON output for `--json`.

use serde::Serialize;

/// Wrap a report with the command that produced it.
#[derive(Debug, Serialize)]
pub struct Envelope<'a, T: Serialize> {
    pub command: &'a str,
    pub ok: bool,
    #[serde(flatten)]
    pub report: &'a T,
}

pub fn to_json<T: Serialize>(command: &str, ok: bool, report: &T) -> anyhow::Result<String> {
    let envelope = Envelope {
        command,
        ok,
        report,
    };
    Ok(serde_json::to_string_pretty(&envelope)?)
}

pub fn print_json<T: Serialize>(command: &str, ok: bool, report: &T) -> anyhow::Result<()> {
    println!("{}", to_json(command, ok, report)?);
    Ok(())
}
