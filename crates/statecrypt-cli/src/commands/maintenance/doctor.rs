use serde::Serialize;
use statecrypt_core::KeyMode;

use crate::app::AppContext;
use crate::commands::print_header;
use crate::output::print_json;
use crate::ui::{badge, print, Badge, UiContext};

#[derive(Debug, Serialize)]
struct Finding {
    name: &'static str,
    ok: bool,
    detail: String,
}

impl Finding {
    fn pass(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            ok: true,
            detail: detail.into(),
        }
    }

    fn fail(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            ok: false,
            detail: detail.into(),
        }
    }
}

#[derive(Serialize)]
struct DoctorReport<'a> {
    checks: &'a [Finding],
}

pub fn handle_doctor(app: &AppContext) -> anyhow::Result<()> {
    let ui = app.ui();
    let findings = diagnose(app)?;
    let problems = findings.iter().filter(|f| !f.ok).count();

    if ui.mode.is_json() {
        print_json(
            "doctor",
            problems == 0,
            &DoctorReport {
                checks: &findings,
            },
        )?;
    } else {
        print_header(ui, "doctor", None);
        for finding in &findings {
            print(ui, &finding_line(ui, finding));
        }
    }

    if problems > 0 {
        return Err(anyhow::anyhow!("Doctor found {} problem(s)", problems));
    }
    Ok(())
}

fn diagnose(app: &AppContext) -> anyhow::Result<Vec<Finding>> {
    let mut findings = Vec::new();

    let config_path = app.config_path()?;
    let source = if config_path.exists() {
        format!("{}", config_path.display())
    } else {
        format!("{} (not found, using defaults)", config_path.display())
    };
    match app.settings() {
        Ok(_) => findings.push(Finding::pass("config", source)),
        Err(err) => {
            // Nothing else can be checked without settings.
            findings.push(Finding::fail("config", format!("{:#}", err)));
            return Ok(findings);
        }
    }
    let settings = app.settings()?;

    let root_ok = match settings.existing_root() {
        Ok(root) => {
            findings.push(Finding::pass("root", root.display().to_string()));
            true
        }
        Err(err) => {
            findings.push(Finding::fail("root", err.to_string()));
            false
        }
    };

    let backend = app.backend()?;
    let backend_ok = match backend.probe() {
        Ok(version) => {
            findings.push(Finding::pass("backend", format!("{} ({})", backend.name(), version)));
            true
        }
        Err(err) => {
            findings.push(Finding::fail("backend", err.to_string()));
            false
        }
    };

    let keys = match app.keys() {
        Ok(keys) => keys,
        Err(err) => {
            findings.push(Finding::fail("passphrase", format!("{:#}", err)));
            return Ok(findings);
        }
    };
    match keys.passphrase() {
        Ok(_) => findings.push(Finding::pass(
            "passphrase",
            keys.passphrase_path().display().to_string(),
        )),
        Err(err) => findings.push(Finding::fail("passphrase", err.to_string())),
    }

    if settings.mode == KeyMode::Asymmetric && backend_ok {
        match backend.has_key(keys.key_id()) {
            Ok(true) => findings.push(Finding::pass("keypair", keys.key_id())),
            Ok(false) => findings.push(Finding::fail(
                "keypair",
                format!("no private key '{}'; run setup or import-key", keys.key_id()),
            )),
            Err(err) => findings.push(Finding::fail("keypair", err.to_string())),
        }
    }

    if root_ok {
        let orchestrator = app.orchestrator()?;
        match orchestrator.check() {
            Ok(report) if report.is_ok() => findings.push(Finding::pass(
                "artifacts",
                format!("{} covered", report.covered.len()),
            )),
            Ok(report) => findings.push(Finding::fail(
                "artifacts",
                format!("{} without encrypted twin", report.missing.len()),
            )),
            Err(err) => findings.push(Finding::fail("artifacts", err.to_string())),
        }
    }

    Ok(findings)
}

fn finding_line(ui: &UiContext, finding: &Finding) -> String {
    if ui.mode.is_pretty() {
        let kind = if finding.ok { Badge::Ok } else { Badge::Err };
        badge(ui, kind, &format!("{}: {}", finding.name, finding.detail))
    } else {
        format!(
            "check={} ok={} detail=\"{}\"",
            finding.name, finding.ok, finding.detail
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::OutputMode;

    #[test]
    fn test_plain_finding_line() {
        let ui = UiContext {
            is_tty: false,
            color: false,
            unicode: false,
            width: 80,
            mode: OutputMode::Plain,
            quiet: false,
            interactive: false,
        };
        let line = finding_line(&ui, &Finding::fail("backend", "Required binary not found: gpg"));
        assert_eq!(
            line,
            "check=backend ok=false detail=\"Required binary not found: gpg\""
        );
    }
}
