use colored::*;

use crate::response::{CalibrationProgress, CalibrationStatus};
use crate::sanitize;

/// Environment variable that enables machine-readable JSON logs when set to "1" or "true".
const MACHINE_LOG_ENV: &str = "ARMCAL_MACHINE_LOG";

pub fn init_logging() {
    // Internal logs are opt-in via RUST_LOG; operator output below is separate.
    let mut builder = env_logger::Builder::from_default_env();
    if std::env::var("RUST_LOG").is_err() {
        builder.filter_level(log::LevelFilter::Warn);
    }
    let _ = builder.try_init();
}

fn machine_log_enabled() -> bool {
    matches!(
        std::env::var(MACHINE_LOG_ENV)
            .ok()
            .as_deref()
            .map(str::to_ascii_lowercase)
            .as_deref(),
        Some("1") | Some("true")
    )
}

fn emit_machine_event(kind: &str, data: serde_json::Value) {
    if !machine_log_enabled() {
        return;
    }

    let event = serde_json::json!({
        "kind": kind,
        "data": data,
    });

    if let Ok(line) = serde_json::to_string(&event) {
        eprintln!("{line}");
    }
}

pub fn header(base_url: &str, robot_id: u32, mode: &str, force: bool) {
    let url = sanitize::sanitize_preview_for_console(base_url);
    let force_note = if force { " | force" } else { "" };

    println!(
        "{} {} | {} | {}{}",
        ">>".bold(),
        "armcal".bold(),
        format!("{url} robot {robot_id}").cyan(),
        mode.dimmed(),
        force_note.yellow()
    );
    emit_machine_event(
        "header",
        serde_json::json!({
            "base_url": base_url,
            "robot_id": robot_id,
            "mode": mode,
            "force": force,
        }),
    );
}

pub fn step(label: &str) {
    println!("\n{} {}", "⚙".yellow().bold(), label.bold());
    emit_machine_event("step", serde_json::json!({ "step": label }));
}

pub fn step_ok(detail: &str) {
    let safe = sanitize::sanitize_preview_for_console(detail);
    if safe.is_empty() {
        println!("  {} {}", "└─".green(), "OK".green());
    } else {
        println!("  {} {} {}", "└─".green(), "OK".green(), safe.dimmed());
    }
    emit_machine_event("step_ok", serde_json::json!({ "detail": detail }));
}

pub fn step_warn(detail: &str) {
    let safe = sanitize::sanitize_preview_for_console(detail);
    println!("  {} {}", "└─".yellow(), safe.yellow());
    emit_machine_event("step_warn", serde_json::json!({ "detail": detail }));
}

pub fn step_err(err_msg: &str) {
    let safe = sanitize::sanitize_preview_for_console(err_msg);
    println!("  {} {}", "└─".red(), safe.red());
    emit_machine_event("step_err", serde_json::json!({ "error": err_msg }));
}

pub fn calibration_progress(progress: &CalibrationProgress) {
    let status = match progress.status {
        CalibrationStatus::InProgress => progress.status.to_string().cyan(),
        CalibrationStatus::Success => progress.status.to_string().green(),
        _ => progress.status.to_string().red(),
    };
    let message = sanitize::sanitize_preview_for_console(&progress.message);
    println!(
        "  {} step {}/{} {} {}",
        "●".blue(),
        progress.current_step,
        progress.total_steps,
        status,
        message.dimmed()
    );
    emit_machine_event(
        "calibration_progress",
        serde_json::json!({
            "status": progress.status.as_str(),
            "current_step": progress.current_step,
            "total_steps": progress.total_steps,
            "message": progress.message,
        }),
    );
}

pub fn dry_run_request(line: &str) {
    let safe = sanitize::sanitize_preview_for_console(line);
    println!("  {} {}", "[dry-run]".magenta(), safe.dimmed());
    emit_machine_event("dry_run_request", serde_json::json!({ "request": line }));
}

pub fn kv_preview(key: &str, value_preview: &str) {
    let k = sanitize::sanitize_preview_for_console(key);
    let v = sanitize::sanitize_preview_for_console(value_preview);
    println!("  {} {}", k.cyan(), v.dimmed());
}

pub fn outcome_success(summary: &str) {
    println!("\n{} {}", "✓".green().bold(), summary.green().bold());
    emit_machine_event("outcome", serde_json::json!({ "ok": true, "summary": summary }));
}

pub fn outcome_failure(err_msg: &str, exit_code: u8) {
    let safe = sanitize::sanitize_preview_for_console(err_msg);
    eprintln!(
        "\n{} {} {}",
        "✗".red().bold(),
        "Calibration failed:".red().bold(),
        safe.red()
    );
    emit_machine_event(
        "outcome",
        serde_json::json!({ "ok": false, "error": err_msg, "exit_code": exit_code }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn machine_log_toggles_with_env() {
        // SAFETY: the only test in this crate that touches this variable.
        unsafe {
            std::env::remove_var(MACHINE_LOG_ENV);
        }
        assert!(!machine_log_enabled());

        for v in &["1", "true", "True", "TRUE"] {
            // SAFETY: see above.
            unsafe {
                std::env::set_var(MACHINE_LOG_ENV, v);
            }
            assert!(machine_log_enabled(), "value {v} should enable machine log");
        }

        // SAFETY: see above.
        unsafe {
            std::env::remove_var(MACHINE_LOG_ENV);
        }
    }
}
