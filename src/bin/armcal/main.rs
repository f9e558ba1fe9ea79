use anyhow::Result;
use std::process::ExitCode;

use armcal::{
    CalibrationError, CalibrationOrchestrator, CancelSignal, DiagnosticsDir, RunConfig,
    WorkflowReport, create_robot, ui,
};

mod args;
use args::{CliArgs, USAGE};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    ui::init_logging();

    let cli = CliArgs::parse()?;
    if cli.help {
        print!("{USAGE}");
        return Ok(ExitCode::SUCCESS);
    }

    match run(cli).await {
        Ok(report) => {
            ui::outcome_success(&summary(&report));
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            ui::outcome_failure(&err.to_string(), err.exit_code());
            Ok(ExitCode::from(err.exit_code()))
        }
    }
}

async fn run(cli: CliArgs) -> Result<WorkflowReport, CalibrationError> {
    let config = RunConfig::resolve(cli.overrides)?;
    let robot = create_robot(&config)?;
    let diagnostics = DiagnosticsDir::new(&config.diagnostics_dir);

    ui::header(
        &config.base_url(),
        config.robot_id,
        config.mode.as_str(),
        config.force,
    );

    CalibrationOrchestrator::new(robot.as_ref(), &config, &diagnostics)
        .with_cancel(CancelSignal::ctrl_c())
        .run()
        .await
}

fn summary(report: &WorkflowReport) -> String {
    let mut text = format!(
        "Calibration complete: step {}/{} after {} poll(s)",
        report.calibration.current_step, report.calibration.total_steps, report.polls
    );
    if report.overridden_polls > 0 || report.joints_overridden {
        text.push_str(" (invalid responses overridden by --force)");
    }
    text
}
