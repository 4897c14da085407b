//! Report rendering for the table and JSON output formats.

use anyhow::Result;
use console::style;

use shipyard_core::convergence::ConvergenceOutcome;
use shipyard_core::health::HealthStatus;
use shipyard_core::prelude::*;
use shipyard_core::types::RolloutOutcome;

use crate::OutputFormat;

pub fn print_pipeline(
    report: &PipelineReport,
    outcome: &Outcome,
    scheme: &str,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Table => {
            let target = &report.target;
            println!(
                "{} {} ({}, stack {})",
                style("Target").bold(),
                style(&target.environment).cyan(),
                target.region,
                target.stack_name
            );

            for built in &report.built {
                println!("✓ Published {} image {}", built.component, built.image);
            }

            if let Some(convergence) = &report.convergence {
                let stack = &convergence.stack;
                match convergence.outcome {
                    ConvergenceOutcome::Created => println!(
                        "✓ Created stack '{}' ({}, {} polls)",
                        stack.stack_name(),
                        stack.state(),
                        convergence.polls
                    ),
                    ConvergenceOutcome::Updated => println!(
                        "✓ Updated stack '{}' ({}, {} polls)",
                        stack.stack_name(),
                        stack.state(),
                        convergence.polls
                    ),
                    ConvergenceOutcome::NoChanges => {
                        println!("• Stack '{}' is already up to date", stack.stack_name())
                    }
                }
                println!("  Cluster:     {}", stack.outputs().cluster);
                println!("  Entry point: {}", stack.outputs().entry_point);
            }

            if let Some(rollout) = &report.rollout {
                for record in &rollout.records {
                    let descriptor = &record.descriptor;
                    match &record.outcome {
                        RolloutOutcome::Accepted { deployment_id } => println!(
                            "✓ Rolling update started for {} ({}){}",
                            descriptor.component,
                            descriptor.service,
                            deployment_id
                                .as_deref()
                                .map(|id| format!(" [{}]", id))
                                .unwrap_or_default()
                        ),
                        RolloutOutcome::Rejected { reason } => println!(
                            "✗ Rolling update rejected for {} ({}): {}",
                            descriptor.component, descriptor.service, reason
                        ),
                    }
                }
            }

            if let Some(health) = &report.health {
                for check in &health.checks {
                    match check.status {
                        HealthStatus::Healthy => println!("✓ {} is healthy", check.url),
                        HealthStatus::Unhealthy => {}
                    }
                }
            }

            if let Outcome::Warning { warnings } = outcome {
                for warning in warnings {
                    println!("  {} {}", style("⚠").yellow(), warning);
                }
            }

            if let Some(url) = report.application_url(scheme) {
                println!("{} {}", style("Application").bold(), style(url).green());
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "result": outcome,
                "report": report,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

pub fn print_info(report: &InfoReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            let target = &report.target;
            println!("{}", style("Deployment target").bold());
            println!("  Environment: {}", style(&target.environment).cyan());
            println!("  Region:      {}", target.region);
            println!("  Stack:       {}", target.stack_name);
            println!("  State:       {} ({})", report.stack_state, report.stack_status);

            if !report.images.is_empty() {
                println!("{}", style("Images").bold());
                for (component, image) in &report.images {
                    println!("  {:<9} {}", component.as_str(), image);
                }
            }

            if !report.outputs.is_empty() {
                println!("{}", style("Outputs").bold());
                for (key, value) in &report.outputs {
                    println!("  {:<20} {}", key, value);
                }
            }

            if let Some(url) = &report.application_url {
                println!("{} {}", style("Application").bold(), style(url).green());
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
    }
    Ok(())
}

/// Print a classified failure and return the process exit code.
pub fn print_error(err: &anyhow::Error, format: OutputFormat) -> i32 {
    let outcome = match err.downcast_ref::<DeployError>() {
        Some(deploy) => Outcome::from(deploy),
        None => Outcome::Failure {
            class: "internal".to_string(),
            message: format!("{:#}", err),
            exit_code: 1,
        },
    };

    if let Outcome::Failure {
        class,
        message,
        exit_code,
    } = &outcome
    {
        eprintln!(
            "{} {}",
            style(format!("error[{}]:", class)).red().bold(),
            message
        );
        if let OutputFormat::Json = format {
            if let Ok(json) = serde_json::to_string_pretty(&serde_json::json!({ "result": outcome })) {
                println!("{}", json);
            }
        }
        return *exit_code;
    }
    1
}
