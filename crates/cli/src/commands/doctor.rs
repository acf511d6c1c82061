use std::time::Duration;

use boshu_chat::policy::ReactionPolicy;
use boshu_core::config::{AppConfig, LoadOptions};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const DEPENDENT_CHECKS: [&str; 3] = ["display_timezone", "reaction_policy", "schedule_endpoint"];

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_timezone(&config));
            checks.push(check_reaction_policy(&config));
            checks.push(check_schedule_endpoint(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.extend(DEPENDENT_CHECKS.into_iter().map(|name| DoctorCheck {
                name,
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            }));
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_timezone(config: &AppConfig) -> DoctorCheck {
    match config.timezone() {
        Ok(timezone) => DoctorCheck {
            name: "display_timezone",
            status: CheckStatus::Pass,
            details: format!("start times render in `{timezone}`"),
        },
        Err(error) => DoctorCheck {
            name: "display_timezone",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn check_reaction_policy(config: &AppConfig) -> DoctorCheck {
    let policy = ReactionPolicy::from_config(&config.reactions);
    DoctorCheck {
        name: "reaction_policy",
        status: CheckStatus::Pass,
        details: format!(
            "posts seed {} with leave mode {:?}",
            policy.affordances().join(" "),
            policy.leave_mode()
        ),
    }
}

fn check_schedule_endpoint(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "schedule_endpoint",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let url = config.schedule.url.clone();
    let timeout = Duration::from_secs(config.schedule.timeout_secs);
    let result = runtime.block_on(async move {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| format!("failed to build http client: {error}"))?;
        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|error| format!("schedule endpoint unreachable: {error}"))?;
        if !response.status().is_success() {
            return Err(format!("schedule endpoint returned {}", response.status()));
        }
        Ok::<(), String>(())
    });

    match result {
        Ok(()) => DoctorCheck {
            name: "schedule_endpoint",
            status: CheckStatus::Pass,
            details: format!("reached `{}`", config.schedule.url),
        },
        Err(error) => {
            DoctorCheck { name: "schedule_endpoint", status: CheckStatus::Fail, details: error }
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
