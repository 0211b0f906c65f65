//! Wire templates for deploy and execution status messages.
//!
//! The chat relay recognises these messages with the regular expressions
//! below, so wording and field order are a contract: a change here must be
//! mirrored in the pattern, and in every relay that parses it.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::event::{DeployStatusChange, ExecutionStatusChange};

/// Pattern matching [`deploy_message`] output.
pub const DEPLOY_MESSAGE_PATTERN: &str = concat!(
    r"^Build notification from the AWS Amplify Console for app: ",
    r"https://(?P<branch>\S+?)\.(?P<app_id>[^.\s]+)\.amplifyapp\.com/\.\n",
    r"Your build status is (?P<job_status>[A-Z_]+)\.\n",
    r"Go to https://(?P<region>[a-z0-9-]+)\.console\.aws\.amazon\.com/amplify/home\?region=[a-z0-9-]+",
    r"#[^/\s]+/\S+/(?P<job_id>[^/\s]+)\n",
    r"to view details on your build\.$",
);

/// Pattern matching [`execution_message`] output.
pub const EXECUTION_MESSAGE_PATTERN: &str = concat!(
    r"^Task status notification from the AWS StepFunction for execution name: (?P<name>.+)\.\n",
    r"The task status is (?P<status>[A-Z_]+)\.\n",
    r"Go to https://(?P<region>[a-z0-9-]+)\.console\.aws\.amazon\.com/states/home\?region=[a-z0-9-]+",
    r"#/executions/details/(?P<execution_arn>\S+)\n",
    r"to view details on the execution\.$",
);

static DEPLOY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(DEPLOY_MESSAGE_PATTERN).expect("deploy pattern is valid"));

static EXECUTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(EXECUTION_MESSAGE_PATTERN).expect("execution pattern is valid"));

/// Render the build-deploy notification.
pub fn deploy_message(change: &DeployStatusChange) -> String {
    let DeployStatusChange { app_id, branch_name, job_status, job_id, region } = change;
    format!(
        "Build notification from the AWS Amplify Console for app: https://{branch_name}.{app_id}.amplifyapp.com/.\n\
         Your build status is {job_status}.\n\
         Go to https://{region}.console.aws.amazon.com/amplify/home?region={region}#{app_id}/{branch_name}/{job_id}\n\
         to view details on your build."
    )
}

/// Render the workflow-run notification.
pub fn execution_message(change: &ExecutionStatusChange) -> String {
    let ExecutionStatusChange { name, status, execution_arn, region } = change;
    format!(
        "Task status notification from the AWS StepFunction for execution name: {name}.\n\
         The task status is {status}.\n\
         Go to https://{region}.console.aws.amazon.com/states/home?region={region}#/executions/details/{execution_arn}\n\
         to view details on the execution."
    )
}

/// Recover the fields of a deploy notification, as the relay does.
pub fn parse_deploy_message(message: &str) -> Option<DeployStatusChange> {
    let caps = DEPLOY_RE.captures(message)?;
    Some(DeployStatusChange {
        app_id: caps["app_id"].to_string(),
        branch_name: caps["branch"].to_string(),
        job_status: caps["job_status"].to_string(),
        job_id: caps["job_id"].to_string(),
        region: caps["region"].to_string(),
    })
}

/// Recover the fields of an execution notification, as the relay does.
pub fn parse_execution_message(message: &str) -> Option<ExecutionStatusChange> {
    let caps = EXECUTION_RE.captures(message)?;
    Some(ExecutionStatusChange {
        name: caps["name"].to_string(),
        status: caps["status"].parse().ok()?,
        execution_arn: caps["execution_arn"].to_string(),
        region: caps["region"].to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ExecutionStatus;

    fn failed_main_deploy() -> DeployStatusChange {
        DeployStatusChange {
            app_id: "d1234".into(),
            branch_name: "main".into(),
            job_status: "FAILED".into(),
            job_id: "0000000007".into(),
            region: "ap-northeast-1".into(),
        }
    }

    #[test]
    fn deploy_message_matches_documented_template() {
        let message = deploy_message(&failed_main_deploy());
        assert_eq!(
            message,
            "Build notification from the AWS Amplify Console for app: https://main.d1234.amplifyapp.com/.\n\
             Your build status is FAILED.\n\
             Go to https://ap-northeast-1.console.aws.amazon.com/amplify/home?region=ap-northeast-1#d1234/main/0000000007\n\
             to view details on your build."
        );
    }

    #[test]
    fn deploy_message_is_parseable_by_relay_pattern() {
        let message = deploy_message(&failed_main_deploy());
        let parsed = parse_deploy_message(&message).expect("relay pattern should match");
        assert_eq!(parsed.app_id, "d1234");
        assert_eq!(parsed.branch_name, "main");
        assert_eq!(parsed.job_status, "FAILED");
        assert_eq!(parsed, failed_main_deploy());
    }

    #[test]
    fn deploy_pattern_handles_branch_with_slashes_and_dots() {
        let change = DeployStatusChange {
            branch_name: "feature/v1.2_fix".into(),
            ..failed_main_deploy()
        };
        let parsed = parse_deploy_message(&deploy_message(&change)).unwrap();
        assert_eq!(parsed.branch_name, "feature/v1.2_fix");
        assert_eq!(parsed.app_id, "d1234");
        assert_eq!(parsed.job_id, "0000000007");
    }

    #[test]
    fn execution_message_is_parseable_by_relay_pattern() {
        let change = ExecutionStatusChange {
            name: "3f1c2b9e-run".into(),
            status: ExecutionStatus::TimedOut,
            execution_arn: "arn:aws:states:ap-northeast-1:000000000000:execution:syllabus-scraper:3f1c2b9e-run".into(),
            region: "ap-northeast-1".into(),
        };
        let message = execution_message(&change);
        assert!(message.starts_with(
            "Task status notification from the AWS StepFunction for execution name: 3f1c2b9e-run.\n\
             The task status is TIMED_OUT.\n"
        ));
        assert_eq!(parse_execution_message(&message), Some(change));
    }

    #[test]
    fn reordered_fields_do_not_parse() {
        let tampered = "Your build status is FAILED.\n\
                        Build notification from the AWS Amplify Console for app: https://main.d1234.amplifyapp.com/.";
        assert!(parse_deploy_message(tampered).is_none());
        assert!(parse_execution_message("[INFO] Syllabus pipeline: Started scraping the syllabus.").is_none());
    }
}
