use reqwest::Method;
use tracing::{debug, info};

use super::{Conclusion, WorkflowRun, WorkflowRuns};
use crate::{
    error::{ApiError, BuildError},
    framework::{PollOutcome, PollSchedule, State, poll, unwrap},
    github::GitHubClient,
    progress::Progress,
    repository::ScratchRepository,
};

/// Fetches the most recent workflow run of a repository, if there is one yet.
///
/// # Errors
///
/// Returns an [`ApiError`] if the list cannot be fetched.
pub async fn latest_run(
    client: &GitHubClient,
    repository: &ScratchRepository,
) -> Result<Option<WorkflowRun>, ApiError> {
    let mut url = client.url([
        "repos",
        &repository.owner,
        &repository.name,
        "actions",
        "runs",
    ]);
    url.query_pairs_mut().append_pair("per_page", "1");

    let runs: WorkflowRuns = client.json(client.request(Method::GET, url)).await?;
    Ok(runs.workflow_runs.into_iter().next())
}

/// Fetches a workflow run by id.
///
/// # Errors
///
/// Returns an [`ApiError`] if the run cannot be fetched.
pub async fn fetch_run(
    client: &GitHubClient,
    repository: &ScratchRepository,
    run_id: u64,
) -> Result<WorkflowRun, ApiError> {
    let run_id = run_id.to_string();
    let url = client.url([
        "repos",
        &repository.owner,
        &repository.name,
        "actions",
        "runs",
        &run_id,
    ]);
    client.json(client.request(Method::GET, url)).await
}

/// Polls the most recent workflow run of the scratch repository until it concludes.
///
/// Fetch failures and a missing run count as pending and use up one attempt each.
///
/// # Errors
///
/// Returns [`BuildError::WorkflowFailed`] as soon as the run concludes with anything but success, or
/// [`BuildError::WorkflowTimeout`] once every attempt is used up.
pub async fn wait_for_run(
    client: &GitHubClient,
    repository: &ScratchRepository,
    schedule: &PollSchedule,
    progress: &Progress,
) -> Result<WorkflowRun, BuildError> {
    info!(
        "waiting for the workflow run of {repository} (at most {} attempts)…",
        schedule.max_attempts
    );

    let outcome = poll(schedule, |attempt| {
        check_latest_run(client, repository, progress, attempt)
    })
    .await;

    match outcome {
        PollOutcome::Success { value, attempts } => {
            info!("{value} succeeded after {attempts} attempts");
            Ok(value)
        }
        PollOutcome::Failure { reason, .. } => Err(BuildError::WorkflowFailed { conclusion: reason }),
        PollOutcome::Exhausted { attempts } => Err(BuildError::WorkflowTimeout { attempts }),
    }
}

async fn check_latest_run(
    client: &GitHubClient,
    repository: &ScratchRepository,
    progress: &Progress,
    attempt: u32,
) -> State<WorkflowRun, Conclusion> {
    let latest = unwrap!(State::retry_on_err(latest_run(client, repository).await));
    let Some(latest) = latest else {
        debug!("no workflow run visible in {repository} yet (attempt {attempt})");
        return State::Retry;
    };
    let run = unwrap!(State::retry_on_err(fetch_run(client, repository, latest.id).await));

    let status = run
        .status
        .map_or_else(|| String::from("unknown"), |status| status.to_string());
    match run.conclusion {
        None => {
            progress.report(&format!("workflow {run}: {status}, pending"));
            State::Retry
        }
        Some(Conclusion::Success) => {
            progress.report(&format!("workflow {run}: {status}, success"));
            State::Success(run)
        }
        Some(conclusion) => {
            progress.report(&format!("workflow {run}: {status}, {conclusion}"));
            State::Stop(conclusion)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use serde_json::{Value, json};
    use wiremock::{
        Mock, MockServer, Request, Respond, ResponseTemplate,
        matchers::{method, path, query_param},
    };

    use super::*;

    /// Answers with each template in turn, repeating the last one.
    struct Sequence {
        responses: Vec<ResponseTemplate>,
        calls: AtomicUsize,
    }

    impl Sequence {
        fn new(responses: Vec<ResponseTemplate>) -> Self {
            Self {
                responses,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Respond for Sequence {
        fn respond(&self, _request: &Request) -> ResponseTemplate {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses[call.min(self.responses.len() - 1)].clone()
        }
    }

    fn run(conclusion: Value) -> ResponseTemplate {
        let status = if conclusion.is_null() { "in_progress" } else { "completed" };
        ResponseTemplate::new(200).set_body_json(json!({
            "id": 42,
            "name": "build",
            "status": status,
            "conclusion": conclusion,
        }))
    }

    fn schedule(max_attempts: u32) -> PollSchedule {
        PollSchedule {
            first_delay: Duration::from_millis(1),
            interval: Duration::from_millis(1),
            max_attempts,
        }
    }

    fn scratch() -> ScratchRepository {
        ScratchRepository {
            owner: String::from("octocat"),
            name: String::from("scratch"),
            html_url: String::from("https://github.com/octocat/scratch"),
            default_branch: String::from("main"),
        }
    }

    async fn mount_list(server: &MockServer, expected_calls: u64) {
        Mock::given(method("GET"))
            .and(path("/repos/octocat/scratch/actions/runs"))
            .and(query_param("per_page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total_count": 1,
                "workflow_runs": [{ "id": 42, "status": "queued", "conclusion": null }],
            })))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn succeeds_after_three_attempts() {
        let server = MockServer::start().await;
        let client = GitHubClient::new(&server.uri(), "t").unwrap();
        mount_list(&server, 3).await;
        Mock::given(method("GET"))
            .and(path("/repos/octocat/scratch/actions/runs/42"))
            .respond_with(Sequence::new(vec![
                run(Value::Null),
                run(Value::Null),
                run(json!("success")),
            ]))
            .expect(3)
            .mount(&server)
            .await;

        let run = wait_for_run(&client, &scratch(), &schedule(10), &Progress::default())
            .await
            .unwrap();
        assert_eq!(run.id, 42);
        assert_eq!(run.conclusion, Some(Conclusion::Success));
    }

    #[tokio::test]
    async fn times_out_when_never_terminal() {
        let server = MockServer::start().await;
        let client = GitHubClient::new(&server.uri(), "t").unwrap();
        mount_list(&server, 4).await;
        Mock::given(method("GET"))
            .and(path("/repos/octocat/scratch/actions/runs/42"))
            .respond_with(run(Value::Null))
            .expect(4)
            .mount(&server)
            .await;

        let err = wait_for_run(&client, &scratch(), &schedule(4), &Progress::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BuildError::WorkflowTimeout { attempts: 4 }));
    }

    #[tokio::test]
    async fn fails_on_terminal_failure_without_waiting() {
        let server = MockServer::start().await;
        let client = GitHubClient::new(&server.uri(), "t").unwrap();
        mount_list(&server, 2).await;
        Mock::given(method("GET"))
            .and(path("/repos/octocat/scratch/actions/runs/42"))
            .respond_with(Sequence::new(vec![run(Value::Null), run(json!("failure"))]))
            .expect(2)
            .mount(&server)
            .await;

        let err = wait_for_run(&client, &scratch(), &schedule(60), &Progress::default())
            .await
            .unwrap_err();
        match err {
            BuildError::WorkflowFailed { conclusion } => {
                assert_eq!(conclusion, Conclusion::Failure);
                assert_eq!(conclusion.to_string(), "failure");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn transient_errors_use_up_attempts() {
        let server = MockServer::start().await;
        let client = GitHubClient::new(&server.uri(), "t").unwrap();
        Mock::given(method("GET"))
            .and(path("/repos/octocat/scratch/actions/runs"))
            .respond_with(Sequence::new(vec![
                ResponseTemplate::new(502),
                ResponseTemplate::new(200).set_body_json(json!({
                    "total_count": 0,
                    "workflow_runs": [],
                })),
                ResponseTemplate::new(200).set_body_json(json!({
                    "total_count": 1,
                    "workflow_runs": [{ "id": 42 }],
                })),
            ]))
            .expect(4)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octocat/scratch/actions/runs/42"))
            .respond_with(Sequence::new(vec![
                ResponseTemplate::new(500),
                run(json!("cancelled")),
            ]))
            .expect(2)
            .mount(&server)
            .await;

        let err = wait_for_run(&client, &scratch(), &schedule(10), &Progress::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BuildError::WorkflowFailed {
                conclusion: Conclusion::Cancelled
            }
        ));
    }
}
