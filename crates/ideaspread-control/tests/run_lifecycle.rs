//! Controller lifecycle coverage against a scripted in-process service,
//! letting tests decide exactly when and how each request resolves.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};

use ideaspread_control::{
    PanelConfig, RunController, RunState, RunStatistics, STATUS_SUCCESS, ServiceError,
    SimulateReply, SimulationParameters, SimulationService,
};
use tokio::sync::oneshot;

type ScriptedOutcome = Result<SimulateReply, ServiceError>;

/// Fake service whose replies are released through oneshot gates, in the
/// order requests arrive. Requests are recorded at call time so tests can
/// inspect the exact body each run carried.
#[derive(Default)]
struct ScriptedService {
    gates: Mutex<VecDeque<oneshot::Receiver<ScriptedOutcome>>>,
    requests: Mutex<Vec<SimulationParameters>>,
}

impl ScriptedService {
    /// Queue a gate for the next request; the returned sender releases it.
    fn stage(&self) -> oneshot::Sender<ScriptedOutcome> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().unwrap().push_back(rx);
        tx
    }

    fn recorded_requests(&self) -> Vec<SimulationParameters> {
        self.requests.lock().unwrap().clone()
    }
}

impl SimulationService for ScriptedService {
    fn simulate(
        &self,
        params: SimulationParameters,
    ) -> impl Future<Output = ScriptedOutcome> + Send {
        self.requests.lock().unwrap().push(params);
        let gate = self.gates.lock().unwrap().pop_front();
        async move {
            match gate {
                Some(rx) => rx.await.unwrap_or_else(|_| {
                    Err(ServiceError::Transport("scripted reply dropped".into()))
                }),
                None => Err(ServiceError::Transport("no scripted reply staged".into())),
            }
        }
    }
}

fn success_reply(path: &str, rate: f64, infected: u64) -> ScriptedOutcome {
    Ok(SimulateReply {
        status: STATUS_SUCCESS.to_string(),
        media_url: Some(path.to_string()),
        statistics: Some(RunStatistics {
            final_infection_rate: rate,
            total_infected: infected,
            duration_days: None,
        }),
        message: None,
    })
}

fn controller_with(
    base_url: &str,
    service: &Arc<ScriptedService>,
) -> RunController<Arc<ScriptedService>> {
    let config = PanelConfig {
        base_url: base_url.to_string(),
        ..PanelConfig::default()
    };
    RunController::new(config, Arc::clone(service))
}

async fn wait_for<F: Fn() -> bool>(condition: F) {
    while !condition() {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn successful_run_resolves_media_url_and_statistics() {
    let service = Arc::new(ScriptedService::default());
    let gate = service.stage();
    let controller = controller_with("http://host:5000", &service);
    assert_eq!(controller.state(), RunState::Idle);

    gate.send(success_reply("/static/simulations/a.mp4", 0.42, 421))
        .expect("release reply");
    match controller.run().await {
        RunState::Success { media_url, statistics } => {
            assert_eq!(media_url, "http://host:5000/static/simulations/a.mp4");
            assert_eq!(statistics.total_infected, 421);
            assert!((statistics.final_infection_rate - 0.42).abs() < 1e-12);
            assert!(statistics.duration_days.is_none());
        }
        other => panic!("expected success, got {other:?}"),
    }
}

#[tokio::test]
async fn run_enters_pending_before_the_call_resolves() {
    let service = Arc::new(ScriptedService::default());
    let gate = service.stage();
    let controller = controller_with("http://host:5000", &service);

    let task = tokio::spawn({
        let controller = controller.clone();
        async move { controller.run().await }
    });

    wait_for(|| controller.state() == RunState::Pending).await;

    gate.send(Err(ServiceError::Transport("connection refused".into())))
        .expect("release reply");
    let resolved = task.await.expect("run task");
    match resolved {
        RunState::Failed { message } => assert!(!message.is_empty()),
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn pending_clears_previous_result() {
    let service = Arc::new(ScriptedService::default());
    let first = service.stage();
    let second = service.stage();
    let controller = controller_with("http://host:5000", &service);

    first
        .send(success_reply("/static/simulations/a.mp4", 0.42, 421))
        .expect("release first");
    assert!(matches!(controller.run().await, RunState::Success { .. }));

    let task = tokio::spawn({
        let controller = controller.clone();
        async move { controller.run().await }
    });
    wait_for(|| controller.state() == RunState::Pending).await;
    // The prior success payload is gone the moment the new run starts.
    assert_eq!(controller.state(), RunState::Pending);

    second
        .send(Err(ServiceError::Transport("timed out".into())))
        .expect("release second");
    task.await.expect("run task");
    assert!(matches!(controller.state(), RunState::Failed { .. }));
}

#[tokio::test]
async fn edits_during_a_pending_run_do_not_reach_the_inflight_body() {
    let service = Arc::new(ScriptedService::default());
    let gate = service.stage();
    let controller = controller_with("http://host:5000", &service);
    assert!(controller.set_field("num_agents", "1500"));

    let task = tokio::spawn({
        let controller = controller.clone();
        async move { controller.run().await }
    });
    wait_for(|| controller.state() == RunState::Pending).await;

    assert!(controller.set_field("num_agents", "9000"));
    gate.send(success_reply("/static/simulations/a.mp4", 0.1, 10))
        .expect("release reply");
    task.await.expect("run task");

    let requests = service.recorded_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].num_agents, 1500.0);
    // The edit itself still landed in the store for the next run.
    assert_eq!(controller.parameters().num_agents, 9000.0);
}

#[tokio::test]
async fn stale_resolution_is_discarded_in_favor_of_the_latest_run() {
    let service = Arc::new(ScriptedService::default());
    let first = service.stage();
    let second = service.stage();
    let controller = controller_with("http://host:5000", &service);

    let first_task = tokio::spawn({
        let controller = controller.clone();
        async move { controller.run().await }
    });
    wait_for(|| service.recorded_requests().len() == 1).await;

    let second_task = tokio::spawn({
        let controller = controller.clone();
        async move { controller.run().await }
    });
    wait_for(|| service.recorded_requests().len() == 2).await;

    // Resolve the newer run first, then let the stale one arrive late.
    second
        .send(success_reply("/static/simulations/b.mp4", 0.9, 900))
        .expect("release second");
    let latest = second_task.await.expect("second run task");
    match &latest {
        RunState::Success { media_url, .. } => {
            assert_eq!(media_url, "http://host:5000/static/simulations/b.mp4");
        }
        other => panic!("expected success, got {other:?}"),
    }

    first
        .send(success_reply("/static/simulations/a.mp4", 0.1, 100))
        .expect("release first");
    let after_stale = first_task.await.expect("first run task");

    // The late arrival changed nothing: both the returned state and the
    // controller still show the newer run's outcome.
    assert_eq!(after_stale, latest);
    assert_eq!(controller.state(), latest);
}

#[tokio::test]
async fn overlapping_runs_never_leave_the_controller_pending() {
    let service = Arc::new(ScriptedService::default());
    let gates: Vec<_> = (0..3).map(|_| service.stage()).collect();
    let controller = controller_with("http://host:5000", &service);

    let mut tasks = Vec::new();
    for started in 1..=3 {
        tasks.push(tokio::spawn({
            let controller = controller.clone();
            async move { controller.run().await }
        }));
        wait_for(|| service.recorded_requests().len() == started).await;
    }

    // Release the newest run first so every earlier one resolves stale.
    for (index, gate) in gates.into_iter().enumerate().rev() {
        gate.send(success_reply(
            &format!("/static/simulations/run{index}.mp4"),
            0.5,
            500,
        ))
        .expect("release reply");
    }
    for task in tasks {
        task.await.expect("run task");
    }

    match controller.state() {
        RunState::Success { media_url, .. } => {
            assert_eq!(media_url, "http://host:5000/static/simulations/run2.mp4");
        }
        other => panic!("expected the latest run's success, got {other:?}"),
    }
}

#[tokio::test]
async fn service_message_is_surfaced_verbatim() {
    let service = Arc::new(ScriptedService::default());
    let gate = service.stage();
    let controller = controller_with("http://host:5000", &service);

    gate.send(Ok(SimulateReply {
        status: "error".to_string(),
        media_url: None,
        statistics: None,
        message: Some("too many agents".to_string()),
    }))
    .expect("release reply");

    assert_eq!(
        controller.run().await,
        RunState::Failed {
            message: "too many agents".to_string()
        }
    );
}

#[tokio::test]
async fn reset_restores_defaults_after_edits() {
    let service = Arc::new(ScriptedService::default());
    let defaults = SimulationParameters {
        num_agents: 250.0,
        ..SimulationParameters::default()
    };
    let config = PanelConfig {
        defaults: defaults.clone(),
        ..PanelConfig::default()
    };
    let controller = RunController::new(config, Arc::clone(&service));

    assert!(controller.set_field("num_agents", "4000"));
    assert!(controller.set_field("commuter_ratio", "0.2"));
    controller.reset_parameters();
    assert_eq!(controller.parameters(), defaults);
}
