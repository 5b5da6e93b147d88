use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tutor_core::{
    BackOutcome, Mode, SessionEvent, SessionOrchestrator, TurnOutcome, TutorError,
    endpoint::{AnalyzeRequest, SchemaRequest, TeachRequest, TeachingEndpoint},
    tutor_service::TutorService,
    types::{
        AnalysisResult, ConversationTurn, DiagramKind, DiagramResult, MessageKind, Payload, Role,
        TeachingResult,
    },
};

// --- Scripted backend ---

enum Step<T> {
    Ready(tutor_core::Result<T>),
    Gated(oneshot::Receiver<tutor_core::Result<T>>),
}

struct Script<T> {
    steps: Mutex<VecDeque<Step<T>>>,
}

impl<T> Default for Script<T> {
    fn default() -> Self {
        Self {
            steps: Mutex::new(VecDeque::new()),
        }
    }
}

impl<T> Script<T> {
    fn ready(&self, result: tutor_core::Result<T>) {
        self.steps.lock().unwrap().push_back(Step::Ready(result));
    }

    fn gated(&self) -> oneshot::Sender<tutor_core::Result<T>> {
        let (tx, rx) = oneshot::channel();
        self.steps.lock().unwrap().push_back(Step::Gated(rx));
        tx
    }

    async fn next(&self, endpoint: &str) -> tutor_core::Result<T> {
        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected {} call", endpoint));
        match step {
            Step::Ready(result) => result,
            Step::Gated(rx) => match rx.await {
                Ok(result) => result,
                // Sender dropped: simulate a call that never settles.
                Err(_) => std::future::pending().await,
            },
        }
    }
}

#[derive(Default)]
struct ScriptedService {
    analyze: Script<AnalysisResult>,
    teach: Script<TeachingResult>,
    schema: Script<DiagramResult>,
    analyze_requests: Mutex<Vec<AnalyzeRequest>>,
    teach_requests: Mutex<Vec<(TeachingEndpoint, TeachRequest)>>,
    schema_requests: Mutex<Vec<SchemaRequest>>,
}

#[async_trait]
impl TutorService for ScriptedService {
    async fn analyze(&self, request: AnalyzeRequest) -> tutor_core::Result<AnalysisResult> {
        self.analyze_requests.lock().unwrap().push(request);
        self.analyze.next("analyze").await
    }

    async fn teach(
        &self,
        endpoint: TeachingEndpoint,
        request: TeachRequest,
    ) -> tutor_core::Result<TeachingResult> {
        self.teach_requests.lock().unwrap().push((endpoint, request));
        self.teach.next("teach").await
    }

    async fn schema(&self, request: SchemaRequest) -> tutor_core::Result<DiagramResult> {
        self.schema_requests.lock().unwrap().push(request);
        self.schema.next("schema").await
    }
}

fn setup() -> (Arc<ScriptedService>, SessionOrchestrator) {
    let service = Arc::new(ScriptedService::default());
    let orchestrator = SessionOrchestrator::new(service.clone());
    (service, orchestrator)
}

fn analysis(score: u8) -> AnalysisResult {
    AnalysisResult {
        score,
        language_detected: "python".into(),
        summary: "Small and clear.".into(),
        ..Default::default()
    }
}

fn reply(message: &str) -> TeachingResult {
    TeachingResult {
        message: message.into(),
        ..Default::default()
    }
}

async fn wait_until_busy(orchestrator: &SessionOrchestrator) {
    for _ in 0..1000 {
        if orchestrator.snapshot().await.busy() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("request never dispatched");
}

async fn wait_for_mode(orchestrator: &SessionOrchestrator, mode: Option<Mode>) {
    for _ in 0..1000 {
        if orchestrator.snapshot().await.mode() == mode {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("session never reached {:?}", mode);
}

// --- Analysis ---

#[tokio::test]
async fn test_analyze_scenario_appends_analysis_message() {
    let (service, orchestrator) = setup();
    orchestrator.select(Mode::Analyzing).await;
    service.analyze.ready(Ok(analysis(73)));

    let outcome = orchestrator
        .submit_code("def f(): pass".into(), "python".into())
        .await;
    assert!(matches!(outcome, TurnOutcome::Completed { diagram: None }));

    let state = orchestrator.snapshot().await;
    assert_eq!(state.message_log().len(), 2);
    let last = state.message_log().last().unwrap();
    assert_eq!(last.role, Role::Tutor);
    assert_eq!(last.kind, MessageKind::Analysis);
    match &last.payload {
        Some(Payload::Analysis(result)) => {
            assert!(result.score <= 100);
            assert!(result.issues.is_empty());
        }
        other => panic!("expected analysis payload, got {:?}", other),
    }
    assert!(!state.busy());
}

#[tokio::test]
async fn test_duplicate_submissions_while_busy_are_dropped() {
    let (service, orchestrator) = setup();
    orchestrator.select(Mode::Analyzing).await;
    let gate = service.analyze.gated();

    let first = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.submit_code("x = 1".into(), "python".into()).await })
    };
    wait_until_busy(&orchestrator).await;

    for _ in 0..3 {
        let outcome = orchestrator.submit_code("x = 1".into(), "python".into()).await;
        assert!(matches!(outcome, TurnOutcome::Dropped));
    }
    assert!(matches!(orchestrator.resubmit_code().await, TurnOutcome::Dropped));

    gate.send(Ok(analysis(90))).unwrap();
    assert!(matches!(first.await.unwrap(), TurnOutcome::Completed { .. }));

    let state = orchestrator.snapshot().await;
    // Welcome plus exactly one resolved dispatch.
    assert_eq!(state.message_log().len(), 2);
    assert_eq!(service.analyze_requests.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_guard_released_after_success_and_failure() {
    let (service, orchestrator) = setup();
    orchestrator.select(Mode::Analyzing).await;

    service
        .analyze
        .ready(Err(TutorError::Transport("connection refused".into())));
    let outcome = orchestrator.submit_code("a".into(), "python".into()).await;
    assert!(matches!(outcome, TurnOutcome::Failed(TutorError::Transport(_))));

    let state = orchestrator.snapshot().await;
    let last = state.message_log().last().unwrap();
    assert_eq!(last.kind, MessageKind::Text);
    assert_eq!(
        last.content,
        "Error analyzing code: connection refused. Please try again."
    );
    assert!(!state.busy());

    service.analyze.ready(Ok(analysis(50)));
    let outcome = orchestrator.submit_code("a".into(), "python".into()).await;
    assert!(matches!(outcome, TurnOutcome::Completed { .. }));

    service.analyze.ready(Ok(analysis(60)));
    let outcome = orchestrator.submit_code("a".into(), "python".into()).await;
    assert!(matches!(outcome, TurnOutcome::Completed { .. }));
}

#[tokio::test]
async fn test_upload_file_logs_and_analyzes_with_detected_language() {
    let (service, orchestrator) = setup();
    orchestrator.select(Mode::Analyzing).await;
    service.analyze.ready(Ok(analysis(80)));

    let outcome = orchestrator
        .upload_file("solver.py", "def solve(): return 42".into())
        .await;
    assert!(matches!(outcome, TurnOutcome::Completed { .. }));

    let state = orchestrator.snapshot().await;
    assert_eq!(state.message_log()[1].content, "Uploaded solver.py");
    assert_eq!(state.message_log()[1].role, Role::Student);
    assert_eq!(state.message_log()[2].kind, MessageKind::Analysis);
    assert_eq!(state.uploaded_file(), Some("solver.py"));
    assert_eq!(state.active_language(), "python");
    assert_eq!(state.pending_code(), "def solve(): return 42");

    let requests = service.analyze_requests.lock().unwrap();
    assert_eq!(requests[0].language, "python");
}

#[tokio::test]
async fn test_resubmit_uses_edited_code() {
    let (service, orchestrator) = setup();
    orchestrator.select(Mode::Analyzing).await;
    orchestrator.update_code("fn main() {}").await;
    service.analyze.ready(Ok(analysis(95)));

    let outcome = orchestrator.submit_editor_code().await;
    assert!(matches!(outcome, TurnOutcome::Completed { .. }));

    let state = orchestrator.snapshot().await;
    assert_eq!(state.message_log()[1].content, "Resubmitted code");
    assert_eq!(service.analyze_requests.lock().unwrap()[0].code, "fn main() {}");
}

// --- Mode transitions ---

#[tokio::test]
async fn test_select_always_yields_single_welcome() {
    let (service, orchestrator) = setup();
    orchestrator.select(Mode::Learning).await;
    service.teach.ready(Ok(reply("Let's begin.")));
    orchestrator.submit_topic("Heaps").await;

    orchestrator.select(Mode::TechnicalExploring).await;
    let state = orchestrator.snapshot().await;
    assert_eq!(state.mode(), Some(Mode::TechnicalExploring));
    assert_eq!(state.message_log().len(), 1);
    assert_eq!(state.message_log()[0].content, Mode::TechnicalExploring.welcome());
    assert!(state.wire_history().is_empty());
    assert_eq!(state.topic(), None);
}

#[tokio::test]
async fn test_back_asks_for_confirmation_only_with_unsaved_work() {
    let (service, orchestrator) = setup();
    orchestrator.select(Mode::Learning).await;

    let outcome = orchestrator
        .back(|| panic!("no work yet, must not ask"))
        .await;
    assert_eq!(outcome, BackOutcome::Returned);
    assert_eq!(orchestrator.snapshot().await.mode(), None);

    orchestrator.select(Mode::Learning).await;
    service.teach.ready(Ok(reply("Sure.")));
    orchestrator.submit_topic("Tries").await;

    assert_eq!(orchestrator.back(|| false).await, BackOutcome::Cancelled);
    let state = orchestrator.snapshot().await;
    assert_eq!(state.mode(), Some(Mode::Learning));
    assert_eq!(state.topic(), Some("Tries"));

    assert_eq!(orchestrator.back(|| true).await, BackOutcome::Returned);
    let state = orchestrator.snapshot().await;
    assert_eq!(state.mode(), None);
    assert!(state.message_log().is_empty());
}

#[tokio::test]
async fn test_late_reply_after_back_is_discarded() {
    let (service, orchestrator) = setup();
    orchestrator.select(Mode::Learning).await;
    let gate = service.teach.gated();

    let turn = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.submit_teaching_turn("What is DP?", false).await })
    };
    wait_until_busy(&orchestrator).await;

    assert_eq!(orchestrator.back(|| true).await, BackOutcome::Returned);
    orchestrator.select(Mode::MathExploring).await;

    // The new session can dispatch immediately.
    service.teach.ready(Ok(reply("Expected value is...")));
    let outcome = orchestrator.submit_teaching_turn("What is EV?", false).await;
    assert!(matches!(outcome, TurnOutcome::Completed { .. }));

    gate.send(Ok(reply("Dynamic programming is..."))).unwrap();
    assert!(matches!(turn.await.unwrap(), TurnOutcome::Stale));

    let state = orchestrator.snapshot().await;
    assert_eq!(state.mode(), Some(Mode::MathExploring));
    assert_eq!(state.message_log().len(), 3);
    assert!(state
        .message_log()
        .iter()
        .all(|m| !m.content.contains("Dynamic programming")));
    assert_eq!(state.wire_history().len(), 2);
    assert!(!state.busy());
}

#[tokio::test]
async fn test_back_while_turn_events_are_pending_discards_reply() {
    let service = Arc::new(ScriptedService::default());
    // Room for exactly the selection events, so the turn stalls publishing.
    let (tx, mut rx) = mpsc::channel(2);
    let orchestrator = SessionOrchestrator::new(service.clone()).with_events(tx);
    orchestrator.select(Mode::Learning).await;
    service.teach.ready(Ok(reply("A heap is...")));

    let turn = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.submit_teaching_turn("Teach me Heaps", false).await })
    };
    wait_until_busy(&orchestrator).await;

    let back = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.back(|| true).await })
    };
    wait_for_mode(&orchestrator, None).await;
    tokio::spawn(async move { while rx.recv().await.is_some() {} });

    assert!(matches!(turn.await.unwrap(), TurnOutcome::Stale));
    assert_eq!(back.await.unwrap(), BackOutcome::Returned);
    let state = orchestrator.snapshot().await;
    assert_eq!(state.mode(), None);
    assert!(state.message_log().is_empty());
    assert!(state.wire_history().is_empty());
    assert!(!state.busy());
}

#[tokio::test]
async fn test_mode_switch_while_upload_events_are_pending_discards_analysis() {
    let service = Arc::new(ScriptedService::default());
    let (tx, mut rx) = mpsc::channel(2);
    let orchestrator = SessionOrchestrator::new(service.clone()).with_events(tx);
    orchestrator.select(Mode::Analyzing).await;
    service.analyze.ready(Ok(analysis(55)));

    let upload = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            orchestrator
                .upload_file("heap.py", "import heapq".into())
                .await
        })
    };
    wait_until_busy(&orchestrator).await;

    let select = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.select(Mode::Learning).await })
    };
    wait_for_mode(&orchestrator, Some(Mode::Learning)).await;
    tokio::spawn(async move { while rx.recv().await.is_some() {} });

    assert!(matches!(upload.await.unwrap(), TurnOutcome::Stale));
    select.await.unwrap();
    let state = orchestrator.snapshot().await;
    assert_eq!(state.message_log().len(), 1);
    assert_eq!(state.message_log()[0].content, Mode::Learning.welcome());
    assert_eq!(state.uploaded_file(), None);
    assert!(!state.busy());
}

#[tokio::test]
async fn test_change_topic_clears_conversation_in_place() {
    let (service, orchestrator) = setup();
    orchestrator.select(Mode::MathExploring).await;
    service.teach.ready(Ok(TeachingResult {
        code_skeleton: Some("import random".into()),
        ..reply("Simulate it.")
    }));
    orchestrator.submit_topic("Monty Hall").await;

    assert!(orchestrator.change_topic().await);
    let state = orchestrator.snapshot().await;
    assert_eq!(state.mode(), Some(Mode::MathExploring));
    assert!(state.message_log().is_empty());
    assert!(state.wire_history().is_empty());
    assert!(!state.code_editor_visible());
    assert_eq!(state.pending_code(), "");
}

#[tokio::test]
async fn test_change_topic_is_a_no_op_in_analysis_mode() {
    let (service, orchestrator) = setup();
    orchestrator.select(Mode::Analyzing).await;
    service.analyze.ready(Ok(analysis(80)));
    orchestrator.upload_file("trie.py", "class Trie: pass".into()).await;
    let before = orchestrator.snapshot().await;

    assert!(!orchestrator.change_topic().await);
    let state = orchestrator.snapshot().await;
    assert_eq!(state.epoch(), before.epoch());
    assert_eq!(state.mode(), Some(Mode::Analyzing));
    assert_eq!(state.uploaded_file(), Some("trie.py"));
    assert_eq!(state.pending_code(), "class Trie: pass");
    assert_eq!(state.message_log().len(), 3);
}

// --- Teaching turns ---

#[tokio::test]
async fn test_first_teaching_turn_scenario() {
    let (service, orchestrator) = setup();
    orchestrator.select(Mode::Learning).await;
    service.teach.ready(Ok(reply("Imagine looking up a word in a dictionary...")));

    let outcome = orchestrator.submit_topic("Binary Search").await;
    assert!(matches!(outcome, TurnOutcome::Completed { diagram: None }));

    let state = orchestrator.snapshot().await;
    assert_eq!(state.message_log().len(), 3);
    assert_eq!(state.message_log()[1].role, Role::Student);
    assert_eq!(state.message_log()[1].content, "Teach me Binary Search");
    assert_eq!(state.message_log()[2].role, Role::Tutor);
    assert_eq!(state.wire_history().len(), 2);
    assert_eq!(state.topic(), Some("Binary Search"));
    assert_eq!(state.active_language(), "python");

    let requests = service.teach_requests.lock().unwrap();
    let (endpoint, request) = &requests[0];
    assert_eq!(*endpoint, TeachingEndpoint::Teach);
    assert!(request.conversation_history.is_empty());
    assert_eq!(
        request.context.as_deref(),
        Some("Topic: Binary Search\nStudent's language: python")
    );
}

#[tokio::test]
async fn test_wire_history_replays_prior_exchange_in_order() {
    let (service, orchestrator) = setup();
    orchestrator.select(Mode::TechnicalExploring).await;
    service.teach.ready(Ok(reply("A CDN caches content near users.")));
    service.teach.ready(Ok(reply("Through edge PoPs.")));

    orchestrator.submit_teaching_turn("What is a CDN?", false).await;
    orchestrator.submit_teaching_turn("How does it route?", false).await;

    let requests = service.teach_requests.lock().unwrap();
    assert_eq!(requests[0].0, TeachingEndpoint::Technical);
    assert_eq!(
        requests[1].1.conversation_history,
        vec![
            ConversationTurn::user("What is a CDN?"),
            ConversationTurn::assistant("A CDN caches content near users."),
        ]
    );
    assert_eq!(requests[1].1.message, "How does it route?");
}

#[tokio::test]
async fn test_failed_turn_does_not_extend_history() {
    let (service, orchestrator) = setup();
    orchestrator.select(Mode::Learning).await;
    service
        .teach
        .ready(Err(TutorError::ContractViolation("no JSON object found".into())));

    let outcome = orchestrator.submit_teaching_turn("Explain heaps", false).await;
    assert!(matches!(outcome, TurnOutcome::Failed(TutorError::ContractViolation(_))));

    let state = orchestrator.snapshot().await;
    assert!(state.wire_history().is_empty());
    let last = state.message_log().last().unwrap();
    assert_eq!(last.kind, MessageKind::Text);
    assert_eq!(last.content, "Error: no JSON object found. Please try again.");
    assert!(!state.busy());
}

#[tokio::test]
async fn test_skeleton_goes_to_editor_never_to_chat() {
    let (service, orchestrator) = setup();
    orchestrator.select(Mode::Learning).await;
    let skeleton = "def binary_search(arr, target):\n    # your code here\n    pass";
    service.teach.ready(Ok(TeachingResult {
        code_skeleton: Some(skeleton.into()),
        ..reply("Try filling this in.")
    }));

    orchestrator.submit_teaching_turn("Give me a template", false).await;

    let state = orchestrator.snapshot().await;
    assert!(state.code_editor_visible());
    assert_eq!(state.pending_code(), skeleton);
    assert_eq!(state.active_language(), "python");
    assert!(state.message_log().iter().all(|m| m.kind != MessageKind::Code));
    assert!(state.message_log().iter().all(|m| !m.content.contains("binary_search")));
}

#[tokio::test]
async fn test_editor_submission_in_learning_mode_logs_code_once() {
    let (service, orchestrator) = setup();
    orchestrator.select(Mode::Learning).await;
    orchestrator.update_code("def f():\n    return 1").await;
    service.teach.ready(Ok(TeachingResult {
        kind: tutor_core::types::TeachingKind::Validation,
        ..reply("Looks right!")
    }));

    let outcome = orchestrator.submit_editor_code().await;
    assert!(matches!(outcome, TurnOutcome::Completed { .. }));

    let state = orchestrator.snapshot().await;
    let students: Vec<_> = state
        .message_log()
        .iter()
        .filter(|m| m.role == Role::Student)
        .collect();
    assert_eq!(students.len(), 1);
    assert_eq!(students[0].kind, MessageKind::Code);

    let requests = service.teach_requests.lock().unwrap();
    assert!(requests[0].1.message.contains("```javascript\ndef f():\n    return 1\n```"));
    assert_eq!(state.wire_history()[0].content, requests[0].1.message);
}

#[tokio::test]
async fn test_blank_editor_and_wrong_mode_are_ignored() {
    let (_service, orchestrator) = setup();
    orchestrator.select(Mode::Learning).await;
    orchestrator.update_code("   \n").await;
    assert!(matches!(orchestrator.submit_editor_code().await, TurnOutcome::Ignored));

    orchestrator.select(Mode::Analyzing).await;
    assert!(matches!(
        orchestrator.submit_teaching_turn("hello", false).await,
        TurnOutcome::Ignored
    ));
    assert_eq!(orchestrator.snapshot().await.message_log().len(), 1);
}

#[tokio::test]
async fn test_analysis_and_diagrams_outside_their_modes_are_ignored() {
    let (service, orchestrator) = setup();
    assert!(matches!(
        orchestrator.submit_code("x = 1".into(), "python".into()).await,
        TurnOutcome::Ignored
    ));
    assert!(matches!(
        orchestrator.submit_schema_request("binary tree", None).await,
        TurnOutcome::Ignored
    ));

    orchestrator.select(Mode::Learning).await;
    assert!(matches!(
        orchestrator.submit_code("x = 1".into(), "python".into()).await,
        TurnOutcome::Ignored
    ));

    assert!(service.analyze_requests.lock().unwrap().is_empty());
    assert!(service.schema_requests.lock().unwrap().is_empty());
    let state = orchestrator.snapshot().await;
    assert_eq!(state.message_log().len(), 1);
    assert!(!state.busy());
}

// --- Side channel ---

#[tokio::test]
async fn test_schema_request_arrives_later_and_independently() {
    let (service, orchestrator) = setup();
    orchestrator.select(Mode::Learning).await;
    service.teach.ready(Ok(TeachingResult {
        needs_schema: true,
        schema_request: Some("flowchart".into()),
        ..reply("Here is the idea.")
    }));
    let schema_gate = service.schema.gated();

    let outcome = orchestrator.submit_topic("Binary Search").await;
    let TurnOutcome::Completed {
        diagram: Some(diagram),
    } = outcome
    else {
        panic!("expected a side-channel diagram task");
    };
    assert!(!orchestrator.snapshot().await.busy());

    // A new primary turn proceeds while the diagram is still pending.
    service.teach.ready(Ok(reply("Next, the midpoint.")));
    let outcome = orchestrator.submit_teaching_turn("Go on", false).await;
    assert!(matches!(outcome, TurnOutcome::Completed { .. }));

    schema_gate
        .send(Ok(DiagramResult {
            kind: DiagramKind::Mermaid,
            diagram: "graph TD; A-->B".into(),
            ..Default::default()
        }))
        .unwrap();
    assert!(matches!(diagram.await.unwrap(), TurnOutcome::Completed { .. }));

    let state = orchestrator.snapshot().await;
    let last = state.message_log().last().unwrap();
    assert_eq!(last.role, Role::Tutor);
    assert_eq!(last.kind, MessageKind::Schema);
    assert_eq!(state.current_schema().unwrap().diagram, "graph TD; A-->B");
    // The diagram landed after the later teaching turn.
    assert_eq!(state.message_log()[4].content, "Next, the midpoint.");

    let schema_requests = service.schema_requests.lock().unwrap();
    assert_eq!(schema_requests[0].request, "flowchart");
    assert_eq!(schema_requests[0].context.as_deref(), Some("Binary Search"));
}

#[tokio::test]
async fn test_direct_schema_request_failure_is_text_message() {
    let (service, orchestrator) = setup();
    orchestrator.select(Mode::TechnicalExploring).await;
    service
        .schema
        .ready(Err(TutorError::Configuration("API key not configured".into())));

    let outcome = orchestrator
        .submit_schema_request("load balancer topology", None)
        .await;
    assert!(matches!(outcome, TurnOutcome::Failed(TutorError::Configuration(_))));

    let state = orchestrator.snapshot().await;
    let last = state.message_log().last().unwrap();
    assert_eq!(last.kind, MessageKind::Text);
    assert_eq!(last.content, "Failed to generate diagram: API key not configured");
}

#[tokio::test]
async fn test_direct_schema_request_is_not_guarded() {
    let (service, orchestrator) = setup();
    orchestrator.select(Mode::Learning).await;
    let gate = service.teach.gated();

    let turn = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.submit_teaching_turn("Explain BFS", false).await })
    };
    wait_until_busy(&orchestrator).await;

    service.schema.ready(Ok(DiagramResult {
        kind: DiagramKind::Ascii,
        diagram: "A - B - C".into(),
        ..Default::default()
    }));
    let outcome = orchestrator
        .submit_schema_request("graph traversal", Some("BFS".into()))
        .await;
    assert!(matches!(outcome, TurnOutcome::Completed { .. }));
    assert!(orchestrator.snapshot().await.busy());

    gate.send(Ok(reply("Breadth first..."))).unwrap();
    assert!(matches!(turn.await.unwrap(), TurnOutcome::Completed { .. }));
}

// --- Timeouts and events ---

#[tokio::test]
async fn test_hung_request_times_out_and_releases_guard() {
    let service = Arc::new(ScriptedService::default());
    let orchestrator =
        SessionOrchestrator::new(service.clone()).with_timeout(Duration::from_millis(20));
    orchestrator.select(Mode::Analyzing).await;
    drop(service.analyze.gated());

    let outcome = orchestrator.submit_code("x".into(), "python".into()).await;
    assert!(matches!(outcome, TurnOutcome::Failed(TutorError::Timeout(_))));
    let state = orchestrator.snapshot().await;
    assert!(!state.busy());
    assert!(state.message_log().last().unwrap().content.contains("timed out"));

    service.analyze.ready(Ok(analysis(10)));
    let outcome = orchestrator.submit_code("x".into(), "python".into()).await;
    assert!(matches!(outcome, TurnOutcome::Completed { .. }));
}

#[tokio::test]
async fn test_events_are_published_in_order() {
    let service = Arc::new(ScriptedService::default());
    let (tx, mut rx) = mpsc::channel(32);
    let orchestrator = SessionOrchestrator::new(service.clone()).with_events(tx);

    orchestrator.select(Mode::Analyzing).await;
    service.analyze.ready(Ok(analysis(42)));
    orchestrator.submit_code("x".into(), "python".into()).await;

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert_eq!(events[0], SessionEvent::ModeChanged(Some(Mode::Analyzing)));
    assert!(matches!(events[1], SessionEvent::MessageAppended(_)));
    assert_eq!(events[2], SessionEvent::BusyChanged(true));
    assert!(matches!(
        &events[3],
        SessionEvent::MessageAppended(m) if m.kind == MessageKind::Analysis
    ));
    assert_eq!(events[4], SessionEvent::BusyChanged(false));
}
