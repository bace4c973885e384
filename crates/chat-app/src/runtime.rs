use std::sync::Arc;

use resume_llm::{
    AbortController, AdapterError, ChatModelAdapter, ContentPart, RunRequest, SnapshotStream,
};
use snafu::{IntoError, OptionExt, Snafu, ensure};

use crate::chat::{
    Message, MessageId, MessageStatus, StreamEventMapped, StreamEventPayload, StreamSessionId,
    StreamState, StreamTarget, StreamTransition, StreamTransitionRejection, ThreadId, ThreadList,
};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum RuntimeError {
    #[snafu(display("thread {} already has a response streaming", thread_id.0))]
    AlreadyStreaming {
        stage: &'static str,
        thread_id: ThreadId,
    },
    #[snafu(display("thread {} does not exist", thread_id.0))]
    UnknownThread {
        stage: &'static str,
        thread_id: ThreadId,
    },
    #[snafu(display("adapter '{adapter_id}' failed to start on `{stage}`, {source}"))]
    StartRun {
        stage: &'static str,
        adapter_id: String,
        source: AdapterError,
    },
    #[snafu(display("stream transition rejected on `{stage}`: {rejection:?}"))]
    Transition {
        stage: &'static str,
        rejection: StreamTransitionRejection,
    },
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// One in-flight adapter run owned by the host.
pub struct ActiveRun {
    target: StreamTarget,
    stream: SnapshotStream,
    controller: AbortController,
    finished: bool,
}

impl ActiveRun {
    /// Returns the thread and session this run streams into.
    pub fn target(&self) -> StreamTarget {
        self.target
    }

    /// Fires the run's abort signal; the next event will be `Cancelled`.
    pub fn abort(&self) {
        self.controller.abort();
    }

    pub fn is_aborted(&self) -> bool {
        self.controller.is_aborted()
    }

    /// Waits for the next adapter event.
    ///
    /// Returns `None` after the terminal event has been handed out.
    pub async fn next_event(&mut self) -> Option<StreamEventMapped> {
        if self.finished {
            return None;
        }

        // Snapshots still buffered when the signal fired are dropped.
        let payload = if self.controller.is_aborted() {
            StreamEventPayload::Cancelled
        } else {
            match self.stream.recv().await {
                Some(Ok(snapshot)) => StreamEventPayload::Snapshot(snapshot.text().to_string()),
                Some(Err(error)) => StreamEventPayload::Error(error.to_string()),
                None if self.controller.is_aborted() => StreamEventPayload::Cancelled,
                None => StreamEventPayload::Done,
            }
        };

        let event = StreamEventMapped::new(self.target, payload);
        self.finished = event.is_terminal();
        Some(event)
    }
}

/// Host-side runtime: owns the threads and drives one adapter per submit.
pub struct LocalRuntime {
    adapter: Arc<dyn ChatModelAdapter>,
    threads: ThreadList,
    next_message_id: u64,
    next_session_id: u64,
}

impl LocalRuntime {
    /// Creates a runtime with one empty thread.
    pub fn new(adapter: Arc<dyn ChatModelAdapter>) -> Self {
        Self {
            adapter,
            threads: ThreadList::new(),
            next_message_id: 1,
            next_session_id: 1,
        }
    }

    /// Returns the id of the current adapter.
    pub fn adapter_id(&self) -> &str {
        self.adapter.id()
    }

    /// Swaps the adapter used by subsequent submits; running streams keep theirs.
    pub fn set_adapter(&mut self, adapter: Arc<dyn ChatModelAdapter>) {
        self.adapter = adapter;
    }

    /// Returns the thread list.
    pub fn threads(&self) -> &ThreadList {
        &self.threads
    }

    pub fn threads_mut(&mut self) -> &mut ThreadList {
        &mut self.threads
    }

    /// Submits `text` to the active thread.
    pub fn submit(&mut self, text: impl Into<String>) -> RuntimeResult<ActiveRun> {
        let thread_id = self.threads.active().id;
        self.submit_to(thread_id, text)
    }

    /// Appends a user message to `thread_id` and starts an adapter run over the
    /// thread history. Must be called inside a tokio runtime.
    pub fn submit_to(
        &mut self,
        thread_id: ThreadId,
        text: impl Into<String>,
    ) -> RuntimeResult<ActiveRun> {
        let user_message_id = self.allocate_message_id();
        let assistant_message_id = self.allocate_message_id();
        let session_id = StreamSessionId::new(self.next_session_id);
        self.next_session_id += 1;
        let target = StreamTarget::new(thread_id, session_id);

        let thread = self.threads.get_mut(thread_id).context(UnknownThreadSnafu {
            stage: "submit-find-thread",
            thread_id,
        })?;
        ensure!(
            !thread.stream_state.is_streaming(),
            AlreadyStreamingSnafu {
                stage: "submit-check-idle",
                thread_id,
            }
        );

        thread.messages.push(Message::user(user_message_id, text));
        let history = thread.history();

        thread
            .apply_stream_transition(StreamTransition::Start(target))
            .map_err(|rejection| {
                TransitionSnafu {
                    stage: "submit-start-stream",
                    rejection,
                }
                .build()
            })?;
        thread
            .messages
            .push(Message::assistant_streaming(assistant_message_id, session_id));

        let controller = AbortController::new();
        let handle = match self
            .adapter
            .run(RunRequest::new(history, controller.signal()))
        {
            Ok(handle) => handle,
            Err(source) => {
                tracing::error!(
                    thread_id = thread_id.0,
                    adapter_id = %self.adapter.id(),
                    error = %source,
                    "adapter failed to start run"
                );
                let message = source.to_string();
                if let Some(assistant) = thread.streaming_message_mut(session_id) {
                    assistant.status = MessageStatus::Error(message.clone());
                }
                let _ = thread.apply_stream_transition(StreamTransition::Fail { target, message });
                return Err(StartRunSnafu {
                    stage: "submit-run-adapter",
                    adapter_id: self.adapter.id(),
                }
                .into_error(source));
            }
        };

        tracing::debug!(
            thread_id = thread_id.0,
            session_id = session_id.0,
            adapter_id = %self.adapter.id(),
            "started adapter run"
        );
        tokio::spawn(handle.worker);

        Ok(ActiveRun {
            target,
            stream: handle.stream,
            controller,
            finished: false,
        })
    }

    /// Applies one adapter event to its thread.
    ///
    /// Returns `false` when the event belongs to a session that is no longer
    /// running and was ignored.
    pub fn apply_stream_event(&mut self, event: StreamEventMapped) -> RuntimeResult<bool> {
        let target = event.target;
        let thread = self
            .threads
            .get_mut(target.thread_id)
            .context(UnknownThreadSnafu {
                stage: "apply-event-find-thread",
                thread_id: target.thread_id,
            })?;

        if !thread.stream_state.accepts_stream_event(target) {
            tracing::debug!(
                thread_id = target.thread_id.0,
                session_id = target.session_id.0,
                "ignoring event from stale session"
            );
            return Ok(false);
        }

        if let Some(message) = thread.streaming_message_mut(target.session_id) {
            match &event.payload {
                StreamEventPayload::Snapshot(text) => {
                    message.content = vec![ContentPart::text(text.clone())];
                }
                StreamEventPayload::Done => message.status = MessageStatus::Done,
                StreamEventPayload::Error(error) => {
                    message.status = MessageStatus::Error(error.clone());
                }
                StreamEventPayload::Cancelled => message.status = MessageStatus::Cancelled,
            }
        }

        if let Some(transition) = event.into_transition() {
            thread
                .apply_stream_transition(transition)
                .map_err(|rejection| {
                    TransitionSnafu {
                        stage: "apply-event-transition",
                        rejection,
                    }
                    .build()
                })?;
        }

        Ok(true)
    }

    /// Applies every event of `run` until it ends and returns the final state.
    pub async fn run_to_completion(&mut self, mut run: ActiveRun) -> RuntimeResult<StreamState> {
        let thread_id = run.target().thread_id;
        while let Some(event) = run.next_event().await {
            self.apply_stream_event(event)?;
        }

        self.threads
            .get(thread_id)
            .map(|thread| thread.stream_state.clone())
            .context(UnknownThreadSnafu {
                stage: "run-to-completion",
                thread_id,
            })
    }

    fn allocate_message_id(&mut self) -> MessageId {
        let id = MessageId::new(self.next_message_id);
        self.next_message_id += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use resume_llm::ThreadMessage;

    use super::*;
    use crate::test_support::{Script, ScriptedAdapter};

    fn assistant_reply(runtime: &LocalRuntime) -> &Message {
        runtime.threads().active().last_message().unwrap()
    }

    #[tokio::test]
    async fn snapshots_replace_assistant_text_until_done() {
        let adapter = ScriptedAdapter::new(Script::Chunks(&["Your ", "resume ", "looks good."]));
        let mut runtime = LocalRuntime::new(adapter.clone());

        let mut run = runtime.submit("How is my resume?").unwrap();
        let mut snapshots = Vec::new();
        while let Some(event) = run.next_event().await {
            if let StreamEventPayload::Snapshot(text) = &event.payload {
                snapshots.push(text.clone());
            }
            assert!(runtime.apply_stream_event(event).unwrap());
        }

        assert_eq!(
            snapshots,
            vec!["Your ", "Your resume ", "Your resume looks good."]
        );
        let reply = assistant_reply(&runtime);
        assert_eq!(reply.text(), "Your resume looks good.");
        assert_eq!(reply.status, MessageStatus::Done);
        assert!(matches!(
            runtime.threads().active().stream_state,
            StreamState::Done(_)
        ));

        let seen = adapter.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], vec![ThreadMessage::user("How is my resume?")]);
    }

    #[tokio::test]
    async fn follow_up_sends_full_history() {
        let adapter = ScriptedAdapter::new(Script::Chunks(&["ok"]));
        let mut runtime = LocalRuntime::new(adapter.clone());

        let run = runtime.submit("first").unwrap();
        runtime.run_to_completion(run).await.unwrap();
        let run = runtime.submit("second").unwrap();
        runtime.run_to_completion(run).await.unwrap();

        let seen = adapter.seen.lock().unwrap();
        assert_eq!(
            seen[1],
            vec![
                ThreadMessage::user("first"),
                ThreadMessage::assistant("ok"),
                ThreadMessage::user("second"),
            ]
        );
        assert_eq!(runtime.threads().active().title(), "first");
    }

    #[tokio::test]
    async fn server_error_marks_reply_failed() {
        let mut runtime = LocalRuntime::new(ScriptedAdapter::new(Script::Status(500)));

        let run = runtime.submit("hi").unwrap();
        let state = runtime.run_to_completion(run).await.unwrap();

        match state {
            StreamState::Error { message, .. } => assert_eq!(message, "server error: 500"),
            other => panic!("unexpected state {other:?}"),
        }
        let reply = assistant_reply(&runtime);
        assert!(reply.content.is_empty());
        assert_eq!(
            reply.status,
            MessageStatus::Error("server error: 500".to_string())
        );
    }

    #[tokio::test]
    async fn abort_keeps_partial_text_and_cancels() {
        let mut runtime = LocalRuntime::new(ScriptedAdapter::new(Script::Hang("Partial")));

        let mut run = runtime.submit("long answer please").unwrap();
        let first = run.next_event().await.unwrap();
        assert_eq!(first.payload, StreamEventPayload::Snapshot("Partial".into()));
        runtime.apply_stream_event(first).unwrap();

        run.abort();
        let state = runtime.run_to_completion(run).await.unwrap();

        assert!(matches!(state, StreamState::Cancelled(_)));
        let reply = assistant_reply(&runtime);
        assert_eq!(reply.text(), "Partial");
        assert_eq!(reply.status, MessageStatus::Cancelled);
    }

    #[tokio::test]
    async fn second_submit_while_streaming_is_rejected() {
        let mut runtime = LocalRuntime::new(ScriptedAdapter::new(Script::Hang("...")));

        let run = runtime.submit("one").unwrap();
        let error = runtime.submit("two").err().unwrap();
        assert!(matches!(error, RuntimeError::AlreadyStreaming { .. }));
        assert_eq!(runtime.threads().active().messages.len(), 2);

        // Other threads are independent.
        runtime.threads_mut().create();
        let other = runtime.submit("three").unwrap();
        assert_ne!(other.target().thread_id, run.target().thread_id);
        run.abort();
        other.abort();
    }

    #[tokio::test]
    async fn stale_session_events_are_ignored() {
        let mut runtime = LocalRuntime::new(ScriptedAdapter::new(Script::Chunks(&["a"])));

        let run = runtime.submit("hi").unwrap();
        let stale_target = run.target();
        runtime.run_to_completion(run).await.unwrap();

        let applied = runtime
            .apply_stream_event(StreamEventMapped::new(
                stale_target,
                StreamEventPayload::Snapshot("late".into()),
            ))
            .unwrap();
        assert!(!applied);
        assert_eq!(assistant_reply(&runtime).text(), "a");
    }

    #[tokio::test]
    async fn unknown_thread_is_an_error() {
        let mut runtime = LocalRuntime::new(ScriptedAdapter::new(Script::Chunks(&[])));

        let error = runtime.submit_to(ThreadId::new(99), "hi").err().unwrap();
        assert!(matches!(error, RuntimeError::UnknownThread { .. }));
    }

    #[tokio::test]
    async fn empty_response_completes_with_empty_reply() {
        let mut runtime = LocalRuntime::new(ScriptedAdapter::new(Script::Chunks(&[])));

        let run = runtime.submit("anything?").unwrap();
        let state = runtime.run_to_completion(run).await.unwrap();

        assert!(matches!(state, StreamState::Done(_)));
        assert_eq!(assistant_reply(&runtime).text(), "");
        assert_eq!(assistant_reply(&runtime).status, MessageStatus::Done);
    }
}
