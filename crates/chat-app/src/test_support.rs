use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use resume_llm::{
    AdapterError, AdapterResult, ChatModelAdapter, ChatModelRunResult, RunHandle, RunRequest,
    ThreadMessage, snapshot_channel,
};

#[derive(Debug, Clone, Copy)]
pub(crate) enum Script {
    /// Sends the running concatenation of each chunk, then ends.
    Chunks(&'static [&'static str]),
    Status(u16),
    /// Sends one snapshot, then waits for the abort signal.
    Hang(&'static str),
}

/// Adapter that replays a fixed script and records every history it was given.
pub(crate) struct ScriptedAdapter {
    script: Script,
    pub(crate) seen: Mutex<Vec<Vec<ThreadMessage>>>,
}

impl ScriptedAdapter {
    pub(crate) fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            seen: Mutex::new(Vec::new()),
        })
    }
}

impl ChatModelAdapter for ScriptedAdapter {
    fn id(&self) -> &str {
        "scripted"
    }

    fn run(&self, request: RunRequest) -> AdapterResult<RunHandle> {
        self.seen.lock().unwrap().push(request.messages.clone());
        let (event_tx, stream, signal) = snapshot_channel(&request.abort_signal);
        let script = self.script;

        let worker = Box::pin(async move {
            match script {
                Script::Chunks(chunks) => {
                    let mut accumulated = String::new();
                    for chunk in chunks {
                        accumulated.push_str(chunk);
                        let snapshot = ChatModelRunResult::from_text(accumulated.clone());
                        if event_tx.send(Ok(snapshot)).is_err() {
                            return;
                        }
                    }
                }
                Script::Status(status) => {
                    let _ = event_tx.send(Err(AdapterError::ServerStatus {
                        stage: "scripted",
                        status,
                    }));
                }
                Script::Hang(first) => {
                    let _ = event_tx.send(Ok(ChatModelRunResult::from_text(first)));
                    signal.aborted().await;
                }
            }
        });

        Ok(RunHandle { stream, worker })
    }
}

/// Runs an async test inside a figment jail with every environment variable cleared.
///
/// The closure receives the jail's scratch directory.
pub(crate) fn in_clean_env<F, Fut>(test: F)
where
    F: FnOnce(PathBuf) -> Fut,
    Fut: Future<Output = ()>,
{
    figment::Jail::expect_with(|jail| {
        jail.clear_env();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(test(jail.directory().to_path_buf()));
        Ok(())
    });
}
