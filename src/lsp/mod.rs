//! gopls client.
//!
//! [`LspSession`] drives the language server lifecycle over any pair of
//! byte streams; [`GoplsClient`] owns the gopls subprocess and its session.

pub mod framing;
pub mod protocol;
pub mod transport;

use crate::config::Config;
use crate::correlate::ReferenceProvider;
use crate::error::{GocallsError, Result};
use lsp_types::notification::{DidChangeConfiguration, Exit, Initialized};
use lsp_types::request::{Initialize, References, Shutdown};
use lsp_types::{
    ClientCapabilities, DidChangeConfigurationParams, InitializeParams, InitializeResult,
    InitializedParams, ReferenceClientCapabilities, ReferenceContext, ReferenceParams,
    TextDocumentClientCapabilities, TextDocumentIdentifier, TextDocumentPositionParams,
    WorkspaceFolder,
};
use protocol::{path_to_uri, position_from_one_based};
use serde::Serialize;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::time::{Duration, Instant};
use transport::Transport;

/// How long gopls gets to exit on its own after `exit` before it is killed.
const EXIT_GRACE: Duration = Duration::from_secs(5);

const EXIT_POLL: Duration = Duration::from_millis(50);

/// A reference reported by the server, 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceLocation {
    /// Document URI as sent by the server.
    pub uri: String,
    /// Filesystem path of the document.
    pub file: PathBuf,
    /// Start line (1-based).
    pub start_line: usize,
    /// Start column (1-based, UTF-16 code units).
    pub start_column: usize,
    /// End line (1-based).
    pub end_line: usize,
    /// End column (1-based, UTF-16 code units, exclusive).
    pub end_column: usize,
}

/// Lifecycle of a language server session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, `initialize` not sent yet.
    Unstarted,
    /// Waiting for the `initialize` response.
    Initializing,
    /// Accepting requests.
    Ready,
    /// `shutdown` sent.
    ShuttingDown,
    /// Finished, or failed to initialize.
    Closed,
}

/// One language server session over a reader/writer pair.
pub struct LspSession<W: Write> {
    transport: Transport<W>,
    state: SessionState,
}

impl<W: Write> LspSession<W> {
    /// Attach to a server; no message is sent until [`initialize`](Self::initialize).
    pub fn new<R>(reader: R, writer: W, timeout: Option<Duration>) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        Ok(LspSession {
            transport: Transport::new(reader, writer, timeout)?,
            state: SessionState::Unstarted,
        })
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run the `initialize` handshake for the workspace at `root`.
    ///
    /// A failed handshake leaves the session [`SessionState::Closed`].
    pub fn initialize(&mut self, root: &Path) -> Result<InitializeResult> {
        self.require(SessionState::Unstarted, "initialize")?;
        self.transition(SessionState::Initializing);

        match self.handshake(root) {
            Ok(result) => {
                self.transition(SessionState::Ready);
                Ok(result)
            }
            Err(e) => {
                self.transition(SessionState::Closed);
                Err(e)
            }
        }
    }

    fn handshake(&mut self, root: &Path) -> Result<InitializeResult> {
        let root_uri = path_to_uri(root)?;
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.display().to_string());

        // gopls still reads rootUri when no folder matches.
        #[allow(deprecated)]
        let params = InitializeParams {
            process_id: Some(std::process::id()),
            root_uri: Some(root_uri.clone()),
            workspace_folders: Some(vec![WorkspaceFolder {
                uri: root_uri,
                name,
            }]),
            capabilities: ClientCapabilities {
                text_document: Some(TextDocumentClientCapabilities {
                    references: Some(ReferenceClientCapabilities::default()),
                    ..Default::default()
                }),
                ..Default::default()
            },
            ..Default::default()
        };
        let result = self.transport.call::<Initialize>(params)?;
        if let Some(info) = &result.server_info {
            log::debug!(
                "connected to {} {}",
                info.name,
                info.version.as_deref().unwrap_or("")
            );
        }

        self.transport.notify::<Initialized>(InitializedParams {})?;
        self.transport
            .notify::<DidChangeConfiguration>(DidChangeConfigurationParams {
                settings: serde_json::json!({}),
            })?;
        Ok(result)
    }

    /// All references to the symbol at a 1-based position, declaration
    /// included. A `null` result is an empty list.
    pub fn references(
        &mut self,
        file: &Path,
        line: usize,
        column: usize,
    ) -> Result<Vec<ReferenceLocation>> {
        self.require(SessionState::Ready, "textDocument/references")?;

        let position =
            position_from_one_based(line, column).ok_or_else(|| GocallsError::Position {
                file: file.to_path_buf(),
                line,
                column,
                message: "positions are 1-based".to_string(),
            })?;
        let params = ReferenceParams {
            text_document_position: TextDocumentPositionParams {
                text_document: TextDocumentIdentifier {
                    uri: path_to_uri(file)?,
                },
                position,
            },
            work_done_progress_params: Default::default(),
            partial_result_params: Default::default(),
            context: ReferenceContext {
                include_declaration: true,
            },
        };

        self.transport
            .call::<References>(params)?
            .unwrap_or_default()
            .into_iter()
            .map(ReferenceLocation::try_from)
            .collect()
    }

    /// Send `shutdown` then `exit`. Idempotent; `exit` is sent even when
    /// `shutdown` fails, and the first error is returned.
    pub fn shutdown(&mut self) -> Result<()> {
        match self.state {
            SessionState::Closed => return Ok(()),
            SessionState::Ready => {}
            _ => {
                self.transition(SessionState::Closed);
                return Ok(());
            }
        }

        self.transition(SessionState::ShuttingDown);
        let shutdown = self.transport.call::<Shutdown>(());
        let exit = self.transport.notify::<Exit>(());
        self.transition(SessionState::Closed);
        shutdown.and(exit)
    }

    fn require(&self, state: SessionState, operation: &str) -> Result<()> {
        if self.state == state {
            Ok(())
        } else {
            Err(GocallsError::Session(format!(
                "cannot {} in state {:?}",
                operation, self.state
            )))
        }
    }

    fn transition(&mut self, next: SessionState) {
        log::debug!("lsp session {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

/// A gopls subprocess with an initialized session.
pub struct GoplsClient {
    child: Child,
    session: Option<LspSession<BufWriter<ChildStdin>>>,
    closed: bool,
}

impl GoplsClient {
    /// Spawn gopls in the workspace root and complete the handshake.
    ///
    /// The process is killed if the handshake fails.
    pub fn start(config: &Config) -> Result<Self> {
        log::debug!(
            "starting {} {}",
            config.gopls.display(),
            config.gopls_args.join(" ")
        );
        let mut child = Command::new(&config.gopls)
            .args(&config.gopls_args)
            .current_dir(&config.workspace_root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| GocallsError::io(&config.gopls, e))?;

        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(GocallsError::Session(
                    "gopls stdio was not captured".to_string(),
                ));
            }
        };

        let mut client = GoplsClient {
            child,
            session: None,
            closed: false,
        };

        let session = LspSession::new(stdout, BufWriter::new(stdin), config.request_timeout)
            .and_then(|mut session| {
                session.initialize(&config.workspace_root)?;
                Ok(session)
            });
        match session {
            Ok(session) => {
                client.session = Some(session);
                Ok(client)
            }
            Err(e) => {
                let _ = client.child.kill();
                Err(e)
            }
        }
    }

    /// State of the underlying session.
    pub fn state(&self) -> SessionState {
        self.session
            .as_ref()
            .map_or(SessionState::Closed, LspSession::state)
    }

    /// Shut the server down and reap the process. Idempotent.
    ///
    /// The process is killed if it has not exited shortly after `exit`.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let result = match self.session.take() {
            Some(mut session) => session.shutdown(),
            None => Ok(()),
        };
        // The session is dropped by now, which closes gopls' stdin.
        self.wait_or_kill(EXIT_GRACE);
        result
    }

    fn wait_or_kill(&mut self, grace: Duration) {
        let deadline = Instant::now() + grace;
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    log::debug!("gopls exited with {}", status);
                    return;
                }
                Ok(None) if Instant::now() < deadline => std::thread::sleep(EXIT_POLL),
                Ok(None) => {
                    log::warn!("gopls did not exit within {}s, killing it", grace.as_secs());
                    break;
                }
                Err(e) => {
                    log::warn!("failed to wait for gopls: {}", e);
                    break;
                }
            }
        }
        if let Err(e) = self.child.kill() {
            log::warn!("failed to kill gopls: {}", e);
        }
        let _ = self.child.wait();
    }
}

impl ReferenceProvider for GoplsClient {
    fn references(
        &mut self,
        file: &Path,
        line: usize,
        column: usize,
    ) -> Result<Vec<ReferenceLocation>> {
        match self.session.as_mut() {
            Some(session) => session.references(file, line, column),
            None => Err(GocallsError::Session("gopls client is closed".to_string())),
        }
    }
}

impl Drop for GoplsClient {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("gopls did not shut down cleanly: {}", e);
        }
    }
}
