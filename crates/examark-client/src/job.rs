//! Marking job submission and result streaming.
//!
//! A job is one POST to `/mark` answered with a line-delimited event stream.
//! The response is decoded into [`Frame`]s, which drive the synchronizer and
//! surface to the caller as typed [`JobEvent`]s. Consumption is pull-based:
//! nothing advances unless the caller polls, and dropping the stream cancels
//! the job client-side.
//!
//! The job-running flag is lowered exactly once per job, whichever way the
//! stream ends: completion, error frame, transport failure, bare EOS, or the
//! caller dropping the stream mid-flight.

use std::pin::Pin;
use std::sync::Arc;

use async_stream::try_stream;
use base64::Engine;
use futures::{Stream, StreamExt};
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use tracing::{debug, warn};

use examark_core::{MessageId, Session, SessionId};
use examark_protocol::{decode_lines, interpret_line, Frame, ProgressFrame};
use examark_sync::Synchronizer;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::sessions::expect_success;

/// Path of the job submission endpoint.
pub(crate) const MARK_PATH: &str = "/mark";

/// One uploaded document in a file-based job.
#[derive(Clone, Debug)]
pub struct JobFile {
    /// File name shown to the marker.
    pub name: String,
    /// MIME type, e.g. `application/pdf`.
    pub content_type: String,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

/// The work to submit for marking.
#[derive(Clone, Debug)]
pub enum JobRequest {
    /// Pasted-in text of the paper.
    Text {
        /// The paper text.
        paper: String,
    },
    /// Uploaded documents, with optional extra instructions.
    Files {
        /// The documents to mark.
        files: Vec<JobFile>,
        /// Extra instructions for the marker.
        custom_text: Option<String>,
    },
}

impl JobRequest {
    /// The text staged into the local conversation for this submission.
    pub(crate) fn display_text(&self) -> String {
        match self {
            Self::Text { paper } => paper.clone(),
            Self::Files { files, custom_text } => match custom_text {
                Some(text) if !text.trim().is_empty() => text.clone(),
                _ => {
                    let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
                    format!("Uploaded: {}", names.join(", "))
                }
            },
        }
    }

    /// Base64 payloads for locally staged attachments.
    pub(crate) fn attachment_payloads(&self) -> Vec<String> {
        match self {
            Self::Text { .. } => Vec::new(),
            Self::Files { files, .. } => files
                .iter()
                .map(|f| base64::engine::general_purpose::STANDARD.encode(&f.bytes))
                .collect(),
        }
    }
}

/// Events pulled off a job stream.
#[derive(Clone, Debug)]
pub enum JobEvent {
    /// A progress checklist update.
    Progress(ProgressFrame),
    /// A frame the protocol does not know yet, forwarded for the consumer to
    /// ignore or handle.
    Unknown(serde_json::Value),
    /// The terminal result, already merged into the synchronizer.
    Completed(Session),
}

/// Pull-based stream of job events. Dropping it abandons the job client-side
/// and lowers the job-running flag.
pub type JobStream = Pin<Box<dyn Stream<Item = Result<JobEvent>> + Send>>;

/// Identity context a job is submitted under.
pub(crate) struct JobContext {
    /// Current session id at submission time (may be temporary).
    pub(crate) origin: SessionId,
    /// Sent to the server only when the session already has a permanent id.
    pub(crate) session_id: Option<SessionId>,
    /// Identity of the staged assistant placeholder.
    pub(crate) ai_message_id: MessageId,
    /// Model the service should mark with.
    pub(crate) model: String,
}

/// JSON body for text submissions.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MarkRequestBody<'a> {
    paper: &'a str,
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<&'a SessionId>,
    ai_message_id: &'a MessageId,
}

/// Lowers the job-running flag exactly once, on explicit finish or on drop.
struct FinishGuard {
    sync: Option<Arc<Synchronizer>>,
}

impl FinishGuard {
    fn new(sync: Arc<Synchronizer>) -> Self {
        sync.begin_job();
        Self { sync: Some(sync) }
    }

    fn finish(&mut self) {
        if let Some(sync) = self.sync.take() {
            sync.end_job();
        }
    }
}

impl Drop for FinishGuard {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Submit a job and expose its event stream.
///
/// Raises the job-running flag before the request goes out; any failure from
/// here on lowers it again on the way back to the caller.
pub(crate) async fn submit(
    http: &reqwest::Client,
    config: &ClientConfig,
    sync: Arc<Synchronizer>,
    context: JobContext,
    request: &JobRequest,
) -> Result<JobStream> {
    let guard = FinishGuard::new(Arc::clone(&sync));
    let url = config.endpoint(MARK_PATH);

    let mut builder = http.post(&url);
    if let Some(key) = &config.api_key {
        builder = builder.bearer_auth(key);
    }
    builder = match request {
        JobRequest::Text { paper } => builder.json(&MarkRequestBody {
            paper,
            model: &context.model,
            session_id: context.session_id.as_ref(),
            ai_message_id: &context.ai_message_id,
        }),
        JobRequest::Files { files, custom_text } => {
            builder.multipart(build_form(files, custom_text.as_deref(), &context)?)
        }
    };

    debug!(
        model = %context.model,
        session_id = ?context.session_id,
        "submitting marking job"
    );

    let response = builder.send().await?;
    let response = expect_success(response).await?;

    let lines = decode_lines(Box::pin(response.bytes_stream()));
    let origin = context.origin;

    let stream = try_stream! {
        let mut guard = guard;
        let mut lines = std::pin::pin!(lines);
        while let Some(line) = lines.next().await {
            let line = line?;
            let Some(frame) = interpret_line(&line) else {
                continue;
            };
            match frame {
                Frame::Progress(progress) => {
                    yield JobEvent::Progress(progress);
                }
                Frame::Completion(completion) => {
                    let merged =
                        sync.apply_job_result(Some(&origin), &completion.unified_session);
                    guard.finish();
                    if let Some(session) = merged {
                        yield JobEvent::Completed(session);
                    }
                    return;
                }
                Frame::Error(error) => {
                    guard.finish();
                    Err(ClientError::Stream {
                        message: error.error,
                        credits_exhausted: error.credits_exhausted,
                    })?;
                }
                Frame::Unknown(value) => {
                    debug!(frame = %value, "forwarding unrecognized frame");
                    yield JobEvent::Unknown(value);
                }
            }
        }
        warn!("job stream ended without a completion frame");
    };

    Ok(Box::pin(stream))
}

fn build_form(files: &[JobFile], custom_text: Option<&str>, context: &JobContext) -> Result<Form> {
    let mut form = Form::new()
        .text("model", context.model.clone())
        .text("aiMessageId", context.ai_message_id.to_string());
    if let Some(id) = &context.session_id {
        form = form.text("sessionId", id.to_string());
    }
    if let Some(text) = custom_text {
        form = form.text("customText", text.to_string());
    }
    for file in files {
        let part = Part::bytes(file.bytes.clone())
            .file_name(file.name.clone())
            .mime_str(&file.content_type)?;
        form = form.part("files", part);
    }
    Ok(form)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
