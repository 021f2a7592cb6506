//! Request-local handle onto a loaded submission.
//!
//! A `BoundContext` owns one sandbox worker for the duration of a grading
//! request. Every operation is a single request/response exchange bounded by
//! the request's wall-clock deadline. Once the worker is lost the context is
//! poisoned and every later operation fails immediately.

use agrolab_common::types::RequiredSymbol;
use tokio::io::AsyncWriteExt;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{CallError, LoadError};
use crate::protocol::{self, Phase, Request, Response, WireSymbol};
use crate::sandbox::Session;
use crate::value::PyValue;

const TRUNCATION_MARKER: &str = "\n[output truncated]\n";

pub struct BoundContext {
    session: Session,
    deadline: Instant,
    output: String,
    max_output_bytes: usize,
    truncated: bool,
    lost: Option<String>,
}

impl BoundContext {
    pub fn new(session: Session, deadline: Instant, max_output_bytes: usize) -> Self {
        Self {
            session,
            deadline,
            output: String::new(),
            max_output_bytes,
            truncated: false,
            lost: None,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// True once the worker has died or broken the protocol
    pub fn is_lost(&self) -> bool {
        self.lost.is_some()
    }

    /// Everything the submission printed so far
    pub fn captured_output(&self) -> &str {
        &self.output
    }

    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    /// Evaluate the submission and check that it defines `required`
    pub async fn load(&mut self, source: &str, required: &[RequiredSymbol]) -> Result<(), LoadError> {
        let request = Request::Load {
            source,
            required: required.iter().map(WireSymbol::from).collect(),
        };
        let response = match self.exchange(&request).await {
            Ok(response) => response,
            Err(CallError::Deadline) => return Err(LoadError::Deadline),
            Err(CallError::Sandbox(msg)) => return Err(LoadError::Sandbox(msg)),
            Err(CallError::Raised(raised)) => return Err(LoadError::Compile(raised.to_string())),
        };
        if response.ok {
            return Ok(());
        }

        let Some(error) = response.error else {
            return Err(LoadError::Sandbox(
                "protocol error: load failed without an error payload".to_string(),
            ));
        };
        match error.phase {
            Some(Phase::Symbols) => Err(LoadError::Compile(error.message)),
            Some(Phase::Protocol) => Err(LoadError::Sandbox(format!("protocol error: {}", error.message))),
            // Compile, Exec or unknown: the submission could not be bound
            _ => Err(LoadError::Compile(error.into_raised().to_string())),
        }
    }

    pub async fn call(&mut self, name: &str, args: Vec<PyValue>) -> Result<PyValue, CallError> {
        self.call_kw(name, args, &[]).await
    }

    pub async fn call_kw(
        &mut self,
        name: &str,
        args: Vec<PyValue>,
        kwargs: &[(&str, PyValue)],
    ) -> Result<PyValue, CallError> {
        let request = Request::Call {
            target: name,
            args: protocol::encode_args(&args),
            kwargs: protocol::encode_kwargs(kwargs),
        };
        self.value_of(&request).await
    }

    pub async fn call_method(
        &mut self,
        obj: &PyValue,
        name: &str,
        args: Vec<PyValue>,
    ) -> Result<PyValue, CallError> {
        self.call_method_kw(obj, name, args, &[]).await
    }

    pub async fn call_method_kw(
        &mut self,
        obj: &PyValue,
        name: &str,
        args: Vec<PyValue>,
        kwargs: &[(&str, PyValue)],
    ) -> Result<PyValue, CallError> {
        let request = Request::CallMethod {
            obj: obj.to_wire(),
            name,
            args: protocol::encode_args(&args),
            kwargs: protocol::encode_kwargs(kwargs),
        };
        self.value_of(&request).await
    }

    pub async fn get_attr(&mut self, obj: &PyValue, name: &str) -> Result<PyValue, CallError> {
        let request = Request::GetAttr {
            obj: obj.to_wire(),
            name,
        };
        self.value_of(&request).await
    }

    pub async fn set_attr(
        &mut self,
        obj: &PyValue,
        name: &str,
        value: impl Into<PyValue>,
    ) -> Result<(), CallError> {
        let request = Request::SetAttr {
            obj: obj.to_wire(),
            name,
            value: value.into().to_wire(),
        };
        self.value_of(&request).await.map(|_| ())
    }

    /// `str(obj)` evaluated inside the sandbox
    pub async fn to_str(&mut self, obj: &PyValue) -> Result<String, CallError> {
        let request = Request::Str { obj: obj.to_wire() };
        match self.value_of(&request).await? {
            PyValue::Str(s) => Ok(s),
            other => Err(CallError::Sandbox(format!("str() returned {}", other.type_name()))),
        }
    }

    /// `isinstance(obj, class)` where `class` is a name visible to the submission
    pub async fn is_instance(&mut self, obj: &PyValue, class: &str) -> Result<bool, CallError> {
        let request = Request::IsInstance {
            obj: obj.to_wire(),
            class,
        };
        match self.value_of(&request).await? {
            PyValue::Bool(b) => Ok(b),
            other => Err(CallError::Sandbox(format!("isinstance() returned {}", other.type_name()))),
        }
    }

    async fn value_of(&mut self, request: &Request<'_>) -> Result<PyValue, CallError> {
        let response = self.exchange(request).await?;
        if response.ok {
            // A malformed value is a protocol error for this call only
            return PyValue::from_wire(&response.value)
                .map_err(|e| CallError::Sandbox(format!("protocol error: {}", e)));
        }
        match response.error {
            Some(error) if error.phase == Some(Phase::Protocol) => {
                Err(CallError::Sandbox(format!("protocol error: {}", error.message)))
            }
            Some(error) => Err(CallError::Raised(error.into_raised())),
            None => Err(CallError::Sandbox(
                "protocol error: failure without an error payload".to_string(),
            )),
        }
    }

    /// One request line out, one response line back, within the deadline
    async fn exchange(&mut self, request: &Request<'_>) -> Result<Response, CallError> {
        if let Some(reason) = &self.lost {
            return Err(CallError::Sandbox(reason.clone()));
        }
        if Instant::now() >= self.deadline {
            return Err(CallError::Deadline);
        }

        let line = protocol::frame(request);
        let session = &mut self.session;
        let roundtrip = async {
            session.requests.write_all(&line).await?;
            session.requests.flush().await?;
            Ok::<_, std::io::Error>(session.responses.recv().await)
        };

        let reply = match tokio::time::timeout_at(self.deadline, roundtrip).await {
            Err(_) => {
                debug!("deadline reached while waiting on worker");
                return Err(CallError::Deadline);
            }
            Ok(Err(e)) => return Err(self.poison(format!("failed to write to worker: {}", e))),
            Ok(Ok(None)) => return Err(self.poison("worker exited unexpectedly".to_string())),
            Ok(Ok(Some(reply))) => reply,
        };

        let response: Response = serde_json::from_str(&reply).map_err(|e| {
            warn!(error = %e, "unparseable worker response");
            CallError::Sandbox(format!("protocol error: {}", e))
        })?;
        self.capture(&response.output);
        Ok(response)
    }

    fn capture(&mut self, text: &str) {
        if self.truncated || text.is_empty() {
            return;
        }
        let room = self.max_output_bytes.saturating_sub(self.output.len());
        if text.len() <= room {
            self.output.push_str(text);
            return;
        }
        let mut cut = room;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        self.output.push_str(&text[..cut]);
        self.output.push_str(TRUNCATION_MARKER);
        self.truncated = true;
    }

    fn poison(&mut self, reason: String) -> CallError {
        warn!(reason = %reason, "sandbox worker lost");
        self.lost = Some(reason.clone());
        CallError::Sandbox(reason)
    }
}
