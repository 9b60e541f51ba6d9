use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use smallvec::SmallVec;

use crate::failure::Failure;
use crate::ids::CallId;

/// Maximum inline metadata entries before heap allocation
/// Most calls carry ≤16 metadata pairs (JSF: no heap in hot path)
pub const MAX_INLINE_METADATA: usize = 16;

/// Metadata key whose value, when it parses as a ULID, becomes the call id
pub const CALL_ID_METADATA: &str = "x-call-id";

/// Stack-allocated call metadata (transport headers)
///
/// Keys use `Arc<str>` since the same few keys repeat on every call.
pub type Metadata = SmallVec<[(Arc<str>, String); MAX_INLINE_METADATA]>;

/// Events a dispatcher or service method emits on a streaming call.
#[derive(Debug, Clone, PartialEq)]
pub enum CallEvent {
    /// An outbound message
    Data(Value),
    /// The outbound side is finished
    End,
    /// The call failed; emitted at most once, by the dispatcher
    Error(Failure),
}

/// The transport's view of a streaming call.
///
/// Implemented by the transport collaborator. The dispatcher only ever uses
/// [`CallStream::emit`] with [`CallEvent::Error`]; service methods use it for
/// `Data` and `End`, and read client-streamed messages with [`CallStream::recv`].
pub trait CallStream: Send + Sync {
    fn emit(&self, event: CallEvent);

    /// Next inbound message, or `None` once the client has finished sending.
    fn recv(&self) -> BoxFuture<'_, Option<Value>> {
        Box::pin(futures::future::ready(None))
    }
}

/// The raw call object handed to a dispatcher by the transport.
///
/// Already decoded: this crate never touches wire bytes.
#[derive(Clone)]
pub struct Call {
    id: CallId,
    request: Value,
    metadata: Metadata,
    stream: Option<Arc<dyn CallStream>>,
}

impl Call {
    /// A call carrying a single decoded request message
    #[must_use]
    pub fn new(request: Value) -> Self {
        Self {
            id: CallId::generate(),
            request,
            metadata: Metadata::new(),
            stream: None,
        }
    }

    /// A streaming call; the request message (if any) is set with [`Call::with_request`]
    #[must_use]
    pub fn streaming(stream: Arc<dyn CallStream>) -> Self {
        Self {
            id: CallId::generate(),
            request: Value::Null,
            metadata: Metadata::new(),
            stream: Some(stream),
        }
    }

    #[must_use]
    pub fn with_request(mut self, request: Value) -> Self {
        self.request = request;
        self
    }

    #[must_use]
    pub fn with_id(mut self, id: CallId) -> Self {
        self.id = id;
        self
    }

    /// Append a metadata pair. An `x-call-id` entry holding a ULID also becomes
    /// the call id; any other value leaves the id unchanged.
    #[must_use]
    pub fn with_metadata(mut self, key: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        if key.eq_ignore_ascii_case(CALL_ID_METADATA) {
            if let Some(id) = CallId::from_metadata(&value) {
                self.id = id;
            }
        }
        self.metadata.push((Arc::from(key), value));
        self
    }

    #[must_use]
    pub fn id(&self) -> CallId {
        self.id
    }

    #[must_use]
    pub fn request(&self) -> &Value {
        &self.request
    }

    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Get a metadata value by key (case-insensitive, last write wins)
    #[inline]
    #[must_use]
    pub fn get_metadata(&self, key: &str) -> Option<&str> {
        self.metadata
            .iter()
            .rfind(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn stream(&self) -> Option<&Arc<dyn CallStream>> {
        self.stream.as_ref()
    }
}

impl fmt::Debug for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Call")
            .field("id", &self.id)
            .field("request", &self.request)
            .field("metadata", &self.metadata)
            .field("streaming", &self.stream.is_some())
            .finish()
    }
}
