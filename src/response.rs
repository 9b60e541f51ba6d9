//! Response values held in a call's reply slot.
//!
//! Business logic and middleware may send either a plain JSON value or a
//! [`Response`] wrapper. Plain values pass through untouched; a `Response` is
//! converted to its wire form only when the dispatcher delivers the final result.

use serde::Serialize;
use serde_json::Value;

use crate::failure::Failure;

/// Wrapper around a response payload with an explicit wire-conversion step.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    payload: Value,
}

impl Response {
    #[must_use]
    pub fn new(payload: Value) -> Self {
        Self { payload }
    }

    /// Build a response from any serializable message type.
    pub fn from_serialize<T: Serialize>(message: &T) -> Result<Self, Failure> {
        Ok(Self::new(serde_json::to_value(message)?))
    }

    #[must_use]
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// The object handed to the transport for encoding.
    #[must_use]
    pub fn to_wire(&self) -> Value {
        self.payload.clone()
    }

    #[must_use]
    pub fn into_wire(self) -> Value {
        self.payload
    }
}

/// Contents of a call's reply slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// A value sent as-is
    Plain(Value),
    /// A wrapped response, converted at delivery
    Response(Response),
}

impl Reply {
    /// The structural empty value delivered when business logic returns nothing.
    #[must_use]
    pub fn empty() -> Self {
        Reply::Plain(Value::Object(serde_json::Map::new()))
    }

    #[must_use]
    pub fn into_wire(self) -> Value {
        match self {
            Reply::Plain(value) => value,
            Reply::Response(response) => response.into_wire(),
        }
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Reply::Plain(value)
    }
}

impl From<Response> for Reply {
    fn from(response: Response) -> Self {
        Reply::Response(response)
    }
}

impl From<&str> for Reply {
    fn from(value: &str) -> Self {
        Reply::Plain(Value::String(value.to_string()))
    }
}

impl From<String> for Reply {
    fn from(value: String) -> Self {
        Reply::Plain(Value::String(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wrapped_response_converts_at_delivery() {
        let reply = Reply::from(Response::new(json!({"message": "message"})));
        assert_eq!(reply.into_wire(), json!({"message": "message"}));
    }

    #[test]
    fn plain_values_pass_through() {
        assert_eq!(Reply::from("response").into_wire(), json!("response"));
        assert_eq!(Reply::empty().into_wire(), json!({}));
    }

    #[derive(Serialize)]
    struct Greeting {
        message: &'static str,
    }

    #[test]
    fn serializable_messages_become_payloads() {
        let response = Response::from_serialize(&Greeting { message: "hi" }).unwrap();
        assert_eq!(response.payload(), &json!({"message": "hi"}));
    }
}
