//! Conversion between message bodies and method arguments.

use courier_message::{Message, MessageBody, MessageVersion};
use serde_json::{Map, Value};

use crate::errors::ServiceError;
use crate::invoker::{InvocationOutcome, MethodSignature};

/// Decodes request bodies into inputs and encodes results into replies.
pub trait MessageFormatter: Send + Sync {
    /// Fills `inputs` from the body of `message`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Deserialization`] when the body cannot be
    /// read, or a [`ServiceError::Message`] when it was already consumed.
    fn deserialize_request(
        &self,
        message: &mut Message,
        inputs: &mut [Value],
    ) -> Result<(), ServiceError>;

    /// Builds the reply body for a completed call.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Configuration`] when the outcome does not fit
    /// the formatter.
    fn serialize_reply(
        &self,
        version: MessageVersion,
        outcome: &InvocationOutcome,
    ) -> Result<Message, ServiceError>;
}

/// Formatter that maps parameters onto the members of a JSON object.
///
/// Requests are objects keyed by input parameter name; a missing member
/// leaves the input `null`. Replies are objects holding `<operation>Result`
/// for methods returning a value and one member per output parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonObjectFormatter {
    operation: String,
    inputs: Vec<String>,
    outputs: Vec<String>,
    returns_value: bool,
}

impl JsonObjectFormatter {
    /// Builds the formatter for a method's signature.
    #[must_use]
    pub fn for_signature(signature: &MethodSignature) -> Self {
        Self {
            operation: signature.name().to_owned(),
            inputs: signature.input_names().map(str::to_owned).collect(),
            outputs: signature.output_names().map(str::to_owned).collect(),
            returns_value: signature.returns_value(),
        }
    }

    /// Member name holding the return value.
    #[must_use]
    pub fn result_member(&self) -> String {
        format!("{}Result", self.operation)
    }
}

impl MessageFormatter for JsonObjectFormatter {
    fn deserialize_request(
        &self,
        message: &mut Message,
        inputs: &mut [Value],
    ) -> Result<(), ServiceError> {
        match message.read_payload()? {
            Value::Null => Ok(()),
            Value::Object(mut members) => {
                for (slot, name) in inputs.iter_mut().zip(&self.inputs) {
                    if let Some(value) = members.remove(name) {
                        *slot = value;
                    }
                }
                Ok(())
            }
            other => Err(ServiceError::deserialization(
                &self.operation,
                format!("expected a JSON object, found {}", json_kind(&other)),
            )),
        }
    }

    fn serialize_reply(
        &self,
        version: MessageVersion,
        outcome: &InvocationOutcome,
    ) -> Result<Message, ServiceError> {
        if outcome.outputs.len() != self.outputs.len() {
            return Err(ServiceError::configuration(format!(
                "operation '{}' has {} output members but the call produced {}",
                self.operation,
                self.outputs.len(),
                outcome.outputs.len()
            )));
        }
        let mut members = Map::new();
        if self.returns_value {
            members.insert(self.result_member(), outcome.return_value.clone());
        }
        for (name, value) in self.outputs.iter().zip(&outcome.outputs) {
            members.insert(name.clone(), value.clone());
        }
        Ok(Message::new(version, MessageBody::Payload(Value::Object(members))))
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};
    use serde_json::json;

    use super::*;
    use crate::invoker::Parameter;

    #[fixture]
    fn formatter() -> JsonObjectFormatter {
        JsonObjectFormatter::for_signature(
            &MethodSignature::new("Divide")
                .with_parameter(Parameter::input("dividend"))
                .with_parameter(Parameter::input("divisor"))
                .with_parameter(Parameter::output("remainder"))
                .returning(),
        )
    }

    #[rstest]
    fn fills_inputs_by_member_name(formatter: JsonObjectFormatter) {
        let mut message = Message::new(
            MessageVersion::default(),
            MessageBody::Payload(json!({ "divisor": 3, "dividend": 10, "extra": true })),
        );
        let mut inputs = vec![Value::Null; 2];

        formatter
            .deserialize_request(&mut message, &mut inputs)
            .expect("object payload decodes");

        assert_eq!(inputs, vec![json!(10), json!(3)]);
    }

    #[rstest]
    fn empty_body_leaves_inputs_null(formatter: JsonObjectFormatter) {
        let mut message = Message::new(MessageVersion::default(), MessageBody::Empty);
        let mut inputs = vec![Value::Null; 2];

        formatter
            .deserialize_request(&mut message, &mut inputs)
            .expect("empty body decodes");

        assert!(inputs.iter().all(Value::is_null));
    }

    #[rstest]
    fn rejects_non_object_payload(formatter: JsonObjectFormatter) {
        let mut message =
            Message::new(MessageVersion::default(), MessageBody::Payload(json!([1, 2])));
        let mut inputs = vec![Value::Null; 2];

        let error = formatter
            .deserialize_request(&mut message, &mut inputs)
            .expect_err("arrays are rejected");

        assert!(matches!(error, ServiceError::Deserialization { .. }));
    }

    #[rstest]
    fn reply_holds_result_and_outputs(formatter: JsonObjectFormatter) {
        let outcome = InvocationOutcome {
            return_value: json!(3),
            outputs: vec![json!(1)],
        };

        let mut reply = formatter
            .serialize_reply(MessageVersion::default(), &outcome)
            .expect("reply encodes");

        assert_eq!(
            reply.read_payload().expect("payload"),
            json!({ "DivideResult": 3, "remainder": 1 })
        );
    }
}
