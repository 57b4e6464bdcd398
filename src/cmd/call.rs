use std::io;

use serde_json::{Map, Value};

use crate::context::AppContext;
use crate::domain::operation::OperationRequest;
use crate::error::{AppError, AppResult, OperationError};
use crate::workflow::operations::OperationResponse;

#[derive(Debug, Clone)]
pub struct CallCommandArgs {
    pub operation: String,
    /// JSON object text, `-` to read it from stdin, or `None` for no arguments.
    pub arguments: Option<String>,
}

pub async fn run(ctx: &AppContext, args: CallCommandArgs) -> OperationResponse {
    let arguments = match parse_arguments(args.arguments.as_deref()) {
        Ok(arguments) => arguments,
        Err(err) => return OperationResponse::from(Err(OperationError::from(err))),
    };

    let result = ctx
        .adapter()
        .invoke(OperationRequest::new(args.operation, arguments))
        .await;
    OperationResponse::from(result)
}

fn parse_arguments(raw: Option<&str>) -> AppResult<Map<String, Value>> {
    let text = match raw {
        None => return Ok(Map::new()),
        Some("-") => io::read_to_string(io::stdin())?,
        Some(text) => text.to_string(),
    };
    if text.trim().is_empty() {
        return Ok(Map::new());
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(AppError::validation("arguments must be a JSON object")),
        Err(err) => Err(AppError::validation(format!(
            "arguments are not valid JSON: {err}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_arguments_are_an_empty_object() {
        assert!(parse_arguments(None).unwrap().is_empty());
        assert!(parse_arguments(Some("  ")).unwrap().is_empty());
    }

    #[test]
    fn parses_object_arguments() {
        let args = parse_arguments(Some(r#"{"id": 7}"#)).unwrap();
        assert_eq!(args.get("id"), Some(&Value::from(7)));
    }

    #[test]
    fn rejects_non_object_arguments() {
        assert!(matches!(
            parse_arguments(Some("[1, 2]")),
            Err(AppError::Validation { .. })
        ));
        assert!(matches!(
            parse_arguments(Some("{id: 7")),
            Err(AppError::Validation { .. })
        ));
    }
}
