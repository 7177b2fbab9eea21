//! Argument codec
//!
//! Encodes an ordered list of argument values into a single delimited text
//! blob, and splits such a blob back into per-slot values. Individual values
//! are serialized with serde_json; this module only defines how multiple
//! serialized values are concatenated and split apart again.

use crate::error::CodecError;
use serde_json::Value;

/// Separator between serialized argument values.
///
/// A line break, four double-quote characters, and another line break. A
/// single-character separator (comma, pipe) would collide with JSON payloads;
/// this sequence is vanishingly improbable inside structured text output.
/// The exact string is part of the wire format: rows written by earlier
/// versions must keep splitting identically.
pub const ARGS_DELIMITER: &str = "\n\"\"\"\"\n";

/// One argument slot of a described call
#[derive(Debug, Clone, PartialEq)]
pub enum JobArg {
    /// A serializable value
    Value(Value),
    /// An explicit null; occupies a slot, serializes to an empty segment
    Null,
    /// Run-context marker: filled in with the live execution context at
    /// replay time, never serialized
    Context,
}

/// Static parameter kind of a target method slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Ordinary serializable parameter
    Value,
    /// Run-context parameter, substituted at invocation time
    Context,
}

/// Encodes argument slots into one delimited blob.
///
/// `Null` and `Context` slots become empty segments but still occupy a
/// position, so the segment count always equals the slot count. An empty
/// slice encodes to an empty string.
pub fn encode_args(args: &[JobArg]) -> Result<String, CodecError> {
    let mut segments = Vec::with_capacity(args.len());
    for (slot, arg) in args.iter().enumerate() {
        match arg {
            JobArg::Value(value) => {
                let text = serde_json::to_string(value)
                    .map_err(|source| CodecError::Serialize { slot, source })?;
                segments.push(text);
            }
            JobArg::Null | JobArg::Context => segments.push(String::new()),
        }
    }
    Ok(segments.join(ARGS_DELIMITER))
}

/// Decodes a blob into one argument per declared parameter.
///
/// The blob is split on the exact delimiter string, never a regex or a
/// character set, so the split cannot land inside a value. The segment count
/// must match the parameter count. An empty blob is only accepted when the
/// parameter list is empty or consists solely of context parameters, in
/// which case the slots are synthesized rather than decoded.
pub fn decode_args(blob: &str, params: &[ParamKind]) -> Result<Vec<JobArg>, CodecError> {
    if params.is_empty() {
        return Ok(Vec::new());
    }

    if blob.is_empty() {
        if params.iter().all(|kind| *kind == ParamKind::Context) {
            return Ok(vec![JobArg::Context; params.len()]);
        }
        return Err(CodecError::MissingArguments {
            expected: params.len(),
        });
    }

    let segments: Vec<&str> = blob.split(ARGS_DELIMITER).collect();
    if segments.len() != params.len() {
        return Err(CodecError::ArgumentCountMismatch {
            expected: params.len(),
            actual: segments.len(),
        });
    }

    let mut args = Vec::with_capacity(params.len());
    for (slot, (segment, kind)) in segments.iter().zip(params).enumerate() {
        let arg = match kind {
            ParamKind::Context => JobArg::Context,
            ParamKind::Value if segment.is_empty() => JobArg::Null,
            ParamKind::Value => {
                let value = serde_json::from_str(segment)
                    .map_err(|source| CodecError::Deserialize { slot, source })?;
                JobArg::Value(value)
            }
        };
        args.push(arg);
    }
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_args_encode_to_empty_string() {
        assert_eq!(encode_args(&[]).unwrap(), "");
        assert_eq!(decode_args("", &[]).unwrap(), Vec::new());
    }

    #[test]
    fn test_round_trip_with_null_and_context() {
        let args = vec![
            JobArg::Value(json!("hello")),
            JobArg::Context,
            JobArg::Value(json!(42)),
            JobArg::Null,
        ];
        let params = [
            ParamKind::Value,
            ParamKind::Context,
            ParamKind::Value,
            ParamKind::Value,
        ];

        let blob = encode_args(&args).unwrap();
        assert_eq!(blob.matches(ARGS_DELIMITER).count(), 3);

        let decoded = decode_args(&blob, &params).unwrap();
        assert_eq!(decoded, args);
    }

    #[test]
    fn test_value_containing_newlines_and_quotes_survives() {
        // JSON string escaping keeps raw newlines out of segments, so a
        // hostile-looking payload cannot produce the delimiter sequence.
        let hostile = "line one\n\"\"\"\"\nline two";
        let args = vec![JobArg::Value(json!(hostile)), JobArg::Value(json!(1))];
        let params = [ParamKind::Value, ParamKind::Value];

        let blob = encode_args(&args).unwrap();
        let decoded = decode_args(&blob, &params).unwrap();
        assert_eq!(decoded, args);
    }

    #[test]
    fn test_segment_count_mismatch() {
        let blob = encode_args(&[JobArg::Value(json!(1)), JobArg::Value(json!(2))]).unwrap();
        let err = decode_args(&blob, &[ParamKind::Value]).unwrap_err();
        match err {
            CodecError::ArgumentCountMismatch { expected, actual } => {
                assert_eq!(expected, 1);
                assert_eq!(actual, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_blob_with_value_params_fails() {
        let err = decode_args("", &[ParamKind::Value, ParamKind::Context]).unwrap_err();
        assert!(matches!(err, CodecError::MissingArguments { expected: 2 }));
    }

    #[test]
    fn test_empty_blob_with_all_context_params_synthesizes() {
        let decoded = decode_args("", &[ParamKind::Context, ParamKind::Context]).unwrap();
        assert_eq!(decoded, vec![JobArg::Context, JobArg::Context]);
    }

    #[test]
    fn test_empty_segment_decodes_to_null() {
        let blob = encode_args(&[JobArg::Null, JobArg::Value(json!(true))]).unwrap();
        let decoded = decode_args(&blob, &[ParamKind::Value, ParamKind::Value]).unwrap();
        assert_eq!(decoded, vec![JobArg::Null, JobArg::Value(json!(true))]);
    }

    #[test]
    fn test_delimiter_is_exact() {
        assert_eq!(ARGS_DELIMITER, "\n\"\"\"\"\n");
    }
}
