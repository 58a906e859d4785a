//! Normalize caller-supplied process input to a readable stream or bytes.

use tokio::io::AsyncRead;

/// A process's stdin source: absent, an in-memory byte string, or an
/// arbitrary async-readable stream the engine drains as it writes.
pub enum Input {
    None,
    Bytes(Vec<u8>),
    Stream(Box<dyn AsyncRead + Send + Unpin>),
}

impl std::fmt::Debug for Input {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Input::None => write!(f, "Input::None"),
            Input::Bytes(b) => write!(f, "Input::Bytes({} bytes)", b.len()),
            Input::Stream(_) => write!(f, "Input::Stream(..)"),
        }
    }
}

/// A scalar value that can be coerced to a string for use as process input.
pub enum Scalar {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl From<Scalar> for String {
    fn from(value: Scalar) -> Self {
        match value {
            Scalar::Str(s) => s,
            Scalar::Int(n) => n.to_string(),
            Scalar::Bool(b) => b.to_string(),
        }
    }
}

/// Caller-supplied input before normalization: nothing, an async stream, or
/// a scalar to be coerced to bytes.
pub enum RawInput {
    None,
    Stream(Box<dyn AsyncRead + Send + Unpin>),
    Scalar(Scalar),
}

/// Normalize `input` for use by `caller`. `nil` becomes `Input::None`; a
/// stream is passed through; a scalar is coerced to a string and wrapped in
/// `Input::Bytes`.
pub fn validate(caller: &'static str, input: RawInput) -> crate::error::Result<Input> {
    match input {
        RawInput::None => Ok(Input::None),
        RawInput::Stream(s) => Ok(Input::Stream(s)),
        RawInput::Scalar(scalar) => Ok(Input::Bytes(String::from(scalar).into_bytes())),
    }
}

impl Input {
    /// Produce an independent copy suitable for starting over: byte payloads
    /// are duplicated, a stream source cannot be replayed and resets to
    /// `None`.
    pub fn fork_for_restart(&self) -> Input {
        match self {
            Input::None => Input::None,
            Input::Bytes(b) => Input::Bytes(b.clone()),
            Input::Stream(_) => Input::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_stays_none() {
        let input = validate("set_input", RawInput::None).unwrap();
        assert!(matches!(input, Input::None));
    }

    #[test]
    fn scalar_string_coerces_to_bytes() {
        let input = validate("set_input", RawInput::Scalar(Scalar::Str("ping".into()))).unwrap();
        match input {
            Input::Bytes(b) => assert_eq!(b, b"ping"),
            _ => panic!("expected Bytes"),
        }
    }

    #[test]
    fn scalar_int_coerces_to_decimal_string() {
        let input = validate("set_input", RawInput::Scalar(Scalar::Int(42))).unwrap();
        match input {
            Input::Bytes(b) => assert_eq!(b, b"42"),
            _ => panic!("expected Bytes"),
        }
    }

    #[test]
    fn scalar_bool_coerces_to_true_false() {
        let input = validate("set_input", RawInput::Scalar(Scalar::Bool(true))).unwrap();
        match input {
            Input::Bytes(b) => assert_eq!(b, b"true"),
            _ => panic!("expected Bytes"),
        }
    }
}
