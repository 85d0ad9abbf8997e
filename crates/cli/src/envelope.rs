use concord_canon::CanonError;
use concord_engine::EngineError;
use concord_protocol::{ErrorEnvelope, ProtocolError};
use concord_registry::RegistryError;

/// Maps a command failure onto the JSON error body printed on stdout.
pub fn classify_error(err: &anyhow::Error) -> ErrorEnvelope {
    if let Some(protocol) = err.downcast_ref::<ProtocolError>() {
        return ErrorEnvelope::from(protocol);
    }
    if let Some(CanonError::Protocol(protocol)) = err.downcast_ref::<CanonError>() {
        return ErrorEnvelope::from(protocol);
    }
    if let Some(EngineError::Protocol(protocol)) = err.downcast_ref::<EngineError>() {
        return ErrorEnvelope::from(protocol);
    }

    let (code, hint) = if let Some(canon) = err.downcast_ref::<CanonError>() {
        let hint = match canon {
            CanonError::Config(_) => {
                Some("check the file named by --config or CONCORD_CONFIG".to_string())
            }
            CanonError::Extraction(_) => {
                Some("pass a listing draft as a JSON object".to_string())
            }
            _ => None,
        };
        (canon.code(), hint)
    } else if let Some(engine) = err.downcast_ref::<EngineError>() {
        (engine.code(), None)
    } else if err.downcast_ref::<RegistryError>().is_some() {
        ("registry", None)
    } else if err.downcast_ref::<std::io::Error>().is_some() {
        ("io", None)
    } else if err.downcast_ref::<serde_json::Error>().is_some() {
        ("serialization", None)
    } else {
        ("internal", None)
    };

    ErrorEnvelope {
        code: code.to_string(),
        message: format!("{err:#}"),
        hint,
    }
}
