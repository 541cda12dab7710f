use bytes::Bytes;

use crate::errors::HelperError;

/// Protocol constants
pub const CRLF: &[u8; 2] = b"\r\n";
pub const GEMINI_SCHEME: &str = "gemini";
/// Status sent by a server that wants the client to back off before retrying.
pub const SLOW_DOWN: &str = "44";

/// Gemini status families the helper acts on, keyed by the leading digit of the status.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum StatusFamily {
    /// 2x
    Success,
    /// 3x
    Redirect,
    /// 4x
    TemporaryFailure,
    /// 5x
    PermanentFailure,
}

impl StatusFamily {
    fn from_code(code: &str) -> Option<StatusFamily> {
        match code.as_bytes().first()? {
            b'2' => Some(StatusFamily::Success),
            b'3' => Some(StatusFamily::Redirect),
            b'4' => Some(StatusFamily::TemporaryFailure),
            b'5' => Some(StatusFamily::PermanentFailure),
            _ => None,
        }
    }
}

/// One parsed Gemini response: `<status-line>\r\n<body>`.
#[derive(Debug, Clone, PartialEq)]
pub struct GeminiResponse {
    pub status_line: String,
    pub family: StatusFamily,
    pub redirect_target: Option<String>,
    pub body: Bytes,
}

impl GeminiResponse {
    /// Parses a raw response; `resource` names the requested URL in error messages.
    pub fn parse(resource: &str, raw: Bytes) -> Result<GeminiResponse, HelperError> {
        let split = memchr::memmem::find(&raw, CRLF).ok_or_else(|| {
            HelperError::InvalidResponse(format!("no status line in response from {resource}"))
        })?;
        let status_line = std::str::from_utf8(&raw[..split])
            .map_err(|_| HelperError::DecodeFailure(format!("status line of {resource}")))?
            .to_string();
        let body = raw.slice(split + CRLF.len()..);

        let mut tokens = status_line.split_whitespace();
        let code = tokens.next().ok_or_else(|| {
            HelperError::InvalidResponse(format!("empty status line from {resource}"))
        })?;
        let family = StatusFamily::from_code(code).ok_or_else(|| {
            HelperError::InvalidResponse(format!(
                "unsupported status {status_line:?} from {resource}"
            ))
        })?;
        let redirect_target = match family {
            StatusFamily::Redirect => tokens.next().map(str::to_string),
            _ => None,
        };

        Ok(GeminiResponse {
            status_line,
            family,
            redirect_target,
            body,
        })
    }

    /// The first token of the status line, e.g. `20` or `44`.
    pub fn code(&self) -> &str {
        self.status_line.split_whitespace().next().unwrap_or("")
    }

    pub fn is_slow_down(&self) -> bool {
        self.code() == SLOW_DOWN
    }
}
