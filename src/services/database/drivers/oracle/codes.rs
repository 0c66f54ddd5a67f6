//! Oracle error code classification.
//!
//! Maps `ORA-` and `DPI-` codes to a [`FailureKind`]. Codes that are not
//! listed stay `Unclassified` at connect time, which lets the message
//! heuristics in the connection layer have a look.

use crate::services::database::traits::{DriverError, FailureKind};

const LISTENER_CODES: &[i32] = &[
    12170, // connect timeout occurred
    12505, // listener does not know of SID
    12514, // listener does not know of service
    12528, // all instances blocking new connections
    12535, // operation timed out
    12541, // no listener
    12543, // destination host unreachable
    12545, // target host or object does not exist
];

const TRANSPORT_CODES: &[i32] = &[
    28759, // failure to open file (wallet)
    28860, // fatal SSL error
    28862, // SSL connection failed
    28864, // SSL connection closed gracefully
    29002, // SSL transport detected invalid or obsolete server certificate
    29003, // SSL transport detected mismatched server certificate
    29019, // SSL transport detected invalid certificate
    29024, // certificate validation failure
    29039, // certificate DN mismatch
    29040, // certificate expired
];

const AUTHENTICATION_CODES: &[i32] = &[
    1005,  // null password given
    1017,  // invalid username/password
    1045,  // lacks CREATE SESSION privilege
    28000, // account is locked
    28001, // password has expired
];

const SESSION_LOST_CODES: &[i32] = &[
    28,   // session has been killed
    1012, // not logged on
    1092, // instance terminated, disconnection forced
    2396, // exceeded maximum idle time
    3113, // end-of-file on communication channel
    3114, // not connected to Oracle
    3135, // connection lost contact
];

/// ODPI-C codes for a session that is no longer usable
const DPI_SESSION_LOST_CODES: &[i32] = &[
    1010, // not connected
    1080, // connection was closed
];

/// The first numeric code following `prefix` (e.g. `ORA-`) in `message`.
pub(crate) fn code_after(message: &str, prefix: &str) -> Option<i32> {
    let start = message.find(prefix)? + prefix.len();
    let digits: String = message[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

fn dpi_session_lost(message: &str) -> bool {
    code_after(message, "DPI-").is_some_and(|code| DPI_SESSION_LOST_CODES.contains(&code))
}

/// Classify a failure raised while opening a session.
pub fn classify_connect_error(message: impl Into<String>) -> DriverError {
    let message = message.into();
    let Some(code) = code_after(&message, "ORA-") else {
        return DriverError::unclassified(message);
    };

    let kind = if LISTENER_CODES.contains(&code) {
        FailureKind::Listener
    } else if TRANSPORT_CODES.contains(&code) {
        FailureKind::Transport
    } else if AUTHENTICATION_CODES.contains(&code) {
        FailureKind::Authentication
    } else if SESSION_LOST_CODES.contains(&code) {
        FailureKind::SessionLost
    } else {
        FailureKind::Unclassified
    };
    DriverError::new(kind, message).with_code(code)
}

/// Classify a failure raised by a statement on an open session.
pub fn classify_statement_error(message: impl Into<String>) -> DriverError {
    let message = message.into();
    let code = code_after(&message, "ORA-");

    let kind = match code {
        Some(code) if SESSION_LOST_CODES.contains(&code) => FailureKind::SessionLost,
        _ if dpi_session_lost(&message) => FailureKind::SessionLost,
        Some(_) => FailureKind::Statement,
        None => FailureKind::Unclassified,
    };

    let error = DriverError::new(kind, message);
    match code {
        Some(code) => error.with_code(code),
        None => error,
    }
}
