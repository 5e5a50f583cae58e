//! Header flattening.
//!
//! Every header name is carried across the gateway with exactly one value:
//! the original values joined with `;` in their original order. A name with a
//! single value passes through untouched. The rule applies in both directions
//! (client → upstream and upstream → client); multiplicity is not preserved.
//!
//! No header is renamed, removed or added here, hop-by-hop headers included.

use axum::http::{HeaderMap, HeaderValue};
use bytes::BytesMut;

/// Delimiter placed between the values of a multi-valued header.
pub const FLATTEN_DELIMITER: u8 = b';';

/// Collapse every multi-valued header into a single delimiter-joined value.
pub fn flatten_headers(headers: &HeaderMap) -> HeaderMap {
    let mut flattened = HeaderMap::with_capacity(headers.keys_len());

    for name in headers.keys() {
        let mut values = headers.get_all(name).iter();
        let Some(first) = values.next() else {
            continue;
        };

        let mut rest = values.peekable();
        if rest.peek().is_none() {
            flattened.insert(name.clone(), first.clone());
            continue;
        }

        let mut joined = BytesMut::from(first.as_bytes());
        for value in rest {
            joined.extend_from_slice(&[FLATTEN_DELIMITER]);
            joined.extend_from_slice(value.as_bytes());
        }

        // Valid header bytes joined by ';' are still valid header bytes.
        match HeaderValue::from_maybe_shared(joined.freeze()) {
            Ok(value) => {
                flattened.insert(name.clone(), value);
            }
            Err(e) => {
                tracing::warn!(header = %name, error = %e, "Could not flatten header values");
            }
        }
    }

    flattened
}
