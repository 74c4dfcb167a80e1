// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Errors that stop the metrics server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("failed to accept connection: {0}")]
    Accept(#[source] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ServerError::Bind {
            addr: SocketAddr::from(([127, 0, 0, 1], 1984)),
            source: io::Error::new(io::ErrorKind::AddrInUse, "address in use"),
        };
        assert_eq!(err.to_string(), "failed to bind 127.0.0.1:1984: address in use");

        let err = ServerError::Accept(io::Error::new(io::ErrorKind::Other, "too many files"));
        assert_eq!(err.to_string(), "failed to accept connection: too many files");
    }

    #[test]
    fn test_error_source() {
        use std::error::Error as _;

        let err = ServerError::Accept(io::Error::new(io::ErrorKind::Other, "boom"));
        assert!(err.source().is_some());
    }
}
