//! Envelope type carried by the cluster fabric
//!
//! Control messages in the commit protocol are header-only; the body is
//! kept for payload-bearing operations layered on the same fabric.

use std::collections::HashMap;

/// Message envelope that flows between nodes
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Message body (serialized data; empty for control messages)
    pub body: Vec<u8>,

    /// Headers for metadata
    pub headers: HashMap<String, String>,
}

impl Envelope {
    /// Create a new envelope with body and headers
    pub fn new(body: Vec<u8>, headers: HashMap<String, String>) -> Self {
        Self { body, headers }
    }

    /// Create an envelope with just a body
    pub fn with_body(body: Vec<u8>) -> Self {
        Self {
            body,
            headers: HashMap::new(),
        }
    }

    /// Add a header to the envelope
    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.headers.insert(key, value);
        self
    }

    /// Get header value
    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(|s| s.as_str())
    }
}

impl From<Vec<u8>> for Envelope {
    fn from(body: Vec<u8>) -> Self {
        Envelope::with_body(body)
    }
}
