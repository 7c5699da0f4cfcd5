//! # voxcore-sip-core
//!
//! The parsed SIP message model shared by the voxcore transaction and dialog
//! layers. Wire parsing happens outside this workspace; whatever parser is in
//! use hands the core a [`SipMessage`] built from these types.
//!
//! ```rust
//! use voxcore_sip_core::prelude::*;
//!
//! let request = RequestBuilder::new(Method::Options, "sip:bob@192.0.2.4".parse().unwrap())
//!     .via(Via::udp("192.0.2.1", Some(5060), generate_branch()))
//!     .from(NameAddr::new("sip:alice@192.0.2.1".parse().unwrap()).with_tag(generate_tag()))
//!     .to(NameAddr::new("sip:bob@192.0.2.4".parse().unwrap()))
//!     .call_id(generate_call_id())
//!     .cseq(1)
//!     .build();
//!
//! assert!(request.to_string().starts_with("OPTIONS sip:bob@192.0.2.4 SIP/2.0\r\n"));
//! ```

pub mod builder;
pub mod error;
pub mod header;
pub mod message;
pub mod method;
pub mod status;
pub mod uri;

pub use builder::{RequestBuilder, generate_branch, generate_call_id, generate_tag};
pub use error::{Error, Result};
pub use header::{CSeq, NameAddr, Via, RFC3261_BRANCH_MAGIC};
pub use message::{Headers, Request, Response, SipMessage};
pub use method::Method;
pub use status::StatusCode;
pub use uri::{Scheme, Uri};

pub mod prelude {
    pub use crate::builder::{RequestBuilder, generate_branch, generate_call_id, generate_tag};
    pub use crate::header::{CSeq, NameAddr, Via};
    pub use crate::message::{Headers, Request, Response, SipMessage};
    pub use crate::method::Method;
    pub use crate::status::StatusCode;
    pub use crate::uri::{Scheme, Uri};
}
