//! RDMA functionalities.

pub mod buf;
pub mod context;
pub mod cq;
pub mod flow;
pub mod qp;
pub mod ratelimit;
pub mod ring;
pub mod type_alias;
pub mod verbs;
pub mod wr;
